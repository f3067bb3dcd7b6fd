//! Runs every applicable plugin of one phase, in priority order

use serde_json::Value;
use std::error::Error as StdError;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::plugins::{AbortKind, Outcome, PluginError, PluginRegistry, PluginResult};
use crate::task::{Phase, Task, TaskError};

static UNCONFIGURED: Value = Value::Null;

/// Run `phase` for `task`
///
/// Expected failures (fatal outcomes, missing dependencies, invalid entries)
/// abort the task and return `Ok`. Unexpected plugin errors abort the task
/// as well; in strict mode they are also returned to the caller.
pub async fn run_phase(
    task: &mut Task,
    registry: &PluginRegistry,
    phase: Phase,
) -> Result<(), TaskError> {
    let config = task.config();
    let candidates = registry.candidates(phase, &config);

    if phase.expects_configured_plugin() && !candidates.iter().any(|c| !c.builtin) {
        warn!(task = task.name(), %phase, "No {} plugins configured", phase);
    }

    for candidate in candidates {
        if task.is_aborted() && phase != Phase::Abort {
            break;
        }

        let plugin_config = config.get(&candidate.name).unwrap_or(&UNCONFIGURED);
        debug!(
            task = task.name(),
            %phase,
            plugin = %candidate.name,
            priority = candidate.priority,
            "Running plugin"
        );

        task.set_cursor(phase, Some(&candidate.name));
        let started = Instant::now();
        let result = candidate.plugin.on_phase(phase, task, plugin_config).await;
        let elapsed = started.elapsed();
        task.add_timing(&candidate.name, elapsed);

        let handled = handle_result(task, &candidate.name, phase, result);
        task.purge();
        task.clear_plugin_cursor();

        if task.options().details {
            info!(
                task = task.name(),
                %phase,
                plugin = %candidate.name,
                elapsed_ms = elapsed.as_millis() as u64,
                "Plugin finished"
            );
        }
        handled?;
    }

    Ok(())
}

fn handle_result(task: &mut Task, plugin: &str, phase: Phase, result: PluginResult) -> Result<(), TaskError> {
    match result {
        Ok(Outcome::Done) => Ok(()),
        Ok(Outcome::Warning(message)) => {
            warn!(task = task.name(), plugin, %phase, "{}", message);
            Ok(())
        }
        Ok(Outcome::Abort(AbortKind::Fatal(message))) => {
            error!(task = task.name(), plugin, %phase, "Fatal plugin error: {}", message);
            task.abort(format!("{}: {}", plugin, message));
            Ok(())
        }
        Ok(Outcome::Abort(AbortKind::MissingDependency { dependency, message })) => {
            error!(
                task = task.name(),
                plugin,
                %phase,
                dependency = %dependency,
                "Missing dependency: {}",
                message
            );
            task.abort(format!("{}: missing dependency {}: {}", plugin, dependency, message));
            Ok(())
        }
        Err(PluginError::Task(e @ TaskError::InvalidEntry { .. })) => {
            error!(task = task.name(), plugin, %phase, "{}", e);
            task.abort(format!("{}: {}", plugin, e));
            Ok(())
        }
        Err(e) => {
            error!(
                task = task.name(),
                plugin,
                %phase,
                error = %error_chain(&e),
                "Unexpected plugin error"
            );
            task.abort(format!("{}: unexpected error: {}", plugin, e));
            if task.options().strict {
                return Err(TaskError::Plugin {
                    plugin: plugin.to_string(),
                    phase,
                    source: Box::new(e),
                });
            }
            Ok(())
        }
    }
}

/// Error message followed by every source, joined with ": "
fn error_chain(e: &dyn StdError) -> String {
    let mut chain = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}
