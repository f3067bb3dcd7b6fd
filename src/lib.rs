pub mod config;
pub mod engine;
pub mod entry;
pub mod humanize;
pub mod ledger;
pub mod observability;
pub mod plugins;
pub mod task;
