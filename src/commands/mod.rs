//! CLI command handlers.

mod cache;
mod fetch;

pub(crate) use cache::{run_clear_all_command, run_clear_command, run_key_command};
pub(crate) use fetch::run_fetch_command;
