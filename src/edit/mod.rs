mod cli;
mod command;
mod commands;
mod config;
mod error;
mod filters;
mod history;
mod logging;
mod paths;
mod player;
mod runner;
mod session;
mod store;
mod types;

pub use cli::EditCommands;
pub use commands::handle_edit_command;
