mod common;
mod edit;
mod ui;

use clap::Parser;

use crate::edit::EditCommands;
use crate::ui::prelude::*;

/// Video editing sessions from the command line
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Activate debug mode
    #[arg(short, long, global = true)]
    debug: bool,

    /// Output format for messages
    #[arg(long, global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Disable coloured output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: EditCommands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    ui::init(cli.output, !cli.no_color);
    ui::set_debug_mode(cli.debug);

    if let Err(err) = edit::handle_edit_command(cli.command).await {
        let message = match get_output_format() {
            OutputFormat::Text => format!("Error: {err:#}"),
            OutputFormat::Json => format!("{err:#}"),
        };
        emit(Level::Error, "vedit.error", &message, None);
        std::process::exit(1);
    }
}
