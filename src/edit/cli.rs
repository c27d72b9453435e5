use clap::{Args, Subcommand, ValueHint};
use std::path::PathBuf;

use super::filters::FilterId;

#[derive(Subcommand, Debug, Clone)]
pub enum EditCommands {
    /// Start editing a video, or switch the current session to another one
    Open(OpenArgs),
    /// Show the current media, applied filter and resume point
    Status,
    /// List the available colour filters
    Filters,
    /// Apply a colour filter to the current media
    Filter(FilterArgs),
    /// Replace the audio track of the current media
    Audio(AudioArgs),
    /// Save a permanent copy of the current media to your videos folder
    Save,
    /// Play the current media, continuing where the last preview stopped
    Preview,
    /// Delete intermediate files from the cache
    ClearCache,
    /// Clear a stuck "edit in progress" flag left by a crashed process
    Recover,
    /// End the editing session
    Close,
    /// Show recorded transcode jobs (recorded with --debug)
    Logs(LogsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct OpenArgs {
    /// Video file to edit
    #[arg(value_hint = ValueHint::FilePath)]
    pub video: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    /// Filter to apply
    #[arg(value_enum, required_unless_present = "index", conflicts_with = "index")]
    pub filter: Option<FilterId>,

    /// Apply the filter at this position of `vedit filters`
    #[arg(long)]
    pub index: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct AudioArgs {
    /// Media file whose audio track replaces the current one
    #[arg(value_hint = ValueHint::FilePath)]
    pub audio: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct LogsArgs {
    /// Number of entries to show
    #[arg(short = 'n', long, default_value_t = 10)]
    pub limit: usize,

    /// Delete the recorded jobs instead of listing them
    #[arg(long)]
    pub clear: bool,
}
