//! Transcoder command strings.
//!
//! Commands are the transcoder's argument list joined into one shell-quoted
//! string; the program name is supplied by the runner. Nothing here touches
//! the filesystem.

use std::path::Path;

use super::filters::FilterId;
use super::types::{JobKind, TranscodeJob};

/// Gamma multiplier for the channel a colour filter boosts
pub const FILTER_GAMMA_MULTIPLIER: &str = "1.5";
const NEUTRAL_GAMMA_MULTIPLIER: &str = "1";

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn join(args: Vec<String>) -> String {
    shell_words::join(args)
}

/// Single input to single output, container defaults
pub fn build_save_command(source: &Path, destination: &Path) -> String {
    join(vec![
        "-y".to_string(),
        "-i".to_string(),
        path_arg(source),
        path_arg(destination),
    ])
}

/// Video stream copied untouched, audio taken from the second input, output
/// cut to the shorter of the two
pub fn build_replace_audio_command(video: &Path, audio: &Path, destination: &Path) -> String {
    join(vec![
        "-y".to_string(),
        "-i".to_string(),
        path_arg(video),
        "-i".to_string(),
        path_arg(audio),
        "-c:v".to_string(),
        "copy".to_string(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "1:a:0".to_string(),
        "-shortest".to_string(),
        path_arg(destination),
    ])
}

/// `eq` graph boosting the target's channel. Always computed as if the
/// source were unfiltered, so successive filters override each other.
pub fn gamma_filter_graph(filter: FilterId) -> Option<String> {
    let mut red = NEUTRAL_GAMMA_MULTIPLIER;
    let mut green = NEUTRAL_GAMMA_MULTIPLIER;
    let mut blue = NEUTRAL_GAMMA_MULTIPLIER;

    match filter {
        FilterId::None => return None,
        FilterId::Red => red = FILTER_GAMMA_MULTIPLIER,
        FilterId::Green => green = FILTER_GAMMA_MULTIPLIER,
        FilterId::Blue => blue = FILTER_GAMMA_MULTIPLIER,
    }

    Some(format!("eq=gamma_r={red}:gamma_g={green}:gamma_b={blue}"))
}

/// Re-applying the filter already baked in yields the identity command
pub fn build_filter_command(
    source: &Path,
    destination: &Path,
    filter: FilterId,
    current: FilterId,
) -> String {
    let graph = if filter == current {
        None
    } else {
        gamma_filter_graph(filter)
    };

    let Some(graph) = graph else {
        return build_save_command(source, destination);
    };

    join(vec![
        "-y".to_string(),
        "-i".to_string(),
        path_arg(source),
        "-vf".to_string(),
        graph,
        path_arg(destination),
    ])
}

/// Command for a prepared job. `current` is the filter baked into the source.
pub fn build_for_job(job: &TranscodeJob, current: FilterId) -> String {
    let source = job.source_paths.first().map(|p| p.as_path()).unwrap_or(Path::new(""));
    match job.kind {
        JobKind::SaveCopy => build_save_command(source, &job.destination),
        JobKind::ReplaceAudio => {
            let audio = job.source_paths.get(1).map(|p| p.as_path()).unwrap_or(Path::new(""));
            build_replace_audio_command(source, audio, &job.destination)
        }
        JobKind::ApplyFilter => build_filter_command(
            source,
            &job.destination,
            job.filter.unwrap_or_default(),
            current,
        ),
    }
}
