//! Rebuild command

use crate::app::{OutputFormat, RebuildArgs};
use crate::output;
use crate::progress::ProgressReporter;
use anyhow::{Context, Result};
use dataroom_core::index::EmbedProgress;
use dataroom_core::{Dataroom, FileProvider};

pub async fn run(args: RebuildArgs, room: &Dataroom, format: OutputFormat) -> Result<()> {
    let provider = FileProvider::new(&args.path, args.pattern)
        .with_hidden(args.hidden)
        .with_max_file_bytes(room.config().indexing.max_file_bytes);

    let progress = ProgressReporter::new("Embedding");
    let report_progress = |p: EmbedProgress| progress.update(p.processed_chunks, p.total_chunks);

    let report = room
        .rebuild_from_source_with_progress(&provider, Some(&report_progress))
        .await
        .with_context(|| format!("Failed to rebuild index from {}", args.path.display()))?;
    if report.chunks_indexed > 0 {
        progress.finish(report.chunks_indexed);
    }

    print!("{}", output::format_rebuild(&report, format));
    Ok(())
}
