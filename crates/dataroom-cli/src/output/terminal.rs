//! Terminal output formatter

use dataroom_core::eval::EvalReport;
use dataroom_core::{ChatResponse, PipelineTrace, RebuildReport, StatusReport};

pub fn format_answer(response: &ChatResponse, trace: Option<&PipelineTrace>) -> String {
    let mut output = format!("{}\n", response.response.trim_end());

    if !response.sources.is_empty() {
        output.push_str("\nSources:\n");
        for source in &response.sources {
            output.push_str(&format!("  - {}\n", source));
        }
    }

    if let Some(trace) = trace {
        if let Some(intent) = trace.intent {
            output.push_str(&format!(
                "\nIntent: {} ({:.0}%)\n",
                intent.level,
                intent.confidence * 100.0
            ));
        }
        for degradation in &trace.degradations {
            output.push_str(&format!(
                "Degraded {}: {}\n",
                degradation.stage, degradation.reason
            ));
        }
    }

    output
}

pub fn format_status(status: &StatusReport) -> String {
    let mut output = String::new();
    output.push_str(&format!("Status:          {}\n", status.status));
    output.push_str(&format!("Indexed files:   {}\n", status.indexed_files));
    output.push_str(&format!("Chunks:          {}\n", status.chunk_count));
    if let Some(ref built_at) = status.built_at {
        let shown = chrono::DateTime::parse_from_rfc3339(built_at)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S %z").to_string())
            .unwrap_or_else(|_| built_at.clone());
        output.push_str(&format!("Built at:        {}\n", shown));
    }
    if status.rebuilding {
        output.push_str("Rebuild in progress\n");
    }
    if let Some(ref error) = status.last_error {
        output.push_str(&format!("Last error:      {}\n", error));
    }
    output
}

pub fn format_rebuild(report: &RebuildReport) -> String {
    let mut output = format!("{}\n", report.message);
    output.push_str(&format!("  Files:     {}\n", report.files_processed));
    if report.files_without_text > 0 {
        output.push_str(&format!("  Empty:     {}\n", report.files_without_text));
    }
    output.push_str(&format!("  Chunks:    {}\n", report.chunks_indexed));
    output.push_str(&format!("  Snapshot:  v{}\n", report.snapshot_version));
    output
}

pub fn format_eval(report: &EvalReport) -> String {
    let mut output = String::new();

    for (i, result) in report.results.iter().enumerate() {
        output.push_str(&format!("{:>2}. {}\n", i + 1, result.query));
        match (&result.score, &result.error) {
            (Some(score), _) => {
                output.push_str(&format!("    Score: {}/10\n", score.score));
                if let Some(level) = result.detected_level {
                    let verdict = match result.level_matched {
                        Some(true) => " (expected)",
                        Some(false) => " (unexpected)",
                        None => "",
                    };
                    output.push_str(&format!("    Level: {}{}\n", level, verdict));
                }
                for term in &score.confusions {
                    output.push_str(&format!("    Context confusion: mentions '{}'\n", term));
                }
            }
            (None, Some(error)) => output.push_str(&format!("    Failed: {}\n", error)),
            (None, None) => {}
        }
    }

    output.push_str(&format!(
        "\nAverage score: {:.1}/10 over {} questions, {} confusion warnings\n",
        report.mean_score,
        report.results.len(),
        report.confusion_count
    ));
    output
}
