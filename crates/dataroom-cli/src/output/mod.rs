//! Output formatters

pub mod json;
pub mod terminal;

use crate::app::OutputFormat;
use dataroom_core::eval::EvalReport;
use dataroom_core::{ChatResponse, PipelineTrace, RebuildReport, StatusReport};

pub fn format_answer(
    response: &ChatResponse,
    trace: Option<&PipelineTrace>,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Json => json::format_answer(response, trace),
        OutputFormat::Cli => terminal::format_answer(response, trace),
    }
}

pub fn format_status(status: &StatusReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json::to_pretty(status),
        OutputFormat::Cli => terminal::format_status(status),
    }
}

pub fn format_rebuild(report: &RebuildReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json::to_pretty(report),
        OutputFormat::Cli => terminal::format_rebuild(report),
    }
}

pub fn format_eval(report: &EvalReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json::to_pretty(report),
        OutputFormat::Cli => terminal::format_eval(report),
    }
}
