//! JSON output formatter

use dataroom_core::{ChatResponse, PipelineTrace};
use serde::Serialize;

pub fn to_pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string()) + "\n"
}

pub fn format_answer(response: &ChatResponse, trace: Option<&PipelineTrace>) -> String {
    match trace {
        Some(trace) => to_pretty(&serde_json::json!({
            "response": response.response,
            "sources": response.sources,
            "status": response.status,
            "trace": trace,
        })),
        None => to_pretty(response),
    }
}
