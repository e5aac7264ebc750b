//! Progress reporting with ETA

use std::io::{self, Write};
use std::time::Instant;

/// Single-line progress reporter on stderr
pub struct ProgressReporter {
    label: String,
    started: Instant,
}

impl ProgressReporter {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            started: Instant::now(),
        }
    }

    pub fn update(&self, processed: usize, total: usize) {
        let eta = eta_secs(self.started.elapsed().as_secs_f64(), processed, total)
            .map(|s| format!(", ~{:.0}s left", s))
            .unwrap_or_default();
        eprint!("\r{}: {}/{}{:<20}", self.label, processed, total, eta);
        io::stderr().flush().ok();
    }

    pub fn finish(&self, processed: usize) {
        eprintln!(
            "\r{}: done ({} in {:.1}s){:<20}",
            self.label,
            processed,
            self.started.elapsed().as_secs_f64(),
            ""
        );
    }
}

fn eta_secs(elapsed: f64, processed: usize, total: usize) -> Option<f64> {
    if processed == 0 || processed >= total {
        return None;
    }
    Some(elapsed / processed as f64 * (total - processed) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eta() {
        assert_eq!(eta_secs(10.0, 0, 100), None);
        assert_eq!(eta_secs(10.0, 100, 100), None);
        assert_eq!(eta_secs(10.0, 50, 100), Some(10.0));
    }
}
