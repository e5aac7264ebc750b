//! Stage results that may have fallen back to a safe default

use serde::Serialize;

/// Value produced by a pipeline stage, possibly through a fallback
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome<T> {
    Ok(T),
    Degraded { value: T, reason: String },
}

impl<T> StageOutcome<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        StageOutcome::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            StageOutcome::Ok(value) | StageOutcome::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            StageOutcome::Ok(value) | StageOutcome::Degraded { value, .. } => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            StageOutcome::Ok(_) => None,
            StageOutcome::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StageOutcome<U> {
        match self {
            StageOutcome::Ok(value) => StageOutcome::Ok(f(value)),
            StageOutcome::Degraded { value, reason } => StageOutcome::Degraded {
                value: f(value),
                reason,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let ok = StageOutcome::Ok(3);
        let degraded = StageOutcome::degraded(0, "oracle timed out");

        assert_eq!(*ok.value(), 3);
        assert!(!ok.is_degraded());
        assert_eq!(degraded.reason(), Some("oracle timed out"));
        assert_eq!(degraded.map(|v| v + 1).into_value(), 1);
    }
}
