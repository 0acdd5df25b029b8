use thiserror::Error;

/// Errors crossing the analyst boundary. The orchestrator branches on the
/// variant and substitutes a deterministic fallback message; it never aborts
/// a meeting because of one.
#[derive(Debug, Error)]
pub enum AnalystError {
    #[error("analyst call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("analyst backend error: {reason}")]
    Backend { reason: String },

    #[error("analyst returned an unparseable payload: {reason}")]
    Malformed { reason: String },
}

/// Errors crossing the broker boundary.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Network failure or upstream 5xx. The caller queues the signal and
    /// retries on the next drain cycle.
    #[error("broker transient failure: {reason}")]
    Transient { reason: String },

    /// Logical rejection by the venue (order checked and refused).
    #[error("broker rejected the request: {reason}")]
    Rejected { reason: String },

    #[error("broker authentication failure: {reason}")]
    Auth { reason: String },

    #[error("broker returned malformed data: {reason}")]
    Malformed { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formatting() {
        let e = AnalystError::Timeout { seconds: 60 };
        assert!(e.to_string().contains("60"));

        let e = BrokerError::Rejected {
            reason: "price out of band".to_string(),
        };
        assert!(e.to_string().contains("price out of band"));
    }
}
