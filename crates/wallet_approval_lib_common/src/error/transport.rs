use std::fmt::Display;

/// Classified outcome of a single external wallet-transport call.
///
/// Raw provider failures come in many shapes (boolean sentinels, numeric
/// codes, code strings, message text). Adapters collapse them into this enum
/// right at the call boundary so that no other code inspects raw shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The user explicitly declined in the wallet UI. Never retried.
    Rejected { reason: String },
    /// Extension absent or locked. Resolved by readiness polling, not retries.
    NotReady { reason: String },
    /// Network/timeout style failure, worth another attempt.
    Transient { reason: String },
    Unknown { reason: String },
}

impl TransportError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        TransportError::Rejected {
            reason: reason.into(),
        }
    }

    pub fn not_ready(reason: impl Into<String>) -> Self {
        TransportError::NotReady {
            reason: reason.into(),
        }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        TransportError::Transient {
            reason: reason.into(),
        }
    }

    pub fn unknown(reason: impl Into<String>) -> Self {
        TransportError::Unknown {
            reason: reason.into(),
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, TransportError::Rejected { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            TransportError::Rejected { reason }
            | TransportError::NotReady { reason }
            | TransportError::Transient { reason }
            | TransportError::Unknown { reason } => reason,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Rejected { .. } => "rejected",
            TransportError::NotReady { .. } => "not_ready",
            TransportError::Transient { .. } => "transient",
            TransportError::Unknown { .. } => "unknown",
        }
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Rejected { reason } => write!(f, "rejected by user: {reason}"),
            TransportError::NotReady { reason } => write!(f, "wallet not ready: {reason}"),
            TransportError::Transient { reason } => write!(f, "transient failure: {reason}"),
            TransportError::Unknown { reason } => write!(f, "unknown failure: {reason}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// EIP-1193 code emitted when the user declines a provider request.
pub const USER_REJECTED_CODE: i64 = 4001;

/// Folds a raw provider failure into a [`TransportError`].
///
/// Adapters that receive a string error code (e.g. `USER_REJECTED`) include
/// it in `message` before calling this.
pub fn classify_wallet_failure(code: Option<i64>, message: &str) -> TransportError {
    if code == Some(USER_REJECTED_CODE) {
        return TransportError::rejected(message.to_string());
    }
    let lowered = message.to_lowercase();
    if lowered.contains("reject") || lowered.contains("cancel") {
        return TransportError::rejected(message.to_string());
    }
    TransportError::transient(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_code() {
        assert!(classify_wallet_failure(Some(4001), "request declined").is_rejection());
        assert!(!classify_wallet_failure(Some(-32000), "out of gas").is_rejection());
    }

    #[test]
    fn test_classify_by_phrase() {
        assert!(classify_wallet_failure(None, "User rejected the request").is_rejection());
        assert!(classify_wallet_failure(None, "User canceled").is_rejection());
        assert!(classify_wallet_failure(None, "User cancelled the operation").is_rejection());
        assert!(classify_wallet_failure(None, "USER_REJECTED").is_rejection());
        assert_eq!(
            classify_wallet_failure(None, "connection timed out"),
            TransportError::transient("connection timed out")
        );
    }
}
