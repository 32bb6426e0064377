// ⚠️ Error taxonomy for the roster engine
// Library code returns RosterError; the binary wraps it with anyhow context.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RosterError {
    // ========================================================================
    // Lookup errors
    // ========================================================================
    /// A uniquely-keyed reference (rank, warning type, member...) is missing
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    // ========================================================================
    // Constraint errors
    // ========================================================================
    #[error("Attendance already recorded for member {member_id} at event {event_id}")]
    DuplicateAttendance { event_id: String, member_id: String },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // ========================================================================
    // External collaborators
    // ========================================================================
    /// Retried on the next notification sweep
    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // Infrastructure (wrapped)
    // ========================================================================
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RosterError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        RosterError::NotFound {
            entity,
            key: key.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        RosterError::InvariantViolation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RosterError::NotFound { .. })
    }

    /// Delivery failures are the only errors a later run can fix on its own
    pub fn is_retryable(&self) -> bool {
        matches!(self, RosterError::Delivery(_))
    }
}

pub type Result<T> = std::result::Result<T, RosterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = RosterError::not_found("WarningType", "Low Attendance");
        assert_eq!(err.to_string(), "WarningType not found: Low Attendance");
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_delivery_is_retryable() {
        let err = RosterError::Delivery("smtp timeout".to_string());
        assert!(err.is_retryable());
        assert!(!err.is_not_found());
    }
}
