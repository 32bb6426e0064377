// 🚩 Warning & WarningType entities
//
// A warning is identified by (member, type, message). That triple is hashed
// into `dedup_key`, which the store keeps UNIQUE.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningType {
    pub id: String,
    pub name: String,
}

impl WarningType {
    pub fn new(name: &str) -> Self {
        WarningType {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub id: String,
    pub member_id: String,
    pub warning_type_id: String,
    pub message: String,
    pub notified: bool,
    pub acknowledged: bool,
    pub created_at: DateTime<Utc>,
}

impl Warning {
    pub fn new(member_id: &str, warning_type_id: &str, message: &str) -> Self {
        Warning {
            id: uuid::Uuid::new_v4().to_string(),
            member_id: member_id.to_string(),
            warning_type_id: warning_type_id.to_string(),
            message: message.to_string(),
            notified: false,
            acknowledged: false,
            created_at: Utc::now(),
        }
    }

    pub fn dedup_key(&self) -> String {
        dedup_key(&self.member_id, &self.warning_type_id, &self.message)
    }

    /// Waiting for the next notification sweep
    pub fn is_pending_notification(&self) -> bool {
        !self.notified && !self.acknowledged
    }
}

/// SHA-256 over the (member, type, message) triple
pub fn dedup_key(member_id: &str, warning_type_id: &str, message: &str) -> String {
    let mut hasher = Sha256::new();
    // Unit separator keeps ("ab","c") and ("a","bc") apart
    hasher.update(member_id.as_bytes());
    hasher.update([0x1f]);
    hasher.update(warning_type_id.as_bytes());
    hasher.update([0x1f]);
    hasher.update(message.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_key_is_stable() {
        let w1 = Warning::new("m1", "t1", "Mod assessment overdue.");
        let w2 = Warning::new("m1", "t1", "Mod assessment overdue.");
        assert_ne!(w1.id, w2.id);
        assert_eq!(w1.dedup_key(), w2.dedup_key());
        assert_eq!(w1.dedup_key().len(), 64);
    }

    #[test]
    fn test_dedup_key_separates_fields() {
        assert_ne!(dedup_key("ab", "c", "x"), dedup_key("a", "bc", "x"));
        assert_ne!(dedup_key("m", "t", "one"), dedup_key("m", "t", "two"));
    }

    #[test]
    fn test_new_warning_is_pending() {
        let warning = Warning::new("m", "t", "msg");
        assert!(warning.is_pending_notification());
    }
}
