// 🎖️ Rank & MemberGroup entities
//
// A rank is entry-level when its name contains the configured marker
// ("Rec", "Recruit", "RCT"...). Everything that gates recruits keys off this.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rank {
    pub id: String,
    pub name: String,
}

impl Rank {
    pub fn new(name: &str) -> Self {
        Rank {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
        }
    }

    pub fn lowered_name(&self) -> String {
        self.name.to_lowercase()
    }

    /// Case-insensitive substring match against the entry-level marker
    pub fn is_entry_level(&self, marker: &str) -> bool {
        if marker.is_empty() {
            return false;
        }
        self.lowered_name().contains(&marker.to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberGroup {
    pub id: String,
    pub name: String,
    pub leader_id: Option<String>,
}

impl MemberGroup {
    pub fn new(name: &str) -> Self {
        MemberGroup {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            leader_id: None,
        }
    }

    pub fn with_leader(mut self, leader_id: &str) -> Self {
        self.leader_id = Some(leader_id.to_string());
        self
    }
}
