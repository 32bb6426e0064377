// ⚙️ Engine configuration
// Everything that used to be process-wide (rank marker, notification
// addresses, warning type names) lives in one explicit object.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Result, RosterError};

/// Names of the warning types the batch refreshes look up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarningTypeNames {
    pub mod_assessment_due: String,
    pub qualification_due: String,
    pub low_attendance: String,
    pub contribution_expiring: String,
}

impl Default for WarningTypeNames {
    fn default() -> Self {
        WarningTypeNames {
            mod_assessment_due: "Mod Assessment Due".to_string(),
            qualification_due: "Grunt Qualification Due".to_string(),
            low_attendance: "Low Attendance".to_string(),
            contribution_expiring: "Contribution Expiring".to_string(),
        }
    }
}

impl WarningTypeNames {
    pub fn all(&self) -> [&str; 4] {
        [
            &self.mod_assessment_due,
            &self.qualification_due,
            &self.low_attendance,
            &self.contribution_expiring,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Ranks whose lower-cased name contains this marker are entry-level
    pub entry_level_marker: String,

    /// Event type name counted as training in period adequacy
    pub training_event_type: String,

    /// Rank names (case-insensitive, exact) that may lead groups
    pub qualified_leader_ranks: Vec<String>,

    /// Timezone for "today" and calendar months
    #[serde(with = "tz_name")]
    pub timezone: Tz,

    /// Sender address for outgoing notifications
    pub notification_address: String,

    /// Prefix for every notification subject
    pub subject_lead: String,

    /// Always copied on warning notifications (None = group leader only)
    pub staff_recipient: Option<String>,

    pub warning_types: WarningTypeNames,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            database_path: PathBuf::from("roster.db"),
            entry_level_marker: "rec".to_string(),
            training_event_type: "training".to_string(),
            qualified_leader_ranks: vec!["ssgt".to_string(), "spc".to_string()],
            timezone: chrono_tz::UTC,
            notification_address: "roster@localhost".to_string(),
            subject_lead: "[Roster]".to_string(),
            staff_recipient: None,
            warning_types: WarningTypeNames::default(),
        }
    }
}

impl EngineConfig {
    /// Load from the environment (and `.env` if present), falling back to defaults
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = EngineConfig::default();

        if let Ok(path) = env::var("ROSTER_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Ok(marker) = env::var("ROSTER_ENTRY_LEVEL_MARKER") {
            if marker.trim().is_empty() {
                return Err(RosterError::Config(
                    "ROSTER_ENTRY_LEVEL_MARKER must not be empty".to_string(),
                ));
            }
            config.entry_level_marker = marker.trim().to_lowercase();
        }
        if let Ok(name) = env::var("ROSTER_TRAINING_EVENT_TYPE") {
            config.training_event_type = name;
        }
        if let Ok(ranks) = env::var("ROSTER_QUALIFIED_LEADER_RANKS") {
            config.qualified_leader_ranks = parse_list(&ranks);
        }
        if let Ok(tz) = env::var("ROSTER_TIMEZONE") {
            config.timezone = tz
                .parse::<Tz>()
                .map_err(|e| RosterError::Config(format!("ROSTER_TIMEZONE: {}", e)))?;
        }
        if let Ok(address) = env::var("ROSTER_NOTIFICATION_ADDRESS") {
            config.notification_address = address;
        }
        if let Ok(lead) = env::var("ROSTER_SUBJECT_LEAD") {
            config.subject_lead = lead;
        }
        config.staff_recipient = env::var("ROSTER_STAFF_RECIPIENT")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Ok(config)
    }

    /// Builder-style override, mostly for tests
    pub fn with_entry_level_marker(mut self, marker: &str) -> Self {
        self.entry_level_marker = marker.to_lowercase();
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn is_qualified_leader_rank(&self, rank_name: &str) -> bool {
        self.qualified_leader_ranks
            .iter()
            .any(|r| r.eq_ignore_ascii_case(rank_name))
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

mod tz_name {
    use chrono_tz::Tz;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(tz: &Tz, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(tz.name())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Tz, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse::<Tz>().map_err(serde::de::Error::custom)
    }
}
