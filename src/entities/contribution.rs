// 💠 Contribution Entity - time-boxed contributor tags

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RosterError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionType {
    pub id: String,
    pub name: String,
}

impl ContributionType {
    pub fn new(name: &str) -> Self {
        ContributionType {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub id: String,
    pub member_id: String,
    pub contribution_type_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Contribution {
    pub fn new(
        member_id: &str,
        contribution_type_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self> {
        if end_date < start_date {
            return Err(RosterError::invariant(format!(
                "contribution ends ({}) before it starts ({})",
                end_date, start_date
            )));
        }

        Ok(Contribution {
            id: uuid::Uuid::new_v4().to_string(),
            member_id: member_id.to_string(),
            contribution_type_id: contribution_type_id.to_string(),
            start_date,
            end_date,
        })
    }
}
