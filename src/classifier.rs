// 🏷️ Deadline & Warning Classifier
// Turns deadlines + flags into tagged due-checks. No store access here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::deadlines::{Deadlines, REQUIRED_QUALIFYING_EVENTS};
use crate::entities::{Member, Rank};

pub const MOD_ASSESSMENT_OVERDUE: &str = "Mod assessment overdue.";
pub const PROMOTION_DEADLINE_REACHED: &str = "Promotion deadline reached.";
pub const NOT_RECRUIT: &str = "Not recruit.";
pub const NO_WARNINGS: &str = "No warnings.";

/// Outcome of a due-check: the flag plus an optional human-readable reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueCheck {
    pub due: bool,
    pub reason: Option<String>,
}

impl DueCheck {
    pub fn due(reason: &str) -> Self {
        DueCheck {
            due: true,
            reason: Some(reason.to_string()),
        }
    }

    pub fn clear() -> Self {
        DueCheck {
            due: false,
            reason: None,
        }
    }

    pub fn clear_because(reason: &str) -> Self {
        DueCheck {
            due: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// Past the initial-assessment deadline and still not assessed
pub fn mod_assessment_due(member: &Member, deadlines: &Deadlines, today: NaiveDate) -> DueCheck {
    if today > deadlines.initial_assessment && !member.mods_assessed {
        DueCheck::due(MOD_ASSESSMENT_OVERDUE)
    } else {
        DueCheck::clear()
    }
}

/// Past the qualification deadline, whatever the flags say
pub fn qualification_due(deadlines: &Deadlines, today: NaiveDate) -> DueCheck {
    if today > deadlines.qualification {
        DueCheck::due(PROMOTION_DEADLINE_REACHED)
    } else {
        DueCheck::clear()
    }
}

/// Assessment check first, qualification second; only entry-level ranks warn
pub fn recruit_warning(
    member: &Member,
    rank: &Rank,
    entry_level_marker: &str,
    deadlines: &Deadlines,
    today: NaiveDate,
) -> DueCheck {
    if !rank.is_entry_level(entry_level_marker) {
        return DueCheck::clear_because(NOT_RECRUIT);
    }

    let assessment = mod_assessment_due(member, deadlines, today);
    if assessment.due {
        return assessment;
    }

    let qualification = qualification_due(deadlines, today);
    if qualification.due {
        return qualification;
    }

    DueCheck::clear_because(NO_WARNINGS)
}

/// Entry-level members need enough adequate events AND the qualification
/// assessment; everyone else is eligible
pub fn ready_for_promotion(
    member: &Member,
    rank: &Rank,
    entry_level_marker: &str,
    events_attended: usize,
) -> bool {
    if !rank.is_entry_level(entry_level_marker) {
        return true;
    }
    events_attended >= REQUIRED_QUALIFYING_EVENTS as usize && member.bqf_assessed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Absence;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn recruit() -> (Member, Rank) {
        let rank = Rank::new("Rec");
        let member = Member::new("Alice", &rank.id, d(2024, 1, 1)).pending_assessments();
        (member, rank)
    }

    #[test]
    fn test_mod_assessment_due_after_deadline() {
        let (member, _) = recruit();
        let deadlines = Deadlines::for_member(&member, &[]);
        assert_eq!(deadlines.initial_assessment, d(2024, 1, 15));

        let check = mod_assessment_due(&member, &deadlines, d(2024, 1, 20));
        assert!(check.due);
        assert_eq!(check.reason.as_deref(), Some(MOD_ASSESSMENT_OVERDUE));
    }

    #[test]
    fn test_mod_assessment_not_due_on_deadline_day() {
        let (member, _) = recruit();
        let deadlines = Deadlines::for_member(&member, &[]);
        assert_eq!(mod_assessment_due(&member, &deadlines, d(2024, 1, 15)), DueCheck::clear());
    }

    #[test]
    fn test_mod_assessment_not_due_once_assessed() {
        let (mut member, _) = recruit();
        member.mods_assessed = true;
        let deadlines = Deadlines::for_member(&member, &[]);
        assert!(!mod_assessment_due(&member, &deadlines, d(2024, 6, 1)).due);
    }

    #[test]
    fn test_qualification_due_ignores_flags() {
        let (mut member, _) = recruit();
        member.bqf_assessed = true;
        let deadlines = Deadlines::for_member(&member, &[]);

        assert!(!qualification_due(&deadlines, d(2024, 2, 26)).due);
        let check = qualification_due(&deadlines, d(2024, 2, 27));
        assert!(check.due);
        assert_eq!(check.reason.as_deref(), Some(PROMOTION_DEADLINE_REACHED));
    }

    #[test]
    fn test_absence_postpones_qualification() {
        let (member, _) = recruit();
        let absences = vec![Absence::new(&member.id, "loa", d(2024, 2, 1), d(2024, 2, 10)).unwrap()];
        let deadlines = Deadlines::for_member(&member, &absences);

        // Day 60 would be past the unshifted deadline (day 56) but not day 65
        assert!(!qualification_due(&deadlines, d(2024, 3, 1)).due);
        assert!(qualification_due(&deadlines, d(2024, 3, 7)).due);
    }

    #[test]
    fn test_recruit_warning_order() {
        let (member, rank) = recruit();
        let deadlines = Deadlines::for_member(&member, &[]);

        // Both conditions hold; assessment wins
        let both = recruit_warning(&member, &rank, "rec", &deadlines, d(2024, 6, 1));
        assert_eq!(both.reason.as_deref(), Some(MOD_ASSESSMENT_OVERDUE));

        let mut assessed = member.clone();
        assessed.mods_assessed = true;
        let qual = recruit_warning(&assessed, &rank, "rec", &deadlines, d(2024, 6, 1));
        assert_eq!(qual.reason.as_deref(), Some(PROMOTION_DEADLINE_REACHED));

        let none = recruit_warning(&assessed, &rank, "rec", &deadlines, d(2024, 1, 5));
        assert!(!none.due);
        assert_eq!(none.reason.as_deref(), Some(NO_WARNINGS));
    }

    #[test]
    fn test_non_recruit_never_warns() {
        let (member, _) = recruit();
        let rank = Rank::new("Pvt");
        let deadlines = Deadlines::for_member(&member, &[]);
        let check = recruit_warning(&member, &rank, "rec", &deadlines, d(2025, 1, 1));
        assert!(!check.due);
        assert_eq!(check.reason.as_deref(), Some(NOT_RECRUIT));
    }

    #[test]
    fn test_ready_for_promotion_needs_both() {
        let (mut member, rank) = recruit();

        assert!(!ready_for_promotion(&member, &rank, "rec", 5));
        member.bqf_assessed = true;
        assert!(!ready_for_promotion(&member, &rank, "rec", 4));
        assert!(ready_for_promotion(&member, &rank, "rec", 5));

        let private = Rank::new("Pvt");
        assert!(ready_for_promotion(&member, &private, "rec", 0));
    }
}
