// 📨 Notification sweep
//
// Pending warnings (notified = false, acknowledged = false) are composed and
// handed to a Notifier. A warning is marked notified only after the send
// succeeded; failed deliveries stay pending for the next sweep.

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::db::{self, OutboxMessage};
use crate::entities::Warning;
use crate::error::{Result, RosterError};

// ============================================================================
// COLLABORATORS
// ============================================================================

/// Delivery channel for composed notifications
pub trait Notifier {
    fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<()>;
}

/// Decides who hears about a warning and what they are told.
/// `None` from either method skips the warning for this sweep.
pub trait WarningComposer {
    fn recipients(&self, conn: &Connection, warning: &Warning) -> Result<Option<Vec<String>>>;

    /// (subject, body)
    fn compose(&self, conn: &Connection, warning: &Warning) -> Result<Option<(String, String)>>;
}

/// Mails the member's group leader, with the staff address copied
#[derive(Debug, Clone, Default)]
pub struct GroupLeaderComposer {
    pub staff_recipient: Option<String>,
}

impl GroupLeaderComposer {
    pub fn from_config(config: &EngineConfig) -> Self {
        GroupLeaderComposer {
            staff_recipient: config.staff_recipient.clone(),
        }
    }

    fn leader_email(&self, conn: &Connection, warning: &Warning) -> Result<Option<String>> {
        let member = db::get_member(conn, &warning.member_id)?;
        let Some(group_id) = member.group_id else {
            return Ok(None);
        };
        let group = db::get_group(conn, &group_id)?;
        let Some(leader_id) = group.leader_id else {
            return Ok(None);
        };
        let leader = db::get_member(conn, &leader_id)?;
        Ok(leader.email.filter(|e| !e.trim().is_empty()))
    }
}

impl WarningComposer for GroupLeaderComposer {
    fn recipients(&self, conn: &Connection, warning: &Warning) -> Result<Option<Vec<String>>> {
        let mut recipients = Vec::new();
        if let Some(email) = self.leader_email(conn, warning)? {
            recipients.push(email);
        }
        if let Some(staff) = &self.staff_recipient {
            if !recipients.contains(staff) {
                recipients.push(staff.clone());
            }
        }

        if recipients.is_empty() {
            Ok(None)
        } else {
            Ok(Some(recipients))
        }
    }

    fn compose(&self, conn: &Connection, warning: &Warning) -> Result<Option<(String, String)>> {
        let member = db::get_member(conn, &warning.member_id)?;
        let warning_type = db::get_warning_type(conn, &warning.warning_type_id)?;
        Ok(Some((
            format!("{}: {}", warning_type.name, member.name),
            warning.message.clone(),
        )))
    }
}

/// Queues messages in `notification_outbox` for an external mailer
pub struct OutboxNotifier<'c> {
    conn: &'c Connection,
    sender: String,
}

impl<'c> OutboxNotifier<'c> {
    pub fn new(conn: &'c Connection, sender: &str) -> Self {
        OutboxNotifier {
            conn,
            sender: sender.to_string(),
        }
    }
}

impl Notifier for OutboxNotifier<'_> {
    fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<()> {
        if recipients.is_empty() {
            return Err(RosterError::Delivery("no recipients".to_string()));
        }

        let message = OutboxMessage {
            sender: self.sender.clone(),
            recipients: recipients.to_vec(),
            subject: subject.to_string(),
            body: body.to_string(),
            queued_at: Utc::now(),
        };

        db::insert_outbox_message(self.conn, &message)
            .map_err(|e| RosterError::Delivery(e.to_string()))
    }
}

// ============================================================================
// SWEEP
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SweepSummary {
    pub fn summary(&self) -> String {
        format!(
            "notifications: {} sent, {} skipped, {} failed",
            self.sent, self.skipped, self.failed
        )
    }
}

enum Delivery {
    Sent,
    Skipped,
}

fn deliver(
    conn: &Connection,
    config: &EngineConfig,
    composer: &dyn WarningComposer,
    notifier: &dyn Notifier,
    warning: &Warning,
) -> Result<Delivery> {
    let Some(recipients) = composer.recipients(conn, warning)? else {
        return Ok(Delivery::Skipped);
    };
    let Some((subject, body)) = composer.compose(conn, warning)? else {
        return Ok(Delivery::Skipped);
    };

    let subject = format!("{} {}", config.subject_lead, subject);
    notifier.send(&recipients, &subject, &body)?;
    db::mark_warning_notified(conn, &warning.id)?;
    debug!(warning_id = %warning.id, recipients = recipients.len(), "warning notified");
    Ok(Delivery::Sent)
}

/// Notify every pending warning once
pub fn send_warning_emails(
    conn: &Connection,
    config: &EngineConfig,
    composer: &dyn WarningComposer,
    notifier: &dyn Notifier,
) -> Result<SweepSummary> {
    let mut summary = SweepSummary::default();

    for warning in db::pending_warnings(conn)? {
        match deliver(conn, config, composer, notifier, &warning) {
            Ok(Delivery::Sent) => summary.sent += 1,
            Ok(Delivery::Skipped) => summary.skipped += 1,
            Err(e) => {
                warn!(warning_id = %warning.id, retryable = e.is_retryable(), error = %e, "notification failed");
                summary.failed += 1;
            }
        }
    }

    info!("{}", summary.summary());
    Ok(summary)
}

/// Tell the staff address that a batch job failed. Returns false when no
/// staff address is configured.
pub fn send_exception_notice(
    config: &EngineConfig,
    notifier: &dyn Notifier,
    message: &str,
) -> Result<bool> {
    let Some(staff) = &config.staff_recipient else {
        warn!("no staff recipient configured, exception notice not sent");
        return Ok(false);
    };

    let subject = format!("{} exception", config.subject_lead);
    notifier.send(std::slice::from_ref(staff), &subject, message)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Member, MemberGroup};
    use crate::fixtures::{d, Fixture};
    use crate::warnings::reconcile_warning;
    use std::cell::RefCell;

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        fn send(&self, _: &[String], _: &str, _: &str) -> Result<()> {
            Err(RosterError::Delivery("smtp unreachable".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: RefCell<Vec<(Vec<String>, String, String)>>,
    }

    impl Notifier for RecordingNotifier {
        fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<()> {
            self.sent
                .borrow_mut()
                .push((recipients.to_vec(), subject.to_string(), body.to_string()));
            Ok(())
        }
    }

    /// Fixture with a led group and one pending warning for a member in it
    fn setup() -> (Fixture, Member, Warning) {
        let fx = Fixture::new();
        let leader = fx.add_member(
            Member::new("Sarge", &fx.ssgt_rank.id, d(2022, 1, 1)).with_email("sarge@unit.test"),
        );
        let led = MemberGroup::new("Bravo").with_leader(&leader.id);
        db::insert_group(&fx.conn, &led).unwrap();

        let member = fx.add_member(Member::new("Alice", &fx.private_rank.id, d(2023, 1, 1)).in_group(&led.id));
        let wt = fx.warning_type("Low Attendance");
        reconcile_warning(&fx.conn, &member.id, &wt.id, true, "Did not attend enough events.").unwrap();
        let warning = db::warnings_for_member(&fx.conn, &member.id).unwrap().remove(0);
        (fx, member, warning)
    }

    #[test]
    fn test_successful_sweep_marks_notified_once() {
        let (fx, _, warning) = setup();
        let composer = GroupLeaderComposer::default();
        let notifier = RecordingNotifier::default();

        let summary = send_warning_emails(&fx.conn, &fx.config, &composer, &notifier).unwrap();
        assert_eq!(summary, SweepSummary { sent: 1, skipped: 0, failed: 0 });
        assert!(db::get_warning(&fx.conn, &warning.id).unwrap().notified);

        let sent = notifier.sent.borrow();
        assert_eq!(sent[0].0, vec!["sarge@unit.test".to_string()]);
        assert_eq!(sent[0].1, "[Roster] Low Attendance: Alice");
        assert_eq!(sent[0].2, "Did not attend enough events.");
        drop(sent);

        // Second sweep has nothing left to send
        let again = send_warning_emails(&fx.conn, &fx.config, &composer, &notifier).unwrap();
        assert_eq!(again.sent, 0);
        assert_eq!(notifier.sent.borrow().len(), 1);
    }

    #[test]
    fn test_failed_delivery_stays_pending() {
        let (fx, _, warning) = setup();
        let composer = GroupLeaderComposer::default();

        let summary = send_warning_emails(&fx.conn, &fx.config, &composer, &FailingNotifier).unwrap();
        assert_eq!(summary.failed, 1);
        assert!(!db::get_warning(&fx.conn, &warning.id).unwrap().notified);

        let retry = RecordingNotifier::default();
        let summary = send_warning_emails(&fx.conn, &fx.config, &composer, &retry).unwrap();
        assert_eq!(summary.sent, 1);
    }

    #[test]
    fn test_recreated_warning_is_notifiable_again() {
        let (fx, member, warning) = setup();
        let composer = GroupLeaderComposer::default();
        let notifier = RecordingNotifier::default();
        send_warning_emails(&fx.conn, &fx.config, &composer, &notifier).unwrap();

        reconcile_warning(&fx.conn, &member.id, &warning.warning_type_id, false, &warning.message).unwrap();
        reconcile_warning(&fx.conn, &member.id, &warning.warning_type_id, true, &warning.message).unwrap();

        let summary = send_warning_emails(&fx.conn, &fx.config, &composer, &notifier).unwrap();
        assert_eq!(summary.sent, 1);
        assert_eq!(notifier.sent.borrow().len(), 2);
    }

    #[test]
    fn test_no_recipients_is_skipped() {
        let fx = Fixture::new();
        let loner = fx.recruit("Loner", d(2024, 1, 1));
        let wt = fx.warning_type("Mod Assessment Due");
        reconcile_warning(&fx.conn, &loner.id, &wt.id, true, "Mod assessment overdue.").unwrap();

        let notifier = RecordingNotifier::default();
        let summary =
            send_warning_emails(&fx.conn, &fx.config, &GroupLeaderComposer::default(), &notifier).unwrap();
        assert_eq!(summary.skipped, 1);

        // The staff address alone is enough
        let staffed = GroupLeaderComposer {
            staff_recipient: Some("staff@unit.test".to_string()),
        };
        let summary = send_warning_emails(&fx.conn, &fx.config, &staffed, &notifier).unwrap();
        assert_eq!(summary.sent, 1);
    }

    #[test]
    fn test_exception_notice_goes_to_staff() {
        let fx = Fixture::new();
        let notifier = RecordingNotifier::default();
        assert!(!send_exception_notice(&fx.config, &notifier, "boom").unwrap());
        assert!(notifier.sent.borrow().is_empty());

        let mut config = fx.config.clone();
        config.staff_recipient = Some("staff@unit.test".to_string());
        assert!(send_exception_notice(&config, &notifier, "low_attendance: WarningType not found").unwrap());

        let sent = notifier.sent.borrow();
        assert_eq!(sent[0].0, vec!["staff@unit.test".to_string()]);
        assert_eq!(sent[0].1, "[Roster] exception");
        assert_eq!(sent[0].2, "low_attendance: WarningType not found");
    }

    #[test]
    fn test_retired_member_warning_not_sent() {
        let (fx, mut member, _) = setup();
        member.soft_delete();
        db::update_member(&fx.conn, &member).unwrap();

        let notifier = RecordingNotifier::default();
        let summary =
            send_warning_emails(&fx.conn, &fx.config, &GroupLeaderComposer::default(), &notifier).unwrap();
        assert_eq!(summary, SweepSummary::default());
        assert!(notifier.sent.borrow().is_empty());
    }

    #[test]
    fn test_outbox_notifier_persists_message() {
        let (fx, _, _) = setup();
        let outbox = OutboxNotifier::new(&fx.conn, &fx.config.notification_address);
        let composer = GroupLeaderComposer {
            staff_recipient: Some("staff@unit.test".to_string()),
        };

        send_warning_emails(&fx.conn, &fx.config, &composer, &outbox).unwrap();

        let queued = db::outbox_messages(&fx.conn).unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].sender, "roster@localhost");
        assert_eq!(
            queued[0].recipients,
            vec!["sarge@unit.test".to_string(), "staff@unit.test".to_string()]
        );
        assert!(matches!(
            outbox.send(&[], "s", "b"),
            Err(RosterError::Delivery(_))
        ));
    }
}
