// Shared test fixtures: a seeded in-memory roster

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rusqlite::Connection;

use crate::config::EngineConfig;
use crate::db;
use crate::entities::{
    Absence, AbsenceType, Attendance, ContributionType, Event, EventType, Member, MemberGroup,
    Rank, WarningType,
};

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub struct Fixture {
    pub conn: Connection,
    pub config: EngineConfig,
    pub recruit_rank: Rank,
    pub private_rank: Rank,
    pub ssgt_rank: Rank,
    pub alpha: MemberGroup,
    pub training: EventType,
    pub coop: EventType,
    pub loa: AbsenceType,
    pub tag: ContributionType,
}

impl Fixture {
    pub fn new() -> Self {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();

        let config = EngineConfig::default();

        let recruit_rank = Rank::new("Rec");
        let private_rank = Rank::new("Pvt");
        let ssgt_rank = Rank::new("SSgt");
        for rank in [&recruit_rank, &private_rank, &ssgt_rank] {
            db::insert_rank(&conn, rank).unwrap();
        }

        let alpha = MemberGroup::new("Alpha");
        db::insert_group(&conn, &alpha).unwrap();

        let training = EventType::new("Training", 0.5).with_default_hours(18, 20);
        let coop = EventType::new("Coop", 0.5);
        db::insert_event_type(&conn, &training).unwrap();
        db::insert_event_type(&conn, &coop).unwrap();

        let loa = AbsenceType::new("LOA");
        db::insert_absence_type(&conn, &loa).unwrap();

        let tag = ContributionType::new("Donator");
        db::insert_contribution_type(&conn, &tag).unwrap();

        for name in config.warning_types.all() {
            db::insert_warning_type(&conn, &WarningType::new(name)).unwrap();
        }

        Fixture {
            conn,
            config,
            recruit_rank,
            private_rank,
            ssgt_rank,
            alpha,
            training,
            coop,
            loa,
            tag,
        }
    }

    pub fn add_member(&self, member: Member) -> Member {
        db::insert_member(&self.conn, &member).unwrap();
        member
    }

    /// Recruit with both assessments pending
    pub fn recruit(&self, name: &str, join_date: NaiveDate) -> Member {
        self.add_member(Member::new(name, &self.recruit_rank.id, join_date).pending_assessments())
    }

    pub fn private(&self, name: &str, join_date: NaiveDate) -> Member {
        self.add_member(Member::new(name, &self.private_rank.id, join_date).in_group(&self.alpha.id))
    }

    /// One-hour event starting 19:00 UTC
    pub fn event(&self, event_type: &EventType, date: NaiveDate) -> Event {
        let start = Utc.from_utc_datetime(&date.and_hms_opt(19, 0, 0).unwrap());
        let event = Event::new(
            &format!("{} {}", event_type.name, date),
            &event_type.id,
            start,
            start + Duration::hours(1),
        )
        .unwrap();
        db::insert_event(&self.conn, &event).unwrap();
        event
    }

    pub fn attend(&self, event: &Event, member: &Member, seconds: i64) -> Attendance {
        let attendance = Attendance::new(&event.id, &member.id, seconds);
        db::insert_attendance(&self.conn, &attendance).unwrap();
        attendance
    }

    pub fn absence(&self, member: &Member, start: NaiveDate, end: NaiveDate) -> Absence {
        let absence = Absence::new(&member.id, &self.loa.id, start, end).unwrap();
        db::insert_absence(&self.conn, &absence).unwrap();
        absence
    }

    pub fn warning_type(&self, name: &str) -> WarningType {
        db::find_warning_type_by_name(&self.conn, name).unwrap()
    }
}
