use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TimetableError;

/// School days. The range is fixed; there is no configuration for it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Day {
    pub const ALL: [Day; 6] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
        }
    }

    /// Exact-match parse; drop-target ids are machine-generated.
    pub fn parse(s: &str) -> Option<Day> {
        Day::ALL.iter().copied().find(|d| d.as_str() == s)
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Teaching period within a day, valid range 1..=8 (fixed).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "u8", into = "u8")]
pub struct Period(u8);

impl Period {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 8;

    pub fn new(n: u8) -> Result<Period, TimetableError> {
        if (Period::MIN..=Period::MAX).contains(&n) {
            Ok(Period(n))
        } else {
            Err(TimetableError::Validation(format!(
                "period {} outside {}..={}",
                n,
                Period::MIN,
                Period::MAX
            )))
        }
    }

    pub fn all() -> impl Iterator<Item = Period> {
        (Period::MIN..=Period::MAX).map(Period)
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Period {
    type Error = TimetableError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Period::new(n)
    }
}

impl From<Period> for u8 {
    fn from(p: Period) -> u8 {
        p.0
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Composite slot identity within a timetable scope. At most one slot exists
/// per key per scope.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub day: Day,
    pub period: Period,
}

impl SlotKey {
    pub fn new(day: Day, period: Period) -> SlotKey {
        SlotKey { day, period }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.day, self.period)
    }
}

/// A palette subject. Identity is immutable once created; `color` is an
/// uninterpreted display string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub color: String,
}

/// A persisted slot row as the service returns it.
///
/// Invariant: `subject_id == None` implies `teacher_ids` is empty. The write
/// API upholds this by construction (`SlotWrite::Clear` removes both); a row
/// that violates it is projected as `Empty`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotRecord {
    pub id: String,
    pub day: Day,
    pub period: Period,
    #[serde(default)]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub teacher_ids: Vec<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SlotRecord {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.day, self.period)
    }

    pub fn state(&self) -> SlotState {
        match &self.subject_id {
            None => SlotState::Empty,
            Some(subject_id) if self.teacher_ids.is_empty() => SlotState::SubjectOnly {
                subject_id: subject_id.clone(),
            },
            Some(subject_id) => SlotState::Complete {
                subject_id: subject_id.clone(),
                teacher_ids: self.teacher_ids.clone(),
            },
        }
    }
}

/// Explicit per-slot lifecycle. `SubjectOnly` is the incomplete state a slot
/// stays in until at least one teacher is bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    SubjectOnly {
        subject_id: String,
    },
    Complete {
        subject_id: String,
        teacher_ids: Vec<String>,
    },
}

impl SlotState {
    pub fn subject_id(&self) -> Option<&str> {
        match self {
            SlotState::Empty => None,
            SlotState::SubjectOnly { subject_id } | SlotState::Complete { subject_id, .. } => {
                Some(subject_id)
            }
        }
    }

    pub fn teacher_ids(&self) -> &[String] {
        match self {
            SlotState::Complete { teacher_ids, .. } => teacher_ids,
            _ => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, SlotState::Empty)
    }
}

/// Scope selector chosen once per editing session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassRef {
    pub id: String,
    pub class: String,
    pub section: String,
    pub academic_year: String,
    #[serde(default)]
    pub class_teacher_id: Option<String>,
}

/// Which slot namespace a read/write addresses: a class timetable, or one
/// teacher's personal timetable. The two are disjoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Class(String),
    Teacher(String),
}

impl Scope {
    pub fn is_personal(&self) -> bool {
        matches!(self, Scope::Teacher(_))
    }
}

/// A teacher eligible for a subject, fetched on demand per subject and never
/// cached across subjects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeacherCandidate {
    pub id: String,
    pub full_name: String,
    pub staff_id: String,
}

/// Caller identity, threaded explicitly through every write operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub staff_id: String,
}

impl Actor {
    pub fn new(staff_id: impl Into<String>) -> Actor {
        Actor {
            staff_id: staff_id.into(),
        }
    }
}

/// The single mutation payload. `Clear` removes subject and teachers
/// together, so a write can never leave teachers behind without a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotWrite {
    Assign {
        subject_id: String,
        teacher_ids: Vec<String>,
    },
    Clear,
}
