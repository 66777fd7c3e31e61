use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a recruiting drive.
    DriveId
);
string_id!(
    /// Identifier of a single round within a drive.
    RoundId
);
string_id!(
    /// Identifier of a portal user (student, counsellor or administrator).
    UserId
);
string_id!(
    /// Identifier of a recruiting company.
    CompanyId
);

/// Administrative state of a drive. Transitions are driven by administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveStatus {
    Draft,
    Active,
    Completed,
    Cancelled,
}

impl DriveStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DriveStatus::Draft => "draft",
            DriveStatus::Active => "active",
            DriveStatus::Completed => "completed",
            DriveStatus::Cancelled => "cancelled",
        }
    }
}

/// A recruitment cycle run by one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drive {
    pub id: DriveId,
    pub company_id: CompanyId,
    pub title: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: DriveStatus,
    pub total_rounds: u32,
    pub current_round: u32,
    pub created_by: UserId,
}

impl Drive {
    pub fn window_contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    /// Whether clearing `round_number` finishes the drive for a student.
    pub fn is_final_round(&self, round_number: u32) -> bool {
        round_number >= self.total_rounds
    }

    /// Drives still recruiting accept newly approved applicants.
    pub fn accepts_enrollment(&self) -> bool {
        matches!(self.status, DriveStatus::Draft | DriveStatus::Active)
    }
}

/// Administrator input for a new drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveDraft {
    pub company_id: CompanyId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_rounds: u32,
    #[serde(default)]
    pub status: Option<DriveStatus>,
    pub created_by: UserId,
}

/// Partial update applied to an existing drive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrivePatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub total_rounds: Option<u32>,
    #[serde(default)]
    pub status: Option<DriveStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundType {
    Aptitude,
    Technical,
    Coding,
    GroupDiscussion,
    Hr,
    Interview,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl RoundStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RoundStatus::Scheduled => "scheduled",
            RoundStatus::InProgress => "in_progress",
            RoundStatus::Completed => "completed",
            RoundStatus::Cancelled => "cancelled",
        }
    }
}

/// One evaluation stage of a drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub drive_id: DriveId,
    pub round_number: u32,
    pub round_name: String,
    pub round_type: RoundType,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: Option<String>,
    pub max_marks: u32,
    pub passing_marks: u32,
    pub status: RoundStatus,
    pub created_by: UserId,
}

fn default_max_marks() -> u32 {
    100
}

/// Administrator input for a new round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundDraft {
    pub round_number: u32,
    #[serde(default)]
    pub round_name: Option<String>,
    pub round_type: RoundType,
    pub scheduled_date: NaiveDate,
    #[serde(default)]
    pub scheduled_time: Option<String>,
    #[serde(default = "default_max_marks")]
    pub max_marks: u32,
    #[serde(default)]
    pub passing_marks: u32,
    pub created_by: UserId,
}

/// Partial update applied to an existing round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundPatch {
    #[serde(default)]
    pub round_name: Option<String>,
    #[serde(default)]
    pub round_type: Option<RoundType>,
    #[serde(default)]
    pub scheduled_date: Option<NaiveDate>,
    #[serde(default)]
    pub scheduled_time: Option<String>,
    #[serde(default)]
    pub max_marks: Option<u32>,
    #[serde(default)]
    pub passing_marks: Option<u32>,
}

/// Default label for rounds that have no stored name yet.
pub fn default_round_name(round_number: u32) -> String {
    format!("Round {round_number}")
}

/// Per-round evaluation state for a single student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    InProgress,
    Completed,
    Shortlisted,
    Rejected,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundProgressEntry {
    pub round_number: u32,
    pub round_name: String,
    pub status: EntryStatus,
    pub marks_obtained: Option<f32>,
    pub max_marks: Option<u32>,
    pub percentage: Option<f32>,
    pub feedback: Option<String>,
    pub evaluated_at: Option<DateTime<Utc>>,
    pub is_shortlisted: bool,
}

impl RoundProgressEntry {
    pub fn pending(round_number: u32, round_name: impl Into<String>) -> Self {
        Self {
            round_number,
            round_name: round_name.into(),
            status: EntryStatus::Pending,
            marks_obtained: None,
            max_marks: None,
            percentage: None,
            feedback: None,
            evaluated_at: None,
            is_shortlisted: false,
        }
    }

    pub fn for_round(round: &Round) -> Self {
        let mut entry = Self::pending(round.round_number, round.round_name.clone());
        entry.max_marks = Some(round.max_marks);
        entry
    }

    /// Store marks and derive the percentage when a maximum is known.
    pub fn record_marks(&mut self, marks: f32, max_marks: Option<u32>) {
        if max_marks.is_some() {
            self.max_marks = max_marks;
        }
        self.marks_obtained = Some(marks);
        self.percentage = self
            .max_marks
            .filter(|max| *max > 0)
            .map(|max| ((marks / max as f32) * 10_000.0).round() / 100.0);
    }
}

/// Roll-up state of a student across the whole drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Active,
    Shortlisted,
    Rejected,
    Placed,
    Withdrawn,
}

impl OverallStatus {
    pub const fn label(self) -> &'static str {
        match self {
            OverallStatus::Active => "active",
            OverallStatus::Shortlisted => "shortlisted",
            OverallStatus::Rejected => "rejected",
            OverallStatus::Placed => "placed",
            OverallStatus::Withdrawn => "withdrawn",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            OverallStatus::Rejected | OverallStatus::Placed | OverallStatus::Withdrawn
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalResult {
    Pending,
    Selected,
    Rejected,
}

/// Per-student per-drive tracking record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub student_id: UserId,
    pub drive_id: DriveId,
    pub current_round: u32,
    pub round_progress: Vec<RoundProgressEntry>,
    pub overall_status: OverallStatus,
    pub final_result: FinalResult,
    /// Bumped by the store on every successful update.
    #[serde(default)]
    pub version: u64,
}

impl Progress {
    /// Fresh record awaiting round 1.
    pub fn seeded(student_id: UserId, drive_id: DriveId, first_entry: RoundProgressEntry) -> Self {
        Self {
            student_id,
            drive_id,
            current_round: 1,
            round_progress: vec![first_entry],
            overall_status: OverallStatus::Active,
            final_result: FinalResult::Pending,
            version: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.overall_status.is_terminal()
    }

    /// Whether the student is waiting on, or attending, `round_number`.
    pub fn is_awaiting(&self, round_number: u32) -> bool {
        !self.is_terminal() && self.current_round == round_number
    }

    pub fn entry(&self, round_number: u32) -> Option<&RoundProgressEntry> {
        self.round_progress
            .iter()
            .find(|entry| entry.round_number == round_number)
    }

    pub fn entry_mut(&mut self, round_number: u32) -> Option<&mut RoundProgressEntry> {
        self.round_progress
            .iter_mut()
            .find(|entry| entry.round_number == round_number)
    }

    /// Insert `entry` in round order unless the round is already tracked.
    pub fn ensure_entry(&mut self, entry: RoundProgressEntry) -> bool {
        if self.entry(entry.round_number).is_some() {
            return false;
        }
        let position = self
            .round_progress
            .iter()
            .position(|existing| existing.round_number > entry.round_number)
            .unwrap_or(self.round_progress.len());
        self.round_progress.insert(position, entry);
        true
    }

    /// Entry for `round_number`, created as pending with `name` when missing.
    pub fn entry_or_insert(
        &mut self,
        round_number: u32,
        name: impl FnOnce() -> String,
    ) -> &mut RoundProgressEntry {
        if self.entry(round_number).is_none() {
            self.ensure_entry(RoundProgressEntry::pending(round_number, name()));
        }
        let index = self
            .round_progress
            .iter()
            .position(|entry| entry.round_number == round_number)
            .unwrap_or(0);
        &mut self.round_progress[index]
    }

    pub fn remove_entry(&mut self, round_number: u32) -> bool {
        let before = self.round_progress.len();
        self.round_progress
            .retain(|entry| entry.round_number != round_number);
        before != self.round_progress.len()
    }
}

/// Status of a student's application to a company, owned by the application ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
    Placed,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Placed => "placed",
        }
    }
}

/// Placement fields held on the user profile. Presence means `is_placed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRecord {
    pub company_id: CompanyId,
    pub placed_at: DateTime<Utc>,
}
