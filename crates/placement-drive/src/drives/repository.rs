use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationStatus, CompanyId, Drive, DriveId, PlacementRecord, Progress, Round, RoundId,
    UserId,
};

/// Persistent drive records.
pub trait DriveStore: Send + Sync {
    fn insert_drive(&self, drive: Drive) -> Result<Drive, RepositoryError>;
    fn update_drive(&self, drive: Drive) -> Result<(), RepositoryError>;
    fn fetch_drive(&self, id: &DriveId) -> Result<Option<Drive>, RepositoryError>;
    fn drives_for_company(&self, company_id: &CompanyId) -> Result<Vec<Drive>, RepositoryError>;
    fn delete_drive(&self, id: &DriveId) -> Result<(), RepositoryError>;
}

/// Persistent round records. `(drive_id, round_number)` is unique.
pub trait RoundStore: Send + Sync {
    fn insert_round(&self, round: Round) -> Result<Round, RepositoryError>;
    fn update_round(&self, round: Round) -> Result<(), RepositoryError>;
    fn fetch_round(&self, id: &RoundId) -> Result<Option<Round>, RepositoryError>;
    /// Rounds of a drive ordered by round number.
    fn rounds_for_drive(&self, drive_id: &DriveId) -> Result<Vec<Round>, RepositoryError>;
    fn delete_round(&self, id: &RoundId) -> Result<(), RepositoryError>;
    fn delete_rounds_for_drive(&self, drive_id: &DriveId) -> Result<usize, RepositoryError>;
}

/// Per-student per-drive progress records. `(student_id, drive_id)` is unique.
pub trait ProgressStore: Send + Sync {
    fn insert_progress(&self, progress: Progress) -> Result<Progress, RepositoryError>;
    fn fetch_progress(
        &self,
        drive_id: &DriveId,
        student_id: &UserId,
    ) -> Result<Option<Progress>, RepositoryError>;
    fn progress_for_drive(&self, drive_id: &DriveId) -> Result<Vec<Progress>, RepositoryError>;
    /// Replace the stored record when `progress.version` matches the stored version.
    /// Returns the record with its bumped version, or `Conflict` when stale.
    fn update_progress(&self, progress: Progress) -> Result<Progress, RepositoryError>;
    fn delete_progress_for_drive(&self, drive_id: &DriveId) -> Result<usize, RepositoryError>;
}

/// Everything the engine persists itself.
pub trait PlacementRepository: DriveStore + RoundStore + ProgressStore {}

impl<T> PlacementRepository for T where T: DriveStore + RoundStore + ProgressStore {}

/// Application records owned by the portal's application ledger.
pub trait ApplicationLedger: Send + Sync {
    fn approved_applicants(&self, company_id: &CompanyId) -> Result<Vec<UserId>, RepositoryError>;
    fn application_status(
        &self,
        student_id: &UserId,
        company_id: &CompanyId,
    ) -> Result<Option<ApplicationStatus>, RepositoryError>;
    fn set_application_status(
        &self,
        student_id: &UserId,
        company_id: &CompanyId,
        status: ApplicationStatus,
    ) -> Result<(), RepositoryError>;
}

/// User profiles owned by the portal's user directory.
pub trait UserDirectory: Send + Sync {
    fn counsellors(&self) -> Result<Vec<UserId>, RepositoryError>;
    fn counsellor_of(&self, student_id: &UserId) -> Result<Option<UserId>, RepositoryError>;
    fn placement(&self, student_id: &UserId) -> Result<Option<PlacementRecord>, RepositoryError>;
    fn set_user_placed(
        &self,
        student_id: &UserId,
        company_id: &CompanyId,
        placed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}

/// External records the engine reads and keeps in agreement with progress.
pub trait CampusDirectory: ApplicationLedger + UserDirectory {}

impl<T> CampusDirectory for T where T: ApplicationLedger + UserDirectory {}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists or was modified concurrently")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound notification sink. Delivery is best effort.
pub trait NotificationDispatcher: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    DriveStarted,
    Enrolled,
    Shortlisted,
    Placed,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelatedModel {
    Drive,
}

/// Message handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: UserId,
    pub message: String,
    pub kind: NotificationKind,
    pub related_id: String,
    pub related_model: RelatedModel,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
