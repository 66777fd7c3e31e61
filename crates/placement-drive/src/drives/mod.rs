//! Placement drives: lifecycle, round scheduling and round-by-round selection.

pub mod domain;
mod error;
pub mod lifecycle;
pub mod memory;
mod notify;
mod progress;
pub mod repository;
pub mod router;
pub mod scheduler;
pub mod selection;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    ApplicationStatus, CompanyId, Drive, DriveDraft, DriveId, DrivePatch, DriveStatus,
    EntryStatus, FinalResult, OverallStatus, PlacementRecord, Progress, Round, RoundDraft,
    RoundId, RoundPatch, RoundProgressEntry, RoundStatus, RoundType, UserId,
};
pub use error::PlacementError;
pub use lifecycle::{DriveCreated, DriveOverview, DriveRemoval};
pub use memory::{InMemoryCampusDirectory, InMemoryNotifier, InMemoryPlacementRepository};
pub use notify::LogDispatcher;
pub use repository::{
    ApplicationLedger, CampusDirectory, DriveStore, Notification, NotificationDispatcher,
    NotificationKind, NotifyError, PlacementRepository, ProgressStore, RelatedModel,
    RepositoryError, RoundStore, UserDirectory,
};
pub use router::placement_router;
pub use selection::{Outcome, SelectionRequest, SelectionSummary, StudentDecision};
pub use service::PlacementService;
