use std::sync::Arc;

use super::domain::{
    CompanyId, Drive, DriveDraft, DriveId, DrivePatch, Progress, Round, RoundDraft, RoundId,
    RoundPatch, UserId,
};
use super::error::PlacementError;
use super::lifecycle::{DriveCreated, DriveLifecycleManager, DriveOverview, DriveRemoval};
use super::notify::Notifier;
use super::repository::{CampusDirectory, NotificationDispatcher, PlacementRepository};
use super::scheduler::RoundScheduler;
use super::selection::{SelectionProcessor, SelectionRequest, SelectionSummary};
use crate::config::PlacementConfig;

/// Service composing the drive lifecycle, round scheduling and selection components.
pub struct PlacementService<R, D, N> {
    repository: Arc<R>,
    lifecycle: DriveLifecycleManager<R, D, N>,
    scheduler: RoundScheduler<R>,
    selection: SelectionProcessor<R, D, N>,
}

impl<R, D, N> PlacementService<R, D, N>
where
    R: PlacementRepository + 'static,
    D: CampusDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(
        repository: Arc<R>,
        directory: Arc<D>,
        dispatcher: Arc<N>,
        config: PlacementConfig,
    ) -> Self {
        let notifier = Notifier::new(dispatcher, config.notify_counsellors);
        let lifecycle = DriveLifecycleManager::new(
            repository.clone(),
            directory.clone(),
            notifier.clone(),
            config,
        );
        let scheduler = RoundScheduler::new(repository.clone());
        let selection = SelectionProcessor::new(repository.clone(), directory, notifier);

        Self {
            repository,
            lifecycle,
            scheduler,
            selection,
        }
    }

    pub fn create_drive(&self, draft: DriveDraft) -> Result<DriveCreated, PlacementError> {
        self.lifecycle.create_drive(draft)
    }

    pub fn update_drive(&self, id: &DriveId, patch: DrivePatch) -> Result<Drive, PlacementError> {
        self.lifecycle.update_drive(id, patch)
    }

    pub fn delete_drive(&self, id: &DriveId) -> Result<DriveRemoval, PlacementError> {
        let removal = self.lifecycle.delete_drive(id)?;
        self.selection.release_drive(id);
        Ok(removal)
    }

    pub fn drive_overview(&self, id: &DriveId) -> Result<DriveOverview, PlacementError> {
        self.lifecycle.drive_overview(id)
    }

    /// Hook for the application ledger once a counsellor approves an application.
    pub fn enroll_applicant(
        &self,
        student_id: &UserId,
        company_id: &CompanyId,
    ) -> Result<Vec<DriveId>, PlacementError> {
        self.lifecycle.enroll_applicant(student_id, company_id)
    }

    pub fn create_round(
        &self,
        drive_id: &DriveId,
        draft: RoundDraft,
    ) -> Result<Round, PlacementError> {
        self.scheduler.create_round(drive_id, draft)
    }

    pub fn update_round(
        &self,
        round_id: &RoundId,
        patch: RoundPatch,
    ) -> Result<Round, PlacementError> {
        self.scheduler.update_round(round_id, patch)
    }

    pub fn delete_round(&self, round_id: &RoundId) -> Result<usize, PlacementError> {
        self.scheduler.delete_round(round_id)
    }

    pub fn start_round(&self, round_id: &RoundId) -> Result<Round, PlacementError> {
        self.scheduler.start_round(round_id)
    }

    pub fn complete_round(&self, round_id: &RoundId) -> Result<Round, PlacementError> {
        self.scheduler.complete_round(round_id)
    }

    pub fn shortlist(
        &self,
        drive_id: &DriveId,
        round_number: u32,
        student_ids: Vec<UserId>,
    ) -> Result<SelectionSummary, PlacementError> {
        self.selection.shortlist(drive_id, round_number, student_ids)
    }

    pub fn reject(
        &self,
        drive_id: &DriveId,
        round_number: u32,
        student_ids: Vec<UserId>,
    ) -> Result<SelectionSummary, PlacementError> {
        self.selection.reject(drive_id, round_number, student_ids)
    }

    pub fn evaluate(&self, request: SelectionRequest) -> Result<SelectionSummary, PlacementError> {
        self.selection.evaluate(request)
    }

    /// A single student's record for a drive.
    pub fn progress(
        &self,
        drive_id: &DriveId,
        student_id: &UserId,
    ) -> Result<Progress, PlacementError> {
        self.repository
            .fetch_progress(drive_id, student_id)?
            .ok_or_else(|| {
                PlacementError::not_found(format!("progress of {student_id} in drive {drive_id}"))
            })
    }
}
