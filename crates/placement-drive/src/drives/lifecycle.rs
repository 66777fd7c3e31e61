use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    default_round_name, ApplicationStatus, CompanyId, Drive, DriveDraft, DriveId, DrivePatch,
    DriveStatus, Progress, Round, RoundProgressEntry, UserId,
};
use super::error::PlacementError;
use super::notify::Notifier;
use super::repository::{
    CampusDirectory, NotificationDispatcher, PlacementRepository, RepositoryError,
};
use crate::config::PlacementConfig;

static DRIVE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_drive_id() -> DriveId {
    let id = DRIVE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    DriveId(format!("drive-{id:06}"))
}

/// Result of creating a drive: the stored drive plus every student seeded into it.
#[derive(Debug, Clone, Serialize)]
pub struct DriveCreated {
    pub drive: Drive,
    pub enrolled: Vec<UserId>,
}

/// Counts of the records removed alongside a drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DriveRemoval {
    pub rounds_removed: usize,
    pub progress_removed: usize,
}

/// Full picture of a drive for administrators.
#[derive(Debug, Clone, Serialize)]
pub struct DriveOverview {
    pub drive: Drive,
    pub rounds: Vec<Round>,
    pub progress: Vec<Progress>,
}

/// Creates, updates and removes drives, and enrolls approved applicants into them.
pub struct DriveLifecycleManager<R, D, N> {
    repository: Arc<R>,
    directory: Arc<D>,
    notifier: Notifier<N>,
    config: PlacementConfig,
}

impl<R, D, N> DriveLifecycleManager<R, D, N>
where
    R: PlacementRepository + 'static,
    D: CampusDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(
        repository: Arc<R>,
        directory: Arc<D>,
        notifier: Notifier<N>,
        config: PlacementConfig,
    ) -> Self {
        Self {
            repository,
            directory,
            notifier,
            config,
        }
    }

    pub fn create_drive(&self, draft: DriveDraft) -> Result<DriveCreated, PlacementError> {
        let title = draft.title.trim().to_string();
        if title.is_empty() {
            return Err(PlacementError::validation("drive title is required"));
        }
        self.validate_window(draft.start_date, draft.end_date, draft.total_rounds)?;

        let applicants = self.directory.approved_applicants(&draft.company_id)?;

        let drive = Drive {
            id: next_drive_id(),
            company_id: draft.company_id,
            title,
            description: draft.description,
            start_date: draft.start_date,
            end_date: draft.end_date,
            status: draft.status.unwrap_or(DriveStatus::Active),
            total_rounds: draft.total_rounds,
            current_round: 0,
            created_by: draft.created_by,
        };
        let drive = self.repository.insert_drive(drive)?;

        let mut enrolled = Vec::with_capacity(applicants.len());
        for student_id in applicants {
            let progress = Progress::seeded(
                student_id.clone(),
                drive.id.clone(),
                RoundProgressEntry::pending(1, default_round_name(1)),
            );
            match self.seed(progress) {
                Ok(true) => enrolled.push(student_id),
                Ok(false) => {}
                Err(error) => warn!(
                    %error,
                    drive_id = %drive.id,
                    student_id = %student_id,
                    "failed to seed progress record"
                ),
            }
        }

        let counsellors = self.directory.counsellors().unwrap_or_else(|error| {
            warn!(%error, drive_id = %drive.id, "unable to list counsellors");
            Vec::new()
        });
        self.notifier.drive_started(&drive, &enrolled, &counsellors);

        info!(
            drive_id = %drive.id,
            company_id = %drive.company_id,
            total_rounds = drive.total_rounds,
            enrolled = enrolled.len(),
            "placement drive created"
        );

        Ok(DriveCreated { drive, enrolled })
    }

    /// Field update. Existing rounds are not re-validated against a changed window.
    pub fn update_drive(&self, id: &DriveId, patch: DrivePatch) -> Result<Drive, PlacementError> {
        let mut drive = self.fetch_drive(id)?;

        if let Some(title) = patch.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(PlacementError::validation("drive title is required"));
            }
            drive.title = title;
        }
        if let Some(description) = patch.description {
            drive.description = description;
        }
        if let Some(start_date) = patch.start_date {
            drive.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            drive.end_date = end_date;
        }
        if let Some(total_rounds) = patch.total_rounds {
            drive.total_rounds = total_rounds;
        }
        if let Some(status) = patch.status {
            drive.status = status;
        }
        self.validate_window(drive.start_date, drive.end_date, drive.total_rounds)?;

        self.repository.update_drive(drive.clone())?;
        info!(drive_id = %drive.id, status = drive.status.label(), "placement drive updated");
        Ok(drive)
    }

    /// Remove the drive together with its rounds and progress records.
    pub fn delete_drive(&self, id: &DriveId) -> Result<DriveRemoval, PlacementError> {
        let drive = self.fetch_drive(id)?;

        let rounds_removed = self.repository.delete_rounds_for_drive(&drive.id)?;
        let progress_removed = self.repository.delete_progress_for_drive(&drive.id)?;
        self.repository.delete_drive(&drive.id)?;

        info!(
            drive_id = %drive.id,
            rounds_removed,
            progress_removed,
            "placement drive deleted"
        );
        Ok(DriveRemoval {
            rounds_removed,
            progress_removed,
        })
    }

    /// Enroll a freshly approved applicant into every recruiting drive of the company.
    pub fn enroll_applicant(
        &self,
        student_id: &UserId,
        company_id: &CompanyId,
    ) -> Result<Vec<DriveId>, PlacementError> {
        match self.directory.application_status(student_id, company_id)? {
            Some(ApplicationStatus::Approved) => {}
            Some(status) => {
                return Err(PlacementError::validation(format!(
                    "application of {student_id} to {company_id} is {}, not approved",
                    status.label()
                )))
            }
            None => {
                return Err(PlacementError::not_found(format!(
                    "application of {student_id} to {company_id}"
                )))
            }
        }

        let mut enrolled = Vec::new();
        for drive in self.repository.drives_for_company(company_id)? {
            if !drive.accepts_enrollment() {
                continue;
            }
            let rounds = self.repository.rounds_for_drive(&drive.id)?;
            let first = rounds
                .iter()
                .find(|round| round.round_number == 1)
                .map(RoundProgressEntry::for_round)
                .unwrap_or_else(|| RoundProgressEntry::pending(1, default_round_name(1)));
            let mut progress = Progress::seeded(student_id.clone(), drive.id.clone(), first);
            for round in &rounds {
                progress.ensure_entry(RoundProgressEntry::for_round(round));
            }

            if self.seed(progress)? {
                info!(drive_id = %drive.id, student_id = %student_id, "late applicant enrolled");
                self.notifier.enrolled(&drive, student_id);
                enrolled.push(drive.id);
            }
        }
        Ok(enrolled)
    }

    pub fn drive_overview(&self, id: &DriveId) -> Result<DriveOverview, PlacementError> {
        let drive = self.fetch_drive(id)?;
        let rounds = self.repository.rounds_for_drive(&drive.id)?;
        let mut progress = self.repository.progress_for_drive(&drive.id)?;
        progress.sort_by(|left, right| left.student_id.cmp(&right.student_id));
        Ok(DriveOverview {
            drive,
            rounds,
            progress,
        })
    }

    fn fetch_drive(&self, id: &DriveId) -> Result<Drive, PlacementError> {
        self.repository
            .fetch_drive(id)?
            .ok_or_else(|| PlacementError::not_found(format!("drive {id}")))
    }

    /// Insert unless the student already has a record for the drive.
    fn seed(&self, progress: Progress) -> Result<bool, RepositoryError> {
        if self
            .repository
            .fetch_progress(&progress.drive_id, &progress.student_id)?
            .is_some()
        {
            return Ok(false);
        }
        match self.repository.insert_progress(progress) {
            Ok(_) => Ok(true),
            Err(RepositoryError::Conflict) => Ok(false),
            Err(error) => Err(error),
        }
    }

    fn validate_window(
        &self,
        start_date: chrono::NaiveDate,
        end_date: chrono::NaiveDate,
        total_rounds: u32,
    ) -> Result<(), PlacementError> {
        if end_date < start_date {
            return Err(PlacementError::validation(
                "end date must be on or after the start date",
            ));
        }
        if total_rounds < 1 {
            return Err(PlacementError::validation("total rounds must be at least 1"));
        }
        if total_rounds > self.config.max_total_rounds {
            return Err(PlacementError::validation(format!(
                "total rounds cannot exceed {}",
                self.config.max_total_rounds
            )));
        }
        Ok(())
    }
}
