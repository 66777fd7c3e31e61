use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::config::PlacementConfig;
use crate::drives::domain::{
    ApplicationStatus, CompanyId, Drive, DriveDraft, DriveId, PlacementRecord, Progress, Round,
    RoundDraft, RoundId, RoundType, UserId,
};
use crate::drives::memory::{
    InMemoryCampusDirectory, InMemoryNotifier, InMemoryPlacementRepository,
};
use crate::drives::repository::{
    ApplicationLedger, DriveStore, Notification, NotificationDispatcher, NotifyError,
    ProgressStore, RepositoryError, RoundStore, UserDirectory,
};
use crate::drives::service::PlacementService;

pub(super) const COMPANY: &str = "acme";

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn drive_start() -> NaiveDate {
    date(2025, 1, 10)
}

pub(super) fn drive_end() -> NaiveDate {
    date(2025, 1, 31)
}

pub(super) fn user(id: &str) -> UserId {
    UserId::new(id)
}

pub(super) fn users(ids: &[&str]) -> Vec<UserId> {
    ids.iter().map(|id| UserId::new(*id)).collect()
}

/// stu-1..3 approved at acme, stu-4 pending at acme, stu-5 approved elsewhere.
pub(super) fn directory() -> InMemoryCampusDirectory {
    InMemoryCampusDirectory::default()
        .with_application("stu-1", COMPANY, ApplicationStatus::Approved)
        .with_application("stu-2", COMPANY, ApplicationStatus::Approved)
        .with_application("stu-3", COMPANY, ApplicationStatus::Approved)
        .with_application("stu-4", COMPANY, ApplicationStatus::Pending)
        .with_application("stu-5", "globex", ApplicationStatus::Approved)
        .with_counsellor("coun-1", &["stu-1", "stu-2"])
        .with_counsellor("coun-2", &["stu-3", "stu-4"])
}

pub(super) fn drive_draft(total_rounds: u32) -> DriveDraft {
    DriveDraft {
        company_id: CompanyId::new(COMPANY),
        title: "Acme Graduate Drive".to_string(),
        description: "Campus hiring for graduate engineers".to_string(),
        start_date: drive_start(),
        end_date: drive_end(),
        total_rounds,
        status: None,
        created_by: user("admin-1"),
    }
}

pub(super) fn round_draft(round_number: u32, scheduled_date: NaiveDate) -> RoundDraft {
    RoundDraft {
        round_number,
        round_name: None,
        round_type: RoundType::Technical,
        scheduled_date,
        scheduled_time: Some("10:00".to_string()),
        max_marks: 100,
        passing_marks: 40,
        created_by: user("admin-1"),
    }
}

pub(super) type MemoryService<D = InMemoryCampusDirectory> =
    PlacementService<InMemoryPlacementRepository, D, InMemoryNotifier>;

pub(super) struct Harness<D = InMemoryCampusDirectory> {
    pub(super) service: Arc<MemoryService<D>>,
    pub(super) repository: Arc<InMemoryPlacementRepository>,
    pub(super) directory: Arc<D>,
    pub(super) notifier: Arc<InMemoryNotifier>,
}

pub(super) fn harness() -> Harness {
    harness_with(directory(), PlacementConfig::default())
}

pub(super) fn harness_with<D>(directory: D, config: PlacementConfig) -> Harness<D>
where
    D: ApplicationLedger + UserDirectory + 'static,
{
    let repository = Arc::new(InMemoryPlacementRepository::default());
    let directory = Arc::new(directory);
    let notifier = Arc::new(InMemoryNotifier::default());
    let service = Arc::new(PlacementService::new(
        repository.clone(),
        directory.clone(),
        notifier.clone(),
        config,
    ));
    Harness {
        service,
        repository,
        directory,
        notifier,
    }
}

impl<D> Harness<D>
where
    D: ApplicationLedger + UserDirectory + 'static,
{
    pub(super) fn create_drive(&self, total_rounds: u32) -> Drive {
        self.service
            .create_drive(drive_draft(total_rounds))
            .expect("drive created")
            .drive
    }

    pub(super) fn create_round(&self, drive: &Drive, number: u32, on: NaiveDate) -> Round {
        self.service
            .create_round(&drive.id, round_draft(number, on))
            .expect("round created")
    }

    /// Drive with `total_rounds` rounds scheduled two days apart from the start date.
    pub(super) fn drive_with_rounds(&self, total_rounds: u32) -> (Drive, Vec<Round>) {
        let drive = self.create_drive(total_rounds);
        let rounds = (1..=total_rounds)
            .map(|number| {
                let on = drive_start() + chrono::Duration::days(2 * number as i64 - 1);
                self.create_round(&drive, number, on)
            })
            .collect();
        (drive, rounds)
    }

    pub(super) fn progress(&self, drive_id: &DriveId, student: &str) -> Progress {
        self.repository
            .fetch_progress(drive_id, &user(student))
            .expect("fetch progress")
            .expect("progress present")
    }

    pub(super) fn rounds(&self, drive_id: &DriveId) -> Vec<Round> {
        self.repository
            .rounds_for_drive(drive_id)
            .expect("rounds listed")
    }

    pub(super) fn drive(&self, drive_id: &DriveId) -> Option<Drive> {
        self.repository.fetch_drive(drive_id).expect("fetch drive")
    }
}

/// Directory whose user placement writes can be switched to fail.
pub(super) struct FlakyDirectory {
    pub(super) inner: InMemoryCampusDirectory,
    pub(super) fail_placement: AtomicBool,
}

impl FlakyDirectory {
    pub(super) fn new(inner: InMemoryCampusDirectory) -> Self {
        Self {
            inner,
            fail_placement: AtomicBool::new(false),
        }
    }

    pub(super) fn fail_placements(&self) {
        self.fail_placement.store(true, Ordering::SeqCst);
    }
}

impl ApplicationLedger for FlakyDirectory {
    fn approved_applicants(&self, company_id: &CompanyId) -> Result<Vec<UserId>, RepositoryError> {
        self.inner.approved_applicants(company_id)
    }

    fn application_status(
        &self,
        student_id: &UserId,
        company_id: &CompanyId,
    ) -> Result<Option<ApplicationStatus>, RepositoryError> {
        self.inner.application_status(student_id, company_id)
    }

    fn set_application_status(
        &self,
        student_id: &UserId,
        company_id: &CompanyId,
        status: ApplicationStatus,
    ) -> Result<(), RepositoryError> {
        self.inner
            .set_application_status(student_id, company_id, status)
    }
}

impl UserDirectory for FlakyDirectory {
    fn counsellors(&self) -> Result<Vec<UserId>, RepositoryError> {
        self.inner.counsellors()
    }

    fn counsellor_of(&self, student_id: &UserId) -> Result<Option<UserId>, RepositoryError> {
        self.inner.counsellor_of(student_id)
    }

    fn placement(&self, student_id: &UserId) -> Result<Option<PlacementRecord>, RepositoryError> {
        self.inner.placement(student_id)
    }

    fn set_user_placed(
        &self,
        student_id: &UserId,
        company_id: &CompanyId,
        placed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        if self.fail_placement.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("user directory offline".to_string()));
        }
        self.inner.set_user_placed(student_id, company_id, placed_at)
    }
}

/// Ledger that refuses status writes after another writer has renamed the student's
/// pending round 2 entry, so the progress record moves on underneath the caller.
pub(super) struct ContendedLedger {
    pub(super) inner: InMemoryCampusDirectory,
    contender: Mutex<Option<(Arc<InMemoryPlacementRepository>, DriveId)>>,
}

impl ContendedLedger {
    pub(super) fn new(inner: InMemoryCampusDirectory) -> Self {
        Self {
            inner,
            contender: Mutex::new(None),
        }
    }

    pub(super) fn contend_on(
        &self,
        repository: Arc<InMemoryPlacementRepository>,
        drive_id: DriveId,
    ) {
        *self.contender.lock().expect("contender lock") = Some((repository, drive_id));
    }
}

impl ApplicationLedger for ContendedLedger {
    fn approved_applicants(&self, company_id: &CompanyId) -> Result<Vec<UserId>, RepositoryError> {
        self.inner.approved_applicants(company_id)
    }

    fn application_status(
        &self,
        student_id: &UserId,
        company_id: &CompanyId,
    ) -> Result<Option<ApplicationStatus>, RepositoryError> {
        self.inner.application_status(student_id, company_id)
    }

    fn set_application_status(
        &self,
        student_id: &UserId,
        _company_id: &CompanyId,
        _status: ApplicationStatus,
    ) -> Result<(), RepositoryError> {
        let contender = self.contender.lock().expect("contender lock");
        if let Some((repository, drive_id)) = contender.as_ref() {
            let mut progress = repository
                .fetch_progress(drive_id, student_id)?
                .ok_or(RepositoryError::NotFound)?;
            if let Some(entry) = progress.entry_mut(2) {
                entry.round_name = "Panel Interview".to_string();
            }
            repository.update_progress(progress)?;
        }
        Err(RepositoryError::Unavailable("application ledger offline".to_string()))
    }
}

impl UserDirectory for ContendedLedger {
    fn counsellors(&self) -> Result<Vec<UserId>, RepositoryError> {
        self.inner.counsellors()
    }

    fn counsellor_of(&self, student_id: &UserId) -> Result<Option<UserId>, RepositoryError> {
        self.inner.counsellor_of(student_id)
    }

    fn placement(&self, student_id: &UserId) -> Result<Option<PlacementRecord>, RepositoryError> {
        self.inner.placement(student_id)
    }

    fn set_user_placed(
        &self,
        student_id: &UserId,
        company_id: &CompanyId,
        placed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.inner.set_user_placed(student_id, company_id, placed_at)
    }
}

pub(super) struct FailingNotifier;

impl NotificationDispatcher for FailingNotifier {
    fn notify(&self, _notification: Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp relay down".to_string()))
    }
}

pub(super) struct UnavailableRepository;

impl DriveStore for UnavailableRepository {
    fn insert_drive(&self, _drive: Drive) -> Result<Drive, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_drive(&self, _drive: Drive) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_drive(&self, _id: &DriveId) -> Result<Option<Drive>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn drives_for_company(&self, _company_id: &CompanyId) -> Result<Vec<Drive>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete_drive(&self, _id: &DriveId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl RoundStore for UnavailableRepository {
    fn insert_round(&self, _round: Round) -> Result<Round, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_round(&self, _round: Round) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_round(&self, _id: &RoundId) -> Result<Option<Round>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn rounds_for_drive(&self, _drive_id: &DriveId) -> Result<Vec<Round>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete_round(&self, _id: &RoundId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete_rounds_for_drive(&self, _drive_id: &DriveId) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl ProgressStore for UnavailableRepository {
    fn insert_progress(&self, _progress: Progress) -> Result<Progress, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_progress(
        &self,
        _drive_id: &DriveId,
        _student_id: &UserId,
    ) -> Result<Option<Progress>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn progress_for_drive(&self, _drive_id: &DriveId) -> Result<Vec<Progress>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_progress(&self, _progress: Progress) -> Result<Progress, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete_progress_for_drive(&self, _drive_id: &DriveId) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
