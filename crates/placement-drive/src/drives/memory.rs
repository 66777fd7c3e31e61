//! Mutex-backed stores used by the service binary, the demo and tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::domain::{
    ApplicationStatus, CompanyId, Drive, DriveId, PlacementRecord, Progress, Round, RoundId,
    UserId,
};
use super::repository::{
    ApplicationLedger, DriveStore, Notification, NotificationDispatcher, NotifyError,
    ProgressStore, RepositoryError, RoundStore, UserDirectory,
};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
}

#[derive(Default)]
struct PlacementTables {
    drives: BTreeMap<DriveId, Drive>,
    rounds: BTreeMap<RoundId, Round>,
    progress: BTreeMap<(DriveId, UserId), Progress>,
}

/// Drive, round and progress tables behind one lock.
#[derive(Default, Clone)]
pub struct InMemoryPlacementRepository {
    tables: Arc<Mutex<PlacementTables>>,
}

impl DriveStore for InMemoryPlacementRepository {
    fn insert_drive(&self, drive: Drive) -> Result<Drive, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        if tables.drives.contains_key(&drive.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.drives.insert(drive.id.clone(), drive.clone());
        Ok(drive)
    }

    fn update_drive(&self, drive: Drive) -> Result<(), RepositoryError> {
        let mut tables = lock(&self.tables)?;
        match tables.drives.get_mut(&drive.id) {
            Some(stored) => {
                *stored = drive;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_drive(&self, id: &DriveId) -> Result<Option<Drive>, RepositoryError> {
        Ok(lock(&self.tables)?.drives.get(id).cloned())
    }

    fn drives_for_company(&self, company_id: &CompanyId) -> Result<Vec<Drive>, RepositoryError> {
        Ok(lock(&self.tables)?
            .drives
            .values()
            .filter(|drive| &drive.company_id == company_id)
            .cloned()
            .collect())
    }

    fn delete_drive(&self, id: &DriveId) -> Result<(), RepositoryError> {
        lock(&self.tables)?
            .drives
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

impl RoundStore for InMemoryPlacementRepository {
    fn insert_round(&self, round: Round) -> Result<Round, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let duplicate = tables.rounds.values().any(|existing| {
            existing.id == round.id
                || (existing.drive_id == round.drive_id
                    && existing.round_number == round.round_number)
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        tables.rounds.insert(round.id.clone(), round.clone());
        Ok(round)
    }

    fn update_round(&self, round: Round) -> Result<(), RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let clash = tables.rounds.values().any(|existing| {
            existing.id != round.id
                && existing.drive_id == round.drive_id
                && existing.round_number == round.round_number
        });
        if clash {
            return Err(RepositoryError::Conflict);
        }
        match tables.rounds.get_mut(&round.id) {
            Some(stored) => {
                *stored = round;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_round(&self, id: &RoundId) -> Result<Option<Round>, RepositoryError> {
        Ok(lock(&self.tables)?.rounds.get(id).cloned())
    }

    fn rounds_for_drive(&self, drive_id: &DriveId) -> Result<Vec<Round>, RepositoryError> {
        let mut rounds: Vec<Round> = lock(&self.tables)?
            .rounds
            .values()
            .filter(|round| &round.drive_id == drive_id)
            .cloned()
            .collect();
        rounds.sort_by_key(|round| round.round_number);
        Ok(rounds)
    }

    fn delete_round(&self, id: &RoundId) -> Result<(), RepositoryError> {
        lock(&self.tables)?
            .rounds
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    fn delete_rounds_for_drive(&self, drive_id: &DriveId) -> Result<usize, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let before = tables.rounds.len();
        tables.rounds.retain(|_, round| &round.drive_id != drive_id);
        Ok(before - tables.rounds.len())
    }
}

impl ProgressStore for InMemoryPlacementRepository {
    fn insert_progress(&self, progress: Progress) -> Result<Progress, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let key = (progress.drive_id.clone(), progress.student_id.clone());
        if tables.progress.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        tables.progress.insert(key, progress.clone());
        Ok(progress)
    }

    fn fetch_progress(
        &self,
        drive_id: &DriveId,
        student_id: &UserId,
    ) -> Result<Option<Progress>, RepositoryError> {
        let key = (drive_id.clone(), student_id.clone());
        Ok(lock(&self.tables)?.progress.get(&key).cloned())
    }

    fn progress_for_drive(&self, drive_id: &DriveId) -> Result<Vec<Progress>, RepositoryError> {
        Ok(lock(&self.tables)?
            .progress
            .values()
            .filter(|progress| &progress.drive_id == drive_id)
            .cloned()
            .collect())
    }

    fn update_progress(&self, mut progress: Progress) -> Result<Progress, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let key = (progress.drive_id.clone(), progress.student_id.clone());
        let stored = tables
            .progress
            .get_mut(&key)
            .ok_or(RepositoryError::NotFound)?;
        if stored.version != progress.version {
            return Err(RepositoryError::Conflict);
        }
        progress.version += 1;
        *stored = progress.clone();
        Ok(progress)
    }

    fn delete_progress_for_drive(&self, drive_id: &DriveId) -> Result<usize, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let before = tables.progress.len();
        tables
            .progress
            .retain(|(progress_drive, _), _| progress_drive != drive_id);
        Ok(before - tables.progress.len())
    }
}

#[derive(Default)]
struct DirectoryTables {
    applications: BTreeMap<(UserId, CompanyId), ApplicationStatus>,
    counsellors: BTreeSet<UserId>,
    assignments: BTreeMap<UserId, UserId>,
    placements: BTreeMap<UserId, PlacementRecord>,
}

/// Application ledger and user directory kept side by side.
#[derive(Default, Clone)]
pub struct InMemoryCampusDirectory {
    tables: Arc<Mutex<DirectoryTables>>,
}

impl InMemoryCampusDirectory {
    /// Record (or overwrite) an application. Returns `self` for fixture chaining.
    pub fn with_application(
        self,
        student_id: &str,
        company_id: &str,
        status: ApplicationStatus,
    ) -> Self {
        if let Ok(mut tables) = lock(&self.tables) {
            tables
                .applications
                .insert((UserId::new(student_id), CompanyId::new(company_id)), status);
        }
        self
    }

    /// Register a counsellor responsible for `students`.
    pub fn with_counsellor(self, counsellor_id: &str, students: &[&str]) -> Self {
        if let Ok(mut tables) = lock(&self.tables) {
            let counsellor = UserId::new(counsellor_id);
            tables.counsellors.insert(counsellor.clone());
            for student in students {
                tables
                    .assignments
                    .insert(UserId::new(*student), counsellor.clone());
            }
        }
        self
    }

    pub fn applications(&self) -> Vec<(UserId, CompanyId, ApplicationStatus)> {
        lock(&self.tables)
            .map(|tables| {
                tables
                    .applications
                    .iter()
                    .map(|((student, company), status)| (student.clone(), company.clone(), *status))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl ApplicationLedger for InMemoryCampusDirectory {
    fn approved_applicants(&self, company_id: &CompanyId) -> Result<Vec<UserId>, RepositoryError> {
        Ok(lock(&self.tables)?
            .applications
            .iter()
            .filter(|((_, company), status)| {
                company == company_id && **status == ApplicationStatus::Approved
            })
            .map(|((student, _), _)| student.clone())
            .collect())
    }

    fn application_status(
        &self,
        student_id: &UserId,
        company_id: &CompanyId,
    ) -> Result<Option<ApplicationStatus>, RepositoryError> {
        let key = (student_id.clone(), company_id.clone());
        Ok(lock(&self.tables)?.applications.get(&key).copied())
    }

    fn set_application_status(
        &self,
        student_id: &UserId,
        company_id: &CompanyId,
        status: ApplicationStatus,
    ) -> Result<(), RepositoryError> {
        let key = (student_id.clone(), company_id.clone());
        let mut tables = lock(&self.tables)?;
        let stored = tables
            .applications
            .get_mut(&key)
            .ok_or(RepositoryError::NotFound)?;
        *stored = status;
        Ok(())
    }
}

impl UserDirectory for InMemoryCampusDirectory {
    fn counsellors(&self) -> Result<Vec<UserId>, RepositoryError> {
        Ok(lock(&self.tables)?.counsellors.iter().cloned().collect())
    }

    fn counsellor_of(&self, student_id: &UserId) -> Result<Option<UserId>, RepositoryError> {
        Ok(lock(&self.tables)?.assignments.get(student_id).cloned())
    }

    fn placement(&self, student_id: &UserId) -> Result<Option<PlacementRecord>, RepositoryError> {
        Ok(lock(&self.tables)?.placements.get(student_id).cloned())
    }

    fn set_user_placed(
        &self,
        student_id: &UserId,
        company_id: &CompanyId,
        placed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        lock(&self.tables)?.placements.insert(
            student_id.clone(),
            PlacementRecord {
                company_id: company_id.clone(),
                placed_at,
            },
        );
        Ok(())
    }
}

/// Dispatcher that keeps every notification for inspection.
#[derive(Default, Clone)]
pub struct InMemoryNotifier {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotifier {
    pub fn events(&self) -> Vec<Notification> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn events_for(&self, recipient: &str) -> Vec<Notification> {
        self.events()
            .into_iter()
            .filter(|event| event.recipient.as_str() == recipient)
            .collect()
    }
}

impl NotificationDispatcher for InMemoryNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.events
            .lock()
            .map_err(|_| NotifyError::Transport("notifier mutex poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}
