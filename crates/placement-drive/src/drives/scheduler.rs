use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use super::domain::{
    default_round_name, Drive, DriveId, EntryStatus, Round, RoundDraft, RoundId, RoundPatch,
    RoundProgressEntry, RoundStatus,
};
use super::error::PlacementError;
use super::progress::modify_progress;
use super::repository::{PlacementRepository, RepositoryError};

static ROUND_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_round_id() -> RoundId {
    let id = ROUND_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RoundId(format!("round-{id:06}"))
}

/// Creates and maintains the ordered rounds of a drive.
pub struct RoundScheduler<R> {
    repository: Arc<R>,
}

impl<R> RoundScheduler<R>
where
    R: PlacementRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Append the next round of a drive.
    ///
    /// Every invariant is checked before anything is written. On success each student still
    /// in the drive receives a pending entry for the new round.
    pub fn create_round(
        &self,
        drive_id: &DriveId,
        draft: RoundDraft,
    ) -> Result<Round, PlacementError> {
        let drive = self.fetch_drive(drive_id)?;
        let number = draft.round_number;

        if number < 1 {
            return Err(PlacementError::validation("round number must be at least 1"));
        }

        let rounds = self.repository.rounds_for_drive(&drive.id)?;
        if rounds.iter().any(|round| round.round_number == number) {
            return Err(PlacementError::validation(format!(
                "round {number} already exists for this drive"
            )));
        }
        if rounds.len() as u32 >= drive.total_rounds {
            return Err(PlacementError::validation(format!(
                "drive already has the maximum of {} rounds",
                drive.total_rounds
            )));
        }
        match rounds.last() {
            None if number != 1 => {
                return Err(PlacementError::validation("first round must be 1"));
            }
            Some(last) if number != last.round_number + 1 => {
                return Err(PlacementError::validation(format!(
                    "round number must be {} (rounds must be sequential)",
                    last.round_number + 1
                )));
            }
            _ => {}
        }

        check_within_drive(&drive, draft.scheduled_date)?;
        if let Some(previous) = rounds.last() {
            check_after_previous(previous, draft.scheduled_date)?;
        }
        check_marks(draft.max_marks, draft.passing_marks)?;

        let round_name = draft
            .round_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| default_round_name(number));

        let round = Round {
            id: next_round_id(),
            drive_id: drive.id.clone(),
            round_number: number,
            round_name,
            round_type: draft.round_type,
            scheduled_date: draft.scheduled_date,
            scheduled_time: draft.scheduled_time,
            max_marks: draft.max_marks,
            passing_marks: draft.passing_marks,
            status: RoundStatus::Scheduled,
            created_by: draft.created_by,
        };
        let round = match self.repository.insert_round(round) {
            Ok(round) => round,
            Err(RepositoryError::Conflict) => {
                return Err(PlacementError::validation(format!(
                    "round {number} already exists for this drive"
                )))
            }
            Err(error) => return Err(error.into()),
        };

        let appended = self.append_entries(&round)?;
        info!(
            drive_id = %drive.id,
            round_id = %round.id,
            round_number = round.round_number,
            scheduled_date = %round.scheduled_date,
            appended,
            "round scheduled"
        );
        Ok(round)
    }

    /// Update round metadata. A changed date must still respect the drive window and the
    /// neighbouring rounds (`previous <= date < next`).
    pub fn update_round(
        &self,
        round_id: &RoundId,
        patch: RoundPatch,
    ) -> Result<Round, PlacementError> {
        let mut round = self.fetch_round(round_id)?;
        let drive = self.fetch_drive(&round.drive_id)?;

        if let Some(date) = patch.scheduled_date {
            check_within_drive(&drive, date)?;
            let siblings = self.repository.rounds_for_drive(&drive.id)?;
            if let Some(previous) = siblings
                .iter()
                .find(|sibling| sibling.round_number + 1 == round.round_number)
            {
                check_after_previous(previous, date)?;
            }
            if let Some(next) = siblings
                .iter()
                .find(|sibling| sibling.round_number == round.round_number + 1)
            {
                if date >= next.scheduled_date {
                    return Err(PlacementError::validation(format!(
                        "scheduled date must be before round {} ({})",
                        next.round_number, next.scheduled_date
                    )));
                }
            }
            round.scheduled_date = date;
        }

        let renamed = patch
            .round_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty() && *name != round.round_name);
        let rescored = patch.max_marks.filter(|max| *max != round.max_marks);

        if let Some(name) = &renamed {
            round.round_name = name.clone();
        }
        if let Some(round_type) = patch.round_type {
            round.round_type = round_type;
        }
        if let Some(time) = patch.scheduled_time {
            round.scheduled_time = Some(time);
        }
        if let Some(max_marks) = patch.max_marks {
            round.max_marks = max_marks;
        }
        if let Some(passing_marks) = patch.passing_marks {
            round.passing_marks = passing_marks;
        }
        check_marks(round.max_marks, round.passing_marks)?;

        self.repository.update_round(round.clone())?;

        if renamed.is_some() || rescored.is_some() {
            self.refresh_pending_entries(&round)?;
        }
        info!(round_id = %round.id, round_number = round.round_number, "round updated");
        Ok(round)
    }

    /// Delete the last round of a drive and strip its entry from every progress record still
    /// in the drive. Rounds with evaluated students are kept. Returns how many progress
    /// records were touched.
    pub fn delete_round(&self, round_id: &RoundId) -> Result<usize, PlacementError> {
        let round = self.fetch_round(round_id)?;
        let rounds = self.repository.rounds_for_drive(&round.drive_id)?;
        if let Some(last) = rounds.last() {
            if last.round_number != round.round_number {
                return Err(PlacementError::validation(format!(
                    "only the last round (round {}) can be deleted",
                    last.round_number
                )));
            }
        }

        let records = self.repository.progress_for_drive(&round.drive_id)?;
        let evaluated = records
            .iter()
            .filter_map(|progress| progress.entry(round.round_number))
            .filter(|entry| entry.evaluated_at.is_some())
            .count();
        if evaluated > 0 {
            return Err(PlacementError::validation(format!(
                "round {} already has {evaluated} evaluated students and cannot be deleted",
                round.round_number
            )));
        }

        self.repository.delete_round(&round.id)?;

        let mut touched = 0;
        for progress in records {
            if progress.is_terminal() {
                continue;
            }
            let student_id = progress.student_id.clone();
            match modify_progress(self.repository.as_ref(), progress, |candidate| {
                candidate.remove_entry(round.round_number).then_some(())
            }) {
                Ok(Some(_)) => touched += 1,
                Ok(None) => {}
                Err(error) => warn!(
                    %error,
                    round_id = %round.id,
                    student_id = %student_id,
                    "failed to remove round entry from progress"
                ),
            }
        }

        info!(
            drive_id = %round.drive_id,
            round_id = %round.id,
            round_number = round.round_number,
            touched,
            "round deleted"
        );
        Ok(touched)
    }

    /// `scheduled -> in_progress`. Progress entries are left alone; evaluation happens
    /// through the selection processor.
    pub fn start_round(&self, round_id: &RoundId) -> Result<Round, PlacementError> {
        let mut round = self.fetch_round(round_id)?;
        if round.status != RoundStatus::Scheduled {
            return Err(PlacementError::validation(format!(
                "round {} is {}, only scheduled rounds can be started",
                round.round_number,
                round.status.label()
            )));
        }
        round.status = RoundStatus::InProgress;
        self.repository.update_round(round.clone())?;

        let mut drive = self.fetch_drive(&round.drive_id)?;
        if drive.current_round != round.round_number {
            drive.current_round = round.round_number;
            self.repository.update_drive(drive)?;
        }

        info!(round_id = %round.id, round_number = round.round_number, "round started");
        Ok(round)
    }

    /// `in_progress -> completed`.
    pub fn complete_round(&self, round_id: &RoundId) -> Result<Round, PlacementError> {
        let mut round = self.fetch_round(round_id)?;
        if round.status != RoundStatus::InProgress {
            return Err(PlacementError::validation(format!(
                "round {} is {}, only rounds in progress can be completed",
                round.round_number,
                round.status.label()
            )));
        }
        round.status = RoundStatus::Completed;
        self.repository.update_round(round.clone())?;
        info!(round_id = %round.id, round_number = round.round_number, "round completed");
        Ok(round)
    }

    fn append_entries(&self, round: &Round) -> Result<usize, PlacementError> {
        let mut appended = 0;
        for progress in self.repository.progress_for_drive(&round.drive_id)? {
            let student_id = progress.student_id.clone();
            match modify_progress(self.repository.as_ref(), progress, |candidate| {
                if candidate.is_terminal() {
                    return None;
                }
                match candidate.entry_mut(round.round_number) {
                    // Seeded placeholder: adopt the scheduled round's name and marks.
                    Some(entry)
                        if entry.status == EntryStatus::Pending
                            && (entry.round_name != round.round_name
                                || entry.max_marks != Some(round.max_marks)) =>
                    {
                        entry.round_name = round.round_name.clone();
                        entry.max_marks = Some(round.max_marks);
                        Some(false)
                    }
                    Some(_) => None,
                    None => Some(candidate.ensure_entry(RoundProgressEntry::for_round(round))),
                }
            }) {
                Ok(Some(modified)) if modified.outcome => appended += 1,
                Ok(_) => {}
                Err(error) => warn!(
                    %error,
                    round_id = %round.id,
                    student_id = %student_id,
                    "failed to append round entry to progress"
                ),
            }
        }
        Ok(appended)
    }

    fn refresh_pending_entries(&self, round: &Round) -> Result<(), PlacementError> {
        for progress in self.repository.progress_for_drive(&round.drive_id)? {
            let student_id = progress.student_id.clone();
            let outcome = modify_progress(self.repository.as_ref(), progress, |candidate| {
                let entry = candidate.entry_mut(round.round_number)?;
                if entry.status != EntryStatus::Pending {
                    return None;
                }
                entry.round_name = round.round_name.clone();
                entry.max_marks = Some(round.max_marks);
                Some(())
            });
            if let Err(error) = outcome {
                warn!(
                    %error,
                    round_id = %round.id,
                    student_id = %student_id,
                    "failed to refresh pending round entry"
                );
            }
        }
        Ok(())
    }

    fn fetch_drive(&self, id: &DriveId) -> Result<Drive, PlacementError> {
        self.repository
            .fetch_drive(id)?
            .ok_or_else(|| PlacementError::not_found(format!("drive {id}")))
    }

    fn fetch_round(&self, id: &RoundId) -> Result<Round, PlacementError> {
        self.repository
            .fetch_round(id)?
            .ok_or_else(|| PlacementError::not_found(format!("round {id}")))
    }
}

fn check_within_drive(drive: &Drive, date: NaiveDate) -> Result<(), PlacementError> {
    if drive.window_contains(date) {
        Ok(())
    } else {
        Err(PlacementError::validation(format!(
            "scheduled date must be within the drive start and end dates ({} to {})",
            drive.start_date, drive.end_date
        )))
    }
}

fn check_after_previous(previous: &Round, date: NaiveDate) -> Result<(), PlacementError> {
    if date < previous.scheduled_date {
        Err(PlacementError::validation(format!(
            "scheduled date must be on or after round {} ({})",
            previous.round_number, previous.scheduled_date
        )))
    } else {
        Ok(())
    }
}

fn check_marks(max_marks: u32, passing_marks: u32) -> Result<(), PlacementError> {
    if passing_marks > max_marks {
        Err(PlacementError::validation(
            "passing marks cannot exceed maximum marks",
        ))
    } else {
        Ok(())
    }
}
