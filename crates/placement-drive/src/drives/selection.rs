//! Round evaluation: the state machine that moves students through a drive.
//!
//! A batch names students of one round together with an [`Outcome`] each. Students are
//! settled one at a time; a failure for one student is logged and reported in the
//! [`SelectionSummary`] without aborting the rest of the batch. Batches against the same
//! round are serialized, and every progress write is version checked.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::domain::{
    default_round_name, ApplicationStatus, Drive, DriveId, EntryStatus, FinalResult,
    OverallStatus, Progress, Round, RoundProgressEntry, UserId,
};
use super::error::PlacementError;
use super::notify::Notifier;
use super::progress::{modify_progress, Modified};
use super::repository::{
    CampusDirectory, NotificationDispatcher, PlacementRepository, RepositoryError,
};

/// Decision taken for one student in a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Passed the round: advance, or place when the round is the drive's last.
    Advance,
    Reject,
    /// No decision yet. Marks and feedback are still recorded.
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentDecision {
    pub student_id: UserId,
    pub outcome: Outcome,
    #[serde(default)]
    pub marks_obtained: Option<f32>,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl StudentDecision {
    pub fn new(student_id: UserId, outcome: Outcome) -> Self {
        Self {
            student_id,
            outcome,
            marks_obtained: None,
            feedback: None,
        }
    }

    pub fn with_marks(mut self, marks: f32) -> Self {
        self.marks_obtained = Some(marks);
        self
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionRequest {
    pub drive_id: DriveId,
    pub round_number: u32,
    pub decisions: Vec<StudentDecision>,
}

/// Per-student result of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionSummary {
    pub advanced: Vec<UserId>,
    pub placed: Vec<UserId>,
    pub rejected: Vec<UserId>,
    pub deferred: Vec<UserId>,
    /// Named students not awaiting this round, or already out of the drive.
    pub skipped: Vec<UserId>,
    pub failed: Vec<UserId>,
}

impl SelectionSummary {
    fn record(&mut self, student_id: UserId, transition: Transition) {
        let bucket = match transition {
            Transition::Advanced => &mut self.advanced,
            Transition::Placed => &mut self.placed,
            Transition::Rejected => &mut self.rejected,
            Transition::Deferred => &mut self.deferred,
            Transition::Unchanged => &mut self.skipped,
        };
        bucket.push(student_id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Advanced,
    Placed,
    Rejected,
    Deferred,
    Unchanged,
}

type RoundKey = (DriveId, u32);

pub struct SelectionProcessor<R, D, N> {
    repository: Arc<R>,
    directory: Arc<D>,
    notifier: Notifier<N>,
    round_locks: Mutex<HashMap<RoundKey, Arc<Mutex<()>>>>,
}

impl<R, D, N> SelectionProcessor<R, D, N>
where
    R: PlacementRepository + 'static,
    D: CampusDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(repository: Arc<R>, directory: Arc<D>, notifier: Notifier<N>) -> Self {
        Self {
            repository,
            directory,
            notifier,
            round_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Shortlist the named students of `round_number`.
    pub fn shortlist(
        &self,
        drive_id: &DriveId,
        round_number: u32,
        student_ids: Vec<UserId>,
    ) -> Result<SelectionSummary, PlacementError> {
        self.evaluate(batch(drive_id, round_number, student_ids, Outcome::Advance))
    }

    /// Reject the named students of `round_number`. Students not named are left untouched.
    pub fn reject(
        &self,
        drive_id: &DriveId,
        round_number: u32,
        student_ids: Vec<UserId>,
    ) -> Result<SelectionSummary, PlacementError> {
        self.evaluate(batch(drive_id, round_number, student_ids, Outcome::Reject))
    }

    pub fn evaluate(&self, request: SelectionRequest) -> Result<SelectionSummary, PlacementError> {
        validate_request(&request)?;
        let number = request.round_number;

        let drive = self
            .repository
            .fetch_drive(&request.drive_id)?
            .ok_or_else(|| PlacementError::not_found(format!("drive {}", request.drive_id)))?;

        let rounds = self.repository.rounds_for_drive(&drive.id)?;
        let round = rounds.iter().find(|round| round.round_number == number);
        let next_round = rounds.iter().find(|round| round.round_number == number + 1);
        if let Some(round) = round {
            for decision in &request.decisions {
                if let Some(marks) = decision.marks_obtained {
                    if marks > round.max_marks as f32 {
                        return Err(PlacementError::validation(format!(
                            "marks for {} exceed the round maximum of {}",
                            decision.student_id, round.max_marks
                        )));
                    }
                }
            }
        }

        let lock = self.round_lock(&drive.id, number);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let in_round: HashMap<UserId, Progress> = self
            .repository
            .progress_for_drive(&drive.id)?
            .into_iter()
            .filter(|progress| progress.current_round == number)
            .map(|progress| (progress.student_id.clone(), progress))
            .collect();
        if in_round.is_empty() {
            return Err(PlacementError::not_found(format!(
                "students in round {number} of drive {}",
                drive.id
            )));
        }

        let now = Utc::now();
        let context = RoundContext {
            drive: &drive,
            number,
            round,
            next_round,
            now,
        };
        let mut summary = SelectionSummary::default();

        for decision in &request.decisions {
            let student_id = decision.student_id.clone();
            let progress = match in_round.get(&student_id) {
                Some(progress) if !progress.is_terminal() => progress.clone(),
                Some(progress) => {
                    info!(
                        drive_id = %drive.id,
                        round_number = number,
                        student_id = %student_id,
                        overall_status = progress.overall_status.label(),
                        "student already out of the drive, skipping"
                    );
                    summary.skipped.push(student_id);
                    continue;
                }
                None => {
                    info!(
                        drive_id = %drive.id,
                        round_number = number,
                        student_id = %student_id,
                        "student not awaiting this round, skipping"
                    );
                    summary.skipped.push(student_id);
                    continue;
                }
            };

            match self.settle_student(&context, progress, decision) {
                Ok(transition) => summary.record(student_id, transition),
                Err(error) => {
                    warn!(
                        %error,
                        drive_id = %drive.id,
                        round_number = number,
                        student_id = %student_id,
                        "failed to settle student, continuing with batch"
                    );
                    summary.failed.push(student_id);
                }
            }
        }

        info!(
            drive_id = %drive.id,
            round_number = number,
            advanced = summary.advanced.len(),
            placed = summary.placed.len(),
            rejected = summary.rejected.len(),
            deferred = summary.deferred.len(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            "round evaluated"
        );
        Ok(summary)
    }

    /// Drop the lock entries of a deleted drive.
    pub fn release_drive(&self, drive_id: &DriveId) {
        let mut locks = self
            .round_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.retain(|(locked_drive, _), _| locked_drive != drive_id);
    }

    fn round_lock(&self, drive_id: &DriveId, round_number: u32) -> Arc<Mutex<()>> {
        let mut locks = self
            .round_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            locks
                .entry((drive_id.clone(), round_number))
                .or_default(),
        )
    }

    /// Progress first, then the application ledger and user directory. A failed ledger
    /// write undoes the writes made before it.
    fn settle_student(
        &self,
        context: &RoundContext<'_>,
        progress: Progress,
        decision: &StudentDecision,
    ) -> Result<Transition, PlacementError> {
        let modified = modify_progress(self.repository.as_ref(), progress, |candidate| {
            apply_decision(candidate, context, decision)
        })?;
        let Some(modified) = modified else {
            return Ok(Transition::Unchanged);
        };

        let drive = context.drive;
        let student_id = modified.after.student_id.clone();
        match modified.outcome {
            Transition::Placed => {
                self.settle_ledger(context, &modified, ApplicationStatus::Placed, Some(context.now))?;
                info!(drive_id = %drive.id, student_id = %student_id, "student placed");
                let counsellor = self.counsellor_of(&student_id);
                self.notifier.placed(drive, &student_id, counsellor.as_ref());
            }
            Transition::Rejected => {
                self.settle_ledger(context, &modified, ApplicationStatus::Rejected, None)?;
                info!(
                    drive_id = %drive.id,
                    round_number = context.number,
                    student_id = %student_id,
                    "student rejected"
                );
                let counsellor = self.counsellor_of(&student_id);
                self.notifier
                    .rejected(drive, &student_id, context.number, counsellor.as_ref());
            }
            Transition::Advanced => {
                info!(
                    drive_id = %drive.id,
                    round_number = context.number,
                    student_id = %student_id,
                    next_round = modified.after.current_round,
                    "student shortlisted"
                );
                self.notifier.shortlisted(drive, &student_id, context.number);
            }
            Transition::Deferred | Transition::Unchanged => {}
        }
        Ok(modified.outcome)
    }

    fn settle_ledger(
        &self,
        context: &RoundContext<'_>,
        modified: &Modified<Transition>,
        status: ApplicationStatus,
        placed_at: Option<DateTime<Utc>>,
    ) -> Result<(), PlacementError> {
        let student_id = &modified.after.student_id;
        let company_id = &context.drive.company_id;

        let prior = match self.directory.application_status(student_id, company_id) {
            Ok(prior) => prior,
            Err(error) => {
                self.restore_progress(modified, context.number);
                return Err(error.into());
            }
        };
        match prior {
            Some(_) => {
                if let Err(error) =
                    self.directory
                        .set_application_status(student_id, company_id, status)
                {
                    self.restore_progress(modified, context.number);
                    return Err(error.into());
                }
            }
            None => warn!(
                student_id = %student_id,
                company_id = %company_id,
                "no application on record for student, only progress updated"
            ),
        }

        let Some(placed_at) = placed_at else {
            return Ok(());
        };
        let placed = match self.directory.placement(student_id) {
            Ok(Some(existing)) => {
                info!(
                    student_id = %student_id,
                    placed_with = %existing.company_id,
                    "student already placed, keeping the earlier placement"
                );
                Ok(())
            }
            Ok(None) => self
                .directory
                .set_user_placed(student_id, company_id, placed_at),
            Err(error) => Err(error),
        };
        if let Err(error) = placed {
            if let Some(prior) = prior {
                if let Err(revert) =
                    self.directory
                        .set_application_status(student_id, company_id, prior)
                {
                    error!(
                        error = %revert,
                        student_id = %student_id,
                        company_id = %company_id,
                        "failed to restore application status"
                    );
                }
            }
            self.restore_progress(modified, context.number);
            return Err(error.into());
        }
        Ok(())
    }

    /// Undo a committed decision on the latest stored copy of the record. Writes that
    /// landed after the decision, such as refreshed pending entries, are kept.
    fn restore_progress(&self, modified: &Modified<Transition>, round_number: u32) {
        let before = &modified.before;
        let restored = self
            .repository
            .fetch_progress(&before.drive_id, &before.student_id)
            .and_then(|current| current.ok_or(RepositoryError::NotFound))
            .and_then(|current| {
                modify_progress(self.repository.as_ref(), current, |candidate| {
                    revert_decision(candidate, before, round_number);
                    Some(())
                })
            });
        match restored {
            Ok(_) => warn!(
                student_id = %before.student_id,
                drive_id = %before.drive_id,
                "progress restored after failed ledger write"
            ),
            Err(restore_error) => error!(
                error = %restore_error,
                student_id = %before.student_id,
                drive_id = %before.drive_id,
                "progress could not be restored and disagrees with the ledger"
            ),
        }
    }

    fn counsellor_of(&self, student_id: &UserId) -> Option<UserId> {
        self.directory
            .counsellor_of(student_id)
            .unwrap_or_else(|error| {
                warn!(%error, student_id = %student_id, "unable to resolve counsellor");
                None
            })
    }
}

struct RoundContext<'a> {
    drive: &'a Drive,
    number: u32,
    round: Option<&'a Round>,
    next_round: Option<&'a Round>,
    now: DateTime<Utc>,
}

fn batch(
    drive_id: &DriveId,
    round_number: u32,
    student_ids: Vec<UserId>,
    outcome: Outcome,
) -> SelectionRequest {
    SelectionRequest {
        drive_id: drive_id.clone(),
        round_number,
        decisions: student_ids
            .into_iter()
            .map(|student_id| StudentDecision::new(student_id, outcome))
            .collect(),
    }
}

fn validate_request(request: &SelectionRequest) -> Result<(), PlacementError> {
    if request.round_number < 1 {
        return Err(PlacementError::validation("round number must be at least 1"));
    }
    if request.decisions.is_empty() {
        return Err(PlacementError::validation(
            "at least one student must be named",
        ));
    }

    let mut seen = HashSet::new();
    for decision in &request.decisions {
        if !seen.insert(&decision.student_id) {
            return Err(PlacementError::validation(format!(
                "student {} is named more than once",
                decision.student_id
            )));
        }
        if let Some(marks) = decision.marks_obtained {
            if !marks.is_finite() || marks < 0.0 {
                return Err(PlacementError::validation(format!(
                    "marks for {} must be a non-negative number",
                    decision.student_id
                )));
            }
        }
    }
    Ok(())
}

/// Put back the roll-up fields and the `round_number` entry that `before` carried.
fn revert_decision(progress: &mut Progress, before: &Progress, round_number: u32) {
    progress.overall_status = before.overall_status;
    progress.final_result = before.final_result;
    progress.current_round = before.current_round;
    match before.entry(round_number) {
        Some(previous) => match progress.entry_mut(round_number) {
            Some(entry) => *entry = previous.clone(),
            None => {
                progress.ensure_entry(previous.clone());
            }
        },
        None => {
            progress.remove_entry(round_number);
        }
    }
}

/// Apply one decision to a progress record. `None` leaves the record as it is.
fn apply_decision(
    progress: &mut Progress,
    context: &RoundContext<'_>,
    decision: &StudentDecision,
) -> Option<Transition> {
    let number = context.number;
    if !progress.is_awaiting(number) {
        return None;
    }
    if decision.outcome == Outcome::Deferred
        && decision.marks_obtained.is_none()
        && decision.feedback.is_none()
    {
        return None;
    }

    let entry = progress.entry_or_insert(number, || {
        context
            .round
            .map(|round| round.round_name.clone())
            .unwrap_or_else(|| default_round_name(number))
    });
    if let Some(marks) = decision.marks_obtained {
        entry.record_marks(marks, context.round.map(|round| round.max_marks));
    }
    if let Some(feedback) = &decision.feedback {
        entry.feedback = Some(feedback.clone());
    }

    match decision.outcome {
        Outcome::Advance => {
            entry.status = EntryStatus::Shortlisted;
            entry.is_shortlisted = true;
            entry.evaluated_at = Some(context.now);

            if context.drive.is_final_round(number) {
                progress.overall_status = OverallStatus::Placed;
                progress.final_result = FinalResult::Selected;
                Some(Transition::Placed)
            } else {
                let next = number + 1;
                progress.current_round = next;
                progress.overall_status = OverallStatus::Shortlisted;
                // An entry for the next round may already exist if that round was scheduled.
                progress.ensure_entry(
                    context
                        .next_round
                        .map(RoundProgressEntry::for_round)
                        .unwrap_or_else(|| {
                            RoundProgressEntry::pending(next, default_round_name(next))
                        }),
                );
                Some(Transition::Advanced)
            }
        }
        Outcome::Reject => {
            entry.status = EntryStatus::Rejected;
            entry.is_shortlisted = false;
            entry.evaluated_at = Some(context.now);
            progress.overall_status = OverallStatus::Rejected;
            progress.final_result = FinalResult::Rejected;
            Some(Transition::Rejected)
        }
        Outcome::Deferred => {
            if entry.status == EntryStatus::Pending {
                entry.status = EntryStatus::InProgress;
            }
            Some(Transition::Deferred)
        }
    }
}
