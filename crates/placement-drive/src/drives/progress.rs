use super::domain::Progress;
use super::repository::{ProgressStore, RepositoryError};

/// How often a stale progress write is re-read and re-applied before giving up.
pub(crate) const MAX_PROGRESS_ATTEMPTS: usize = 3;

/// A persisted progress change: the copy it was applied to and the stored result.
#[derive(Debug)]
pub(crate) struct Modified<T> {
    pub(crate) before: Progress,
    pub(crate) after: Progress,
    pub(crate) outcome: T,
}

/// Apply `mutate` to `current` and persist it with a version check.
///
/// On a version conflict the record is re-read and `mutate` runs again against the fresh
/// copy. `mutate` returns `None` to leave the record untouched, in which case nothing is
/// written and `Ok(None)` is returned.
pub(crate) fn modify_progress<S, F, T>(
    store: &S,
    current: Progress,
    mut mutate: F,
) -> Result<Option<Modified<T>>, RepositoryError>
where
    S: ProgressStore + ?Sized,
    F: FnMut(&mut Progress) -> Option<T>,
{
    let mut snapshot = current;
    for attempt in 1..=MAX_PROGRESS_ATTEMPTS {
        let mut candidate = snapshot.clone();
        let outcome = match mutate(&mut candidate) {
            Some(outcome) => outcome,
            None => return Ok(None),
        };

        match store.update_progress(candidate) {
            Ok(after) => {
                return Ok(Some(Modified {
                    before: snapshot,
                    after,
                    outcome,
                }))
            }
            Err(RepositoryError::Conflict) if attempt < MAX_PROGRESS_ATTEMPTS => {
                tracing::debug!(
                    student_id = %snapshot.student_id,
                    drive_id = %snapshot.drive_id,
                    attempt,
                    "progress changed concurrently, retrying"
                );
                snapshot = store
                    .fetch_progress(&snapshot.drive_id, &snapshot.student_id)?
                    .ok_or(RepositoryError::NotFound)?;
            }
            Err(error) => return Err(error),
        }
    }
    Err(RepositoryError::Conflict)
}
