use std::sync::Arc;

use tracing::{info, warn};

use super::domain::{Drive, UserId};
use super::repository::{
    Notification, NotificationDispatcher, NotificationKind, NotifyError, RelatedModel,
};

/// Dispatcher for the served binary: every notification becomes a structured log event.
/// Nothing is retained.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

impl NotificationDispatcher for LogDispatcher {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            recipient = %notification.recipient,
            kind = ?notification.kind,
            related_id = %notification.related_id,
            related_model = ?notification.related_model,
            message = %notification.message,
            "notification dispatched"
        );
        Ok(())
    }
}

/// Best-effort wrapper around the dispatcher: failures are logged, never returned.
pub struct Notifier<N> {
    dispatcher: Arc<N>,
    notify_counsellors: bool,
}

impl<N> Clone for Notifier<N> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            notify_counsellors: self.notify_counsellors,
        }
    }
}

impl<N> Notifier<N>
where
    N: NotificationDispatcher + 'static,
{
    pub fn new(dispatcher: Arc<N>, notify_counsellors: bool) -> Self {
        Self {
            dispatcher,
            notify_counsellors,
        }
    }

    fn send(&self, recipient: &UserId, message: String, kind: NotificationKind, drive: &Drive) {
        let notification = Notification {
            recipient: recipient.clone(),
            message,
            kind,
            related_id: drive.id.0.clone(),
            related_model: RelatedModel::Drive,
        };
        if let Err(error) = self.dispatcher.notify(notification) {
            warn!(
                %error,
                recipient = %recipient,
                drive_id = %drive.id,
                ?kind,
                "notification dispatch failed"
            );
        }
    }

    fn send_to_counsellor(
        &self,
        counsellor: Option<&UserId>,
        message: String,
        kind: NotificationKind,
        drive: &Drive,
    ) {
        if !self.notify_counsellors {
            return;
        }
        if let Some(counsellor) = counsellor {
            self.send(counsellor, message, kind, drive);
        }
    }

    pub fn drive_started(&self, drive: &Drive, students: &[UserId], counsellors: &[UserId]) {
        for student in students {
            self.send(
                student,
                format!(
                    "A new placement drive \"{}\" has started. You are enrolled for round 1.",
                    drive.title
                ),
                NotificationKind::DriveStarted,
                drive,
            );
        }
        if !self.notify_counsellors {
            return;
        }
        for counsellor in counsellors {
            self.send(
                counsellor,
                format!(
                    "Placement drive \"{}\" has started with {} enrolled students.",
                    drive.title,
                    students.len()
                ),
                NotificationKind::DriveStarted,
                drive,
            );
        }
    }

    pub fn enrolled(&self, drive: &Drive, student: &UserId) {
        self.send(
            student,
            format!(
                "You have been enrolled in the placement drive \"{}\".",
                drive.title
            ),
            NotificationKind::Enrolled,
            drive,
        );
    }

    pub fn shortlisted(&self, drive: &Drive, student: &UserId, round_number: u32) {
        self.send(
            student,
            format!(
                "Congratulations! You have been shortlisted in round {} of \"{}\" and move on to round {}.",
                round_number,
                drive.title,
                round_number + 1
            ),
            NotificationKind::Shortlisted,
            drive,
        );
    }

    pub fn placed(&self, drive: &Drive, student: &UserId, counsellor: Option<&UserId>) {
        self.send(
            student,
            format!(
                "Congratulations! You have been placed through the drive \"{}\".",
                drive.title
            ),
            NotificationKind::Placed,
            drive,
        );
        self.send_to_counsellor(
            counsellor,
            format!(
                "Your student {} has been placed through the drive \"{}\".",
                student, drive.title
            ),
            NotificationKind::Placed,
            drive,
        );
    }

    pub fn rejected(
        &self,
        drive: &Drive,
        student: &UserId,
        round_number: u32,
        counsellor: Option<&UserId>,
    ) {
        self.send(
            student,
            format!(
                "Thank you for participating in \"{}\". You were not selected after round {}.",
                drive.title, round_number
            ),
            NotificationKind::Rejected,
            drive,
        );
        self.send_to_counsellor(
            counsellor,
            format!(
                "Your student {} was not selected in round {} of \"{}\".",
                student, round_number, drive.title
            ),
            NotificationKind::Rejected,
            drive,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_dispatcher_accepts_notifications_without_keeping_them() {
        let dispatcher = LogDispatcher;
        for recipient in ["stu-1", "coun-1"] {
            let outcome = dispatcher.notify(Notification {
                recipient: UserId::new(recipient),
                message: "Shortlisted for round 2".to_string(),
                kind: NotificationKind::Shortlisted,
                related_id: "drive-1".to_string(),
                related_model: RelatedModel::Drive,
            });
            assert!(outcome.is_ok());
        }
        assert_eq!(std::mem::size_of::<LogDispatcher>(), 0);
    }
}
