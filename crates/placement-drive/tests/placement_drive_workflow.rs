use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use placement_drive::config::PlacementConfig;
use placement_drive::drives::{
    ApplicationLedger, ApplicationStatus, CompanyId, Drive, DriveDraft, EntryStatus, FinalResult,
    InMemoryCampusDirectory, InMemoryNotifier, InMemoryPlacementRepository, OverallStatus,
    PlacementError, PlacementService, Progress, ProgressStore, Round, RoundDraft, RoundType,
    UserDirectory, UserId,
};

type Service =
    PlacementService<InMemoryPlacementRepository, InMemoryCampusDirectory, InMemoryNotifier>;

struct Campus {
    service: Service,
    repository: Arc<InMemoryPlacementRepository>,
    directory: Arc<InMemoryCampusDirectory>,
}

fn drive_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 3).expect("valid drive start date")
}

fn campus() -> Campus {
    let repository = Arc::new(InMemoryPlacementRepository::default());
    let directory = Arc::new(
        InMemoryCampusDirectory::default()
            .with_application("student-s", "northwind", ApplicationStatus::Approved)
            .with_application("student-t", "northwind", ApplicationStatus::Approved)
            .with_counsellor("counsellor-c", &["student-s", "student-t"]),
    );
    let service = PlacementService::new(
        repository.clone(),
        directory.clone(),
        Arc::new(InMemoryNotifier::default()),
        PlacementConfig::default(),
    );
    Campus {
        service,
        repository,
        directory,
    }
}

impl Campus {
    fn drive(&self, total_rounds: u32) -> Drive {
        self.service
            .create_drive(DriveDraft {
                company_id: CompanyId::new("northwind"),
                title: "Northwind Analyst Hiring".to_string(),
                description: String::new(),
                start_date: drive_start(),
                end_date: drive_start() + Duration::days(20),
                total_rounds,
                status: None,
                created_by: UserId::new("placement-officer"),
            })
            .expect("drive created")
            .drive
    }

    fn round(
        &self,
        drive: &Drive,
        round_number: u32,
        offset_days: i64,
    ) -> Result<Round, PlacementError> {
        self.service.create_round(
            &drive.id,
            RoundDraft {
                round_number,
                round_name: None,
                round_type: RoundType::Interview,
                scheduled_date: drive.start_date + Duration::days(offset_days),
                scheduled_time: None,
                max_marks: 100,
                passing_marks: 50,
                created_by: UserId::new("placement-officer"),
            },
        )
    }

    fn progress(&self, drive: &Drive, student: &str) -> Progress {
        self.repository
            .fetch_progress(&drive.id, &UserId::new(student))
            .expect("progress readable")
            .expect("progress present")
    }
}

fn student(id: &str) -> Vec<UserId> {
    vec![UserId::new(id)]
}

#[test]
fn two_round_drive_places_a_shortlisted_student() {
    let campus = campus();
    let drive = campus.drive(2);
    campus.round(&drive, 1, 1).expect("round 1");
    campus.round(&drive, 2, 5).expect("round 2");

    campus
        .service
        .shortlist(&drive.id, 1, student("student-s"))
        .expect("round 1 shortlist");
    let progress = campus.progress(&drive, "student-s");
    assert_eq!(progress.current_round, 2);
    assert_eq!(progress.round_progress.len(), 2);
    assert_eq!(
        progress.round_progress[1].status,
        EntryStatus::Pending,
        "round 2 entry awaits evaluation"
    );

    campus
        .service
        .shortlist(&drive.id, 2, student("student-s"))
        .expect("round 2 shortlist");
    let progress = campus.progress(&drive, "student-s");
    assert_eq!(progress.overall_status, OverallStatus::Placed);
    assert_eq!(progress.final_result, FinalResult::Selected);

    // The three records agree on the outcome.
    assert_eq!(
        campus
            .directory
            .application_status(&UserId::new("student-s"), &CompanyId::new("northwind"))
            .expect("application readable"),
        Some(ApplicationStatus::Placed)
    );
    assert!(campus
        .directory
        .placement(&UserId::new("student-s"))
        .expect("placement readable")
        .is_some());
}

#[test]
fn first_round_must_be_numbered_one() {
    let campus = campus();
    let drive = campus.drive(3);

    let error = campus.round(&drive, 3, 1).unwrap_err();

    assert!(matches!(error, PlacementError::Validation(_)));
    assert_eq!(error.to_string(), "first round must be 1");
}

#[test]
fn rounds_outside_the_drive_window_are_refused() {
    let campus = campus();
    let drive = campus.drive(2);

    let error = campus.round(&drive, 1, -1).unwrap_err();

    assert!(error
        .to_string()
        .contains("must be within the drive start and end dates"));
    assert!(campus
        .repository
        .progress_for_drive(&drive.id)
        .expect("progress readable")
        .iter()
        .all(|progress| progress.round_progress.len() == 1));
}

#[test]
fn rejected_student_keeps_a_single_entry() {
    let campus = campus();
    let drive = campus.drive(2);
    campus.round(&drive, 1, 1).expect("round 1");

    campus
        .service
        .reject(&drive.id, 1, student("student-s"))
        .expect("rejected");
    campus.round(&drive, 2, 5).expect("round 2");

    let progress = campus.progress(&drive, "student-s");
    assert_eq!(progress.overall_status, OverallStatus::Rejected);
    assert_eq!(progress.current_round, 1);
    assert_eq!(progress.round_progress.len(), 1);
    assert_eq!(
        campus
            .directory
            .application_status(&UserId::new("student-s"), &CompanyId::new("northwind"))
            .expect("application readable"),
        Some(ApplicationStatus::Rejected)
    );

    // The student who was not named picked up the new round.
    assert_eq!(campus.progress(&drive, "student-t").round_progress.len(), 2);
}

#[test]
fn shortlisting_twice_appends_one_entry() {
    let campus = campus();
    let drive = campus.drive(3);
    campus.round(&drive, 1, 1).expect("round 1");

    for _ in 0..2 {
        campus
            .service
            .shortlist(&drive.id, 1, vec![UserId::new("student-s")])
            .expect("shortlist");
    }

    let progress = campus.progress(&drive, "student-s");
    let round_two = progress
        .round_progress
        .iter()
        .filter(|entry| entry.round_number == 2)
        .count();
    assert_eq!(round_two, 1);
    assert_eq!(progress.current_round, 2);
}

#[test]
fn round_numbers_stay_contiguous_and_capped() {
    let campus = campus();
    let drive = campus.drive(2);
    campus.round(&drive, 1, 2).expect("round 1");
    campus.round(&drive, 2, 2).expect("same-day round 2");

    assert!(campus.round(&drive, 3, 4).is_err());

    let overview = campus
        .service
        .drive_overview(&drive.id)
        .expect("overview");
    let numbers: Vec<u32> = overview
        .rounds
        .iter()
        .map(|round| round.round_number)
        .collect();
    assert_eq!(numbers, vec![1, 2]);
    assert!(overview
        .rounds
        .windows(2)
        .all(|pair| pair[0].scheduled_date <= pair[1].scheduled_date));
}

#[test]
fn one_progress_record_per_student_and_drive() {
    let campus = campus();
    let drive = campus.drive(2);

    let enrolled = campus
        .service
        .enroll_applicant(&UserId::new("student-s"), &CompanyId::new("northwind"))
        .expect("enrollment hook");

    assert!(enrolled.is_empty());
    assert_eq!(
        campus
            .repository
            .progress_for_drive(&drive.id)
            .expect("progress readable")
            .len(),
        2
    );
}
