use crate::infra::{parse_date, sample_directory, SAMPLE_COMPANY};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use placement_drive::config::PlacementConfig;
use placement_drive::drives::{
    ApplicationLedger, ApplicationStatus, CompanyId, DriveDraft, DriveOverview,
    InMemoryCampusDirectory, InMemoryNotifier, InMemoryPlacementRepository, Outcome,
    PlacementService, Progress, RoundDraft, RoundType, SelectionRequest,
    SelectionSummary, StudentDecision, UserId,
};
use placement_drive::error::AppError;
use serde::Serialize;
use std::sync::Arc;

type DemoService =
    PlacementService<InMemoryPlacementRepository, InMemoryCampusDirectory, InMemoryNotifier>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Drive start date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) start: Option<NaiveDate>,
    /// Number of rounds in the sample drive.
    #[arg(long, default_value_t = 2)]
    pub(crate) rounds: u32,
    /// Print the final drive state as JSON instead of a narrated walkthrough.
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Debug, Serialize)]
struct RoundReport {
    round_number: u32,
    summary: SelectionSummary,
}

#[derive(Debug, Serialize)]
struct DemoReport {
    overview: DriveOverview,
    rounds: Vec<RoundReport>,
    late_enrollments: Vec<String>,
    notifications_sent: usize,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        start,
        rounds: total_rounds,
        json,
    } = args;
    let start = start.unwrap_or_else(|| Local::now().date_naive());
    let end = start + Duration::days(2 * i64::from(total_rounds.max(1)) + 7);

    let directory = Arc::new(sample_directory());
    let notifier = Arc::new(InMemoryNotifier::default());
    let service = PlacementService::new(
        Arc::new(InMemoryPlacementRepository::default()),
        directory.clone(),
        notifier.clone(),
        PlacementConfig::default(),
    );

    let created = service.create_drive(DriveDraft {
        company_id: CompanyId::new(SAMPLE_COMPANY),
        title: "Contoso Graduate Engineer Drive".to_string(),
        description: "Sample drive run by the placement demo".to_string(),
        start_date: start,
        end_date: end,
        total_rounds,
        status: None,
        created_by: UserId::new("placement-officer"),
    })?;
    let drive = created.drive;
    narrate(json, || {
        println!("Placement drive demo");
        println!(
            "- Created {} ({}) for {} from {} to {}",
            drive.title, drive.id, drive.company_id, drive.start_date, drive.end_date
        );
        println!("- Enrolled approved applicants: {}", join(&created.enrolled));
    });

    for number in 1..=total_rounds {
        let round = service.create_round(
            &drive.id,
            RoundDraft {
                round_number: number,
                round_name: Some(round_name(number, total_rounds).to_string()),
                round_type: round_type(number, total_rounds),
                scheduled_date: start + Duration::days(2 * i64::from(number) - 1),
                scheduled_time: Some("10:00".to_string()),
                max_marks: 100,
                passing_marks: 60,
                created_by: UserId::new("placement-officer"),
            },
        )?;
        narrate(json, || {
            println!(
                "- Scheduled round {} \"{}\" on {}",
                round.round_number, round.round_name, round.scheduled_date
            );
        });
    }

    let mut reports = Vec::new();
    for number in 1..=total_rounds {
        let summary = service.evaluate(SelectionRequest {
            drive_id: drive.id.clone(),
            round_number: number,
            decisions: decisions_for(number, total_rounds),
        })?;
        narrate(json, || render_summary(number, &summary));
        reports.push(RoundReport {
            round_number: number,
            summary,
        });
    }

    let late_enrollments = enroll_late_applicant(&service, &directory, "emeka")?;
    narrate(json, || {
        println!(
            "\nLate approval for emeka enrolled them in: {}",
            if late_enrollments.is_empty() {
                "no open drives".to_string()
            } else {
                late_enrollments.join(", ")
            }
        );
    });

    let overview = service.drive_overview(&drive.id)?;
    let notifications_sent = notifier.events().len();

    if json {
        let report = DemoReport {
            overview,
            rounds: reports,
            late_enrollments,
            notifications_sent,
        };
        let rendered = serde_json::to_string_pretty(&report).map_err(std::io::Error::from)?;
        println!("{rendered}");
        return Ok(());
    }

    println!("\nFinal standings");
    for progress in &overview.progress {
        render_progress(progress);
    }
    println!("\n{notifications_sent} notifications dispatched");
    Ok(())
}

fn narrate(json: bool, render: impl FnOnce()) {
    if !json {
        render();
    }
}

fn round_name(number: u32, total_rounds: u32) -> &'static str {
    match number {
        1 => "Aptitude Test",
        n if n == total_rounds => "HR Interview",
        2 => "Technical Interview",
        _ => "Coding Challenge",
    }
}

fn round_type(number: u32, total_rounds: u32) -> RoundType {
    match number {
        1 => RoundType::Aptitude,
        n if n == total_rounds => RoundType::Hr,
        2 => RoundType::Technical,
        _ => RoundType::Coding,
    }
}

/// asha clears every round; bilal falls at the last one; chen is rejected in round 1 and
/// dara is left undecided there.
fn decisions_for(number: u32, total_rounds: u32) -> Vec<StudentDecision> {
    let advance = |student: &str, marks: f32| {
        StudentDecision::new(UserId::new(student), Outcome::Advance).with_marks(marks)
    };
    let mut decisions = vec![advance("asha", 88.0)];
    if number == total_rounds {
        decisions.push(
            StudentDecision::new(UserId::new("bilal"), Outcome::Reject)
                .with_marks(54.0)
                .with_feedback("Strong fundamentals, weaker communication"),
        );
    } else {
        decisions.push(advance("bilal", 71.0));
    }
    if number == 1 {
        decisions.push(
            StudentDecision::new(UserId::new("chen"), Outcome::Reject)
                .with_marks(32.0)
                .with_feedback("Below the aptitude cut-off"),
        );
        decisions.push(
            StudentDecision::new(UserId::new("dara"), Outcome::Deferred)
                .with_marks(60.0)
                .with_feedback("Awaiting proctoring review"),
        );
    }
    decisions
}

fn enroll_late_applicant(
    service: &DemoService,
    directory: &InMemoryCampusDirectory,
    student: &str,
) -> Result<Vec<String>, AppError> {
    let student = UserId::new(student);
    let company = CompanyId::new(SAMPLE_COMPANY);
    directory.set_application_status(&student, &company, ApplicationStatus::Approved)?;
    let drives = service.enroll_applicant(&student, &company)?;
    Ok(drives.into_iter().map(|id| id.0).collect())
}

fn render_summary(number: u32, summary: &SelectionSummary) {
    println!("\nRound {number} evaluated");
    let buckets = [
        ("advanced", &summary.advanced),
        ("placed", &summary.placed),
        ("rejected", &summary.rejected),
        ("deferred", &summary.deferred),
        ("skipped", &summary.skipped),
        ("failed", &summary.failed),
    ];
    for (label, students) in buckets {
        if !students.is_empty() {
            println!("  - {label}: {}", join(students));
        }
    }
}

fn render_progress(progress: &Progress) {
    println!(
        "- {}: {} (round {}, result {:?})",
        progress.student_id,
        progress.overall_status.label(),
        progress.current_round,
        progress.final_result
    );
    for entry in &progress.round_progress {
        let marks = match (entry.marks_obtained, entry.percentage) {
            (Some(marks), Some(percentage)) => format!("{marks} marks ({percentage}%)"),
            (Some(marks), None) => format!("{marks} marks"),
            _ => "not scored".to_string(),
        };
        println!(
            "    round {} {}: {:?}, {}",
            entry.round_number, entry.round_name, entry.status, marks
        );
    }
}

fn join(students: &[UserId]) -> String {
    if students.is_empty() {
        return "none".to_string();
    }
    students
        .iter()
        .map(UserId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use placement_drive::drives::PlacementError;

    #[test]
    fn final_round_rejects_bilal_and_advances_asha() {
        let decisions = decisions_for(3, 3);

        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].outcome, Outcome::Advance);
        assert_eq!(decisions[1].student_id, UserId::new("bilal"));
        assert_eq!(decisions[1].outcome, Outcome::Reject);
    }

    #[test]
    fn first_round_decides_the_whole_cohort() {
        let decisions = decisions_for(1, 2);

        let outcomes: Vec<_> = decisions
            .iter()
            .map(|decision| (decision.student_id.as_str().to_string(), decision.outcome))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                ("asha".to_string(), Outcome::Advance),
                ("bilal".to_string(), Outcome::Advance),
                ("chen".to_string(), Outcome::Reject),
                ("dara".to_string(), Outcome::Deferred),
            ]
        );
    }

    #[test]
    fn round_names_follow_the_drive_shape() {
        assert_eq!(round_name(1, 3), "Aptitude Test");
        assert_eq!(round_name(2, 3), "Technical Interview");
        assert_eq!(round_name(3, 3), "HR Interview");
        assert_eq!(round_type(3, 4), RoundType::Coding);
    }

    #[test]
    fn demo_runs_end_to_end_as_json() {
        let args = DemoArgs {
            start: NaiveDate::from_ymd_opt(2025, 1, 6),
            rounds: 3,
            json: true,
        };

        run_demo(args).expect("demo completes");
    }

    #[test]
    fn demo_rejects_an_empty_drive() {
        let args = DemoArgs {
            start: NaiveDate::from_ymd_opt(2025, 1, 6),
            rounds: 0,
            json: true,
        };

        let error = run_demo(args).unwrap_err();
        assert!(matches!(error, AppError::Placement(PlacementError::Validation(_))));
    }
}
