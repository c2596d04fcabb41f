use crate::harness::{Assertion, Scenario};
use ced_core::{ErrorKind, JobStatus, StepStatus};
use std::time::Duration;

// MockClock::default() starts here
const T0: i64 = 1_700_000_000;

#[test]
fn test_every_executed_edit_leaves_a_terminal_job() {
    Scenario::new("terminal_jobs")
        .from_fixture("course")
        .delete("questions/shared")
        .assert_job_status(JobStatus::Succeeded)
        .delete("questions/shared")
        .assert_job_status(JobStatus::Failed)
        .assert_steps(&[StepStatus::Failed])
        .delete("../nope")
        .assert_rejected(ErrorKind::Validation)
        .assert_job_count(2)
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_job_timestamps_follow_the_clock() {
    Scenario::new("job_timestamps")
        .from_fixture("course")
        .delete("questions/shared")
        .assert(Assertion::JobStartedAt(T0))
        .assert(Assertion::JobDurationSecs(0))
        .wait(Duration::from_secs(3600))
        .copy("questions/addNumbers")
        .assert(Assertion::JobStartedAt(T0 + 3600))
        .run()
        .unwrap();
}

#[test]
fn test_job_records_survive_restart() {
    Scenario::new("records_survive_restart")
        .from_fixture("course")
        .delete("questions/shared")
        .rename("questions/addNumbers", "questions/shared")
        .rename("questions/addNumbers", "questions/again")
        .assert_job_failed(ErrorKind::NotFound)
        .restart()
        .assert_job_count(3)
        .assert_job_status(JobStatus::Failed)
        .assert(Assertion::JobDescription(
            "Rename questions/addNumbers to questions/again".to_string(),
        ))
        // New jobs keep counting after the restart
        .copy("questions/shared")
        .assert_succeeded()
        .assert_job_count(4)
        .run()
        .unwrap();
}
