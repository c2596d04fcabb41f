use crate::harness::{Assertion, Edit, Scenario};
use ced_core::{EntityKind, ErrorKind, JobStatus, PathScope, StepStatus};

const QUESTION_INFO: &str = "questions/addNumbers/info.json";
const REVISED: &[u8] = br#"{
  "uuid": "5e7a9c1b-3d5f-4a7b-8c9d-0e1f2a3b4c5d",
  "id": "addNumbers",
  "title": "Add two integers",
  "topic": "Arithmetic",
  "type": "v3"
}
"#;

#[test]
fn test_modify_commits_and_syncs() {
    Scenario::new("modify_commits_and_syncs")
        .from_fixture("course")
        .read_and_write(QUESTION_INFO, REVISED)
        .assert_succeeded()
        .assert_resource(QUESTION_INFO)
        .assert_file_content(QUESTION_INFO, REVISED)
        .assert_job_status(JobStatus::Succeeded)
        .assert_steps(&[StepStatus::Succeeded])
        .assert_commit_count(2) // Initial snapshot + edit
        .assert_head_contains("Modify questions/addNumbers/info.json")
        .assert(Assertion::RemoteAtHead)
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_stale_write_is_rejected_without_writing() {
    Scenario::new("stale_write")
        .from_fixture("course")
        .read(QUESTION_INFO)
        .as_user("alice")
        .read_and_write(QUESTION_INFO, REVISED)
        .assert_succeeded()
        // The first reader still holds the old fingerprint
        .as_user("bob")
        .write(QUESTION_INFO, b"{\"title\": \"bob's version\"}")
        .assert_job_failed(ErrorKind::ConcurrentModification)
        .assert_job_status(JobStatus::Failed)
        .assert_steps(&[StepStatus::Failed])
        .assert_file_content(QUESTION_INFO, REVISED)
        .assert_commit_count(2)
        .run()
        .unwrap();
}

#[test]
fn test_external_change_between_read_and_write() {
    Scenario::new("external_change")
        .with_file("clientFiles/notes.md", b"v1")
        .read("clientFiles/notes.md")
        .external_write("clientFiles/notes.md", b"v2 from git pull")
        .write("clientFiles/notes.md", b"v1 edited")
        .assert_job_failed(ErrorKind::ConcurrentModification)
        .assert_file_content("clientFiles/notes.md", b"v2 from git pull")
        .run()
        .unwrap();
}

#[test]
fn test_identical_content_makes_no_commit() {
    Scenario::new("identical_content")
        .with_file("clientFiles/notes.md", b"same")
        .read_and_write("clientFiles/notes.md", b"same")
        .assert_succeeded()
        .assert(Assertion::NoCommit)
        .assert_job_status(JobStatus::Succeeded)
        .assert_commit_count(1)
        .run()
        .unwrap();
}

#[test]
fn test_create_new_file() {
    Scenario::new("create_new_file")
        .from_fixture("course")
        .submit(Edit::create("questions/addNumbers/clientFilesQuestion/hint.md", b"Carry the one."))
        .assert_succeeded()
        .assert(Assertion::FileInHead(
            "questions/addNumbers/clientFilesQuestion/hint.md".to_string(),
        ))
        // Creating again fails: the file is no longer absent
        .submit(Edit::create("questions/addNumbers/clientFilesQuestion/hint.md", b"Other hint"))
        .assert_job_failed(ErrorKind::ConcurrentModification)
        .run()
        .unwrap();
}

#[test]
fn test_malformed_json_is_rejected_before_any_job() {
    Scenario::new("malformed_json")
        .from_fixture("course")
        .read_and_write(QUESTION_INFO, b"{\"title\": ")
        .assert_rejected(ErrorKind::Validation)
        .assert_job_count(0)
        .assert_commit_count(1)
        .run()
        .unwrap();
}

#[test]
fn test_scope_limits_editable_paths() {
    Scenario::new("scope_limits")
        .from_fixture("course")
        .in_scope(PathScope::under("questions").deny("questions/shared"))
        .read_and_write("infoCourse.json", b"{}")
        .assert_rejected(ErrorKind::Validation)
        .delete("questions/shared")
        .assert_rejected(ErrorKind::Validation)
        .delete("questions")
        .assert_rejected(ErrorKind::Validation)
        .assert_job_count(0)
        .delete("questions/addNumbers")
        .assert_succeeded()
        .assert_resource("questions")
        .run()
        .unwrap();
}

#[test]
fn test_path_escape_is_rejected() {
    Scenario::new("path_escape")
        .from_fixture("course")
        .delete("../outside")
        .assert_rejected(ErrorKind::Validation)
        .delete(".course/HEAD")
        .assert_rejected(ErrorKind::Validation)
        .run()
        .unwrap();
}

#[test]
fn test_example_course_is_read_only() {
    Scenario::new("example_course")
        .from_fixture("course")
        .example_course()
        .read_and_write(QUESTION_INFO, REVISED)
        .assert_rejected(ErrorKind::Authorization)
        .assert_job_count(0)
        .run()
        .unwrap();
}

#[test]
fn test_only_configured_editors_may_edit() {
    Scenario::new("configured_editors")
        .from_fixture("course")
        .editors(&["alice"])
        .as_user("mallory")
        .delete("questions/shared")
        .assert_rejected(ErrorKind::Authorization)
        .as_user("alice")
        .delete("questions/shared")
        .assert_succeeded()
        .assert_job_count(1)
        .run()
        .unwrap();
}

#[test]
fn test_delete_missing_path() {
    Scenario::new("delete_missing")
        .from_fixture("course")
        .delete("questions/gone")
        .assert_job_failed(ErrorKind::NotFound)
        .submit(Edit::Delete {
            path: "questions/gone".to_string(),
            tolerate_missing: true,
        })
        .assert_succeeded()
        .assert(Assertion::NoCommit)
        .run()
        .unwrap();
}

#[test]
fn test_add_course_instance_scaffolds_identity() {
    Scenario::new("add_course_instance")
        .from_fixture("course")
        .add(EntityKind::CourseInstance, "courseInstances")
        .assert_succeeded()
        .assert_resource("courseInstances/New_1")
        .assert(Assertion::ResourceHasUuid)
        .assert(Assertion::FileInHead(
            "courseInstances/New_1/infoCourseInstance.json".to_string(),
        ))
        .assert(Assertion::InfoField {
            path: "courseInstances/New_1/infoCourseInstance.json".to_string(),
            field: "longName".to_string(),
            value: serde_json::json!("New (1)"),
        })
        .add(EntityKind::CourseInstance, "courseInstances")
        .assert_resource("courseInstances/New_2")
        .assert_commit_count(3)
        .run()
        .unwrap();
}

#[test]
fn test_add_outside_scope_is_rejected() {
    Scenario::new("add_outside_scope")
        .from_fixture("course")
        .in_scope(PathScope::under("questions"))
        .add(EntityKind::Assessment, "assessments")
        .assert_rejected(ErrorKind::Validation)
        .assert_job_count(0)
        .run()
        .unwrap();
}
