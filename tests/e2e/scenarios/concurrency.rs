//! Parallel edits against real course directories.
//!
//! These bypass the sequential scenario DSL and drive `EditorRunner` from
//! several threads at once.

use crate::harness::TestWorkspace;
use ced_core::{
    fingerprint, ContentFingerprint, CourseLocks, Editor, EditorRunner, ErrorKind, JobStatus,
    JobStore, ModifyEditor, PathScope, RedbJobStore, RequestContext, RunFailure,
    StaticPermissions, UserId,
};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn runner(workspace: &TestWorkspace, jobs_file: &str) -> EditorRunner {
    let repository = Arc::new(ced_core::SnapshotRepository::new(
        workspace.config().repository,
    ));
    EditorRunner::new(
        Arc::new(StaticPermissions::allow_all()),
        Arc::new(RedbJobStore::open(workspace.path().join(jobs_file)).unwrap()),
        repository,
        Arc::new(CourseLocks::new(
            Duration::from_secs(30),
            Duration::from_millis(2),
        )),
    )
}

fn create(path: &str, content: &[u8]) -> Editor {
    ModifyEditor::new(
        PathScope::course(),
        path,
        ContentFingerprint::absent(),
        content.to_vec(),
    )
    .into()
}

#[test]
fn test_parallel_edits_to_one_course_are_all_committed() {
    let workspace = TestWorkspace::empty().unwrap();
    let course = workspace.course("TAM212");
    let repo = workspace.init_course(&course).unwrap();
    let runner = runner(&workspace, "jobs.redb");

    const WORKERS: usize = 8;
    let barrier = Arc::new(Barrier::new(WORKERS));
    let handles: Vec<_> = (0..WORKERS)
        .map(|i| {
            let runner = runner.clone();
            let barrier = barrier.clone();
            let ctx = RequestContext::new(UserId::new(format!("ta{}", i)), course.clone());
            thread::spawn(move || {
                barrier.wait();
                runner.run(&ctx, &create(&format!("questions/q{}/question.html", i), b"<p/>"))
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    // One commit per edit on a linear history: nothing interleaved
    let history = repo.history(&course, usize::MAX).unwrap();
    assert_eq!(history.len(), WORKERS + 1);
    let paths = repo.head_tree_paths(&course).unwrap();
    for i in 0..WORKERS {
        assert!(paths.contains(&format!("questions/q{}/question.html", i)));
    }

    let jobs = runner.jobs().list(Some(&course.id), usize::MAX).unwrap();
    assert_eq!(jobs.len(), WORKERS);
    assert!(jobs.iter().all(|j| j.status == JobStatus::Succeeded));
}

#[test]
fn test_racing_writers_on_one_file_only_one_wins() {
    let workspace = TestWorkspace::empty().unwrap();
    workspace.write_file("infoCourse.json", b"{\"title\": \"v0\"}").unwrap();
    let course = workspace.course("TAM212");
    workspace.init_course(&course).unwrap();
    let runner = runner(&workspace, "jobs.redb");
    let origin = fingerprint(b"{\"title\": \"v0\"}");

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = ["alice", "bob"]
        .into_iter()
        .map(|user| {
            let runner = runner.clone();
            let barrier = barrier.clone();
            let ctx = RequestContext::new(UserId::new(user), course.clone());
            let editor: Editor = ModifyEditor::new(
                PathScope::course(),
                "infoCourse.json",
                origin.clone(),
                format!("{{\"title\": \"{}\"}}", user).into_bytes(),
            )
            .into();
            thread::spawn(move || {
                barrier.wait();
                runner.run(&ctx, &editor)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one writer must win");

    let loser = results
        .iter()
        .find_map(|r| match r {
            Err(RunFailure::JobFailed(f)) => Some(f.job_sequence_id),
            _ => None,
        })
        .unwrap();
    let job = runner.jobs().get(loser).unwrap();
    assert_eq!(
        job.failure().map(|e| e.kind),
        Some(ErrorKind::ConcurrentModification)
    );

    // The file holds the winner's bytes in full
    let content = workspace.read_file("infoCourse.json").unwrap();
    assert!(content == b"{\"title\": \"alice\"}" || content == b"{\"title\": \"bob\"}");
}

#[test]
fn test_separate_processes_share_the_lock_file() {
    // Two runners with their own lock registries and job stores stand in
    // for two server processes; only the LOCK file coordinates them.
    let workspace = TestWorkspace::empty().unwrap();
    let course = workspace.course("TAM212");
    let repo = workspace.init_course(&course).unwrap();
    let first = runner(&workspace, "jobs-a.redb");
    let second = runner(&workspace, "jobs-b.redb");

    const PER_PROCESS: usize = 4;
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = [(first, "a"), (second, "b")]
        .into_iter()
        .map(|(runner, name)| {
            let barrier = barrier.clone();
            let ctx = RequestContext::new(UserId::new(name), course.clone());
            thread::spawn(move || {
                barrier.wait();
                for i in 0..PER_PROCESS {
                    let editor = create(&format!("clientFiles/{}{}.txt", name, i), b"x");
                    runner.run(&ctx, &editor).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let history = repo.history(&course, usize::MAX).unwrap();
    assert_eq!(history.len(), 2 * PER_PROCESS + 1);
    assert_eq!(repo.head_tree_paths(&course).unwrap().len(), 2 * PER_PROCESS);
}

#[test]
fn test_spawned_jobs_on_different_courses() {
    let workspace = TestWorkspace::empty().unwrap();
    let runner = runner(&workspace, "jobs.redb");

    let handles: Vec<_> = ["TAM212", "CS225"]
        .iter()
        .map(|id| {
            let course = ced_core::Course::new(*id, workspace.path().join(id));
            std::fs::create_dir_all(&course.path).unwrap();
            workspace.init_course(&course).unwrap();
            let ctx = RequestContext::new(UserId::new("admin"), course);
            runner
                .spawn(ctx, create("infoCourse.json", b"{}"))
                .unwrap()
        })
        .collect();

    for handle in handles {
        let id = handle.job_sequence_id();
        let outcome = handle.wait().unwrap();
        assert_eq!(outcome.job_sequence_id, id);
        assert_eq!(runner.jobs().get(id).unwrap().status, JobStatus::Succeeded);
    }
}
