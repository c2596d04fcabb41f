//! Job sequence inspection.

use super::{CourseEnv, Globals};
use anyhow::{Context, Result};
use ced_core::{JobSequence, JobSequenceId, JobStatus, JobStore, StepStatus};
use chrono::DateTime;
use console::{style, Style};

pub fn show(globals: &Globals, id: u64) -> Result<()> {
    let env = CourseEnv::open(globals)?;
    let jobs = env.jobs()?;
    let job = jobs
        .get(JobSequenceId::new(id))
        .with_context(|| format!("Job #{} not found", id))?;
    print_job(&job);
    Ok(())
}

pub fn list(globals: &Globals, limit: usize, all: bool) -> Result<()> {
    let env = CourseEnv::open(globals)?;
    let jobs = env.jobs()?;
    let course = (!all).then_some(&env.course.id);
    let list = jobs.list(course, limit)?;

    if list.is_empty() {
        println!("No jobs found.");
        return Ok(());
    }
    for job in &list {
        println!(
            "{}  {}",
            format_time(job.started_at),
            status_style(job.status).apply_to(job.summary())
        );
    }
    Ok(())
}

fn print_job(job: &JobSequence) {
    println!("Job #{}", job.id);
    println!(
        "  Status:      {}",
        status_style(job.status).apply_to(job.status)
    );
    println!("  Course:      {}", job.course_id);
    println!("  User:        {}", job.user_id);
    println!("  Description: {}", job.description);
    println!("  Started:     {}", format_time(job.started_at));
    if let Some(finished) = job.finished_at {
        println!(
            "  Finished:    {} ({}s)",
            format_time(finished),
            finished - job.started_at
        );
    }
    if let Some(commit) = &job.commit {
        println!("  Commit:      {}", commit);
    }
    if let Some(err) = &job.error {
        println!("  Error:       {}", style(err).red());
    }

    println!();
    println!("Steps:");
    for (i, step) in job.steps.iter().enumerate() {
        let marker = match step.status {
            StepStatus::Succeeded => style("✓").green(),
            StepStatus::Failed => style("✗").red(),
            StepStatus::Running => style("→").yellow(),
            StepStatus::Pending => style("·").dim(),
        };
        println!("  {} {}. {} [{}]", marker, i + 1, step.label, step.status);
        if let Some(output) = &step.output {
            println!("       {}", style(output).dim());
        }
        if let Some(err) = &step.error {
            println!("       {}", style(err).red());
        }
    }
}

fn status_style(status: JobStatus) -> Style {
    match status {
        JobStatus::Succeeded => Style::new().green(),
        JobStatus::Failed => Style::new().red(),
        JobStatus::Running => Style::new().yellow(),
        JobStatus::Pending => Style::new().dim(),
    }
}

fn format_time(unix: i64) -> String {
    let time = DateTime::from_timestamp(unix, 0).unwrap_or_default();
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
