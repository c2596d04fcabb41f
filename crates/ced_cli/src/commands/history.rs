//! Snapshot history of a course.

use super::{CourseEnv, Globals};
use anyhow::{Context, Result};
use chrono::DateTime;
use console::style;

/// Show commits from HEAD, newest first.
pub fn run(globals: &Globals, limit: Option<usize>) -> Result<()> {
    let env = CourseEnv::open(globals)?;
    let repo = env.repository();
    let history = repo
        .history(&env.course, limit.unwrap_or(usize::MAX))
        .context("Failed to read course history (run `ced init` first?)")?;

    if history.is_empty() {
        println!("No commits found.");
        return Ok(());
    }

    let remote = repo.remote_head(&env.course)?;
    for (id, commit) in &history {
        let timestamp = DateTime::from_timestamp(commit.timestamp_unix as i64, 0).unwrap_or_default();
        let formatted_time = timestamp.format("%Y-%m-%d %H:%M:%S UTC");

        if remote == Some(*id) {
            println!("commit {} {}", id.as_hex(), style("(remote)").cyan());
        } else {
            println!("commit {}", id.as_hex());
        }
        println!("Author: {}", commit.author);
        println!("Date:   {}", formatted_time);
        println!();
        println!("    {}", commit.message);
        println!();
    }

    Ok(())
}
