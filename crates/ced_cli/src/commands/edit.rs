//! Mutation commands. Each builds an editor and hands it to the runner.

use super::{CourseEnv, Globals};
use anyhow::{bail, Context, Result};
use ced_core::{
    property_value_with_default, AddEditor, ContentFingerprint, CopyEditor, DeleteEditor, Editor,
    EntityKind, InfoFile, JobStore, ModifyEditor, MultiEditor, PathScope, RenameEditor,
    RunFailure, WorkingCopy,
};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::path::Path;

pub fn modify(
    globals: &Globals,
    scope: PathScope,
    path: &str,
    content_file: &Path,
    origin: &str,
) -> Result<()> {
    let env = CourseEnv::open(globals)?;
    let content = std::fs::read(content_file)
        .with_context(|| format!("Failed to read {}", content_file.display()))?;
    let origin = ContentFingerprint::from(origin);
    run_editor(&env, ModifyEditor::new(scope, path, origin, content).into())
}

pub fn rename(globals: &Globals, scope: PathScope, path: &str, new_path: &str) -> Result<()> {
    let env = CourseEnv::open(globals)?;
    run_editor(&env, RenameEditor::new(scope, path, new_path).into())
}

pub fn copy(globals: &Globals, scope: PathScope, path: &str, to: Option<&str>) -> Result<()> {
    let env = CourseEnv::open(globals)?;
    let mut editor =
        CopyEditor::new(scope, path).max_suffix(env.config.editor.max_copy_suffix);
    if let Some(to) = to {
        editor = editor.to(to);
    }
    run_editor(&env, editor.into())
}

pub fn delete(globals: &Globals, scope: PathScope, path: &str, tolerate_missing: bool) -> Result<()> {
    let env = CourseEnv::open(globals)?;
    let editor = DeleteEditor::new(scope, path)
        .tolerate_missing(tolerate_missing || env.config.editor.tolerate_missing_delete);
    run_editor(&env, editor.into())
}

pub fn add(
    globals: &Globals,
    scope: PathScope,
    kind: EntityKind,
    parent: &str,
    name: Option<&str>,
) -> Result<()> {
    let env = CourseEnv::open(globals)?;
    let mut editor = AddEditor::new(scope, kind, parent.trim_end_matches('/'))
        .max_suffix(env.config.editor.max_copy_suffix);
    if let Some(name) = name {
        editor = editor.named(name);
    }
    run_editor(&env, editor.into())
}

/// Rewrites properties of an info file and optionally moves its directory,
/// as one job and one commit.
pub fn update_info(
    globals: &Globals,
    scope: PathScope,
    info_file: &str,
    set: &[String],
    defaults: &[String],
    rename: Option<&str>,
    origin: &str,
) -> Result<()> {
    let env = CourseEnv::open(globals)?;
    let origin = ContentFingerprint::from(origin);
    let wc = WorkingCopy::new(&env.course.path);

    let bytes = wc
        .read(info_file)
        .with_context(|| format!("Failed to read {}", info_file))?;
    let mut info = InfoFile::parse(info_file, &bytes)?;

    let defaults = defaults
        .iter()
        .map(|d| parse_assignment(d))
        .collect::<Result<Vec<_>>>()?;
    for assignment in set {
        let (key, value) = parse_assignment(assignment)?;
        let default = defaults
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Null);
        match property_value_with_default(info.get(&key), value, default) {
            Some(value) => info.set(&key, value)?,
            None => {
                info.remove(&key);
            }
        }
    }

    let mut children: Vec<Editor> = vec![ModifyEditor::new(
        scope.clone(),
        info_file,
        origin,
        info.to_bytes()?,
    )
    .into()];
    if let Some(new_dir) = rename {
        let Some((dir, _)) = info_file.rsplit_once('/') else {
            bail!("{} is at the course root and has no directory to move", info_file);
        };
        children.push(RenameEditor::new(scope, dir, new_dir.trim_end_matches('/')).into());
    }

    let editor = MultiEditor::new(format!("Update {}", info_file), children);
    run_editor(&env, editor.into())
}

/// Parses `key=value`; the value is JSON if it parses, otherwise a string.
fn parse_assignment(raw: &str) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("Expected KEY=VALUE, got {:?}", raw);
    };
    if key.is_empty() {
        bail!("Empty property name in {:?}", raw);
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn run_editor(env: &CourseEnv, editor: Editor) -> Result<()> {
    let runner = env.runner()?;
    let ctx = env.context();

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(editor.description());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let result = runner.run(&ctx, &editor);
    pb.finish_and_clear();

    match result {
        Ok(outcome) => {
            println!("{} {}", style("✓").green(), editor.description());
            println!("  Resource: {}", outcome.resource);
            match outcome.commit {
                Some(commit) => println!("  Commit:   {}", commit.short()),
                None => println!("  Commit:   {}", style("(no changes)").dim()),
            }
            println!("  Job:      #{}", outcome.job_sequence_id);
            Ok(())
        }
        Err(RunFailure::Rejected(e)) => {
            eprintln!("{} {}", style("✗").red(), e);
            if let Some(hint) = e.recovery_suggestion() {
                eprintln!("  {} {}", style("Hint:").cyan(), hint);
            }
            bail!("Edit rejected")
        }
        Err(RunFailure::JobFailed(failure)) => {
            let id = failure.job_sequence_id;
            eprintln!("{} {}", style("✗").red(), editor.description());
            if let Ok(job) = runner.jobs().get(id) {
                for step in &job.steps {
                    if let Some(err) = &step.error {
                        eprintln!("  {} {}: {}", style("failed").red(), step.label, err);
                    }
                }
                if let Some(err) = &job.error {
                    eprintln!("  {} {}", style("error").red(), err);
                }
            }
            bail!("Job #{} failed; run `ced jobs show {}` for details", id, id)
        }
    }
}
