//! Initialize course metadata.

use super::{CourseEnv, Globals};
use anyhow::{Context, Result};
use ced_core::CONFIG_FILE;

/// Create `.course/`, write a default config if none exists, and snapshot
/// the current working copy.
pub fn run(globals: &Globals) -> Result<()> {
    let env = CourseEnv::open(globals)?;

    std::fs::create_dir_all(&env.config_dir)
        .with_context(|| format!("Failed to create {}", env.config_dir.display()))?;
    let config_path = env.config_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        env.config
            .save(&env.config_dir)
            .context("Failed to write configuration")?;
    }

    let repo = env.repository();
    let head = repo
        .init(&env.course)
        .context("Failed to initialize course repository")?;
    let files = repo.head_tree_paths(&env.course)?.len();

    println!(
        "Initialized course {} in {}",
        env.course.id,
        env.course.path.display()
    );
    println!();
    println!("  .course/objects/   - Snapshot storage");
    println!("  .course/refs/      - Branch pointers");
    println!("  .course/LOCK       - Edit lock");
    println!();
    println!("Configuration: {}", config_path.display());
    println!("HEAD: {} ({} files)", head.as_hex(), files);

    Ok(())
}
