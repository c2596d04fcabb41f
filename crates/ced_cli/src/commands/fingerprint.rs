//! Print a file fingerprint, for use as `--origin`.

use super::{CourseEnv, Globals};
use anyhow::Result;
use ced_core::{fingerprint_file, validate_relative_path};

pub fn run(globals: &Globals, path: &str) -> Result<()> {
    let env = CourseEnv::open(globals)?;
    validate_relative_path(path)?;
    let fp = fingerprint_file(&env.course.path.join(path))?;
    println!("{}", fp);
    Ok(())
}
