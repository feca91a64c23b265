//! Test-only helpers for building controllable shell scripts, used by `corral-app`'s
//! orchestrator/session-manager tests to exercise real child-process lifecycles
//! without depending on any real automation-server binary.
//!
//! Gated behind `test-helpers` so it never ships in a release build; `corral-app`
//! pulls it in only as a dev-dependency.

use std::fs;
use std::path::{Path, PathBuf};

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write test script");
    make_executable(&path);
    path
}

/// A script that sleeps for `seconds` then exits 0. Useful as a stand-in for a
/// long-running plugin/session process.
pub fn sleep_script(dir: &Path, name: &str, seconds: f64) -> PathBuf {
    write_script(dir, name, &format!("sleep {seconds}\nexit 0"))
}

/// A script that exits immediately with `code`.
pub fn exit_script(dir: &Path, name: &str, code: i32) -> PathBuf {
    write_script(dir, name, &format!("exit {code}"))
}

/// A script that appends one line to `log_path` every time it is invoked, then
/// exits 0. Lets a test count how many times something was launched.
pub fn counting_script(dir: &Path, name: &str, log_path: &Path) -> PathBuf {
    write_script(
        dir,
        name,
        &format!("echo invoked >> {:?}\nexit 0", log_path.display().to_string()),
    )
}

/// A health-check script that fails (exit 1) the first `fail_times` invocations
/// (tracked via a counter file under `state_dir`) and succeeds (exit 0) after
/// that. Used to drive the §8 S5 health-driven-restart scenario deterministically.
pub fn flaky_health_script(dir: &Path, name: &str, state_dir: &Path, fail_times: u32) -> PathBuf {
    let counter_path = state_dir.join(format!("{name}.count"));
    write_script(
        dir,
        name,
        &format!(
            "COUNT_FILE={counter:?}\n\
             COUNT=$(cat \"$COUNT_FILE\" 2>/dev/null || echo 0)\n\
             COUNT=$((COUNT + 1))\n\
             echo \"$COUNT\" > \"$COUNT_FILE\"\n\
             if [ \"$COUNT\" -le {fail_times} ]; then exit 1; else exit 0; fi",
            counter = counter_path.display().to_string(),
        ),
    )
}
