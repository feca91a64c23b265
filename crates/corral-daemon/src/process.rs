//! Process supervisor primitive (C5, §4.5).
//!
//! Not a long-lived component of its own -- a set of contracts (`launch`, `running`,
//! `stop`, `run`) used by the plugin kinds (C6), the plugin orchestrator (C7), and the
//! session manager (C8) to drive opaque child processes. Standard output/error of
//! long-lived children is discarded; the core never interprets it.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use corral_core::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;

/// Outcome of a fire-and-wait invocation (`run`), used by health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Exited(i32),
    TimedOut,
}

impl RunOutcome {
    /// Health checks treat anything but a zero exit as unhealthy.
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Exited(0))
    }
}

fn build_command(
    executable: &str,
    args: &[String],
    env: &HashMap<String, String>,
    cwd: Option<&Path>,
) -> Command {
    let mut cmd = Command::new(executable);
    cmd.args(args);
    cmd.envs(env);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd
}

fn check_executable(executable: &str) -> Result<()> {
    if executable.trim().is_empty() {
        return Err(Error::process_launch("executable is empty"));
    }
    if which::which(executable).is_err() && !Path::new(executable).exists() {
        return Err(Error::process_launch(format!(
            "executable {executable:?} not found on PATH"
        )));
    }
    Ok(())
}

/// A running (or exited) child process owned by exactly one caller -- a plugin
/// instance or a session. Only that owner may call `stop` on it.
pub struct ProcessHandle {
    child: Option<Child>,
    pid: Option<u32>,
    label: String,
}

impl ProcessHandle {
    /// Starts `executable args...` with `env` merged into the inherited environment
    /// and an optional working directory. Fails if `executable` is empty or not
    /// findable, matching §4.5's `launch` contract.
    pub fn launch(
        executable: &str,
        args: &[String],
        env: &HashMap<String, String>,
        cwd: Option<&Path>,
    ) -> Result<Self> {
        check_executable(executable)?;

        let mut cmd = build_command(executable, args, env, cwd);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        info!("launching process: {executable} {}", args.join(" "));

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::process_launch(format!("failed to spawn {executable:?}: {e}")))?;

        let pid = child.id();
        let label = executable.to_string();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(discard_lines(stdout, label.clone(), false));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(discard_lines(stderr, label.clone(), true));
        }

        Ok(Self {
            child: Some(child),
            pid,
            label,
        })
    }

    /// True iff the child has not yet reported exit. A handle that never launched
    /// (or has already been reaped by `stop`) reports `false`.
    pub fn running(&mut self) -> bool {
        match &mut self.child {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// The OS process id, if the child started successfully.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Politely request exit, escalating to a forced kill if the child has not
    /// exited within `grace`. Idempotent and safe to call on an already-exited or
    /// never-started handle.
    pub async fn stop(&mut self, grace: Duration) {
        let Some(child) = self.child.as_mut() else {
            return;
        };

        if matches!(child.try_wait(), Ok(Some(_))) {
            self.child = None;
            return;
        }

        request_graceful_exit(child.id());

        match timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!("process {} ({:?}) exited: {:?}", self.label, self.pid, status);
            }
            Ok(Err(e)) => {
                warn!("error waiting for process {}: {e}", self.label);
                let _ = child.kill().await;
            }
            Err(_) => {
                warn!(
                    "process {} ({:?}) did not exit within {:?}, force killing",
                    self.label, self.pid, grace
                );
                let _ = child.kill().await;
                let _ = child.wait().await;
            }
        }

        self.child = None;
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if matches!(child.try_wait(), Ok(None)) {
                warn!("ProcessHandle for {} dropped while still running", self.label);
            }
        }
        // kill_on_drop(true) on the underlying Command handles actual cleanup.
    }
}

#[cfg(unix)]
fn request_graceful_exit(pid: Option<u32>) {
    // SAFETY: libc::kill with SIGTERM on our own child's pid; ESRCH (already
    // exited) is expected and harmless -- we don't check the return value.
    if let Some(pid) = pid {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn request_graceful_exit(_pid: Option<u32>) {
    // No portable "ask nicely" signal on non-Unix; the grace-period wait below
    // still gives the child a chance to exit on its own before we force-kill it.
}

async fn discard_lines<R>(reader: R, label: String, is_stderr: bool)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if is_stderr {
            trace!("{label} stderr: {line}");
        } else {
            trace!("{label} stdout: {line}");
        }
    }
}

/// Fire-and-wait variant used for health checks (§4.5's `run`): spawns, waits up to
/// `run_timeout`, and reports the exit code or a timeout. The child is killed if the
/// timeout elapses first.
pub async fn run(
    executable: &str,
    args: &[String],
    env: &HashMap<String, String>,
    cwd: Option<&Path>,
    run_timeout: Duration,
) -> Result<RunOutcome> {
    check_executable(executable)?;

    let mut cmd = build_command(executable, args, env, cwd);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());
    cmd.kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| Error::process_launch(format!("failed to spawn {executable:?}: {e}")))?;

    match timeout(run_timeout, child.wait()).await {
        Ok(Ok(status)) => Ok(RunOutcome::Exited(status.code().unwrap_or(-1))),
        Ok(Err(e)) => Err(Error::process_launch(format!("wait failed: {e}"))),
        Err(_) => {
            let _ = child.kill().await;
            Ok(RunOutcome::TimedOut)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn launch_rejects_empty_executable() {
        let result = ProcessHandle::launch("", &[], &HashMap::new(), None);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn launch_rejects_unfindable_executable() {
        let result = ProcessHandle::launch(
            "corral-definitely-not-a-real-binary",
            &[],
            &HashMap::new(),
            None,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn launch_and_wait_for_true_exit() {
        let mut handle =
            ProcessHandle::launch("true", &[], &HashMap::new(), None).expect("spawn true");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.running());
        handle.stop(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let mut handle =
            ProcessHandle::launch("sleep", &["0.05".to_string()], &HashMap::new(), None)
                .expect("spawn sleep");
        handle.stop(Duration::from_millis(200)).await;
        handle.stop(Duration::from_millis(200)).await;
        assert!(!handle.running());
    }

    #[tokio::test]
    async fn stop_force_kills_after_grace() {
        let mut handle =
            ProcessHandle::launch("sleep", &["10".to_string()], &HashMap::new(), None)
                .expect("spawn sleep");
        assert!(handle.running());
        let start = std::time::Instant::now();
        handle.stop(Duration::from_millis(100)).await;
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(!handle.running());
    }

    #[tokio::test]
    async fn run_reports_exit_code() {
        let outcome = run("false", &[], &HashMap::new(), None, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Exited(1));
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn run_reports_timeout() {
        let outcome = run(
            "sleep",
            &["5".to_string()],
            &HashMap::new(),
            None,
            Duration::from_millis(100),
        )
        .await
        .unwrap();
        assert_eq!(outcome, RunOutcome::TimedOut);
    }
}
