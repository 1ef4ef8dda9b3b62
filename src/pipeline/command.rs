//! Bounded execution of external command-line tools.
//!
//! Every external rasteriser / OCR invocation goes through [`run_tool`], which turns
//! "spawn failed", "non-zero exit" and "took too long" into one typed
//! [`ToolFailure`]. In-process backends run under [`run_blocking`] and report
//! through the same type, so adapters map that into the matching
//! [`crate::error::DocumentError`] variant.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// Why an external tool invocation did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolFailure {
    /// The program could not be started (missing binary, permissions).
    #[error("could not start: {0}")]
    Spawn(String),
    /// The program ran and exited unsuccessfully.
    #[error("exited with status {}{}", exit_status(.code), stderr_suffix(.stderr))]
    Exit { code: Option<i32>, stderr: String },
    /// The program was killed after exceeding the timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },
    /// An in-process backend (pdfium, image decoder) reported an error.
    #[error("{0}")]
    Backend(String),
}

fn exit_status(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Run `program args…`, returning captured stdout on success.
///
/// The child is killed if `timeout` elapses; stderr is trimmed to its last
/// few hundred bytes for error messages.
pub async fn run_tool(
    program: &Path,
    args: &[&OsStr],
    timeout: Duration,
) -> Result<Vec<u8>, ToolFailure> {
    let start = Instant::now();
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| ToolFailure::Spawn(format!("{}: {e}", program.display())))?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(ToolFailure::Spawn(e.to_string())),
        Err(_) => {
            return Err(ToolFailure::Timeout {
                secs: timeout.as_secs(),
            })
        }
    };

    debug!(
        "{} finished in {:?} with {}",
        program.display(),
        start.elapsed(),
        output.status
    );

    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(ToolFailure::Exit {
            code: output.status.code(),
            stderr: tail(&String::from_utf8_lossy(&output.stderr), 400),
        })
    }
}

/// Check that `program` can be launched at all (`program <flag>`), returning
/// the first line of its stdout.
pub async fn probe(program: &Path, flag: &str, timeout: Duration) -> Result<String, ToolFailure> {
    let out = run_tool(program, &[OsStr::new(flag)], timeout).await?;
    let text = String::from_utf8_lossy(&out);
    Ok(text.lines().next().unwrap_or("").trim().to_string())
}

/// Cooperative stop signal handed to blocking backends.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run an in-process backend on the blocking pool under `timeout`.
///
/// On expiry the task's [`CancelFlag`] is raised and this waits for the task
/// to return before reporting [`ToolFailure::Timeout`]. Once this returns, the
/// task no longer touches anything it was given. `work` must check the flag
/// between units of work.
pub async fn run_blocking<T, F>(timeout: Duration, work: F) -> Result<T, ToolFailure>
where
    T: Send + 'static,
    F: FnOnce(&CancelFlag) -> Result<T, ToolFailure> + Send + 'static,
{
    let cancel = CancelFlag::default();
    let flag = cancel.clone();
    let mut task = tokio::task::spawn_blocking(move || work(&flag));

    match tokio::time::timeout(timeout, &mut task).await {
        Ok(joined) => {
            joined.map_err(|e| ToolFailure::Backend(format!("backend task panicked: {e}")))?
        }
        Err(_) => {
            cancel.cancel();
            let started = Instant::now();
            let _ = task.await;
            debug!("cancelled backend stopped {:?} after timeout", started.elapsed());
            Err(ToolFailure::Timeout {
                secs: timeout.as_secs(),
            })
        }
    }
}

fn tail(s: &str, max: usize) -> String {
    let s = s.trim();
    if s.len() <= max {
        return s.to_string();
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    format!("…{}", &s[start..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn tail_keeps_short_strings() {
        assert_eq!(tail("  oops \n", 10), "oops");
        assert_eq!(tail("abcdefghij", 4), "…ghij");
    }

    #[test]
    fn failure_display() {
        let f = ToolFailure::Exit {
            code: Some(1),
            stderr: "bad input".into(),
        };
        assert_eq!(f.to_string(), "exited with status 1: bad input");
        assert_eq!(ToolFailure::Timeout { secs: 3 }.to_string(), "timed out after 3s");

        let killed = ToolFailure::Exit {
            code: None,
            stderr: String::new(),
        };
        assert_eq!(killed.to_string(), "exited with status signal");
    }

    #[test]
    fn failure_is_a_std_error() {
        let boxed: Box<dyn std::error::Error + Send + Sync> =
            Box::new(ToolFailure::Spawn("tesseract: not found".into()));
        assert_eq!(boxed.to_string(), "could not start: tesseract: not found");
        assert!(boxed.source().is_none());
    }

    #[tokio::test]
    async fn missing_program_is_spawn_failure() {
        let err = run_tool(
            &PathBuf::from("definitely-not-a-real-tool-4821"),
            &[],
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolFailure::Spawn(_)), "got: {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_reported() {
        let err = run_tool(&PathBuf::from("false"), &[], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolFailure::Exit { code: Some(1), .. }), "got: {err:?}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn timed_out_backend_stops_before_returning() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().to_path_buf();
        let finished = Arc::new(AtomicBool::new(false));
        let done = Arc::clone(&finished);

        let err = run_blocking(Duration::from_millis(100), move |cancel| {
            let mut page = 0;
            while !cancel.is_cancelled() {
                page += 1;
                std::fs::write(out.join(format!("page-{page:04}.png")), b"x")
                    .map_err(|e| ToolFailure::Backend(e.to_string()))?;
                std::thread::sleep(Duration::from_millis(20));
            }
            done.store(true, Ordering::SeqCst);
            Ok(page)
        })
        .await
        .unwrap_err();

        assert_eq!(err, ToolFailure::Timeout { secs: 0 });
        assert!(finished.load(Ordering::SeqCst));

        let written = std::fs::read_dir(dir.path()).unwrap().count();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), written);
        assert!(dir.close().is_ok());
    }

    #[tokio::test]
    async fn fast_backend_returns_its_value() {
        let pages = run_blocking(Duration::from_secs(5), |_| Ok(3usize)).await;
        assert_eq!(pages, Ok(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_program_times_out() {
        let err = run_tool(
            &PathBuf::from("sleep"),
            &[OsStr::new("5")],
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolFailure::Timeout { .. }), "got: {err:?}");
    }
}
