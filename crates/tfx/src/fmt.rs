//! `terraform fmt` invocation.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const FMT_TIMEOUT: Duration = Duration::from_secs(30);

/// Command names to try, in order. Windows installs commonly expose
/// `terraform.exe` only.
fn candidates() -> &'static [&'static str] {
    if cfg!(windows) {
        &["terraform.exe", "terraform"]
    } else {
        &["terraform"]
    }
}

/// Formats `path` with `terraform fmt`, bounded by a 30 second wait.
///
/// A missing binary, a timeout and a non-zero exit are all reported and
/// swallowed; formatting never fails the run.
pub fn format_file(path: &Path) {
    let workdir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    for command in candidates().iter().copied() {
        let spawned = Command::new(command)
            .arg("fmt")
            .arg(path)
            .current_dir(workdir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => continue,
            Err(error) => {
                tracing::warn!(command, %error, "failed to start terraform fmt");
                return;
            }
        };

        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => {
                    tracing::info!("terraform file formatted");
                    return;
                }
                Ok(Some(status)) => {
                    tracing::warn!(%status, "terraform fmt reported a problem");
                    return;
                }
                Ok(None) if started.elapsed() >= FMT_TIMEOUT => {
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::warn!(command, "terraform fmt timed out");
                    return;
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(50)),
                Err(error) => {
                    tracing::warn!(%error, "failed waiting for terraform fmt");
                    return;
                }
            }
        }
    }

    tracing::warn!("terraform command not found, skipping formatting");
}
