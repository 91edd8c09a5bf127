use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
#[error("no executable found among candidates: {candidates}")]
pub struct ExecutableLookupError {
    pub candidates: String,
}

/// Searches `$PATH` for the first candidate that resolves to an executable
/// file and returns its absolute path.
pub fn lookup_executable(candidates: &[&str]) -> Result<PathBuf, ExecutableLookupError> {
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    for candidate in candidates {
        for dir in std::env::split_paths(&path_var) {
            if dir.as_os_str().is_empty() {
                continue;
            }
            let full = dir.join(candidate);
            if is_executable_file(&full) {
                return Ok(full);
            }
        }
    }
    Err(ExecutableLookupError {
        candidates: candidates.join(", "),
    })
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(metadata) => metadata.is_file() && metadata.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}

/// Escalating shutdown of a runaway child: TERM, then KILL once the grace
/// window runs out. Returns once the process is gone or KILL has been sent.
pub fn terminate_process(pid: u32, grace: Duration) {
    if pid == 0 || !signal(pid, Signal::Probe) {
        return;
    }

    signal(pid, Signal::Term);

    let deadline = Instant::now() + grace;
    while signal(pid, Signal::Probe) {
        if Instant::now() >= deadline {
            signal(pid, Signal::Kill);
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
}

enum Signal {
    Probe,
    Term,
    Kill,
}

/// Delivers the signal via kill(1); `Probe` reports liveness through the
/// conventional signal 0. True means the process accepted the signal.
#[cfg(unix)]
fn signal(pid: u32, which: Signal) -> bool {
    use std::process::{Command, Stdio};

    let flag = match which {
        Signal::Probe => "-0",
        Signal::Term => "-TERM",
        Signal::Kill => "-KILL",
    };
    Command::new("kill")
        .args([flag, &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn signal(_pid: u32, _which: Signal) -> bool {
    false
}
