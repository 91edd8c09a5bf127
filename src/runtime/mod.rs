pub mod claude;
pub mod codex;
pub mod gemini;

mod arguments;
mod instance;
mod registry;
mod session_log;

pub use registry::RuntimeRegistry;

use std::path::Path;
use std::process::Command;

use crate::agent::{RuntimeError, RuntimeInfo, RuntimeKind};

/// Runs `<program> --version` and extracts the first `N.N.N` token from its
/// combined output.
pub(crate) fn probe_version(kind: RuntimeKind, program: &Path) -> Result<RuntimeInfo, RuntimeError> {
    let output = Command::new(program)
        .arg("--version")
        .output()
        .map_err(|source| RuntimeError::VersionProbe { kind, source })?;

    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );

    match find_semver(&combined) {
        Some(version) => Ok(RuntimeInfo {
            version: version.to_string(),
        }),
        None => Err(RuntimeError::VersionParse {
            kind,
            output: combined.trim().to_string(),
        }),
    }
}

fn find_semver(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        if !bytes[index].is_ascii_digit() {
            index += 1;
            continue;
        }

        let start = index;
        let mut cursor = index;
        let mut groups = 0;
        loop {
            let digits_start = cursor;
            while cursor < bytes.len() && bytes[cursor].is_ascii_digit() {
                cursor += 1;
            }
            if cursor == digits_start {
                break;
            }
            groups += 1;
            if groups == 3 {
                return Some(&text[start..cursor]);
            }
            if cursor < bytes.len() && bytes[cursor] == b'.' {
                cursor += 1;
            } else {
                break;
            }
        }

        // Skip past this digit run so the scan does not retry inside it.
        while index < bytes.len() && (bytes[index].is_ascii_digit() || bytes[index] == b'.') {
            index += 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_first_semver_token() {
        assert_eq!(find_semver("claude-code 1.0.0-mock"), Some("1.0.0"));
        assert_eq!(find_semver("v2.13.4 (build 7)"), Some("2.13.4"));
        assert_eq!(find_semver("codex 0.9"), None);
        assert_eq!(find_semver("no version here"), None);
        assert_eq!(find_semver("build 20260801 then 1.2.3"), Some("1.2.3"));
    }
}
