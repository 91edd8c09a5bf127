use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Replaces `path` by staging the record in a uniquely named sibling `.part`
/// file and renaming it into place. A concurrent reader observes either the
/// previous record or the new one, never a torn write.
pub fn replace_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let staged = staging_path(path);

    let mut file = File::options().write(true).create_new(true).open(&staged)?;
    if let Err(err) = file.write_all(content).and_then(|_| file.sync_all()) {
        drop(file);
        let _ = fs::remove_file(&staged);
        return Err(err);
    }
    drop(file);

    if let Err(err) = fs::rename(&staged, path) {
        let _ = fs::remove_file(&staged);
        return Err(err);
    }

    flush_directory(path)
}

/// Dotted sibling name that cannot collide across processes (pid) or within
/// one (sequence counter), so `create_new` never trips over a leftover.
fn staging_path(path: &Path) -> PathBuf {
    let record = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("record");
    let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut staged = path.to_path_buf();
    staged.set_file_name(format!(".{record}.{}-{seq}.part", std::process::id()));
    staged
}

/// Replaces `path` through the fixed temp name `<path>~`, refusing to run
/// when that temp file already exists (another writer may hold it).
pub fn replace_via_tilde_temp(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut tmp_os = path.as_os_str().to_os_string();
    tmp_os.push("~");
    let tmp_path = PathBuf::from(tmp_os);

    if tmp_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("temp file {} already exists", tmp_path.display()),
        ));
    }

    fs::write(&tmp_path, content)?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }

    Ok(())
}

#[cfg(unix)]
fn flush_directory(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) => File::open(dir)?.sync_all(),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn flush_directory(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn replace_overwrites_existing_content() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        replace_file(&path, b"first").expect("first write");
        replace_file(&path, b"second").expect("second write");
        assert_eq!(fs::read(&path).expect("read"), b"second");
    }

    #[test]
    fn replace_leaves_no_staging_files_behind() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        replace_file(&path, b"a").expect("first write");
        replace_file(&path, b"b").expect("second write");

        let stray: Vec<_> = fs::read_dir(dir.path())
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(stray.is_empty());
    }

    #[test]
    fn staging_names_differ_between_writes() {
        let path = Path::new("/tmp/state.json");
        assert_ne!(staging_path(path), staging_path(path));
    }

    #[test]
    fn tilde_temp_refuses_when_temp_exists() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        let tmp = dir.path().join("config.json~");
        fs::write(&tmp, b"stale").expect("seed temp");

        let err = replace_via_tilde_temp(&path, b"{}").expect_err("must refuse");
        assert_eq!(err.kind(), std::io::ErrorKind::AlreadyExists);
        assert!(!path.exists());
    }

    #[test]
    fn tilde_temp_is_removed_after_replace() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        replace_via_tilde_temp(&path, b"{\"a\":1}").expect("write");
        assert_eq!(fs::read(&path).expect("read"), b"{\"a\":1}");
        assert!(!dir.path().join("config.json~").exists());
    }
}
