use anyhow::{anyhow, Result};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub fn open(path: &Path, kind: &str) -> Result<File> {
    match File::open(path) {
        Err(e) => Err(anyhow!("Opening {} file `{}`: {}", kind, path.display(), e)),
        Ok(file) => Ok(file),
    }
}

/// Reads `path`, returning `None` if it doesn't exist.
pub fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Replaces `path` with `contents` by writing a sibling temp file, syncing
/// it, and renaming it over the target. Readers see either the old file or
/// the new one, never a partial write.
pub fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp = temp_path(path)?;
    let written = File::create(&temp).and_then(|mut file| {
        file.write_all(contents.as_bytes())?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|_| fs::rename(&temp, path)) {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }
    Ok(())
}

fn temp_path(target: &Path) -> io::Result<PathBuf> {
    let file_name = target.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("`{}` has no file name", target.display()),
        )
    })?;
    let mut temp_name = std::ffi::OsString::from(".");
    temp_name.push(file_name);
    temp_name.push(".tmp");
    Ok(target.with_file_name(temp_name))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_write_atomic_creates_and_replaces() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("blogs.json");

        write_atomic(&path, "[]")?;
        assert_eq!("[]", fs::read_to_string(&path)?);

        write_atomic(&path, "[1]")?;
        assert_eq!("[1]", fs::read_to_string(&path)?);
        assert!(!dir.path().join("nested").join(".blogs.json.tmp").exists());
        Ok(())
    }

    #[test]
    fn test_read_optional() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sitemap.xml");
        assert_eq!(None, read_optional(&path)?);
        fs::write(&path, "<urlset></urlset>")?;
        assert_eq!(Some("<urlset></urlset>".to_owned()), read_optional(&path)?);
        Ok(())
    }
}
