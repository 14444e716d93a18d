//! A marker file recording a commit in progress. It is written before the
//! first artifact and removed once every artifact has been written, so a
//! leftover journal means an earlier run stopped partway through.

use crate::util::{read_optional, write_atomic};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// The journal's file name in the site root.
pub const JOURNAL_FILE: &str = ".postsplice-pending.json";

/// What a run intended to write.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct Journal {
    pub slug: String,
    pub started: DateTime<Local>,
    pub artifacts: Vec<PathBuf>,
}

pub fn path(site_root: &Path) -> PathBuf {
    site_root.join(JOURNAL_FILE)
}

/// Records that a commit is starting.
pub fn begin(site_root: &Path, journal: &Journal) -> io::Result<()> {
    let contents = serde_json::to_string_pretty(journal)?;
    write_atomic(&path(site_root), &contents)
}

/// Removes the journal after a complete commit.
pub fn finish(site_root: &Path) -> io::Result<()> {
    match std::fs::remove_file(path(site_root)) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Returns the journal left by an earlier incomplete run, if any. An
/// unreadable journal is reported with no details.
pub fn pending(site_root: &Path) -> io::Result<Option<Option<Journal>>> {
    Ok(read_optional(&path(site_root))?.map(|text| serde_json::from_str(&text).ok()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_begin_pending_finish() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(pending(dir.path())?.is_none());

        let journal = Journal {
            slug: "5-tips".to_owned(),
            started: Local::now(),
            artifacts: vec![dir.path().join("blog/5-tips.html")],
        };
        begin(dir.path(), &journal)?;
        assert_eq!(Some(Some(journal)), pending(dir.path())?);

        finish(dir.path())?;
        assert!(pending(dir.path())?.is_none());
        finish(dir.path())
    }

    #[test]
    fn test_garbled_journal_is_still_pending() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(path(dir.path()), "{")?;
        assert_eq!(Some(None), pending(dir.path())?);
        Ok(())
    }
}
