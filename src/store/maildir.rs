//! Maildir access: message files and their flag suffix.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{DetachError, Result};

/// A message file in the mail store.
///
/// Only files whose name contains a comma are message files; the part
/// after the last comma holds the delivery flags (`S` = seen).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailFile {
    pub path: PathBuf,
    pub flags: String,
}

impl MailFile {
    /// Build from a path, `None` when the file name carries no flag suffix.
    pub fn from_path(path: PathBuf) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let (_, flags) = name.rsplit_once(',')?;
        let flags = flags.to_string();
        Some(Self { path, flags })
    }

    /// Whether the message has been read already.
    pub fn is_seen(&self) -> bool {
        self.flags.contains('S')
    }

    /// Load the raw message bytes.
    pub fn read(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.path).map_err(|e| DetachError::io(&self.path, e))
    }
}

/// List the message files in `dir`, sorted by file name.
///
/// Subdirectories and files without a flag suffix are ignored.
pub fn list_messages(dir: &Path) -> Result<Vec<MailFile>> {
    let entries = std::fs::read_dir(dir).map_err(|e| DetachError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DetachError::io(dir, e))?;
        let is_file = entry
            .file_type()
            .map_err(|e| DetachError::io(entry.path(), e))?
            .is_file();
        if !is_file {
            continue;
        }
        match MailFile::from_path(entry.path()) {
            Some(file) => files.push(file),
            None => debug!(path = %entry.path().display(), "Not a maildir file, skipping"),
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Message files to look at, optionally leaving out the seen ones.
pub fn candidates(dir: &Path, exclude_seen: bool) -> Result<Vec<MailFile>> {
    let files = list_messages(dir)?;
    let total = files.len();
    let files: Vec<MailFile> = files
        .into_iter()
        .filter(|f| !(exclude_seen && f.is_seen()))
        .collect();
    debug!(
        dir = %dir.display(),
        total,
        kept = files.len(),
        exclude_seen,
        "Listed maildir"
    );
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_from_name() {
        let file = MailFile::from_path(PathBuf::from("/m/cur/1700000000.M1P2.host:2,RS")).unwrap();
        assert_eq!(file.flags, "RS");
        assert!(file.is_seen());

        let file = MailFile::from_path(PathBuf::from("169.,")).unwrap();
        assert_eq!(file.flags, "");
        assert!(!file.is_seen());
    }

    #[test]
    fn test_no_comma_is_not_a_message() {
        assert!(MailFile::from_path(PathBuf::from("168.")).is_none());
    }

    #[test]
    fn test_seen_uses_last_segment() {
        let file = MailFile::from_path(PathBuf::from("S,S,T")).unwrap();
        assert!(!file.is_seen());
    }

    #[test]
    fn test_candidates() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["167.,S", "168.", "169.,", "170.,FS"] {
            std::fs::write(tmp.path().join(name), b"Subject: x\n\n").unwrap();
        }
        std::fs::create_dir(tmp.path().join("sub,dir")).unwrap();

        let all: Vec<String> = candidates(tmp.path(), false)
            .unwrap()
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(all, vec!["167.,S", "169.,", "170.,FS"]);

        let unseen = candidates(tmp.path(), true).unwrap();
        assert_eq!(unseen.len(), 1);
        assert!(unseen[0].path.ends_with("169.,"));
        assert_eq!(unseen[0].read().unwrap(), b"Subject: x\n\n");
    }

    #[test]
    fn test_missing_dir_is_io_error() {
        let err = list_messages(Path::new("/nonexistent/detach/maildir")).unwrap_err();
        assert!(matches!(err, DetachError::Io { .. }));
    }
}
