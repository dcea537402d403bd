//! Attachment directory naming and creation.
//!
//! The configured `dir` and `url` prefixes are each joined with the
//! `pattern`, run through `strftime` with the current UTC time, and the
//! `{}` placeholder is replaced by a suffix the operator types in.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::attachment::set_mode;
use crate::error::{DetachError, Result};
use crate::prompt::Operator;

/// Permission bits of a created attachment directory.
pub const DIR_MODE: u32 = 0o775;

/// Placeholder for the operator-chosen suffix.
pub const SUFFIX_PLACEHOLDER: &str = "{}";

const SUFFIX_PROMPT: &str = "attachment directory name (only suffix): ";

/// Where one message's attachments went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub dir: PathBuf,
    pub url: Option<String>,
}

/// Validated directory and URL templates.
#[derive(Debug, Clone)]
pub struct DestinationPattern {
    dir: String,
    url: Option<String>,
}

impl DestinationPattern {
    /// Join the prefixes with `pattern` and check the strftime tokens.
    pub fn new(dir: &str, url: Option<&str>, pattern: &str) -> Result<Self> {
        let dir = format!("{dir}{pattern}");
        check_strftime(&dir)?;
        let url = match url {
            Some(prefix) => {
                let url = format!("{prefix}{pattern}");
                check_strftime(&url)?;
                Some(url)
            }
            None => None,
        };
        Ok(Self { dir, url })
    }

    /// Directory template, before expansion.
    pub fn dir_template(&self) -> &str {
        &self.dir
    }

    /// Expand both templates for `now` and `suffix`.
    pub fn resolve(&self, now: DateTime<Utc>, suffix: &str) -> Destination {
        Destination {
            dir: PathBuf::from(expand(&self.dir, now, suffix)),
            url: self.url.as_deref().map(|u| expand(u, now, suffix)),
        }
    }

    /// Ask the operator for suffixes until a directory that did not exist
    /// before could be created.
    ///
    /// Missing parent directories are created on the way; the leaf itself
    /// is never reused.
    pub fn create(&self, now: DateTime<Utc>, operator: &mut dyn Operator) -> Result<Destination> {
        loop {
            let suffix = operator.suffix(SUFFIX_PROMPT)?;
            let destination = self.resolve(now, &suffix);
            match create_fresh_dir(&destination.dir) {
                Ok(()) => {
                    info!(dir = %destination.dir.display(), "Created attachment directory");
                    return Ok(destination);
                }
                Err(DetachError::DirectoryExists(dir)) => {
                    warn!(dir = %dir.display(), "Attachment directory exists");
                    operator.notify("File exists, use a different path");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Reject templates chrono cannot format.
fn check_strftime(template: &str) -> Result<()> {
    if StrftimeItems::new(template).any(|item| matches!(item, Item::Error)) {
        return Err(DetachError::InvalidPattern {
            pattern: template.to_string(),
            reason: "unknown or incomplete strftime specifier".to_string(),
        });
    }
    Ok(())
}

/// Format a template already accepted by [`check_strftime`].
fn expand(template: &str, now: DateTime<Utc>, suffix: &str) -> String {
    now.format_with_items(StrftimeItems::new(template))
        .to_string()
        .replace(SUFFIX_PLACEHOLDER, suffix)
}

/// Create `dir` (and its parents), failing if `dir` itself exists.
fn create_fresh_dir(dir: &Path) -> Result<()> {
    if let Some(parent) = dir.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DetachError::io(parent, e))?;
    }
    match std::fs::create_dir(dir) {
        Ok(()) => set_mode(dir, DIR_MODE),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            Err(DetachError::DirectoryExists(dir.to_path_buf()))
        }
        Err(e) => Err(DetachError::io(dir, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::Choice;
    use chrono::TimeZone;

    struct Suffixes {
        answers: Vec<String>,
        notes: Vec<String>,
    }

    impl Operator for Suffixes {
        fn notify(&mut self, text: &str) {
            self.notes.push(text.to_string());
        }
        fn choose(&mut self, _: &str, options: &[Choice]) -> Result<Choice> {
            Ok(options[0])
        }
        fn suffix(&mut self, _: &str) -> Result<String> {
            if self.answers.is_empty() {
                return Err(DetachError::Prompt);
            }
            Ok(self.answers.remove(0))
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap()
    }

    #[test]
    fn test_resolve() {
        let pattern =
            DestinationPattern::new("/srv/att/", Some("https://x.org/att/"), "%Y-%m-%d_{}").unwrap();
        let dest = pattern.resolve(now(), "minutes");
        assert_eq!(dest.dir, PathBuf::from("/srv/att/2024-03-09_minutes"));
        assert_eq!(dest.url.as_deref(), Some("https://x.org/att/2024-03-09_minutes"));
    }

    #[test]
    fn test_no_url() {
        let pattern = DestinationPattern::new("/srv/", None, "{}").unwrap();
        assert_eq!(pattern.resolve(now(), "x").url, None);
    }

    #[test]
    fn test_invalid_strftime_is_rejected() {
        let err = DestinationPattern::new("/srv/", None, "%Y-%Q_{}").unwrap_err();
        assert!(matches!(err, DetachError::InvalidPattern { .. }));
    }

    #[test]
    fn test_create_reprompts_on_collision() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("2024/taken")).unwrap();
        let dir = format!("{}/", tmp.path().display());
        let pattern = DestinationPattern::new(&dir, None, "%Y/{}").unwrap();

        let mut op = Suffixes {
            answers: vec!["taken".into(), "fresh".into()],
            notes: Vec::new(),
        };
        let dest = pattern.create(now(), &mut op).unwrap();

        assert_eq!(dest.dir, tmp.path().join("2024/fresh"));
        assert!(dest.dir.is_dir());
        assert_eq!(op.notes, vec!["File exists, use a different path"]);
    }

    #[test]
    fn test_create_makes_parents() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = format!("{}/a/b/", tmp.path().display());
        let pattern = DestinationPattern::new(&dir, None, "{}").unwrap();
        let mut op = Suffixes {
            answers: vec!["c".into()],
            notes: Vec::new(),
        };
        let dest = pattern.create(now(), &mut op).unwrap();
        assert!(dest.dir.ends_with("a/b/c"));
        assert!(dest.dir.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_dir_mode() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("d");
        create_fresh_dir(&dir).unwrap();
        let mode = std::fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, DIR_MODE);
    }
}
