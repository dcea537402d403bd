//! Write extracted attachments to disk.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{DetachError, Result};
use crate::model::attachment::Attachment;

/// Permission bits of every saved attachment.
pub const FILE_MODE: u32 = 0o664;

/// Save all attachments into `dir`, returning the written paths.
///
/// Files are named by [`Attachment::file_name`]; a name that is already
/// taken gets a counter appended instead of being overwritten.
pub fn save_attachments(dir: &Path, attachments: &[Attachment]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(attachments.len());

    for (i, attachment) in attachments.iter().enumerate() {
        let name = attachment.file_name(i + 1);
        let path = unique_path(&dir.join(name));
        std::fs::write(&path, &attachment.data).map_err(|e| DetachError::io(&path, e))?;
        set_mode(&path, FILE_MODE)?;
        info!(path = %path.display(), size = attachment.data.len(), "Saved attachment");
        paths.push(path);
    }

    Ok(paths)
}

/// Apply Unix permission bits; a no-op elsewhere.
pub(crate) fn set_mode(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .map_err(|e| DetachError::io(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}

/// If `path` already exists, append a counter to make it unique.
fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("attachment");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    (1..)
        .map(|i| {
            if ext.is_empty() {
                parent.join(format!("{stem}_{i}"))
            } else {
                parent.join(format!("{stem}_{i}.{ext}"))
            }
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| parent.join(format!("{stem}_dup")))
}
