//! File-creation directives embedded in model replies.
//!
//! A directive looks like
//!
//! ```text
//! <file:notes/todo.md>
//! - buy milk
//! </file>
//! ```
//!
//! The opening marker must be followed by a line break and the closing
//! marker must start a line. Paths come from the model and are untrusted:
//! rooted paths and `..` segments are rejected before any filesystem access.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{info, warn};

const OPEN_MARKER: &str = "<file:";
const CLOSE_MARKER: &str = "</file>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDirective {
    pub relative_path: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyPath,
    ParentTraversal,
    Rooted,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::EmptyPath => write!(f, "empty path"),
            RejectReason::ParentTraversal => write!(f, "path escapes the working directory"),
            RejectReason::Rooted => write!(f, "absolute paths are not allowed"),
        }
    }
}

#[derive(Debug)]
pub enum DirectiveOutcome {
    Written { path: PathBuf },
    Rejected { path: String, reason: RejectReason },
    Failed { path: PathBuf, error: io::Error },
}

impl DirectiveOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, DirectiveOutcome::Written { .. })
    }
}

/// Scan `reply` for well-formed directives, in order of appearance.
pub fn extract_directives(reply: &str) -> Vec<FileDirective> {
    let mut directives = Vec::new();
    let mut cursor = 0;

    while let Some(found) = reply[cursor..].find(OPEN_MARKER) {
        let path_start = cursor + found + OPEN_MARKER.len();
        let rest = &reply[path_start..];

        let Some(path_end) = rest.find(['>', '\n']) else {
            break;
        };
        if !rest[path_end..].starts_with('>') {
            cursor = path_start;
            continue;
        }

        let after_marker = path_start + path_end + 1;
        let body_start = if reply[after_marker..].starts_with("\r\n") {
            after_marker + 2
        } else if reply[after_marker..].starts_with('\n') {
            after_marker + 1
        } else {
            cursor = path_start;
            continue;
        };

        // Without a close marker here, no later opening can have one either.
        let Some(close_start) = find_close_marker(reply, body_start) else {
            break;
        };

        directives.push(FileDirective {
            relative_path: rest[..path_end].trim().to_string(),
            content: reply[body_start..close_start].trim().to_string(),
        });
        cursor = close_start + CLOSE_MARKER.len();
    }

    directives
}

fn find_close_marker(reply: &str, body_start: usize) -> Option<usize> {
    let mut from = body_start;
    while let Some(found) = reply[from..].find(CLOSE_MARKER) {
        let position = from + found;
        if position == body_start || reply[..position].ends_with('\n') {
            return Some(position);
        }
        from = position + CLOSE_MARKER.len();
    }
    None
}

/// Reject paths that could land outside the base directory.
pub fn validate_path(path: &str) -> Result<(), RejectReason> {
    if path.is_empty() {
        return Err(RejectReason::EmptyPath);
    }

    let bytes = path.as_bytes();
    let has_drive_prefix = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    if path.starts_with(['/', '\\']) || has_drive_prefix || Path::new(path).has_root() {
        return Err(RejectReason::Rooted);
    }

    if path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(RejectReason::ParentTraversal);
    }

    Ok(())
}

/// Extract directives and write them relative to the current directory.
pub fn extract_and_write(reply: &str) -> Vec<DirectiveOutcome> {
    extract_and_write_in(reply, Path::new("."))
}

pub fn extract_and_write_in(reply: &str, base_dir: &Path) -> Vec<DirectiveOutcome> {
    extract_directives(reply)
        .into_iter()
        .map(|directive| apply_directive(&directive, base_dir))
        .collect()
}

fn apply_directive(directive: &FileDirective, base_dir: &Path) -> DirectiveOutcome {
    if let Err(reason) = validate_path(&directive.relative_path) {
        warn!(path = %directive.relative_path, %reason, "rejected file directive");
        return DirectiveOutcome::Rejected {
            path: directive.relative_path.clone(),
            reason,
        };
    }

    let path = PathBuf::from(&directive.relative_path);
    match write_file(&base_dir.join(&path), &directive.content) {
        Ok(()) => {
            info!(path = %path.display(), bytes = directive.content.len(), "wrote file");
            DirectiveOutcome::Written { path }
        }
        Err(error) => {
            warn!(path = %path.display(), %error, "failed to write file");
            DirectiveOutcome::Failed { path, error }
        }
    }
}

fn write_file(target: &Path, content: &str) -> io::Result<()> {
    let parent = target
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut temp_file = NamedTempFile::new_in(parent)?;
    temp_file.write_all(content.as_bytes())?;
    temp_file.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(temp_file.path(), fs::Permissions::from_mode(0o644))?;
    }

    temp_file.persist(target).map_err(|err| err.error)?;
    Ok(())
}
