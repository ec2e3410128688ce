//! Path utilities shared by the loaders and the bundle writer.
//!
//! Container members are addressed by `/`-separated strings regardless of the
//! platform; on-disk paths are validated through a lossy conversion so that non
//! UTF-8 names never abort a run.

use crate::error::{Error, Result};

use std::path::Path;

/// Maximum path length for Windows without long path support
const WINDOWS_MAX_PATH: usize = 260;

/// Windows long path prefix
const WINDOWS_LONG_PATH_PREFIX: &str = r"\\?\";

/// Directory created by macOS archivers next to the real content.
const MACOS_METADATA_DIR: &str = "__MACOSX";

/// Converts a path to a string with fallback to lossy conversion.
pub fn path_to_string_lossy(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Checks if a path is potentially problematic due to length or special characters.
pub fn validate_path(path: &Path) -> Result<()> {
    let path_str = path_to_string_lossy(path);

    if cfg!(windows)
        && path_str.len() > WINDOWS_MAX_PATH
        && !path_str.starts_with(WINDOWS_LONG_PATH_PREFIX)
    {
        return Err(Error::InvalidPath(
            path.to_path_buf(),
            "Path exceeds the Windows path length limit".to_string(),
        ));
    }

    let path_to_check = path_str
        .strip_prefix(WINDOWS_LONG_PATH_PREFIX)
        .unwrap_or(&path_str);

    if path_to_check
        .chars()
        .any(|c| matches!(c, '<' | '>' | '"' | '|' | '?' | '*'))
    {
        return Err(Error::InvalidPath(
            path.to_path_buf(),
            "Path contains invalid characters".to_string(),
        ));
    }

    Ok(())
}

/// Whether a container member should be skipped: any hidden component or a
/// `__MACOSX` resource fork directory.
pub fn is_ignored_member(member: &str) -> bool {
    member
        .split(['/', '\\'])
        .filter(|c| !c.is_empty())
        .any(|c| c.starts_with('.') || c == MACOS_METADATA_DIR)
}

/// Splits a `/`-separated member name into its directory and file name.
pub fn split_member(member: &str) -> (String, String) {
    let normalized = member.replace('\\', "/");
    let trimmed = normalized.trim_matches('/');
    match trimmed.rfind('/') {
        Some(slash) => (
            trimmed[..slash].to_string(),
            trimmed[slash + 1..].to_string(),
        ),
        None => (String::new(), trimmed.to_string()),
    }
}

/// Sanitizes a filename by replacing invalid characters with safe alternatives.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | '"' | '|' | '?' | '*' => '-',
            ':' => '-',
            '/' | '\\' => '-',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
