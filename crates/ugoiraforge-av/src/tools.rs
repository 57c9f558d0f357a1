//! External encoder discovery.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Binary name of the external encoder.
pub const FFMPEG: &str = "ffmpeg";

/// Availability information for an external tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// First line of the tool's version banner.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Locate ffmpeg, preferring a configured path over a `PATH` lookup.
///
/// A configured path that does not exist is ignored.
pub fn locate_ffmpeg(config_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = config_path {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        tracing::debug!("Configured ffmpeg path {:?} does not exist, searching PATH", path);
    }
    which::which(FFMPEG).ok()
}

/// Check ffmpeg availability and read its version banner.
pub fn check_ffmpeg(config_path: Option<&Path>) -> ToolInfo {
    let Some(path) = locate_ffmpeg(config_path) else {
        return ToolInfo {
            name: FFMPEG.to_string(),
            available: false,
            version: None,
            path: None,
        };
    };

    let version = Command::new(&path)
        .arg("-version")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| {
            String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.to_string())
        });

    ToolInfo {
        name: FFMPEG.to_string(),
        available: version.is_some(),
        version,
        path: Some(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_path_wins_when_present() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(locate_ffmpeg(Some(file.path())), Some(file.path().to_path_buf()));
    }

    #[test]
    fn missing_configured_path_falls_back_to_path_lookup() {
        let missing = Path::new("/nonexistent/ffmpeg_12345");
        assert_eq!(locate_ffmpeg(Some(missing)), which::which(FFMPEG).ok());
    }

    #[test]
    fn non_executable_tool_is_unavailable() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let info = check_ffmpeg(Some(file.path()));
        assert!(!info.available);
        assert!(info.version.is_none());
        assert_eq!(info.path.as_deref(), Some(file.path()));
    }
}
