//! Per-job scratch directories.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use ugoiraforge_common::{Error, Result};

/// File name of the encoded video inside a workspace.
const OUTPUT_NAME: &str = "output.mp4";

/// Scratch directory for one conversion attempt.
///
/// Holds extracted frames (when the backend reads from disk) and the encoded
/// output. The directory name is unique per workspace, so concurrent jobs
/// never share files, and everything is removed when the workspace is dropped.
///
/// # Example
///
/// ```no_run
/// use ugoiraforge_av::JobWorkspace;
///
/// let workspace = JobWorkspace::new("12345678", None)?;
/// let frame = workspace.frame_path("000000.jpg");
/// assert!(frame.starts_with(workspace.dir()));
/// # Ok::<(), ugoiraforge_common::Error>(())
/// ```
#[derive(Debug)]
pub struct JobWorkspace {
    temp_dir: TempDir,
}

impl JobWorkspace {
    /// Create a workspace labelled with `label`, under `root` or the system
    /// temp directory.
    pub fn new(label: &str, root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        let prefix = format!("ugoira-{label}-");
        builder.prefix(&prefix);

        let temp_dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| Error::internal(format!("failed to create job workspace: {e}")))?;

        Ok(Self { temp_dir })
    }

    /// The workspace directory.
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Where a frame with the given archive entry name is stored.
    pub fn frame_path(&self, file: &str) -> PathBuf {
        self.temp_dir.path().join(file)
    }

    /// Where the encoder writes its output.
    pub fn output_path(&self) -> PathBuf {
        self.temp_dir.path().join(OUTPUT_NAME)
    }
}
