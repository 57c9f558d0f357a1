//! Frame archive extraction.
//!
//! Entries are looked up by the file names listed in the metadata, never by
//! position, and are either kept in memory or written into the job workspace
//! depending on what the encoding backend reads from.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use ugoiraforge_av::{FrameData, FrameSet, FrameStorage};
use ugoiraforge_common::{Error, Frame, Result};
use zip::ZipArchive;

/// Unpack `archive` into a [`FrameSet`] for `frames`.
///
/// With [`FrameStorage::Directory`] the images are written into `dir`.
/// Extraction runs on a blocking thread.
///
/// # Errors
///
/// Returns [`Error::ArchiveDownload`] for a corrupt archive, a missing entry,
/// or an entry name that is not a plain file name.
pub async fn load_frames(
    archive: Bytes,
    frames: Vec<Frame>,
    storage: FrameStorage,
    dir: &Path,
) -> Result<FrameSet> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || extract(archive, frames, storage, dir))
        .await
        .map_err(|e| Error::internal(format!("archive extraction task failed: {e}")))?
}

fn extract(archive: Bytes, frames: Vec<Frame>, storage: FrameStorage, dir: PathBuf) -> Result<FrameSet> {
    let mut zip = ZipArchive::new(Cursor::new(archive))
        .map_err(|e| Error::archive(format!("not a readable zip archive: {e}")))?;

    let mut buffers = Vec::with_capacity(frames.len());
    for frame in &frames {
        let name = frame.source_file.as_str();
        if !is_plain_file_name(name) {
            return Err(Error::archive(format!("refusing frame entry name {name:?}")));
        }

        let mut entry = zip
            .by_name(name)
            .map_err(|e| Error::archive(format!("archive entry {name}: {e}")))?;
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| Error::archive(format!("reading archive entry {name}: {e}")))?;

        match storage {
            FrameStorage::Memory => buffers.push(Bytes::from(data)),
            FrameStorage::Directory => std::fs::write(dir.join(name), &data)?,
        }
    }

    tracing::debug!(frames = frames.len(), ?storage, "Extracted frame archive");

    let data = match storage {
        FrameStorage::Memory => FrameData::Memory(buffers),
        FrameStorage::Directory => FrameData::Directory(dir),
    };
    FrameSet::new(frames, data)
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().is_some_and(|f| f == name)
}
