/*!
 * Temporary artifact storage.
 *
 * Every persisted payload gets a fresh, uniquely named file. The handle owns
 * the file: it is removed when the last clone of the handle is dropped.
 */

use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, info};
use tempfile::TempPath;
use zip::ZipArchive;

use crate::errors::PipelineError;

/// Prefix of every artifact file name
const ARTIFACT_PREFIX: &str = "subpipe_";

/// Largest bundle member accepted, in bytes
pub const MAX_BUNDLE_MEMBER_BYTES: u64 = 64 * 1024 * 1024;

/// Handle to a staged file; the file lives as long as the handle does
#[derive(Debug, Clone)]
pub struct Artifact {
    path: Arc<TempPath>,
    len: u64,
}

impl Artifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size in bytes as written
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// File name without directories, for multipart uploads
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Read the whole artifact into memory
    pub async fn read(&self) -> Result<Bytes, PipelineError> {
        let data = tokio::fs::read(self.path()).await?;
        Ok(Bytes::from(data))
    }
}

/// Creates artifacts in one directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store in the system temp directory
    pub fn system() -> Self {
        Self::new(std::env::temp_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` to a fresh file ending in `suffix`.
    ///
    /// The handle is returned only once the write has completed.
    pub async fn persist(&self, bytes: Bytes, suffix: &str) -> Result<Artifact, PipelineError> {
        let dir = self.dir.clone();
        let suffix = suffix.to_string();

        let path = tokio::task::spawn_blocking(move || -> std::io::Result<TempPath> {
            let mut file = tempfile::Builder::new()
                .prefix(ARTIFACT_PREFIX)
                .suffix(&suffix)
                .tempfile_in(&dir)?;
            file.write_all(&bytes)?;
            file.as_file().sync_all()?;
            Ok(file.into_temp_path())
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("Artifact write task failed: {}", e)))??;

        let len = tokio::fs::metadata(&path).await?.len();
        debug!("Persisted artifact {} ({} bytes)", path.display(), len);

        Ok(Artifact {
            path: Arc::new(path),
            len,
        })
    }

    /// Validate an extraction bundle and persist its two members.
    ///
    /// Nothing is written unless the archive holds exactly one `.srt` and one
    /// `.txt` file.
    pub async fn split_bundle(&self, archive: &[u8]) -> Result<ExtractedBundle, PipelineError> {
        let (subtitle, script) = read_bundle(archive, MAX_BUNDLE_MEMBER_BYTES)?;

        let subtitle_artifact = self.persist(subtitle.bytes.clone(), ".srt").await?;
        let script_artifact = self.persist(script.bytes.clone(), ".txt").await?;

        Ok(ExtractedBundle {
            subtitle: subtitle.bytes,
            script: script.bytes,
            subtitle_artifact,
            script_artifact,
        })
    }
}

/// The two members of an extraction bundle, in memory and on disk
#[derive(Debug, Clone)]
pub struct ExtractedBundle {
    pub subtitle: Bytes,
    pub script: Bytes,
    pub subtitle_artifact: Artifact,
    pub script_artifact: Artifact,
}

#[derive(Debug)]
struct BundleMember {
    name: String,
    bytes: Bytes,
}

fn has_extension(name: &str, extension: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Pick the single `.srt` and `.txt` members out of a zip archive.
///
/// A member larger than `limit` bytes, declared or actual, makes the bundle malformed.
fn read_bundle(archive: &[u8], limit: u64) -> Result<(BundleMember, BundleMember), PipelineError> {
    let mut zip = ZipArchive::new(Cursor::new(archive))
        .map_err(|e| PipelineError::MalformedBundle(format!("not a zip archive: {}", e)))?;

    let mut subtitles = Vec::new();
    let mut scripts = Vec::new();

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| PipelineError::MalformedBundle(format!("unreadable entry #{}: {}", i, e)))?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let target = if has_extension(&name, "srt") {
            &mut subtitles
        } else if has_extension(&name, "txt") {
            &mut scripts
        } else {
            debug!("Ignoring bundle member {}", name);
            continue;
        };

        if entry.size() > limit {
            return Err(PipelineError::MalformedBundle(format!(
                "{} declares {} bytes, limit is {}",
                name,
                entry.size(),
                limit
            )));
        }

        let mut data = Vec::new();
        entry
            .by_ref()
            .take(limit + 1)
            .read_to_end(&mut data)
            .map_err(|e| PipelineError::MalformedBundle(format!("cannot read {}: {}", name, e)))?;
        if data.len() as u64 > limit {
            return Err(PipelineError::MalformedBundle(format!(
                "{} exceeds {} bytes",
                name, limit
            )));
        }
        target.push(BundleMember {
            name,
            bytes: Bytes::from(data),
        });
    }

    let subtitle = exactly_one(subtitles, ".srt")?;
    let script = exactly_one(scripts, ".txt")?;
    info!("Bundle contains {} and {}", subtitle.name, script.name);

    Ok((subtitle, script))
}

fn exactly_one(mut members: Vec<BundleMember>, extension: &str) -> Result<BundleMember, PipelineError> {
    match members.len() {
        1 => Ok(members.remove(0)),
        0 => Err(PipelineError::MalformedBundle(format!("missing {} file", extension))),
        n => Err(PipelineError::MalformedBundle(format!(
            "expected one {} file, found {}",
            extension, n
        ))),
    }
}
