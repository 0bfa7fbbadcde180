//! Streaming fetch of a [`Source`] into a local, format-tagged artifact.
//!
//! The first chunk is read before anything touches the disk and is handed to
//! [`FormatTag::sniff`], so the artifact is created with its final extension. The rest of
//! the stream is copied through unchanged.
//!
//! Artifacts are written to a temporary file inside the prefix directory and renamed onto
//! their final name once complete. A reader never observes a partially written artifact,
//! even when two fetches of the same source race.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::{Body, Client};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::error::{LoadError, LoadResult};

use super::sniff::FormatTag;
use super::source::{Location, Source};

/// Default transfer chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// The sniffer needs at least this many bytes to tell the formats apart.
const MIN_CHUNK_SIZE: usize = 2;

/// How artifact file names are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactNaming {
    /// `<sha256(uri)>.<ext>`: the same source always maps to the same artifact.
    #[default]
    SourceHash,
    /// `<sha256(uri)>-<uuid>.<ext>`: every fetch gets its own artifact.
    Unique,
}

/// Options controlling how sources are fetched.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchOptions {
    /// Directory artifacts are written into. Created on demand.
    pub prefix: PathBuf,
    /// Transfer chunk size; the first chunk of this size is what gets sniffed.
    pub chunk_size: usize,
    pub naming: ArtifactNaming,
    /// Overall HTTP request timeout. `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            prefix: std::env::temp_dir(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            naming: ArtifactNaming::default(),
            timeout_secs: None,
        }
    }
}

/// A fetched resource persisted on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedArtifact {
    /// Location of the artifact; its extension always matches `format`.
    pub path: PathBuf,
    pub format: FormatTag,
    /// Number of bytes written.
    pub bytes: u64,
}

impl DownloadedArtifact {
    /// Re-open an artifact that is already on disk, trusting its extension.
    pub fn from_path(path: impl AsRef<Path>) -> LoadResult<Self> {
        let path = path.as_ref();
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(FormatTag::from_extension)
            .ok_or_else(|| LoadError::UnsupportedArtifact {
                path: path.to_path_buf(),
            })?;
        let bytes = fs::metadata(path)?.len();
        Ok(Self {
            path: path.to_path_buf(),
            format,
            bytes,
        })
    }

    /// Delete the artifact from disk.
    pub fn discard(self) -> LoadResult<()> {
        fs::remove_file(&self.path)?;
        Ok(())
    }
}

/// Moves bytes between [`Source`]s and the local filesystem.
#[derive(Debug, Clone)]
pub struct Fetcher {
    options: FetchOptions,
    client: Client,
}

impl Fetcher {
    /// Build a fetcher (and its HTTP client) from options.
    pub fn new(options: FetchOptions) -> LoadResult<Self> {
        let client = Client::builder()
            .timeout(options.timeout_secs.map(Duration::from_secs))
            .build()?;
        Ok(Self { options, client })
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Stream `source` into an artifact under the prefix directory.
    ///
    /// Transport failures (missing file, connection refused, non-2xx status) are returned
    /// as-is. No retries are attempted.
    pub fn fetch(&self, source: &Source) -> LoadResult<DownloadedArtifact> {
        tracing::debug!(uri = %source, "fetch start");
        let mut input = self.open(source)?;

        let mut buf = vec![0u8; self.chunk_size()];
        let first = read_full(&mut input, &mut buf)?;
        let format = FormatTag::sniff(&buf[..first]);
        let path = self.artifact_path(source, format);
        tracing::debug!(uri = %source, %format, first_chunk = first, "sniffed format");

        fs::create_dir_all(&self.options.prefix)?;
        let mut sink = NamedTempFile::new_in(&self.options.prefix)?;
        sink.write_all(&buf[..first])?;
        let rest = pump(&mut input, sink.as_file_mut(), &mut buf)?;
        sink.as_file_mut().sync_all()?;
        sink.persist(&path).map_err(|e| e.error)?;

        let bytes = first as u64 + rest;
        tracing::info!(uri = %source, %format, bytes, path = %path.display(), "fetched artifact");
        Ok(DownloadedArtifact {
            path,
            format,
            bytes,
        })
    }

    /// Stream `source` into `out` without sniffing or persisting. Returns bytes copied.
    pub fn copy_to<W: Write + ?Sized>(&self, source: &Source, out: &mut W) -> LoadResult<u64> {
        let mut input = self.open(source)?;
        let mut buf = vec![0u8; self.chunk_size()];
        let n = pump(&mut input, out, &mut buf)?;
        out.flush()?;
        tracing::info!(uri = %source, bytes = n, "copied source");
        Ok(n)
    }

    /// Stream `source` into the file at `dest`, replacing it only once the copy is complete.
    ///
    /// On failure `dest` is left as it was.
    pub fn download_to(&self, source: &Source, dest: impl AsRef<Path>) -> LoadResult<u64> {
        let dest = dest.as_ref();
        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut sink = NamedTempFile::new_in(dir)?;
        let n = self.copy_to(source, sink.as_file_mut())?;
        sink.as_file_mut().sync_all()?;
        sink.persist(dest).map_err(|e| e.error)?;
        Ok(n)
    }

    /// Write `data` to `target`: a local file is created or truncated, an HTTP(S) target
    /// receives a streamed PUT.
    ///
    /// With `len` the PUT carries a `Content-Length`; without it the body is sent chunked,
    /// which object stores commonly reject. Prefer [`Self::upload_file`] for local files.
    pub fn upload<R>(&self, target: &Source, mut data: R, len: Option<u64>) -> LoadResult<()>
    where
        R: Read + Send + 'static,
    {
        match target.location() {
            Location::File(path) => {
                let mut file = File::create(path)?;
                let mut buf = vec![0u8; self.chunk_size()];
                let n = pump(&mut data, &mut file, &mut buf)?;
                file.sync_all()?;
                tracing::info!(uri = %target, bytes = n, "wrote output file");
            }
            Location::Http(url) => {
                let body = match len {
                    Some(len) => Body::sized(data, len),
                    None => Body::new(data),
                };
                let resp = self
                    .client
                    .put(url.clone())
                    .body(body)
                    .send()?
                    .error_for_status()?;
                tracing::info!(uri = %target, ?len, status = %resp.status(), "uploaded output");
            }
        }
        Ok(())
    }

    /// Upload a local file, sized from its metadata.
    pub fn upload_file(&self, target: &Source, path: impl AsRef<Path>) -> LoadResult<()> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        self.upload(target, file, Some(len))
    }

    /// The artifact path `source` maps to for a given format.
    ///
    /// Deterministic under [`ArtifactNaming::SourceHash`]; fresh on every call under
    /// [`ArtifactNaming::Unique`].
    pub fn artifact_path(&self, source: &Source, format: FormatTag) -> PathBuf {
        let digest = hex::encode(Sha256::digest(source.uri().as_bytes()));
        let stem = match self.options.naming {
            ArtifactNaming::SourceHash => digest,
            ArtifactNaming::Unique => format!("{digest}-{}", Uuid::new_v4().simple()),
        };
        self.options
            .prefix
            .join(format!("{stem}.{}", format.extension()))
    }

    fn chunk_size(&self) -> usize {
        self.options.chunk_size.max(MIN_CHUNK_SIZE)
    }

    fn open(&self, source: &Source) -> LoadResult<Box<dyn Read>> {
        match source.location() {
            Location::File(path) => Ok(Box::new(File::open(path)?)),
            Location::Http(url) => {
                let resp = self.client.get(url.clone()).send()?.error_for_status()?;
                Ok(Box::new(resp))
            }
        }
    }
}

/// Fill `buf` as far as the stream allows. Returns the number of bytes read, which is only
/// short of `buf.len()` at end of stream.
pub(crate) fn read_full<R: Read + ?Sized>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Copy `input` to `out` in `buf`-sized pieces until end of stream.
fn pump<R, W>(input: &mut R, out: &mut W, buf: &mut [u8]) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut total = 0u64;
    loop {
        match input.read(buf) {
            Ok(0) => return Ok(total),
            Ok(n) => {
                out.write_all(&buf[..n])?;
                total += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}
