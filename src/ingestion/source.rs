//! Source URIs: local files and HTTP(S) endpoints.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use url::Url;

use crate::error::{LoadError, LoadResult};

const FILE_SCHEME: &str = "file://";

/// Where a [`Source`] lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Local filesystem path (from a `file://` URI).
    File(PathBuf),
    /// Remote resource fetched with GET / written with PUT.
    Http(Url),
}

/// A caller-supplied resource identifier.
///
/// The original URI string is kept verbatim: artifact names are derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    uri: String,
    location: Location,
}

impl Source {
    /// Parse a URI. Only `file://`, `http://` and `https://` are accepted.
    ///
    /// `file://` is a plain prefix: everything after it is taken as the path, so both
    /// `file:///tmp/a.csv` and `file://relative/a.csv` work.
    pub fn parse(uri: &str) -> LoadResult<Self> {
        if let Some(path) = uri.strip_prefix(FILE_SCHEME) {
            return Ok(Self {
                uri: uri.to_string(),
                location: Location::File(PathBuf::from(path)),
            });
        }

        let unsupported = || LoadError::UnsupportedScheme {
            uri: uri.to_string(),
        };
        let url = Url::parse(uri).map_err(|_| unsupported())?;
        match url.scheme() {
            "http" | "https" => Ok(Self {
                uri: uri.to_string(),
                location: Location::Http(url),
            }),
            _ => Err(unsupported()),
        }
    }

    /// Build a `file://` source for a local path.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            uri: format!("{FILE_SCHEME}{}", path.display()),
            location: Location::File(path),
        }
    }

    /// The URI exactly as supplied.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.location, Location::Http(_))
    }
}

impl FromStr for Source {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}
