use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type for fetch/load operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Error type returned by fetching, decoding and loading.
///
/// Degraded decoding (a low-confidence charset guess, dropped malformed bytes) and an
/// unmatched sheet hint are *not* errors; they resolve through fallback policies and
/// only show up in logs.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Underlying I/O error (e.g. source file not found, prefix directory not writable).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error, including non-success status codes.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Workbook decoding error (xlsx/xls).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// The xlsx container could not be read while looking up workbook view metadata.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The xlsx workbook part is not well-formed XML.
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// CSV tokenization error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The configuration file could not be parsed.
    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    /// The URI scheme is not one of `file://`, `http://` or `https://`.
    #[error("unrecognized url protocol: {uri}")]
    UnsupportedScheme { uri: String },

    /// An encoding label (configured default or detector candidate) is unknown.
    #[error("unknown text encoding '{label}'")]
    UnknownEncoding { label: String },

    /// A local artifact's extension does not map to any supported format.
    #[error("unrecognized artifact extension: {}", path.display())]
    UnsupportedArtifact { path: PathBuf },

    /// The workbook contains no worksheets to choose from.
    #[error("workbook has no worksheets: {}", path.display())]
    EmptyWorkbook { path: PathBuf },

    /// No non-empty row was found to use as column headers.
    #[error("no header row found in {context}")]
    MissingHeader { context: String },
}

impl LoadError {
    /// Whether this error came from the transport or the local filesystem rather than from
    /// the content or the configuration.
    pub fn is_transport(&self) -> bool {
        match self {
            LoadError::Io(_) | LoadError::Http(_) => true,
            // A strict decode failure surfaces as InvalidData through the csv reader.
            LoadError::Csv(err) => matches!(
                err.kind(),
                ::csv::ErrorKind::Io(e) if e.kind() != std::io::ErrorKind::InvalidData
            ),
            LoadError::Excel(calamine::Error::Io(_)) => true,
            LoadError::Zip(zip::result::ZipError::Io(_)) => true,
            _ => false,
        }
    }
}
