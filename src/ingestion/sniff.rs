//! Content-based format detection.
//!
//! The format of a fetched resource is decided from its first bytes only. The caller's
//! file name or URL path is never consulted.

use std::fmt;

use serde::Serialize;

/// Zip container signature (`PK`), used by OOXML workbooks.
pub const XLSX_MAGIC: [u8; 2] = [0x50, 0x4B];

/// Compound File Binary signature prefix, used by legacy BIFF workbooks.
pub const XLS_MAGIC: [u8; 2] = [0xD0, 0xCF];

/// Closed set of formats a source can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatTag {
    /// Modern zip/XML workbook.
    Xlsx,
    /// Legacy compound-file workbook.
    Xls,
    /// Delimited text. The fallback for anything unrecognized.
    Csv,
}

impl FormatTag {
    /// Classify a byte prefix by magic number.
    ///
    /// This is a lossy classifier, not a validator: every input maps to a tag, and an
    /// unknown binary blob is reported as [`FormatTag::Csv`].
    pub fn sniff(chunk: &[u8]) -> Self {
        if chunk.starts_with(&XLSX_MAGIC) {
            Self::Xlsx
        } else if chunk.starts_with(&XLS_MAGIC) {
            Self::Xls
        } else {
            Self::Csv
        }
    }

    /// Canonical file extension for artifacts of this format.
    ///
    /// Workbook decoders key their behavior off this extension, so artifacts are always
    /// named with it.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
            Self::Csv => "csv",
        }
    }

    /// Parse a format from an artifact extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "xlsx" => Some(Self::Xlsx),
            "xls" => Some(Self::Xls),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    /// Whether this format is a multi-sheet workbook.
    pub fn is_workbook(self) -> bool {
        matches!(self, Self::Xlsx | Self::Xls)
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
