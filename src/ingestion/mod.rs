//! Fetching, sniffing, decoding and loading.
//!
//! Most callers should use [`load_from_uri`] (from [`unified`]) which:
//!
//! - fetches a `file://` or `http(s)://` source into a local artifact ([`fetch`])
//! - detects the real format from the first bytes, never the name ([`sniff`])
//! - picks the sheet to read from a workbook ([`sheets`]) or normalizes the text
//!   encoding of delimited data ([`encoding`])
//! - decodes into an in-memory [`crate::types::TabularResult`]
//! - optionally reports success/failure/alerts to a [`LoadObserver`]
//!
//! Format-specific decoders are also available under:
//! - [`csv`]
//! - [`excel`]

pub mod csv;
pub mod encoding;
pub mod excel;
pub mod fetch;
pub mod observability;
pub mod sheets;
pub mod sniff;
pub mod source;
pub mod unified;

pub use csv::CsvOptions;
pub use encoding::{
    Bom, CharsetDetector, CharsetGuess, ChardetngDetector, DecodeErrorPolicy, DecodingReader,
    EncodingNormalizer, EncodingOptions, NormalizedText,
};
pub use fetch::{ArtifactNaming, DownloadedArtifact, FetchOptions, Fetcher};
pub use observability::{
    CompositeObserver, FileObserver, LoadContext, LoadObserver, LoadSeverity, LoadStats,
    TracingObserver,
};
pub use sheets::{SelectionReason, SheetCatalog, SheetEntry, SheetSelection};
pub use sniff::FormatTag;
pub use source::{Location, Source};
pub use unified::{load_from_uri, LoadOptions, LoadOutcome, LoadRequest, Loader};
