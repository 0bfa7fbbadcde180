//! `spreadsheet-intake` loads a tabular resource whose real format is unknown from its name
//! into an in-memory [`types::TabularResult`].
//!
//! The primary entrypoint is [`ingestion::load_from_uri`]. Given a `file://`, `http://` or
//! `https://` URI it:
//!
//! 1. streams the resource into a local artifact, sniffing the first chunk for its format
//!    (`PK` → xlsx, `D0 CF` → xls, anything else → CSV);
//! 2. for workbooks, resolves which sheet to read: the first sheet whose name contains the
//!    caller's hint, else the sheet the workbook opens on;
//! 3. for CSV, skips any byte-order mark, guesses the charset from a sample, falls back to
//!    a default encoding when the guess is not confident, and decodes leniently;
//! 4. returns column names from the header row plus typed rows.
//!
//! ## Quick example
//!
//! ```no_run
//! use spreadsheet_intake::ingestion::{load_from_uri, LoadOptions};
//!
//! # fn main() -> Result<(), spreadsheet_intake::LoadError> {
//! let opts = LoadOptions {
//!     sheet_hint: Some("bravo".to_string()),
//!     ..Default::default()
//! };
//! let table = load_from_uri("file:///tmp/upload-7f3a", &opts)?;
//! println!("columns={:?} rows={}", table.columns, table.row_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Lower-level pieces
//!
//! ```rust
//! use spreadsheet_intake::ingestion::{FormatTag, SheetCatalog, SheetEntry};
//!
//! assert_eq!(FormatTag::sniff(b"PK\x03\x04"), FormatTag::Xlsx);
//! assert_eq!(FormatTag::sniff(b"hello,world"), FormatTag::Csv);
//!
//! let catalog = SheetCatalog::new(vec![
//!     SheetEntry::new("with-bom", false, true),
//!     SheetEntry::new("bravo", true, true),
//! ])
//! .unwrap();
//! assert_eq!(catalog.resolve(Some("foobar")).name, "bravo");
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: fetching, sniffing, encoding, sheet selection and decoding
//! - [`types`]: the tabular result and cell values
//! - [`config`]: TOML configuration file
//! - [`logging`]: `tracing` subscriber setup for binaries
//! - [`error`]: error types used across loading

pub mod config;
pub mod error;
pub mod ingestion;
pub mod logging;
pub mod types;

pub use error::{LoadError, LoadResult};
