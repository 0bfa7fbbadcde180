//! Unified load entrypoint.
//!
//! Most callers should use [`load_from_uri`], which fetches a source into a local artifact,
//! sniffs its real format from content, and decodes it into an in-memory
//! [`crate::types::TabularResult`].
//!
//! - Workbooks (`xlsx`, `xls`) go through sheet selection, honoring
//!   [`LoadOptions::sheet_hint`].
//! - Delimited text goes through encoding normalization before tokenizing.
//! - If a [`super::observability::LoadObserver`] is provided, success/failure/alerts are
//!   reported to it.

use std::fmt;
use std::sync::Arc;

use crate::error::{LoadError, LoadResult};
use crate::types::TabularResult;

use super::csv::{self, CsvOptions};
use super::encoding::{CharsetDetector, EncodingNormalizer, EncodingOptions};
use super::excel;
use super::fetch::{DownloadedArtifact, FetchOptions, Fetcher};
use super::observability::{LoadContext, LoadObserver, LoadSeverity, LoadStats};
use super::sheets::{SheetCatalog, SheetSelection};
use super::sniff::FormatTag;
use super::source::Source;

/// Options controlling fetching, decoding and reporting.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct LoadOptions {
    pub fetch: FetchOptions,
    pub encoding: EncodingOptions,
    pub csv: CsvOptions,
    /// Substring of the workbook sheet to read. Ignored for CSV.
    pub sheet_hint: Option<String>,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn LoadObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: LoadSeverity,
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("fetch", &self.fetch)
            .field("encoding", &self.encoding)
            .field("csv", &self.csv)
            .field("sheet_hint", &self.sheet_hint)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            fetch: FetchOptions::default(),
            encoding: EncodingOptions::default(),
            csv: CsvOptions::default(),
            sheet_hint: None,
            observer: None,
            alert_at_or_above: LoadSeverity::Critical,
        }
    }
}

/// Everything a load produced, for callers that need more than the table.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub artifact: DownloadedArtifact,
    /// The sheet read, for workbook formats.
    pub sheet: Option<SheetSelection>,
    pub table: TabularResult,
}

/// Fetches sources and dispatches artifacts to the decoder for their format.
#[derive(Clone)]
pub struct Loader {
    fetcher: Fetcher,
    normalizer: EncodingNormalizer,
    csv: CsvOptions,
    sheet_hint: Option<String>,
    observer: Option<Arc<dyn LoadObserver>>,
    alert_at_or_above: LoadSeverity,
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("fetcher", &self.fetcher)
            .field("normalizer", &self.normalizer)
            .field("csv", &self.csv)
            .field("sheet_hint", &self.sheet_hint)
            .field("observer_set", &self.observer.is_some())
            .finish()
    }
}

impl Loader {
    /// Build a loader. Fails on configuration errors (e.g. an unknown default encoding).
    pub fn new(options: LoadOptions) -> LoadResult<Self> {
        let normalizer = EncodingNormalizer::new(options.encoding.clone())?;
        Self::assemble(options, normalizer)
    }

    /// Build a loader that uses a custom charset detector for delimited text.
    pub fn with_detector(
        options: LoadOptions,
        detector: Arc<dyn CharsetDetector>,
    ) -> LoadResult<Self> {
        let normalizer = EncodingNormalizer::with_detector(options.encoding.clone(), detector)?;
        Self::assemble(options, normalizer)
    }

    fn assemble(options: LoadOptions, normalizer: EncodingNormalizer) -> LoadResult<Self> {
        Ok(Self {
            fetcher: Fetcher::new(options.fetch)?,
            normalizer,
            csv: options.csv,
            sheet_hint: options.sheet_hint,
            observer: options.observer,
            alert_at_or_above: options.alert_at_or_above,
        })
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Parse `uri`, fetch it, and decode it.
    pub fn load(&self, uri: &str) -> LoadResult<TabularResult> {
        self.load_outcome(uri).map(|o| o.table)
    }

    /// Like [`Self::load`], but also returns the artifact and the selected sheet.
    pub fn load_outcome(&self, uri: &str) -> LoadResult<LoadOutcome> {
        let mut ctx = LoadContext {
            uri: uri.to_string(),
            format: None,
            artifact: None,
        };
        let result = self.fetch_and_decode(uri, &mut ctx);
        self.report(
            &ctx,
            result.as_ref().map(|o| stats(&o.artifact, o.sheet.as_ref(), &o.table)),
        );
        result
    }

    /// Decode an artifact that is already on disk.
    ///
    /// Dispatch is on [`DownloadedArtifact::format`] alone.
    pub fn load_artifact(&self, artifact: &DownloadedArtifact) -> LoadResult<TabularResult> {
        let ctx = LoadContext {
            uri: Source::from_path(&artifact.path).uri().to_string(),
            format: Some(artifact.format),
            artifact: Some(artifact.path.clone()),
        };
        let result = self.decode(artifact);
        self.report(
            &ctx,
            result.as_ref().map(|(sheet, table)| stats(artifact, sheet.as_ref(), table)),
        );
        result.map(|(_, table)| table)
    }

    /// The worksheets of a workbook artifact, or `None` for delimited text.
    pub fn catalog(&self, artifact: &DownloadedArtifact) -> LoadResult<Option<SheetCatalog>> {
        match artifact.format {
            FormatTag::Xlsx => excel::xlsx_catalog(&artifact.path).map(Some),
            FormatTag::Xls => excel::xls_catalog(&artifact.path).map(Some),
            FormatTag::Csv => Ok(None),
        }
    }

    /// The sheet hint this loader applies to workbooks.
    pub fn sheet_hint(&self) -> Option<&str> {
        self.sheet_hint.as_deref()
    }

    fn fetch_and_decode(&self, uri: &str, ctx: &mut LoadContext) -> LoadResult<LoadOutcome> {
        let source = Source::parse(uri)?;
        let artifact = self.fetcher.fetch(&source)?;
        ctx.format = Some(artifact.format);
        ctx.artifact = Some(artifact.path.clone());

        let (sheet, table) = self.decode(&artifact)?;
        Ok(LoadOutcome {
            artifact,
            sheet,
            table,
        })
    }

    fn decode(
        &self,
        artifact: &DownloadedArtifact,
    ) -> LoadResult<(Option<SheetSelection>, TabularResult)> {
        let hint = self.sheet_hint.as_deref();
        match artifact.format {
            FormatTag::Xlsx => {
                tracing::info!(path = %artifact.path.display(), "found xlsx workbook");
                excel::load_xlsx(&artifact.path, hint).map(|s| (Some(s.selection), s.table))
            }
            FormatTag::Xls => {
                tracing::info!(path = %artifact.path.display(), "found xls workbook");
                excel::load_xls(&artifact.path, hint).map(|s| (Some(s.selection), s.table))
            }
            FormatTag::Csv => csv::load_csv_from_path(&artifact.path, &self.normalizer, &self.csv)
                .map(|t| (None, t)),
        }
    }

    /// Report an outcome to the observer, if one is configured.
    ///
    /// - `on_success` on success, with row/column stats
    /// - `on_failure` on failure, with a computed severity
    /// - `on_alert` on failure when the severity is >= the alert threshold
    fn report(&self, ctx: &LoadContext, outcome: Result<LoadStats, &LoadError>) {
        let Some(obs) = self.observer.as_ref() else {
            return;
        };
        match outcome {
            Ok(stats) => obs.on_success(ctx, &stats),
            Err(e) => {
                let sev = LoadSeverity::for_error(e);
                obs.on_failure(ctx, sev, e);
                if sev >= self.alert_at_or_above {
                    obs.on_alert(ctx, sev, e);
                }
            }
        }
    }
}

fn stats(
    artifact: &DownloadedArtifact,
    sheet: Option<&SheetSelection>,
    table: &TabularResult,
) -> LoadStats {
    LoadStats {
        rows: table.row_count(),
        columns: table.columns.len(),
        bytes: artifact.bytes,
        sheet: sheet.map(|s| s.name.clone()),
    }
}

/// Unified load entry point.
///
/// Builds a [`Loader`] from `options` and loads `uri` with it.
///
/// # Examples
///
/// ## Local file (format detected from content, not the name)
///
/// ```no_run
/// use spreadsheet_intake::ingestion::{load_from_uri, LoadOptions};
///
/// # fn main() -> Result<(), spreadsheet_intake::LoadError> {
/// let table = load_from_uri("file:///data/export.bin", &LoadOptions::default())?;
/// println!("columns={:?} rows={}", table.columns, table.row_count());
/// # Ok(())
/// # }
/// ```
///
/// ## Picking a sheet by hint
///
/// ```no_run
/// use spreadsheet_intake::ingestion::{load_from_uri, LoadOptions};
///
/// # fn main() -> Result<(), spreadsheet_intake::LoadError> {
/// let opts = LoadOptions {
///     sheet_hint: Some("Q3".to_string()),
///     ..Default::default()
/// };
/// // Reads the first sheet whose name contains "Q3", or the active sheet if none does.
/// let table = load_from_uri("https://example.com/report.xlsx", &opts)?;
/// # let _ = table;
/// # Ok(())
/// # }
/// ```
///
/// ## Observability (tracing + alert threshold)
///
/// ```no_run
/// use std::sync::Arc;
///
/// use spreadsheet_intake::ingestion::{load_from_uri, LoadOptions, LoadSeverity, TracingObserver};
///
/// let opts = LoadOptions {
///     observer: Some(Arc::new(TracingObserver)),
///     alert_at_or_above: LoadSeverity::Critical,
///     ..Default::default()
/// };
///
/// // Missing files are treated as Critical and will trigger `on_alert` at this threshold.
/// let _err = load_from_uri("file:///does/not/exist.csv", &opts).unwrap_err();
/// ```
pub fn load_from_uri(uri: &str, options: &LoadOptions) -> LoadResult<TabularResult> {
    Loader::new(options.clone())?.load(uri)
}

/// Convenience helper for callers that want an owned request object.
///
/// This can be useful if you want to enqueue load work in a job system.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    /// Source URI (`file://`, `http://` or `https://`).
    pub uri: String,
    /// Options controlling the load.
    pub options: LoadOptions,
}

impl LoadRequest {
    /// Execute the request by calling [`load_from_uri`].
    pub fn run(&self) -> LoadResult<TabularResult> {
        load_from_uri(&self.uri, &self.options)
    }
}
