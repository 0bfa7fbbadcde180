//! TOML configuration for the loader.
//!
//! ```toml
//! sheet_hint = "bravo"
//! alert_at_or_above = "error"
//! observer_log = "/var/log/intake.log"
//!
//! [fetch]
//! prefix = "/tmp/intake"
//! naming = "unique"
//! timeout_secs = 60
//!
//! [encoding]
//! default_encoding = "windows-1252"
//! min_confidence = 0.9
//! errors = "replace"
//!
//! [csv]
//! delimiter = ";"
//! ```
//!
//! Every key is optional; missing keys take the library defaults. Unknown keys are
//! rejected so typos do not silently fall back to defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::error::LoadResult;
use crate::ingestion::{
    CompositeObserver, CsvOptions, EncodingOptions, FetchOptions, FileObserver, LoadObserver,
    LoadOptions, LoadSeverity, TracingObserver,
};

/// Configuration file contents.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntakeConfig {
    pub fetch: FetchOptions,
    pub encoding: EncodingOptions,
    pub csv: CsvOptions,
    /// Default sheet hint for workbooks.
    pub sheet_hint: Option<String>,
    /// Alert threshold; defaults to `critical`.
    pub alert_at_or_above: Option<LoadSeverity>,
    /// Append load events to this file in addition to `tracing`.
    pub observer_log: Option<PathBuf>,
}

impl IntakeConfig {
    pub fn from_toml_str(s: &str) -> LoadResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a config file.
    pub fn load(path: impl AsRef<Path>) -> LoadResult<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)?;
        let cfg = Self::from_toml_str(&data)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(cfg)
    }

    /// Turn the file contents into [`LoadOptions`], with a [`TracingObserver`] attached
    /// (plus a [`FileObserver`] when `observer_log` is set).
    pub fn into_load_options(self) -> LoadOptions {
        let observer: Arc<dyn LoadObserver> = match self.observer_log {
            Some(path) => Arc::new(CompositeObserver::new(vec![
                Arc::new(TracingObserver),
                Arc::new(FileObserver::new(path)),
            ])),
            None => Arc::new(TracingObserver),
        };
        LoadOptions {
            fetch: self.fetch,
            encoding: self.encoding,
            csv: self.csv,
            sheet_hint: self.sheet_hint,
            observer: Some(observer),
            alert_at_or_above: self.alert_at_or_above.unwrap_or(LoadSeverity::Critical),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::IntakeConfig;
    use crate::error::LoadError;
    use crate::ingestion::{ArtifactNaming, DecodeErrorPolicy, LoadSeverity};

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg = IntakeConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, IntakeConfig::default());
        assert_eq!(cfg.fetch.chunk_size, 4096);
        assert_eq!(cfg.encoding.sample_size, 128 * 1024);
        assert_eq!(cfg.encoding.min_confidence, 0.8);
        assert_eq!(cfg.encoding.default_encoding, "utf-8");
        assert_eq!(cfg.encoding.errors, DecodeErrorPolicy::Ignore);
        assert_eq!(cfg.fetch.timeout_secs, None);
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = IntakeConfig::from_toml_str(
            r#"
sheet_hint = "bravo"
alert_at_or_above = "error"

[fetch]
prefix = "/srv/intake"
naming = "unique"

[encoding]
errors = "strict"
min_confidence = 0.5

[csv]
delimiter = "|"
infer_types = false
"#,
        )
        .unwrap();
        assert_eq!(cfg.sheet_hint.as_deref(), Some("bravo"));
        assert_eq!(cfg.fetch.prefix, PathBuf::from("/srv/intake"));
        assert_eq!(cfg.fetch.naming, ArtifactNaming::Unique);
        assert_eq!(cfg.fetch.chunk_size, 4096);
        assert_eq!(cfg.encoding.errors, DecodeErrorPolicy::Strict);
        assert_eq!(cfg.csv.delimiter, b'|');

        let opts = cfg.into_load_options();
        assert_eq!(opts.alert_at_or_above, LoadSeverity::Error);
        assert!(opts.observer.is_some());
        assert!(!opts.csv.infer_types);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        for bad in ["shet_hint = \"x\"", "[fetch]\nchunk = 1", "[encoding]\nerrors = \"loud\""] {
            assert!(
                matches!(IntakeConfig::from_toml_str(bad), Err(LoadError::Config(_))),
                "{bad}"
            );
        }
    }
}
