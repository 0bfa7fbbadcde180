//! CSV decoding into a [`TabularResult`].

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::error::{LoadError, LoadResult};
use crate::types::{fit_row, normalize_headers, TabularResult, Value};

use super::encoding::EncodingNormalizer;

/// Options for CSV tokenizing and cell typing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CsvOptions {
    /// Field delimiter, a single ASCII character.
    #[serde(deserialize_with = "ascii_char")]
    pub delimiter: u8,
    /// Type cells as integers, floats and booleans where they parse as such.
    pub infer_types: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            infer_types: true,
        }
    }
}

fn ascii_char<'de, D: Deserializer<'de>>(de: D) -> Result<u8, D::Error> {
    let s = String::deserialize(de)?;
    match s.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(serde::de::Error::custom(format!(
            "expected a single ASCII character, got {s:?}"
        ))),
    }
}

/// Decode a CSV file: normalize its encoding, then tokenize.
///
/// Rules:
///
/// - The first non-empty record is the header.
/// - Records that are entirely empty are skipped.
/// - Short records are padded with nulls; long records are truncated to the header.
pub fn load_csv_from_path(
    path: impl AsRef<Path>,
    normalizer: &EncodingNormalizer,
    options: &CsvOptions,
) -> LoadResult<TabularResult> {
    let file = BufReader::new(File::open(path)?);
    let text = normalizer.normalize(file)?;
    tracing::debug!(
        encoding = text.encoding.name(),
        bom = ?text.bom,
        "decoding csv"
    );
    load_csv_from_reader(text.reader, options)
}

/// Tokenize already-decoded UTF-8 CSV data.
pub fn load_csv_from_reader<R: Read>(reader: R, options: &CsvOptions) -> LoadResult<TabularResult> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(options.delimiter)
        .from_reader(reader);

    let mut records = rdr
        .records()
        .filter(|r| !matches!(r, Ok(rec) if record_is_empty(rec)));

    let header = records.next().ok_or_else(|| LoadError::MissingHeader {
        context: "csv input".to_string(),
    })??;
    let columns = normalize_headers(header.iter());
    let width = columns.len();

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for result in records {
        let record = result?;
        let row = record
            .iter()
            .map(|raw| parse_cell(raw, options.infer_types))
            .collect();
        rows.push(fit_row(row, width));
    }

    Ok(TabularResult::new(columns, rows))
}

fn record_is_empty(rec: &csv::StringRecord) -> bool {
    rec.iter().all(|f| f.trim().is_empty())
}

fn parse_cell(raw: &str, infer: bool) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if !infer {
        return Value::Utf8(raw.to_owned());
    }

    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Int64(i);
    }
    // Rust accepts "inf"/"nan" as floats; a CSV cell needs at least one digit.
    if trimmed.bytes().any(|b| b.is_ascii_digit()) {
        if let Ok(f) = trimmed.parse::<f64>() {
            return Value::Float64(f);
        }
    }
    match parse_bool(trimmed) {
        Some(b) => Value::Bool(b),
        None => Value::Utf8(raw.to_owned()),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{load_csv_from_reader, parse_cell, CsvOptions};
    use crate::error::LoadError;
    use crate::types::Value;

    fn load(s: &str) -> Result<crate::types::TabularResult, LoadError> {
        load_csv_from_reader(s.as_bytes(), &CsvOptions::default())
    }

    #[test]
    fn first_record_is_header() {
        let t = load("hello,world\nalpha,bravo\n").unwrap();
        assert_eq!(t.columns, vec!["hello", "world"]);
        assert_eq!(t.rows, vec![vec![Value::from("alpha"), Value::from("bravo")]]);
    }

    #[test]
    fn cells_are_typed() {
        let t = load("id,score,active,name,missing\n1,2.5,TRUE,ada,\n-7,1e3,false, bob ,\n").unwrap();
        assert_eq!(
            t.rows[0],
            vec![
                Value::Int64(1),
                Value::Float64(2.5),
                Value::Bool(true),
                Value::from("ada"),
                Value::Null
            ]
        );
        assert_eq!(t.rows[1][0], Value::Int64(-7));
        assert_eq!(t.rows[1][1], Value::Float64(1000.0));
        assert_eq!(t.rows[1][2], Value::Bool(false));
        assert_eq!(t.rows[1][3], Value::from(" bob "));
    }

    #[test]
    fn words_that_parse_as_floats_stay_text() {
        assert_eq!(parse_cell("nan", true), Value::from("nan"));
        assert_eq!(parse_cell("inf", true), Value::from("inf"));
        assert_eq!(parse_cell("yes", true), Value::from("yes"));
    }

    #[test]
    fn inference_can_be_disabled() {
        let opts = CsvOptions {
            infer_types: false,
            ..Default::default()
        };
        let t = load_csv_from_reader("a,b\n1,true\n,x\n".as_bytes(), &opts).unwrap();
        assert_eq!(t.rows[0], vec![Value::from("1"), Value::from("true")]);
        assert_eq!(t.rows[1], vec![Value::Null, Value::from("x")]);
    }

    #[test]
    fn ragged_rows_are_fitted_and_blank_rows_skipped() {
        let t = load("\n\na,b,c\n1\n,,\n1,2,3,4\n").unwrap();
        assert_eq!(t.columns, vec!["a", "b", "c"]);
        assert_eq!(
            t.rows,
            vec![
                vec![Value::Int64(1), Value::Null, Value::Null],
                vec![Value::Int64(1), Value::Int64(2), Value::Int64(3)],
            ]
        );
    }

    #[test]
    fn duplicate_and_blank_headers_are_renamed() {
        let t = load("x,,x\n1,2,3\n").unwrap();
        assert_eq!(t.columns, vec!["x", "Unnamed: 1", "x.1"]);
    }

    #[test]
    fn custom_delimiter() {
        let opts = CsvOptions {
            delimiter: b';',
            ..Default::default()
        };
        let t = load_csv_from_reader("a;b\n1,5;x\n".as_bytes(), &opts).unwrap();
        assert_eq!(t.rows[0], vec![Value::from("1,5"), Value::from("x")]);
    }

    #[test]
    fn empty_input_has_no_header() {
        assert!(matches!(load(""), Err(LoadError::MissingHeader { .. })));
        assert!(matches!(load("\n , \n"), Err(LoadError::MissingHeader { .. })));
    }

    #[test]
    fn delimiter_deserializes_from_a_one_char_string() {
        let opts: CsvOptions = toml::from_str("delimiter = \"\\t\"").unwrap();
        assert_eq!(opts.delimiter, b'\t');
        assert!(opts.infer_types);
        assert!(toml::from_str::<CsvOptions>("delimiter = \";;\"").is_err());
    }
}
