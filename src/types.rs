//! Core data model types for loading.
//!
//! Every supported source format is loaded into a [`TabularResult`]: ordered column names
//! plus row-major cell [`Value`]s.

use serde::Serialize;

/// A single cell value in a [`TabularResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// Returns the string payload for [`Value::Utf8`] cells.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Utf8(s) => Some(s),
            _ => None,
        }
    }

    /// Render the value the way it would appear in a CSV cell (`Null` is empty).
    pub fn to_cell_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int64(i) => i.to_string(),
            Value::Float64(f) => f.to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Utf8(s) => s.clone(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Utf8(s.to_string())
    }
}

/// In-memory tabular result.
///
/// Rows are stored as `Vec<Vec<Value>>`; every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabularResult {
    /// Ordered column names (taken from the header row).
    pub columns: Vec<String>,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl TabularResult {
    /// Create a result from column names and rows.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Number of data rows (the header row is not counted).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns the index of a column by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate the values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value>> {
        let idx = self.index_of(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }
}

/// Turn raw header cells into unique, non-empty column names.
///
/// Empty cells become `Unnamed: <index>`; repeated names get `.1`, `.2`, ... suffixes in
/// order of appearance.
pub(crate) fn normalize_headers<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for (idx, cell) in raw.into_iter().enumerate() {
        let cell = cell.as_ref();
        let base = if cell.trim().is_empty() {
            format!("Unnamed: {idx}")
        } else {
            cell.to_string()
        };

        let mut name = base.clone();
        let mut n = 0;
        while out.contains(&name) {
            n += 1;
            name = format!("{base}.{n}");
        }
        out.push(name);
    }
    out
}

/// Fit a decoded row to the header width: pad with `Null`, drop extra cells.
pub(crate) fn fit_row(mut row: Vec<Value>, width: usize) -> Vec<Value> {
    row.resize(width, Value::Null);
    row
}

#[cfg(test)]
mod tests {
    use super::{fit_row, normalize_headers, TabularResult, Value};

    #[test]
    fn normalize_headers_names_blank_cells_by_position() {
        let cols = normalize_headers(["id", "", "name", " "]);
        assert_eq!(cols, vec!["id", "Unnamed: 1", "name", "Unnamed: 3"]);
    }

    #[test]
    fn normalize_headers_suffixes_duplicates_in_order() {
        let cols = normalize_headers(["a", "b", "a", "a"]);
        assert_eq!(cols, vec!["a", "b", "a.1", "a.2"]);
    }

    #[test]
    fn fit_row_pads_and_truncates() {
        assert_eq!(fit_row(vec![Value::from("x")], 2), vec![Value::from("x"), Value::Null]);
        assert_eq!(
            fit_row(vec![Value::from("x"), Value::from("y"), Value::from("z")], 2),
            vec![Value::from("x"), Value::from("y")]
        );
    }

    #[test]
    fn column_iterates_values_by_name() {
        let t = TabularResult::new(
            vec!["hello".into(), "world".into()],
            vec![vec![Value::from("alpha"), Value::from("bravo")]],
        );
        let world: Vec<_> = t.column("world").unwrap().collect();
        assert_eq!(world, vec![&Value::from("bravo")]);
        assert!(t.column("missing").is_none());
    }
}
