//! Sheet selection for multi-sheet workbooks.
//!
//! Both workbook formats build a [`SheetCatalog`] and go through the same resolver, so
//! the selection rules live in exactly one place.

use std::fmt;

use serde::Serialize;

/// One sheet as listed in the workbook, in workbook order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetEntry {
    pub name: String,
    /// Whether the workbook marks this as the sheet shown on open.
    pub active: bool,
    pub visible: bool,
}

impl SheetEntry {
    pub fn new(name: impl Into<String>, active: bool, visible: bool) -> Self {
        Self {
            name: name.into(),
            active,
            visible,
        }
    }
}

/// Why a sheet was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    /// The caller's hint is a substring of the sheet name.
    Hint,
    /// The workbook flags the sheet as active.
    Active,
    /// No sheet is flagged active; this is the first visible one.
    FirstVisible,
    /// No sheet is active or visible.
    FirstEntry,
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hint => "hint",
            Self::Active => "active",
            Self::FirstVisible => "first visible",
            Self::FirstEntry => "first entry",
        })
    }
}

/// The single sheet chosen from a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetSelection {
    pub name: String,
    pub reason: SelectionReason,
}

/// Non-empty ordered list of a workbook's sheets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetCatalog {
    entries: Vec<SheetEntry>,
}

impl SheetCatalog {
    /// Build a catalog. Returns `None` for an empty sheet list.
    pub fn new(entries: Vec<SheetEntry>) -> Option<Self> {
        if entries.is_empty() {
            None
        } else {
            Some(Self { entries })
        }
    }

    /// Build a catalog from a format that records visibility but no active flag.
    ///
    /// The first visible sheet is what such workbooks show on open, so it is flagged
    /// active here.
    pub fn from_visibility<I, S>(sheets: I) -> Option<Self>
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        let mut seen_visible = false;
        let entries = sheets
            .into_iter()
            .map(|(name, visible)| {
                let active = visible && !seen_visible;
                seen_visible |= visible;
                SheetEntry::new(name, active, visible)
            })
            .collect();
        Self::new(entries)
    }

    pub fn entries(&self) -> &[SheetEntry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// The sheet shown when a workbook is opened.
    ///
    /// The active entry if any, else the first visible entry, else the first entry.
    pub fn default_sheet(&self) -> SheetSelection {
        let (entry, reason) = if let Some(e) = self.entries.iter().find(|e| e.active) {
            (e, SelectionReason::Active)
        } else if let Some(e) = self.entries.iter().find(|e| e.visible) {
            (e, SelectionReason::FirstVisible)
        } else {
            (&self.entries[0], SelectionReason::FirstEntry)
        };
        SheetSelection {
            name: entry.name.clone(),
            reason,
        }
    }

    /// Pick exactly one sheet.
    ///
    /// A hint selects the first sheet (hidden ones included) whose name contains it,
    /// case-sensitively. No hint, an empty hint, or a hint that matches nothing all
    /// resolve to [`Self::default_sheet`].
    pub fn resolve(&self, hint: Option<&str>) -> SheetSelection {
        let hint = hint.filter(|h| !h.is_empty());
        if let Some(h) = hint {
            if let Some(e) = self.entries.iter().find(|e| e.name.contains(h)) {
                return SheetSelection {
                    name: e.name.clone(),
                    reason: SelectionReason::Hint,
                };
            }
        }

        let selection = self.default_sheet();
        if let Some(h) = hint {
            tracing::info!(
                hint = h,
                sheet = %selection.name,
                reason = %selection.reason,
                "sheet hint matched nothing, using default sheet"
            );
        }
        selection
    }
}
