//! Header-aware view over raw worksheet values.

use std::collections::HashMap;

pub const COL_CREATOR_NAME: &str = "Creator Name";
pub const COL_CREATOR_SEC_UID: &str = "Creator SecUid";
pub const COL_ACCOUNT_LINK: &str = "Account Link";
pub const COL_FOLLOWER_COUNT: &str = "Follower Count";

pub const CREATOR_HEADERS: [&str; 4] = [
    COL_CREATOR_NAME,
    COL_CREATOR_SEC_UID,
    COL_ACCOUNT_LINK,
    COL_FOLLOWER_COUNT,
];

#[derive(Debug, Clone, Default)]
pub struct SheetTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl SheetTable {
    /// The first row is the header; the rest are data rows.
    pub fn from_values(values: Vec<Vec<String>>) -> Self {
        let mut iter = values.into_iter();
        let headers = iter.next().unwrap_or_default();
        Self {
            headers,
            rows: iter.collect(),
        }
    }

    pub fn data_row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Cell text; cells past the end of a short row read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Data rows paired with their 1-based sheet row number.
    pub fn numbered_rows(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.rows
            .iter()
            .enumerate()
            .map(|(index, row)| (index + 2, row.as_slice()))
    }

    /// Non-blank values of one column, as written in the sheet.
    pub fn column_values(&self, name: &str) -> Vec<String> {
        let Some(col) = self.column_index(name) else {
            return Vec::new();
        };
        (0..self.rows.len())
            .map(|row| self.cell(row, col))
            .filter(|value| !value.trim().is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Data rows as header → value maps, skipping rows that are entirely blank.
    pub fn records(&self) -> Vec<HashMap<String, String>> {
        (0..self.rows.len())
            .filter(|&row| {
                (0..self.headers.len()).any(|col| !self.cell(row, col).trim().is_empty())
            })
            .map(|row| {
                self.headers
                    .iter()
                    .enumerate()
                    .filter(|(_, header)| !header.is_empty())
                    .map(|(col, header)| (header.clone(), self.cell(row, col).to_string()))
                    .collect()
            })
            .collect()
    }
}

/// Converts a 1-based row/column pair into A1 notation (`3, 28` → `AB3`).
pub fn a1_cell(row: usize, col: usize) -> String {
    format!("{}{}", column_letters(col), row.max(1))
}

pub fn column_letters(col: usize) -> String {
    let mut col = col.max(1);
    let mut letters = Vec::new();
    while col > 0 {
        let remainder = (col - 1) % 26;
        letters.push((b'A' + remainder as u8) as char);
        col = (col - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Quotes a sheet title for use inside a range (`It's` → `'It''s'`).
pub fn quote_sheet_name(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}
