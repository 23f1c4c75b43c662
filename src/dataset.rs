use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

/// Tabular data parsed from an uploaded CSV file.
///
/// The serialized form is the split-oriented JSON layout the browser keeps in
/// local storage: `{"columns": [...], "data": [[...], ...]}`. Column order and
/// cell values round-trip exactly, so a dataset restored after a page reload
/// is indistinguishable from the original parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub columns: Vec<String>,
    #[serde(rename = "data")]
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug)]
pub enum DatasetError {
    ParsingError(String),
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetError::ParsingError(msg) => write!(f, "CSV parsing error: {}", msg),
        }
    }
}

impl Error for DatasetError {}

impl Dataset {
    /// Parses comma-separated text with the first row as header.
    pub fn from_csv(bytes: &[u8]) -> Result<Self, DatasetError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::None)
            .from_reader(bytes);

        let columns = reader
            .headers()
            .map_err(|e| DatasetError::ParsingError(e.to_string()))?
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<String>>();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| DatasetError::ParsingError(e.to_string()))?;
            rows.push(record.iter().map(|v| v.to_string()).collect());
        }

        Ok(Self { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// First `limit` rows, used for table previews in the UI.
    pub fn preview(&self, limit: usize) -> Dataset {
        Dataset {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(limit).cloned().collect(),
        }
    }

    /// Renders the dataset back to CSV text. Used to hand the table to the
    /// LLM collaborators, which only see a textual representation.
    pub fn to_csv_text(&self) -> String {
        let mut out = self.columns.join(",");
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.join(","));
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_rows() {
        let data = Dataset::from_csv(b"a,b\n1,2\n3,4\n5,6").unwrap();
        assert_eq!(data.columns, vec!["a", "b"]);
        assert_eq!(data.row_count(), 3);
        assert_eq!(data.rows[2], vec!["5", "6"]);
    }

    #[test]
    fn split_orient_round_trip() {
        let data = Dataset::from_csv(b"name,score\nalice,10\nbob,7").unwrap();
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"columns\""));
        assert!(json.contains("\"data\""));

        let restored: Dataset = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, data);
        assert_eq!(restored.columns, vec!["name", "score"]);
        assert_eq!(restored.rows[1], vec!["bob", "7"]);
    }

    #[test]
    fn preview_truncates_rows_only() {
        let data = Dataset::from_csv(b"a,b\n1,2\n3,4\n5,6").unwrap();
        let head = data.preview(2);
        assert_eq!(head.columns, data.columns);
        assert_eq!(head.row_count(), 2);
    }

    #[test]
    fn csv_text_preserves_order() {
        let data = Dataset::from_csv(b"a,b\n1,2\n").unwrap();
        assert_eq!(data.to_csv_text(), "a,b\n1,2\n");
    }
}
