use super::mapping::{canonical_column, FIRST_NAME, LAST_NAME};
use super::ImportError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::io::Read;

/// One roll row reduced to canonical columns, still as raw text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub dob: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub birth_year: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub jurisdiction_name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub registration_number: Option<String>,
}

/// Failure reading a single row from the stream.
#[derive(Debug)]
pub enum RowReadError {
    /// The row is malformed; it is skipped and the batch continues.
    Rejected(String),
    /// The stream itself is unreadable; the batch fails.
    Fatal(csv::Error),
}

impl From<csv::Error> for RowReadError {
    fn from(err: csv::Error) -> Self {
        match err.kind() {
            csv::ErrorKind::Io(_) | csv::ErrorKind::Utf8 { .. } => RowReadError::Fatal(err),
            _ => RowReadError::Rejected(err.to_string()),
        }
    }
}

/// Reads a CSV export, renaming recognized headers to canonical columns.
pub fn read_rows<R: Read>(
    reader: R,
) -> Result<impl Iterator<Item = Result<RollRow, RowReadError>>, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let mut claimed = HashSet::new();
    let mapped: csv::StringRecord = headers
        .iter()
        .map(|header| match canonical_column(header) {
            Some(column) if claimed.insert(column) => column.to_string(),
            _ => header.to_string(),
        })
        .collect();

    for required in [FIRST_NAME, LAST_NAME] {
        if !claimed.contains(required) {
            return Err(ImportError::MissingColumn(required));
        }
    }

    csv_reader.set_headers(mapped);
    Ok(csv_reader
        .into_deserialize::<RollRow>()
        .map(|row| row.map_err(RowReadError::from)))
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
