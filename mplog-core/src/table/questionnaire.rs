//! Questionnaire data keyed by participant ID.
//!
//! A CSV file whose first row is a header and whose first column is the
//! participant ID. The remaining columns are opaque and appended verbatim.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Survey answers per participant.
#[derive(Debug, Clone, Default)]
pub struct Questionnaire {
    header: Vec<String>,
    rows: HashMap<String, Vec<String>>,
}

impl Questionnaire {
    /// Load a questionnaire CSV file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let questionnaire = Self::from_reader(file)?;
        tracing::info!(
            path = %path.display(),
            participants = questionnaire.len(),
            "Loaded questionnaire"
        );
        Ok(questionnaire)
    }

    /// Read questionnaire CSV data.
    ///
    /// A participant listed twice keeps the later row. A row with more or
    /// fewer cells than the header fails with [`Error::RaggedRow`].
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let header: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        if header.is_empty() {
            return Err(Error::Config("questionnaire has no header row".to_string()));
        }

        let mut rows = HashMap::new();
        for record in csv_reader.records() {
            let record = record?;
            let row: Vec<String> = record.iter().map(str::to_string).collect();
            let Some(key) = row.first().cloned() else {
                continue;
            };
            if row.len() != header.len() {
                return Err(Error::RaggedRow {
                    participant: key,
                    expected: header.len(),
                    found: row.len(),
                });
            }
            if rows.insert(key.clone(), row).is_some() {
                tracing::warn!(participant = %key, "Duplicate questionnaire row, keeping the later one");
            }
        }

        Ok(Self { header, rows })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// The full row (key column included) of a participant.
    pub fn row(&self, participant: &str) -> Option<&[String]> {
        self.rows.get(participant).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
