//! Roster reading and shared row validation.
//!
//! Both pipeline stages consume header-first CSV with `name` and `email`
//! columns: the generator reads the roster, the dispatcher reads the
//! generator's success log. The schema gate and per-row trimming live here
//! so the two stages cannot drift apart.

use snafu::prelude::*;
use std::fs::File;

use crate::error::{MissingColumnSnafu, OpenRosterSnafu, ReadRowSnafu, RosterError};

/// One trimmed roster row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRow {
    pub name: String,
    pub email: String,
}

impl RosterRow {
    /// Returns the first required field that is empty, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.name.is_empty() {
            Some("name")
        } else if self.email.is_empty() {
            Some("email")
        } else {
            None
        }
    }
}

/// Positions of the required columns within the header row.
#[derive(Debug, Clone, Copy)]
struct Columns {
    name: usize,
    email: usize,
}

/// A validated reader over a roster-shaped CSV file.
///
/// Construction fails if either required column is absent, before any row
/// is processed. Additional columns are ignored.
#[derive(Debug)]
pub struct RosterReader {
    reader: csv::Reader<File>,
    columns: Columns,
    path: String,
}

impl RosterReader {
    /// Open a CSV file and verify the `name`/`email` header columns.
    pub fn open(path: &str) -> Result<Self, RosterError> {
        let mut reader = csv::Reader::from_path(path).context(OpenRosterSnafu { path })?;
        let headers = reader
            .headers()
            .context(OpenRosterSnafu { path })?
            .clone();

        let columns = Columns {
            name: require_column(&headers, "name", path)?,
            email: require_column(&headers, "email", path)?,
        };

        Ok(Self {
            reader,
            columns,
            path: path.to_string(),
        })
    }

    /// Iterate the remaining rows in stored order, trimming each field.
    pub fn rows(&mut self) -> impl Iterator<Item = Result<RosterRow, RosterError>> + '_ {
        let columns = self.columns;
        let path = self.path.clone();
        self.reader.records().map(move |record| {
            let record = record.context(ReadRowSnafu { path: path.clone() })?;
            Ok(RosterRow {
                name: field(&record, columns.name),
                email: field(&record, columns.email),
            })
        })
    }
}

fn require_column(
    headers: &csv::StringRecord,
    column: &str,
    path: &str,
) -> Result<usize, RosterError> {
    headers
        .iter()
        .position(|h| h == column)
        .context(MissingColumnSnafu { column, path })
}

fn field(record: &csv::StringRecord, index: usize) -> String {
    record.get(index).unwrap_or("").trim().to_string()
}

/// Derive the artifact filename key from a recipient name.
///
/// Spaces and path separators become underscores. This is not collision-free
/// ("A B" and "A_B" produce the same key); colliding names overwrite each
/// other's artifacts.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect()
}
