//! Row/domain mapping.
//!
//! Import turns [`FlatRow`]s into validated [`DomainRecord`]s. A row yields
//! either a record or its field errors, never both, and a failing row never
//! stops its siblings. Export is the structural inverse in the fixed column
//! order of [`schema`].
//!
//! Within a row, errors are reported in this order: identity fields, mode
//! columns, numeric sub-fields, gate columns, line items, locations.

pub mod employee;
mod fields;
pub mod nic_tax;
pub mod schema;
pub mod timesheet;

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::error::{RowErrorKind, RowValidationError};
use crate::models::{DomainRecord, FlatRow, RecordKind, WriteMode};
use crate::translate::LocationCodeMap;
use fields::RowCheck;

pub use fields::DATE_FORMAT;

/// A non-fatal remark about a row that was still imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowWarning {
    pub row: usize,
    pub column: String,
    pub message: String,
}

/// Result of mapping a single row, plus the warnings it raised.
pub type RowOutcome<T> = (Result<T, Vec<RowValidationError>>, Vec<RowWarning>);

/// Result of mapping a whole batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapOutcome<T> {
    pub records: Vec<T>,
    /// Row numbers that produced no record, in input order.
    pub rejected_rows: Vec<usize>,
    pub errors: Vec<RowValidationError>,
    pub warnings: Vec<RowWarning>,
}

impl<T> Default for MapOutcome<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            rejected_rows: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl<T> MapOutcome<T> {
    fn push(&mut self, row_no: usize, outcome: RowOutcome<T>) {
        let (result, warnings) = outcome;
        self.warnings.extend(warnings);
        match result {
            Ok(record) => self.records.push(record),
            Err(errors) => {
                self.rejected_rows.push(row_no);
                self.errors.extend(errors);
            }
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> MapOutcome<U> {
        MapOutcome {
            records: self.records.into_iter().map(f).collect(),
            rejected_rows: self.rejected_rows,
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

/// Spreadsheet row number of the `index`-th data row.
///
/// Parsed rows carry their source line; rows built in memory are numbered
/// as if the header were row 1 and nothing was skipped.
pub fn row_number(row: &FlatRow, index: usize) -> usize {
    match row.line() {
        0 => index + 2,
        line => line as usize,
    }
}

/// Map a batch of rows of one kind.
///
/// Records sharing an identity are rejected after the first occurrence.
pub fn import_rows(
    kind: RecordKind,
    mode: WriteMode,
    rows: &[FlatRow],
    locations: &LocationCodeMap,
) -> MapOutcome<DomainRecord> {
    let outcome = match kind {
        RecordKind::Employee => {
            let mut outcome = MapOutcome::default();
            for (index, row) in rows.iter().enumerate() {
                let row_no = row_number(row, index);
                outcome.push(row_no, employee::import_row(row, row_no, mode, locations));
            }
            outcome.map(DomainRecord::from)
        }
        RecordKind::NicTax => nic_tax::import_rows(rows, locations).map(DomainRecord::from),
        RecordKind::Timesheet => timesheet::import_rows(rows, locations).map(DomainRecord::from),
    };
    reject_duplicates(outcome, rows)
}

fn identity_column(record: &DomainRecord) -> &'static str {
    match record {
        DomainRecord::Employee(e) if e.employee_id.is_some() => schema::employee::EMPLOYEE_ID,
        DomainRecord::Employee(_) => schema::employee::EMAIL,
        DomainRecord::NicTax(_) => schema::nic_tax::EMPLOYEE_ID,
        DomainRecord::Timesheet(_) => schema::timesheet::PAYROLL_ID,
    }
}

fn reject_duplicates(
    mut outcome: MapOutcome<DomainRecord>,
    rows: &[FlatRow],
) -> MapOutcome<DomainRecord> {
    let rejected: HashSet<usize> = outcome.rejected_rows.iter().copied().collect();
    let accepted: Vec<usize> = rows
        .iter()
        .enumerate()
        .map(|(i, r)| row_number(r, i))
        .filter(|n| !rejected.contains(n))
        .collect();

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut kept = Vec::with_capacity(outcome.records.len());

    for (record, row_no) in outcome.records.into_iter().zip(accepted) {
        let Some(identity) = record.identity().map(str::to_string) else {
            kept.push(record);
            continue;
        };
        match seen.get(&identity) {
            Some(first) => {
                outcome.errors.push(RowValidationError::new(
                    row_no,
                    identity_column(&record),
                    RowErrorKind::Inconsistent {
                        message: format!("'{}' already appears on row {}", identity, first),
                    },
                ));
                outcome.rejected_rows.push(row_no);
            }
            None => {
                seen.insert(identity, row_no);
                kept.push(record);
            }
        }
    }

    outcome.records = kept;
    outcome.rejected_rows.sort_unstable();
    outcome
}

/// Shared driver for kinds whose record-level fields come from the first row.
///
/// `read_period` reads the record-level fields of the first row. If they
/// fail, every row is rejected and the errors are reported on the first
/// row. Later rows holding different record-level values get a warning.
pub(crate) fn import_with_period<P, E, T>(
    rows: &[FlatRow],
    record_level: &[&'static str],
    read_period: impl FnOnce(&mut RowCheck<'_>) -> Option<P>,
    read_entry: impl Fn(&mut RowCheck<'_>) -> Option<E>,
    build: impl Fn(P, E) -> T,
) -> MapOutcome<T>
where
    P: Clone,
{
    let mut outcome = MapOutcome::default();
    let Some(first) = rows.first() else {
        return outcome;
    };

    let mut check = RowCheck::new(first, row_number(first, 0));
    let period = read_period(&mut check);
    let (period, warnings) = check.finish(period);
    outcome.warnings.extend(warnings);
    let period = match period {
        Ok(p) => Some(p),
        Err(errors) => {
            outcome.errors.extend(errors);
            None
        }
    };

    for (index, row) in rows.iter().enumerate() {
        let row_no = row_number(row, index);
        let mut check = RowCheck::new(row, row_no);
        if index > 0 {
            for column in record_level {
                let value = row.value(column);
                if !value.is_empty() && value != first.value(column) {
                    check.warn(
                        column,
                        format!(
                            "'{}' differs from the first row ('{}') and is ignored",
                            value,
                            first.value(column)
                        ),
                    );
                }
            }
        }

        let entry = read_entry(&mut check);
        let (entry, warnings) = check.finish(entry);
        let result = match (&period, entry) {
            (Some(p), Ok(e)) => Ok(build(p.clone(), e)),
            (None, Ok(_)) => Err(Vec::new()),
            (_, Err(errors)) => Err(errors),
        };
        outcome.push(row_no, (result, warnings));
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locations() -> LocationCodeMap {
        LocationCodeMap::from_pairs([("loc-1", "LDN")]).unwrap()
    }

    #[test]
    fn test_row_number_prefers_source_line() {
        let row = FlatRow::from_pairs([("a", "1")]);
        assert_eq!(row_number(&row, 0), 2);
        assert_eq!(row_number(&row.with_line(7), 0), 7);
    }

    #[test]
    fn test_failing_rows_do_not_stop_siblings() {
        let rows = vec![
            FlatRow::from_pairs([("firstName", "A"), ("lastName", "One")]),
            FlatRow::from_pairs([("firstName", ""), ("lastName", "Two")]),
            FlatRow::from_pairs([("firstName", "C"), ("lastName", "Three")]),
        ];
        let outcome = import_rows(RecordKind::Employee, WriteMode::Create, &rows, &locations());

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.rejected_rows, vec![3]);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].row, 3);
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let rows = vec![
            FlatRow::from_pairs([("employeeId", "e1"), ("firstName", "A"), ("lastName", "B")]),
            FlatRow::from_pairs([("employeeId", "e2"), ("firstName", ""), ("lastName", "B")]),
            FlatRow::from_pairs([("employeeId", "e1"), ("firstName", "C"), ("lastName", "D")]),
        ];
        let outcome = import_rows(RecordKind::Employee, WriteMode::Update, &rows, &locations());

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.rejected_rows, vec![3, 4]);
        let dup = &outcome.errors[1];
        assert_eq!(dup.row, 4);
        assert_eq!(dup.column, "employeeId");
        assert!(dup.to_string().contains("already appears on row 2"));
    }
}
