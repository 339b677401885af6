//! Export emitter.
//!
//! Flattens domain records into rows in the fixed column order of their kind
//! (ids translated back to location codes), then serializes them as CSV.
//! Unknown location ids do not fail the export: the raw id is written and
//! reported in [`ExportedRows::unresolved`]. A line item that would not read
//! back unchanged fails it.

use std::path::{Path, PathBuf};

use crate::api::logs::{log_info, log_warning};
use crate::error::ExportError;
use crate::mapper::{employee, nic_tax, schema, timesheet};
use crate::models::{DomainRecord, EmployeeRecord, FlatRow, NicTaxEntry, RecordKind, TimesheetEntry};
use crate::translate::LocationCodeMap;

/// Rows ready to serialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedRows {
    pub columns: Vec<&'static str>,
    pub rows: Vec<FlatRow>,
    /// Location ids written raw because the directory did not know them.
    pub unresolved: Vec<String>,
}

impl ExportedRows {
    fn new(columns: Vec<&'static str>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    fn push(&mut self, (row, unresolved): (FlatRow, Vec<String>)) {
        self.rows.push(row);
        for id in unresolved {
            if !self.unresolved.contains(&id) {
                self.unresolved.push(id);
            }
        }
    }
}

/// Flatten employees; `with_id` adds the leading `employeeId` column.
pub fn export_employees(
    records: &[EmployeeRecord],
    locations: &LocationCodeMap,
    with_id: bool,
) -> Result<ExportedRows, ExportError> {
    let columns = if with_id {
        schema::employee_update_columns()
    } else {
        schema::columns(RecordKind::Employee).to_vec()
    };
    let mut out = ExportedRows::new(columns);
    for record in records {
        out.push(employee::export_row(record, locations, with_id)?);
    }
    Ok(out)
}

pub fn export_nic_tax(entries: &[NicTaxEntry], locations: &LocationCodeMap) -> ExportedRows {
    let mut out = ExportedRows::new(schema::columns(RecordKind::NicTax).to_vec());
    for entry in entries {
        out.push(nic_tax::export_row(entry, locations));
    }
    out
}

pub fn export_timesheets(
    entries: &[TimesheetEntry],
    locations: &LocationCodeMap,
) -> Result<ExportedRows, ExportError> {
    let mut out = ExportedRows::new(schema::columns(RecordKind::Timesheet).to_vec());
    for entry in entries {
        out.push(timesheet::export_row(entry, locations)?);
    }
    Ok(out)
}

/// Flatten a record set of one `kind`; records of another kind are skipped.
pub fn export_records(
    kind: RecordKind,
    records: &[DomainRecord],
    locations: &LocationCodeMap,
    with_id: bool,
) -> Result<ExportedRows, ExportError> {
    match kind {
        RecordKind::Employee => {
            let employees: Vec<EmployeeRecord> = records
                .iter()
                .filter_map(|r| match r {
                    DomainRecord::Employee(e) => Some(e.clone()),
                    _ => None,
                })
                .collect();
            export_employees(&employees, locations, with_id)
        }
        RecordKind::NicTax => {
            let entries: Vec<NicTaxEntry> = records
                .iter()
                .filter_map(|r| match r {
                    DomainRecord::NicTax(e) => Some(e.clone()),
                    _ => None,
                })
                .collect();
            Ok(export_nic_tax(&entries, locations))
        }
        RecordKind::Timesheet => {
            let entries: Vec<TimesheetEntry> = records
                .iter()
                .filter_map(|r| match r {
                    DomainRecord::Timesheet(e) => Some(e.clone()),
                    _ => None,
                })
                .collect();
            export_timesheets(&entries, locations)
        }
    }
}

/// Serialize rows as comma-separated CSV with a header line.
///
/// Values containing the delimiter, quotes or newlines are quoted.
pub fn to_csv(exported: &ExportedRows) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b',')
        .from_writer(Vec::new());

    writer.write_record(&exported.columns)?;
    for row in &exported.rows {
        writer.write_record(exported.columns.iter().map(|c| row.value(c)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Lowercase alphanumerics joined by `-`; `export` when nothing is left.
pub fn slug(name: &str) -> String {
    let words: Vec<String> = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();
    if words.is_empty() {
        "export".to_string()
    } else {
        words.join("-")
    }
}

/// Deterministic file name: `<operation>-<slug(name)>.csv`.
pub fn export_file_name(operation: &str, name: &str) -> String {
    format!("{}-{}.csv", slug(operation), slug(name))
}

/// Write `exported` into `dir` under its deterministic name.
pub fn write_export(
    exported: &ExportedRows,
    dir: &Path,
    operation: &str,
    name: &str,
) -> Result<PathBuf, ExportError> {
    let csv = to_csv(exported)?;
    let path = dir.join(export_file_name(operation, name));
    std::fs::write(&path, csv)?;

    log_info(format!("Exported {} rows to {}", exported.rows.len(), path.display()));
    if !exported.unresolved.is_empty() {
        log_warning(format!(
            "{} location id(s) had no code and were written raw: {}",
            exported.unresolved.len(),
            exported.unresolved.join(", ")
        ));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LineItemError;
    use crate::models::{LineItem, NicTaxPeriod, OtherConsiderations, PayStructure};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn locations() -> LocationCodeMap {
        LocationCodeMap::from_pairs([("loc-1", "LDN")]).unwrap()
    }

    fn employee(first: &str, address: Option<&str>) -> EmployeeRecord {
        EmployeeRecord {
            employee_id: Some(format!("id-{}", first)),
            first_name: first.into(),
            last_name: "Doe".into(),
            preferred_name: None,
            gender: None,
            date_of_birth: None,
            mobile_no: None,
            email: None,
            address: address.map(str::to_string),
            payroll_id: None,
            status: None,
            base_location_id: Some("loc-1".into()),
            location_access: vec![],
            pay_structure: PayStructure::default(),
        }
    }

    #[test]
    fn test_slug_and_file_name() {
        assert_eq!(slug("April 2024 / Leeds"), "april-2024-leeds");
        assert_eq!(slug("  "), "export");
        assert_eq!(export_file_name("timesheet", "Week 14"), "timesheet-week-14.csv");
        assert_eq!(export_file_name("employees", ""), "employees-export.csv");
    }

    #[test]
    fn test_csv_header_and_quoting() {
        let exported = export_employees(&[employee("John", Some("1 High St, Leeds"))], &locations(), false)
                .unwrap();
        let csv = to_csv(&exported).unwrap();
        let mut lines = csv.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with("firstName,lastName,preferredName"));
        assert_eq!(header.split(',').count(), 42);

        let row = lines.next().unwrap();
        assert!(row.starts_with("John,Doe,"));
        assert!(row.contains("\"1 High St, Leeds\""));
        assert!(row.contains(",LDN,"));
        assert!(row.contains("FALSE"));
    }

    #[test]
    fn test_update_export_has_id_column() {
        let exported = export_employees(&[employee("Ann", None)], &locations(), true).unwrap();
        assert_eq!(exported.columns[0], "employeeId");
        assert_eq!(exported.rows[0].get("employeeId"), Some("id-Ann"));
    }

    #[test]
    fn test_unresolved_ids_collected_once() {
        let mut a = employee("A", None);
        a.base_location_id = Some("loc-404".into());
        let mut b = employee("B", None);
        b.base_location_id = Some("loc-404".into());

        let exported = export_employees(&[a, b], &locations(), false).unwrap();
        assert_eq!(exported.unresolved, vec!["loc-404".to_string()]);
        assert_eq!(exported.rows[1].get("baseLocationId"), Some("loc-404"));
    }

    #[test]
    fn test_export_records_filters_kind() {
        let entry = NicTaxEntry {
            period: NicTaxPeriod {
                record_name: "April".into(),
                start_date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2024, 4, 30).unwrap(),
                base_location_id: "loc-1".into(),
            },
            employee_id: "e1".into(),
            ees_nic: dec!(1),
            er_nic: dec!(2),
            ees_tax: dec!(3),
            notes: None,
        };
        let records = vec![DomainRecord::from(entry), DomainRecord::from(employee("X", None))];

        let exported = export_records(RecordKind::NicTax, &records, &locations(), false).unwrap();
        assert_eq!(exported.rows.len(), 1);
        assert_eq!(
            to_csv(&exported).unwrap(),
            "RecordName,StartDate,EndDate,BaseLocationId,EmployeeId,EesNIC,ErNIC,EesTax,Notes\n\
             April,2024-04-01,2024-04-30,LDN,e1,1,2,3,\n"
        );
    }

    #[test]
    fn test_export_fails_on_line_item_that_cannot_round_trip() {
        let mut record = employee("Lee", None);
        record.pay_structure.other_considerations = Some(OtherConsiderations {
            cash_additions: vec![LineItem::named("Bus;Train", dec!(4))],
            ..OtherConsiderations::default()
        });

        let err = export_employees(&[record], &locations(), false).unwrap_err();
        assert!(matches!(
            err,
            ExportError::LineItem(LineItemError::UnencodableName(ref name)) if name == "Bus;Train"
        ));
    }

    #[test]
    fn test_write_export_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let exported = export_nic_tax(&[], &locations());

        let path = write_export(&exported, dir.path(), "nic-tax", "April 2024").unwrap();
        assert_eq!(path.file_name().unwrap(), "nic-tax-april-2024.csv");
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.starts_with("RecordName,StartDate"));
    }
}
