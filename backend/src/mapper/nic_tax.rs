//! NIC/Tax rows ↔ [`NicTaxEntry`].
//!
//! `RecordName`, `StartDate`, `EndDate` and `BaseLocationId` describe the
//! whole batch and are read from the first row only.

use rust_decimal::Decimal;

use super::fields::{RowBuilder, RowCheck};
use super::schema::nic_tax::*;
use super::{import_with_period, MapOutcome};
use crate::models::{FlatRow, NicTaxEntry, NicTaxPeriod};
use crate::translate::LocationCodeMap;

struct Amounts {
    employee_id: String,
    ees_nic: Decimal,
    er_nic: Decimal,
    ees_tax: Decimal,
    notes: Option<String>,
}

pub fn import_rows(rows: &[FlatRow], locations: &LocationCodeMap) -> MapOutcome<NicTaxEntry> {
    import_with_period(
        rows,
        &RECORD_LEVEL,
        |check| read_period(check, locations),
        read_amounts,
        |period, a| NicTaxEntry {
            period,
            employee_id: a.employee_id,
            ees_nic: a.ees_nic,
            er_nic: a.er_nic,
            ees_tax: a.ees_tax,
            notes: a.notes,
        },
    )
}

fn read_period(check: &mut RowCheck<'_>, locations: &LocationCodeMap) -> Option<NicTaxPeriod> {
    let record_name = check.required_text(RECORD_NAME);
    let start_date = check.date(START_DATE);
    let end_date = check.date(END_DATE);
    if let (Some(start), Some(end)) = (start_date, end_date) {
        check.date_order(END_DATE, start, end);
    }
    let base_location_id = check.location(BASE_LOCATION_ID, locations);

    Some(NicTaxPeriod {
        record_name: record_name?,
        start_date: start_date?,
        end_date: end_date?,
        base_location_id: base_location_id?,
    })
}

fn read_amounts(check: &mut RowCheck<'_>) -> Option<Amounts> {
    let employee_id = check.required_text(EMPLOYEE_ID);
    let ees_nic = check.decimal(EES_NIC);
    let er_nic = check.decimal(ER_NIC);
    let ees_tax = check.decimal(EES_TAX);

    Some(Amounts {
        employee_id: employee_id?,
        ees_nic: ees_nic?,
        er_nic: er_nic?,
        ees_tax: ees_tax?,
        notes: check.optional_text(NOTES),
    })
}

/// Flatten one entry; the record-level columns are repeated on every row.
pub fn export_row(entry: &NicTaxEntry, locations: &LocationCodeMap) -> (FlatRow, Vec<String>) {
    let mut out = RowBuilder::default();
    let (code, found) = locations.code_or_raw(&entry.period.base_location_id);
    let unresolved = if found {
        Vec::new()
    } else {
        vec![entry.period.base_location_id.clone()]
    };

    out.set(RECORD_NAME, entry.period.record_name.as_str());
    out.set_date(START_DATE, Some(entry.period.start_date));
    out.set_date(END_DATE, Some(entry.period.end_date));
    out.set(BASE_LOCATION_ID, code);
    out.set(EMPLOYEE_ID, entry.employee_id.as_str());
    out.set_decimal(EES_NIC, Some(entry.ees_nic));
    out.set_decimal(ER_NIC, Some(entry.er_nic));
    out.set_decimal(EES_TAX, Some(entry.ees_tax));
    out.set_opt(NOTES, entry.notes.as_deref());

    (out.finish(&COLUMNS), unresolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RowErrorKind;
    use rust_decimal_macros::dec;

    fn locations() -> LocationCodeMap {
        LocationCodeMap::from_pairs([("loc-1", "LDN")]).unwrap()
    }

    fn row(values: [&str; 9]) -> FlatRow {
        FlatRow::from_pairs(COLUMNS.iter().copied().zip(values))
    }

    #[test]
    fn test_record_level_from_first_row() {
        let rows = vec![
            row(["April", "2024-04-01", "2024-04-30", "LDN", "e1", "10", "12.5", "30", ""]),
            row(["", "", "", "", "e2", "0", "0", "0", "leaver"]),
        ];
        let outcome = import_rows(&rows, &locations());

        assert!(outcome.errors.is_empty());
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.records.len(), 2);
        let second = &outcome.records[1];
        assert_eq!(second.period.record_name, "April");
        assert_eq!(second.period.base_location_id, "loc-1");
        assert_eq!(second.employee_id, "e2");
        assert_eq!(second.notes.as_deref(), Some("leaver"));
        assert_eq!(outcome.records[0].er_nic, dec!(12.5));
    }

    #[test]
    fn test_differing_record_level_warns() {
        let rows = vec![
            row(["April", "2024-04-01", "2024-04-30", "LDN", "e1", "1", "1", "1", ""]),
            row(["May", "2024-04-01", "2024-04-30", "LDN", "e2", "1", "1", "1", ""]),
        ];
        let outcome = import_rows(&rows, &locations());

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[1].period.record_name, "April");
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].row, 3);
        assert_eq!(outcome.warnings[0].column, "RecordName");
    }

    #[test]
    fn test_bad_first_row_rejects_all() {
        let rows = vec![
            row(["April", "2024-04-30", "2024-04-01", "XXX", "e1", "1", "1", "1", ""]),
            row(["", "", "", "", "e2", "1", "1", "1", ""]),
        ];
        let outcome = import_rows(&rows, &locations());

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.rejected_rows, vec![2, 3]);
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.errors.iter().all(|e| e.row == 2));
        assert!(matches!(outcome.errors[0].kind, RowErrorKind::Inconsistent { .. }));
        assert_eq!(
            outcome.errors[1].kind,
            RowErrorKind::UnknownLocation { code: "XXX".into() }
        );
    }

    #[test]
    fn test_amounts_required() {
        let rows = vec![row([
            "April", "2024-04-01", "2024-04-30", "LDN", "e1", "", "x", "-2", "",
        ])];
        let outcome = import_rows(&rows, &locations());

        let columns: Vec<&str> = outcome.errors.iter().map(|e| e.column.as_str()).collect();
        assert_eq!(columns, vec!["EesNIC", "ErNIC", "EesTax"]);
        assert_eq!(outcome.rejected_rows, vec![2]);
    }

    #[test]
    fn test_export_round_trip() {
        let rows = vec![row([
            "April", "2024-04-01", "2024-04-30", "LDN", "e1", "10.00", "12", "30", "note",
        ])];
        let entry = import_rows(&rows, &locations()).records.remove(0);

        let (exported, unresolved) = export_row(&entry, &locations());
        assert!(unresolved.is_empty());
        assert_eq!(exported, rows[0]);
    }
}
