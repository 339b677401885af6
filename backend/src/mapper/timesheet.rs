//! Timesheet template rows ↔ [`TimesheetEntry`].

use rust_decimal::Decimal;

use super::fields::{RowBuilder, RowCheck};
use super::schema::timesheet::*;
use super::{import_with_period, MapOutcome};
use crate::codec;
use crate::error::LineItemError;
use crate::models::{FlatRow, LineItem, TimesheetEntry, TimesheetPeriod};
use crate::translate::LocationCodeMap;

struct Worked {
    payroll_id: String,
    employee_name: Option<String>,
    base_location_id: Option<String>,
    hours_worked: Option<Decimal>,
    days_worked: Option<Decimal>,
    extra_shift: Option<Decimal>,
    additions: Vec<LineItem>,
    deductions: Vec<LineItem>,
    notes: Option<String>,
}

pub fn import_rows(rows: &[FlatRow], locations: &LocationCodeMap) -> MapOutcome<TimesheetEntry> {
    import_with_period(
        rows,
        &RECORD_LEVEL,
        |check| read_period(check, locations),
        |check| read_worked(check, locations),
        |period, w| TimesheetEntry {
            period,
            payroll_id: w.payroll_id,
            employee_name: w.employee_name,
            base_location_id: w.base_location_id,
            hours_worked: w.hours_worked,
            days_worked: w.days_worked,
            extra_shift: w.extra_shift,
            additions: w.additions,
            deductions: w.deductions,
            notes: w.notes,
        },
    )
}

fn read_period(check: &mut RowCheck<'_>, locations: &LocationCodeMap) -> Option<TimesheetPeriod> {
    let name = check.required_text(TIMESHEET_NAME);
    let start_date = check.date(START_DATE);
    let end_date = check.date(END_DATE);
    if let (Some(start), Some(end)) = (start_date, end_date) {
        check.date_order(END_DATE, start, end);
    }
    let work_location_id = check.location(WORK_LOCATION, locations);

    Some(TimesheetPeriod {
        name: name?,
        start_date: start_date?,
        end_date: end_date?,
        work_location_id: work_location_id?,
    })
}

fn read_worked(check: &mut RowCheck<'_>, locations: &LocationCodeMap) -> Option<Worked> {
    let payroll_id = check.required_text(PAYROLL_ID);
    let hours_worked = check.optional_decimal(HOURS_WORKED);
    let days_worked = check.optional_decimal(DAYS_WORKED);
    let extra_shift = check.optional_decimal(EXTRA_SHIFT);
    let additions = check.line_items(ADDITION);
    let deductions = check.line_items(DEDUCTION);
    let base_location_id = check.optional_location(BASE_LOCATION, locations);

    Some(Worked {
        payroll_id: payroll_id?,
        employee_name: check.optional_text(EMPLOYEE_NAME),
        base_location_id: base_location_id.ok()?,
        hours_worked: hours_worked.ok()?,
        days_worked: days_worked.ok()?,
        extra_shift: extra_shift.ok()?,
        additions: additions?,
        deductions: deductions?,
        notes: check.optional_text(NOTES),
    })
}

/// Flatten one entry; the record-level columns are repeated on every row.
pub fn export_row(
    entry: &TimesheetEntry,
    locations: &LocationCodeMap,
) -> Result<(FlatRow, Vec<String>), LineItemError> {
    let mut out = RowBuilder::default();
    let mut unresolved = Vec::new();
    let mut code_for = |id: &str| {
        let (code, found) = locations.code_or_raw(id);
        if !found {
            unresolved.push(id.to_string());
        }
        code
    };

    out.set(TIMESHEET_NAME, entry.period.name.as_str());
    out.set_date(START_DATE, Some(entry.period.start_date));
    out.set_date(END_DATE, Some(entry.period.end_date));
    out.set(WORK_LOCATION, code_for(&entry.period.work_location_id));
    out.set_opt(EMPLOYEE_NAME, entry.employee_name.as_deref());
    out.set(PAYROLL_ID, entry.payroll_id.as_str());
    if let Some(id) = &entry.base_location_id {
        out.set(BASE_LOCATION, code_for(id));
    }
    out.set_decimal(HOURS_WORKED, entry.hours_worked);
    out.set_decimal(DAYS_WORKED, entry.days_worked);
    out.set_decimal(EXTRA_SHIFT, entry.extra_shift);
    out.set(ADDITION, codec::encode(&entry.additions)?);
    out.set(DEDUCTION, codec::encode(&entry.deductions)?);
    out.set_opt(NOTES, entry.notes.as_deref());

    Ok((out.finish(&COLUMNS), unresolved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RowErrorKind;
    use rust_decimal_macros::dec;

    fn locations() -> LocationCodeMap {
        LocationCodeMap::from_pairs([("loc-1", "LDN"), ("loc-2", "MAN")]).unwrap()
    }

    fn row(values: [&str; 13]) -> FlatRow {
        FlatRow::from_pairs(COLUMNS.iter().copied().zip(values))
    }

    #[test]
    fn test_optional_numbers_stay_absent() {
        let rows = vec![
            row([
                "Week 14", "2024-04-01", "2024-04-07", "LDN", "Jane Roe", "P-1", "MAN", "37.5",
                "", "", "Transport:50;20", "", "",
            ]),
            row([
                "", "", "", "", "", "P-2", "", "", "5", "1", "", "Uniform:12", "late",
            ]),
        ];
        let outcome = import_rows(&rows, &locations());
        assert!(outcome.errors.is_empty());

        let first = &outcome.records[0];
        assert_eq!(first.period.work_location_id, "loc-1");
        assert_eq!(first.base_location_id.as_deref(), Some("loc-2"));
        assert_eq!(first.hours_worked, Some(dec!(37.5)));
        assert_eq!(first.days_worked, None);
        assert_eq!(first.additions.len(), 2);

        let second = &outcome.records[1];
        assert_eq!(second.period.name, "Week 14");
        assert_eq!(second.hours_worked, None);
        assert_eq!(second.extra_shift, Some(dec!(1)));
        assert_eq!(second.deductions, vec![LineItem::named("Uniform", dec!(12))]);
    }

    #[test]
    fn test_entry_errors_in_order() {
        let rows = vec![row([
            "Week 14", "2024-04-01", "2024-04-07", "LDN", "", "", "BRS", "abc", "", "", "a:b:c",
            "", "",
        ])];
        let outcome = import_rows(&rows, &locations());

        let columns: Vec<&str> = outcome.errors.iter().map(|e| e.column.as_str()).collect();
        assert_eq!(columns, vec!["PayrollID", "HoursWorked", "Addition", "BaseLocation"]);
        assert!(matches!(outcome.errors[2].kind, RowErrorKind::BadLineItems { .. }));
    }

    #[test]
    fn test_end_before_start_rejected() {
        let rows = vec![row([
            "Week 14", "2024-04-07", "2024-04-01", "LDN", "", "P-1", "", "", "", "", "", "", "",
        ])];
        let outcome = import_rows(&rows, &locations());

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.errors[0].column, "EndDate");
    }

    #[test]
    fn test_export_round_trip() {
        let rows = vec![row([
            "Week 14", "2024-04-01", "2024-04-07", "LDN", "Jane Roe", "P-1", "MAN", "37.5",
            "4", "", "Transport:50;20", "", "ok",
        ])];
        let entry = import_rows(&rows, &locations()).records.remove(0);

        let (exported, unresolved) = export_row(&entry, &locations()).unwrap();
        assert!(unresolved.is_empty());
        assert_eq!(exported, rows[0]);
    }

    #[test]
    fn test_export_rejects_line_item_that_would_change_on_reimport() {
        let rows = vec![row([
            "Week 14", "2024-04-01", "2024-04-07", "LDN", "", "P-1", "", "", "", "", "", "", "",
        ])];
        let mut entry = import_rows(&rows, &locations()).records.remove(0);
        entry.deductions = vec![LineItem::named("Meal:Lunch", dec!(10))];

        let err = export_row(&entry, &locations()).unwrap_err();
        assert_eq!(err, LineItemError::UnencodableName("Meal:Lunch".into()));
    }
}
