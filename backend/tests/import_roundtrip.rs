//! CSV → records → CSV across the public API.

use paybatch::mapper::schema;
use paybatch::models::{CashHoursPlan, NiDayPlan};
use paybatch::{
    export_records, import_rows, parse_str, to_csv, LocationCodeMap, RecordKind, WriteMode,
};
use rust_decimal_macros::dec;

fn locations() -> LocationCodeMap {
    LocationCodeMap::from_pairs([("loc-1", "LDN"), ("loc-2", "MAN"), ("loc-3", "BRS")]).unwrap()
}

fn csv_from(rows: &[Vec<(&str, &str)>]) -> String {
    let columns = schema::columns(RecordKind::Employee);
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(columns).unwrap();
    for row in rows {
        let values = columns.iter().map(|c| {
            row.iter()
                .find(|(name, _)| name == c)
                .map(|(_, v)| *v)
                .unwrap_or("")
        });
        writer.write_record(values).unwrap();
    }
    String::from_utf8(writer.into_inner().unwrap()).unwrap()
}

fn full_row() -> Vec<(&'static str, &'static str)> {
    vec![
        ("firstName", "Jane"),
        ("lastName", "Roe"),
        ("email", "jane@example.com"),
        ("address", "1 High St, Leeds"),
        ("dateOfBirth", "1990-02-28"),
        ("baseLocationId", "LDN"),
        ("locationAccess", "LDN;MAN"),
        ("payStructureName", "Standard"),
        ("hasDailyRates", "TRUE"),
        ("niDayMode", "FIXED"),
        ("ni_regularDays", "5"),
        ("ni_regularDayRate", "120"),
        ("ni_extraDayRate", "80"),
        ("ni_extraShiftRate", "40"),
        ("cashDayMode", "NONE"),
        ("hasHourlyRates", "TRUE"),
        ("niHoursMode", "CUSTOM"),
        ("minNiHours", "0"),
        ("maxNiHours", "16"),
        ("percentageNiHours", "50"),
        ("niRatePerHour", "11.44"),
        ("cashHoursMode", "REST"),
        ("cashRatePerHour", "10"),
        ("hasOtherConsiderations", "TRUE"),
        ("note", "probation"),
        ("niAdditions", "Transport:50;20"),
        ("cashDeductions", "Uniform:12"),
    ]
}

fn gates_off_row() -> Vec<(&'static str, &'static str)> {
    vec![
        ("firstName", "Sam"),
        ("lastName", "Poe"),
        ("baseLocationId", "BRS"),
        ("hasDailyRates", "FALSE"),
        ("hasHourlyRates", "FALSE"),
        ("hasOtherConsiderations", "FALSE"),
    ]
}

#[test]
fn test_partial_template_row() {
    let csv = "employeeId,firstName,lastName,hasDailyRates,niDayMode,ni_regularDays,ni_regularDayRate,ni_extraDayRate,ni_extraShiftRate\n\
               ,John,Doe,TRUE,ALL,5,120,80,40\n";
    let parsed = parse_str(csv, ',').unwrap();
    let outcome = import_rows(RecordKind::Employee, WriteMode::Create, &parsed.rows, &locations());

    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    assert_eq!(outcome.records.len(), 1);

    let json = serde_json::to_value(&outcome.records[0]).unwrap();
    assert_eq!(json["firstName"], "John");
    assert_eq!(json["payStructure"]["hasDailyRates"], true);
    assert_eq!(json["payStructure"]["dailyRates"]["ni"]["mode"], "ALL");
}

#[test]
fn test_employee_csv_round_trip() {
    let csv = csv_from(&[full_row(), gates_off_row()]);
    let parsed = parse_str(&csv, ',').unwrap();
    let first = import_rows(RecordKind::Employee, WriteMode::Create, &parsed.rows, &locations());
    assert!(first.errors.is_empty(), "{:?}", first.errors);
    assert!(first.warnings.is_empty());
    assert_eq!(first.records.len(), 2);

    let exported =
        export_records(RecordKind::Employee, &first.records, &locations(), false).unwrap();
    assert!(exported.unresolved.is_empty());
    let csv_out = to_csv(&exported).unwrap();

    let reparsed = parse_str(&csv_out, ',').unwrap();
    let second = import_rows(RecordKind::Employee, WriteMode::Create, &reparsed.rows, &locations());
    assert_eq!(second.records, first.records);

    let again =
        export_records(RecordKind::Employee, &second.records, &locations(), false).unwrap();
    let again = to_csv(&again).unwrap();
    assert_eq!(again, csv_out);
}

#[test]
fn test_round_trip_keeps_nested_values() {
    let csv = csv_from(&[full_row()]);
    let parsed = parse_str(&csv, ',').unwrap();
    let outcome = import_rows(RecordKind::Employee, WriteMode::Create, &parsed.rows, &locations());

    let record = match &outcome.records[0] {
        paybatch::DomainRecord::Employee(e) => e,
        other => panic!("unexpected record {:?}", other),
    };
    assert_eq!(record.base_location_id.as_deref(), Some("loc-1"));
    assert_eq!(record.location_access, vec!["loc-1".to_string(), "loc-2".to_string()]);

    let daily = record.pay_structure.daily_rates.as_ref().unwrap();
    assert!(matches!(daily.ni, NiDayPlan::Fixed(_)));
    let hourly = record.pay_structure.hourly_rates.as_ref().unwrap();
    assert_eq!(hourly.cash, CashHoursPlan::Rest { rate_per_hour: dec!(10) });

    let other = record.pay_structure.other_considerations.as_ref().unwrap();
    assert_eq!(other.ni_additions.len(), 2);
    assert_eq!(other.ni_additions[1].name, None);
    assert_eq!(other.ni_additions[1].amount, dec!(20));
}

#[test]
fn test_bad_rows_do_not_block_good_ones() {
    let mut bad = full_row();
    bad.retain(|(c, _)| *c != "lastName");
    bad.push(("niDayMode", "all"));
    bad.retain(|(c, v)| !(*c == "niDayMode" && *v == "FIXED"));

    let csv = csv_from(&[bad, gates_off_row()]);
    let parsed = parse_str(&csv, ',').unwrap();
    let outcome = import_rows(RecordKind::Employee, WriteMode::Create, &parsed.rows, &locations());

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.rejected_rows, vec![2]);
    let columns: Vec<&str> = outcome.errors.iter().map(|e| e.column.as_str()).collect();
    assert_eq!(columns, vec!["lastName", "niDayMode"]);
}
