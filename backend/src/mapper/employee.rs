//! Employee rows ↔ [`EmployeeRecord`].
//!
//! Each of the three pay gates decides whether its column group is read.
//! A false gate leaves the substructure absent; populated columns behind it
//! are ignored with a warning.

use rust_decimal::Decimal;

use super::fields::{RowBuilder, RowCheck};
use super::schema::employee::*;
use super::RowOutcome;
use crate::codec;
use crate::error::{LineItemError, RowErrorKind};
use crate::models::{
    CashDayPlan, CashHoursPlan, DailyRates, DayRates, EmployeeRecord, FlatRow, HourlyRates,
    HoursRange, NiDayPlan, NiHoursPlan, OtherConsiderations, PayStructure, WriteMode,
};
use crate::translate::{join_list, LocationCodeMap};

/// Map one employee row.
///
/// `row_no` is the spreadsheet row errors are reported against. In
/// [`WriteMode::Update`] the `employeeId` column is required.
pub fn import_row(
    row: &FlatRow,
    row_no: usize,
    mode: WriteMode,
    locations: &LocationCodeMap,
) -> RowOutcome<EmployeeRecord> {
    let mut check = RowCheck::new(row, row_no);

    // Identity
    let employee_id = match mode {
        WriteMode::Update => check.required_text(EMPLOYEE_ID),
        WriteMode::Create => check.optional_text(EMPLOYEE_ID),
    };
    let first_name = check.required_text(FIRST_NAME);
    let last_name = check.required_text(LAST_NAME);
    let email = check.optional_text(EMAIL);
    if let Some(email) = &email {
        if !email.contains('@') {
            check.push(
                EMAIL,
                RowErrorKind::Invalid {
                    message: format!("'{}' is not an email address", email),
                },
            );
        }
    }

    let daily_gate = check.gate(HAS_DAILY_RATES);
    let hourly_gate = check.gate(HAS_HOURLY_RATES);
    let other_gate = check.gate(HAS_OTHER_CONSIDERATIONS);
    let daily_on = matches!(daily_gate, Ok(true));
    let hourly_on = matches!(hourly_gate, Ok(true));
    let other_on = matches!(other_gate, Ok(true));

    // Modes
    let day_modes = daily_on.then(|| {
        (
            check.mode(NI_DAY_MODE, &NiDayPlan::MODES),
            check.mode(CASH_DAY_MODE, &CashDayPlan::MODES),
        )
    });
    let hour_modes = hourly_on.then(|| {
        (
            check.mode(NI_HOURS_MODE, &NiHoursPlan::MODES),
            check.mode(CASH_HOURS_MODE, &CashHoursPlan::MODES),
        )
    });

    // Numbers and dates
    let daily_rates = day_modes.map(|(ni, cash)| {
        let ni = ni.and_then(|m| ni_day_plan(&mut check, m));
        let cash = cash.and_then(|m| cash_day_plan(&mut check, m));
        Some(DailyRates { ni: ni?, cash: cash? })
    });
    let hourly_rates = hour_modes.map(|(ni, cash)| {
        let ni = ni.and_then(|m| ni_hours_plan(&mut check, m));
        let cash = cash.and_then(|m| cash_hours_plan(&mut check, m));
        Some(HourlyRates { ni: ni?, cash: cash? })
    });
    let date_of_birth = check.optional_date(DATE_OF_BIRTH);

    // Gates
    for (column, gate, group) in [
        (HAS_DAILY_RATES, &daily_gate, &DAILY_GROUP[..]),
        (HAS_HOURLY_RATES, &hourly_gate, &HOURLY_GROUP[..]),
        (HAS_OTHER_CONSIDERATIONS, &other_gate, &OTHER_GROUP[..]),
    ] {
        match gate {
            Err(e) => check.extend([e.clone()]),
            Ok(false) => check.warn_ignored(column, group, &format!("{} is FALSE", column)),
            Ok(true) => {}
        }
    }

    // Line items
    let other_considerations = other_on.then(|| {
        let ni_additions = check.line_items(NI_ADDITIONS);
        let ni_deductions = check.line_items(NI_DEDUCTIONS);
        let cash_additions = check.line_items(CASH_ADDITIONS);
        let cash_deductions = check.line_items(CASH_DEDUCTIONS);
        Some(OtherConsiderations {
            note: check.optional_text(NOTE),
            ni_additions: ni_additions?,
            ni_deductions: ni_deductions?,
            cash_additions: cash_additions?,
            cash_deductions: cash_deductions?,
        })
    });

    // Locations
    let base_location_id = check.optional_location(BASE_LOCATION_ID, locations);
    let location_access = check.location_list(LOCATION_ACCESS, locations);

    let record = (|| {
        Some(EmployeeRecord {
            employee_id,
            first_name: first_name?,
            last_name: last_name?,
            preferred_name: check.optional_text(PREFERRED_NAME),
            gender: check.optional_text(GENDER),
            date_of_birth: date_of_birth.ok()?,
            mobile_no: check.optional_text(MOBILE_NO),
            email,
            address: check.optional_text(ADDRESS),
            payroll_id: check.optional_text(PAYROLL_ID),
            status: check.optional_text(STATUS),
            base_location_id: base_location_id.ok()?,
            location_access: location_access?,
            pay_structure: PayStructure {
                name: check.optional_text(PAY_STRUCTURE_NAME),
                daily_rates: daily_rates.map_or(Some(None), |r| r.map(Some))?,
                hourly_rates: hourly_rates.map_or(Some(None), |r| r.map(Some))?,
                other_considerations: other_considerations.map_or(Some(None), |r| r.map(Some))?,
            },
        })
    })();

    check.finish(record)
}

fn day_rates(
    check: &mut RowCheck<'_>,
    mode_column: &str,
    mode: &str,
    columns: &[&'static str; 4],
) -> Option<Option<DayRates>> {
    if mode == "NONE" {
        check.warn_ignored(mode_column, columns, &format!("{} is NONE", mode_column));
        return Some(None);
    }
    let [days, rate, extra_day, extra_shift] = columns.map(|c| check.decimal(c));
    Some(Some(DayRates {
        regular_days: days?,
        regular_day_rate: rate?,
        extra_day_rate: extra_day?,
        extra_shift_rate: extra_shift?,
    }))
}

fn ni_day_plan(check: &mut RowCheck<'_>, mode: &str) -> Option<NiDayPlan> {
    let rates = day_rates(check, NI_DAY_MODE, mode, &NI_DAY_RATES)?;
    Some(match (mode, rates) {
        ("ALL", Some(r)) => NiDayPlan::All(r),
        ("FIXED", Some(r)) => NiDayPlan::Fixed(r),
        _ => NiDayPlan::None,
    })
}

fn cash_day_plan(check: &mut RowCheck<'_>, mode: &str) -> Option<CashDayPlan> {
    let rates = day_rates(check, CASH_DAY_MODE, mode, &CASH_DAY_RATES)?;
    Some(match rates {
        Some(r) => CashDayPlan::All(r),
        None => CashDayPlan::None,
    })
}

/// `min`, `max` and `percentage` for a `CUSTOM` hours mode.
fn hours_range(
    check: &mut RowCheck<'_>,
    min_column: &str,
    max_column: &str,
    percentage_column: &str,
) -> Option<HoursRange> {
    let min = check.decimal(min_column);
    let max = check.decimal(max_column);
    let percentage = check.decimal(percentage_column);
    let (min, max, percentage) = (min?, max?, percentage?);

    if max < min {
        check.push(
            max_column,
            RowErrorKind::Inconsistent {
                message: format!("{} ({}) is below {} ({})", max_column, max, min_column, min),
            },
        );
        return None;
    }
    if percentage > Decimal::ONE_HUNDRED {
        check.push(
            percentage_column,
            RowErrorKind::Invalid {
                message: format!("percentage {} is above 100", percentage),
            },
        );
        return None;
    }
    Some(HoursRange { min, max, percentage })
}

fn ni_hours_plan(check: &mut RowCheck<'_>, mode: &str) -> Option<NiHoursPlan> {
    match mode {
        "ALL" => Some(NiHoursPlan::All {
            rate_per_hour: check.decimal(NI_RATE_PER_HOUR)?,
        }),
        "FIXED" => {
            let fixed_hours = check.decimal(FIXED_NI_HOURS);
            let rate_per_hour = check.decimal(NI_RATE_PER_HOUR);
            Some(NiHoursPlan::Fixed {
                fixed_hours: fixed_hours?,
                rate_per_hour: rate_per_hour?,
            })
        }
        "CUSTOM" => {
            let range = hours_range(check, MIN_NI_HOURS, MAX_NI_HOURS, PERCENTAGE_NI_HOURS);
            let rate_per_hour = check.decimal(NI_RATE_PER_HOUR);
            Some(NiHoursPlan::Custom {
                range: range?,
                rate_per_hour: rate_per_hour?,
            })
        }
        _ => {
            check.warn_ignored(NI_HOURS_MODE, &NI_HOURS_FIELDS, "niHoursMode is NONE");
            Some(NiHoursPlan::None)
        }
    }
}

fn cash_hours_plan(check: &mut RowCheck<'_>, mode: &str) -> Option<CashHoursPlan> {
    match mode {
        "ALL" => Some(CashHoursPlan::All {
            rate_per_hour: check.decimal(CASH_RATE_PER_HOUR)?,
        }),
        "REST" => Some(CashHoursPlan::Rest {
            rate_per_hour: check.decimal(CASH_RATE_PER_HOUR)?,
        }),
        "CUSTOM" => {
            let range = hours_range(check, MIN_CASH_HOURS, MAX_CASH_HOURS, PERCENTAGE_CASH_HOURS);
            let rate_per_hour = check.decimal(CASH_RATE_PER_HOUR);
            Some(CashHoursPlan::Custom {
                range: range?,
                rate_per_hour: rate_per_hour?,
            })
        }
        _ => {
            check.warn_ignored(CASH_HOURS_MODE, &CASH_HOURS_FIELDS, "cashHoursMode is NONE");
            Some(CashHoursPlan::None)
        }
    }
}

/// Flatten one record in schema order.
///
/// Location ids are exported as codes; ids the directory does not know are
/// emitted raw and returned in the second value. With `with_id` the row
/// starts with the `employeeId` column. Fails when a line item could not be
/// read back from the exported text.
pub fn export_row(
    record: &EmployeeRecord,
    locations: &LocationCodeMap,
    with_id: bool,
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

    out.set_opt(EMPLOYEE_ID, record.employee_id.as_deref());
    out.set(FIRST_NAME, record.first_name.as_str());
    out.set(LAST_NAME, record.last_name.as_str());
    out.set_opt(PREFERRED_NAME, record.preferred_name.as_deref());
    out.set_opt(GENDER, record.gender.as_deref());
    out.set_date(DATE_OF_BIRTH, record.date_of_birth);
    out.set_opt(MOBILE_NO, record.mobile_no.as_deref());
    out.set_opt(EMAIL, record.email.as_deref());
    out.set_opt(ADDRESS, record.address.as_deref());
    out.set_opt(PAYROLL_ID, record.payroll_id.as_deref());
    out.set_opt(STATUS, record.status.as_deref());
    if let Some(id) = &record.base_location_id {
        out.set(BASE_LOCATION_ID, code_for(id));
    }
    let access: Vec<String> = record.location_access.iter().map(|id| code_for(id)).collect();
    out.set(LOCATION_ACCESS, join_list(&access));

    let pay = &record.pay_structure;
    out.set_opt(PAY_STRUCTURE_NAME, pay.name.as_deref());

    out.set_gate(HAS_DAILY_RATES, pay.has_daily_rates());
    if let Some(daily) = &pay.daily_rates {
        out.set(NI_DAY_MODE, daily.ni.mode());
        set_day_rates(&mut out, &NI_DAY_RATES, daily.ni.rates());
        out.set(CASH_DAY_MODE, daily.cash.mode());
        set_day_rates(&mut out, &CASH_DAY_RATES, daily.cash.rates());
    }

    out.set_gate(HAS_HOURLY_RATES, pay.has_hourly_rates());
    if let Some(hourly) = &pay.hourly_rates {
        out.set(NI_HOURS_MODE, hourly.ni.mode());
        match &hourly.ni {
            NiHoursPlan::None => {}
            NiHoursPlan::All { rate_per_hour } => {
                out.set_decimal(NI_RATE_PER_HOUR, Some(*rate_per_hour));
            }
            NiHoursPlan::Fixed {
                fixed_hours,
                rate_per_hour,
            } => {
                out.set_decimal(FIXED_NI_HOURS, Some(*fixed_hours));
                out.set_decimal(NI_RATE_PER_HOUR, Some(*rate_per_hour));
            }
            NiHoursPlan::Custom {
                range,
                rate_per_hour,
            } => {
                set_range(&mut out, [MIN_NI_HOURS, MAX_NI_HOURS, PERCENTAGE_NI_HOURS], range);
                out.set_decimal(NI_RATE_PER_HOUR, Some(*rate_per_hour));
            }
        }

        out.set(CASH_HOURS_MODE, hourly.cash.mode());
        match &hourly.cash {
            CashHoursPlan::None => {}
            CashHoursPlan::All { rate_per_hour } | CashHoursPlan::Rest { rate_per_hour } => {
                out.set_decimal(CASH_RATE_PER_HOUR, Some(*rate_per_hour));
            }
            CashHoursPlan::Custom {
                range,
                rate_per_hour,
            } => {
                set_range(
                    &mut out,
                    [MIN_CASH_HOURS, MAX_CASH_HOURS, PERCENTAGE_CASH_HOURS],
                    range,
                );
                out.set_decimal(CASH_RATE_PER_HOUR, Some(*rate_per_hour));
            }
        }
    }

    out.set_gate(HAS_OTHER_CONSIDERATIONS, pay.has_other_considerations());
    if let Some(other) = &pay.other_considerations {
        out.set_opt(NOTE, other.note.as_deref());
        out.set(NI_ADDITIONS, codec::encode(&other.ni_additions)?);
        out.set(NI_DEDUCTIONS, codec::encode(&other.ni_deductions)?);
        out.set(CASH_ADDITIONS, codec::encode(&other.cash_additions)?);
        out.set(CASH_DEDUCTIONS, codec::encode(&other.cash_deductions)?);
    }

    let row = if with_id {
        out.finish(&super::schema::employee_update_columns())
    } else {
        out.finish(&COLUMNS)
    };
    Ok((row, unresolved))
}

fn set_day_rates(out: &mut RowBuilder, columns: &[&'static str; 4], rates: Option<&DayRates>) {
    if let Some(r) = rates {
        let values = [
            r.regular_days,
            r.regular_day_rate,
            r.extra_day_rate,
            r.extra_shift_rate,
        ];
        for (column, value) in columns.iter().zip(values) {
            out.set_decimal(*column, Some(value));
        }
    }
}

fn set_range(out: &mut RowBuilder, columns: [&'static str; 3], range: &HoursRange) {
    let [min, max, percentage] = columns;
    out.set_decimal(min, Some(range.min));
    out.set_decimal(max, Some(range.max));
    out.set_decimal(percentage, Some(range.percentage));
}
