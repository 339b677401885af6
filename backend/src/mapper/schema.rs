//! Fixed column schemas per record kind.
//!
//! Column order here is the export order. Import is header-driven, so input
//! files may order (or omit) columns freely.

use crate::models::RecordKind;

pub mod employee {
    pub const EMPLOYEE_ID: &str = "employeeId";
    pub const FIRST_NAME: &str = "firstName";
    pub const LAST_NAME: &str = "lastName";
    pub const PREFERRED_NAME: &str = "preferredName";
    pub const GENDER: &str = "gender";
    pub const DATE_OF_BIRTH: &str = "dateOfBirth";
    pub const MOBILE_NO: &str = "mobileNo";
    pub const EMAIL: &str = "email";
    pub const ADDRESS: &str = "address";
    pub const PAYROLL_ID: &str = "payrollId";
    pub const STATUS: &str = "status";
    pub const BASE_LOCATION_ID: &str = "baseLocationId";
    pub const LOCATION_ACCESS: &str = "locationAccess";
    pub const PAY_STRUCTURE_NAME: &str = "payStructureName";

    pub const HAS_DAILY_RATES: &str = "hasDailyRates";
    pub const NI_DAY_MODE: &str = "niDayMode";
    pub const NI_REGULAR_DAYS: &str = "ni_regularDays";
    pub const NI_REGULAR_DAY_RATE: &str = "ni_regularDayRate";
    pub const NI_EXTRA_DAY_RATE: &str = "ni_extraDayRate";
    pub const NI_EXTRA_SHIFT_RATE: &str = "ni_extraShiftRate";
    pub const CASH_DAY_MODE: &str = "cashDayMode";
    pub const CASH_REGULAR_DAYS: &str = "cash_regularDays";
    pub const CASH_REGULAR_DAY_RATE: &str = "cash_regularDayRate";
    pub const CASH_EXTRA_DAY_RATE: &str = "cash_extraDayRate";
    pub const CASH_EXTRA_SHIFT_RATE: &str = "cash_extraShiftRate";

    pub const HAS_HOURLY_RATES: &str = "hasHourlyRates";
    pub const NI_HOURS_MODE: &str = "niHoursMode";
    pub const MIN_NI_HOURS: &str = "minNiHours";
    pub const MAX_NI_HOURS: &str = "maxNiHours";
    pub const PERCENTAGE_NI_HOURS: &str = "percentageNiHours";
    pub const NI_RATE_PER_HOUR: &str = "niRatePerHour";
    pub const FIXED_NI_HOURS: &str = "fixedNiHours";
    pub const CASH_HOURS_MODE: &str = "cashHoursMode";
    pub const MIN_CASH_HOURS: &str = "minCashHours";
    pub const MAX_CASH_HOURS: &str = "maxCashHours";
    pub const PERCENTAGE_CASH_HOURS: &str = "percentageCashHours";
    pub const CASH_RATE_PER_HOUR: &str = "cashRatePerHour";

    pub const HAS_OTHER_CONSIDERATIONS: &str = "hasOtherConsiderations";
    pub const NOTE: &str = "note";
    pub const NI_ADDITIONS: &str = "niAdditions";
    pub const NI_DEDUCTIONS: &str = "niDeductions";
    pub const CASH_ADDITIONS: &str = "cashAdditions";
    pub const CASH_DEDUCTIONS: &str = "cashDeductions";

    /// `[regularDays, regularDayRate, extraDayRate, extraShiftRate]` for NI.
    pub const NI_DAY_RATES: [&str; 4] = [
        NI_REGULAR_DAYS,
        NI_REGULAR_DAY_RATE,
        NI_EXTRA_DAY_RATE,
        NI_EXTRA_SHIFT_RATE,
    ];

    /// `[regularDays, regularDayRate, extraDayRate, extraShiftRate]` for cash.
    pub const CASH_DAY_RATES: [&str; 4] = [
        CASH_REGULAR_DAYS,
        CASH_REGULAR_DAY_RATE,
        CASH_EXTRA_DAY_RATE,
        CASH_EXTRA_SHIFT_RATE,
    ];

    pub const DAILY_GROUP: [&str; 10] = [
        NI_DAY_MODE,
        NI_REGULAR_DAYS,
        NI_REGULAR_DAY_RATE,
        NI_EXTRA_DAY_RATE,
        NI_EXTRA_SHIFT_RATE,
        CASH_DAY_MODE,
        CASH_REGULAR_DAYS,
        CASH_REGULAR_DAY_RATE,
        CASH_EXTRA_DAY_RATE,
        CASH_EXTRA_SHIFT_RATE,
    ];

    pub const NI_HOURS_FIELDS: [&str; 5] = [
        MIN_NI_HOURS,
        MAX_NI_HOURS,
        PERCENTAGE_NI_HOURS,
        NI_RATE_PER_HOUR,
        FIXED_NI_HOURS,
    ];

    pub const CASH_HOURS_FIELDS: [&str; 4] = [
        MIN_CASH_HOURS,
        MAX_CASH_HOURS,
        PERCENTAGE_CASH_HOURS,
        CASH_RATE_PER_HOUR,
    ];

    pub const HOURLY_GROUP: [&str; 11] = [
        NI_HOURS_MODE,
        MIN_NI_HOURS,
        MAX_NI_HOURS,
        PERCENTAGE_NI_HOURS,
        NI_RATE_PER_HOUR,
        FIXED_NI_HOURS,
        CASH_HOURS_MODE,
        MIN_CASH_HOURS,
        MAX_CASH_HOURS,
        PERCENTAGE_CASH_HOURS,
        CASH_RATE_PER_HOUR,
    ];

    pub const OTHER_GROUP: [&str; 5] = [
        NOTE,
        NI_ADDITIONS,
        NI_DEDUCTIONS,
        CASH_ADDITIONS,
        CASH_DEDUCTIONS,
    ];

    pub const COLUMNS: [&str; 42] = [
        FIRST_NAME,
        LAST_NAME,
        PREFERRED_NAME,
        GENDER,
        DATE_OF_BIRTH,
        MOBILE_NO,
        EMAIL,
        ADDRESS,
        PAYROLL_ID,
        STATUS,
        BASE_LOCATION_ID,
        LOCATION_ACCESS,
        PAY_STRUCTURE_NAME,
        HAS_DAILY_RATES,
        NI_DAY_MODE,
        NI_REGULAR_DAYS,
        NI_REGULAR_DAY_RATE,
        NI_EXTRA_DAY_RATE,
        NI_EXTRA_SHIFT_RATE,
        CASH_DAY_MODE,
        CASH_REGULAR_DAYS,
        CASH_REGULAR_DAY_RATE,
        CASH_EXTRA_DAY_RATE,
        CASH_EXTRA_SHIFT_RATE,
        HAS_HOURLY_RATES,
        NI_HOURS_MODE,
        MIN_NI_HOURS,
        MAX_NI_HOURS,
        PERCENTAGE_NI_HOURS,
        NI_RATE_PER_HOUR,
        FIXED_NI_HOURS,
        CASH_HOURS_MODE,
        MIN_CASH_HOURS,
        MAX_CASH_HOURS,
        PERCENTAGE_CASH_HOURS,
        CASH_RATE_PER_HOUR,
        HAS_OTHER_CONSIDERATIONS,
        NOTE,
        NI_ADDITIONS,
        NI_DEDUCTIONS,
        CASH_ADDITIONS,
        CASH_DEDUCTIONS,
    ];
}

pub mod nic_tax {
    pub const RECORD_NAME: &str = "RecordName";
    pub const START_DATE: &str = "StartDate";
    pub const END_DATE: &str = "EndDate";
    pub const BASE_LOCATION_ID: &str = "BaseLocationId";
    pub const EMPLOYEE_ID: &str = "EmployeeId";
    pub const EES_NIC: &str = "EesNIC";
    pub const ER_NIC: &str = "ErNIC";
    pub const EES_TAX: &str = "EesTax";
    pub const NOTES: &str = "Notes";

    /// Record-level columns, read from the first row.
    pub const RECORD_LEVEL: [&str; 4] = [RECORD_NAME, START_DATE, END_DATE, BASE_LOCATION_ID];

    pub const COLUMNS: [&str; 9] = [
        RECORD_NAME,
        START_DATE,
        END_DATE,
        BASE_LOCATION_ID,
        EMPLOYEE_ID,
        EES_NIC,
        ER_NIC,
        EES_TAX,
        NOTES,
    ];
}

pub mod timesheet {
    pub const TIMESHEET_NAME: &str = "TimesheetName";
    pub const START_DATE: &str = "StartDate";
    pub const END_DATE: &str = "EndDate";
    pub const WORK_LOCATION: &str = "WorkLocation";
    pub const EMPLOYEE_NAME: &str = "EmployeeName";
    pub const PAYROLL_ID: &str = "PayrollID";
    pub const BASE_LOCATION: &str = "BaseLocation";
    pub const HOURS_WORKED: &str = "HoursWorked";
    pub const DAYS_WORKED: &str = "DaysWorked";
    pub const EXTRA_SHIFT: &str = "ExtraShift";
    pub const ADDITION: &str = "Addition";
    pub const DEDUCTION: &str = "Deduction";
    pub const NOTES: &str = "Notes";

    /// Record-level columns, read from the first row.
    pub const RECORD_LEVEL: [&str; 4] = [TIMESHEET_NAME, START_DATE, END_DATE, WORK_LOCATION];

    pub const COLUMNS: [&str; 13] = [
        TIMESHEET_NAME,
        START_DATE,
        END_DATE,
        WORK_LOCATION,
        EMPLOYEE_NAME,
        PAYROLL_ID,
        BASE_LOCATION,
        HOURS_WORKED,
        DAYS_WORKED,
        EXTRA_SHIFT,
        ADDITION,
        DEDUCTION,
        NOTES,
    ];
}

/// Export column order for `kind`.
pub fn columns(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::Employee => &employee::COLUMNS,
        RecordKind::NicTax => &nic_tax::COLUMNS,
        RecordKind::Timesheet => &timesheet::COLUMNS,
    }
}

/// Employee columns prefixed with `employeeId`, used for bulk-update files.
pub fn employee_update_columns() -> Vec<&'static str> {
    std::iter::once(employee::EMPLOYEE_ID)
        .chain(employee::COLUMNS.iter().copied())
        .collect()
}
