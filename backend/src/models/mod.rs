//! Domain models for the paybatch exchange engine.
//!
//! - [`FlatRow`] - one line of tabular input or output
//! - [`RecordKind`] - which fixed column schema a batch uses
//! - [`WriteMode`] - bulk create or bulk update
//! - [`EmployeeRecord`] / [`PayStructure`] - nested employee records with gated pay substructures
//! - [`NicTaxEntry`] - one employee's NIC/Tax amounts for a period
//! - [`TimesheetEntry`] - one employee's worked time for a period
//! - [`DomainRecord`] - tagged union of the three record kinds
//! - [`LineItem`] - a named-or-anonymous monetary amount
//! - [`Location`] - directory entry used for code/id translation

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

// =============================================================================
// Flat rows
// =============================================================================

/// Ordered mapping of column name to raw string value.
///
/// Columns are shared between all rows of one source. A row always holds
/// exactly one value per column; short input lines are padded with `""`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRow {
    line: u64,
    columns: Arc<[String]>,
    values: Vec<String>,
}

impl FlatRow {
    pub fn new(columns: Arc<[String]>, mut values: Vec<String>) -> Self {
        values.resize(columns.len(), String::new());
        Self {
            line: 0,
            columns,
            values,
        }
    }

    /// Build a row from `(column, value)` pairs, keeping their order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let (columns, values): (Vec<String>, Vec<String>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self::new(columns.into(), values)
    }

    /// Attach the source line number (header is line 1).
    pub fn with_line(mut self, line: u64) -> Self {
        self.line = line;
        self
    }

    /// Source line number, `0` for rows that were not parsed from a file.
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Value of `column`, or `None` when the column is not in the header.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i].as_str())
    }

    /// Value of `column`, `""` when absent.
    pub fn value(&self, column: &str) -> &str {
        self.get(column).unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    /// JSON object view, used by previews and the `parse` command.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        for (column, value) in self.iter() {
            obj.insert(column.to_string(), Value::String(value.to_string()));
        }
        Value::Object(obj)
    }
}

// =============================================================================
// Record kinds
// =============================================================================

/// The three supported column schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordKind {
    Employee,
    NicTax,
    Timesheet,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Employee => "employee",
            RecordKind::NicTax => "nic-tax",
            RecordKind::Timesheet => "timesheet",
        }
    }

    /// Path segment of the remote resource.
    pub fn resource(&self) -> &'static str {
        match self {
            RecordKind::Employee => "employees",
            RecordKind::NicTax => "nic-tax",
            RecordKind::Timesheet => "timesheets",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "employee" | "employees" => Ok(RecordKind::Employee),
            "nic-tax" | "nictax" | "nic_tax" => Ok(RecordKind::NicTax),
            "timesheet" | "timesheets" => Ok(RecordKind::Timesheet),
            other => Err(format!(
                "unknown record kind '{}' (expected employee, nic-tax or timesheet)",
                other
            )),
        }
    }
}

/// Whether a batch creates new records or updates existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    #[default]
    Create,
    Update,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Create => "create",
            WriteMode::Update => "update",
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(WriteMode::Create),
            "update" => Ok(WriteMode::Update),
            other => Err(format!("unknown write mode '{}' (expected create or update)", other)),
        }
    }
}

// =============================================================================
// Line items and locations
// =============================================================================

/// A monetary amount contributing to additions or deductions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub amount: Decimal,
}

impl LineItem {
    pub fn named(name: impl Into<String>, amount: Decimal) -> Self {
        Self {
            name: Some(name.into()),
            amount,
        }
    }

    pub fn anonymous(amount: Decimal) -> Self {
        Self { name: None, amount }
    }
}

/// Location entry returned by the directory service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub code: String,
    #[serde(default)]
    pub name: String,
}

// =============================================================================
// Employees
// =============================================================================

/// An employee with identity, contact details and pay structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRecord {
    /// Present for records that already exist remotely (bulk update).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub preferred_name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub mobile_no: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub payroll_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Internal location id.
    #[serde(default)]
    pub base_location_id: Option<String>,
    /// Internal location ids.
    #[serde(default)]
    pub location_access: Vec<String>,
    pub pay_structure: PayStructure,
}

/// Pay configuration; each gate is true exactly when its substructure is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "PayStructureWire", try_from = "PayStructureWire")]
pub struct PayStructure {
    pub name: Option<String>,
    pub daily_rates: Option<DailyRates>,
    pub hourly_rates: Option<HourlyRates>,
    pub other_considerations: Option<OtherConsiderations>,
}

impl PayStructure {
    pub fn has_daily_rates(&self) -> bool {
        self.daily_rates.is_some()
    }

    pub fn has_hourly_rates(&self) -> bool {
        self.hourly_rates.is_some()
    }

    pub fn has_other_considerations(&self) -> bool {
        self.other_considerations.is_some()
    }
}

/// API representation with explicit gate booleans.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayStructureWire {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    has_daily_rates: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    daily_rates: Option<DailyRates>,
    #[serde(default)]
    has_hourly_rates: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hourly_rates: Option<HourlyRates>,
    #[serde(default)]
    has_other_considerations: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    other_considerations: Option<OtherConsiderations>,
}

impl From<PayStructure> for PayStructureWire {
    fn from(p: PayStructure) -> Self {
        Self {
            name: p.name,
            has_daily_rates: p.daily_rates.is_some(),
            daily_rates: p.daily_rates,
            has_hourly_rates: p.hourly_rates.is_some(),
            hourly_rates: p.hourly_rates,
            has_other_considerations: p.other_considerations.is_some(),
            other_considerations: p.other_considerations,
        }
    }
}

impl TryFrom<PayStructureWire> for PayStructure {
    type Error = String;

    fn try_from(w: PayStructureWire) -> Result<Self, Self::Error> {
        fn gated<T>(gate: bool, value: Option<T>, name: &str) -> Result<Option<T>, String> {
            match (gate, value) {
                (true, None) => Err(format!("{} is enabled but missing", name)),
                (true, some) => Ok(some),
                (false, _) => Ok(None),
            }
        }

        Ok(Self {
            name: w.name,
            daily_rates: gated(w.has_daily_rates, w.daily_rates, "dailyRates")?,
            hourly_rates: gated(w.has_hourly_rates, w.hourly_rates, "hourlyRates")?,
            other_considerations: gated(
                w.has_other_considerations,
                w.other_considerations,
                "otherConsiderations",
            )?,
        })
    }
}

/// Day-based pay for the NI and cash portions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRates {
    pub ni: NiDayPlan,
    pub cash: CashDayPlan,
}

/// Rates used by the `ALL` and `FIXED` day modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRates {
    pub regular_days: Decimal,
    pub regular_day_rate: Decimal,
    pub extra_day_rate: Decimal,
    pub extra_shift_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "rates", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NiDayPlan {
    None,
    All(DayRates),
    Fixed(DayRates),
}

impl NiDayPlan {
    pub const MODES: [&'static str; 3] = ["NONE", "ALL", "FIXED"];

    pub fn mode(&self) -> &'static str {
        match self {
            NiDayPlan::None => "NONE",
            NiDayPlan::All(_) => "ALL",
            NiDayPlan::Fixed(_) => "FIXED",
        }
    }

    pub fn rates(&self) -> Option<&DayRates> {
        match self {
            NiDayPlan::None => None,
            NiDayPlan::All(r) | NiDayPlan::Fixed(r) => Some(r),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "rates", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashDayPlan {
    None,
    All(DayRates),
}

impl CashDayPlan {
    pub const MODES: [&'static str; 2] = ["NONE", "ALL"];

    pub fn mode(&self) -> &'static str {
        match self {
            CashDayPlan::None => "NONE",
            CashDayPlan::All(_) => "ALL",
        }
    }

    pub fn rates(&self) -> Option<&DayRates> {
        match self {
            CashDayPlan::None => None,
            CashDayPlan::All(r) => Some(r),
        }
    }
}

/// Hour-based pay for the NI and cash portions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyRates {
    pub ni: NiHoursPlan,
    pub cash: CashHoursPlan,
}

/// Hour band paid at a percentage, used by `CUSTOM` modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoursRange {
    pub min: Decimal,
    pub max: Decimal,
    pub percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "mode",
    content = "rates",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum NiHoursPlan {
    None,
    All {
        rate_per_hour: Decimal,
    },
    Fixed {
        fixed_hours: Decimal,
        rate_per_hour: Decimal,
    },
    Custom {
        range: HoursRange,
        rate_per_hour: Decimal,
    },
}

impl NiHoursPlan {
    pub const MODES: [&'static str; 4] = ["NONE", "ALL", "FIXED", "CUSTOM"];

    pub fn mode(&self) -> &'static str {
        match self {
            NiHoursPlan::None => "NONE",
            NiHoursPlan::All { .. } => "ALL",
            NiHoursPlan::Fixed { .. } => "FIXED",
            NiHoursPlan::Custom { .. } => "CUSTOM",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "mode",
    content = "rates",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum CashHoursPlan {
    None,
    All {
        rate_per_hour: Decimal,
    },
    /// Hours not covered by the NI plan.
    Rest {
        rate_per_hour: Decimal,
    },
    Custom {
        range: HoursRange,
        rate_per_hour: Decimal,
    },
}

impl CashHoursPlan {
    pub const MODES: [&'static str; 4] = ["NONE", "ALL", "REST", "CUSTOM"];

    pub fn mode(&self) -> &'static str {
        match self {
            CashHoursPlan::None => "NONE",
            CashHoursPlan::All { .. } => "ALL",
            CashHoursPlan::Rest { .. } => "REST",
            CashHoursPlan::Custom { .. } => "CUSTOM",
        }
    }
}

/// Free-form note plus the four line-item lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtherConsiderations {
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub ni_additions: Vec<LineItem>,
    #[serde(default)]
    pub ni_deductions: Vec<LineItem>,
    #[serde(default)]
    pub cash_additions: Vec<LineItem>,
    #[serde(default)]
    pub cash_deductions: Vec<LineItem>,
}

// =============================================================================
// NIC / Tax
// =============================================================================

/// Record-level fields shared by every entry of one NIC/Tax batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NicTaxPeriod {
    pub record_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub base_location_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NicTaxEntry {
    pub period: NicTaxPeriod,
    pub employee_id: String,
    pub ees_nic: Decimal,
    pub er_nic: Decimal,
    pub ees_tax: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
}

// =============================================================================
// Timesheets
// =============================================================================

/// Record-level fields shared by every entry of one timesheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimesheetPeriod {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub work_location_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimesheetEntry {
    pub period: TimesheetPeriod,
    pub payroll_id: String,
    #[serde(default)]
    pub employee_name: Option<String>,
    #[serde(default)]
    pub base_location_id: Option<String>,
    #[serde(default)]
    pub hours_worked: Option<Decimal>,
    #[serde(default)]
    pub days_worked: Option<Decimal>,
    #[serde(default)]
    pub extra_shift: Option<Decimal>,
    #[serde(default)]
    pub additions: Vec<LineItem>,
    #[serde(default)]
    pub deductions: Vec<LineItem>,
    #[serde(default)]
    pub notes: Option<String>,
}

// =============================================================================
// Domain record
// =============================================================================

/// Any record the engine imports, exports or submits.
///
/// Serialized untagged: a chunk is homogeneous and the endpoint already
/// names the kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DomainRecord {
    Employee(EmployeeRecord),
    NicTax(NicTaxEntry),
    Timesheet(TimesheetEntry),
}

impl DomainRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            DomainRecord::Employee(_) => RecordKind::Employee,
            DomainRecord::NicTax(_) => RecordKind::NicTax,
            DomainRecord::Timesheet(_) => RecordKind::Timesheet,
        }
    }

    /// Identity used for bulk update and in log messages.
    pub fn identity(&self) -> Option<&str> {
        match self {
            DomainRecord::Employee(e) => e.employee_id.as_deref().or(e.email.as_deref()),
            DomainRecord::NicTax(n) => Some(&n.employee_id),
            DomainRecord::Timesheet(t) => Some(&t.payroll_id),
        }
    }

    /// Decode one record of a known kind from its wire JSON.
    pub fn from_json(kind: RecordKind, value: Value) -> serde_json::Result<Self> {
        Ok(match kind {
            RecordKind::Employee => DomainRecord::Employee(serde_json::from_value(value)?),
            RecordKind::NicTax => DomainRecord::NicTax(serde_json::from_value(value)?),
            RecordKind::Timesheet => DomainRecord::Timesheet(serde_json::from_value(value)?),
        })
    }
}

impl From<EmployeeRecord> for DomainRecord {
    fn from(r: EmployeeRecord) -> Self {
        DomainRecord::Employee(r)
    }
}

impl From<NicTaxEntry> for DomainRecord {
    fn from(r: NicTaxEntry) -> Self {
        DomainRecord::NicTax(r)
    }
}

impl From<TimesheetEntry> for DomainRecord {
    fn from(r: TimesheetEntry) -> Self {
        DomainRecord::Timesheet(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn day_rates() -> DayRates {
        DayRates {
            regular_days: dec!(5),
            regular_day_rate: dec!(120),
            extra_day_rate: dec!(80),
            extra_shift_rate: dec!(40),
        }
    }

    #[test]
    fn test_flat_row_pads_short_rows() {
        let columns: Arc<[String]> = vec!["a".to_string(), "b".to_string(), "c".to_string()].into();
        let row = FlatRow::new(columns, vec!["1".to_string()]);

        assert_eq!(row.get("a"), Some("1"));
        assert_eq!(row.get("c"), Some(""));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.value("missing"), "");
    }

    #[test]
    fn test_flat_row_keeps_column_order() {
        let row = FlatRow::from_pairs([("z", "1"), ("a", "2")]);
        let columns: Vec<&str> = row.iter().map(|(c, _)| c).collect();
        assert_eq!(columns, vec!["z", "a"]);
        assert_eq!(row.to_json(), json!({"z": "1", "a": "2"}));
    }

    #[test]
    fn test_record_kind_parse() {
        assert_eq!("employee".parse::<RecordKind>(), Ok(RecordKind::Employee));
        assert_eq!("NIC-TAX".parse::<RecordKind>(), Ok(RecordKind::NicTax));
        assert_eq!("timesheets".parse::<RecordKind>(), Ok(RecordKind::Timesheet));
        assert!("payslip".parse::<RecordKind>().is_err());
    }

    #[test]
    fn test_pay_structure_wire_gates() {
        let pay = PayStructure {
            name: Some("Standard".into()),
            daily_rates: Some(DailyRates {
                ni: NiDayPlan::All(day_rates()),
                cash: CashDayPlan::None,
            }),
            hourly_rates: None,
            other_considerations: None,
        };

        let value = serde_json::to_value(&pay).unwrap();
        assert_eq!(value["hasDailyRates"], true);
        assert_eq!(value["hasHourlyRates"], false);
        assert_eq!(value["dailyRates"]["ni"]["mode"], "ALL");
        assert_eq!(value["dailyRates"]["ni"]["rates"]["regularDays"], 5.0);
        assert_eq!(value["dailyRates"]["cash"]["mode"], "NONE");
        assert!(value.get("hourlyRates").is_none());

        let back: PayStructure = serde_json::from_value(value).unwrap();
        assert_eq!(back, pay);
    }

    #[test]
    fn test_pay_structure_gate_without_substructure_rejected() {
        let value = json!({ "name": null, "hasHourlyRates": true });
        assert!(serde_json::from_value::<PayStructure>(value).is_err());
    }

    #[test]
    fn test_hours_plan_wire_format() {
        let plan = NiHoursPlan::Fixed {
            fixed_hours: dec!(16),
            rate_per_hour: dec!(11.44),
        };
        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["mode"], "FIXED");
        assert_eq!(value["rates"]["fixedHours"], 16.0);
        assert_eq!(value["rates"]["ratePerHour"], 11.44);
    }

    #[test]
    fn test_domain_record_untagged() {
        let record = DomainRecord::NicTax(NicTaxEntry {
            period: NicTaxPeriod {
                record_name: "April".into(),
                start_date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2024, 4, 30).unwrap(),
                base_location_id: "loc-1".into(),
            },
            employee_id: "emp-9".into(),
            ees_nic: dec!(10),
            er_nic: dec!(12),
            ees_tax: dec!(30),
            notes: None,
        });

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["employeeId"], "emp-9");
        assert_eq!(value["period"]["startDate"], "2024-04-01");
        assert_eq!(record.kind(), RecordKind::NicTax);
        assert_eq!(record.identity(), Some("emp-9"));
    }
}
