//! Field readers shared by the per-kind mappers.
//!
//! A [`RowCheck`] reads typed values out of one [`FlatRow`], recording every
//! failure against the row instead of stopping at the first one.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

use super::RowWarning;
use crate::codec;
use crate::error::{RowErrorKind, RowValidationError};
use crate::models::{FlatRow, LineItem};
use crate::translate::LocationCodeMap;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) struct RowCheck<'a> {
    row: &'a FlatRow,
    row_no: usize,
    errors: Vec<RowValidationError>,
    warnings: Vec<RowWarning>,
}

impl<'a> RowCheck<'a> {
    pub fn new(row: &'a FlatRow, row_no: usize) -> Self {
        Self {
            row,
            row_no,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn row_no(&self) -> usize {
        self.row_no
    }

    pub fn raw(&self, column: &str) -> &'a str {
        self.row.value(column)
    }

    pub fn error(&self, column: &str, kind: RowErrorKind) -> RowValidationError {
        RowValidationError::new(self.row_no, column, kind)
    }

    pub fn push(&mut self, column: &str, kind: RowErrorKind) {
        let err = self.error(column, kind);
        self.errors.push(err);
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = RowValidationError>) {
        self.errors.extend(errors);
    }

    pub fn warn(&mut self, column: &str, message: impl Into<String>) {
        self.warnings.push(RowWarning {
            row: self.row_no,
            column: column.to_string(),
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Columns of `group` holding a non-empty value.
    pub fn populated(&self, group: &[&'static str]) -> Vec<&'static str> {
        group
            .iter()
            .copied()
            .filter(|c| !self.raw(c).is_empty())
            .collect()
    }

    /// Warn that values in `group` are ignored because of `reason`.
    pub fn warn_ignored(&mut self, column: &str, group: &[&'static str], reason: &str) {
        let populated = self.populated(group);
        if !populated.is_empty() {
            self.warn(
                column,
                format!("{}; ignored values in {}", reason, populated.join(", ")),
            );
        }
    }

    pub fn optional_text(&self, column: &str) -> Option<String> {
        let raw = self.raw(column);
        (!raw.is_empty()).then(|| raw.to_string())
    }

    pub fn required_text(&mut self, column: &str) -> Option<String> {
        let value = self.optional_text(column);
        if value.is_none() {
            self.push(column, RowErrorKind::Missing);
        }
        value
    }

    /// A gate column; absent from the header means `false`.
    ///
    /// Does not record the error so the caller can report it in order.
    pub fn gate(&self, column: &str) -> Result<bool, RowValidationError> {
        let raw = match self.row.get(column) {
            None => return Ok(false),
            Some(raw) => raw,
        };
        if raw.eq_ignore_ascii_case("TRUE") {
            Ok(true)
        } else if raw.eq_ignore_ascii_case("FALSE") {
            Ok(false)
        } else {
            Err(self.error(
                column,
                RowErrorKind::BadBoolean {
                    value: raw.to_string(),
                },
            ))
        }
    }

    /// A required enum column, matched case-sensitively.
    ///
    /// A column missing from the header selects `NONE` when that is allowed.
    pub fn mode(&mut self, column: &str, allowed: &[&'static str]) -> Option<&'static str> {
        let row: &'a FlatRow = self.row;
        let raw = match row.get(column) {
            None if allowed.contains(&"NONE") => return Some("NONE"),
            raw => raw.unwrap_or(""),
        };
        if raw.is_empty() {
            self.push(column, RowErrorKind::Missing);
            return None;
        }
        match allowed.iter().find(|m| **m == raw) {
            Some(m) => Some(*m),
            None => {
                self.push(
                    column,
                    RowErrorKind::BadEnum {
                        value: raw.to_string(),
                        expected: allowed.to_vec(),
                    },
                );
                None
            }
        }
    }

    fn parse_decimal(&self, column: &str, raw: &str) -> Result<Decimal, RowValidationError> {
        let bad = || {
            self.error(
                column,
                RowErrorKind::BadNumber {
                    value: raw.to_string(),
                },
            )
        };
        let value = Decimal::from_str(raw).map_err(|_| bad())?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(bad());
        }
        Ok(value)
    }

    /// A required non-negative number.
    pub fn decimal(&mut self, column: &str) -> Option<Decimal> {
        let raw = self.raw(column);
        if raw.is_empty() {
            self.push(column, RowErrorKind::Missing);
            return None;
        }
        match self.parse_decimal(column, raw) {
            Ok(v) => Some(v),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    /// An optional non-negative number. `Err(())` means an error was recorded.
    pub fn optional_decimal(&mut self, column: &str) -> Result<Option<Decimal>, ()> {
        let raw = self.raw(column);
        if raw.is_empty() {
            return Ok(None);
        }
        self.parse_decimal(column, raw).map(Some).map_err(|e| {
            self.errors.push(e);
        })
    }

    fn parse_date(&self, column: &str, raw: &str) -> Result<NaiveDate, RowValidationError> {
        NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| {
            self.error(
                column,
                RowErrorKind::BadDate {
                    value: raw.to_string(),
                },
            )
        })
    }

    pub fn date(&mut self, column: &str) -> Option<NaiveDate> {
        let raw = self.raw(column);
        if raw.is_empty() {
            self.push(column, RowErrorKind::Missing);
            return None;
        }
        match self.parse_date(column, raw) {
            Ok(d) => Some(d),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    pub fn optional_date(&mut self, column: &str) -> Result<Option<NaiveDate>, ()> {
        let raw = self.raw(column);
        if raw.is_empty() {
            return Ok(None);
        }
        self.parse_date(column, raw).map(Some).map_err(|e| {
            self.errors.push(e);
        })
    }

    /// An end date before its start date is an error on `end_column`.
    pub fn date_order(&mut self, end_column: &str, start: NaiveDate, end: NaiveDate) {
        if end < start {
            self.push(
                end_column,
                RowErrorKind::Inconsistent {
                    message: format!("end date {} is before start date {}", end, start),
                },
            );
        }
    }

    pub fn line_items(&mut self, column: &str) -> Option<Vec<LineItem>> {
        match codec::decode(self.raw(column)) {
            Ok(items) => Some(items),
            Err(e) => {
                self.push(
                    column,
                    RowErrorKind::BadLineItems {
                        message: e.to_string(),
                    },
                );
                None
            }
        }
    }

    /// A required location code, translated to its id.
    pub fn location(&mut self, column: &str, locations: &LocationCodeMap) -> Option<String> {
        let code = self.required_text(column)?;
        self.translate(column, &code, locations)
    }

    pub fn optional_location(
        &mut self,
        column: &str,
        locations: &LocationCodeMap,
    ) -> Result<Option<String>, ()> {
        match self.optional_text(column) {
            None => Ok(None),
            Some(code) => self.translate(column, &code, locations).map(Some).ok_or(()),
        }
    }

    fn translate(&mut self, column: &str, code: &str, locations: &LocationCodeMap) -> Option<String> {
        match locations.resolve_code(code) {
            Ok(id) => Some(id.to_string()),
            Err(_) => {
                self.push(
                    column,
                    RowErrorKind::UnknownLocation {
                        code: code.to_string(),
                    },
                );
                None
            }
        }
    }

    /// A `;`-joined list of location codes; each unknown code is an error.
    pub fn location_list(&mut self, column: &str, locations: &LocationCodeMap) -> Option<Vec<String>> {
        let mut ids = Vec::new();
        let mut ok = true;
        for code in crate::translate::split_list(self.raw(column)) {
            match self.translate(column, code, locations) {
                Some(id) => ids.push(id),
                None => ok = false,
            }
        }
        ok.then_some(ids)
    }

    /// Finish the row: the value when no error was recorded, else the errors.
    pub fn finish<T>(
        self,
        value: Option<T>,
    ) -> (Result<T, Vec<RowValidationError>>, Vec<RowWarning>) {
        let result = match value {
            Some(v) if self.errors.is_empty() => Ok(v),
            _ if !self.errors.is_empty() => Err(self.errors),
            _ => Err(vec![RowValidationError::new(
                self.row_no,
                "",
                RowErrorKind::Invalid {
                    message: "row could not be mapped".to_string(),
                },
            )]),
        };
        (result, self.warnings)
    }
}

/// Collects export values by column, then lays them out in schema order.
#[derive(Debug, Default)]
pub(crate) struct RowBuilder {
    values: HashMap<&'static str, String>,
}

impl RowBuilder {
    pub fn set(&mut self, column: &'static str, value: impl Into<String>) {
        self.values.insert(column, value.into());
    }

    pub fn set_opt(&mut self, column: &'static str, value: Option<&str>) {
        if let Some(v) = value {
            self.set(column, v);
        }
    }

    pub fn set_decimal(&mut self, column: &'static str, value: Option<Decimal>) {
        if let Some(v) = value {
            self.set(column, v.to_string());
        }
    }

    pub fn set_date(&mut self, column: &'static str, value: Option<NaiveDate>) {
        if let Some(d) = value {
            self.set(column, d.format(DATE_FORMAT).to_string());
        }
    }

    pub fn set_gate(&mut self, column: &'static str, value: bool) {
        self.set(column, if value { "TRUE" } else { "FALSE" });
    }

    /// Columns never set are emitted as `""`.
    pub fn finish(mut self, columns: &[&'static str]) -> FlatRow {
        FlatRow::from_pairs(
            columns
                .iter()
                .map(|c| (*c, self.values.remove(c).unwrap_or_default())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(pairs: &[(&str, &str)]) -> FlatRow {
        FlatRow::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_gate_literals() {
        let r = row(&[("g1", "TRUE"), ("g2", "false"), ("g3", "yes"), ("g4", "")]);
        let check = RowCheck::new(&r, 2);

        assert_eq!(check.gate("g1"), Ok(true));
        assert_eq!(check.gate("g2"), Ok(false));
        assert!(check.gate("g3").is_err());
        assert!(check.gate("g4").is_err());
        assert_eq!(check.gate("absent"), Ok(false));
    }

    #[test]
    fn test_mode_is_case_sensitive() {
        let r = row(&[("m", "all")]);
        let mut check = RowCheck::new(&r, 3);

        assert_eq!(check.mode("m", &["NONE", "ALL"]), None);
        assert_eq!(check.mode("absent", &["NONE", "ALL"]), Some("NONE"));
        let (result, _) = check.finish(None::<()>);
        let errors = result.unwrap_err();
        assert_eq!(errors[0].row, 3);
        assert_eq!(errors[0].column, "m");
        assert!(matches!(errors[0].kind, RowErrorKind::BadEnum { .. }));
    }

    #[test]
    fn test_decimal_rules() {
        let r = row(&[("a", "12.5"), ("b", "abc"), ("c", "-1"), ("d", "")]);
        let mut check = RowCheck::new(&r, 2);

        assert_eq!(check.decimal("a"), Some(dec!(12.5)));
        assert_eq!(check.decimal("b"), None);
        assert_eq!(check.decimal("c"), None);
        assert_eq!(check.optional_decimal("d"), Ok(None));
        assert_eq!(check.decimal("d"), None);

        let (result, _) = check.finish(Some(()));
        let kinds: Vec<_> = result.unwrap_err().into_iter().map(|e| e.kind).collect();
        assert!(matches!(kinds[0], RowErrorKind::BadNumber { .. }));
        assert!(matches!(kinds[1], RowErrorKind::BadNumber { .. }));
        assert_eq!(kinds[2], RowErrorKind::Missing);
    }

    #[test]
    fn test_location_list_translation() {
        let r = row(&[("access", "LDN;XXX")]);
        let locations = LocationCodeMap::from_pairs([("loc-1", "LDN")]).unwrap();
        let mut check = RowCheck::new(&r, 2);

        assert_eq!(check.location_list("access", &locations), None);
        let (result, _) = check.finish(None::<()>);
        let errors = result.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].kind,
            RowErrorKind::UnknownLocation { code: "XXX".into() }
        );
    }

    #[test]
    fn test_warn_ignored_lists_populated_columns() {
        let r = row(&[("a", "1"), ("b", ""), ("c", "x")]);
        let mut check = RowCheck::new(&r, 2);
        check.warn_ignored("gate", &["a", "b", "c"], "gate is FALSE");

        let (result, warnings) = check.finish(Some(1));
        assert_eq!(result, Ok(1));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("a, c"));
    }

    #[test]
    fn test_row_builder_fills_unset_columns() {
        let mut builder = RowBuilder::default();
        builder.set("b", "x");
        builder.set_gate("c", true);
        builder.set_decimal("d", Some(dec!(1.50)));
        builder.set_opt("e", None);

        let row = builder.finish(&["a", "b", "c", "d", "e"]);
        assert_eq!(row.values(), &["", "x", "TRUE", "1.50", ""]);
    }
}
