//! Location code ↔ id translation.
//!
//! CSV files carry human-readable location codes; the remote API uses
//! internal ids. A [`LocationCodeMap`] is a snapshot of the directory,
//! built once per import/export and rebuilt (never patched) when stale.
//! Lookups are exact and case-sensitive.

use std::collections::HashMap;

use crate::error::TranslateError;
use crate::models::Location;

/// Separator for multi-value location fields such as `locationAccess`.
pub const LIST_SEPARATOR: char = ';';

/// Bijective id ↔ code snapshot of the location directory.
#[derive(Debug, Clone, Default)]
pub struct LocationCodeMap {
    id_by_code: HashMap<String, String>,
    code_by_id: HashMap<String, String>,
}

impl LocationCodeMap {
    /// Build from directory entries. Duplicate codes or ids are an error.
    pub fn from_locations<I>(locations: I) -> Result<Self, TranslateError>
    where
        I: IntoIterator<Item = Location>,
    {
        Self::from_pairs(locations.into_iter().map(|l| (l.id, l.code)))
    }

    /// Build from `(id, code)` pairs.
    pub fn from_pairs<I, A, B>(pairs: I) -> Result<Self, TranslateError>
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        let mut map = Self::default();

        for (id, code) in pairs {
            let (id, code) = (id.into(), code.into());

            if let Some(first) = map.id_by_code.get(&code) {
                return Err(TranslateError::DuplicateCode {
                    code,
                    first: first.clone(),
                    second: id,
                });
            }
            if map.code_by_id.contains_key(&id) {
                return Err(TranslateError::DuplicateId(id));
            }

            map.id_by_code.insert(code.clone(), id.clone());
            map.code_by_id.insert(id, code);
        }

        Ok(map)
    }

    pub fn len(&self) -> usize {
        self.code_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code_by_id.is_empty()
    }

    pub fn resolve_code(&self, code: &str) -> Result<&str, TranslateError> {
        self.id_by_code
            .get(code)
            .map(String::as_str)
            .ok_or_else(|| TranslateError::UnknownLocationCode(code.to_string()))
    }

    pub fn resolve_id(&self, id: &str) -> Result<&str, TranslateError> {
        self.code_by_id
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| TranslateError::UnknownLocationId(id.to_string()))
    }

    /// Resolve a `;`-joined list of codes to ids.
    ///
    /// Every element is resolved; all unknown codes are reported.
    pub fn resolve_code_list(&self, raw: &str) -> Result<Vec<String>, Vec<TranslateError>> {
        let mut ids = Vec::new();
        let mut errors = Vec::new();

        for code in split_list(raw) {
            match self.resolve_code(code) {
                Ok(id) => ids.push(id.to_string()),
                Err(e) => errors.push(e),
            }
        }

        if errors.is_empty() {
            Ok(ids)
        } else {
            Err(errors)
        }
    }

    /// Code for `id`, or the raw id when the directory does not know it.
    ///
    /// Export uses this soft lookup so one stale reference does not fail the
    /// whole file. The second value is `false` when the fallback was used.
    pub fn code_or_raw(&self, id: &str) -> (String, bool) {
        match self.resolve_id(id) {
            Ok(code) => (code.to_string(), true),
            Err(_) => (id.to_string(), false),
        }
    }
}

/// Split a multi-value field, trimming elements and skipping empty ones.
pub fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub fn join_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(&LIST_SEPARATOR.to_string())
}
