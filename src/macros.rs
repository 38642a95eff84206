//! Macro resolution. Only the twelve predefined month macros are expanded.
use std::collections::HashMap;

use lazy_static::lazy_static;
use unicase::UniCase;

/// The predefined month macros, in calendar order.
pub const MONTH_MACROS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Case-insensitive map from macro names to their expansions.
#[derive(Debug, Clone, Default)]
pub struct MacroDictionary {
    map: HashMap<UniCase<String>, String>,
}

impl MacroDictionary {
    /// Set "month macros", such as `@string{apr = {4}}`.
    pub fn set_month_macros(&mut self) {
        for (idx, name) in MONTH_MACROS.iter().enumerate() {
            self.insert(name, (idx + 1).to_string());
        }
    }

    pub fn with_month_macros() -> Self {
        let mut dict = Self::default();
        dict.set_month_macros();
        dict
    }

    pub fn insert<S: Into<String>>(&mut self, variable: &str, expansion: S) {
        self.map
            .insert(UniCase::new(variable.to_string()), expansion.into());
    }

    pub fn get(&self, variable: &str) -> Option<&str> {
        self.map
            .get(&UniCase::new(variable.to_string()))
            .map(String::as_str)
    }

    /// Resolve `variable`, passing unknown macros through unchanged.
    pub fn resolve<'a>(&'a self, variable: &'a str) -> &'a str {
        self.get(variable).unwrap_or(variable)
    }
}

lazy_static! {
    static ref MONTHS: MacroDictionary = MacroDictionary::with_month_macros();
}

/// The process-wide month macro table.
pub fn months() -> &'static MacroDictionary {
    &MONTHS
}

/// Whether `s` is one of the month macros, ignoring case.
pub fn is_month_macro(s: &str) -> bool {
    MONTHS.get(s).is_some()
}

/// Calendar index (1 to 12) of a month value.
///
/// Accepts macros (`feb`), full or abbreviated names (`February`, `Feb.`) and numbers
/// (`2`, `02`).
pub fn month_number(value: &str) -> Option<u32> {
    let value = value.trim().trim_end_matches('.').to_lowercase();
    if let Ok(n) = value.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    if value.len() < 3 {
        return None;
    }
    MONTH_NAMES
        .iter()
        .position(|name| name.starts_with(&value))
        .map(|idx| idx as u32 + 1)
}
