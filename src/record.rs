use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use chrono::{Local, NaiveDate};

use crate::domain::GVError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Number,
    Date,
    Rank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: ColumnKind,
    pub width: u16,
}

impl ColumnDef {
    pub const fn new(name: &'static str, label: &'static str, kind: ColumnKind, width: u16) -> Self {
        ColumnDef {
            name,
            label,
            kind,
            width,
        }
    }
}

/// A typed field value. Comparison and matching dispatch on the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    // Derived ordinal into its label scale, e.g. past < current < future
    Rank(u8, &'static [&'static str]),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Total order used by the sort stage. Mixed variants fall back to
    /// a case-insensitive comparison of the rendered values.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Rank(a, _), Value::Rank(b, _)) => a.cmp(b),
            (a, b) => a
                .to_string()
                .to_lowercase()
                .cmp(&b.to_string().to_lowercase()),
        }
    }

    /// Parse a user supplied operand into the same variant as `self`, so
    /// that range checks compare dates as dates, numbers as numbers and
    /// ranks by their position in the scale.
    pub fn parse_like(&self, input: &str) -> Option<Value> {
        let input = input.trim();
        match self {
            Value::Text(_) => Some(Value::Text(input.to_string())),
            Value::Number(_) => parse_number(input).map(Value::Number),
            Value::Date(_) => NaiveDate::parse_from_str(input, DATE_FORMAT)
                .ok()
                .map(Value::Date),
            Value::Rank(_, scale) => scale
                .iter()
                .position(|label| label.eq_ignore_ascii_case(input))
                .and_then(|idx| u8::try_from(idx).ok())
                .map(|idx| Value::Rank(idx, *scale)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{s}"),
            Value::Number(n) if n.fract() == 0.0 => write!(f, "{n:.0}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Rank(idx, scale) => {
                write!(f, "{}", scale.get(*idx as usize).copied().unwrap_or_default())
            }
        }
    }
}

/// Values that depend on the evaluation moment, such as the derived
/// financial year timeline, are computed relative to `today`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalContext {
    pub today: NaiveDate,
}

impl EvalContext {
    pub fn new(today: NaiveDate) -> Self {
        EvalContext { today }
    }

    pub fn now() -> Self {
        EvalContext {
            today: Local::now().date_naive(),
        }
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        EvalContext::now()
    }
}

/// One row of a loaded data file, keyed by column name.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    cells: HashMap<String, String>,
}

impl RawRow {
    pub fn new() -> Self {
        RawRow::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.cells.insert(column.into(), value.into());
    }

    /// Empty cells count as missing.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .get(column)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn required(&self, column: &str) -> Result<&str, GVError> {
        self.get(column)
            .ok_or_else(|| GVError::Validation(format!("missing required field \"{column}\"")))
    }

    pub fn date(&self, column: &str) -> Result<NaiveDate, GVError> {
        parse_date(self.required(column)?)
    }

    pub fn optional_date(&self, column: &str) -> Result<Option<NaiveDate>, GVError> {
        self.get(column).map(parse_date).transpose()
    }

    pub fn number(&self, column: &str) -> Result<f64, GVError> {
        let raw = self.required(column)?;
        parse_number(raw)
            .ok_or_else(|| GVError::Validation(format!("field \"{column}\": \"{raw}\" is not a number")))
    }
}

/// Finite numbers only, thousands separators allowed.
fn parse_number(raw: &str) -> Option<f64> {
    raw.trim()
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut row = RawRow::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, GVError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| GVError::Validation(format!("\"{raw}\" is not a date (expected YYYY-MM-DD)")))
}

/// A record type shown in a grid. Each record set of the admin pages is its
/// own struct; the pipeline only sees columns and typed values.
pub trait Record: Clone + fmt::Debug + Send + Sync {
    /// Name of the record set, also the stem of its data file.
    const DATASET: &'static str;
    const TITLE: &'static str;

    fn columns() -> &'static [ColumnDef];

    fn id(&self) -> u64;

    fn set_id(&mut self, id: u64);

    /// Value of `column` (canonical name), `None` when the record has no value for it.
    fn value(&self, column: &str, ctx: &EvalContext) -> Option<Value>;

    fn from_row(row: &RawRow) -> Result<Self, GVError>;

    /// Build new records from a `new ...` command line.
    fn from_command(_args: &str, _ctx: &EvalContext) -> Result<Vec<Self>, GVError> {
        Err(GVError::Validation(format!(
            "{} does not support creating records",
            Self::TITLE
        )))
    }

    /// Copy of the record with `column` replaced by `raw`, validated like a
    /// loaded row. Derived columns are read only.
    fn with_value(&self, column: &str, raw: &str, ctx: &EvalContext) -> Result<Self, GVError> {
        let target = Self::column(column).ok_or_else(|| GVError::UnknownColumn(column.to_string()))?;
        if target.kind == ColumnKind::Rank {
            return Err(GVError::Validation(format!(
                "{} is derived and cannot be edited",
                target.label
            )));
        }
        let mut row: RawRow = Self::columns()
            .iter()
            .filter(|c| c.kind != ColumnKind::Rank)
            .filter_map(|c| self.value(c.name, ctx).map(|v| (c.name, v.to_string())))
            .collect();
        row.insert(target.name, raw.trim());
        let mut edited = Self::from_row(&row)?;
        edited.set_id(self.id());
        Ok(edited)
    }

    /// Case-insensitive column lookup, so `Industry` resolves to `industry`.
    fn column(name: &str) -> Option<&'static ColumnDef> {
        Self::columns()
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_compares_case_insensitively() {
        assert_eq!(Value::text("apple").compare(&Value::text("Banana")), Ordering::Less);
        assert_eq!(Value::text("ABC").compare(&Value::text("abc")), Ordering::Equal);
    }

    #[test]
    fn numbers_and_dates_compare_by_magnitude() {
        assert_eq!(Value::Number(9.0).compare(&Value::Number(10.0)), Ordering::Less);
        let a = Value::Date(NaiveDate::from_ymd_opt(2020, 12, 31).unwrap());
        let b = Value::Date(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert_eq!(a.compare(&b), Ordering::Less);
    }

    #[test]
    fn whole_numbers_render_without_fraction() {
        assert_eq!(Value::Number(85000.0).to_string(), "85000");
        assert_eq!(Value::Number(1.5).to_string(), "1.5");
    }

    #[test]
    fn parse_like_follows_the_variant() {
        let date = Value::Date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(
            date.parse_like("2021-03-04"),
            Some(Value::Date(NaiveDate::from_ymd_opt(2021, 3, 4).unwrap()))
        );
        assert_eq!(date.parse_like("yesterday"), None);
        assert_eq!(Value::Number(0.0).parse_like("50,000"), Some(Value::Number(50000.0)));
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        for raw in ["NaN", "inf", "-inf", "infinity"] {
            let row: RawRow = [("salary", raw)].into_iter().collect();
            assert!(matches!(row.number("salary"), Err(GVError::Validation(_))), "{raw}");
            assert_eq!(Value::Number(1.0).parse_like(raw), None);
        }
        assert_eq!(Value::Number(f64::NAN).compare(&Value::Number(1.0)), Ordering::Greater);
    }

    #[test]
    fn ranks_parse_by_label() {
        const SCALE: [&str; 3] = ["Low", "Mid", "High"];
        let mid = Value::Rank(1, &SCALE);
        assert_eq!(mid.to_string(), "Mid");
        assert_eq!(mid.parse_like("high"), Some(Value::Rank(2, &SCALE)));
        assert_eq!(mid.parse_like("Extreme"), None);
        assert_eq!(mid.compare(&Value::Rank(0, &SCALE)), Ordering::Greater);
    }

    #[test]
    fn raw_row_treats_blank_cells_as_missing() {
        let row: RawRow = [("name", "  "), ("salary", "1,200")].into_iter().collect();
        assert_eq!(row.get("name"), None);
        assert!(matches!(row.required("name"), Err(GVError::Validation(_))));
        assert_eq!(row.number("salary").unwrap(), 1200.0);
    }
}
