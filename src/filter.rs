use std::cmp::Ordering;
use std::fmt;

use derive_setters::Setters;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::domain::GVError;
use crate::record::{EvalContext, Record, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    #[default]
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterThanOrEquals,
    LessThanOrEquals,
    Contains,
    DoesNotContain,
    StartsWith,
    EndsWith,
    Like,
    Between,
    In,
    IsNull,
    IsNotNull,
}

impl FilterOperator {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::NotEqual => "notEqual",
            Self::GreaterThan => "greaterThan",
            Self::LessThan => "lessThan",
            Self::GreaterThanOrEquals => "greaterThanOrEquals",
            Self::LessThanOrEquals => "lessThanOrEquals",
            Self::Contains => "contains",
            Self::DoesNotContain => "doesNotContain",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::Like => "like",
            Self::Between => "between",
            Self::In => "in",
            Self::IsNull => "isNull",
            Self::IsNotNull => "isNotNull",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "equal" | "equals" | "eq" | "=" | "==" => Some(Self::Equal),
            "notequal" | "notequals" | "ne" | "!=" | "<>" => Some(Self::NotEqual),
            "greaterthan" | "gt" | ">" => Some(Self::GreaterThan),
            "lessthan" | "lt" | "<" => Some(Self::LessThan),
            "greaterthanorequals" | "greaterthanorequal" | "ge" | ">=" => Some(Self::GreaterThanOrEquals),
            "lessthanorequals" | "lessthanorequal" | "le" | "<=" => Some(Self::LessThanOrEquals),
            "contains" => Some(Self::Contains),
            "doesnotcontain" => Some(Self::DoesNotContain),
            "startswith" => Some(Self::StartsWith),
            "endswith" => Some(Self::EndsWith),
            "like" => Some(Self::Like),
            "between" => Some(Self::Between),
            "in" => Some(Self::In),
            "isnull" => Some(Self::IsNull),
            "isnotnull" => Some(Self::IsNotNull),
            _ => None,
        }
    }

    pub fn requires_two_values(&self) -> bool {
        matches!(self, Self::Between)
    }

    /// `isNull` and `isNotNull` look at the cell only.
    pub fn takes_value(&self) -> bool {
        !matches!(self, Self::IsNull | Self::IsNotNull)
    }

    /// Whether a record without a value for the column passes.
    pub fn matches_missing(&self) -> bool {
        matches!(self, Self::IsNull)
    }

    /// Whether `cell` satisfies the operator. String operators ignore case,
    /// ordering operators compare the operand parsed into the cell's type.
    pub fn evaluate(&self, cell: &Value, value: &str, value2: Option<&str>) -> bool {
        let cell_lower = cell.to_string().to_lowercase();
        let value_lower = value.trim().to_lowercase();
        let ordering = || cell.parse_like(value).map(|operand| cell.compare(&operand));
        match self {
            Self::Equal => cell_lower == value_lower,
            Self::NotEqual => cell_lower != value_lower,
            Self::GreaterThan => ordering().is_some_and(Ordering::is_gt),
            Self::LessThan => ordering().is_some_and(Ordering::is_lt),
            Self::GreaterThanOrEquals => ordering().is_some_and(Ordering::is_ge),
            Self::LessThanOrEquals => ordering().is_some_and(Ordering::is_le),
            Self::Contains | Self::Like => cell_lower.contains(&value_lower),
            Self::DoesNotContain => !cell_lower.contains(&value_lower),
            Self::StartsWith => cell_lower.starts_with(&value_lower),
            Self::EndsWith => cell_lower.ends_with(&value_lower),
            Self::In => value
                .split(',')
                .any(|item| item.trim().to_lowercase() == cell_lower),
            Self::Between => {
                let (Some(low), Some(high)) = (
                    cell.parse_like(value),
                    value2.and_then(|v| cell.parse_like(v)),
                ) else {
                    return false;
                };
                cell.compare(&low).is_ge() && cell.compare(&high).is_le()
            }
            Self::IsNull => cell_lower.trim().is_empty(),
            Self::IsNotNull => !cell_lower.trim().is_empty(),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// How a criterion combines with the running result of the ones before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    #[default]
    And,
    Or,
}

impl Condition {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "and" | "&&" => Some(Self::And),
            "or" | "||" => Some(Self::Or),
            _ => None,
        }
    }

    pub fn combine(&self, running: bool, matched: bool) -> bool {
        match self {
            Condition::And => running && matched,
            Condition::Or => running || matched,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::And => write!(f, "and"),
            Condition::Or => write!(f, "or"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Setters, Serialize, Deserialize)]
#[setters(into)]
pub struct FilterCriterion {
    pub column: String,
    pub operator: FilterOperator,
    pub value: String,
    #[setters(strip_option)]
    pub value2: Option<String>,
    pub condition: Condition,
}

impl FilterCriterion {
    pub fn new(column: impl Into<String>, operator: FilterOperator, value: impl Into<String>) -> Self {
        FilterCriterion {
            column: column.into(),
            operator,
            value: value.into(),
            value2: None,
            condition: Condition::And,
        }
    }

    pub fn matches<R: Record>(&self, record: &R, ctx: &EvalContext) -> bool {
        match record.value(&self.column, ctx) {
            Some(cell) => self
                .operator
                .evaluate(&cell, &self.value, self.value2.as_deref()),
            None => self.operator.matches_missing(),
        }
    }

    /// Same column, operator and (case-insensitive) value.
    pub fn is_duplicate_of(&self, other: &FilterCriterion) -> bool {
        self.column.eq_ignore_ascii_case(&other.column)
            && self.operator == other.operator
            && self.value.eq_ignore_ascii_case(&other.value)
            && self.value2.as_deref().map(str::to_lowercase)
                == other.value2.as_deref().map(str::to_lowercase)
    }

    /// Parse one line of the form `[and|or] <column> <operator> <value...>`.
    /// `between` takes `<low>..<high>` or two words, `in` a comma separated list.
    pub fn parse(line: &str) -> Result<Self, GVError> {
        let mut tokens = line.split_whitespace().peekable();

        let condition = match tokens.peek().and_then(|t| Condition::parse(t)) {
            Some(c) => {
                tokens.next();
                c
            }
            None => Condition::And,
        };

        let column = tokens
            .next()
            .ok_or_else(|| GVError::InvalidFilter(format!("missing column in \"{line}\"")))?;
        let op_token = tokens
            .next()
            .ok_or_else(|| GVError::InvalidFilter(format!("missing operator in \"{line}\"")))?;
        let operator = FilterOperator::parse(op_token)
            .ok_or_else(|| GVError::InvalidFilter(format!("unknown operator \"{op_token}\"")))?;

        let rest: Vec<&str> = tokens.collect();
        let (value, value2) = if operator.requires_two_values() {
            let joined = rest.join(" ");
            match joined.split_once("..") {
                Some((low, high)) => (low.trim().to_string(), Some(high.trim().to_string())),
                None if rest.len() == 2 => (rest[0].to_string(), Some(rest[1].to_string())),
                None => {
                    return Err(GVError::InvalidFilter(format!(
                        "between needs a range like 10..20, got \"{joined}\""
                    )));
                }
            }
        } else {
            (rest.join(" "), None)
        };

        if !operator.takes_value() {
            if !value.is_empty() {
                return Err(GVError::InvalidFilter(format!("{operator} takes no value, got \"{value}\"")));
            }
        } else if value.is_empty() || value2.as_deref().is_some_and(str::is_empty) {
            return Err(GVError::InvalidFilter(format!("missing value in \"{line}\"")));
        }

        Ok(FilterCriterion {
            column: column.to_string(),
            operator,
            value,
            value2,
            condition,
        })
    }

    /// Text form; the chaining condition is only shown for criteria after the first.
    pub fn describe(&self, first: bool) -> String {
        let body = match &self.value2 {
            Some(high) => format!("{} {} {}..{}", self.column, self.operator, self.value, high),
            None if !self.operator.takes_value() => format!("{} {}", self.column, self.operator),
            None => format!("{} {} {}", self.column, self.operator, self.value),
        };
        if first {
            body
        } else {
            format!("{} {}", self.condition, body)
        }
    }
}

impl fmt::Display for FilterCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe(true))
    }
}

/// Left fold over the criteria: the first sets the result, each later one
/// combines its own match with the running result using its own condition.
/// `[A, or B, and C]` is therefore `(A || B) && C`, with no precedence.
pub fn matches_all<R: Record>(record: &R, criteria: &[FilterCriterion], ctx: &EvalContext) -> bool {
    let mut iter = criteria.iter();
    let Some(first) = iter.next() else {
        return true;
    };
    iter.fold(first.matches(record, ctx), |result, criterion| {
        criterion
            .condition
            .combine(result, criterion.matches(record, ctx))
    })
}

pub fn filter<'a, R: Record>(
    records: &[&'a R],
    criteria: &[FilterCriterion],
    ctx: &EvalContext,
) -> Vec<&'a R> {
    if criteria.is_empty() {
        return records.to_vec();
    }
    let matched: Vec<&'a R> = records
        .par_iter()
        .filter(|record| matches_all(**record, criteria, ctx))
        .copied()
        .collect();
    trace!(
        "Filter kept {}/{} records with {} criteria",
        matched.len(),
        records.len(),
        criteria.len()
    );
    matched
}

/// Free text search over every column of the record.
pub fn search<'a, R: Record>(records: &[&'a R], query: &str, ctx: &EvalContext) -> Vec<&'a R> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return records.to_vec();
    }
    records
        .par_iter()
        .filter(|record| {
            R::columns().iter().any(|c| {
                record
                    .value(c.name, ctx)
                    .is_some_and(|v| v.to_string().to_lowercase().contains(&query))
            })
        })
        .copied()
        .collect()
}

/// Ordered list of criteria as built up in the advanced search panel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    criteria: Vec<FilterCriterion>,
}

impl FilterSet {
    pub fn new() -> Self {
        FilterSet::default()
    }

    /// Resolves the column against `R`, rejects incomplete and duplicate
    /// criteria. The first criterion of a set never carries `or`.
    pub fn add<R: Record>(&mut self, mut criterion: FilterCriterion) -> Result<(), GVError> {
        let column = R::column(&criterion.column)
            .ok_or_else(|| GVError::UnknownColumn(criterion.column.clone()))?;
        criterion.column = column.name.to_string();

        if criterion.operator.requires_two_values() && criterion.value2.is_none() {
            return Err(GVError::InvalidFilter(format!(
                "{} needs two values",
                criterion.operator
            )));
        }
        if !criterion.operator.takes_value() {
            criterion.value.clear();
            criterion.value2 = None;
        } else if criterion.value.trim().is_empty() {
            return Err(GVError::InvalidFilter("missing value".to_string()));
        }
        if self.criteria.iter().any(|c| c.is_duplicate_of(&criterion)) {
            return Err(GVError::DuplicateFilter(criterion.describe(true)));
        }
        if self.criteria.is_empty() {
            criterion.condition = Condition::And;
        }
        self.criteria.push(criterion);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Option<FilterCriterion> {
        if index >= self.criteria.len() {
            return None;
        }
        let removed = self.criteria.remove(index);
        if index == 0
            && let Some(first) = self.criteria.first_mut()
        {
            first.condition = Condition::And;
        }
        Some(removed)
    }

    pub fn pop(&mut self) -> Option<FilterCriterion> {
        self.criteria.pop()
    }

    pub fn clear(&mut self) {
        self.criteria.clear();
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn criteria(&self) -> &[FilterCriterion] {
        &self.criteria
    }

    pub fn describe(&self) -> Vec<String> {
        self.criteria
            .iter()
            .enumerate()
            .map(|(idx, c)| c.describe(idx == 0))
            .collect()
    }

    /// One criterion per line, as shown in the query box.
    pub fn to_query(&self) -> String {
        self.describe().join("\n")
    }

    pub fn parse_query<R: Record>(query: &str) -> Result<Self, GVError> {
        let mut set = FilterSet::new();
        for line in query.lines().filter(|l| !l.trim().is_empty()) {
            set.add::<R>(FilterCriterion::parse(line)?)?;
        }
        Ok(set)
    }
}
