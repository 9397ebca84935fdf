use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};

use crate::domain::GVError;
use crate::record::{ColumnDef, ColumnKind, EvalContext, RawRow, Record, Value, parse_date};

const DEFAULT_ENTITY: &str = "Default Company Entity";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiscalStatus {
    Active,
    Inactive,
    Closed,
}

impl fmt::Display for FiscalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FiscalStatus::Active => write!(f, "Active"),
            FiscalStatus::Inactive => write!(f, "Inactive"),
            FiscalStatus::Closed => write!(f, "Closed"),
        }
    }
}

impl FromStr for FiscalStatus {
    type Err = GVError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(FiscalStatus::Active),
            "inactive" => Ok(FiscalStatus::Inactive),
            "closed" => Ok(FiscalStatus::Closed),
            other => Err(GVError::Validation(format!("unknown status \"{other}\""))),
        }
    }
}

/// Where a financial year lies relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Timeline {
    Past = 0,
    Current = 1,
    Future = 2,
}

impl Timeline {
    /// Indexed by discriminant.
    pub const LABELS: [&'static str; 3] = ["Past", "Current", "Future"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameFormat {
    /// `2025-26`
    #[default]
    Short,
    /// `FY2025-26`
    Prefixed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinancialYear {
    pub id: u64,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: FiscalStatus,
    pub entity: Option<String>,
}

static COLUMNS: [ColumnDef; 6] = [
    ColumnDef::new("entity", "Entity", ColumnKind::Text, 22),
    ColumnDef::new("name", "Financial Year", ColumnKind::Text, 14),
    ColumnDef::new("startDate", "Start Date", ColumnKind::Date, 12),
    ColumnDef::new("endDate", "End Date", ColumnKind::Date, 12),
    ColumnDef::new("status", "Status", ColumnKind::Text, 10),
    ColumnDef::new("currentStatus", "Current Status", ColumnKind::Rank, 14),
];

impl FinancialYear {
    pub fn new(
        id: u64,
        name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        status: FiscalStatus,
    ) -> Self {
        FinancialYear {
            id,
            name: name.into(),
            start_date,
            end_date,
            status,
            entity: None,
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn timeline(&self, today: NaiveDate) -> Timeline {
        if today > self.end_date {
            Timeline::Past
        } else if today >= self.start_date {
            Timeline::Current
        } else {
            Timeline::Future
        }
    }

    /// Twelve months from `start`, minus one day.
    pub fn end_date_for(start: NaiveDate) -> Option<NaiveDate> {
        // 29 February rolls over to 1 March of the next year before stepping back
        NaiveDate::from_ymd_opt(start.year() + 1, start.month(), start.day())
            .or_else(|| NaiveDate::from_ymd_opt(start.year() + 1, 3, 1))
            .and_then(|d| d.pred_opt())
    }

    /// Years start in April; a January to March start belongs to the previous year.
    pub fn name_for(start: NaiveDate, format: NameFormat) -> String {
        let first = if start.month() >= 4 {
            start.year()
        } else {
            start.year() - 1
        };
        let second = (first + 1).rem_euclid(100);
        match format {
            NameFormat::Short => format!("{first}-{second:02}"),
            NameFormat::Prefixed => format!("FY{first}-{second:02}"),
        }
    }

    pub fn validate(&self) -> Result<(), GVError> {
        if self.name.trim().is_empty() {
            return Err(GVError::Validation("financial year name is required".into()));
        }
        if self.start_date >= self.end_date {
            return Err(GVError::Validation("End Date must be after Start Date".into()));
        }
        Ok(())
    }

    /// One record per entity. Only a year covering today may be created active.
    pub fn create(
        start: NaiveDate,
        status: FiscalStatus,
        entities: &[String],
        format: NameFormat,
        today: NaiveDate,
    ) -> Result<Vec<FinancialYear>, GVError> {
        let end = Self::end_date_for(start)
            .ok_or_else(|| GVError::Validation(format!("no end date for {start}")))?;
        let template = FinancialYear::new(0, Self::name_for(start, format), start, end, status);
        template.validate()?;

        let status = match template.timeline(today) {
            Timeline::Current => status,
            Timeline::Past | Timeline::Future => FiscalStatus::Inactive,
        };

        let defaults = [DEFAULT_ENTITY.to_string()];
        let entities = if entities.is_empty() {
            &defaults[..]
        } else {
            entities
        };

        Ok(entities
            .iter()
            .map(|entity| FinancialYear {
                status,
                ..template.clone().with_entity(entity.trim())
            })
            .collect())
    }
}

impl Record for FinancialYear {
    const DATASET: &'static str = "financial_years";
    const TITLE: &'static str = "Financial Years";

    fn columns() -> &'static [ColumnDef] {
        &COLUMNS
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn value(&self, column: &str, ctx: &EvalContext) -> Option<Value> {
        match column {
            "entity" => self.entity.clone().map(Value::Text),
            "name" => Some(Value::text(&self.name)),
            "startDate" => Some(Value::Date(self.start_date)),
            "endDate" => Some(Value::Date(self.end_date)),
            "status" => Some(Value::text(self.status.to_string())),
            "currentStatus" => {
                let timeline = self.timeline(ctx.today);
                Some(Value::Rank(timeline as u8, &Timeline::LABELS))
            }
            _ => None,
        }
    }

    fn from_row(row: &RawRow) -> Result<Self, GVError> {
        let start_date = row.date("startDate")?;
        let end_date = match row.optional_date("endDate")? {
            Some(end) => end,
            None => Self::end_date_for(start_date)
                .ok_or_else(|| GVError::Validation(format!("no end date for {start_date}")))?,
        };
        let name = row
            .get("name")
            .map(str::to_string)
            .unwrap_or_else(|| Self::name_for(start_date, NameFormat::Short));
        let status = row.get("status").unwrap_or("Inactive").parse()?;

        let year = FinancialYear {
            id: 0,
            name,
            start_date,
            end_date,
            status,
            entity: row.get("entity").map(str::to_string),
        };
        year.validate()?;
        Ok(year)
    }

    /// `new <start-date> [fy] [active] [entity, entity, ...]`
    fn from_command(args: &str, ctx: &EvalContext) -> Result<Vec<Self>, GVError> {
        let mut tokens = args.split_whitespace().peekable();
        let start = parse_date(
            tokens
                .next()
                .ok_or_else(|| GVError::Validation("usage: new <YYYY-MM-DD> [fy] [active] [entities]".into()))?,
        )?;

        let mut format = NameFormat::Short;
        let mut status = FiscalStatus::Inactive;
        while let Some(token) = tokens.peek() {
            if token.eq_ignore_ascii_case("fy") {
                format = NameFormat::Prefixed;
            } else if token.eq_ignore_ascii_case("active") {
                status = FiscalStatus::Active;
            } else {
                break;
            }
            tokens.next();
        }

        let rest = tokens.collect::<Vec<_>>().join(" ");
        let entities: Vec<String> = rest
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Self::create(start, status, &entities, format, ctx.today)
    }
}
