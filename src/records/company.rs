use chrono::NaiveDate;

use crate::domain::GVError;
use crate::record::{ColumnDef, ColumnKind, EvalContext, RawRow, Record, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Company {
    pub id: u64,
    pub name: String,
    pub industry: String,
    pub location: String,
    pub revenue: f64,
    pub established_date: NaiveDate,
    pub active: bool,
}

static COLUMNS: [ColumnDef; 6] = [
    ColumnDef::new("name", "Name", ColumnKind::Text, 12),
    ColumnDef::new("industry", "Industry", ColumnKind::Text, 14),
    ColumnDef::new("location", "Location", ColumnKind::Text, 14),
    ColumnDef::new("revenue", "Revenue", ColumnKind::Number, 9),
    ColumnDef::new("establishedDate", "Established", ColumnKind::Date, 12),
    ColumnDef::new("active", "Active", ColumnKind::Text, 6),
];

impl Record for Company {
    const DATASET: &'static str = "companies";
    const TITLE: &'static str = "Companies";

    fn columns() -> &'static [ColumnDef] {
        &COLUMNS
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn value(&self, column: &str, _ctx: &EvalContext) -> Option<Value> {
        let value = match column {
            "name" => Value::text(&self.name),
            "industry" => Value::text(&self.industry),
            "location" => Value::text(&self.location),
            "revenue" => Value::Number(self.revenue),
            "establishedDate" => Value::Date(self.established_date),
            "active" => Value::text(if self.active { "Yes" } else { "No" }),
            _ => return None,
        };
        Some(value)
    }

    fn from_row(row: &RawRow) -> Result<Self, GVError> {
        let active = match row.get("active").map(str::to_ascii_lowercase).as_deref() {
            Some("yes") | Some("true") | Some("1") => true,
            Some("no") | Some("false") | Some("0") | None => false,
            Some(other) => {
                return Err(GVError::Validation(format!(
                    "field \"active\": \"{other}\" is not yes/no"
                )));
            }
        };
        Ok(Company {
            id: 0,
            name: row.required("name")?.to_string(),
            industry: row.required("industry")?.to_string(),
            location: row.get("location").unwrap_or_default().to_string(),
            revenue: row.number("revenue")?,
            established_date: row.date("establishedDate")?,
            active,
        })
    }
}
