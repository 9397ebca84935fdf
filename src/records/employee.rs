use chrono::NaiveDate;
use derive_setters::Setters;

use crate::domain::GVError;
use crate::record::{ColumnDef, ColumnKind, EvalContext, RawRow, Record, Value};

#[derive(Debug, Clone, PartialEq, Setters)]
#[setters(into)]
pub struct Employee {
    #[setters(skip)]
    pub id: u64,
    pub employee_code: String,
    pub name: String,
    pub email: String,
    pub department: String,
    pub designation: String,
    pub is_active: String,
    pub join_date: NaiveDate,
    pub salary: f64,
    pub city: String,
}

static COLUMNS: [ColumnDef; 9] = [
    ColumnDef::new("employeeCode", "Employee Code", ColumnKind::Text, 13),
    ColumnDef::new("name", "Name", ColumnKind::Text, 18),
    ColumnDef::new("department", "Department", ColumnKind::Text, 14),
    ColumnDef::new("designation", "Designation", ColumnKind::Text, 14),
    ColumnDef::new("isActive", "Is Active?", ColumnKind::Text, 10),
    ColumnDef::new("joinDate", "Join Date", ColumnKind::Date, 11),
    ColumnDef::new("salary", "Salary", ColumnKind::Number, 9),
    ColumnDef::new("city", "City", ColumnKind::Text, 14),
    ColumnDef::new("email", "Email", ColumnKind::Text, 24),
];

impl Employee {
    #[cfg(test)]
    pub fn sample(id: u64, name: &str, department: &str, is_active: &str, salary: f64) -> Self {
        Employee {
            id,
            employee_code: format!("EMP{id:03}"),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            department: department.to_string(),
            designation: "Developer".to_string(),
            is_active: is_active.to_string(),
            join_date: NaiveDate::from_ymd_opt(2020, id.clamp(1, 12) as u32, 15).unwrap(),
            salary,
            city: "New York".to_string(),
        }
    }
}

impl Record for Employee {
    const DATASET: &'static str = "employees";
    const TITLE: &'static str = "Employees";

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
            "employeeCode" => Value::text(&self.employee_code),
            "name" => Value::text(&self.name),
            "department" => Value::text(&self.department),
            "designation" => Value::text(&self.designation),
            "isActive" => Value::text(&self.is_active),
            "joinDate" => Value::Date(self.join_date),
            "salary" => Value::Number(self.salary),
            "city" => Value::text(&self.city),
            "email" => Value::text(&self.email),
            _ => return None,
        };
        Some(value)
    }

    fn from_row(row: &RawRow) -> Result<Self, GVError> {
        Ok(Employee {
            id: 0,
            employee_code: row.required("employeeCode")?.to_string(),
            name: row.required("name")?.to_string(),
            email: row.get("email").unwrap_or_default().to_string(),
            department: row.required("department")?.to_string(),
            designation: row.get("designation").unwrap_or_default().to_string(),
            is_active: row.get("isActive").unwrap_or("No").to_string(),
            join_date: row.date("joinDate")?,
            salary: row.number("salary")?,
            city: row.get("city").unwrap_or_default().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_fills_optional_fields() {
        let row: RawRow = [
            ("employeeCode", "EMP042"),
            ("name", "Grace Hopper"),
            ("department", "Engineering"),
            ("joinDate", "2019-09-01"),
            ("salary", "120000"),
        ]
        .into_iter()
        .collect();
        let employee = Employee::from_row(&row).unwrap();
        assert_eq!(employee.is_active, "No");
        assert_eq!(employee.email, "");
        assert_eq!(
            employee.value("salary", &EvalContext::now()),
            Some(Value::Number(120000.0))
        );
    }

    #[test]
    fn row_without_salary_is_rejected() {
        let row: RawRow = [
            ("employeeCode", "EMP042"),
            ("name", "Grace Hopper"),
            ("department", "Engineering"),
            ("joinDate", "2019-09-01"),
        ]
        .into_iter()
        .collect();
        assert!(matches!(Employee::from_row(&row), Err(GVError::Validation(_))));
    }
}
