mod company;
mod employee;
mod financial_year;

pub use company::Company;
pub use employee::Employee;
pub use financial_year::FinancialYear;
#[cfg(test)]
pub use financial_year::FiscalStatus;
