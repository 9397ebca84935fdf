use std::ops::RangeInclusive;

use tracing::{debug, info};

use crate::domain::GVError;
use crate::filter::{self, FilterCriterion, FilterSet};
use crate::paginate::{self, PAGER_BUTTONS, PageSlice, PageState};
use crate::record::{ColumnDef, EvalContext, Record};
use crate::sort::{self, SortDirection, SortState};

/// State transitions of a grid. Every command is followed by a redraw.
#[derive(Debug, Clone, PartialEq)]
pub enum GridCommand {
    AddFilter(FilterCriterion),
    RemoveFilter(usize),
    RemoveLastFilter,
    ClearFilters,
    /// Replaces all criteria with the parsed query, or nothing on error.
    ApplyQuery(String),
    Search(String),
    SortBy(String),
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    GoToPage(usize),
    SetPageSize(usize),
    CyclePageSize,
    Delete(Vec<u64>),
    Create(String),
    Edit { id: u64, column: String, value: String },
    Reset,
}

/// Owns the records of one record set and the filter, sort and page state over them.
#[derive(Debug, Clone)]
pub struct Grid<R: Record> {
    records: Vec<R>,
    next_id: u64,
    filters: FilterSet,
    search: String,
    sort: Option<SortState>,
    page: PageState,
    ctx: EvalContext,
}

impl<R: Record> Grid<R> {
    /// Records keep their ids; records without one (id 0) are numbered after the highest id.
    pub fn new(records: Vec<R>, page_size: usize) -> Self {
        let mut grid = Grid {
            next_id: records.iter().map(|r| r.id()).max().unwrap_or(0) + 1,
            records: Vec::with_capacity(records.len()),
            filters: FilterSet::new(),
            search: String::new(),
            sort: None,
            page: PageState::new(page_size),
            ctx: EvalContext::now(),
        };
        for record in records {
            if record.id() == 0 {
                grid.insert(record);
            } else {
                grid.records.push(record);
            }
        }
        grid
    }

    pub fn with_context(mut self, ctx: EvalContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn with_sort(mut self, sort: SortState) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn insert(&mut self, mut record: R) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        record.set_id(id);
        self.records.push(record);
        id
    }

    pub fn update(&mut self, id: u64, column: &str, raw: &str) -> Result<(), GVError> {
        let ctx = self.ctx;
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or(GVError::RecordNotFound(id))?;
        *record = record.with_value(column, raw, &ctx)?;
        self.clamp();
        Ok(())
    }

    pub fn remove(&mut self, ids: &[u64]) -> usize {
        let before = self.records.len();
        self.records.retain(|r| !ids.contains(&r.id()));
        let removed = before - self.records.len();
        self.clamp();
        removed
    }

    /// Filter fold, then quick search, then sort.
    pub fn visible(&self) -> Vec<&R> {
        let all: Vec<&R> = self.records.iter().collect();
        let filtered = filter::filter(&all, self.filters.criteria(), &self.ctx);
        let mut rows = filter::search(&filtered, &self.search, &self.ctx);
        if let Some(state) = &self.sort {
            sort::sort(&mut rows, state, &self.ctx);
        }
        rows
    }

    pub fn page(&self) -> PageSlice<&R> {
        paginate::paginate(&self.visible(), self.page.current_page, self.page.page_size)
    }

    fn visible_len(&self) -> usize {
        self.visible().len()
    }

    fn clamp(&mut self) {
        let len = self.visible_len();
        self.page.clamp(len);
    }

    pub fn apply(&mut self, command: GridCommand) -> Result<(), GVError> {
        debug!("{}: {:?}", R::DATASET, command);
        match command {
            GridCommand::AddFilter(criterion) => {
                self.filters.add::<R>(criterion)?;
                debug!("{} filter(s) on {}", self.filters.len(), R::DATASET);
            }
            GridCommand::RemoveFilter(index) => {
                self.filters.remove(index);
            }
            GridCommand::RemoveLastFilter => {
                if self.filters.is_empty() {
                    return Err(GVError::InvalidFilter("no filters applied".into()));
                }
                self.filters.pop();
            }
            GridCommand::ClearFilters => {
                self.filters.clear();
                self.search.clear();
            }
            GridCommand::ApplyQuery(query) => {
                self.filters = FilterSet::parse_query::<R>(&query)?;
                self.page.first();
            }
            GridCommand::Search(query) => self.search = query.trim().to_string(),
            GridCommand::SortBy(column) => {
                let column = R::column(&column).ok_or(GVError::UnknownColumn(column))?;
                self.sort = Some(SortState::select(self.sort.as_ref(), column.name));
            }
            GridCommand::NextPage => {
                let len = self.visible_len();
                self.page.next(len);
            }
            GridCommand::PrevPage => {
                let len = self.visible_len();
                self.page.prev(len);
            }
            GridCommand::FirstPage => self.page.first(),
            GridCommand::LastPage => {
                let len = self.visible_len();
                self.page.last(len);
            }
            GridCommand::GoToPage(page) => {
                let len = self.visible_len();
                self.page.go_to(page, len);
            }
            GridCommand::SetPageSize(size) => self.page.set_page_size(size),
            GridCommand::CyclePageSize => self.page.cycle_page_size(),
            GridCommand::Delete(ids) => {
                let removed = self.remove(&ids);
                if removed == 0 {
                    return Err(ids
                        .first()
                        .map(|&id| GVError::RecordNotFound(id))
                        .unwrap_or_else(|| GVError::Validation("no record selected".into())));
                }
                info!("Deleted {removed} record(s) from {}", R::DATASET);
            }
            GridCommand::Create(args) => {
                let created = R::from_command(&args, &self.ctx)?;
                for record in created {
                    self.insert(record);
                }
            }
            GridCommand::Edit { id, column, value } => {
                self.update(id, &column, &value)?;
                info!("Updated {column} of record {id} in {}", R::DATASET);
            }
            GridCommand::Reset => {
                self.filters.clear();
                self.search.clear();
                self.page.first();
            }
        }
        self.clamp();
        Ok(())
    }
}

#[cfg(test)]
impl<R: Record> Grid<R> {
    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn sort_state(&self) -> Option<&SortState> {
        self.sort.as_ref()
    }

    pub fn page_state(&self) -> PageState {
        self.page
    }

    pub fn search_query(&self) -> &str {
        &self.search
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderView {
    pub label: String,
    pub width: u16,
    pub sort: Option<SortDirection>,
}

/// Rendered strings of the current page, everything the UI needs to draw a grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetView {
    pub title: String,
    pub headers: Vec<HeaderView>,
    pub rows: Vec<Vec<String>>,
    pub ids: Vec<u64>,
    pub page: usize,
    pub total_pages: usize,
    pub total_records: usize,
    pub start: usize,
    pub end: usize,
    pub page_size: usize,
    pub pager: RangeInclusive<usize>,
    pub filters: Vec<String>,
    pub search: String,
}

impl SheetView {
    pub fn empty() -> Self {
        SheetView {
            title: String::new(),
            headers: Vec::new(),
            rows: Vec::new(),
            ids: Vec::new(),
            page: 1,
            total_pages: 1,
            total_records: 0,
            start: 0,
            end: 0,
            page_size: paginate::DEFAULT_PAGE_SIZE,
            pager: 1..=1,
            filters: Vec::new(),
            search: String::new(),
        }
    }

    /// `1-10 of 23`, `0-0 of 0` when empty.
    pub fn range_label(&self) -> String {
        let first = if self.total_records > 0 { self.start + 1 } else { 0 };
        format!("{}-{} of {}", first, self.end, self.total_records)
    }
}

/// Object safe view on a `Grid<R>` so record sets of different types can sit side by side.
pub trait Sheet {
    fn dataset(&self) -> &'static str;
    fn title(&self) -> &'static str;
    fn columns(&self) -> &'static [ColumnDef];
    fn apply(&mut self, command: GridCommand) -> Result<(), GVError>;
    fn snapshot(&self) -> SheetView;
    fn filter_query(&self) -> String;
}

impl<R: Record + 'static> Sheet for Grid<R> {
    fn dataset(&self) -> &'static str {
        R::DATASET
    }

    fn title(&self) -> &'static str {
        R::TITLE
    }

    fn columns(&self) -> &'static [ColumnDef] {
        R::columns()
    }

    fn apply(&mut self, command: GridCommand) -> Result<(), GVError> {
        Grid::apply(self, command)
    }

    fn snapshot(&self) -> SheetView {
        let slice = self.page();
        let headers = R::columns()
            .iter()
            .map(|c| HeaderView {
                label: c.label.to_string(),
                width: c.width,
                sort: self
                    .sort
                    .as_ref()
                    .filter(|s| s.column == c.name)
                    .map(|s| s.direction),
            })
            .collect();
        let rows = slice
            .rows
            .iter()
            .map(|record| {
                R::columns()
                    .iter()
                    .map(|c| {
                        record
                            .value(c.name, &self.ctx)
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "N/A".to_string())
                    })
                    .collect()
            })
            .collect();
        SheetView {
            title: R::TITLE.to_string(),
            headers,
            rows,
            ids: slice.rows.iter().map(|r| r.id()).collect(),
            page: slice.page,
            total_pages: slice.total_pages,
            total_records: slice.total_records,
            start: slice.start,
            end: slice.end,
            page_size: self.page.page_size,
            pager: paginate::page_window(slice.page, slice.total_pages, PAGER_BUTTONS),
            filters: self.filters.describe(),
            search: self.search.clone(),
        }
    }

    fn filter_query(&self) -> String {
        self.filters.to_query()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterOperator;
    use crate::records::{Employee, FinancialYear, FiscalStatus};
    use chrono::NaiveDate;

    fn ctx() -> EvalContext {
        EvalContext::new(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
    }

    fn staff(n: u64) -> Vec<Employee> {
        (1..=n)
            .map(|i| {
                let dept = if i % 2 == 0 { "Engineering" } else { "Sales" };
                Employee::sample(i, &format!("E{i:02}"), dept, "Yes", (i * 1000) as f64)
            })
            .collect()
    }

    fn names(grid: &Grid<Employee>) -> Vec<String> {
        grid.page().rows.iter().map(|e| e.name.clone()).collect()
    }

    #[test]
    fn sort_then_filter_and_filter_then_sort_agree() {
        let data = vec![
            Employee::sample(1, "B", "Sales", "Active", 1.0),
            Employee::sample(2, "A", "Sales", "Closed", 1.0),
        ];
        let mut sorted_first = Grid::new(data.clone(), 10).with_context(ctx());
        sorted_first.apply(GridCommand::SortBy("name".into())).unwrap();
        assert_eq!(names(&sorted_first), ["A", "B"]);
        sorted_first
            .apply(GridCommand::AddFilter(FilterCriterion::new(
                "isActive",
                FilterOperator::Equal,
                "Active",
            )))
            .unwrap();

        let mut filtered_first = Grid::new(data, 10).with_context(ctx());
        filtered_first
            .apply(GridCommand::AddFilter(FilterCriterion::new(
                "isActive",
                FilterOperator::Equal,
                "Active",
            )))
            .unwrap();
        filtered_first.apply(GridCommand::SortBy("name".into())).unwrap();

        assert_eq!(names(&sorted_first), ["B"]);
        assert_eq!(names(&filtered_first), ["B"]);
    }

    #[test]
    fn page_is_clamped_when_filters_shrink_the_result() {
        let mut grid = Grid::new(staff(30), 5).with_context(ctx());
        grid.apply(GridCommand::LastPage).unwrap();
        assert_eq!(grid.page_state().current_page, 6);

        grid.apply(GridCommand::AddFilter(FilterCriterion::new(
            "department",
            FilterOperator::Equal,
            "Sales",
        )))
        .unwrap();
        assert_eq!(grid.page_state().current_page, 3);
        assert_eq!(grid.page().rows.len(), 5);
    }

    #[test]
    fn page_size_change_resets_page() {
        let mut grid = Grid::new(staff(30), 5).with_context(ctx());
        grid.apply(GridCommand::GoToPage(4)).unwrap();
        grid.apply(GridCommand::SetPageSize(10)).unwrap();
        assert_eq!(grid.page_state().current_page, 1);
        assert_eq!(grid.page().total_pages, 3);
    }

    #[test]
    fn deleting_keeps_the_page_in_range() {
        let mut grid = Grid::new(staff(11), 5).with_context(ctx());
        grid.apply(GridCommand::LastPage).unwrap();
        assert_eq!(names(&grid), ["E11"]);
        grid.apply(GridCommand::Delete(vec![11])).unwrap();
        assert_eq!(grid.page_state().current_page, 2);
        assert_eq!(grid.records().len(), 10);

        let missing = grid.apply(GridCommand::Delete(vec![99]));
        assert!(matches!(missing, Err(GVError::RecordNotFound(99))));
    }

    #[test]
    fn rejected_filter_leaves_state_untouched() {
        let mut grid = Grid::new(staff(4), 5).with_context(ctx());
        let criterion = FilterCriterion::new("department", FilterOperator::Equal, "Sales");
        grid.apply(GridCommand::AddFilter(criterion.clone())).unwrap();
        assert!(matches!(
            grid.apply(GridCommand::AddFilter(criterion)),
            Err(GVError::DuplicateFilter(_))
        ));
        assert_eq!(grid.filters().len(), 1);
        assert!(matches!(
            grid.apply(GridCommand::SortBy("height".into())),
            Err(GVError::UnknownColumn(_))
        ));
        assert!(grid.sort_state().is_none());
    }

    #[test]
    fn search_and_reset() {
        let mut grid = Grid::new(staff(12), 5).with_context(ctx());
        grid.apply(GridCommand::Search("e1".into())).unwrap();
        assert_eq!(names(&grid), ["E10", "E11", "E12"]);
        grid.apply(GridCommand::Reset).unwrap();
        assert_eq!(grid.search_query(), "");
        assert_eq!(grid.page().total_records, 12);
    }

    #[test]
    fn applied_query_replaces_all_criteria() {
        let mut grid = Grid::new(staff(12), 5).with_context(ctx());
        grid.apply(GridCommand::AddFilter(FilterCriterion::new(
            "department",
            FilterOperator::Equal,
            "Engineering",
        )))
        .unwrap();
        grid.apply(GridCommand::ApplyQuery(
            "department equal Sales\nand salary between 3000..9000".into(),
        ))
        .unwrap();
        assert_eq!(names(&grid), ["E03", "E05", "E07", "E09"]);

        let broken = grid.apply(GridCommand::ApplyQuery("department equal HR\nheight equal 3".into()));
        assert!(matches!(broken, Err(GVError::UnknownColumn(_))));
        assert_eq!(grid.filters().len(), 2);
    }

    #[test]
    fn new_records_get_fresh_ids() {
        let mut grid: Grid<FinancialYear> = Grid::new(Vec::new(), 5).with_context(ctx());
        grid.apply(GridCommand::Create("2024-04-01 active Global Corp, EMEA Operations".into()))
            .unwrap();
        let ids: Vec<u64> = grid.records().iter().map(|y| y.id).collect();
        assert_eq!(ids, [1, 2]);
        assert!(grid.records().iter().all(|y| y.status == FiscalStatus::Active));

        assert!(grid.apply(GridCommand::Create("not-a-date".into())).is_err());
        assert_eq!(grid.records().len(), 2);

        let mut employees = Grid::new(staff(1), 5);
        assert!(matches!(
            employees.apply(GridCommand::Create("x".into())),
            Err(GVError::Validation(_))
        ));
    }

    #[test]
    fn update_edits_in_place() {
        let mut grid = Grid::new(staff(3), 5).with_context(ctx());
        grid.apply(GridCommand::Edit {
            id: 2,
            column: "Salary".into(),
            value: "1".into(),
        })
        .unwrap();
        assert_eq!(grid.records()[1].salary, 1.0);
        assert_eq!(grid.records()[1].id, 2);
        assert!(matches!(grid.update(2, "joinDate", "soon"), Err(GVError::Validation(_))));
        assert!(matches!(grid.update(7, "salary", "1"), Err(GVError::RecordNotFound(7))));
    }

    #[test]
    fn snapshot_renders_the_page() {
        let mut grid = Grid::new(staff(12), 5).with_context(ctx());
        grid.apply(GridCommand::SortBy("salary".into())).unwrap();
        grid.apply(GridCommand::SortBy("salary".into())).unwrap();
        grid.apply(GridCommand::NextPage).unwrap();
        let view = grid.snapshot();
        assert_eq!(view.title, "Employees");
        assert_eq!(view.page, 2);
        assert_eq!(view.total_pages, 3);
        assert_eq!(view.range_label(), "6-10 of 12");
        assert_eq!(view.ids, vec![7, 6, 5, 4, 3]);
        assert_eq!(view.rows[0][1], "E07");
        assert_eq!(view.rows[0][6], "7000");
        let salary = view.headers.iter().find(|h| h.label == "Salary").unwrap();
        assert_eq!(salary.sort, Some(SortDirection::Desc));
        assert_eq!(view.pager, 1..=3);
    }

    #[test]
    fn financial_year_snapshot_shows_missing_entity_as_na() {
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        let grid = Grid::new(
            vec![FinancialYear::new(0, "2023-24", date(2023, 4, 1), date(2024, 3, 31), FiscalStatus::Closed)],
            5,
        )
        .with_context(ctx());
        let view = grid.snapshot();
        assert_eq!(view.rows[0], ["N/A", "2023-24", "2023-04-01", "2024-03-31", "Closed", "Past"]);
    }
}
