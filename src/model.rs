use arboard::Clipboard;
use chrono::{Local, NaiveDateTime};
use ratatui::crossterm::event::KeyEvent;
use std::fmt;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::domain::{CMDMode, GVConfig, GVError, HELP_TEXT, Message};
use crate::grid::{GridCommand, Sheet, SheetView};
use crate::inputter::{InputResult, Inputter};
use crate::settings::{QuickFilter, SETTINGS_VERSION, Settings, Theme};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    CMDINPUT,
}

/// One change made during the session, shown by `:audit`.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub at: NaiveDateTime,
    pub user: String,
    pub action: String,
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}: {}", self.at.format("%Y-%m-%d %H:%M:%S"), self.user, self.action)
    }
}

/// Everything the UI draws, rebuilt after each state change.
pub struct UIData {
    pub sheet: SheetView,
    pub sheet_titles: Vec<&'static str>,
    pub active_sheet: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub theme: Theme,
    pub show_popup: bool,
    pub popup_title: String,
    pub popup_message: String,

    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub last_status_message_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            sheet: SheetView::empty(),
            sheet_titles: Vec::new(),
            active_sheet: 0,
            selected_row: 0,
            selected_column: 0,
            theme: Theme::Light,
            show_popup: false,
            popup_title: String::new(),
            popup_message: String::new(),
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        }
    }
}

pub struct Model {
    config: GVConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    sheets: Vec<Box<dyn Sheet>>,
    active: usize,
    selected_row: usize,
    selected_column: usize,
    uidata: UIData,
    clipboard: Option<Clipboard>,
    input: Inputter,
    audit: Vec<AuditEntry>,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(config: &GVConfig, sheets: Vec<Box<dyn Sheet>>) -> Result<Self, GVError> {
        let clipboard = match Clipboard::new() {
            Ok(clipboard) => Some(clipboard),
            Err(e) => {
                warn!("Clipboard not available: {e}");
                None
            }
        };
        Model::new(config, sheets, clipboard)
    }

    pub fn new(
        config: &GVConfig,
        sheets: Vec<Box<dyn Sheet>>,
        clipboard: Option<Clipboard>,
    ) -> Result<Self, GVError> {
        if sheets.is_empty() {
            return Err(GVError::LoadingFailed("no record sets to show".into()));
        }
        let active = match &config.dataset {
            Some(name) => match sheets.iter().position(|s| s.dataset() == name.as_str()) {
                Some(idx) => idx,
                None => {
                    warn!("Unknown dataset {name}, showing {}", sheets[0].dataset());
                    0
                }
            },
            None => 0,
        };
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            sheets,
            active,
            selected_row: 0,
            selected_column: 0,
            uidata: UIData::empty(),
            clipboard,
            input: Inputter::default(),
            audit: Vec::new(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        };
        model.refresh();
        model.set_status_message("Press ? for help");
        Ok(model)
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    /// Current preferences, written back to the settings file on exit.
    pub fn settings(&self) -> Settings {
        Settings {
            version: SETTINGS_VERSION,
            theme: self.config.theme,
            page_size: self.uidata.sheet.page_size,
            dataset: Some(self.sheet().dataset().to_string()),
            quick_filters: self.config.quick_filters.clone(),
        }
    }

    fn sheet(&self) -> &dyn Sheet {
        self.sheets[self.active].as_ref()
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
        self.uidata.status_message = self.status_message.clone();
        self.uidata.last_status_message_update = self.last_status_message_update;
    }

    /// Rebuilds the snapshot of the active sheet and keeps the selection inside it.
    fn refresh(&mut self) {
        let sheet = self.sheet().snapshot();
        self.selected_row = self.selected_row.min(sheet.rows.len().saturating_sub(1));
        self.selected_column = self.selected_column.min(sheet.headers.len().saturating_sub(1));

        let sheet_titles = self.sheets.iter().map(|s| s.title()).collect();
        self.uidata = UIData {
            sheet,
            sheet_titles,
            active_sheet: self.active,
            selected_row: self.selected_row,
            selected_column: self.selected_column,
            theme: self.config.theme,
            show_popup: self.modus == Modus::POPUP,
            popup_title: std::mem::take(&mut self.uidata.popup_title),
            popup_message: std::mem::take(&mut self.uidata.popup_message),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
        };
    }

    /// Applies a command to the active sheet. Rejected commands end up in
    /// the status line, the loop keeps running.
    fn apply(&mut self, command: GridCommand) -> bool {
        let result = self.sheets[self.active].apply(command);
        let ok = match result {
            Ok(()) => true,
            Err(e) => {
                warn!("{}: {}", self.sheet().dataset(), e);
                self.set_status_message(capitalize(&e.to_string()));
                false
            }
        };
        self.refresh();
        ok
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), GVError> {
        if let Some(msg) = message {
            trace!("Update: Modus {:?}, Message {:?}", self.modus, msg);
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_selection_down(),
                    Message::MoveUp => self.move_selection_up(),
                    Message::MoveLeft => self.move_selection_left(),
                    Message::MoveRight => self.move_selection_right(),
                    Message::NextPage => self.change_page(GridCommand::NextPage),
                    Message::PrevPage => self.change_page(GridCommand::PrevPage),
                    Message::FirstPage => self.change_page(GridCommand::FirstPage),
                    Message::LastPage => self.change_page(GridCommand::LastPage),
                    Message::CyclePageSize => self.cycle_page_size(),
                    Message::Sort => self.sort_current_column(),
                    Message::Filter => self.enter_cmd_mode(CMDMode::Filter),
                    Message::Search => self.enter_cmd_mode(CMDMode::Search),
                    Message::EnterCommand => self.enter_cmd_mode(CMDMode::Raw),
                    Message::RemoveLastFilter => self.remove_last_filter(),
                    Message::ClearFilters => {
                        if self.apply(GridCommand::ClearFilters) {
                            self.set_status_message("Filters cleared");
                        }
                    }
                    Message::QuickFilter(n) => self.apply_quick_filter(n),
                    Message::NextSheet => self.switch_sheet(1),
                    Message::PrevSheet => self.switch_sheet(self.sheets.len() - 1),
                    Message::Delete => self.delete_selected(),
                    Message::CopyCell => self.copy_table_cell(),
                    Message::CopyRow => self.copy_table_row(),
                    Message::ToggleTheme => self.toggle_theme(),
                    Message::Help => self.show_help(),
                    Message::Enter => {}
                    Message::Exit => self.exit(),
                    Message::RawKey(_) => {}
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Enter | Message::Help => self.exit(),
                    _ => (),
                },
                Modus::CMDINPUT => {
                    if let Message::RawKey(key) = msg {
                        self.raw_input(key)
                    }
                }
            }
        }
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn exit(&mut self) {
        match self.modus {
            Modus::TABLE => {
                // Esc on the table drops a running quick search
                if !self.uidata.sheet.search.is_empty() {
                    self.apply(GridCommand::Search(String::new()));
                }
            }
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
                self.uidata.show_popup = false;
            }
            Modus::CMDINPUT => {}
        }
    }

    fn show_help(&mut self) {
        self.show_popup("Help", HELP_TEXT.to_string());
    }

    fn show_popup(&mut self, title: &str, message: String) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.uidata.popup_title = title.to_string();
        self.uidata.popup_message = message;
        self.uidata.show_popup = true;
    }

    fn toggle_theme(&mut self) {
        self.config.theme = match self.config.theme {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        };
        self.uidata.theme = self.config.theme;
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if self.active_cmdinput {
            self.last_input = self.input.read(key);
            if self.last_input.finished {
                self.handle_cmd_input();
            }
            self.uidata.cmdinput = self.last_input.clone();
            self.uidata.cmd_mode = self.cmd_mode;
            self.uidata.active_cmdinput = self.active_cmdinput;
        }
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {:?}", mode);
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);

        self.active_cmdinput = true;
        self.input.clear();
        if mode == CMDMode::Search {
            self.input.set(&self.uidata.sheet.search);
        }
        self.last_input = self.input.get();

        self.uidata.cmdinput = self.last_input.clone();
        self.uidata.active_cmdinput = self.active_cmdinput;
        self.uidata.cmd_mode = self.cmd_mode;
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {}", self.last_input.input);

        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;
        self.uidata.active_cmdinput = self.active_cmdinput;

        let cmd_input = self.last_input.input.trim().to_string();
        let canceled = self.last_input.canceled;
        let mode = self.cmd_mode.take();
        self.last_input = InputResult::default();
        if canceled {
            return;
        }
        match mode {
            Some(CMDMode::Filter) => self.add_filter(&cmd_input),
            Some(CMDMode::Search) => self.search(&cmd_input),
            Some(CMDMode::Raw) => self.run_command(&cmd_input),
            None => info!("Cmd mode is none!"),
        }
    }

    fn add_filter(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        let criterion = match crate::filter::FilterCriterion::parse(line) {
            Ok(criterion) => criterion,
            Err(e) => {
                self.set_status_message(capitalize(&e.to_string()));
                return;
            }
        };
        if self.apply(GridCommand::AddFilter(criterion)) {
            let total = self.uidata.sheet.total_records;
            self.set_status_message(format!("Filter applied, {total} matching record(s)"));
        }
    }

    fn search(&mut self, query: &str) {
        if self.apply(GridCommand::Search(query.to_string())) {
            if query.is_empty() {
                self.set_status_message("Search cleared");
            } else if self.uidata.sheet.total_records == 0 {
                self.set_status_message("Found no matches!");
            } else {
                let total = self.uidata.sheet.total_records;
                self.set_status_message(format!("Found {total} results"));
            }
        }
    }

    /// `new <args>`, `delete [ids]`, `page <n>`, `size <n>`, `sort <column>`,
    /// `set <column> <value>`, `remove <n>`, `quick [<n> | save <label>]`,
    /// `reset`, `save`, `quit`.
    fn run_command(&mut self, line: &str) {
        let (cmd, args) = match line.split_once(char::is_whitespace) {
            Some((cmd, args)) => (cmd, args.trim()),
            None => (line, ""),
        };
        debug!("Command {cmd:?} args {args:?}");
        match cmd.to_lowercase().as_str() {
            "" => {}
            "new" => {
                let before = self.uidata.sheet.total_records;
                if self.apply(GridCommand::Create(args.to_string())) {
                    let added = self.uidata.sheet.total_records.saturating_sub(before);
                    self.record_audit(format!("Created {added} record(s) from \"{args}\""));
                    self.set_status_message(format!("Created {added} record(s)"));
                }
            }
            "delete" if args.is_empty() => self.delete_selected(),
            "delete" => match parse_numbers::<u64>(args) {
                Some(ids) => {
                    let count = ids.len();
                    let listed = ids.iter().map(u64::to_string).collect::<Vec<_>>().join(", ");
                    if self.apply(GridCommand::Delete(ids)) {
                        self.record_audit(format!("Deleted record(s) {listed}"));
                        self.set_status_message(format!("Deleted {count} record(s)"));
                    }
                }
                None => self.set_status_message(format!("Invalid record ids \"{args}\"")),
            },
            "page" => match args.parse::<usize>() {
                Ok(page) => self.change_page(GridCommand::GoToPage(page)),
                Err(_) => self.set_status_message(format!("Invalid page \"{args}\"")),
            },
            "size" => match args.parse::<usize>() {
                Ok(size) if size > 0 => {
                    self.selected_row = 0;
                    if self.apply(GridCommand::SetPageSize(size)) {
                        self.set_status_message(format!("Showing {size} records per page"));
                    }
                }
                _ => self.set_status_message(format!("Invalid page size \"{args}\"")),
            },
            "sort" => self.sort_by(args),
            "set" => self.edit_selected(args),
            "remove" => match args.parse::<usize>() {
                Ok(n) if n > 0 && n <= self.uidata.sheet.filters.len() => {
                    if self.apply(GridCommand::RemoveFilter(n - 1)) {
                        self.set_status_message(format!("Removed filter {n}"));
                    }
                }
                _ => self.set_status_message(format!("No filter \"{args}\"")),
            },
            "quick" => self.quick_command(args),
            "audit" => self.show_audit(),
            "reset" => {
                self.selected_row = 0;
                if self.apply(GridCommand::Reset) {
                    self.set_status_message("Filters and search reset");
                }
            }
            "save" => match self.settings().save(&self.config.settings_path) {
                Ok(()) => {
                    let path = self.config.settings_path.display().to_string();
                    self.set_status_message(format!("Settings saved to {path}"));
                }
                Err(e) => {
                    error!("Saving settings failed: {e}");
                    self.set_status_message(format!("Saving settings failed: {e}"));
                }
            },
            "q" | "quit" => self.quit(),
            other => self.set_status_message(format!("Unknown command \"{other}\"")),
        }
    }

    fn quick_filters(&self) -> Vec<&QuickFilter> {
        let dataset = self.sheet().dataset();
        self.config
            .quick_filters
            .iter()
            .filter(|q| q.dataset == dataset)
            .collect()
    }

    fn quick_command(&mut self, args: &str) {
        let (first, rest) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
        if first.eq_ignore_ascii_case("save") {
            let label = rest.trim();
            let query = self.sheet().filter_query();
            if label.is_empty() || query.is_empty() {
                self.set_status_message("Usage: quick save <label> with at least one filter");
                return;
            }
            let quick = QuickFilter::new(label, self.sheet().dataset(), &query);
            info!("Saved quick filter {:?}", quick);
            self.config.quick_filters.push(quick);
            let n = self.quick_filters().len();
            self.set_status_message(format!("Saved quick filter {n}: {label}"));
            return;
        }
        match args.parse::<usize>() {
            Ok(n) => self.apply_quick_filter(n),
            Err(_) => {
                let listing = self
                    .quick_filters()
                    .iter()
                    .enumerate()
                    .map(|(idx, q)| {
                        let filter = q.filter.replace('\n', "\n     ");
                        format!("{}  {}\n     {}", idx + 1, q.label, filter)
                    })
                    .collect::<Vec<_>>();
                if listing.is_empty() {
                    self.set_status_message("No quick filters for this record set");
                } else {
                    self.show_popup("Quick filters", listing.join("\n"));
                }
            }
        }
    }

    fn apply_quick_filter(&mut self, n: usize) {
        let quick = n
            .checked_sub(1)
            .and_then(|idx| self.quick_filters().get(idx).map(|q| (*q).clone()));
        let Some(quick) = quick else {
            self.set_status_message(format!("No quick filter {n}"));
            return;
        };
        self.selected_row = 0;
        if self.apply(GridCommand::ApplyQuery(quick.filter.clone())) {
            let total = self.uidata.sheet.total_records;
            self.set_status_message(format!("{}: {total} matching record(s)", quick.label));
        }
    }

    fn remove_last_filter(&mut self) {
        if self.uidata.sheet.filters.is_empty() {
            self.set_status_message("No filters applied");
        } else if self.apply(GridCommand::RemoveLastFilter) {
            self.set_status_message("Removed last filter");
        }
    }

    fn change_page(&mut self, command: GridCommand) {
        self.selected_row = 0;
        self.apply(command);
    }

    fn cycle_page_size(&mut self) {
        self.selected_row = 0;
        if self.apply(GridCommand::CyclePageSize) {
            let size = self.uidata.sheet.page_size;
            self.set_status_message(format!("Showing {size} records per page"));
        }
    }

    fn sort_current_column(&mut self) {
        let Some(column) = self.sheet().columns().get(self.selected_column) else {
            return;
        };
        self.sort_by(column.name);
    }

    fn sort_by(&mut self, column: &str) {
        if self.apply(GridCommand::SortBy(column.to_string())) {
            let sorted = self
                .uidata
                .sheet
                .headers
                .iter()
                .find_map(|h| h.sort.map(|d| format!("Sorted by {} {}", h.label, d.indicator())));
            if let Some(message) = sorted {
                self.set_status_message(message);
            }
        }
    }

    fn switch_sheet(&mut self, step: usize) {
        self.active = (self.active + step) % self.sheets.len();
        self.selected_row = 0;
        self.selected_column = 0;
        self.refresh();
        info!("Switched to {}", self.sheet().dataset());
        self.set_status_message(self.sheet().title());
    }

    fn selected_id(&self) -> Option<u64> {
        self.uidata.sheet.ids.get(self.selected_row).copied()
    }

    fn delete_selected(&mut self) {
        match self.selected_id() {
            Some(id) => {
                if self.apply(GridCommand::Delete(vec![id])) {
                    self.record_audit(format!("Deleted record {id}"));
                    self.set_status_message(format!("Deleted record {id}"));
                }
            }
            None => self.set_status_message("No record selected"),
        }
    }

    fn edit_selected(&mut self, args: &str) {
        let Some((column, value)) = args.split_once(char::is_whitespace) else {
            self.set_status_message("Usage: set <column> <value>");
            return;
        };
        let Some(id) = self.selected_id() else {
            self.set_status_message("No record selected");
            return;
        };
        let command = GridCommand::Edit {
            id,
            column: column.to_string(),
            value: value.trim().to_string(),
        };
        if self.apply(command) {
            self.record_audit(format!("Set {column} of record {id} to \"{}\"", value.trim()));
            self.set_status_message(format!("Updated {column} of record {id}"));
        }
    }

    fn record_audit(&mut self, action: String) {
        let entry = AuditEntry {
            at: Local::now().naive_local(),
            user: self.config.user.clone(),
            action: format!("{}: {action}", self.sheet().title()),
        };
        info!("Audit {entry}");
        self.audit.push(entry);
    }

    /// Most recent first.
    fn show_audit(&mut self) {
        let message = if self.audit.is_empty() {
            "No audit entries yet.".to_string()
        } else {
            self.audit
                .iter()
                .rev()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("\n")
        };
        self.show_popup("Audit trail", message);
    }

    fn selected_cells(&self) -> Option<&Vec<String>> {
        self.uidata.sheet.rows.get(self.selected_row)
    }

    fn copy_to_clipboard(&mut self, content: String) {
        let Some(clipboard) = self.clipboard.as_mut() else {
            self.set_status_message("Clipboard not available");
            return;
        };
        match clipboard.set_text(content) {
            Ok(_) => {
                trace!("Copied content to clipboard.");
                self.set_status_message("Copied to clipboard");
            }
            Err(e) => {
                trace!("Error copying to clipboard: {:?}", e);
                self.set_status_message(format!("Copy failed: {e}"));
            }
        }
    }

    fn copy_table_cell(&mut self) {
        let Some(cell) = self
            .selected_cells()
            .and_then(|cells| cells.get(self.selected_column))
            .cloned()
        else {
            return;
        };
        trace!("Cell content: {}", cell);
        self.copy_to_clipboard(cell);
    }

    fn copy_table_row(&mut self) {
        let Some(cells) = self.selected_cells() else {
            return;
        };
        let row_content = row_as_csv(cells);
        self.copy_to_clipboard(row_content);
    }

    fn move_selection_down(&mut self) {
        let rows = self.uidata.sheet.rows.len();
        if self.selected_row + 1 < rows {
            self.selected_row += 1;
            self.uidata.selected_row = self.selected_row;
        } else if self.uidata.sheet.page < self.uidata.sheet.total_pages {
            self.change_page(GridCommand::NextPage);
        }
    }

    fn move_selection_up(&mut self) {
        if self.selected_row > 0 {
            self.selected_row -= 1;
            self.uidata.selected_row = self.selected_row;
        } else if self.uidata.sheet.page > 1 {
            self.apply(GridCommand::PrevPage);
            self.selected_row = self.uidata.sheet.rows.len().saturating_sub(1);
            self.uidata.selected_row = self.selected_row;
        }
    }

    fn move_selection_left(&mut self) {
        self.selected_column = self.selected_column.saturating_sub(1);
        self.uidata.selected_column = self.selected_column;
    }

    fn move_selection_right(&mut self) {
        if self.selected_column + 1 < self.uidata.sheet.headers.len() {
            self.selected_column += 1;
        }
        self.uidata.selected_column = self.selected_column;
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn parse_numbers<T: std::str::FromStr>(args: &str) -> Option<Vec<T>> {
    args.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect()
}

fn wrap_cell_content(c: &str) -> String {
    let needs_escaping = c.contains('"');
    let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
    let mut out = String::from(c);

    if needs_escaping {
        out = out.replace('"', "\"\"");
    }
    if needs_wrapping || needs_escaping {
        out = format!("\"{out}\"");
    }
    out
}

/// One comma separated line, cells quoted where needed.
fn row_as_csv(cells: &[String]) -> String {
    cells
        .iter()
        .map(|c| wrap_cell_content(c))
        .collect::<Vec<String>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::record::EvalContext;
    use crate::records::{Company, Employee, FinancialYear};
    use chrono::NaiveDate;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    fn ctx() -> EvalContext {
        EvalContext::new(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
    }

    fn staff() -> Vec<Employee> {
        (1..=12)
            .map(|i| {
                let dept = if i % 3 == 0 { "Sales" } else { "Engineering" };
                Employee::sample(i, &format!("E{i:02}"), dept, "Yes", (i * 1000) as f64)
            })
            .collect()
    }

    fn model_with(config: GVConfig) -> Model {
        let sheets: Vec<Box<dyn Sheet>> = vec![
            Box::new(Grid::new(staff(), config.page_size).with_context(ctx())),
            Box::new(Grid::<Company>::new(Vec::new(), config.page_size).with_context(ctx())),
            Box::new(Grid::<FinancialYear>::new(Vec::new(), config.page_size).with_context(ctx())),
        ];
        Model::new(&config, sheets, None).unwrap()
    }

    fn model() -> Model {
        model_with(GVConfig::default().page_size(5usize))
    }

    fn send(model: &mut Model, message: Message) {
        model.update(Some(message)).unwrap();
    }

    fn type_line(model: &mut Model, line: &str) {
        for c in line.chars() {
            send(model, Message::RawKey(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)));
        }
        send(model, Message::RawKey(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)));
    }

    fn first_column(model: &Model) -> Vec<String> {
        model.get_uidata().sheet.rows.iter().map(|r| r[1].clone()).collect()
    }

    #[test]
    fn filter_prompt_adds_a_criterion() {
        let mut model = model();
        send(&mut model, Message::Filter);
        assert!(model.raw_keyevents());
        type_line(&mut model, "department equal sales");
        assert!(!model.raw_keyevents());
        assert_eq!(first_column(&model), ["E03", "E06", "E09", "E12"]);
        assert_eq!(model.get_uidata().sheet.filters, ["department equal sales"]);
        assert!(model.get_uidata().status_message.contains("4 matching"));
    }

    #[test]
    fn invalid_filters_end_up_in_the_status_line() {
        let mut model = model();
        send(&mut model, Message::Filter);
        type_line(&mut model, "height equal 3");
        assert_eq!(model.get_uidata().status_message, "Unknown column \"height\"");

        send(&mut model, Message::Filter);
        type_line(&mut model, "department equal Sales");
        send(&mut model, Message::Filter);
        type_line(&mut model, "Department equal SALES");
        assert!(model.get_uidata().status_message.starts_with("Duplicate filter"));
        assert_eq!(model.get_uidata().sheet.filters.len(), 1);
    }

    #[test]
    fn escape_cancels_the_prompt() {
        let mut model = model();
        send(&mut model, Message::Filter);
        send(&mut model, Message::RawKey(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE)));
        send(&mut model, Message::RawKey(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(!model.raw_keyevents());
        assert!(model.get_uidata().sheet.filters.is_empty());
    }

    #[test]
    fn sorting_flips_on_the_same_column() {
        let mut model = model();
        send(&mut model, Message::MoveRight);
        send(&mut model, Message::Sort);
        send(&mut model, Message::Sort);
        assert_eq!(first_column(&model)[0], "E12");
        assert!(model.get_uidata().status_message.ends_with('▼'));
    }

    #[test]
    fn moving_past_the_page_edge_turns_the_page() {
        let mut model = model();
        for _ in 0..5 {
            send(&mut model, Message::MoveDown);
        }
        let ui = model.get_uidata();
        assert_eq!(ui.sheet.page, 2);
        assert_eq!(ui.selected_row, 0);

        send(&mut model, Message::MoveUp);
        let ui = model.get_uidata();
        assert_eq!(ui.sheet.page, 1);
        assert_eq!(ui.selected_row, 4);
    }

    #[test]
    fn commands_drive_the_grid() {
        let mut model = model();
        send(&mut model, Message::EnterCommand);
        type_line(&mut model, "page 3");
        assert_eq!(model.get_uidata().sheet.page, 3);

        send(&mut model, Message::EnterCommand);
        type_line(&mut model, "size 10");
        assert_eq!(model.get_uidata().sheet.page, 1);
        assert_eq!(model.get_uidata().sheet.total_pages, 2);

        send(&mut model, Message::EnterCommand);
        type_line(&mut model, "delete 1, 2");
        assert_eq!(model.get_uidata().sheet.total_records, 10);

        send(&mut model, Message::EnterCommand);
        type_line(&mut model, "frobnicate");
        assert_eq!(model.get_uidata().status_message, "Unknown command \"frobnicate\"");
    }

    #[test]
    fn set_edits_the_selected_record() {
        let mut model = model();
        send(&mut model, Message::MoveDown);
        send(&mut model, Message::EnterCommand);
        type_line(&mut model, "set city San Diego");
        assert_eq!(model.get_uidata().sheet.rows[1][7], "San Diego");
        assert_eq!(model.get_uidata().status_message, "Updated city of record 2");

        send(&mut model, Message::EnterCommand);
        type_line(&mut model, "set salary lots");
        assert!(model.get_uidata().status_message.contains("not a number"));
    }

    #[test]
    fn delete_removes_the_selected_record_and_clamps() {
        let mut model = model_with(GVConfig::default().page_size(5usize));
        send(&mut model, Message::LastPage);
        assert_eq!(model.get_uidata().sheet.rows.len(), 2);
        send(&mut model, Message::Delete);
        send(&mut model, Message::Delete);
        let ui = model.get_uidata();
        assert_eq!(ui.sheet.total_records, 10);
        assert_eq!(ui.sheet.page, 2);
    }

    #[test]
    fn quick_filters_belong_to_their_dataset() {
        let config = GVConfig::default().page_size(5usize).quick_filters(vec![
            QuickFilter::new("Sales", "employees", "department equal Sales\nand salary between 4000..10000"),
            QuickFilter::new("Tech", "companies", "industry equal Technology"),
        ]);
        let mut model = model_with(config);
        send(&mut model, Message::QuickFilter(1));
        assert_eq!(first_column(&model), ["E06", "E09"]);
        send(&mut model, Message::QuickFilter(2));
        assert_eq!(model.get_uidata().status_message, "No quick filter 2");

        send(&mut model, Message::ClearFilters);
        send(&mut model, Message::Filter);
        type_line(&mut model, "name like e1");
        send(&mut model, Message::EnterCommand);
        type_line(&mut model, "quick save Tens");
        assert_eq!(model.settings().quick_filters.len(), 3);
        assert_eq!(model.settings().quick_filters[2].filter, "name like e1");
    }

    #[test]
    fn quick_save_needs_the_exact_keyword() {
        let mut model = model();
        send(&mut model, Message::Filter);
        type_line(&mut model, "department equal Sales");
        send(&mut model, Message::EnterCommand);
        type_line(&mut model, "quick saved");
        assert!(model.settings().quick_filters.is_empty());

        send(&mut model, Message::EnterCommand);
        type_line(&mut model, "quick SAVE Sales team");
        let saved = model.settings().quick_filters;
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].label, "Sales team");

        send(&mut model, Message::EnterCommand);
        type_line(&mut model, "quick");
        let ui = model.get_uidata();
        assert!(ui.show_popup);
        assert_eq!(ui.popup_title, "Quick filters");
        assert!(ui.popup_message.contains("Sales team"));
    }

    #[test]
    fn changes_are_kept_in_the_audit_trail() {
        let mut model = model_with(GVConfig::default().page_size(5usize).user("alice"));
        send(&mut model, Message::EnterCommand);
        type_line(&mut model, "audit");
        assert_eq!(model.get_uidata().popup_message, "No audit entries yet.");
        send(&mut model, Message::Exit);

        send(&mut model, Message::EnterCommand);
        type_line(&mut model, "set city Lyon");
        send(&mut model, Message::Delete);
        send(&mut model, Message::EnterCommand);
        type_line(&mut model, "set salary lots");
        send(&mut model, Message::EnterCommand);
        type_line(&mut model, "audit");

        let ui = model.get_uidata();
        assert_eq!(ui.popup_title, "Audit trail");
        let lines: Vec<&str> = ui.popup_message.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("alice: Employees: Deleted record 1"));
        assert!(lines[1].ends_with("alice: Employees: Set city of record 1 to \"Lyon\""));
    }

    #[test]
    fn switching_sheets_wraps_around() {
        let mut model = model_with(GVConfig::default().dataset("companies"));
        assert_eq!(model.get_uidata().active_sheet, 1);
        send(&mut model, Message::NextSheet);
        send(&mut model, Message::NextSheet);
        assert_eq!(model.get_uidata().active_sheet, 0);
        send(&mut model, Message::PrevSheet);
        assert_eq!(model.settings().dataset.as_deref(), Some("financial_years"));
        assert!(model.get_uidata().sheet.rows.is_empty());
    }

    #[test]
    fn help_popup_opens_and_closes() {
        let mut model = model();
        send(&mut model, Message::Help);
        assert!(model.get_uidata().show_popup);
        assert_eq!(model.get_uidata().popup_title, "Help");
        send(&mut model, Message::MoveDown);
        assert_eq!(model.get_uidata().selected_row, 0);
        send(&mut model, Message::Exit);
        assert!(!model.get_uidata().show_popup);
        send(&mut model, Message::Quit);
        assert_eq!(model.status, Status::QUITTING);
    }

    #[test]
    fn settings_reflect_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut model = model_with(GVConfig::default().settings_path(path.clone()));
        send(&mut model, Message::CyclePageSize);
        send(&mut model, Message::ToggleTheme);
        send(&mut model, Message::EnterCommand);
        type_line(&mut model, "save");
        let saved = Settings::load(&path).unwrap();
        assert_eq!(saved.page_size, 25);
        assert_eq!(saved.theme, Theme::Dark);
        assert_eq!(saved.dataset.as_deref(), Some("employees"));
    }

    #[test]
    fn rows_are_copied_as_csv() {
        let cells = vec!["EMP001".to_string(), "Doe, John".to_string(), "6\" tall".to_string()];
        assert_eq!(row_as_csv(&cells), "EMP001,\"Doe, John\",\"6\"\" tall\"");
    }

    #[test]
    fn copy_without_clipboard_reports() {
        let mut model = model();
        send(&mut model, Message::CopyCell);
        assert_eq!(model.get_uidata().status_message, "Clipboard not available");
    }
}
