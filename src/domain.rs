use std::fmt;
use std::io::Error;
use std::path::PathBuf;
use std::time::Duration;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

use crate::settings::{QuickFilter, Theme};

pub const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);

pub const HELP_TEXT: &str = "\
Navigation
  j/k, Up/Down     select row          h/l, Left/Right  select column
  n/PgDn, p/PgUp   next/prev page      g/Home, G/End    first/last page
  Tab/BackTab      switch record set   z                cycle page size
Search
  s   sort by column (again to flip)   f   add filter
  /   quick search over all columns    x   remove last filter
  X   clear filters and search         1-9 apply saved quick filter
Records
  d   delete selected record           c/C copy cell/row to clipboard
  t   toggle light/dark theme
  :   command (new, set, delete, page, size, sort, remove, quick, audit,
      reset, save)
  ?   help    Esc close    q quit

Filter syntax:  [and|or] <column> <operator> <value>
  operators: equal, notEqual, greaterThan, lessThan, greaterThanOrEquals,
  lessThanOrEquals, contains, doesNotContain, startsWith, endsWith, like,
  between <a>..<b>, in <a,b,c>, isNull, isNotNull (no value)";

#[derive(Debug)]
pub enum GVError {
    IoError(Error),
    PolarsError(PolarsError),
    JsonError(serde_json::Error),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
    UnknownColumn(String),
    DuplicateFilter(String),
    InvalidFilter(String),
    Validation(String),
    RecordNotFound(u64),
    Settings(String),
}

impl fmt::Display for GVError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GVError::IoError(e) => write!(f, "I/O error: {e}"),
            GVError::PolarsError(e) => write!(f, "data error: {e}"),
            GVError::JsonError(e) => write!(f, "json error: {e}"),
            GVError::LoadingFailed(msg) => write!(f, "loading failed: {msg}"),
            GVError::FileNotFound => write!(f, "file not found"),
            GVError::PermissionDenied => write!(f, "permission denied"),
            GVError::UnknownFileType => write!(f, "unknown file type"),
            GVError::UnknownColumn(column) => write!(f, "unknown column \"{column}\""),
            GVError::DuplicateFilter(filter) => write!(
                f,
                "duplicate filter \"{filter}\": a filter with the same column, operator and value exists"
            ),
            GVError::InvalidFilter(msg) => write!(f, "invalid filter: {msg}"),
            GVError::Validation(msg) => write!(f, "{msg}"),
            GVError::RecordNotFound(id) => write!(f, "record {id} not found"),
            GVError::Settings(msg) => write!(f, "settings: {msg}"),
        }
    }
}

impl From<Error> for GVError {
    fn from(err: Error) -> Self {
        GVError::IoError(err)
    }
}

impl From<PolarsError> for GVError {
    fn from(err: PolarsError) -> Self {
        GVError::PolarsError(err)
    }
}

impl From<serde_json::Error> for GVError {
    fn from(err: serde_json::Error) -> Self {
        GVError::JsonError(err)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    CyclePageSize,
    Sort,
    Filter,
    Search,
    EnterCommand,
    RemoveLastFilter,
    ClearFilters,
    QuickFilter(usize),
    NextSheet,
    PrevSheet,
    Delete,
    CopyCell,
    CopyRow,
    Help,
    ToggleTheme,
    Enter,
    Exit,
    RawKey(KeyEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CMDMode {
    Raw,
    Filter,
    Search,
}

impl CMDMode {
    pub fn prompt(&self) -> &'static str {
        match self {
            CMDMode::Raw => ":",
            CMDMode::Filter => "filter> ",
            CMDMode::Search => "/",
        }
    }
}

/// Runtime configuration, assembled from command line flags over the stored settings.
#[derive(Debug, Clone, Setters)]
#[setters(into)]
pub struct GVConfig {
    pub event_poll_time: u64,
    pub page_size: usize,
    pub data_dir: PathBuf,
    #[setters(strip_option)]
    pub dataset: Option<String>,
    pub settings_path: PathBuf,
    pub theme: Theme,
    pub quick_filters: Vec<QuickFilter>,
    /// Name recorded in the audit trail.
    pub user: String,
}

impl Default for GVConfig {
    fn default() -> Self {
        GVConfig {
            event_poll_time: 100,
            page_size: crate::paginate::DEFAULT_PAGE_SIZE,
            data_dir: PathBuf::from("data"),
            dataset: None,
            settings_path: PathBuf::from("settings.json"),
            theme: Theme::Light,
            quick_filters: Vec::new(),
            user: "Unknown User".to_string(),
        }
    }
}
