use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod domain;
mod filter;
mod grid;
mod inputter;
mod loader;
mod model;
mod paginate;
mod record;
mod records;
mod settings;
mod sort;
mod ui;

use controller::Controller;
use domain::{GVConfig, GVError};
use grid::{Grid, Sheet};
use model::{Model, Status};
use record::EvalContext;
use records::{Company, Employee, FinancialYear};
use settings::Settings;
use sort::SortState;
use ui::TableUI;

const LOG_ENV: &str = "GV_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "gv",
    version,
    about = "Filter, sort and page through admin record sets in the terminal."
)]
struct Args {
    /// Directory holding financial_years, employees and companies data files.
    #[arg(short, long, default_value = "data")]
    data_dir: String,

    /// Record set shown first (financial_years, employees, companies).
    #[arg(long)]
    dataset: Option<String>,

    /// Records per page, overrides the stored setting.
    #[arg(short = 'n', long)]
    page_size: Option<usize>,

    /// Settings file [default: ~/.config/gridview/settings.json]
    #[arg(short, long)]
    settings: Option<String>,

    #[arg(long, default_value = "gv.log")]
    log_file: String,

    /// Event poll timeout in milliseconds.
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,
}

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

/// Logs go to a file, the terminal belongs to the UI.
fn init_tracing(log_file: &Path) -> Result<(), GVError> {
    let file = File::create(log_file)?;
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "Unknown User".to_string())
}

fn build_config(args: Args, settings: &Settings, settings_path: PathBuf) -> GVConfig {
    let config = GVConfig::default()
        .event_poll_time(args.poll_ms)
        .page_size(args.page_size.unwrap_or(settings.page_size))
        .data_dir(settings::expand_path(&args.data_dir))
        .settings_path(settings_path)
        .theme(settings.theme)
        .quick_filters(settings.quick_filters.clone())
        .user(current_user());
    match args.dataset.or_else(|| settings.dataset.clone()) {
        Some(dataset) => config.dataset(dataset),
        None => config,
    }
}

fn load_sheets(config: &GVConfig) -> Result<Vec<Box<dyn Sheet>>, GVError> {
    let dir = &config.data_dir;
    if !dir.is_dir() {
        return Err(GVError::LoadingFailed(format!(
            "data directory {} not found",
            dir.display()
        )));
    }
    // one "today" for every sheet of the session
    let ctx = EvalContext::now();
    let sheets: Vec<Box<dyn Sheet>> = vec![
        Box::new(
            Grid::new(loader::load_dataset::<FinancialYear>(dir)?, config.page_size)
                .with_context(ctx)
                .with_sort(SortState::asc("name")),
        ),
        Box::new(Grid::new(loader::load_dataset::<Employee>(dir)?, config.page_size).with_context(ctx)),
        Box::new(Grid::new(loader::load_dataset::<Company>(dir)?, config.page_size).with_context(ctx)),
    ];
    Ok(sheets)
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    model: &mut Model,
    ui: &TableUI,
    controller: &Controller,
) -> Result<(), GVError> {
    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(model.get_uidata(), f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(model)?;
        model.update(message)?;
    }
    Ok(())
}

fn run() -> Result<(), GVError> {
    let args = Args::parse();
    init_tracing(&settings::expand_path(&args.log_file))?;
    info!("Starting gv {:?}", args);

    let settings_path = args
        .settings
        .as_deref()
        .map(settings::expand_path)
        .unwrap_or_else(settings::default_path);
    let settings = Settings::load(&settings_path)?;
    let config = build_config(args, &settings, settings_path);

    let sheets = load_sheets(&config)?;
    let mut model = Model::init(&config, sheets)?;
    let ui = TableUI::new();
    let controller = Controller::new(&config);

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &mut model, &ui, &controller);
    ratatui::restore();

    if let Err(e) = model.settings().save(&config.settings_path) {
        error!("Saving settings failed: {e}");
    }
    info!("Bye");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_stored_settings() {
        let args = Args::parse_from(["gv", "--page-size", "50", "--dataset", "companies"]);
        let settings = Settings {
            page_size: 5,
            dataset: Some("employees".into()),
            ..Settings::default()
        };
        let config = build_config(args, &settings, PathBuf::from("s.json"));
        assert_eq!(config.page_size, 50);
        assert_eq!(config.dataset.as_deref(), Some("companies"));
        assert_eq!(config.quick_filters, settings.quick_filters);
    }

    #[test]
    fn stored_settings_fill_the_gaps() {
        let args = Args::parse_from(["gv", "--poll-ms", "20"]);
        let settings = Settings {
            page_size: 25,
            dataset: Some("employees".into()),
            ..Settings::default()
        };
        let config = build_config(args, &settings, PathBuf::from("s.json"));
        assert_eq!(config.event_poll_time, 20);
        assert_eq!(config.page_size, 25);
        assert_eq!(config.dataset.as_deref(), Some("employees"));
    }

    #[test]
    fn shipped_data_builds_all_sheets() {
        let config = GVConfig::default().data_dir(Path::new(env!("CARGO_MANIFEST_DIR")).join("data"));
        let sheets = load_sheets(&config).unwrap();
        let names: Vec<_> = sheets.iter().map(|s| s.dataset()).collect();
        assert_eq!(names, ["financial_years", "employees", "companies"]);
        assert_eq!(sheets[2].snapshot().total_records, 20);

        let years = sheets[0].snapshot();
        let sorted: Vec<_> = years.headers.iter().filter(|h| h.sort.is_some()).collect();
        assert_eq!(sorted.len(), 1);
        assert_eq!(sorted[0].label, "Financial Year");
        assert_eq!(sorted[0].sort, Some(sort::SortDirection::Asc));
    }

    #[test]
    fn missing_data_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = GVConfig::default().data_dir(dir.path().join("nope"));
        assert!(matches!(load_sheets(&config), Err(GVError::LoadingFailed(_))));
    }
}
