//! slotwatch CLI
//!
//! Watches court schedules and alerts when new slots open up.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use slotwatch::{
    error::{AppError, Result},
    models::{Config, Facility, normalize_interval},
    pipeline::{self, NotifierDispatch, NotifyPolicy, PollLoop},
    services::{MatchiFetcher, SmtpSender, select_notifier, select_renderer},
    utils::{
        console,
        time::{TimeWindow, date_range, parse_date, parse_dates_list},
    },
};
use tokio::sync::watch;

/// slotwatch - Court Availability Monitor
#[derive(Parser, Debug)]
#[command(
    name = "slotwatch",
    version,
    about = "Watches court schedules and alerts when new slots open up"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Do not print availability tables
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Monitor facilities for new slots (default)
    Monitor(MonitorArgs),

    /// Show three test desktop notifications
    TestNotifications {
        /// Do not wait for Enter before sending
        #[arg(long)]
        yes: bool,
    },

    /// Send a test email
    TestEmail,

    /// Validate the configuration file
    Validate,

    /// List configured facilities
    Facilities,
}

#[derive(Args, Debug, Default)]
struct MonitorArgs {
    /// Facility to monitor (repeatable, default: all active)
    #[arg(long = "facility", value_name = "NAME")]
    facilities: Vec<String>,

    /// Days after the start date to include
    #[arg(long)]
    days_ahead: Option<u32>,

    /// First date to monitor (YYYY-MM-DD, default: today)
    #[arg(long, value_name = "YYYY-MM-DD")]
    start_date: Option<String>,

    /// Explicit comma-separated dates, overrides --start-date/--days-ahead
    #[arg(long, value_name = "YYYY-MM-DD,...")]
    dates: Option<String>,

    /// Only slots starting inside this window, e.g. 17-22 or 17:30-21:00
    #[arg(long, value_name = "START-END")]
    between: Option<String>,

    /// Seconds between checks
    #[arg(long)]
    interval_seconds: Option<u64>,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Facilities named on the command line, or all active ones.
fn resolve_facilities(config: &Config, names: &[String]) -> Result<Vec<Facility>> {
    if names.is_empty() {
        return Ok(config.active_facilities().cloned().collect());
    }

    let mut selected: Vec<Facility> = Vec::new();
    for name in names {
        let facility = config.find_facility(name).ok_or_else(|| {
            let known: Vec<&str> = config.facilities.iter().map(|f| f.name.as_str()).collect();
            AppError::config(format!(
                "Unknown facility '{}'. Available: {}",
                name,
                known.join(", ")
            ))
        })?;
        if !facility.active {
            log::warn!("Facility '{}' is marked inactive, monitoring anyway", facility.name);
        }
        if !selected.contains(facility) {
            selected.push(facility.clone());
        }
    }
    Ok(selected)
}

fn resolve_dates(config: &Config, args: &MonitorArgs, today: NaiveDate) -> Result<Vec<NaiveDate>> {
    if let Some(dates) = &args.dates {
        return parse_dates_list(dates);
    }
    let start = match &args.start_date {
        Some(text) => parse_date(text)?,
        None => today,
    };
    Ok(date_range(
        start,
        args.days_ahead.unwrap_or(config.monitor.days_ahead),
    ))
}

fn build_dispatch(config: &Config) -> NotifierDispatch {
    let sender = SmtpSender::new(config.email.clone());
    let recipients = sender.recipients();

    NotifierDispatch::new(
        NotifyPolicy::from_config(config),
        select_notifier(config.notify.desktop),
        select_renderer(&config.notify.template_dir),
    )
    .with_email(Box::new(sender), recipients)
    .with_facilities(config.facilities.clone(), config.fetcher.clone())
    .with_quotes(config.notify.quotes_file.clone())
}

async fn monitor(config: &Config, args: MonitorArgs, quiet: bool) -> Result<()> {
    let today = Local::now().date_naive();
    let facilities = resolve_facilities(config, &args.facilities)?;
    let dates = resolve_dates(config, &args, today)?;
    let window = args
        .between
        .as_deref()
        .or(config.monitor.between.as_deref())
        .map(TimeWindow::parse)
        .transpose()?;
    let interval = normalize_interval(
        args.interval_seconds
            .unwrap_or(config.monitor.interval_secs),
    );

    let targets = pipeline::build_targets(&facilities, &dates);
    let fetcher = MatchiFetcher::new(config.fetcher.clone())?;
    let mut poll = PollLoop::new(
        targets,
        window,
        interval,
        Box::new(fetcher),
        build_dispatch(config),
    )?
    .quiet(quiet);

    if !quiet {
        let names: Vec<String> = facilities.iter().map(Facility::display_name).collect();
        console::legend(&names, &dates, window.as_ref(), poll.interval());
    }
    if config.email.enabled && !config.email.is_valid() {
        log::warn!("Email is enabled but the SMTP configuration is incomplete");
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        log::info!("Stop signal received, press Ctrl+C again to quit immediately");
        let _ = stop_tx.send(true);

        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Second stop signal, exiting");
            std::process::exit(130);
        }
    });

    log::info!(
        "Monitoring {} facilities on {} dates",
        facilities.len(),
        dates.len()
    );
    poll.run(stop_rx).await;
    Ok(())
}

fn confirm(prompt: &str) -> Result<()> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(())
}

fn list_facilities(config: &Config) {
    console::header("Facilities");
    for facility in config.active_facilities() {
        console::sub_item(&format!("{:<20} id {}", facility.display_name(), facility.id));
    }

    let inactive: Vec<&Facility> = config.inactive_facilities().collect();
    if !inactive.is_empty() {
        console::separator();
        console::sub_item("Inactive:");
        for facility in inactive {
            let note = facility.note.as_deref().unwrap_or("");
            console::sub_item(&format!(
                "{:<20} id {} {}",
                facility.display_name(),
                facility.id,
                note
            ));
        }
    }
}

/// Main entry point for the CLI application.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    config.email.apply_env();
    log::debug!("Loaded configuration from {}", cli.config.display());

    match cli.command.unwrap_or(Command::Monitor(MonitorArgs::default())) {
        Command::Monitor(args) => {
            config.validate()?;
            monitor(&config, args, cli.quiet).await?;
        }

        Command::TestNotifications { yes } => {
            console::header("Desktop Notification Test");
            if !yes {
                confirm("Press Enter to send three test notifications...")?;
            }
            let notifier = select_notifier(config.notify.desktop);
            let shown =
                pipeline::run_test_notifications(notifier.as_ref(), pipeline::TEST_TOAST_PAUSE)
                    .await;
            log::info!("{} of 3 test notifications shown", shown);
        }

        Command::TestEmail => {
            console::header("Email Test");
            let dispatch = build_dispatch(&config);
            match pipeline::run_test_email(&dispatch).await {
                Ok(()) => log::info!("Test email sent to {}", config.email.to),
                Err(e) => {
                    log::error!("Test email failed: {}", e);
                    return Err(e);
                }
            }
        }

        Command::Validate => {
            log::info!("Validating {}...", cli.config.display());
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            if config.email.enabled {
                if config.email.is_valid() {
                    log::info!("✓ Email OK ({} recipients)", config.email.recipients().len());
                } else {
                    log::warn!("Email is enabled but the SMTP configuration is incomplete");
                }
            }
        }

        Command::Facilities => list_facilities(&config),
    }

    Ok(())
}
