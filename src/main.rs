#![forbid(unsafe_code)]

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use ontime::config::{summary, Settings, SettingsStore};
use ontime::constants::{labels, tracking::DEFAULT_STATS_DAYS};
use ontime::convention::{self, CalculationConvention, Jurisprudence, ParameterBundle};
use ontime::driver::{DriverInputs, LiveStatus, LiveTracker, SystemClock};
use ontime::ephemeris::{Ephemeris, SolarEphemeris};
use ontime::persistence::FileStore;
use ontime::reminders;
use ontime::schedule::{self, DaySchedule};
use ontime::tracker;
use ontime::tracking::{PrayerLog, TrackingStatus};
use ontime::travel::{self, JamaPair, TravelOverride, TravelState};
use ontime::types::{Location, PrayerName};

#[derive(Parser)]
#[command(name = "ontime", version, about = "Prayer times, travel adjustments and reminders")]
struct Cli {
    /// Latitude of the current location (defaults to the home base)
    #[arg(long, global = true, allow_hyphen_values = true, requires = "lon")]
    lat: Option<String>,
    /// Longitude of the current location
    #[arg(long, global = true, allow_hyphen_values = true, requires = "lat")]
    lon: Option<String>,
    /// City name for a manual location
    #[arg(long, global = true)]
    city: Option<String>,
    /// Calendar day (YYYY-MM-DD), defaults to today
    #[arg(long, global = true)]
    date: Option<NaiveDate>,
    /// Calculation method for this run only
    #[arg(long, global = true)]
    method: Option<CalculationConvention>,
    /// Asr jurisprudence for this run only (standard or hanafi)
    #[arg(long, global = true)]
    madhab: Option<Jurisprudence>,
    /// Directory holding settings and tracking data
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Prayer times for the day
    Times,
    /// Current and next prayer with the time remaining
    Next,
    /// Live countdown until interrupted
    Watch,
    /// Travel status relative to the home base
    Travel,
    /// Bearing to the Kaaba
    Qibla,
    /// Reminders still to come today
    Reminders,
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Mark a prayer as prayed on time, missed, or untracked
    Track {
        prayer: PrayerName,
        status: TrackingStatus,
    },
    /// On-time statistics for recent days
    Stats {
        #[arg(long, default_value_t = DEFAULT_STATS_DAYS)]
        days: i64,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print settings and their summaries
    Show,
    SetMethod { method: CalculationConvention },
    SetMadhab { madhab: Jurisprudence },
    /// Use --lat/--lon (and --city) as the home base
    SetHome,
    ClearHome,
    /// auto, force_on or force_off
    TravelOverride { mode: TravelOverride },
    ToggleTravel,
    /// dhuhr-asr or maghrib-isha
    ToggleJama { pair: JamaPair },
}

struct App {
    settings: SettingsStore<FileStore>,
    tracking_store: FileStore,
    manual: Option<Location>,
    method: CalculationConvention,
    bundle: ParameterBundle,
    today: NaiveDate,
    date: NaiveDate,
}

impl App {
    fn new(cli: &Cli) -> Result<Self> {
        let store = match &cli.store_dir {
            Some(dir) => FileStore::new(dir.clone()),
            None => FileStore::open_default(),
        };
        info!(dir = %store.dir().display(), "Using data directory");
        let settings = SettingsStore::load(store.clone());

        let manual = match (&cli.lat, &cli.lon) {
            (Some(lat), Some(lon)) => Some(
                Location::manual(lat, lon, cli.city.as_deref().unwrap_or(""))
                    .context("Invalid --lat/--lon")?,
            ),
            _ => None,
        };

        let s = settings.settings();
        let method = cli.method.unwrap_or(s.calculation_method);
        let bundle = convention::resolve(method, cli.madhab.unwrap_or(s.asr_calculation));
        let today = Local::now().date_naive();

        Ok(Self {
            settings,
            tracking_store: store,
            manual,
            method,
            bundle,
            today,
            date: cli.date.unwrap_or(today),
        })
    }

    /// Manual location if given, else the home base
    fn location(&self) -> Result<Location> {
        self.manual
            .clone()
            .or_else(|| self.settings.settings().travel.home_base.clone())
            .ok_or_else(|| anyhow!("No location: pass --lat and --lon, or set a home base"))
    }

    fn schedule(&self, location: &Location, date: NaiveDate) -> Result<DaySchedule> {
        schedule::build(&SolarEphemeris, &location.coordinates, date, &self.bundle)
            .with_context(|| format!("Failed to build schedule for {}", location.city_name))
    }

    fn travel_state(&self, location: &Location) -> TravelState {
        travel::evaluate(&self.settings.settings().travel, &location.coordinates, Utc::now())
    }
}

fn print_times(app: &App) -> Result<()> {
    let location = app.location()?;
    let schedule = app.schedule(&location, app.date)?;
    let travel = app.travel_state(&location);

    println!(
        "{} ({}) on {} using {}",
        location.city_name, location.coordinates, app.date, app.method
    );
    for prayer in schedule.visible(&app.settings.settings().optional_prayers) {
        let local = prayer.timestamp.with_timezone(&Local);
        let rakah = travel::rakah_count(prayer.name, &travel)
            .map(|n| format!("{n} rak'ah"))
            .unwrap_or_default();
        println!("  {:<16} {}  {rakah}", prayer.name.label(), local.format("%H:%M"));
    }
    if travel.is_traveling {
        println!("Traveling: Dhuhr, Asr and Isha are shortened to 2 rak'ah");
    }
    Ok(())
}

fn print_next(app: &App) -> Result<()> {
    let location = app.location()?;
    let schedule = app.schedule(&location, app.today)?;
    let status = tracker::status_at(&SolarEphemeris, &schedule, &app.bundle, Utc::now(), &Local)?;

    match status.current_prayer {
        Some(current) => println!("Current: {current}"),
        None => println!("Current: none"),
    }
    println!(
        "Next:    {} at {} (in {})",
        status.next_prayer,
        status.next_prayer_instant.with_timezone(&Local).format("%H:%M"),
        status.countdown()
    );
    Ok(())
}

async fn watch(app: &App) -> Result<()> {
    let location = app.location()?;
    let live = LiveTracker::spawn(
        Arc::new(SolarEphemeris),
        Arc::new(SystemClock),
        Local,
        DriverInputs {
            coordinates: location.coordinates,
            bundle: app.bundle,
        },
    );
    let mut rx = live.subscribe();
    let mut stdout = std::io::stdout();

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                match &*rx.borrow_and_update() {
                    LiveStatus::Ready { status, .. } => {
                        let current = status
                            .current_prayer
                            .map(|p| p.label())
                            .unwrap_or("-");
                        print!("\r{current} | {} in {}   ", status.next_prayer, status.countdown());
                    }
                    LiveStatus::Unavailable(e) => print!("\r{e}   "),
                    LiveStatus::Starting => {}
                }
                stdout.flush().context("Failed to write to stdout")?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    println!();
    live.shutdown().await;
    Ok(())
}

fn print_travel(app: &App) -> Result<()> {
    let location = app.location()?;
    let settings = app.settings.settings();
    let state = app.travel_state(&location);

    println!("Travel: {}", summary::travel_summary(settings, &state));
    if let Some(distance) = summary::distance_summary(&state) {
        println!("{distance}");
    }
    if state.is_traveling {
        let how = if state.is_auto_detected { "detected by distance" } else { "set manually" };
        println!("Traveling ({how})");
        for prayer in PrayerName::OBLIGATORY {
            if let Some(n) = travel::rakah_count(prayer, &state) {
                println!("  {:<8} {n} rak'ah", prayer.label());
            }
        }
        println!("  Combine Dhuhr & Asr:   {}", state.jama_dhuhr_asr);
        println!("  Combine Maghrib & Isha: {}", state.jama_maghrib_isha);
        println!("  Sunnah kept: Fajr sunnah, Witr");
    }
    Ok(())
}

fn print_qibla(app: &App) -> Result<()> {
    let location = app.location()?;
    let bearing = SolarEphemeris.qibla_bearing(&location.coordinates);
    println!("Qibla from {}: {bearing:.1}° from north", location.city_name);
    Ok(())
}

fn print_reminders(app: &App) -> Result<()> {
    let location = app.location()?;
    let schedule = app.schedule(&location, app.date)?;
    let planned =
        reminders::plan_reminders(&schedule, app.settings.settings(), Utc::now(), &Local);
    if planned.is_empty() {
        println!("No reminders left for {}", app.date);
    }
    for reminder in planned {
        println!(
            "  {}  {}  [{}]",
            reminder.fire_at.with_timezone(&Local).format("%H:%M"),
            reminder.title,
            reminder.sound
        );
    }
    Ok(())
}

fn print_settings(settings: &Settings, app: &App) -> Result<()> {
    let json = serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
    println!("{json}");
    println!();
    println!("Calculation:   {}", summary::calculation_summary(settings));
    println!("Jumu'ah:       {}", summary::jumuah_summary(settings));
    println!("Notifications: {}", summary::notifications_summary(settings));
    if let Ok(location) = app.location() {
        println!("Location:      {}", summary::location_summary(&location));
        let state = app.travel_state(&location);
        println!("Travel:        {}", summary::travel_summary(settings, &state));
        if let Some(distance) = summary::distance_summary(&state) {
            println!("               {distance}");
        }
    } else {
        println!("Travel:        {}", if settings.travel.enabled { labels::ENABLED } else { labels::OFF });
    }
    Ok(())
}

fn settings_command(app: &mut App, action: SettingsAction) -> Result<()> {
    match action {
        SettingsAction::Show => {}
        SettingsAction::SetMethod { method } => {
            app.settings.update_calculation_method(method);
        }
        SettingsAction::SetMadhab { madhab } => {
            app.settings.update_jurisprudence(madhab);
        }
        SettingsAction::SetHome => {
            let home = app
                .manual
                .clone()
                .ok_or_else(|| anyhow!("set-home needs --lat and --lon"))?;
            app.settings.set_home_base(home);
        }
        SettingsAction::ClearHome => {
            app.settings.clear_home_base();
        }
        SettingsAction::TravelOverride { mode } => {
            app.settings.set_travel_override(mode, Utc::now());
        }
        SettingsAction::ToggleTravel => {
            app.settings.toggle_travel_enabled(Utc::now());
        }
        SettingsAction::ToggleJama { pair } => {
            app.settings.toggle_jama(pair);
        }
    }
    print_settings(app.settings.settings(), app)
}

fn track(app: &App, prayer: PrayerName, status: TrackingStatus) -> Result<()> {
    let mut log = PrayerLog::open(app.tracking_store.clone());
    log.track(prayer, status, app.date, app.today, Utc::now());
    println!("{prayer} on {}: {:?}", app.date, log.status(prayer, app.date));
    Ok(())
}

fn print_stats(app: &App, days: i64) -> Result<()> {
    let log = PrayerLog::open(app.tracking_store.clone());
    let stats = log.stats(app.today, days);
    println!(
        "Last {days} days: {} on time, {} missed ({}%)",
        stats.on_time, stats.missed, stats.percentage
    );
    for day in log.recent_records(app.today, days) {
        let marks: Vec<String> = PrayerName::OBLIGATORY
            .into_iter()
            .map(|p| match day.prayers.get(&p) {
                Some(TrackingStatus::OnTime) => format!("{p}:✓"),
                Some(TrackingStatus::Missed) => format!("{p}:✗"),
                _ => format!("{p}:-"),
            })
            .collect();
        println!("  {}  {}", day.date, marks.join(" "));
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    let cli = Cli::parse();
    let mut app = App::new(&cli)?;

    match cli.command {
        Command::Times => print_times(&app),
        Command::Next => print_next(&app),
        Command::Watch => watch(&app).await,
        Command::Travel => print_travel(&app),
        Command::Qibla => print_qibla(&app),
        Command::Reminders => print_reminders(&app),
        Command::Settings { action } => settings_command(&mut app, action),
        Command::Track { prayer, status } => track(&app, prayer, status),
        Command::Stats { days } => print_stats(&app, days),
    }
}
