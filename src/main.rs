//! Indicator Tracker CLI
//!
//! Thin command-line front end over the service layer. Every command prints
//! JSON so forms or dashboards can drive it.
//!
//! ## Usage
//!
//! ```bash
//! # Quantitative indicator
//! indicator-tracker indicator create --year 2024 --name "Trained staff" --target 200 --actual 50
//!
//! # Milestone-based indicator with one milestone and one activity
//! indicator-tracker indicator create --year 2024 --name "Portal" --has-milestones
//! indicator-tracker milestone create 1 --name "Launch" --owner maria
//! indicator-tracker activity create 1 --description "Design forms" --owner maria
//!
//! # Monthly report (defaults to the current month)
//! indicator-tracker --user maria report submit milestone 1 40
//! indicator-tracker report history milestone 1
//!
//! # Hierarchy view
//! indicator-tracker indicator show 1
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Args as ClapArgs, Parser, Subcommand};
use indicator_tracker::db::{CreateActivityInput, CreateIndicatorInput, CreateMilestoneInput, IndicatorFilter};
use indicator_tracker::services::ProgressUpdate;
use indicator_tracker::{
    Config, EntityKind, Month, Percentage, ReportOutcome, Services, Status, TrackerDb, TrackerError,
};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "indicator-tracker")]
#[command(about = "Monthly progress ledger for organizational indicators")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// User recorded on submitted reports
    #[arg(long, env = "INDICATOR_TRACKER_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage indicators
    Indicator {
        #[command(subcommand)]
        cmd: IndicatorCmd,
    },
    /// Manage milestones
    Milestone {
        #[command(subcommand)]
        cmd: MilestoneCmd,
    },
    /// Manage activities
    Activity {
        #[command(subcommand)]
        cmd: ActivityCmd,
    },
    /// Monthly progress reports
    Report {
        #[command(subcommand)]
        cmd: ReportCmd,
    },
    /// Dashboard totals
    Stats,
    /// Items assigned to an owner and whether they were reported this month
    Workload {
        owner: String,
        #[arg(long)]
        month: Option<Month>,
    },
}

#[derive(Subcommand, Debug)]
enum IndicatorCmd {
    Create(CreateIndicatorArgs),
    List {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        area: Option<String>,
        #[arg(long)]
        org_unit: Option<String>,
        #[arg(long)]
        indicator_type: Option<String>,
        #[arg(long)]
        status: Option<Status>,
        #[arg(long)]
        owner: Option<String>,
    },
    /// Indicator with milestones and activities
    Show { id: i64 },
    Delete { id: i64 },
    /// Update actual/target of a quantitative indicator
    Progress {
        id: i64,
        #[arg(long)]
        actual: Option<f64>,
        #[arg(long)]
        target: Option<String>,
    },
    /// Rebuild the cached rollup
    Recompute { id: i64 },
}

#[derive(ClapArgs, Debug)]
struct CreateIndicatorArgs {
    #[arg(long)]
    year: i32,
    #[arg(long)]
    name: String,
    #[arg(long)]
    strategic_id: Option<String>,
    #[arg(long)]
    org_unit: Option<String>,
    #[arg(long)]
    collaborating_unit: Option<String>,
    #[arg(long)]
    area: Option<String>,
    #[arg(long)]
    strategic_line: Option<String>,
    #[arg(long)]
    indicator_type: Option<String>,
    /// Free-text target; non-numeric targets yield zero progress
    #[arg(long)]
    target: Option<String>,
    #[arg(long)]
    measure: Option<String>,
    #[arg(long)]
    actual: Option<f64>,
    #[arg(long)]
    has_milestones: bool,
    #[arg(long)]
    owner: Option<String>,
    #[arg(long)]
    start_date: Option<NaiveDate>,
    #[arg(long)]
    original_end_date: Option<NaiveDate>,
    #[arg(long)]
    current_end_date: Option<NaiveDate>,
}

#[derive(Subcommand, Debug)]
enum MilestoneCmd {
    Create {
        indicator_id: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        start_date: Option<NaiveDate>,
        #[arg(long)]
        planned_end_date: Option<NaiveDate>,
        #[arg(long)]
        ordinal: Option<i64>,
        /// Progress assumed until the first report
        #[arg(long, default_value_t = 0)]
        seed: i64,
    },
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
enum ActivityCmd {
    Create {
        milestone_id: i64,
        #[arg(long)]
        description: String,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        planned_start_date: Option<NaiveDate>,
        #[arg(long)]
        planned_end_date: Option<NaiveDate>,
    },
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
enum ReportCmd {
    Submit {
        kind: EntityKind,
        id: i64,
        percentage: i64,
        /// Defaults to the current month
        #[arg(long)]
        month: Option<Month>,
    },
    Latest { kind: EntityKind, id: i64 },
    History { kind: EntityKind, id: i64 },
    /// All reports filed for a month
    Month { month: Month },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), TrackerError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("indicator_tracker=info".parse()?),
        )
        .init();

    let args = Args::parse();

    // Load config
    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)?
    } else {
        Config::default()
    };

    // Apply CLI overrides
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if args.user.is_some() {
        config.default_user = args.user;
    }

    std::fs::create_dir_all(&config.storage_dir)?;
    let db = Arc::new(TrackerDb::open(&config.database_path())?);
    let services = Services::new(db.clone());

    match args.command {
        Command::Indicator { cmd } => match cmd {
            IndicatorCmd::Create(a) => {
                let id = services.indicators.create_indicator(CreateIndicatorInput {
                    year: a.year,
                    name: a.name,
                    strategic_id: a.strategic_id,
                    org_unit: a.org_unit,
                    collaborating_unit: a.collaborating_unit,
                    area: a.area,
                    strategic_line: a.strategic_line,
                    indicator_type: a.indicator_type,
                    target: a.target,
                    measure: a.measure,
                    actual: a.actual,
                    has_milestones: a.has_milestones,
                    owner: a.owner,
                    start_date: a.start_date,
                    original_end_date: a.original_end_date,
                    current_end_date: a.current_end_date,
                })?;
                print_json(&services.indicators.get(id)?)?;
            }
            IndicatorCmd::List { year, area, org_unit, indicator_type, status, owner } => {
                let filter = IndicatorFilter { year, area, org_unit, indicator_type, status, owner };
                print_json(&services.indicators.list(&filter)?)?;
            }
            IndicatorCmd::Show { id } => print_json(&services.indicators.view(id)?)?,
            IndicatorCmd::Delete { id } => {
                print_json(&json!({ "deleted": services.indicators.delete_indicator(id)? }))?
            }
            IndicatorCmd::Progress { id, actual, target } => {
                let updated = services.indicators.update_progress(id, ProgressUpdate { actual, target })?;
                print_json(&json!({ "updated": updated }))?;
            }
            IndicatorCmd::Recompute { id } => print_json(&services.indicators.recompute(id)?)?,
        },

        Command::Milestone { cmd } => match cmd {
            MilestoneCmd::Create { indicator_id, name, description, owner, start_date, planned_end_date, ordinal, seed } => {
                let id = services.indicators.create_milestone(indicator_id, CreateMilestoneInput {
                    name,
                    description,
                    owner,
                    start_date,
                    planned_end_date,
                    actual_end_date: None,
                    ordinal,
                    seed_percentage: Percentage::new(seed)?,
                })?;
                print_json(&json!({ "id": id }))?;
            }
            MilestoneCmd::Delete { id } => {
                print_json(&json!({ "deleted": services.indicators.delete_milestone(id)? }))?
            }
        },

        Command::Activity { cmd } => match cmd {
            ActivityCmd::Create { milestone_id, description, owner, planned_start_date, planned_end_date } => {
                let id = services.indicators.create_activity(milestone_id, CreateActivityInput {
                    description,
                    owner,
                    planned_start_date,
                    planned_end_date,
                    actual_date: None,
                })?;
                print_json(&json!({ "id": id }))?;
            }
            ActivityCmd::Delete { id } => {
                print_json(&json!({ "deleted": services.indicators.delete_activity(id)? }))?
            }
        },

        Command::Report { cmd } => match cmd {
            ReportCmd::Submit { kind, id, percentage, month } => {
                let outcome = services.reports.submit(kind, id, percentage, config.default_user.as_deref(), month)?;
                if outcome == ReportOutcome::AlreadyReported {
                    info!("{} {} was already reported this month", kind, id);
                }
                print_json(&json!({ "recorded": outcome.is_recorded(), "outcome": outcome }))?;
            }
            ReportCmd::Latest { kind, id } => {
                print_json(&json!({
                    "latest": services.reports.latest_report(kind, id)?,
                    "current": services.reports.current_percentage(kind, id)?,
                }))?;
            }
            ReportCmd::History { kind, id } => print_json(&services.reports.report_history(kind, id)?)?,
            ReportCmd::Month { month } => print_json(&services.reports.reports_for_month(month)?)?,
        },

        Command::Stats => {
            print_json(&json!({
                "summary": services.indicators.summary_stats()?,
                "store": db.stats()?,
            }))?;
        }

        Command::Workload { owner, month } => {
            let month = month.unwrap_or_else(Month::current);
            print_json(&services.reports.owner_workload(&owner, month)?)?;
        }
    }

    Ok(())
}
