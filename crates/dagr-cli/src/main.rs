//! dagr CLI - Task-Graph Project Planner
//!
//! Command shell over the DAGr engines: state lives in `dagr.json` in
//! the working directory, every command loads it, runs the pure engines,
//! renders, and (for mutations) saves back atomically.

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dagr_core::{
    Project, ProjectConfig, StatusKind, TaskDraft, TaskId, TaskPatch, Warning,
};
use dagr_render::{
    critical_path_table, daily_view, html_page, list_table, mermaid_graph, next_view,
    schedule_csv, schedule_table, show_task, status_dashboard, CriticalSort,
};
use dagr_solver::Analysis;
use dagr_store::{parse_payload, resolve_payload, StateFile, STATE_FILE};

#[derive(Parser)]
#[command(name = "dagr")]
#[command(author, version, about = "Task-graph project planner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create dagr.json in the current directory
    Init {
        /// Project start date (default: today)
        #[arg(long, value_name = "DATE")]
        start: Option<String>,

        /// Working hours per day
        #[arg(long, default_value = "8.0")]
        hours_per_day: f64,

        /// Time the working day begins (HH:MM)
        #[arg(long, default_value = "09:00", value_name = "TIME")]
        day_start: String,

        /// Schedule work on Saturdays and Sundays too
        #[arg(long)]
        work_weekends: bool,
    },

    /// Add a task
    Add {
        /// Task name
        name: String,

        /// Estimated working hours
        #[arg(long, visible_alias = "hrs")]
        hours: f64,

        /// Dependency task id (repeatable)
        #[arg(long = "dep", value_name = "ID")]
        deps: Vec<String>,

        /// Deadline date (end of that working day)
        #[arg(long, value_name = "DATE")]
        deadline: Option<String>,

        /// Earliest date the task may begin
        #[arg(long, value_name = "DATE")]
        proposed_start: Option<String>,

        /// Runs unattended in the background stream
        #[arg(long)]
        background: bool,

        /// Side-quest outside the primary schedule
        #[arg(long)]
        flexible: bool,

        /// Project label (for filtering)
        #[arg(long)]
        project: Option<String>,

        /// Tag (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// List tasks
    List {
        /// Only tasks with this project label
        #[arg(long)]
        project: Option<String>,
    },

    /// Update fields of a task
    Update {
        /// Task id (T-<n>)
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long, visible_alias = "hrs")]
        hours: Option<f64>,

        #[arg(long, value_name = "DATE", conflicts_with = "no_deadline")]
        deadline: Option<String>,

        /// Clear the deadline
        #[arg(long)]
        no_deadline: bool,

        #[arg(long, value_name = "DATE", conflicts_with = "no_proposed_start")]
        proposed_start: Option<String>,

        /// Clear the proposed start
        #[arg(long)]
        no_proposed_start: bool,

        #[arg(long, value_name = "BOOL")]
        background: Option<bool>,

        #[arg(long, value_name = "BOOL")]
        flexible: Option<bool>,

        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Add a dependency (repeatable; cycles are rejected)
        #[arg(long = "add-dep", value_name = "ID")]
        add_deps: Vec<String>,

        /// Remove a dependency (repeatable)
        #[arg(long = "rm-dep", value_name = "ID")]
        rm_deps: Vec<String>,

        /// Add a tag (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        add_tags: Vec<String>,

        /// Remove a tag (repeatable)
        #[arg(long = "rm-tag", value_name = "TAG")]
        rm_tags: Vec<String>,
    },

    /// Delete a task (other tasks' dependencies are scrubbed)
    Delete {
        id: String,
    },

    /// Show one task in detail
    Show {
        id: String,
    },

    /// Mark a task in progress (records the actual start)
    Start {
        id: String,
    },

    /// Mark a task done (records the actual finish)
    Done {
        id: String,
    },

    /// Reset a task to not started, clearing actual timestamps
    Reset {
        id: String,
    },

    /// Set a task's status directly
    SetStatus {
        id: String,
        /// One of: not_started, in_progress, done
        status: String,
    },

    /// Bulk-import tasks from a JSON payload
    Import {
        /// Payload file ({"tasks": [...]})
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print the resource-leveled schedule
    Schedule {
        /// Hide completed work
        #[arg(long)]
        remaining: bool,

        /// Emit CSV instead of a table
        #[arg(long)]
        csv: bool,
    },

    /// Print the CPM table and the critical path
    CriticalPath {
        /// Row order: chrono or chain
        #[arg(long, default_value = "chrono")]
        sort: String,
    },

    /// Project dashboard: counts, projection, at-risk tasks
    Status,

    /// What to work on now, plus the dopamine menu
    Next,

    /// Today's plan
    Today,

    /// Per-day plan for the coming days
    Daily {
        /// Number of days to show
        #[arg(short = 'n', long = "days", default_value = "7")]
        days: usize,
    },

    /// Set (or clear) a capacity override for a date
    Capacity {
        /// Date of the override
        #[arg(value_name = "DATE")]
        date: String,

        /// Working-hour capacity; 0 for a day off
        #[arg(value_name = "HOURS", required_unless_present = "clear")]
        hours: Option<f64>,

        /// Remove the override instead
        #[arg(long)]
        clear: bool,
    },

    /// Print the dependency graph as Mermaid
    Viz {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the interactive HTML view
    VizHtml {
        /// Output file
        #[arg(short, long, default_value = "dagr.html")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            start,
            hours_per_day,
            day_start,
            work_weekends,
        } => cmd_init(start.as_deref(), hours_per_day, &day_start, work_weekends),
        Commands::Add {
            name,
            hours,
            deps,
            deadline,
            proposed_start,
            background,
            flexible,
            project,
            tags,
            notes,
        } => cmd_add(
            &name,
            hours,
            &deps,
            deadline.as_deref(),
            proposed_start.as_deref(),
            background,
            flexible,
            project,
            tags,
            notes,
        ),
        Commands::List { project } => cmd_list(project.as_deref()),
        Commands::Update {
            id,
            name,
            hours,
            deadline,
            no_deadline,
            proposed_start,
            no_proposed_start,
            background,
            flexible,
            project,
            notes,
            add_deps,
            rm_deps,
            add_tags,
            rm_tags,
        } => cmd_update(UpdateArgs {
            id,
            name,
            hours,
            deadline,
            no_deadline,
            proposed_start,
            no_proposed_start,
            background,
            flexible,
            project,
            notes,
            add_deps,
            rm_deps,
            add_tags,
            rm_tags,
        }),
        Commands::Delete { id } => cmd_delete(&id),
        Commands::Show { id } => cmd_show(&id),
        Commands::Start { id } => cmd_status_change(&id, StatusKind::InProgress),
        Commands::Done { id } => cmd_status_change(&id, StatusKind::Done),
        Commands::Reset { id } => cmd_status_change(&id, StatusKind::NotStarted),
        Commands::SetStatus { id, status } => {
            let kind: StatusKind = status.parse()?;
            cmd_status_change(&id, kind)
        }
        Commands::Import { file } => cmd_import(&file),
        Commands::Schedule { remaining, csv } => cmd_schedule(remaining, csv),
        Commands::CriticalPath { sort } => cmd_critical_path(&sort),
        Commands::Status => cmd_status(),
        Commands::Next => cmd_next(),
        Commands::Today => cmd_daily(1, true),
        Commands::Daily { days } => cmd_daily(days, false),
        Commands::Capacity { date, hours, clear } => cmd_capacity(&date, hours, clear),
        Commands::Viz { output } => cmd_viz(output.as_deref()),
        Commands::VizHtml { output } => cmd_viz_html(&output),
    }
}

// =============================================================================
// State plumbing
// =============================================================================

fn state_path() -> PathBuf {
    PathBuf::from(STATE_FILE)
}

fn load_state() -> Result<StateFile> {
    let (state, warnings) = StateFile::load(&state_path())?;
    print_warnings(&warnings);
    Ok(state)
}

fn save_state(state: &StateFile) -> Result<()> {
    state.save(&state_path())?;
    Ok(())
}

fn print_warnings(warnings: &[Warning]) {
    for warning in warnings {
        eprintln!("warning: {warning}");
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("'{value}' is not a YYYY-MM-DD date"))
}

fn parse_id(value: &str) -> Result<TaskId> {
    Ok(value.parse::<TaskId>()?)
}

fn analyze(project: &Project) -> Result<Analysis> {
    Ok(Analysis::run(project, now())?)
}

// =============================================================================
// Commands
// =============================================================================

fn cmd_init(
    start: Option<&str>,
    hours_per_day: f64,
    day_start: &str,
    work_weekends: bool,
) -> Result<()> {
    if state_path().exists() {
        bail!("{STATE_FILE} already exists here");
    }
    let start_date = match start {
        Some(s) => parse_date(s)?,
        None => Local::now().date_naive(),
    };
    let day_start = NaiveTime::parse_from_str(day_start, "%H:%M")
        .with_context(|| format!("'{day_start}' is not a HH:MM time"))?;

    let mut config = ProjectConfig::new(start_date);
    config.hours_per_day = hours_per_day;
    config.day_start = day_start;
    config.start = start_date.and_time(day_start);
    config.skip_weekends = !work_weekends;
    config.validate()?;

    let state = StateFile::new(Project::new(config));
    save_state(&state)?;
    println!("Initialized {STATE_FILE} (start {start_date}, {hours_per_day}h/day)");
    Ok(())
}

fn cmd_add(
    name: &str,
    hours: f64,
    deps: &[String],
    deadline: Option<&str>,
    proposed_start: Option<&str>,
    background: bool,
    flexible: bool,
    project_label: Option<String>,
    tags: Vec<String>,
    notes: Option<String>,
) -> Result<()> {
    let mut state = load_state()?;

    let mut depends_on = BTreeSet::new();
    for dep in deps {
        depends_on.insert(parse_id(dep)?);
    }
    let draft = TaskDraft {
        name: name.to_string(),
        duration_hours: hours,
        depends_on,
        deadline: deadline.map(parse_date).transpose()?,
        proposed_start: proposed_start.map(parse_date).transpose()?,
        background,
        flexible,
        project: project_label.unwrap_or_default(),
        tags: tags.into_iter().collect(),
        notes: notes.unwrap_or_default(),
    };

    let (id, warnings) = state.project.add_task(draft)?;
    print_warnings(&warnings);
    save_state(&state)?;
    println!("Added {id} {name}");
    Ok(())
}

fn cmd_list(project_label: Option<&str>) -> Result<()> {
    let state = load_state()?;
    print!("{}", list_table(&state.project, project_label));
    Ok(())
}

struct UpdateArgs {
    id: String,
    name: Option<String>,
    hours: Option<f64>,
    deadline: Option<String>,
    no_deadline: bool,
    proposed_start: Option<String>,
    no_proposed_start: bool,
    background: Option<bool>,
    flexible: Option<bool>,
    project: Option<String>,
    notes: Option<String>,
    add_deps: Vec<String>,
    rm_deps: Vec<String>,
    add_tags: Vec<String>,
    rm_tags: Vec<String>,
}

fn cmd_update(args: UpdateArgs) -> Result<()> {
    let mut state = load_state()?;
    let id = parse_id(&args.id)?;

    let deadline = if args.no_deadline {
        Some(None)
    } else {
        args.deadline.as_deref().map(parse_date).transpose()?.map(Some)
    };
    let proposed_start = if args.no_proposed_start {
        Some(None)
    } else {
        args.proposed_start
            .as_deref()
            .map(parse_date)
            .transpose()?
            .map(Some)
    };

    let patch = TaskPatch {
        name: args.name,
        duration_hours: args.hours,
        deadline,
        proposed_start,
        background: args.background,
        flexible: args.flexible,
        project: args.project,
        notes: args.notes,
        replace_deps: None,
        add_deps: args
            .add_deps
            .iter()
            .map(|s| parse_id(s))
            .collect::<Result<_>>()?,
        rm_deps: args
            .rm_deps
            .iter()
            .map(|s| parse_id(s))
            .collect::<Result<_>>()?,
        add_tags: args.add_tags,
        rm_tags: args.rm_tags,
    };
    if patch.is_empty() {
        bail!("nothing to update; pass at least one field flag");
    }

    let warnings = state.project.update_task(id, patch)?;
    print_warnings(&warnings);
    save_state(&state)?;
    println!("Updated {id}");
    Ok(())
}

fn cmd_delete(id: &str) -> Result<()> {
    let mut state = load_state()?;
    let id = parse_id(id)?;
    state.project.delete_task(id)?;
    save_state(&state)?;
    println!("Deleted {id}");
    Ok(())
}

fn cmd_show(id: &str) -> Result<()> {
    let state = load_state()?;
    let id = parse_id(id)?;
    let analysis = analyze(&state.project)?;
    print!("{}", show_task(&state.project, &analysis, id)?);
    Ok(())
}

fn cmd_status_change(id: &str, kind: StatusKind) -> Result<()> {
    let mut state = load_state()?;
    let id = parse_id(id)?;
    let warnings = state.project.set_status(id, kind, now())?;
    print_warnings(&warnings);
    save_state(&state)?;
    let verb = match kind {
        StatusKind::NotStarted => "Reset",
        StatusKind::InProgress => "Started",
        StatusKind::Done => "Finished",
    };
    println!("{verb} {id}");
    Ok(())
}

fn cmd_import(file: &Path) -> Result<()> {
    let mut state = load_state()?;
    let raw = fs::read_to_string(file)
        .with_context(|| format!("failed to read '{}'", file.display()))?;
    let payload = parse_payload(&raw)?;
    let ops = resolve_payload(&state.project, &payload)?;
    let (ids, warnings) = state.project.import_merge(ops)?;
    print_warnings(&warnings);
    save_state(&state)?;
    println!(
        "Imported {} task(s): {}",
        ids.len(),
        ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    );
    Ok(())
}

fn cmd_schedule(remaining: bool, csv: bool) -> Result<()> {
    let state = load_state()?;
    let analysis = analyze(&state.project)?;
    if csv {
        print!("{}", schedule_csv(&state.project, &analysis, remaining));
    } else {
        print!("{}", schedule_table(&state.project, &analysis, remaining));
    }
    Ok(())
}

fn cmd_critical_path(sort: &str) -> Result<()> {
    let state = load_state()?;
    let sort: CriticalSort = sort.parse()?;
    let analysis = analyze(&state.project)?;
    print!("{}", critical_path_table(&state.project, &analysis, sort));
    Ok(())
}

fn cmd_status() -> Result<()> {
    let state = load_state()?;
    let analysis = analyze(&state.project)?;
    let risks = analysis.at_risk(&state.project)?;
    print!("{}", status_dashboard(&state.project, &analysis, &risks));
    Ok(())
}

fn cmd_next() -> Result<()> {
    let state = load_state()?;
    let analysis = analyze(&state.project)?;
    let report = analysis.next_report(&state.project);
    print!("{}", next_view(&state.project, &report));
    Ok(())
}

fn cmd_daily(days: usize, today_only: bool) -> Result<()> {
    let state = load_state()?;
    let analysis = analyze(&state.project)?;
    let from = Local::now().date_naive();
    let count = if today_only { 1 } else { days };
    print!("{}", daily_view(&state.project, &analysis, from, count));
    Ok(())
}

fn cmd_capacity(date: &str, hours: Option<f64>, clear: bool) -> Result<()> {
    let mut state = load_state()?;
    let date = parse_date(date)?;
    let hours = if clear { None } else { hours };
    state.project.set_capacity_override(date, hours)?;
    save_state(&state)?;
    match hours {
        Some(h) => println!("Capacity for {date} set to {h}h"),
        None => println!("Capacity override for {date} cleared"),
    }
    Ok(())
}

fn cmd_viz(output: Option<&Path>) -> Result<()> {
    let state = load_state()?;
    let analysis = analyze(&state.project)?;
    let graph = mermaid_graph(&state.project, &analysis);
    match output {
        Some(path) => {
            fs::write(path, graph)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{graph}"),
    }
    Ok(())
}

fn cmd_viz_html(output: &Path) -> Result<()> {
    let state = load_state()?;
    let analysis = analyze(&state.project)?;
    let page = html_page(&state.project, &analysis, "DAGr plan");
    fs::write(output, page)
        .with_context(|| format!("failed to write '{}'", output.display()))?;
    println!("Wrote {}", output.display());
    Ok(())
}
