use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Parser, Subcommand};
use dayplan::config::{load_config, PlannerConfig};
use dayplan::domain::{TaskColor, TaskItem, TaskSpec};
use dayplan::drag::{DragMachine, DropOutcome};
use dayplan::logging::init_logging;
use dayplan::notifications::LocalNotificationCenter;
use dayplan::persistence::{
    config_file, ensure_data_dir, init_local_data_dir, reminders_file, JsonFileGateway,
};
use dayplan::reminders::{ReminderScheduler, SystemClock};
use dayplan::store::TaskStore;
use dayplan::summary::{is_done, render_report};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "dayplan")]
#[command(about = "A day planner with conflict-aware rescheduling and task reminders", long_about = None)]
struct Cli {
    /// Day to work on (YYYY-MM-DD). Defaults to today.
    #[arg(short, long, global = true)]
    date: Option<String>,
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a local .dayplan directory in the current directory
    Init,
    /// Replace the day with a sample plan
    Sample,
    /// Show the day's timeline
    List,
    /// Add a task
    Add {
        title: String,
        /// Start time (HH:MM)
        #[arg(short, long)]
        at: String,
        /// Duration in minutes
        #[arg(short, long, default_value_t = 30)]
        minutes: i64,
        #[arg(long, default_value = "📝")]
        icon: String,
        /// coral, sage, sky, lavender, amber, rose, slate or night
        #[arg(long, default_value = "sage")]
        color: String,
        /// 0 (rest) to 4 (peak)
        #[arg(short, long, default_value_t = 2)]
        energy: u8,
        /// Repeats daily; completion is tracked per day
        #[arg(long)]
        routine: bool,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Move a task to a new start, pushing later tasks
    Move {
        /// Task id prefix
        task: String,
        /// New start time (HH:MM)
        at: String,
    },
    /// Drag a task to a timeline offset and drop it there
    Drag {
        /// Task id prefix
        task: String,
        /// Drop offset from the top of the timeline
        y: f64,
    },
    /// Delete a task
    Remove {
        /// Task id prefix
        task: String,
    },
    /// Manage a task's checklist
    Subtask {
        #[command(subcommand)]
        command: SubtaskCommands,
    },
    /// Toggle a task (or today's routine) done
    Done {
        /// Task id prefix
        task: String,
    },
    /// Print the day's summary report
    Summary {
        /// Also write the report to this file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Deliver reminders that are due
    Remind,
}

#[derive(Subcommand)]
enum SubtaskCommands {
    Add {
        /// Task id prefix
        task: String,
        text: String,
    },
    Toggle {
        /// Task id prefix
        task: String,
        /// 1-based position in the checklist
        index: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        let data_dir = init_local_data_dir()?;
        println!("Initialized dayplan directory: {}", data_dir.display());
        println!();
        println!("dayplan will now use this local directory for its data.");
        return Ok(());
    }

    let day = match &cli.date {
        Some(date_str) => NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .map_err(|e| anyhow!("Invalid date format. Use YYYY-MM-DD: {}", e))?,
        None => Local::now().date_naive(),
    };

    let data_dir = ensure_data_dir()?;
    let config = load_config(config_file(&data_dir))?;
    let level = if cli.verbose { "debug" } else { config.log_level.as_str() };
    if let Err(e) = init_logging(level, &data_dir) {
        eprintln!("Warning: logging disabled: {:#}", e);
    }

    if let Commands::Remind = cli.command {
        return remind(&data_dir);
    }

    let mut store = open_store(day, &data_dir, &config)?;

    match cli.command {
        Commands::Init | Commands::Remind => {}
        Commands::Sample => {
            store.load_sample_data()?;
            println!("Loaded sample plan for {}", day);
            print_timeline(&store);
        }
        Commands::List => print_timeline(&store),
        Commands::Add {
            title,
            at,
            minutes,
            icon,
            color,
            energy,
            routine,
            notes,
        } => {
            let duration = Duration::try_minutes(minutes)
                .ok_or_else(|| anyhow!("Duration of {} minutes is out of range", minutes))?;
            let mut spec = TaskSpec::new(title, parse_time(day, &at)?, duration)
                .icon(icon)
                .color(TaskColor::from_name(&color))
                .energy(energy)
                .routine(routine);
            if let Some(notes) = notes {
                spec = spec.notes(notes);
            }
            let task = store.add_task(spec)?;
            println!("Added {} {}", short_id(task.id()), describe(&task));
        }
        Commands::Move { task, at } => {
            let id = resolve_task(&store, &task)?;
            let plan = store.reschedule(id, parse_time(day, &at)?)?;
            if plan.is_noop() {
                println!("Already starts at {}", at);
            } else {
                println!("Moved {} task(s)", plan.changes().count());
                print_timeline(&store);
            }
        }
        Commands::Drag { task, y } => {
            let id = resolve_task(&store, &task)?;
            let mut drag = DragMachine::new(config.geometry(), config.snap_grid());
            let start = store
                .task(id)
                .map(|t| t.start_time())
                .ok_or_else(|| anyhow!("Task not found: {}", task))?;
            let grab_y = drag.geometry().y_for(start);
            drag.begin(&store, id, grab_y)?;
            let candidate = drag.move_to(y)?;
            match drag.end(&mut store)? {
                DropOutcome::Accepted(plan) => {
                    println!(
                        "Dropped at {} ({} pushed)",
                        candidate.format("%H:%M"),
                        plan.cascaded.len()
                    );
                    print_timeline(&store);
                }
                DropOutcome::Rejected { error, .. } => {
                    println!("Drop at {} rejected: {}", candidate.format("%H:%M"), error);
                }
                DropOutcome::Unchanged { .. } | DropOutcome::Cancelled { .. } => {
                    println!("Task stays at {}", start.format("%H:%M"));
                }
            }
        }
        Commands::Remove { task } => {
            let id = resolve_task(&store, &task)?;
            if let Some(removed) = store.remove_task(id) {
                println!("Removed {}", removed.title());
            }
        }
        Commands::Subtask { command } => match command {
            SubtaskCommands::Add { task, text } => {
                let id = resolve_task(&store, &task)?;
                let subtask = store.add_subtask(id, &text)?;
                println!("Added subtask #{}: {}", subtask.order, subtask.text);
            }
            SubtaskCommands::Toggle { task, index } => {
                let id = resolve_task(&store, &task)?;
                let subtask_id = store
                    .task(id)
                    .and_then(|t| index.checked_sub(1).and_then(|i| t.subtasks().get(i)))
                    .map(|s| s.id)
                    .ok_or_else(|| anyhow!("No subtask #{} on {}", index, task))?;
                let done = store.toggle_subtask(id, subtask_id)?;
                println!("Subtask #{} {}", index, if done { "done" } else { "reopened" });
            }
        },
        Commands::Done { task } => {
            let id = resolve_task(&store, &task)?;
            let is_routine = store.task(id).map(|t| t.is_routine()).unwrap_or(false);
            let done = if is_routine {
                store.toggle_routine_completion(id, day)?
            } else {
                store.toggle_completion(id)?
            };
            println!("{}", if done { "Marked done" } else { "Marked not done" });
        }
        Commands::Summary { output } => {
            let report = render_report(&store);
            print!("{}", report);
            if let Some(path) = output {
                let path = PathBuf::from(path);
                std::fs::write(&path, &report)
                    .with_context(|| format!("Failed to write report: {}", path.display()))?;
                println!("Report written: {}", path.display());
            }
        }
    }

    if let Some(notice) = store.notice() {
        eprintln!("Warning: {}", notice.message);
    }
    Ok(())
}

fn open_store(day: NaiveDate, data_dir: &Path, config: &PlannerConfig) -> Result<TaskStore> {
    let mut store = TaskStore::new(day);
    store
        .set_model_context(Box::new(JsonFileGateway::new(data_dir)))
        .with_context(|| format!("Failed to load plan for {}", day))?;

    match LocalNotificationCenter::open(reminders_file(data_dir)) {
        Ok(center) => store.attach_reminders(ReminderScheduler::new(
            Box::new(center),
            Box::new(SystemClock),
            config.lead_time(),
        )),
        Err(e) => eprintln!("Warning: reminders disabled: {}", e),
    }
    Ok(store)
}

fn remind(data_dir: &Path) -> Result<()> {
    let mut center = LocalNotificationCenter::open(reminders_file(data_dir))?;
    let fired = center.fire_due(Local::now().naive_local())?;
    if fired.is_empty() {
        println!("No reminders due");
    }
    for reminder in fired {
        println!(
            "{} {} - {}",
            reminder.fire_at.format("%H:%M"),
            reminder.content.title,
            reminder.content.body
        );
    }
    Ok(())
}

fn parse_time(day: NaiveDate, value: &str) -> Result<NaiveDateTime> {
    let time = NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|e| anyhow!("Invalid time '{}'. Use HH:MM: {}", value, e))?;
    Ok(day.and_time(time))
}

fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Find the single task whose id starts with `prefix`
fn resolve_task(store: &TaskStore, prefix: &str) -> Result<Uuid> {
    let prefix = prefix.to_lowercase();
    let matches: Vec<Uuid> = store
        .tasks()
        .iter()
        .map(|t| t.id())
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => bail!("No task matches '{}'", prefix),
        _ => bail!("'{}' matches {} tasks; use a longer prefix", prefix, matches.len()),
    }
}

fn describe(task: &TaskItem) -> String {
    format!(
        "{} {} {} ({})",
        task.time_range_formatted(),
        task.icon(),
        task.title(),
        task.duration_formatted()
    )
}

fn print_timeline(store: &TaskStore) {
    let tasks = store.tasks_sorted_by_start();
    if tasks.is_empty() {
        println!("Nothing planned for {}", store.day());
        return;
    }
    for task in tasks {
        let check = if is_done(store, &task) { "✓" } else { " " };
        let routine = if task.is_routine() { " ↻" } else { "" };
        let subtasks = if task.subtasks().is_empty() {
            String::new()
        } else {
            format!(" [{}/{}]", task.completed_subtasks_count(), task.subtasks().len())
        };
        println!(
            "{} {} {} {}{}{}",
            check,
            short_id(task.id()),
            describe(&task),
            task.energy().icon(),
            routine,
            subtasks
        );
    }
}
