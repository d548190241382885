use crate::calendar::{import_ics_file, parse_weekday_code};
use crate::config::Config;
use crate::routine::{current_cycle, next_active_date, CycleConfig};
use crate::state::{EventRecord, RoutineTask, StateManager};
use anyhow::{Context, Result, anyhow};
use chrono::{Local, NaiveDate, NaiveTime, Weekday};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;

/// Command line arguments structure
#[derive(Debug, Clone)]
pub struct CommandArgs {
    pub command: String,
    pub args: Vec<String>,
    pub flags: HashMap<String, Option<String>>,
}

impl CommandArgs {
    pub fn parse(input: &str) -> Result<Self> {
        debug!("Parsing command input: {}", input);

        let mut parts = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut escaped = false;

        // Whitespace (including non-breaking spaces) separates words outside quotes only
        for c in input.trim().chars() {
            match c {
                '\\' if !escaped => {
                    escaped = true;
                }
                '"' if !escaped => {
                    in_quotes = !in_quotes;
                    if !in_quotes && !current.is_empty() {
                        parts.push(current.clone());
                        current.clear();
                    }
                }
                c if c.is_whitespace() && !in_quotes && !escaped => {
                    if !current.is_empty() {
                        parts.push(current.clone());
                        current.clear();
                    }
                }
                _ => {
                    if escaped && c != '"' {
                        current.push('\\');
                    }
                    current.push(c);
                    escaped = false;
                }
            }
        }

        if !current.is_empty() {
            parts.push(current);
        }

        // The program name is optional
        if parts.first().is_some_and(|p| p.eq_ignore_ascii_case("saison")) {
            parts.remove(0);
        }

        if parts.is_empty() {
            return Err(anyhow!("No command provided"));
        }

        let command = parts.remove(0).to_lowercase();
        let mut args = Vec::new();
        let mut flags = HashMap::new();
        let mut i = 0;

        while i < parts.len() {
            if parts[i].starts_with("--") {
                let flag = parts[i].clone();
                if i + 1 < parts.len() && !parts[i + 1].starts_with("--") {
                    flags.insert(flag, Some(parts[i + 1].clone()));
                    i += 1;
                } else {
                    flags.insert(flag, None);
                }
            } else {
                args.push(parts[i].clone());
            }
            i += 1;
        }

        debug!("Parsed command: {:?}, args: {:?}, flags: {:?}", command, args, flags);

        Ok(CommandArgs { command, args, flags })
    }

    fn flag(&self, name: &str) -> Option<&str> {
        self.flags.get(name).and_then(|v| v.as_deref())
    }
}

/// Shared state handed to every command
pub struct Session {
    pub config: Config,
    pub state: StateManager,
}

// Command handler trait for handling commands
pub trait CommandHandler: Debug + Send + Sync {
    fn execute(&self, args: CommandArgs, session: &Session) -> Result<()>;
    fn can_handle(&self, command: &str) -> bool;
}

#[derive(Debug)]
pub struct ImportHandler;

impl CommandHandler for ImportHandler {
    fn execute(&self, args: CommandArgs, session: &Session) -> Result<()> {
        let Some(path) = args.args.first() else {
            println!("Usage: import <file.ics>");
            return Ok(());
        };
        let path = Path::new(path);
        let events = import_ics_file(path)
            .with_context(|| format!("Failed to import {}", path.display()))?;

        for event in &events {
            let repeat = event
                .recurrence
                .as_ref()
                .map(|rule| format!(" (repeats {})", rule))
                .unwrap_or_default();
            println!("  {} {}{}", event.start_time.format("%Y-%m-%d %H:%M"), event.summary, repeat);
        }

        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .or_else(|| session.config.import.default_source_label.clone())
            .unwrap_or_else(|| "import".to_string());
        let stored = session.state.store_events(events, &source)?;
        println!("Imported {} event(s) from {}", stored, source);
        Ok(())
    }

    fn can_handle(&self, command: &str) -> bool {
        command == "import"
    }
}

#[derive(Debug)]
pub struct EventsHandler;

impl CommandHandler for EventsHandler {
    fn execute(&self, _args: CommandArgs, session: &Session) -> Result<()> {
        let records: Vec<EventRecord> = session.state.load()?;
        if records.is_empty() {
            println!("No imported events.");
            return Ok(());
        }
        for record in records {
            let event = &record.event;
            let location =
                event.location.as_deref().map(|l| format!(" @ {}", l)).unwrap_or_default();
            println!(
                "  {} - {} {}{} [{}]",
                event.start_time.format("%Y-%m-%d %H:%M"),
                event.end_time.format("%H:%M"),
                event.summary,
                location,
                record.source
            );
        }
        Ok(())
    }

    fn can_handle(&self, command: &str) -> bool {
        command == "events"
    }
}

#[derive(Debug)]
pub struct RoutineHandler;

impl CommandHandler for RoutineHandler {
    fn execute(&self, args: CommandArgs, session: &Session) -> Result<()> {
        match args.args.first().map(|s| s.as_str()) {
            Some("add") => {
                if args.args.len() < 3 {
                    println!("Usage: routine add \"<title>\" <daily|weekly|monthly|custom> [--days ..] [--time HH:MM] [--rrule ..] [--target N]");
                    return Ok(());
                }
                let title = &args.args[1];
                let config = cycle_config_from_args(&args.args[2], &args, &session.config)?;
                let target = match args.flag("--target") {
                    Some(target) => target.parse::<u32>().context("--target must be a number")?,
                    None => session.config.routine.default_target_per_cycle,
                };
                session.state.add_routine(RoutineTask::new(title, &config, target)?)?;
                info!("Routine '{}' added with {} cycle", title, config.kind());
                println!("Routine '{}' added", title);
                Ok(())
            }
            Some("list") | None => {
                let today = reference_date(&args)?;
                let routines: Vec<RoutineTask> = session.state.load()?;
                if routines.is_empty() {
                    println!("No routines yet.");
                }
                for routine in routines {
                    match routine.status(today) {
                        Ok(status) => println!(
                            "  {} [{}] {}/{} check-ins, next due {}{}",
                            routine.title,
                            status.window,
                            status.checkins,
                            status.target,
                            status.next_due,
                            if status.is_complete() { " (done)" } else { "" }
                        ),
                        Err(e) => {
                            warn!("Routine '{}' has an unusable cycle: {}", routine.title, e);
                            println!("  {} [unavailable: {}]", routine.title, e);
                        }
                    }
                }
                Ok(())
            }
            Some(other) => {
                println!("Unknown routine command '{}'. Available commands: add, list", other);
                Ok(())
            }
        }
    }

    fn can_handle(&self, command: &str) -> bool {
        command == "routine" || command == "routines"
    }
}

#[derive(Debug)]
pub struct CheckinHandler;

impl CommandHandler for CheckinHandler {
    fn execute(&self, args: CommandArgs, session: &Session) -> Result<()> {
        let Some(title) = args.args.first() else {
            println!("Usage: checkin \"<title>\" [--date YYYY-MM-DD]");
            return Ok(());
        };
        let date = reference_date(&args)?;
        if session.state.check_in(title, date)? {
            println!("Checked in '{}' on {}", title, date);
        } else {
            println!("'{}' was already checked in on {}", title, date);
        }
        Ok(())
    }

    fn can_handle(&self, command: &str) -> bool {
        command == "checkin" || command == "check-in"
    }
}

#[derive(Debug)]
pub struct CycleHandler;

impl CommandHandler for CycleHandler {
    fn execute(&self, args: CommandArgs, session: &Session) -> Result<()> {
        let Some(kind) = args.args.first() else {
            println!("Usage: cycle <daily|weekly|monthly|custom> [--days ..] [--rrule ..] [--date YYYY-MM-DD]");
            return Ok(());
        };
        let config = cycle_config_from_args(kind, &args, &session.config)?;
        let reference = reference_date(&args)?;
        let window = current_cycle(&config, reference)?;
        let next = next_active_date(&config, reference)?;
        println!("Current cycle: {} ({} day(s))", window, window.len_days());
        println!("Next active date: {}", next);
        println!("Stored as: {}", config.encode()?);
        Ok(())
    }

    fn can_handle(&self, command: &str) -> bool {
        command == "cycle"
    }
}

#[derive(Debug)]
pub struct VersionHandler;

impl CommandHandler for VersionHandler {
    fn execute(&self, _args: CommandArgs, _session: &Session) -> Result<()> {
        println!("saison {}", env!("CARGO_PKG_VERSION"));
        Ok(())
    }

    fn can_handle(&self, command: &str) -> bool {
        command == "version" || command == "--version" || command == "-v"
    }
}

#[derive(Debug)]
pub struct HelpHandler;

impl CommandHandler for HelpHandler {
    fn execute(&self, _args: CommandArgs, _session: &Session) -> Result<()> {
        print_help();
        Ok(())
    }

    fn can_handle(&self, command: &str) -> bool {
        command == "help" || command == "--help" || command == "-h"
    }
}

pub fn print_help() {
    println!("Available commands:");
    println!("  import <file.ics>                       - Import events from a calendar file");
    println!("  events                                  - List imported events");
    println!("  routine add \"<title>\" <kind> [options]  - Add a routine (daily, weekly, monthly, custom)");
    println!("      --days MO,WE,FR | --days 1,15        weekdays or days of month");
    println!("      --time HH:MM                         reminder time for daily routines");
    println!("      --rrule \"FREQ=WEEKLY;INTERVAL=2\"     rule for custom routines");
    println!("      --target N                           check-ins required per cycle");
    println!("  routine list [--date YYYY-MM-DD]        - Show current cycle of each routine");
    println!("  checkin \"<title>\" [--date YYYY-MM-DD]   - Record a check-in");
    println!("  cycle <kind> [options] [--date ..]      - Compute a cycle without saving it");
    println!("  version                                 - Show version");
    println!("  help                                    - Show this help");
    println!("  exit                                    - Exit the application");
}

/// Build a `CycleConfig` from a kind word and the `--days`, `--time`, `--rrule` flags.
pub fn cycle_config_from_args(
    kind: &str,
    args: &CommandArgs,
    config: &Config,
) -> Result<CycleConfig> {
    let cycle = match kind.to_lowercase().as_str() {
        "daily" => {
            let time = match args.flag("--time") {
                Some(time) => Some(
                    NaiveTime::parse_from_str(time, "%H:%M")
                        .with_context(|| format!("Invalid time '{}', expected HH:MM", time))?,
                ),
                None => config.routine.default_reminder_time,
            };
            CycleConfig::Daily { time }
        }
        "weekly" => {
            let days = args.flag("--days").ok_or_else(|| anyhow!("weekly routines need --days"))?;
            let days = days
                .split(',')
                .map(|d| parse_day_name(d).ok_or_else(|| anyhow!("Unknown weekday '{}'", d)))
                .collect::<Result<Vec<_>>>()?;
            CycleConfig::Weekly { days_of_week: days }
        }
        "monthly" => {
            let days = args.flag("--days").ok_or_else(|| anyhow!("monthly routines need --days"))?;
            let days = days
                .split(',')
                .map(|d| {
                    d.trim()
                        .parse::<u32>()
                        .with_context(|| format!("Invalid day of month '{}'", d))
                })
                .collect::<Result<Vec<_>>>()?;
            CycleConfig::Monthly { days_of_month: days }
        }
        "custom" => {
            let rrule =
                args.flag("--rrule").ok_or_else(|| anyhow!("custom routines need --rrule"))?;
            CycleConfig::Custom { rrule: rrule.to_string() }
        }
        other => return Err(anyhow!("Unknown cycle kind '{}'", other)),
    };
    cycle.validate()?;
    Ok(cycle)
}

fn parse_day_name(day: &str) -> Option<Weekday> {
    parse_weekday_code(day).or_else(|| day.trim().parse::<Weekday>().ok())
}

fn reference_date(args: &CommandArgs) -> Result<NaiveDate> {
    match args.flag("--date") {
        Some(date) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", date)),
        None => Ok(Local::now().date_naive()),
    }
}

pub struct CommandProcessor {
    handlers: Vec<Box<dyn CommandHandler>>,
}

impl Default for CommandProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandProcessor {
    pub fn new() -> Self {
        let handlers: Vec<Box<dyn CommandHandler>> = vec![
            Box::new(ImportHandler),
            Box::new(EventsHandler),
            Box::new(RoutineHandler),
            Box::new(CheckinHandler),
            Box::new(CycleHandler),
            Box::new(VersionHandler),
            Box::new(HelpHandler),
        ];
        Self { handlers }
    }

    pub fn execute(&self, args: CommandArgs, session: &Session) -> Result<()> {
        debug!("Attempting to execute command: {}", args.command);
        let command_name = args.command.clone();

        for handler in &self.handlers {
            if handler.can_handle(&command_name) {
                info!("Executing command '{}' with arguments: {:?}", command_name, args.args);
                return handler.execute(args, session).map_err(|e| {
                    log::error!("Failed to execute command '{}': {:?}", command_name, e);
                    e
                });
            }
        }

        warn!("Unrecognized command: {}", command_name);
        println!("Unrecognized command. Type 'help' for a list of available commands.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routine::CycleWindow;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn session(dir: &Path) -> Session {
        Session { config: Config::default(), state: StateManager::with_dir(dir).unwrap() }
    }

    #[test]
    fn test_command_args_parse() {
        let args = CommandArgs::parse("routine add \"Morning run\" weekly --days MO,WE,FR").unwrap();
        assert_eq!(args.command, "routine");
        assert_eq!(args.args, vec!["add", "Morning run", "weekly"]);
        assert_eq!(args.flag("--days"), Some("MO,WE,FR"));

        let args = CommandArgs::parse("saison cycle custom --rrule FREQ=WEEKLY;INTERVAL=2 --date 2025-08-27")
            .unwrap();
        assert_eq!(args.command, "cycle");
        assert_eq!(args.flag("--rrule"), Some("FREQ=WEEKLY;INTERVAL=2"));
        assert_eq!(args.flag("--date"), Some("2025-08-27"));

        let args = CommandArgs::parse("HELP").unwrap();
        assert_eq!(args.command, "help");
        assert!(args.args.is_empty());
        assert!(args.flags.is_empty());

        assert!(CommandArgs::parse("   ").is_err());
    }

    #[test]
    fn test_command_args_keep_quoted_whitespace() {
        let args = CommandArgs::parse("import \"My  Term.ics\"").unwrap();
        assert_eq!(args.args, vec!["My  Term.ics"]);

        let args = CommandArgs::parse("checkin \t Piano\u{a0}\u{a0}--date   2025-08-27").unwrap();
        assert_eq!(args.command, "checkin");
        assert_eq!(args.args, vec!["Piano"]);
        assert_eq!(args.flag("--date"), Some("2025-08-27"));
    }

    #[test]
    fn test_cycle_config_from_args() {
        let config = Config::default();

        let args = CommandArgs::parse("cycle weekly --days monday,FR").unwrap();
        assert_eq!(
            cycle_config_from_args("weekly", &args, &config).unwrap(),
            CycleConfig::weekly(&[Weekday::Mon, Weekday::Fri])
        );

        let args = CommandArgs::parse("cycle daily --time 07:30").unwrap();
        assert_eq!(
            cycle_config_from_args("daily", &args, &config).unwrap(),
            CycleConfig::Daily { time: NaiveTime::from_hms_opt(7, 30, 0) }
        );

        let args = CommandArgs::parse("cycle monthly --days 1,40").unwrap();
        assert!(cycle_config_from_args("monthly", &args, &config).is_err());

        let args = CommandArgs::parse("cycle weekly").unwrap();
        assert!(cycle_config_from_args("weekly", &args, &config).is_err());
        assert!(cycle_config_from_args("hourly", &args, &config).is_err());
    }

    #[test]
    fn test_routine_commands_update_state() -> Result<()> {
        let temp_dir = tempdir()?;
        let session = session(temp_dir.path());
        let processor = CommandProcessor::new();

        processor.execute(
            CommandArgs::parse("routine add \"Piano\" weekly --days TU,SA --target 2")?,
            &session,
        )?;
        processor.execute(CommandArgs::parse("checkin Piano --date 2025-08-26")?, &session)?;
        processor.execute(CommandArgs::parse("routine list --date 2025-08-27")?, &session)?;

        let routines: Vec<RoutineTask> = session.state.load()?;
        assert_eq!(routines.len(), 1);
        assert_eq!(routines[0].target_per_cycle, 2);
        assert_eq!(routines[0].checkins, vec![NaiveDate::from_ymd_opt(2025, 8, 26).unwrap()]);

        let status = routines[0].status(NaiveDate::from_ymd_opt(2025, 8, 27).unwrap())?;
        assert_eq!(
            status.window,
            CycleWindow::new(
                NaiveDate::from_ymd_opt(2025, 8, 26).unwrap(),
                NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()
            )
        );
        assert!(!status.is_complete());
        Ok(())
    }

    #[test]
    fn test_import_command_stores_events() -> Result<()> {
        let temp_dir = tempdir()?;
        let session = session(temp_dir.path());
        let ics_path = temp_dir.path().join("term.ics");
        std::fs::write(
            &ics_path,
            "BEGIN:VCALENDAR\nVERSION:2.0\nBEGIN:VEVENT\nSUMMARY:Chemistry\nDTSTART:20250902T100000\nDTEND:20250902T114000\nEND:VEVENT\nEND:VCALENDAR\n",
        )?;

        let line = format!("import \"{}\"", ics_path.display());
        CommandProcessor::new().execute(CommandArgs::parse(&line)?, &session)?;

        let records: Vec<EventRecord> = session.state.load()?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event.summary, "Chemistry");
        assert_eq!(records[0].source, "term.ics");
        Ok(())
    }

    #[test]
    fn test_failed_import_stores_nothing() -> Result<()> {
        let temp_dir = tempdir()?;
        let session = session(temp_dir.path());
        let ics_path = temp_dir.path().join("empty.ics");
        std::fs::write(&ics_path, "BEGIN:VCALENDAR\nVERSION:2.0\nEND:VCALENDAR\n")?;

        let line = format!("import \"{}\"", ics_path.display());
        assert!(CommandProcessor::new().execute(CommandArgs::parse(&line)?, &session).is_err());
        assert!(session.state.load::<EventRecord>()?.is_empty());
        Ok(())
    }
}
