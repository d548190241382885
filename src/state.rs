use crate::calendar::ParsedEvent;
use crate::routine::{current_cycle, next_active_date, CycleConfig, CycleError, CycleWindow};
use anyhow::{Context, Result, anyhow};
use chrono::{Local, NaiveDate, NaiveDateTime};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const EVENTS_FILE: &str = "events.json";
const ROUTINES_FILE: &str = "routines.json";
// Maximum allowed size for state files (10MB)
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
const MAX_ITEMS: usize = 10_000;

// Trait for items that can be persisted
pub trait Persistent: Sized + Serialize + for<'de> Deserialize<'de> {
    fn filename() -> &'static str;
}

/// An imported calendar event as stored on disk
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(flatten)]
    pub event: ParsedEvent,
    pub source: String,
    pub imported_at: NaiveDateTime,
}

impl EventRecord {
    pub fn new(event: ParsedEvent, source: &str) -> Self {
        Self { event, source: source.to_string(), imported_at: Local::now().naive_local() }
    }
}

/// A recurring task with its check-in history.
///
/// `cycle` holds the persisted `CycleConfig` encoding.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RoutineTask {
    pub title: String,
    pub cycle: String,
    #[serde(default)]
    pub checkins: Vec<NaiveDate>,
    #[serde(default = "default_target")]
    pub target_per_cycle: u32,
}

fn default_target() -> u32 {
    1
}

/// Progress of a routine in the cycle containing a reference date
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineStatus {
    pub window: CycleWindow,
    pub checkins: usize,
    pub target: u32,
    pub next_due: NaiveDate,
}

impl RoutineStatus {
    pub fn is_complete(&self) -> bool {
        self.checkins >= self.target as usize
    }
}

impl RoutineTask {
    pub fn new(
        title: &str,
        config: &CycleConfig,
        target_per_cycle: u32,
    ) -> Result<Self, CycleError> {
        config.validate()?;
        Ok(Self {
            title: title.to_string(),
            cycle: config.encode()?,
            checkins: Vec::new(),
            target_per_cycle: target_per_cycle.max(1),
        })
    }

    pub fn cycle_config(&self) -> Result<CycleConfig, CycleError> {
        CycleConfig::decode(&self.cycle)
    }

    pub fn status(&self, reference: NaiveDate) -> Result<RoutineStatus, CycleError> {
        let config = self.cycle_config()?;
        let window = current_cycle(&config, reference)?;
        Ok(RoutineStatus {
            window,
            checkins: window.count_checkins(&self.checkins),
            target: self.target_per_cycle,
            next_due: next_active_date(&config, reference)?,
        })
    }

    /// Record a check-in, ignoring duplicates for the same day.
    pub fn check_in(&mut self, date: NaiveDate) -> bool {
        if self.checkins.contains(&date) {
            return false;
        }
        self.checkins.push(date);
        self.checkins.sort();
        true
    }
}

impl Persistent for EventRecord {
    fn filename() -> &'static str {
        EVENTS_FILE
    }
}

impl Persistent for RoutineTask {
    fn filename() -> &'static str {
        ROUTINES_FILE
    }
}

pub struct StateManager {
    state_dir: PathBuf,
}

impl StateManager {
    pub fn new() -> Result<Self> {
        let dirs = crate::config::project_dirs()?;
        Self::with_dir(dirs.data_dir())
    }

    pub fn with_dir(state_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_dir)
            .with_context(|| format!("Failed to create state directory {}", state_dir.display()))?;
        Ok(Self { state_dir: state_dir.to_path_buf() })
    }

    pub fn load<T: Persistent>(&self) -> Result<Vec<T>> {
        let path = self.state_dir.join(T::filename());
        if !path.exists() {
            return Ok(Vec::new());
        }

        let metadata = std::fs::metadata(&path)?;
        if metadata.len() > MAX_FILE_SIZE {
            return Err(anyhow!("State file {} exceeds size limit", path.display()));
        }

        let reader = BufReader::new(File::open(&path)?);
        let items: Vec<T> = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        if items.len() > MAX_ITEMS {
            return Err(anyhow!("Too many items in {} (maximum {})", path.display(), MAX_ITEMS));
        }

        debug!("Loaded {} item(s) from {}", items.len(), path.display());
        Ok(items)
    }

    /// Replace the state file with `items`. The previous file stays in place if writing fails.
    pub fn save<T: Persistent>(&self, items: &[T]) -> Result<()> {
        let path = self.state_dir.join(T::filename());
        let temp = NamedTempFile::new_in(&self.state_dir).with_context(|| {
            format!("Failed to create temporary file in {}", self.state_dir.display())
        })?;

        let mut writer = BufWriter::new(temp);
        serde_json::to_writer_pretty(&mut writer, items)
            .with_context(|| format!("Failed to serialize {}", path.display()))?;
        let temp = writer.into_inner().map_err(|e| e.into_error())?;
        temp.as_file().sync_all()?;
        temp.persist(&path).with_context(|| format!("Failed to write {}", path.display()))?;

        debug!("Saved {} item(s) to {}", items.len(), path.display());
        Ok(())
    }

    pub fn add<T: Persistent>(&self, item: T) -> Result<()> {
        let mut items = self.load::<T>()?;
        items.push(item);
        self.save(&items)
    }

    /// Append imported events; the import is stored as a whole or not at all.
    pub fn store_events(&self, events: Vec<ParsedEvent>, source: &str) -> Result<usize> {
        let mut records = self.load::<EventRecord>()?;
        let count = events.len();
        if records.len() + count > MAX_ITEMS {
            return Err(anyhow!(
                "Importing {} event(s) would exceed {} stored events",
                count,
                MAX_ITEMS
            ));
        }
        records.extend(events.into_iter().map(|event| EventRecord::new(event, source)));
        self.save(&records)?;
        info!("Stored {} event(s) from {}", count, source);
        Ok(count)
    }

    pub fn add_routine(&self, routine: RoutineTask) -> Result<()> {
        let routines = self.load::<RoutineTask>()?;
        if routines.iter().any(|r| r.title.eq_ignore_ascii_case(&routine.title)) {
            return Err(anyhow!("A routine named '{}' already exists", routine.title));
        }
        self.add(routine)
    }

    /// Returns false when the routine was already checked in on `date`.
    pub fn check_in(&self, title: &str, date: NaiveDate) -> Result<bool> {
        let mut routines = self.load::<RoutineTask>()?;
        let routine = routines
            .iter_mut()
            .find(|r| r.title.eq_ignore_ascii_case(title))
            .ok_or_else(|| anyhow!("No routine named '{}'", title))?;
        let recorded = routine.check_in(date);
        self.save(&routines)?;
        Ok(recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    // JSON object keys must be strings, so a non-empty `tags` map cannot be written
    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Note {
        text: String,
        #[serde(default)]
        tags: BTreeMap<Vec<u8>, u8>,
    }

    impl Persistent for Note {
        fn filename() -> &'static str {
            "notes.json"
        }
    }

    fn note(text: &str) -> Note {
        Note { text: text.to_string(), tags: BTreeMap::new() }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_event() -> ParsedEvent {
        ParsedEvent {
            summary: "Physics".to_string(),
            location: Some("Hall B".to_string()),
            description: None,
            start_time: date(2025, 9, 1).and_hms_opt(8, 0, 0).unwrap(),
            end_time: date(2025, 9, 1).and_hms_opt(9, 40, 0).unwrap(),
            recurrence: None,
            alarm_minutes_before_start: Some(10),
        }
    }

    #[test]
    fn test_store_events() -> Result<()> {
        let temp_dir = tempdir()?;
        let manager = StateManager::with_dir(temp_dir.path())?;

        assert_eq!(manager.store_events(vec![sample_event(), sample_event()], "term.ics")?, 2);
        let records: Vec<EventRecord> = manager.load()?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event, sample_event());
        assert_eq!(records[0].source, "term.ics");

        Ok(())
    }

    #[test]
    fn test_save_load_round_trip() -> Result<()> {
        let temp_dir = tempdir()?;
        let manager = StateManager::with_dir(temp_dir.path())?;

        manager.save(&[note("first"), note("second")])?;
        assert_eq!(manager.load::<Note>()?, vec![note("first"), note("second")]);

        manager.save(&[note("third")])?;
        assert_eq!(manager.load::<Note>()?, vec![note("third")]);
        Ok(())
    }

    #[test]
    fn test_failed_save_keeps_previous_file() -> Result<()> {
        let temp_dir = tempdir()?;
        let manager = StateManager::with_dir(temp_dir.path())?;
        manager.save(&[note("kept")])?;

        let mut unwritable = note("lost");
        unwritable.tags.insert(vec![1, 2], 3);
        assert!(manager.save(&[unwritable]).is_err());

        assert_eq!(manager.load::<Note>()?, vec![note("kept")]);
        assert_eq!(std::fs::read_dir(temp_dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_event_record_uses_camel_case_keys() -> Result<()> {
        let record = EventRecord::new(sample_event(), "term.ics");
        let json = serde_json::to_value(&record)?;
        assert!(json.get("startTime").is_some());
        assert!(json.get("importedAt").is_some());
        assert!(json.get("imported_at").is_none());
        Ok(())
    }

    #[test]
    fn test_routine_state() -> Result<()> {
        let temp_dir = tempdir()?;
        let manager = StateManager::with_dir(temp_dir.path())?;

        let config = CycleConfig::weekly(&[Weekday::Mon, Weekday::Thu]);
        let routine = RoutineTask::new("Gym", &config, 2)?;
        manager.add_routine(routine)?;
        assert!(manager.add_routine(RoutineTask::new("gym", &CycleConfig::daily(), 1)?).is_err());

        assert!(manager.check_in("Gym", date(2025, 8, 25))?);
        assert!(!manager.check_in("gym", date(2025, 8, 25))?);
        assert!(manager.check_in("Gym", date(2025, 8, 28))?);
        assert!(manager.check_in("Reading", date(2025, 8, 28)).is_err());

        let routines: Vec<RoutineTask> = manager.load()?;
        let status = routines[0].status(date(2025, 8, 30))?;
        assert_eq!(status.window, CycleWindow::new(date(2025, 8, 25), date(2025, 8, 31)));
        assert_eq!(status.checkins, 2);
        assert!(status.is_complete());
        assert_eq!(status.next_due, date(2025, 9, 1));

        Ok(())
    }

    #[test]
    fn test_invalid_routine_is_not_created() {
        assert!(matches!(
            RoutineTask::new("Nothing", &CycleConfig::monthly(&[]), 1),
            Err(CycleError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_corrupt_state_file() -> Result<()> {
        let temp_dir = tempdir()?;
        std::fs::write(temp_dir.path().join(ROUTINES_FILE), "{ not json")?;
        let manager = StateManager::with_dir(temp_dir.path())?;
        assert!(manager.load::<RoutineTask>().is_err());
        Ok(())
    }
}
