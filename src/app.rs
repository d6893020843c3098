use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::core::{
    alarms::model::{AlarmGate, AlarmGroup, SchedulerEvent},
    alarms::registry::AlarmRegistry,
    alarms::scheduler::AlarmScheduler,
    catalog::Catalog,
    config::{ConfigManager, Settings},
    coordinator::Coordinator,
    fishlog::parser::FishingEvent,
    fishlog::rules::RuleBook,
    log_io::LogTailer,
    model::{Language, ServerTime},
};

/// Commands typed on stdin while the watcher runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopCommand {
    EndFishing,
    Duty(bool),
    LoggedIn(bool),
    Quit,
}

impl LoopCommand {
    fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "end" | "catch" => Some(Self::EndFishing),
            "duty" | "duty on" => Some(Self::Duty(true)),
            "duty off" => Some(Self::Duty(false)),
            "login" => Some(Self::LoggedIn(true)),
            "logout" => Some(Self::LoggedIn(false)),
            "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("GATHER_WATCH_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".config/gather-watch")
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

fn report(output_events: &[SchedulerEvent]) {
    for event in output_events {
        match event {
            SchedulerEvent::AlarmFired(fired) => {
                let text = fired.message.as_deref().unwrap_or(&fired.alarm_name);
                log::info!("[alarm] {} ({})", text, fired.sound.label());
            }
            SchedulerEvent::EorzeaHourChanged { hour, sound } => {
                log::info!("[chime] Eorzea {:02}:00 ({})", hour, sound.label());
            }
            SchedulerEvent::WeatherChanged { sound } => {
                log::info!("[chime] Weather changed ({})", sound.label());
            }
        }
    }
}

fn open_tailer(settings: &Settings) -> Option<LogTailer> {
    let path = settings.chatlog_path.as_ref()?;
    match LogTailer::open(path) {
        Ok(tailer) => {
            log::info!("Tailing chat log {}", path.display());
            Some(tailer)
        }
        Err(e) => {
            log::warn!("Cannot open chat log {}: {}", path.display(), e);
            None
        }
    }
}

async fn watch(config_manager: ConfigManager, settings: Settings) {
    let catalog: Arc<dyn Catalog> = match config_manager.load_catalog() {
        Ok(catalog) => {
            log::info!("Loaded catalog with {} items", catalog.len());
            Arc::new(catalog)
        }
        Err(e) => {
            log::error!("{}", e);
            return;
        }
    };

    let rules = Arc::new(RuleBook::default());
    let language = Language::from_tag(&settings.language).unwrap_or_else(|| rules.fallback());

    let (registry, skipped) = AlarmRegistry::from_groups(catalog.clone(), settings.alarm_groups.clone());
    if skipped > 0 {
        log::warn!(
            "{} saved alarms do not resolve against the catalog; alarm changes will not be saved this session",
            skipped
        );
    }
    let registry = Arc::new(Mutex::new(registry));
    let scheduler = AlarmScheduler::new(settings.alarm_settings.clone(), catalog);
    let mut coordinator = Coordinator::new(registry.clone(), scheduler, rules);

    let mut tailer = open_tailer(&settings);

    // Create a channel for commands from stdin
    let (tx, mut rx) = mpsc::channel(32);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(input)) = lines.next_line().await {
            match LoopCommand::parse(&input) {
                Some(cmd) => {
                    if tx.send(cmd).await.is_err() {
                        break;
                    }
                }
                None => log::warn!("Unknown command: {}", input.trim()),
            }
        }
    });

    let mut gate = AlarmGate::default();
    let tick = Duration::from_millis(settings.tick_interval_ms.max(100));
    log::info!("Watcher started, ticking every {:?}", tick);

    loop {
        // Check for commands from stdin
        while let Ok(cmd) = rx.try_recv() {
            match cmd {
                LoopCommand::EndFishing => coordinator.end_fishing(),
                LoopCommand::Duty(in_duty) => gate.in_duty = in_duty,
                LoopCommand::LoggedIn(logged_in) => gate.logged_in = logged_in,
                LoopCommand::Quit => {
                    save_groups(&config_manager, &settings, &registry, skipped);
                    return;
                }
            }
        }

        let lines: Vec<(Language, String)> = match tailer.as_mut().map(LogTailer::read_new_lines) {
            Some(Ok(lines)) => lines.into_iter().map(|line| (language, line)).collect(),
            Some(Err(e)) => {
                log::warn!("Failed to read chat log: {}", e);
                Vec::new()
            }
            None => Vec::new(),
        };

        let output = coordinator.tick(&lines, gate, ServerTime::now());

        for event in &output.fishing_events {
            match event {
                FishingEvent::Cast { spot } => log::info!("[fishing] Cast at {}", spot),
                FishingEvent::AreaDiscovered { spot } => log::info!("[fishing] Discovered {}", spot),
                FishingEvent::Mooch => log::info!("[fishing] Mooching"),
            }
        }
        report(&output.scheduler_events);
        for msg in output.logs {
            log::debug!("{}", msg);
        }

        tokio::select! {
            _ = tokio::time::sleep(tick) => {}
            _ = tokio::signal::ctrl_c() => {
                save_groups(&config_manager, &settings, &registry, skipped);
                return;
            }
        }
    }
}

/// Groups to write back on exit. When alarms were dropped at load the
/// registry is incomplete, so the groups as loaded are kept instead.
fn groups_to_persist(loaded: &[AlarmGroup], registry: &AlarmRegistry, skipped_at_load: usize) -> Vec<AlarmGroup> {
    if skipped_at_load > 0 {
        log::warn!("Keeping saved alarm groups unchanged: {} alarms could not be loaded", skipped_at_load);
        return loaded.to_vec();
    }
    registry.groups().to_vec()
}

fn save_groups(
    config_manager: &ConfigManager,
    settings: &Settings,
    registry: &Arc<Mutex<AlarmRegistry>>,
    skipped_at_load: usize,
) {
    let mut settings = settings.clone();
    settings.alarm_groups = {
        let registry = registry.lock().unwrap_or_else(|e| e.into_inner());
        groups_to_persist(&settings.alarm_groups, &registry, skipped_at_load)
    };
    match config_manager.save(&settings) {
        Ok(()) => log::info!("Saved {} alarm groups", settings.alarm_groups.len()),
        Err(e) => log::error!("Failed to save settings: {}", e),
    }
}

pub fn run() {
    init_logging();

    let config_manager = ConfigManager::new(config_dir());
    let settings = config_manager.load();

    let runtime = tokio::runtime::Runtime::new().expect("error while building tokio runtime");
    runtime.block_on(watch(config_manager, settings));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alarms::model::Alarm;
    use crate::core::catalog::StaticCatalog;
    use tempfile::tempdir;

    fn saved_settings(items: &[u32]) -> Settings {
        let mut group = AlarmGroup::new("Ores");
        group.alarms.extend(items.iter().map(|&item| Alarm::new(item)));
        Settings {
            alarm_groups: vec![group],
            ..Settings::default()
        }
    }

    #[test]
    fn test_unresolved_alarms_survive_save() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());
        manager.save(&saved_settings(&[7, 8])).unwrap();

        // Catalog only knows item 8.
        let catalog: Arc<dyn Catalog> = Arc::new(StaticCatalog::new().with_item(8, "Copper Ore", None, &[]));
        let settings = manager.load();
        let (registry, skipped) = AlarmRegistry::from_groups(catalog, settings.alarm_groups.clone());
        assert_eq!(skipped, 1);

        save_groups(&manager, &settings, &Arc::new(Mutex::new(registry)), skipped);
        let reloaded = manager.load();
        let items: Vec<u32> = reloaded.alarm_groups[0].alarms.iter().map(|a| a.item).collect();
        assert_eq!(items, vec![7, 8]);
    }

    #[test]
    fn test_registry_edits_are_saved_when_everything_loaded() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());
        manager.save(&saved_settings(&[8])).unwrap();

        let catalog: Arc<dyn Catalog> = Arc::new(StaticCatalog::new().with_item(8, "Copper Ore", None, &[]));
        let settings = manager.load();
        let (mut registry, skipped) = AlarmRegistry::from_groups(catalog, settings.alarm_groups.clone());
        assert_eq!(skipped, 0);
        registry.set_alarm_offset(0, 0, 45).unwrap();

        save_groups(&manager, &settings, &Arc::new(Mutex::new(registry)), skipped);
        assert_eq!(manager.load().alarm_groups[0].alarms[0].offset_seconds, 45);
    }

    #[test]
    fn test_missing_catalog_stops_before_saving() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());
        manager.save(&saved_settings(&[7])).unwrap();

        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(watch(ConfigManager::new(dir.path().to_path_buf()), manager.load()));

        assert_eq!(manager.load().alarm_groups[0].alarms.len(), 1);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(LoopCommand::parse("end"), Some(LoopCommand::EndFishing));
        assert_eq!(LoopCommand::parse(" Duty on "), Some(LoopCommand::Duty(true)));
        assert_eq!(LoopCommand::parse("duty off"), Some(LoopCommand::Duty(false)));
        assert_eq!(LoopCommand::parse("logout"), Some(LoopCommand::LoggedIn(false)));
        assert_eq!(LoopCommand::parse("QUIT"), Some(LoopCommand::Quit));
        assert_eq!(LoopCommand::parse("dance"), None);
    }
}
