use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use super::alarms::model::{AlarmGate, SchedulerEvent};
use super::alarms::registry::AlarmRegistry;
use super::alarms::scheduler::AlarmScheduler;
use super::fishlog::parser::{EventParser, FishingEvent};
use super::fishlog::rules::{RuleBook, UNKNOWN_SPOT};
use super::model::{Language, ServerTime};

/// Receives spots announced as newly added to the fishing log.
pub trait DiscoveryRegistry: Send {
    /// Returns true if the spot was not known before.
    fn record_discovered(&mut self, spot: &str) -> bool;
}

#[derive(Debug, Default)]
pub struct DiscoveredSpots(HashSet<String>);

impl DiscoveredSpots {
    pub fn contains(&self, spot: &str) -> bool {
        self.0.contains(spot)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl DiscoveryRegistry for DiscoveredSpots {
    fn record_discovered(&mut self, spot: &str) -> bool {
        self.0.insert(spot.to_string())
    }
}

/// What the fishing countdown shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FishingStatus {
    pub spot: String,
    pub mooching: bool,
    /// Seconds since the line was last cast.
    pub elapsed: i64,
}

pub struct CoordinatorOutput {
    pub fishing_events: Vec<FishingEvent>,
    pub scheduler_events: Vec<SchedulerEvent>,
    /// Present while a cast is active.
    pub fishing: Option<FishingStatus>,
    pub logs: Vec<String>,
}

pub struct Coordinator {
    registry: Arc<Mutex<AlarmRegistry>>,
    scheduler: AlarmScheduler,
    parser: EventParser,
    discovery: Box<dyn DiscoveryRegistry>,
    cast_at: Option<ServerTime>,
}

impl Coordinator {
    pub fn new(registry: Arc<Mutex<AlarmRegistry>>, scheduler: AlarmScheduler, rules: Arc<RuleBook>) -> Self {
        Self {
            registry,
            scheduler,
            parser: EventParser::new(rules),
            discovery: Box::new(DiscoveredSpots::default()),
            cast_at: None,
        }
    }

    pub fn with_discovery(mut self, discovery: Box<dyn DiscoveryRegistry>) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn registry(&self) -> &Arc<Mutex<AlarmRegistry>> {
        &self.registry
    }

    pub fn scheduler(&self) -> &AlarmScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut AlarmScheduler {
        &mut self.scheduler
    }

    pub fn feed_line(&mut self, language: Language, line: &str, now: ServerTime) -> Option<FishingEvent> {
        let event = self.parser.parse_line(language, line)?;
        match &event {
            FishingEvent::Cast { .. } | FishingEvent::Mooch => self.cast_at = Some(now),
            FishingEvent::AreaDiscovered { spot } if spot != UNKNOWN_SPOT => {
                if self.discovery.record_discovered(spot) {
                    log::info!("New fishing spot recorded: {}", spot);
                }
            }
            FishingEvent::AreaDiscovered { .. } => {}
        }
        Some(event)
    }

    /// Called when the game reports the cast ended (catch, release or quit).
    pub fn end_fishing(&mut self) {
        self.parser.reset();
        self.cast_at = None;
    }

    pub fn fishing_status(&self, now: ServerTime) -> Option<FishingStatus> {
        let cast_at = self.cast_at?;
        let session = self.parser.session();
        Some(FishingStatus {
            spot: session.spot.clone().unwrap_or_else(|| UNKNOWN_SPOT.to_string()),
            mooching: session.mooching,
            elapsed: now.seconds_since(cast_at).max(0),
        })
    }

    /// Feed pending lines in arrival order, then tick the scheduler.
    pub fn tick(&mut self, lines: &[(Language, String)], gate: AlarmGate, now: ServerTime) -> CoordinatorOutput {
        let mut logs = Vec::new();

        let mut fishing_events = Vec::new();
        for (language, line) in lines {
            if let Some(event) = self.feed_line(*language, line, now) {
                if let FishingEvent::AreaDiscovered { spot } = &event {
                    logs.push(format!("Discovered {}", spot));
                }
                fishing_events.push(event);
            }
        }

        // The registry stays locked for the whole tick.
        let scheduler_events = {
            let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            self.scheduler.tick(&registry, gate, now)
        };
        if !scheduler_events.is_empty() {
            logs.push(format!("{} scheduler events", scheduler_events.len()));
        }

        CoordinatorOutput {
            fishing_events,
            scheduler_events,
            fishing: self.fishing_status(now),
            logs,
        }
    }
}
