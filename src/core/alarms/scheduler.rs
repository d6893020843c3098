// Alarm scheduler - turns the registry plus a server clock into fire events.
//
// Each alarm fires at most once per availability window. The dedupe mark is
// the start of the last fired window, so a clock that jumps backwards cannot
// re-fire a window that was already announced.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;

use super::message;
use super::model::{
    Alarm, AlarmFired, AlarmGate, AlarmId, AlarmSettings, SchedulerEvent, SuppressionPolicy,
};
use super::registry::AlarmRegistry;
use crate::core::catalog::Catalog;
use crate::core::model::{GatherableId, ServerTime, TimeWindow};
use crate::core::uptime::{self, WindowError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlarmError {
    #[error("gatherable {0} is not in the catalog")]
    UnknownItem(GatherableId),
    #[error(transparent)]
    Window(#[from] WindowError),
}

/// The window an alarm currently targets and the instant it fires for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmUptime {
    pub window: TimeWindow,
    pub fire_at: ServerTime,
}

/// Display state of an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmCountdown {
    /// Seconds until the alarm triggers.
    Pending { seconds: i64 },
    /// The fire instant for the current window has been reached.
    Triggered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FiredMark {
    item: GatherableId,
    window_start: ServerTime,
}

impl FiredMark {
    /// True when `window` was already handled for `item`. Windows older
    /// than the mark count as handled.
    fn covers(&self, item: GatherableId, window: &TimeWindow) -> bool {
        self.item == item && window.start <= self.window_start
    }
}

pub struct AlarmScheduler {
    settings: AlarmSettings,
    catalog: Arc<dyn Catalog>,
    last_fired: HashMap<AlarmId, FiredMark>,
    /// Alarms already reported as broken, so the log is not flooded once a second.
    warned: HashSet<AlarmId>,
    last_hour: Option<i64>,
    last_weather: Option<i64>,
}

impl AlarmScheduler {
    pub fn new(settings: AlarmSettings, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            settings,
            catalog,
            last_fired: HashMap::new(),
            warned: HashSet::new(),
            last_hour: None,
            last_weather: None,
        }
    }

    pub fn settings(&self) -> &AlarmSettings {
        &self.settings
    }

    pub fn update_settings(&mut self, settings: AlarmSettings) {
        self.settings = settings;
    }

    /// Start of the last window fired for an alarm.
    pub fn last_fired(&self, id: AlarmId) -> Option<ServerTime> {
        self.last_fired.get(&id).map(|mark| mark.window_start)
    }

    /// Current target window of an alarm and its fire instant.
    ///
    /// The fire instant is `start - offset`, but never earlier than the end of
    /// the preceding window.
    pub fn uptime(&self, alarm: &Alarm, now: ServerTime) -> Result<AlarmUptime, AlarmError> {
        let item = self
            .catalog
            .gatherable(alarm.item)
            .ok_or(AlarmError::UnknownItem(alarm.item))?;
        let rule = item.uptime.as_ref();
        let window = uptime::next_window(rule, now)?;
        let mut fire_at = window.start.saturating_sub_secs(i64::from(alarm.offset_seconds));
        if let Some(previous_end) = uptime::previous_end(rule, &window) {
            fire_at = fire_at.max(previous_end);
        }
        Ok(AlarmUptime { window, fire_at })
    }

    pub fn countdown(&self, alarm: &Alarm, now: ServerTime) -> Result<AlarmCountdown, AlarmError> {
        let uptime = self.uptime(alarm, now)?;
        if now >= uptime.fire_at {
            Ok(AlarmCountdown::Triggered)
        } else {
            Ok(AlarmCountdown::Pending {
                seconds: uptime.fire_at.seconds_since(now),
            })
        }
    }

    /// Advance to `now` and return everything that fired.
    pub fn tick(&mut self, registry: &AlarmRegistry, gate: AlarmGate, now: ServerTime) -> Vec<SchedulerEvent> {
        let suppressed = self.settings.is_suppressed(gate);
        let mut events = self.tick_chimes(suppressed, now);

        for alarm in registry.active_alarms() {
            let uptime = match self.uptime(alarm, now) {
                Ok(uptime) => {
                    self.warned.remove(&alarm.id);
                    uptime
                }
                Err(e) => {
                    if self.warned.insert(alarm.id) {
                        log::warn!("Skipping alarm '{}' ({}): {}", alarm.name, alarm.id, e);
                    }
                    continue;
                }
            };

            if now < uptime.fire_at {
                continue;
            }
            if self
                .last_fired
                .get(&alarm.id)
                .is_some_and(|mark| mark.covers(alarm.item, &uptime.window))
            {
                continue;
            }

            if suppressed {
                if self.settings.suppression == SuppressionPolicy::Drop {
                    log::debug!("Dropping suppressed alarm '{}'", alarm.name);
                    self.mark_fired(alarm, &uptime.window);
                }
                continue;
            }

            self.mark_fired(alarm, &uptime.window);
            log::info!("Alarm '{}' fired for item {}", alarm.name, alarm.item);
            events.push(SchedulerEvent::AlarmFired(self.fired_event(alarm, uptime.window, now)));
        }

        // Forget bookkeeping of alarms that no longer exist.
        self.last_fired.retain(|id, _| registry.contains_alarm(*id));
        self.warned.retain(|id| registry.contains_alarm(*id));

        events
    }

    fn mark_fired(&mut self, alarm: &Alarm, window: &TimeWindow) {
        self.last_fired.insert(
            alarm.id,
            FiredMark {
                item: alarm.item,
                window_start: window.start,
            },
        );
    }

    fn fired_event(&self, alarm: &Alarm, window: TimeWindow, now: ServerTime) -> AlarmFired {
        let message = if alarm.print_message {
            self.render_message(alarm, &window, now)
        } else {
            None
        };
        AlarmFired {
            alarm_id: alarm.id,
            gatherable_id: alarm.item,
            alarm_name: alarm.name.clone(),
            window,
            sound: alarm.sound,
            message,
        }
    }

    fn render_message(&self, alarm: &Alarm, window: &TimeWindow, now: ServerTime) -> Option<String> {
        let language = self.settings.language;
        let item = self.catalog.gatherable(alarm.item)?;
        let location = alarm
            .preferred_location
            .or_else(|| item.locations.first().copied())
            .and_then(|id| self.catalog.location(id))
            .map(|location| location.name(language));
        message::format_alarm_message(
            &self.settings.format,
            alarm,
            &item.name(language),
            location.as_deref(),
            window,
            now,
        )
    }

    /// Eorzea hour and weather boundaries. Nothing is emitted on the first
    /// tick or when the clock moves backwards.
    fn tick_chimes(&mut self, suppressed: bool, now: ServerTime) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();

        let hour = uptime::eorzea_hour_index(now);
        if advance(&mut self.last_hour, hour) && !suppressed && !self.settings.hour_sound.is_silent() {
            events.push(SchedulerEvent::EorzeaHourChanged {
                hour: uptime::eorzea_hour(now),
                sound: self.settings.hour_sound,
            });
        }

        let weather = uptime::weather_index(now);
        if advance(&mut self.last_weather, weather) && !suppressed && !self.settings.weather_sound.is_silent() {
            events.push(SchedulerEvent::WeatherChanged {
                sound: self.settings.weather_sound,
            });
        }

        events
    }
}

/// Record `index` and report whether it moved past the previous value.
fn advance(last: &mut Option<i64>, index: i64) -> bool {
    match *last {
        None => {
            *last = Some(index);
            false
        }
        Some(prev) if index > prev => {
            *last = Some(index);
            true
        }
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alarms::model::Sound;
    use crate::core::catalog::StaticCatalog;
    use crate::core::uptime::{UptimeRule, EORZEA_HOUR_SECS, WEATHER_PERIOD_SECS};

    const ORE: GatherableId = 1;
    const COPPER: GatherableId = 2;

    fn catalog() -> Arc<dyn Catalog> {
        Arc::new(
            StaticCatalog::new()
                .with_item(
                    ORE,
                    "Rarefied Ore",
                    Some(UptimeRule::Periodic {
                        period: 2000,
                        phase: 1000,
                        duration: 1000,
                    }),
                    &[10],
                )
                .with_item(COPPER, "Copper Ore", None, &[])
                .with_location(10, "Mor Dhona"),
        )
    }

    fn setup(alarm: Alarm) -> (AlarmRegistry, AlarmScheduler, AlarmId) {
        setup_with(alarm, AlarmSettings::default())
    }

    fn setup_with(alarm: Alarm, settings: AlarmSettings) -> (AlarmRegistry, AlarmScheduler, AlarmId) {
        let catalog = catalog();
        let mut registry = AlarmRegistry::new(catalog.clone());
        registry.add_group("Main").unwrap();
        let id = registry.add_alarm(0, alarm).unwrap();
        (registry, AlarmScheduler::new(settings, catalog), id)
    }

    fn fired(events: &[SchedulerEvent]) -> Vec<&AlarmFired> {
        events
            .iter()
            .filter_map(|event| match event {
                SchedulerEvent::AlarmFired(fired) => Some(fired),
                _ => None,
            })
            .collect()
    }

    fn tick(scheduler: &mut AlarmScheduler, registry: &AlarmRegistry, now: i64) -> usize {
        fired(&scheduler.tick(registry, AlarmGate::default(), ServerTime(now))).len()
    }

    #[test]
    fn test_sixty_second_offset_scenario() {
        let (registry, mut scheduler, id) = setup(Alarm::new(ORE).with_offset(60));

        assert_eq!(tick(&mut scheduler, &registry, 939), 0);

        let events = scheduler.tick(&registry, AlarmGate::default(), ServerTime(940));
        let fired = fired(&events);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].alarm_id, id);
        assert_eq!(fired[0].gatherable_id, ORE);
        assert_eq!(fired[0].window, TimeWindow::bounded(ServerTime(1000), ServerTime(2000)));

        for now in 941..2000 {
            assert_eq!(tick(&mut scheduler, &registry, now), 0, "re-fired at {now}");
        }

        assert_eq!(tick(&mut scheduler, &registry, 2100), 0);
        assert_eq!(tick(&mut scheduler, &registry, 2939), 0);
        assert_eq!(tick(&mut scheduler, &registry, 2940), 1);
        assert_eq!(scheduler.last_fired(id), Some(ServerTime(3000)));
    }

    #[test]
    fn test_offset_boundary_never_early() {
        for offset in [0u32, 1, 59, 500, 999] {
            let (registry, mut scheduler, _) = setup(Alarm::new(ORE).with_offset(offset));
            let fire_at = 1000 - i64::from(offset);
            for now in 0..fire_at {
                assert_eq!(tick(&mut scheduler, &registry, now), 0, "offset {offset} fired early at {now}");
            }
            assert_eq!(tick(&mut scheduler, &registry, fire_at), 1);
        }
    }

    #[test]
    fn test_offset_clamped_to_previous_window_end() {
        // An offset longer than the downtime fires at the end of the last window.
        let (registry, mut scheduler, _) = setup(Alarm::new(ORE).with_offset(1500));
        assert_eq!(tick(&mut scheduler, &registry, 1500), 1);
        assert_eq!(tick(&mut scheduler, &registry, 1999), 0);
        assert_eq!(tick(&mut scheduler, &registry, 2000), 1);

        let alarm = registry.alarm(0, 0).unwrap();
        let uptime = scheduler.uptime(alarm, ServerTime(2000)).unwrap();
        assert_eq!(uptime.fire_at, ServerTime(2000));
    }

    #[test]
    fn test_repeated_ticks_are_idempotent() {
        let (registry, mut scheduler, _) = setup(Alarm::new(ORE));
        let total: usize = (0..4)
            .map(|_| tick(&mut scheduler, &registry, 1200))
            .sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn test_clock_regression_does_not_refire() {
        let (registry, mut scheduler, _) = setup(Alarm::new(ORE).with_offset(60));
        assert_eq!(tick(&mut scheduler, &registry, 950), 1);
        // Back before the fire instant, then back into the previous window.
        assert_eq!(tick(&mut scheduler, &registry, 900), 0);
        assert_eq!(tick(&mut scheduler, &registry, -500), 0);
        assert_eq!(tick(&mut scheduler, &registry, 960), 0);
        assert_eq!(tick(&mut scheduler, &registry, 2940), 1);
    }

    #[test]
    fn test_unrestricted_item_fires_once() {
        let (registry, mut scheduler, _) = setup(Alarm::new(COPPER));
        assert_eq!(tick(&mut scheduler, &registry, 10), 1);
        assert_eq!(tick(&mut scheduler, &registry, 100_000), 0);
    }

    #[test]
    fn test_suppressed_crossing_fires_after_lift() {
        let (registry, mut scheduler, _) = setup(Alarm::new(ORE).with_offset(60));
        let in_duty = AlarmGate { in_duty: true, logged_in: true };
        for now in 930..1100 {
            assert!(fired(&scheduler.tick(&registry, in_duty, ServerTime(now))).is_empty());
        }
        assert_eq!(tick(&mut scheduler, &registry, 1100), 1);
    }

    #[test]
    fn test_suppressed_through_window_is_lost() {
        let (registry, mut scheduler, _) = setup(Alarm::new(ORE).with_offset(60));
        let logged_out = AlarmGate { in_duty: false, logged_in: false };
        for now in (930..2000).step_by(10) {
            assert!(fired(&scheduler.tick(&registry, logged_out, ServerTime(now))).is_empty());
        }
        // The 1000-2000 reminder never fires; the next window still does.
        assert_eq!(tick(&mut scheduler, &registry, 2050), 0);
        assert_eq!(tick(&mut scheduler, &registry, 2940), 1);
    }

    #[test]
    fn test_drop_policy_consumes_window() {
        let settings = AlarmSettings {
            suppression: SuppressionPolicy::Drop,
            ..AlarmSettings::default()
        };
        let (registry, mut scheduler, _) = setup_with(Alarm::new(ORE).with_offset(60), settings);
        let in_duty = AlarmGate { in_duty: true, logged_in: true };
        assert!(fired(&scheduler.tick(&registry, in_duty, ServerTime(950))).is_empty());
        assert_eq!(tick(&mut scheduler, &registry, 1100), 0);
        assert_eq!(tick(&mut scheduler, &registry, 2940), 1);
    }

    #[test]
    fn test_disabled_alarms_and_groups_are_skipped() {
        let (mut registry, mut scheduler, id) = setup(Alarm::new(ORE));
        registry.toggle_group(0).unwrap();
        assert_eq!(tick(&mut scheduler, &registry, 1100), 0);
        assert_eq!(scheduler.last_fired(id), None);

        registry.toggle_group(0).unwrap();
        registry.toggle_alarm(0, 0).unwrap();
        assert_eq!(tick(&mut scheduler, &registry, 1100), 0);

        registry.toggle_alarm(0, 0).unwrap();
        assert_eq!(tick(&mut scheduler, &registry, 1100), 1);
    }

    #[test]
    fn test_missing_item_does_not_block_others() {
        let mut items = StaticCatalog::new()
            .with_item(COPPER, "Copper Ore", None, &[])
            .with_item(3, "Gone", None, &[]);
        let registry_catalog: Arc<dyn Catalog> = Arc::new(
            StaticCatalog::new()
                .with_item(COPPER, "Copper Ore", None, &[])
                .with_item(3, "Gone", None, &[]),
        );
        let mut registry = AlarmRegistry::new(registry_catalog);
        registry.add_group("Main").unwrap();
        registry.add_alarm(0, Alarm::new(3)).unwrap();
        registry.add_alarm(0, Alarm::new(COPPER)).unwrap();

        // The scheduler's catalog no longer knows item 3.
        items.remove_gatherable(3);
        let mut scheduler = AlarmScheduler::new(AlarmSettings::default(), Arc::new(items));
        let events = scheduler.tick(&registry, AlarmGate::default(), ServerTime(0));
        let fired = fired(&events);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].gatherable_id, COPPER);
    }

    #[test]
    fn test_retargeted_alarm_fires_for_new_item() {
        let (mut registry, mut scheduler, _) = setup(Alarm::new(COPPER));
        assert_eq!(tick(&mut scheduler, &registry, 1100), 1);
        registry.set_alarm_item(0, 0, ORE).unwrap();
        assert_eq!(tick(&mut scheduler, &registry, 1100), 1);
    }

    #[test]
    fn test_deleted_alarm_bookkeeping_is_pruned() {
        let (mut registry, mut scheduler, id) = setup(Alarm::new(ORE));
        assert_eq!(tick(&mut scheduler, &registry, 1100), 1);
        registry.delete_alarm(0, 0).unwrap();
        tick(&mut scheduler, &registry, 1101);
        assert_eq!(scheduler.last_fired(id), None);
    }

    #[test]
    fn test_message_only_when_requested() {
        let (mut registry, mut scheduler, _) = setup(Alarm::new(ORE).with_name("Ore").with_offset(60));
        let events = scheduler.tick(&registry, AlarmGate::default(), ServerTime(940));
        assert_eq!(fired(&events)[0].message, None);

        registry.set_alarm_message(0, 0, true).unwrap();
        let events = scheduler.tick(&registry, AlarmGate::default(), ServerTime(2940));
        assert_eq!(
            fired(&events)[0].message.as_deref(),
            Some("[Alarm Ore]: Rarefied Ore will be up in 1:00. Mor Dhona")
        );
    }

    #[test]
    fn test_countdown() {
        let (registry, scheduler, _) = setup(Alarm::new(ORE).with_offset(60));
        let alarm = registry.alarm(0, 0).unwrap();
        assert_eq!(
            scheduler.countdown(alarm, ServerTime(900)).unwrap(),
            AlarmCountdown::Pending { seconds: 40 }
        );
        assert_eq!(scheduler.countdown(alarm, ServerTime(940)).unwrap(), AlarmCountdown::Triggered);
        assert_eq!(
            scheduler.countdown(&Alarm::new(99), ServerTime(0)),
            Err(AlarmError::UnknownItem(99))
        );
    }

    #[test]
    fn test_chimes() {
        let settings = AlarmSettings {
            hour_sound: Sound::Effect(2),
            weather_sound: Sound::Effect(5),
            ..AlarmSettings::default()
        };
        let catalog = catalog();
        let registry = AlarmRegistry::new(catalog.clone());
        let mut scheduler = AlarmScheduler::new(settings, catalog);
        let gate = AlarmGate::default();

        assert!(scheduler.tick(&registry, gate, ServerTime(10)).is_empty());
        assert!(scheduler.tick(&registry, gate, ServerTime(EORZEA_HOUR_SECS - 1)).is_empty());
        assert_eq!(
            scheduler.tick(&registry, gate, ServerTime(EORZEA_HOUR_SECS)),
            vec![SchedulerEvent::EorzeaHourChanged { hour: 1, sound: Sound::Effect(2) }]
        );

        let events = scheduler.tick(&registry, gate, ServerTime(WEATHER_PERIOD_SECS));
        assert_eq!(
            events,
            vec![
                SchedulerEvent::EorzeaHourChanged { hour: 8, sound: Sound::Effect(2) },
                SchedulerEvent::WeatherChanged { sound: Sound::Effect(5) },
            ]
        );

        // Going backwards never chimes.
        assert!(scheduler.tick(&registry, gate, ServerTime(10)).is_empty());
    }

    #[test]
    fn test_silent_chimes_are_not_emitted() {
        let catalog = catalog();
        let registry = AlarmRegistry::new(catalog.clone());
        let mut scheduler = AlarmScheduler::new(AlarmSettings::default(), catalog);
        scheduler.tick(&registry, AlarmGate::default(), ServerTime(0));
        assert!(scheduler
            .tick(&registry, AlarmGate::default(), ServerTime(WEATHER_PERIOD_SECS))
            .is_empty());
    }
}
