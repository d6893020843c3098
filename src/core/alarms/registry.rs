// Alarm registry - the only place alarms and groups are created, edited,
// reordered or removed.
//
// Every operation validates before committing, so a failed call leaves the
// registry exactly as it was.

use std::sync::Arc;

use thiserror::Error;

use super::export::{self, ImportError, ImportReport};
use super::model::{
    Alarm, AlarmGroup, AlarmId, Sound, MAX_DESCRIPTION_LEN, MAX_NAME_LEN, MAX_OFFSET_SECS,
};
use crate::core::catalog::Catalog;
use crate::core::model::{GatherableId, LocationId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no alarm group at index {0}")]
    GroupIndex(usize),
    #[error("no alarm at index {index} in group {group}")]
    AlarmIndex { group: usize, index: usize },
    #[error("text exceeds {max} characters")]
    TooLong { max: usize },
    #[error("unknown gatherable {0}")]
    UnknownItem(GatherableId),
    #[error("location {location} is not a gathering point of item {item}")]
    InvalidLocation { item: GatherableId, location: LocationId },
    #[error("sound effect {0} is out of range")]
    InvalidSound(u8),
    #[error("failed to encode alarm group: {0}")]
    Encode(String),
}

pub struct AlarmRegistry {
    groups: Vec<AlarmGroup>,
    catalog: Arc<dyn Catalog>,
    next_id: AlarmId,
}

impl AlarmRegistry {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            groups: Vec::new(),
            catalog,
            next_id: 1,
        }
    }

    /// Rebuild a registry from persisted groups. Alarms that fail validation
    /// are dropped; the number dropped is returned alongside.
    pub fn from_groups(catalog: Arc<dyn Catalog>, groups: Vec<AlarmGroup>) -> (Self, usize) {
        let mut registry = Self::new(catalog);
        let mut skipped = 0;
        for group in groups {
            let (group, dropped) = registry.sanitize_group(group);
            skipped += dropped;
            registry.insert_group(group);
        }
        if skipped > 0 {
            log::warn!("Skipped {} invalid alarms while loading alarm groups", skipped);
        }
        (registry, skipped)
    }

    pub fn groups(&self) -> &[AlarmGroup] {
        &self.groups
    }

    pub fn group(&self, idx: usize) -> Result<&AlarmGroup, RegistryError> {
        self.groups.get(idx).ok_or(RegistryError::GroupIndex(idx))
    }

    pub fn alarm(&self, group: usize, idx: usize) -> Result<&Alarm, RegistryError> {
        self.group(group)?
            .alarms
            .get(idx)
            .ok_or(RegistryError::AlarmIndex { group, index: idx })
    }

    /// Position `(group, index)` of the alarm with the given id.
    pub fn find(&self, id: AlarmId) -> Option<(usize, usize)> {
        self.groups.iter().enumerate().find_map(|(g, group)| {
            group
                .alarms
                .iter()
                .position(|alarm| alarm.id == id)
                .map(|a| (g, a))
        })
    }

    pub fn contains_alarm(&self, id: AlarmId) -> bool {
        self.find(id).is_some()
    }

    /// Alarms that are enabled and sit in an enabled group.
    pub fn active_alarms(&self) -> impl Iterator<Item = &Alarm> {
        self.groups
            .iter()
            .filter(|group| group.enabled)
            .flat_map(|group| group.alarms.iter().filter(|alarm| alarm.enabled))
    }

    // Groups

    pub fn add_group(&mut self, name: &str) -> Result<usize, RegistryError> {
        check_len(name, MAX_NAME_LEN)?;
        Ok(self.insert_group(AlarmGroup::new(name)))
    }

    pub fn delete_group(&mut self, idx: usize) -> Result<AlarmGroup, RegistryError> {
        self.group(idx)?;
        Ok(self.groups.remove(idx))
    }

    /// Move a group from `from` to `to`; a destination past the end moves it
    /// to the end.
    pub fn move_group(&mut self, from: usize, to: usize) -> Result<&AlarmGroup, RegistryError> {
        self.group(from)?;
        let dest = move_item(&mut self.groups, from, to);
        Ok(&self.groups[dest])
    }

    /// Flip a group's enabled flag, returning the new value.
    pub fn toggle_group(&mut self, idx: usize) -> Result<bool, RegistryError> {
        let group = self.group_mut(idx)?;
        group.enabled = !group.enabled;
        log::debug!("Alarm group '{}' enabled: {}", group.name, group.enabled);
        Ok(group.enabled)
    }

    pub fn set_group_name(&mut self, idx: usize, name: &str) -> Result<&AlarmGroup, RegistryError> {
        check_len(name, MAX_NAME_LEN)?;
        let group = self.group_mut(idx)?;
        group.name = name.to_string();
        Ok(group)
    }

    pub fn set_group_description(&mut self, idx: usize, description: &str) -> Result<&AlarmGroup, RegistryError> {
        check_len(description, MAX_DESCRIPTION_LEN)?;
        let group = self.group_mut(idx)?;
        group.description = description.to_string();
        Ok(group)
    }

    /// Copy a group under a new name. The copy's alarms get fresh ids.
    pub fn duplicate_group(&mut self, idx: usize, name: &str) -> Result<usize, RegistryError> {
        check_len(name, MAX_NAME_LEN)?;
        let mut copy = self.group(idx)?.clone();
        copy.name = name.to_string();
        Ok(self.insert_group(copy))
    }

    /// Enable or disable every alarm in a group; returns how many changed.
    pub fn set_all_alarms(&mut self, group: usize, enabled: bool) -> Result<usize, RegistryError> {
        let group = self.group_mut(group)?;
        let mut changed = 0;
        for alarm in group.alarms.iter_mut().filter(|a| a.enabled != enabled) {
            alarm.enabled = enabled;
            changed += 1;
        }
        Ok(changed)
    }

    // Alarms

    pub fn add_alarm(&mut self, group: usize, mut alarm: Alarm) -> Result<AlarmId, RegistryError> {
        self.group(group)?;
        self.validate_alarm(&mut alarm)?;
        alarm.id = self.allocate_id();
        let id = alarm.id;
        self.groups[group].alarms.push(alarm);
        Ok(id)
    }

    pub fn delete_alarm(&mut self, group: usize, idx: usize) -> Result<Alarm, RegistryError> {
        self.alarm(group, idx)?;
        Ok(self.groups[group].alarms.remove(idx))
    }

    /// Reorder an alarm within its group.
    pub fn move_alarm(&mut self, group: usize, from: usize, to: usize) -> Result<&Alarm, RegistryError> {
        self.alarm(group, from)?;
        let alarms = &mut self.groups[group].alarms;
        let dest = move_item(alarms, from, to);
        Ok(&alarms[dest])
    }

    /// Move an alarm into another group at `to` (clamped to the end).
    pub fn move_alarm_to(
        &mut self,
        group: usize,
        from: usize,
        target_group: usize,
        to: usize,
    ) -> Result<&Alarm, RegistryError> {
        self.alarm(group, from)?;
        self.group(target_group)?;
        if group == target_group {
            return self.move_alarm(group, from, to);
        }
        let alarm = self.groups[group].alarms.remove(from);
        let target = &mut self.groups[target_group].alarms;
        let dest = to.min(target.len());
        target.insert(dest, alarm);
        Ok(&target[dest])
    }

    pub fn toggle_alarm(&mut self, group: usize, idx: usize) -> Result<bool, RegistryError> {
        let alarm = self.alarm_mut(group, idx)?;
        alarm.enabled = !alarm.enabled;
        Ok(alarm.enabled)
    }

    pub fn set_alarm_name(&mut self, group: usize, idx: usize, name: &str) -> Result<&Alarm, RegistryError> {
        check_len(name, MAX_NAME_LEN)?;
        let alarm = self.alarm_mut(group, idx)?;
        alarm.name = name.to_string();
        Ok(alarm)
    }

    /// Set the offset, clamped to `[0, MAX_OFFSET_SECS]`.
    pub fn set_alarm_offset(&mut self, group: usize, idx: usize, offset_seconds: i64) -> Result<&Alarm, RegistryError> {
        let alarm = self.alarm_mut(group, idx)?;
        alarm.offset_seconds = clamp_offset(offset_seconds);
        Ok(alarm)
    }

    pub fn set_alarm_sound(&mut self, group: usize, idx: usize, sound: Sound) -> Result<&Alarm, RegistryError> {
        check_sound(sound)?;
        let alarm = self.alarm_mut(group, idx)?;
        alarm.sound = sound;
        Ok(alarm)
    }

    pub fn set_alarm_message(&mut self, group: usize, idx: usize, print_message: bool) -> Result<&Alarm, RegistryError> {
        let alarm = self.alarm_mut(group, idx)?;
        alarm.print_message = print_message;
        Ok(alarm)
    }

    /// Retarget an alarm. A preferred location that does not belong to the
    /// new item is cleared.
    pub fn set_alarm_item(&mut self, group: usize, idx: usize, item: GatherableId) -> Result<&Alarm, RegistryError> {
        self.alarm(group, idx)?;
        if self.catalog.gatherable(item).is_none() {
            return Err(RegistryError::UnknownItem(item));
        }
        let keep_location = self.alarm(group, idx)?
            .preferred_location
            .is_some_and(|loc| self.catalog.has_location(item, loc));
        let alarm = self.alarm_mut(group, idx)?;
        alarm.item = item;
        if !keep_location {
            alarm.preferred_location = None;
        }
        Ok(alarm)
    }

    pub fn set_alarm_location(
        &mut self,
        group: usize,
        idx: usize,
        location: Option<LocationId>,
    ) -> Result<&Alarm, RegistryError> {
        let item = self.alarm(group, idx)?.item;
        if let Some(location) = location {
            if !self.catalog.has_location(item, location) {
                return Err(RegistryError::InvalidLocation { item, location });
            }
        }
        let alarm = self.alarm_mut(group, idx)?;
        alarm.preferred_location = location;
        Ok(alarm)
    }

    // Clipboard

    pub fn export_group(&self, idx: usize) -> Result<String, RegistryError> {
        let group = self.group(idx)?;
        export::encode_group(group).map_err(|e| RegistryError::Encode(e.to_string()))
    }

    /// Import a group from its clipboard form under `name`. The imported group
    /// starts disabled; alarms referencing unknown items are skipped.
    pub fn import_group(&mut self, name: &str, data: &str) -> Result<ImportReport, ImportError> {
        check_len(name, MAX_NAME_LEN)?;
        let mut group = export::decode_group(data)?;
        group.name = name.to_string();
        group.enabled = false;
        if group.description.chars().count() > MAX_DESCRIPTION_LEN {
            group.description = group.description.chars().take(MAX_DESCRIPTION_LEN).collect();
        }

        let (group, skipped) = self.sanitize_group(group);
        if skipped > 0 {
            log::warn!("Skipped {} invalid alarms while importing '{}'", skipped, name);
        }
        let imported = group.alarms.len();
        let group_index = self.insert_group(group);
        Ok(ImportReport {
            group_index,
            imported,
            skipped,
        })
    }

    fn group_mut(&mut self, idx: usize) -> Result<&mut AlarmGroup, RegistryError> {
        self.groups.get_mut(idx).ok_or(RegistryError::GroupIndex(idx))
    }

    fn alarm_mut(&mut self, group: usize, idx: usize) -> Result<&mut Alarm, RegistryError> {
        self.group_mut(group)?
            .alarms
            .get_mut(idx)
            .ok_or(RegistryError::AlarmIndex { group, index: idx })
    }

    fn allocate_id(&mut self) -> AlarmId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Append a group, assigning fresh ids to all of its alarms.
    fn insert_group(&mut self, mut group: AlarmGroup) -> usize {
        for alarm in &mut group.alarms {
            alarm.id = self.allocate_id();
        }
        self.groups.push(group);
        self.groups.len() - 1
    }

    /// Drop alarms that fail validation; returns the cleaned group and the
    /// number dropped.
    fn sanitize_group(&self, mut group: AlarmGroup) -> (AlarmGroup, usize) {
        let before = group.alarms.len();
        group.alarms.retain_mut(|alarm| match self.validate_alarm(alarm) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Dropping alarm '{}': {}", alarm.name, e);
                false
            }
        });
        let dropped = before - group.alarms.len();
        (group, dropped)
    }

    /// Check an incoming alarm, normalizing what can be normalized.
    fn validate_alarm(&self, alarm: &mut Alarm) -> Result<(), RegistryError> {
        check_len(&alarm.name, MAX_NAME_LEN)?;
        check_sound(alarm.sound)?;
        if self.catalog.gatherable(alarm.item).is_none() {
            return Err(RegistryError::UnknownItem(alarm.item));
        }
        alarm.offset_seconds = alarm.offset_seconds.min(MAX_OFFSET_SECS);
        if let Some(location) = alarm.preferred_location {
            if !self.catalog.has_location(alarm.item, location) {
                alarm.preferred_location = None;
            }
        }
        Ok(())
    }
}

/// Remove at `from`, insert at `to` clamped to the list end. Returns the
/// final index of the moved element.
fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> usize {
    let item = items.remove(from);
    let dest = to.min(items.len());
    items.insert(dest, item);
    dest
}

fn clamp_offset(offset_seconds: i64) -> u32 {
    u32::try_from(offset_seconds.clamp(0, i64::from(MAX_OFFSET_SECS))).unwrap_or(MAX_OFFSET_SECS)
}

fn check_len(text: &str, max: usize) -> Result<(), RegistryError> {
    if text.chars().count() > max {
        return Err(RegistryError::TooLong { max });
    }
    Ok(())
}

fn check_sound(sound: Sound) -> Result<(), RegistryError> {
    match sound {
        Sound::Effect(idx) if !sound.is_valid() => Err(RegistryError::InvalidSound(idx)),
        _ => Ok(()),
    }
}
