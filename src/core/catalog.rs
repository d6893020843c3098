//! Read-only lookup of gatherable items and their gathering points.
//!
//! The scheduler and registry only ever hold ids; names and uptime rules are
//! resolved here on demand.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::model::{GatherableId, Language, LocationId};
use super::uptime::UptimeRule;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gatherable {
    pub id: GatherableId,
    pub names: HashMap<Language, String>,
    /// `None` for items that can be gathered at any time.
    #[serde(default)]
    pub uptime: Option<UptimeRule>,
    #[serde(default)]
    pub locations: Vec<LocationId>,
}

impl Gatherable {
    /// Localized name, falling back to English and then to the id.
    pub fn name(&self, language: Language) -> String {
        self.names
            .get(&language)
            .or_else(|| self.names.get(&Language::English))
            .cloned()
            .unwrap_or_else(|| format!("#{}", self.id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub names: HashMap<Language, String>,
}

impl Location {
    pub fn name(&self, language: Language) -> String {
        self.names
            .get(&language)
            .or_else(|| self.names.get(&Language::English))
            .cloned()
            .unwrap_or_else(|| format!("#{}", self.id))
    }
}

pub trait Catalog: Send + Sync {
    fn gatherable(&self, id: GatherableId) -> Option<&Gatherable>;
    fn location(&self, id: LocationId) -> Option<&Location>;

    fn display_name(&self, id: GatherableId, language: Language) -> Option<String> {
        self.gatherable(id).map(|item| item.name(language))
    }

    /// True when `location` is one of the item's gathering points.
    fn has_location(&self, id: GatherableId, location: LocationId) -> bool {
        self.gatherable(id)
            .is_some_and(|item| item.locations.contains(&location))
    }
}

/// On-disk layout of `catalog.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    gatherables: Vec<Gatherable>,
    #[serde(default)]
    locations: Vec<Location>,
}

/// In-memory catalog, loaded once and shared read-only.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    gatherables: HashMap<GatherableId, Gatherable>,
    locations: HashMap<LocationId, Location>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        let file: CatalogFile = serde_json::from_str(content)?;
        let mut catalog = Self::new();
        for item in file.gatherables {
            catalog.insert_gatherable(item);
        }
        for location in file.locations {
            catalog.insert_location(location);
        }
        Ok(catalog)
    }

    pub fn insert_gatherable(&mut self, item: Gatherable) {
        self.gatherables.insert(item.id, item);
    }

    pub fn insert_location(&mut self, location: Location) {
        self.locations.insert(location.id, location);
    }

    pub fn remove_gatherable(&mut self, id: GatherableId) -> Option<Gatherable> {
        self.gatherables.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.gatherables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gatherables.is_empty()
    }

    /// Add an item with a single English name. Mostly useful in tests.
    pub fn with_item(mut self, id: GatherableId, name: &str, uptime: Option<UptimeRule>, locations: &[LocationId]) -> Self {
        self.insert_gatherable(Gatherable {
            id,
            names: HashMap::from([(Language::English, name.to_string())]),
            uptime,
            locations: locations.to_vec(),
        });
        self
    }

    pub fn with_location(mut self, id: LocationId, name: &str) -> Self {
        self.insert_location(Location {
            id,
            names: HashMap::from([(Language::English, name.to_string())]),
        });
        self
    }
}

impl Catalog for StaticCatalog {
    fn gatherable(&self, id: GatherableId) -> Option<&Gatherable> {
        self.gatherables.get(&id)
    }

    fn location(&self, id: LocationId) -> Option<&Location> {
        self.locations.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let json = r#"{
            "gatherables": [
                {
                    "id": 7,
                    "names": { "English": "Rarefied Ore", "German": "Seltenes Erz" },
                    "uptime": { "kind": "eorzea_hours", "start_hour": 8, "end_hour": 10 },
                    "locations": [3]
                },
                { "id": 8, "names": { "English": "Copper Ore" } }
            ],
            "locations": [ { "id": 3, "names": { "English": "Mor Dhona" } } ]
        }"#;
        let catalog = StaticCatalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.display_name(7, Language::German).as_deref(), Some("Seltenes Erz"));
        // Falls back to English when the language is missing.
        assert_eq!(catalog.display_name(7, Language::French).as_deref(), Some("Rarefied Ore"));
        assert!(catalog.gatherable(8).unwrap().uptime.is_none());
        assert!(catalog.has_location(7, 3));
        assert!(!catalog.has_location(8, 3));
        assert_eq!(catalog.location(3).unwrap().name(Language::Japanese), "Mor Dhona");
    }

    #[test]
    fn test_unknown_item() {
        let catalog = StaticCatalog::new().with_item(1, "Ore", None, &[]);
        assert!(catalog.display_name(2, Language::English).is_none());
        assert!(!catalog.has_location(2, 1));
    }
}
