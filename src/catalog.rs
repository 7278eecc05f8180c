use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::model::Property;

/// One seed file: every property for a city.
#[derive(Debug, Deserialize)]
struct CityFile {
    city: String,
    hotels: Vec<Property>,
}

/// Immutable property records, populated once during initialization.
/// The engine copies each property's seed calendar into its live ledger at
/// construction; the catalog itself has no mutation API.
pub struct CatalogStore {
    properties: Vec<Arc<Property>>,
    by_id: HashMap<String, Arc<Property>>,
    by_city: HashMap<String, Vec<Arc<Property>>>,
}

impl CatalogStore {
    pub fn from_properties(properties: Vec<Property>) -> Self {
        let mut store = Self {
            properties: Vec::new(),
            by_id: HashMap::new(),
            by_city: HashMap::new(),
        };
        for property in properties {
            store.insert(Arc::new(property));
        }
        store
    }

    /// Load every `*.json` seed file under `dir`. Files are read in name
    /// order so catalog insertion order is stable across restarts.
    pub fn load_dir(dir: &Path) -> io::Result<Self> {
        let mut files: Vec<_> = std::fs::read_dir(dir)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        let mut store = Self::from_properties(Vec::new());
        for path in files {
            let file = File::open(&path)?;
            let city_file: CityFile = serde_json::from_reader(BufReader::new(file))
                .map_err(|e| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("{}: {e}", path.display()),
                    )
                })?;
            let count = city_file.hotels.len();
            for mut hotel in city_file.hotels {
                // Seed files carry the city at the file level.
                if hotel.city.is_empty() {
                    hotel.city = city_file.city.clone();
                }
                store.insert(Arc::new(hotel));
            }
            info!("loaded {count} properties for {}", city_file.city);
        }
        Ok(store)
    }

    fn insert(&mut self, property: Arc<Property>) {
        if self.by_id.contains_key(&property.property_id) {
            warn!("duplicate property id {} ignored", property.property_id);
            return;
        }
        self.by_id
            .insert(property.property_id.clone(), property.clone());
        self.by_city
            .entry(property.city.clone())
            .or_default()
            .push(property.clone());
        self.properties.push(property);
    }

    pub fn get(&self, id: &str) -> Option<Arc<Property>> {
        self.by_id.get(id).cloned()
    }

    /// Properties in a city, insertion order. Unknown cities are empty, not
    /// an error.
    pub fn list_by_city(&self, city: &str) -> &[Arc<Property>] {
        self.by_city.get(city).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Property>> {
        self.properties.iter()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Write;

    use crate::model::RoomType;

    fn property(id: &str, city: &str) -> Property {
        Property {
            property_id: id.into(),
            name: format!("{id} hotel"),
            address: String::new(),
            city: city.into(),
            star_rating: 4,
            amenities: vec!["WiFi".into()],
            room_types: vec![RoomType {
                room_type_id: "standard_room".into(),
                name: "Standard Room".into(),
                max_occupancy: 2,
                base_price_usd: 150.0,
            }],
            availability_calendar: BTreeMap::new(),
        }
    }

    #[test]
    fn lookup_and_city_listing_preserve_order() {
        let store = CatalogStore::from_properties(vec![
            property("dubai_grand_001", "Dubai"),
            property("dubai_plaza_002", "Dubai"),
            property("london_royal_001", "London"),
        ]);

        assert_eq!(store.len(), 3);
        assert!(store.get("dubai_plaza_002").is_some());
        assert!(store.get("nope").is_none());

        let dubai: Vec<_> = store
            .list_by_city("Dubai")
            .iter()
            .map(|p| p.property_id.clone())
            .collect();
        assert_eq!(dubai, vec!["dubai_grand_001", "dubai_plaza_002"]);
        assert!(store.list_by_city("Paris").is_empty());
    }

    #[test]
    fn duplicate_property_ids_are_ignored() {
        let store = CatalogStore::from_properties(vec![
            property("dubai_grand_001", "Dubai"),
            property("dubai_grand_001", "London"),
        ]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("dubai_grand_001").unwrap().city, "Dubai");
    }

    #[test]
    fn load_dir_reads_seed_files_and_fills_city() {
        let dir = std::env::temp_dir().join(format!("stayd_test_catalog_{}", ulid::Ulid::new()));
        std::fs::create_dir_all(&dir).unwrap();

        let seed = serde_json::json!({
            "city": "Dubai",
            "hotels": [{
                "property_id": "dubai_grand_001",
                "name": "Dubai Grand Hotel",
                "star_rating": 5,
                "amenities": ["Pool", "Spa"],
                "room_types": [{
                    "room_type_id": "standard_room",
                    "name": "Standard Room",
                    "max_occupancy": 2,
                    "base_price_usd": 160.0
                }],
                "availability_calendar": {
                    "2025-12-01": { "standard_room": 10 }
                }
            }]
        });
        let mut f = File::create(dir.join("dubai-hotels.json")).unwrap();
        f.write_all(seed.to_string().as_bytes()).unwrap();

        let store = CatalogStore::load_dir(&dir).unwrap();
        assert_eq!(store.len(), 1);
        let hotel = store.get("dubai_grand_001").unwrap();
        assert_eq!(hotel.city, "Dubai");
        assert_eq!(
            hotel
                .availability_calendar
                .values()
                .next()
                .unwrap()
                .get("standard_room"),
            Some(&10)
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_dir_rejects_malformed_seed() {
        let dir = std::env::temp_dir().join(format!("stayd_test_catalog_{}", ulid::Ulid::new()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("bad.json"), b"{ not json").unwrap();

        let result = CatalogStore::load_dir(&dir);
        assert!(result.is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
