use std::sync::Arc;

use crate::limits::SEARCH_PAGE_SIZE;
use crate::model::*;

use super::ledger::validate_range;
use super::{Engine, EngineError};

impl Engine {
    /// The `search_hotels` operation: validates the stay range, then filters
    /// by capacity. The dates travel with every search request but play no
    /// part in the filter — availability is checked per property afterwards.
    pub fn search(
        &self,
        city: &str,
        min_guests: u32,
        range: &DateRange,
    ) -> Result<SearchResults, EngineError> {
        validate_range(range)?;
        Ok(self.search_by_capacity(city, min_guests))
    }

    /// City + party-size search over the catalog. Stable catalog insertion
    /// order, no ranking; at most one page of summaries plus the total
    /// match count.
    pub fn search_by_capacity(&self, city: &str, min_guests: u32) -> SearchResults {
        let mut hotels = Vec::new();
        let mut count = 0;
        for property in self.catalog.list_by_city(city) {
            let matching: Vec<RoomType> = property
                .room_types
                .iter()
                .filter(|room| room.max_occupancy >= min_guests)
                .cloned()
                .collect();
            if matching.is_empty() {
                continue;
            }
            count += 1;
            if hotels.len() < SEARCH_PAGE_SIZE {
                hotels.push(HotelSummary {
                    property_id: property.property_id.clone(),
                    name: property.name.clone(),
                    star_rating: property.star_rating,
                    amenities: property.amenities.clone(),
                    room_types: matching,
                });
            }
        }
        SearchResults { hotels, count }
    }

    /// Range availability for one room type: the minimum per-night count
    /// compared against the request. Dates outside the seeded calendar read
    /// as zero capacity, so an unseeded range reports unavailable rather
    /// than erroring.
    pub async fn check_availability(
        &self,
        property_id: &str,
        room_type: &str,
        range: &DateRange,
        rooms: u32,
    ) -> Result<AvailabilityReport, EngineError> {
        let property = self
            .catalog
            .get(property_id)
            .ok_or_else(|| EngineError::PropertyNotFound(property_id.to_string()))?;
        if property.room_type(room_type).is_none() {
            return Err(EngineError::RoomTypeNotFound {
                property_id: property_id.to_string(),
                room_type: room_type.to_string(),
            });
        }
        let shared = self
            .property(property_id)
            .ok_or_else(|| EngineError::PropertyNotFound(property_id.to_string()))?;
        let guard = shared.read().await;
        let available_rooms = guard.ledger.min_available(room_type, range)?;
        Ok(AvailabilityReport {
            available: available_rooms >= rooms,
            available_rooms,
            requested: rooms,
        })
    }

    /// The full catalog record for one property.
    pub fn property_details(&self, property_id: &str) -> Result<Arc<Property>, EngineError> {
        self.catalog
            .get(property_id)
            .ok_or_else(|| EngineError::PropertyNotFound(property_id.to_string()))
    }

    /// Hold records for one property, newest last. Diagnostic surface used
    /// by tests and operators, not exposed as a tool.
    pub async fn list_holds(&self, property_id: &str) -> Result<Vec<Hold>, EngineError> {
        let shared = self
            .property(property_id)
            .ok_or_else(|| EngineError::PropertyNotFound(property_id.to_string()))?;
        let guard = shared.read().await;
        let mut holds: Vec<Hold> = guard.holds.values().cloned().collect();
        holds.sort_by_key(|hold| hold.id);
        Ok(holds)
    }
}
