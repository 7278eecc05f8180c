use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only wall-clock time type.
pub type Ms = i64;

pub fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

/// Half-open stay range `[check_in, check_out)` — a one-night stay touches
/// exactly one calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl DateRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        Self { check_in, check_out }
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// The dates a stay occupies, in order. Pure and restartable; empty when
    /// the range is empty or inverted.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.check_out;
        self.check_in.iter_days().take_while(move |d| *d < end)
    }
}

/// A bookable room category on a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomType {
    pub room_type_id: String,
    pub name: String,
    pub max_occupancy: u32,
    pub base_price_usd: f64,
}

/// Immutable catalog record for one property. The `availability_calendar` is
/// the seed capacity: the engine copies it into its live ledger once at
/// construction and never reads it again, so it is excluded from responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub property_id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    pub star_rating: u8,
    #[serde(default)]
    pub amenities: Vec<String>,
    pub room_types: Vec<RoomType>,
    #[serde(default, skip_serializing)]
    pub availability_calendar: BTreeMap<NaiveDate, BTreeMap<String, u32>>,
}

impl Property {
    pub fn room_type(&self, id: &str) -> Option<&RoomType> {
        self.room_types.iter().find(|r| r.room_type_id == id)
    }
}

/// Lifecycle of a hold. All transitions out of `Active` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoldStatus {
    Active,
    Consumed,
    Expired,
    Released,
}

impl HoldStatus {
    pub fn is_terminal(self) -> bool {
        self != HoldStatus::Active
    }
}

/// A time-bounded provisional reservation. The room-nights are debited from
/// the ledger when the hold is placed, so consuming it never touches the
/// ledger again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hold {
    pub id: Ulid,
    pub property_id: String,
    pub room_type: String,
    pub range: DateRange,
    pub rooms: u32,
    pub session_id: String,
    pub created_at: Ms,
    pub expires_at: Ms,
    pub status: HoldStatus,
}

/// Permanent record of a completed booking. Created exactly once, immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub number: String,
    pub property_id: String,
    pub room_type: String,
    pub range: DateRange,
    pub rooms: u32,
    pub created_at: Ms,
}

/// The event types — flat, no nesting. This is the journal record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    HoldPlaced {
        id: Ulid,
        property_id: String,
        room_type: String,
        range: DateRange,
        rooms: u32,
        session_id: String,
        created_at: Ms,
        expires_at: Ms,
    },
    /// Explicit cancel.
    HoldReleased { id: Ulid, property_id: String },
    /// Reaper-driven (or lazy) expiry.
    HoldExpired { id: Ulid, property_id: String },
    /// A hold converted into a confirmation.
    HoldConsumed {
        id: Ulid,
        property_id: String,
        confirmation_number: String,
        created_at: Ms,
    },
    /// Direct confirmation with no prior hold.
    BookingConfirmed {
        confirmation_number: String,
        property_id: String,
        room_type: String,
        range: DateRange,
        rooms: u32,
        created_at: Ms,
    },
}

impl Event {
    pub fn property_id(&self) -> &str {
        match self {
            Event::HoldPlaced { property_id, .. }
            | Event::HoldReleased { property_id, .. }
            | Event::HoldExpired { property_id, .. }
            | Event::HoldConsumed { property_id, .. }
            | Event::BookingConfirmed { property_id, .. } => property_id,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

/// One search hit: the property summary plus the room types that fit the party.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotelSummary {
    pub property_id: String,
    pub name: String,
    pub star_rating: u8,
    pub amenities: Vec<String>,
    pub room_types: Vec<RoomType>,
}

/// A page of search hits plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResults {
    pub hotels: Vec<HotelSummary>,
    pub count: usize,
}

/// Result of a range availability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AvailabilityReport {
    pub available: bool,
    pub available_rooms: u32,
    pub requested: u32,
}
