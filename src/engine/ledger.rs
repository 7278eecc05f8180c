use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::limits::*;
use crate::model::DateRange;

use super::EngineError;

pub(crate) fn validate_range(range: &DateRange) -> Result<(), EngineError> {
    if range.check_out <= range.check_in {
        return Err(EngineError::InvalidDateRange {
            check_in: range.check_in,
            check_out: range.check_out,
        });
    }
    Ok(())
}

/// Guard rails for mutating operations on top of the basic range check.
pub(crate) fn validate_stay(range: &DateRange, rooms: u32) -> Result<(), EngineError> {
    validate_range(range)?;
    if range.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    if rooms == 0 {
        return Err(EngineError::LimitExceeded("rooms must be at least 1"));
    }
    if rooms > MAX_ROOMS_PER_REQUEST {
        return Err(EngineError::LimitExceeded("too many rooms"));
    }
    Ok(())
}

/// Per-property room-night counters: room type → date → unreserved count.
///
/// Pure data structure — serializing access is the engine's job. Every count
/// is `>= 0` at every observable instant because `reserve` refuses the whole
/// range before touching any date.
#[derive(Debug, Clone, Default)]
pub struct RoomLedger {
    counts: HashMap<String, BTreeMap<NaiveDate, u32>>,
}

impl RoomLedger {
    /// One-time value copy of a property's seed calendar, performed at
    /// engine construction. Dates absent from the seed have zero capacity.
    pub fn from_calendar(calendar: &BTreeMap<NaiveDate, BTreeMap<String, u32>>) -> Self {
        let mut counts: HashMap<String, BTreeMap<NaiveDate, u32>> = HashMap::new();
        for (date, per_room) in calendar {
            for (room_type, n) in per_room {
                counts.entry(room_type.clone()).or_default().insert(*date, *n);
            }
        }
        Self { counts }
    }

    /// Unreserved rooms of `room_type` on `date`; 0 when the date is absent.
    pub fn available_on(&self, room_type: &str, date: NaiveDate) -> u32 {
        self.counts
            .get(room_type)
            .and_then(|per_date| per_date.get(&date))
            .copied()
            .unwrap_or(0)
    }

    /// Minimum `available_on` over every date in the half-open range.
    pub fn min_available(&self, room_type: &str, range: &DateRange) -> Result<u32, EngineError> {
        validate_range(range)?;
        Ok(range
            .days()
            .map(|date| self.available_on(room_type, date))
            .min()
            .unwrap_or(0))
    }

    /// Remove `rooms` from every date in the range. All-or-nothing: the
    /// first date that cannot cover the request aborts the call with nothing
    /// mutated, naming that date and the available count.
    pub fn reserve(
        &mut self,
        room_type: &str,
        range: &DateRange,
        rooms: u32,
    ) -> Result<(), EngineError> {
        validate_range(range)?;
        for date in range.days() {
            let available = self.available_on(room_type, date);
            if available < rooms {
                return Err(EngineError::InsufficientInventory {
                    date,
                    requested: rooms,
                    available,
                });
            }
        }
        let per_date = self.counts.entry(room_type.to_string()).or_default();
        for date in range.days() {
            if let Some(count) = per_date.get_mut(&date) {
                *count -= rooms;
            }
        }
        Ok(())
    }

    /// Return `rooms` to every date in the range, creating absent dates.
    /// Idempotency is the caller's concern — the increment is unconditional.
    pub fn release(&mut self, room_type: &str, range: &DateRange, rooms: u32) {
        let per_date = self.counts.entry(room_type.to_string()).or_default();
        for date in range.days() {
            *per_date.entry(date).or_insert(0) += rooms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn range(a: &str, b: &str) -> DateRange {
        DateRange::new(d(a), d(b))
    }

    fn ledger(room_type: &str, from: &str, to: &str, count: u32) -> RoomLedger {
        let mut calendar = BTreeMap::new();
        for date in range(from, to).days() {
            calendar.insert(date, BTreeMap::from([(room_type.to_string(), count)]));
        }
        RoomLedger::from_calendar(&calendar)
    }

    #[test]
    fn absent_dates_have_zero_capacity() {
        let ledger = ledger("standard_room", "2025-12-01", "2025-12-03", 10);
        assert_eq!(ledger.available_on("standard_room", d("2025-12-01")), 10);
        assert_eq!(ledger.available_on("standard_room", d("2025-12-03")), 0);
        assert_eq!(ledger.available_on("deluxe_room", d("2025-12-01")), 0);
    }

    #[test]
    fn min_available_covers_exactly_the_range() {
        let mut ledger = ledger("standard_room", "2025-12-01", "2025-12-05", 10);
        ledger
            .reserve("standard_room", &range("2025-12-02", "2025-12-03"), 4)
            .unwrap();

        // Dip on 12-02 is only visible when the range includes it.
        assert_eq!(
            ledger
                .min_available("standard_room", &range("2025-12-01", "2025-12-02"))
                .unwrap(),
            10
        );
        assert_eq!(
            ledger
                .min_available("standard_room", &range("2025-12-01", "2025-12-04"))
                .unwrap(),
            6
        );
        // A range running off the seeded calendar hits zero-capacity dates.
        assert_eq!(
            ledger
                .min_available("standard_room", &range("2025-12-04", "2025-12-06"))
                .unwrap(),
            0
        );
    }

    #[test]
    fn empty_range_is_invalid() {
        let ledger = ledger("standard_room", "2025-12-01", "2025-12-03", 10);
        let same_day = range("2025-12-01", "2025-12-01");
        assert!(matches!(
            ledger.min_available("standard_room", &same_day),
            Err(EngineError::InvalidDateRange { .. })
        ));
        let inverted = range("2025-12-03", "2025-12-01");
        assert!(matches!(
            ledger.min_available("standard_room", &inverted),
            Err(EngineError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn reserve_decrements_every_date() {
        let mut ledger = ledger("standard_room", "2025-12-01", "2025-12-03", 10);
        ledger
            .reserve("standard_room", &range("2025-12-01", "2025-12-03"), 4)
            .unwrap();
        assert_eq!(ledger.available_on("standard_room", d("2025-12-01")), 6);
        assert_eq!(ledger.available_on("standard_room", d("2025-12-02")), 6);
    }

    #[test]
    fn reserve_failure_names_first_short_date_and_mutates_nothing() {
        let mut ledger = ledger("standard_room", "2025-12-01", "2025-12-04", 10);
        // Drain 12-02 down to 6.
        ledger
            .reserve("standard_room", &range("2025-12-02", "2025-12-03"), 4)
            .unwrap();

        let err = ledger
            .reserve("standard_room", &range("2025-12-01", "2025-12-04"), 7)
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientInventory {
                date: d("2025-12-02"),
                requested: 7,
                available: 6,
            }
        );
        // All-or-nothing: 12-01 was sufficient but must be untouched.
        assert_eq!(ledger.available_on("standard_room", d("2025-12-01")), 10);
        assert_eq!(ledger.available_on("standard_room", d("2025-12-02")), 6);
        assert_eq!(ledger.available_on("standard_room", d("2025-12-03")), 10);
    }

    #[test]
    fn reserve_to_exactly_zero_succeeds() {
        let mut ledger = ledger("standard_room", "2025-12-01", "2025-12-02", 10);
        ledger
            .reserve("standard_room", &range("2025-12-01", "2025-12-02"), 10)
            .unwrap();
        assert_eq!(ledger.available_on("standard_room", d("2025-12-01")), 0);
        let err = ledger
            .reserve("standard_room", &range("2025-12-01", "2025-12-02"), 1)
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientInventory { available: 0, .. }));
    }

    #[test]
    fn reserve_on_absent_room_type_reports_zero_available() {
        let mut ledger = ledger("standard_room", "2025-12-01", "2025-12-03", 10);
        let err = ledger
            .reserve("executive_suite", &range("2025-12-01", "2025-12-02"), 1)
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientInventory {
                date: d("2025-12-01"),
                requested: 1,
                available: 0,
            }
        );
    }

    #[test]
    fn release_restores_reserve() {
        let mut ledger = ledger("standard_room", "2025-12-01", "2025-12-04", 7);
        let stay = range("2025-12-01", "2025-12-04");
        ledger.reserve("standard_room", &stay, 5).unwrap();
        ledger.release("standard_room", &stay, 5);
        for date in stay.days() {
            assert_eq!(ledger.available_on("standard_room", date), 7);
        }
    }

    #[test]
    fn release_creates_absent_dates() {
        let mut ledger = RoomLedger::default();
        ledger.release("standard_room", &range("2025-12-01", "2025-12-03"), 3);
        assert_eq!(ledger.available_on("standard_room", d("2025-12-01")), 3);
        assert_eq!(ledger.available_on("standard_room", d("2025-12-02")), 3);
        assert_eq!(ledger.available_on("standard_room", d("2025-12-03")), 0);
    }

    #[test]
    fn room_types_are_independent() {
        let mut calendar = BTreeMap::new();
        for date in range("2025-12-01", "2025-12-03").days() {
            calendar.insert(
                date,
                BTreeMap::from([
                    ("standard_room".to_string(), 10u32),
                    ("deluxe_room".to_string(), 5u32),
                ]),
            );
        }
        let mut ledger = RoomLedger::from_calendar(&calendar);
        ledger
            .reserve("standard_room", &range("2025-12-01", "2025-12-03"), 10)
            .unwrap();
        assert_eq!(ledger.available_on("deluxe_room", d("2025-12-01")), 5);
    }

    #[test]
    fn validate_stay_guards() {
        let ok = range("2025-12-01", "2025-12-03");
        assert!(validate_stay(&ok, 1).is_ok());
        assert!(matches!(
            validate_stay(&ok, 0),
            Err(EngineError::LimitExceeded(_))
        ));
        assert!(matches!(
            validate_stay(&ok, MAX_ROOMS_PER_REQUEST + 1),
            Err(EngineError::LimitExceeded(_))
        ));
        let marathon = range("2025-01-01", "2025-06-01");
        assert!(matches!(
            validate_stay(&marathon, 1),
            Err(EngineError::LimitExceeded(_))
        ));
    }
}
