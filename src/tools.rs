use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use ulid::Ulid;

use crate::model::DateRange;

/// A validated tool invocation: one typed argument record per operation,
/// parsed and shaped before the engine is touched. Unknown argument fields
/// (client_id and friends from the tool router) are ignored.
#[derive(Debug, PartialEq)]
pub enum ToolCall {
    SearchHotels {
        location: String,
        range: DateRange,
        guests: u32,
    },
    GetHotelDetails {
        hotel_id: String,
    },
    CheckAvailability {
        hotel_id: String,
        room_type: String,
        range: DateRange,
        rooms: u32,
    },
    LockInventory {
        hotel_id: String,
        room_type: String,
        range: DateRange,
        rooms: u32,
        session_id: String,
    },
    ConfirmBooking(ConfirmBooking),
}

/// `confirm_booking` accepts either a prior hold or the direct five-field
/// form.
#[derive(Debug, PartialEq)]
pub enum ConfirmBooking {
    ByHold {
        hold_id: Ulid,
    },
    Direct {
        hotel_id: String,
        room_type: String,
        range: DateRange,
        rooms: u32,
    },
}

#[derive(Debug)]
pub struct ParseError(pub String);

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ParseError {}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        ParseError(format!("invalid arguments: {e}"))
    }
}

// Raw argument shapes as the router sends them.

#[derive(Deserialize)]
struct SearchArgs {
    location: String,
    check_in: NaiveDate,
    check_out: NaiveDate,
    #[serde(default = "default_guests")]
    guests: u32,
}

fn default_guests() -> u32 {
    2
}

#[derive(Deserialize)]
struct DetailsArgs {
    hotel_id: String,
}

#[derive(Deserialize)]
struct AvailabilityArgs {
    hotel_id: String,
    room_type: String,
    check_in: NaiveDate,
    check_out: NaiveDate,
    #[serde(default = "default_rooms")]
    rooms: u32,
}

fn default_rooms() -> u32 {
    1
}

#[derive(Deserialize)]
struct LockArgs {
    hotel_id: String,
    room_type: String,
    check_in: NaiveDate,
    check_out: NaiveDate,
    rooms: u32,
    session_id: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConfirmArgs {
    ByHold {
        hold_id: Ulid,
    },
    Direct {
        hotel_id: String,
        room_type: String,
        check_in: NaiveDate,
        check_out: NaiveDate,
        rooms: u32,
    },
}

impl ToolCall {
    pub fn parse(tool: &str, arguments: Value) -> Result<Self, ParseError> {
        match tool {
            "search_hotels" => {
                let args: SearchArgs = serde_json::from_value(arguments)?;
                Ok(ToolCall::SearchHotels {
                    location: args.location,
                    range: DateRange::new(args.check_in, args.check_out),
                    guests: args.guests,
                })
            }
            "get_hotel_details" => {
                let args: DetailsArgs = serde_json::from_value(arguments)?;
                Ok(ToolCall::GetHotelDetails {
                    hotel_id: args.hotel_id,
                })
            }
            "check_availability" => {
                let args: AvailabilityArgs = serde_json::from_value(arguments)?;
                Ok(ToolCall::CheckAvailability {
                    hotel_id: args.hotel_id,
                    room_type: args.room_type,
                    range: DateRange::new(args.check_in, args.check_out),
                    rooms: args.rooms,
                })
            }
            "lock_inventory" => {
                let args: LockArgs = serde_json::from_value(arguments)?;
                Ok(ToolCall::LockInventory {
                    hotel_id: args.hotel_id,
                    room_type: args.room_type,
                    range: DateRange::new(args.check_in, args.check_out),
                    rooms: args.rooms,
                    session_id: args.session_id,
                })
            }
            "confirm_booking" => {
                let args: ConfirmArgs = serde_json::from_value(arguments)?;
                Ok(ToolCall::ConfirmBooking(match args {
                    ConfirmArgs::ByHold { hold_id } => ConfirmBooking::ByHold { hold_id },
                    ConfirmArgs::Direct {
                        hotel_id,
                        room_type,
                        check_in,
                        check_out,
                        rooms,
                    } => ConfirmBooking::Direct {
                        hotel_id,
                        room_type,
                        range: DateRange::new(check_in, check_out),
                        rooms,
                    },
                }))
            }
            other => Err(ParseError(format!("unknown tool: {other}"))),
        }
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ToolCall::SearchHotels { .. } => "search_hotels",
            ToolCall::GetHotelDetails { .. } => "get_hotel_details",
            ToolCall::CheckAvailability { .. } => "check_availability",
            ToolCall::LockInventory { .. } => "lock_inventory",
            ToolCall::ConfirmBooking(_) => "confirm_booking",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn parse_search_with_defaults_and_extras() {
        let call = ToolCall::parse(
            "search_hotels",
            json!({
                "location": "Dubai",
                "check_in": "2025-12-01",
                "check_out": "2025-12-03",
                "client_id": "partner_7"
            }),
        )
        .unwrap();
        assert_eq!(
            call,
            ToolCall::SearchHotels {
                location: "Dubai".into(),
                range: DateRange::new(d("2025-12-01"), d("2025-12-03")),
                guests: 2,
            }
        );
    }

    #[test]
    fn parse_check_availability_defaults_one_room() {
        let call = ToolCall::parse(
            "check_availability",
            json!({
                "hotel_id": "dubai_grand_001",
                "room_type": "standard_room",
                "check_in": "2025-12-01",
                "check_out": "2025-12-02"
            }),
        )
        .unwrap();
        assert!(matches!(
            call,
            ToolCall::CheckAvailability { rooms: 1, .. }
        ));
    }

    #[test]
    fn parse_lock_inventory_requires_session() {
        let err = ToolCall::parse(
            "lock_inventory",
            json!({
                "hotel_id": "dubai_grand_001",
                "room_type": "standard_room",
                "check_in": "2025-12-01",
                "check_out": "2025-12-02",
                "rooms": 2
            }),
        )
        .unwrap_err();
        assert!(err.0.contains("session_id"));
    }

    #[test]
    fn parse_confirm_booking_both_shapes() {
        let hold_id = Ulid::new();
        let by_hold = ToolCall::parse(
            "confirm_booking",
            json!({ "hold_id": hold_id.to_string() }),
        )
        .unwrap();
        assert_eq!(
            by_hold,
            ToolCall::ConfirmBooking(ConfirmBooking::ByHold { hold_id })
        );

        let direct = ToolCall::parse(
            "confirm_booking",
            json!({
                "hotel_id": "dubai_grand_001",
                "room_type": "deluxe_room",
                "check_in": "2025-12-01",
                "check_out": "2025-12-04",
                "rooms": 2
            }),
        )
        .unwrap();
        assert_eq!(
            direct,
            ToolCall::ConfirmBooking(ConfirmBooking::Direct {
                hotel_id: "dubai_grand_001".into(),
                room_type: "deluxe_room".into(),
                range: DateRange::new(d("2025-12-01"), d("2025-12-04")),
                rooms: 2,
            })
        );
    }

    #[test]
    fn parse_rejects_malformed_dates_and_unknown_tools() {
        let err = ToolCall::parse(
            "search_hotels",
            json!({
                "location": "Dubai",
                "check_in": "christmas",
                "check_out": "2025-12-03"
            }),
        )
        .unwrap_err();
        assert!(err.0.contains("invalid arguments"));

        let err = ToolCall::parse("book_flight", json!({})).unwrap_err();
        assert!(err.0.contains("unknown tool"));
    }
}
