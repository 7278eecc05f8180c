use chrono::NaiveDate;
use ulid::Ulid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    PropertyNotFound(String),
    RoomTypeNotFound {
        property_id: String,
        room_type: String,
    },
    InvalidDateRange {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    /// Names the first date in the range that cannot cover the request.
    InsufficientInventory {
        date: NaiveDate,
        requested: u32,
        available: u32,
    },
    HoldNotFound(Ulid),
    HoldExpired(Ulid),
    HoldAlreadyConsumed(Ulid),
    LimitExceeded(&'static str),
}

impl EngineError {
    /// Stable machine-readable code for the wire envelope.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::PropertyNotFound(_) | EngineError::RoomTypeNotFound { .. } => "NOT_FOUND",
            EngineError::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            EngineError::InsufficientInventory { .. } => "INSUFFICIENT_INVENTORY",
            EngineError::HoldNotFound(_) => "HOLD_NOT_FOUND",
            EngineError::HoldExpired(_) => "HOLD_EXPIRED",
            EngineError::HoldAlreadyConsumed(_) => "HOLD_ALREADY_CONSUMED",
            EngineError::LimitExceeded(_) => "LIMIT_EXCEEDED",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::PropertyNotFound(id) => write!(f, "property not found: {id}"),
            EngineError::RoomTypeNotFound {
                property_id,
                room_type,
            } => write!(f, "room type {room_type} not found on property {property_id}"),
            EngineError::InvalidDateRange {
                check_in,
                check_out,
            } => write!(
                f,
                "invalid date range: check-out {check_out} must be after check-in {check_in}"
            ),
            EngineError::InsufficientInventory {
                date,
                requested,
                available,
            } => write!(
                f,
                "insufficient inventory on {date}: requested {requested}, available {available} (short {})",
                requested - available
            ),
            EngineError::HoldNotFound(id) => write!(f, "hold not found: {id}"),
            EngineError::HoldExpired(id) => write!(f, "hold expired: {id}"),
            EngineError::HoldAlreadyConsumed(id) => write!(f, "hold already consumed: {id}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
