use std::io;
use std::sync::Arc;
use std::time::Instant;

use chrono::{SecondsFormat, TimeZone, Utc};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::debug;

use crate::engine::{Engine, EngineError};
use crate::limits::MAX_REQUEST_BYTES;
use crate::model::Ms;
use crate::observability;
use crate::tools::{ConfirmBooking, ToolCall};

/// One request line from the tool router.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Value,
    tool: String,
    #[serde(default)]
    arguments: Value,
}

/// Serve one client connection: newline-delimited JSON requests in, exactly
/// one response line per request out. Session and client validation belong
/// to the router in front of us.
pub async fn process_connection(socket: TcpStream, engine: Arc<Engine>) -> io::Result<()> {
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_REQUEST_BYTES));
    while let Some(line) = framed.next().await {
        let line = match line {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                let response =
                    error_response(Value::Null, "BAD_REQUEST", "request line too long");
                framed.send(response.to_string()).await.map_err(codec_io)?;
                // Framing is unreliable past an oversized line; hang up.
                return Ok(());
            }
            Err(LinesCodecError::Io(e)) => return Err(e),
        };
        let response = handle_request(&engine, &line).await;
        framed.send(response.to_string()).await.map_err(codec_io)?;
    }
    Ok(())
}

async fn handle_request(engine: &Engine, line: &str) -> Value {
    let envelope: Envelope = match serde_json::from_str(line) {
        Ok(envelope) => envelope,
        Err(e) => {
            return error_response(
                Value::Null,
                "BAD_REQUEST",
                &format!("malformed request: {e}"),
            );
        }
    };

    let call = match ToolCall::parse(&envelope.tool, envelope.arguments) {
        Ok(call) => call,
        Err(e) => {
            metrics::counter!(
                observability::TOOL_CALLS_TOTAL,
                "tool" => envelope.tool.clone(),
                "status" => "bad_request"
            )
            .increment(1);
            return error_response(envelope.id, "BAD_REQUEST", &e.to_string());
        }
    };

    let label = call.label();
    let started = Instant::now();
    let outcome = dispatch(engine, call).await;
    metrics::histogram!(observability::TOOL_CALL_DURATION_SECONDS, "tool" => label)
        .record(started.elapsed().as_secs_f64());

    match outcome {
        Ok(result) => {
            metrics::counter!(
                observability::TOOL_CALLS_TOTAL,
                "tool" => label,
                "status" => "ok"
            )
            .increment(1);
            json!({ "id": envelope.id, "result": result })
        }
        Err(e) => {
            metrics::counter!(
                observability::TOOL_CALLS_TOTAL,
                "tool" => label,
                "status" => "error"
            )
            .increment(1);
            debug!("tool {label} failed: {e}");
            error_response(envelope.id, e.code(), &e.to_string())
        }
    }
}

async fn dispatch(engine: &Engine, call: ToolCall) -> Result<Value, EngineError> {
    match call {
        ToolCall::SearchHotels {
            location,
            range,
            guests,
        } => {
            let results = engine.search(&location, guests, &range)?;
            Ok(to_value(&results))
        }
        ToolCall::GetHotelDetails { hotel_id } => {
            let property = engine.property_details(&hotel_id)?;
            Ok(to_value(property.as_ref()))
        }
        ToolCall::CheckAvailability {
            hotel_id,
            room_type,
            range,
            rooms,
        } => {
            let report = engine
                .check_availability(&hotel_id, &room_type, &range, rooms)
                .await?;
            Ok(to_value(&report))
        }
        ToolCall::LockInventory {
            hotel_id,
            room_type,
            range,
            rooms,
            session_id,
        } => {
            let hold = engine
                .create_hold(&hotel_id, &room_type, range, rooms, &session_id, engine.hold_ttl_ms)
                .await?;
            Ok(json!({
                "lock_id": hold.id.to_string(),
                "expires_at": rfc3339(hold.expires_at),
            }))
        }
        ToolCall::ConfirmBooking(ConfirmBooking::ByHold { hold_id }) => {
            let confirmation = engine.confirm_hold(hold_id).await?;
            Ok(json!({
                "confirmed": true,
                "confirmation_number": confirmation.number,
            }))
        }
        ToolCall::ConfirmBooking(ConfirmBooking::Direct {
            hotel_id,
            room_type,
            range,
            rooms,
        }) => {
            let confirmation = engine
                .confirm_direct(&hotel_id, &room_type, range, rooms)
                .await?;
            Ok(json!({
                "confirmed": true,
                "confirmation_number": confirmation.number,
            }))
        }
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn error_response(id: Value, code: &str, message: &str) -> Value {
    json!({ "id": id, "error": { "code": code, "message": message } })
}

fn codec_io(e: LinesCodecError) -> io::Error {
    match e {
        LinesCodecError::Io(e) => e,
        other => io::Error::other(other),
    }
}

/// Hold expiry as an RFC 3339 UTC timestamp, the shape the checkout flow
/// renders to end users.
fn rfc3339(ms: Ms) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(instant) => instant.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => ms.to_string(),
    }
}
