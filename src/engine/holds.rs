use std::io;

use tokio::sync::oneshot;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::ledger::validate_stay;
use super::{Engine, EngineError, JournalCommand, PropertyState};

/// Confirmation numbers are ULID-based: time-ordered and globally unique.
fn confirmation_number() -> String {
    format!("HTL-{}", Ulid::new())
}

/// What a non-Active hold reports when an operation reaches it.
fn terminal_error(hold: &Hold) -> EngineError {
    match hold.status {
        HoldStatus::Consumed => EngineError::HoldAlreadyConsumed(hold.id),
        HoldStatus::Expired => EngineError::HoldExpired(hold.id),
        _ => EngineError::HoldNotFound(hold.id),
    }
}

impl Engine {
    /// Place a time-bounded hold. The room-nights are debited from the
    /// ledger here and now — two holds can never promise the same rooms,
    /// and confirming later never re-touches the ledger.
    pub async fn create_hold(
        &self,
        property_id: &str,
        room_type: &str,
        range: DateRange,
        rooms: u32,
        session_id: &str,
        ttl_ms: Ms,
    ) -> Result<Hold, EngineError> {
        validate_stay(&range, rooms)?;
        if session_id.len() > MAX_SESSION_ID_LEN {
            return Err(EngineError::LimitExceeded("session id too long"));
        }

        let mut guard = self.resolve_property_write(property_id, room_type).await?;
        guard.ledger.reserve(room_type, &range, rooms)?;

        let now = now_ms();
        let hold = Hold {
            id: Ulid::new(),
            property_id: property_id.to_string(),
            room_type: room_type.to_string(),
            range,
            rooms,
            session_id: session_id.to_string(),
            created_at: now,
            expires_at: now + ttl_ms,
            status: HoldStatus::Active,
        };
        guard.holds.insert(hold.id, hold.clone());
        self.hold_index.insert(hold.id, hold.property_id.clone());

        let event = Event::HoldPlaced {
            id: hold.id,
            property_id: hold.property_id.clone(),
            room_type: hold.room_type.clone(),
            range,
            rooms,
            session_id: hold.session_id.clone(),
            created_at: hold.created_at,
            expires_at: hold.expires_at,
        };
        let ack = self.journal_enqueue(&event).await;
        drop(guard);
        Engine::journal_commit(ack).await;

        metrics::counter!(observability::HOLDS_PLACED_TOTAL).increment(1);
        Ok(hold)
    }

    /// Explicitly cancel an active hold, returning its rooms. A hold whose
    /// TTL already lapsed is expired in place and reported as such.
    pub async fn cancel_hold(&self, hold_id: Ulid) -> Result<(), EngineError> {
        let mut guard = self.resolve_hold_write(&hold_id).await?;
        let hold = guard
            .holds
            .get(&hold_id)
            .ok_or(EngineError::HoldNotFound(hold_id))?;
        if hold.status != HoldStatus::Active {
            return Err(terminal_error(hold));
        }

        let expired = hold.expires_at <= now_ms();
        let status = if expired {
            HoldStatus::Expired
        } else {
            HoldStatus::Released
        };
        let ack = self.release_rooms(&mut guard, hold_id, status).await;
        drop(guard);
        Engine::journal_commit(ack).await;

        if expired {
            return Err(EngineError::HoldExpired(hold_id));
        }
        Ok(())
    }

    /// Convert an active hold into a permanent confirmation. The status
    /// field is the single-assignment gate: the flip from `Active` happens
    /// under the property write lock, so a racing reaper or second caller
    /// loses cleanly. No ledger mutation — the rooms left at hold time.
    pub async fn confirm_hold(&self, hold_id: Ulid) -> Result<Confirmation, EngineError> {
        let mut guard = self.resolve_hold_write(&hold_id).await?;
        let hold = guard
            .holds
            .get(&hold_id)
            .ok_or(EngineError::HoldNotFound(hold_id))?;
        if hold.status != HoldStatus::Active {
            return Err(terminal_error(hold));
        }

        let now = now_ms();
        if hold.expires_at <= now {
            // Lapsed but not yet reaped: expire it here rather than letting
            // the outcome depend on reaper timing.
            let ack = self.release_rooms(&mut guard, hold_id, HoldStatus::Expired).await;
            drop(guard);
            Engine::journal_commit(ack).await;
            return Err(EngineError::HoldExpired(hold_id));
        }

        let confirmation = Confirmation {
            number: confirmation_number(),
            property_id: hold.property_id.clone(),
            room_type: hold.room_type.clone(),
            range: hold.range,
            rooms: hold.rooms,
            created_at: now,
        };
        if let Some(hold) = guard.holds.get_mut(&hold_id) {
            hold.status = HoldStatus::Consumed;
        }
        guard.confirmations.push(confirmation.clone());

        let event = Event::HoldConsumed {
            id: hold_id,
            property_id: confirmation.property_id.clone(),
            confirmation_number: confirmation.number.clone(),
            created_at: now,
        };
        let ack = self.journal_enqueue(&event).await;
        drop(guard);
        Engine::journal_commit(ack).await;

        metrics::counter!(observability::BOOKINGS_CONFIRMED_TOTAL).increment(1);
        Ok(confirmation)
    }

    /// Confirmation with no prior hold: reserve and confirm in one critical
    /// section. Equivalent to a hold with an infinite TTL consumed at once.
    pub async fn confirm_direct(
        &self,
        property_id: &str,
        room_type: &str,
        range: DateRange,
        rooms: u32,
    ) -> Result<Confirmation, EngineError> {
        validate_stay(&range, rooms)?;
        let mut guard = self.resolve_property_write(property_id, room_type).await?;
        guard.ledger.reserve(room_type, &range, rooms)?;

        let confirmation = Confirmation {
            number: confirmation_number(),
            property_id: property_id.to_string(),
            room_type: room_type.to_string(),
            range,
            rooms,
            created_at: now_ms(),
        };
        guard.confirmations.push(confirmation.clone());

        let event = Event::BookingConfirmed {
            confirmation_number: confirmation.number.clone(),
            property_id: confirmation.property_id.clone(),
            room_type: confirmation.room_type.clone(),
            range,
            rooms,
            created_at: confirmation.created_at,
        };
        let ack = self.journal_enqueue(&event).await;
        drop(guard);
        Engine::journal_commit(ack).await;

        metrics::counter!(observability::BOOKINGS_CONFIRMED_TOTAL).increment(1);
        Ok(confirmation)
    }

    /// Reaper path: expire `hold_id` if it is still active with a lapsed
    /// TTL. Re-checks status under the property write lock so a confirm that
    /// won the race is left alone.
    pub async fn expire_hold(&self, hold_id: Ulid, now: Ms) -> Result<(), EngineError> {
        let mut guard = self.resolve_hold_write(&hold_id).await?;
        let hold = guard
            .holds
            .get(&hold_id)
            .ok_or(EngineError::HoldNotFound(hold_id))?;
        if hold.status != HoldStatus::Active {
            return Err(terminal_error(hold));
        }
        if hold.expires_at > now {
            return Ok(());
        }

        let ack = self.release_rooms(&mut guard, hold_id, HoldStatus::Expired).await;
        drop(guard);
        Engine::journal_commit(ack).await;

        metrics::counter!(observability::HOLDS_EXPIRED_TOTAL).increment(1);
        Ok(())
    }

    /// Terminal transition for an active hold that returns its rooms to the
    /// ledger and enqueues the matching journal event. Caller drops the
    /// guard and awaits the ack.
    async fn release_rooms(
        &self,
        guard: &mut PropertyState,
        hold_id: Ulid,
        status: HoldStatus,
    ) -> Option<oneshot::Receiver<io::Result<()>>> {
        let Some(hold) = guard.holds.get_mut(&hold_id) else {
            return None;
        };
        let (room_type, range, rooms, property_id) = (
            hold.room_type.clone(),
            hold.range,
            hold.rooms,
            hold.property_id.clone(),
        );
        hold.status = status;
        guard.ledger.release(&room_type, &range, rooms);

        let event = match status {
            HoldStatus::Expired => Event::HoldExpired {
                id: hold_id,
                property_id,
            },
            _ => Event::HoldReleased {
                id: hold_id,
                property_id,
            },
        };
        self.journal_enqueue(&event).await
    }

    /// Snapshot of active holds whose TTL has lapsed. Skips properties whose
    /// lock is held right now — the next sweep catches them.
    pub fn collect_expired_holds(&self, now: Ms) -> Vec<Ulid> {
        let mut expired = Vec::new();
        for entry in self.state.iter() {
            let shared = entry.value().clone();
            if let Ok(guard) = shared.try_read() {
                for hold in guard.holds.values() {
                    if hold.status == HoldStatus::Active && hold.expires_at <= now {
                        expired.push(hold.id);
                    }
                }
            }
        }
        expired
    }

    /// Drop terminal hold records past their retention window so archived
    /// holds don't accumulate forever. Returns the number pruned.
    pub fn prune_archived(&self, now: Ms) -> usize {
        let mut pruned = 0;
        for entry in self.state.iter() {
            let shared = entry.value().clone();
            let Ok(mut guard) = shared.try_write() else {
                continue;
            };
            let mut removed = Vec::new();
            guard.holds.retain(|id, hold| {
                let stale =
                    hold.status.is_terminal() && hold.expires_at + HOLD_RETENTION_MS <= now;
                if stale {
                    removed.push(*id);
                }
                !stale
            });
            drop(guard);
            pruned += removed.len();
            for id in removed {
                self.hold_index.remove(&id);
            }
        }
        pruned
    }

    /// Rewrite the journal down to the events that recreate current state:
    /// active holds and issued confirmations. Released and expired holds
    /// have no net ledger effect and are dropped.
    pub async fn compact_journal(&self) -> io::Result<()> {
        let mut events = Vec::new();
        let property_ids: Vec<String> = self.state.iter().map(|e| e.key().clone()).collect();
        for property_id in property_ids {
            let Some(shared) = self.property(&property_id) else {
                continue;
            };
            let guard = shared.read().await;
            for hold in guard.holds.values() {
                if hold.status == HoldStatus::Active {
                    events.push(Event::HoldPlaced {
                        id: hold.id,
                        property_id: hold.property_id.clone(),
                        room_type: hold.room_type.clone(),
                        range: hold.range,
                        rooms: hold.rooms,
                        session_id: hold.session_id.clone(),
                        created_at: hold.created_at,
                        expires_at: hold.expires_at,
                    });
                }
            }
            for confirmation in &guard.confirmations {
                events.push(Event::BookingConfirmed {
                    confirmation_number: confirmation.number.clone(),
                    property_id: confirmation.property_id.clone(),
                    room_type: confirmation.room_type.clone(),
                    range: confirmation.range,
                    rooms: confirmation.rooms,
                    created_at: confirmation.created_at,
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Snapshot {
                events,
                response: tx,
            })
            .await
            .map_err(|_| io::Error::other("journal writer shut down"))?;
        rx.await
            .map_err(|_| io::Error::other("journal writer dropped ack"))?
    }

    pub async fn journal_appends_since_rewrite(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .journal_tx
            .send(JournalCommand::AppendsSinceRewrite { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
