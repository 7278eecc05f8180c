mod error;
mod holds;
mod ledger;
mod queries;

pub use error::EngineError;
pub use ledger::RoomLedger;

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::warn;
use ulid::Ulid;

use crate::catalog::CatalogStore;
use crate::journal::Journal;
use crate::model::*;

pub type SharedPropertyState = Arc<RwLock<PropertyState>>;

/// Everything about one property that must change together: the live ledger
/// counters, hold records (active and archived), and issued confirmations.
/// Guarded by one `RwLock` per property — the engine's only write lock.
#[derive(Debug, Clone)]
pub struct PropertyState {
    pub id: String,
    pub ledger: RoomLedger,
    pub holds: HashMap<Ulid, Hold>,
    pub confirmations: Vec<Confirmation>,
}

impl PropertyState {
    fn new(property: &Property) -> Self {
        Self {
            id: property.property_id.clone(),
            ledger: RoomLedger::from_calendar(&property.availability_calendar),
            holds: HashMap::new(),
            confirmations: Vec::new(),
        }
    }
}

// ── Group-commit journal channel ─────────────────────────

pub(super) enum JournalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Snapshot {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceRewrite {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the journal and batches appends for group
/// commit: block on the first append, drain whatever else is immediately
/// queued, write the whole batch, fsync once, then ack every sender.
async fn journal_writer_loop(mut journal: Journal, mut rx: mpsc::Receiver<JournalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            JournalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let deferred = loop {
                    match rx.try_recv() {
                        Ok(JournalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => break Some(other),
                        Err(_) => break None,
                    }
                };

                metrics::histogram!(crate::observability::JOURNAL_FLUSH_BATCH_SIZE)
                    .record(batch.len() as f64);
                let started = std::time::Instant::now();
                let result = flush_batch(&mut journal, &batch);
                metrics::histogram!(crate::observability::JOURNAL_FLUSH_DURATION_SECONDS)
                    .record(started.elapsed().as_secs_f64());
                for (_, tx) in batch {
                    let ack = match &result {
                        Ok(()) => Ok(()),
                        Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
                    };
                    let _ = tx.send(ack);
                }

                if let Some(cmd) = deferred {
                    handle_maintenance(&mut journal, cmd);
                }
            }
            other => handle_maintenance(&mut journal, other),
        }
    }
}

fn flush_batch(journal: &mut Journal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut push_err = None;
    for (event, _) in batch {
        if let Err(e) = journal.push(event) {
            push_err = Some(e);
            break;
        }
    }
    // Sync even after a push error so partially buffered bytes don't leak
    // into the next batch (every caller in this batch is told it failed).
    let sync_err = journal.sync().err();
    if let Some(e) = push_err {
        return Err(e);
    }
    if let Some(e) = sync_err {
        return Err(e);
    }
    Ok(())
}

fn handle_maintenance(journal: &mut Journal, cmd: JournalCommand) {
    match cmd {
        JournalCommand::Snapshot { events, response } => {
            let result = Journal::write_snapshot(journal.path(), &events)
                .and_then(|()| journal.swap_snapshot());
            let _ = response.send(result);
        }
        JournalCommand::AppendsSinceRewrite { response } => {
            let _ = response.send(journal.appends_since_rewrite());
        }
        JournalCommand::Append { .. } => unreachable!(),
    }
}

pub struct Engine {
    pub catalog: Arc<CatalogStore>,
    pub state: DashMap<String, SharedPropertyState>,
    /// Reverse lookup: hold id → property id.
    pub(super) hold_index: DashMap<Ulid, String>,
    pub(super) journal_tx: mpsc::Sender<JournalCommand>,
    pub hold_ttl_ms: Ms,
}

impl Engine {
    /// Build the engine: one locked state per catalog property (ledger
    /// seeded by a one-time calendar copy), then journal replay on top.
    pub fn new(
        catalog: Arc<CatalogStore>,
        journal_path: PathBuf,
        hold_ttl_ms: Ms,
    ) -> io::Result<Self> {
        let events = Journal::load(&journal_path)?;
        let journal = Journal::open(&journal_path)?;
        let (journal_tx, journal_rx) = mpsc::channel(4096);
        tokio::spawn(journal_writer_loop(journal, journal_rx));

        let engine = Self {
            catalog,
            state: DashMap::new(),
            hold_index: DashMap::new(),
            journal_tx,
            hold_ttl_ms,
        };

        for property in engine.catalog.iter() {
            engine.state.insert(
                property.property_id.clone(),
                Arc::new(RwLock::new(PropertyState::new(property))),
            );
        }

        // Replay — we are the sole owner of these Arcs, so try_write always
        // succeeds instantly. Never block here: construction may run inside
        // an async context.
        for event in &events {
            let property_id = event.property_id();
            let Some(entry) = engine.state.get(property_id) else {
                warn!("journal references unknown property {property_id}; event skipped");
                continue;
            };
            let shared = entry.value().clone();
            drop(entry);
            let mut guard = shared.try_write().expect("replay: uncontended write");
            engine.apply_event(&mut guard, event);
        }

        Ok(engine)
    }

    /// Re-apply one journal event to a property's state. Replay-only: live
    /// mutations validate first and journal after the fact.
    fn apply_event(&self, ps: &mut PropertyState, event: &Event) {
        match event {
            Event::HoldPlaced {
                id,
                property_id,
                room_type,
                range,
                rooms,
                session_id,
                created_at,
                expires_at,
            } => {
                if let Err(e) = ps.ledger.reserve(room_type, range, *rooms) {
                    warn!("replay: cannot re-reserve hold {id}: {e}");
                    return;
                }
                ps.holds.insert(
                    *id,
                    Hold {
                        id: *id,
                        property_id: property_id.clone(),
                        room_type: room_type.clone(),
                        range: *range,
                        rooms: *rooms,
                        session_id: session_id.clone(),
                        created_at: *created_at,
                        expires_at: *expires_at,
                        status: HoldStatus::Active,
                    },
                );
                self.hold_index.insert(*id, property_id.clone());
            }
            Event::HoldReleased { id, .. } => {
                self.terminate_on_replay(ps, *id, HoldStatus::Released);
            }
            Event::HoldExpired { id, .. } => {
                self.terminate_on_replay(ps, *id, HoldStatus::Expired);
            }
            Event::HoldConsumed {
                id,
                confirmation_number,
                created_at,
                ..
            } => {
                if let Some(hold) = ps.holds.get_mut(id)
                    && hold.status == HoldStatus::Active
                {
                    hold.status = HoldStatus::Consumed;
                    let confirmation = Confirmation {
                        number: confirmation_number.clone(),
                        property_id: hold.property_id.clone(),
                        room_type: hold.room_type.clone(),
                        range: hold.range,
                        rooms: hold.rooms,
                        created_at: *created_at,
                    };
                    ps.confirmations.push(confirmation);
                }
            }
            Event::BookingConfirmed {
                confirmation_number,
                property_id,
                room_type,
                range,
                rooms,
                created_at,
            } => {
                if let Err(e) = ps.ledger.reserve(room_type, range, *rooms) {
                    warn!("replay: cannot re-reserve booking {confirmation_number}: {e}");
                    return;
                }
                ps.confirmations.push(Confirmation {
                    number: confirmation_number.clone(),
                    property_id: property_id.clone(),
                    room_type: room_type.clone(),
                    range: *range,
                    rooms: *rooms,
                    created_at: *created_at,
                });
            }
        }
    }

    fn terminate_on_replay(&self, ps: &mut PropertyState, id: Ulid, status: HoldStatus) {
        if let Some(hold) = ps.holds.get_mut(&id)
            && hold.status == HoldStatus::Active
        {
            let (room_type, range, rooms) = (hold.room_type.clone(), hold.range, hold.rooms);
            hold.status = status;
            ps.ledger.release(&room_type, &range, rooms);
        }
    }

    pub fn property(&self, id: &str) -> Option<SharedPropertyState> {
        self.state.get(id).map(|entry| entry.value().clone())
    }

    pub fn property_for_hold(&self, hold_id: &Ulid) -> Option<String> {
        self.hold_index.get(hold_id).map(|entry| entry.value().clone())
    }

    /// Resolve a property that must exist in the catalog, with its room type,
    /// and take the write lock.
    pub(super) async fn resolve_property_write(
        &self,
        property_id: &str,
        room_type: &str,
    ) -> Result<tokio::sync::OwnedRwLockWriteGuard<PropertyState>, EngineError> {
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
        Ok(shared.write_owned().await)
    }

    /// Look up hold → property and take the property write lock.
    pub(super) async fn resolve_hold_write(
        &self,
        hold_id: &Ulid,
    ) -> Result<tokio::sync::OwnedRwLockWriteGuard<PropertyState>, EngineError> {
        let property_id = self
            .property_for_hold(hold_id)
            .ok_or(EngineError::HoldNotFound(*hold_id))?;
        let shared = self
            .property(&property_id)
            .ok_or(EngineError::HoldNotFound(*hold_id))?;
        Ok(shared.write_owned().await)
    }

    /// Enqueue an event on the journal writer. Called while the property
    /// lock is held so per-property journal order matches application order;
    /// the fsync happens in the writer task and the ack is awaited via
    /// `journal_commit` after the lock drops.
    pub(super) async fn journal_enqueue(
        &self,
        event: &Event,
    ) -> Option<oneshot::Receiver<io::Result<()>>> {
        let (tx, rx) = oneshot::channel();
        let cmd = JournalCommand::Append {
            event: event.clone(),
            response: tx,
        };
        if self.journal_tx.send(cmd).await.is_err() {
            tracing::error!("journal writer gone; event not persisted");
            metrics::counter!(crate::observability::JOURNAL_ERRORS_TOTAL).increment(1);
            return None;
        }
        Some(rx)
    }

    /// Await the group-commit ack. Failures are logged and counted, never
    /// surfaced: the in-memory state has already committed and failing the
    /// request would invite a retry and a double reserve.
    pub(super) async fn journal_commit(ack: Option<oneshot::Receiver<io::Result<()>>>) {
        let Some(rx) = ack else { return };
        match rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!("journal append failed: {e}");
                metrics::counter!(crate::observability::JOURNAL_ERRORS_TOTAL).increment(1);
            }
            Err(_) => {
                tracing::error!("journal writer dropped ack");
                metrics::counter!(crate::observability::JOURNAL_ERRORS_TOTAL).increment(1);
            }
        }
    }
}
