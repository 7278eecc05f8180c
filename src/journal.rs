//! Append-only crash-recovery log of ledger-affecting events.
//!
//! Entry layout: `[u32 len][bincode payload][u32 crc32]`, little-endian.
//! A torn tail (crash mid-append) or a corrupt entry is detected via the
//! length prefix and checksum and everything from there on is discarded at
//! load time.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

pub struct Journal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_rewrite: u64,
}

impl Journal {
    /// Open (or create) the journal file at `path` for appending.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_rewrite: 0,
        })
    }

    /// Buffer one event. Nothing is durable until `sync` runs; the engine's
    /// writer task batches pushes and syncs once per batch.
    pub fn push(&mut self, event: &Event) -> io::Result<()> {
        write_entry(&mut self.writer, event)?;
        self.appends_since_rewrite += 1;
        Ok(())
    }

    /// Flush buffered entries and fsync the file.
    pub fn sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_rewrite(&self) -> u64 {
        self.appends_since_rewrite
    }

    /// Compaction phase one: write a state snapshot to a sibling temp file
    /// and fsync it. This is the slow I/O half; the swap stays cheap.
    pub fn write_snapshot(path: &Path, events: &[Event]) -> io::Result<()> {
        let tmp = snapshot_path(path);
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        for event in events {
            write_entry(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Compaction phase two: rename the snapshot over the live journal and
    /// reopen for appending.
    pub fn swap_snapshot(&mut self) -> io::Result<()> {
        fs::rename(snapshot_path(&self.path), &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_rewrite = 0;
        Ok(())
    }

    /// Read every intact entry from `path`. A missing file is an empty
    /// journal; the first torn or corrupt entry ends the load.
    pub fn load(path: &Path) -> io::Result<Vec<Event>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut events = Vec::new();
        while let Some(event) = read_entry(&mut reader)? {
            events.push(event);
        }
        Ok(events)
    }
}

fn snapshot_path(path: &Path) -> PathBuf {
    path.with_extension("journal.tmp")
}

fn write_entry(writer: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(())
}

/// Returns `Ok(None)` at clean EOF and on a torn or corrupt tail — both end
/// the replay without error.
fn read_entry(reader: &mut impl Read) -> io::Result<Option<Event>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let mut payload = vec![0u8; u32::from_le_bytes(len_buf) as usize];
    let mut crc_buf = [0u8; 4];
    for buf in [&mut payload[..], &mut crc_buf[..]] {
        match reader.read_exact(buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }
    }

    if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    Ok(bincode::deserialize(&payload).ok())
}
