/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! File-backed message store.
//!
//! Layout on disk, per session (prefix derived from the session id):
//!
//! - `<prefix>.body` - raw message bytes, appended back to back
//! - `<prefix>.header` - one line per message: `direction,seq,offset,len`
//! - `<prefix>.seqnums` - next sender and target sequence numbers
//!
//! Every mutation is synced to disk before the call returns, so a session
//! never acknowledges a message that a crash could lose. On open the header
//! file is scanned to rebuild the in-memory index, which makes the store
//! resumable across restarts.

use crate::traits::MessageStore;
use async_trait::async_trait;
use bytes::Bytes;
use keelfix_core::error::StoreError;
use keelfix_core::types::Direction;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Byte offset and length of one message inside the body file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BodySlice {
    offset: u64,
    len: u32,
}

#[derive(Debug)]
struct Inner {
    body: File,
    header: File,
    /// Current end of the body file.
    body_end: u64,
    /// Per-direction index from sequence number to body slice.
    sent: BTreeMap<u32, BodySlice>,
    received: BTreeMap<u32, BodySlice>,
    next_sender_seq: u32,
    next_target_seq: u32,
}

impl Inner {
    fn index_for(&self, direction: Direction) -> &BTreeMap<u32, BodySlice> {
        match direction {
            Direction::Sent => &self.sent,
            Direction::Received => &self.received,
        }
    }

    fn counter_for(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Sent => self.next_sender_seq,
            Direction::Received => self.next_target_seq,
        }
    }
}

/// Durable file-backed message store.
#[derive(Debug)]
pub struct FileStore {
    inner: Mutex<Inner>,
    body_path: PathBuf,
    header_path: PathBuf,
    seqnums_path: PathBuf,
    creation_time: SystemTime,
}

impl FileStore {
    /// Opens or creates a file store with the given path prefix.
    ///
    /// Existing files are scanned to restore the message index and the
    /// sequence counters, so a restarted session resumes where it left off.
    pub fn open(prefix: impl AsRef<Path>) -> Result<Self, StoreError> {
        let prefix = prefix.as_ref();
        if let Some(parent) = prefix.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let body_path = prefix.with_extension("body");
        let header_path = prefix.with_extension("header");
        let seqnums_path = prefix.with_extension("seqnums");

        let body = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&body_path)?;
        let header = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&header_path)?;

        let (sent, received) = Self::load_index(&header_path)?;
        let body_end = body.metadata()?.len();
        let (next_sender_seq, next_target_seq) = Self::load_seqnums(&seqnums_path)?;

        Ok(Self {
            inner: Mutex::new(Inner {
                body,
                header,
                body_end,
                sent,
                received,
                next_sender_seq,
                next_target_seq,
            }),
            body_path,
            header_path,
            seqnums_path,
            creation_time: SystemTime::now(),
        })
    }

    fn load_index(
        header_path: &Path,
    ) -> Result<(BTreeMap<u32, BodySlice>, BTreeMap<u32, BodySlice>), StoreError> {
        let mut sent = BTreeMap::new();
        let mut received = BTreeMap::new();
        let file = File::open(header_path)?;
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split(',');
            let entry = (|| {
                let direction: Direction = parts.next()?.parse().ok()?;
                let seq: u32 = parts.next()?.parse().ok()?;
                let offset: u64 = parts.next()?.parse().ok()?;
                let len: u32 = parts.next()?.parse().ok()?;
                Some((direction, seq, BodySlice { offset, len }))
            })();
            let Some((direction, seq, slice)) = entry else {
                return Err(StoreError::Corrupted {
                    reason: format!("malformed header line {}", line_no + 1),
                });
            };
            match direction {
                Direction::Sent => sent.insert(seq, slice),
                Direction::Received => received.insert(seq, slice),
            };
        }
        Ok((sent, received))
    }

    fn load_seqnums(seqnums_path: &Path) -> Result<(u32, u32), StoreError> {
        match std::fs::read_to_string(seqnums_path) {
            Ok(content) => {
                let mut parts = content.trim().split(',');
                let pair = (|| {
                    let sender: u32 = parts.next()?.trim().parse().ok()?;
                    let target: u32 = parts.next()?.trim().parse().ok()?;
                    Some((sender, target))
                })();
                pair.ok_or_else(|| StoreError::Corrupted {
                    reason: "malformed seqnums file".to_string(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok((1, 1)),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes both counters and syncs before returning.
    fn persist_seqnums(&self, sender: u32, target: u32) -> Result<(), StoreError> {
        let mut file = File::create(&self.seqnums_path)?;
        write!(file, "{sender},{target}")?;
        file.sync_data()?;
        Ok(())
    }

    fn set_counter(&self, direction: Direction, seq: u32) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        match direction {
            Direction::Sent => inner.next_sender_seq = seq,
            Direction::Received => inner.next_target_seq = seq,
        }
        let (sender, target) = (inner.next_sender_seq, inner.next_target_seq);
        drop(inner);
        self.persist_seqnums(sender, target)
    }
}

#[async_trait]
impl MessageStore for FileStore {
    async fn append(
        &self,
        direction: Direction,
        seq: u32,
        message: &[u8],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let last = inner.index_for(direction).last_key_value().map_or(0, |(k, _)| *k);
        let expected = (last + 1).max(inner.counter_for(direction));
        if seq != expected {
            return Err(StoreError::SequenceGap {
                direction,
                expected,
                got: seq,
            });
        }

        let offset = inner.body_end;
        inner.body.write_all(message)?;
        inner.body.sync_data()?;
        inner.body_end += message.len() as u64;

        let len = message.len() as u32;
        writeln!(inner.header, "{direction},{seq},{offset},{len}")?;
        inner.header.sync_data()?;

        let slice = BodySlice { offset, len };
        match direction {
            Direction::Sent => inner.sent.insert(seq, slice),
            Direction::Received => inner.received.insert(seq, slice),
        };
        Ok(())
    }

    async fn get_range(
        &self,
        direction: Direction,
        begin: u32,
        end: u32,
    ) -> Result<Vec<Bytes>, StoreError> {
        let inner = self.inner.lock();
        let index = inner.index_for(direction);
        let last = index.last_key_value().map_or(0, |(k, _)| *k);
        let end = if end == 0 { last } else { end.min(last) };
        if begin > end {
            return Ok(Vec::new());
        }

        let slices: Vec<BodySlice> = (begin..=end)
            .map(|seq| {
                index
                    .get(&seq)
                    .copied()
                    .ok_or(StoreError::NotFound { direction, seq })
            })
            .collect::<Result<_, _>>()?;
        drop(inner);

        // Reads use a fresh handle so the append cursor is untouched.
        let mut body = File::open(&self.body_path)?;
        let mut result = Vec::with_capacity(slices.len());
        for slice in slices {
            let mut buf = vec![0u8; slice.len as usize];
            body.seek(SeekFrom::Start(slice.offset))?;
            body.read_exact(&mut buf)?;
            result.push(Bytes::from(buf));
        }
        Ok(result)
    }

    fn next_sender_seq(&self) -> u32 {
        self.inner.lock().next_sender_seq
    }

    fn next_target_seq(&self) -> u32 {
        self.inner.lock().next_target_seq
    }

    fn set_next_sender_seq(&self, seq: u32) -> Result<(), StoreError> {
        self.set_counter(Direction::Sent, seq)
    }

    fn set_next_target_seq(&self, seq: u32) -> Result<(), StoreError> {
        self.set_counter(Direction::Received, seq)
    }

    async fn reset(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.sent.clear();
        inner.received.clear();
        inner.next_sender_seq = 1;
        inner.next_target_seq = 1;

        inner.body = File::create(&self.body_path)?;
        inner.body.sync_data()?;
        inner.body_end = 0;
        inner.header = File::create(&self.header_path)?;
        inner.header.sync_data()?;
        drop(inner);

        self.persist_seqnums(1, 1)
    }

    fn creation_time(&self) -> SystemTime {
        self.creation_time
    }
}
