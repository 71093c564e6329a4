//! Key-addressed chained files over a block store.

use core::mem;

use log::{debug, trace, warn};

use crate::config::{BLOCK_NONE, FREE, HEADER_SIZE};
use crate::error::{Error, Result};
use crate::header::{BlockHeader, BlockKind, Key};
use crate::scan::{commit, payload_offset, read_header, read_info, read_next, Scanner};
use crate::store::{BlockStore, Geometry};

/// What the engine is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Writing,
    Reading,
}

/// Position inside the chain of the active session.
#[derive(Debug, Clone, Copy)]
struct Chain {
    key: Key,
    first: u16,
    block: u16,
    /// `next` of the current block (reading only).
    next: Option<u16>,
    /// Payload bytes consumed or produced in the current block.
    cursor: u16,
    /// `used` of the current block (reading only).
    used: u16,
    /// Bytes consumed or produced since the session started.
    position: u32,
    /// A store call failed mid-write; only `abort` is accepted.
    broken: bool,
}

impl Chain {
    fn start(key: Key, block: u16, next: Option<u16>, used: u16) -> Self {
        Self {
            key,
            first: block,
            block,
            next,
            cursor: 0,
            used,
            position: 0,
            broken: false,
        }
    }

    /// Header for the current block of a chain being written.
    fn header(&self, next: Option<u16>) -> BlockHeader {
        let kind = if self.block == self.first {
            BlockKind::Head(self.key)
        } else {
            BlockKind::Link(self.key)
        };
        BlockHeader {
            kind,
            next,
            used: self.cursor,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Session {
    Idle,
    Writing(Chain),
    Reading(Chain),
}

/// Storage engine handle.
///
/// Owns the block store, the rotating scan cursor and at most one open
/// file session. All calls are synchronous; see [`SharedFs`](crate::SharedFs)
/// for use from more than one context.
pub struct LightFs<S: BlockStore> {
    store: S,
    geometry: Geometry,
    scanner: Scanner,
    session: Session,
}

impl<S: BlockStore> LightFs<S> {
    /// Query the store geometry and validate it.
    ///
    /// A block must hold the header plus at least one payload byte, and the
    /// block count must be non-zero and not equal to the `0xFFFF` sentinel.
    pub fn init(mut store: S) -> Result<Self> {
        let geometry = store.geometry()?;
        if geometry.block_size <= HEADER_SIZE
            || geometry.block_count == 0
            || geometry.block_count == BLOCK_NONE
        {
            warn!("rejecting store geometry {geometry:?}");
            return Err(Error::InvalidConfig);
        }
        debug!(
            "init: {} blocks of {} bytes",
            geometry.block_count, geometry.block_size
        );
        Ok(Self {
            store,
            geometry,
            scanner: Scanner::new(geometry.block_count),
            session: Session::Idle,
        })
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Payload bytes per block.
    pub fn capacity(&self) -> u16 {
        self.geometry.block_size - HEADER_SIZE
    }

    pub fn mode(&self) -> Mode {
        match self.session {
            Session::Idle => Mode::Idle,
            Session::Writing(_) => Mode::Writing,
            Session::Reading(_) => Mode::Reading,
        }
    }

    /// Key of the open session, if any.
    pub fn active_key(&self) -> Option<u8> {
        match &self.session {
            Session::Idle => None,
            Session::Writing(chain) | Session::Reading(chain) => Some(chain.key.get()),
        }
    }

    /// Bytes written or read so far in the open session.
    pub fn position(&self) -> Option<u32> {
        match &self.session {
            Session::Idle => None,
            Session::Writing(chain) | Session::Reading(chain) => Some(chain.position),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the engine and return the underlying store.
    pub fn into_store(self) -> S {
        self.store
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.session {
            Session::Idle => Ok(()),
            _ => Err(Error::InvalidState),
        }
    }

    /// Check that a head block for `key` exists.
    ///
    /// Returns [`Error::NotExists`] if it does not.
    pub fn exists(&mut self, key: u8) -> Result<()> {
        let key = Key::new(key)?;
        match self.scanner.find_head(&mut self.store, key, false)? {
            Some(_) => Ok(()),
            None => Err(Error::NotExists),
        }
    }

    /// Start writing a new file under `key`.
    ///
    /// Claims a free block as the head; its header is committed later, on
    /// the first block change or on [`save`](Self::save).
    pub fn create(&mut self, key: u8) -> Result<()> {
        self.ensure_idle()?;
        let key = Key::new(key)?;
        if self.scanner.find_head(&mut self.store, key, false)?.is_some() {
            return Err(Error::AlreadyExists);
        }
        let block = allocate(&mut self.scanner, &mut self.store)?;
        debug!("create key {} at block {block}", key.get());
        self.session = Session::Writing(Chain::start(key, block, None, 0));
        Ok(())
    }

    /// Append `data` to the file being written.
    ///
    /// Spills into newly allocated blocks as each one fills up. After a
    /// store failure the session only accepts [`abort`](Self::abort).
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        let capacity = self.capacity();
        let Self {
            store,
            scanner,
            session,
            ..
        } = self;
        let Session::Writing(chain) = session else {
            return Err(Error::InvalidState);
        };
        if chain.broken {
            return Err(Error::InvalidState);
        }

        let result = append(store, scanner, chain, capacity, data);
        if result == Err(Error::Failed) {
            warn!("write of key {} failed, session needs abort", chain.key.get());
            chain.broken = true;
        }
        result
    }

    /// Commit the last block of the file being written and end the session.
    pub fn save(&mut self) -> Result<()> {
        let Self {
            store,
            scanner,
            session,
            ..
        } = self;
        let Session::Writing(chain) = session else {
            return Err(Error::InvalidState);
        };
        if chain.broken {
            return Err(Error::InvalidState);
        }
        if let Err(err) = commit(store, scanner, chain.block, &chain.header(None)) {
            chain.broken = true;
            return Err(err);
        }
        debug!("saved key {}: {} bytes", chain.key.get(), chain.position);
        *session = Session::Idle;
        Ok(())
    }

    /// Start reading the file stored under `key`.
    pub fn open(&mut self, key: u8) -> Result<()> {
        self.ensure_idle()?;
        let key = Key::new(key)?;
        let found = self
            .scanner
            .find_head(&mut self.store, key, true)?
            .ok_or(Error::NotExists)?;
        debug!("open key {} at block {}", key.get(), found.block);
        self.session = Session::Reading(Chain::start(key, found.block, found.next, found.used));
        Ok(())
    }

    /// Fill `buf` with the next bytes of the file being read.
    ///
    /// Fails with [`Error::EndOfFile`] if fewer than `buf.len()` bytes
    /// remain; the read position is left where it was.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        let len = buf.len();
        self.consume(Some(buf), len)
    }

    /// Advance the read position by `len` bytes without copying them.
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.consume(None, len)
    }

    fn consume(&mut self, mut out: Option<&mut [u8]>, len: usize) -> Result<()> {
        let Self { store, session, .. } = self;
        let Session::Reading(chain) = session else {
            return Err(Error::InvalidState);
        };

        // Work on a copy so a short file leaves the session untouched.
        let mut walk = *chain;
        let mut done = 0;
        while done < len {
            let left = walk.used.saturating_sub(walk.cursor);
            if left == 0 {
                let next = walk.next.ok_or(Error::EndOfFile)?;
                let header = read_header(store, next)?;
                trace!("key {} followed {} -> {next}", walk.key.get(), walk.block);
                walk.block = next;
                walk.next = header.next;
                walk.used = header.used;
                walk.cursor = 0;
                continue;
            }

            let take = (len - done).min(left as usize);
            if let Some(buf) = out.as_deref_mut() {
                store.read(
                    walk.block,
                    payload_offset(walk.cursor),
                    &mut buf[done..done + take],
                )?;
            }
            walk.cursor += take as u16;
            walk.position += take as u32;
            done += take;
        }

        *chain = walk;
        Ok(())
    }

    /// End a read session.
    pub fn close(&mut self) -> Result<()> {
        let Session::Reading(chain) = &self.session else {
            return Err(Error::InvalidState);
        };
        debug!("close key {} after {} bytes", chain.key.get(), chain.position);
        self.session = Session::Idle;
        Ok(())
    }

    /// Drop the open session, whatever its state.
    ///
    /// A file being written is discarded: every block already claimed for
    /// it is erased. Nothing is written for a read session. The engine is
    /// idle on return even if an erase fails; the error is still reported
    /// and the blocks left behind can be reclaimed with [`format`](Self::format).
    pub fn abort(&mut self) -> Result<()> {
        match mem::replace(&mut self.session, Session::Idle) {
            Session::Idle => Err(Error::InvalidState),
            Session::Reading(_) => Ok(()),
            Session::Writing(chain) => {
                warn!("discarding unsaved key {}", chain.key.get());
                self.scanner.forget();
                let next = read_next(&mut self.store, chain.first)?;
                erase_chain(&mut self.store, chain.first, next)?;
                Ok(())
            }
        }
    }

    /// Erase every block of the file stored under `key`.
    pub fn delete(&mut self, key: u8) -> Result<()> {
        self.ensure_idle()?;
        let key = Key::new(key)?;
        let found = self
            .scanner
            .find_head(&mut self.store, key, true)?
            .ok_or(Error::NotExists)?;
        let erased = erase_chain(&mut self.store, found.block, found.next)?;
        debug!("deleted key {}: {erased} blocks", key.get());
        Ok(())
    }

    /// Total length of the file stored under `key`.
    pub fn size(&mut self, key: u8) -> Result<u32> {
        let key = Key::new(key)?;
        let found = self
            .scanner
            .find_head(&mut self.store, key, true)?
            .ok_or(Error::NotExists)?;

        let mut total = found.used as u32;
        let mut next = found.next;
        let mut hops = 0u16;
        while let Some(block) = next {
            hops += 1;
            if hops >= self.geometry.block_count {
                warn!("chain of key {} does not terminate", key.get());
                return Err(Error::Failed);
            }
            let header = read_header(&mut self.store, block)?;
            total += header.used as u32;
            next = header.next;
        }
        Ok(total)
    }

    /// Number of blocks available for allocation.
    pub fn free_blocks(&mut self) -> Result<u16> {
        let mut free = 0;
        for block in 0..self.geometry.block_count {
            if self.scanner.reserved() == Some(block) {
                continue;
            }
            if read_info(&mut self.store, block)? == FREE {
                free += 1;
            }
        }
        Ok(free)
    }

    /// Erase the whole store.
    pub fn format(&mut self) -> Result<()> {
        self.ensure_idle()?;
        for block in 0..self.geometry.block_count {
            self.store.erase(block)?;
        }
        self.scanner.reset();
        debug!("formatted {} blocks", self.geometry.block_count);
        Ok(())
    }
}

/// Append `data` to the chain, claiming a new block each time one fills up.
fn append<S: BlockStore>(
    store: &mut S,
    scanner: &mut Scanner,
    chain: &mut Chain,
    capacity: u16,
    mut data: &[u8],
) -> Result<()> {
    while !data.is_empty() {
        let room = capacity - chain.cursor;
        if room == 0 {
            let new = allocate(scanner, store)?;
            commit(store, scanner, chain.block, &chain.header(Some(new)))?;
            trace!("key {} advanced {} -> {new}", chain.key.get(), chain.block);
            chain.block = new;
            chain.cursor = 0;
            continue;
        }

        let take = data.len().min(room as usize);
        store.write(
            chain.block,
            payload_offset(chain.cursor),
            &data[..take],
            false,
        )?;
        chain.cursor += take as u16;
        chain.position += take as u32;
        data = &data[take..];
    }
    Ok(())
}

fn allocate<S: BlockStore>(scanner: &mut Scanner, store: &mut S) -> Result<u16> {
    scanner.find_free(store)?.ok_or_else(|| {
        warn!("no free block left");
        Error::OutOfMemory
    })
}

/// Erase `block` and every block after it. `next` is `block`'s own `next`.
fn erase_chain<S: BlockStore>(store: &mut S, block: u16, mut next: Option<u16>) -> Result<u16> {
    store.erase(block)?;
    let mut erased = 1;
    while let Some(block) = next {
        next = read_next(store, block)?;
        store.erase(block)?;
        erased += 1;
    }
    Ok(erased)
}
