//! On-disk dictionary: a fixed-stride slot array addressed by open hashing
//! with linear probing.
//!
//! A slot whose pointer is 0 is empty, which is why no data file ever
//! stores a record at offset 0.

use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::{IndexError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotLayout {
    /// 8-byte pointer + 4-byte record size (single-segment index).
    PointerAndSize,
    /// 8-byte pointer; records carry their own length prefix (scalable index).
    PointerOnly,
}

impl SlotLayout {
    pub const fn stride(self) -> u64 {
        match self {
            SlotLayout::PointerAndSize => 12,
            SlotLayout::PointerOnly => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Slot {
    pub ptr: u64,
    pub size: u32,
}

impl Slot {
    pub fn is_empty(&self) -> bool {
        self.ptr == 0
    }

    fn decode(layout: SlotLayout, bytes: &[u8]) -> Slot {
        let mut ptr = [0u8; 8];
        ptr.copy_from_slice(&bytes[..8]);
        let size = match layout {
            SlotLayout::PointerAndSize => {
                let mut size = [0u8; 4];
                size.copy_from_slice(&bytes[8..12]);
                u32::from_be_bytes(size)
            }
            SlotLayout::PointerOnly => 0,
        };
        Slot { ptr: u64::from_be_bytes(ptr), size }
    }

    fn encode_into(&self, layout: SlotLayout, out: &mut [u8]) {
        out[..8].copy_from_slice(&self.ptr.to_be_bytes());
        if layout == SlotLayout::PointerAndSize {
            out[8..12].copy_from_slice(&self.size.to_be_bytes());
        }
    }
}

/// 32-bit polynomial string hash over UTF-16 code units (`h = 31*h + c`).
pub fn string_hash(term: &str) -> i32 {
    term.encode_utf16()
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(i32::from(c)))
}

pub fn home_slot(term: &str, table_size: u64) -> u64 {
    ((string_hash(term) & 0x0fff_ffff) as u64) % table_size
}

/// Slot indices visited for `term`: the home slot, then successive slots,
/// wrapping around, each slot at most once.
pub fn probe_sequence(term: &str, table_size: u64) -> impl Iterator<Item = u64> {
    let start = home_slot(term, table_size);
    (0..table_size).map(move |i| (start + i) % table_size)
}

/// Slot table assembled in memory during a build, then written in one go.
pub struct DictionaryBuilder {
    layout: SlotLayout,
    table_size: u64,
    table: Vec<u8>,
    filled: u64,
    collisions: u64,
}

impl DictionaryBuilder {
    pub fn new(layout: SlotLayout, table_size: u64) -> Self {
        let table_size = table_size.max(1);
        Self {
            layout,
            table_size,
            table: vec![0u8; (table_size * layout.stride()) as usize],
            filled: 0,
            collisions: 0,
        }
    }

    fn slot_bytes(&mut self, idx: u64) -> &mut [u8] {
        let stride = self.layout.stride() as usize;
        let at = idx as usize * stride;
        &mut self.table[at..at + stride]
    }

    /// Writes `slot` into the first empty slot of `term`'s probe sequence.
    pub fn insert(&mut self, term: &str, slot: Slot) -> Result<()> {
        debug_assert!(!slot.is_empty(), "records never live at offset 0");
        let layout = self.layout;
        for idx in probe_sequence(term, self.table_size) {
            let bytes = self.slot_bytes(idx);
            if Slot::decode(layout, bytes).is_empty() {
                slot.encode_into(layout, bytes);
                self.filled += 1;
                return Ok(());
            }
            self.collisions += 1;
        }
        Err(IndexError::DictionaryFull { table_size: self.table_size })
    }

    pub fn len(&self) -> u64 {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn collisions(&self) -> u64 {
        self.collisions
    }

    pub fn write(self, path: &Path) -> Result<()> {
        let mut f = File::create(path)?;
        f.write_all(&self.table)?;
        f.sync_all()?;
        tracing::info!(
            path = %path.display(),
            terms = self.filled,
            collisions = self.collisions,
            "dictionary written"
        );
        Ok(())
    }
}

/// Read side of the slot table, one seek per probed slot.
pub struct DiskDictionary {
    layout: SlotLayout,
    table_size: u64,
    file: Mutex<File>,
}

impl DiskDictionary {
    /// Opens the dictionary file; `None` when it does not exist yet.
    pub fn open(path: &Path, layout: SlotLayout) -> Result<Option<Self>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata()?.len();
        if len % layout.stride() != 0 {
            return Err(IndexError::MalformedRecord(format!(
                "dictionary {} is {len} bytes, not a multiple of the {}-byte slot",
                path.display(),
                layout.stride()
            )));
        }
        let table_size = len / layout.stride();
        if table_size == 0 {
            return Ok(None);
        }
        Ok(Some(Self { layout, table_size, file: Mutex::new(file) }))
    }

    pub fn layout(&self) -> SlotLayout {
        self.layout
    }

    pub fn table_size(&self) -> u64 {
        self.table_size
    }

    pub fn read_slot(&self, idx: u64) -> Result<Slot> {
        let stride = self.layout.stride();
        let mut buf = [0u8; 12];
        let buf = &mut buf[..stride as usize];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(idx * stride))?;
        file.read_exact(buf)?;
        Ok(Slot::decode(self.layout, buf))
    }

    /// Every occupied slot, in table order.
    pub fn occupied_slots(&self) -> Result<Vec<Slot>> {
        let stride = self.layout.stride() as usize;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(&mut *file);
        let mut buf = vec![0u8; stride];
        let mut slots = Vec::new();
        for _ in 0..self.table_size {
            reader.read_exact(&mut buf)?;
            let slot = Slot::decode(self.layout, &buf);
            if !slot.is_empty() {
                slots.push(slot);
            }
        }
        Ok(slots)
    }
}
