//! TCP option interning table and compressed option lists.
//!
//! A 16-slot associative store maps option kinds to list indices
//! (RFC 6846 Section 6.3.4). Slots 0..6 are permanently reserved for the
//! seven well-known kinds; slots 7..15 intern other kinds, with their
//! values cached in a fixed bump arena. The per-packet protocol is
//! "same index / same value / new index": an index is established with
//! its value once, then reused without the value while the value holds.
//! Timestamp and SACK change on nearly every packet and therefore always
//! travel with a compressed value under their fixed index.

use tracing::{debug, warn};

use crate::error::RohcBuildingError;
use crate::serialization::PacketWriter;
use crate::types::Timestamp;

use super::constants::{
    LIST_PS_8BIT, MAX_TCP_OPTION_INDEX, TCP_INDEX_EOL, TCP_INDEX_FIRST_DYNAMIC,
    TCP_INDEX_FREE_KIND, TCP_INDEX_MAXSEG, TCP_INDEX_NOP, TCP_INDEX_SACK,
    TCP_INDEX_SACK_PERMITTED, TCP_INDEX_TIMESTAMP, TCP_INDEX_WINDOW, TCP_OPTIONS_ARENA_SIZE,
    XI_VALUE_PRESENT,
};
use super::encodings::{sack_pure_lsb, ts_lsb};
use super::protocol_types::{SackBlock, TcpHeader, TcpOption};

/// How one walked option maps onto the compressed list.
enum ListItem {
    /// Index reuse; no value travels.
    Index(u8),
    /// Index with a compressed value following the XI items.
    IndexWithValue(u8),
    /// The option cannot be represented this packet and is dropped.
    Dropped,
}

/// The 16-slot TCP option interning table with its value arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpOptionsTable {
    /// Option kind held by each slot; `0xFF` marks a free slot.
    kinds: [u8; MAX_TCP_OPTION_INDEX],
    /// Arena offset of each interned value (dynamic slots only).
    value_offsets: [usize; MAX_TCP_OPTION_INDEX],
    /// Length-prefixed values of interned generic options.
    arena: [u8; TCP_OPTIONS_ARENA_SIZE],
    /// First free arena byte.
    free_offset: usize,
    /// Cached MSS value for the reserved slot.
    mss: u16,
    /// Cached window-scale shift for the reserved slot.
    window_scale: u8,
    /// Cached TSval, the reference for the next ts_lsb encoding.
    tsval: Timestamp,
    /// Cached TSecr.
    tsecr: Timestamp,
    /// Cached SACK blocks.
    sack_blocks: [SackBlock; 4],
    /// Number of valid cached SACK blocks.
    sack_count: u8,
}

impl Default for TcpOptionsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpOptionsTable {
    /// Creates an empty table; all slots free.
    pub fn new() -> Self {
        Self {
            kinds: [TCP_INDEX_FREE_KIND; MAX_TCP_OPTION_INDEX],
            value_offsets: [0; MAX_TCP_OPTION_INDEX],
            arena: [0; TCP_OPTIONS_ARENA_SIZE],
            free_offset: 0,
            mss: 0,
            window_scale: 0,
            tsval: Timestamp::new(0),
            tsecr: Timestamp::new(0),
            sack_blocks: [SackBlock { start: 0, end: 0 }; 4],
            sack_count: 0,
        }
    }

    /// Kind currently held by `slot`, `0xFF` when free.
    #[inline]
    pub fn slot_kind(&self, slot: u8) -> u8 {
        self.kinds[slot as usize]
    }

    /// Whether `slot` is free (invariant: `kind == 0xFF` iff free).
    #[inline]
    pub fn is_free(&self, slot: u8) -> bool {
        self.kinds[slot as usize] == TCP_INDEX_FREE_KIND
    }

    /// Cached TSval reference.
    #[inline]
    pub fn cached_tsval(&self) -> Timestamp {
        self.tsval
    }

    /// Cached SACK blocks.
    pub fn cached_sack(&self) -> &[SackBlock] {
        &self.sack_blocks[..self.sack_count as usize]
    }

    /// Builds the compressed option list of a CO packet (seq_8, rnd_8,
    /// co_common with `list_present = 1`).
    ///
    /// # Errors
    /// - [`RohcBuildingError::BufferTooSmall`] - `w` cannot hold the list
    pub fn build_co_list(
        &mut self,
        tcp: &TcpHeader,
        w: &mut PacketWriter<'_>,
    ) -> Result<(), RohcBuildingError> {
        let mut xi_items: Vec<u8> = Vec::with_capacity(tcp.options.len());
        let mut value_buf = [0u8; TCP_OPTIONS_ARENA_SIZE];
        let mut values = PacketWriter::new(
            &mut value_buf,
            crate::error::ParseContext::CompressedOptionList,
        );

        for option in &tcp.options {
            match self.resolve_co_item(option, tcp, &mut values)? {
                ListItem::Index(index) => xi_items.push(index),
                ListItem::IndexWithValue(index) => xi_items.push(XI_VALUE_PRESENT | index),
                ListItem::Dropped => {}
            }
        }

        debug_assert!(xi_items.len() <= 15, "parser bounds the option count");
        w.write_u8(LIST_PS_8BIT | xi_items.len() as u8)?;
        w.write_slice(&xi_items)?;
        w.write_slice(values.as_written())
    }

    /// Builds the option descriptor list of the TCP dynamic part (IR and
    /// IR-DYN): every option gets an XI item with the value-present flag
    /// and the item values are the raw option bytes.
    ///
    /// # Errors
    /// - [`RohcBuildingError::BufferTooSmall`] - `w` cannot hold the list
    pub fn build_ir_list(
        &mut self,
        tcp: &TcpHeader,
        w: &mut PacketWriter<'_>,
    ) -> Result<(), RohcBuildingError> {
        let mut xi_items: Vec<u8> = Vec::with_capacity(tcp.options.len());

        for option in &tcp.options {
            match self.resolve_ir_item(option) {
                Some(index) => xi_items.push(XI_VALUE_PRESENT | index),
                None => {
                    warn!(kind = option.kind(), "option table full, dropping from IR list");
                }
            }
        }

        w.write_u8(LIST_PS_8BIT | xi_items.len() as u8)?;
        w.write_slice(&xi_items)?;
        w.write_slice(&tcp.options_raw)
    }

    fn resolve_co_item(
        &mut self,
        option: &TcpOption,
        tcp: &TcpHeader,
        values: &mut PacketWriter<'_>,
    ) -> Result<ListItem, RohcBuildingError> {
        match option {
            TcpOption::Nop => {
                self.kinds[TCP_INDEX_NOP as usize] = option.kind();
                Ok(ListItem::Index(TCP_INDEX_NOP))
            }
            TcpOption::Eol => {
                self.kinds[TCP_INDEX_EOL as usize] = option.kind();
                Ok(ListItem::Index(TCP_INDEX_EOL))
            }
            TcpOption::SackPermitted => {
                self.kinds[TCP_INDEX_SACK_PERMITTED as usize] = option.kind();
                Ok(ListItem::Index(TCP_INDEX_SACK_PERMITTED))
            }
            TcpOption::Mss(mss) => {
                if self.is_free(TCP_INDEX_MAXSEG) {
                    self.kinds[TCP_INDEX_MAXSEG as usize] = option.kind();
                    self.mss = *mss;
                    values.write_u16(*mss)?;
                    Ok(ListItem::IndexWithValue(TCP_INDEX_MAXSEG))
                } else if self.mss == *mss {
                    Ok(ListItem::Index(TCP_INDEX_MAXSEG))
                } else {
                    self.intern_dynamic(option.kind(), &mss.to_be_bytes(), values)
                }
            }
            TcpOption::WindowScale(shift) => {
                if self.is_free(TCP_INDEX_WINDOW) {
                    self.kinds[TCP_INDEX_WINDOW as usize] = option.kind();
                    self.window_scale = *shift;
                    values.write_u8(*shift)?;
                    Ok(ListItem::IndexWithValue(TCP_INDEX_WINDOW))
                } else if self.window_scale == *shift {
                    Ok(ListItem::Index(TCP_INDEX_WINDOW))
                } else {
                    self.intern_dynamic(option.kind(), &[*shift], values)
                }
            }
            TcpOption::Timestamp { tsval, tsecr } => {
                // The timestamp changes every packet; it keeps its index
                // and always carries a compressed value.
                self.kinds[TCP_INDEX_TIMESTAMP as usize] = option.kind();
                ts_lsb(values, self.tsval, *tsval)?;
                ts_lsb(values, self.tsecr, *tsecr)?;
                self.tsval = *tsval;
                self.tsecr = *tsecr;
                Ok(ListItem::IndexWithValue(TCP_INDEX_TIMESTAMP))
            }
            TcpOption::Sack(blocks) => {
                self.kinds[TCP_INDEX_SACK as usize] = option.kind();
                let rollback = values.len();
                match Self::encode_sack(blocks, tcp.ack_number.value(), values) {
                    Ok(()) => {
                        self.cache_sack(blocks);
                        Ok(ListItem::IndexWithValue(TCP_INDEX_SACK))
                    }
                    Err(RohcBuildingError::InvalidFieldValueForBuild { .. }) => {
                        values.truncate(rollback);
                        warn!("SACK block too far from ACK, dropping option");
                        Ok(ListItem::Dropped)
                    }
                    Err(other) => Err(other),
                }
            }
            TcpOption::Generic { kind, data } => self.intern_dynamic(*kind, data, values),
        }
    }

    fn resolve_ir_item(&mut self, option: &TcpOption) -> Option<u8> {
        match option {
            TcpOption::Nop => {
                self.kinds[TCP_INDEX_NOP as usize] = option.kind();
                Some(TCP_INDEX_NOP)
            }
            TcpOption::Eol => {
                self.kinds[TCP_INDEX_EOL as usize] = option.kind();
                Some(TCP_INDEX_EOL)
            }
            TcpOption::SackPermitted => {
                self.kinds[TCP_INDEX_SACK_PERMITTED as usize] = option.kind();
                Some(TCP_INDEX_SACK_PERMITTED)
            }
            TcpOption::Mss(mss) => {
                self.kinds[TCP_INDEX_MAXSEG as usize] = option.kind();
                self.mss = *mss;
                Some(TCP_INDEX_MAXSEG)
            }
            TcpOption::WindowScale(shift) => {
                self.kinds[TCP_INDEX_WINDOW as usize] = option.kind();
                self.window_scale = *shift;
                Some(TCP_INDEX_WINDOW)
            }
            TcpOption::Timestamp { tsval, tsecr } => {
                self.kinds[TCP_INDEX_TIMESTAMP as usize] = option.kind();
                self.tsval = *tsval;
                self.tsecr = *tsecr;
                Some(TCP_INDEX_TIMESTAMP)
            }
            TcpOption::Sack(blocks) => {
                self.kinds[TCP_INDEX_SACK as usize] = option.kind();
                self.cache_sack(blocks);
                Some(TCP_INDEX_SACK)
            }
            TcpOption::Generic { kind, data } => {
                if let Some(slot) = self.find_dynamic_with_value(*kind, data) {
                    Some(slot)
                } else {
                    self.store_dynamic(*kind, data)
                }
            }
        }
    }

    /// Interns `value` for `kind` at a fresh dynamic slot and emits the
    /// establishment item, or reuses an existing slot with the same
    /// value. A full table or arena drops the option.
    fn intern_dynamic(
        &mut self,
        kind: u8,
        value: &[u8],
        values: &mut PacketWriter<'_>,
    ) -> Result<ListItem, RohcBuildingError> {
        if let Some(slot) = self.find_dynamic_with_value(kind, value) {
            return Ok(ListItem::Index(slot));
        }
        match self.store_dynamic(kind, value) {
            Some(slot) => {
                values.write_u8(kind)?;
                values.write_u8(value.len() as u8)?;
                values.write_slice(value)?;
                Ok(ListItem::IndexWithValue(slot))
            }
            None => {
                warn!(kind, "option table full, dropping option from compressed list");
                Ok(ListItem::Dropped)
            }
        }
    }

    /// A dynamic slot already holding `kind` with exactly `value`.
    fn find_dynamic_with_value(&self, kind: u8, value: &[u8]) -> Option<u8> {
        (TCP_INDEX_FIRST_DYNAMIC..MAX_TCP_OPTION_INDEX as u8).find(|&slot| {
            self.kinds[slot as usize] == kind && self.arena_value(slot) == value
        })
    }

    /// Claims a free dynamic slot for `kind` and copies `value` into the
    /// arena. Returns `None` when the table or the arena is exhausted.
    fn store_dynamic(&mut self, kind: u8, value: &[u8]) -> Option<u8> {
        let slot =
            (TCP_INDEX_FIRST_DYNAMIC..MAX_TCP_OPTION_INDEX as u8).find(|&s| self.is_free(s))?;
        if self.free_offset + 1 + value.len() > TCP_OPTIONS_ARENA_SIZE {
            warn!(
                kind,
                needed = 1 + value.len(),
                free = TCP_OPTIONS_ARENA_SIZE - self.free_offset,
                "option value arena exhausted"
            );
            return None;
        }
        self.kinds[slot as usize] = kind;
        self.value_offsets[slot as usize] = self.free_offset;
        self.arena[self.free_offset] = value.len() as u8;
        self.arena[self.free_offset + 1..self.free_offset + 1 + value.len()]
            .copy_from_slice(value);
        self.free_offset += 1 + value.len();
        debug!(kind, slot, "interned option at dynamic slot");
        Some(slot)
    }

    /// The cached value of a dynamic slot.
    fn arena_value(&self, slot: u8) -> &[u8] {
        let offset = self.value_offsets[slot as usize];
        let len = self.arena[offset] as usize;
        &self.arena[offset + 1..offset + 1 + len]
    }

    fn cache_sack(&mut self, blocks: &[SackBlock]) {
        self.sack_count = blocks.len().min(4) as u8;
        for (slot, block) in self.sack_blocks.iter_mut().zip(blocks.iter()) {
            *slot = *block;
        }
    }

    /// Compressed SACK value: block count, then each block start relative
    /// to the previous end (the ACK for the first) and each end relative
    /// to its start.
    fn encode_sack(
        blocks: &[SackBlock],
        ack: u32,
        values: &mut PacketWriter<'_>,
    ) -> Result<(), RohcBuildingError> {
        values.write_u8(blocks.len() as u8)?;
        let mut base = ack;
        for block in blocks {
            sack_pure_lsb(values, base, block.start)?;
            sack_pure_lsb(values, block.start, block.end)?;
            base = block.end;
        }
        Ok(())
    }
}
