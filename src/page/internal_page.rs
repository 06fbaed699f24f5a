//! Internal node: offset array interleaved with child pointers —
//! `[child0][off0,child1][off1,child2]…` — one more child than keys (§3).
//! Each heap blob holds only a key (`[ keySize:S_k ][ key bytes ]`); the
//! child pointer lives in the interleave itself, not in the heap.

use crate::dynsize::{put_key_size, put_offset, read_key_size, read_offset, CHILD_WIDTH, OFFSET_WIDTH, SIZE_WIDTH};
use crate::error::NodeError;
use crate::layout::Layout;
use crate::meta::INTERNAL_ENTRY_OVERHEAD;
use crate::page::{Page, TreeNodeOps};

/// Width of one repeating `[offset, child]` interleave unit after child0.
const PITCH: usize = OFFSET_WIDTH + CHILD_WIDTH;

pub struct InternalNode {
    page: Page,
}

impl InternalNode {
    pub fn new(page: Page) -> Self {
        InternalNode { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn into_page(self) -> Page {
        self.page
    }

    fn interleave_start(&self) -> usize {
        self.page.offset_array_start()
    }

    /// Byte offset of the slot holding key `i`'s heap offset word, for
    /// `i` in `0..key_count`.
    fn key_slot_offset(&self, i: usize) -> usize {
        self.interleave_start() + CHILD_WIDTH + i * PITCH
    }

    /// Byte offset of the child-pointer slot for child `pos`, for `pos`
    /// in `0..=key_count`.
    fn child_slot_offset(&self, pos: usize) -> usize {
        if pos == 0 {
            self.interleave_start()
        } else {
            self.key_slot_offset(pos - 1) + OFFSET_WIDTH
        }
    }

    /// First byte past the interleave region for a node holding
    /// `key_count` keys.
    fn interleave_end(&self, key_count: usize) -> usize {
        self.interleave_start() + CHILD_WIDTH + key_count * PITCH
    }

    fn key_heap_offset(&self, pos: usize) -> Result<usize, NodeError> {
        let raw = read_offset(self.page.bytes(), self.key_slot_offset(pos)) as usize;
        self.page.check_offset(raw)
    }
}

impl<K, V, L: Layout<K, V>> TreeNodeOps<K, V, L> for InternalNode {
    fn key_at(&self, layout: &L, pos: usize) -> Result<K, NodeError> {
        let off = self.key_heap_offset(pos)?;
        let key_size = self.page.check_size(read_key_size(self.page.bytes(), off) as usize)?;
        let key_start = off + SIZE_WIDTH;
        let mut cursor = &self.page.bytes()[key_start..key_start + key_size];
        layout
            .read_key(&mut cursor, key_size)
            .map_err(|_| NodeError::SizeExceedsCap { size: key_size, cap: key_size })
    }

    fn child_at(&self, pos: usize) -> Result<u64, NodeError> {
        let at = self.child_slot_offset(pos);
        let bytes = &self.page.bytes()[at..at + CHILD_WIDTH];
        let mut value = 0u64;
        for &b in bytes {
            value = (value << 8) | b as u64;
        }
        Ok(value)
    }

    fn set_child_at(&mut self, pos: usize, child: u64) -> Result<(), NodeError> {
        let at = self.child_slot_offset(pos);
        let bytes = &mut self.page.bytes_mut()[at..at + CHILD_WIDTH];
        for (i, b) in bytes.iter_mut().enumerate() {
            let shift = 8 * (CHILD_WIDTH - 1 - i);
            *b = ((child >> shift) & 0xFF) as u8;
        }
        Ok(())
    }

    fn insert_key_and_right_child_at(
        &mut self,
        layout: &L,
        pos: usize,
        key_count: usize,
        key: &K,
        right_child: u64,
    ) -> Result<(), NodeError> {
        let key_size = self.page.check_size(layout.key_size(key))?;
        let total_len = SIZE_WIDTH + key_size;
        let new_off = self.page.alloc_offset() - total_len;
        put_key_size(self.page.bytes_mut(), new_off, key_size as u16);
        {
            let mut buf: Vec<u8> = Vec::with_capacity(key_size);
            layout.write_key(&mut buf, key).expect("write_key to Vec is infallible");
            let key_start = new_off + SIZE_WIDTH;
            self.page.bytes_mut()[key_start..key_start + key_size].copy_from_slice(&buf);
        }
        self.page.set_alloc_offset(new_off);

        let shift_start = self.key_slot_offset(pos);
        let shift_end = self.interleave_end(key_count);
        if shift_end > shift_start {
            self.page.bytes_mut().copy_within(shift_start..shift_end, shift_start + PITCH);
        }
        put_offset(self.page.bytes_mut(), shift_start, new_off as u16);
        self.set_child_at(pos + 1, right_child)?;
        log::debug!("internal: inserted key at pos {} with right child {}", pos, right_child);
        Ok(())
    }

    fn remove_key_and_right_child_at(&mut self, pos: usize, key_count: usize) -> Result<(), NodeError> {
        let off = self.key_heap_offset(pos)?;
        crate::dynsize::put_tombstone(self.page.bytes_mut(), off);

        let shift_start = self.key_slot_offset(pos);
        let shift_src = shift_start + PITCH;
        let end = self.interleave_end(key_count);
        if end > shift_src {
            self.page.bytes_mut().copy_within(shift_src..end, shift_start);
        }
        log::debug!("internal: removed key and right child at pos {}", pos);
        Ok(())
    }

    fn remove_key_and_left_child_at(&mut self, pos: usize, key_count: usize) -> Result<(), NodeError> {
        let off = self.key_heap_offset(pos)?;
        crate::dynsize::put_tombstone(self.page.bytes_mut(), off);

        let shift_dest = self.child_slot_offset(pos);
        let shift_src = self.child_slot_offset(pos + 1);
        let end = self.interleave_end(key_count);
        if end > shift_src {
            self.page.bytes_mut().copy_within(shift_src..end, shift_dest);
        }
        log::debug!("internal: removed key and left child at pos {}", pos);
        Ok(())
    }

    fn internal_overflow(&self, layout: &L, key_count: usize, new_key: &K) -> bool {
        let alloc = self.page.alloc_offset().saturating_sub(self.interleave_end(key_count));
        let need = SIZE_WIDTH + layout.key_size(new_key) + PITCH;
        need >= alloc
    }

    fn reasonable_key_count(&self) -> usize {
        let available = self.page.page_size().saturating_sub(self.page.offset_array_start());
        available / INTERNAL_ENTRY_OVERHEAD.max(1)
    }
}
