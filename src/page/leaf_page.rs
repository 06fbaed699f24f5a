//! Leaf node: `[ keySize:S_k ][ valueSize:S_v ][ key bytes ][ value bytes ]`
//! blobs in the heap, addressed through a flat offset array (§3, §4.2-4.8).

use crate::dynsize::{
    has_tombstone, put_key_size, put_offset, put_tombstone, put_value_size, read_key_offset,
    read_key_size, read_offset, read_value_size, OFFSET_WIDTH, SIZE_WIDTH,
};
use crate::error::NodeError;
use crate::layout::Layout;
use crate::meta::LEAF_ENTRY_OVERHEAD;
use crate::page::split::{plan_split_middle, SplitOutcome};
use crate::page::{Overflow, Page, TreeNodeOps};

pub struct LeafNode {
    page: Page,
}

impl LeafNode {
    pub fn new(page: Page) -> Self {
        LeafNode { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn into_page(self) -> Page {
        self.page
    }

    fn slot_offset(&self, pos: usize) -> usize {
        self.page.offset_array_start() + pos * OFFSET_WIDTH
    }

    fn entry_offset(&self, pos: usize) -> Result<usize, NodeError> {
        let raw = read_offset(self.page.bytes(), self.slot_offset(pos)) as usize;
        self.page.check_offset(raw)
    }

    fn write_slot(&mut self, pos: usize, offset: usize) {
        let at = self.slot_offset(pos);
        put_offset(self.page.bytes_mut(), at, offset as u16);
    }

    fn offset_array_end(&self, key_count: usize) -> usize {
        self.page.offset_array_start() + key_count * OFFSET_WIDTH
    }

    /// Copies the raw blob (size words + key + value) at `src_pos` into
    /// `dest`'s heap, appends it to `dest`'s offset array at `dest_pos`,
    /// and removes it from this node (§4.7 step 3, `transferRawKeyValue`).
    fn transfer_one(
        &mut self,
        dest: &mut LeafNode,
        src_pos: usize,
        dest_pos: usize,
        self_key_count: usize,
    ) -> Result<(), NodeError> {
        let src_off = self.entry_offset(src_pos)?;
        let key_size = read_key_size(self.page.bytes(), src_off) as usize;
        let value_size = read_value_size(self.page.bytes(), src_off + SIZE_WIDTH) as usize;
        let total_len = SIZE_WIDTH + SIZE_WIDTH + key_size + value_size;

        let blob: Vec<u8> = self.page.bytes()[src_off..src_off + total_len].to_vec();
        let new_off = dest.page.alloc_offset() - total_len;
        dest.page.bytes_mut()[new_off..new_off + total_len].copy_from_slice(&blob);
        dest.page.set_alloc_offset(new_off);
        dest.write_slot(dest_pos, new_off);

        self.remove_key_value_at_impl(src_pos, self_key_count)
    }

    fn remove_key_value_at_impl(&mut self, pos: usize, key_count: usize) -> Result<(), NodeError> {
        let off = self.entry_offset(pos)?;
        let key_size = read_key_size(self.page.bytes(), off) as usize;
        let value_size = read_value_size(self.page.bytes(), off + SIZE_WIDTH) as usize;
        put_tombstone(self.page.bytes_mut(), off);

        let freed = SIZE_WIDTH + SIZE_WIDTH + key_size + value_size;
        let dead = self.page.dead_space()?;
        self.page.set_dead_space(dead + freed);

        let start = self.slot_offset(pos + 1);
        let end = self.offset_array_end(key_count);
        if end > start {
            self.page.bytes_mut().copy_within(start..end, self.slot_offset(pos));
        }
        log::debug!("leaf: removed key/value at pos {}, freed {} bytes", pos, freed);
        Ok(())
    }
}

impl<K, V, L: Layout<K, V>> TreeNodeOps<K, V, L> for LeafNode {
    fn key_at(&self, layout: &L, pos: usize) -> Result<K, NodeError> {
        let off = self.entry_offset(pos)?;
        let raw_key_size = crate::dynsize::read_key_size_raw(self.page.bytes(), off);
        if has_tombstone(raw_key_size) {
            return Err(NodeError::DeadSpaceTombstoned);
        }
        let key_size = self.page.check_size(raw_key_size as usize)?;
        let key_start = off + SIZE_WIDTH + SIZE_WIDTH;
        let mut cursor = &self.page.bytes()[key_start..key_start + key_size];
        layout
            .read_key(&mut cursor, key_size)
            .map_err(|_| NodeError::SizeExceedsCap { size: key_size, cap: key_size })
    }

    fn value_at(&self, layout: &L, pos: usize) -> Result<V, NodeError> {
        let off = self.entry_offset(pos)?;
        let key_size = read_key_size(self.page.bytes(), off) as usize;
        let value_size =
            self.page.check_size(read_value_size(self.page.bytes(), off + SIZE_WIDTH) as usize)?;
        let value_start = off + SIZE_WIDTH + SIZE_WIDTH + key_size;
        let mut cursor = &self.page.bytes()[value_start..value_start + value_size];
        layout
            .read_value(&mut cursor, value_size)
            .map_err(|_| NodeError::SizeExceedsCap { size: value_size, cap: value_size })
    }

    /// Note the design decision preserved from the source this layout is
    /// based on: the stored key size is read here with `read_key_offset`
    /// (the offset-width reader) rather than `read_key_size` (the
    /// size-width reader). At this crate's fixed widths the two reads are
    /// byte-identical on a live (non-tombstoned) entry, so the value is
    /// located correctly; a future build that widens the offset field
    /// independently of the size word would need this revisited.
    fn set_value_at(&mut self, layout: &L, pos: usize, value: &V) -> Result<(), NodeError> {
        let off = self.entry_offset(pos)?;
        let stored_key_size = read_key_offset(self.page.bytes(), off) as usize;
        let stored_value_size = read_value_size(self.page.bytes(), off + SIZE_WIDTH) as usize;
        let new_value_size = layout.value_size(value);
        if new_value_size != stored_value_size {
            return Err(NodeError::ValueSizeMismatch {
                expected: stored_value_size,
                actual: new_value_size,
            });
        }
        let value_start = off + SIZE_WIDTH + SIZE_WIDTH + stored_key_size;
        let mut cursor = &mut self.page.bytes_mut()[value_start..value_start + new_value_size];
        layout.write_value(&mut cursor, value).map_err(|_| NodeError::ValueSizeMismatch {
            expected: stored_value_size,
            actual: new_value_size,
        })
    }

    fn insert_key_value_at(
        &mut self,
        layout: &L,
        pos: usize,
        key_count: usize,
        key: &K,
        value: &V,
    ) -> Result<(), NodeError> {
        let key_size = self.page.check_size(layout.key_size(key))?;
        let value_size = self.page.check_size(layout.value_size(value))?;
        let total_len = SIZE_WIDTH + SIZE_WIDTH + key_size + value_size;

        let new_off = self.page.alloc_offset() - total_len;
        put_key_size(self.page.bytes_mut(), new_off, key_size as u16);
        put_value_size(self.page.bytes_mut(), new_off + SIZE_WIDTH, value_size as u16);
        let key_start = new_off + SIZE_WIDTH + SIZE_WIDTH;
        {
            let mut buf: Vec<u8> = Vec::with_capacity(key_size);
            layout.write_key(&mut buf, key).expect("write_key to Vec is infallible");
            self.page.bytes_mut()[key_start..key_start + key_size].copy_from_slice(&buf);
        }
        {
            let mut buf: Vec<u8> = Vec::with_capacity(value_size);
            layout.write_value(&mut buf, value).expect("write_value to Vec is infallible");
            let value_start = key_start + key_size;
            self.page.bytes_mut()[value_start..value_start + value_size].copy_from_slice(&buf);
        }
        self.page.set_alloc_offset(new_off);

        let hole_start = self.slot_offset(pos);
        let hole_end = self.offset_array_end(key_count);
        if hole_end > hole_start {
            self.page.bytes_mut().copy_within(hole_start..hole_end, hole_start + OFFSET_WIDTH);
        }
        self.write_slot(pos, new_off);
        log::debug!("leaf: inserted at pos {}, alloc_offset now {}", pos, new_off);
        Ok(())
    }

    fn remove_key_value_at(&mut self, _layout: &L, pos: usize, key_count: usize) -> Result<(), NodeError> {
        self.remove_key_value_at_impl(pos, key_count)
    }

    fn leaf_overflow(&self, layout: &L, key_count: usize, new_key: &K, new_value: &V) -> Result<Overflow, NodeError> {
        let alloc = self.page.alloc_offset().saturating_sub(self.offset_array_end(key_count));
        let dead = self.page.dead_space()?;
        let need =
            SIZE_WIDTH + SIZE_WIDTH + layout.key_size(new_key) + layout.value_size(new_value) + OFFSET_WIDTH;
        let classification = if need < alloc {
            Overflow::No
        } else if need < alloc + dead {
            Overflow::NeedDefrag
        } else {
            Overflow::Yes
        };
        log::trace!("leaf_overflow: need={} alloc={} dead={} -> {:?}", need, alloc, dead, classification);
        Ok(classification)
    }

    fn leaf_underflow(&self, key_count: usize) -> bool {
        let alloc_gap = self.page.alloc_offset().saturating_sub(self.offset_array_end(key_count));
        let dead = self.page.dead_space().unwrap_or(0);
        let available = alloc_gap + dead;
        available > self.page.page_size() / 2
    }

    fn defragment_leaf(&mut self, _layout: &L, key_count: usize) -> Result<(), NodeError> {
        let page_size = self.page.page_size();

        let mut entries: Vec<(usize, usize, usize)> = Vec::with_capacity(key_count);
        for pos in 0..key_count {
            let off = self.entry_offset(pos)?;
            let key_size = read_key_size(self.page.bytes(), off) as usize;
            let value_size = read_value_size(self.page.bytes(), off + SIZE_WIDTH) as usize;
            let total_len = SIZE_WIDTH + SIZE_WIDTH + key_size + value_size;
            entries.push((pos, off, total_len));
        }
        // Process highest-original-offset-first: those blobs already sit
        // closest to the page tail, so repacking in this order never
        // requires sliding a not-yet-moved blob out from under one that
        // was already placed.
        entries.sort_by(|a, b| b.1.cmp(&a.1));

        let mut write_cursor = page_size;
        for (pos, old_off, total_len) in &entries {
            write_cursor -= total_len;
            if write_cursor != *old_off {
                self.page.bytes_mut().copy_within(*old_off..*old_off + total_len, write_cursor);
            }
            self.write_slot(*pos, write_cursor);
        }
        self.page.set_alloc_offset(write_cursor);
        self.page.set_dead_space(0);
        log::debug!("leaf: defragmented, alloc_offset now {}", write_cursor);
        Ok(())
    }

    fn do_split_leaf(
        &mut self,
        layout: &L,
        key_count: usize,
        insert_pos: usize,
        new_key: K,
        new_value: V,
    ) -> Result<SplitOutcome<K>, NodeError>
    where
        Self: Sized,
    {
        let mut costs = Vec::with_capacity(key_count);
        for pos in 0..key_count {
            let off = self.entry_offset(pos)?;
            let key_size = read_key_size(self.page.bytes(), off) as usize;
            let value_size = read_value_size(self.page.bytes(), off + SIZE_WIDTH) as usize;
            costs.push(SIZE_WIDTH + SIZE_WIDTH + key_size + value_size + OFFSET_WIDTH);
        }
        let new_key_size = self.page.check_size(layout.key_size(&new_key))?;
        let new_value_size = self.page.check_size(layout.value_size(&new_value))?;
        let new_entry_cost = SIZE_WIDTH + SIZE_WIDTH + new_key_size + new_value_size + OFFSET_WIDTH;
        let middle_pos = plan_split_middle(&costs, insert_pos, new_entry_cost);

        let mut right = LeafNode::new(Page::new_leaf(self.page.meta()));

        let (move_start, new_goes_right) = if insert_pos < middle_pos {
            (middle_pos - 1, false)
        } else {
            (middle_pos, true)
        };

        let mut current_left_count = key_count;
        let mut right_count = 0usize;
        while current_left_count > move_start {
            self.transfer_one(&mut right, move_start, right_count, current_left_count)?;
            current_left_count -= 1;
            right_count += 1;
        }
        self.defragment_leaf(layout, current_left_count)?;

        if new_goes_right {
            let dest_pos = insert_pos - middle_pos;
            right.insert_key_value_at(layout, dest_pos, right_count, &new_key, &new_value)?;
            right_count += 1;
        } else {
            self.insert_key_value_at(layout, insert_pos, current_left_count, &new_key, &new_value)?;
            current_left_count += 1;
        }

        let split_key = TreeNodeOps::<K, V, L>::key_at(&right, layout, 0)?;
        log::debug!(
            "leaf: split at middle_pos {} -> left={} right={}",
            middle_pos, current_left_count, right_count
        );
        Ok(SplitOutcome::new(split_key, right.into_page(), current_left_count, right_count))
    }

    fn reasonable_key_count(&self) -> usize {
        let available = self.page.page_size().saturating_sub(self.page.offset_array_start());
        available / LEAF_ENTRY_OVERHEAD.max(1)
    }
}

#[cfg(test)]
mod tests_leafpage {
    use super::*;
    use crate::layout::BytesLayout;
    use crate::meta::DynamicNodeMeta;

    fn new_leaf(page_size: usize, cap: usize) -> LeafNode {
        let meta = DynamicNodeMeta::new(page_size, cap).unwrap();
        LeafNode::new(Page::new_leaf(meta))
    }

    #[test]
    fn s1_insert_and_read() {
        let mut leaf = new_leaf(256, 64);
        let layout = BytesLayout;
        let key = b"hello".to_vec();
        let value = b"world".to_vec();
        leaf.insert_key_value_at(&layout, 0, 0, &key, &value).unwrap();

        assert_eq!(leaf.page.alloc_offset(), 256 - (2 + 2 + 5 + 5));
        assert_eq!(leaf.page.dead_space().unwrap(), 0);
        assert_eq!(TreeNodeOps::<Vec<u8>, Vec<u8>, _>::key_at(&leaf, &layout, 0).unwrap(), key);
        assert_eq!(TreeNodeOps::<Vec<u8>, Vec<u8>, _>::value_at(&leaf, &layout, 0).unwrap(), value);
        assert_eq!(leaf.entry_offset(0).unwrap(), 242);
    }

    #[test]
    fn s2_remove_and_reclaim() {
        let mut leaf = new_leaf(256, 64);
        let layout = BytesLayout;
        let key = b"hello".to_vec();
        let value = b"world".to_vec();
        leaf.insert_key_value_at(&layout, 0, 0, &key, &value).unwrap();

        TreeNodeOps::<Vec<u8>, Vec<u8>, _>::remove_key_value_at(&mut leaf, &layout, 0, 1).unwrap();
        assert_eq!(leaf.page.dead_space().unwrap(), 14);

        let xx = b"xx".to_vec();
        let yy = b"yy".to_vec();
        let classification =
            TreeNodeOps::<Vec<u8>, Vec<u8>, _>::leaf_overflow(&leaf, &layout, 0, &xx, &yy).unwrap();
        assert_eq!(classification, Overflow::No);

        leaf.insert_key_value_at(&layout, 0, 0, &xx, &yy).unwrap();
        assert_eq!(leaf.page.alloc_offset(), 234);

        TreeNodeOps::<Vec<u8>, Vec<u8>, _>::defragment_leaf(&mut leaf, &layout, 1).unwrap();
        assert_eq!(leaf.page.alloc_offset(), 248);
        assert_eq!(leaf.page.dead_space().unwrap(), 0);
        assert_eq!(TreeNodeOps::<Vec<u8>, Vec<u8>, _>::key_at(&leaf, &layout, 0).unwrap(), xx);
        assert_eq!(TreeNodeOps::<Vec<u8>, Vec<u8>, _>::value_at(&leaf, &layout, 0).unwrap(), yy);
    }

    #[test]
    fn s6_in_place_update() {
        let mut leaf = new_leaf(256, 64);
        let layout = BytesLayout;
        let key = b"k".to_vec();
        let va = vec![1, 2];
        leaf.insert_key_value_at(&layout, 0, 0, &key, &va).unwrap();

        let vb = vec![9, 9];
        TreeNodeOps::<Vec<u8>, Vec<u8>, _>::set_value_at(&mut leaf, &layout, 0, &vb).unwrap();
        assert_eq!(TreeNodeOps::<Vec<u8>, Vec<u8>, _>::value_at(&leaf, &layout, 0).unwrap(), vb);
        assert_eq!(TreeNodeOps::<Vec<u8>, Vec<u8>, _>::key_at(&leaf, &layout, 0).unwrap(), key);

        let too_big = vec![1, 2, 3];
        let err =
            TreeNodeOps::<Vec<u8>, Vec<u8>, _>::set_value_at(&mut leaf, &layout, 0, &too_big).unwrap_err();
        assert_eq!(err, NodeError::ValueSizeMismatch { expected: 2, actual: 3 });
        assert_eq!(TreeNodeOps::<Vec<u8>, Vec<u8>, _>::value_at(&leaf, &layout, 0).unwrap(), vb);
    }

    #[test]
    fn split_halves_used_space() {
        let mut leaf = new_leaf(256, 64);
        let layout = BytesLayout;
        // 8-byte entries: 2+2 size words + 2-byte key + 2-byte value.
        for i in 0u8..10 {
            let key = vec![i];
            let value = vec![i, i];
            leaf.insert_key_value_at(&layout, i as usize, i as usize, &key, &value).unwrap();
        }

        let new_key = vec![99u8];
        let new_value = vec![9u8, 9];
        let outcome =
            TreeNodeOps::<Vec<u8>, Vec<u8>, _>::do_split_leaf(&mut leaf, &layout, 10, 2, new_key, new_value)
                .unwrap();

        assert_eq!(outcome.left_key_count + outcome.right_key_count, 11);
        let right = LeafNode::new(outcome.right_page);
        let right_key0 = TreeNodeOps::<Vec<u8>, Vec<u8>, _>::key_at(&right, &layout, 0).unwrap();
        assert_eq!(right_key0, outcome.split_key);
    }

    #[test]
    fn split_insert_after_middle() {
        let mut leaf = new_leaf(256, 64);
        let layout = BytesLayout;
        for i in 0u8..10 {
            let key = vec![i];
            let value = vec![i, i];
            leaf.insert_key_value_at(&layout, i as usize, i as usize, &key, &value).unwrap();
        }
        let new_key = vec![200u8];
        let new_value = vec![7u8, 7];
        let outcome =
            TreeNodeOps::<Vec<u8>, Vec<u8>, _>::do_split_leaf(&mut leaf, &layout, 10, 8, new_key, new_value)
                .unwrap();
        assert_eq!(outcome.left_key_count + outcome.right_key_count, 11);
    }
}
