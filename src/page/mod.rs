//! The node's byte-level home: a page is a mutable byte slice owned by the
//! node value itself, per the design note in SPEC_FULL.md §9 — "cursor"
//! operations collapse into local slice arithmetic instead of a trait
//! object threaded through every call.

pub mod internal_page;
pub mod leaf_page;
pub mod split;

use crate::dynsize::{has_tombstone, put_offset, read_offset};
use crate::error::NodeError;
use crate::layout::Layout;
use crate::meta::{DynamicNodeMeta, BASE_HEADER_LEN};
use crate::page::split::SplitOutcome;

pub const LEAF_TAG: u8 = 0x01;
pub const INTERNAL_TAG: u8 = 0x02;

/// Result of the fit test ahead of an insert: §4.4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    No,
    NeedDefrag,
    Yes,
}

/// One fixed-size page holding the dynamic-size portion of a node's
/// header plus its offset array and entry heap. The base header (page
/// tag, key count, sibling pointer, generation) lives in the same byte
/// region but is owned and interpreted by the out-of-scope tree layer;
/// this type only reaches into it far enough to read/write its own tag
/// byte and the two fields appended immediately after it.
pub struct Page {
    bytes: Box<[u8]>,
    meta: DynamicNodeMeta,
}

impl Page {
    fn new(meta: DynamicNodeMeta, tag: u8) -> Self {
        let mut bytes = vec![0u8; meta.page_size()].into_boxed_slice();
        bytes[0] = tag;
        let mut page = Page { bytes, meta };
        page.set_alloc_offset(meta.page_size());
        page.set_dead_space(0);
        page
    }

    pub fn new_leaf(meta: DynamicNodeMeta) -> Self {
        Page::new(meta, LEAF_TAG)
    }

    pub fn new_internal(meta: DynamicNodeMeta) -> Self {
        Page::new(meta, INTERNAL_TAG)
    }

    pub fn tag(&self) -> u8 {
        self.bytes[0]
    }

    pub fn meta(&self) -> DynamicNodeMeta {
        self.meta
    }

    pub fn page_size(&self) -> usize {
        self.meta.page_size()
    }

    pub fn offset_array_start(&self) -> usize {
        self.meta.header_len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn alloc_offset(&self) -> usize {
        read_offset(&self.bytes, BASE_HEADER_LEN) as usize
    }

    pub fn set_alloc_offset(&mut self, value: usize) {
        debug_assert!(value <= self.meta.page_size());
        put_offset(&mut self.bytes, BASE_HEADER_LEN, value as u16);
    }

    /// Reads `deadSpace`, asserting its tombstone bit is clear (§4.2's
    /// invariant witness: this field is never itself a tombstoned blob).
    pub fn dead_space(&self) -> Result<usize, NodeError> {
        let at = BASE_HEADER_LEN + 2;
        let raw = read_offset(&self.bytes, at);
        if has_tombstone(raw) {
            log::warn!("deadSpace at header offset {} has its tombstone bit set", at);
            return Err(NodeError::DeadSpaceTombstoned);
        }
        Ok(raw as usize)
    }

    pub fn set_dead_space(&mut self, value: usize) {
        let at = BASE_HEADER_LEN + 2;
        put_offset(&mut self.bytes, at, value as u16);
    }

    /// Range-checks an offset read back from the offset array, per §4.3:
    /// "range-checks it against P... setting a cursor exception rather
    /// than crashing".
    pub(crate) fn check_offset(&self, offset: usize) -> Result<usize, NodeError> {
        if offset >= self.page_size() {
            log::warn!(
                "offset {} read back from the page lies outside [0, {})",
                offset,
                self.page_size()
            );
            return Err(NodeError::OffsetOutOfRange {
                offset,
                page_size: self.page_size(),
            });
        }
        Ok(offset)
    }

    pub(crate) fn check_size(&self, size: usize) -> Result<usize, NodeError> {
        if size > self.meta.key_value_size_cap() {
            log::warn!(
                "size {} exceeds the key/value size cap of {}",
                size,
                self.meta.key_value_size_cap()
            );
            return Err(NodeError::SizeExceedsCap {
                size,
                cap: self.meta.key_value_size_cap(),
            });
        }
        Ok(size)
    }
}

/// The node API exposed to the tree layer (§6). A single trait unifies
/// leaf and internal operations; `key_count` is always an explicit
/// parameter since it is a base-header field owned by the tree layer, not
/// tracked by this layout. Operations that do not apply to a given node
/// kind, and operations this layout snapshot does not support at all
/// (§9's "match the partial contract" decision), default to
/// `unimplemented!()` so a wrong call fails loudly at the call site
/// rather than silently doing nothing.
pub trait TreeNodeOps<K, V, L: Layout<K, V>> {
    fn key_at(&self, layout: &L, pos: usize) -> Result<K, NodeError>;

    fn value_at(&self, _layout: &L, _pos: usize) -> Result<V, NodeError> {
        unimplemented!("value_at is leaf-only")
    }

    fn set_value_at(&mut self, _layout: &L, _pos: usize, _value: &V) -> Result<(), NodeError> {
        unimplemented!("set_value_at is leaf-only")
    }

    fn child_at(&self, _pos: usize) -> Result<u64, NodeError> {
        unimplemented!("child_at is internal-only")
    }

    fn set_child_at(&mut self, _pos: usize, _child: u64) -> Result<(), NodeError> {
        unimplemented!("set_child_at is internal-only")
    }

    fn insert_key_value_at(
        &mut self,
        _layout: &L,
        _pos: usize,
        _key_count: usize,
        _key: &K,
        _value: &V,
    ) -> Result<(), NodeError> {
        unimplemented!("insert_key_value_at is leaf-only")
    }

    fn insert_key_and_right_child_at(
        &mut self,
        _layout: &L,
        _pos: usize,
        _key_count: usize,
        _key: &K,
        _right_child: u64,
    ) -> Result<(), NodeError> {
        unimplemented!("insert_key_and_right_child_at is internal-only")
    }

    fn remove_key_value_at(
        &mut self,
        _layout: &L,
        _pos: usize,
        _key_count: usize,
    ) -> Result<(), NodeError> {
        unimplemented!("remove_key_value_at is leaf-only")
    }

    fn remove_key_and_right_child_at(
        &mut self,
        _pos: usize,
        _key_count: usize,
    ) -> Result<(), NodeError> {
        unimplemented!("remove_key_and_right_child_at is internal-only")
    }

    fn remove_key_and_left_child_at(
        &mut self,
        _pos: usize,
        _key_count: usize,
    ) -> Result<(), NodeError> {
        unimplemented!("remove_key_and_left_child_at is internal-only")
    }

    fn internal_overflow(&self, _layout: &L, _key_count: usize, _new_key: &K) -> bool {
        unimplemented!("internal_overflow is internal-only")
    }

    fn leaf_overflow(
        &self,
        _layout: &L,
        _key_count: usize,
        _new_key: &K,
        _new_value: &V,
    ) -> Result<Overflow, NodeError> {
        unimplemented!("leaf_overflow is leaf-only")
    }

    fn leaf_underflow(&self, _key_count: usize) -> bool {
        unimplemented!("leaf_underflow is leaf-only")
    }

    fn defragment_leaf(&mut self, _layout: &L, _key_count: usize) -> Result<(), NodeError> {
        unimplemented!("defragment_leaf is leaf-only")
    }

    fn do_split_leaf(
        &mut self,
        _layout: &L,
        _key_count: usize,
        _insert_pos: usize,
        _new_key: K,
        _new_value: V,
    ) -> Result<SplitOutcome<K>, NodeError>
    where
        Self: Sized,
    {
        unimplemented!("do_split_leaf is leaf-only")
    }

    /// The one sizing query §6 lists that this layout fully implements
    /// regardless of node kind: an estimate of how many minimum-footprint
    /// entries the page could reasonably hold.
    fn reasonable_key_count(&self) -> usize;

    // --- Unsupported in this snapshot (§9's "match the partial contract"). ---

    fn set_key_at(&mut self, _layout: &L, _pos: usize, _key: &K) {
        unimplemented!("setKeyAt is not supported on dynamic-size nodes")
    }

    fn leaf_max_key_count(&self) -> usize {
        unimplemented!(
            "leafMaxKeyCount is not supported on dynamic-size nodes: variable-length \
             entries have no fixed maximum key count"
        )
    }

    fn reasonable_child_count(&self) -> usize {
        unimplemented!("reasonableChildCount is not supported on dynamic-size nodes")
    }

    fn can_rebalance_leaves(&self, _other: &Self) -> bool
    where
        Self: Sized,
    {
        unimplemented!("canRebalanceLeaves is not supported on dynamic-size nodes")
    }

    fn can_merge_leaves(&self, _other: &Self) -> bool
    where
        Self: Sized,
    {
        unimplemented!("canMergeLeaves is not supported on dynamic-size nodes")
    }

    fn do_split_internal(
        &mut self,
        _layout: &L,
        _key_count: usize,
        _insert_pos: usize,
        _key: K,
        _right_child: u64,
    ) -> SplitOutcome<K>
    where
        Self: Sized,
    {
        unimplemented!("doSplitInternal is not supported on dynamic-size nodes")
    }

    fn move_key_values_from_left_to_right(&mut self, _layout: &L, _other: &mut Self, _count: usize)
    where
        Self: Sized,
    {
        unimplemented!("moveKeyValuesFromLeftToRight is not supported on dynamic-size nodes")
    }
}
