//! Per-tree, validate-once node metadata (page size, offset/size-word
//! widths, key/value size cap). Mirrors the lineage's `DatabaseMeta`:
//! small, `Copy`-able, constructed once and threaded through every call
//! instead of re-derived.

use crate::dynsize::{CHILD_WIDTH, OFFSET_WIDTH, SIZE_WIDTH};
use crate::error::NodeError;

/// Width of the base tree-node header this layout is appended after
/// (page tag, key count, sibling pointer, generation — owned by the
/// out-of-scope tree layer).
pub const BASE_HEADER_LEN: usize = 12;

/// `allocOffset` + `deadSpace`, the two fields this layout owns.
pub const DYNAMIC_HEADER_LEN: usize = OFFSET_WIDTH + OFFSET_WIDTH;

pub const HEADER_LEN: usize = BASE_HEADER_LEN + DYNAMIC_HEADER_LEN;

/// Fixed bookkeeping cost of one leaf entry: its offset-array slot plus
/// its key-size and value-size words.
pub const LEAF_ENTRY_OVERHEAD: usize = OFFSET_WIDTH + SIZE_WIDTH + SIZE_WIDTH;

/// Fixed bookkeeping cost of one internal entry: its offset-array slot,
/// its child pointer, and its key-size word.
pub const INTERNAL_ENTRY_OVERHEAD: usize = OFFSET_WIDTH + CHILD_WIDTH + SIZE_WIDTH;

/// Minimum key/value size cap, per §3: "≥ 64 bits".
const MIN_KEY_VALUE_SIZE_CAP: usize = 8;

/// Validated, immutable configuration for one dynamic-size node layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicNodeMeta {
    page_size: usize,
    key_value_size_cap: usize,
}

impl DynamicNodeMeta {
    /// Validates `key_value_size_cap` against §3's rule:
    /// `totalSpace / 2 - totalOverhead >= keyValueSizeCap >= 64 bits`.
    ///
    /// `totalOverhead` is taken as the header plus one leaf entry's fixed
    /// bookkeeping cost, since that is the smallest unit of overhead every
    /// live entry must pay regardless of key/value length.
    pub fn new(page_size: usize, key_value_size_cap: usize) -> Result<Self, NodeError> {
        let overhead = HEADER_LEN + LEAF_ENTRY_OVERHEAD;
        let max_cap = (page_size / 2).saturating_sub(overhead);
        if key_value_size_cap < MIN_KEY_VALUE_SIZE_CAP || key_value_size_cap > max_cap {
            return Err(NodeError::MetadataMismatch {
                page_size,
                overhead,
            });
        }
        Ok(DynamicNodeMeta {
            page_size,
            key_value_size_cap,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn key_value_size_cap(&self) -> usize {
        self.key_value_size_cap
    }

    pub fn header_len(&self) -> usize {
        HEADER_LEN
    }
}
