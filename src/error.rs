use std::fmt;

/// Everything that can go wrong inside the dynamic-size node layout.
///
/// This plays the role of the cursor's "sticky exception" from the page
/// cache: instead of an ambient mutable error slot the caller polls after
/// the fact, every fallible node-API call returns its failure directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// The page is too small to hold two minimum-sized entries at the
    /// configured offset/size-word widths. Fatal to the whole index.
    MetadataMismatch { page_size: usize, overhead: usize },
    /// An offset read back from the page falls outside `[0, page_size)`.
    OffsetOutOfRange { offset: usize, page_size: usize },
    /// A key or value size word exceeds `key_value_size_cap`.
    SizeExceedsCap { size: usize, cap: usize },
    /// `deadSpace` was read with its tombstone bit set, which can only
    /// happen if the page has been corrupted or mis-addressed.
    DeadSpaceTombstoned,
    /// `set_value_at` was asked to overwrite a value whose serialized
    /// length differs from what is currently stored; the tree layer must
    /// fall back to a remove+insert cycle instead.
    ValueSizeMismatch { expected: usize, actual: usize },
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::MetadataMismatch { page_size, overhead } => write!(
                f,
                "page size {} is too small to accommodate the minimum node overhead of {} bytes",
                page_size, overhead
            ),
            NodeError::OffsetOutOfRange { offset, page_size } => write!(
                f,
                "offset {} read back from the page lies outside [0, {})",
                offset, page_size
            ),
            NodeError::SizeExceedsCap { size, cap } => {
                write!(f, "size {} exceeds the key/value size cap of {}", size, cap)
            }
            NodeError::DeadSpaceTombstoned => {
                write!(f, "deadSpace header field has its tombstone bit set")
            }
            NodeError::ValueSizeMismatch { expected, actual } => write!(
                f,
                "stored value is {} bytes, new value is {} bytes; in-place update rejected",
                expected, actual
            ),
        }
    }
}

impl std::error::Error for NodeError {}
