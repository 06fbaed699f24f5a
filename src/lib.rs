mod dynsize;
mod error;
mod layout;
mod meta;
mod page;

pub use error::NodeError;
pub use layout::{BytesLayout, Layout};
pub use meta::DynamicNodeMeta;
pub use page::internal_page::InternalNode;
pub use page::leaf_page::LeafNode;
pub use page::split::SplitOutcome;
pub use page::{Overflow, Page, TreeNodeOps};
