//! Graph entities: blocks, their ports, and the links between them.
//!
//! Entities here know nothing about the authority. The [`GraphStore`](crate::store::GraphStore)
//! owns them and turns local mutations into requests.

pub mod block;
pub mod eval;
pub mod layout;
pub mod link;
pub mod port;

pub use block::{Block, BlockId, BlockKind};
pub use eval::{EvalOutput, EvalResult, EvalState, RunId};
pub use layout::Position;
pub use link::{Link, LinkEnd, LinkId};
pub use port::{Port, PortDirection, PortId, PortRef};

/// Whether a local mutation should be reported to the authority.
///
/// Echoes applied from authority pushes always use [`Notify::Silent`] so they
/// never bounce back as new requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notify {
    Authority,
    Silent,
}

impl Notify {
    pub fn is_authority(self) -> bool {
        matches!(self, Notify::Authority)
    }
}
