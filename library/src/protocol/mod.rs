//! Wire format of the authority event channel.
//!
//! The transport itself is external; it hands us `(event name, JSON payload)`
//! pairs and accepts the same in return.

mod event;
mod records;
mod request;

pub use event::{
    BatchBegin, BlockMoved, BlockPatch, BlockRef, EpochBegin, EvalResults, LinkRef, PortCreated,
    PortDeleted, PortRenamed, PushEvent, RawOutput, RawResult, ResultMeta, Sequenced,
};
pub use records::{BlockKindTag, BlockRecord, LinkRecord, PortRecord, Snapshot, VariableRecord};
pub use request::{BlockCreate, CreateKind, Request};
