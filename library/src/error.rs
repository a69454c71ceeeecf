use thiserror::Error;

use crate::model::{BlockId, LinkId, PortId};

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
    #[error("Config serialization error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
    #[error("Block {0} not found")]
    UnknownBlock(BlockId),
    #[error("Port {port} not found on block {block}")]
    UnknownPort { block: BlockId, port: PortId },
    #[error("Link {0} not found")]
    UnknownLink(LinkId),
    #[error("Block {block} already has a port with id {port}")]
    DuplicatePort { block: BlockId, port: PortId },
    #[error("Cannot link two {0} ports")]
    SameDirection(crate::model::PortDirection),
    #[error("Input port {port} on block {block} is held by implicit link {link}")]
    ImplicitLinkOccupied {
        block: BlockId,
        port: PortId,
        link: LinkId,
    },
    #[error("Tensor decode error: {0}")]
    Tensor(String),
    #[error("Unknown event: {0}")]
    UnknownEvent(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl GraphError {
    pub fn tensor(msg: impl Into<String>) -> Self {
        GraphError::Tensor(msg.into())
    }
}
