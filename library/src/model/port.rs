//! Ports: directional attachment points owned by exactly one block.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::block::BlockId;
use super::layout::Position;
use super::link::LinkId;

/// Stable port identity. Display names are separate and may change.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PortId(pub String);

impl PortId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PortId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    In,
    Out,
}

impl PortDirection {
    pub fn from_input(input: bool) -> Self {
        if input {
            PortDirection::In
        } else {
            PortDirection::Out
        }
    }

    pub fn is_input(self) -> bool {
        matches!(self, PortDirection::In)
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::In => f.write_str("in"),
            PortDirection::Out => f.write_str("out"),
        }
    }
}

/// Identifies a specific port on a specific block.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub block: BlockId,
    pub port: PortId,
}

impl PortRef {
    pub fn new(block: impl Into<BlockId>, port: impl Into<PortId>) -> Self {
        Self {
            block: block.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.block, self.port)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Port {
    pub id: PortId,
    name: String,
    pub direction: PortDirection,
    links: Vec<LinkId>,
    /// Screen coordinate of the port, recomputed whenever the owning block moves.
    anchor: Option<Position>,
}

impl Port {
    pub fn new(id: impl Into<PortId>, name: &str, direction: PortDirection) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            direction,
            links: Vec::new(),
            anchor: None,
        }
    }

    /// Input port whose id is its initial name.
    pub fn input(name: &str) -> Self {
        Self::new(name, name, PortDirection::In)
    }

    /// Output port whose id is its initial name.
    pub fn output(name: &str) -> Self {
        Self::new(name, name, PortDirection::Out)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: &str) -> String {
        std::mem::replace(&mut self.name, name.to_string())
    }

    pub fn is_input(&self) -> bool {
        self.direction.is_input()
    }

    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn has_link(&self, link: &LinkId) -> bool {
        self.links.contains(link)
    }

    /// Links other than `link` currently attached here.
    pub fn other_links(&self, link: &LinkId) -> Vec<LinkId> {
        self.links.iter().filter(|l| *l != link).cloned().collect()
    }

    pub(crate) fn add_link(&mut self, link: LinkId) {
        if !self.links.contains(&link) {
            self.links.push(link);
        }
    }

    pub(crate) fn remove_link(&mut self, link: &LinkId) -> bool {
        let before = self.links.len();
        self.links.retain(|l| l != link);
        before != self.links.len()
    }

    pub(crate) fn replace_link(&mut self, old: &LinkId, new: LinkId) {
        for l in self.links.iter_mut() {
            if l == old {
                *l = new.clone();
            }
        }
    }

    pub fn anchor(&self) -> Option<Position> {
        self.anchor
    }

    pub(crate) fn set_anchor(&mut self, anchor: Position) {
        self.anchor = Some(anchor);
    }
}
