//! Blocks: graph nodes with kind-specific payloads and id-indexed ports.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::eval::EvalState;
use super::layout::{Position, port_anchor};
use super::port::{Port, PortDirection, PortId};
use crate::error::GraphError;
use crate::protocol::{BlockKindTag, BlockRecord};

/// Code given to a visual block that arrives without any.
pub const DEFAULT_VISUAL_CODE: &str = "y0 = x0";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct BlockId(pub String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for BlockId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Kind-specific block payload.
#[derive(Clone, Debug, PartialEq)]
pub enum BlockKind {
    Code { code: String },
    /// A model layer. `shape` dims are `None` where the size is not fixed (batch axis).
    Layer {
        layer_type: String,
        shape: Vec<Option<u64>>,
    },
    Variable { var: String },
    Visual { code: String },
    Explain { code: String },
}

impl BlockKind {
    pub fn tag(&self) -> BlockKindTag {
        match self {
            BlockKind::Code { .. } => BlockKindTag::Code,
            BlockKind::Layer { .. } => BlockKindTag::Layer,
            BlockKind::Variable { .. } => BlockKindTag::Variable,
            BlockKind::Visual { .. } => BlockKindTag::Visual,
            BlockKind::Explain { .. } => BlockKindTag::Explain,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            BlockKind::Code { code } | BlockKind::Visual { code } | BlockKind::Explain { code } => {
                Some(code)
            }
            BlockKind::Layer { .. } | BlockKind::Variable { .. } => None,
        }
    }

    fn code_mut(&mut self) -> Option<&mut String> {
        match self {
            BlockKind::Code { code } | BlockKind::Visual { code } | BlockKind::Explain { code } => {
                Some(code)
            }
            BlockKind::Layer { .. } | BlockKind::Variable { .. } => None,
        }
    }

    /// Blocks that run user code and take part in whole-graph evaluation.
    pub fn is_executable(&self) -> bool {
        self.code().is_some()
    }

    pub fn is_visual(&self) -> bool {
        matches!(self, BlockKind::Visual { .. })
    }

    pub fn color(&self) -> &'static str {
        match self {
            BlockKind::Code { .. } | BlockKind::Layer { .. } | BlockKind::Variable { .. } => {
                "rgb(0,192,255)"
            }
            BlockKind::Visual { .. } => "#247BA0",
            BlockKind::Explain { .. } => "#3aa047",
        }
    }

    /// Ports every block of this kind starts with.
    fn default_ports(&self) -> Vec<Port> {
        match self {
            BlockKind::Variable { .. } => vec![Port::output("value")],
            BlockKind::Layer { .. } => vec![
                Port::input("input"),
                Port::output("output"),
                Port::output("bias"),
                Port::output("weights"),
            ],
            BlockKind::Code { .. } | BlockKind::Visual { .. } | BlockKind::Explain { .. } => {
                Vec::new()
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
    pub name: String,
    pub color: String,
    position: Position,
    /// Source of truth, in insertion order.
    ports: Vec<Port>,
    /// Derived from `ports`; rebuilt after every port change, never patched.
    ports_by_name: HashMap<String, PortId>,
    output_meta: BTreeMap<String, String>,
    pub eval: EvalState,
    delete_requested: bool,
}

impl Block {
    pub fn new(id: impl Into<BlockId>, kind: BlockKind, position: Position) -> Self {
        let id = id.into();
        let ports = kind.default_ports();
        let mut block = Self {
            name: format!("{} - {}", kind.tag(), id),
            color: kind.color().to_string(),
            id,
            kind,
            position,
            ports,
            ports_by_name: HashMap::new(),
            output_meta: BTreeMap::new(),
            eval: EvalState::default(),
            delete_requested: false,
        };
        block.rebuild_name_index();
        block.refresh_port_anchors();
        block
    }

    /// Build the correctly-typed block for an authority record.
    pub fn from_record(record: &BlockRecord) -> Result<Self, GraphError> {
        let code = record.code.clone().unwrap_or_default();
        let kind = match record.kind {
            BlockKindTag::Code => BlockKind::Code { code },
            BlockKindTag::Visual => BlockKind::Visual {
                code: if code.is_empty() {
                    DEFAULT_VISUAL_CODE.to_string()
                } else {
                    code
                },
            },
            BlockKindTag::Explain => BlockKind::Explain { code },
            BlockKindTag::Layer => BlockKind::Layer {
                layer_type: record.layer_type.clone().unwrap_or_default(),
                shape: record.shape.clone().unwrap_or_default(),
            },
            BlockKindTag::Variable => BlockKind::Variable {
                var: record.var.clone().unwrap_or_else(|| record.id.to_string()),
            },
        };

        let mut block = Block::new(record.id.clone(), kind, Position::new(record.x, record.y));
        let defaults: Vec<PortId> = block.ports.iter().map(|p| p.id.clone()).collect();
        let listed = record
            .inputs
            .iter()
            .map(|p| (p, PortDirection::In))
            .chain(record.outputs.iter().map(|p| (p, PortDirection::Out)));
        for (p, direction) in listed {
            let (id, name) = p.id_and_name();
            // records may repeat a kind's default ports
            if defaults.iter().any(|d| d.as_str() == id) {
                continue;
            }
            block.insert_port(Port::new(id, name, direction))?;
        }
        Ok(block)
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Move the block and recompute its port anchors.
    pub(crate) fn set_position(&mut self, position: Position) -> bool {
        if self.position == position {
            return false;
        }
        self.position = position;
        self.refresh_port_anchors();
        true
    }

    pub fn code(&self) -> Option<&str> {
        self.kind.code()
    }

    pub(crate) fn set_code(&mut self, code: &str) -> Result<(), GraphError> {
        match self.kind.code_mut() {
            Some(slot) => {
                *slot = code.to_string();
                Ok(())
            }
            None => Err(GraphError::InvalidArgument(format!(
                "block {} ({}) has no code",
                self.id,
                self.kind.tag()
            ))),
        }
    }

    // --- ports ---

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn port(&self, id: &PortId) -> Option<&Port> {
        self.ports.iter().find(|p| &p.id == id)
    }

    pub(crate) fn port_mut(&mut self, id: &PortId) -> Option<&mut Port> {
        self.ports.iter_mut().find(|p| &p.id == id)
    }

    /// Display lookup. When names collide the earliest port wins.
    pub fn port_by_name(&self, name: &str) -> Option<&Port> {
        self.ports_by_name.get(name).and_then(|id| self.port(id))
    }

    pub fn out_port_by_name(&self, name: &str) -> Option<&Port> {
        self.ports
            .iter()
            .find(|p| p.direction == PortDirection::Out && p.name() == name)
    }

    pub fn in_ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| p.is_input())
    }

    pub fn out_ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| !p.is_input())
    }

    /// Add a port. Names may collide; ids may not.
    pub(crate) fn insert_port(&mut self, port: Port) -> Result<(), GraphError> {
        if self.port(&port.id).is_some() {
            return Err(GraphError::DuplicatePort {
                block: self.id.clone(),
                port: port.id,
            });
        }
        self.ports.push(port);
        self.rebuild_name_index();
        self.refresh_port_anchors();
        Ok(())
    }

    /// Rename a port, returning its previous name.
    pub(crate) fn rename_port(&mut self, id: &PortId, name: &str) -> Result<String, GraphError> {
        let block = self.id.clone();
        let port = self.port_mut(id).ok_or_else(|| GraphError::UnknownPort {
            block,
            port: id.clone(),
        })?;
        let old = port.set_name(name);
        self.rebuild_name_index();
        Ok(old)
    }

    pub(crate) fn take_port(&mut self, id: &PortId) -> Result<Port, GraphError> {
        let idx = self
            .ports
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| GraphError::UnknownPort {
                block: self.id.clone(),
                port: id.clone(),
            })?;
        let port = self.ports.remove(idx);
        self.rebuild_name_index();
        self.refresh_port_anchors();
        Ok(port)
    }

    fn rebuild_name_index(&mut self) {
        let mut index = HashMap::with_capacity(self.ports.len());
        for port in &self.ports {
            index
                .entry(port.name().to_string())
                .or_insert_with(|| port.id.clone());
        }
        self.ports_by_name = index;
    }

    fn refresh_port_anchors(&mut self) {
        let origin = self.position;
        let (mut ins, mut outs) = (0usize, 0usize);
        for port in self.ports.iter_mut() {
            let row = if port.is_input() {
                ins += 1;
                ins - 1
            } else {
                outs += 1;
                outs - 1
            };
            port.set_anchor(port_anchor(origin, port.direction, row));
        }
    }

    // --- metadata ---

    pub fn output_meta(&self) -> &BTreeMap<String, String> {
        &self.output_meta
    }

    pub(crate) fn replace_output_meta(&mut self, meta: BTreeMap<String, String>) {
        self.output_meta = meta;
    }

    pub fn is_delete_requested(&self) -> bool {
        self.delete_requested
    }

    pub(crate) fn mark_delete_requested(&mut self) {
        self.delete_requested = true;
    }
}
