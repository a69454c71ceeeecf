use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{BlockId, PortId};

/// Block kind as spelled on the wire. Both the old capitalised and the short forms are accepted.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BlockKindTag {
    #[serde(alias = "Code")]
    Code,
    #[serde(alias = "Layer")]
    Layer,
    #[serde(alias = "Variable", alias = "var")]
    Variable,
    #[serde(alias = "Visual")]
    Visual,
    #[serde(alias = "Explain")]
    Explain,
}

impl fmt::Display for BlockKindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BlockKindTag::Code => "code",
            BlockKindTag::Layer => "layer",
            BlockKindTag::Variable => "variable",
            BlockKindTag::Visual => "visual",
            BlockKindTag::Explain => "explain",
        };
        f.write_str(s)
    }
}

/// A port as listed on a block record: either a bare name (id = name) or `{id, name}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum PortRecord {
    Name(String),
    Full { id: PortId, name: String },
}

impl PortRecord {
    pub fn id_and_name(&self) -> (&str, &str) {
        match self {
            PortRecord::Name(name) => (name, name),
            PortRecord::Full { id, name } => (id.as_str(), name),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BlockRecord {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub kind: BlockKindTag,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<Option<u64>>>,
    #[serde(default)]
    pub inputs: Vec<PortRecord>,
    #[serde(default)]
    pub outputs: Vec<PortRecord>,
}

impl BlockRecord {
    pub fn new(id: &str, kind: BlockKindTag) -> Self {
        Self {
            id: BlockId::from(id),
            kind,
            x: 0.0,
            y: 0.0,
            code: None,
            var: None,
            layer_type: None,
            shape: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn code(id: &str, code: &str, inputs: &[&str], outputs: &[&str]) -> Self {
        Self {
            code: Some(code.to_string()),
            inputs: inputs.iter().map(|s| PortRecord::Name(s.to_string())).collect(),
            outputs: outputs.iter().map(|s| PortRecord::Name(s.to_string())).collect(),
            ..Self::new(id, BlockKindTag::Code)
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LinkRecord {
    pub id: String,
    #[serde(rename = "fromId")]
    pub from_id: BlockId,
    #[serde(rename = "fromPort")]
    pub from_port: PortId,
    #[serde(rename = "toId")]
    pub to_id: BlockId,
    #[serde(rename = "toPort")]
    pub to_port: PortId,
    #[serde(default)]
    pub implicit: bool,
}

impl LinkRecord {
    pub fn new(id: &str, from: (&str, &str), to: (&str, &str)) -> Self {
        Self {
            id: id.to_string(),
            from_id: BlockId::from(from.0),
            from_port: PortId::from(from.1),
            to_id: BlockId::from(to.0),
            to_port: PortId::from(to.1),
            implicit: false,
        }
    }

    pub fn implicit(mut self) -> Self {
        self.implicit = true;
        self
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VariableRecord {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Full graph state returned by the `data` request.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Snapshot {
    #[serde(default)]
    pub blocks: Vec<BlockRecord>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
    #[serde(default)]
    pub vars: Vec<VariableRecord>,
}

impl Snapshot {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
