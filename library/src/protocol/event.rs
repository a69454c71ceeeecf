use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::records::{BlockRecord, LinkRecord};
use crate::error::GraphError;
use crate::model::{BlockId, EvalOutput, EvalResult, PortId, RunId};
use crate::tensor::Tensor;

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct BlockRef {
    pub id: BlockId,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct BlockMoved {
    pub id: BlockId,
    pub x: f64,
    pub y: f64,
}

/// Partial block update; absent fields are left alone.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct BlockPatch {
    pub id: BlockId,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct LinkRef {
    pub id: String,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct PortCreated {
    /// Owning block.
    pub id: BlockId,
    pub port: PortId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub input: bool,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct PortRenamed {
    pub id: BlockId,
    pub port: PortId,
    #[serde(rename = "newName", alias = "name")]
    pub new_name: String,
    #[serde(rename = "oldName", default)]
    pub old_name: Option<String>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct PortDeleted {
    pub id: BlockId,
    pub port: PortId,
}

/// Per-block metadata announced with an eval-results push.
#[derive(Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ResultMeta {
    #[serde(default)]
    pub error: bool,
    /// Output port name to a short shape/type summary.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct EvalResults {
    pub id: RunId,
    /// `None` is the authority's "no update for this block" marker (`false` or `null`).
    #[serde(deserialize_with = "deserialize_updates")]
    pub blocks: BTreeMap<BlockId, Option<ResultMeta>>,
}

fn deserialize_updates<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<BlockId, Option<ResultMeta>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Update {
        Flag(bool),
        Meta(ResultMeta),
        Nothing(()),
    }

    let raw = BTreeMap::<BlockId, Update>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(id, update)| {
            let meta = match update {
                Update::Meta(meta) => Some(meta),
                Update::Flag(true) => Some(ResultMeta::default()),
                Update::Flag(false) | Update::Nothing(()) => None,
            };
            (id, meta)
        })
        .collect())
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct EpochBegin {
    pub epoch: u64,
    #[serde(default)]
    pub epochs: Option<u64>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct BatchBegin {
    pub batch: u64,
    #[serde(default)]
    pub batches: Option<u64>,
}

/// Events pushed by the authority.
#[derive(Clone, Debug, PartialEq)]
pub enum PushEvent {
    BlockCreate(BlockRecord),
    BlockChange(BlockPatch),
    BlockMove(BlockMoved),
    BlockDelete(BlockRef),
    PortCreate(PortCreated),
    PortRename(PortRenamed),
    PortDelete(PortDeleted),
    LinkCreate(LinkRecord),
    LinkDelete(LinkRef),
    EvalResults(EvalResults),
    SetParams(Value),
    TrainBegin,
    TrainEnd,
    EpochBegin(EpochBegin),
    BatchBegin(BatchBegin),
}

impl PushEvent {
    pub fn from_wire(name: &str, payload: Value) -> Result<Self, GraphError> {
        let event = match name {
            "block_create" => PushEvent::BlockCreate(serde_json::from_value(payload)?),
            "block_change" => PushEvent::BlockChange(serde_json::from_value(payload)?),
            "block_move" => PushEvent::BlockMove(serde_json::from_value(payload)?),
            "block_delete" => PushEvent::BlockDelete(serde_json::from_value(payload)?),
            "port_create" => PushEvent::PortCreate(serde_json::from_value(payload)?),
            "port_rename" => PushEvent::PortRename(serde_json::from_value(payload)?),
            "port_delete" => PushEvent::PortDelete(serde_json::from_value(payload)?),
            "link_create" => PushEvent::LinkCreate(serde_json::from_value(payload)?),
            "link_delete" => PushEvent::LinkDelete(serde_json::from_value(payload)?),
            "eval_results" => PushEvent::EvalResults(serde_json::from_value(payload)?),
            "set_params" => PushEvent::SetParams(payload),
            "train_begin" => PushEvent::TrainBegin,
            "train_end" => PushEvent::TrainEnd,
            "epoch_begin" => PushEvent::EpochBegin(match payload {
                // older servers send the bare epoch number
                Value::Number(n) => EpochBegin {
                    epoch: n.as_u64().unwrap_or_default(),
                    epochs: None,
                },
                other => serde_json::from_value(other)?,
            }),
            "batch_begin" => PushEvent::BatchBegin(match payload {
                Value::Number(n) => BatchBegin {
                    batch: n.as_u64().unwrap_or_default(),
                    batches: None,
                },
                other => serde_json::from_value(other)?,
            }),
            other => return Err(GraphError::UnknownEvent(other.to_string())),
        };
        Ok(event)
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            PushEvent::BlockCreate(_) => "block_create",
            PushEvent::BlockChange(_) => "block_change",
            PushEvent::BlockMove(_) => "block_move",
            PushEvent::BlockDelete(_) => "block_delete",
            PushEvent::PortCreate(_) => "port_create",
            PushEvent::PortRename(_) => "port_rename",
            PushEvent::PortDelete(_) => "port_delete",
            PushEvent::LinkCreate(_) => "link_create",
            PushEvent::LinkDelete(_) => "link_delete",
            PushEvent::EvalResults(_) => "eval_results",
            PushEvent::SetParams(_) => "set_params",
            PushEvent::TrainBegin => "train_begin",
            PushEvent::TrainEnd => "train_end",
            PushEvent::EpochBegin(_) => "epoch_begin",
            PushEvent::BatchBegin(_) => "batch_begin",
        }
    }
}

/// A push event with the authority's optional delivery sequence number.
#[derive(Clone, Debug, PartialEq)]
pub struct Sequenced {
    pub seq: Option<u64>,
    pub event: PushEvent,
}

impl Sequenced {
    pub fn unsequenced(event: PushEvent) -> Self {
        Self { seq: None, event }
    }

    /// Reads `seq` from the payload object, if the authority stamps one.
    pub fn from_wire(name: &str, payload: Value) -> Result<Self, GraphError> {
        let seq = payload.get("seq").and_then(Value::as_u64);
        Ok(Self {
            seq,
            event: PushEvent::from_wire(name, payload)?,
        })
    }
}

/// Output half of an `eval_get` response before decoding.
#[derive(Clone, Debug, PartialEq)]
pub enum RawOutput {
    None,
    Bytes(Vec<u8>),
    Json(Value),
}

/// `eval_get` response: `[errorOrNull, outputOrBuffer]`.
#[derive(Clone, Debug, PartialEq)]
pub struct RawResult {
    pub error: Option<String>,
    pub output: RawOutput,
}

impl RawResult {
    pub fn binary(bytes: Vec<u8>) -> Self {
        Self {
            error: None,
            output: RawOutput::Bytes(bytes),
        }
    }

    pub fn json(value: Value) -> Self {
        Self {
            error: None,
            output: RawOutput::Json(value),
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            output: RawOutput::None,
        }
    }

    /// Parse a JSON-only response array.
    pub fn from_json(value: Value) -> Result<Self, GraphError> {
        let Value::Array(mut items) = value else {
            return Err(GraphError::InvalidArgument(
                "eval_get response is not an array".to_string(),
            ));
        };
        let output = if items.len() > 1 {
            match items.remove(1) {
                Value::Null => RawOutput::None,
                v => RawOutput::Json(v),
            }
        } else {
            RawOutput::None
        };
        let error = match items.first() {
            None | Some(Value::Null) | Some(Value::Bool(false)) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };
        Ok(Self { error, output })
    }

    /// Decode into a block result. An undecodable buffer becomes the block's error.
    pub fn decode(self) -> EvalResult {
        if let Some(error) = self.error {
            return EvalResult::failed(error);
        }
        match self.output {
            RawOutput::None => EvalResult::default(),
            RawOutput::Json(v) => EvalResult::ok(EvalOutput::Value(v)),
            RawOutput::Bytes(bytes) => match Tensor::decode(&bytes) {
                Ok(t) => EvalResult::ok(EvalOutput::Tensor(t)),
                Err(e) => EvalResult::failed(e.to_string()),
            },
        }
    }
}
