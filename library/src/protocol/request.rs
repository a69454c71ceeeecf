use serde::Serialize;
use serde_json::{Value, json};

use crate::model::{BlockId, PortId, PortRef, RunId};

/// What kind of block a `block_create` request asks for.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CreateKind {
    Code,
    Var,
    Visual,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct BlockCreate {
    #[serde(rename = "type")]
    pub kind: CreateKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub var: Option<String>,
}

impl BlockCreate {
    pub fn code(code: &str) -> Self {
        Self {
            kind: CreateKind::Code,
            code: Some(code.to_string()),
            var: None,
        }
    }

    pub fn visual() -> Self {
        Self {
            kind: CreateKind::Visual,
            code: None,
            var: None,
        }
    }

    pub fn variable(name: &str) -> Self {
        Self {
            kind: CreateKind::Var,
            code: None,
            var: Some(name.to_string()),
        }
    }
}

/// Everything the client can ask of the authority.
#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    /// Full snapshot fetch.
    Data,
    BlockCreate(BlockCreate),
    BlockChange {
        id: BlockId,
        code: String,
    },
    BlockMove {
        id: BlockId,
        x: f64,
        y: f64,
    },
    BlockDelete {
        id: BlockId,
    },
    BlockEval {
        id: BlockId,
    },
    BlockEvalAll,
    EvalGet {
        run: RunId,
        block: BlockId,
    },
    PortCreate {
        block: BlockId,
        port: PortId,
        input: bool,
        name: String,
    },
    PortRename {
        block: BlockId,
        port: PortId,
        input: bool,
        old_name: String,
        new_name: String,
    },
    PortDelete {
        block: BlockId,
        port: PortId,
        input: bool,
        name: String,
    },
    /// `from` is always the `out` side.
    LinkCreate {
        from: PortRef,
        to: PortRef,
    },
    LinkDelete {
        id: String,
    },
    TrainStart,
}

impl Request {
    pub fn event_name(&self) -> &'static str {
        match self {
            Request::Data => "data",
            Request::BlockCreate(_) => "block_create",
            Request::BlockChange { .. } => "block_change",
            Request::BlockMove { .. } => "block_move",
            Request::BlockDelete { .. } => "block_delete",
            Request::BlockEval { .. } => "block_eval",
            Request::BlockEvalAll => "block_eval_all",
            Request::EvalGet { .. } => "eval_get",
            Request::PortCreate { .. } => "port_create",
            Request::PortRename { .. } => "port_rename",
            Request::PortDelete { .. } => "port_delete",
            Request::LinkCreate { .. } => "link_create",
            Request::LinkDelete { .. } => "link_delete",
            Request::TrainStart => "train_start",
        }
    }

    /// JSON payload for the transport. Requests without a payload yield `Value::Null`.
    pub fn payload(&self) -> Value {
        match self {
            Request::Data | Request::BlockEvalAll | Request::TrainStart => Value::Null,
            Request::BlockCreate(create) => serde_json::to_value(create).unwrap_or(Value::Null),
            Request::BlockChange { id, code } => json!({ "id": id, "code": code }),
            Request::BlockMove { id, x, y } => json!({ "id": id, "x": x, "y": y }),
            Request::BlockDelete { id } | Request::BlockEval { id } => json!({ "id": id }),
            Request::EvalGet { run, block } => json!({ "id": run, "blockId": block }),
            Request::PortCreate {
                block,
                port,
                input,
                name,
            } => json!({ "id": block, "port": port, "input": input, "name": name }),
            Request::PortRename {
                block,
                port,
                input,
                old_name,
                new_name,
            } => json!({
                "id": block,
                "port": port,
                "input": input,
                "oldName": old_name,
                "newName": new_name,
            }),
            Request::PortDelete {
                block,
                port,
                input,
                name,
            } => json!({ "id": block, "port": port, "input": input, "name": name }),
            Request::LinkCreate { from, to } => json!({
                "fromId": from.block,
                "fromPort": from.port,
                "toId": to.block,
                "toPort": to.port,
            }),
            Request::LinkDelete { id } => json!({ "id": id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_create_payload_uses_wire_names() {
        let req = Request::LinkCreate {
            from: PortRef::new("a", "y"),
            to: PortRef::new("b", "x"),
        };
        assert_eq!(req.event_name(), "link_create");
        assert_eq!(
            req.payload(),
            json!({"fromId": "a", "fromPort": "y", "toId": "b", "toPort": "x"})
        );
    }

    #[test]
    fn test_block_create_omits_missing_fields() {
        let req = Request::BlockCreate(BlockCreate::variable("x_train"));
        assert_eq!(req.payload(), json!({"type": "var", "var": "x_train"}));
        assert_eq!(Request::BlockEvalAll.payload(), Value::Null);
    }
}
