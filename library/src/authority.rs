//! The seam between the graph and whatever transport talks to the authority.

use crate::model::{BlockId, Port, PortRef, RunId};
use crate::protocol::{BlockCreate, Request};

/// Outgoing side of the authority channel.
///
/// Implementors only provide [`emit`](AuthorityClient::emit); the named helpers
/// build the matching [`Request`]. Responses (snapshot, `eval_get`) come back
/// asynchronously through the [`Session`](crate::session::Session).
pub trait AuthorityClient {
    fn emit(&mut self, request: Request);

    fn get_snapshot(&mut self) {
        self.emit(Request::Data);
    }

    fn create_block(&mut self, create: BlockCreate) {
        self.emit(Request::BlockCreate(create));
    }

    fn change_block(&mut self, id: &BlockId, code: &str) {
        self.emit(Request::BlockChange {
            id: id.clone(),
            code: code.to_string(),
        });
    }

    fn move_block(&mut self, id: &BlockId, x: f64, y: f64) {
        self.emit(Request::BlockMove { id: id.clone(), x, y });
    }

    fn delete_block(&mut self, id: &BlockId) {
        self.emit(Request::BlockDelete { id: id.clone() });
    }

    fn eval_block(&mut self, id: &BlockId) {
        self.emit(Request::BlockEval { id: id.clone() });
    }

    fn eval_all_blocks(&mut self) {
        self.emit(Request::BlockEvalAll);
    }

    fn get_result(&mut self, run: &RunId, block: &BlockId) {
        self.emit(Request::EvalGet {
            run: run.clone(),
            block: block.clone(),
        });
    }

    fn create_port(&mut self, block: &BlockId, port: &Port) {
        self.emit(Request::PortCreate {
            block: block.clone(),
            port: port.id.clone(),
            input: port.is_input(),
            name: port.name().to_string(),
        });
    }

    fn rename_port(&mut self, block: &BlockId, port: &Port, old_name: &str) {
        self.emit(Request::PortRename {
            block: block.clone(),
            port: port.id.clone(),
            input: port.is_input(),
            old_name: old_name.to_string(),
            new_name: port.name().to_string(),
        });
    }

    fn delete_port(&mut self, block: &BlockId, port: &Port) {
        self.emit(Request::PortDelete {
            block: block.clone(),
            port: port.id.clone(),
            input: port.is_input(),
            name: port.name().to_string(),
        });
    }

    /// `from` must be the `out` side.
    fn create_link(&mut self, from: &PortRef, to: &PortRef) {
        self.emit(Request::LinkCreate {
            from: from.clone(),
            to: to.clone(),
        });
    }

    fn delete_link(&mut self, id: &str) {
        self.emit(Request::LinkDelete { id: id.to_string() });
    }

    fn start_training(&mut self) {
        self.emit(Request::TrainStart);
    }
}

/// Client that records every request instead of sending it.
///
/// Used by tests to count round trips and by the CLI for offline inspection.
#[derive(Default, Debug)]
pub struct RecordingAuthority {
    requests: Vec<Request>,
}

impl RecordingAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// Number of recorded requests with the given wire event name.
    pub fn count(&self, event: &str) -> usize {
        self.requests
            .iter()
            .filter(|r| r.event_name() == event)
            .count()
    }

    pub fn last(&self) -> Option<&Request> {
        self.requests.last()
    }

    pub fn take(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.requests)
    }

    pub fn clear(&mut self) {
        self.requests.clear();
    }
}

impl AuthorityClient for RecordingAuthority {
    fn emit(&mut self, request: Request) {
        log::debug!("-> {} {}", request.event_name(), request.payload());
        self.requests.push(request);
    }
}
