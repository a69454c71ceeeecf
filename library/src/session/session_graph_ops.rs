use std::time::Instant;

use super::Session;
use crate::authority::AuthorityClient;
use crate::error::GraphError;
use crate::model::{BlockId, LinkEnd, LinkId, Notify, Port, PortId, PortRef, Position};
use crate::protocol::BlockCreate;
use crate::store::Confirm;

/// User edits routed through the store with this session's client.
impl<C: AuthorityClient> Session<C> {
    pub fn add_code_block(&mut self, code: &str) {
        self.store
            .request_create_block(&mut self.client, BlockCreate::code(code));
    }

    pub fn add_visual_block(&mut self) {
        self.store
            .request_create_block(&mut self.client, BlockCreate::visual());
    }

    /// Create a block bound to one of the snapshot's variables.
    pub fn add_variable_block(&mut self, var: &str) -> Result<(), GraphError> {
        if !self.variables.iter().any(|v| v.name == var) {
            return Err(GraphError::InvalidArgument(format!("unknown variable {}", var)));
        }
        self.store
            .request_create_block(&mut self.client, BlockCreate::variable(var));
        Ok(())
    }

    pub fn change_code(&mut self, id: &BlockId, code: &str) -> Result<(), GraphError> {
        self.store.change_code(&mut self.client, id, code)
    }

    /// A drag step. The authority hears about the final position after the debounce.
    pub fn move_block(
        &mut self,
        id: &BlockId,
        position: Position,
        now: Instant,
    ) -> Result<bool, GraphError> {
        self.store.set_position(id, position, Notify::Authority, now)
    }

    /// Send debounced moves that are due.
    pub fn tick(&mut self, now: Instant) -> usize {
        self.store.flush_moves(&mut self.client, now)
    }

    pub fn delete_block(
        &mut self,
        id: &BlockId,
        confirm: &mut impl Confirm,
    ) -> Result<bool, GraphError> {
        self.store.request_delete_block(&mut self.client, id, confirm)
    }

    pub fn add_port(&mut self, block: &BlockId, port: Port) -> Result<(), GraphError> {
        self.store
            .add_port(&mut self.client, block, port, Notify::Authority)
    }

    pub fn rename_port(
        &mut self,
        block: &BlockId,
        port: &PortId,
        name: &str,
    ) -> Result<String, GraphError> {
        self.store
            .rename_port(&mut self.client, block, port, name, Notify::Authority)
    }

    pub fn remove_port(&mut self, block: &BlockId, port: &PortId) -> Result<Port, GraphError> {
        self.store
            .remove_port(&mut self.client, block, port, Notify::Authority)
    }

    pub fn new_link(&mut self) -> LinkId {
        self.store.new_link()
    }

    pub fn set_link_end(
        &mut self,
        link: &LinkId,
        end: LinkEnd,
        port: PortRef,
    ) -> Result<(), GraphError> {
        self.store.set_link_end(&mut self.client, link, end, port)
    }

    pub fn connect(&mut self, from: PortRef, to: PortRef) -> Result<LinkId, GraphError> {
        self.store.connect(&mut self.client, from, to)
    }

    pub fn remove_link(&mut self, link: &LinkId) -> Result<bool, GraphError> {
        self.store.remove_link(&mut self.client, link)
    }
}
