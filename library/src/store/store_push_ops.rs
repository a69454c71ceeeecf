use log::debug;

use super::GraphStore;
use crate::authority::AuthorityClient;
use crate::error::GraphError;
use crate::model::{Block, BlockId, LinkId, Port, PortDirection, PortRef, Position};
use crate::protocol::{
    BlockMoved, BlockPatch, BlockRecord, LinkRecord, PortCreated, PortDeleted, PortRenamed,
};

/// Authority push events. Only the echo of a retracted link sends a request.
impl GraphStore {
    pub fn apply_block_create(&mut self, record: &BlockRecord) -> Result<(), GraphError> {
        let block = Block::from_record(record)?;
        if self.blocks.contains_key(&block.id) {
            debug!("Block {} recreated by the authority", block.id);
            self.apply_block_delete(&block.id);
        }
        self.insert_block(block);
        Ok(())
    }

    pub fn apply_block_change(&mut self, patch: &BlockPatch) -> Result<(), GraphError> {
        let block = self
            .blocks
            .get_mut(&patch.id)
            .ok_or_else(|| GraphError::UnknownBlock(patch.id.clone()))?;
        if let Some(code) = &patch.code {
            block.set_code(code)?;
        }
        if patch.x.is_some() || patch.y.is_some() {
            let current = block.position();
            block.set_position(Position::new(
                patch.x.unwrap_or(current.x),
                patch.y.unwrap_or(current.y),
            ));
        }
        Ok(())
    }

    /// Move echo: updates position and port anchors without scheduling a request.
    pub fn apply_block_move(&mut self, moved: &BlockMoved) -> Result<(), GraphError> {
        let block = self
            .blocks
            .get_mut(&moved.id)
            .ok_or_else(|| GraphError::UnknownBlock(moved.id.clone()))?;
        block.set_position(Position::new(moved.x, moved.y));
        Ok(())
    }

    /// Remove a block and every link touching it, implicit ones included.
    pub fn apply_block_delete(&mut self, id: &BlockId) -> bool {
        let Some(block) = self.blocks.get(id) else {
            debug!("Delete for unknown block {}", id);
            return false;
        };
        let attached: Vec<LinkId> = block
            .ports()
            .iter()
            .flat_map(|p| p.links().iter().cloned())
            .collect();
        for link in &attached {
            self.detach_link(link);
        }
        self.remove_block(id).is_some()
    }

    pub fn apply_port_create(&mut self, created: &PortCreated) -> Result<(), GraphError> {
        let block = self
            .blocks
            .get_mut(&created.id)
            .ok_or_else(|| GraphError::UnknownBlock(created.id.clone()))?;
        if block.port(&created.port).is_some() {
            // echo of a port we created ourselves
            return Ok(());
        }
        let name = created.name.as_deref().unwrap_or(created.port.as_str());
        block.insert_port(Port::new(
            created.port.clone(),
            name,
            PortDirection::from_input(created.input),
        ))
    }

    pub fn apply_port_rename(&mut self, renamed: &PortRenamed) -> Result<(), GraphError> {
        let block = self
            .blocks
            .get_mut(&renamed.id)
            .ok_or_else(|| GraphError::UnknownBlock(renamed.id.clone()))?;
        block.rename_port(&renamed.port, &renamed.new_name)?;
        Ok(())
    }

    pub fn apply_port_delete(&mut self, deleted: &PortDeleted) -> Result<(), GraphError> {
        let port_ref = PortRef::new(deleted.id.clone(), deleted.port.clone());
        let Some(port) = self.port(&port_ref) else {
            debug!("Port {} already gone", port_ref);
            return Ok(());
        };
        let attached = port.links().to_vec();
        for link in &attached {
            self.detach_link(link);
        }
        let block = self
            .blocks
            .get_mut(&deleted.id)
            .ok_or_else(|| GraphError::UnknownBlock(deleted.id.clone()))?;
        block.take_port(&deleted.port)?;
        Ok(())
    }

    /// Link echo. Confirms the matching provisional link if there is one,
    /// otherwise materialises a new link.
    ///
    /// The echo of a link the user already removed is answered with
    /// `link_delete` and nothing is inserted (`Ok(None)`).
    pub fn apply_link_create(
        &mut self,
        client: &mut dyn AuthorityClient,
        record: &LinkRecord,
    ) -> Result<Option<LinkId>, GraphError> {
        let confirmed = LinkId::confirmed(record.id.clone());
        if self.links.contains_key(&confirmed) {
            return Ok(Some(confirmed));
        }
        let from = PortRef::new(record.from_id.clone(), record.from_port.clone());
        let to = PortRef::new(record.to_id.clone(), record.to_port.clone());
        let pending = self
            .find_pending_link(&from, &to)
            .or_else(|| self.find_pending_link(&to, &from));
        if let Some(pending) = pending {
            if let Some(id) = self.rekey_link(&pending, &record.id) {
                debug!("Link {} confirmed as {}", pending, id);
                return Ok(Some(id));
            }
        }
        if self.take_retracted(&from, &to) {
            debug!("Link {} was removed before its echo, deleting", record.id);
            client.delete_link(&record.id);
            return Ok(None);
        }
        self.insert_confirmed_link(record).map(Some)
    }

    pub fn apply_link_delete(&mut self, id: &str) -> bool {
        self.detach_link(&LinkId::confirmed(id)).is_some()
    }
}
