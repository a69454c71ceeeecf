use super::GraphStore;
use crate::authority::AuthorityClient;
use crate::error::GraphError;
use crate::model::{BlockId, Notify, Port, PortId, PortRef};

/// Port operations.
impl GraphStore {
    pub fn add_port(
        &mut self,
        client: &mut dyn AuthorityClient,
        block: &BlockId,
        port: Port,
        notify: Notify,
    ) -> Result<(), GraphError> {
        let owner = self
            .block_mut(block)
            .ok_or_else(|| GraphError::UnknownBlock(block.clone()))?;
        let announced = port.clone();
        owner.insert_port(port)?;
        if notify.is_authority() {
            client.create_port(block, &announced);
        }
        Ok(())
    }

    /// Rename a port, returning the name it had before.
    pub fn rename_port(
        &mut self,
        client: &mut dyn AuthorityClient,
        block: &BlockId,
        port: &PortId,
        name: &str,
        notify: Notify,
    ) -> Result<String, GraphError> {
        let owner = self
            .block_mut(block)
            .ok_or_else(|| GraphError::UnknownBlock(block.clone()))?;
        let old = owner.rename_port(port, name)?;
        if notify.is_authority() {
            if let Some(renamed) = owner.port(port) {
                client.rename_port(block, renamed, &old);
            }
        }
        Ok(old)
    }

    /// Remove a port along with every link attached to it.
    ///
    /// Attached links go with the port locally; the authority drops them as
    /// part of the port deletion.
    pub fn remove_port(
        &mut self,
        client: &mut dyn AuthorityClient,
        block: &BlockId,
        port: &PortId,
        notify: Notify,
    ) -> Result<Port, GraphError> {
        let port_ref = PortRef::new(block.clone(), port.clone());
        let existing = self.require_port(&port_ref)?;
        if notify.is_authority() {
            client.delete_port(block, existing);
        }
        let attached = existing.links().to_vec();
        for link in &attached {
            self.detach_link(link);
        }
        let owner = self
            .block_mut(block)
            .ok_or_else(|| GraphError::UnknownBlock(block.clone()))?;
        owner.take_port(port)
    }
}
