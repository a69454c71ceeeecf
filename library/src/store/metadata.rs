use std::collections::BTreeMap;

use super::GraphStore;
use crate::error::GraphError;
use crate::model::{BlockId, LinkId, PortDirection, PortRef};

impl GraphStore {
    /// Store a block's per-output metadata and project it onto link labels.
    ///
    /// Every link leaving an output named in `meta` ends up with exactly one
    /// label equal to that output's value. Outputs not named are left alone.
    pub fn set_output_meta(
        &mut self,
        id: &BlockId,
        meta: BTreeMap<String, String>,
    ) -> Result<(), GraphError> {
        let block = self
            .blocks
            .get_mut(id)
            .ok_or_else(|| GraphError::UnknownBlock(id.clone()))?;

        let mut labels: Vec<(LinkId, String)> = Vec::new();
        for (output, value) in &meta {
            if let Some(port) = block.out_port_by_name(output) {
                labels.extend(port.links().iter().map(|l| (l.clone(), value.clone())));
            }
        }
        block.replace_output_meta(meta);

        for (link, value) in labels {
            if let Some(link) = self.links.get_mut(&link) {
                link.set_label(&value);
            }
        }
        Ok(())
    }

    /// Metadata describing what flows through a port.
    ///
    /// An `in` port reports the metadata of the `out` port feeding it, or `None`
    /// when nothing is connected.
    pub fn port_meta(&self, port: &PortRef) -> Option<&str> {
        let found = self.port(port)?;
        let source = match found.direction {
            PortDirection::Out => port.clone(),
            PortDirection::In => {
                let link = found.links().first().and_then(|l| self.links.get(l))?;
                self.oriented_ends(link)?.0
            }
        };
        let block = self.block(&source.block)?;
        let name = block.port(&source.port)?.name();
        block.output_meta().get(name).map(String::as_str)
    }
}
