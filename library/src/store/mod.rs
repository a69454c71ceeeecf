//! In-memory mirror of the authority's graph.
//!
//! The store keeps blocks and links structurally consistent and turns local
//! edits into authority requests. It never evaluates anything itself.

pub mod debounce;
mod metadata;
mod store_link_ops;
mod store_port_ops;
mod store_push_ops;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::authority::AuthorityClient;
use crate::error::GraphError;
use crate::model::{Block, BlockId, Link, LinkId, Notify, Port, PortDirection, PortRef, Position};
use crate::protocol::{BlockCreate, LinkRecord, Snapshot};
use crate::util::timing::ScopedTimer;
use debounce::MoveDebouncer;

pub const DEFAULT_MOVE_DEBOUNCE: Duration = Duration::from_millis(100);

/// Asks the user before a destructive action.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// What a snapshot load materialised and what it had to drop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub blocks: usize,
    pub links: usize,
    pub skipped_blocks: usize,
    pub skipped_links: usize,
}

pub struct GraphStore {
    blocks: HashMap<BlockId, Block>,
    /// Block ids in load/creation order.
    order: Vec<BlockId>,
    links: HashMap<LinkId, Link>,
    /// Announced links removed before their echo arrived, as `(out, in)` ends.
    retracted: Vec<(PortRef, PortRef)>,
    moves: MoveDebouncer,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new(DEFAULT_MOVE_DEBOUNCE)
    }
}

impl GraphStore {
    pub fn new(move_debounce: Duration) -> Self {
        Self {
            blocks: HashMap::new(),
            order: Vec::new(),
            links: HashMap::new(),
            retracted: Vec::new(),
            moves: MoveDebouncer::new(move_debounce),
        }
    }

    // --- queries ---

    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub(crate) fn block_mut(&mut self, id: &BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(id)
    }

    /// Blocks in load/creation order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.order.iter().filter_map(|id| self.blocks.get(id))
    }

    pub fn block_ids(&self) -> &[BlockId] {
        &self.order
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn link(&self, id: &LinkId) -> Option<&Link> {
        self.links.get(id)
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn port(&self, port: &PortRef) -> Option<&Port> {
        self.blocks.get(&port.block)?.port(&port.port)
    }

    pub(crate) fn port_mut(&mut self, port: &PortRef) -> Option<&mut Port> {
        self.blocks.get_mut(&port.block)?.port_mut(&port.port)
    }

    /// Links attached to a port.
    pub fn links_at(&self, port: &PortRef) -> Vec<&Link> {
        self.port(port)
            .map(|p| p.links().iter().filter_map(|l| self.links.get(l)).collect())
            .unwrap_or_default()
    }

    fn require_port(&self, port: &PortRef) -> Result<&Port, GraphError> {
        let block = self
            .blocks
            .get(&port.block)
            .ok_or_else(|| GraphError::UnknownBlock(port.block.clone()))?;
        block.port(&port.port).ok_or_else(|| GraphError::UnknownPort {
            block: port.block.clone(),
            port: port.port.clone(),
        })
    }

    /// `(out side, in side)` of a fully attached link.
    pub fn oriented_ends(&self, link: &Link) -> Option<(PortRef, PortRef)> {
        let (source, target) = (link.source()?, link.target()?);
        let source_dir = self.port(source)?.direction;
        let target_dir = self.port(target)?.direction;
        match (source_dir, target_dir) {
            (PortDirection::Out, PortDirection::In) => Some((source.clone(), target.clone())),
            (PortDirection::In, PortDirection::Out) => Some((target.clone(), source.clone())),
            _ => None,
        }
    }

    // --- snapshot ---

    /// Replace everything with the authority's snapshot.
    ///
    /// Links whose endpoints cannot be resolved are logged and skipped.
    pub fn load_snapshot(&mut self, snapshot: &Snapshot) -> LoadReport {
        let _timer = ScopedTimer::debug("load snapshot");
        self.clear();

        let mut report = LoadReport::default();
        for record in &snapshot.blocks {
            match Block::from_record(record) {
                Ok(block) => {
                    self.insert_block(block);
                    report.blocks += 1;
                }
                Err(e) => {
                    warn!("Skipping block {}: {}", record.id, e);
                    report.skipped_blocks += 1;
                }
            }
        }

        for record in &snapshot.links {
            match self.insert_confirmed_link(record) {
                Ok(_) => report.links += 1,
                Err(e) => {
                    warn!(
                        "Skipping link {} ({}.{} -> {}.{}): {}",
                        record.id, record.from_id, record.from_port, record.to_id, record.to_port, e
                    );
                    report.skipped_links += 1;
                }
            }
        }

        debug!(
            "Loaded {} blocks and {} links ({} links skipped)",
            report.blocks, report.links, report.skipped_links
        );
        report
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.order.clear();
        self.links.clear();
        self.retracted.clear();
        self.moves.clear();
    }

    fn insert_block(&mut self, block: Block) {
        let id = block.id.clone();
        if self.blocks.insert(id.clone(), block).is_some() {
            warn!("Block {} appeared twice; keeping the later one", id);
        } else {
            self.order.push(id);
        }
    }

    fn remove_block(&mut self, id: &BlockId) -> Option<Block> {
        let block = self.blocks.remove(id)?;
        self.order.retain(|b| b != id);
        self.moves.cancel(id);
        Some(block)
    }

    /// Materialise a link the authority already knows about.
    ///
    /// The authority's view wins: an `in` port that is already occupied loses its
    /// current link locally, without any request being sent.
    fn insert_confirmed_link(&mut self, record: &LinkRecord) -> Result<LinkId, GraphError> {
        let from = PortRef::new(record.from_id.clone(), record.from_port.clone());
        let to = PortRef::new(record.to_id.clone(), record.to_port.clone());
        let from_dir = self.require_port(&from)?.direction;
        let to_dir = self.require_port(&to)?.direction;

        let (source, target) = match (from_dir, to_dir) {
            (PortDirection::Out, PortDirection::In) => (from, to),
            (PortDirection::In, PortDirection::Out) => (to, from),
            (dir, _) => return Err(GraphError::SameDirection(dir)),
        };

        let link = Link::confirmed(&record.id, source.clone(), target.clone(), record.implicit);
        let id = link.id.clone();
        if self.links.contains_key(&id) {
            self.detach_link(&id);
        }

        let occupants = self
            .port(&target)
            .map(|p| p.other_links(&id))
            .unwrap_or_default();
        for occupant in occupants {
            debug!("Link {} replaces {} on {}", id, occupant, target);
            self.detach_link(&occupant);
        }

        if let Some(p) = self.port_mut(&source) {
            p.add_link(id.clone());
        }
        if let Some(p) = self.port_mut(&target) {
            p.add_link(id.clone());
        }
        self.links.insert(id.clone(), link);
        Ok(id)
    }

    // --- local block actions ---

    /// Ask the authority for a new block. Nothing is materialised until it echoes `block_create`.
    pub fn request_create_block(&self, client: &mut dyn AuthorityClient, create: BlockCreate) {
        client.create_block(create);
    }

    pub fn change_code(
        &mut self,
        client: &mut dyn AuthorityClient,
        id: &BlockId,
        code: &str,
    ) -> Result<(), GraphError> {
        let block = self
            .blocks
            .get_mut(id)
            .ok_or_else(|| GraphError::UnknownBlock(id.clone()))?;
        block.set_code(code)?;
        client.change_block(id, code);
        Ok(())
    }

    /// Move a block. With [`Notify::Authority`] the move is debounced and sent by
    /// [`flush_moves`](Self::flush_moves) once the block has been idle long enough.
    pub fn set_position(
        &mut self,
        id: &BlockId,
        position: Position,
        notify: Notify,
        now: Instant,
    ) -> Result<bool, GraphError> {
        let block = self
            .blocks
            .get_mut(id)
            .ok_or_else(|| GraphError::UnknownBlock(id.clone()))?;
        let moved = block.set_position(position);
        if moved && notify.is_authority() {
            self.moves.schedule(id, position, now);
        }
        Ok(moved)
    }

    /// Send every move whose debounce period has elapsed. Returns how many were sent.
    pub fn flush_moves(&mut self, client: &mut dyn AuthorityClient, now: Instant) -> usize {
        let mut sent = 0;
        for (id, position) in self.moves.take_due(now) {
            if self.blocks.contains_key(&id) {
                client.move_block(&id, position.x, position.y);
                sent += 1;
            }
        }
        sent
    }

    pub fn next_move_deadline(&self) -> Option<Instant> {
        self.moves.next_deadline()
    }

    /// Ask the authority to delete a block after the user confirms.
    ///
    /// The block stays in the store until the authority's `block_delete` arrives.
    /// Returns `Ok(false)` when the user declines.
    pub fn request_delete_block(
        &mut self,
        client: &mut dyn AuthorityClient,
        id: &BlockId,
        confirm: &mut impl Confirm,
    ) -> Result<bool, GraphError> {
        let block = self
            .blocks
            .get_mut(id)
            .ok_or_else(|| GraphError::UnknownBlock(id.clone()))?;
        if !confirm.confirm(&format!("Are you sure you want to delete block {}?", id)) {
            return Ok(false);
        }
        block.mark_delete_requested();
        self.moves.cancel(id);
        client.delete_block(id);
        Ok(true)
    }
}
