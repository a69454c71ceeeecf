//! One connection's worth of state: the store, the result cache, and the
//! bookkeeping that keeps them in step with the authority.

mod session_eval_ops;
mod session_graph_ops;
mod training;

use log::{debug, info, warn};

use crate::authority::AuthorityClient;
use crate::cache::ResultCache;
use crate::config::SessionConfig;
use crate::error::GraphError;
use crate::protocol::{PushEvent, Sequenced, Snapshot, VariableRecord};
use crate::store::{GraphStore, LoadReport};

pub use session_eval_ops::FetchStatus;
pub use training::TrainingProgress;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Never connected yet.
    Connecting,
    Connected,
    /// Lost the transport; results are hidden until the next snapshot.
    Reconnecting,
}

pub struct Session<C: AuthorityClient> {
    client: C,
    store: GraphStore,
    cache: ResultCache,
    config: SessionConfig,
    status: ConnectionStatus,
    training: TrainingProgress,
    variables: Vec<VariableRecord>,
    last_seq: Option<u64>,
    playing: bool,
}

impl<C: AuthorityClient> Session<C> {
    pub fn new(client: C, config: SessionConfig) -> Self {
        Self {
            client,
            store: GraphStore::new(config.move_debounce()),
            cache: ResultCache::new(config.result_cache_capacity),
            playing: config.play_mode,
            config,
            status: ConnectionStatus::Connecting,
            training: TrainingProgress::default(),
            variables: Vec::new(),
            last_seq: None,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn variables(&self) -> &[VariableRecord] {
        &self.variables
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Toggle live mode.
    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    // --- transport ---

    /// The transport is up; ask for the full graph.
    pub fn on_connect(&mut self) {
        info!("Connected to authority, requesting snapshot");
        self.status = ConnectionStatus::Connected;
        self.client.get_snapshot();
    }

    pub fn on_disconnect(&mut self) {
        warn!("Lost connection to authority");
        self.status = ConnectionStatus::Reconnecting;
    }

    /// Rebuild everything from the authority's snapshot. Cached results are discarded.
    pub fn on_snapshot(&mut self, snapshot: &Snapshot) -> LoadReport {
        let report = self.store.load_snapshot(snapshot);
        self.cache.clear();
        self.variables = snapshot.vars.clone();
        self.last_seq = None;
        self.status = ConnectionStatus::Connected;
        if report.skipped_links > 0 {
            warn!("Snapshot had {} unresolved links", report.skipped_links);
        }
        report
    }

    /// Parse and apply a raw push from the transport.
    pub fn handle_wire(
        &mut self,
        name: &str,
        payload: serde_json::Value,
    ) -> Result<(), GraphError> {
        let event = Sequenced::from_wire(name, payload)?;
        self.handle_event(event)
    }

    /// Apply one push event in delivery order.
    pub fn handle_event(&mut self, event: Sequenced) -> Result<(), GraphError> {
        if !self.accept_sequence(event.seq) {
            return Ok(());
        }
        debug!("<- {}", event.event.event_name());
        self.apply_push(event.event)
    }

    /// Returns false for events that must not be applied.
    fn accept_sequence(&mut self, seq: Option<u64>) -> bool {
        let Some(seq) = seq else {
            return true;
        };
        let Some(last) = self.last_seq else {
            self.last_seq = Some(seq);
            return true;
        };
        if seq <= last {
            debug!("Dropping duplicate push {} (last {})", seq, last);
            return false;
        }
        self.last_seq = Some(seq);
        if seq == last + 1 {
            return true;
        }
        if self.config.strict_sequencing {
            warn!("Push sequence jumped from {} to {}, resyncing", last, seq);
            self.client.get_snapshot();
            false
        } else {
            warn!("Push sequence jumped from {} to {}", last, seq);
            true
        }
    }

    fn apply_push(&mut self, event: PushEvent) -> Result<(), GraphError> {
        match event {
            PushEvent::BlockCreate(record) => self.store.apply_block_create(&record),
            PushEvent::BlockChange(patch) => self.store.apply_block_change(&patch),
            PushEvent::BlockMove(moved) => self.store.apply_block_move(&moved),
            PushEvent::BlockDelete(block) => {
                self.store.apply_block_delete(&block.id);
                Ok(())
            }
            PushEvent::PortCreate(created) => self.store.apply_port_create(&created),
            PushEvent::PortRename(renamed) => self.store.apply_port_rename(&renamed),
            PushEvent::PortDelete(deleted) => self.store.apply_port_delete(&deleted),
            PushEvent::LinkCreate(record) => self
                .store
                .apply_link_create(&mut self.client, &record)
                .map(|_| ()),
            PushEvent::LinkDelete(link) => {
                if !self.store.apply_link_delete(&link.id) {
                    debug!("Delete for unknown link {}", link.id);
                }
                Ok(())
            }
            PushEvent::EvalResults(results) => {
                self.handle_eval_results(&results);
                Ok(())
            }
            PushEvent::SetParams(params) => {
                self.training.set_params(params);
                Ok(())
            }
            PushEvent::TrainBegin => {
                self.training.begin();
                Ok(())
            }
            PushEvent::TrainEnd => {
                self.training.end();
                Ok(())
            }
            PushEvent::EpochBegin(epoch) => {
                self.training.epoch_begin(&epoch);
                Ok(())
            }
            PushEvent::BatchBegin(batch) => {
                self.training.batch_begin(&batch);
                Ok(())
            }
        }
    }
}
