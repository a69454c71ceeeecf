use log::{debug, warn};

use super::{ConnectionStatus, Session};
use crate::authority::AuthorityClient;
use crate::cache::Lookup;
use crate::error::GraphError;
use crate::model::{BlockId, EvalResult, RunId};
use crate::protocol::{EvalResults, RawResult};

/// What [`Session::fetch_result`] did.
#[derive(Clone, Debug, PartialEq)]
pub enum FetchStatus {
    /// Served from the cache without a round trip.
    Cached(EvalResult),
    /// An `eval_get` request was sent.
    Requested,
    /// An identical request is already outstanding.
    Pending,
}

/// Evaluation operations.
impl<C: AuthorityClient> Session<C> {
    /// Run a single block.
    pub fn evaluate(&mut self, id: &BlockId) -> Result<(), GraphError> {
        let block = self
            .store
            .block_mut(id)
            .ok_or_else(|| GraphError::UnknownBlock(id.clone()))?;
        block.eval.begin();
        self.client.eval_block(id);
        Ok(())
    }

    /// Run every executable block.
    pub fn evaluate_all(&mut self) {
        let ids: Vec<BlockId> = self
            .store
            .blocks()
            .filter(|b| b.kind.is_executable())
            .map(|b| b.id.clone())
            .collect();
        for id in &ids {
            if let Some(block) = self.store.block_mut(id) {
                block.eval.begin();
            }
        }
        self.client.eval_all_blocks();
    }

    /// A run announced new results.
    ///
    /// Metadata is applied to every updated block. The full payload is fetched
    /// now for blocks that failed, blocks that were waiting on a run, and (in
    /// live mode) visual blocks. The rest are fetched when displayed.
    pub fn handle_eval_results(&mut self, results: &EvalResults) {
        let run = &results.id;
        for (id, meta) in &results.blocks {
            let Some(meta) = meta else {
                continue;
            };
            let Some(block) = self.store.block_mut(id) else {
                debug!("Result for unknown block {} in run {}", id, run);
                continue;
            };
            let was_running = block.eval.running;
            let visual = block.kind.is_visual();
            block.eval.advance_to(run);

            if let Err(e) = self.store.set_output_meta(id, meta.outputs.clone()) {
                warn!("Could not apply metadata for {}: {}", id, e);
            }

            if meta.error || was_running || (self.playing && visual) {
                self.fetch_result(run, id);
            }
        }
    }

    /// Get a block's result for a run, from the cache when possible.
    ///
    /// A cache hit is applied to the block immediately. Concurrent fetches for
    /// the same key share one request.
    pub fn fetch_result(&mut self, run: &RunId, block: &BlockId) -> FetchStatus {
        match self.cache.lookup(run, block) {
            Lookup::Hit(result) => {
                self.apply_result(run, block, &result);
                FetchStatus::Cached(result)
            }
            Lookup::Pending => {
                debug!("Fetch for {}/{} already in flight", run, block);
                FetchStatus::Pending
            }
            Lookup::Miss => {
                self.client.get_result(run, block);
                FetchStatus::Requested
            }
        }
    }

    /// Response to an `eval_get` request.
    ///
    /// Returns the decoded result, or `None` when nothing was waiting for it.
    pub fn handle_result(
        &mut self,
        run: &RunId,
        block: &BlockId,
        raw: RawResult,
    ) -> Option<EvalResult> {
        let result = raw.decode();
        if let Some(error) = &result.error {
            warn!("Block {} failed in run {}: {}", block, run, error);
        }
        self.cache.complete(run, block, result.clone())?;
        self.apply_result(run, block, &result);
        Some(result)
    }

    fn apply_result(&mut self, run: &RunId, id: &BlockId, result: &EvalResult) {
        let Some(block) = self.store.block_mut(id) else {
            return;
        };
        if !block.eval.apply(run, result) {
            debug!(
                "Result for {} from run {} is stale (current {:?})",
                id, run, block.eval.eval_id
            );
        }
    }

    /// A block became visible: make sure its current result is loaded.
    ///
    /// Nothing is fetched while the block waits on a new run.
    pub fn display_block(&mut self, id: &BlockId) -> Option<FetchStatus> {
        let block = self.store.block(id)?;
        if block.eval.has_result() || block.eval.running {
            return None;
        }
        let run = block.eval.eval_id.clone()?;
        Some(self.fetch_result(&run, id))
    }

    /// What should be shown for a block right now. Nothing while reconnecting.
    pub fn visible_result(&self, id: &BlockId) -> Option<EvalResult> {
        if self.status == ConnectionStatus::Reconnecting {
            return None;
        }
        let block = self.store.block(id)?;
        block.eval.has_result().then(|| block.eval.result())
    }
}
