use log::info;
use serde_json::Value;

use super::Session;
use crate::authority::AuthorityClient;
use crate::protocol::{BatchBegin, EpochBegin};

/// Server-side training state as reported by pushes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingProgress {
    pub running: bool,
    pub epoch: Option<u64>,
    pub epochs: Option<u64>,
    pub batch: Option<u64>,
    pub batches: Option<u64>,
    /// Last `set_params` payload.
    pub params: Option<Value>,
}

impl TrainingProgress {
    pub(crate) fn begin(&mut self) {
        info!("Training started");
        *self = Self {
            running: true,
            params: self.params.take(),
            ..Self::default()
        };
    }

    pub(crate) fn end(&mut self) {
        info!("Training finished");
        self.running = false;
    }

    pub(crate) fn epoch_begin(&mut self, epoch: &EpochBegin) {
        self.epoch = Some(epoch.epoch);
        if epoch.epochs.is_some() {
            self.epochs = epoch.epochs;
        }
        self.batch = None;
    }

    pub(crate) fn batch_begin(&mut self, batch: &BatchBegin) {
        self.batch = Some(batch.batch);
        if batch.batches.is_some() {
            self.batches = batch.batches;
        }
    }

    pub(crate) fn set_params(&mut self, params: Value) {
        self.params = Some(params);
    }

    /// Fraction of the run completed, when the totals are known.
    pub fn fraction(&self) -> Option<f64> {
        let epochs = self.epochs.filter(|e| *e > 0)? as f64;
        let epoch = self.epoch.unwrap_or(0) as f64;
        let within = match (self.batch, self.batches) {
            (Some(b), Some(n)) if n > 0 => b as f64 / n as f64,
            _ => 0.0,
        };
        Some(((epoch + within) / epochs).min(1.0))
    }
}

impl<C: AuthorityClient> Session<C> {
    pub fn start_training(&mut self) {
        self.client.start_training();
    }

    pub fn training(&self) -> &TrainingProgress {
        &self.training
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_fraction() {
        let mut progress = TrainingProgress::default();
        progress.begin();
        assert_eq!(progress.fraction(), None);
        progress.epoch_begin(&EpochBegin {
            epoch: 1,
            epochs: Some(4),
        });
        progress.batch_begin(&BatchBegin {
            batch: 5,
            batches: Some(10),
        });
        assert_eq!(progress.fraction(), Some(0.375));
        progress.end();
        assert!(!progress.running);
    }

    #[test]
    fn test_begin_keeps_params() {
        let mut progress = TrainingProgress::default();
        progress.set_params(serde_json::json!({"lr": 0.01}));
        progress.begin();
        assert!(progress.params.is_some());
        assert!(progress.running);
    }
}
