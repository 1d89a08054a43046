//! Per-step log pipeline: couples a
//! `RingBuffer` snapshot view with a `tokio::sync::broadcast` fan-out so
//! multiple retrieval requests can tail the same step concurrently. A
//! lagging subscriber gets `RecvError::Lagged` rather than back-pressuring
//! the writer — `broadcast` already implements that non-blocking drop, so the
//! retrieval side just has to not treat it as fatal (see `http::get_logs`).

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::masking::SecretMasker;
use crate::ring::RingBuffer;

/// (namespace, run, step).
pub type StepKey = (String, String, String);

pub struct StepPipeline {
    ring: RingBuffer,
    tx: broadcast::Sender<Bytes>,
    masker: SecretMasker,
}

impl StepPipeline {
    pub fn new(ring_capacity: usize, channel_depth: usize, masker: SecretMasker) -> Self {
        let (tx, _rx) = broadcast::channel(channel_depth);
        StepPipeline {
            ring: RingBuffer::new(ring_capacity),
            tx,
            masker,
        }
    }

    pub fn write(&self, chunk: &[u8]) {
        let masked = self.masker.mask(chunk);
        self.ring.push(&masked);
        let _ = self.tx.send(Bytes::from(masked));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.ring.snapshot()
    }
}

/// Process-wide table of live step pipelines. Entries are created the
/// first time a step's workload is observed running and removed once its
/// logs are archived (section 4.7 "Archive phase").
pub struct LogRegistry {
    pipelines: Mutex<HashMap<StepKey, Arc<StepPipeline>>>,
    ring_capacity: usize,
    channel_depth: usize,
}

impl LogRegistry {
    pub fn new(ring_capacity: usize, channel_depth: usize) -> Self {
        LogRegistry {
            pipelines: Mutex::new(HashMap::new()),
            ring_capacity,
            channel_depth,
        }
    }

    pub fn pipeline_for(&self, key: StepKey, masker: SecretMasker) -> Arc<StepPipeline> {
        let mut pipelines = self.pipelines.lock();
        pipelines
            .entry(key)
            .or_insert_with(|| Arc::new(StepPipeline::new(self.ring_capacity, self.channel_depth, masker)))
            .clone()
    }

    pub fn get(&self, key: &StepKey) -> Option<Arc<StepPipeline>> {
        self.pipelines.lock().get(key).cloned()
    }

    pub fn remove(&self, key: &StepKey) -> Option<Arc<StepPipeline>> {
        self.pipelines.lock().remove(key)
    }

    /// Every step pipeline currently tracked for one run, for archival on
    /// finalizer-driven cleanup.
    pub fn steps_for_run(&self, namespace: &str, run: &str) -> Vec<(StepKey, Arc<StepPipeline>)> {
        self.pipelines
            .lock()
            .iter()
            .filter(|(k, _)| k.0 == namespace && k.1 == run)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_existing_pipeline_for_same_key() {
        let registry = LogRegistry::new(1024, 10);
        let key: StepKey = ("ns".into(), "run-1".into(), "build".into());
        let a = registry.pipeline_for(key.clone(), SecretMasker::default());
        let b = registry.pipeline_for(key, SecretMasker::default());
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn steps_for_run_filters_by_namespace_and_run() {
        let registry = LogRegistry::new(1024, 10);
        registry.pipeline_for(("ns".into(), "run-1".into(), "build".into()), SecretMasker::default());
        registry.pipeline_for(("ns".into(), "run-1".into(), "test".into()), SecretMasker::default());
        registry.pipeline_for(("ns".into(), "run-2".into(), "build".into()), SecretMasker::default());

        let steps = registry.steps_for_run("ns", "run-1");
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn write_reaches_subscriber_masked() {
        let pipeline = StepPipeline::new(1024, 10, SecretMasker::new(vec!["topsecret".to_string()]));
        let mut rx = pipeline.subscribe();
        pipeline.write(b"token=topsecret");
        let received = rx.try_recv().unwrap();
        assert_eq!(received.as_ref(), format!("token={}", crate::masking::REDACTED).as_bytes());
        assert_eq!(pipeline.snapshot(), received.to_vec());
    }
}
