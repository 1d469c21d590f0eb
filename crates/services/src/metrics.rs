//! Counters for the paths whose failures never reach a caller.
//!
//! Detached fan-out writes and cache lookups report only through logs and
//! these counters.

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Sink {
    Media,
    Index,
    Archive,
    Cache,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum WriteOutcome {
    Ok,
    Failed,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct WriteLabels {
    pub sink: Sink,
    pub outcome: WriteOutcome,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum LookupOutcome {
    Hit,
    Miss,
    Error,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct LookupLabels {
    pub outcome: LookupOutcome,
}

/// Cheap to clone; every clone shares the same counters.
#[derive(Clone, Debug, Default)]
pub struct PipelineMetrics {
    writes: Family<WriteLabels, Counter>,
    cache_lookups: Family<LookupLabels, Counter>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, registry: &mut Registry) {
        registry.register(
            "around_fanout_writes",
            "Writes issued to each store by post ingestion, by outcome",
            self.writes.clone(),
        );
        registry.register(
            "around_search_cache_lookups",
            "Search cache lookups, by outcome",
            self.cache_lookups.clone(),
        );
    }

    pub fn record_write(&self, sink: Sink, ok: bool) {
        let outcome = if ok {
            WriteOutcome::Ok
        } else {
            WriteOutcome::Failed
        };
        self.writes
            .get_or_create(&WriteLabels { sink, outcome })
            .inc();
    }

    pub fn record_lookup(&self, outcome: LookupOutcome) {
        self.cache_lookups
            .get_or_create(&LookupLabels { outcome })
            .inc();
    }

    pub fn writes(&self, sink: Sink, outcome: WriteOutcome) -> u64 {
        self.writes
            .get_or_create(&WriteLabels { sink, outcome })
            .get()
    }

    pub fn lookups(&self, outcome: LookupOutcome) -> u64 {
        self.cache_lookups
            .get_or_create(&LookupLabels { outcome })
            .get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus_client::encoding::text::encode;

    #[test]
    fn registered_counters_are_exposed() {
        let metrics = PipelineMetrics::new();
        let mut registry = Registry::default();
        metrics.register(&mut registry);

        metrics.record_write(Sink::Index, false);
        metrics.record_lookup(LookupOutcome::Hit);

        let mut out = String::new();
        encode(&mut out, &registry).unwrap();
        assert!(out.contains("around_fanout_writes_total"));
        assert!(out.contains("sink=\"Index\""));
        assert!(out.contains("around_search_cache_lookups_total"));
        assert_eq!(metrics.lookups(LookupOutcome::Hit), 1);
    }

    #[test]
    fn clones_share_counters() {
        let metrics = PipelineMetrics::new();
        let clone = metrics.clone();
        clone.record_write(Sink::Archive, true);
        assert_eq!(metrics.writes(Sink::Archive, WriteOutcome::Ok), 1);
    }
}
