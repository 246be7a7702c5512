//! Metric collection and validation reducers

use runtime_core::{MetricSample, Metrics};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How per-batch values of one metric combine into a validation value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reducer {
    #[default]
    Avg,
    Sum,
    Min,
    Max,
}

impl Reducer {
    /// Reduce `values`; `None` when there is nothing to reduce
    pub fn reduce(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let reduced = match self {
            Reducer::Avg => values.iter().sum::<f64>() / values.len() as f64,
            Reducer::Sum => values.iter().sum(),
            Reducer::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Reducer::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        };
        Some(reduced)
    }
}

/// Combine per-batch metric maps, metric by metric.
///
/// Batches missing a metric are skipped for that metric only.
pub fn reduce_metrics<F>(batches: &[Metrics], reducer_for: F) -> Metrics
where
    F: Fn(&str) -> Reducer,
{
    let mut columns: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for batch in batches {
        for (name, value) in batch {
            columns.entry(name.as_str()).or_default().push(*value);
        }
    }

    columns
        .into_iter()
        .filter_map(|(name, values)| {
            reducer_for(name)
                .reduce(&values)
                .map(|value| (name.to_string(), value))
        })
        .collect()
}

/// Append-only record of every sample produced in a run
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    training: Vec<MetricSample>,
    validation: Vec<MetricSample>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_training(&mut self, sample: MetricSample) {
        self.training.push(sample);
    }

    pub fn push_validation(&mut self, sample: MetricSample) {
        self.validation.push(sample);
    }

    /// Training samples in step order
    pub fn training(&self) -> &[MetricSample] {
        &self.training
    }

    /// Validation samples in pass order
    pub fn validation(&self) -> &[MetricSample] {
        &self.validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(pairs: &[(&str, f64)]) -> Metrics {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_reducers() {
        let values = [1.0, 4.0, 2.5];
        assert_eq!(Reducer::Avg.reduce(&values), Some(2.5));
        assert_eq!(Reducer::Sum.reduce(&values), Some(7.5));
        assert_eq!(Reducer::Min.reduce(&values), Some(1.0));
        assert_eq!(Reducer::Max.reduce(&values), Some(4.0));
        assert_eq!(Reducer::Avg.reduce(&[]), None);
    }

    #[test]
    fn test_reduce_metrics_per_key() {
        let batches = vec![
            metrics(&[("mse", 1.0), ("correct", 3.0)]),
            metrics(&[("mse", 3.0), ("correct", 4.0)]),
            metrics(&[("mse", 2.0)]),
        ];

        let reduced = reduce_metrics(&batches, |name| match name {
            "correct" => Reducer::Sum,
            _ => Reducer::Avg,
        });
        assert_eq!(reduced, metrics(&[("mse", 2.0), ("correct", 7.0)]));
    }

    #[test]
    fn test_reduce_nothing() {
        assert!(reduce_metrics(&[], |_| Reducer::Avg).is_empty());
    }

    #[test]
    fn test_collector_keeps_order() {
        let mut collector = MetricsCollector::new();
        collector.push_training(MetricSample::training(0, metrics(&[("loss", 2.0)])));
        collector.push_training(MetricSample::training(1, metrics(&[("loss", 2.0)])));
        collector.push_validation(MetricSample::validation(2, metrics(&[("mse", 1.0)])));

        let indices: Vec<_> = collector.training().iter().map(|s| s.batch_index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(collector.validation().len(), 1);
    }
}
