use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// One measured operation.
#[derive(Debug, Clone)]
pub struct TimingSample {
    pub operation: String,
    pub duration: Duration,
}

/// Per-element measurement with its sub-step breakdown.
#[derive(Debug, Clone)]
pub struct ElementTiming {
    pub index: usize,
    pub tag: String,
    pub total: Duration,
    pub breakdown: Vec<(String, Duration)>,
}

/// Append-only collector of operation timings. Consumed by the tree walk
/// for diagnostics; never affects the snapshot itself.
#[derive(Debug, Default)]
pub struct TimingAggregator {
    samples: Vec<TimingSample>,
    elements: Vec<ElementTiming>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperationStats {
    pub count: usize,
    pub total: Duration,
    pub mean: Duration,
    pub min: Duration,
    pub max: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct TimingSummary {
    pub operations: BTreeMap<String, OperationStats>,
    pub elements: Option<OperationStats>,
}

impl TimingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, operation: &str, duration: Duration) {
        self.samples.push(TimingSample {
            operation: operation.to_string(),
            duration,
        });
    }

    pub fn record_element(
        &mut self,
        index: usize,
        tag: &str,
        total: Duration,
        breakdown: Vec<(String, Duration)>,
    ) {
        self.elements.push(ElementTiming {
            index,
            tag: tag.to_string(),
            total,
            breakdown,
        });
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn summary(&self) -> TimingSummary {
        let mut grouped: BTreeMap<String, Vec<Duration>> = BTreeMap::new();
        for sample in &self.samples {
            grouped
                .entry(sample.operation.clone())
                .or_default()
                .push(sample.duration);
        }

        let operations = grouped
            .into_iter()
            .map(|(operation, durations)| (operation, stats_of(&durations)))
            .collect();

        let element_totals: Vec<Duration> = self.elements.iter().map(|e| e.total).collect();
        let elements = if element_totals.is_empty() {
            None
        } else {
            Some(stats_of(&element_totals))
        };

        TimingSummary {
            operations,
            elements,
        }
    }
}

fn stats_of(durations: &[Duration]) -> OperationStats {
    let count = durations.len();
    let total: Duration = durations.iter().sum();
    let min = durations.iter().min().copied().unwrap_or_default();
    let max = durations.iter().max().copied().unwrap_or_default();
    let mean = if count == 0 {
        Duration::ZERO
    } else {
        total / count as u32
    };
    OperationStats {
        count,
        total,
        mean,
        min,
        max,
    }
}

impl fmt::Display for TimingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operations.is_empty() && self.elements.is_none() {
            return writeln!(f, "no timing samples recorded");
        }
        writeln!(
            f,
            "{:<24} {:>7} {:>10} {:>10} {:>10} {:>10}",
            "operation", "count", "total", "mean", "min", "max"
        )?;
        for (operation, stats) in &self.operations {
            writeln!(
                f,
                "{:<24} {:>7} {:>9.3}s {:>9.3}s {:>9.3}s {:>9.3}s",
                operation,
                stats.count,
                stats.total.as_secs_f64(),
                stats.mean.as_secs_f64(),
                stats.min.as_secs_f64(),
                stats.max.as_secs_f64(),
            )?;
        }
        if let Some(stats) = &self.elements {
            writeln!(
                f,
                "{:<24} {:>7} {:>9.3}s {:>9.3}s {:>9.3}s {:>9.3}s",
                "per-element total",
                stats.count,
                stats.total.as_secs_f64(),
                stats.mean.as_secs_f64(),
                stats.min.as_secs_f64(),
                stats.max.as_secs_f64(),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_aggregator_yields_empty_summary() {
        let summary = TimingAggregator::new().summary();
        assert!(summary.operations.is_empty());
        assert!(summary.elements.is_none());
        assert!(format!("{summary}").contains("no timing samples"));
    }

    #[test]
    fn aggregates_per_operation() {
        let mut timings = TimingAggregator::new();
        timings.record("tag_name", Duration::from_millis(10));
        timings.record("tag_name", Duration::from_millis(30));
        timings.record("text", Duration::from_millis(5));

        let summary = timings.summary();
        let tag = &summary.operations["tag_name"];
        assert_eq!(tag.count, 2);
        assert_eq!(tag.total, Duration::from_millis(40));
        assert_eq!(tag.mean, Duration::from_millis(20));
        assert_eq!(tag.min, Duration::from_millis(10));
        assert_eq!(tag.max, Duration::from_millis(30));
        assert_eq!(summary.operations["text"].count, 1);
    }

    #[test]
    fn aggregates_element_totals() {
        let mut timings = TimingAggregator::new();
        timings.record_element(
            0,
            "div",
            Duration::from_millis(12),
            vec![("tag_name".to_string(), Duration::from_millis(2))],
        );
        timings.record_element(1, "span", Duration::from_millis(8), vec![]);

        let summary = timings.summary();
        let elements = summary.elements.expect("element stats");
        assert_eq!(elements.count, 2);
        assert_eq!(elements.total, Duration::from_millis(20));
        assert_eq!(elements.min, Duration::from_millis(8));
        assert_eq!(elements.max, Duration::from_millis(12));
    }
}
