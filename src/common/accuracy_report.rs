use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Final accuracy per metric name, each in `[0, 1]`, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccuracyReport {
    metrics: BTreeMap<String, f64>,
}

impl AccuracyReport {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_metric(mut self, name: &str, accuracy: f64) -> Self {
        self.insert(name, accuracy);
        self
    }

    pub fn insert(&mut self, name: &str, accuracy: f64) {
        self.metrics.insert(name.to_string(), accuracy);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.metrics.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))
    }
}

/// One `<metric> <percent>%` line per metric, sorted by metric name.
impl fmt::Display for AccuracyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, accuracy) in self.iter() {
            writeln!(f, "{} {:.2}%", name, accuracy * 100.0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_sorted_percentages() {
        let report = AccuracyReport::new()
            .with_metric("top5", 0.95)
            .with_metric("top1", 0.75);
        assert_eq!(report.to_string(), "top1 75.00%\ntop5 95.00%\n");
    }

    #[test]
    fn json_is_a_flat_object() {
        let report = AccuracyReport::new().with_metric("top1", 0.5);
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"top1":0.5}"#);
        let back: AccuracyReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
