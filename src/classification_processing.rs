use std::collections::BTreeMap;
use anyhow::{bail, ensure, Result};
use ndarray::{ArrayViewD, Axis};
use crate::common::AccuracyReport;

/// Metrics every worker emits, with the `k` each one is scored at.
pub const METRICS: [(&str, usize); 2] = [("top1", 1), ("top5", 5)];

/// One 0/1 value per example of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CorrectnessVector(pub Vec<u8>);

impl CorrectnessVector {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn correct(&self) -> u64 {
        self.0.iter().map(|&x| x as u64).sum()
    }
}

/// A correctness vector with the metric it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedCorrectness {
    pub metric: String,
    pub vector: CorrectnessVector,
}

impl TaggedCorrectness {
    pub fn new(metric: &str, vector: CorrectnessVector) -> Self {
        Self {
            metric: metric.to_string(),
            vector,
        }
    }
}

/// Scores a batch against its labels for each `k` in `k_values`.
///
/// `scores` is `(n, classes)` or `(n, classes, ...)`; trailing axes are averaged per class.
/// A class outranks the label's class if it scores higher, or scores the same and has
/// the lower index.
pub fn score_top_k(labels: &[i64], scores: ArrayViewD<f32>, k_values: &[usize]) -> Result<Vec<CorrectnessVector>> {
    ensure!(
        scores.ndim() >= 2,
        "Score tensor must have at least 2 dimensions, got shape {:?}",
        scores.shape()
    );
    let (n, classes) = (scores.shape()[0], scores.shape()[1]);
    ensure!(
        labels.len() == n,
        "Batch has {} labels but the network produced {} score rows",
        labels.len(), n
    );

    let mut vectors = vec![CorrectnessVector(Vec::with_capacity(n)); k_values.len()];
    let mut class_scores = vec![0.0f32; classes];

    for (row, &label) in scores.axis_iter(Axis(0)).zip(labels) {
        for (c, per_class) in row.axis_iter(Axis(0)).enumerate() {
            class_scores[c] = match per_class.mean() {
                Some(mean) => mean,
                None => bail!("Score tensor {:?} has an empty spatial dimension", scores.shape()),
            };
        }

        let rank = label_rank(&class_scores, label);
        for (vector, &k) in vectors.iter_mut().zip(k_values) {
            let hit = rank.is_some_and(|r| r < k);
            vector.0.push(hit as u8);
        }
    }
    Ok(vectors)
}

/// 0-based position of `label` in the descending ranking, `None` if it cannot be ranked.
fn label_rank(class_scores: &[f32], label: i64) -> Option<usize> {
    let label = usize::try_from(label).ok()?;
    let target = *class_scores.get(label)?;
    if target.is_nan() {
        return None;
    }
    let rank = class_scores
        .iter()
        .enumerate()
        .filter(|&(c, &s)| s > target || (s == target && c < label))
        .count();
    Some(rank)
}

/// Mean of all values of one metric, `None` without any example.
pub fn reduce(vectors: &[CorrectnessVector]) -> Option<f64> {
    let count: usize = vectors.iter().map(|v| v.len()).sum();
    if count == 0 {
        return None;
    }
    let correct: u64 = vectors.iter().map(|v| v.correct()).sum();
    Some(correct as f64 / count as f64)
}

/// Running per-metric totals of everything the workers sent back.
#[derive(Debug, Default)]
pub struct Aggregator {
    totals: BTreeMap<String, (u64, u64)>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tagged: &TaggedCorrectness) {
        let entry = self.totals.entry(tagged.metric.clone()).or_insert((0, 0));
        entry.0 += tagged.vector.correct();
        entry.1 += tagged.vector.len() as u64;
    }

    pub fn extend<'a, I: IntoIterator<Item = &'a TaggedCorrectness>>(&mut self, iter: I) {
        for tagged in iter {
            self.push(tagged);
        }
    }

    /// Number of examples seen for `metric`.
    pub fn count(&self, metric: &str) -> u64 {
        self.totals.get(metric).map(|&(_, n)| n).unwrap_or(0)
    }

    pub fn reduce(&self) -> AccuracyReport {
        let mut report = AccuracyReport::new();
        for (metric, &(correct, count)) in &self.totals {
            if count > 0 {
                report.insert(metric, correct as f64 / count as f64);
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array3};
    use rand::seq::SliceRandom;

    #[test]
    fn top1_picks_highest_score() {
        let scores = array![[0.1f32, 0.9, 0.3], [0.8, 0.1, 0.05]].into_dyn();
        let out = score_top_k(&[1, 0], scores.view(), &[1]).unwrap();
        assert_eq!(out, vec![CorrectnessVector(vec![1, 1])]);
    }

    #[test]
    fn label_in_top5_but_not_top1() {
        let scores = array![[0.9f32, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3]].into_dyn();
        let out = score_top_k(&[4], scores.view(), &[1, 5]).unwrap();
        assert_eq!(out[0].0, vec![0]);
        assert_eq!(out[1].0, vec![1]);

        let out = score_top_k(&[5], scores.view(), &[1, 5]).unwrap();
        assert_eq!(out[1].0, vec![0]);
    }

    #[test]
    fn ties_favor_lower_class_index() {
        let scores = array![[0.5f32, 0.5, 0.5]].into_dyn();
        assert_eq!(score_top_k(&[0], scores.view(), &[1]).unwrap()[0].0, vec![1]);
        assert_eq!(score_top_k(&[2], scores.view(), &[1]).unwrap()[0].0, vec![0]);
        assert_eq!(score_top_k(&[2], scores.view(), &[3]).unwrap()[0].0, vec![1]);
    }

    #[test]
    fn k_beyond_class_count_covers_everything() {
        let scores = array![[0.1f32, 0.2, 0.3]].into_dyn();
        let out = score_top_k(&[0], scores.view(), &[5]).unwrap();
        assert_eq!(out[0].0, vec![1]);
    }

    #[test]
    fn out_of_range_labels_are_wrong() {
        let scores = array![[0.1f32, 0.2], [0.3, 0.4]].into_dyn();
        let out = score_top_k(&[-1, 2], scores.view(), &[5]).unwrap();
        assert_eq!(out[0].0, vec![0, 0]);
    }

    #[test]
    fn spatial_scores_are_averaged() {
        // class 0 averages to 0.5, class 1 to 0.4 even though its max is higher
        let mut scores = Array3::<f32>::zeros((1, 2, 2));
        scores[[0, 0, 0]] = 0.5;
        scores[[0, 0, 1]] = 0.5;
        scores[[0, 1, 0]] = 0.8;
        scores[[0, 1, 1]] = 0.0;
        let out = score_top_k(&[0], scores.into_dyn().view(), &[1]).unwrap();
        assert_eq!(out[0].0, vec![1]);
    }

    #[test]
    fn label_count_must_match_rows() {
        let scores = array![[0.1f32, 0.9]].into_dyn();
        assert!(score_top_k(&[0, 1], scores.view(), &[1]).is_err());
        let flat = array![0.1f32, 0.9].into_dyn();
        assert!(score_top_k(&[0], flat.view(), &[1]).is_err());
    }

    #[test]
    fn reduce_averages_all_examples() {
        let vectors = [CorrectnessVector(vec![1, 0, 1]), CorrectnessVector(vec![1])];
        assert_relative_eq!(reduce(&vectors).unwrap(), 0.75);
        assert_eq!(reduce(&[]), None);
    }

    #[test]
    fn aggregation_is_order_independent() {
        let mut batches: Vec<TaggedCorrectness> = (0..40)
            .map(|i| {
                let bits = (0..(i % 7 + 1)).map(|j| ((i * 31 + j * 17) % 3 == 0) as u8).collect();
                TaggedCorrectness::new(if i % 2 == 0 { "top1" } else { "top5" }, CorrectnessVector(bits))
            })
            .collect();

        let mut first = Aggregator::new();
        first.extend(&batches);
        let expected = first.reduce();

        let mut rng = rand::thread_rng();
        for _ in 0..5 {
            batches.shuffle(&mut rng);
            let mut shuffled = Aggregator::new();
            shuffled.extend(&batches);
            let report = shuffled.reduce();
            for (name, value) in expected.iter() {
                assert_relative_eq!(report.get(name).unwrap(), value);
            }
        }
    }

    #[test]
    fn metric_without_examples_is_absent() {
        let mut agg = Aggregator::new();
        agg.push(&TaggedCorrectness::new("top1", CorrectnessVector(vec![1, 1, 0, 1])));
        agg.push(&TaggedCorrectness::new("top5", CorrectnessVector(vec![])));
        let report = agg.reduce();
        assert_relative_eq!(report.get("top1").unwrap(), 0.75);
        assert_eq!(report.get("top5"), None);
        assert_eq!(agg.count("top5"), 0);
    }
}
