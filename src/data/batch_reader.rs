//! Label lists to batches.
//!
//! A label list is plain text, one `<relative_image_path> <integer_label>` record per line.

use std::path::{Path, PathBuf};
use anyhow::{bail, ensure, Context, Result};
use crate::common::{Batch, LabelRecord};
use crate::utils;

/// Expands `pattern` to the matching list files, sorted by name.
pub fn list_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut files = glob::glob(pattern)
        .with_context(|| format!("Invalid input pattern: {}", pattern))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to expand input pattern: {}", pattern))?;
    if files.is_empty() {
        bail!("No label list matches {}", pattern);
    }
    files.sort();
    Ok(files)
}

/// Parses one list file, joining every image path onto `root_dir`.
pub fn read_list_file(path: &Path, root_dir: &Path) -> Result<Vec<LabelRecord>> {
    let lines = utils::file_to_vec(path)
        .with_context(|| format!("Failed to read label list {}", path.display()))?;

    let mut records = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        let mut fields = line.split_whitespace();
        let Some(image_path) = fields.next() else {
            continue;
        };
        let label = match fields.next() {
            Some(label) => label.parse::<i64>().with_context(|| {
                format!("{}:{}: invalid label '{}'", path.display(), i + 1, label)
            })?,
            None => bail!("{}:{}: expected '<path> <label>'", path.display(), i + 1),
        };
        records.push(LabelRecord::new(root_dir.join(image_path), label));
    }
    Ok(records)
}

/// All records of all files matching `pattern`, in sorted file order then line order.
pub fn load_records(pattern: &str, root_dir: &Path) -> Result<Vec<LabelRecord>> {
    let mut records = Vec::new();
    for file in list_files(pattern)? {
        records.extend(read_list_file(&file, root_dir)?);
    }
    Ok(records)
}

/// Consecutive, non-overlapping windows of at most `batch_size` records.
///
/// Clone it before consuming to walk the same batches again.
#[derive(Debug, Clone)]
pub struct BatchSlices<'a> {
    chunks: std::slice::Chunks<'a, LabelRecord>,
    next_index: usize,
}

impl<'a> BatchSlices<'a> {
    /// Numbers the produced batches starting at `index`.
    pub fn with_first_index(mut self, index: usize) -> Self {
        self.next_index = index;
        self
    }
}

impl Iterator for BatchSlices<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.chunks.next()?;
        let batch = Batch::new(self.next_index, chunk.to_vec());
        self.next_index += 1;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for BatchSlices<'_> {}

pub fn slice_batches(records: &[LabelRecord], batch_size: usize) -> Result<BatchSlices<'_>> {
    ensure!(batch_size > 0, "Batch size must be at least 1");
    Ok(BatchSlices {
        chunks: records.chunks(batch_size),
        next_index: 0,
    })
}

/// Batches for every list file; a batch never spans two files.
pub fn load_batches(pattern: &str, root_dir: &Path, batch_size: usize) -> Result<Vec<Batch>> {
    let mut batches = Vec::new();
    for file in list_files(pattern)? {
        let records = read_list_file(&file, root_dir)?;
        let first = batches.len();
        batches.extend(slice_batches(&records, batch_size)?.with_first_index(first));
        log::debug!("{} | {} records, {} batches", file.display(), records.len(), batches.len() - first);
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(n: usize) -> Vec<LabelRecord> {
        (0..n).map(|i| LabelRecord::new(format!("img_{i}.jpg"), i as i64)).collect()
    }

    #[test]
    fn batch_count_is_ceiling() {
        for (n, b) in [(0, 1), (1, 1), (4, 2), (5, 2), (7, 3), (3, 10)] {
            let rs = records(n);
            let batches: Vec<_> = slice_batches(&rs, b).unwrap().collect();
            assert_eq!(batches.len(), n.div_ceil(b), "n={n} b={b}");
            for batch in batches.iter().take(batches.len().saturating_sub(1)) {
                assert_eq!(batch.len(), b);
            }
            let flat: Vec<_> = batches.into_iter().flat_map(|b| b.records).collect();
            assert_eq!(flat, rs);
        }
    }

    #[test]
    fn batches_are_numbered_and_restartable() {
        let rs = records(5);
        let slices = slice_batches(&rs, 2).unwrap().with_first_index(10);
        let first: Vec<_> = slices.clone().map(|b| b.index).collect();
        let second: Vec<_> = slices.map(|b| b.index).collect();
        assert_eq!(first, vec![10, 11, 12]);
        assert_eq!(first, second);
    }

    #[test]
    fn zero_batch_size_fails() {
        assert!(slice_batches(&records(3), 0).is_err());
    }
}
