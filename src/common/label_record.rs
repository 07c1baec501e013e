use std::path::PathBuf;

/// One line of a label list: where the image lives and its ground-truth class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRecord {
    pub path: PathBuf,
    pub label: i64,
}

impl LabelRecord {
    pub fn new<P: Into<PathBuf>>(path: P, label: i64) -> Self {
        Self {
            path: path.into(),
            label,
        }
    }
}

/// Consecutive records scored in one forward pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Batch {
    /// Position of the batch across all list files.
    pub index: usize,
    pub records: Vec<LabelRecord>,
}

impl Batch {
    pub fn new(index: usize, records: Vec<LabelRecord>) -> Self {
        Self { index, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn labels(&self) -> Vec<i64> {
        self.records.iter().map(|r| r.label).collect()
    }
}
