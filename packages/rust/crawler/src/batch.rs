//! In-memory buffer of built documents awaiting a bulk write.

use trawl_shared::DocumentRecord;

/// Collects documents until the batch threshold is reached.
///
/// Order inside a batch carries no meaning.
#[derive(Debug)]
pub struct BatchAccumulator {
    threshold: usize,
    documents: Vec<DocumentRecord>,
}

impl BatchAccumulator {
    /// A new, empty accumulator. A threshold of zero is treated as one.
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            threshold,
            documents: Vec::with_capacity(threshold),
        }
    }

    pub fn add(&mut self, document: DocumentRecord) {
        self.documents.push(document);
    }

    /// True once the buffer holds a full batch.
    pub fn should_flush(&self) -> bool {
        self.documents.len() >= self.threshold
    }

    /// Drain the buffer, leaving it empty.
    pub fn take(&mut self) -> Vec<DocumentRecord> {
        std::mem::replace(&mut self.documents, Vec::with_capacity(self.threshold))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}
