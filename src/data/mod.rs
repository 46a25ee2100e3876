/// Data sources and batching for fine-tuning runs
pub mod feeder;
pub mod memory;
pub mod numpy_dataset;

pub use feeder::{DataFeeder, Feed, FeedSlot, SlotType};
pub use memory::InMemoryProcessor;
pub use numpy_dataset::{DatasetMetadata, NumpyProcessor};

use std::fmt;

/// Which split a reader is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Train,
    Test,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Train => "train",
            Phase::Test => "test",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One input slot value of a single example
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Float(Vec<f32>),
    Int(Vec<i64>),
}

impl Field {
    pub fn len(&self) -> usize {
        match self {
            Field::Float(values) => values.len(),
            Field::Int(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A labeled example: one field per feed slot, in feed-list order
pub type Example = Vec<Field>;

/// Lazy, finite sequence of examples for one pass
pub type Reader<'a> = Box<dyn Iterator<Item = Example> + 'a>;

/// Source of training and test examples
///
/// Every call to `data_generator` starts a fresh pass over the requested
/// phase.
pub trait DataProcessor {
    fn data_generator(&self, phase: Phase) -> crate::Result<Reader<'_>>;
}

/// Groups a reader into batches of `batch_size` examples
///
/// The trailing partial batch is kept; an empty batch is never produced.
pub fn batch<I>(reader: I, batch_size: usize) -> Batched<I::IntoIter>
where
    I: IntoIterator<Item = Example>,
{
    Batched {
        inner: reader.into_iter(),
        batch_size,
    }
}

/// Iterator returned by [`batch`]
pub struct Batched<I> {
    inner: I,
    batch_size: usize,
}

impl<I: Iterator<Item = Example>> Iterator for Batched<I> {
    type Item = Vec<Example>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<Example> = self.inner.by_ref().take(self.batch_size).collect();
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn examples(n: usize) -> Vec<Example> {
        (0..n)
            .map(|i| vec![Field::Float(vec![i as f32]), Field::Int(vec![i as i64])])
            .collect()
    }

    #[test]
    fn test_batch_keeps_partial_tail() {
        let sizes: Vec<usize> = batch(examples(5), 2).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_batch_empty_reader() {
        assert_eq!(batch(examples(0), 4).count(), 0);
    }

    #[test]
    fn test_batch_preserves_order() {
        let batches: Vec<Vec<Example>> = batch(examples(3), 2).collect();
        assert_eq!(batches[0][1][1], Field::Int(vec![1]));
        assert_eq!(batches[1][0][1], Field::Int(vec![2]));
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::Train.to_string(), "train");
        assert_eq!(Phase::Test.as_str(), "test");
    }
}
