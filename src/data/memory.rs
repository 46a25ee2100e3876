/// Data processor over examples held in memory
use super::{DataProcessor, Example, Phase, Reader};

/// Fixed train/test example lists, replayed in order on every pass
#[derive(Debug, Clone, Default)]
pub struct InMemoryProcessor {
    train: Vec<Example>,
    test: Vec<Example>,
}

impl InMemoryProcessor {
    pub fn new(train: Vec<Example>, test: Vec<Example>) -> Self {
        Self { train, test }
    }

    pub fn num_examples(&self, phase: Phase) -> usize {
        self.examples(phase).len()
    }

    fn examples(&self, phase: Phase) -> &[Example] {
        match phase {
            Phase::Train => &self.train,
            Phase::Test => &self.test,
        }
    }
}

impl DataProcessor for InMemoryProcessor {
    fn data_generator(&self, phase: Phase) -> crate::Result<Reader<'_>> {
        Ok(Box::new(self.examples(phase).iter().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Field;

    #[test]
    fn test_each_pass_restarts() -> crate::Result<()> {
        let train = vec![
            vec![Field::Int(vec![1])],
            vec![Field::Int(vec![2])],
        ];
        let processor = InMemoryProcessor::new(train, Vec::new());

        let first: Vec<Example> = processor.data_generator(Phase::Train)?.collect();
        let second: Vec<Example> = processor.data_generator(Phase::Train)?.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);

        assert_eq!(processor.data_generator(Phase::Test)?.count(), 0);
        assert_eq!(processor.num_examples(Phase::Train), 2);

        Ok(())
    }
}
