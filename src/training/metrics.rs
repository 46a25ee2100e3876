/// Running loss/accuracy aggregation and metric records

/// Example-weighted sums over one logging window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningAggregate {
    size: usize,
    accuracy_sum: f64,
    loss_sum: f64,
}

impl RunningAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a batch whose mean loss/accuracy were measured over `examples`
    pub fn update(&mut self, loss: f64, accuracy: f64, examples: usize) {
        self.size += examples;
        self.accuracy_sum += accuracy * examples as f64;
        self.loss_sum += loss * examples as f64;
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Weighted (loss, accuracy) means, `None` when nothing was added
    pub fn means(&self) -> Option<(f64, f64)> {
        if self.size == 0 {
            return None;
        }
        let size = self.size as f64;
        Some((self.loss_sum / size, self.accuracy_sum / size))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One periodic training log emission
#[derive(Debug, Clone, PartialEq)]
pub struct TrainLog {
    pub step: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub steps_per_sec: f64,
}

/// Result of one evaluation pass
#[derive(Debug, Clone, PartialEq)]
pub struct EvalMetrics {
    pub loss: f64,
    pub accuracy: f64,
    pub batches: usize,
    pub examples: usize,
    pub secs_per_batch: f64,
}
