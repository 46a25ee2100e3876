/// Tasks: parameter sets plus the programs that run over them
pub mod classification;

pub use classification::ClassificationTask;

use std::collections::HashMap;

use candle_core::Tensor;
use candle_nn::{VarBuilder, VarMap};

use crate::data::Feed;

/// Name of the variable the optimizer minimizes
pub const LOSS: &str = "loss";
/// Name of the batch accuracy variable
pub const ACCURACY: &str = "accuracy";

/// Named tensors produced by one forward pass
pub type Variables = HashMap<String, Tensor>;

/// Which of the task's programs to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Program {
    /// Training graph; the executor applies the bound optimizer after it
    Main,
    /// Forward-only evaluation graph
    Inference,
}

/// A model graph the training loop drives without inspecting
///
/// The task owns its parameters. `startup` creates them (once per run)
/// through the supplied builder, and `forward` must produce at least the
/// [`LOSS`] and [`ACCURACY`] variables.
pub trait Task {
    /// Parameter set shared by every program of this task
    fn parameters(&self) -> &VarMap;

    /// Create and initialize parameters
    fn startup(&mut self, vb: VarBuilder) -> crate::Result<()>;

    /// Run one program over a feed
    fn forward(&self, program: Program, feed: &Feed) -> crate::Result<Variables>;
}
