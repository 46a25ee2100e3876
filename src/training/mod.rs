/// Training infrastructure: optimizer setup, checkpoints, metrics and loops
pub mod checkpoint;
pub mod metrics;
pub mod optimizer;
pub mod trainer;

pub use checkpoint::{save_persistables, Checkpoint, CheckpointMetadata};
pub use metrics::{EvalMetrics, RunningAggregate, TrainLog};
pub use optimizer::{optimizer_config_for_strategy, AdamConfig, L2DecayRegularizer};
pub use trainer::{eval, finetune, finetune_and_eval, FinetuneSummary};
