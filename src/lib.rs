//! Fine-tuning run loop on top of candle
//!
//! Drives a [`Task`] through a fixed number of epochs over batches produced
//! by a [`DataProcessor`], logging running loss/accuracy, checkpointing the
//! task parameters and evaluating on held-out batches at fixed step
//! intervals.
//!
//! # Example
//!
//! ```ignore
//! use hub_finetune::{finetune_and_eval, FinetuneConfig};
//! use hub_finetune::data::{FeedSlot, InMemoryProcessor};
//! use hub_finetune::task::ClassificationTask;
//!
//! let mut task = ClassificationTask::new(4, 2);
//! let feed_list = task.feed_list();
//! let summary = finetune_and_eval(&mut task, &processor, &feed_list, &FinetuneConfig::default())?;
//! ```

pub mod config;
pub mod data;
pub mod device;
pub mod executor;
pub mod task;
pub mod training;

// Re-export commonly used items
pub use config::FinetuneConfig;
pub use data::{DataProcessor, Phase};
pub use executor::Executor;
pub use task::{Program, Task};
pub use training::{eval, finetune, finetune_and_eval, EvalMetrics, FinetuneSummary};

/// Library error types
#[derive(Debug, thiserror::Error)]
pub enum FinetuneError {
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Task error: {0}")]
    Task(String),

    #[error("Variable `{0}` is not produced by the task")]
    UnknownVariable(String),

    #[error("Variable `{0}` was released by memory optimization")]
    VariableElided(String),

    #[error("Evaluation produced no batches")]
    EmptyEvaluation,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FinetuneError>;
