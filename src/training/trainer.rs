/// Fine-tuning and evaluation loops
use std::path::PathBuf;
use std::time::Instant;

use crate::config::FinetuneConfig;
use crate::data::{batch, DataFeeder, DataProcessor, FeedSlot, Phase};
use crate::device::select_place;
use crate::executor::Executor;
use crate::task::{Program, Task, ACCURACY, LOSS};
use crate::FinetuneError;

use super::checkpoint::save_persistables;
use super::metrics::{EvalMetrics, RunningAggregate, TrainLog};
use super::optimizer::optimizer_config_for_strategy;

/// What a fine-tuning run did, in order
#[derive(Debug, Clone, Default)]
pub struct FinetuneSummary {
    /// Batches executed across all epochs
    pub steps: usize,
    /// One record per log emission
    pub train_logs: Vec<TrainLog>,
    /// Checkpoint directories written
    pub checkpoints: Vec<PathBuf>,
    /// Periodic evaluations followed by the final one
    pub evaluations: Vec<EvalMetrics>,
}

/// Fine-tune `task` without evaluation
pub fn finetune<T, D>(
    task: &mut T,
    data_processor: &D,
    feed_list: &[FeedSlot],
    config: &FinetuneConfig,
) -> crate::Result<FinetuneSummary>
where
    T: Task + ?Sized,
    D: DataProcessor + ?Sized,
{
    finetune_model(task, data_processor, feed_list, config, false)
}

/// Fine-tune `task`, evaluating every `eval_interval` steps and once at the end
pub fn finetune_and_eval<T, D>(
    task: &mut T,
    data_processor: &D,
    feed_list: &[FeedSlot],
    config: &FinetuneConfig,
) -> crate::Result<FinetuneSummary>
where
    T: Task + ?Sized,
    D: DataProcessor + ?Sized,
{
    finetune_model(task, data_processor, feed_list, config, true)
}

fn finetune_model<T, D>(
    task: &mut T,
    data_processor: &D,
    feed_list: &[FeedSlot],
    config: &FinetuneConfig,
    eval_model: bool,
) -> crate::Result<FinetuneSummary>
where
    T: Task + ?Sized,
    D: DataProcessor + ?Sized,
{
    config.validate()?;

    let place = select_place(config.use_cuda)?;
    let optimizer = optimizer_config_for_strategy(
        &config.strategy,
        None,
        data_processor,
        place.dev_count,
    );
    let data_feeder = DataFeeder::new(feed_list, &place.device);
    let mut exe = Executor::new(place.device);
    exe.minimize(optimizer, LOSS);

    if config.with_memory_optimization {
        log::info!("Memory optimize start");
        exe.memory_optimize(&[LOSS, ACCURACY]);
        log::info!("Memory optimize end");
    }

    // initialize all parameters
    exe.run_startup(task)?;

    let mut summary = FinetuneSummary::default();
    let mut step = 0usize;
    log::info!("Finetune start");
    let mut train_time_begin = Instant::now();

    for epoch in 0..config.num_epoch {
        log::debug!("Epoch {}/{}", epoch + 1, config.num_epoch);

        let train_reader = batch(data_processor.data_generator(Phase::Train)?, config.batch_size);
        let mut aggregate = RunningAggregate::new();

        for batch in train_reader {
            let feed = data_feeder.feed(&batch)?;
            let fetched = exe.run(&*task, Program::Main, &feed, &[LOSS, ACCURACY])?;
            let (loss, accuracy) = (fetched[0], fetched[1]);

            step += 1;
            aggregate.update(loss, accuracy, batch.len());

            if step % config.log_interval == 0 {
                let train_time_used = train_time_begin.elapsed().as_secs_f64();
                train_time_begin = Instant::now();

                let (mean_loss, mean_accuracy) = aggregate.means().ok_or_else(|| {
                    FinetuneError::Data(format!("no examples in logging window at step {}", step))
                })?;
                let record = TrainLog {
                    step,
                    loss: mean_loss,
                    accuracy: mean_accuracy,
                    steps_per_sec: config.log_interval as f64 / train_time_used,
                };

                log::info!(
                    "step {}: loss={:.5} acc={:.5} [step/sec: {:.2}]",
                    record.step,
                    record.loss,
                    record.accuracy,
                    record.steps_per_sec
                );

                summary.train_logs.push(record);
                aggregate.reset();
            }

            if step % config.save_ckpt_interval == 0 {
                let dir = save_persistables(task.parameters(), &config.checkpoint_dir, step, Some(loss))?;
                summary.checkpoints.push(dir);
            }

            if eval_model && step % config.eval_interval == 0 {
                summary.evaluations.push(eval(&*task, data_processor, feed_list, config)?);
            }
        }
    }

    // eval before end
    if eval_model {
        summary.evaluations.push(eval(&*task, data_processor, feed_list, config)?);
    }

    summary.steps = step;
    log::info!("Finetune end");

    Ok(summary)
}

/// Evaluate `task` over one pass of the test phase
///
/// Uses the parameters currently held by the task. Fails with
/// [`FinetuneError::EmptyEvaluation`] when the test phase yields no batches.
pub fn eval<T, D>(
    task: &T,
    data_processor: &D,
    feed_list: &[FeedSlot],
    config: &FinetuneConfig,
) -> crate::Result<EvalMetrics>
where
    T: Task + ?Sized,
    D: DataProcessor + ?Sized,
{
    log::info!("[Evaluation] start");

    let place = select_place(config.use_cuda)?;
    let data_feeder = DataFeeder::new(feed_list, &place.device);
    let mut exe = Executor::new(place.device);

    let mut aggregate = RunningAggregate::new();
    let mut batches = 0usize;
    let test_reader = batch(data_processor.data_generator(Phase::Test)?, config.batch_size);

    let eval_time_begin = Instant::now();
    for batch in test_reader {
        let feed = data_feeder.feed(&batch)?;
        let fetched = exe.run(task, Program::Inference, &feed, &[LOSS, ACCURACY])?;
        aggregate.update(fetched[0], fetched[1], batch.len());
        batches += 1;
    }
    let eval_time_used = eval_time_begin.elapsed().as_secs_f64();

    let (loss, accuracy) = aggregate.means().ok_or(FinetuneError::EmptyEvaluation)?;
    let metrics = EvalMetrics {
        loss,
        accuracy,
        batches,
        examples: aggregate.size(),
        secs_per_batch: eval_time_used / batches as f64,
    };

    log::info!(
        "[Evaluation] loss={:.5} acc={:.5} [sec/batch: {:.2}]",
        metrics.loss,
        metrics.accuracy,
        metrics.secs_per_batch
    );

    Ok(metrics)
}
