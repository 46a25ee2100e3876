/// Fine-tune a classification head, evaluating along the way
///
/// Usage: finetune_classifier [DATASET_DIR] [CONFIG_JSON]
///
/// DATASET_DIR holds train__/test__ inputs.npy and labels.npy. Without it a
/// small synthetic two-class problem is used.
use hub_finetune::data::{DataProcessor, Example, Field, InMemoryProcessor, NumpyProcessor};
use hub_finetune::task::ClassificationTask;
use hub_finetune::{finetune_and_eval, FinetuneConfig};

fn synthetic(n: usize, dim: usize) -> Vec<Example> {
    (0..n)
        .map(|i| {
            let label = (i % 2) as i64;
            let sign = if label == 0 { 1.0 } else { -1.0 };
            let features = (0..dim)
                .map(|j| sign * (1.0 + (i * 7 + j * 3) as f32 % 5.0) / 5.0)
                .collect();
            vec![Field::Float(features), Field::Int(vec![label])]
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let dataset_dir = args.next();
    let config = match args.next() {
        Some(path) => FinetuneConfig::from_file(path)?,
        None => FinetuneConfig {
            num_epoch: 3,
            batch_size: 16,
            log_interval: 5,
            save_ckpt_interval: 20,
            eval_interval: 10,
            checkpoint_dir: "finetune_demo_checkpoint".to_string(),
            ..FinetuneConfig::default()
        },
    };
    log::info!("Configuration: {:#?}", config);

    let (processor, feature_dim, num_classes): (Box<dyn DataProcessor>, usize, usize) =
        match dataset_dir {
            Some(dir) => {
                let processor = NumpyProcessor::from_directory(&dir)?.with_shuffle(42);
                let metadata = processor.metadata().clone();
                anyhow::ensure!(
                    metadata.feature_dim > 0 && metadata.num_classes > 1,
                    "dataset.json must declare feature_dim and num_classes"
                );
                (Box::new(processor), metadata.feature_dim, metadata.num_classes)
            }
            None => {
                let dim = 8;
                let processor = InMemoryProcessor::new(synthetic(256, dim), synthetic(64, dim));
                (Box::new(processor), dim, 2)
            }
        };

    let mut task = ClassificationTask::new(feature_dim, num_classes);
    let feed_list = task.feed_list();

    let summary = finetune_and_eval(&mut task, processor.as_ref(), &feed_list, &config)?;

    log::info!(
        "Finished {} steps, {} checkpoints written",
        summary.steps,
        summary.checkpoints.len()
    );
    if let Some(last) = summary.evaluations.last() {
        log::info!("Final evaluation: loss={:.5} acc={:.5}", last.loss, last.accuracy);
    }

    Ok(())
}
