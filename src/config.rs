/// Run configuration for a fine-tuning job
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Configuration for a fine-tuning run
///
/// Supplied once by the caller and only read by the training and
/// evaluation loops. Fields missing from a JSON file take the defaults
/// below.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FinetuneConfig {
    /// Number of passes over the training data
    pub num_epoch: usize,

    /// Examples per batch
    pub batch_size: usize,

    /// Requested learning rate. The optimizer configurator currently uses
    /// its own fixed rate and does not read this value.
    pub learning_rate: f64,

    /// Run on CUDA device 0 instead of the CPU
    pub use_cuda: bool,

    /// Training strategy identifier
    pub strategy: String,

    /// Release every task variable except `loss` and `accuracy` after each run
    pub with_memory_optimization: bool,

    /// Root directory for step-numbered checkpoints
    pub checkpoint_dir: String,

    /// Log running metrics every N steps
    pub log_interval: usize,

    /// Save parameters every N steps
    pub save_ckpt_interval: usize,

    /// Evaluate every N steps (only when evaluation is enabled)
    pub eval_interval: usize,
}

impl Default for FinetuneConfig {
    fn default() -> Self {
        Self {
            num_epoch: 10,
            batch_size: 32,
            learning_rate: 1e-4,
            use_cuda: false,
            strategy: "default".to_string(),
            with_memory_optimization: false,
            checkpoint_dir: "finetune_checkpoint".to_string(),
            log_interval: 10,
            save_ckpt_interval: 1000,
            eval_interval: 100,
        }
    }
}

impl FinetuneConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let file = File::open(path.as_ref())?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.batch_size == 0 {
            return Err(crate::FinetuneError::Config(
                "batch_size must be > 0".to_string(),
            ));
        }

        for (name, value) in [
            ("log_interval", self.log_interval),
            ("save_ckpt_interval", self.save_ckpt_interval),
            ("eval_interval", self.eval_interval),
        ] {
            if value == 0 {
                return Err(crate::FinetuneError::Config(format!(
                    "{} must be > 0",
                    name
                )));
            }
        }

        if self.checkpoint_dir.is_empty() {
            return Err(crate::FinetuneError::Config(
                "checkpoint_dir must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(FinetuneConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = FinetuneConfig {
            save_ckpt_interval: 0,
            ..FinetuneConfig::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("save_ckpt_interval"));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = FinetuneConfig {
            batch_size: 0,
            ..FinetuneConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "num_epoch": 3,
            "batch_size": 16,
            "use_cuda": false,
            "checkpoint_dir": "ckpt"
        }"#;

        let config: FinetuneConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.num_epoch, 3);
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.checkpoint_dir, "ckpt");
        assert_eq!(config.log_interval, FinetuneConfig::default().log_interval);
        assert_eq!(config.strategy, "default");
    }

    #[test]
    fn test_from_file() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("finetune.json");
        let config = FinetuneConfig {
            num_epoch: 2,
            with_memory_optimization: true,
            ..FinetuneConfig::default()
        };
        std::fs::write(&path, serde_json::to_string_pretty(&config)?)?;

        let loaded = FinetuneConfig::from_file(&path)?;
        assert_eq!(loaded, config);

        Ok(())
    }
}
