/// Step-numbered parameter checkpoints (safetensors)
use std::path::{Path, PathBuf};

use candle_nn::VarMap;

use crate::FinetuneError;

/// Directory name prefix; the step number follows directly
pub const CHECKPOINT_PREFIX: &str = "model_parameters_in_step";
/// Parameter file inside a checkpoint directory
pub const PARAMETERS_FILE: &str = "persistables.safetensors";
/// Metadata file inside a checkpoint directory
pub const METADATA_FILE: &str = "checkpoint.json";

/// Checkpoint metadata
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CheckpointMetadata {
    /// Training step
    pub step: usize,
    /// Loss of the batch that completed this step
    pub loss: Option<f64>,
    /// Names of the saved parameters, sorted
    pub parameters: Vec<String>,
}

/// Directory of the checkpoint for `step` under `root`
pub fn checkpoint_dir<P: AsRef<Path>>(root: P, step: usize) -> PathBuf {
    root.as_ref().join(format!("{}{}", CHECKPOINT_PREFIX, step))
}

/// Snapshot of a task's parameters
pub struct Checkpoint<'a> {
    params: &'a VarMap,
    metadata: CheckpointMetadata,
}

impl<'a> Checkpoint<'a> {
    pub fn new(params: &'a VarMap, step: usize, loss: Option<f64>) -> crate::Result<Self> {
        let mut parameters: Vec<String> = params
            .data()
            .lock()
            .map_err(|e| FinetuneError::Task(format!("parameter set is poisoned: {}", e)))?
            .keys()
            .cloned()
            .collect();
        parameters.sort();

        Ok(Self {
            params,
            metadata: CheckpointMetadata {
                step,
                loss,
                parameters,
            },
        })
    }

    pub fn metadata(&self) -> &CheckpointMetadata {
        &self.metadata
    }

    /// Write `<root>/model_parameters_in_step<N>/` and return its path
    pub fn save<P: AsRef<Path>>(&self, root: P) -> crate::Result<PathBuf> {
        let dir = checkpoint_dir(root, self.metadata.step);
        std::fs::create_dir_all(&dir)?;

        self.params.save(dir.join(PARAMETERS_FILE))?;

        let metadata_json = serde_json::to_string_pretty(&self.metadata)?;
        std::fs::write(dir.join(METADATA_FILE), metadata_json.as_bytes())?;

        log::debug!(
            "Saved {} parameters to {:?}",
            self.metadata.parameters.len(),
            dir
        );

        Ok(dir)
    }
}

/// Save all parameters of `params` as the checkpoint for `step`
pub fn save_persistables<P: AsRef<Path>>(
    params: &VarMap,
    root: P,
    step: usize,
    loss: Option<f64>,
) -> crate::Result<PathBuf> {
    Checkpoint::new(params, step, loss)?.save(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::{Init, VarBuilder};

    fn params() -> crate::Result<VarMap> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        vb.pp("cls_out").get_with_hints((2, 3), "weight", Init::Const(0.5))?;
        vb.pp("cls_out").get_with_hints(2, "bias", Init::Const(0.))?;
        Ok(varmap)
    }

    #[test]
    fn test_checkpoint_dir_name() {
        let dir = checkpoint_dir("ckpt", 42);
        assert_eq!(dir, Path::new("ckpt").join("model_parameters_in_step42"));
    }

    #[test]
    fn test_checkpoint_metadata() -> crate::Result<()> {
        let varmap = params()?;
        let checkpoint = Checkpoint::new(&varmap, 1000, Some(0.5))?;

        assert_eq!(checkpoint.metadata().step, 1000);
        assert_eq!(
            checkpoint.metadata().parameters,
            vec!["cls_out.bias".to_string(), "cls_out.weight".to_string()]
        );

        Ok(())
    }

    #[test]
    fn test_save_layout() -> crate::Result<()> {
        let root = tempfile::tempdir()?;
        let varmap = params()?;

        let dir = save_persistables(&varmap, root.path(), 7, Some(0.25))?;
        assert_eq!(dir, root.path().join("model_parameters_in_step7"));

        let bytes = std::fs::read(dir.join(PARAMETERS_FILE))?;
        let tensors = safetensors::SafeTensors::deserialize(&bytes).unwrap();
        let weight = tensors.tensor("cls_out.weight").unwrap();
        assert_eq!(weight.shape(), &[2, 3]);
        assert!(tensors.tensor("cls_out.bias").is_ok());

        let metadata: CheckpointMetadata =
            serde_json::from_slice(&std::fs::read(dir.join(METADATA_FILE))?)?;
        assert_eq!(metadata.step, 7);
        assert_eq!(metadata.loss, Some(0.25));

        Ok(())
    }

    #[test]
    fn test_poisoned_parameter_set_is_reported() -> crate::Result<()> {
        let root = tempfile::tempdir()?;
        let varmap = params()?;

        let shared = varmap.clone();
        let _ = std::thread::spawn(move || {
            let _guard = shared.data().lock().unwrap();
            panic!("writer died while holding the parameter lock");
        })
        .join();

        let err = save_persistables(&varmap, root.path(), 3, None).unwrap_err();
        assert!(matches!(err, FinetuneError::Task(_)));
        assert!(!checkpoint_dir(root.path(), 3).exists());

        Ok(())
    }
}
