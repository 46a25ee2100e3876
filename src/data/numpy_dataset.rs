/// NumPy-backed data processor (.npy format)
use std::cell::Cell;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use ndarray_npy::ReadNpyExt;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::{DataProcessor, Field, Phase, Reader};
use crate::FinetuneError;

/// Metadata from dataset.json
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DatasetMetadata {
    #[serde(default)]
    pub num_classes: usize,
    #[serde(default)]
    pub feature_dim: usize,
    #[serde(default)]
    pub description: String,
}

/// Data processor reading `<phase>__inputs.npy` / `<phase>__labels.npy`
///
/// Inputs are `f32` with shape `[N, D]`; labels are `i64` with shape `[N]`
/// or `[N, 1]`. Each example yields `[Field::Float(row), Field::Int([label])]`.
/// Files are read at the start of every pass and rows are produced lazily.
pub struct NumpyProcessor {
    dir: PathBuf,
    metadata: DatasetMetadata,
    shuffle_seed: Option<u64>,
    passes: Cell<u64>,
}

impl NumpyProcessor {
    /// Open a dataset directory
    pub fn from_directory<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let dir = path.as_ref().to_path_buf();

        log::info!("Loading NumPy dataset from: {:?}", dir);

        if !dir.is_dir() {
            return Err(FinetuneError::Data(format!(
                "dataset directory {:?} does not exist",
                dir
            )));
        }

        let metadata_path = dir.join("dataset.json");
        let metadata: DatasetMetadata = if metadata_path.exists() {
            let file = File::open(&metadata_path)?;
            serde_json::from_reader(BufReader::new(file))?
        } else {
            log::warn!("dataset.json not found, using defaults");
            DatasetMetadata::default()
        };

        Ok(Self {
            dir,
            metadata,
            shuffle_seed: None,
            passes: Cell::new(0),
        })
    }

    /// Shuffle the train phase; pass `k` uses `seed + k`
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    fn load(&self, phase: Phase) -> crate::Result<(Array2<f32>, Array1<i64>)> {
        let inputs_path = self.dir.join(format!("{}__inputs.npy", phase));
        let inputs = <Array2<f32> as ReadNpyExt>::read_npy(File::open(&inputs_path)?)
            .map_err(|e| {
                FinetuneError::Data(format!("Failed to read {:?}: {}", inputs_path, e))
            })?;

        let labels_path = self.dir.join(format!("{}__labels.npy", phase));
        let labels = match <Array1<i64> as ReadNpyExt>::read_npy(File::open(&labels_path)?) {
            Ok(labels) => labels,
            Err(_) => {
                let column = <Array2<i64> as ReadNpyExt>::read_npy(File::open(&labels_path)?)
                    .map_err(|e| {
                        FinetuneError::Data(format!("Failed to read {:?}: {}", labels_path, e))
                    })?;
                if column.ncols() != 1 {
                    return Err(FinetuneError::Data(format!(
                        "labels must have shape [N] or [N, 1], got {:?}",
                        column.shape()
                    )));
                }
                column.column(0).to_owned()
            }
        };

        if inputs.nrows() != labels.len() {
            return Err(FinetuneError::Data(format!(
                "Row mismatch: inputs {:?} vs labels {:?}",
                inputs.shape(),
                labels.shape()
            )));
        }

        if self.metadata.feature_dim != 0 && inputs.ncols() != self.metadata.feature_dim {
            return Err(FinetuneError::Data(format!(
                "inputs have {} features, dataset.json declares {}",
                inputs.ncols(),
                self.metadata.feature_dim
            )));
        }

        log::debug!(
            "Loaded {} split: {} examples, {} features",
            phase,
            inputs.nrows(),
            inputs.ncols()
        );

        Ok((inputs, labels))
    }
}

impl DataProcessor for NumpyProcessor {
    fn data_generator(&self, phase: Phase) -> crate::Result<Reader<'_>> {
        let (inputs, labels) = self.load(phase)?;
        let mut order: Vec<usize> = (0..inputs.nrows()).collect();

        if phase == Phase::Train {
            if let Some(seed) = self.shuffle_seed {
                let pass = self.passes.get();
                self.passes.set(pass + 1);
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(pass));
                order.shuffle(&mut rng);
            }
        }

        Ok(Box::new(order.into_iter().map(move |idx| {
            vec![
                Field::Float(inputs.row(idx).to_vec()),
                Field::Int(vec![labels[idx]]),
            ]
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Example;
    use ndarray::array;

    fn write_split(dir: &Path, phase: Phase, inputs: &Array2<f32>, labels: &Array1<i64>) {
        ndarray_npy::write_npy(dir.join(format!("{}__inputs.npy", phase)), inputs).unwrap();
        ndarray_npy::write_npy(dir.join(format!("{}__labels.npy", phase)), labels).unwrap();
    }

    #[test]
    fn test_metadata_deserialization() {
        let json = r#"{
            "num_classes": 2,
            "feature_dim": 4,
            "description": "ChnSentiCorp features"
        }"#;

        let metadata: DatasetMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.num_classes, 2);
        assert_eq!(metadata.feature_dim, 4);
    }

    #[test]
    fn test_reads_rows_in_order() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        write_split(
            dir.path(),
            Phase::Test,
            &array![[1.0f32, 2.0], [3.0, 4.0]],
            &array![0i64, 1],
        );

        let processor = NumpyProcessor::from_directory(dir.path())?;
        let rows: Vec<Example> = processor.data_generator(Phase::Test)?.collect();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0], Field::Float(vec![3.0, 4.0]));
        assert_eq!(rows[1][1], Field::Int(vec![1]));

        Ok(())
    }

    #[test]
    fn test_column_labels_accepted() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        ndarray_npy::write_npy(
            dir.path().join("train__inputs.npy"),
            &array![[0.5f32], [1.5]],
        )
        .unwrap();
        ndarray_npy::write_npy(dir.path().join("train__labels.npy"), &array![[1i64], [0]])
            .unwrap();

        let processor = NumpyProcessor::from_directory(dir.path())?;
        let labels: Vec<Field> = processor
            .data_generator(Phase::Train)?
            .map(|example| example[1].clone())
            .collect();
        assert_eq!(labels, vec![Field::Int(vec![1]), Field::Int(vec![0])]);

        Ok(())
    }

    #[test]
    fn test_row_mismatch_rejected() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        write_split(
            dir.path(),
            Phase::Train,
            &array![[1.0f32], [2.0], [3.0]],
            &array![0i64, 1],
        );

        let processor = NumpyProcessor::from_directory(dir.path())?;
        assert!(processor.data_generator(Phase::Train).is_err());

        Ok(())
    }

    #[test]
    fn test_shuffle_is_seeded() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let inputs = Array2::from_shape_fn((16, 1), |(i, _)| i as f32);
        let labels = Array1::from_shape_fn(16, |i| (i % 2) as i64);
        write_split(dir.path(), Phase::Train, &inputs, &labels);

        let order = |processor: &NumpyProcessor| -> crate::Result<Vec<Example>> {
            Ok(processor.data_generator(Phase::Train)?.collect())
        };

        let a = NumpyProcessor::from_directory(dir.path())?.with_shuffle(7);
        let b = NumpyProcessor::from_directory(dir.path())?.with_shuffle(7);

        let a_first = order(&a)?;
        assert_eq!(a_first, order(&b)?);
        assert_eq!(a_first.len(), 16);

        // A later pass reshuffles but keeps the same multiset of rows
        let mut a_second = order(&a)?;
        let key = |e: &Example| match &e[0] {
            Field::Float(v) => v[0] as i64,
            Field::Int(v) => v[0],
        };
        let mut sorted_first = a_first.clone();
        sorted_first.sort_by_key(key);
        a_second.sort_by_key(key);
        assert_eq!(sorted_first, a_second);

        Ok(())
    }
}
