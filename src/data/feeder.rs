/// Conversion of example batches into named input tensors
use std::collections::HashMap;

use candle_core::{Device, Tensor};

use super::{Example, Field};
use crate::FinetuneError;

/// Named input tensors for one execution
pub type Feed = HashMap<String, Tensor>;

/// Element type of a feed slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotType {
    Float32,
    Int64,
}

/// One named graph input
///
/// Each example contributes `width` values, so the fed tensor has shape
/// `(batch, width)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSlot {
    pub name: String,
    pub slot_type: SlotType,
    pub width: usize,
}

impl FeedSlot {
    pub fn float(name: impl Into<String>, width: usize) -> Self {
        Self {
            name: name.into(),
            slot_type: SlotType::Float32,
            width,
        }
    }

    pub fn int(name: impl Into<String>, width: usize) -> Self {
        Self {
            name: name.into(),
            slot_type: SlotType::Int64,
            width,
        }
    }
}

/// Builds feeds for a fixed feed list on a fixed device
pub struct DataFeeder {
    feed_list: Vec<FeedSlot>,
    device: Device,
}

impl DataFeeder {
    pub fn new(feed_list: &[FeedSlot], device: &Device) -> Self {
        Self {
            feed_list: feed_list.to_vec(),
            device: device.clone(),
        }
    }

    /// Stack the i-th field of every example into the i-th slot's tensor
    pub fn feed(&self, batch: &[Example]) -> crate::Result<Feed> {
        if batch.is_empty() {
            return Err(FinetuneError::Feed("cannot feed an empty batch".to_string()));
        }

        for (row, example) in batch.iter().enumerate() {
            if example.len() != self.feed_list.len() {
                return Err(FinetuneError::Feed(format!(
                    "example {} has {} fields, feed list expects {}",
                    row,
                    example.len(),
                    self.feed_list.len()
                )));
            }
        }

        let mut feed = HashMap::with_capacity(self.feed_list.len());
        for (index, slot) in self.feed_list.iter().enumerate() {
            let tensor = self.stack_slot(slot, index, batch)?;
            feed.insert(slot.name.clone(), tensor);
        }

        Ok(feed)
    }

    fn stack_slot(&self, slot: &FeedSlot, index: usize, batch: &[Example]) -> crate::Result<Tensor> {
        let shape = (batch.len(), slot.width);

        match slot.slot_type {
            SlotType::Float32 => {
                let mut data = Vec::with_capacity(batch.len() * slot.width);
                for (row, example) in batch.iter().enumerate() {
                    match &example[index] {
                        Field::Float(values) => {
                            check_width(slot, row, values.len())?;
                            data.extend_from_slice(values);
                        }
                        Field::Int(_) => return Err(type_mismatch(slot, row)),
                    }
                }
                Ok(Tensor::from_vec(data, shape, &self.device)?)
            }
            SlotType::Int64 => {
                let mut data = Vec::with_capacity(batch.len() * slot.width);
                for (row, example) in batch.iter().enumerate() {
                    match &example[index] {
                        Field::Int(values) => {
                            check_width(slot, row, values.len())?;
                            data.extend_from_slice(values);
                        }
                        Field::Float(_) => return Err(type_mismatch(slot, row)),
                    }
                }
                Ok(Tensor::from_vec(data, shape, &self.device)?)
            }
        }
    }
}

fn check_width(slot: &FeedSlot, row: usize, len: usize) -> crate::Result<()> {
    if len != slot.width {
        return Err(FinetuneError::Feed(format!(
            "slot `{}`: example {} has {} values, expected {}",
            slot.name, row, len, slot.width
        )));
    }
    Ok(())
}

fn type_mismatch(slot: &FeedSlot, row: usize) -> FinetuneError {
    FinetuneError::Feed(format!(
        "slot `{}`: example {} does not hold {:?} values",
        slot.name, row, slot.slot_type
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;

    fn feeder() -> DataFeeder {
        DataFeeder::new(
            &[FeedSlot::float("features", 2), FeedSlot::int("label", 1)],
            &Device::Cpu,
        )
    }

    #[test]
    fn test_feed_shapes_and_values() -> crate::Result<()> {
        let batch = vec![
            vec![Field::Float(vec![1.0, 2.0]), Field::Int(vec![0])],
            vec![Field::Float(vec![3.0, 4.0]), Field::Int(vec![1])],
            vec![Field::Float(vec![5.0, 6.0]), Field::Int(vec![1])],
        ];

        let feed = feeder().feed(&batch)?;

        let features = &feed["features"];
        assert_eq!(features.dims(), &[3, 2]);
        assert_eq!(features.dtype(), DType::F32);
        assert_eq!(features.to_vec2::<f32>()?[2], vec![5.0, 6.0]);

        let label = &feed["label"];
        assert_eq!(label.dims(), &[3, 1]);
        assert_eq!(label.dtype(), DType::I64);
        assert_eq!(label.flatten_all()?.to_vec1::<i64>()?, vec![0, 1, 1]);

        Ok(())
    }

    #[test]
    fn test_feed_rejects_wrong_arity() {
        let batch = vec![vec![Field::Float(vec![1.0, 2.0])]];
        let err = feeder().feed(&batch).unwrap_err();
        assert!(err.to_string().contains("feed list expects 2"));
    }

    #[test]
    fn test_feed_rejects_wrong_width() {
        let batch = vec![vec![Field::Float(vec![1.0]), Field::Int(vec![0])]];
        let err = feeder().feed(&batch).unwrap_err();
        assert!(err.to_string().contains("`features`"));
    }

    #[test]
    fn test_feed_rejects_wrong_type() {
        let batch = vec![vec![Field::Float(vec![1.0, 2.0]), Field::Float(vec![0.0])]];
        let err = feeder().feed(&batch).unwrap_err();
        assert!(err.to_string().contains("`label`"));
    }
}
