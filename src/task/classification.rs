/// Fully-connected classification head over precomputed features
use std::collections::HashMap;

use candle_core::{DType, Module, Tensor, D};
use candle_nn::{loss, ops, Init, Linear, VarBuilder, VarMap};

use super::{Program, Task, Variables, ACCURACY, LOSS};
use crate::data::{Feed, FeedSlot};
use crate::FinetuneError;

/// Softmax classifier: `features [B, D]` → `logits [B, C]`
///
/// Produces `loss` (mean cross-entropy), `accuracy`, `logits` and `probs`.
pub struct ClassificationTask {
    params: VarMap,
    feature_dim: usize,
    num_classes: usize,
    feature_slot: String,
    label_slot: String,
    weight_init: Init,
    head: Option<Linear>,
}

impl ClassificationTask {
    /// Create a task reading the `features` and `label` slots
    pub fn new(feature_dim: usize, num_classes: usize) -> Self {
        Self {
            params: VarMap::new(),
            feature_dim,
            num_classes,
            feature_slot: "features".to_string(),
            label_slot: "label".to_string(),
            weight_init: candle_nn::init::DEFAULT_KAIMING_NORMAL,
            head: None,
        }
    }

    /// Override the weight initializer (bias always starts at zero)
    pub fn with_weight_init(mut self, init: Init) -> Self {
        self.weight_init = init;
        self
    }

    /// Feed list matching this task's input slots
    pub fn feed_list(&self) -> Vec<FeedSlot> {
        vec![
            FeedSlot::float(self.feature_slot.clone(), self.feature_dim),
            FeedSlot::int(self.label_slot.clone(), 1),
        ]
    }

    fn input<'a>(&self, feed: &'a Feed, name: &str) -> crate::Result<&'a Tensor> {
        feed.get(name)
            .ok_or_else(|| FinetuneError::Task(format!("feed is missing slot `{}`", name)))
    }
}

impl Task for ClassificationTask {
    fn parameters(&self) -> &VarMap {
        &self.params
    }

    fn startup(&mut self, vb: VarBuilder) -> crate::Result<()> {
        if self.feature_dim == 0 || self.num_classes < 2 {
            return Err(FinetuneError::Task(format!(
                "classification head needs feature_dim > 0 and at least 2 classes, got {}x{}",
                self.feature_dim, self.num_classes
            )));
        }

        let vb = vb.pp("cls_out");
        let weight = vb.get_with_hints(
            (self.num_classes, self.feature_dim),
            "weight",
            self.weight_init,
        )?;
        let bias = vb.get_with_hints(self.num_classes, "bias", Init::Const(0.))?;
        self.head = Some(Linear::new(weight, Some(bias)));

        Ok(())
    }

    fn forward(&self, _program: Program, feed: &Feed) -> crate::Result<Variables> {
        let head = self.head.as_ref().ok_or_else(|| {
            FinetuneError::Task("startup must run before the task is executed".to_string())
        })?;

        let features = self.input(feed, &self.feature_slot)?.to_dtype(DType::F32)?;
        let labels = self.input(feed, &self.label_slot)?.flatten_all()?;

        let logits = head.forward(&features)?;
        let probs = ops::softmax(&logits, D::Minus1)?;
        let loss = loss::cross_entropy(&logits, &labels.to_dtype(DType::I64)?)?;

        let predictions = logits.argmax(D::Minus1)?;
        let accuracy = predictions
            .eq(&labels.to_dtype(DType::U32)?)?
            .to_dtype(DType::F32)?
            .mean_all()?;

        let mut vars = HashMap::new();
        vars.insert(LOSS.to_string(), loss);
        vars.insert(ACCURACY.to_string(), accuracy);
        vars.insert("logits".to_string(), logits);
        vars.insert("probs".to_string(), probs);
        Ok(vars)
    }
}
