/// Optimizer configuration per training strategy
use candle_core::Var;
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarMap};

use crate::data::DataProcessor;

/// Adam optimizer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AdamConfig {
    /// Learning rate
    pub learning_rate: f64,
    /// Coefficient for computing running averages of gradient (beta1)
    pub beta1: f64,
    /// Coefficient for computing running averages of squared gradient (beta2)
    pub beta2: f64,
    /// Term added to denominator for numerical stability
    pub eps: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
        }
    }
}

impl AdamConfig {
    /// Instantiate the optimizer over `vars`
    ///
    /// Plain Adam: candle's AdamW with weight decay disabled.
    pub fn build(&self, vars: Vec<Var>) -> candle_core::Result<AdamW> {
        AdamW::new(
            vars,
            ParamsAdamW {
                lr: self.learning_rate,
                beta1: self.beta1,
                beta2: self.beta2,
                eps: self.eps,
                weight_decay: 0.0,
            },
        )
    }
}

/// L2 weight-decay regularizer settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct L2DecayRegularizer {
    pub regularization_coeff: f64,
}

/// Build the optimizer for a fine-tuning strategy
///
/// Every strategy currently gets Adam with a fixed learning rate of 1e-4;
/// `FinetuneConfig::learning_rate` is not consulted. The L2 regularizer is
/// built but not attached to the optimizer or to any parameter.
pub fn optimizer_config_for_strategy<D: DataProcessor + ?Sized>(
    strategy: &str,
    _parameters: Option<&VarMap>,
    _data_processor: &D,
    dev_count: usize,
) -> AdamConfig {
    let learning_rate = 1e-4;
    let optimizer = AdamConfig {
        learning_rate,
        ..AdamConfig::default()
    };
    let regularizer = L2DecayRegularizer {
        regularization_coeff: 1e-4,
    };

    log::debug!(
        "strategy={} dev_count={} optimizer={:?} regularizer={:?} (not attached)",
        strategy,
        dev_count,
        optimizer,
        regularizer
    );

    optimizer
}
