/// Runs task programs on a device and applies the bound optimizer
use std::collections::HashSet;

use candle_core::{DType, Device, Tensor};
use candle_nn::{AdamW, Optimizer, VarBuilder};

use crate::data::Feed;
use crate::task::{Program, Task};
use crate::training::optimizer::AdamConfig;
use crate::FinetuneError;

/// Executes startup, main and inference programs of a [`Task`]
///
/// `minimize` binds an optimizer to a loss variable; the optimizer itself is
/// created by `run_startup` once the parameters exist, and every main-program
/// run then performs one backward step on that variable.
pub struct Executor {
    device: Device,
    minimize: Option<(AdamConfig, String)>,
    optimizer: Option<AdamW>,
    preserved: Option<HashSet<String>>,
}

impl Executor {
    pub fn new(device: Device) -> Self {
        Self {
            device,
            minimize: None,
            optimizer: None,
            preserved: None,
        }
    }

    /// Bind `config` to minimize the variable named `loss`
    pub fn minimize(&mut self, config: AdamConfig, loss: &str) {
        self.minimize = Some((config, loss.to_string()));
        self.optimizer = None;
    }

    /// Release every variable outside `skip_opt_set` as soon as a run finishes
    ///
    /// Fetching a released variable fails with
    /// [`FinetuneError::VariableElided`].
    pub fn memory_optimize(&mut self, skip_opt_set: &[&str]) {
        self.preserved = Some(skip_opt_set.iter().map(|name| name.to_string()).collect());
    }

    /// Initialize the task parameters, then instantiate the bound optimizer
    ///
    /// Parameters left over from an earlier run are discarded first, so every
    /// startup begins from the task's initializers.
    pub fn run_startup<T: Task + ?Sized>(&mut self, task: &mut T) -> crate::Result<()> {
        let varmap = task.parameters().clone();
        varmap
            .data()
            .lock()
            .map_err(|e| FinetuneError::Task(format!("parameter set is poisoned: {}", e)))?
            .clear();

        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &self.device);
        task.startup(vb)?;

        if let Some((config, loss)) = &self.minimize {
            let vars = varmap.all_vars();
            log::debug!("Binding optimizer to `{}` over {} parameters", loss, vars.len());
            self.optimizer = Some(config.build(vars)?);
        }

        Ok(())
    }

    /// Run one program and return the fetched variables as scalars
    ///
    /// Values are read from the forward pass, before the optimizer step.
    /// Non-scalar variables are reduced with their mean.
    pub fn run<T: Task + ?Sized>(
        &mut self,
        task: &T,
        program: Program,
        feed: &Feed,
        fetch_list: &[&str],
    ) -> crate::Result<Vec<f64>> {
        if program == Program::Main && self.minimize.is_some() && self.optimizer.is_none() {
            return Err(FinetuneError::Task(
                "run_startup must precede the main program".to_string(),
            ));
        }

        let mut vars = task.forward(program, feed)?;

        // fetches are checked before the step so a rejected run leaves parameters untouched
        for name in fetch_list {
            if !vars.contains_key(*name) {
                return Err(FinetuneError::UnknownVariable(name.to_string()));
            }
            if let Some(preserved) = &self.preserved {
                if !preserved.contains(*name) {
                    return Err(FinetuneError::VariableElided(name.to_string()));
                }
            }
        }

        if program == Program::Main {
            if let (Some(optimizer), Some((_, loss))) = (self.optimizer.as_mut(), self.minimize.as_ref()) {
                let loss = vars
                    .get(loss)
                    .ok_or_else(|| FinetuneError::UnknownVariable(loss.clone()))?;
                optimizer.backward_step(loss)?;
            }
        }

        if let Some(preserved) = &self.preserved {
            vars.retain(|name, _| preserved.contains(name));
        }

        fetch_list
            .iter()
            .map(|name| scalar(&vars[*name]))
            .collect()
    }
}

fn scalar(tensor: &Tensor) -> crate::Result<f64> {
    Ok(tensor
        .to_dtype(DType::F64)?
        .mean_all()?
        .to_scalar::<f64>()?)
}
