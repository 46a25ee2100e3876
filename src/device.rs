/// Execution place selection
use candle_core::Device;

/// Environment variable overriding the CPU worker count
pub const CPU_NUM_ENV: &str = "CPU_NUM";

/// Device chosen for a run, plus the number of workers it spans
#[derive(Debug, Clone)]
pub struct Place {
    pub device: Device,
    pub dev_count: usize,
}

/// Select the execution place for a run
///
/// `use_cuda` binds CUDA device 0. Otherwise the CPU is used and the worker
/// count comes from `CPU_NUM`, falling back to the host parallelism.
pub fn select_place(use_cuda: bool) -> crate::Result<Place> {
    if use_cuda {
        let device = Device::new_cuda(0)?;
        log::info!("Using device: {:?}", device);
        // candle binds a single ordinal per device handle
        return Ok(Place {
            device,
            dev_count: 1,
        });
    }

    let dev_count = cpu_worker_count(std::env::var(CPU_NUM_ENV).ok().as_deref())?;
    log::info!("Using device: Cpu ({} workers)", dev_count);

    Ok(Place {
        device: Device::Cpu,
        dev_count,
    })
}

/// Resolve the CPU worker count from an optional `CPU_NUM` value
pub fn cpu_worker_count(override_value: Option<&str>) -> crate::Result<usize> {
    match override_value {
        Some(raw) => raw.trim().parse::<usize>().map_err(|e| {
            crate::FinetuneError::Config(format!(
                "Invalid {} value {:?}: {}",
                CPU_NUM_ENV, raw, e
            ))
        }),
        None => Ok(std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)),
    }
}
