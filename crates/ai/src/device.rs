use anyhow::bail;
use candle_core::{Device, DeviceLocation};
use std::str::FromStr;
use tracing::{info, warn};

/// Which compute device the model session should be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// Fastest available: cuda, then metal, then cpu.
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

impl FromStr for DevicePreference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            "metal" | "mps" => Ok(Self::Metal),
            other => bail!("unknown device '{}', expected one of auto, cpu, cuda, metal", other),
        }
    }
}

/// Resolve a preference into a concrete device.
///
/// `Auto` never fails, it falls back to the cpu. Asking explicitly for an
/// accelerator that is not compiled in or cannot be opened is an error.
pub fn select_device(preference: DevicePreference) -> anyhow::Result<Device> {
    let device = match preference {
        DevicePreference::Cpu => Device::Cpu,
        DevicePreference::Cuda => {
            if !candle_core::utils::cuda_is_available() {
                bail!("cuda device requested but this build has no cuda support");
            }
            Device::new_cuda(0)?
        }
        DevicePreference::Metal => {
            if !candle_core::utils::metal_is_available() {
                bail!("metal device requested but this build has no metal support");
            }
            Device::new_metal(0)?
        }
        DevicePreference::Auto => auto_device(),
    };

    info!("model session bound to {}", device_label(&device));

    Ok(device)
}

fn auto_device() -> Device {
    if candle_core::utils::cuda_is_available() {
        match Device::new_cuda(0) {
            Ok(v) => return v,
            Err(e) => warn!("failed to init cuda device, trying next: {}", e),
        }
    }
    if candle_core::utils::metal_is_available() {
        match Device::new_metal(0) {
            Ok(v) => return v,
            Err(e) => warn!("failed to init metal device, trying next: {}", e),
        }
    }
    Device::Cpu
}

/// Short human readable name, e.g. `cpu` or `cuda:0`.
pub fn device_label(device: &Device) -> String {
    match device.location() {
        DeviceLocation::Cpu => "cpu".to_string(),
        DeviceLocation::Cuda { gpu_id } => format!("cuda:{}", gpu_id),
        DeviceLocation::Metal { gpu_id } => format!("metal:{}", gpu_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preference() {
        assert_eq!("auto".parse::<DevicePreference>().unwrap(), DevicePreference::Auto);
        assert_eq!("".parse::<DevicePreference>().unwrap(), DevicePreference::Auto);
        assert_eq!(" CPU ".parse::<DevicePreference>().unwrap(), DevicePreference::Cpu);
        assert_eq!("cuda".parse::<DevicePreference>().unwrap(), DevicePreference::Cuda);
        assert_eq!("mps".parse::<DevicePreference>().unwrap(), DevicePreference::Metal);
        assert!("tpu".parse::<DevicePreference>().is_err());
    }

    #[test]
    fn test_cpu_is_always_available() {
        let device = select_device(DevicePreference::Cpu).unwrap();
        assert!(device.is_cpu());
        assert_eq!(device_label(&device), "cpu");
    }

    #[test]
    fn test_auto_never_fails() {
        let first = select_device(DevicePreference::Auto).unwrap();
        let second = select_device(DevicePreference::Auto).unwrap();
        assert_eq!(first.location(), second.location());
    }
}
