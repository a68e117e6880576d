//! Accelerator platform.

use std::fmt;
use std::str::FromStr;

/// The GPU stack the extensions are built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// NVIDIA CUDA.
    Cuda,
    /// AMD ROCm.
    Rocm,
    /// No accelerator found.
    Cpu,
}

impl Platform {
    /// Package index serving the pinned tensor runtime for this platform.
    pub fn tensor_index_url(&self) -> &'static str {
        match self {
            Platform::Cuda => "https://download.pytorch.org/whl/cu124",
            Platform::Rocm => "https://download.pytorch.org/whl/rocm6.2.4",
            Platform::Cpu => "https://download.pytorch.org/whl/cpu",
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cuda" => Ok(Self::Cuda),
            "rocm" | "hip" => Ok(Self::Rocm),
            "cpu" => Ok(Self::Cpu),
            _ => Err(format!("unknown platform: {}", s)),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Platform::Cuda => "cuda",
            Platform::Rocm => "rocm",
            Platform::Cpu => "cpu",
        };
        write!(f, "{}", s)
    }
}
