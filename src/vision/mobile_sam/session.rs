// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime session construction shared by the encoder and decoder

use anyhow::{Context, Result};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

/// Where inference runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionDevice {
    /// CUDA when available, CPU otherwise
    #[default]
    Auto,
    Cpu,
    Cuda,
}

impl FromStr for ExecutionDevice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            other => Err(format!(
                "unknown execution device '{}', expected auto, cpu or cuda",
                other
            )),
        }
    }
}

impl fmt::Display for ExecutionDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
        };
        f.write_str(name)
    }
}

fn cpu_session(model_path: &Path, intra_threads: usize) -> Result<Session> {
    Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .context("Failed to set CPU execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(intra_threads)
        .context("Failed to set intra threads")?
        .commit_from_file(model_path)
        .context(format!(
            "Failed to load ONNX model from {}",
            model_path.display()
        ))
}

fn cuda_session(model_path: &Path, intra_threads: usize) -> Result<Session> {
    Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CUDAExecutionProvider::default().build().error_on_failure()])
        .context("Failed to set CUDA execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(intra_threads)
        .context("Failed to set intra threads")?
        .commit_from_file(model_path)
        .context(format!(
            "Failed to load ONNX model from {} with CUDA",
            model_path.display()
        ))
}

/// Build a session for `model_path` on the requested device
///
/// With [`ExecutionDevice::Auto`] CUDA is tried first and the CPU provider
/// is used when CUDA cannot be initialized. Returns the session together
/// with the device it actually runs on.
pub fn build_session(
    model_path: &Path,
    device: ExecutionDevice,
    intra_threads: usize,
) -> Result<(Session, ExecutionDevice)> {
    if !model_path.exists() {
        anyhow::bail!("ONNX model file not found: {}", model_path.display());
    }

    match device {
        ExecutionDevice::Cpu => Ok((cpu_session(model_path, intra_threads)?, ExecutionDevice::Cpu)),
        ExecutionDevice::Cuda => Ok((cuda_session(model_path, intra_threads)?, ExecutionDevice::Cuda)),
        ExecutionDevice::Auto => {
            info!("   Attempting CUDA execution provider...");
            match cuda_session(model_path, intra_threads) {
                Ok(session) => {
                    info!("✅ CUDA execution provider initialized successfully!");
                    Ok((session, ExecutionDevice::Cuda))
                }
                Err(e) => {
                    warn!("⚠️  CUDA execution provider failed: {:#}", e);
                    warn!("   Falling back to CPU execution provider");
                    Ok((cpu_session(model_path, intra_threads)?, ExecutionDevice::Cpu))
                }
            }
        }
    }
}
