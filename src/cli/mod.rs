// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Command line interface for the segmentation server

use clap::Parser;
use std::path::PathBuf;

use crate::config::ServiceConfig;
use crate::vision::mobile_sam::ExecutionDevice;

/// MobileSAM segmentation server
#[derive(Parser, Debug)]
#[command(name = "mobilesam-segmentation")]
#[command(version)]
#[command(about = "HTTP service that overlays MobileSAM masks on uploaded images", long_about = None)]
pub struct Cli {
    /// Address to bind (overrides API_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides API_PORT)
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Path to the ONNX image encoder
    #[arg(long)]
    pub encoder_path: Option<PathBuf>,

    /// Path to the ONNX prompt decoder
    #[arg(long)]
    pub decoder_path: Option<PathBuf>,

    /// Execution device: auto, cpu or cuda
    #[arg(long)]
    pub device: Option<ExecutionDevice>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Apply command line overrides on top of the environment configuration
    pub fn apply(&self, config: &mut ServiceConfig) {
        if let Some(ref host) = self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ref path) = self.encoder_path {
            config.mobile_sam.encoder_path = path.clone();
        }
        if let Some(ref path) = self.decoder_path {
            config.mobile_sam.decoder_path = path.clone();
        }
        if let Some(device) = self.device {
            config.mobile_sam.device = device;
        }
    }
}
