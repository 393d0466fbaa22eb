// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Container image platform resolution.
//!
//! Bidding on a docker job requires knowing which os/architecture pairs the
//! image was built for. [`ImageInspector`] abstracts where that answer comes
//! from; [`RegistryImageInspector`] asks the image's registry directly.

pub mod reference;
pub mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use reference::ImageReference;
pub use registry::RegistryImageInspector;

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("Invalid image reference: {0}")]
    InvalidReference(String),
    #[error("Image not found: {0}")]
    NotFound(String),
    #[error("Registry returned {status}: {message}")]
    Registry { status: u16, message: String },
    #[error("Registry authentication failed: {0}")]
    Unauthorized(String),
    #[error("Unsupported manifest: {0}")]
    UnsupportedManifest(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// OCI platform descriptor, e.g. `linux/arm64/v8`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub architecture: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl Platform {
    pub fn new(os: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            architecture: architecture.into(),
            variant: None,
        }
    }

    pub fn linux_amd64() -> Self {
        Self::new("linux", "amd64")
    }

    /// Attestation manifests in an index are tagged `unknown/unknown`.
    pub fn is_unknown(&self) -> bool {
        self.os == "unknown" || self.architecture == "unknown"
    }

    /// Variants are compared only when both sides declare one.
    pub fn is_compatible_with(&self, other: &Platform) -> bool {
        if self.os != other.os || self.architecture != other.architecture {
            return false;
        }
        match (&self.variant, &other.variant) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{}/{}/{}", self.os, self.architecture, variant),
            None => write!(f, "{}/{}", self.os, self.architecture),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [os, arch] if !os.is_empty() && !arch.is_empty() => Ok(Self::new(*os, *arch)),
            [os, arch, variant] if !os.is_empty() && !arch.is_empty() => Ok(Self {
                os: os.to_string(),
                architecture: arch.to_string(),
                variant: Some(variant.to_string()),
            }),
            _ => Err(format!("Invalid platform: {}", s)),
        }
    }
}

/// Platforms the local container runtime can execute.
///
/// Non-windows hosts run linux containers (natively or through a VM).
pub fn host_platforms() -> Vec<Platform> {
    let architecture = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "arm" => "arm",
        "riscv64" => "riscv64",
        "s390x" => "s390x",
        other => other,
    };
    let os = match std::env::consts::OS {
        "windows" => "windows",
        _ => "linux",
    };
    vec![Platform::new(os, architecture)]
}

#[async_trait]
pub trait ImageInspector: Send + Sync {
    /// Platforms the image declares. An error means the answer is unknown.
    async fn platforms(&self, image: &str) -> Result<Vec<Platform>, InspectError>;
}

/// Fixed image → platforms table, for devstacks and offline nodes.
#[derive(Debug, Clone, Default)]
pub struct StaticImageInspector {
    images: HashMap<String, Vec<Platform>>,
}

impl StaticImageInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, image: impl Into<String>, platforms: Vec<Platform>) -> Self {
        self.images.insert(image.into(), platforms);
        self
    }
}

#[async_trait]
impl ImageInspector for StaticImageInspector {
    async fn platforms(&self, image: &str) -> Result<Vec<Platform>, InspectError> {
        self.images
            .get(image)
            .cloned()
            .ok_or_else(|| InspectError::NotFound(image.to_string()))
    }
}
