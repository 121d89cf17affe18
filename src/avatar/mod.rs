//! Avatar packaging and pre-upload validation
//!
//! The engine-side exporter writes an [`AvatarManifest`] next to the built
//! asset bundle and thumbnail. [`ManifestPackager`] checks the rig facts it
//! records and the artifacts it points at before anything is uploaded.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::error::{AvatarError, Result};

/// First bytes of every PNG file
const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Bones that can anchor the chest camera. One of them must exist.
const CHEST_BONES: [&str; 3] = ["UpperChest", "Chest", "Spine"];

/// Largest allowed ratio between any bounds axis and the avatar height
const MAX_BOUNDS_RATIO: f64 = 4.0;

/// Rig animation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationType {
    Humanoid,
    Generic,
}

/// Size of the avatar's render bounds, in meters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Export manifest describing a built avatar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarManifest {
    pub name: String,
    pub animation_type: AnimationType,
    /// Humanoid bone names present on the rig
    #[serde(default)]
    pub bones: Vec<String>,
    pub height: f64,
    pub bounds: Bounds,
    /// Asset bundle path, relative to the manifest
    pub bundle: PathBuf,
    /// PNG thumbnail path, relative to the manifest
    pub thumbnail: PathBuf,
    /// Objects that had components with missing scripts
    #[serde(default)]
    pub missing_components: Vec<String>,
    #[serde(default)]
    pub has_particle_system: bool,
}

impl AvatarManifest {
    /// Read a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AvatarError::BuildFailed(format!("cannot read manifest {}: {}", path.display(), e))
        })?;
        let manifest = serde_json::from_str(&contents).map_err(|e| {
            AvatarError::BuildFailed(format!("invalid manifest {}: {}", path.display(), e))
        })?;
        Ok(manifest)
    }

    /// Problems that make the avatar unusable
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.animation_type != AnimationType::Humanoid {
            problems.push("rig is not humanoid".to_string());
        }
        if !CHEST_BONES
            .iter()
            .any(|bone| self.bones.iter().any(|b| b == bone))
        {
            problems.push(format!(
                "cannot find a chest bone ({}); the model must be humanoid compatible",
                CHEST_BONES.join(", ")
            ));
        }
        if self.height.is_nan() || self.height <= 0.0 {
            problems.push(format!("height must be positive, got {}", self.height));
        } else {
            let limit = self.height * MAX_BOUNDS_RATIO;
            for (axis, size) in [("x", self.bounds.x), ("y", self.bounds.y), ("z", self.bounds.z)] {
                if size > limit {
                    problems.push(format!(
                        "bounds {} is {:.2}, more than {} times the height {:.2}",
                        axis, size, MAX_BOUNDS_RATIO, self.height
                    ));
                }
            }
        }

        problems
    }

    /// Issues worth reporting that do not block the upload
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.has_particle_system {
            warnings.push("particle systems are removed from uploaded avatars".to_string());
        }
        for object in &self.missing_components {
            warnings.push(format!("{} has a component with a missing script", object));
        }
        warnings
    }
}

/// A packaged avatar ready to upload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackagedAvatar {
    pub name: String,
    pub model_path: PathBuf,
    pub thumbnail_path: PathBuf,
    pub model_size: u64,
    /// Lowercase hex SHA-256 of the asset bundle
    pub model_sha256: String,
    pub warnings: Vec<String>,
}

/// Produces the files to upload
#[async_trait]
pub trait AvatarPackager: Send + Sync {
    async fn package(&self) -> Result<PackagedAvatar>;
}

/// Packager backed by an exported manifest
#[derive(Debug, Clone)]
pub struct ManifestPackager {
    manifest_path: PathBuf,
}

impl ManifestPackager {
    pub fn new(manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match self.manifest_path.parent() {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl AvatarPackager for ManifestPackager {
    async fn package(&self) -> Result<PackagedAvatar> {
        let manifest = AvatarManifest::load(&self.manifest_path)?;

        let problems = manifest.problems();
        if !problems.is_empty() {
            return Err(AvatarError::ValidationFailed(problems).into());
        }
        let warnings = manifest.warnings();
        for warning in &warnings {
            log::warn!("{}: {}", manifest.name, warning);
        }

        let model_path = self.resolve(&manifest.bundle);
        let thumbnail_path = self.resolve(&manifest.thumbnail);

        let (model_size, model_sha256) = digest_file(&model_path, "asset bundle").await?;
        check_png(&thumbnail_path).await?;

        log::debug!(
            "Packaged {} ({} bytes, sha256 {})",
            model_path.display(),
            model_size,
            model_sha256
        );

        Ok(PackagedAvatar {
            name: manifest.name,
            model_path,
            thumbnail_path,
            model_size,
            model_sha256,
            warnings,
        })
    }
}

/// An avatar packaged earlier is uploaded as is
#[async_trait]
impl AvatarPackager for PackagedAvatar {
    async fn package(&self) -> Result<PackagedAvatar> {
        Ok(self.clone())
    }
}

async fn open_non_empty(path: &Path, what: &str) -> Result<(tokio::fs::File, u64)> {
    let file = tokio::fs::File::open(path).await.map_err(|e| {
        AvatarError::BuildFailed(format!("cannot open {} {}: {}", what, path.display(), e))
    })?;
    let len = file.metadata().await?.len();
    if len == 0 {
        return Err(AvatarError::BuildFailed(format!("{} {} is empty", what, path.display())).into());
    }
    Ok((file, len))
}

/// Size and SHA-256 of a non-empty file
async fn digest_file(path: &Path, what: &str) -> Result<(u64, String)> {
    let (mut file, len) = open_non_empty(path, what).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok((len, format!("{:x}", hasher.finalize())))
}

async fn check_png(path: &Path) -> Result<()> {
    let (mut file, _) = open_non_empty(path, "thumbnail").await?;
    let mut signature = [0u8; 8];
    let is_png = match file.read_exact(&mut signature).await {
        Ok(_) => signature == PNG_SIGNATURE,
        Err(_) => false,
    };
    if !is_png {
        return Err(
            AvatarError::BuildFailed(format!("thumbnail {} is not a PNG", path.display())).into(),
        );
    }
    Ok(())
}
