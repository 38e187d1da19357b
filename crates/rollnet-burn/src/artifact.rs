//! Model weights on disk plus a TOML sidecar describing their shape.

use crate::error::{Error, Result};
use crate::network::{NetworkConfig, SequenceNetwork};
use burn::module::Module;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const WEIGHTS_EXTENSION: &str = "mpk";
pub const METADATA_EXTENSION: &str = "toml";

/// Contents of the sidecar written next to the weights.
///
/// ```toml
/// name = "gru"
/// [network]
/// lookback = 96
/// num_pitches = 60
/// loss = "binary_crossentropy"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub name: String,
    pub network: NetworkConfig,
}

/// `<dir>/<name>.mpk` and `<dir>/<name>.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifact {
    base: PathBuf,
}

impl ModelArtifact {
    pub fn new(model_dir: impl AsRef<Path>, name: &str) -> Self {
        Self {
            base: model_dir.as_ref().join(name),
        }
    }

    /// From either file of the pair, or the shared stem path.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let base = match path.extension().and_then(|e| e.to_str()) {
            Some(WEIGHTS_EXTENSION) | Some(METADATA_EXTENSION) => path.with_extension(""),
            _ => path.to_path_buf(),
        };
        Self { base }
    }

    pub fn name(&self) -> String {
        self.base
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn weights_path(&self) -> PathBuf {
        self.with_suffix(WEIGHTS_EXTENSION)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.with_suffix(METADATA_EXTENSION)
    }

    // with_extension would eat a dotted model name like "gru.v2"
    fn with_suffix(&self, ext: &str) -> PathBuf {
        let mut path = self.base.clone().into_os_string();
        path.push(".");
        path.push(ext);
        PathBuf::from(path)
    }

    pub fn exists(&self) -> bool {
        self.weights_path().exists() && self.metadata_path().exists()
    }

    /// Write both files, replacing any previous pair.
    pub fn save<B: Backend>(
        &self,
        network: &SequenceNetwork<B>,
        config: &NetworkConfig,
    ) -> Result<PathBuf> {
        if let Some(parent) = self.base.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        if self.exists() {
            tracing::warn!("Overwriting model at {}", self.weights_path().display());
        }

        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let weights = self.weights_path();
        network.clone().save_file(weights.clone(), &recorder)?;

        let metadata = ArtifactMetadata {
            name: self.name(),
            network: config.clone(),
        };
        std::fs::write(self.metadata_path(), toml::to_string(&metadata)?)?;

        tracing::info!("Saved model to {}", weights.display());
        Ok(weights)
    }

    pub fn load_metadata(&self) -> Result<ArtifactMetadata> {
        let path = self.metadata_path();
        if !path.exists() {
            return Err(Error::ModelLoad(format!(
                "missing model metadata {}",
                path.display()
            )));
        }
        let metadata: ArtifactMetadata = toml::from_str(&std::fs::read_to_string(&path)?)?;
        metadata.network.validate()?;
        Ok(metadata)
    }

    /// Rebuild the topology from the sidecar and load the weights into it.
    pub fn load<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<(SequenceNetwork<B>, NetworkConfig)> {
        let metadata = self.load_metadata()?;
        let weights = self.weights_path();
        if !weights.exists() {
            return Err(Error::ModelLoad(format!(
                "missing model weights {}",
                weights.display()
            )));
        }

        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let network = metadata
            .network
            .init::<B>(device)?
            .load_file(weights, &recorder, device)
            .map_err(|e| Error::ModelLoad(format!("{e:?}")))?;

        tracing::info!(
            "Loaded model \"{}\" (lookback {}, {} pitches)",
            metadata.name,
            metadata.network.lookback,
            metadata.network.num_pitches
        );
        Ok((network, metadata.network))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;
    use burn::prelude::*;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_paths() {
        let artifact = ModelArtifact::new("models", "gru.v2");
        assert_eq!(artifact.weights_path(), PathBuf::from("models/gru.v2.mpk"));
        assert_eq!(artifact.metadata_path(), PathBuf::from("models/gru.v2.toml"));
        assert_eq!(artifact.name(), "gru.v2");

        assert_eq!(ModelArtifact::from_path("models/gru.v2.mpk"), artifact);
        assert_eq!(ModelArtifact::from_path("models/gru.v2.toml"), artifact);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let device = NdArrayDevice::default();
        let config = NetworkConfig::new(4, 6).with_loss(crate::LossKind::MeanAbsoluteError);
        let network = config.init::<TestBackend>(&device).unwrap();
        let artifact = ModelArtifact::new(dir.path().join("nested"), "tiny");

        let weights = artifact.save(&network, &config).unwrap();
        assert!(weights.exists());
        assert!(artifact.exists());

        let (loaded, loaded_config) = artifact.load::<TestBackend>(&device).unwrap();
        assert_eq!(loaded_config, config);

        let input = Tensor::<TestBackend, 3>::ones([1, 4, 6], &device);
        let expected = network.forward(input.clone()).into_data().to_vec::<f32>().unwrap();
        let actual = loaded.forward(input).into_data().to_vec::<f32>().unwrap();
        for (a, b) in expected.iter().zip(&actual) {
            approx::assert_relative_eq!(*a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = ModelArtifact::new(dir.path(), "absent");
        assert!(matches!(
            artifact.load::<TestBackend>(&NdArrayDevice::default()),
            Err(Error::ModelLoad(_))
        ));
    }
}
