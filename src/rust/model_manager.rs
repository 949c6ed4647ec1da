use sha2::{Digest, Sha256};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::BuiltinModel;

const CACHE_ENV: &str = "PERSONA_CACHE";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model not downloaded: {0}")]
    NotDownloaded(String),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Model verification failed")]
    VerificationFailed,
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
}

/// Downloads, verifies and locates pretrained encoder files.
///
/// Downloads through one manager (and its clones) are serialized.
#[derive(Clone, Debug)]
pub struct ModelManager {
    models_dir: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

impl ModelManager {
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_models_dir())
    }

    /// `$PERSONA_CACHE/models`, else the platform cache dir, else
    /// `~/.cache`, else the system temp dir.
    pub fn get_default_models_dir() -> PathBuf {
        if let Ok(path) = env::var(CACHE_ENV) {
            return PathBuf::from(path).join("models");
        }

        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("persona").join("models");
        }

        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("persona").join("models");
        }

        env::temp_dir().join("persona").join("models")
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;
        Ok(Self {
            models_dir,
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn get_model_path(&self, model: BuiltinModel) -> PathBuf {
        let info = model.get_model_info();
        self.models_dir.join(info.name).join("model.onnx")
    }

    pub fn get_tokenizer_path(&self, model: BuiltinModel) -> PathBuf {
        let info = model.get_model_info();
        self.models_dir.join(info.name).join("tokenizer.json")
    }

    pub fn is_model_downloaded(&self, model: BuiltinModel) -> bool {
        let model_path = self.get_model_path(model);
        let tokenizer_path = self.get_tokenizer_path(model);
        log::debug!(
            "Model path: {:?} (exists: {}), tokenizer path: {:?} (exists: {})",
            model_path,
            model_path.exists(),
            tokenizer_path,
            tokenizer_path.exists()
        );
        model_path.exists() && tokenizer_path.exists()
    }

    pub async fn download_model(&self, model: BuiltinModel) -> Result<(), ModelError> {
        let info = model.get_model_info();
        let _lock = self.download_lock.lock().await;

        fs::create_dir_all(self.models_dir.join(&info.name))?;

        let model_result = self
            .ensure_file(&info.model_url, &self.get_model_path(model), &info.model_hash, "model")
            .await;
        let tokenizer_result = match model_result {
            Ok(()) => {
                self.ensure_file(
                    &info.tokenizer_url,
                    &self.get_tokenizer_path(model),
                    &info.tokenizer_hash,
                    "tokenizer",
                )
                .await
            }
            Err(e) => Err(e),
        };

        match tokenizer_result {
            Ok(()) => {
                log::info!("Model {} ready in {:?}", info.name, self.models_dir);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to set up model {}: {}", info.name, e);
                let _ = self.remove_download(model);
                Err(e)
            }
        }
    }

    async fn ensure_file(&self, url: &str, path: &Path, expected_hash: &str, file_type: &str) -> Result<(), ModelError> {
        if path.exists() {
            if self.verify_file(path, expected_hash)? {
                log::info!("Existing {} file verified", file_type);
                return Ok(());
            }
            log::warn!("{} file at {:?} failed verification, redownloading", file_type, path);
        }
        self.download_and_verify_file(url, path, expected_hash, file_type).await
    }

    fn verify_file(&self, path: &Path, expected_hash: &str) -> Result<bool, ModelError> {
        let bytes = fs::read(path)?;
        let hash = format!("{:x}", Sha256::digest(&bytes));
        log::debug!("{:?}: {} bytes, sha256 {}", path, bytes.len(), hash);
        Ok(hash == expected_hash)
    }

    pub fn verify_model(&self, model: BuiltinModel) -> Result<bool, ModelError> {
        let info = model.get_model_info();
        let model_path = self.get_model_path(model);
        let tokenizer_path = self.get_tokenizer_path(model);

        if !model_path.exists() || !tokenizer_path.exists() {
            return Ok(false);
        }

        let model_ok = self.verify_file(&model_path, &info.model_hash)?;
        let tokenizer_ok = self.verify_file(&tokenizer_path, &info.tokenizer_hash)?;
        log::info!(
            "Verification of {}: model {}, tokenizer {}",
            info.name,
            model_ok,
            tokenizer_ok
        );
        Ok(model_ok && tokenizer_ok)
    }

    async fn download_and_verify_file(
        &self,
        url: &str,
        path: &Path,
        expected_hash: &str,
        file_type: &str,
    ) -> Result<(), ModelError> {
        log::info!("Downloading {} file from {}", file_type, url);
        let response = reqwest::get(url).await?.error_for_status()?;
        let bytes = response.bytes().await?;

        let hash = format!("{:x}", Sha256::digest(&bytes));
        if hash != expected_hash {
            log::error!("{} hash mismatch: expected {}, got {}", file_type, expected_hash, hash);
            return Err(ModelError::HashMismatch {
                file_type: file_type.to_string(),
                expected: expected_hash.to_string(),
                actual: hash,
            });
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let partial = path.with_extension("partial");
        fs::write(&partial, &bytes)?;
        fs::rename(&partial, path)?;

        if !self.verify_file(path, expected_hash)? {
            return Err(ModelError::VerificationFailed);
        }
        log::info!("{} file downloaded and verified ({} bytes)", file_type, bytes.len());
        Ok(())
    }

    pub fn remove_download(&self, model: BuiltinModel) -> Result<(), ModelError> {
        for path in [self.get_model_path(model), self.get_tokenizer_path(model)] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Downloads `model` if absent and re-downloads it if verification fails.
    pub async fn ensure_model_downloaded(&self, model: BuiltinModel) -> Result<(), ModelError> {
        if !self.is_model_downloaded(model) {
            log::info!("Model {:?} not found, downloading", model);
            return self.download_model(model).await;
        }
        if !self.verify_model(model)? {
            log::info!("Model {:?} failed verification, re-downloading", model);
            self.remove_download(model)?;
            self.download_model(model).await?;
        }
        Ok(())
    }

    /// Path of a downloaded model, or `NotDownloaded`
    pub fn require_downloaded(&self, model: BuiltinModel) -> Result<PathBuf, ModelError> {
        if self.is_model_downloaded(model) {
            Ok(self.get_model_path(model))
        } else {
            Err(ModelError::NotDownloaded(format!("{:?}", model)))
        }
    }
}
