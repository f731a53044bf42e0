//! The process wide model session.
//!
//! [`acquire_session`] downloads the BLIP weights if needed, picks a device and
//! loads the model the first time it is called. Every later call in the same
//! process gets the same [`BLIP`] instance back.

use crate::blip::{GenerationConfig, BLIP, MODEL_ID};
use crate::device::{device_label, select_device, DevicePreference};
use crate::loader::ModelLoader;
use anyhow::Context;
use file_downloader::{FileDownload, FileDownloadConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

const MODEL_DIR: &str = "blip-image-captioning-large";
const WEIGHTS_URI: &str =
    "Salesforce/blip-image-captioning-large/resolve/refs%2Fpr%2F18/model.safetensors";
const TOKENIZER_URI: &str = "Salesforce/blip-image-captioning-large/resolve/main/tokenizer.json";

pub const DEFAULT_MODEL_URL: &str = "https://huggingface.co";

static SESSION: ModelLoader<BLIP> = ModelLoader::new();

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub resources_dir: PathBuf,
    /// Base url the model files are fetched from when they are not on disk yet.
    pub model_url: String,
    pub device: DevicePreference,
    pub generation: GenerationConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            resources_dir: PathBuf::from("resources"),
            model_url: DEFAULT_MODEL_URL.to_string(),
            device: DevicePreference::Auto,
            generation: GenerationConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Read `LOCAL_RESOURCES_DIR`, `CAPTION_MODEL_URL` and `CAPTION_DEVICE`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup("LOCAL_RESOURCES_DIR") {
            config.resources_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("CAPTION_MODEL_URL") {
            config.model_url = url.trim_end_matches('/').to_string();
        }
        if let Some(device) = lookup("CAPTION_DEVICE") {
            config.device = device
                .parse()
                .with_context(|| format!("invalid CAPTION_DEVICE '{}'", device))?;
        }

        Ok(config)
    }
}

/// What the running session looks like, for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub model_id: String,
    pub device: String,
    pub max_new_tokens: usize,
}

impl From<&BLIP> for SessionInfo {
    fn from(blip: &BLIP) -> Self {
        Self {
            model_id: MODEL_ID.to_string(),
            device: device_label(blip.device()),
            max_new_tokens: blip.generation_config().max_new_tokens,
        }
    }
}

/// Local paths of the weights and the tokenizer under `resources_dir`.
pub fn model_files(resources_dir: impl AsRef<Path>) -> (PathBuf, PathBuf) {
    let dir = resources_dir.as_ref().join(MODEL_DIR);
    (dir.join("model.safetensors"), dir.join("tokenizer.json"))
}

/// Get the process wide session, loading it on the first call.
///
/// The config only matters for the call that actually builds the session.
/// A failed load is returned to the caller and not cached, there is no retry.
pub async fn acquire_session(config: &SessionConfig) -> anyhow::Result<Arc<BLIP>> {
    SESSION.load(|| load_session(config.clone())).await
}

/// The session if it has already been loaded.
pub fn current_session() -> Option<Arc<BLIP>> {
    SESSION.get()
}

async fn load_session(config: SessionConfig) -> anyhow::Result<BLIP> {
    info!("loading {} into {}", MODEL_ID, config.resources_dir.display());

    let download = FileDownload::new(FileDownloadConfig {
        url: config.model_url.clone(),
    });
    let (model_path, tokenizer_path) = model_files(&config.resources_dir);

    download
        .download_to_path_if_not_exists(WEIGHTS_URI, &model_path)
        .await
        .context("failed to fetch model weights")?;
    download
        .download_to_path_if_not_exists(TOKENIZER_URI, &tokenizer_path)
        .await
        .context("failed to fetch tokenizer")?;

    let device = select_device(config.device)?;
    let generation = config.generation;

    // mmap and weight upload are blocking
    tokio::task::spawn_blocking(move || BLIP::new(model_path, tokenizer_path, device, generation))
        .await?
}
