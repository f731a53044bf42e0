mod preprocess;
mod text;

pub use preprocess::{preprocess_rgb8_image, IMAGE_SIZE};
pub use text::{clean_caption, BOS_TOKEN_ID, SEP_TOKEN_ID};

use crate::device::device_label;
use crate::error::{CaptionError, CaptionResult};
use crate::traits::{Caption, FinishReason, ImageCaption};
use anyhow::anyhow;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::blip;
use image::RgbImage;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

pub const MODEL_ID: &str = "Salesforce/blip-image-captioning-large";

/// Hard cap on generated tokens per caption.
pub const MAX_NEW_TOKENS: usize = 50;

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub max_new_tokens: usize,
    pub seed: u64,
    /// `None` together with `top_p: None` means greedy decoding.
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: MAX_NEW_TOKENS,
            seed: 1337,
            temperature: None,
            top_p: None,
        }
    }
}

/// BLIP large captioning model bound to one device.
///
/// The weights, tokenizer and device never change after [`BLIP::new`]. The
/// text decoder keeps a kv cache while generating, so the model sits behind a
/// mutex: concurrent callers take turns and every call starts from a cleared
/// cache.
pub struct BLIP {
    tokenizer: Tokenizer,
    model: Mutex<blip::BlipForConditionalGeneration>,
    device: Device,
    generation: GenerationConfig,
}

impl std::fmt::Debug for BLIP {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BLIP")
            .field("device", &device_label(&self.device))
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl BLIP {
    pub fn new(
        model_path: impl AsRef<Path>,
        tokenizer_path: impl AsRef<Path>,
        device: Device,
        generation: GenerationConfig,
    ) -> anyhow::Result<Self> {
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow!("failed to initialize tokenizer: {}", e))?;

        let config = blip::Config::image_captioning_large();

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[model_path.as_ref()], DType::F32, &device)?
        };
        let model = blip::BlipForConditionalGeneration::new(&config, vb)?;

        info!(
            "BLIP loaded from {} on {}",
            model_path.as_ref().display(),
            device_label(&device)
        );

        Ok(Self {
            tokenizer,
            model: Mutex::new(model),
            device,
            generation,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn generation_config(&self) -> &GenerationConfig {
        &self.generation
    }

    /// Run the decoder on one preprocessed image of shape `(3, 384, 384)`.
    ///
    /// Returns the generated token ids without the start token.
    fn generate(&self, pixel_values: &Tensor) -> CaptionResult<(Vec<u32>, FinishReason)> {
        // the cache is cleared below, so a panic in a previous call leaves nothing behind
        let mut model = self.model.lock().unwrap_or_else(PoisonError::into_inner);

        let image_embeds = pixel_values.unsqueeze(0)?.apply(model.vision_model())?;

        model.text_decoder().reset_kv_cache();

        let mut logits_processor = LogitsProcessor::new(
            self.generation.seed,
            self.generation.temperature,
            self.generation.top_p,
        );

        let (token_ids, finish_reason) =
            decode_tokens(self.generation.max_new_tokens, |input| {
                let input_ids = Tensor::new(input, &self.device)?.unsqueeze(0)?;
                let logits = model.text_decoder().forward(&input_ids, &image_embeds)?;
                let logits = logits.squeeze(0)?;
                let logits = logits.get(logits.dim(0)? - 1)?;
                logits_processor.sample(&logits)
            })?;

        Ok((token_ids, finish_reason))
    }
}

/// Autoregressive decode loop starting from `[DEC]`.
///
/// `step` gets the ids to feed the decoder (the whole prefix on the first call,
/// then only the newest token since the kv cache holds the rest) and returns
/// the next token. Stops at `[SEP]` or after `max_new_tokens` tokens. The start
/// token is not part of the result.
fn decode_tokens<F>(
    max_new_tokens: usize,
    mut step: F,
) -> candle_core::Result<(Vec<u32>, FinishReason)>
where
    F: FnMut(&[u32]) -> candle_core::Result<u32>,
{
    let mut token_ids = vec![BOS_TOKEN_ID];
    let mut finish_reason = FinishReason::Length;

    for index in 0..max_new_tokens {
        let context_size = if index > 0 { 1 } else { token_ids.len() };
        let start_pos = token_ids.len().saturating_sub(context_size);
        let token = step(&token_ids[start_pos..])?;
        if token == SEP_TOKEN_ID {
            finish_reason = FinishReason::Stop;
            break;
        }
        token_ids.push(token);
    }

    token_ids.remove(0);
    Ok((token_ids, finish_reason))
}

impl ImageCaption for BLIP {
    fn caption(&self, image: &RgbImage) -> CaptionResult<Caption> {
        let start = Instant::now();
        debug!(
            "generating caption for {}x{} image",
            image.width(),
            image.height()
        );

        let pixel_values =
            preprocess_rgb8_image(image, &self.device).map_err(CaptionError::Preprocess)?;
        let (token_ids, finish_reason) = self.generate(&pixel_values)?;

        let decoded = self
            .tokenizer
            .decode(&token_ids, true)
            .map_err(|e| CaptionError::Tokenizer(e.to_string()))?;
        let text = clean_caption(&decoded);
        if text.is_empty() {
            return Err(CaptionError::EmptyCaption);
        }

        let caption = Caption {
            text,
            token_count: token_ids.len(),
            finish_reason,
        };
        if caption.is_truncated() {
            warn!(
                "caption hit the {} token limit and was cut short",
                self.generation.max_new_tokens
            );
        }
        debug!(
            "caption: {:?}, {} tokens in {:?}",
            caption.text,
            caption.token_count,
            start.elapsed()
        );

        Ok(caption)
    }
}
