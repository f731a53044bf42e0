use crate::error::CaptionResult;
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FinishReason {
    /// The model emitted its end-of-sequence token.
    Stop,
    /// The token budget ran out before the model finished.
    Length,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caption {
    pub text: String,
    /// Number of generated tokens, excluding the start token.
    pub token_count: usize,
    pub finish_reason: FinishReason,
}

impl Caption {
    pub fn is_truncated(&self) -> bool {
        self.finish_reason == FinishReason::Length
    }
}

/// A loaded model that turns one RGB image into one caption.
///
/// Implementations are shared between requests, so `caption` takes `&self`
/// and must leave no state behind that changes the next call's result.
pub trait ImageCaption: Send + Sync {
    fn caption(&self, image: &RgbImage) -> CaptionResult<Caption>;
}
