use thiserror::Error;

pub type CaptionResult<T> = std::result::Result<T, CaptionError>;

/// Everything that can go wrong between receiving image bytes and returning a caption.
///
/// Errors stop at the pipeline boundary: callers get one of these values and can
/// render [`CaptionError::user_message`], internal errors are never re-raised.
#[derive(Error, Debug)]
pub enum CaptionError {
    #[error("the uploaded file is not a valid image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("unsupported image format {0}, only JPEG and PNG are accepted")]
    UnsupportedFormat(String),

    #[error("image preprocessing failed: {0}")]
    Preprocess(candle_core::Error),

    #[error("caption generation failed: {0}")]
    Generation(#[from] candle_core::Error),

    #[error("failed to decode generated tokens: {0}")]
    Tokenizer(String),

    #[error("the model produced an empty caption")]
    EmptyCaption,
}

impl CaptionError {
    /// Message shown to the person who uploaded the image.
    pub fn user_message(&self) -> String {
        format!("An error occurred: {}", self)
    }

    /// True when the input itself was rejected, as opposed to a failure while running the model.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::UnsupportedFormat(_))
    }
}
