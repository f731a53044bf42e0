#[cfg(feature = "accelerate")]
extern crate accelerate_src;

mod loader;
mod traits;

pub mod blip;
pub mod device;
pub mod error;
pub mod pipeline;
pub mod session;

pub use error::{CaptionError, CaptionResult};
pub use pipeline::{decode_image, generate_caption, CaptionOutput};
pub use session::{acquire_session, current_session, SessionConfig, SessionInfo};
pub use traits::*;
