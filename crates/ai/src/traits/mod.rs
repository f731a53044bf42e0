mod image_caption;

pub use image_caption::*;
