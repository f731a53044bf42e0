use candle_core::{DType, Device, Tensor};
use image::RgbImage;

pub const IMAGE_SIZE: usize = 384;

const IMAGE_MEAN: [f32; 3] = [0.48145466, 0.4578275, 0.40821073];
const IMAGE_STD: [f32; 3] = [0.26862954, 0.261_302_6, 0.275_777_1];

/// Turn an rgb8 image into the `(3, 384, 384)` f32 tensor the BLIP vision model expects.
///
/// The image is stretched to 384x384 with a bicubic filter (no cropping, the
/// aspect ratio is not kept), scaled to `[0, 1]` and normalized per channel.
/// Work happens on the cpu, the result is moved to `device`.
pub fn preprocess_rgb8_image(image: &RgbImage, device: &Device) -> candle_core::Result<Tensor> {
    let size = IMAGE_SIZE as u32;
    let resized = image::imageops::resize(
        image,
        size,
        size,
        image::imageops::FilterType::CatmullRom,
    );

    let data = resized.into_raw();
    let data = Tensor::from_vec(data, (IMAGE_SIZE, IMAGE_SIZE, 3), &Device::Cpu)?.permute((2, 0, 1))?;
    let mean = Tensor::new(&IMAGE_MEAN, &Device::Cpu)?.reshape((3, 1, 1))?;
    let std = Tensor::new(&IMAGE_STD, &Device::Cpu)?.reshape((3, 1, 1))?;

    (data.to_dtype(DType::F32)? / 255.)?
        .broadcast_sub(&mean)?
        .broadcast_div(&std)?
        .to_device(device)
}
