use crate::{Dims, Error};
use burn::tensor::{backend::Backend, Tensor, TensorData};
use std::path::Path;

/// Helper type used to define the source of `ImageSource`'s data
#[derive(Clone)]
pub enum ImageSource<'a> {
    /// A raw buffer of image data, see `image::load_from_memory` for details
    /// on what is supported
    Memory(&'a [u8]),
    /// The path to an image to load from disk. The image format is inferred
    /// from the file extension, see `image::open` for details
    Path(&'a Path),
    /// An already loaded image that is passed directly to the session
    Image(image::DynamicImage),
}

impl<'a> ImageSource<'a> {
    pub fn from_path(path: &'a Path) -> Self {
        Self::Path(path)
    }
}

impl<'a> From<image::DynamicImage> for ImageSource<'a> {
    fn from(img: image::DynamicImage) -> Self {
        Self::Image(img)
    }
}

impl<'a, S> From<&'a S> for ImageSource<'a>
where
    S: AsRef<Path> + 'a,
{
    fn from(path: &'a S) -> Self {
        Self::Path(path.as_ref())
    }
}

pub fn load_dynamic_image(src: ImageSource<'_>) -> Result<image::DynamicImage, image::ImageError> {
    match src {
        ImageSource::Memory(data) => image::load_from_memory(data),
        ImageSource::Path(path) => image::open(path),
        ImageSource::Image(img) => Ok(img),
    }
}

pub(crate) fn load_image(
    src: ImageSource<'_>,
    resize: Option<Dims>,
) -> Result<image::RgbaImage, Error> {
    let img = load_dynamic_image(src)?;

    let img = match resize {
        None => img.to_rgba(),
        Some(ref size) => {
            use image::GenericImageView;

            if img.width() != size.width || img.height() != size.height {
                image::imageops::resize(
                    &img.to_rgba(),
                    size.width,
                    size.height,
                    image::imageops::CatmullRom,
                )
            } else {
                img.to_rgba()
            }
        }
    };

    Ok(img)
}

/// Converts an image into a `[1, 3, H, W]` tensor with values in `[0, 1]`.
///
/// The alpha channel is discarded; the network only ever sees RGB.
pub(crate) fn image_to_tensor<B: Backend>(
    img: &image::RgbaImage,
    device: &B::Device,
) -> Tensor<B, 4> {
    let (width, height) = img.dimensions();
    let (w, h) = (width as usize, height as usize);

    let mut data = vec![0.0_f32; 3 * h * w];
    for (x, y, pixel) in img.enumerate_pixels() {
        let at = y as usize * w + x as usize;
        data[at] = f32::from(pixel[0]) / 255.0;
        data[h * w + at] = f32::from(pixel[1]) / 255.0;
        data[2 * h * w + at] = f32::from(pixel[2]) / 255.0;
    }

    Tensor::from_data(TensorData::new(data, [1, 3, h, w]), device)
}

/// Converts a flat `[1, 3, H, W]` pixel grid back into an opaque RGBA image.
///
/// Values are expected to already sit in `[0, 1]`; anything outside is
/// clamped during the u8 conversion.
pub(crate) fn pixels_to_image(data: &[f32], size: Dims) -> image::RgbaImage {
    let (w, h) = (size.width as usize, size.height as usize);
    debug_assert_eq!(data.len(), 3 * h * w);

    image::RgbaImage::from_fn(size.width, size.height, |x, y| {
        let at = y as usize * w + x as usize;
        let to_u8 = |v: f32| (v.max(0.0).min(1.0) * 255.0).round() as u8;
        image::Rgba([
            to_u8(data[at]),
            to_u8(data[h * w + at]),
            to_u8(data[2 * h * w + at]),
            255,
        ])
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::DefaultBackend;

    #[test]
    fn image_roundtrip() {
        let img = image::RgbaImage::from_fn(3, 2, |x, y| {
            image::Rgba([(x * 40) as u8, (y * 80) as u8, 200, 255])
        });

        let device = Default::default();
        let tensor = image_to_tensor::<DefaultBackend>(&img, &device);
        assert_eq!(tensor.dims(), [1, 3, 2, 3]);

        let data = tensor
            .into_data()
            .into_vec::<f32>()
            .expect("float tensor data");
        let back = pixels_to_image(&data, Dims::new(3, 2));
        assert_eq!(img, back);
    }
}
