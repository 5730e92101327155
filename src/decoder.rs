use crate::Result;
use image::DynamicImage;
use log::debug;

/// Decode an encoded image (JPEG, PNG, ...) into a pixel grid
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    let image = image::load_from_memory(bytes)?;
    debug!(
        "Decoded image {}x{} from {} bytes",
        image.width(),
        image.height(),
        bytes.len()
    );
    Ok(image)
}
