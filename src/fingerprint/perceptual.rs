use anyhow::{anyhow, Result};
use image::DynamicImage;
use img_hash::{HashAlg, HasherConfig};

/// Perceptual fingerprint over decoded pixel content.
///
/// 8x8 DCT mean hash (the pHash family): 64 bits, hex-encoded to 16
/// characters. Visually similar images land at small Hamming distance,
/// dissimilar ones far apart. The hash depends only on pixel content, not
/// on the source container format.
pub fn hash_perceptual(img: &DynamicImage) -> Result<String> {
    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::Mean)
        .preproc_dct()
        .hash_size(8, 8)
        .to_hasher();

    // img_hash pins its own image version, so re-buffer the normalized
    // RGBA pixels into its types before hashing.
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let bridged = img_hash::image::RgbaImage::from_raw(width, height, rgba.into_raw())
        .ok_or_else(|| anyhow!("pixel buffer did not match image dimensions"))?;

    let hash = hasher.hash_image(&img_hash::image::DynamicImage::ImageRgba8(bridged));

    Ok(hash
        .as_bytes()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn horizontal_gradient() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |x, _y| {
            Rgb([(x * 4) as u8, 0, 0])
        }))
    }

    fn checkerboard() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        }))
    }

    #[test]
    fn deterministic_over_pixels() {
        let img = horizontal_gradient();
        assert_eq!(hash_perceptual(&img).unwrap(), hash_perceptual(&img).unwrap());
    }

    #[test]
    fn fingerprint_is_16_hex_chars() {
        let hash = hash_perceptual(&checkerboard()).unwrap();
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn independent_of_source_format() {
        let img = horizontal_gradient();

        let mut png = Cursor::new(Vec::new());
        img.write_to(&mut png, image::ImageFormat::Png).unwrap();
        let decoded = image::load_from_memory(&png.into_inner()).unwrap();

        assert_eq!(
            hash_perceptual(&img).unwrap(),
            hash_perceptual(&decoded).unwrap()
        );
    }

    #[test]
    fn dissimilar_images_differ() {
        assert_ne!(
            hash_perceptual(&horizontal_gradient()).unwrap(),
            hash_perceptual(&checkerboard()).unwrap()
        );
    }
}
