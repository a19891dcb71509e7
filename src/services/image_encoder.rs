use base64::{engine::general_purpose, Engine};

use crate::models::{EncodedImage, RawImage};

const DEFAULT_MEDIA_TYPE: &str = "image/jpeg";

/// Base64-encode the image and work out its media type.
pub fn encode(image: &RawImage) -> EncodedImage {
    let data = general_purpose::STANDARD.encode(&image.bytes);
    let media_type = sniff_media_type(&image.bytes)
        .or_else(|| declared_image_type(image.content_type.as_deref()))
        .unwrap_or(DEFAULT_MEDIA_TYPE)
        .to_string();

    log::debug!(
        "🔄 Encoded {} bytes as {} ({} base64 chars)",
        image.len(),
        media_type,
        data.len()
    );

    EncodedImage { data, media_type }
}

/// Detect the formats the vision API accepts from their magic bytes.
fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

fn declared_image_type(content_type: Option<&str>) -> Option<&'static str> {
    let essence = content_type?.split(';').next()?.trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/jpeg" | "image/jpg" => Some("image/jpeg"),
        "image/png" => Some("image/png"),
        "image/gif" => Some("image/gif"),
        "image/webp" => Some("image/webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn raw(bytes: &[u8], content_type: Option<&str>) -> RawImage {
        RawImage {
            bytes: Bytes::copy_from_slice(bytes),
            content_type: content_type.map(str::to_string),
        }
    }

    #[test]
    fn test_encode_is_reversible() {
        let original: Vec<u8> = (0..=255u8).cycle().take(1024).collect();
        let encoded = encode(&raw(&original, None));

        let decoded = general_purpose::STANDARD.decode(&encoded.data).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(encode(&raw(&original, None)), encoded);
    }

    #[test]
    fn test_encode_empty_input() {
        let encoded = encode(&raw(&[], None));
        assert_eq!(encoded.data, "");
        assert_eq!(encoded.media_type, "image/jpeg");
    }

    #[test]
    fn test_sniffs_png_over_declared_type() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        let encoded = encode(&raw(&png, Some("image/jpeg")));
        assert_eq!(encoded.media_type, "image/png");
    }

    #[test]
    fn test_sniffs_webp() {
        let mut webp = b"RIFF".to_vec();
        webp.extend_from_slice(&[0x24, 0, 0, 0]);
        webp.extend_from_slice(b"WEBPVP8 ");
        assert_eq!(encode(&raw(&webp, None)).media_type, "image/webp");
    }

    #[test]
    fn test_falls_back_to_declared_type() {
        let encoded = encode(&raw(b"not magic", Some("Image/GIF; charset=binary")));
        assert_eq!(encoded.media_type, "image/gif");

        let encoded = encode(&raw(b"not magic", Some("text/html")));
        assert_eq!(encoded.media_type, "image/jpeg");
    }
}
