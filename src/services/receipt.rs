use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageKind {
    pub fn mime(&self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Gif => "image/gif",
            ImageKind::Webp => "image/webp",
        }
    }

    /// Identifies the image format from its leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]) {
            Some(ImageKind::Png)
        } else if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
            Some(ImageKind::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageKind::Gif)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageKind::Webp)
        } else {
            None
        }
    }
}

/// Turns an uploaded receipt into a `data:` URL suitable for storage.
///
/// The upload may already be a base64 data URL (what browsers produce from
/// `FileReader.readAsDataURL`) or bare base64. The declared MIME type is
/// ignored; the stored one comes from the decoded bytes.
pub fn encode_receipt(raw: &str, max_bytes: usize) -> Result<String, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::validation("لطفاً تصویر رسید پرداخت را بارگذاری کنید."));
    }

    let payload = match raw.strip_prefix("data:") {
        Some(rest) => {
            let Some((header, data)) = rest.split_once(',') else {
                return Err(invalid_image());
            };
            if !header.ends_with(";base64") {
                return Err(invalid_image());
            }
            data
        }
        None => raw,
    };

    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    // Reject oversized payloads before decoding them.
    if compact.len() / 4 * 3 > max_bytes + 3 {
        return Err(too_large(max_bytes));
    }

    let bytes = STANDARD.decode(compact.as_bytes()).map_err(|_| invalid_image())?;
    if bytes.len() > max_bytes {
        return Err(too_large(max_bytes));
    }
    let kind = ImageKind::sniff(&bytes).ok_or_else(invalid_image)?;

    Ok(format!("data:{};base64,{}", kind.mime(), STANDARD.encode(&bytes)))
}

fn invalid_image() -> AppError {
    AppError::validation("فایل رسید باید یک تصویر (PNG، JPEG، GIF یا WebP) باشد.")
}

fn too_large(max_bytes: usize) -> AppError {
    AppError::validation(format!(
        "حجم تصویر رسید نباید بیشتر از {} کیلوبایت باشد.",
        max_bytes / 1024
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 13];

    #[test]
    fn test_sniff_formats() {
        assert_eq!(ImageKind::sniff(PNG_HEADER), Some(ImageKind::Png));
        assert_eq!(ImageKind::sniff(&[0xff, 0xd8, 0xff, 0xe0]), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::sniff(b"GIF89a...."), Some(ImageKind::Gif));
        assert_eq!(ImageKind::sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(ImageKind::Webp));
        assert_eq!(ImageKind::sniff(b"%PDF-1.7"), None);
    }

    #[test]
    fn test_bare_base64_becomes_data_url() {
        let raw = STANDARD.encode(PNG_HEADER);
        let encoded = encode_receipt(&raw, 1024).unwrap();
        assert_eq!(encoded, format!("data:image/png;base64,{raw}"));
    }

    #[test]
    fn test_data_url_mime_comes_from_bytes() {
        let raw = format!("data:image/jpeg;base64,{}", STANDARD.encode(PNG_HEADER));
        let encoded = encode_receipt(&raw, 1024).unwrap();
        assert!(encoded.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_rejects_non_images_and_oversized() {
        let pdf = STANDARD.encode(b"%PDF-1.7 not an image");
        assert!(matches!(encode_receipt(&pdf, 1024), Err(AppError::Validation(_))));
        assert!(matches!(encode_receipt("   ", 1024), Err(AppError::Validation(_))));
        assert!(matches!(encode_receipt("data:image/png,abc", 1024), Err(AppError::Validation(_))));
        assert!(matches!(encode_receipt("!!!not base64", 1024), Err(AppError::Validation(_))));

        let mut big = PNG_HEADER.to_vec();
        big.resize(4096, 0);
        let raw = STANDARD.encode(&big);
        assert!(matches!(encode_receipt(&raw, 1024), Err(AppError::Validation(_))));
    }
}
