use crate::libs::core::models::ImageAttachment;
use crate::ChatError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Checks an upload and inlines it as a `data:` URL.
pub fn attach_image(
    file_name: &str,
    mime_type: &str,
    bytes: &[u8],
    max_bytes: u64,
) -> Result<ImageAttachment, ChatError> {
    let size = bytes.len() as u64;
    if size > max_bytes {
        return Err(ChatError::ImageTooLarge {
            size,
            max: max_bytes,
        });
    }
    if !mime_type.starts_with("image/") {
        return Err(ChatError::NotAnImage(mime_type.to_string()));
    }

    Ok(ImageAttachment {
        data_url: to_data_url(mime_type, bytes),
        file_name: file_name.to_string(),
        file_size: size,
    })
}

pub fn to_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_png_as_data_url() {
        let image = attach_image("dot.png", "image/png", b"\x89PNG", 1024).unwrap();
        assert_eq!(image.data_url, "data:image/png;base64,iVBORw==");
        assert_eq!(image.file_size, 4);
        assert_eq!(image.file_name, "dot.png");
    }

    #[test]
    fn rejects_oversized_upload() {
        let bytes = vec![0u8; 11];
        let err = attach_image("big.jpg", "image/jpeg", &bytes, 10).unwrap_err();
        assert!(matches!(err, ChatError::ImageTooLarge { size: 11, max: 10 }));
    }

    #[test]
    fn rejects_non_images() {
        let err = attach_image("notes.txt", "text/plain", b"hi", 10).unwrap_err();
        assert!(matches!(err, ChatError::NotAnImage(mime) if mime == "text/plain"));
    }
}
