//! MIME detection for evidence payloads
//!
//! Header-byte signatures win over the file extension, since evidence files
//! are often renamed by the devices or people that export them.

use std::path::Path;

/// MIME type used when neither the header nor the name says anything
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Detect a MIME type from header bytes.
///
/// Only formats plausible as crash evidence are recognized: dashcam and phone
/// video, still images, audio recordings and documents.
pub fn detect_mime(header: &[u8]) -> Option<&'static str> {
    // ftyp boxes: MP4 / QuickTime / HEIC share the container
    if header.len() >= 12 && header[4..8] == *b"ftyp" {
        let brand = &header[8..12];
        return match brand {
            b"qt  " => Some("video/quicktime"),
            b"heic" | b"heix" | b"hevc" | b"mif1" => Some("image/heic"),
            b"M4A " => Some("audio/mp4"),
            _ => Some("video/mp4"),
        };
    }

    // RIFF containers: AVI / WAV / WebP
    if header.len() >= 12 && header[..4] == *b"RIFF" {
        return match &header[8..12] {
            b"AVI " => Some("video/x-msvideo"),
            b"WAVE" => Some("audio/wav"),
            b"WEBP" => Some("image/webp"),
            _ => None,
        };
    }

    // Matroska / WebM: EBML header
    if header.len() >= 4 && header[..4] == [0x1A, 0x45, 0xDF, 0xA3] {
        return Some("video/webm");
    }

    if header.len() >= 3 && header[..3] == [0xFF, 0xD8, 0xFF] {
        return Some("image/jpeg");
    }
    if header.len() >= 8 && header[..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] {
        return Some("image/png");
    }
    if header.len() >= 6 && (header[..6] == *b"GIF87a" || header[..6] == *b"GIF89a") {
        return Some("image/gif");
    }

    if header.len() >= 4 && header[..4] == *b"%PDF" {
        return Some("application/pdf");
    }

    // MP3: ID3 tag or a bare MPEG frame sync
    if header.len() >= 3 && header[..3] == *b"ID3" {
        return Some("audio/mpeg");
    }
    if header.len() >= 2 && header[0] == 0xFF && matches!(header[1], 0xFB | 0xFA | 0xF3 | 0xF2) {
        return Some("audio/mpeg");
    }
    if header.len() >= 4 && header[..4] == *b"fLaC" {
        return Some("audio/flac");
    }
    if header.len() >= 4 && header[..4] == *b"OggS" {
        return Some("audio/ogg");
    }

    None
}

/// Guess a MIME type from a file name's extension
pub fn mime_from_extension(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "webm" | "mkv" => "video/webm",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "ogg" | "oga" => "audio/ogg",
        _ => return None,
    };
    Some(mime)
}

/// Header signature first, then extension, then [`FALLBACK_MIME`]
pub fn sniff_mime(header: &[u8], name: &str) -> &'static str {
    detect_mime(header)
        .or_else(|| mime_from_extension(name))
        .unwrap_or(FALLBACK_MIME)
}

/// Image payloads can be sent to the model inline
pub fn is_image(mime: &str) -> bool {
    mime.starts_with("image/")
}
