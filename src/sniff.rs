// src/sniff.rs
//
// Best-effort content type detection for writes that carry no ContentType.
//
// Order: binary signatures in the leading bytes, then the key's extension,
// then leading markup, then a plain-text check, then application/octet-stream.

use mime::Mime;

use crate::constants::DEFAULT_CONTENT_TYPE;

/// (offset, signature, content type)
const SIGNATURES: &[(usize, &[u8], &str)] = &[
    (0, b"\x89PNG\r\n\x1a\n", "image/png"),
    (0, b"\xff\xd8\xff", "image/jpeg"),
    (0, b"GIF87a", "image/gif"),
    (0, b"GIF89a", "image/gif"),
    (0, b"II*\0", "image/tiff"),
    (0, b"MM\0*", "image/tiff"),
    (0, b"%PDF-", "application/pdf"),
    (0, b"%!PS", "application/postscript"),
    (0, b"PK\x03\x04", "application/zip"),
    (0, b"\x1f\x8b", "application/gzip"),
    (0, b"BZh", "application/x-bzip2"),
    (0, b"7z\xbc\xaf\x27\x1c", "application/x-7z-compressed"),
    (0, b"\x28\xb5\x2f\xfd", "application/zstd"),
    (0, b"\0asm", "application/wasm"),
    (0, b"OggS", "audio/ogg"),
    (0, b"ID3", "audio/mpeg"),
    (0, b"fLaC", "audio/flac"),
    (4, b"ftyp", "video/mp4"),
    (0, b"\x1a\x45\xdf\xa3", "video/webm"),
];

/// Guesses a content type from leading bytes and, failing that, the key.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentTypeSniffer;

impl ContentTypeSniffer {
    pub fn new() -> Self {
        Self
    }

    /// Always returns a type; `application/octet-stream` when nothing matches.
    pub fn sniff(&self, head: &[u8], key: &str) -> String {
        if let Some(ct) = detect_signature(head) {
            return ct.to_string();
        }
        if let Some(guess) = mime_guess::from_path(key).first() {
            return guess.essence_str().to_string();
        }
        if let Some(ct) = detect_markup(head) {
            return ct.to_string();
        }
        if looks_like_text(head) {
            return mime::TEXT_PLAIN.essence_str().to_string();
        }
        DEFAULT_CONTENT_TYPE.to_string()
    }

    /// Parsed form of [`sniff`](Self::sniff).
    pub fn sniff_mime(&self, head: &[u8], key: &str) -> Mime {
        self.sniff(head, key)
            .parse()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM)
    }
}

fn detect_signature(head: &[u8]) -> Option<&'static str> {
    if head.len() >= 12 && &head[..4] == b"RIFF" {
        match &head[8..12] {
            b"WEBP" => return Some("image/webp"),
            b"WAVE" => return Some("audio/wav"),
            b"AVI " => return Some("video/x-msvideo"),
            _ => {}
        }
    }
    SIGNATURES
        .iter()
        .find(|(offset, sig, _)| head.get(*offset..offset + sig.len()) == Some(*sig))
        .map(|(_, _, ct)| *ct)
}

fn detect_markup(head: &[u8]) -> Option<&'static str> {
    let start = head.iter().position(|b| !b.is_ascii_whitespace())?;
    let lead: Vec<u8> = head[start..]
        .iter()
        .take(14)
        .map(u8::to_ascii_lowercase)
        .collect();
    if lead.starts_with(b"<?xml") {
        Some("application/xml")
    } else if lead.starts_with(b"<!doctype html") || lead.starts_with(b"<html") {
        Some("text/html")
    } else if lead.starts_with(b"<svg") {
        Some("image/svg+xml")
    } else {
        None
    }
}

/// UTF-8 without control characters other than common whitespace. A multibyte
/// sequence cut off at the end of `head` still counts as text.
fn looks_like_text(head: &[u8]) -> bool {
    if head.is_empty() {
        return false;
    }
    let valid = match std::str::from_utf8(head) {
        Ok(s) => s,
        Err(e) if e.error_len().is_none() => {
            // Truncated trailing character.
            match std::str::from_utf8(&head[..e.valid_up_to()]) {
                Ok(s) => s,
                Err(_) => return false,
            }
        }
        Err(_) => return false,
    };
    !valid
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r' | '\x0c' | '\x1b'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sniff(head: &[u8], key: &str) -> String {
        ContentTypeSniffer::new().sniff(head, key)
    }

    #[test]
    fn binary_signatures_beat_extension() {
        assert_eq!(sniff(b"\x89PNG\r\n\x1a\n....", "photo.txt"), "image/png");
        assert_eq!(sniff(b"%PDF-1.7\n", "doc"), "application/pdf");
        assert_eq!(sniff(b"\x00\x00\x00\x18ftypmp42", "clip"), "video/mp4");
        assert_eq!(sniff(b"RIFF\x10\x00\x00\x00WEBPVP8 ", "img"), "image/webp");
    }

    #[test]
    fn extension_used_when_no_signature() {
        assert_eq!(sniff(b"a,b,c\n1,2,3\n", "table.csv"), "text/csv");
        assert_eq!(sniff(b"{\"a\":1}", "doc.json"), "application/json");
    }

    #[test]
    fn markup_and_text_fallbacks() {
        assert_eq!(sniff(b"  <!DOCTYPE html><html></html>", "index"), "text/html");
        assert_eq!(sniff(b"<?xml version=\"1.0\"?><a/>", "feed"), "application/xml");
        assert_eq!(sniff("plain words, ünïcode".as_bytes(), "notes"), "text/plain");
    }

    #[test]
    fn truncated_utf8_still_text() {
        let s = "héllo".as_bytes();
        assert_eq!(sniff(&s[..2], "x"), "text/plain");
    }

    #[test]
    fn unknown_binary_is_octet_stream() {
        assert_eq!(sniff(&[0u8, 1, 2, 3, 0xfe], "blob"), "application/octet-stream");
        assert_eq!(sniff(b"", "blob"), "application/octet-stream");
    }
}
