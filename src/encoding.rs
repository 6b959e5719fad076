//! Byte-to-text decoding for source documents (invoices and ledgers alike).
//!
//! GİB portals and vendor software emit UTF-8 (with or without BOM) as well
//! as legacy Turkish code pages. Decoding sniffs rather than trusts: BOM
//! first, then the XML declaration, then strict UTF-8, then a lossy
//! windows-1254 fallback so a single mislabeled file cannot sink a batch.

use encoding_rs::{UTF_8, WINDOWS_1254};

/// Decode document bytes into text.
pub fn decode_document(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        let (text, _, _) = UTF_8.decode(bytes);
        return text.into_owned();
    }

    // Sniff the declaration; only ASCII matters at this point.
    let head: String = bytes
        .iter()
        .take(200)
        .map(|&b| if b.is_ascii() { b as char } else { ' ' })
        .collect::<String>()
        .to_uppercase();
    if head.contains("ISO-8859-9") || head.contains("WINDOWS-1254") {
        let (text, _, _) = WINDOWS_1254.decode(bytes);
        return text.into_owned();
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _, _) = WINDOWS_1254.decode(bytes);
            text.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_utf8() {
        assert_eq!(decode_document("şirket ünvanı".as_bytes()), "şirket ünvanı");
    }

    #[test]
    fn utf8_bom_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"<Invoice/>");
        assert_eq!(decode_document(&bytes), "<Invoice/>");
    }

    #[test]
    fn declared_iso_8859_9() {
        let mut bytes = br#"<?xml version="1.0" encoding="ISO-8859-9"?><a>"#.to_vec();
        bytes.push(0xFD); // 'ı' in ISO-8859-9 / windows-1254
        bytes.extend_from_slice(b"</a>");
        let text = decode_document(&bytes);
        assert!(text.contains('\u{131}'));
    }

    #[test]
    fn invalid_utf8_falls_back() {
        let bytes = vec![b'<', b'a', b'>', 0xDE, 0xFD, b'<', b'/', b'a', b'>'];
        let text = decode_document(&bytes);
        assert!(text.contains('\u{131}'));
    }
}
