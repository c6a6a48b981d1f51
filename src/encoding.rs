use std::fmt;

use anyhow::{Result, anyhow};
use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingSource {
    Override,
    Bom,
    Detector,
    AssumedUtf8,
}

impl fmt::Display for EncodingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EncodingSource::Override => "override",
            EncodingSource::Bom => "bom",
            EncodingSource::Detector => "detector",
            EncodingSource::AssumedUtf8 => "assumed-utf8",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    pub encoding: &'static Encoding,
    pub source: EncodingSource,
    pub had_errors: bool,
}

/// Bytes ready to write, plus whether some characters could not be
/// represented in the target encoding.
pub struct EncodedText {
    pub bytes: Vec<u8>,
    pub lossy: bool,
}

#[derive(Debug, Clone, Default)]
pub struct EncodingStrategy {
    override_encoding: Option<&'static Encoding>,
}

impl EncodingStrategy {
    pub fn new(override_label: Option<&str>) -> Result<Self> {
        let Some(label) = override_label else {
            return Ok(Self::default());
        };
        let trimmed = label.trim();
        let encoding = Encoding::for_label(trimmed.as_bytes())
            .ok_or_else(|| anyhow!("unknown encoding override '{trimmed}'"))?;
        Ok(Self {
            override_encoding: Some(encoding),
        })
    }

    pub fn describe(&self) -> String {
        match self.override_encoding {
            Some(enc) => format!("override {}, auto-detect disabled", enc.name()),
            None => "auto-detect (BOM → UTF-8 → detector)".to_string(),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> DecodedText {
        let (encoding, source) = match self.override_encoding {
            Some(encoding) => (encoding, EncodingSource::Override),
            None => detect_auto(bytes),
        };
        let (cow, _encoding_used, had_errors) = encoding.decode(bytes);
        DecodedText {
            text: cow.into_owned(),
            encoding,
            source,
            had_errors,
        }
    }
}

/// Encodes `text` for writing back. UTF-16 has no encoder in `encoding_rs`,
/// so those are written unit by unit.
pub fn encode(encoding: &'static Encoding, with_bom: bool, text: &str) -> EncodedText {
    if encoding == UTF_16LE || encoding == UTF_16BE {
        let little = encoding == UTF_16LE;
        let mut bytes = match (with_bom, little) {
            (false, _) => Vec::new(),
            (true, true) => vec![0xFF, 0xFE],
            (true, false) => vec![0xFE, 0xFF],
        };
        for unit in text.encode_utf16() {
            let pair = if little {
                unit.to_le_bytes()
            } else {
                unit.to_be_bytes()
            };
            bytes.extend_from_slice(&pair);
        }
        return EncodedText {
            bytes,
            lossy: false,
        };
    }

    let (cow, _, lossy) = encoding.encode(text);
    let mut bytes = Vec::with_capacity(cow.len() + 3);
    if with_bom && encoding == UTF_8 {
        bytes.extend_from_slice(&[0xEF, 0xBB, 0xBF]);
    }
    bytes.extend_from_slice(&cow);
    EncodedText { bytes, lossy }
}

fn detect_auto(bytes: &[u8]) -> (&'static Encoding, EncodingSource) {
    if let Some(encoding) = detect_bom(bytes) {
        return (encoding, EncodingSource::Bom);
    }

    if std::str::from_utf8(bytes).is_ok() {
        return (UTF_8, EncodingSource::AssumedUtf8);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    (detector.guess(None, true), EncodingSource::Detector)
}

fn detect_bom(bytes: &[u8]) -> Option<&'static Encoding> {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return Some(UTF_8);
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return Some(UTF_16LE);
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return Some(UTF_16BE);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_override_is_rejected() {
        assert!(EncodingStrategy::new(Some("not-a-charset")).is_err());
        assert!(EncodingStrategy::new(Some(" latin1 ")).is_ok());
    }

    #[test]
    fn plain_utf8_is_assumed() {
        let decoded = EncodingStrategy::default().decode("layer: \"front\"".as_bytes());
        assert_eq!(decoded.source, EncodingSource::AssumedUtf8);
        assert_eq!(decoded.encoding.name(), "UTF-8");
        assert_eq!(decoded.text, "layer: \"front\"");
    }

    #[test]
    fn bom_detection_takes_precedence() {
        let decoded = EncodingStrategy::default().decode(&[0xFF, 0xFE, 0x61, 0x00]);
        assert_eq!(decoded.source, EncodingSource::Bom);
        assert_eq!(decoded.encoding.name(), "UTF-16LE");
        assert_eq!(decoded.text, "a");
    }

    #[test]
    fn utf16_round_trips_through_encode() {
        let encoded = encode(UTF_16LE, true, "ab");
        assert_eq!(encoded.bytes, vec![0xFF, 0xFE, 0x61, 0x00, 0x62, 0x00]);
        let decoded = EncodingStrategy::default().decode(&encoded.bytes);
        assert_eq!(decoded.text, "ab");
    }

    #[test]
    fn utf8_bom_is_preserved_when_requested() {
        let decoded = EncodingStrategy::default().decode(&[0xEF, 0xBB, 0xBF, b'x']);
        assert_eq!(decoded.source, EncodingSource::Bom);
        assert_eq!(decoded.text, "x");
        let encoded = encode(decoded.encoding, true, &decoded.text);
        assert_eq!(encoded.bytes, vec![0xEF, 0xBB, 0xBF, b'x']);
        assert_eq!(encode(UTF_8, false, "x").bytes, b"x".to_vec());
    }
}
