//! Key-value codec: JSON text, optionally gzip-compressed.
//!
//! Compressed payloads are gzip bytes encoded as base64 so they can live in
//! a string-only store. Workflow: value → JSON → (gzip → base64) if large.
//!
//! Decoding runs an ordered chain of decoders. Entries flagged as compressed
//! try the compressed decoder first and fall back to plain JSON, which keeps
//! entries written before a compression-format change readable.

use super::backend::StorageError;
use base64::{engine::general_purpose::STANDARD, Engine};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::io::{Read, Write};
use tracing::{error, warn};

/// Serialized size above which values are compressed (bytes).
/// A value of exactly this size is stored raw.
pub const COMPRESSION_THRESHOLD: usize = 1024;

/// An encoded payload plus its compression flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub payload: String,
    pub compressed: bool,
}

impl Encoded {
    /// Flag text stored under `<key>_compressed`.
    pub fn flag(&self) -> &'static str {
        if self.compressed {
            "1"
        } else {
            "0"
        }
    }
}

/// One decoder in the decode chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStep {
    /// base64 → gunzip → JSON
    Compressed,
    /// JSON as stored
    RawJson,
}

impl fmt::Display for DecodeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeStep::Compressed => write!(f, "compressed"),
            DecodeStep::RawJson => write!(f, "raw-json"),
        }
    }
}

/// A decoder that failed, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    pub step: DecodeStep,
    pub reason: String,
}

/// Tagged result of running the decode chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A decoder succeeded.
    Value { value: Value, via: DecodeStep },
    /// Every decoder in the chain failed.
    Absent { attempts: Vec<DecodeFailure> },
}

impl Decoded {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Decoded::Value { value, .. } => Some(value),
            Decoded::Absent { .. } => None,
        }
    }

    /// Which decoder produced the value, if any.
    pub fn via(&self) -> Option<DecodeStep> {
        match self {
            Decoded::Value { via, .. } => Some(*via),
            Decoded::Absent { .. } => None,
        }
    }
}

/// Encoder/decoder with a configurable compression threshold.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    threshold: usize,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(COMPRESSION_THRESHOLD)
    }
}

impl Codec {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Serialize `value`, compressing when forced or when the JSON text is
    /// larger than the threshold.
    ///
    /// Compression failures fall back to the raw text. The only error is a
    /// value that cannot be serialized at all.
    pub fn encode<T: Serialize + ?Sized>(
        &self,
        value: &T,
        force_compress: bool,
    ) -> Result<Encoded, StorageError> {
        let text = serde_json::to_string(value)?;

        if !force_compress && text.len() <= self.threshold {
            return Ok(Encoded {
                payload: text,
                compressed: false,
            });
        }

        match compress(&text) {
            Ok(payload) => Ok(Encoded {
                payload,
                compressed: true,
            }),
            Err(e) => {
                warn!("Compression failed, storing uncompressed: {}", e);
                Ok(Encoded {
                    payload: text,
                    compressed: false,
                })
            }
        }
    }

    /// Run the decode chain for a stored payload.
    pub fn decode(&self, raw: &str, flag_is_set: bool) -> Decoded {
        let chain: &[DecodeStep] = if flag_is_set {
            &[DecodeStep::Compressed, DecodeStep::RawJson]
        } else {
            &[DecodeStep::RawJson]
        };

        let mut attempts = Vec::new();
        for &step in chain {
            match run_step(step, raw) {
                Ok(value) => return Decoded::Value { value, via: step },
                Err(reason) => attempts.push(DecodeFailure { step, reason }),
            }
        }

        error!(
            "Cannot decode stored value ({})",
            attempts
                .iter()
                .map(|a| format!("{}: {}", a.step, a.reason))
                .collect::<Vec<_>>()
                .join("; ")
        );
        Decoded::Absent { attempts }
    }
}

fn run_step(step: DecodeStep, raw: &str) -> Result<Value, String> {
    match step {
        DecodeStep::Compressed => {
            let text = decompress(raw)?;
            serde_json::from_str(&text).map_err(|e| e.to_string())
        }
        DecodeStep::RawJson => serde_json::from_str(raw).map_err(|e| e.to_string()),
    }
}

/// gzip then base64.
fn compress(text: &str) -> std::io::Result<String> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes())?;
    let bytes = encoder.finish()?;
    Ok(STANDARD.encode(bytes))
}

/// base64 then gunzip.
fn decompress(payload: &str) -> Result<String, String> {
    let bytes = STANDARD.decode(payload).map_err(|e| e.to_string())?;
    let mut decoder = GzDecoder::new(bytes.as_slice());
    let mut text = String::new();
    decoder
        .read_to_string(&mut text)
        .map_err(|e| e.to_string())?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// JSON string whose serialized form is exactly `len` bytes.
    fn string_of_serialized_len(len: usize) -> Value {
        Value::String("a".repeat(len - 2))
    }

    #[test]
    fn test_small_value_stays_raw() {
        let codec = Codec::default();
        let encoded = codec.encode(&json!({"q": "rust"}), false).unwrap();
        assert!(!encoded.compressed);
        assert_eq!(encoded.payload, r#"{"q":"rust"}"#);
        assert_eq!(encoded.flag(), "0");
    }

    #[test]
    fn test_roundtrip_forced_and_unforced() {
        let codec = Codec::default();
        let small = json!({"name": "list", "items": [1, 2, 3]});
        let large = json!({"blob": "x".repeat(4096), "n": 7});

        for value in [&small, &large] {
            for force in [false, true] {
                let encoded = codec.encode(value, force).unwrap();
                let decoded = codec.decode(&encoded.payload, encoded.compressed);
                assert_eq!(decoded.into_value().as_ref(), Some(value));
            }
        }
    }

    #[test]
    fn test_threshold_boundary() {
        let codec = Codec::default();

        let at = string_of_serialized_len(COMPRESSION_THRESHOLD);
        assert_eq!(serde_json::to_string(&at).unwrap().len(), 1024);
        assert!(!codec.encode(&at, false).unwrap().compressed);

        let over = string_of_serialized_len(COMPRESSION_THRESHOLD + 1);
        assert!(codec.encode(&over, false).unwrap().compressed);
    }

    #[test]
    fn test_flagged_legacy_entry_falls_back_to_raw_json() {
        let codec = Codec::default();
        // Flag says compressed, payload is plain JSON from an older writer
        let decoded = codec.decode(r#"["a","b"]"#, true);
        assert_eq!(decoded.via(), Some(DecodeStep::RawJson));
        assert_eq!(decoded.into_value(), Some(json!(["a", "b"])));
    }

    #[test]
    fn test_unflagged_entry_uses_raw_json_only() {
        let codec = Codec::default();
        let decoded = codec.decode(r#"{"v":1}"#, false);
        assert_eq!(decoded.via(), Some(DecodeStep::RawJson));
    }

    #[test]
    fn test_garbage_reports_every_attempt() {
        let codec = Codec::default();
        match codec.decode("not json at all", true) {
            Decoded::Absent { attempts } => {
                let steps: Vec<_> = attempts.iter().map(|a| a.step).collect();
                assert_eq!(steps, vec![DecodeStep::Compressed, DecodeStep::RawJson]);
            }
            other => panic!("expected Absent, got {:?}", other),
        }
    }

    #[test]
    fn test_compressed_payload_is_text() {
        let codec = Codec::default();
        let encoded = codec.encode(&"z".repeat(2000), false).unwrap();
        assert!(encoded.compressed);
        assert!(encoded.payload.len() < 2000);
        assert!(encoded.payload.is_ascii());
    }
}
