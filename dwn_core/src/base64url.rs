//! Base64url as used for `encodedData` and the legacy reply header.
//!
//! Encoding never pads; decoding accepts input with or without padding.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::error::DecodeError;

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_LENIENT.encode(bytes)
}

pub fn decode(text: &str, context: &'static str) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE_LENIENT
        .decode(text.trim())
        .map_err(|source| DecodeError::Base64 { context, source })
}
