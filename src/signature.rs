//! Signed digest-list envelopes.
//!
//! A signed digest list is the plain text list prefixed with a single line
//! carrying a hex-encoded ed25519 signature over the remaining bytes. The
//! verifying key lives on disk as 64 hex characters.

use crate::error::DigestError;
use ed25519_dalek::{Signature, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
use std::path::Path;

/// Imports a verifying key stored as hex text at `path`.
pub fn load_verifying_key(path: &Path) -> Result<VerifyingKey, DigestError> {
    let key_import = |reason: String| DigestError::KeyImport {
        path: path.to_path_buf(),
        reason,
    };

    let text = std::fs::read_to_string(path).map_err(|err| key_import(err.to_string()))?;
    let bytes = hex::decode(text.trim()).map_err(|err| key_import(err.to_string()))?;
    let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes
        .try_into()
        .map_err(|_| key_import(format!("key is not {} bytes", PUBLIC_KEY_LENGTH)))?;
    VerifyingKey::from_bytes(&bytes).map_err(|err| key_import(err.to_string()))
}

/// Checks the envelope signature and returns the trusted plaintext.
pub fn verify_envelope(raw: &[u8], key: &VerifyingKey) -> Result<String, DigestError> {
    let text =
        std::str::from_utf8(raw).map_err(|_| DigestError::MalformedEnvelope("not valid UTF-8"))?;
    let (sig_line, plaintext) = text
        .split_once('\n')
        .ok_or(DigestError::MalformedEnvelope("missing signature line"))?;

    let sig_bytes = hex::decode(sig_line.trim())
        .map_err(|_| DigestError::MalformedEnvelope("signature line is not hex"))?;
    let sig_bytes: [u8; SIGNATURE_LENGTH] = sig_bytes
        .try_into()
        .map_err(|_| DigestError::MalformedEnvelope("signature has the wrong length"))?;
    let signature = Signature::from_bytes(&sig_bytes);

    key.verify(plaintext.as_bytes(), &signature)
        .map_err(|_| DigestError::BadSignature)?;
    Ok(plaintext.to_string())
}
