//! Mnemonic secret codes.
//!
//! An access code is a BIP-39 word sequence that deterministically decodes
//! to fixed-length entropy. Decoded entropy, never the surface text, is the
//! authority for validation: two encodings of the same entropy authenticate
//! identically, and comparison is constant time.

use std::fmt;

use {
    bip39::{Language, Mnemonic},
    subtle::ConstantTimeEq,
    thiserror::Error,
};

/// 12 words = 128 bits of entropy.
const WORD_COUNT: usize = 12;

const LANGUAGE: Language = Language::English;

#[derive(Debug, Error)]
pub enum CodeError {
    #[error("invalid mnemonic phrase: {0}")]
    Mnemonic(#[from] bip39::Error),
}

/// Decoded secret material behind a mnemonic phrase.
///
/// Equality is constant time. The `Debug` impl does not print the bytes.
#[derive(Clone)]
pub struct Entropy(Vec<u8>);

impl Entropy {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for Entropy {
    fn eq(&self, other: &Self) -> bool {
        bool::from(self.0.ct_eq(&other.0))
    }
}

impl Eq for Entropy {}

impl fmt::Debug for Entropy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entropy({} bytes)", self.0.len())
    }
}

/// A freshly minted code: the phrase handed to a human and the entropy the
/// gateway keeps for validation.
#[derive(Debug, Clone)]
pub struct MnemonicCode {
    phrase: String,
    entropy: Entropy,
}

impl MnemonicCode {
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    pub fn entropy(&self) -> &Entropy {
        &self.entropy
    }

    pub fn into_parts(self) -> (String, Entropy) {
        (self.phrase, self.entropy)
    }
}

/// Mint a new secret code from OS randomness.
pub fn generate() -> Result<MnemonicCode, CodeError> {
    let mnemonic = Mnemonic::generate_in(LANGUAGE, WORD_COUNT)?;
    Ok(MnemonicCode {
        phrase: mnemonic.to_string(),
        entropy: Entropy(mnemonic.to_entropy()),
    })
}

/// Decode a presented phrase to its entropy. Fails on anything that is not
/// a well-formed mnemonic (wrong words, wrong count, bad checksum).
pub fn decode(phrase: &str) -> Result<Entropy, CodeError> {
    let mnemonic = Mnemonic::parse_in_normalized(LANGUAGE, phrase.trim())?;
    Ok(Entropy(mnemonic.to_entropy()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn generated_phrase_decodes_to_same_entropy() {
        let code = generate().unwrap();
        assert_eq!(code.phrase().split_whitespace().count(), WORD_COUNT);
        let decoded = decode(code.phrase()).unwrap();
        assert_eq!(decoded.len(), 16);
        assert_eq!(&decoded, code.entropy());
    }

    #[test]
    fn distinct_codes_have_distinct_entropy() {
        let a = generate().unwrap();
        let b = generate().unwrap();
        assert_ne!(a.entropy(), b.entropy());
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode("definitely not a mnemonic").is_err());
        assert!(decode("").is_err());
    }

    #[test]
    fn rejects_truncated_phrase() {
        let code = generate().unwrap();
        let eleven: Vec<&str> = code.phrase().split_whitespace().take(11).collect();
        assert!(decode(&eleven.join(" ")).is_err());
    }

    #[test]
    fn decoding_ignores_surrounding_whitespace() {
        let code = generate().unwrap();
        let padded = format!("  {}  ", code.phrase());
        assert_eq!(&decode(&padded).unwrap(), code.entropy());
    }
}
