use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::{Error, Result};

pub const SIGNATURE_LENGTH: usize = 64;

/// Detached Ed25519 signature. The all-zero value is the wire placeholder for
/// a slot nobody has signed yet.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; SIGNATURE_LENGTH]);

impl Signature {
    pub const PLACEHOLDER: Signature = Signature([0u8; SIGNATURE_LENGTH]);

    pub const fn new_from_array(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }

    pub const fn to_bytes(self) -> [u8; SIGNATURE_LENGTH] {
        self.0
    }

    pub fn is_placeholder(&self) -> bool {
        self.0 == [0u8; SIGNATURE_LENGTH]
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::PLACEHOLDER
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Signature {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        bytes
            .try_into()
            .map(Self)
            .map_err(|_| Error::InvalidSignatureLength(bytes.len()))
    }
}

impl FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|err| Error::InvalidSignatureEncoding(format!("{s}: {err}")))?;
        Self::try_from(bytes.as_slice())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Signature::from_str(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::Signature;
    use crate::error::Error;

    #[test]
    fn placeholder_is_zero_filled() {
        let sig = Signature::default();
        assert!(sig.is_placeholder());
        assert_eq!(sig.to_bytes(), [0u8; 64]);
    }

    #[test]
    fn base58_roundtrip() {
        let sig = Signature::new_from_array([7u8; 64]);
        let parsed = Signature::from_str(&sig.to_string()).expect("signature");
        assert_eq!(parsed, sig);
        assert!(!parsed.is_placeholder());
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(
            Signature::try_from(&[1u8; 63][..]),
            Err(Error::InvalidSignatureLength(63))
        );
        let short = bs58::encode([1u8; 32]).into_string();
        assert_eq!(
            Signature::from_str(&short),
            Err(Error::InvalidSignatureLength(32))
        );
    }

    #[test]
    fn rejects_non_base58_text() {
        assert!(matches!(
            Signature::from_str("0OIl"),
            Err(Error::InvalidSignatureEncoding(_))
        ));
    }
}
