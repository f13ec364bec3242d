use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::{Error, Result};

pub const BLOCKHASH_LENGTH: usize = 32;

/// Recent ledger checkpoint embedded in every message.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Blockhash([u8; BLOCKHASH_LENGTH]);

impl Blockhash {
    pub const fn new_from_array(bytes: [u8; BLOCKHASH_LENGTH]) -> Self {
        Self(bytes)
    }

    pub const fn to_bytes(self) -> [u8; BLOCKHASH_LENGTH] {
        self.0
    }
}

impl AsRef<[u8]> for Blockhash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Blockhash {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        bytes.try_into().map(Self).map_err(|_| {
            Error::InvalidBlockhash(format!(
                "expected {BLOCKHASH_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })
    }
}

impl FromStr for Blockhash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|err| Error::InvalidBlockhash(format!("{s}: {err}")))?;
        Self::try_from(bytes.as_slice())
    }
}

impl fmt::Display for Blockhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Blockhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blockhash({self})")
    }
}

impl Serialize for Blockhash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Blockhash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Blockhash::from_str(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::Blockhash;

    #[test]
    fn parse_blockhash() {
        let text = "DSfeYUm7WDw1YnKodR361rg8sUzUCGdat9V7fSKPFgzq";
        let hash = Blockhash::from_str(text).expect("blockhash");
        assert_eq!(hash.to_string(), text);
        assert_eq!(hash.to_bytes()[0], 0xb8);
        assert_eq!(hash.to_bytes()[31], 0xa6);
    }

    #[test]
    fn rejects_short_blockhash() {
        assert!(Blockhash::from_str("abc").is_err());
        assert!(Blockhash::try_from(&[1u8; 16][..]).is_err());
    }
}
