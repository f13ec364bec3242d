use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::tx_format::pubkey::PublicKey;

pub mod blockhash;
pub mod data_format;
pub mod pubkey;
pub mod short_vec;
pub mod signature;

/// An account an instruction touches, with the privileges it needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub pubkey: PublicKey,
    #[serde(default)]
    pub is_signer: bool,
    #[serde(default)]
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn new(pubkey: PublicKey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn new_readonly(pubkey: PublicKey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// A call into an on-chain program. Data is opaque to this crate and travels
/// as base64 in JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub program_id: PublicKey,
    #[serde(default)]
    pub accounts: Vec<AccountMeta>,
    #[serde(
        default,
        serialize_with = "serialize_base64",
        deserialize_with = "deserialize_base64"
    )]
    pub data: Vec<u8>,
}

impl Instruction {
    pub fn new_with_bytes(program_id: PublicKey, data: &[u8], accounts: Vec<AccountMeta>) -> Self {
        Self {
            program_id,
            accounts,
            data: data.to_vec(),
        }
    }
}

fn serialize_base64<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(data))
}

fn deserialize_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let text = String::deserialize(deserializer)?;
    STANDARD
        .decode(text)
        .map_err(|_| de::Error::custom("Invalid base64 string"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{AccountMeta, Instruction};
    use crate::accounts::SYSTEM_PROGRAM_ID;
    use crate::tx_format::pubkey::PublicKey;

    #[test]
    fn instruction_from_json() {
        let to = PublicKey::new_from_array([3u8; 32]);
        let value = json!({
            "program_id": "11111111111111111111111111111111",
            "accounts": [
                {"pubkey": to.to_string(), "is_writable": true}
            ],
            "data": "AgAAAGQAAAAAAAAA"
        });
        let ix: Instruction = serde_json::from_value(value).expect("instruction");
        assert_eq!(ix.program_id, SYSTEM_PROGRAM_ID);
        assert_eq!(ix.accounts, vec![AccountMeta::new(to, false)]);
        assert_eq!(ix.data, vec![2, 0, 0, 0, 100, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn instruction_to_json() {
        let ix = Instruction::new_with_bytes(SYSTEM_PROGRAM_ID, &[1, 2, 3], Vec::new());
        let value = serde_json::to_value(&ix).expect("json");
        assert_eq!(value["data"], json!("AQID"));
        assert_eq!(value["program_id"], json!("11111111111111111111111111111111"));
    }

    #[test]
    fn rejects_bad_data_encoding() {
        let value = json!({
            "program_id": "11111111111111111111111111111111",
            "data": "%%%"
        });
        assert!(serde_json::from_value::<Instruction>(value).is_err());
    }
}
