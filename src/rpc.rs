use anyhow::{Context, Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::json;
use solana_address_lookup_table_interface::state::AddressLookupTable;
use solana_commitment_config::CommitmentConfig;
use solana_rpc_client::{
    api::{request::RpcRequest, response::Response},
    rpc_client::RpcClient,
};
use solana_sdk::{pubkey::Pubkey, slot_hashes::SlotHashes, sysvar};

use crate::{
    accounts::LOOKUP_TABLE_PROGRAM_ID,
    client::{FeeSchedule, NetworkClient},
    message::{Message, MessageHeader},
    tx_format::{blockhash::Blockhash, pubkey::PublicKey},
};

pub const LOCAL_RPC_URL: &str = "http://127.0.0.1:8899";
pub const MAINNET_RPC_URL: &str = "http://api.mainnet-beta.solana.com";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }

    pub fn to_commitment_config(self) -> CommitmentConfig {
        match self {
            Self::Processed => CommitmentConfig::processed(),
            Self::Confirmed => CommitmentConfig::confirmed(),
            Self::Finalized => CommitmentConfig::finalized(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    pub url: String,
    #[serde(default)]
    pub commitment: Commitment,
}

impl RpcConfig {
    pub fn local() -> Self {
        Self {
            url: LOCAL_RPC_URL.to_string(),
            commitment: Commitment::Confirmed,
        }
    }

    pub fn mainnet() -> Self {
        Self {
            url: MAINNET_RPC_URL.to_string(),
            commitment: Commitment::Confirmed,
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self::local()
    }
}

pub fn create_connection(config: &RpcConfig) -> RpcClient {
    RpcClient::new_with_commitment(
        config.url.clone(),
        config.commitment.to_commitment_config(),
    )
}

pub struct RpcNetworkClient {
    client: RpcClient,
    commitment: Commitment,
}

impl RpcNetworkClient {
    pub fn new(config: &RpcConfig) -> Self {
        Self {
            client: create_connection(config),
            commitment: config.commitment,
        }
    }

    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    fn fetch_slot_hashes(&self) -> Result<SlotHashes> {
        let account = self.client.get_account(&sysvar::slot_hashes::id())?;
        let hashes: SlotHashes =
            bincode::deserialize(&account.data).map_err(|_| anyhow!("Invalid slot hashes data"))?;
        Ok(hashes)
    }
}

fn to_pubkey(key: &PublicKey) -> Pubkey {
    Pubkey::new_from_array(key.to_bytes())
}

fn from_pubkey(key: &Pubkey) -> PublicKey {
    PublicKey::new_from_array(key.to_bytes())
}

impl NetworkClient for RpcNetworkClient {
    fn latest_blockhash(&self) -> Result<Blockhash> {
        let (blockhash, _) = self
            .client
            .get_latest_blockhash_with_commitment(self.commitment.to_commitment_config())
            .context("failed to get latest blockhash")?;
        Ok(Blockhash::new_from_array(blockhash.to_bytes()))
    }

    fn lookup_table_contents(&self, address: &PublicKey) -> Result<Option<Vec<PublicKey>>> {
        let commitment = self.commitment.to_commitment_config();
        let Some(account) = self
            .client
            .get_account_with_commitment(&to_pubkey(address), commitment)?
            .value
        else {
            return Ok(None);
        };
        if from_pubkey(&account.owner) != LOOKUP_TABLE_PROGRAM_ID {
            return Err(anyhow!(
                "account {address} is not an address lookup table (owner {})",
                account.owner
            ));
        }

        let table = AddressLookupTable::deserialize(&account.data)
            .map_err(|_| anyhow!("Failed to deserialize address lookup table"))?;
        let current_slot = self.client.get_slot_with_commitment(commitment)?;
        let slot_hashes = self.fetch_slot_hashes()?;
        if !table.meta.is_active(current_slot, &slot_hashes) {
            debug!("lookup table {address} is deactivated");
            return Ok(None);
        }
        debug!("fetched lookup table {address} with {} addresses", table.addresses.len());
        Ok(Some(table.addresses.iter().map(from_pubkey).collect()))
    }

    fn fee_for_message(&self, message: &[u8]) -> Result<Option<u64>> {
        let response: Response<Option<u64>> = self
            .client
            .send(
                RpcRequest::GetFeeForMessage,
                json!([
                    STANDARD.encode(message),
                    { "commitment": self.commitment.as_str() }
                ]),
            )
            .context("getFeeForMessage failed")?;
        Ok(response.value)
    }

    fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64> {
        Ok(self
            .client
            .get_minimum_balance_for_rent_exemption(data_len)?)
    }

    /// Prices a message with a single signature and nothing else.
    fn fees(&self) -> Result<FeeSchedule> {
        let probe = Message {
            header: MessageHeader {
                num_required_signatures: 1,
                num_readonly_signed_accounts: 0,
                num_readonly_unsigned_accounts: 0,
            },
            account_keys: vec![PublicKey::new_from_array([1u8; 32])],
            recent_blockhash: self.latest_blockhash()?,
            instructions: Vec::new(),
        };
        let lamports_per_signature = self
            .fee_for_message(&probe.serialize())?
            .ok_or_else(|| anyhow!("fee schedule unavailable"))?;
        Ok(FeeSchedule {
            lamports_per_signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_default_to_confirmed() {
        assert_eq!(RpcConfig::default(), RpcConfig::local());
        assert_eq!(RpcConfig::mainnet().url, MAINNET_RPC_URL);
        assert_eq!(
            RpcConfig::local().commitment.to_commitment_config(),
            CommitmentConfig::confirmed()
        );
    }

    #[test]
    fn config_from_json() {
        let config: RpcConfig = serde_json::from_str(
            r#"{"url": "https://api.devnet.solana.com", "commitment": "finalized"}"#,
        )
        .expect("config");
        assert_eq!(config.commitment, Commitment::Finalized);
        assert_eq!(config.commitment.as_str(), "finalized");

        let config: RpcConfig =
            serde_json::from_str(r#"{"url": "http://localhost:8899"}"#).expect("config");
        assert_eq!(config.commitment, Commitment::Confirmed);
    }

    #[test]
    fn connection_uses_configured_commitment() {
        let config = RpcConfig {
            url: LOCAL_RPC_URL.to_string(),
            commitment: Commitment::Processed,
        };
        let network = RpcNetworkClient::new(&config);
        assert_eq!(network.client().commitment(), CommitmentConfig::processed());
        assert_eq!(network.client().url(), LOCAL_RPC_URL);
    }

    #[test]
    fn key_conversions_preserve_bytes() {
        let key = LOOKUP_TABLE_PROGRAM_ID;
        assert_eq!(to_pubkey(&key).to_string(), key.to_string());
        assert_eq!(from_pubkey(&to_pubkey(&key)), key);
    }
}
