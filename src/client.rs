use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    message::{AddressLookupTableAccount, LoadedAddresses, MessageV0, VersionedMessage},
    tx_format::{blockhash::Blockhash, pubkey::PublicKey},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSchedule {
    pub lamports_per_signature: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeEstimate {
    pub transaction: u64,
    pub account_creation: u64,
}

impl FeeEstimate {
    pub fn total(&self) -> u64 {
        self.transaction.saturating_add(self.account_creation)
    }
}

pub trait NetworkClient {
    fn latest_blockhash(&self) -> Result<Blockhash>;

    /// `None` when the table does not exist (or can no longer be used).
    fn lookup_table_contents(&self, address: &PublicKey) -> Result<Option<Vec<PublicKey>>>;

    /// Fee for a serialized message; `None` when the network cannot price it,
    /// e.g. because its blockhash is unknown.
    fn fee_for_message(&self, message: &[u8]) -> Result<Option<u64>>;

    fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64>;

    fn fees(&self) -> Result<FeeSchedule>;
}

pub fn fetch_lookup_tables<C: NetworkClient + ?Sized>(
    client: &C,
    addresses: &[PublicKey],
) -> Result<Vec<AddressLookupTableAccount>> {
    addresses
        .iter()
        .map(|address| {
            let addresses = client
                .lookup_table_contents(address)
                .with_context(|| format!("failed to fetch lookup table {address}"))?
                .ok_or(Error::MissingLookupTable(*address))?;
            debug!("lookup table {address} holds {} addresses", addresses.len());
            Ok(AddressLookupTableAccount {
                key: *address,
                addresses,
            })
        })
        .collect()
}

pub fn load_message_addresses<C: NetworkClient + ?Sized>(
    client: &C,
    message: &MessageV0,
) -> Result<LoadedAddresses> {
    let table_keys: Vec<PublicKey> = message
        .address_table_lookups
        .iter()
        .map(|lookup| lookup.account_key)
        .collect();
    let tables = fetch_lookup_tables(client, &table_keys)?;
    Ok(message.resolve_address_table_lookups(&tables)?)
}

/// Estimates what submitting `message` costs, plus rent for the accounts it
/// creates (`new_account_sizes` in bytes).
pub fn estimate_fees<C: NetworkClient + ?Sized>(
    client: &C,
    message: &VersionedMessage,
    new_account_sizes: &[usize],
) -> Result<FeeEstimate> {
    let transaction = match client
        .fee_for_message(&message.serialize())
        .context("failed to get fee for message")?
    {
        Some(fee) => fee,
        None => {
            let num_signatures = u64::from(message.header().num_required_signatures);
            let schedule = client.fees().context("failed to get fee schedule")?;
            debug!(
                "message fee unavailable, using {} lamports per signature",
                schedule.lamports_per_signature
            );
            schedule.lamports_per_signature.saturating_mul(num_signatures)
        }
    };

    let mut account_creation = 0u64;
    for data_len in new_account_sizes {
        let rent = client
            .minimum_balance_for_rent_exemption(*data_len)
            .with_context(|| format!("failed to get rent exemption for {data_len} bytes"))?;
        account_creation = account_creation.saturating_add(rent);
    }

    Ok(FeeEstimate {
        transaction,
        account_creation,
    })
}
