pub mod accounts;
pub mod client;
pub mod error;
pub mod keypair;
pub mod message;
pub mod rpc;
pub mod transaction;
pub mod tx_format;

pub use crate::{
    client::{FeeEstimate, FeeSchedule, NetworkClient, estimate_fees},
    error::{Error, Result},
    keypair::{Keypair, Signer},
    message::{AddressLookupTableAccount, Message, MessageHeader, MessageV0, VersionedMessage},
    rpc::{RpcConfig, RpcNetworkClient},
    transaction::{NonceInfo, SerializeConfig, Transaction, VersionedTransaction},
    tx_format::{
        AccountMeta, Instruction, blockhash::Blockhash, pubkey::PublicKey, signature::Signature,
    },
};

/// Compiles a message: legacy without lookup tables, v0 with them.
pub fn build_message(
    instructions: &[Instruction],
    fee_payer: &PublicKey,
    recent_blockhash: Blockhash,
    lookup_tables: Option<&[AddressLookupTableAccount]>,
) -> Result<VersionedMessage> {
    match lookup_tables {
        Some(tables) => {
            MessageV0::try_compile(fee_payer, instructions, tables, recent_blockhash)
                .map(VersionedMessage::V0)
        }
        None => Message::try_compile(fee_payer, instructions, recent_blockhash)
            .map(VersionedMessage::Legacy),
    }
}

pub fn sign(mut transaction: Transaction, signers: &[&dyn Signer]) -> Result<Transaction> {
    transaction.sign(signers)?;
    Ok(transaction)
}

pub fn serialize(transaction: &Transaction, config: SerializeConfig) -> Result<Vec<u8>> {
    transaction.serialize(config)
}

/// Parses a serialized message of either version.
pub fn parse(bytes: &[u8]) -> Result<VersionedMessage> {
    VersionedMessage::deserialize(bytes)
}
