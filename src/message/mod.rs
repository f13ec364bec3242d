use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    tx_format::{
        blockhash::Blockhash,
        data_format::{ByteReader, write_compact_bytes},
        pubkey::PublicKey,
        short_vec,
    },
};

pub mod account_keys;
pub mod compiled_keys;
pub mod legacy;
pub mod v0;

pub use account_keys::MessageAccountKeys;
pub use compiled_keys::CompiledKeys;
pub use legacy::Message;
pub use v0::{AddressLookupTableAccount, LoadedAddresses, MessageAddressTableLookup, MessageV0};

/// High bit of the first message byte marks a versioned message.
pub const MESSAGE_VERSION_PREFIX: u8 = 0x80;

pub const MESSAGE_HEADER_LENGTH: usize = 3;

pub const MAX_ACCOUNT_KEYS: usize = 256;

/// Counts that make every account's role decodable from its position.
///
/// Keys are laid out as writable signers, readonly signers, writable
/// non-signers, readonly non-signers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageVersion {
    Legacy,
    V0,
}

pub fn deserialize_message_version(bytes: &[u8]) -> Result<MessageVersion> {
    let prefix = *bytes.first().ok_or(Error::EmptyBuffer)?;
    if prefix & MESSAGE_VERSION_PREFIX == 0 {
        return Ok(MessageVersion::Legacy);
    }
    match prefix & !MESSAGE_VERSION_PREFIX {
        0 => Ok(MessageVersion::V0),
        version => Err(Error::UnsupportedVersion(version)),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionedMessage {
    Legacy(Message),
    V0(MessageV0),
}

impl VersionedMessage {
    pub fn version(&self) -> MessageVersion {
        match self {
            Self::Legacy(_) => MessageVersion::Legacy,
            Self::V0(_) => MessageVersion::V0,
        }
    }

    pub fn header(&self) -> &MessageHeader {
        match self {
            Self::Legacy(message) => &message.header,
            Self::V0(message) => &message.header,
        }
    }

    pub fn static_account_keys(&self) -> &[PublicKey] {
        match self {
            Self::Legacy(message) => &message.account_keys,
            Self::V0(message) => &message.account_keys,
        }
    }

    pub fn recent_blockhash(&self) -> &Blockhash {
        match self {
            Self::Legacy(message) => &message.recent_blockhash,
            Self::V0(message) => &message.recent_blockhash,
        }
    }

    /// The only field that may change after compilation; must happen before
    /// signing since the blockhash is part of the signed bytes.
    pub fn set_recent_blockhash(&mut self, blockhash: Blockhash) {
        match self {
            Self::Legacy(message) => message.recent_blockhash = blockhash,
            Self::V0(message) => message.recent_blockhash = blockhash,
        }
    }

    pub fn instructions(&self) -> &[CompiledInstruction] {
        match self {
            Self::Legacy(message) => &message.instructions,
            Self::V0(message) => &message.instructions,
        }
    }

    pub fn address_table_lookups(&self) -> Option<&[MessageAddressTableLookup]> {
        match self {
            Self::Legacy(_) => None,
            Self::V0(message) => Some(&message.address_table_lookups),
        }
    }

    pub fn fee_payer(&self) -> Option<&PublicKey> {
        self.static_account_keys().first()
    }

    pub fn signer_keys(&self) -> &[PublicKey] {
        let keys = self.static_account_keys();
        let num_signers = usize::from(self.header().num_required_signatures).min(keys.len());
        &keys[..num_signers]
    }

    pub fn is_account_signer(&self, index: usize) -> bool {
        index < usize::from(self.header().num_required_signatures)
    }

    pub fn is_account_writable(&self, index: usize) -> bool {
        match self {
            Self::Legacy(message) => message.is_account_writable(index),
            Self::V0(message) => message.is_account_writable(index),
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Self::Legacy(message) => message.serialize(),
            Self::V0(message) => message.serialize(),
        }
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        match deserialize_message_version(bytes)? {
            MessageVersion::Legacy => Message::deserialize(bytes).map(Self::Legacy),
            MessageVersion::V0 => MessageV0::deserialize(bytes).map(Self::V0),
        }
    }

    pub fn sanitize(&self) -> Result<()> {
        match self {
            Self::Legacy(message) => message.sanitize(),
            Self::V0(message) => message.sanitize(),
        }
    }
}

impl From<Message> for VersionedMessage {
    fn from(message: Message) -> Self {
        Self::Legacy(message)
    }
}

impl From<MessageV0> for VersionedMessage {
    fn from(message: MessageV0) -> Self {
        Self::V0(message)
    }
}

pub(crate) fn write_message_body(
    out: &mut Vec<u8>,
    header: &MessageHeader,
    account_keys: &[PublicKey],
    recent_blockhash: &Blockhash,
    instructions: &[CompiledInstruction],
) {
    out.extend_from_slice(&[
        header.num_required_signatures,
        header.num_readonly_signed_accounts,
        header.num_readonly_unsigned_accounts,
    ]);
    short_vec::encode_len(out, account_keys.len());
    for key in account_keys {
        out.extend_from_slice(key.as_ref());
    }
    out.extend_from_slice(recent_blockhash.as_ref());
    short_vec::encode_len(out, instructions.len());
    for ix in instructions {
        out.push(ix.program_id_index);
        write_compact_bytes(out, &ix.accounts);
        write_compact_bytes(out, &ix.data);
    }
}

pub(crate) struct MessageBody {
    pub header: MessageHeader,
    pub account_keys: Vec<PublicKey>,
    pub recent_blockhash: Blockhash,
    pub instructions: Vec<CompiledInstruction>,
}

pub(crate) fn read_message_body(reader: &mut ByteReader<'_>) -> Result<MessageBody> {
    let header = MessageHeader {
        num_required_signatures: reader.read_u8()?,
        num_readonly_signed_accounts: reader.read_u8()?,
        num_readonly_unsigned_accounts: reader.read_u8()?,
    };

    let num_keys = reader.read_compact_len()?;
    let mut account_keys = Vec::with_capacity(num_keys.min(MAX_ACCOUNT_KEYS));
    for _ in 0..num_keys {
        account_keys.push(reader.read_public_key()?);
    }

    let recent_blockhash = reader.read_blockhash()?;

    let num_instructions = reader.read_compact_len()?;
    let mut instructions = Vec::with_capacity(num_instructions.min(reader.remaining()));
    for _ in 0..num_instructions {
        let program_id_index = reader.read_u8()?;
        let accounts = reader.read_compact_bytes()?;
        let data = reader.read_compact_bytes()?;
        instructions.push(CompiledInstruction {
            program_id_index,
            accounts,
            data,
        });
    }

    Ok(MessageBody {
        header,
        account_keys,
        recent_blockhash,
        instructions,
    })
}

/// Structural checks shared by both formats. `num_keys` is the full key
/// space: static keys plus any lookup-derived keys.
pub(crate) fn sanitize_body(
    header: &MessageHeader,
    account_keys: &[PublicKey],
    instructions: &[CompiledInstruction],
    num_keys: usize,
) -> Result<()> {
    let num_signers = usize::from(header.num_required_signatures);
    if num_signers + usize::from(header.num_readonly_unsigned_accounts) > account_keys.len() {
        return Err(Error::InvalidMessage(
            "header counts exceed the number of account keys".to_string(),
        ));
    }
    if header.num_readonly_signed_accounts >= header.num_required_signatures {
        return Err(Error::InvalidMessage(
            "message has no writable signing fee payer".to_string(),
        ));
    }
    if num_keys > MAX_ACCOUNT_KEYS {
        return Err(Error::InvalidMessage(format!(
            "message loads {num_keys} accounts, at most {MAX_ACCOUNT_KEYS} allowed"
        )));
    }

    let mut seen = std::collections::HashSet::with_capacity(account_keys.len());
    if let Some(dup) = account_keys.iter().find(|key| !seen.insert(**key)) {
        return Err(Error::InvalidMessage(format!("duplicate account key {dup}")));
    }

    for (position, ix) in instructions.iter().enumerate() {
        let program_index = usize::from(ix.program_id_index);
        // the fee payer can never be the invoked program
        if program_index == 0 || program_index >= num_keys {
            return Err(Error::InvalidMessage(format!(
                "instruction {position} has invalid program index {program_index}"
            )));
        }
        if let Some(index) = ix.accounts.iter().find(|i| usize::from(**i) >= num_keys) {
            return Err(Error::InvalidMessage(format!(
                "instruction {position} references account index {index} of {num_keys}"
            )));
        }
    }
    Ok(())
}
