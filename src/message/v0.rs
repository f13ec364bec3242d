use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    message::{
        CompiledInstruction, MAX_ACCOUNT_KEYS, MESSAGE_VERSION_PREFIX, MessageHeader,
        account_keys::MessageAccountKeys, compiled_keys::CompiledKeys, read_message_body,
        sanitize_body, write_message_body,
    },
    tx_format::{
        Instruction,
        blockhash::Blockhash,
        data_format::{ByteReader, write_compact_bytes},
        pubkey::PublicKey,
        short_vec,
    },
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAddressTableLookup {
    pub account_key: PublicKey,
    pub writable_indexes: Vec<u8>,
    pub readonly_indexes: Vec<u8>,
}

impl MessageAddressTableLookup {
    pub fn num_accounts(&self) -> usize {
        self.writable_indexes.len() + self.readonly_indexes.len()
    }
}

/// Addresses resolved from lookups. Never persisted, recomputed from live
/// table contents whenever a message is consumed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadedAddresses {
    pub writable: Vec<PublicKey>,
    pub readonly: Vec<PublicKey>,
}

impl LoadedAddresses {
    pub fn len(&self) -> usize {
        self.writable.len() + self.readonly.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writable.is_empty() && self.readonly.is_empty()
    }
}

impl FromIterator<LoadedAddresses> for LoadedAddresses {
    fn from_iter<T: IntoIterator<Item = LoadedAddresses>>(iter: T) -> Self {
        let (writable, readonly): (Vec<Vec<PublicKey>>, Vec<Vec<PublicKey>>) = iter
            .into_iter()
            .map(|addresses| (addresses.writable, addresses.readonly))
            .unzip();
        Self {
            writable: writable.into_iter().flatten().collect(),
            readonly: readonly.into_iter().flatten().collect(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressLookupTableAccount {
    pub key: PublicKey,
    pub addresses: Vec<PublicKey>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageV0 {
    pub header: MessageHeader,
    pub account_keys: Vec<PublicKey>,
    pub recent_blockhash: Blockhash,
    pub instructions: Vec<CompiledInstruction>,
    pub address_table_lookups: Vec<MessageAddressTableLookup>,
}

impl MessageV0 {
    /// Compiles `instructions`, moving every eligible key found in
    /// `address_lookup_table_accounts` out of the static list. Tables are
    /// consulted in order; a table serving no key is left out.
    pub fn try_compile(
        payer: &PublicKey,
        instructions: &[Instruction],
        address_lookup_table_accounts: &[AddressLookupTableAccount],
        recent_blockhash: Blockhash,
    ) -> Result<Self> {
        if instructions.is_empty() {
            return Err(Error::NoInstructions);
        }
        let compiled_keys = CompiledKeys::compile(instructions, *payer);
        Self::try_compile_with_keys(
            compiled_keys,
            instructions,
            address_lookup_table_accounts,
            recent_blockhash,
        )
    }

    pub fn try_compile_with_keys(
        mut compiled_keys: CompiledKeys,
        instructions: &[Instruction],
        address_lookup_table_accounts: &[AddressLookupTableAccount],
        recent_blockhash: Blockhash,
    ) -> Result<Self> {
        let mut address_table_lookups = Vec::with_capacity(address_lookup_table_accounts.len());
        let mut loaded_addresses_list = Vec::with_capacity(address_lookup_table_accounts.len());
        for lookup_table_account in address_lookup_table_accounts {
            if let Some((lookup, loaded_addresses)) =
                compiled_keys.try_extract_table_lookup(lookup_table_account)?
            {
                address_table_lookups.push(lookup);
                loaded_addresses_list.push(loaded_addresses);
            }
        }

        let (header, static_keys) = compiled_keys.try_into_message_components()?;
        let loaded_addresses = LoadedAddresses::from_iter(loaded_addresses_list);
        let account_keys = MessageAccountKeys::new(&static_keys, Some(&loaded_addresses));
        let instructions = account_keys.try_compile_instructions(instructions)?;

        Ok(Self {
            header,
            account_keys: static_keys,
            recent_blockhash,
            instructions,
            address_table_lookups,
        })
    }

    /// Resolves every lookup against live table contents. An index past the
    /// end of a table is an error, never clamped.
    pub fn resolve_address_table_lookups(
        &self,
        tables: &[AddressLookupTableAccount],
    ) -> Result<LoadedAddresses> {
        let mut loaded = LoadedAddresses::default();
        for lookup in &self.address_table_lookups {
            let table = tables
                .iter()
                .find(|table| table.key == lookup.account_key)
                .ok_or(Error::MissingLookupTable(lookup.account_key))?;
            let resolve = |index: &u8| -> Result<PublicKey> {
                table
                    .addresses
                    .get(usize::from(*index))
                    .copied()
                    .ok_or(Error::LookupIndexOutOfRange {
                        table: table.key,
                        index: *index,
                        len: table.addresses.len(),
                    })
            };
            for index in &lookup.writable_indexes {
                loaded.writable.push(resolve(index)?);
            }
            for index in &lookup.readonly_indexes {
                loaded.readonly.push(resolve(index)?);
            }
        }
        Ok(loaded)
    }

    pub fn account_keys<'a>(
        &'a self,
        loaded_addresses: Option<&'a LoadedAddresses>,
    ) -> MessageAccountKeys<'a> {
        MessageAccountKeys::new(&self.account_keys, loaded_addresses)
    }

    pub fn num_account_keys_from_lookups(&self) -> usize {
        self.address_table_lookups
            .iter()
            .map(MessageAddressTableLookup::num_accounts)
            .sum()
    }

    fn num_lookup_writable(&self) -> usize {
        self.address_table_lookups
            .iter()
            .map(|lookup| lookup.writable_indexes.len())
            .sum()
    }

    pub fn is_account_signer(&self, index: usize) -> bool {
        index < usize::from(self.header.num_required_signatures)
    }

    /// Static keys follow the header rule; lookup-derived keys are writable
    /// when they fall inside the aggregate writable partition.
    pub fn is_account_writable(&self, index: usize) -> bool {
        let num_static = self.account_keys.len();
        let num_signers = usize::from(self.header.num_required_signatures);
        if index < num_static {
            if index < num_signers {
                index
                    < num_signers
                        .saturating_sub(usize::from(self.header.num_readonly_signed_accounts))
            } else {
                index
                    < num_static
                        .saturating_sub(usize::from(self.header.num_readonly_unsigned_accounts))
            }
        } else {
            index - num_static < self.num_lookup_writable()
        }
    }

    pub fn signer_keys(&self) -> &[PublicKey] {
        let num_signers =
            usize::from(self.header.num_required_signatures).min(self.account_keys.len());
        &self.account_keys[..num_signers]
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 3 + self.account_keys.len() * 32 + 64);
        out.push(MESSAGE_VERSION_PREFIX);
        write_message_body(
            &mut out,
            &self.header,
            &self.account_keys,
            &self.recent_blockhash,
            &self.instructions,
        );
        short_vec::encode_len(&mut out, self.address_table_lookups.len());
        for lookup in &self.address_table_lookups {
            out.extend_from_slice(lookup.account_key.as_ref());
            write_compact_bytes(&mut out, &lookup.writable_indexes);
            write_compact_bytes(&mut out, &lookup.readonly_indexes);
        }
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let prefix = reader.read_u8().map_err(|_| Error::EmptyBuffer)?;
        if prefix & MESSAGE_VERSION_PREFIX == 0 {
            return Err(Error::InvalidMessage(
                "legacy message passed to the v0 decoder".to_string(),
            ));
        }
        let version = prefix & !MESSAGE_VERSION_PREFIX;
        if version != 0 {
            return Err(Error::UnsupportedVersion(version));
        }

        let body = read_message_body(&mut reader)?;
        let num_lookups = reader.read_compact_len()?;
        let mut address_table_lookups = Vec::with_capacity(num_lookups.min(MAX_ACCOUNT_KEYS));
        for _ in 0..num_lookups {
            address_table_lookups.push(MessageAddressTableLookup {
                account_key: reader.read_public_key()?,
                writable_indexes: reader.read_compact_bytes()?,
                readonly_indexes: reader.read_compact_bytes()?,
            });
        }
        reader.finish()?;

        let message = Self {
            header: body.header,
            account_keys: body.account_keys,
            recent_blockhash: body.recent_blockhash,
            instructions: body.instructions,
            address_table_lookups,
        };
        message.sanitize()?;
        Ok(message)
    }

    pub fn sanitize(&self) -> Result<()> {
        if let Some(lookup) = self
            .address_table_lookups
            .iter()
            .find(|lookup| lookup.num_accounts() == 0)
        {
            return Err(Error::InvalidMessage(format!(
                "lookup of table {} loads no accounts",
                lookup.account_key
            )));
        }
        sanitize_body(
            &self.header,
            &self.account_keys,
            &self.instructions,
            self.account_keys.len() + self.num_account_keys_from_lookups(),
        )
    }
}
