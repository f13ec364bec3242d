use indexmap::IndexMap;
use log::{debug, trace};

use crate::{
    error::{Error, Result},
    message::{
        MAX_ACCOUNT_KEYS, MessageHeader,
        v0::{AddressLookupTableAccount, LoadedAddresses, MessageAddressTableLookup},
    },
    tx_format::{Instruction, pubkey::PublicKey},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompiledKeyMeta {
    pub is_signer: bool,
    pub is_writable: bool,
    /// Used as a program id by at least one instruction.
    pub is_invoked: bool,
}

/// Merged per-account privileges for a set of instructions.
///
/// The map is insertion ordered: the fee payer first, then keys in the order
/// instructions first reference them (program id before its accounts). That
/// order is the tie-break inside each ordering bucket, which keeps compiled
/// messages byte-identical across runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledKeys {
    payer: PublicKey,
    key_meta_map: IndexMap<PublicKey, CompiledKeyMeta>,
}

impl CompiledKeys {
    pub fn compile(instructions: &[Instruction], payer: PublicKey) -> Self {
        let mut key_meta_map = IndexMap::<PublicKey, CompiledKeyMeta>::new();
        key_meta_map.insert(
            payer,
            CompiledKeyMeta {
                is_signer: true,
                is_writable: true,
                is_invoked: false,
            },
        );

        for ix in instructions {
            key_meta_map.entry(ix.program_id).or_default().is_invoked = true;
            for account_meta in &ix.accounts {
                let meta = key_meta_map.entry(account_meta.pubkey).or_default();
                meta.is_signer |= account_meta.is_signer;
                meta.is_writable |= account_meta.is_writable;
            }
        }

        trace!(
            "compiled {} unique keys from {} instructions",
            key_meta_map.len(),
            instructions.len()
        );
        Self {
            payer,
            key_meta_map,
        }
    }

    pub fn payer(&self) -> &PublicKey {
        &self.payer
    }

    pub fn get(&self, key: &PublicKey) -> Option<&CompiledKeyMeta> {
        self.key_meta_map.get(key)
    }

    pub fn len(&self) -> usize {
        self.key_meta_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key_meta_map.is_empty()
    }

    pub fn promote_to_signer(&mut self, key: &PublicKey) -> bool {
        match self.key_meta_map.get_mut(key) {
            Some(meta) if !meta.is_signer => {
                meta.is_signer = true;
                true
            }
            _ => false,
        }
    }

    /// Moves every key that `lookup_table` can serve out of the static set.
    ///
    /// Only non-signing, non-invoked keys qualify. Writable keys are drained
    /// first, then readonly ones; each keeps its position in the table as the
    /// lookup index. Returns `None` when the table serves no key.
    pub fn try_extract_table_lookup(
        &mut self,
        lookup_table: &AddressLookupTableAccount,
    ) -> Result<Option<(MessageAddressTableLookup, LoadedAddresses)>> {
        let (writable_indexes, writable) = self.try_drain_keys_found_in_lookup_table(
            &lookup_table.key,
            &lookup_table.addresses,
            |meta| !meta.is_signer && !meta.is_invoked && meta.is_writable,
        )?;
        let (readonly_indexes, readonly) = self.try_drain_keys_found_in_lookup_table(
            &lookup_table.key,
            &lookup_table.addresses,
            |meta| !meta.is_signer && !meta.is_invoked && !meta.is_writable,
        )?;

        if writable_indexes.is_empty() && readonly_indexes.is_empty() {
            debug!("lookup table {} serves none of the message keys", lookup_table.key);
            return Ok(None);
        }

        Ok(Some((
            MessageAddressTableLookup {
                account_key: lookup_table.key,
                writable_indexes,
                readonly_indexes,
            },
            LoadedAddresses { writable, readonly },
        )))
    }

    fn try_drain_keys_found_in_lookup_table(
        &mut self,
        table_key: &PublicKey,
        table_addresses: &[PublicKey],
        key_meta_filter: impl Fn(&CompiledKeyMeta) -> bool,
    ) -> Result<(Vec<u8>, Vec<PublicKey>)> {
        let mut lookup_table_indexes = Vec::new();
        let mut drained_keys = Vec::new();

        let candidates: Vec<PublicKey> = self
            .key_meta_map
            .iter()
            .filter(|(_, meta)| key_meta_filter(meta))
            .map(|(key, _)| *key)
            .collect();

        for key in candidates {
            let Some(position) = table_addresses.iter().position(|address| *address == key)
            else {
                continue;
            };
            let index = u8::try_from(position)
                .map_err(|_| Error::LookupTableIndexOverflow { table: *table_key })?;
            lookup_table_indexes.push(index);
            self.key_meta_map.shift_remove(&key);
            drained_keys.push(key);
        }

        Ok((lookup_table_indexes, drained_keys))
    }

    pub fn try_into_message_components(self) -> Result<(MessageHeader, Vec<PublicKey>)> {
        if self.key_meta_map.len() > MAX_ACCOUNT_KEYS {
            return Err(Error::TooManyAccounts(self.key_meta_map.len()));
        }

        let bucket = |signer: bool, writable: bool| -> Vec<PublicKey> {
            self.key_meta_map
                .iter()
                .filter(|(_, meta)| meta.is_signer == signer && meta.is_writable == writable)
                .map(|(key, _)| *key)
                .collect()
        };

        let writable_signer_keys = bucket(true, true);
        let readonly_signer_keys = bucket(true, false);
        let writable_non_signer_keys = bucket(false, true);
        let readonly_non_signer_keys = bucket(false, false);

        let try_into_u8 = |num: usize| -> Result<u8> {
            u8::try_from(num).map_err(|_| Error::TooManyAccounts(self.key_meta_map.len()))
        };

        let header = MessageHeader {
            num_required_signatures: try_into_u8(
                writable_signer_keys.len() + readonly_signer_keys.len(),
            )?,
            num_readonly_signed_accounts: try_into_u8(readonly_signer_keys.len())?,
            num_readonly_unsigned_accounts: try_into_u8(readonly_non_signer_keys.len())?,
        };

        let static_account_keys = std::iter::empty()
            .chain(writable_signer_keys)
            .chain(readonly_signer_keys)
            .chain(writable_non_signer_keys)
            .chain(readonly_non_signer_keys)
            .collect();

        Ok((header, static_account_keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx_format::AccountMeta;

    fn key(seed: u8) -> PublicKey {
        PublicKey::new_from_array([seed; 32])
    }

    #[test]
    fn compile_merges_duplicate_flags() {
        let program_id = key(9);
        let (id0, id1, id2) = (key(1), key(2), key(3));
        let keys = CompiledKeys::compile(
            &[Instruction::new_with_bytes(
                program_id,
                &[0],
                vec![
                    AccountMeta::new(id0, true),
                    AccountMeta::new_readonly(id1, true),
                    AccountMeta::new(id2, false),
                    AccountMeta::new_readonly(id0, false),
                    AccountMeta::new(id1, false),
                ],
            )],
            key(100),
        );
        assert_eq!(
            keys.get(&id0),
            Some(&CompiledKeyMeta {
                is_signer: true,
                is_writable: true,
                is_invoked: false
            })
        );
        // signer flag from the first use, writable flag from the second
        assert_eq!(
            keys.get(&id1),
            Some(&CompiledKeyMeta {
                is_signer: true,
                is_writable: true,
                is_invoked: false
            })
        );
        assert!(keys.get(&program_id).expect("program").is_invoked);
        assert_eq!(keys.len(), 5);
    }

    #[test]
    fn payer_is_first_even_when_unreferenced() {
        let payer = key(200);
        let program_id = key(7);
        let keys = CompiledKeys::compile(
            &[Instruction::new_with_bytes(
                program_id,
                &[],
                vec![AccountMeta::new(key(1), true)],
            )],
            payer,
        );
        let (header, static_keys) = keys.try_into_message_components().expect("components");
        assert_eq!(static_keys, vec![payer, key(1), program_id]);
        assert_eq!(
            header,
            MessageHeader {
                num_required_signatures: 2,
                num_readonly_signed_accounts: 0,
                num_readonly_unsigned_accounts: 1,
            }
        );
    }

    #[test]
    fn payer_stays_writable_signer_when_used_readonly() {
        let payer = key(1);
        let program_id = key(2);
        let keys = CompiledKeys::compile(
            &[Instruction::new_with_bytes(
                program_id,
                &[],
                vec![AccountMeta::new_readonly(payer, false)],
            )],
            payer,
        );
        let (header, static_keys) = keys.try_into_message_components().expect("components");
        assert_eq!(static_keys, vec![payer, program_id]);
        assert_eq!(header.num_required_signatures, 1);
        assert_eq!(header.num_readonly_signed_accounts, 0);
        assert_eq!(header.num_readonly_unsigned_accounts, 1);
    }

    #[test]
    fn buckets_keep_first_seen_order() {
        let payer = key(50);
        // byte order deliberately disagrees with reference order
        let (late_a, late_b) = (key(40), key(30));
        let (ro_a, ro_b) = (key(20), key(10));
        let program_id = key(5);
        let keys = CompiledKeys::compile(
            &[
                Instruction::new_with_bytes(
                    program_id,
                    &[],
                    vec![
                        AccountMeta::new_readonly(ro_a, false),
                        AccountMeta::new(late_a, false),
                    ],
                ),
                Instruction::new_with_bytes(
                    program_id,
                    &[],
                    vec![
                        AccountMeta::new(late_b, false),
                        AccountMeta::new_readonly(ro_b, false),
                    ],
                ),
            ],
            payer,
        );
        let (header, static_keys) = keys.try_into_message_components().expect("components");
        assert_eq!(
            static_keys,
            vec![payer, late_a, late_b, program_id, ro_a, ro_b]
        );
        assert_eq!(header.num_readonly_unsigned_accounts, 3);
    }

    #[test]
    fn readonly_signers_follow_writable_signers() {
        let payer = key(1);
        let program_id = key(2);
        let keys = CompiledKeys::compile(
            &[Instruction::new_with_bytes(
                program_id,
                &[],
                vec![
                    AccountMeta::new_readonly(key(3), true),
                    AccountMeta::new(key(4), true),
                ],
            )],
            payer,
        );
        let (header, static_keys) = keys.try_into_message_components().expect("components");
        assert_eq!(static_keys, vec![payer, key(4), key(3), program_id]);
        assert_eq!(header.num_required_signatures, 3);
        assert_eq!(header.num_readonly_signed_accounts, 1);
    }

    #[test]
    fn extract_moves_only_eligible_keys() {
        let payer = key(1);
        let program_id = key(2);
        let signer = key(3);
        let writable = key(4);
        let readonly = key(5);
        let unlisted = key(6);
        let mut keys = CompiledKeys::compile(
            &[Instruction::new_with_bytes(
                program_id,
                &[],
                vec![
                    AccountMeta::new(signer, true),
                    AccountMeta::new_readonly(readonly, false),
                    AccountMeta::new(writable, false),
                    AccountMeta::new(unlisted, false),
                ],
            )],
            payer,
        );
        let table = AddressLookupTableAccount {
            key: key(99),
            addresses: vec![payer, program_id, signer, readonly, writable],
        };
        let (lookup, loaded) = keys
            .try_extract_table_lookup(&table)
            .expect("extract")
            .expect("lookup");
        assert_eq!(lookup.account_key, key(99));
        assert_eq!(lookup.writable_indexes, vec![4]);
        assert_eq!(lookup.readonly_indexes, vec![3]);
        assert_eq!(loaded.writable, vec![writable]);
        assert_eq!(loaded.readonly, vec![readonly]);

        let (_, static_keys) = keys.try_into_message_components().expect("components");
        assert_eq!(static_keys, vec![payer, signer, unlisted, program_id]);
    }

    #[test]
    fn extract_returns_none_for_unused_table() {
        let mut keys = CompiledKeys::compile(
            &[Instruction::new_with_bytes(key(2), &[], Vec::new())],
            key(1),
        );
        let table = AddressLookupTableAccount {
            key: key(99),
            addresses: vec![key(1), key(2), key(3)],
        };
        assert_eq!(keys.try_extract_table_lookup(&table).expect("extract"), None);
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn extract_rejects_index_past_255() {
        let target = key(77);
        let mut keys = CompiledKeys::compile(
            &[Instruction::new_with_bytes(
                key(2),
                &[],
                vec![AccountMeta::new(target, false)],
            )],
            key(1),
        );
        let mut addresses = vec![key(0); 256];
        addresses.push(target);
        let table = AddressLookupTableAccount {
            key: key(99),
            addresses,
        };
        assert_eq!(
            keys.try_extract_table_lookup(&table),
            Err(Error::LookupTableIndexOverflow { table: key(99) })
        );
    }

    #[test]
    fn promote_to_signer_only_touches_known_non_signers() {
        let mut keys = CompiledKeys::compile(
            &[Instruction::new_with_bytes(
                key(2),
                &[],
                vec![AccountMeta::new(key(3), false)],
            )],
            key(1),
        );
        assert!(keys.promote_to_signer(&key(3)));
        assert!(!keys.promote_to_signer(&key(3)));
        assert!(!keys.promote_to_signer(&key(1)));
        assert!(!keys.promote_to_signer(&key(42)));
        let (header, static_keys) = keys.try_into_message_components().expect("components");
        assert_eq!(static_keys, vec![key(1), key(3), key(2)]);
        assert_eq!(header.num_required_signatures, 2);
    }

    #[test]
    fn too_many_accounts() {
        let accounts = (0..=256u16)
            .map(|i| {
                let mut bytes = [0xaau8; 32];
                bytes[..2].copy_from_slice(&i.to_le_bytes());
                AccountMeta::new(PublicKey::new_from_array(bytes), false)
            })
            .collect();
        let keys = CompiledKeys::compile(
            &[Instruction::new_with_bytes(key(2), &[], accounts)],
            key(1),
        );
        assert_eq!(
            keys.try_into_message_components(),
            Err(Error::TooManyAccounts(259))
        );
    }
}
