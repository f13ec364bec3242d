use std::collections::HashMap;

use crate::{
    error::{Error, Result},
    message::{CompiledInstruction, MAX_ACCOUNT_KEYS, v0::LoadedAddresses},
    tx_format::{Instruction, pubkey::PublicKey},
};

/// The full key space a compiled instruction indexes into:
/// static keys, then lookup-writable keys, then lookup-readonly keys.
#[derive(Clone, Copy, Debug, Default)]
pub struct MessageAccountKeys<'a> {
    static_keys: &'a [PublicKey],
    loaded: Option<&'a LoadedAddresses>,
}

impl<'a> MessageAccountKeys<'a> {
    pub fn new(static_keys: &'a [PublicKey], loaded: Option<&'a LoadedAddresses>) -> Self {
        Self {
            static_keys,
            loaded,
        }
    }

    pub fn static_keys(&self) -> &'a [PublicKey] {
        self.static_keys
    }

    fn segments(&self) -> [&'a [PublicKey]; 3] {
        match self.loaded {
            Some(loaded) => [self.static_keys, &loaded.writable, &loaded.readonly],
            None => [self.static_keys, &[], &[]],
        }
    }

    pub fn get(&self, mut index: usize) -> Option<&'a PublicKey> {
        for segment in self.segments() {
            if index < segment.len() {
                return Some(&segment[index]);
            }
            index -= segment.len();
        }
        None
    }

    pub fn len(&self) -> usize {
        self.segments().iter().map(|segment| segment.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a PublicKey> + use<'a> {
        self.segments().into_iter().flatten()
    }

    /// Rewrites program ids and account references into one-byte indexes
    /// against this key space.
    pub fn try_compile_instructions(
        &self,
        instructions: &[Instruction],
    ) -> Result<Vec<CompiledInstruction>> {
        let num_keys = self.len();
        if num_keys > MAX_ACCOUNT_KEYS {
            return Err(Error::TooManyAccounts(num_keys));
        }

        let mut key_index_map = HashMap::with_capacity(num_keys);
        for (index, key) in self.iter().enumerate() {
            // `num_keys <= 256` so every position fits in a byte
            key_index_map.entry(*key).or_insert(index as u8);
        }
        let get_index = |key: &PublicKey| -> Result<u8> {
            key_index_map
                .get(key)
                .copied()
                .ok_or(Error::UnknownAccountKey(*key))
        };

        instructions
            .iter()
            .map(|ix| {
                let program_id_index = get_index(&ix.program_id)?;
                // index 0 is the fee payer
                if program_id_index == 0 {
                    return Err(Error::FeePayerInvoked(ix.program_id));
                }
                let accounts = ix
                    .accounts
                    .iter()
                    .map(|account_meta| get_index(&account_meta.pubkey))
                    .collect::<Result<Vec<u8>>>()?;
                Ok(CompiledInstruction {
                    program_id_index,
                    accounts,
                    data: ix.data.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::MessageAccountKeys;
    use crate::{
        error::Error,
        message::{CompiledInstruction, v0::LoadedAddresses},
        tx_format::{AccountMeta, Instruction, pubkey::PublicKey},
    };

    fn key(seed: u8) -> PublicKey {
        PublicKey::new_from_array([seed; 32])
    }

    #[test]
    fn indexes_span_static_then_loaded_keys() {
        let static_keys = vec![key(1), key(2)];
        let loaded = LoadedAddresses {
            writable: vec![key(3)],
            readonly: vec![key(4), key(5)],
        };
        let keys = MessageAccountKeys::new(&static_keys, Some(&loaded));
        assert_eq!(keys.len(), 5);
        assert_eq!(keys.get(0), Some(&key(1)));
        assert_eq!(keys.get(2), Some(&key(3)));
        assert_eq!(keys.get(4), Some(&key(5)));
        assert_eq!(keys.get(5), None);
        assert_eq!(
            keys.iter().copied().collect::<Vec<_>>(),
            vec![key(1), key(2), key(3), key(4), key(5)]
        );
    }

    #[test]
    fn compiles_instruction_indexes() {
        let static_keys = vec![key(1), key(2), key(9)];
        let loaded = LoadedAddresses {
            writable: vec![key(3)],
            readonly: vec![key(4)],
        };
        let keys = MessageAccountKeys::new(&static_keys, Some(&loaded));
        let compiled = keys
            .try_compile_instructions(&[Instruction::new_with_bytes(
                key(9),
                &[7, 7],
                vec![
                    AccountMeta::new(key(1), true),
                    AccountMeta::new_readonly(key(4), false),
                    AccountMeta::new(key(3), false),
                ],
            )])
            .expect("compile");
        assert_eq!(
            compiled,
            vec![CompiledInstruction {
                program_id_index: 2,
                accounts: vec![0, 4, 3],
                data: vec![7, 7],
            }]
        );
    }

    #[test]
    fn unknown_key_is_an_error() {
        let static_keys = vec![key(1), key(2)];
        let keys = MessageAccountKeys::new(&static_keys, None);
        let result = keys.try_compile_instructions(&[Instruction::new_with_bytes(
            key(2),
            &[],
            vec![AccountMeta::new(key(8), false)],
        )]);
        assert_eq!(result, Err(Error::UnknownAccountKey(key(8))));
    }

    #[test]
    fn fee_payer_cannot_be_the_program() {
        let static_keys = vec![key(1), key(2)];
        let keys = MessageAccountKeys::new(&static_keys, None);
        let result = keys.try_compile_instructions(&[Instruction::new_with_bytes(
            key(1),
            &[],
            vec![AccountMeta::new(key(2), false)],
        )]);
        assert_eq!(result, Err(Error::FeePayerInvoked(key(1))));
    }

    #[test]
    fn key_space_over_256_is_rejected() {
        let static_keys: Vec<PublicKey> = (0..200u8).map(key).collect();
        let loaded = LoadedAddresses {
            writable: (0..57u8).map(|i| key(i.wrapping_add(200))).collect(),
            readonly: Vec::new(),
        };
        let keys = MessageAccountKeys::new(&static_keys, Some(&loaded));
        assert_eq!(keys.len(), 257);
        assert_eq!(
            keys.try_compile_instructions(&[]),
            Err(Error::TooManyAccounts(257))
        );
    }
}
