use std::borrow::Cow;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use log::{debug, warn};

use crate::{
    error::{Error, Result},
    keypair::{Signer, verify_signature},
    message::{AddressLookupTableAccount, CompiledKeys, Message, MessageV0, VersionedMessage},
    tx_format::{
        Instruction, blockhash::Blockhash, data_format::ByteReader, pubkey::PublicKey,
        short_vec, signature::Signature,
    },
};

pub const PACKET_DATA_SIZE: usize = 1232;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SerializeConfig {
    /// Fail with `IncompleteSignatures` when any slot is unsigned.
    pub require_all_signatures: bool,
    /// Check every present signature before emitting bytes.
    pub verify_signatures: bool,
}

impl Default for SerializeConfig {
    fn default() -> Self {
        Self {
            require_all_signatures: true,
            verify_signatures: false,
        }
    }
}

/// Durable nonce in place of a recent blockhash. `nonce_instruction`
/// advances the nonce account and must run first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NonceInfo {
    pub nonce: Blockhash,
    pub nonce_instruction: Instruction,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureSlot {
    pub public_key: PublicKey,
    pub signature: Option<Signature>,
}

impl SignatureSlot {
    fn unsigned(public_key: PublicKey) -> Self {
        Self {
            public_key,
            signature: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Transaction {
    instructions: Vec<Instruction>,
    fee_payer: Option<PublicKey>,
    recent_blockhash: Option<Blockhash>,
    address_lookup_tables: Option<Vec<AddressLookupTableAccount>>,
    nonce_info: Option<NonceInfo>,
    signatures: Vec<SignatureSlot>,
    allow_signer_promotion: bool,
    promoted_signers: Vec<PublicKey>,
}

impl Transaction {
    pub fn new(fee_payer: PublicKey) -> Self {
        Self {
            fee_payer: Some(fee_payer),
            ..Self::default()
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn fee_payer(&self) -> Option<&PublicKey> {
        self.fee_payer.as_ref()
    }

    pub fn recent_blockhash(&self) -> Option<&Blockhash> {
        self.recent_blockhash.as_ref()
    }

    pub fn signatures(&self) -> &[SignatureSlot] {
        &self.signatures
    }

    pub fn add_instruction(&mut self, instruction: Instruction) -> &mut Self {
        self.instructions.push(instruction);
        self
    }

    pub fn add_instructions(
        &mut self,
        instructions: impl IntoIterator<Item = Instruction>,
    ) -> &mut Self {
        self.instructions.extend(instructions);
        self
    }

    pub fn set_fee_payer(&mut self, fee_payer: PublicKey) -> &mut Self {
        self.fee_payer = Some(fee_payer);
        self
    }

    pub fn set_recent_blockhash(&mut self, recent_blockhash: Blockhash) -> &mut Self {
        self.recent_blockhash = Some(recent_blockhash);
        self
    }

    pub fn set_address_lookup_tables(
        &mut self,
        tables: Option<Vec<AddressLookupTableAccount>>,
    ) -> &mut Self {
        self.address_lookup_tables = tables;
        self
    }

    pub fn set_nonce_info(&mut self, nonce_info: Option<NonceInfo>) -> &mut Self {
        self.nonce_info = nonce_info;
        self
    }

    /// When on, signing with a key that instructions reference but do not
    /// require to sign turns that key into a signer instead of failing.
    pub fn allow_signer_promotion(&mut self, allow: bool) -> &mut Self {
        self.allow_signer_promotion = allow;
        self
    }

    fn effective_blockhash(&self) -> Result<Blockhash> {
        match &self.nonce_info {
            Some(nonce_info) => Ok(nonce_info.nonce),
            None => self.recent_blockhash.ok_or(Error::MissingRecentBlockhash),
        }
    }

    fn instructions_to_compile(&self) -> Cow<'_, [Instruction]> {
        match &self.nonce_info {
            Some(nonce_info) if self.instructions.first() != Some(&nonce_info.nonce_instruction) => {
                let mut instructions = Vec::with_capacity(self.instructions.len() + 1);
                instructions.push(nonce_info.nonce_instruction.clone());
                instructions.extend_from_slice(&self.instructions);
                Cow::Owned(instructions)
            }
            _ => Cow::Borrowed(&self.instructions),
        }
    }

    pub fn compile_message(&self) -> Result<VersionedMessage> {
        let fee_payer = self.fee_payer.ok_or(Error::MissingFeePayer)?;
        let instructions = self.instructions_to_compile();
        if instructions.is_empty() {
            return Err(Error::NoInstructions);
        }
        let recent_blockhash = self.effective_blockhash()?;

        let mut compiled_keys = CompiledKeys::compile(&instructions, fee_payer);
        for key in &self.promoted_signers {
            compiled_keys.promote_to_signer(key);
        }

        match &self.address_lookup_tables {
            Some(tables) => MessageV0::try_compile_with_keys(
                compiled_keys,
                &instructions,
                tables,
                recent_blockhash,
            )
            .map(VersionedMessage::V0),
            None => Message::try_compile_with_keys(compiled_keys, &instructions, recent_blockhash)
                .map(VersionedMessage::Legacy),
        }
    }

    fn slots_match(&self, signer_keys: &[PublicKey]) -> bool {
        self.signatures.len() == signer_keys.len()
            && self
                .signatures
                .iter()
                .zip(signer_keys)
                .all(|(slot, key)| slot.public_key == *key)
    }

    /// Slots for `signer_keys`: the current ones when their keys match in
    /// order, otherwise fresh unsigned slots.
    fn reconciled_slots(&self, signer_keys: &[PublicKey]) -> Cow<'_, [SignatureSlot]> {
        if self.slots_match(signer_keys) {
            Cow::Borrowed(&self.signatures)
        } else {
            Cow::Owned(
                signer_keys
                    .iter()
                    .copied()
                    .map(SignatureSlot::unsigned)
                    .collect(),
            )
        }
    }

    pub fn compile(&mut self) -> Result<VersionedMessage> {
        let message = self.compile_message()?;
        let signer_keys = message.signer_keys();
        if !self.slots_match(signer_keys) {
            if self.signatures.iter().any(|slot| slot.signature.is_some()) {
                debug!(
                    "signer set changed, dropping {} existing signatures",
                    self.signatures.len()
                );
            }
            self.signatures = signer_keys
                .iter()
                .copied()
                .map(SignatureSlot::unsigned)
                .collect();
        }
        Ok(message)
    }

    fn references_account(&self, key: &PublicKey) -> bool {
        self.instructions_to_compile()
            .iter()
            .any(|ix| ix.accounts.iter().any(|meta| meta.pubkey == *key))
    }

    /// Signs the compiled message with every signer. Slots of other signers
    /// are kept as long as the signer set is unchanged, so parties can sign
    /// in turn.
    pub fn sign(&mut self, signers: &[&dyn Signer]) -> Result<()> {
        let signers = unique_signers(signers);

        if self.allow_signer_promotion {
            let message = self.compile_message()?;
            for signer in &signers {
                let key = signer.public_key();
                if !message.signer_keys().contains(&key)
                    && !self.promoted_signers.contains(&key)
                    && self.references_account(&key)
                {
                    warn!("promoting {key} to signer, no instruction requires its signature");
                    self.promoted_signers.push(key);
                }
            }
        }

        let message_data = self.compile()?.serialize();
        let mut signed = Vec::with_capacity(signers.len());
        for signer in signers {
            let key = signer.public_key();
            let position = self
                .signatures
                .iter()
                .position(|slot| slot.public_key == key)
                .ok_or(Error::UnknownSigner(key))?;
            signed.push((position, signer.try_sign_message(&message_data)?));
        }
        for (position, signature) in signed {
            self.signatures[position].signature = Some(signature);
        }
        Ok(())
    }

    pub fn add_signature(&mut self, public_key: PublicKey, signature: Signature) -> Result<()> {
        self.compile()?;
        let slot = self
            .signatures
            .iter_mut()
            .find(|slot| slot.public_key == public_key)
            .ok_or(Error::UnknownSigner(public_key))?;
        slot.signature = Some(signature);
        Ok(())
    }

    /// Checks every present signature against the current message. Any
    /// mismatch, or a message that no longer compiles, is `false`.
    pub fn verify(&self) -> bool {
        self.verify_signatures(false)
    }

    pub fn verify_signatures(&self, require_all_signatures: bool) -> bool {
        let Ok(message) = self.compile_message() else {
            return false;
        };
        let message_data = message.serialize();
        self.reconciled_slots(message.signer_keys())
            .iter()
            .all(|slot| match &slot.signature {
                Some(signature) => verify_signature(&slot.public_key, &message_data, signature),
                None => !require_all_signatures,
            })
    }

    pub fn is_fully_signed(&self) -> bool {
        self.verify_signatures(true)
    }

    pub fn to_versioned_transaction(&self, config: SerializeConfig) -> Result<VersionedTransaction> {
        let message = self.compile_message()?;
        let slots = self.reconciled_slots(message.signer_keys());

        if config.require_all_signatures {
            let missing: Vec<PublicKey> = slots
                .iter()
                .filter(|slot| slot.signature.is_none())
                .map(|slot| slot.public_key)
                .collect();
            if !missing.is_empty() {
                return Err(Error::IncompleteSignatures(missing));
            }
        }

        if config.verify_signatures {
            let message_data = message.serialize();
            for slot in slots.iter() {
                let Some(signature) = &slot.signature else {
                    continue;
                };
                if !verify_signature(&slot.public_key, &message_data, signature) {
                    return Err(Error::InvalidSignature(slot.public_key));
                }
            }
        }

        let signatures = slots
            .iter()
            .map(|slot| slot.signature.unwrap_or_default())
            .collect();
        Ok(VersionedTransaction {
            signatures,
            message,
        })
    }

    pub fn serialize(&self, config: SerializeConfig) -> Result<Vec<u8>> {
        self.to_versioned_transaction(config)?.serialize()
    }
}

fn unique_signers<'a>(signers: &[&'a dyn Signer]) -> Vec<&'a dyn Signer> {
    let mut seen = Vec::with_capacity(signers.len());
    signers
        .iter()
        .copied()
        .filter(|signer| {
            let key = signer.public_key();
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionedTransaction {
    pub signatures: Vec<Signature>,
    pub message: VersionedMessage,
}

impl VersionedTransaction {
    pub fn new_unsigned(message: VersionedMessage) -> Self {
        let num_signers = message.signer_keys().len();
        Self {
            signatures: vec![Signature::PLACEHOLDER; num_signers],
            message,
        }
    }

    pub fn try_new(message: VersionedMessage, signers: &[&dyn Signer]) -> Result<Self> {
        let mut transaction = Self::new_unsigned(message);
        transaction.sign(signers)?;
        Ok(transaction)
    }

    pub fn message_data(&self) -> Vec<u8> {
        self.message.serialize()
    }

    pub fn sign(&mut self, signers: &[&dyn Signer]) -> Result<()> {
        let message_data = self.message_data();
        for signer in unique_signers(signers) {
            let signature = signer.try_sign_message(&message_data)?;
            self.add_signature(signer.public_key(), signature)?;
        }
        Ok(())
    }

    pub fn add_signature(&mut self, public_key: PublicKey, signature: Signature) -> Result<()> {
        let position = self
            .message
            .signer_keys()
            .iter()
            .position(|key| *key == public_key)
            .ok_or(Error::UnknownSigner(public_key))?;
        let expected = self.message.signer_keys().len();
        let found = self.signatures.len();
        let slot = self
            .signatures
            .get_mut(position)
            .ok_or(Error::SignatureCountMismatch { expected, found })?;
        *slot = signature;
        Ok(())
    }

    /// One entry per signature slot; placeholders never verify.
    pub fn verify_with_results(&self) -> Vec<bool> {
        let message_data = self.message_data();
        self.signatures
            .iter()
            .zip(self.message.signer_keys())
            .map(|(signature, key)| {
                !signature.is_placeholder() && verify_signature(key, &message_data, signature)
            })
            .collect()
    }

    pub fn verify(&self) -> bool {
        self.signatures.len() == self.message.signer_keys().len()
            && self.verify_with_results().into_iter().all(|ok| ok)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let message_data = self.message_data();
        let mut out = Vec::with_capacity(
            short_vec::encoded_len(self.signatures.len())
                + self.signatures.len() * 64
                + message_data.len(),
        );
        short_vec::encode_len(&mut out, self.signatures.len());
        for signature in &self.signatures {
            out.extend_from_slice(signature.as_ref());
        }
        out.extend_from_slice(&message_data);
        if out.len() > PACKET_DATA_SIZE {
            return Err(Error::TransactionTooLarge {
                size: out.len(),
                max: PACKET_DATA_SIZE,
            });
        }
        Ok(out)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::EmptyBuffer);
        }
        let mut reader = ByteReader::new(bytes);
        let num_signatures = reader.read_compact_len()?;
        let mut signatures = Vec::with_capacity(num_signatures.min(reader.remaining() / 64));
        for _ in 0..num_signatures {
            signatures.push(reader.read_signature()?);
        }
        let message = VersionedMessage::deserialize(reader.read_bytes(reader.remaining())?)?;

        let expected = usize::from(message.header().num_required_signatures);
        if signatures.len() != expected {
            return Err(Error::SignatureCountMismatch {
                expected,
                found: signatures.len(),
            });
        }
        Ok(Self {
            signatures,
            message,
        })
    }

    pub fn to_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.serialize()?))
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|err| Error::InvalidMessage(format!("invalid base64: {err}")))?;
        Self::deserialize(&bytes)
    }
}
