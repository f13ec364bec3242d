use crate::{
    error::{Error, Result},
    message::{
        CompiledInstruction, MESSAGE_HEADER_LENGTH, MESSAGE_VERSION_PREFIX, MessageHeader,
        account_keys::MessageAccountKeys, compiled_keys::CompiledKeys, read_message_body,
        sanitize_body, write_message_body,
    },
    tx_format::{
        Instruction, blockhash::Blockhash, data_format::ByteReader, pubkey::PublicKey, short_vec,
    },
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<PublicKey>,
    pub recent_blockhash: Blockhash,
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compiles `instructions` with `payer` as the first, writable, signing key.
    pub fn try_compile(
        payer: &PublicKey,
        instructions: &[Instruction],
        recent_blockhash: Blockhash,
    ) -> Result<Self> {
        if instructions.is_empty() {
            return Err(Error::NoInstructions);
        }
        let compiled_keys = CompiledKeys::compile(instructions, *payer);
        Self::try_compile_with_keys(compiled_keys, instructions, recent_blockhash)
    }

    /// Finishes compilation from an already merged key map.
    pub fn try_compile_with_keys(
        compiled_keys: CompiledKeys,
        instructions: &[Instruction],
        recent_blockhash: Blockhash,
    ) -> Result<Self> {
        let (header, account_keys) = compiled_keys.try_into_message_components()?;
        let instructions =
            MessageAccountKeys::new(&account_keys, None).try_compile_instructions(instructions)?;
        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        })
    }

    pub fn account_keys(&self) -> MessageAccountKeys<'_> {
        MessageAccountKeys::new(&self.account_keys, None)
    }

    pub fn is_account_signer(&self, index: usize) -> bool {
        index < usize::from(self.header.num_required_signatures)
    }

    pub fn is_account_writable(&self, index: usize) -> bool {
        let num_keys = self.account_keys.len();
        let num_signers = usize::from(self.header.num_required_signatures);
        if index >= num_keys {
            false
        } else if index < num_signers {
            index < num_signers.saturating_sub(usize::from(self.header.num_readonly_signed_accounts))
        } else {
            index
                < num_keys.saturating_sub(usize::from(self.header.num_readonly_unsigned_accounts))
        }
    }

    pub fn signer_keys(&self) -> &[PublicKey] {
        let num_signers = usize::from(self.header.num_required_signatures).min(self.account_keys.len());
        &self.account_keys[..num_signers]
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_size_hint());
        write_message_body(
            &mut out,
            &self.header,
            &self.account_keys,
            &self.recent_blockhash,
            &self.instructions,
        );
        out
    }

    fn serialized_size_hint(&self) -> usize {
        MESSAGE_HEADER_LENGTH
            + short_vec::MAX_ENCODING_LENGTH * 2
            + self.account_keys.len() * 32
            + 32
            + self.instructions.len() * 8
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let first = *bytes.first().ok_or(Error::EmptyBuffer)?;
        if first & MESSAGE_VERSION_PREFIX != 0 {
            return Err(Error::InvalidMessage(
                "versioned message passed to the legacy decoder".to_string(),
            ));
        }
        let mut reader = ByteReader::new(bytes);
        let body = read_message_body(&mut reader)?;
        reader.finish()?;
        let message = Self {
            header: body.header,
            account_keys: body.account_keys,
            recent_blockhash: body.recent_blockhash,
            instructions: body.instructions,
        };
        message.sanitize()?;
        Ok(message)
    }

    pub fn sanitize(&self) -> Result<()> {
        sanitize_body(
            &self.header,
            &self.account_keys,
            &self.instructions,
            self.account_keys.len(),
        )
    }
}
