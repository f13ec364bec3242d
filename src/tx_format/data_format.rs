use crate::{
    error::{Error, Result},
    tx_format::{
        blockhash::{BLOCKHASH_LENGTH, Blockhash},
        pubkey::{PUBLIC_KEY_LENGTH, PublicKey},
        short_vec,
        signature::{SIGNATURE_LENGTH, Signature},
    },
};

/// Bounds-checked cursor over a wire buffer.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.offset
    }

    pub fn peek_u8(&self) -> Option<u8> {
        self.buffer.get(self.offset).copied()
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.offset.checked_add(len).ok_or(Error::UnexpectedEof {
            offset: self.offset,
            needed: len,
        })?;
        let slice = self
            .buffer
            .get(self.offset..end)
            .ok_or_else(|| Error::UnexpectedEof {
                offset: self.offset,
                needed: end - self.buffer.len(),
            })?;
        self.offset = end;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_compact_len(&mut self) -> Result<usize> {
        let (len, size) = short_vec::decode_len(&self.buffer[self.offset..]).map_err(|err| {
            match err {
                Error::UnexpectedEof { needed, .. } => Error::UnexpectedEof {
                    offset: self.buffer.len(),
                    needed,
                },
                other => other,
            }
        })?;
        self.offset += size;
        Ok(len)
    }

    /// Reads a compact length followed by that many raw bytes.
    pub fn read_compact_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_compact_len()?;
        Ok(self.read_bytes(len)?.to_vec())
    }

    pub fn read_public_key(&mut self) -> Result<PublicKey> {
        PublicKey::try_from(self.read_bytes(PUBLIC_KEY_LENGTH)?)
    }

    pub fn read_blockhash(&mut self) -> Result<Blockhash> {
        Blockhash::try_from(self.read_bytes(BLOCKHASH_LENGTH)?)
    }

    pub fn read_signature(&mut self) -> Result<Signature> {
        Signature::try_from(self.read_bytes(SIGNATURE_LENGTH)?)
    }

    /// Fails with `TrailingBytes` unless the whole buffer was consumed.
    pub fn finish(self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(Error::TrailingBytes(n)),
        }
    }
}

/// Appends a compact length followed by the bytes themselves.
pub fn write_compact_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    short_vec::encode_len(out, bytes.len());
    out.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::{ByteReader, write_compact_bytes};
    use crate::error::Error;

    #[test]
    fn reads_in_order() {
        let mut buffer = vec![9u8];
        write_compact_bytes(&mut buffer, &[1, 2, 3]);
        buffer.extend_from_slice(&[5u8; 32]);
        let mut reader = ByteReader::new(&buffer);
        assert_eq!(reader.read_u8().expect("u8"), 9);
        assert_eq!(reader.read_compact_bytes().expect("bytes"), vec![1, 2, 3]);
        assert_eq!(reader.read_public_key().expect("key").to_bytes(), [5u8; 32]);
        reader.finish().expect("consumed");
    }

    #[test]
    fn out_of_bounds_is_an_error() {
        let buffer = [2u8, 1];
        let mut reader = ByteReader::new(&buffer);
        assert_eq!(
            reader.read_compact_bytes(),
            Err(Error::UnexpectedEof {
                offset: 1,
                needed: 1
            })
        );
    }

    #[test]
    fn reads_short_of_the_end_leave_the_rest() {
        let buffer = [1u8, 2, 3, 4];
        let mut reader = ByteReader::new(&buffer);
        assert_eq!(reader.read_bytes(2).expect("bytes"), &[1, 2]);
        assert_eq!(reader.remaining(), 2);
        assert_eq!(
            reader.read_bytes(3),
            Err(Error::UnexpectedEof {
                offset: 2,
                needed: 1
            })
        );
        assert_eq!(reader.read_bytes(2).expect("bytes"), &[3, 4]);
        reader.finish().expect("consumed");
    }

    #[test]
    fn finish_reports_trailing_bytes() {
        let buffer = [1u8, 2, 3];
        let mut reader = ByteReader::new(&buffer);
        reader.read_u8().expect("u8");
        assert_eq!(reader.finish(), Err(Error::TrailingBytes(2)));
    }
}
