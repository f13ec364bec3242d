use crate::error::{Error, Result};

pub const MAX_ENCODING_LENGTH: usize = 3;

pub fn encode_len(out: &mut Vec<u8>, len: usize) {
    let mut rem = len;
    loop {
        let mut elem = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(elem);
            break;
        }
        elem |= 0x80;
        out.push(elem);
    }
}

pub fn encoded_len(len: usize) -> usize {
    let mut size = 1;
    let mut rem = len >> 7;
    while rem != 0 {
        size += 1;
        rem >>= 7;
    }
    size
}

/// Decodes a compact length from the front of `bytes`, returning the value and
/// the number of bytes consumed.
pub fn decode_len(bytes: &[u8]) -> Result<(usize, usize)> {
    let mut len: usize = 0;
    for (nth, byte) in bytes.iter().take(MAX_ENCODING_LENGTH).enumerate() {
        let elem = *byte;
        // trailing zero group would alias a shorter encoding
        if nth > 0 && elem == 0 {
            return Err(Error::InvalidCompactLength);
        }
        // third byte may only carry the top two bits of a u16
        if nth == MAX_ENCODING_LENGTH - 1 && elem > 0x03 {
            return Err(Error::InvalidCompactLength);
        }
        len |= ((elem & 0x7f) as usize) << (nth * 7);
        if elem & 0x80 == 0 {
            return Ok((len, nth + 1));
        }
    }
    if bytes.len() < MAX_ENCODING_LENGTH {
        return Err(Error::UnexpectedEof {
            offset: bytes.len(),
            needed: 1,
        });
    }
    Err(Error::InvalidCompactLength)
}

#[cfg(test)]
mod tests {
    use super::{decode_len, encode_len, encoded_len};
    use crate::error::Error;

    fn encode(len: usize) -> Vec<u8> {
        let mut out = Vec::new();
        encode_len(&mut out, len);
        out
    }

    #[test]
    fn encodes_known_lengths() {
        assert_eq!(encode(0x0), vec![0x00]);
        assert_eq!(encode(0x7f), vec![0x7f]);
        assert_eq!(encode(0x80), vec![0x80, 0x01]);
        assert_eq!(encode(0xff), vec![0xff, 0x01]);
        assert_eq!(encode(0x100), vec![0x80, 0x02]);
        assert_eq!(encode(0x3fff), vec![0xff, 0x7f]);
        assert_eq!(encode(0x4000), vec![0x80, 0x80, 0x01]);
        assert_eq!(encode(0xffff), vec![0xff, 0xff, 0x03]);
    }

    #[test]
    fn decodes_with_consumed_size() {
        for len in [0usize, 1, 5, 0x7f, 0x80, 0x3fff, 0x4000, 0xffff] {
            let bytes = encode(len);
            assert_eq!(decode_len(&bytes).expect("decode"), (len, bytes.len()));
            assert_eq!(encoded_len(len), bytes.len());
        }
        assert_eq!(decode_len(&[0x05, 0xaa, 0xbb]).expect("decode"), (5, 1));
    }

    #[test]
    fn rejects_alias_and_overflow() {
        assert_eq!(decode_len(&[0x80, 0x00]), Err(Error::InvalidCompactLength));
        assert_eq!(
            decode_len(&[0xff, 0xff, 0x04]),
            Err(Error::InvalidCompactLength)
        );
        assert_eq!(
            decode_len(&[0x80, 0x80, 0x80, 0x01]),
            Err(Error::InvalidCompactLength)
        );
    }

    #[test]
    fn rejects_truncated_input() {
        assert!(matches!(decode_len(&[]), Err(Error::UnexpectedEof { .. })));
        assert!(matches!(
            decode_len(&[0x80]),
            Err(Error::UnexpectedEof { .. })
        ));
    }
}
