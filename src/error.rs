use thiserror::Error;

use crate::tx_format::pubkey::PublicKey;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("transaction has no instructions")]
    NoInstructions,
    #[error("transaction fee payer is required")]
    MissingFeePayer,
    #[error("transaction recent blockhash is required")]
    MissingRecentBlockhash,

    #[error("encountered unknown account key `{0}` during instruction compilation")]
    UnknownAccountKey(PublicKey),
    #[error("fee payer {0} cannot be invoked as a program")]
    FeePayerInvoked(PublicKey),
    #[error("message references {0} accounts, at most 256 can be indexed")]
    TooManyAccounts(usize),
    #[error("account sits past index 255 of lookup table {table}")]
    LookupTableIndexOverflow { table: PublicKey },
    #[error("lookup table {table} has {len} addresses, index {index} is out of range")]
    LookupIndexOutOfRange {
        table: PublicKey,
        index: u8,
        len: usize,
    },
    #[error("contents of lookup table {0} were not provided")]
    MissingLookupTable(PublicKey),

    #[error("unknown signer: {0}")]
    UnknownSigner(PublicKey),
    #[error("missing signatures for: {}", join_keys(.0))]
    IncompleteSignatures(Vec<PublicKey>),
    #[error("signature verification failed for {0}")]
    InvalidSignature(PublicKey),

    #[error("cannot parse an empty buffer")]
    EmptyBuffer,
    #[error("unsupported message version {0}")]
    UnsupportedVersion(u8),
    #[error("unexpected end of buffer at offset {offset}, {needed} more bytes needed")]
    UnexpectedEof { offset: usize, needed: usize },
    #[error("invalid compact length encoding")]
    InvalidCompactLength,
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("transaction carries {found} signatures, message requires {expected}")]
    SignatureCountMismatch { expected: usize, found: usize },
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("invalid blockhash: {0}")]
    InvalidBlockhash(String),
    #[error("invalid signature length {0}, expected 64")]
    InvalidSignatureLength(usize),
    #[error("invalid signature encoding: {0}")]
    InvalidSignatureEncoding(String),

    #[error("transaction is {size} bytes, limit is {max}")]
    TransactionTooLarge { size: usize, max: usize },

    #[error("invalid keypair: {0}")]
    InvalidKeypair(String),
    #[error("signer failed: {0}")]
    Signer(String),
}

fn join_keys(keys: &[PublicKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
