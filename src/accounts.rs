use crate::tx_format::pubkey::PublicKey;

pub const SYSTEM_PROGRAM_ID: PublicKey = PublicKey::new_from_array([0u8; 32]);
pub const COMPUTE_BUDGET_PROGRAM_ID: PublicKey = PublicKey::new_from_array([
    3, 6, 70, 111, 229, 33, 23, 50, 255, 236, 173, 186, 114, 195, 155, 231, 188, 140, 229, 187,
    197, 247, 18, 107, 44, 67, 155, 58, 64, 0, 0, 0,
]);
pub const TOKEN_PROGRAM_ID: PublicKey = PublicKey::new_from_array([
    6, 221, 246, 225, 215, 101, 161, 147, 217, 203, 225, 70, 206, 235, 121, 172, 28, 180, 133,
    237, 95, 91, 55, 145, 58, 140, 245, 133, 126, 255, 0, 169,
]);
pub const TOKEN_2022_PROGRAM_ID: PublicKey = PublicKey::new_from_array([
    6, 221, 246, 225, 238, 117, 143, 222, 24, 66, 93, 188, 228, 108, 205, 218, 182, 26, 252, 77,
    131, 185, 13, 39, 254, 189, 249, 40, 216, 161, 139, 252,
]);
pub const ASSOCIATED_TOKEN_PROGRAM_ID: PublicKey = PublicKey::new_from_array([
    140, 151, 37, 143, 78, 36, 137, 241, 187, 61, 16, 41, 20, 142, 13, 131, 11, 90, 19, 153, 218,
    255, 16, 132, 4, 142, 123, 216, 219, 233, 248, 89,
]);
pub const LOOKUP_TABLE_PROGRAM_ID: PublicKey = PublicKey::new_from_array([
    2, 119, 166, 175, 151, 51, 155, 122, 200, 141, 24, 146, 201, 4, 70, 245, 0, 2, 48, 146, 102,
    246, 46, 83, 193, 24, 36, 73, 130, 0, 0, 0,
]);

/// Size of an SPL token account, which is what an associated-token-account
/// creation pays rent for.
pub const TOKEN_ACCOUNT_LEN: usize = 165;
