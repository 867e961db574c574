use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of unlinked bytecode; the value recorded as a
/// library's `hashed_bytecode`.
pub fn bytecode_hash(bytecode: &[u8]) -> String {
    hex::encode(Sha256::digest(bytecode))
}

pub fn verify_bytecode_hash(bytecode: &[u8], expected_hex: &str) -> bool {
    bytecode_hash(bytecode).eq_ignore_ascii_case(expected_hex.trim())
}
