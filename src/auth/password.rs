use std::ops::RangeInclusive;

/// Work factors bcrypt accepts.
pub const COST_RANGE: RangeInclusive<u32> = 4..=31;

/// bcrypt ignores everything past this many bytes, so longer passwords are
/// refused rather than silently truncated.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Hash a raw password with a fresh salt.
pub fn hash(raw: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(raw, cost)
}

/// Verify a raw password against a stored hash - constant-time via bcrypt.
/// A malformed stored hash or an over-long password counts as a mismatch.
pub fn verify(raw: &str, hash: &str) -> bool {
    if raw.len() > MAX_PASSWORD_BYTES {
        return false;
    }
    bcrypt::verify(raw, hash).unwrap_or(false)
}
