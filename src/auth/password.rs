use crate::error::AppError;

/// bcrypt work factor for stored passwords.
const HASH_COST: u32 = 10;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    Ok(bcrypt::hash(password, HASH_COST)?)
}

/// `Ok(false)` on mismatch; `Err` only when `stored_hash` is not a bcrypt hash.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AppError> {
    Ok(bcrypt::verify(password, stored_hash)?)
}
