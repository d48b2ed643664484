/// Maximum key length in bytes, per the wire protocol's data model.
pub const MAX_KEY_LEN: usize = 256;
/// Maximum value length in bytes.
pub const MAX_VALUE_LEN: usize = 65_536;
/// Maximum stash name length in bytes.
pub const MAX_NAME_LEN: usize = 64;
/// Number of stripe locks guarding keyspace mutations in a single stash.
pub const STRIPE_COUNT: usize = 16;
/// Upper bound on entries removed by a single `expire_due` sweep.
pub const EXPIRE_SWEEP_LIMIT: usize = 1_000;

pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as u64
}
