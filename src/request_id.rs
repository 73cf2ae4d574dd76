use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::{Builder, Uuid};

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generates the `X-Request-ID` correlation id, a v4 UUID.
///
/// Uses OS randomness; when that is unavailable the UUID is derived from
/// the clock and a process-wide counter so ids stay unique per process.
pub fn request_id() -> String {
    let mut bytes = [0u8; 16];
    let uuid = match getrandom::getrandom(&mut bytes) {
        Ok(()) => Builder::from_random_bytes(bytes).into_uuid(),
        Err(_) => fallback_uuid(),
    };
    uuid.hyphenated().to_string()
}

fn fallback_uuid() -> Uuid {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    let count = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);
    // splitmix64 over both halves spreads sequential inputs across all bits.
    let high = mix((nanos as u64) ^ count.rotate_left(32));
    let low = mix(((nanos >> 64) as u64) ^ count ^ 0x9e37_79b9_7f4a_7c15);
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&high.to_be_bytes());
    bytes[8..].copy_from_slice(&low.to_be_bytes());
    Builder::from_random_bytes(bytes).into_uuid()
}

fn mix(mut value: u64) -> u64 {
    value = value.wrapping_add(0x9e37_79b9_7f4a_7c15);
    value = (value ^ (value >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    value = (value ^ (value >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    value ^ (value >> 31)
}
