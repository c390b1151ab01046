//! Short, monotone, URL-safe ids for cache busting.
//!
//! An id is the current Unix time in milliseconds written in a 64-symbol
//! alphabet. Ids generated within the same millisecond get a `.<seed>`
//! suffix, so consecutive ids never collide.

// ============================================================================
// Imports
// ============================================================================

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

// ============================================================================
// Constants
// ============================================================================

const ALPHABET: &[u8; 64] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-_";

/// Generator state shared by the process.
static STATE: Mutex<YeastState> = Mutex::new(YeastState {
    prev: None,
    seed: 0,
});

struct YeastState {
    prev: Option<String>,
    seed: u64,
}

// ============================================================================
// Functions
// ============================================================================

/// Encodes `num` in the yeast alphabet.
#[must_use]
pub fn encode(mut num: u64) -> String {
    let base = ALPHABET.len() as u64;
    let mut encoded = Vec::new();

    loop {
        encoded.push(ALPHABET[(num % base) as usize]);
        num /= base;
        if num == 0 {
            break;
        }
    }

    encoded.reverse();
    String::from_utf8_lossy(&encoded).into_owned()
}

/// Decodes a string produced by [`encode`]. Returns `None` on a symbol
/// outside the alphabet or on overflow.
#[must_use]
pub fn decode(encoded: &str) -> Option<u64> {
    let base = ALPHABET.len() as u64;
    encoded.bytes().try_fold(0u64, |acc, symbol| {
        let value = ALPHABET.iter().position(|&c| c == symbol)? as u64;
        acc.checked_mul(base)?.checked_add(value)
    })
}

/// Returns a new id based on the current time.
#[must_use]
pub fn yeast() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as u64);
    let now = encode(millis);

    let mut state = STATE.lock();
    if state.prev.as_deref() != Some(now.as_str()) {
        state.seed = 0;
        state.prev = Some(now.clone());
        return now;
    }

    let seed = state.seed;
    state.seed += 1;
    format!("{now}.{}", encode(seed))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    #[test]
    fn test_encode_decode() {
        assert_eq!(encode(0), "0");
        assert_eq!(encode(63), "_");
        assert_eq!(encode(64), "10");
        assert_eq!(decode("10"), Some(64));

        let now = 1_700_000_000_123;
        assert_eq!(decode(&encode(now)), Some(now));
    }

    #[test]
    fn test_decode_rejects_foreign_symbols() {
        assert_eq!(decode("ab*"), None);
    }

    #[test]
    fn test_does_not_collide() {
        let ids: Vec<String> = (0..30_000).map(|_| yeast()).collect();
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_id_is_decodable_timestamp() {
        let before = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let id = yeast();
        let timestamp = id.split('.').next().and_then(decode).expect("timestamp prefix");
        assert!(timestamp >= before);
    }
}
