//! Clock and randomness behind fallback artifact names.
//!
//! Documents with no usable title are written as `doc-{millis}-{token}`.
//! Both halves come from a [`NameSource`] so tests can pin them down.

use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

const TOKEN_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Supplies the timestamp and random token of a fallback name.
pub trait NameSource: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;

    /// A short lowercase alphanumeric token.
    fn token(&self) -> String;

    /// `doc-{millis}-{token}`.
    fn fallback_name(&self) -> String {
        format!("doc-{}-{}", self.now_millis(), self.token())
    }
}

/// Wall clock plus thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemNameSource;

impl NameSource for SystemNameSource {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn token(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..TOKEN_LEN)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect()
    }
}

/// Fixed timestamp with a counting token: `000000001`, `000000002`, …
#[derive(Debug)]
pub struct SequenceNameSource {
    millis: i64,
    next: AtomicU64,
}

impl SequenceNameSource {
    pub fn new(millis: i64) -> Self {
        Self {
            millis,
            next: AtomicU64::new(1),
        }
    }
}

impl NameSource for SequenceNameSource {
    fn now_millis(&self) -> i64 {
        self.millis
    }

    fn token(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        to_base36(n, TOKEN_LEN)
    }
}

fn to_base36(mut n: u64, width: usize) -> String {
    let mut digits = Vec::with_capacity(width);
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    while digits.len() < width {
        digits.push(b'0');
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_token_shape() {
        let t = SystemNameSource.token();
        assert_eq!(t.len(), TOKEN_LEN);
        assert!(t.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn sequence_source_is_deterministic() {
        let s = SequenceNameSource::new(1_700_000_000_000);
        assert_eq!(s.fallback_name(), "doc-1700000000000-000000001");
        assert_eq!(s.fallback_name(), "doc-1700000000000-000000002");
    }

    #[test]
    fn base36_padding() {
        assert_eq!(to_base36(35, 3), "00z");
        assert_eq!(to_base36(36, 3), "010");
    }
}
