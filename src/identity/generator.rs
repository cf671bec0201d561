//! Random identity and password generation.

use rand::rngs::OsRng;
use rand::Rng;
use subtle::ConstantTimeEq;

const LOWER_ALNUM: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const MIXED_ALNUM: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Character class an identity is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alphabet {
    /// `[a-z0-9]`, used for subdomain labels.
    LowerAlnum,
    /// `[a-zA-Z0-9]`, used for group passwords.
    MixedAlnum,
}

impl Alphabet {
    /// The characters of this class.
    pub fn chars(self) -> &'static [u8] {
        match self {
            Alphabet::LowerAlnum => LOWER_ALNUM,
            Alphabet::MixedAlnum => MIXED_ALNUM,
        }
    }

    /// Whether `c` belongs to this class.
    pub fn contains(self, c: char) -> bool {
        c.is_ascii() && self.chars().contains(&(c as u8))
    }
}

/// Draw `length` characters uniformly from `alphabet`.
///
/// Uses the operating system's random source. If that source fails the call
/// panics: there is no degraded mode without unpredictable identities.
pub fn generate(alphabet: Alphabet, length: usize) -> String {
    let chars = alphabet.chars();
    (0..length)
        .map(|_| chars[OsRng.gen_range(0..chars.len())] as char)
        .collect()
}

/// Compare a presented password against the stored one in constant time.
pub fn passwords_match(stored: &str, presented: &str) -> bool {
    stored.as_bytes().ct_eq(presented.as_bytes()).into()
}
