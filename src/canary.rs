//! Per-response traceable token derivation.
//!
//! Tokens are deterministic in `(persona seed, company name, salt)` so that
//! data exfiltrated from one deployment points back to it, while distinct
//! seeds produce disjoint token spaces.

use crate::models::Persona;
use sha2::{Digest, Sha256};

/// Prefix stamped onto every fabricated credential so exfiltrated keys are
/// unambiguous. Part of the external contract.
pub const FAKE_KEY_PREFIX: &str = "sk-sundew-FAKE-";

/// Derive a 16-hex-char token from the persona identity and a salt.
pub fn mint(persona: &Persona, salt: &str) -> String {
    let raw = format!("{}:{}:{}", persona.seed, persona.company_name, salt);
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(digest)[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::generator::generate;

    #[test]
    fn deterministic_for_same_inputs() {
        let persona = generate(Some(42));
        assert_eq!(mint(&persona, "a"), mint(&persona, "a"));
    }

    #[test]
    fn distinct_salts_yield_distinct_tokens() {
        let persona = generate(Some(42));
        assert_ne!(mint(&persona, "a"), mint(&persona, "b"));
    }

    #[test]
    fn distinct_seeds_yield_distinct_tokens() {
        let p1 = generate(Some(10));
        let p2 = generate(Some(11));
        for salt in ["auth:1", "list:users", "x"] {
            assert_ne!(mint(&p1, salt), mint(&p2, salt));
        }
    }

    #[test]
    fn token_is_16_lowercase_hex_chars() {
        let persona = generate(Some(99));
        let token = mint(&persona, "probe");
        assert_eq!(token.len(), 16);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
