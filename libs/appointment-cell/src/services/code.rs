// libs/appointment-cell/src/services/code.rs
use rand::Rng;

use shared_config::DEFAULT_CONFIRMATION_CODE_PREFIX;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const CODE_SUFFIX_LEN: usize = 6;

/// Produces human-readable booking references such as `SWC-7K2Q9D`.
#[derive(Debug, Clone)]
pub struct ConfirmationCodeGenerator {
    prefix: String,
}

impl Default for ConfirmationCodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIRMATION_CODE_PREFIX)
    }
}

impl ConfirmationCodeGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn generate(&self) -> String {
        self.generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let suffix: String = (0..CODE_SUFFIX_LEN)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();

        format!("{}{}", self.prefix, suffix)
    }

    pub fn is_well_formed(&self, code: &str) -> bool {
        code.strip_prefix(self.prefix.as_str()).is_some_and(|suffix| {
            suffix.len() == CODE_SUFFIX_LEN
                && suffix.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_are_well_formed_and_distinct() {
        let generator = ConfirmationCodeGenerator::default();
        let codes: HashSet<String> = (0..10_000).map(|_| generator.generate()).collect();

        // 36^6 possible suffixes; a clash in 10k draws is vanishingly unlikely
        assert_eq!(codes.len(), 10_000);
        assert!(codes.iter().all(|code| generator.is_well_formed(code)));
        assert!(codes.iter().all(|code| code.starts_with("SWC-")));
    }

    #[test]
    fn test_custom_prefix() {
        let generator = ConfirmationCodeGenerator::new("SOCAL-");
        let code = generator.generate();

        assert!(code.starts_with("SOCAL-"));
        assert_eq!(code.len(), "SOCAL-".len() + CODE_SUFFIX_LEN);
    }

    #[test]
    fn test_is_well_formed_rejects_lowercase_and_length() {
        let generator = ConfirmationCodeGenerator::default();

        assert!(generator.is_well_formed("SWC-ABC123"));
        assert!(!generator.is_well_formed("SWC-abc123"));
        assert!(!generator.is_well_formed("SWC-ABC12"));
        assert!(!generator.is_well_formed("XYZ-ABC123"));
    }
}
