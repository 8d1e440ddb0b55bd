//! Transfer reference codes.
//!
//! Users top up by bank transfer and put a reference in the transfer memo. The reference is the configured prefix
//! followed by either a deposit request code (e.g. `DEP-7KQ2M9XA`) or the user's id (e.g. `DEP-user123`). Banks
//! tend to mangle memos: they upper-case them, drop punctuation or glue words together, so matching is forgiving
//! about case and separators.
use rand::{distributions::Uniform, Rng};
use regex::Regex;

const CODE_LENGTH: usize = 8;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generates a new deposit reference code, e.g. `DEP-7KQ2M9XA`.
pub fn new_reference_code(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let dist = Uniform::from(0..CODE_ALPHABET.len());
    let code: String = (0..CODE_LENGTH).map(|_| CODE_ALPHABET[rng.sample(dist)] as char).collect();
    format!("{}-{code}", prefix.to_uppercase())
}

/// The reference found in a transfer memo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoReference {
    /// The token after the prefix, as it appeared in the memo.
    pub token: String,
}

impl MemoReference {
    /// The token in canonical deposit code form, `PREFIX-TOKEN`.
    pub fn as_reference_code(&self, prefix: &str) -> String {
        format!("{}-{}", prefix.to_uppercase(), self.token.to_uppercase())
    }
}

/// Finds the first `<prefix><sep?><token>` in the memo. Returns `None` if the prefix does not appear, or is not
/// followed by a token.
pub fn extract_reference(memo: &str, prefix: &str) -> Option<MemoReference> {
    let pattern = format!(r"(?i)(?:^|[^A-Za-z0-9]){}[\s\-_:.#]*([A-Za-z0-9_]+)", regex::escape(prefix));
    let re = Regex::new(&pattern).ok()?;
    re.captures(memo).and_then(|c| c.get(1)).map(|m| MemoReference { token: m.as_str().to_string() })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generated_codes() {
        let code = new_reference_code("dep");
        assert!(code.starts_with("DEP-"));
        assert_eq!(code.len(), 4 + CODE_LENGTH);
        assert!(code[4..].bytes().all(|b| CODE_ALPHABET.contains(&b)));
        assert_ne!(new_reference_code("DEP"), new_reference_code("DEP"));
    }

    #[test]
    fn extract_from_memos() {
        let r = extract_reference("DEP-user123", "DEP").unwrap();
        assert_eq!(r.token, "user123");
        let r = extract_reference("NGUYEN VAN A chuyen tien DEP 7KQ2M9XA", "DEP").unwrap();
        assert_eq!(r.token, "7KQ2M9XA");
        assert_eq!(r.as_reference_code("DEP"), "DEP-7KQ2M9XA");
        let r = extract_reference("MBVCB.123.dep_user123.CT tu", "DEP").unwrap();
        assert_eq!(r.token, "user123");
        let r = extract_reference("IBFT DEPUSER123", "DEP").unwrap();
        assert_eq!(r.token, "USER123");
    }

    #[test]
    fn no_reference() {
        assert!(extract_reference("chuyen tien", "DEP").is_none());
        assert!(extract_reference("DEP-", "DEP").is_none());
        // The prefix must start a word
        assert!(extract_reference("INDEPENDENT", "DEP").is_none());
    }
}
