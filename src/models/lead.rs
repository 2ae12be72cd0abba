//! Lead and script contracts read from the persistence collaborator.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Digits-only E.164-style number, optional leading +.
fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("invalid phone pattern"))
}

/// A sales lead to be called.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub name: Option<String>,
    pub company: Option<String>,
    /// Raw phone number as imported; may contain separators.
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl Lead {
    pub fn new(id: &str, phone: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            company: None,
            phone: phone.map(|p| p.to_string()),
            email: None,
        }
    }

    /// The normalized, dialable number, or None if the lead cannot be called.
    ///
    /// Separators (spaces, dashes, dots, parentheses) are stripped before
    /// validation so imported formats like "(555) 010-2030" remain callable.
    pub fn callable_number(&self) -> Option<String> {
        let raw = self.phone.as_deref()?.trim();
        let normalized: String = raw
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
            .collect();
        if phone_pattern().is_match(&normalized) {
            Some(normalized)
        } else {
            None
        }
    }
}

/// The conversation script an agent persona follows on a call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    pub id: String,
    pub name: String,
    pub content: String,
}

impl Script {
    pub fn new(id: &str, name: &str, content: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            content: content.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callable_number_plain() {
        let lead = Lead::new("l1", Some("+15550102030"));
        assert_eq!(lead.callable_number(), Some("+15550102030".to_string()));
    }

    #[test]
    fn test_callable_number_with_separators() {
        let lead = Lead::new("l1", Some("(555) 010-2030"));
        assert_eq!(lead.callable_number(), Some("5550102030".to_string()));
    }

    #[test]
    fn test_no_phone_is_not_callable() {
        let lead = Lead::new("l1", None);
        assert_eq!(lead.callable_number(), None);
    }

    #[test]
    fn test_garbage_is_not_callable() {
        for bad in ["n/a", "call me", "+1555abc", "123", ""] {
            let lead = Lead::new("l1", Some(bad));
            assert_eq!(lead.callable_number(), None, "accepted {:?}", bad);
        }
    }
}
