//! Name matching shared by search and batch updates.

use regex::{Regex, RegexBuilder};

/// Case-insensitive pattern. Invalid regexes degrade to substring matching.
#[derive(Debug, Clone)]
pub enum Matcher {
    Regex(Regex),
    Substring(String),
}

impl Matcher {
    pub fn new(pattern: &str) -> Self {
        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => Matcher::Regex(re),
            Err(err) => {
                tracing::debug!(%pattern, error = %err, "pattern is not a regex, matching as text");
                Matcher::Substring(pattern.to_lowercase())
            }
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Matcher::Regex(re) => re.is_match(text),
            Matcher::Substring(needle) => text.to_lowercase().contains(needle),
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, Matcher::Regex(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_is_case_insensitive() {
        let m = Matcher::new("^sales_.*_v2$");
        assert!(m.is_regex());
        assert!(m.is_match("SALES_daily_V2"));
        assert!(!m.is_match("sales_daily"));
    }

    #[test]
    fn invalid_regex_falls_back_to_substring() {
        let m = Matcher::new("orders(");
        assert!(!m.is_regex());
        assert!(m.is_match("Customer_ORDERS(2024)"));
        assert!(!m.is_match("orders_2024"));
    }
}
