//! Best-effort ticker extraction from free text.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

const NON_TICKERS: &[&str] = &[
    "A", "I", "AND", "THE", "FOR", "WITH", "FROM", "THIS", "THAT", "THEY", "ARE", "WAS", "WERE",
    "BEEN", "HAVE", "HAS", "HAD", "DO", "DOES", "DID", "CAN", "COULD", "WOULD", "SHOULD", "MAY",
    "MIGHT", "MUST", "WILL", "IS", "IT", "BE", "TO", "OF", "IN", "ON", "AT", "BY", "AS", "OR",
    "AN", "IF", "SO", "NO", "YES", "NOT", "BUT", "ALL", "ANY", "NEW", "US", "UK", "EU", "FED",
    "ECB", "BOJ", "BOE", "PBOC", "OPEC", "GDP", "CPI", "PPI", "PMI", "NFP", "ISM", "FOMC", "RBI",
    "SNB", "CEO", "CFO", "COO", "IPO", "ETF", "NYSE", "NASDAQ", "DOW", "VS", "AM", "PM", "EST",
    "PST", "UTC", "GMT", "Q1", "Q2", "Q3", "Q4", "YTD", "YOY", "MOM", "QOQ", "BPS", "PCT", "MN",
    "BN", "TN", "MM", "K",
];

const VALID_SUFFIXES: &[&str] = &["=F", "=X"];

fn ticker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b([A-Z]{1,5}(?:=[A-Z])?)\b").expect("valid pattern"))
}

fn is_stopword(candidate: &str) -> bool {
    NON_TICKERS.contains(&candidate)
}

fn has_valid_suffix(candidate: &str) -> bool {
    VALID_SUFFIXES.iter().any(|s| candidate.ends_with(s))
}

/// Extract candidate tickers from text, filtering common non-tickers.
/// Bare single letters are rejected; `X=F`-style suffixed forms are kept.
pub fn extract_tickers_from_text(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tickers = Vec::new();

    for capture in ticker_pattern().find_iter(text) {
        let upper = capture.as_str().to_uppercase();
        if is_stopword(&upper) || seen.contains(&upper) {
            continue;
        }

        if upper.contains('=') {
            if has_valid_suffix(&upper) {
                seen.insert(upper.clone());
                tickers.push(upper);
            }
            continue;
        }

        if (2..=5).contains(&upper.len()) {
            seen.insert(upper.clone());
            tickers.push(upper);
        }
    }
    tickers
}

/// Format-only validation: futures/FX suffixes, plain 1-5 letter symbols, and
/// `BRK.A`-style punctuated tickers pass.
pub fn validate_tickers(tickers: &[String]) -> Vec<String> {
    static PLAIN: OnceLock<Regex> = OnceLock::new();
    static DOTTED: OnceLock<Regex> = OnceLock::new();
    let plain = PLAIN.get_or_init(|| Regex::new(r"^[A-Z]{1,5}$").expect("valid pattern"));
    let dotted = DOTTED.get_or_init(|| Regex::new(r"^[A-Z]{1,4}\.[A-Z]$").expect("valid pattern"));

    let mut valid = Vec::new();
    for ticker in tickers {
        if ticker.is_empty() {
            continue;
        }
        let upper = ticker.to_uppercase();
        if is_stopword(&upper) {
            continue;
        }
        if upper.contains('=') {
            if has_valid_suffix(&upper) {
                valid.push(ticker.clone());
            }
            continue;
        }
        if plain.is_match(&upper) || dotted.is_match(&upper) {
            valid.push(upper);
        }
    }
    valid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extracts_futures_and_plain_tickers() {
        let tickers =
            extract_tickers_from_text("GLD and CL=F rallied while AAPL fell; EURUSD=X was flat");
        assert!(tickers.contains(&"GLD".to_string()));
        assert!(tickers.contains(&"CL=F".to_string()));
        assert!(tickers.contains(&"AAPL".to_string()));
        assert!(!tickers.contains(&"AND".to_string()));
    }

    #[test]
    fn bare_single_letters_rejected_but_suffixed_accepted() {
        let tickers = extract_tickers_from_text("X fell while X=F futures rose");
        assert!(!tickers.contains(&"X".to_string()));
        assert!(tickers.contains(&"X=F".to_string()));
    }

    #[test]
    fn stopword_acronyms_are_filtered() {
        let tickers = extract_tickers_from_text("FED CPI GDP OPEC FOMC moved markets, so did NEM");
        assert_eq!(tickers, vec!["NEM".to_string()]);
    }

    #[test]
    fn duplicates_are_collapsed() {
        let tickers = extract_tickers_from_text("GLD up, GLD down, GLD sideways");
        assert_eq!(tickers, vec!["GLD".to_string()]);
    }

    #[test]
    fn invalid_suffix_is_dropped() {
        let tickers = extract_tickers_from_text("weird symbol AB=Z should vanish");
        assert!(!tickers.iter().any(|t| t.contains("AB")));
    }

    #[test]
    fn validate_accepts_dotted_class_shares() {
        let valid = validate_tickers(&strings(&["BRK.A", "brk.b", "GC=F", "AB=Z", "THE", "NVDA"]));
        assert!(valid.contains(&"BRK.A".to_string()));
        assert!(valid.contains(&"BRK.B".to_string()));
        assert!(valid.contains(&"GC=F".to_string()));
        assert!(valid.contains(&"NVDA".to_string()));
        assert!(!valid.iter().any(|t| t == "AB=Z" || t == "THE"));
    }
}
