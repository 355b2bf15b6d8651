//! Inbound text screening: prompt-injection deny-list.
//!
//! Matched messages are dropped before they ever reach a buffer, so an
//! injected instruction can never be folded into a reasoning turn.

use regex::RegexSet;
use std::sync::LazyLock;

static INJECTION_DENY_LIST: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)ignore\s+(all\s+|any\s+)?previous\s+instructions",
        r"(?i)disregard\s+(all\s+|your\s+)?(previous\s+)?instructions",
        r"(?i)you\s+are\s+now\b",
        r"(?i)developer\s+mode",
        r"(?i)reveal\s+your\s+(system\s+)?prompt",
        r"(?i)act\s+as\s+an?\s+unrestricted",
    ])
    .expect("hardcoded injection deny-list")
});

/// Returns true when the text matches a known prompt-injection phrase.
pub fn is_injection_attempt(text: &str) -> bool {
    INJECTION_DENY_LIST.is_match(text)
}
