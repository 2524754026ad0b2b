// Input Sanitizer
// Feature: Compose/Stream/Reconcile pipeline (001-workbench-core)
//
// Masks credential-shaped substrings before user text leaves the process:
// - Generic api-key/token/secret assignments
// - PEM private key blocks
// - Google API keys
// - AWS access and secret keys
//
// Masking always runs. The length limit only raises a flag.

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};

use crate::models::prompt::{SanitizationResult, SecretType};

/// Inputs longer than this (in characters) are flagged as over limit
pub const MAX_INPUT_CHARS: usize = 40_000;

/// Phrases that commonly show up in prompt-injection attempts
pub const DANGER_WORDS: &[&str] = &[
    "ignore previous",
    "disregard earlier instructions",
    "overrule safeguards",
];

struct SecretPattern {
    secret_type: SecretType,
    regex: Regex,
}

/// Rules in application order. The regex crate guarantees linear-time matching.
static SECRET_PATTERNS: Lazy<Vec<SecretPattern>> = Lazy::new(|| {
    let patterns = [
        // key: value / key=value, optionally quoted
        (
            SecretType::ApiKey,
            r#"(?i)(?:api[_-]?key|token|secret)\s*[:=]\s*['"]?[A-Za-z0-9_\-]{16,}['"]?"#,
        ),
        // Non-greedy so adjacent blocks are masked separately
        (
            SecretType::PemKey,
            r"(?s)-----BEGIN (?:RSA|EC|PRIVATE) KEY-----.+?-----END (?:RSA|EC|PRIVATE) KEY-----",
        ),
        (SecretType::GoogleApiKey, r"AIza[0-9A-Za-z\-_]{35}"),
        (SecretType::AwsAccessKey, r"(?:AKIA|ASIA)[0-9A-Z]{16}"),
        (
            SecretType::AwsSecretKey,
            r"(?i)aws(?:.{0,20})?(?:secret|access).{0,20}?[A-Za-z0-9/+=]{40}",
        ),
    ];

    patterns
        .iter()
        .filter_map(|(secret_type, pattern)| {
            Regex::new(pattern).ok().map(|regex| SecretPattern {
                secret_type: *secret_type,
                regex,
            })
        })
        .collect()
});

/// Sanitize text before it is sent to a model.
///
/// Every rule is applied in declaration order and each match is replaced by
/// `<REDACTED:TYPE>`. `over_limit` reflects the raw input length and does not
/// disable masking.
pub fn sanitize(text: &str) -> SanitizationResult {
    if text.is_empty() {
        return SanitizationResult::default();
    }

    let over_limit = text.chars().count() > MAX_INPUT_CHARS;
    if over_limit {
        log::warn!(
            "Input exceeds {} characters; sending without truncation",
            MAX_INPUT_CHARS
        );
    }

    let mut sanitized = text.to_string();
    let mut masked_types: Vec<SecretType> = Vec::new();

    for pattern in SECRET_PATTERNS.iter() {
        if !pattern.regex.is_match(&sanitized) {
            continue;
        }
        let placeholder = pattern.secret_type.placeholder();
        sanitized = pattern
            .regex
            .replace_all(&sanitized, NoExpand(&placeholder))
            .into_owned();
        if !masked_types.contains(&pattern.secret_type) {
            masked_types.push(pattern.secret_type);
        }
    }

    if !masked_types.is_empty() {
        let tags: Vec<&str> = masked_types.iter().map(SecretType::as_str).collect();
        log::info!("Masked secrets in user input: {}", tags.join(", "));
    }

    SanitizationResult {
        sanitized,
        masked_types,
        over_limit,
    }
}

/// Whether the input contains a known prompt-injection phrase (case-insensitive).
/// Advisory only; nothing is blocked.
pub fn contains_danger_words(input: &str) -> bool {
    if input.is_empty() {
        return false;
    }
    let normalized = input.to_lowercase();
    DANGER_WORDS.iter().any(|word| normalized.contains(word))
}
