// Prompt composition data models
// Feature: Compose/Stream/Reconcile pipeline (001-workbench-core)

use serde::{Deserialize, Serialize};

/// Separator placed by the compose service between system fragments and user input
pub const USER_INPUT_SEPARATOR: &str = "\n---\nUSER_INPUT";

/// Credential categories recognized by the sanitizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecretType {
    ApiKey,
    PemKey,
    GoogleApiKey,
    AwsAccessKey,
    AwsSecretKey,
}

impl SecretType {
    /// Tag used inside redaction placeholders
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretType::ApiKey => "API_KEY",
            SecretType::PemKey => "PEM_KEY",
            SecretType::GoogleApiKey => "GOOGLE_API_KEY",
            SecretType::AwsAccessKey => "AWS_ACCESS_KEY",
            SecretType::AwsSecretKey => "AWS_SECRET_KEY",
        }
    }

    /// Placeholder substituted for a detected secret, e.g. `<REDACTED:API_KEY>`
    pub fn placeholder(&self) -> String {
        format!("<REDACTED:{}>", self.as_str())
    }
}

impl std::fmt::Display for SecretType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a sanitization pass
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizationResult {
    /// Input with every detected secret replaced by its placeholder
    pub sanitized: String,
    /// Distinct secret tags, in rule order, without duplicates
    pub masked_types: Vec<SecretType>,
    /// Whether the original input exceeded the length threshold
    pub over_limit: bool,
}

impl SanitizationResult {
    pub fn has_masked_secrets(&self) -> bool {
        !self.masked_types.is_empty()
    }
}

/// Sanitization result plus the raw text it was computed from.
/// Handed to compose observers before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedSnapshot {
    pub sanitized: String,
    pub masked_types: Vec<SecretType>,
    pub over_limit: bool,
    pub raw: String,
}

impl SanitizedSnapshot {
    pub fn new(result: SanitizationResult, raw: String) -> Self {
        Self {
            sanitized: result.sanitized,
            masked_types: result.masked_types,
            over_limit: result.over_limit,
            raw,
        }
    }
}

/// Result returned by a compose service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeResult {
    /// Fully assembled prompt text
    pub final_prompt: String,
    /// Content hash of `final_prompt`, computed by the compose service
    pub sha256: String,
    /// Model identifier from the recipe profile
    pub model: String,
}

impl ComposeResult {
    /// Split the prompt into (system, user) text for a chat request.
    ///
    /// The user half starts at the separator. Without a separator the
    /// whole prompt is system text.
    pub fn split_for_chat(&self) -> (String, String) {
        match self.final_prompt.find(USER_INPUT_SEPARATOR) {
            Some(at) => (
                self.final_prompt[..at].to_string(),
                self.final_prompt[at..].to_string(),
            ),
            None => (self.final_prompt.clone(), String::new()),
        }
    }

    /// Short hash prefix for display badges
    pub fn short_hash(&self) -> &str {
        let end = self
            .sha256
            .char_indices()
            .nth(16)
            .map(|(idx, _)| idx)
            .unwrap_or(self.sha256.len());
        &self.sha256[..end]
    }
}

/// Selection range over a document, in character offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRange {
    pub start: usize,
    pub end: usize,
}

impl SelectionRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// An editor pane's text. Only the left pane tracks a selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentBuffer {
    text: String,
    selection: Option<SelectionRange>,
}

impl DocumentBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            selection: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the text. The selection is dropped since its offsets no longer apply.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.selection = None;
    }

    pub fn selection(&self) -> Option<SelectionRange> {
        self.selection
    }

    /// Select a range, clamped so that `0 <= start <= end <= length`
    pub fn select(&mut self, start: usize, end: usize) {
        let len = self.text.chars().count();
        let start = start.min(len);
        let end = end.min(len).max(start);
        self.selection = Some(SelectionRange { start, end });
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Text covered by the selection, empty when nothing is selected
    pub fn selected_text(&self) -> String {
        match self.selection {
            Some(range) if !range.is_empty() => self
                .text
                .chars()
                .skip(range.start)
                .take(range.end - range.start)
                .collect(),
            _ => String::new(),
        }
    }
}
