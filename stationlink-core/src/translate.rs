//! Message translation for displays running in translation mode.
//!
//! The workstation produces operator messages in one language; a
//! translated display shows them in another. Translation is an injected
//! port so the display controller does not care where translations come
//! from. [`RuleTranslator`] covers the usual case: a few regular-expression
//! rules for messages carrying variable parts (part numbers, counts), then
//! an exact-match dictionary loaded from a `key|value` file.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DictionaryError;

/// Shown on the display when a text has no translation
pub const UNTRANSLATED_MARKER: &str = "UTT";

/// Result of a translation attempt; a miss is an outcome, not an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    Hit(String),
    Miss,
}

impl Translation {
    /// Text to put on the display
    pub fn into_text(self) -> String {
        match self {
            Translation::Hit(text) => text,
            Translation::Miss => UNTRANSLATED_MARKER.to_string(),
        }
    }
}

pub trait Translator: Send + Sync {
    fn translate(&self, text: &str) -> Translation;
}

/// Passes every text through unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Translator for Identity {
    fn translate(&self, text: &str) -> Translation {
        Translation::Hit(text.to_string())
    }
}

/// A `(pattern, template)` pair as stored in the settings file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub pattern: String,
    pub template: String,
}

/// A compiled rule. The template refers to named groups as `$name` or
/// `${name}`.
#[derive(Debug, Clone)]
pub struct TranslationRule {
    pattern: Regex,
    template: String,
}

impl TranslationRule {
    pub fn new(pattern: &str, template: &str) -> Result<Self, DictionaryError> {
        let regex = Regex::new(pattern).map_err(|e| DictionaryError::InvalidRule {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(TranslationRule {
            pattern: regex,
            template: template.to_string(),
        })
    }

    fn apply(&self, text: &str) -> Option<String> {
        let captures = self.pattern.captures(text)?;
        let mut out = String::new();
        captures.expand(&self.template, &mut out);
        Some(out)
    }
}

/// Rules first, in order, then the dictionary
#[derive(Debug, Clone, Default)]
pub struct RuleTranslator {
    rules: Vec<TranslationRule>,
    dictionary: HashMap<String, String>,
}

impl RuleTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `specs` in order
    pub fn with_rules(specs: &[RuleSpec]) -> Result<Self, DictionaryError> {
        let mut translator = Self::new();
        for spec in specs {
            translator.add_rule(TranslationRule::new(&spec.pattern, &spec.template)?);
        }
        Ok(translator)
    }

    pub fn add_rule(&mut self, rule: TranslationRule) {
        self.rules.push(rule);
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.dictionary.insert(key.to_string(), value.to_string());
    }

    pub fn len(&self) -> usize {
        self.dictionary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dictionary.is_empty() && self.rules.is_empty()
    }

    /// Merge a `key|value` dictionary into this translator, returning the
    /// number of entries read. Blank lines are skipped; later keys win.
    pub fn load_dictionary(&mut self, contents: &str) -> Result<usize, DictionaryError> {
        let entries = parse_dictionary(contents)?;
        let count = entries.len();
        self.dictionary.extend(entries);
        Ok(count)
    }
}

impl Translator for RuleTranslator {
    fn translate(&self, text: &str) -> Translation {
        let cleaned: String = text
            .chars()
            .filter(|c| !matches!(c, '\t' | '\r' | '\n'))
            .collect();

        if let Some(hit) = self.rules.iter().find_map(|r| r.apply(&cleaned)) {
            return Translation::Hit(hit);
        }
        match self.dictionary.get(&cleaned) {
            Some(value) => Translation::Hit(value.clone()),
            None => Translation::Miss,
        }
    }
}

/// Parse a dictionary file. Only the first `|` separates key from value.
pub fn parse_dictionary(contents: &str) -> Result<Vec<(String, String)>, DictionaryError> {
    let mut entries = Vec::new();
    for (n, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('|') else {
            return Err(DictionaryError::InvalidLine {
                line: n + 1,
                content: line.to_string(),
            });
        };
        entries.push((key.to_string(), value.to_string()));
    }
    Ok(entries)
}
