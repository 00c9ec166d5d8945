//! Regex literal and regex-substitution value payloads.
//!
//! These are thin wrappers around the `regex` crate: a `RegexLiteral` value
//! (`m/pattern/opts`) and a `RegexSubst` value (`s/pattern/replacement/opts`)
//! are both first-class, passable, storable values, not just syntax — they
//! can be bound to a variable and applied with `=~`/`!~` later. Compilation
//! happens once, eagerly, at literal-construction time; a value never holds
//! an uncompiled pattern string.

use regex::{Regex, RegexBuilder};
use rune_core::sink::ErrorRecord;

pub struct RegexLiteral {
    pub pattern: String,
    pub case_insensitive: bool,
    pub multiline: bool,
    pub extended: bool,
    compiled: Regex,
}

impl RegexLiteral {
    pub fn compile(pattern: &str, case_insensitive: bool, multiline: bool, extended: bool) -> Result<Self, ErrorRecord> {
        let compiled = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .multi_line(multiline)
            .ignore_whitespace(extended)
            .build()
            .map_err(|e| ErrorRecord::new("REGEX-COMPILATION-ERROR", e.to_string()))?;
        Ok(Self {
            pattern: pattern.to_string(),
            case_insensitive,
            multiline,
            extended,
            compiled,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.compiled.is_match(text)
    }

    pub fn find(&self, text: &str) -> Option<(usize, usize)> {
        self.compiled.find(text).map(|m| (m.start(), m.end()))
    }

    pub fn captures<'t>(&self, text: &'t str) -> Option<regex::Captures<'t>> {
        self.compiled.captures(text)
    }
}

pub struct RegexSubst {
    pub matcher: RegexLiteral,
    pub replacement: String,
    pub global: bool,
}

impl RegexSubst {
    pub fn apply(&self, text: &str) -> String {
        if self.global {
            self.matcher.compiled.replace_all(text, self.replacement.as_str()).into_owned()
        } else {
            self.matcher.compiled.replace(text, self.replacement.as_str()).into_owned()
        }
    }
}
