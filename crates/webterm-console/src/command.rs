//! Submitted command lines.

#![allow(missing_docs)]

/// A trimmed line typed by the user, split into a lower-cased name and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    raw: String,
    name: String,
    args: Vec<String>,
}

impl CommandLine {
    /// Returns `None` for blank input.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let raw = input.trim();
        let mut parts = raw.split_whitespace();
        let name = parts.next()?.to_lowercase();
        let args = parts.map(str::to_string).collect();
        Some(Self {
            raw: raw.to_string(),
            name,
            args,
        })
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}
