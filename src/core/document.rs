// src/core/document.rs

//! The section-keyed configuration document consumed by temboard-agent.
//!
//! Rendered as `[section]` headers followed by `key = value` lines, with a
//! blank line between sections. Sections keep their insertion order.

use indexmap::IndexMap;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationDocument {
    header: Vec<String>,
    sections: IndexMap<String, IndexMap<String, String>>,
}

impl ConfigurationDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a comment line printed before the first section.
    pub fn push_comment(&mut self, line: impl Into<String>) {
        self.header.push(line.into());
    }

    /// Sets `key` in `section`, creating the section at the end if needed.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .map(String::as_str)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ConfigurationDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.header {
            if line.is_empty() {
                writeln!(f, "#")?;
            } else {
                writeln!(f, "# {line}")?;
            }
        }
        for (i, (name, entries)) in self.sections.iter().enumerate() {
            if i > 0 || !self.header.is_empty() {
                writeln!(f)?;
            }
            writeln!(f, "[{name}]")?;
            for (key, value) in entries {
                writeln!(f, "{key} = {value}")?;
            }
        }
        Ok(())
    }
}
