//! Meta stack definitions: ordered elements plus formatting rules

#![allow(missing_docs)]

use crate::{error::CacheResult, stack::element::MetaStackElement};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How repeated layer values are collapsed before joining
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateRemoval {
    /// Keep every layer's value
    RetainAll,
    /// Keep only the first occurrence of each distinct value
    FirstOnly,
    /// Keep only the last occurrence of each distinct value
    LastOnly,
}

impl DuplicateRemoval {
    pub fn apply<'a>(self, values: Vec<&'a str>) -> Vec<&'a str> {
        match self {
            Self::RetainAll => values,
            Self::FirstOnly => {
                let mut seen = HashSet::with_capacity(values.len());
                values.into_iter().filter(|v| seen.insert(*v)).collect()
            }
            Self::LastOnly => {
                let mut seen = HashSet::with_capacity(values.len());
                let mut kept: Vec<&str> = values
                    .into_iter()
                    .rev()
                    .filter(|v| seen.insert(*v))
                    .collect();
                kept.reverse();
                kept
            }
        }
    }
}

/// Immutable description of a meta stack.
///
/// Used inside query options, so equality and hashing are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetaStackDefinition {
    elements: Vec<MetaStackElement>,
    #[serde(rename = "duplicates")]
    duplicate_removal: DuplicateRemoval,
    #[serde(default)]
    start_spacer: String,
    #[serde(default)]
    middle_spacer: String,
    #[serde(default)]
    end_spacer: String,
}

impl MetaStackDefinition {
    pub fn new(
        elements: Vec<MetaStackElement>,
        duplicate_removal: DuplicateRemoval,
        start_spacer: impl Into<String>,
        middle_spacer: impl Into<String>,
        end_spacer: impl Into<String>,
    ) -> Self {
        Self {
            elements,
            duplicate_removal,
            start_spacer: start_spacer.into(),
            middle_spacer: middle_spacer.into(),
            end_spacer: end_spacer.into(),
        }
    }

    /// Build from element config strings such as `highest_own`
    pub fn parse<S: AsRef<str>>(
        elements: &[S],
        duplicate_removal: DuplicateRemoval,
        start_spacer: &str,
        middle_spacer: &str,
        end_spacer: &str,
    ) -> CacheResult<Self> {
        let elements = elements
            .iter()
            .map(|e| e.as_ref().parse())
            .collect::<CacheResult<Vec<_>>>()?;
        Ok(Self::new(
            elements,
            duplicate_removal,
            start_spacer,
            middle_spacer,
            end_spacer,
        ))
    }

    pub fn elements(&self) -> &[MetaStackElement] {
        &self.elements
    }

    pub fn duplicate_removal(&self) -> DuplicateRemoval {
        self.duplicate_removal
    }

    pub fn start_spacer(&self) -> &str {
        &self.start_spacer
    }

    pub fn middle_spacer(&self) -> &str {
        &self.middle_spacer
    }

    pub fn end_spacer(&self) -> &str {
        &self.end_spacer
    }

    /// Join layer values per this definition. None when there are no values.
    pub fn format(&self, values: Vec<&str>) -> Option<String> {
        let values = self.duplicate_removal.apply(values);
        if values.is_empty() {
            return None;
        }
        let mut out = String::with_capacity(
            self.start_spacer.len()
                + self.end_spacer.len()
                + values.iter().map(|v| v.len() + self.middle_spacer.len()).sum::<usize>(),
        );
        out.push_str(&self.start_spacer);
        out.push_str(&values.join(&self.middle_spacer));
        out.push_str(&self.end_spacer);
        Some(out)
    }
}

impl Default for MetaStackDefinition {
    /// `[highest]`, first-only, no spacers
    fn default() -> Self {
        Self::new(
            vec![MetaStackElement::highest()],
            DuplicateRemoval::FirstOnly,
            "",
            "",
            "",
        )
    }
}
