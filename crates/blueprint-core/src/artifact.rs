use crate::section::Section;
use crate::{BlueprintError, BlueprintResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The per-job blackboard: generated text keyed by section.
///
/// Each section is committed once by its task; only the revision path may
/// overwrite an existing entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSet {
    entries: BTreeMap<Section, String>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// First write for a section. Rejects empty text and double writes.
    pub fn commit(&mut self, section: Section, text: impl Into<String>) -> BlueprintResult<()> {
        let text = validated(section, text.into())?;
        if self.entries.contains_key(&section) {
            return Err(BlueprintError::Validation(format!(
                "section '{section}' already committed"
            )));
        }
        self.entries.insert(section, text);
        Ok(())
    }

    /// Overwrite a section, returning the previous text.
    pub fn replace(
        &mut self,
        section: Section,
        text: impl Into<String>,
    ) -> BlueprintResult<Option<String>> {
        let text = validated(section, text.into())?;
        Ok(self.entries.insert(section, text))
    }

    pub fn get(&self, section: Section) -> Option<&str> {
        self.entries.get(&section).map(String::as_str)
    }

    pub fn contains(&self, section: Section) -> bool {
        self.entries.contains_key(&section)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (Section, &str)> {
        self.entries.iter().map(|(s, t)| (*s, t.as_str()))
    }

    /// Concatenate the given sections (skipping missing ones) into one document.
    pub fn assemble(&self, order: &[Section]) -> String {
        let mut doc = String::new();
        for section in order {
            if let Some(text) = self.entries.get(section) {
                if !doc.is_empty() {
                    doc.push_str("\n\n");
                }
                doc.push_str("# ");
                doc.push_str(section.title());
                doc.push_str("\n\n");
                doc.push_str(text.trim());
            }
        }
        doc
    }
}

fn validated(section: Section, text: String) -> BlueprintResult<String> {
    if text.trim().is_empty() {
        return Err(BlueprintError::Validation(format!(
            "empty artifact for section '{section}'"
        )));
    }
    Ok(text)
}
