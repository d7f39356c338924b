//! Snapshot parsing for agent-browser output
//!
//! Parses the accessibility tree JSON from agent-browser and matches semantic
//! locator strategies against it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::locator::LocatorStrategy;

/// Parsed snapshot from agent-browser
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Whether the operation succeeded
    #[serde(default)]
    pub success: bool,
    /// Snapshot data
    #[serde(default)]
    pub data: Option<SnapshotData>,
}

/// Snapshot data content
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotData {
    /// Raw snapshot string (accessibility tree)
    #[serde(default)]
    pub snapshot: String,
    /// Element refs mapped to their info
    #[serde(default)]
    pub refs: HashMap<String, Element>,
}

/// An element in the snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Element {
    /// ARIA role
    #[serde(default)]
    pub role: String,
    /// Accessible name
    #[serde(default)]
    pub name: String,
    /// Element value (for inputs)
    #[serde(default)]
    pub value: Option<String>,
    /// Whether element is focused
    #[serde(default)]
    pub focused: bool,
    /// Additional properties
    #[serde(flatten)]
    pub properties: HashMap<String, serde_json::Value>,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Order refs like e2 before e10
fn ref_order(a: &str, b: &str) -> std::cmp::Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

impl Snapshot {
    /// Count the number of elements with refs
    pub fn count_elements(&self) -> usize {
        self.data.as_ref().map(|d| d.refs.len()).unwrap_or(0)
    }

    /// All elements in document ref order
    pub fn ordered_elements(&self) -> Vec<(&String, &Element)> {
        let mut elements: Vec<_> = self
            .data
            .as_ref()
            .map(|d| d.refs.iter().collect())
            .unwrap_or_default();
        elements.sort_by(|(a, _), (b, _)| ref_order(a, b));
        elements
    }

    /// First element matching a semantic strategy, as an `@ref` target.
    /// Structural strategies are not answerable from the accessibility tree.
    pub fn locate(&self, strategy: &LocatorStrategy) -> Option<String> {
        let elements = self.ordered_elements();
        let found = elements.into_iter().find(|(_, el)| match strategy {
            LocatorStrategy::Role { role, name } => {
                el.role == *role && name.as_ref().map_or(true, |n| contains_ci(&el.name, n))
            }
            LocatorStrategy::Label { text } => {
                el.is_input()
                    && (contains_ci(&el.name, text)
                        || el.property_str("label").is_some_and(|l| contains_ci(l, text)))
            }
            LocatorStrategy::Placeholder { text } => el
                .property_str("placeholder")
                .map_or(el.is_input() && contains_ci(&el.name, text), |p| contains_ci(p, text)),
            LocatorStrategy::Text { text, exact: true } => el.name.trim() == text.trim(),
            LocatorStrategy::Text { text, exact: false } => contains_ci(&el.name, text),
            _ => false,
        });
        found.map(|(ref_id, _)| format!("@{}", ref_id))
    }

    /// Format snapshot for display
    pub fn format_for_display(&self) -> String {
        if self.data.is_none() {
            return "No snapshot data available".to_string();
        }

        let mut output = String::new();
        output.push_str("Page Elements:\n");

        for (ref_id, element) in self.ordered_elements() {
            let value_str = element
                .value
                .as_ref()
                .map(|v| format!(" = \"{}\"", v))
                .unwrap_or_default();

            output.push_str(&format!(
                "  @{}: {} \"{}\"{}",
                ref_id, element.role, element.name, value_str
            ));

            if element.focused {
                output.push_str(" [focused]");
            }

            output.push('\n');
        }

        output
    }
}

impl Element {
    /// Check if this is an input element
    pub fn is_input(&self) -> bool {
        matches!(
            self.role.as_str(),
            "textbox" | "searchbox" | "combobox" | "spinbutton" | "listbox"
        )
    }

    /// String property from the flattened extras
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }
}
