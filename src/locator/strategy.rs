//! Locator strategies
//!
//! A strategy is one declarative way of finding an element. Strategies are plain
//! data so they can be stored in session memory and produced by the LLM as JSON.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One way of locating a page element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocatorStrategy {
    /// ARIA role, optionally narrowed by accessible name
    Role {
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Form control associated with a label
    Label { text: String },
    /// Input with the given placeholder
    Placeholder { text: String },
    /// Element whose visible text matches
    Text {
        text: String,
        #[serde(default)]
        exact: bool,
    },
    /// `data-testid` attribute
    TestId { id: String },
    /// Raw CSS selector
    Css { selector: String },
    /// Raw XPath expression
    #[serde(rename = "xpath")]
    XPath { expression: String },
}

impl LocatorStrategy {
    /// Role strategy with accessible name
    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: Some(name.into()),
        }
    }

    /// Label strategy
    pub fn label(text: impl Into<String>) -> Self {
        Self::Label { text: text.into() }
    }

    /// Placeholder strategy
    pub fn placeholder(text: impl Into<String>) -> Self {
        Self::Placeholder { text: text.into() }
    }

    /// Substring text strategy
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            exact: false,
        }
    }

    /// Test-id strategy
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId { id: id.into() }
    }

    /// CSS strategy
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css {
            selector: selector.into(),
        }
    }

    /// XPath strategy
    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::XPath {
            expression: expression.into(),
        }
    }

    /// Short tag name of the strategy kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Role { .. } => "role",
            Self::Label { .. } => "label",
            Self::Placeholder { .. } => "placeholder",
            Self::Text { .. } => "text",
            Self::TestId { .. } => "test_id",
            Self::Css { .. } => "css",
            Self::XPath { .. } => "xpath",
        }
    }

    /// Position in the stability ordering (lower is more stable)
    pub fn stability_rank(&self) -> u8 {
        match self {
            Self::Role { .. } => 0,
            Self::Label { .. } => 1,
            Self::Placeholder { .. } => 2,
            Self::Text { .. } => 3,
            Self::TestId { .. } => 4,
            Self::Css { .. } => 5,
            Self::XPath { .. } => 6,
        }
    }

    /// Selector understood by the browser driver for structural strategies
    pub fn driver_selector(&self) -> Option<String> {
        match self {
            Self::TestId { id } => Some(format!("[data-testid=\"{}\"]", id)),
            Self::Css { selector } => Some(selector.clone()),
            Self::XPath { expression } => Some(format!("xpath={}", expression)),
            _ => None,
        }
    }
}

impl fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role { role, name: Some(name) } => write!(f, "role={} name=\"{}\"", role, name),
            Self::Role { role, name: None } => write!(f, "role={}", role),
            Self::Label { text } => write!(f, "label=\"{}\"", text),
            Self::Placeholder { text } => write!(f, "placeholder=\"{}\"", text),
            Self::Text { text, exact: true } => write!(f, "text=\"{}\" (exact)", text),
            Self::Text { text, exact: false } => write!(f, "text=\"{}\"", text),
            Self::TestId { id } => write!(f, "test_id=\"{}\"", id),
            Self::Css { selector } => write!(f, "css={}", selector),
            Self::XPath { expression } => write!(f, "xpath={}", expression),
        }
    }
}

/// A semantic request for an element, from which fallback strategies are derived
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
}

impl ElementQuery {
    /// Build from loose tool-call arguments; unknown keys are ignored
    pub fn from_arguments(arguments: &serde_json::Value) -> Self {
        let get = |key: &str| {
            arguments
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Self {
            role: get("role"),
            name: get("name"),
            label: get("label"),
            placeholder: get("placeholder"),
            text: get("text"),
            test_id: get("test_id"),
            selector: get("selector"),
            xpath: get("xpath"),
        }
    }

    /// True when no field can produce a strategy
    pub fn is_empty(&self) -> bool {
        self.fallback_strategies().is_empty()
    }

    /// Ordered fallback set: role > label > placeholder > text > test-id > css > xpath
    pub fn fallback_strategies(&self) -> Vec<LocatorStrategy> {
        let mut strategies = Vec::new();

        if let Some(role) = &self.role {
            strategies.push(LocatorStrategy::Role {
                role: role.clone(),
                name: self.name.clone().or_else(|| self.text.clone()),
            });
        }
        if let Some(label) = &self.label {
            strategies.push(LocatorStrategy::label(label.clone()));
        }
        if let Some(placeholder) = &self.placeholder {
            strategies.push(LocatorStrategy::placeholder(placeholder.clone()));
        }
        if let Some(text) = self.text.as_ref().or(self.name.as_ref()) {
            strategies.push(LocatorStrategy::text(text.clone()));
        }
        if let Some(id) = &self.test_id {
            strategies.push(LocatorStrategy::test_id(id.clone()));
        }
        if let Some(selector) = &self.selector {
            strategies.push(LocatorStrategy::css(selector.clone()));
        }
        if let Some(expression) = &self.xpath {
            strategies.push(LocatorStrategy::xpath(expression.clone()));
        }

        strategies
    }

    /// Human description of the element, used when asking the LLM to re-identify it
    pub fn describe(&self) -> String {
        let noun = self.role.clone().unwrap_or_else(|| "element".to_string());
        let name = self
            .name
            .as_ref()
            .or(self.label.as_ref())
            .or(self.text.as_ref())
            .or(self.placeholder.as_ref());

        match name {
            Some(name) => format!("\"{}\" {}", name, noun),
            None => match self.test_id.as_ref().or(self.selector.as_ref()) {
                Some(hint) => format!("{} matching {}", noun, hint),
                None => noun,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_order_follows_stability() {
        let query = ElementQuery {
            role: Some("button".to_string()),
            name: Some("Sign in".to_string()),
            label: Some("Sign in".to_string()),
            test_id: Some("login-btn".to_string()),
            selector: Some("form button.primary".to_string()),
            xpath: Some("//form//button[1]".to_string()),
            ..Default::default()
        };

        let strategies = query.fallback_strategies();
        let kinds: Vec<_> = strategies.iter().map(|s| s.kind()).collect();
        assert_eq!(
            kinds,
            vec!["role", "label", "text", "test_id", "css", "xpath"]
        );

        let ranks: Vec<_> = strategies.iter().map(|s| s.stability_rank()).collect();
        let mut sorted = ranks.clone();
        sorted.sort();
        assert_eq!(ranks, sorted);
    }

    #[test]
    fn test_from_arguments_ignores_blank() {
        let query = ElementQuery::from_arguments(&serde_json::json!({
            "placeholder": "Search",
            "text": "  ",
            "intent": "search box"
        }));
        assert_eq!(query.placeholder.as_deref(), Some("Search"));
        assert!(query.text.is_none());
        assert_eq!(query.fallback_strategies(), vec![LocatorStrategy::placeholder("Search")]);
        assert!(ElementQuery::default().is_empty());
    }

    #[test]
    fn test_strategy_json_shape() {
        let strategy: LocatorStrategy =
            serde_json::from_str(r#"{"kind": "role", "role": "link", "name": "Docs"}"#).unwrap();
        assert_eq!(strategy, LocatorStrategy::role("link", "Docs"));

        let xpath = serde_json::to_value(LocatorStrategy::xpath("//a")).unwrap();
        assert_eq!(xpath["kind"], "xpath");

        let test_id = serde_json::to_value(LocatorStrategy::test_id("submit")).unwrap();
        assert_eq!(test_id["kind"], "test_id");
    }

    #[test]
    fn test_driver_selector() {
        assert_eq!(
            LocatorStrategy::test_id("go").driver_selector().as_deref(),
            Some("[data-testid=\"go\"]")
        );
        assert_eq!(
            LocatorStrategy::xpath("//a").driver_selector().as_deref(),
            Some("xpath=//a")
        );
        assert!(LocatorStrategy::label("Email").driver_selector().is_none());
    }

    #[test]
    fn test_describe() {
        let query = ElementQuery {
            role: Some("button".to_string()),
            name: Some("Search".to_string()),
            ..Default::default()
        };
        assert_eq!(query.describe(), "\"Search\" button");
        assert_eq!(ElementQuery::default().describe(), "element");
    }
}
