//! Element attributes, per spec §3.2.
//!
//! Classes, inline styles, and everything else are tracked separately so
//! each can be tested and merged on its own, but [`AttributeMap::iter`]
//! presents them in a single ordered sequence: `class`, then `style`, then
//! whatever else was set, in insertion order.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::error::StyleFormatError;

static STYLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_-]*)\s*:\s*(.*)$").expect("valid regex"));

/// A node's `class`, `style`, and arbitrary other attributes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AttributeMap {
    classes: Vec<String>,
    styles: IndexMap<String, String>,
    other: IndexMap<String, String>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.classes.contains(&name) {
            self.classes.push(name);
        }
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.classes.iter().any(|c| c == name)
    }

    pub fn remove_class(&mut self, name: &str) {
        self.classes.retain(|c| c != name);
    }

    /// Parse a `property: value` declaration. The value's trailing
    /// `; \t\n` is trimmed, mirroring `AttributeMap.addStyle` in the
    /// original.
    pub fn add_style(&mut self, style: &str) -> Result<(), StyleFormatError> {
        let caps = STYLE_PATTERN
            .captures(style)
            .ok_or_else(|| StyleFormatError(style.to_owned()))?;
        let property = caps[1].to_owned();
        let value = caps[2].trim_end_matches(|c: char| "; \t\n".contains(c));
        self.styles.insert(property, value.to_owned());
        Ok(())
    }

    pub fn has_style(&self, property: &str) -> bool {
        self.styles.contains_key(property)
    }

    pub fn remove_style(&mut self, property: &str) {
        self.styles.shift_remove(property);
    }

    /// Merge another map's attributes into this one, the other's values
    /// winning on conflicts.
    pub fn merge(&mut self, other: &AttributeMap) {
        for class in &other.classes {
            self.add_class(class.clone());
        }
        for (k, v) in &other.styles {
            self.styles.insert(k.clone(), v.clone());
        }
        for (k, v) in &other.other {
            self.other.insert(k.clone(), v.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.other.len() + usize::from(!self.styles.is_empty()) + usize::from(!self.classes.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `class="..."` attribute value, or `None` if no classes are set.
    pub fn class_value(&self) -> Option<String> {
        if self.classes.is_empty() {
            None
        } else {
            Some(self.classes.join(" "))
        }
    }

    /// The `style="..."` attribute value, or `None` if no styles are set.
    pub fn style_value(&self) -> Option<String> {
        if self.styles.is_empty() {
            None
        } else {
            Some(
                self.styles
                    .iter()
                    .map(|(k, v)| format!("{k}:{v}"))
                    .collect::<Vec<_>>()
                    .join(";"),
            )
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "class" => self.class_value(),
            "style" => self.style_value(),
            _ => self.other.get(key).cloned(),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        match key {
            "class" => !self.classes.is_empty(),
            "style" => !self.styles.is_empty(),
            _ => self.other.contains_key(key),
        }
    }

    /// Set a pseudo-attribute (`class`/`style`, space- and `;`-separated
    /// respectively) or an arbitrary other attribute.
    pub fn set(&mut self, key: &str, value: &str) {
        match key {
            "class" => {
                self.classes = value.split(' ').filter(|s| !s.is_empty()).map(String::from).collect();
            }
            "style" => {
                for declaration in value.split(';') {
                    if declaration.is_empty() {
                        continue;
                    }
                    let mut parts = declaration.splitn(2, ':');
                    let property = parts.next().unwrap_or("").trim().to_owned();
                    let val = parts.next().unwrap_or("").trim().to_owned();
                    self.styles.insert(property, val);
                }
            }
            _ => {
                self.other.insert(key.to_owned(), value.to_owned());
            }
        }
    }

    pub fn remove(&mut self, key: &str) {
        match key {
            "class" => self.classes.clear(),
            "style" => self.styles.clear(),
            _ => {
                self.other.shift_remove(key);
            }
        }
    }

    pub fn clear(&mut self) {
        self.classes.clear();
        self.styles.clear();
        self.other.clear();
    }

    /// All attributes in rendering order: `class`, then `style`, then
    /// everything else in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.class_value()
            .map(|v| ("class".to_owned(), v))
            .into_iter()
            .chain(self.style_value().map(|v| ("style".to_owned(), v)))
            .chain(self.other.iter().map(|(k, v)| (k.clone(), v.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_dedupe_and_join_in_insertion_order() {
        let mut attrs = AttributeMap::new();
        attrs.add_class("a");
        attrs.add_class("b");
        attrs.add_class("a");
        assert_eq!(attrs.class_value().as_deref(), Some("a b"));
    }

    #[test]
    fn style_value_trims_trailing_punctuation() {
        let mut attrs = AttributeMap::new();
        attrs.add_style("color: red;; \t\n").unwrap();
        assert_eq!(attrs.style_value().as_deref(), Some("color:red"));
    }

    #[test]
    fn malformed_style_declaration_is_rejected() {
        let mut attrs = AttributeMap::new();
        assert!(attrs.add_style("not a declaration").is_err());
    }

    #[test]
    fn iter_orders_class_then_style_then_other() {
        let mut attrs = AttributeMap::new();
        attrs.set("data-x", "1");
        attrs.add_style("color: red").unwrap();
        attrs.add_class("em");
        let keys: Vec<String> = attrs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["class", "style", "data-x"]);
    }

    #[test]
    fn merge_overrides_existing_styles() {
        let mut base = AttributeMap::new();
        base.add_style("color: red").unwrap();
        let mut incoming = AttributeMap::new();
        incoming.add_style("color: blue").unwrap();
        base.merge(&incoming);
        assert_eq!(base.style_value().as_deref(), Some("color:blue"));
    }
}
