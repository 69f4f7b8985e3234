//! Top-level orchestration, per spec §6.
//!
//! [`Parser`] owns the namespace and extension registries and a
//! [`Configuration`], and runs every stage described in spec §4 in order.
//! Grounded on `MarkupParser.parse`/`convertString` in `oldewc/parser.py`.

use crate::config::Configuration;
use crate::dom::{Arena, NodeId};
use crate::error::Error;
use crate::extension::Registry as ExtensionRegistry;
use crate::namespace::{LocalPatterns, Namespace, Registry as NamespaceRegistry};
use crate::pipeline::{escape_transform, ExtensionTransform};

/// A parsed document: the arena that owns its nodes plus the id of its
/// root. Render it with [`crate::render::HtmlRenderer`].
pub struct Document {
    arena: Arena,
    root: NodeId,
}

impl Document {
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Renders this document to HTML4.
    pub fn render(&self, heading_depth: i32, compact_html: bool) -> Vec<u8> {
        crate::render::HtmlRenderer::new(heading_depth, compact_html).render(&self.arena, self.root)
    }
}

/// Parses EWC source into a [`Document`] and renders it to HTML. One
/// instance can parse many documents; registered namespaces/extensions are
/// shared across all of them.
pub struct Parser {
    config: Configuration,
    namespaces: NamespaceRegistry,
    extensions: ExtensionRegistry,
}

impl Parser {
    /// A parser with a default [`Configuration`] and the built-in
    /// namespace/extension registries.
    pub fn new() -> Self {
        Parser {
            extensions: ExtensionRegistry::with_builtins(None),
            namespaces: NamespaceRegistry::default(),
            config: Configuration::default(),
        }
    }

    pub fn with_config(config: Configuration) -> Self {
        let extensions = ExtensionRegistry::with_builtins(config.include_path.clone());
        let namespaces = NamespaceRegistry::with_local_patterns(LocalPatterns {
            link_pattern: config.local_link_pattern.clone(),
            image_pattern: config.local_image_pattern.clone(),
        });
        Parser { config, namespaces, extensions }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Registers (or replaces) the handler for link/image targets prefixed
    /// `name:`.
    pub fn register_namespace(&mut self, name: impl Into<String>, handler: Box<dyn Namespace>) {
        self.namespaces.register(name, handler);
    }

    /// Registers (or replaces) the handler for `<<name ...>>` extension
    /// markup.
    pub fn register_extension(&mut self, name: impl Into<String>, handler: Box<dyn crate::extension::Extension>) {
        self.extensions.register(name, handler);
    }

    /// Runs the full pipeline over `source` (already UTF-8 text; use
    /// [`crate::escape::decode`] first for raw bytes): tilde-escaping,
    /// extension expansion, block parsing, inline markup, the magic-comment
    /// hook, escape removal, and normalization.
    pub fn parse(&mut self, source: &str) -> Result<Document, Error> {
        let lines = escape_transform(source.lines().map(str::to_owned));
        let expanded = ExtensionTransform::new(lines, &mut self.extensions, self.config.include_depth_limit);

        let mut arena = Arena::new();
        let mut block_parser = crate::block::BlockParser::new(&mut arena)?;
        for line in expanded {
            block_parser.feed(&mut arena, &line?)?;
        }
        block_parser.feed(&mut arena, "")?;

        let root = arena.root();
        crate::inline::walk(&mut arena, &self.namespaces, &self.config, root)?;
        crate::inline::run_magic_comments(&arena, root);
        crate::inline::remove_escapes_tree(&mut arena, root);
        crate::dom::normalize::normalize(&mut arena, root);

        Ok(Document { arena, root })
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses `text` and renders it straight to an HTML string, the
/// `convertString` convenience function from spec §6.
pub fn convert_string(text: &str, heading_depth: i32) -> Result<String, Error> {
    let document = Parser::new().parse(text)?;
    Ok(String::from_utf8(document.render(heading_depth, false)).expect("renderer only emits UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_round_trips_to_html() {
        let html = convert_string("=== Hello ===", 0).unwrap();
        assert!(html.contains("<h2>Hello</h2>"), "{html}");
    }

    #[test]
    fn paragraph_with_bold_span_round_trips() {
        let html = convert_string("a **bold** word", 0).unwrap();
        assert!(html.contains("<b>bold</b>"), "{html}");
    }

    #[test]
    fn nested_list_round_trips() {
        let html = convert_string("* one\n** two\n* three", 0).unwrap();
        assert!(html.contains("<ul>"), "{html}");
        assert!(html.matches("<ul>").count() >= 2, "{html}");
    }

    #[test]
    fn link_and_image_round_trip() {
        let html = convert_string("[[wp:Rust|lang]] {{pic.png}}", 0).unwrap();
        assert!(html.contains(r#"href="http://en.wikipedia.org/wiki/Rust""#), "{html}");
        assert!(html.contains(r#"src="/i/pic.png""#), "{html}");
    }

    #[test]
    fn comment_extension_is_removed_before_block_parsing() {
        let html = convert_string("before <<! secret >> after", 0).unwrap();
        assert!(!html.contains("secret"), "{html}");
    }

    #[test]
    fn local_link_and_image_patterns_from_config_are_honored() {
        let config = crate::config::ConfigBuilder::new()
            .local_link_pattern("/pages/{name}")
            .local_image_pattern("/media/{name}")
            .build();
        let mut parser = Parser::with_config(config);
        let doc = parser.parse("[[Some Page]] {{pic.png}}").unwrap();
        let html = String::from_utf8(doc.render(0, false)).unwrap();
        assert!(html.contains(r#"href="/pages/some_page""#), "{html}");
        assert!(html.contains(r#"src="/media/pic.png""#), "{html}");
    }

    #[test]
    fn registering_a_namespace_affects_link_resolution() {
        struct Upcase;
        impl Namespace for Upcase {
            fn link_url(&self, name: &str) -> String {
                name.to_uppercase()
            }
            fn image_url(&self, _name: &str) -> Option<String> {
                None
            }
        }
        let mut parser = Parser::new();
        parser.register_namespace("up", Box::new(Upcase));
        let doc = parser.parse("[[up:hello]]").unwrap();
        let html = String::from_utf8(doc.render(0, false)).unwrap();
        assert!(html.contains(r#"href="HELLO""#), "{html}");
    }
}
