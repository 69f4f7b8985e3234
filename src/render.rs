//! The HTML renderer, per spec §4.8.
//!
//! Walks the tree with [`crate::dom::visit::Visitor`] and emits HTML4,
//! ported from `HTMLDomVisitor` in `oldewc/dom.py`: the magic-class tag
//! substitution for `Span`/`Paragraph`, the table-cell placeholder
//! suppression, and the heading-depth shift are all carried over as-is.

use std::convert::Infallible;

use crate::attrs::AttributeMap;
use crate::dom::visit::{dispatch, Visitor};
use crate::dom::{Arena, NodeId, NodeKind};

/// Block-level tags that always start on a new line, even in compact mode.
/// Ported from the inline literal set in `_open_tag`.
const ALWAYS_NEWLINE_TAGS: [&str; 14] =
    ["p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "dl", "li", "br", "hr"];

/// `class` values that rename a `Span` to its own tag instead of `<span
/// class="...">`, in priority order. Ported from `magic_span_types`.
const MAGIC_SPAN_TYPES: [&str; 10] =
    ["em", "strong", "b", "i", "tt", "sub", "sup", "abbr", "acronym", "dfn"];

/// `class` values that rename a `Paragraph` to its own tag. Ported from
/// `magic_paragraph_types`.
const MAGIC_PARAGRAPH_TYPES: [&str; 1] = ["blockquote"];

/// Characters rendered as named entities instead of their literal bytes,
/// ported from `chars_to_entities`. `&`, `<`, `>` are handled separately
/// since every text node needs them regardless of configuration.
const CHAR_ENTITIES: [(char, &str); 7] = [
    ('\u{00A0}', "nbsp"),
    ('\u{2013}', "ndash"),
    ('\u{2014}', "mdash"),
    ('\u{2018}', "lsquo"),
    ('\u{2019}', "rsquo"),
    ('\u{201C}', "ldquo"),
    ('\u{201D}', "rdquo"),
];

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '>' => out.push_str("&gt;"),
            '<' => out.push_str("&lt;"),
            _ => match CHAR_ENTITIES.iter().find(|&&(ch, _)| ch == c) {
                Some(&(_, name)) => {
                    out.push('&');
                    out.push_str(name);
                    out.push(';');
                }
                None => out.push(c),
            },
        }
    }
    out
}

/// Renders a parsed document to HTML4. One instance renders one document;
/// construct a fresh one per render.
pub struct HtmlRenderer {
    heading_depth: i32,
    compact_html: bool,
    out: String,
}

impl HtmlRenderer {
    pub fn new(heading_depth: i32, compact_html: bool) -> Self {
        HtmlRenderer { heading_depth, compact_html, out: String::new() }
    }

    /// Renders `root` (normally an [`Arena::root`]) and returns the output
    /// as a byte stream, per spec §6's `HTMLRenderer(...).render(document)`.
    pub fn render(mut self, arena: &Arena, root: NodeId) -> Vec<u8> {
        dispatch(&mut self, arena, root).unwrap();
        self.out.into_bytes()
    }

    fn open_tag(
        &self,
        name: &str,
        attrs: impl Iterator<Item = (String, String)>,
        extra_attrs: &[(&str, String)],
        has_children: bool,
    ) -> String {
        let mut tag = String::new();
        if !self.compact_html || ALWAYS_NEWLINE_TAGS.contains(&name) {
            tag.push('\n');
        }
        tag.push('<');
        tag.push_str(name);
        for (k, v) in attrs {
            if k.starts_with("x-") {
                continue;
            }
            tag.push(' ');
            tag.push_str(&k);
            tag.push_str("=\"");
            tag.push_str(&html_escape::encode_double_quoted_attribute(&v));
            tag.push('"');
        }
        for (k, v) in extra_attrs {
            tag.push(' ');
            tag.push_str(k);
            tag.push_str("=\"");
            tag.push_str(&html_escape::encode_double_quoted_attribute(v));
            tag.push('"');
        }
        tag.push_str(if has_children { ">" } else { " />" });
        tag
    }

    fn do_element(
        &mut self,
        arena: &Arena,
        id: NodeId,
        name: &str,
        extra_attrs: &[(&str, String)],
    ) -> Result<(), Infallible> {
        let attrs = arena.attrs(id).cloned().unwrap_or_default();
        let children = arena.children(id);
        let has_children = !children.is_empty();
        self.out.push_str(&self.open_tag(name, attrs.iter(), extra_attrs, has_children));
        for &child in children {
            dispatch(self, arena, child)?;
        }
        if has_children {
            self.out.push_str("</");
            self.out.push_str(name);
            self.out.push('>');
        }
        Ok(())
    }

    /// Like [`Self::do_element`], but `name` is swapped for the first class
    /// in `magic` that the node carries (and that class is stripped from
    /// the rendered attributes). Ported from `_do_special_element`.
    fn do_special_element(
        &mut self,
        arena: &Arena,
        id: NodeId,
        default_name: &'static str,
        magic: &[&'static str],
    ) -> Result<(), Infallible> {
        let mut attrs: AttributeMap = arena.attrs(id).cloned().unwrap_or_default();
        let mut name = default_name;
        for &candidate in magic {
            if attrs.has_class(candidate) {
                attrs.remove_class(candidate);
                name = candidate;
                break;
            }
        }
        let children = arena.children(id);
        let has_children = !children.is_empty();
        self.out.push_str(&self.open_tag(name, attrs.iter(), &[], has_children));
        for &child in children {
            dispatch(self, arena, child)?;
        }
        if has_children {
            self.out.push_str("</");
            self.out.push_str(name);
            self.out.push('>');
        }
        Ok(())
    }

    /// `-1` rowspan/colspan marks a placeholder cell absorbed by an
    /// earlier spanning cell: it renders nothing at all. Ported from
    /// `_do_base_table_data`.
    fn do_base_table_data(&mut self, arena: &Arena, id: NodeId, name: &str) -> Result<(), Infallible> {
        let (rowspan, colspan) = match arena.kind(id) {
            NodeKind::TableData { rowspan, colspan, .. } | NodeKind::TableHeading { rowspan, colspan, .. } => {
                (*rowspan, *colspan)
            }
            _ => unreachable!("do_base_table_data is only called for TableData/TableHeading"),
        };
        if rowspan == -1 || colspan == -1 {
            return Ok(());
        }
        let mut extra = Vec::new();
        if colspan > 0 {
            extra.push(("colspan", (colspan + 1).to_string()));
        }
        if rowspan > 0 {
            extra.push(("rowspan", (rowspan + 1).to_string()));
        }
        self.do_element(arena, id, name, &extra)
    }
}

impl Visitor<Infallible> for HtmlRenderer {
    fn visit_node(&mut self, _arena: &Arena, _id: NodeId) -> Result<(), Infallible> {
        unreachable!("every concrete NodeKind overrides a visit_* method below")
    }

    fn visit_text(&mut self, arena: &Arena, id: NodeId) -> Result<(), Infallible> {
        if let NodeKind::Text(s) = arena.kind(id) {
            self.out.push_str(&escape_text(s));
        }
        Ok(())
    }

    fn visit_comment(&mut self, arena: &Arena, id: NodeId) -> Result<(), Infallible> {
        if let NodeKind::Comment(s) = arena.kind(id) {
            self.out.push_str("<!--");
            self.out.push_str(s);
            self.out.push_str("-->");
        }
        Ok(())
    }

    fn visit_span(&mut self, arena: &Arena, id: NodeId) -> Result<(), Infallible> {
        self.do_special_element(arena, id, "span", &MAGIC_SPAN_TYPES)
    }

    fn visit_paragraph(&mut self, arena: &Arena, id: NodeId) -> Result<(), Infallible> {
        self.do_special_element(arena, id, "p", &MAGIC_PARAGRAPH_TYPES)
    }

    fn visit_break(&mut self, arena: &Arena, id: NodeId) -> Result<(), Infallible> {
        self.do_element(arena, id, "br", &[])
    }

    fn visit_link(&mut self, arena: &Arena, id: NodeId) -> Result<(), Infallible> {
        self.do_element(arena, id, "a", &[])
    }

    fn visit_image(&mut self, arena: &Arena, id: NodeId) -> Result<(), Infallible> {
        let mut attrs = arena.attrs(id).cloned().unwrap_or_default();
        if !attrs.contains_key("alt") {
            attrs.set("alt", "");
        }
        let has_children = !arena.children(id).is_empty();
        self.out.push_str(&self.open_tag("img", attrs.iter(), &[], has_children));
        Ok(())
    }

    fn visit_rule(&mut self, arena: &Arena, id: NodeId) -> Result<(), Infallible> {
        self.do_element(arena, id, "hr", &[])
    }

    fn visit_division(&mut self, arena: &Arena, id: NodeId) -> Result<(), Infallible> {
        self.do_element(arena, id, "div", &[])
    }

    fn visit_heading(&mut self, arena: &Arena, id: NodeId) -> Result<(), Infallible> {
        let NodeKind::Heading { level, .. } = arena.kind(id) else {
            unreachable!("visit_heading is only called for Heading nodes")
        };
        let tag = format!("h{}", *level as i32 + self.heading_depth);
        self.do_element(arena, id, &tag, &[])
    }

    fn visit_table(&mut self, arena: &Arena, id: NodeId) -> Result<(), Infallible> {
        self.do_element(arena, id, "table", &[])
    }

    fn visit_table_row(&mut self, arena: &Arena, id: NodeId) -> Result<(), Infallible> {
        self.do_element(arena, id, "tr", &[])
    }

    fn visit_table_data(&mut self, arena: &Arena, id: NodeId) -> Result<(), Infallible> {
        self.do_base_table_data(arena, id, "td")
    }

    fn visit_table_heading(&mut self, arena: &Arena, id: NodeId) -> Result<(), Infallible> {
        self.do_base_table_data(arena, id, "th")
    }

    fn visit_unordered_list(&mut self, arena: &Arena, id: NodeId) -> Result<(), Infallible> {
        self.do_element(arena, id, "ul", &[])
    }

    fn visit_ordered_list(&mut self, arena: &Arena, id: NodeId) -> Result<(), Infallible> {
        self.do_element(arena, id, "ol", &[])
    }

    fn visit_dictionary_list(&mut self, arena: &Arena, id: NodeId) -> Result<(), Infallible> {
        self.do_element(arena, id, "dl", &[])
    }

    fn visit_list_item(&mut self, arena: &Arena, id: NodeId) -> Result<(), Infallible> {
        self.do_element(arena, id, "li", &[])
    }

    fn visit_dictionary_term(&mut self, arena: &Arena, id: NodeId) -> Result<(), Infallible> {
        self.do_element(arena, id, "dt", &[])
    }

    fn visit_dictionary_def(&mut self, arena: &Arena, id: NodeId) -> Result<(), Infallible> {
        self.do_element(arena, id, "dd", &[])
    }

    /// Renders only the document's first child, the same assumption
    /// `onDocument` makes about `e[0]` being the sole `Division`.
    fn visit_document(&mut self, arena: &Arena, id: NodeId) -> Result<(), Infallible> {
        if let Some(&first) = arena.children(id).first() {
            dispatch(self, arena, first)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockParser;
    use crate::config::Configuration;
    use crate::inline;
    use crate::namespace::Registry as NamespaceRegistry;

    fn render_lines(lines: &[&str], heading_depth: i32, compact_html: bool) -> String {
        let mut arena = Arena::new();
        let mut parser = BlockParser::new(&mut arena).unwrap();
        for line in lines {
            parser.feed(&mut arena, line).unwrap();
        }
        parser.feed(&mut arena, "").unwrap();
        let namespaces = NamespaceRegistry::default();
        let config = Configuration::default();
        inline::walk(&mut arena, &namespaces, &config, arena.root()).unwrap();
        inline::remove_escapes_tree(&mut arena, arena.root());
        crate::dom::normalize::normalize(&mut arena, arena.root());
        let bytes = HtmlRenderer::new(heading_depth, compact_html).render(&arena, arena.root());
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn heading_tag_shifts_by_heading_depth() {
        let html = render_lines(&["=== Title ==="], 1, false);
        assert!(html.contains("<h3>Title</h3>"), "{html}");
    }

    #[test]
    fn text_escapes_ampersand_and_angle_brackets() {
        let html = render_lines(&["a & b < c > d"], 0, false);
        assert!(html.contains("a &amp; b &lt; c &gt; d"), "{html}");
    }

    #[test]
    fn smart_quote_renders_as_named_entity() {
        let html = render_lines(&["a \"quote\""], 0, false);
        assert!(html.contains("&ldquo;quote&rdquo;"), "{html}");
    }

    #[test]
    fn bold_span_renders_as_b_tag() {
        let html = render_lines(&["a **bold** word"], 0, false);
        assert!(html.contains("<b>bold</b>"), "{html}");
    }

    #[test]
    fn blockquote_class_renames_paragraph_tag() {
        let html = render_lines(&["<<.blockquote>>quoted text"], 0, false);
        assert!(html.contains("<blockquote>"), "{html}");
        assert!(!html.contains("class=\"blockquote\""), "{html}");
    }

    #[test]
    fn image_without_explicit_alt_uses_its_source_as_alt() {
        let html = render_lines(&["{{photo.png}}"], 0, false);
        assert!(html.contains("alt=\"photo.png\""), "{html}");
    }

    #[test]
    fn rule_and_break_self_close() {
        let html = render_lines(&["----"], 0, false);
        assert!(html.contains("<hr />"), "{html}");
    }

    #[test]
    fn compact_html_still_puts_block_tags_on_their_own_line() {
        let html = render_lines(&["paragraph text"], 0, true);
        assert!(html.contains("\n<p>"), "{html}");
    }
}
