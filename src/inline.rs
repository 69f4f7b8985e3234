//! The inline walker, per spec §4.7.
//!
//! Runs after block parsing has built the paragraph/heading/list/table
//! skeleton. For every `Text` node reachable from the tree, four
//! recognizers run in turn, each looped to exhaustion before the next
//! begins: span-or-link markup (`<<...>>`/`[[...]]`), image-or-comment
//! markup (`{{...}}`), the doubled-marker span shortcuts (`**`, `//`, ...),
//! and naked URLs. A break-split pass (`\\`) and the smart-quotes-and-dashes
//! pass follow. Ported from `doInlineMarkup` in `oldewc/parser.py`, which
//! mutates a node's children while iterating an index cursor over them;
//! this module re-reads `arena.children(parent)` on every iteration instead
//! of holding a live reference across the mutation.

use crate::attrs::AttributeMap;
use crate::config::Configuration;
use crate::dom::{Arena, NodeId, NodeKind};
use crate::error::NestingError;
use crate::escape::smart_quotes_and_dashes;
use crate::namespace::{self, Registry as NamespaceRegistry};

/// Runs the full inline pass over every node reachable from `root`.
pub fn walk(
    arena: &mut Arena,
    namespaces: &NamespaceRegistry,
    config: &Configuration,
    root: NodeId,
) -> Result<(), NestingError> {
    walk_node(arena, namespaces, config, root)
}

fn walk_node(
    arena: &mut Arena,
    namespaces: &NamespaceRegistry,
    config: &Configuration,
    parent: NodeId,
) -> Result<(), NestingError> {
    let mut i = 0;
    loop {
        let children = arena.children(parent).to_vec();
        let Some(&child) = children.get(i) else { break };
        if matches!(arena.kind(child), NodeKind::Text(_)) {
            walk_text(arena, namespaces, config, parent, child, i)?;
        } else {
            walk_node(arena, namespaces, config, child)?;
        }
        i += 1;
    }
    Ok(())
}

fn text_of(arena: &Arena, id: NodeId) -> String {
    match arena.kind(id) {
        NodeKind::Text(s) => s.clone(),
        _ => unreachable!("walk_text is only ever called on Text nodes"),
    }
}

fn set_text(arena: &mut Arena, id: NodeId, value: &str) {
    if let NodeKind::Text(s) = arena.kind_mut(id) {
        *s = value.to_owned();
    }
}

/// Climbs from `id` toward the root, stopping at the first `Division` or
/// `Link`. `true` means the climb hit a `Link` first, i.e. `id` is inside
/// link text. Ported from the ancestor-walk `findNakedURL` performs in the
/// original to exclude URLs already inside a link's own target/text.
fn inside_link(arena: &Arena, mut id: NodeId) -> bool {
    loop {
        match arena.kind(id) {
            NodeKind::Link(_) => return true,
            NodeKind::Division(_) => return false,
            _ => {}
        }
        match arena.parent(id) {
            Some(p) => id = p,
            None => return false,
        }
    }
}

/// Splices a new node of kind `kind` right after `i` in `parent`'s
/// children, with `post` reinserted as a fresh `Text` node after it, and
/// `content` (if any) added as the new node's own text. Mirrors the
/// original's `node.insert(i + 1, Text(post)); node.insert(i + 1, new_node)`
/// pair, which leaves the text node itself untouched at index `i`.
fn splice(
    arena: &mut Arena,
    parent: NodeId,
    i: usize,
    kind: NodeKind,
    content: Option<&str>,
    post: &str,
) -> Result<(), NestingError> {
    if !post.is_empty() {
        arena.insert(parent, i + 1, NodeKind::Text(post.to_owned()))?;
    }
    let node_id = arena.insert(parent, i + 1, kind)?;
    if let Some(text) = content
        && !text.is_empty()
    {
        arena.add_text(node_id, text)?;
    }
    Ok(())
}

fn find_earliest<'a>(s: &str, needles: &[&'a str]) -> Option<(usize, &'a str)> {
    needles.iter().filter_map(|&n| s.find(n).map(|i| (i, n))).min_by_key(|&(i, _)| i)
}

enum SpanOrLink {
    Link { target: String, text: Option<String> },
    Span { name: Option<String>, content: String },
}

/// `([#.]name)\s*(.*)` against `content`: a leading style name followed by
/// whatever's left. No leading sigil means the whole thing is content with
/// no name.
fn split_style_name(content: &str) -> (Option<String>, String) {
    let mut chars = content.chars();
    let Some(first) = chars.next() else { return (None, String::new()) };
    if first != '#' && first != '.' {
        return (None, content.to_owned());
    }
    let mut end = first.len_utf8();
    let mut rest_chars = chars.clone();
    match rest_chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return (None, content.to_owned()),
    }
    for c in chars {
        if c.is_alphanumeric() || c == '_' || c == '-' {
            end += c.len_utf8();
        } else {
            break;
        }
    }
    let name = content[..end].to_owned();
    let body = content[end..].trim_start().to_owned();
    (Some(name), body)
}

/// Finds the first `<<...>>` or `[[...]]` span/link, bracket-stack scanning
/// so that nested spans inside a link's text (and nested spans inside each
/// other) are matched to the right close marker. `within_link` suppresses
/// `[[` recognition: link text cannot itself contain a nested link, so a
/// literal `[[` found while already inside one is left as plain text.
/// Ported from `findSpanOrLink`.
fn find_span_or_link(text: &str, within_link: bool) -> Option<(SpanOrLink, String, String)> {
    let open_candidates: &[&str] = if within_link { &["<<"] } else { &["<<", "[["] };
    let (open_idx, open_tag) = find_earliest(text, open_candidates)?;
    let pre = text[..open_idx].to_owned();
    let mut rest = &text[open_idx + open_tag.len()..];
    let mut stack: Vec<&str> = vec![open_tag];
    let mut in_link = open_tag == "[[";
    let mut content = String::new();

    loop {
        // Which markers are recognized next depends on whether we're
        // currently inside link text (`in_link`) and, if so, which bracket
        // opened the innermost nesting level (`stack.last()`) — exactly the
        // three-way pattern choice in `findSpanOrLink`.
        let candidates: &[&str] = if in_link {
            if *stack.last().unwrap() == "<<" { &["<<", ">>"] } else { &["<<", "]]"] }
        } else {
            &["<<", "[[", ">>"]
        };
        match find_earliest(rest, candidates) {
            None => {
                content.push_str(rest);
                rest = "";
                break;
            }
            Some((idx, tag)) => {
                content.push_str(&rest[..idx]);
                rest = &rest[idx + tag.len()..];
                if tag == ">>" || tag == "]]" {
                    stack.pop();
                    if stack.is_empty() {
                        break;
                    }
                    if tag == "]]" {
                        in_link = false;
                    }
                } else {
                    stack.push(tag);
                    if tag == "[[" {
                        in_link = true;
                    }
                }
                content.push_str(tag);
            }
        }
    }
    let tail = rest.to_owned();

    if open_tag == "[[" {
        let mut parts = content.splitn(2, '|');
        let target = parts.next().unwrap_or_default().to_owned();
        let explicit_text = parts.next().map(str::to_owned);
        Some((SpanOrLink::Link { target, text: explicit_text }, pre, tail))
    } else {
        let (name, body) = split_style_name(&content);
        Some((SpanOrLink::Span { name, content: body }, pre, tail))
    }
}

/// `#name` sets `id`; `.name` adds a class. Ported from `applyStyles`,
/// restricted here to the single-name case `newSpan` always calls it with.
fn apply_style_name(name: &str, attrs: &mut AttributeMap) {
    if let Some(id) = name.strip_prefix('#') {
        attrs.set("id", id);
    } else if let Some(class) = name.strip_prefix('.') {
        attrs.add_class(class);
    }
}

fn build_span_or_link(kind: SpanOrLink, namespaces: &NamespaceRegistry) -> (NodeKind, Option<String>) {
    match kind {
        SpanOrLink::Link { target, text } => {
            let mut attrs = AttributeMap::new();
            attrs.set("href", &namespaces.link_url(&target));
            let display = text.unwrap_or_else(|| namespace::get_prefix(&target).1);
            (NodeKind::Link(attrs), Some(display))
        }
        SpanOrLink::Span { name, content } => {
            let mut attrs = AttributeMap::new();
            if let Some(name) = name {
                apply_style_name(&name, &mut attrs);
            }
            (NodeKind::Span(attrs), Some(content))
        }
    }
}

enum ImageOrComment {
    Comment(String),
    Image { src: String, alt: Option<String>, width: Option<String>, height: Option<String> },
}

/// Finds the first `{{...}}`. A leading `!` in the content marks a comment
/// instead of an image. Ported from `findImageOrComment`.
fn find_image_or_comment(text: &str) -> Option<(ImageOrComment, String, String)> {
    let open = text.find("{{")?;
    let pre = text[..open].to_owned();
    let after_open = &text[open + 2..];
    let close_rel = after_open.find("}}")?;
    let content = &after_open[..close_rel];
    let post = after_open[close_rel + 2..].to_owned();

    if let Some(comment) = content.strip_prefix('!') {
        return Some((ImageOrComment::Comment(comment.to_owned()), pre, post));
    }
    let mut parts = content.splitn(4, '|');
    let src = parts.next().unwrap_or_default().to_owned();
    let alt = parts.next().map(str::to_owned);
    let width = parts.next().map(str::to_owned);
    let height = parts.next().map(str::to_owned);
    Some((ImageOrComment::Image { src, alt, width, height }, pre, post))
}

fn build_image_or_comment(kind: ImageOrComment, namespaces: &NamespaceRegistry) -> (NodeKind, Option<String>) {
    match kind {
        ImageOrComment::Comment(text) => (NodeKind::Comment(text), None),
        ImageOrComment::Image { src, alt, width, height } => {
            let mut attrs = AttributeMap::new();
            attrs.set("src", &namespaces.image_url(&src));
            attrs.set("alt", alt.as_deref().unwrap_or(&src));
            if let Some(w) = width {
                attrs.set("width", &w);
            }
            if let Some(h) = height {
                attrs.set("height", &h);
            }
            (NodeKind::Image(attrs), None)
        }
    }
}

const SPAN_SHORTCUTS: [(&str, &str); 6] =
    [("##", "tt"), ("//", "i"), (",,", "sub"), ("^^", "sup"), ("__", "u"), ("**", "b")];

/// Finds the first doubled-marker shortcut (`**bold**`, `//italic//`, ...)
/// with a matching close marker later in the line. No close marker means no
/// match at all — an unpaired `**` is left as plain text. Ported from
/// `findSpanShortcut`; `em_and_strong` swaps `b`/`i` for `strong`/`em` per
/// [`Configuration::em_and_strong`].
fn find_span_shortcut(text: &str, em_and_strong: bool) -> Option<(String, String, String, String)> {
    let needles: Vec<&str> = SPAN_SHORTCUTS.iter().map(|&(m, _)| m).collect();
    let (idx, tag) = find_earliest(text, &needles)?;
    let pre = text[..idx].to_owned();
    let after = &text[idx + tag.len()..];
    let end = after.find(tag)?;
    let content = after[..end].to_owned();
    let post = after[end + tag.len()..].to_owned();

    let mut class = SPAN_SHORTCUTS.iter().find(|&&(m, _)| m == tag).unwrap().1.to_owned();
    if em_and_strong {
        class = match class.as_str() {
            "b" => "strong".to_owned(),
            "i" => "em".to_owned(),
            other => other.to_owned(),
        };
    }
    Some((class, content, pre, post))
}

const NAKED_URL_SCHEMES: [&str; 4] = ["http", "https", "ftp", "mailto"];

/// Finds the first `scheme://name` run, `name` ending at the next
/// whitespace (or end of line). Ported from `findNakedURL`.
fn find_naked_url(text: &str) -> Option<(String, String, String, String)> {
    let mut best: Option<(usize, &str)> = None;
    for &scheme in &NAKED_URL_SCHEMES {
        let needle = format!("{scheme}://");
        if let Some(idx) = text.find(&needle)
            && best.is_none_or(|(bi, _)| idx < bi)
        {
            best = Some((idx, scheme));
        }
    }
    let (idx, scheme) = best?;
    let pre = text[..idx].to_owned();
    let after = &text[idx + scheme.len() + 3..];
    let name_end = after.find(char::is_whitespace).unwrap_or(after.len());
    let name = after[..name_end].to_owned();
    let post = after[name_end..].to_owned();
    Some((scheme.to_owned(), name, pre, post))
}

fn walk_text(
    arena: &mut Arena,
    namespaces: &NamespaceRegistry,
    config: &Configuration,
    parent: NodeId,
    child: NodeId,
    i: usize,
) -> Result<(), NestingError> {
    let within_link = inside_link(arena, parent);

    loop {
        let text = text_of(arena, child);
        let Some((kind, pre, post)) = find_span_or_link(&text, within_link) else { break };
        set_text(arena, child, &pre);
        let (node_kind, content) = build_span_or_link(kind, namespaces);
        splice(arena, parent, i, node_kind, content.as_deref(), &post)?;
    }

    loop {
        let text = text_of(arena, child);
        let Some((kind, pre, post)) = find_image_or_comment(&text) else { break };
        set_text(arena, child, &pre);
        let (node_kind, content) = build_image_or_comment(kind, namespaces);
        splice(arena, parent, i, node_kind, content.as_deref(), &post)?;
    }

    loop {
        let text = text_of(arena, child);
        let Some((name, content, pre, post)) = find_span_shortcut(&text, config.em_and_strong) else { break };
        set_text(arena, child, &pre);
        let mut attrs = AttributeMap::new();
        attrs.add_class(&name);
        splice(arena, parent, i, NodeKind::Span(attrs), Some(&content), &post)?;
    }

    if config.naked_urls && !within_link {
        loop {
            let text = text_of(arena, child);
            let Some((scheme, name, pre, post)) = find_naked_url(&text) else { break };
            set_text(arena, child, &pre);
            let target = format!("{scheme}://{name}");
            let mut attrs = AttributeMap::new();
            attrs.set("href", &target);
            splice(arena, parent, i, NodeKind::Link(attrs), Some(&target), &post)?;
        }
    }

    loop {
        let text = text_of(arena, child);
        let Some(idx) = text.find("\\\\") else { break };
        let pre = text[..idx].to_owned();
        let post = text[idx + 2..].to_owned();
        set_text(arena, child, &pre);
        splice(arena, parent, i, NodeKind::Break(AttributeMap::new()), None, &post)?;
    }

    if config.quotes_and_dashes {
        let text = text_of(arena, child);
        set_text(arena, child, &smart_quotes_and_dashes(&text));
    }

    Ok(())
}

/// The magic-comment pass, per spec §9: reserved for future directives
/// embedded in `Comment` nodes. Traverses the tree but performs no
/// transformation, the same empty hook `doMagicComments` is in the
/// original.
pub fn run_magic_comments(arena: &Arena, id: NodeId) {
    if matches!(arena.kind(id), NodeKind::Comment(_)) {
        return;
    }
    for &child in arena.children(id) {
        run_magic_comments(arena, child);
    }
}

/// Reverses the tilde-escape band on every `Text` node reachable from
/// `id`. `Comment` values are left untouched, matching `removeEscapes`'s
/// `isinstance(node, dom.Text)` check in the original: a `Comment` is
/// `CharacterData` but not `Text`, so it falls through to the recursive
/// branch and, having no children, is simply skipped.
pub fn remove_escapes_tree(arena: &mut Arena, id: NodeId) {
    if let NodeKind::Text(s) = arena.kind(id) {
        let replaced = crate::escape::remove_escapes(s);
        if let NodeKind::Text(s) = arena.kind_mut(id) {
            *s = replaced;
        }
        return;
    }
    for child in arena.children(id).to_vec() {
        remove_escapes_tree(arena, child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockParser;

    fn parse_and_walk(lines: &[&str]) -> (Arena, NodeId) {
        let mut arena = Arena::new();
        let mut parser = BlockParser::new(&mut arena).unwrap();
        for line in lines {
            parser.feed(&mut arena, line).unwrap();
        }
        parser.feed(&mut arena, "").unwrap();
        let div = parser.division();
        let namespaces = NamespaceRegistry::default();
        let config = Configuration::default();
        walk(&mut arena, &namespaces, &config, arena.root()).unwrap();
        (arena, div)
    }

    fn first_paragraph_children(arena: &Arena, div: NodeId) -> Vec<NodeId> {
        let p = arena.children(div)[0];
        arena.children(p).to_vec()
    }

    #[test]
    fn link_with_explicit_text_resolves_and_keeps_display_text() {
        let (arena, div) = parse_and_walk(&["[[wp:Rust|the language]]"]);
        let children = first_paragraph_children(&arena, div);
        assert_eq!(children.len(), 1);
        let NodeKind::Link(attrs) = arena.kind(children[0]) else { panic!("expected Link") };
        assert_eq!(attrs.get("href").as_deref(), Some("http://en.wikipedia.org/wiki/Rust"));
        assert_eq!(arena.kind(arena.children(children[0])[0]).text(), Some("the language"));
    }

    #[test]
    fn link_without_explicit_text_defaults_to_prefix_stripped_target() {
        let (arena, div) = parse_and_walk(&["[[wp:Rust]]"]);
        let children = first_paragraph_children(&arena, div);
        assert_eq!(arena.kind(arena.children(children[0])[0]).text(), Some("Rust"));
    }

    #[test]
    fn span_shortcut_wraps_bold() {
        let (arena, div) = parse_and_walk(&["a **bold** word"]);
        let children = first_paragraph_children(&arena, div);
        assert_eq!(children.len(), 3);
        let NodeKind::Span(attrs) = arena.kind(children[1]) else { panic!("expected Span") };
        assert!(attrs.has_class("b"));
        assert_eq!(arena.kind(arena.children(children[1])[0]).text(), Some("bold"));
    }

    #[test]
    fn em_and_strong_swaps_b_and_i_classes() {
        let mut arena = Arena::new();
        let mut parser = BlockParser::new(&mut arena).unwrap();
        parser.feed(&mut arena, "**bold**").unwrap();
        parser.feed(&mut arena, "").unwrap();
        let div = parser.division();
        let namespaces = NamespaceRegistry::default();
        let config = crate::config::ConfigBuilder::new().em_and_strong(true).build();
        walk(&mut arena, &namespaces, &config, arena.root()).unwrap();
        let children = first_paragraph_children(&arena, div);
        let NodeKind::Span(attrs) = arena.kind(children[0]) else { panic!("expected Span") };
        assert!(attrs.has_class("strong"));
    }

    #[test]
    fn image_markup_defaults_alt_to_src() {
        let (arena, div) = parse_and_walk(&["{{photo.png}}"]);
        let children = first_paragraph_children(&arena, div);
        let NodeKind::Image(attrs) = arena.kind(children[0]) else { panic!("expected Image") };
        assert_eq!(attrs.get("alt").as_deref(), Some("photo.png"));
    }

    #[test]
    fn bang_prefixed_braces_become_a_comment() {
        let (arena, div) = parse_and_walk(&["before {{!hidden}} after"]);
        let children = first_paragraph_children(&arena, div);
        assert!(children.iter().any(|&c| matches!(arena.kind(c), NodeKind::Comment(s) if s == "hidden")));
    }

    #[test]
    fn naked_url_is_ignored_unless_enabled() {
        let (arena, div) = parse_and_walk(&["see http://example.com/x for details"]);
        let children = first_paragraph_children(&arena, div);
        assert_eq!(children.len(), 1);
        assert!(!children.iter().any(|&c| matches!(arena.kind(c), NodeKind::Link(_))));
    }

    #[test]
    fn naked_url_becomes_a_link_when_enabled() {
        let mut arena = Arena::new();
        let mut parser = BlockParser::new(&mut arena).unwrap();
        parser.feed(&mut arena, "see http://example.com/x now").unwrap();
        parser.feed(&mut arena, "").unwrap();
        let div = parser.division();
        let namespaces = NamespaceRegistry::default();
        let config = crate::config::ConfigBuilder::new().naked_urls(true).build();
        walk(&mut arena, &namespaces, &config, arena.root()).unwrap();
        let children = first_paragraph_children(&arena, div);
        assert!(children.iter().any(|&c| matches!(arena.kind(c), NodeKind::Link(_))));
    }

    #[test]
    fn link_text_cannot_contain_a_nested_link() {
        let (arena, div) = parse_and_walk(&["[[target|see [[other]] here]]"]);
        let children = first_paragraph_children(&arena, div);
        assert_eq!(children.len(), 1);
        let link_children = arena.children(children[0]);
        assert!(link_children.iter().all(|&c| !matches!(arena.kind(c), NodeKind::Link(_))));
    }

    #[test]
    fn break_marker_splits_text_into_two_runs() {
        let (arena, div) = parse_and_walk(&["line one\\\\line two"]);
        let children = first_paragraph_children(&arena, div);
        assert!(children.iter().any(|&c| matches!(arena.kind(c), NodeKind::Break(_))));
    }

    #[test]
    fn quotes_and_dashes_apply_after_markup() {
        let (arena, div) = parse_and_walk(&["a \"quote\""]);
        let children = first_paragraph_children(&arena, div);
        let NodeKind::Text(s) = arena.kind(children[0]) else { panic!("expected Text") };
        assert!(s.contains('\u{201C}'));
    }

    #[test]
    fn span_name_sigil_sets_id_or_class() {
        let (arena, div) = parse_and_walk(&["<<#anchor content>>"]);
        let children = first_paragraph_children(&arena, div);
        let NodeKind::Span(attrs) = arena.kind(children[0]) else { panic!("expected Span") };
        assert_eq!(attrs.get("id").as_deref(), Some("anchor"));
    }

    #[test]
    fn magic_comments_pass_leaves_comments_untouched() {
        let (arena, div) = parse_and_walk(&["before {{!hidden}} after"]);
        run_magic_comments(&arena, arena.root());
        let children = first_paragraph_children(&arena, div);
        assert!(children.iter().any(|&c| matches!(arena.kind(c), NodeKind::Comment(s) if s == "hidden")));
    }
}
