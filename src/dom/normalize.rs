//! The bottom-up cleanup pass described in spec §4.3.
//!
//! Ported from `Node.normalize` in `oldewc/dom.py` line for line: drop
//! empty text, drop whitespace-only text inside container blocks, merge
//! adjacent text runs, collapse a `Span` with a single `Break`/`Link`/
//! `Image` child into that child, then recurse. Running it twice is a
//! no-op (spec §8's normalization-idempotence property).

use super::{Arena, NodeId, NodeKind, is_base_list};

fn is_container(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Division(_) | NodeKind::Table(_) | NodeKind::TableRow(_)) || is_base_list(kind)
}

/// Normalizes `id` and everything reachable from it.
pub fn normalize(arena: &mut Arena, id: NodeId) {
    let container = is_container(arena.kind(id));

    let mut kept: Vec<NodeId> = arena
        .children(id)
        .iter()
        .copied()
        .filter(|&c| match arena.kind(c).text() {
            Some(s) if matches!(arena.kind(c), NodeKind::Text(_)) => {
                !s.is_empty() && !(container && s.trim().is_empty())
            }
            _ => true,
        })
        .collect();

    let mut i = 0;
    while i + 1 < kept.len() {
        let (a, b) = (kept[i], kept[i + 1]);
        let both_text = matches!(arena.kind(a), NodeKind::Text(_)) && matches!(arena.kind(b), NodeKind::Text(_));
        if both_text {
            let tail = if let NodeKind::Text(s) = arena.kind(b) { s.clone() } else { unreachable!() };
            if let NodeKind::Text(s) = arena.kind_mut(a) {
                s.push_str(&tail);
            }
            kept.remove(i + 1);
        } else {
            i += 1;
        }
    }

    arena.set_children(id, kept.clone());

    if matches!(arena.kind(id), NodeKind::Span(_))
        && kept.len() == 1
        && matches!(arena.kind(kept[0]), NodeKind::Break(_) | NodeKind::Link(_) | NodeKind::Image(_))
    {
        let only = kept[0];
        if let Some(parent) = arena.parent(id) {
            let span_attrs = arena.attrs(id).cloned().unwrap_or_default();
            let mut merged = span_attrs;
            if let Some(child_attrs) = arena.attrs(only) {
                merged.merge(child_attrs);
            }
            if let Some(a) = arena.attrs_mut(only) {
                *a = merged;
            }
            if let Some(idx) = arena.index_of(parent, id) {
                arena.replace_child(parent, idx, only);
            }
        }
    }

    for child in kept {
        normalize(arena, child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::AttributeMap;

    #[test]
    fn empty_and_whitespace_text_dropped_inside_divisions() {
        let mut arena = Arena::new();
        let root = arena.root();
        let div = arena.append(root, NodeKind::Division(AttributeMap::new())).unwrap();
        arena.append(div, NodeKind::Text(String::new())).unwrap();
        arena.append(div, NodeKind::Text("   ".to_owned())).unwrap();
        let p = arena.append(div, NodeKind::Paragraph { attrs: AttributeMap::new(), x_type: None }).unwrap();
        arena.add_text(p, "hi").unwrap();
        normalize(&mut arena, root);
        assert_eq!(arena.children(div), &[p]);
    }

    #[test]
    fn adjacent_text_merges() {
        let mut arena = Arena::new();
        let root = arena.root();
        let div = arena.append(root, NodeKind::Division(AttributeMap::new())).unwrap();
        let p = arena.append(div, NodeKind::Paragraph { attrs: AttributeMap::new(), x_type: None }).unwrap();
        arena.append(p, NodeKind::Text("a".to_owned())).unwrap();
        arena.append(p, NodeKind::Text("b".to_owned())).unwrap();
        normalize(&mut arena, root);
        let children = arena.children(p);
        assert_eq!(children.len(), 1);
        assert_eq!(arena.kind(children[0]).text(), Some("ab"));
    }

    #[test]
    fn single_child_span_collapses_into_link() {
        let mut arena = Arena::new();
        let root = arena.root();
        let div = arena.append(root, NodeKind::Division(AttributeMap::new())).unwrap();
        let mut span_attrs = AttributeMap::new();
        span_attrs.add_class("em");
        let span = arena.append(div, NodeKind::Span(span_attrs)).unwrap();
        let mut link_attrs = AttributeMap::new();
        link_attrs.set("href", "/w/x.html");
        arena.append(span, NodeKind::Link(link_attrs)).unwrap();
        normalize(&mut arena, root);
        let children = arena.children(div);
        assert_eq!(children.len(), 1);
        assert!(matches!(arena.kind(children[0]), NodeKind::Link(_)));
        let attrs = arena.attrs(children[0]).unwrap();
        assert!(attrs.has_class("em"));
        assert_eq!(attrs.get("href").as_deref(), Some("/w/x.html"));
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut arena = Arena::new();
        let root = arena.root();
        let div = arena.append(root, NodeKind::Division(AttributeMap::new())).unwrap();
        let p = arena.append(div, NodeKind::Paragraph { attrs: AttributeMap::new(), x_type: None }).unwrap();
        arena.append(p, NodeKind::Text("x".to_owned())).unwrap();
        arena.append(p, NodeKind::Text("".to_owned())).unwrap();
        arena.append(p, NodeKind::Text("y".to_owned())).unwrap();
        normalize(&mut arena, root);
        let first = arena.children(p).to_vec();
        normalize(&mut arena, root);
        let second = arena.children(p).to_vec();
        assert_eq!(first, second);
        assert_eq!(arena.kind(first[0]).text(), Some("xy"));
    }
}
