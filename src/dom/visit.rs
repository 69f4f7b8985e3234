//! Visitor trait for walking the tree, mirroring `dom.DomVisitor`'s
//! fallthrough dispatch (`onSpan` falls through to `onInlineElement` falls
//! through to `onElement` falls through to `onNode`) as default trait
//! methods instead of a class hierarchy.
//!
//! [`crate::render::HtmlRenderer`] is the sole production implementation;
//! tests may implement [`Visitor`] directly for smaller assertions than a
//! full HTML comparison.

use super::{Arena, NodeId, NodeKind};

/// A tree visitor. Implement the node-kind-specific methods you care
/// about; everything else falls through to [`Visitor::visit_element`] or
/// [`Visitor::visit_character_data`], and those fall through to
/// [`Visitor::visit_node`].
pub trait Visitor<E> {
    fn visit_node(&mut self, arena: &Arena, id: NodeId) -> Result<(), E>;

    #[inline]
    fn visit_character_data(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_node(arena, id)
    }

    #[inline]
    fn visit_text(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_character_data(arena, id)
    }

    #[inline]
    fn visit_comment(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_character_data(arena, id)
    }

    #[inline]
    fn visit_element(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_node(arena, id)
    }

    #[inline]
    fn visit_inline_element(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_element(arena, id)
    }

    #[inline]
    fn visit_span(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_inline_element(arena, id)
    }

    #[inline]
    fn visit_break(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_inline_element(arena, id)
    }

    #[inline]
    fn visit_link(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_inline_element(arena, id)
    }

    #[inline]
    fn visit_image(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_inline_element(arena, id)
    }

    #[inline]
    fn visit_block_element(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_element(arena, id)
    }

    #[inline]
    fn visit_division(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_block_element(arena, id)
    }

    #[inline]
    fn visit_paragraph(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_block_element(arena, id)
    }

    #[inline]
    fn visit_heading(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_block_element(arena, id)
    }

    #[inline]
    fn visit_rule(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_block_element(arena, id)
    }

    #[inline]
    fn visit_base_list(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_block_element(arena, id)
    }

    #[inline]
    fn visit_unordered_list(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_base_list(arena, id)
    }

    #[inline]
    fn visit_ordered_list(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_base_list(arena, id)
    }

    #[inline]
    fn visit_dictionary_list(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_base_list(arena, id)
    }

    #[inline]
    fn visit_base_list_item(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_block_element(arena, id)
    }

    #[inline]
    fn visit_list_item(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_base_list_item(arena, id)
    }

    #[inline]
    fn visit_dictionary_term(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_base_list_item(arena, id)
    }

    #[inline]
    fn visit_dictionary_def(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_base_list_item(arena, id)
    }

    #[inline]
    fn visit_table(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_block_element(arena, id)
    }

    #[inline]
    fn visit_table_row(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_block_element(arena, id)
    }

    #[inline]
    fn visit_base_table_data(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_block_element(arena, id)
    }

    #[inline]
    fn visit_table_data(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_base_table_data(arena, id)
    }

    #[inline]
    fn visit_table_heading(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_base_table_data(arena, id)
    }

    #[inline]
    fn visit_document(&mut self, arena: &Arena, id: NodeId) -> Result<(), E> {
        self.visit_element(arena, id)
    }
}

/// Dispatches `id` to the right `visit_*` method of `v`, the
/// pattern-matching equivalent of `Node.visit`'s `self.visit(visitor)`
/// double dispatch.
pub fn dispatch<E>(v: &mut impl Visitor<E>, arena: &Arena, id: NodeId) -> Result<(), E> {
    match arena.kind(id) {
        NodeKind::Document => v.visit_document(arena, id),
        NodeKind::Text(_) => v.visit_text(arena, id),
        NodeKind::Comment(_) => v.visit_comment(arena, id),
        NodeKind::Span(_) => v.visit_span(arena, id),
        NodeKind::Break(_) => v.visit_break(arena, id),
        NodeKind::Link(_) => v.visit_link(arena, id),
        NodeKind::Image(_) => v.visit_image(arena, id),
        NodeKind::Division(_) => v.visit_division(arena, id),
        NodeKind::Paragraph { .. } => v.visit_paragraph(arena, id),
        NodeKind::Heading { .. } => v.visit_heading(arena, id),
        NodeKind::Rule(_) => v.visit_rule(arena, id),
        NodeKind::Table(_) => v.visit_table(arena, id),
        NodeKind::TableRow(_) => v.visit_table_row(arena, id),
        NodeKind::TableData { .. } => v.visit_table_data(arena, id),
        NodeKind::TableHeading { .. } => v.visit_table_heading(arena, id),
        NodeKind::UnorderedList(_) => v.visit_unordered_list(arena, id),
        NodeKind::OrderedList(_) => v.visit_ordered_list(arena, id),
        NodeKind::DictionaryList(_) => v.visit_dictionary_list(arena, id),
        NodeKind::ListItem(_) => v.visit_list_item(arena, id),
        NodeKind::DictionaryTerm(_) => v.visit_dictionary_term(arena, id),
        NodeKind::DictionaryDef(_) => v.visit_dictionary_def(arena, id),
    }
}
