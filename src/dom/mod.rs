//! The document tree, per spec §3.
//!
//! Nodes live in a flat [`Arena`] and refer to each other by [`NodeId`]
//! rather than through owned/borrowed pointers, so there is no cyclic
//! ownership to fight: a node's parent is just an index, and walking up
//! (table span resolution, `normalize`'s span-collapse) or down (the block
//! parser's stack, the inline walker) is a slice lookup.
//!
//! Every insert is gated by [`allowed`], the containment predicate from
//! spec §3's table. Violating it is a programmer error ([`NestingError`]),
//! not a parse error — EWC's errorless contract is about *markup*, not
//! about the tree invariants the parser itself must uphold.

pub mod normalize;
pub mod visit;

use crate::attrs::AttributeMap;
use crate::error::NestingError;

/// An index into an [`Arena`]. Cheap to copy, meaningless outside the
/// arena that produced it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node's payload. One variant per concrete node type in spec §3; the
/// `Base*` classes from the source's inheritance chain (`BaseList`,
/// `BaseListItem`, `BaseTableData`) become shared predicates
/// ([`is_base_list`] and friends) over this enum instead of separate types.
#[derive(Clone, Debug)]
pub enum NodeKind {
    /// Root node. Holds at most one [`NodeKind::Division`] child.
    Document,
    Text(String),
    Comment(String),
    Span(AttributeMap),
    Break(AttributeMap),
    /// `href` lives in the attribute map, same as the original's
    /// `node.attr["href"]`.
    Link(AttributeMap),
    /// `src`/`alt`/`width`/`height` live in the attribute map.
    Image(AttributeMap),
    Division(AttributeMap),
    Paragraph {
        attrs: AttributeMap,
        /// The optional `x-type`, e.g. `"quote"`. Never rendered as an
        /// attribute (see [`crate::render`]); kept as a typed field rather
        /// than threading it through the generic attribute map.
        x_type: Option<String>,
    },
    Heading {
        attrs: AttributeMap,
        /// Clamped to `1..=6` by [`Arena::new_heading`]/[`Arena::set_heading_level`].
        level: u8,
    },
    Rule(AttributeMap),
    Table(AttributeMap),
    TableRow(AttributeMap),
    TableData {
        attrs: AttributeMap,
        /// `0` = unused, `-1` = placeholder absorbed by an earlier
        /// spanning cell, `k > 0` = spans `k + 1` rows/columns.
        rowspan: i32,
        colspan: i32,
    },
    TableHeading {
        attrs: AttributeMap,
        rowspan: i32,
        colspan: i32,
    },
    UnorderedList(AttributeMap),
    OrderedList(AttributeMap),
    DictionaryList(AttributeMap),
    ListItem(AttributeMap),
    DictionaryTerm(AttributeMap),
    DictionaryDef(AttributeMap),
}

impl NodeKind {
    /// The name used in [`NestingError`] messages and debug dumps.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Document => "Document",
            NodeKind::Text(_) => "Text",
            NodeKind::Comment(_) => "Comment",
            NodeKind::Span(_) => "Span",
            NodeKind::Break(_) => "Break",
            NodeKind::Link(_) => "Link",
            NodeKind::Image(_) => "Image",
            NodeKind::Division(_) => "Division",
            NodeKind::Paragraph { .. } => "Paragraph",
            NodeKind::Heading { .. } => "Heading",
            NodeKind::Rule(_) => "Rule",
            NodeKind::Table(_) => "Table",
            NodeKind::TableRow(_) => "TableRow",
            NodeKind::TableData { .. } => "TableData",
            NodeKind::TableHeading { .. } => "TableHeading",
            NodeKind::UnorderedList(_) => "UnorderedList",
            NodeKind::OrderedList(_) => "OrderedList",
            NodeKind::DictionaryList(_) => "DictionaryList",
            NodeKind::ListItem(_) => "ListItem",
            NodeKind::DictionaryTerm(_) => "DictionaryTerm",
            NodeKind::DictionaryDef(_) => "DictionaryDef",
        }
    }

    pub fn attrs(&self) -> Option<&AttributeMap> {
        match self {
            NodeKind::Document | NodeKind::Text(_) | NodeKind::Comment(_) => None,
            NodeKind::Span(a)
            | NodeKind::Break(a)
            | NodeKind::Link(a)
            | NodeKind::Image(a)
            | NodeKind::Division(a)
            | NodeKind::Rule(a)
            | NodeKind::Table(a)
            | NodeKind::TableRow(a)
            | NodeKind::UnorderedList(a)
            | NodeKind::OrderedList(a)
            | NodeKind::DictionaryList(a)
            | NodeKind::ListItem(a)
            | NodeKind::DictionaryTerm(a)
            | NodeKind::DictionaryDef(a) => Some(a),
            NodeKind::Paragraph { attrs, .. }
            | NodeKind::Heading { attrs, .. }
            | NodeKind::TableData { attrs, .. }
            | NodeKind::TableHeading { attrs, .. } => Some(attrs),
        }
    }

    pub fn attrs_mut(&mut self) -> Option<&mut AttributeMap> {
        match self {
            NodeKind::Document | NodeKind::Text(_) | NodeKind::Comment(_) => None,
            NodeKind::Span(a)
            | NodeKind::Break(a)
            | NodeKind::Link(a)
            | NodeKind::Image(a)
            | NodeKind::Division(a)
            | NodeKind::Rule(a)
            | NodeKind::Table(a)
            | NodeKind::TableRow(a)
            | NodeKind::UnorderedList(a)
            | NodeKind::OrderedList(a)
            | NodeKind::DictionaryList(a)
            | NodeKind::ListItem(a)
            | NodeKind::DictionaryTerm(a)
            | NodeKind::DictionaryDef(a) => Some(a),
            NodeKind::Paragraph { attrs, .. }
            | NodeKind::Heading { attrs, .. }
            | NodeKind::TableData { attrs, .. }
            | NodeKind::TableHeading { attrs, .. } => Some(attrs),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            NodeKind::Text(s) | NodeKind::Comment(s) => Some(s),
            _ => None,
        }
    }
}

pub fn is_character_data(k: &NodeKind) -> bool {
    matches!(k, NodeKind::Text(_) | NodeKind::Comment(_))
}

pub fn is_inline_element(k: &NodeKind) -> bool {
    matches!(
        k,
        NodeKind::Span(_) | NodeKind::Break(_) | NodeKind::Link(_) | NodeKind::Image(_)
    )
}

pub fn is_block_element(k: &NodeKind) -> bool {
    matches!(
        k,
        NodeKind::Division(_)
            | NodeKind::Paragraph { .. }
            | NodeKind::Heading { .. }
            | NodeKind::Rule(_)
            | NodeKind::Table(_)
            | NodeKind::TableRow(_)
            | NodeKind::TableData { .. }
            | NodeKind::TableHeading { .. }
            | NodeKind::UnorderedList(_)
            | NodeKind::OrderedList(_)
            | NodeKind::DictionaryList(_)
            | NodeKind::ListItem(_)
            | NodeKind::DictionaryTerm(_)
            | NodeKind::DictionaryDef(_)
    )
}

pub fn is_base_list(k: &NodeKind) -> bool {
    matches!(
        k,
        NodeKind::UnorderedList(_) | NodeKind::OrderedList(_) | NodeKind::DictionaryList(_)
    )
}

pub fn is_base_list_item(k: &NodeKind) -> bool {
    matches!(
        k,
        NodeKind::ListItem(_) | NodeKind::DictionaryTerm(_) | NodeKind::DictionaryDef(_)
    )
}

pub fn is_base_table_data(k: &NodeKind) -> bool {
    matches!(k, NodeKind::TableData { .. } | NodeKind::TableHeading { .. })
}

/// The containment predicate from spec §3's table (refined against
/// `oldewc/dom.py`'s `allowed_contents` tuples, which distinguish
/// `DictionaryList` from `UnorderedList`/`OrderedList` where the spec
/// prose lumps them together as "BaseList").
pub fn allowed(parent: &NodeKind, child: &NodeKind) -> bool {
    match parent {
        NodeKind::Document => matches!(child, NodeKind::Division(_)) || is_character_data(child),
        NodeKind::Division(_) => {
            is_block_element(child) || is_inline_element(child) || is_character_data(child)
        }
        NodeKind::Paragraph { .. } | NodeKind::Heading { .. } => {
            is_inline_element(child) || is_character_data(child)
        }
        NodeKind::Span(_) => is_inline_element(child) || is_character_data(child),
        NodeKind::Link(_) => {
            matches!(child, NodeKind::Span(_) | NodeKind::Break(_) | NodeKind::Image(_))
                || is_character_data(child)
        }
        NodeKind::Break(_) | NodeKind::Image(_) | NodeKind::Rule(_) => false,
        NodeKind::UnorderedList(_) | NodeKind::OrderedList(_) => {
            matches!(child, NodeKind::ListItem(_)) || is_inline_element(child) || is_character_data(child)
        }
        NodeKind::DictionaryList(_) => {
            matches!(child, NodeKind::DictionaryTerm(_) | NodeKind::DictionaryDef(_))
                || is_inline_element(child)
                || is_character_data(child)
        }
        _ if is_base_list_item(parent) => {
            matches!(child, NodeKind::Paragraph { .. } | NodeKind::Rule(_))
                || is_base_list(child)
                || is_inline_element(child)
                || is_character_data(child)
        }
        NodeKind::Table(_) => matches!(child, NodeKind::TableRow(_)) || is_character_data(child),
        NodeKind::TableRow(_) => is_base_table_data(child) || is_character_data(child),
        _ if is_base_table_data(parent) => {
            matches!(child, NodeKind::Paragraph { .. })
                || is_inline_element(child)
                || is_base_list(child)
                || is_character_data(child)
        }
        NodeKind::Text(_) | NodeKind::Comment(_) => false,
    }
}

struct Slot {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// Owns every node of one document. Nodes are never freed individually;
/// the whole arena is dropped with the [`crate::parser::Parser`] call that
/// built it.
pub struct Arena {
    nodes: Vec<Slot>,
    root: NodeId,
}

impl Arena {
    /// Creates an arena containing only the `Document` root.
    pub fn new() -> Self {
        let root_slot = Slot { parent: None, children: Vec::new(), kind: NodeKind::Document };
        Arena { nodes: vec![root_slot], root: NodeId(0) }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.index()].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn attrs(&self, id: NodeId) -> Option<&AttributeMap> {
        self.kind(id).attrs()
    }

    pub fn attrs_mut(&mut self, id: NodeId) -> Option<&mut AttributeMap> {
        self.kind_mut(id).attrs_mut()
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Slot { parent: None, children: Vec::new(), kind });
        id
    }

    /// Appends a new node of the given kind to `parent`'s children.
    ///
    /// `Document` is special: appending a `Division` when one already
    /// exists replaces it in place, mirroring `dom.Document.append`'s
    /// single-slot semantics instead of accumulating multiple divisions.
    pub fn append(&mut self, parent: NodeId, kind: NodeKind) -> Result<NodeId, NestingError> {
        if !allowed(self.kind(parent), &kind) {
            return Err(NestingError { parent: self.kind(parent).name(), child: kind.name() });
        }
        if matches!(self.kind(parent), NodeKind::Document) && matches!(kind, NodeKind::Division(_)) {
            let existing = self.nodes[parent.index()]
                .children
                .iter()
                .position(|&c| matches!(self.kind(c), NodeKind::Division(_)));
            if let Some(idx) = existing {
                let id = self.alloc(kind);
                self.nodes[id.index()].parent = Some(parent);
                self.nodes[parent.index()].children[idx] = id;
                return Ok(id);
            }
        }
        let id = self.alloc(kind);
        self.nodes[id.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(id);
        Ok(id)
    }

    /// Inserts a new node at `index` in `parent`'s children, used by the
    /// inline walker to splice in link/span/image/break nodes mid-run.
    pub fn insert(&mut self, parent: NodeId, index: usize, kind: NodeKind) -> Result<NodeId, NestingError> {
        if !allowed(self.kind(parent), &kind) {
            return Err(NestingError { parent: self.kind(parent).name(), child: kind.name() });
        }
        let id = self.alloc(kind);
        self.nodes[id.index()].parent = Some(parent);
        self.nodes[parent.index()].children.insert(index, id);
        Ok(id)
    }

    pub fn index_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.nodes[parent.index()].children.iter().position(|&c| c == child)
    }

    pub fn set_children(&mut self, parent: NodeId, children: Vec<NodeId>) {
        self.nodes[parent.index()].children = children;
    }

    /// Replaces `parent`'s child at `index` with `new_child`, reparenting
    /// it. Used by [`normalize`]'s single-child-Span collapse.
    pub fn replace_child(&mut self, parent: NodeId, index: usize, new_child: NodeId) {
        self.nodes[parent.index()].children[index] = new_child;
        self.nodes[new_child.index()].parent = Some(parent);
    }

    /// Mirrors `Element.addText`: appends to the last child if it is
    /// already a `Text` node (joined by a newline, matching
    /// `CharacterData.addText`), otherwise creates a new one.
    pub fn add_text(&mut self, id: NodeId, text: &str) -> Result<(), NestingError> {
        let last = self.nodes[id.index()].children.last().copied();
        if let Some(last) = last
            && let NodeKind::Text(s) = &mut self.nodes[last.index()].kind
        {
            s.push('\n');
            s.push_str(text);
            return Ok(());
        }
        self.append(id, NodeKind::Text(text.to_owned())).map(|_| ())
    }

    pub fn new_heading(&mut self, parent: NodeId, level: i32) -> Result<NodeId, NestingError> {
        let level = level.clamp(1, 6) as u8;
        self.append(parent, NodeKind::Heading { attrs: AttributeMap::new(), level })
    }

    pub fn set_heading_level(&mut self, id: NodeId, level: i32) {
        if let NodeKind::Heading { level: l, .. } = self.kind_mut(id) {
            *l = level.clamp(1, 6) as u8;
        }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}
