//! The block-level stack machine from spec §4.6.
//!
//! Consumes lines already through [`crate::pipeline::escape_transform`] and
//! [`crate::pipeline::ExtensionTransform`] and builds the tree structure
//! (divisions, headings, rules, lists, tables, paragraphs) that
//! [`crate::inline`] later walks for span/link/image markup. Grounded on
//! `MarkupParser` in `oldewc/parser.py`: its `stack` of open containers
//! becomes [`BlockParser::stack`], a `Vec<NodeId>` into the same [`Arena`]
//! the rest of the crate shares, rather than a stack of live DOM objects.

use std::sync::LazyLock;

use regex::Regex;

use crate::attrs::AttributeMap;
use crate::dom::{is_base_table_data, Arena, NodeId, NodeKind};
use crate::error::NestingError;

static CLOSED_STYLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*<<([#.][A-Za-z_][A-Za-z0-9_-]*)>>(.*)$").expect("valid regex"));
static OPEN_DIV_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*<<([#.][A-Za-z_][A-Za-z0-9_-]*)$").expect("valid regex"));
static CLOSE_DIV_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*>>(.*)$").expect("valid regex"));

/// Strips every leading `<<#id>>`/`<<.class>>` marker from `line`, in
/// order, returning the style names (without their sigil stripped) and
/// whatever remains. Ported from `getClosedStyles`.
fn get_closed_styles(line: &str) -> (Vec<String>, String) {
    let mut styles = Vec::new();
    let mut rest = line.to_owned();
    while let Some(caps) = CLOSED_STYLE_PATTERN.captures(&rest) {
        styles.push(caps[1].to_owned());
        rest = caps[2].to_owned();
    }
    (styles, rest)
}

/// `#name` sets the `id` attribute; `.name` adds a class. Ported from
/// `applyStyles`.
fn apply_styles(styles: &[String], attrs: &mut AttributeMap) {
    for s in styles {
        if let Some(id) = s.strip_prefix('#') {
            attrs.set("id", id);
        } else if let Some(class) = s.strip_prefix('.') {
            attrs.add_class(class);
        }
    }
}

/// The coarse family `self.block_type` distinguishes in the original:
/// just enough to answer "is the open block a list, or a table, or
/// neither" without naming every concrete `NodeKind`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum BlockFamily {
    Paragraph,
    Heading,
    Rule,
    List,
    Table,
}

fn family_of(kind: &NodeKind) -> BlockFamily {
    match kind {
        NodeKind::Heading { .. } => BlockFamily::Heading,
        NodeKind::Rule(_) => BlockFamily::Rule,
        NodeKind::UnorderedList(_)
        | NodeKind::OrderedList(_)
        | NodeKind::DictionaryList(_)
        | NodeKind::ListItem(_)
        | NodeKind::DictionaryTerm(_)
        | NodeKind::DictionaryDef(_) => BlockFamily::List,
        NodeKind::Table(_) | NodeKind::TableRow(_) | NodeKind::TableData { .. } | NodeKind::TableHeading { .. } => {
            BlockFamily::Table
        }
        _ => BlockFamily::Paragraph,
    }
}

/// List markers `*`/`#`/`;`/`:`, grouped the way `blockType` groups them
/// (`;` and `:` share a container, `DictionaryList`).
#[derive(Clone, Copy, Eq, PartialEq)]
enum ListContainer {
    Unordered,
    Ordered,
    Dictionary,
}

fn list_container(marker: char) -> Option<ListContainer> {
    match marker {
        '*' => Some(ListContainer::Unordered),
        '#' => Some(ListContainer::Ordered),
        ';' | ':' => Some(ListContainer::Dictionary),
        _ => None,
    }
}

fn list_container_kind(marker: char) -> NodeKind {
    match list_container(marker) {
        Some(ListContainer::Unordered) => NodeKind::UnorderedList(AttributeMap::new()),
        Some(ListContainer::Ordered) => NodeKind::OrderedList(AttributeMap::new()),
        _ => NodeKind::DictionaryList(AttributeMap::new()),
    }
}

fn list_item_kind(marker: char) -> NodeKind {
    match marker {
        ';' => NodeKind::DictionaryTerm(AttributeMap::new()),
        ':' => NodeKind::DictionaryDef(AttributeMap::new()),
        _ => NodeKind::ListItem(AttributeMap::new()),
    }
}

fn colspan(arena: &Arena, id: NodeId) -> i32 {
    match arena.kind(id) {
        NodeKind::TableData { colspan, .. } | NodeKind::TableHeading { colspan, .. } => *colspan,
        _ => 0,
    }
}

fn set_colspan(arena: &mut Arena, id: NodeId, value: i32) {
    if let NodeKind::TableData { colspan, .. } | NodeKind::TableHeading { colspan, .. } = arena.kind_mut(id) {
        *colspan = value;
    }
}

fn incr_colspan(arena: &mut Arena, id: NodeId) {
    if let NodeKind::TableData { colspan, .. } | NodeKind::TableHeading { colspan, .. } = arena.kind_mut(id) {
        *colspan += 1;
    }
}

fn rowspan(arena: &Arena, id: NodeId) -> i32 {
    match arena.kind(id) {
        NodeKind::TableData { rowspan, .. } | NodeKind::TableHeading { rowspan, .. } => *rowspan,
        _ => 0,
    }
}

fn set_rowspan(arena: &mut Arena, id: NodeId, value: i32) {
    if let NodeKind::TableData { rowspan, .. } | NodeKind::TableHeading { rowspan, .. } = arena.kind_mut(id) {
        *rowspan = value;
    }
}

fn incr_rowspan(arena: &mut Arena, id: NodeId) {
    if let NodeKind::TableData { rowspan, .. } | NodeKind::TableHeading { rowspan, .. } = arena.kind_mut(id) {
        *rowspan += 1;
    }
}

/// Splits a table row's cell text on `|`, dropping the single trailing empty
/// segment produced by the row's closing `|` (it terminates the row, it
/// doesn't separate a final empty cell). `|a|b|` must yield two cells, not
/// three.
fn split_table_cells(line: &str) -> Vec<String> {
    let mut cells: Vec<String> = line.split('|').map(str::to_owned).collect();
    if cells.last().is_some_and(String::is_empty) {
        cells.pop();
    }
    cells
}

/// The block-level parser's running state: an open-container stack into a
/// shared [`Arena`], plus the bits of context a single line can't carry on
/// its own (pending styles, the current list prefix, compatible-table
/// mode). One line at a time, call [`BlockParser::feed`].
pub struct BlockParser {
    stack: Vec<NodeId>,
    block_type: Option<BlockFamily>,
    /// `styles[0]` accumulates markers closed on the *current* line;
    /// `styles[1]` holds the previous line's leftovers, applied to
    /// whatever block this line opens (a style on its own line applies to
    /// the paragraph that follows it, not to itself).
    styles: [Vec<String>; 2],
    prefix: String,
    compatible_table: bool,
}

impl BlockParser {
    /// Opens the root `Division` that every subsequent block nests under.
    pub fn new(arena: &mut Arena) -> Result<Self, NestingError> {
        let root = arena.root();
        let div = arena.append(root, NodeKind::Division(AttributeMap::new()))?;
        Ok(BlockParser {
            stack: vec![div],
            block_type: None,
            styles: [Vec::new(), Vec::new()],
            prefix: String::new(),
            compatible_table: false,
        })
    }

    fn top(&self) -> NodeId {
        *self.stack.last().expect("stack always holds at least the root division")
    }

    fn apply_styles_slot(&mut self, arena: &mut Arena, slot: usize, node: NodeId) {
        let styles = std::mem::take(&mut self.styles[slot]);
        apply_styles(&styles, arena.attrs_mut(node).expect("block nodes carry attributes"));
    }

    fn close_to_div(&mut self, arena: &Arena) {
        while !matches!(arena.kind(self.top()), NodeKind::Division(_)) {
            self.stack.pop();
        }
        self.prefix.clear();
        self.block_type = None;
        self.compatible_table = false;
    }

    fn close_div(&mut self, arena: &Arena) {
        self.close_to_div(arena);
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    fn open_div(&mut self, arena: &mut Arena, name: &str) -> Result<(), NestingError> {
        self.close_to_div(arena);
        let div = arena.append(self.top(), NodeKind::Division(AttributeMap::new()))?;
        self.stack.push(div);
        self.styles[0].push(name.to_owned());
        self.apply_styles_slot(arena, 0, div);
        self.apply_styles_slot(arena, 1, div);
        Ok(())
    }

    fn new_block(&mut self, arena: &mut Arena, kind: NodeKind) -> Result<NodeId, NestingError> {
        self.block_type = Some(family_of(&kind));
        let id = arena.append(self.top(), kind)?;
        self.stack.push(id);
        Ok(id)
    }

    fn new_heading(&mut self, arena: &mut Arena, line: &str) -> Result<(), NestingError> {
        self.close_to_div(arena);
        let chars: Vec<char> = line.chars().collect();
        let mut i = 2usize;
        while i <= 7 && i < chars.len() && chars[i] == '=' {
            i += 1;
        }
        let level = (i as i32 - 1).clamp(1, 6) as u8;
        let h = self.new_block(arena, NodeKind::Heading { attrs: AttributeMap::new(), level })?;
        self.apply_styles_slot(arena, 0, h);
        self.stack.pop();
        self.block_type = None;

        let text: String = chars[i..].iter().collect();
        let text = text.trim_start().trim_end_matches('=').trim_end();
        arena.add_text(h, text)
    }

    fn new_rule(&mut self, arena: &mut Arena) -> Result<(), NestingError> {
        self.close_to_div(arena);
        let r = self.new_block(arena, NodeKind::Rule(AttributeMap::new()))?;
        self.apply_styles_slot(arena, 0, r);
        self.stack.pop();
        self.block_type = None;
        Ok(())
    }

    /// Splits a cell run (already `|`-separated) into table cells,
    /// resolving `^`/`<` span markers by walking back over already-placed
    /// placeholder cells. Ported from `add_cells`, including its quirk
    /// that a span marker on the first row/column of a table is a no-op:
    /// there is nothing to its left/above to extend.
    fn add_cells(&mut self, arena: &mut Arena, cells: &[String]) -> Result<(), NestingError> {
        let mut cells: Vec<String> = cells.iter().map(|c| c.trim().to_owned()).collect();

        if is_base_table_data(arena.kind(self.top())) {
            if !cells[0].is_empty() {
                arena.add_text(self.top(), &cells[0])?;
            }
            cells.remove(0);
        }

        for cell_text in cells {
            if is_base_table_data(arena.kind(self.top())) {
                self.stack.pop();
            }

            let mut c = cell_text.as_str();
            let is_heading = c.starts_with('=');
            if is_heading {
                c = c[1..].trim_start();
            }
            let cell_kind = if is_heading {
                NodeKind::TableHeading { attrs: AttributeMap::new(), rowspan: 0, colspan: 0 }
            } else {
                NodeKind::TableData { attrs: AttributeMap::new(), rowspan: 0, colspan: 0 }
            };
            self.new_block(arena, cell_kind)?;
            let cell = self.top();

            let table = self.stack[self.stack.len() - 3];
            let row = self.stack[self.stack.len() - 2];
            let row_index = arena.children(table).len() - 1;
            let col_index = arena.children(row).len() - 1;

            let mut wants_rowspan = false;
            let mut wants_colspan = false;
            if c.starts_with('^') {
                wants_rowspan = true;
                c = c[1..].trim_start();
            } else if c.starts_with('<') {
                wants_colspan = true;
                c = c[1..].trim_start();
            }

            let (styles, text) = get_closed_styles(c);
            apply_styles(&styles, arena.attrs_mut(cell).expect("table cells carry attributes"));

            if wants_colspan && col_index != 0 {
                set_colspan(arena, cell, -1);
                let mut j = col_index;
                let sibling = loop {
                    j -= 1;
                    let candidate = arena.children(row)[j];
                    if colspan(arena, candidate) != -1 {
                        break candidate;
                    }
                };
                incr_colspan(arena, sibling);
            }
            if wants_rowspan && row_index != 0 {
                set_rowspan(arena, cell, -1);
                let mut j = row_index;
                let sibling = loop {
                    j -= 1;
                    let row_j = arena.children(table)[j];
                    let candidate = arena.children(row_j)[col_index];
                    if rowspan(arena, candidate) != -1 {
                        break candidate;
                    }
                };
                incr_rowspan(arena, sibling);
            }

            arena.add_text(cell, &text)?;
        }
        Ok(())
    }

    /// Ported from `add_table_line`: once a table has started without a
    /// leading `||`, it stays in "compatible" (single-`|`-separated) mode
    /// for every following line, even one that does start with `||`.
    fn add_table_line(&mut self, arena: &mut Arena, line: &str) -> Result<(), NestingError> {
        if matches!(arena.kind(self.top()), NodeKind::Division(_)) {
            let t = self.new_block(arena, NodeKind::Table(AttributeMap::new()))?;
            self.apply_styles_slot(arena, 1, t);
            if !line.starts_with("||") {
                self.compatible_table = true;
            }
        }

        if self.compatible_table {
            while !matches!(arena.kind(self.top()), NodeKind::Table(_)) {
                self.stack.pop();
            }
            let r = self.new_block(arena, NodeKind::TableRow(AttributeMap::new()))?;
            self.apply_styles_slot(arena, 0, r);
            let cells = split_table_cells(&line[1..]);
            return self.add_cells(arena, &cells);
        }

        let mut line = line;
        if line.starts_with("||") {
            while !matches!(arena.kind(self.top()), NodeKind::Table(_)) {
                self.stack.pop();
            }
            let r = self.new_block(arena, NodeKind::TableRow(AttributeMap::new()))?;
            self.apply_styles_slot(arena, 0, r);
            line = &line[2..];
        }

        let cells = split_table_cells(line);
        self.add_cells(arena, &cells)
    }

    /// Ported from `add_list_line`: compares the new line's marker prefix
    /// against the previous line's, popping two stack frames (container +
    /// item) per level that no longer matches, then opening fresh
    /// containers for whatever's left.
    fn add_list_line(&mut self, arena: &mut Arena, prefix: &str, line: &str) -> Result<(), NestingError> {
        let old: Vec<char> = self.prefix.chars().collect();
        let new: Vec<char> = prefix.chars().collect();

        if old.is_empty() {
            self.close_to_div(arena);
        }

        let mut common = 0;
        while common < old.len() && common < new.len() && list_container(old[common]) == list_container(new[common])
        {
            common += 1;
        }

        let mut remaining = old.len();
        while remaining > common {
            self.stack.pop();
            self.stack.pop();
            remaining -= 1;
        }

        if common < new.len() {
            for &marker in &new[common..] {
                let lb = self.new_block(arena, list_container_kind(marker))?;
                self.apply_styles_slot(arena, 1, lb);
                let ib = self.new_block(arena, list_item_kind(marker))?;
                self.apply_styles_slot(arena, 0, ib);
            }
        } else {
            self.stack.pop();
            let marker = *new.last().expect("a list line always has at least one marker");
            let ib = self.new_block(arena, list_item_kind(marker))?;
            self.apply_styles_slot(arena, 0, ib);
        }

        let (styles, text) = get_closed_styles(line);
        apply_styles(&styles, arena.attrs_mut(self.top()).expect("list item carries attributes"));
        arena.add_text(self.top(), &text)?;
        self.prefix = prefix.to_owned();
        Ok(())
    }

    fn add_plain_line(&mut self, arena: &mut Arena, line: &str) -> Result<(), NestingError> {
        if self.compatible_table {
            self.close_to_div(arena);
        }

        match self.block_type {
            None => {
                let p = self.new_block(
                    arena,
                    NodeKind::Paragraph { attrs: AttributeMap::new(), x_type: None },
                )?;
                self.apply_styles_slot(arena, 1, p);
                self.apply_styles_slot(arena, 0, p);
            }
            Some(BlockFamily::Table) => return self.add_table_line(arena, line),
            _ => {}
        }
        arena.add_text(self.top(), line)
    }

    /// Dispatches on the line's first character: a list marker, a table
    /// `|`, or plain text. Ported from `add_line`.
    fn add_line(&mut self, arena: &mut Arena, line: &str) -> Result<(), NestingError> {
        let first = line.chars().next().expect("doBlockMarkup only calls add_line with a non-empty line");
        match first {
            '*' | '#' | ':' | ';' => {
                let prefix: String = line.chars().take_while(|c| matches!(c, '*' | '#' | ':' | ';')).collect();
                let rest = &line[prefix.len()..];
                if rest.chars().next().is_some_and(|c| !c.is_whitespace()) {
                    return self.add_plain_line(arena, line);
                }
                if self.block_type.is_some_and(|bt| bt != BlockFamily::List) {
                    self.close_to_div(arena);
                }
                self.add_list_line(arena, &prefix, rest.trim_start())
            }
            '|' => {
                if self.block_type.is_some_and(|bt| bt != BlockFamily::Table) {
                    self.close_to_div(arena);
                }
                self.add_table_line(arena, line)
            }
            _ => self.add_plain_line(arena, line),
        }
    }

    /// Feeds one already-escaped, already-extension-expanded line into the
    /// stack machine. Ported from the per-line body of `doBlockMarkup`.
    pub fn feed(&mut self, arena: &mut Arena, line: &str) -> Result<(), NestingError> {
        let mut line = line.to_owned();

        while let Some(caps) = CLOSE_DIV_PATTERN.captures(&line) {
            self.close_div(arena);
            line = caps[1].to_owned();
        }

        let (closed, rest) = get_closed_styles(&line);
        self.styles[0] = closed;
        line = rest;

        if let Some(caps) = OPEN_DIV_PATTERN.captures(&line) {
            let name = caps[1].to_owned();
            self.open_div(arena, &name)?;
            line = String::new();
        }

        if line.is_empty() {
            self.close_to_div(arena);
            self.styles[1] = std::mem::take(&mut self.styles[0]);
            return Ok(());
        } else if line.starts_with("==") {
            self.new_heading(arena, &line)?;
            return Ok(());
        } else if line.starts_with("----") {
            self.new_rule(arena)?;
            return Ok(());
        }

        self.add_line(arena, &line)?;
        self.styles[1] = std::mem::take(&mut self.styles[0]);
        Ok(())
    }

    /// The root `Division` every block nests under, for [`crate::inline`]
    /// and [`crate::render`] to start walking from.
    pub fn division(&self) -> NodeId {
        self.stack[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs(arena: &Arena, div: NodeId) -> Vec<String> {
        arena
            .children(div)
            .iter()
            .filter_map(|&id| match arena.kind(id) {
                NodeKind::Paragraph { .. } => Some(
                    arena
                        .children(id)
                        .iter()
                        .filter_map(|&t| arena.kind(t).text())
                        .collect::<Vec<_>>()
                        .join(""),
                ),
                _ => None,
            })
            .collect()
    }

    fn run(lines: &[&str]) -> (Arena, NodeId) {
        let mut arena = Arena::new();
        let mut parser = BlockParser::new(&mut arena).unwrap();
        for line in lines {
            parser.feed(&mut arena, line).unwrap();
        }
        let div = parser.division();
        (arena, div)
    }

    #[test]
    fn consecutive_lines_join_one_paragraph() {
        let (arena, div) = run(&["hello", "world"]);
        assert_eq!(paragraphs(&arena, div), vec!["hello\nworld".to_owned()]);
    }

    #[test]
    fn blank_line_starts_a_new_paragraph() {
        let (arena, div) = run(&["one", "", "two"]);
        assert_eq!(paragraphs(&arena, div), vec!["one".to_owned(), "two".to_owned()]);
    }

    #[test]
    fn heading_captures_level_and_text() {
        let (arena, div) = run(&["=== Title ==="]);
        let h = arena.children(div)[0];
        match arena.kind(h) {
            NodeKind::Heading { level, .. } => assert_eq!(*level, 2),
            other => panic!("expected Heading, got {other:?}"),
        }
        assert_eq!(arena.kind(arena.children(h)[0]).text(), Some("Title"));
    }

    #[test]
    fn rule_produces_no_text_content() {
        let (arena, div) = run(&["----"]);
        assert!(matches!(arena.kind(arena.children(div)[0]), NodeKind::Rule(_)));
    }

    #[test]
    fn nested_list_markers_build_nested_containers() {
        let (arena, div) = run(&["* top", "** nested"]);
        let ul = arena.children(div)[0];
        assert!(matches!(arena.kind(ul), NodeKind::UnorderedList(_)));
        let li = arena.children(ul)[0];
        let inner_ul = arena.children(li)[1];
        assert!(matches!(arena.kind(inner_ul), NodeKind::UnorderedList(_)));
    }

    #[test]
    fn switching_list_marker_family_closes_the_old_list() {
        let (arena, div) = run(&["* item", "; term"]);
        assert_eq!(arena.children(div).len(), 2);
        assert!(matches!(arena.kind(arena.children(div)[0]), NodeKind::UnorderedList(_)));
        assert!(matches!(arena.kind(arena.children(div)[1]), NodeKind::DictionaryList(_)));
    }

    #[test]
    fn pipe_table_builds_rows_and_cells() {
        let (arena, div) = run(&["|a|b", "|c|d"]);
        let table = arena.children(div)[0];
        assert!(matches!(arena.kind(table), NodeKind::Table(_)));
        assert_eq!(arena.children(table).len(), 2);
        let row0 = arena.children(table)[0];
        assert_eq!(arena.children(row0).len(), 2);
    }

    #[test]
    fn trailing_pipe_does_not_add_an_empty_cell() {
        let (arena, div) = run(&["|a|b|"]);
        let table = arena.children(div)[0];
        let row = arena.children(table)[0];
        assert_eq!(arena.children(row).len(), 2);
    }

    #[test]
    fn double_pipe_table_heading_cell_is_recognized() {
        let (arena, div) = run(&["||=Name|=Age"]);
        let table = arena.children(div)[0];
        let row = arena.children(table)[0];
        assert!(matches!(arena.kind(arena.children(row)[0]), NodeKind::TableHeading { .. }));
    }

    #[test]
    fn colspan_marker_extends_the_cell_to_its_left() {
        let (arena, div) = run(&["||a|<"]);
        let table = arena.children(div)[0];
        let row = arena.children(table)[0];
        let first = arena.children(row)[0];
        match arena.kind(first) {
            NodeKind::TableData { colspan, .. } => assert_eq!(*colspan, 1),
            other => panic!("expected TableData, got {other:?}"),
        }
    }

    #[test]
    fn colspan_marker_on_first_column_is_a_no_op() {
        let (arena, div) = run(&["||<a"]);
        let table = arena.children(div)[0];
        let row = arena.children(table)[0];
        let first = arena.children(row)[0];
        match arena.kind(first) {
            NodeKind::TableData { colspan, .. } => assert_eq!(*colspan, 0),
            other => panic!("expected TableData, got {other:?}"),
        }
    }

    #[test]
    fn division_markers_open_and_close_a_nested_division() {
        let (arena, div) = run(&["<<.box", "inside", ">>", "after"]);
        assert_eq!(arena.children(div).len(), 2);
        let inner = arena.children(div)[0];
        assert!(matches!(arena.kind(inner), NodeKind::Division(_)));
        assert!(arena.attrs(inner).unwrap().has_class("box"));
    }

    #[test]
    fn closed_style_on_its_own_line_applies_to_the_next_paragraph() {
        let (arena, div) = run(&["<<#intro>>", "text"]);
        let p = arena.children(div)[0];
        assert_eq!(arena.attrs(p).unwrap().get("id").as_deref(), Some("intro"));
    }
}
