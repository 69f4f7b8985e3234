//! The staged line-transform pipeline described in spec §4.1 and §4.5.
//!
//! `decode` (escape.rs) → [`escape_transform`] → [`ExtensionTransform`] runs
//! ahead of block parsing; each stage is a lazy iterator adaptor, the same
//! shape as the source's `UnicodeTransform`/`EscapeTransform`/
//! `ExtensionTransform` chain, so an extension's own output can in turn
//! contain more extensions without the earlier stages knowing about it.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::RecursionLimit;
use crate::escape::tilde_escapes;
use crate::extension::Registry;

/// Applies [`tilde_escapes`] line by line and joins backslash-continued
/// lines, per spec §4.1. Each line is right-trimmed first; a line ending in
/// an odd number of unescaped trailing backslashes has the last one
/// stripped and is held to be concatenated with the next line.
struct EscapeTransform<I> {
    source: I,
    held: Option<String>,
    exhausted: bool,
}

impl<I: Iterator<Item = String>> Iterator for EscapeTransform<I> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            match self.source.next() {
                Some(raw) => {
                    let mut line = tilde_escapes(raw.trim_end());
                    if let Some(held) = self.held.take() {
                        line = held + &line;
                    }
                    let trailing_backslashes = line.chars().rev().take_while(|&c| c == '\\').count();
                    if trailing_backslashes % 2 == 1 {
                        line.pop();
                        self.held = Some(line);
                        continue;
                    }
                    return Some(line);
                }
                None => {
                    if self.exhausted {
                        return None;
                    }
                    self.exhausted = true;
                    return self.held.take();
                }
            }
        }
    }
}

/// Wraps `source` with the tilde-escape + continuation-join pass.
pub fn escape_transform(source: impl Iterator<Item = String>) -> impl Iterator<Item = String> {
    EscapeTransform { source, held: None, exhausted: false }
}

/// Prepends `head` to the first line of `source` and appends `tail` to its
/// last, without introducing an extra line break — the device that keeps
/// inline extension expansions (`<<include name=x.ewc>>` sitting in the
/// middle of a paragraph line) from splitting their surrounding text onto
/// new lines.
///
/// Faithful to `ExtensionTransform.look_ahead` in `oldewc/extensions.py`,
/// including its degenerate case: an empty `source` still yields exactly
/// one line, `head` and `tail` concatenated.
struct LookAhead<I> {
    source: I,
    head: Option<String>,
    tail: Option<String>,
    held: Option<String>,
    done: bool,
}

impl<I> LookAhead<I> {
    fn new(source: I, head: String, tail: String) -> Self {
        LookAhead { source, head: Some(head), tail: Some(tail), held: None, done: false }
    }
}

impl<I: Iterator<Item = String>> Iterator for LookAhead<I> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.done {
            return None;
        }
        let buf = match self.held.take() {
            Some(line) => line,
            None => {
                let head = self.head.take().unwrap_or_default();
                match self.source.next() {
                    Some(first) => head + &first,
                    None => {
                        self.done = true;
                        return Some(head + &self.tail.take().unwrap_or_default());
                    }
                }
            }
        };
        match self.source.next() {
            Some(next) => {
                self.held = Some(next);
                Some(buf)
            }
            None => {
                self.done = true;
                Some(buf + &self.tail.take().unwrap_or_default())
            }
        }
    }
}

static RAW_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.*?)\{\{\{(.*)$").unwrap());
static EXT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)<<(!|[A-Za-z_][A-Za-z0-9_-]*)(.*)$").unwrap());

/// Pulls lines from whichever iterator is on top of the stack, popping
/// exhausted ones, the equivalent of `ExtensionTransform.stack_lines`.
/// Borrows the stack for as long as one `Extension::block` call needs to
/// keep consuming from it.
struct StackSource<'a, 'b> {
    stack: &'b mut Vec<Box<dyn Iterator<Item = String> + 'a>>,
}

impl<'a, 'b> Iterator for StackSource<'a, 'b> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(line) => return Some(line),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// The recursive extension-expansion driver from spec §4.5. Maintains a
/// stack of input iterators, initially just the source; every extension
/// expansion pushes a new [`LookAhead`]-wrapped iterator of its own output
/// on top, so nested extensions are processed before the driver returns to
/// the line that contained them.
pub struct ExtensionTransform<'a> {
    stack: Vec<Box<dyn Iterator<Item = String> + 'a>>,
    registry: &'a mut Registry,
    recursion_limit: usize,
}

impl<'a> ExtensionTransform<'a> {
    pub fn new(
        source: impl Iterator<Item = String> + 'a,
        registry: &'a mut Registry,
        recursion_limit: usize,
    ) -> Self {
        ExtensionTransform { stack: vec![Box::new(source)], registry, recursion_limit }
    }

    fn pull(&mut self) -> Option<String> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(line) => return Some(line),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

impl<'a> Iterator for ExtensionTransform<'a> {
    type Item = Result<String, RecursionLimit>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.pull()?;

            let (head, name, content, end_pattern) = if let Some(caps) = RAW_PATTERN.captures(&line) {
                (caps[1].to_owned(), "raw".to_owned(), caps[2].to_owned(), "}}}")
            } else if let Some(caps) = EXT_PATTERN.captures(&line) {
                let name = if &caps[2] == "!" { "comment".to_owned() } else { caps[2].to_owned() };
                (caps[1].to_owned(), name, caps[3].to_owned(), ">>")
            } else {
                return Some(Ok(line));
            };

            let content = content.trim_start().to_owned();
            let (result, tail) = match content.find(end_pattern) {
                Some(end_idx) => {
                    let tail = content[end_idx + end_pattern.len()..].to_owned();
                    let before = content[..end_idx].to_owned();
                    (self.registry.get_mut(&name).inline(&before), tail)
                }
                None => {
                    let mut source = StackSource { stack: &mut self.stack };
                    self.registry.get_mut(&name).block(&content, &mut source, end_pattern)
                }
            };

            if self.stack.len() > self.recursion_limit {
                return Some(Err(RecursionLimit { limit: self.recursion_limit }));
            }

            self.stack.push(Box::new(LookAhead::new(result.into_iter(), head, tail)));
        }
    }
}
