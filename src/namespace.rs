//! Link/image namespace resolution, per spec §4.4.
//!
//! A namespace prefix like `wp:` in `[[wp:Some Page]]` selects a handler
//! that turns the rest of the link target into a URL. Everything after
//! the prefix falls back to the empty-prefix ([`Local`]) handler.

use indexmap::IndexMap;
use md5::{Digest, Md5};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::escape::remove_escapes;

/// Schemes recognized as full URIs rather than namespace prefixes
/// (`oldewc/config.py: standardURISchemes`, carried verbatim).
pub static STANDARD_URI_SCHEMES: phf::Set<&'static str> = phf::phf_set! {
    "acap", "cap", "cid", "data", "dav", "dict", "fax",
    "file", "ftp", "http", "https", "im", "imap", "info", "ldap", "mailto",
    "mid", "news", "nfs", "nntp", "pop", "snmp", "telnet",
};

/// Splits a leading `name:` prefix off `line`, per spec §4.4 step 3.
///
/// A prefix starts with an ASCII letter and continues with alphanumerics,
/// `-`, or `_`. Anything else (no colon, a non-letter first character, a
/// lone leading `:`) yields an empty prefix and the trimmed remainder.
pub fn get_prefix(line: &str) -> (String, String) {
    let line = line.trim_start();
    if line.is_empty() {
        return (String::new(), String::new());
    }
    let mut chars = line.char_indices();
    let (_, first) = chars.next().unwrap();
    if first == ':' {
        return (String::new(), line[1..].to_owned());
    }
    if !first.is_ascii_alphabetic() {
        return (String::new(), line.to_owned());
    }
    for (i, c) in chars {
        if c == ':' {
            return (line[..i].to_owned(), line[i + 1..].to_owned());
        }
        if !(c.is_alphanumeric() || c == '-' || c == '_') {
            return (String::new(), line.to_owned());
        }
    }
    (String::new(), line.to_owned())
}

/// A registered link/image URL handler for one namespace prefix.
pub trait Namespace: Send + Sync {
    fn link_url(&self, name: &str) -> String;
    /// `None` means this namespace has no image support (e.g. `Google`,
    /// `Dictionary`).
    fn image_url(&self, name: &str) -> Option<String>;
}

/// Patterns used by the built-in [`Local`] namespace, taken from
/// [`crate::config::Configuration`].
#[derive(Clone, Debug)]
pub struct LocalPatterns {
    /// Must contain exactly one `{name}` slot.
    pub link_pattern: String,
    pub image_pattern: String,
}

const MANGLE_ESCAPE_CHARS: &str = "\t\n:\"'%&?<>[]{}*+\\/`~;:@=|$";

/// The default, unadorned namespace: local wiki pages.
pub struct Local {
    pub patterns: LocalPatterns,
}

impl Local {
    /// Lowercases, replaces spaces with underscores, and strips escapes.
    /// Idempotent: normalizing an already-normalized name is a no-op, so
    /// it is safe to use as a database key independent of [`Local::mangle`].
    pub fn normalize(name: &str) -> String {
        remove_escapes(name.trim()).to_lowercase().replace(' ', "_")
    }

    /// Converts a human-readable title into a URL-safe token using `$hh`
    /// as the escape form (not `%hh`; Apache intercepts `%`-escapes before
    /// they reach the application in the original deployment).
    pub fn mangle(title: &str) -> String {
        let normalized = Self::normalize(title);
        let mut out = String::with_capacity(normalized.len());
        for c in normalized.chars() {
            if c.is_ascii() && MANGLE_ESCAPE_CHARS.contains(c) {
                out.push('$');
                out.push_str(&format!("{:02x}", c as u32));
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Inverts [`Local::mangle`] for display: underscores become spaces,
    /// `$hh` sequences become the original byte, and the result is
    /// capitalized.
    pub fn demangle(name: &str) -> String {
        let chars: Vec<char> = name.chars().collect();
        let mut out = String::with_capacity(chars.len());
        let mut i = 0;
        while i < chars.len() {
            if chars[i] == '_' {
                out.push(' ');
                i += 1;
            } else if chars[i] == '$' && i + 2 < chars.len() {
                let hex: String = chars[i + 1..i + 3].iter().collect();
                if let Ok(byte) = u32::from_str_radix(&hex, 16) {
                    if let Some(c) = char::from_u32(byte) {
                        out.push(c);
                    }
                    i += 3;
                    continue;
                }
                out.push(chars[i]);
                i += 1;
            } else {
                out.push(chars[i]);
                i += 1;
            }
        }
        let cleaned = remove_escapes(&out);
        capitalize(&cleaned)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

impl Namespace for Local {
    fn link_url(&self, name: &str) -> String {
        self.patterns.link_pattern.replace("{name}", &Local::mangle(name))
    }

    fn image_url(&self, name: &str) -> Option<String> {
        Some(self.patterns.image_pattern.replace("{name}", &Local::mangle(name)))
    }
}

const WIKI_ESCAPE_SET: &AsciiSet = &CONTROLS
    .add(b'%')
    .add(b'&')
    .add(b'?')
    .add(b'<')
    .add(b'>')
    .add(b'(')
    .add(b')')
    .add(b'[')
    .add(b']')
    .add(b'{')
    .add(b'}')
    .add(b'*')
    .add(b'+')
    .add(b'\\')
    .add(b'/')
    .add(b'`')
    .add(b'~')
    .add(b';')
    .add(b':')
    .add(b'@')
    .add(b'=');

/// Wikipedia links and images, sharded the way MediaWiki's image upload
/// paths are: `/<first-hex>/<first-two-hex>/<name>` of the MD5 of the
/// mangled filename.
pub struct Wikipedia;

impl Wikipedia {
    fn mangle(title: &str) -> String {
        let mut chars = title.chars();
        let mut out = String::new();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
        }
        let rest: String = chars.collect();
        let rest = rest.replace(' ', "_");
        out.push_str(&utf8_percent_encode(&rest, WIKI_ESCAPE_SET).to_string());
        out
    }
}

impl Namespace for Wikipedia {
    fn link_url(&self, name: &str) -> String {
        let (lang, tail) = get_prefix(name);
        let lang = if lang.is_empty() { "en".to_owned() } else { lang };
        format!("http://{lang}.wikipedia.org/wiki/{}", Wikipedia::mangle(&tail))
    }

    fn image_url(&self, name: &str) -> Option<String> {
        let (lang, tail) = get_prefix(name);
        let lang = if lang.is_empty() { "en".to_owned() } else { lang };
        let mangled = Wikipedia::mangle(&tail);
        let mut hasher = Md5::new();
        hasher.update(mangled.as_bytes());
        let digest = hasher.finalize();
        let hex = format!("{digest:x}");
        Some(format!(
            "http://upload.wikimedia.org/wikipedia/{lang}/{}/{}/{mangled}",
            &hex[0..1],
            &hex[0..2]
        ))
    }
}

/// Google web search links. Has no image form.
pub struct Google;

impl Namespace for Google {
    fn link_url(&self, name: &str) -> String {
        let mangled = name.replace(' ', "+");
        format!(
            "http://www.google.com/search?hl=en&q={}",
            utf8_percent_encode(&mangled, WIKI_ESCAPE_SET)
        )
    }

    fn image_url(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Dictionary lookup links. Has no image form.
pub struct Dictionary;

impl Namespace for Dictionary {
    fn link_url(&self, name: &str) -> String {
        format!("http://freedictionary.org/?Query={name}&button=Search")
    }

    fn image_url(&self, _name: &str) -> Option<String> {
        None
    }
}

/// The set of namespace handlers a [`crate::parser::Parser`] resolves
/// link/image targets against. Empty prefix ("") must always be
/// registered; [`Registry::default`] wires up the four built-ins.
pub struct Registry {
    handlers: IndexMap<String, Box<dyn Namespace>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry { handlers: IndexMap::new() }
    }

    pub fn register(&mut self, prefix: impl Into<String>, handler: Box<dyn Namespace>) {
        self.handlers.insert(prefix.into(), handler);
    }

    fn get(&self, prefix: &str) -> Option<&dyn Namespace> {
        self.handlers.get(prefix).map(|b| b.as_ref()).or_else(|| self.handlers.get("").map(|b| b.as_ref()))
    }

    /// Resolves a link target to a URL, per spec §4.4's resolver steps.
    pub fn link_url(&self, name: &str) -> String {
        let name = remove_escapes(name).trim().to_owned();
        if name.starts_with('/') || name.starts_with('#') {
            return name;
        }
        let (prefix, tail) = get_prefix(&name);
        if !prefix.is_empty() {
            if STANDARD_URI_SCHEMES.contains(prefix.as_str()) {
                return name;
            }
            if let Some(handler) = self.get(&prefix) {
                return handler.link_url(&tail);
            }
        }
        match self.get("") {
            Some(handler) => handler.link_url(&tail),
            None => tail,
        }
    }

    /// Resolves an image target to a URL. Unlike the original's
    /// `imageURL` (which unconditionally falls through to the empty-prefix
    /// handler even after a registered namespace resolved it — the dead
    /// code spec §9 flags as a bug), a registered handler's result is
    /// honored when it returns one; only a `None` (or unregistered prefix)
    /// falls back to `Local`. See DESIGN.md for this Open Question.
    pub fn image_url(&self, name: &str) -> String {
        let name = remove_escapes(name).trim().to_owned();
        if name.starts_with('/') {
            return name;
        }
        let (prefix, tail) = get_prefix(&name);
        if !prefix.is_empty() {
            if STANDARD_URI_SCHEMES.contains(prefix.as_str()) {
                return name;
            }
            if let Some(handler) = self.get(&prefix)
                && let Some(url) = handler.image_url(&tail)
            {
                return url;
            }
        }
        match self.get("") {
            Some(handler) => handler.image_url(&tail).unwrap_or_default(),
            None => String::new(),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_local_patterns(LocalPatterns {
            link_pattern: "/w/{name}.html".to_owned(),
            image_pattern: "/i/{name}".to_owned(),
        })
    }
}

impl Registry {
    /// Wires up the four built-ins with the empty-prefix ([`Local`])
    /// handler's URL templates taken from `patterns`, per spec §6's
    /// `local_link_pattern`/`local_image_pattern` configuration knobs.
    pub fn with_local_patterns(patterns: LocalPatterns) -> Self {
        let mut reg = Self::new();
        reg.register("", Box::new(Local { patterns }));
        reg.register("wp", Box::new(Wikipedia));
        reg.register("g", Box::new(Google));
        reg.register("d", Box::new(Dictionary));
        reg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_extraction() {
        assert_eq!(get_prefix(""), (String::new(), String::new()));
        assert_eq!(get_prefix(":"), (String::new(), String::new()));
        assert_eq!(get_prefix(":abc"), (String::new(), "abc".to_owned()));
        assert_eq!(get_prefix("abc"), (String::new(), "abc".to_owned()));
        assert_eq!(get_prefix("abc:"), ("abc".to_owned(), String::new()));
        assert_eq!(get_prefix("abc:def"), ("abc".to_owned(), "def".to_owned()));
        assert_eq!(get_prefix("abc:def:ghi"), ("abc".to_owned(), "def:ghi".to_owned()));
    }

    #[test]
    fn local_mangle_round_trips_through_normalize() {
        assert_eq!(Local::mangle("A Page Title"), "a_page_title");
        let once = Local::mangle("2: A 10% $5 B_C");
        let twice = Local::normalize(&once);
        assert_eq!(Local::normalize(&Local::normalize(&once)), twice);
    }

    #[test]
    fn local_mangle_escapes_special_characters_with_dollar_hex() {
        let mangled = Local::mangle("a:b");
        for c in mangled.chars() {
            if MANGLE_ESCAPE_CHARS.contains(c) && c != '$' {
                panic!("unescaped special character {c:?} in {mangled:?}");
            }
        }
        assert!(mangled.contains("$3a"));
    }

    #[test]
    fn local_demangle_reverses_spaces_and_dollar_escapes() {
        assert_eq!(Local::demangle("a_page_title"), "A page title");
    }

    #[test]
    fn registry_resolves_standard_scheme_verbatim() {
        let reg = Registry::default();
        assert_eq!(reg.link_url("http://example.com/x"), "http://example.com/x");
    }

    #[test]
    fn registry_falls_back_to_local_for_unknown_prefix() {
        let reg = Registry::default();
        assert_eq!(reg.link_url("bogus:Some Page"), "/w/some_page.html");
    }

    #[test]
    fn registry_dispatches_wikipedia_prefix() {
        let reg = Registry::default();
        assert_eq!(reg.link_url("wp:A Page Title"), "http://en.wikipedia.org/wiki/A_Page_Title");
    }

    #[test]
    fn registry_honors_absolute_and_fragment_targets() {
        let reg = Registry::default();
        assert_eq!(reg.link_url("/local/path"), "/local/path");
        assert_eq!(reg.link_url("#anchor"), "#anchor");
    }
}
