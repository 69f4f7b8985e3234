//! Per-parser configuration, per spec §6.
//!
//! `oldewc/config.py` reads most of this from a module-wide global
//! (`parsingContext`) populated at process start. Per spec §9's REDESIGN
//! FLAGS ("Re-architect as explicit `ParserBuilder` state"), this crate
//! instead threads a `Configuration` value through each [`crate::parser::Parser`]
//! instance, built with [`ConfigBuilder`] the way `wikitext::Configuration`/
//! `ConfigurationSource` separate processed settings from their source in
//! the teacher repository.

use std::path::PathBuf;

/// Settings controlling one [`crate::parser::Parser`] instance.
///
/// `input_encoding`/`output_encoding` are carried for interface fidelity
/// with spec §6 but otherwise inert: this crate only ever reads and
/// writes UTF-8 (see [`crate::escape::decode`]'s doc comment), the same
/// simplification made there.
#[derive(Clone, Debug)]
pub struct Configuration {
    pub input_encoding: String,
    pub output_encoding: String,
    /// Must contain exactly one `{name}` slot.
    pub local_link_pattern: String,
    pub local_image_pattern: String,
    pub compact_html: bool,
    /// `None` disables the `include` extension.
    pub include_path: Option<PathBuf>,
    pub include_depth_limit: usize,
    pub quotes_and_dashes: bool,
    pub em_and_strong: bool,
    pub naked_urls: bool,
    pub document_title: Option<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            input_encoding: "utf-8".to_owned(),
            output_encoding: "utf-8".to_owned(),
            local_link_pattern: "/w/{name}.html".to_owned(),
            local_image_pattern: "/i/{name}".to_owned(),
            compact_html: false,
            include_path: None,
            include_depth_limit: 20,
            quotes_and_dashes: true,
            em_and_strong: false,
            naked_urls: false,
            document_title: None,
        }
    }
}

/// Builds a [`Configuration`] one field at a time. Every setter takes and
/// returns `Self` by value so calls chain: `ConfigBuilder::new().compact_html(true).build()`.
#[derive(Clone, Debug, Default)]
pub struct ConfigBuilder(Configuration);

impl ConfigBuilder {
    pub fn new() -> Self {
        ConfigBuilder(Configuration::default())
    }

    pub fn input_encoding(mut self, v: impl Into<String>) -> Self {
        self.0.input_encoding = v.into();
        self
    }

    pub fn output_encoding(mut self, v: impl Into<String>) -> Self {
        self.0.output_encoding = v.into();
        self
    }

    pub fn local_link_pattern(mut self, v: impl Into<String>) -> Self {
        self.0.local_link_pattern = v.into();
        self
    }

    pub fn local_image_pattern(mut self, v: impl Into<String>) -> Self {
        self.0.local_image_pattern = v.into();
        self
    }

    pub fn compact_html(mut self, v: bool) -> Self {
        self.0.compact_html = v;
        self
    }

    pub fn include_path(mut self, v: impl Into<PathBuf>) -> Self {
        self.0.include_path = Some(v.into());
        self
    }

    pub fn include_depth_limit(mut self, v: usize) -> Self {
        self.0.include_depth_limit = v;
        self
    }

    pub fn quotes_and_dashes(mut self, v: bool) -> Self {
        self.0.quotes_and_dashes = v;
        self
    }

    pub fn em_and_strong(mut self, v: bool) -> Self {
        self.0.em_and_strong = v;
        self
    }

    pub fn naked_urls(mut self, v: bool) -> Self {
        self.0.naked_urls = v;
        self
    }

    pub fn document_title(mut self, v: impl Into<String>) -> Self {
        self.0.document_title = Some(v.into());
        self
    }

    pub fn build(self) -> Configuration {
        self.0
    }
}
