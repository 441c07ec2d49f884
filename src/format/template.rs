// Token-based rendering of log entries.
//
// Rendering rewrites the template in three passes, each over the previous
// pass's output:
//   1. simple tokens            {message}
//   2. date tokens              {createTime} / {createTime(%H:%M)}
//   3. extended-properties      {extendedProperties(<before>{key}<between>{value}<after>)}
// A pass never rescans text it substituted itself.

use regex::{Captures, Regex};
use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};

use super::tokens::{MISSING_VALUE, TokenRegistry};
use super::{FormatError, LogFormatter, html};
use crate::domain::LogEntry;

/// Template used when none is configured.
pub const DEFAULT_TEMPLATE: &str = "{newLine}\
------------------------------------------------------------{newLine}\
Message: {message}{newLine}\
Create Time: {createTime}{newLine}\
Level: {level}{newLine}\
Log ID: {uniqueId}{newLine}\
User Name: {userName}{newLine}\
Machine Name: {machineName}{newLine}\
Machine IP Address: {machineIpAddress}{newLine}\
{extendedProperties({key}: {value}{newLine})}\
EXCEPTION INFO:{newLine}\
{exception}{newLine}\
------------------------------------------------------------";

/// strftime-style format applied to date tokens without an explicit format.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

const ITERATE_ALL_KEY: &str = "key";

struct TemplatePatterns {
    simple: Regex,
    date: Regex,
    extended_block: Regex,
    block_body: Regex,
}

impl TemplatePatterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            simple: Regex::new(r"\{(\w+)\}")?,
            date: Regex::new(r"\{(\w+)(?:\(([^)]*)\))?\}")?,
            extended_block: Regex::new(r"(?s)\{extendedProperties\((.*?)\)\}")?,
            block_body: Regex::new(r"(?s)^(.*?)\{(\w+)(\?)?\}(.*?)\{value\}(.*)$")?,
        })
    }
}

static PATTERNS: OnceLock<Result<TemplatePatterns, regex::Error>> = OnceLock::new();

fn patterns() -> Result<&'static TemplatePatterns, FormatError> {
    PATTERNS
        .get_or_init(TemplatePatterns::compile)
        .as_ref()
        .map_err(|e| FormatError::Pattern(e.to_string()))
}

/// Renders entries through a token template.
///
/// Templates written as encoded HTML (`&lt;b&gt;{message}&lt;/b&gt;`) are
/// decoded once at construction, and every substituted value is then
/// HTML-encoded on output.
pub struct TemplateFormatter {
    template: String,
    is_html: bool,
    tokens: Arc<TokenRegistry>,
    patterns: &'static TemplatePatterns,
}

impl TemplateFormatter {
    pub fn new(template: &str) -> Result<Self, FormatError> {
        Self::with_registry(template, TokenRegistry::global())
    }

    pub fn with_registry(template: &str, tokens: Arc<TokenRegistry>) -> Result<Self, FormatError> {
        Ok(Self {
            template: html::decode_entities(template),
            is_html: html::looks_html_encoded(template),
            tokens,
            patterns: patterns()?,
        })
    }

    pub fn with_default_template() -> Result<Self, FormatError> {
        Self::new(DEFAULT_TEMPLATE)
    }

    /// The decoded template.
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn is_html(&self) -> bool {
        self.is_html
    }

    pub fn render(&self, entry: &LogEntry) -> String {
        let simple = self.replace_simple_tokens(&self.template, entry);
        let dated = self.replace_date_tokens(&simple, entry);
        self.replace_extended_properties(&dated, entry)
    }

    /// Pass 1. The key selector of an `extendedProperties(...)` block is left
    /// alone even when a simple token of the same name is registered.
    fn replace_simple_tokens(&self, text: &str, entry: &LogEntry) -> String {
        let mut rendered = String::with_capacity(text.len());
        let mut last = 0;
        for block in self.patterns.extended_block.captures_iter(text) {
            let (Some(whole), Some(inner)) = (block.get(0), block.get(1)) else {
                continue;
            };
            rendered.push_str(&self.substitute_simple(&text[last..whole.start()], entry));
            rendered.push_str(&text[whole.start()..inner.start()]);

            let body = inner.as_str();
            match self.key_selector_span(body) {
                Some((start, end)) => {
                    rendered.push_str(&self.substitute_simple(&body[..start], entry));
                    rendered.push_str(&body[start..end]);
                    rendered.push_str(&self.substitute_simple(&body[end..], entry));
                }
                None => rendered.push_str(&self.substitute_simple(body, entry)),
            }

            rendered.push_str(&text[inner.end()..whole.end()]);
            last = whole.end();
        }
        rendered.push_str(&self.substitute_simple(&text[last..], entry));
        rendered
    }

    fn substitute_simple(&self, text: &str, entry: &LogEntry) -> String {
        self.patterns
            .simple
            .replace_all(text, |caps: &Captures<'_>| match self.tokens.simple(&caps[1]) {
                Some(handler) => self.output(&handler(entry)),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Byte range of `{key}` / `{key?}` inside a block body, braces included.
    fn key_selector_span(&self, body: &str) -> Option<(usize, usize)> {
        let parts = self.patterns.block_body.captures(body)?;
        let name = parts.get(2)?;
        let end = parts.get(3).map_or(name.end(), |m| m.end()) + 1;
        Some((name.start() - 1, end))
    }

    fn replace_date_tokens(&self, text: &str, entry: &LogEntry) -> String {
        self.patterns
            .date
            .replace_all(text, |caps: &Captures<'_>| {
                let Some(handler) = self.tokens.date(&caps[1]) else {
                    return caps[0].to_string();
                };
                let format = caps
                    .get(2)
                    .map(|m| m.as_str())
                    .filter(|format| !format.is_empty())
                    .unwrap_or(DEFAULT_DATE_FORMAT);

                let mut rendered = String::new();
                match write!(rendered, "{}", handler(entry).format(format)) {
                    Ok(()) => self.output(&rendered),
                    // invalid format specifier
                    Err(_) => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    fn replace_extended_properties(&self, text: &str, entry: &LogEntry) -> String {
        self.patterns
            .extended_block
            .replace_all(text, |caps: &Captures<'_>| {
                self.render_block(&caps[1], entry)
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    fn render_block(&self, body: &str, entry: &LogEntry) -> Option<String> {
        let parts = self.patterns.block_body.captures(body)?;
        let before = parts.get(1).map_or("", |m| m.as_str());
        let key_token = parts.get(2).map_or("", |m| m.as_str());
        let hide_key = parts.get(3).is_some();
        let between = parts.get(4).map_or("", |m| m.as_str());
        let after = parts.get(5).map_or("", |m| m.as_str());

        let mut rendered = String::new();
        let mut push = |key: &str, value: &str| {
            rendered.push_str(before);
            if !hide_key {
                rendered.push_str(&self.output(key));
            }
            rendered.push_str(between);
            rendered.push_str(&self.output(value));
            rendered.push_str(after);
        };

        if key_token == ITERATE_ALL_KEY {
            for (key, value) in &entry.extended_properties {
                push(key, &value.render());
            }
        } else {
            let value = entry
                .property(key_token)
                .map(|value| value.render())
                .unwrap_or_else(|| MISSING_VALUE.to_string());
            push(key_token, &value);
        }

        Some(rendered)
    }

    fn output(&self, value: &str) -> String {
        if self.is_html {
            html::encode(value)
        } else {
            value.to_string()
        }
    }
}

impl LogFormatter for TemplateFormatter {
    fn format(&self, entry: &LogEntry) -> Result<String, FormatError> {
        Ok(self.render(entry))
    }
}

impl std::fmt::Debug for TemplateFormatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateFormatter")
            .field("template", &self.template)
            .field("is_html", &self.is_html)
            .finish()
    }
}
