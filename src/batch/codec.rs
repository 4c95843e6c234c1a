//! Marker-based encoding of several texts into one backend payload.

use regex::{Captures, Regex};
use std::fmt::Write;
use std::sync::OnceLock;
use tracing::debug;

/// Merges a group of texts into one payload and splits responses back apart.
pub trait BatchCodec: Send + Sync {
    /// Encode `texts` into one payload. Marker ids are positions within `texts`.
    fn encode(&self, texts: &[&str]) -> String;

    /// Recover `expected` slots from a backend response. Unrecoverable slots are `None`.
    fn decode(&self, response: &str, expected: usize) -> Vec<Option<String>>;

    /// Length in characters of `encode(texts)`.
    fn encoded_len(&self, texts: &[&str]) -> usize {
        self.encode(texts).chars().count()
    }
}

const OPEN_WRAPPER: &str = "<pre>";
const CLOSE_WRAPPER: &str = "</pre>";
const OPEN_PREFIX: &str = "<a i=";
const CLOSE_MARKER: &str = "</a>";

/// Encodes each text as `<a i=N>text</a>` inside a `<pre>` wrapper.
///
/// Text is HTML-escaped on the way in, so user content can never produce
/// something that scans as a marker. HTML-aware backends keep the tags in
/// place and translate only the content between them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagCodec;

impl TagCodec {
    pub fn new() -> Self {
        Self
    }
}

impl BatchCodec for TagCodec {
    fn encode(&self, texts: &[&str]) -> String {
        let mut out = String::with_capacity(self.encoded_len(texts));
        out.push_str(OPEN_WRAPPER);
        for (id, text) in texts.iter().enumerate() {
            out.push_str(OPEN_PREFIX);
            let _ = write!(out, "{}>", id);
            escape_into(&mut out, text);
            out.push_str(CLOSE_MARKER);
        }
        out.push_str(CLOSE_WRAPPER);
        out
    }

    fn decode(&self, response: &str, expected: usize) -> Vec<Option<String>> {
        let mut slots: Vec<Option<String>> = vec![None; expected];
        let mut seen = vec![0usize; expected];
        // (marker id, byte offset where its content starts)
        let mut open: Option<(Option<usize>, usize)> = None;

        for caps in marker_regex().captures_iter(response) {
            let Some(token) = caps.get(0) else { continue };

            match caps.name("id") {
                Some(id) => {
                    if let Some((Some(prev), _)) = open {
                        debug!("Marker {} is not terminated before the next marker", prev);
                    }
                    open = Some((id.as_str().parse().ok(), token.end()));
                }
                None => {
                    let Some((id, start)) = open.take() else {
                        continue;
                    };
                    let Some(id) = id.filter(|id| *id < expected) else {
                        debug!("Ignoring marker outside of expected range 0..{}", expected);
                        continue;
                    };
                    seen[id] += 1;
                    slots[id] = if seen[id] == 1 {
                        Some(unescape(&response[start..token.start()]))
                    } else {
                        // Duplicated ids are ambiguous.
                        None
                    };
                }
            }
        }

        slots
    }

    fn encoded_len(&self, texts: &[&str]) -> usize {
        let markers: usize = texts
            .iter()
            .enumerate()
            .map(|(id, _)| OPEN_PREFIX.len() + digits(id) + 1 + CLOSE_MARKER.len())
            .sum();
        let content: usize = texts.iter().map(|t| escaped_len(t)).sum();
        OPEN_WRAPPER.len() + CLOSE_WRAPPER.len() + markers + content
    }
}

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r#"(?i)<\s*(?:a\s+i\s*=\s*["']?(?P<id>\d+)["']?\s*|/\s*a\s*)>"#)
            .expect("Invalid marker regex")
    })
}

fn entity_regex() -> &'static Regex {
    static ENTITY: OnceLock<Regex> = OnceLock::new();
    ENTITY.get_or_init(|| {
        Regex::new(r"&(?:(?P<name>amp|lt|gt|quot|apos|nbsp)|#(?P<dec>\d+)|#[xX](?P<hex>[0-9a-fA-F]+));")
            .expect("Invalid entity regex")
    })
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escaped_len(text: &str) -> usize {
    text.chars()
        .map(|c| match c {
            '&' => 5,
            '<' | '>' => 4,
            _ => 1,
        })
        .sum()
}

fn digits(mut n: usize) -> usize {
    let mut count = 1;
    while n >= 10 {
        n /= 10;
        count += 1;
    }
    count
}

/// Single-pass entity decoding, so `&amp;lt;` becomes `&lt;` and not `<`.
fn unescape(text: &str) -> String {
    entity_regex()
        .replace_all(text, |caps: &Captures| {
            let decoded = if let Some(name) = caps.name("name") {
                match name.as_str() {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    _ => Some('\u{a0}'),
                }
            } else if let Some(dec) = caps.name("dec") {
                dec.as_str().parse().ok().and_then(char::from_u32)
            } else {
                caps.name("hex")
                    .and_then(|hex| u32::from_str_radix(hex.as_str(), 16).ok())
                    .and_then(char::from_u32)
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
