//! HTTP header list with case-insensitive name lookup.
//!
//! HTTP headers are order-preserving and case-insensitive per RFC 9110 §5.
//! Lines are stored raw — name and value are not split apart at parse
//! time. Lookup is a query: each call scans for the first colon and
//! compares names ignoring ASCII case, so the original bytes survive
//! untouched for verbatim re-serialization.

use bytes::Bytes;

/// An ordered list of raw header lines.
///
/// Each entry is one `name: value` line without its CRLF. Multiple
/// entries may share a name; [`get`](Self::get) returns the first and
/// [`get_all`](Self::get_all) returns them in order.
///
/// # Examples
///
/// ```
/// use filament::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Type", "text/html; charset=utf-8");
/// headers.insert("X-Custom", "first");
/// headers.insert("X-Custom", "second");
///
/// assert_eq!(headers.get("content-type"), Some("text/html; charset=utf-8"));
/// let all: Vec<_> = headers.get_all("x-custom").collect();
/// assert_eq!(all, vec!["first", "second"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    lines: Vec<Bytes>,
}

/// Splits a raw line at its first colon. Lines without a colon never
/// match a lookup.
fn split_line(line: &[u8]) -> Option<(&[u8], &[u8])> {
    let colon = line.iter().position(|&b| b == b':')?;
    Some((&line[..colon], &line[colon + 1..]))
}

/// Trims optional whitespace (SP / HTAB) around a field value.
fn trim_value(mut value: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = value {
        value = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = value {
        value = rest;
    }
    value
}

impl Headers {
    /// Creates an empty header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header list with pre-allocated capacity for `capacity` lines.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: Vec::with_capacity(capacity),
        }
    }

    /// Appends a raw header line (no trailing CRLF). Used by the parser,
    /// which has already validated the line's grammar.
    pub(crate) fn push_raw_line(&mut self, line: Bytes) {
        self.lines.push(line);
    }

    /// Appends a `name: value` entry. Multiple calls with the same name
    /// are additive.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) {
        let line = format!("{}: {}", name.as_ref(), value.as_ref());
        self.lines.push(Bytes::from(line));
    }

    /// Returns the first value for the given name (case-insensitive),
    /// with surrounding whitespace trimmed, or `None`. Values that are
    /// not valid UTF-8 are treated as absent; use
    /// [`get_raw`](Self::get_raw) to see their bytes.
    pub fn get(&self, name: &str) -> Option<&str> {
        std::str::from_utf8(self.get_raw(name)?).ok()
    }

    /// Returns the first value for the given name as raw bytes.
    pub fn get_raw(&self, name: &str) -> Option<&[u8]> {
        self.lines.iter().find_map(|line| {
            let (n, v) = split_line(line)?;
            n.eq_ignore_ascii_case(name.as_bytes())
                .then(|| trim_value(v))
        })
    }

    /// Returns all values for the given name (case-insensitive), in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.lines.iter().filter_map(move |line| {
            let (n, v) = split_line(line)?;
            if !n.eq_ignore_ascii_case(name.as_bytes()) {
                return None;
            }
            std::str::from_utf8(trim_value(v)).ok()
        })
    }

    /// Returns `true` if at least one line carries the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.get_raw(name).is_some()
    }

    /// Returns the raw lines in insertion order, for serialization.
    pub fn lines(&self) -> impl Iterator<Item = &[u8]> {
        self.lines.iter().map(|line| line.as_ref())
    }

    /// Returns the number of header lines (not unique names).
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns `true` if there are no header lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
