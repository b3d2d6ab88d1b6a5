//! CSS selector subset parser and matcher.
//!
//! Supports the selector forms the extension's rule forms produce: tag,
//! `*`, `#id`, `.class`, attribute tests (`[a]`, `[a=v]`, `[a~=v]`,
//! `[a^=v]`, `[a$=v]`, `[a*=v]`), compounds, comma-separated lists, and
//! the descendant / child (`>`) combinators. Anything outside the
//! subset (pseudo-classes, sibling combinators) is a `SelectorError`;
//! the caller treats that as a malformed rule and skips it.
//!
//! Matching is right-to-left: the rightmost compound is tested against
//! the candidate element, earlier compounds walk the ancestor chain.

use crate::dom::{Document, NodeId};

/// A selector that failed to parse. Carries the source and the reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid selector `{selector}`: {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    /// `[a]`
    Exists,
    /// `[a=v]`
    Equals,
    /// `[a~=v]`, whitespace-separated word match
    Includes,
    /// `[a^=v]`
    Prefix,
    /// `[a$=v]`
    Suffix,
    /// `[a*=v]`
    Substring,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SimpleSelector {
    Universal,
    Tag(String),
    Id(String),
    Class(String),
    Attr {
        name: String,
        op: AttrOp,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Compound {
    parts: Vec<SimpleSelector>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone)]
struct Complex {
    /// Left-to-right compound sequence.
    compounds: Vec<Compound>,
    /// `combinators[i]` sits between `compounds[i]` and `compounds[i + 1]`.
    combinators: Vec<Combinator>,
}

/// A parsed selector list.
#[derive(Debug, Clone)]
pub struct Selector {
    complexes: Vec<Complex>,
    source: String,
}

impl Selector {
    /// Parse a selector list. Errors never panic the caller; a bad
    /// selector is a per-rule diagnostic upstream.
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let source = input.to_string();
        let err = |reason: &str| SelectorError {
            selector: source.clone(),
            reason: reason.to_string(),
        };

        if input.trim().is_empty() {
            return Err(err("empty selector"));
        }

        let mut complexes = Vec::new();
        for part in split_top_level(input) {
            complexes.push(parse_complex(part.trim()).map_err(|reason| err(&reason))?);
        }
        Ok(Self {
            complexes,
            source,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Test a single element.
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        if !doc.is_element(id) {
            return false;
        }
        self.complexes.iter().any(|c| match_complex(doc, id, c))
    }

    /// All matching elements below `from`, in document order.
    pub fn query_all(&self, doc: &Document, from: NodeId) -> Vec<NodeId> {
        doc.pre_order(from)
            .into_iter()
            .filter(|&id| id != from && self.matches(doc, id))
            .collect()
    }

    /// First matching element below `from` in document order.
    pub fn query_first(&self, doc: &Document, from: NodeId) -> Option<NodeId> {
        doc.pre_order(from)
            .into_iter()
            .find(|&id| id != from && self.matches(doc, id))
    }
}

/// Split on commas, ignoring commas inside brackets or quotes.
fn split_top_level(input: &str) -> Vec<&str> {
    let bytes = input.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_brackets = false;
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate() {
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'[' => in_brackets = true,
                b']' => in_brackets = false,
                b',' if !in_brackets => {
                    parts.push(&input[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    parts.push(&input[start..]);
    parts
}

fn parse_complex(input: &str) -> Result<Complex, String> {
    let bytes = input.as_bytes();
    let mut compounds = Vec::new();
    let mut combinators = Vec::new();
    let mut i = 0;
    let mut pending: Option<Combinator> = None;

    while i < bytes.len() {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            // Whitespace between compounds is a descendant combinator
            // unless a `>` follows.
            if !compounds.is_empty() && pending.is_none() {
                pending = Some(Combinator::Descendant);
            }
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        if bytes[i] == b'>' {
            if compounds.is_empty() {
                return Err("combinator with no left-hand side".to_string());
            }
            pending = Some(Combinator::Child);
            i += 1;
            continue;
        }

        let (compound, next) = parse_compound(input, i)?;
        if !compounds.is_empty() {
            combinators.push(pending.take().unwrap_or(Combinator::Descendant));
        } else {
            pending = None;
        }
        compounds.push(compound);
        i = next;
    }

    if compounds.is_empty() {
        return Err("empty selector".to_string());
    }
    if pending == Some(Combinator::Child) {
        return Err("combinator with no right-hand side".to_string());
    }
    Ok(Complex {
        compounds,
        combinators,
    })
}

fn parse_compound(input: &str, mut i: usize) -> Result<(Compound, usize), String> {
    let bytes = input.as_bytes();
    let mut parts = Vec::new();

    // Leading tag or universal.
    if bytes[i] == b'*' {
        parts.push(SimpleSelector::Universal);
        i += 1;
    } else if is_ident_byte(bytes[i]) {
        let (ident, next) = take_ident(input, i);
        parts.push(SimpleSelector::Tag(ident.to_ascii_lowercase()));
        i = next;
    }

    while i < bytes.len() {
        match bytes[i] {
            b'#' => {
                let (ident, next) = take_ident(input, i + 1);
                if ident.is_empty() {
                    return Err("expected id after `#`".to_string());
                }
                parts.push(SimpleSelector::Id(ident.to_string()));
                i = next;
            }
            b'.' => {
                let (ident, next) = take_ident(input, i + 1);
                if ident.is_empty() {
                    return Err("expected class name after `.`".to_string());
                }
                parts.push(SimpleSelector::Class(ident.to_string()));
                i = next;
            }
            b'[' => {
                let (part, next) = parse_attr_test(input, i + 1)?;
                parts.push(part);
                i = next;
            }
            b':' => return Err("pseudo-classes are not supported".to_string()),
            b if b.is_ascii_whitespace() || b == b'>' => break,
            _ => return Err(format!("unexpected character at offset {i}")),
        }
    }

    if parts.is_empty() {
        return Err("empty compound selector".to_string());
    }
    Ok((Compound { parts }, i))
}

fn parse_attr_test(input: &str, mut i: usize) -> Result<(SimpleSelector, usize), String> {
    let bytes = input.as_bytes();
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    let (name, next) = take_ident(input, i);
    if name.is_empty() {
        return Err("expected attribute name".to_string());
    }
    i = next;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= bytes.len() {
        return Err("unterminated attribute selector".to_string());
    }

    if bytes[i] == b']' {
        return Ok((
            SimpleSelector::Attr {
                name: name.to_ascii_lowercase(),
                op: AttrOp::Exists,
                value: String::new(),
            },
            i + 1,
        ));
    }

    let op = match bytes[i] {
        b'=' => {
            i += 1;
            AttrOp::Equals
        }
        b'~' | b'^' | b'$' | b'*' if i + 1 < bytes.len() && bytes[i + 1] == b'=' => {
            let op = match bytes[i] {
                b'~' => AttrOp::Includes,
                b'^' => AttrOp::Prefix,
                b'$' => AttrOp::Suffix,
                _ => AttrOp::Substring,
            };
            i += 2;
            op
        }
        _ => return Err("expected `]` or an attribute operator".to_string()),
    };

    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= bytes.len() {
        return Err("unterminated attribute selector".to_string());
    }

    let value;
    if bytes[i] == b'"' || bytes[i] == b'\'' {
        let quote = bytes[i];
        i += 1;
        let start = i;
        while i < bytes.len() && bytes[i] != quote {
            i += 1;
        }
        if i >= bytes.len() {
            return Err("unterminated quoted attribute value".to_string());
        }
        value = input[start..i].to_string();
        i += 1;
    } else {
        let start = i;
        while i < bytes.len() && bytes[i] != b']' && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        value = input[start..i].to_string();
        if value.is_empty() {
            return Err("expected attribute value".to_string());
        }
    }

    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= bytes.len() || bytes[i] != b']' {
        return Err("expected `]`".to_string());
    }
    Ok((
        SimpleSelector::Attr {
            name: name.to_ascii_lowercase(),
            op,
            value,
        },
        i + 1,
    ))
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b >= 0x80
}

fn take_ident(input: &str, start: usize) -> (&str, usize) {
    let bytes = input.as_bytes();
    let mut i = start;
    while i < bytes.len() && is_ident_byte(bytes[i]) {
        i += 1;
    }
    (&input[start..i], i)
}

fn match_complex(doc: &Document, id: NodeId, complex: &Complex) -> bool {
    match_suffix(doc, id, &complex.compounds, &complex.combinators)
}

fn match_suffix(
    doc: &Document,
    id: NodeId,
    compounds: &[Compound],
    combinators: &[Combinator],
) -> bool {
    let Some(last) = compounds.last() else {
        return true;
    };
    if !match_compound(doc, id, last) {
        return false;
    }
    if compounds.len() == 1 {
        return true;
    }

    let rest_compounds = &compounds[..compounds.len() - 1];
    let rest_combinators = &combinators[..combinators.len() - 1];
    match combinators[combinators.len() - 1] {
        Combinator::Child => match doc.parent(id) {
            Some(parent) => match_suffix(doc, parent, rest_compounds, rest_combinators),
            None => false,
        },
        Combinator::Descendant => {
            let mut cur = doc.parent(id);
            while let Some(ancestor) = cur {
                if match_suffix(doc, ancestor, rest_compounds, rest_combinators) {
                    return true;
                }
                cur = doc.parent(ancestor);
            }
            false
        }
    }
}

fn match_compound(doc: &Document, id: NodeId, compound: &Compound) -> bool {
    if !doc.is_element(id) {
        return false;
    }
    compound.parts.iter().all(|part| match part {
        SimpleSelector::Universal => true,
        SimpleSelector::Tag(tag) => doc.tag(id) == Some(tag.as_str()),
        SimpleSelector::Id(wanted) => doc.attr(id, "id") == Some(wanted.as_str()),
        SimpleSelector::Class(wanted) => doc
            .attr(id, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == wanted)),
        SimpleSelector::Attr { name, op, value } => match doc.attr(id, name) {
            None => false,
            Some(actual) => match op {
                AttrOp::Exists => true,
                AttrOp::Equals => actual == value,
                AttrOp::Includes => actual.split_whitespace().any(|w| w == value),
                AttrOp::Prefix => actual.starts_with(value.as_str()),
                AttrOp::Suffix => actual.ends_with(value.as_str()),
                AttrOp::Substring => actual.contains(value.as_str()),
            },
        },
    })
}
