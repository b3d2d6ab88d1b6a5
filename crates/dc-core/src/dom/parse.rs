//! Permissive HTML parser.
//!
//! Builds a `Document` from markup the way a browser would: never
//! fails, recovers from malformed input. Unclosed tags are closed at
//! ancestor boundaries, stray close tags are dropped, comments and
//! doctypes are skipped. `script`/`style` content is taken as raw text.

use super::{is_void_element, Document, NodeId};

/// Parse a full document.
pub fn parse_document(html: &str) -> Document {
    let mut doc = Document::new();
    let root = doc.root();
    parse_into(&mut doc, root, html);
    doc
}

/// Parse markup into detached nodes owned by `doc`, in document order.
pub fn parse_fragment(doc: &mut Document, html: &str) -> Vec<NodeId> {
    let holder = doc.create_element("div");
    parse_into(doc, holder, html);
    let children: Vec<NodeId> = doc.children(holder).to_vec();
    for &child in &children {
        doc.detach(child);
    }
    children
}

fn parse_into(doc: &mut Document, parse_root: NodeId, html: &str) {
    let bytes = html.as_bytes();
    let mut stack: Vec<NodeId> = vec![parse_root];
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'<' {
            let end = next_lt(bytes, i + 1);
            push_text(doc, *stack.last().unwrap(), &html[i..end]);
            i = end;
            continue;
        }

        let rest = &html[i..];
        if rest.starts_with("<!--") {
            i = match rest[4..].find("-->") {
                Some(j) => i + 4 + j + 3,
                None => bytes.len(),
            };
        } else if rest.starts_with("</") {
            let Some(j) = rest.find('>') else { break };
            let name = rest[2..j].trim().to_ascii_lowercase();
            if let Some(pos) = stack
                .iter()
                .rposition(|&id| doc.tag(id) == Some(name.as_str()))
            {
                // Position 0 is the parse root; a close tag never pops it.
                if pos > 0 {
                    stack.truncate(pos);
                }
            }
            i = i + j + 1;
        } else if i + 1 < bytes.len() && bytes[i + 1].is_ascii_alphabetic() {
            let (el, self_closing, next) = parse_open_tag(doc, html, i);
            doc.append_child(*stack.last().unwrap(), el);
            i = next;

            let tag = doc.tag(el).unwrap_or_default().to_string();
            if tag == "script" || tag == "style" {
                i = consume_raw_text(doc, el, &tag, html, i);
            } else if !self_closing && !is_void_element(&tag) {
                stack.push(el);
            }
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            i = match rest.find('>') {
                Some(j) => i + j + 1,
                None => bytes.len(),
            };
        } else {
            // Stray '<' that opens nothing: literal text.
            let end = next_lt(bytes, i + 1);
            push_text(doc, *stack.last().unwrap(), &html[i..end]);
            i = end;
        }
    }
}

fn next_lt(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == b'<')
        .map(|j| from + j)
        .unwrap_or(bytes.len())
}

fn push_text(doc: &mut Document, parent: NodeId, raw: &str) {
    if raw.is_empty() {
        return;
    }
    let text = doc.create_text(&decode_entities(raw));
    doc.append_child(parent, text);
}

/// Raw-text content runs to the matching close tag, entities untouched.
fn consume_raw_text(
    doc: &mut Document,
    el: NodeId,
    tag: &str,
    html: &str,
    from: usize,
) -> usize {
    let close = format!("</{tag}");
    let rest = &html[from..];
    match rest.to_ascii_lowercase().find(&close) {
        Some(j) => {
            if j > 0 {
                let text = doc.create_text(&rest[..j]);
                doc.append_child(el, text);
            }
            let after = from + j;
            match html[after..].find('>') {
                Some(k) => after + k + 1,
                None => html.len(),
            }
        }
        None => {
            if !rest.is_empty() {
                let text = doc.create_text(rest);
                doc.append_child(el, text);
            }
            html.len()
        }
    }
}

/// Parse `<name attr=value ...>` starting at the `<`. Returns the new
/// element, whether the tag was self-closing, and the position after `>`.
fn parse_open_tag(doc: &mut Document, html: &str, start: usize) -> (NodeId, bool, usize) {
    let bytes = html.as_bytes();
    let mut i = start + 1;
    let name_start = i;
    while i < bytes.len() && is_name_byte(bytes[i]) {
        i += 1;
    }
    let el = doc.create_element(&html[name_start..i]);

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return (el, false, html.len());
        }
        match bytes[i] {
            b'>' => return (el, false, i + 1),
            b'/' => {
                if i + 1 < bytes.len() && bytes[i + 1] == b'>' {
                    return (el, true, i + 2);
                }
                i += 1;
            }
            _ => {
                let attr_start = i;
                while i < bytes.len() && !is_attr_delimiter(bytes[i]) {
                    i += 1;
                }
                if i == attr_start {
                    // Unparseable byte; skip it rather than loop forever.
                    i += 1;
                    continue;
                }
                let name = html[attr_start..i].to_string();
                let mut value = String::new();
                if i < bytes.len() && bytes[i] == b'=' {
                    i += 1;
                    if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                        let quote = bytes[i];
                        i += 1;
                        let value_start = i;
                        while i < bytes.len() && bytes[i] != quote {
                            i += 1;
                        }
                        value = decode_entities(&html[value_start..i]);
                        if i < bytes.len() {
                            i += 1;
                        }
                    } else {
                        let value_start = i;
                        while i < bytes.len()
                            && !bytes[i].is_ascii_whitespace()
                            && bytes[i] != b'>'
                        {
                            i += 1;
                        }
                        value = decode_entities(&html[value_start..i]);
                    }
                }
                doc.set_attr(el, &name, &value);
            }
        }
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}

fn is_attr_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'=' | b'>' | b'/' | b'"' | b'\'')
}

/// Decode the handful of entities that matter for selector text matching.
fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        // Entity names are short; probe a bounded window, stepping by
        // chars so multibyte text after a bare `&` cannot split a
        // character.
        let semi = rest
            .char_indices()
            .take_while(|&(i, _)| i <= 10)
            .find(|&(_, c)| c == ';')
            .map(|(i, _)| i);
        let Some(semi) = semi else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => decode_numeric_entity(entity),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_numeric_entity(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = if let Some(hex) = digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<u32>().ok()?
    };
    char::from_u32(code)
}
