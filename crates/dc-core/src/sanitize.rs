//! Snapshot sanitizer.
//!
//! Produces static, unstyled markup from a live subtree. Operates on a
//! deep clone only; the live tree is never touched, so a capture can
//! never perturb what the user currently sees.
//!
//! Two stages per node, pre-order, before recursing into children:
//! attribute stripping (`img` keeps `src`, everything else is fully
//! stripped), then boilerplate excision. An excised node is dropped
//! whole, children included.

use log::debug;

use crate::dom::{Document, NodeId};
use crate::selector::{Selector, SelectorError};

/// Trimmed, lowercased text labels that mark boilerplate widgets:
/// sidebar markers, promo figure captions, share-icon titles.
pub const BOILERPLATE_LABELS: &[&str] = &["most popular", "featured video", "save this story"];

/// Capture failures. Neither variant ever propagates into the page;
/// the engine logs and keeps the previous snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("capture target not found: `{0}`")]
    TargetNotFound(String),
    #[error(transparent)]
    BadSelector(#[from] SelectorError),
}

/// Sanitize the subtree rooted at `source` and return its serialized
/// inner markup. `&mut Document` is needed only to own the clone; the
/// live tree under `source` is read, never written.
pub fn sanitize(doc: &mut Document, source: NodeId) -> String {
    let clone = doc.clone_subtree(source);
    // The capture root is what the user asked for; detectors apply to
    // everything inside it, never to the root itself.
    scrub(doc, clone, true);
    doc.inner_html(clone)
}

/// Resolve `selector`, sanitize the first match.
pub fn capture(doc: &mut Document, selector: &str) -> Result<String, CaptureError> {
    let parsed = Selector::parse(selector)?;
    let target = parsed
        .query_first(doc, doc.root())
        .ok_or_else(|| CaptureError::TargetNotFound(selector.to_string()))?;
    Ok(sanitize(doc, target))
}

fn scrub(doc: &mut Document, node: NodeId, is_capture_root: bool) {
    if doc.is_element(node) {
        if doc.tag(node) == Some("img") {
            doc.retain_attrs(node, &["src"]);
        } else {
            doc.retain_attrs(node, &[]);
        }
    }

    if !is_capture_root && is_boilerplate(doc, node) {
        debug!("excising boilerplate subtree");
        doc.detach(node);
        return;
    }

    // Re-fetch children after the node survived; attribute stripping
    // leaves them untouched but excision below will not.
    let children: Vec<NodeId> = doc.children(node).to_vec();
    for child in children {
        if doc.is_element(child) {
            scrub(doc, child, false);
        }
    }
}

/// The three boilerplate detectors, checked independently; the first
/// hit wins and the node is dropped without descending further.
fn is_boilerplate(doc: &Document, node: NodeId) -> bool {
    // A generic block whose first element child carries a marker label.
    if let Some(first) = doc.first_element_child(node) {
        if doc.tag(first) == Some("div") && is_marker_text(&doc.text_content(first)) {
            return true;
        }
    }

    // A figure whose caption carries a marker label.
    if doc.tag(node) == Some("figure") {
        if let Some(first) = doc.first_element_child(node) {
            if doc.tag(first) == Some("figcaption") && is_marker_text(&doc.text_content(first)) {
                return true;
            }
        }
    }

    // An inline-vector share widget: any descendant svg whose title
    // carries a marker label.
    for descendant in doc.pre_order(node) {
        if doc.tag(descendant) == Some("svg") {
            let titled = doc.children(descendant).iter().any(|&child| {
                doc.tag(child) == Some("title") && is_marker_text(&doc.text_content(child))
            });
            if titled {
                return true;
            }
        }
    }

    false
}

fn is_marker_text(text: &str) -> bool {
    let trimmed = text.trim().to_lowercase();
    BOILERPLATE_LABELS.contains(&trimmed.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitize_first(html: &str) -> String {
        let mut doc = Document::parse(html);
        let first = doc.children(doc.root())[0];
        sanitize(&mut doc, first)
    }

    #[test]
    fn test_img_keeps_only_src() {
        let out = sanitize_first("<div><img src=\"a.png\" class=\"x\" data-y=\"1\"></div>");
        assert_eq!(out, "<img src=\"a.png\">");
    }

    #[test]
    fn test_all_other_attributes_stripped() {
        let out = sanitize_first(
            "<article class=\"x\" id=\"y\" style=\"color:red\" onclick=\"evil()\"><p class=\"z\">hi</p></article>",
        );
        assert_eq!(out, "<p>hi</p>");
    }

    #[test]
    fn test_live_tree_untouched() {
        let mut doc = Document::parse("<div class=\"keep\"><p id=\"p\">hi</p></div>");
        let div = doc.children(doc.root())[0];
        let before = doc.outer_html(div);
        let _ = sanitize(&mut doc, div);
        assert_eq!(doc.outer_html(div), before);
    }

    #[test]
    fn test_most_popular_sidebar_excised() {
        let out = sanitize_first(
            "<section>\
               <aside><div>Most Popular</div><ul><li>story</li></ul></aside>\
               <p>body text</p>\
             </section>",
        );
        assert_eq!(out, "<p>body text</p>");
    }

    #[test]
    fn test_marker_match_trims_and_ignores_case() {
        let out = sanitize_first("<div><aside><div>  most POPULAR  </div></aside><p>x</p></div>");
        assert_eq!(out, "<p>x</p>");
    }

    #[test]
    fn test_featured_video_figure_excised() {
        let out = sanitize_first(
            "<article>\
               <figure><figcaption>Featured Video</figcaption><video></video></figure>\
               <p>prose</p>\
             </article>",
        );
        assert_eq!(out, "<p>prose</p>");
    }

    #[test]
    fn test_figure_with_ordinary_caption_survives() {
        let out = sanitize_first(
            "<article><figure><figcaption>A nice chart</figcaption></figure></article>",
        );
        assert_eq!(out, "<figure><figcaption>A nice chart</figcaption></figure>");
    }

    #[test]
    fn test_share_widget_excised_via_svg_title() {
        let out = sanitize_first(
            "<article>\
               <div><span><svg><title>Save this story</title></svg></span>bookmark</div>\
               <p>prose</p>\
             </article>",
        );
        assert_eq!(out, "<p>prose</p>");
    }

    #[test]
    fn test_capture_target_not_found() {
        let mut doc = Document::parse("<p>hi</p>");
        let err = capture(&mut doc, "#missing").unwrap_err();
        assert_eq!(err, CaptureError::TargetNotFound("#missing".to_string()));
    }

    #[test]
    fn test_capture_bad_selector() {
        let mut doc = Document::parse("<p>hi</p>");
        assert!(matches!(
            capture(&mut doc, "p:first-child"),
            Err(CaptureError::BadSelector(_))
        ));
    }

    #[test]
    fn test_capture_happy_path() {
        let mut doc = Document::parse(
            "<main id=\"story\"><h1 class=\"t\">Title</h1><p data-x=\"1\">Body</p></main>",
        );
        let out = capture(&mut doc, "#story").unwrap();
        assert_eq!(out, "<h1>Title</h1><p>Body</p>");
    }
}
