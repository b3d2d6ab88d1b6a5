//! The content-script engine.
//!
//! Owns the active rule set, the capture configuration, the snapshot
//! store, the overlay and the change observer, and drives them from
//! exactly two triggers: bridge messages and mutation batches. All of
//! it runs synchronously in the page's single execution context; the
//! only deferred work is the settling delay before a capture, modeled
//! on a logical millisecond clock advanced by the host.

use log::{debug, info, warn};

use crate::bridge::{data_uri, Bridge, FaviconFetcher, FaviconReply, Message, RuleUpdate};
use crate::dom::Document;
use crate::observe::ChangeObserver;
use crate::overlay::{OverlayController, OverlayState};
use crate::reconcile::reconcile;
use crate::rules::RuleSet;
use crate::sanitize::capture;
use crate::selector::Selector;
use crate::snapshot::{Snapshot, SnapshotStore};

/// Fixed settling delay before a capture sanitizes its target, to let
/// dynamically-rendered page content finish rendering first.
pub const SETTLE_DELAY_MS: u64 = 2000;

/// Capture configuration, updated by rule-update messages.
#[derive(Debug, Clone, Default)]
pub struct CaptureConfig {
    pub auto_copy: bool,
    pub copy_selector: Option<String>,
    pub preset_domain: Option<String>,
    pub preset_id: Option<String>,
}

/// A scheduled capture. Not cancellable: if a newer request lands
/// before this one fires, both run and the later result overwrites
/// the store (last write wins).
#[derive(Debug)]
struct PendingCapture {
    due_at: u64,
    selector: String,
}

/// One engine instance per loaded document.
pub struct ContentScript {
    bridge: Box<dyn Bridge>,
    fetcher: Box<dyn FaviconFetcher>,
    page_url: String,
    hostname: String,
    rules: RuleSet,
    capture_config: CaptureConfig,
    store: SnapshotStore,
    overlay: OverlayController,
    observer: ChangeObserver,
    clock_ms: u64,
    pending_captures: Vec<PendingCapture>,
}

impl ContentScript {
    pub fn new(bridge: Box<dyn Bridge>, fetcher: Box<dyn FaviconFetcher>, page_url: &str) -> Self {
        Self {
            bridge,
            fetcher,
            page_url: page_url.to_string(),
            hostname: host_of(page_url).unwrap_or_default().to_string(),
            rules: RuleSet::new(),
            capture_config: CaptureConfig::default(),
            store: SnapshotStore::new(),
            overlay: OverlayController::new(),
            observer: ChangeObserver::new(),
            clock_ms: 0,
            pending_captures: Vec::new(),
        }
    }

    /// Start observing and run the initial pass. With no bridge (a
    /// non-extension context) the engine stays inert by design.
    pub fn boot(&mut self, doc: &mut Document) {
        if !self.bridge.is_available() {
            warn!("bridge unavailable; content script is inert");
            return;
        }
        self.observer.start();
        reconcile(&self.rules, doc);
        self.pump(doc);
    }

    /// Drain bridge messages and mutation batches until quiet. Safe to
    /// call at any time; reconcile's idempotence guarantees this
    /// terminates (a pass that removes nothing journals nothing).
    pub fn pump(&mut self, doc: &mut Document) {
        loop {
            let mut progressed = false;
            while let Some(message) = self.bridge.poll() {
                self.handle_message(doc, message);
                progressed = true;
            }
            if let Some(batch) = self.observer.poll(doc) {
                debug!("mutation batch: {} record(s)", batch.len());
                reconcile(&self.rules, doc);
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
    }

    /// Advance the logical clock, firing any captures whose settling
    /// delay has elapsed.
    pub fn advance(&mut self, doc: &mut Document, ms: u64) {
        self.clock_ms += ms;
        let now = self.clock_ms;
        let due: Vec<PendingCapture> = {
            let (due, waiting) = std::mem::take(&mut self.pending_captures)
                .into_iter()
                .partition(|p| p.due_at <= now);
            self.pending_captures = waiting;
            due
        };
        for pending in due {
            self.run_capture(doc, &pending.selector);
        }
        self.pump(doc);
    }

    fn handle_message(&mut self, doc: &mut Document, message: Message) {
        match message {
            Message::UpdateRemovalTargets(update)
            | Message::UpdatePresetRemovalTargets(update) => {
                self.apply_rule_update(doc, update)
            }
            Message::GetFavicon => {
                let reply = self.favicon_reply(doc);
                self.bridge.respond(reply);
            }
            Message::ShowSnapshot => self.overlay.open(doc, &self.store),
            Message::HideSnapshot => self.overlay.close(doc),
        }
    }

    /// Every inbound rule update is authoritative and total: the rule
    /// set is replaced wholesale, never patched.
    fn apply_rule_update(&mut self, doc: &mut Document, update: RuleUpdate) {
        info!("rule set replaced: {} rule(s)", update.removal_targets.len());
        self.rules.replace(update.removal_targets);

        if let Some(auto_copy) = update.auto_copy {
            self.capture_config.auto_copy = auto_copy;
        }
        if update.copy_selector.is_some() {
            self.capture_config.copy_selector = update.copy_selector;
        }
        if update.preset_domain.is_some() {
            self.capture_config.preset_domain = update.preset_domain;
        }
        if update.preset_id.is_some() {
            self.capture_config.preset_id = update.preset_id;
        }

        reconcile(&self.rules, doc);

        if self.capture_armed() {
            let selector = self
                .capture_config
                .copy_selector
                .clone()
                .unwrap_or_default();
            debug!(
                "capture armed for `{selector}`, settling {SETTLE_DELAY_MS}ms"
            );
            self.pending_captures.push(PendingCapture {
                due_at: self.clock_ms + SETTLE_DELAY_MS,
                selector,
            });
        }
    }

    /// Capture is armed only when auto-copy is on and the preset's
    /// domain matches the page hostname; a stale preset from another
    /// domain never fires here.
    fn capture_armed(&self) -> bool {
        self.capture_config.auto_copy
            && self.capture_config.copy_selector.is_some()
            && self
                .capture_config
                .preset_domain
                .as_deref()
                .is_some_and(|domain| domain_matches(&self.hostname, domain))
    }

    fn run_capture(&mut self, doc: &mut Document, selector: &str) {
        match capture(doc, selector) {
            Ok(sanitized_html) => {
                info!("captured `{selector}` ({} bytes)", sanitized_html.len());
                self.store.store(Snapshot {
                    source_selector: selector.to_string(),
                    sanitized_html,
                    captured_at: self.clock_ms,
                });
            }
            Err(err) => {
                warn!("capture failed, previous snapshot retained: {err}");
            }
        }
    }

    fn favicon_reply(&mut self, doc: &Document) -> FaviconReply {
        let href = Selector::parse("link[rel~=icon]")
            .ok()
            .and_then(|sel| sel.query_first(doc, doc.root()))
            .and_then(|link| doc.attr(link, "href").map(str::to_string));

        let fav_icon_data = match href {
            None => {
                debug!("page declares no icon");
                None
            }
            Some(href) => {
                let url = resolve_href(&self.page_url, &href);
                match self.fetcher.fetch(&url) {
                    Ok((bytes, mime)) => Some(data_uri(&bytes, &mime)),
                    Err(err) => {
                        warn!("favicon fetch failed: {err}");
                        None
                    }
                }
            }
        };

        FaviconReply {
            fav_icon_data,
            domain: self.hostname.clone(),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors (used by hosts and tests)
    // -------------------------------------------------------------------------

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn capture_config(&self) -> &CaptureConfig {
        &self.capture_config
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.store.get()
    }

    pub fn overlay_state(&self) -> &OverlayState {
        self.overlay.state()
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    pub fn pending_capture_count(&self) -> usize {
        self.pending_captures.len()
    }
}

/// Exact hostname match, or a dot-boundary suffix match so
/// `news.example.com` matches a preset for `example.com`.
pub fn domain_matches(hostname: &str, domain: &str) -> bool {
    if hostname.is_empty() || domain.is_empty() {
        return false;
    }
    hostname == domain || hostname.ends_with(&format!(".{domain}"))
}

/// Extract the host from a URL, skipping userinfo and stopping at the
/// first path/port/query/fragment boundary.
pub fn host_of(url: &str) -> Option<&str> {
    let after_scheme = url.split_once("://")?.1;
    let authority_end = after_scheme
        .find(|c| matches!(c, '/' | '?' | '#'))
        .unwrap_or(after_scheme.len());
    let authority = &after_scheme[..authority_end];
    let host_start = authority.rfind('@').map(|i| i + 1).unwrap_or(0);
    let host = &authority[host_start..];
    let host = host.split(':').next().unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Resolve a favicon href against the page URL. Covers the shapes link
/// tags actually use: absolute, scheme-relative, root-relative, and
/// path-relative hrefs.
pub fn resolve_href(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") || href.starts_with("data:") {
        return href.to_string();
    }
    let scheme = base.split("://").next().unwrap_or("https");
    if let Some(rest) = href.strip_prefix("//") {
        return format!("{scheme}://{rest}");
    }

    let origin = match host_of(base) {
        Some(host) => format!("{scheme}://{host}"),
        None => return href.to_string(),
    };
    if let Some(rest) = href.strip_prefix('/') {
        return format!("{origin}/{rest}");
    }

    // Path-relative: resolve against the base path's directory.
    let path = base
        .split_once("://")
        .map(|(_, rest)| rest)
        .and_then(|rest| rest.find('/').map(|i| &rest[i..]))
        .unwrap_or("/");
    let path = path.split(['?', '#']).next().unwrap_or("/");
    let dir = match path.rfind('/') {
        Some(i) => &path[..i + 1],
        None => "/",
    };
    format!("{origin}{dir}{href}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://example.com/a/b"), Some("example.com"));
        assert_eq!(host_of("https://example.com:8080/x"), Some("example.com"));
        assert_eq!(host_of("http://user:pw@example.com/"), Some("example.com"));
        assert_eq!(host_of("https://sub.example.com"), Some("sub.example.com"));
        assert_eq!(host_of("not a url"), None);
    }

    #[test]
    fn test_domain_matches() {
        assert!(domain_matches("example.com", "example.com"));
        assert!(domain_matches("news.example.com", "example.com"));
        assert!(!domain_matches("example.com", "news.example.com"));
        assert!(!domain_matches("badexample.com", "example.com"));
        assert!(!domain_matches("", "example.com"));
    }

    #[test]
    fn test_resolve_href() {
        let base = "https://example.com/articles/story?x=1";
        assert_eq!(
            resolve_href(base, "https://cdn.example.com/i.png"),
            "https://cdn.example.com/i.png"
        );
        assert_eq!(
            resolve_href(base, "//cdn.example.com/i.png"),
            "https://cdn.example.com/i.png"
        );
        assert_eq!(
            resolve_href(base, "/favicon.ico"),
            "https://example.com/favicon.ico"
        );
        assert_eq!(
            resolve_href(base, "icon.png"),
            "https://example.com/articles/icon.png"
        );
        assert_eq!(
            resolve_href("https://example.com", "icon.png"),
            "https://example.com/icon.png"
        );
    }
}
