//! Bridge message contract and transport seams.
//!
//! The settings UI talks to the content script over an opaque
//! asynchronous message channel. This module pins the wire shapes
//! (field names match the extension's storage/runtime messages
//! exactly) and abstracts the transport behind the `Bridge` trait so
//! the engine runs identically in the extension, in tests, and (as
//! designed no-op degradation) outside any extension context.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::rules::RemovalRule;

/// Payload shared by both rule-update message kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleUpdate {
    #[serde(rename = "removalTargets")]
    pub removal_targets: Vec<RemovalRule>,
    #[serde(rename = "presetId", default, skip_serializing_if = "Option::is_none")]
    pub preset_id: Option<String>,
    #[serde(rename = "autoCopy", default, skip_serializing_if = "Option::is_none")]
    pub auto_copy: Option<bool>,
    #[serde(rename = "copySelector", default, skip_serializing_if = "Option::is_none")]
    pub copy_selector: Option<String>,
    #[serde(rename = "presetDomain", default, skip_serializing_if = "Option::is_none")]
    pub preset_domain: Option<String>,
}

/// Inbound messages. The two update kinds carry identical payloads;
/// the legacy flat mode and the preset mode are unified over one rule
/// set, and whichever message arrived last wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "updateRemovalTargets")]
    UpdateRemovalTargets(RuleUpdate),
    #[serde(rename = "updatePresetRemovalTargets")]
    UpdatePresetRemovalTargets(RuleUpdate),
    #[serde(rename = "getFavicon")]
    GetFavicon,
    #[serde(rename = "showSnapshot")]
    ShowSnapshot,
    #[serde(rename = "hideSnapshot")]
    HideSnapshot,
}

/// Response to `getFavicon`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaviconReply {
    /// Base64 data URI of the page icon, or `None` if none could be
    /// fetched. A failed fetch still answers; the caller is never left
    /// hanging.
    #[serde(rename = "favIconData")]
    pub fav_icon_data: Option<String>,
    pub domain: String,
}

/// Favicon retrieval failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("page declares no icon")]
    NoIcon,
    #[error("favicon request failed: {0}")]
    Request(String),
}

/// Fetches raw icon bytes. The engine stays transport-agnostic; the
/// extension wires this to `fetch`, the CLI to an HTTP client.
pub trait FaviconFetcher {
    /// Returns the icon bytes and their MIME type.
    fn fetch(&self, url: &str) -> Result<(Vec<u8>, String), FetchError>;
}

/// Fetcher for contexts with no network access; every fetch fails and
/// the favicon reply degrades to `favIconData: null`.
pub struct NullFetcher;

impl FaviconFetcher for NullFetcher {
    fn fetch(&self, _url: &str) -> Result<(Vec<u8>, String), FetchError> {
        Err(FetchError::Request("no fetcher configured".to_string()))
    }
}

/// Encode icon bytes as a base64 data URI.
pub fn data_uri(bytes: &[u8], mime: &str) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(bytes))
}

/// The transport seam. Single-threaded, poll-driven: the engine drains
/// inbound messages during `pump` and pushes replies back out.
pub trait Bridge {
    fn poll(&mut self) -> Option<Message>;
    fn respond(&mut self, reply: FaviconReply);
    fn is_available(&self) -> bool {
        true
    }
}

#[derive(Debug, Default)]
struct ChannelShared {
    incoming: VecDeque<Message>,
    replies: Vec<FaviconReply>,
}

/// Script-side endpoint of an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelBridge {
    shared: Rc<RefCell<ChannelShared>>,
}

/// UI-side endpoint: sends messages, collects replies.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    shared: Rc<RefCell<ChannelShared>>,
}

/// Create a connected bridge pair.
pub fn channel() -> (ChannelBridge, BridgeHandle) {
    let shared = Rc::new(RefCell::new(ChannelShared::default()));
    (
        ChannelBridge {
            shared: shared.clone(),
        },
        BridgeHandle { shared },
    )
}

impl Bridge for ChannelBridge {
    fn poll(&mut self) -> Option<Message> {
        self.shared.borrow_mut().incoming.pop_front()
    }

    fn respond(&mut self, reply: FaviconReply) {
        self.shared.borrow_mut().replies.push(reply);
    }
}

impl BridgeHandle {
    pub fn send(&self, message: Message) {
        self.shared.borrow_mut().incoming.push_back(message);
    }

    pub fn take_replies(&self) -> Vec<FaviconReply> {
        std::mem::take(&mut self.shared.borrow_mut().replies)
    }
}

/// The designed degradation for non-extension contexts (previews,
/// plain pages): no messages ever arrive, replies go nowhere, and the
/// engine stays inert instead of failing.
#[derive(Debug, Default)]
pub struct UnavailableBridge;

impl Bridge for UnavailableBridge {
    fn poll(&mut self) -> Option<Message> {
        None
    }

    fn respond(&mut self, _reply: FaviconReply) {
        debug!("dropping reply: bridge unavailable");
    }

    fn is_available(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Cardinality;

    #[test]
    fn test_update_message_wire_shape() {
        let json = r##"{
            "type": "updatePresetRemovalTargets",
            "presetId": "p1",
            "removalTargets": [
                {"selector": ".ad", "message": "ad removed", "multiple": true}
            ],
            "autoCopy": true,
            "copySelector": "#story",
            "presetDomain": "example.com"
        }"##;
        let message: Message = serde_json::from_str(json).unwrap();
        let Message::UpdatePresetRemovalTargets(update) = message else {
            panic!("wrong variant");
        };
        assert_eq!(update.preset_id.as_deref(), Some("p1"));
        assert_eq!(update.auto_copy, Some(true));
        assert_eq!(update.copy_selector.as_deref(), Some("#story"));
        assert_eq!(update.preset_domain.as_deref(), Some("example.com"));
        assert_eq!(update.removal_targets.len(), 1);
        assert_eq!(update.removal_targets[0].cardinality, Cardinality::All);
    }

    #[test]
    fn test_legacy_update_omits_preset_fields() {
        let json = r#"{"type":"updateRemovalTargets","removalTargets":[]}"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert!(matches!(message, Message::UpdateRemovalTargets(_)));
        assert_eq!(serde_json::to_string(&message).unwrap(), json);
    }

    #[test]
    fn test_get_favicon_message() {
        let message: Message = serde_json::from_str(r#"{"type":"getFavicon"}"#).unwrap();
        assert_eq!(message, Message::GetFavicon);
    }

    #[test]
    fn test_favicon_reply_shape() {
        let reply = FaviconReply {
            fav_icon_data: None,
            domain: "example.com".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&reply).unwrap(),
            r#"{"favIconData":null,"domain":"example.com"}"#
        );
    }

    #[test]
    fn test_data_uri() {
        assert_eq!(
            data_uri(b"abc", "image/png"),
            "data:image/png;base64,YWJj"
        );
    }

    #[test]
    fn test_channel_delivers_in_order() {
        let (mut bridge, handle) = channel();
        handle.send(Message::GetFavicon);
        handle.send(Message::ShowSnapshot);

        assert_eq!(bridge.poll(), Some(Message::GetFavicon));
        assert_eq!(bridge.poll(), Some(Message::ShowSnapshot));
        assert_eq!(bridge.poll(), None);

        bridge.respond(FaviconReply {
            fav_icon_data: None,
            domain: "d".to_string(),
        });
        assert_eq!(handle.take_replies().len(), 1);
        assert!(handle.take_replies().is_empty());
    }

    #[test]
    fn test_unavailable_bridge_is_inert() {
        let mut bridge = UnavailableBridge;
        assert!(!bridge.is_available());
        assert_eq!(bridge.poll(), None);
        bridge.respond(FaviconReply {
            fav_icon_data: None,
            domain: String::new(),
        });
    }
}
