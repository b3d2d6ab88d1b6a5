//! Declutter Core Library
//!
//! This crate provides the content-script engine for the Declutter
//! extension: a declarative element-removal engine that keeps a live,
//! mutating document conformant to a replaceable rule set, plus a
//! one-shot sanitized-snapshot capture rendered behind an overlay.
//!
//! # Architecture
//!
//! The engine is reactive: there is no scheduler. A mutation journal on
//! the document is the only trigger, and `reconcile` is idempotent so
//! repeated uncoordinated invocations are always safe.
//!
//! # Modules
//!
//! - `dom`: arena-based document model, HTML parser and serializer
//! - `selector`: CSS selector subset parser and matcher
//! - `rules`: removal rules and the wholesale-replaceable rule set
//! - `reconcile`: the removal pass and its diagnostic report
//! - `sanitize`: deep-clone snapshot sanitizer
//! - `snapshot`: single-slot snapshot store
//! - `overlay`: overlay controller state machine
//! - `observe`: mutation-journal change observer
//! - `bridge`: message contract with the settings UI, favicon fetching
//! - `engine`: the content script wiring it all together

pub mod dom;
pub mod selector;
pub mod rules;
pub mod reconcile;
pub mod sanitize;
pub mod snapshot;
pub mod overlay;
pub mod observe;
pub mod bridge;
pub mod engine;

// Re-export commonly used types
pub use dom::{Document, NodeId};
pub use selector::{Selector, SelectorError};
pub use rules::{Cardinality, RemovalRule, RuleSet};
pub use reconcile::{reconcile, RemovalReport};
pub use sanitize::{sanitize, CaptureError};
pub use snapshot::{Snapshot, SnapshotStore};
pub use overlay::{OverlayController, OverlayState};
pub use observe::ChangeObserver;
pub use bridge::{Bridge, ChannelBridge, Message, UnavailableBridge};
pub use engine::ContentScript;
