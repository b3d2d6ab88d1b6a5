//! WebAssembly bindings for Declutter
//!
//! Two surfaces: stateless helpers (apply a rule file to markup,
//! sanitize a capture, validate a selector, resolve a favicon href)
//! and a stateful engine instance driven by the extension's message
//! bridge. Wasm runs single-threaded, so the engine lives in a
//! thread-local slot.

use std::cell::RefCell;

use wasm_bindgen::prelude::*;

use dc_core::bridge::{channel, BridgeHandle, Message, NullFetcher};
use dc_core::rules::RuleSet;
use dc_core::sanitize::capture;
use dc_core::engine::resolve_href;
use dc_core::{reconcile, ContentScript, Document, Selector};

struct EngineHost {
    doc: Document,
    script: ContentScript,
    handle: BridgeHandle,
}

thread_local! {
    static ENGINE: RefCell<Option<EngineHost>> = const { RefCell::new(None) };
}

/// Initialize the engine against the current page markup.
#[wasm_bindgen]
pub fn engine_init(page_html: &str, page_url: &str) {
    let (bridge, handle) = channel();
    let mut doc = Document::parse(page_html);
    let mut script = ContentScript::new(Box::new(bridge), Box::new(NullFetcher), page_url);
    script.boot(&mut doc);
    ENGINE.with(|slot| {
        *slot.borrow_mut() = Some(EngineHost {
            doc,
            script,
            handle,
        });
    });
}

#[wasm_bindgen]
pub fn engine_is_initialized() -> bool {
    ENGINE.with(|slot| slot.borrow().is_some())
}

/// Deliver one bridge message (JSON) and pump to quiescence. Returns
/// any replies as a JSON array.
#[wasm_bindgen]
pub fn engine_message(message_json: &str) -> Result<String, JsValue> {
    let message: Message = serde_json::from_str(message_json)
        .map_err(|e| JsValue::from_str(&format!("bad message: {e}")))?;
    ENGINE.with(|slot| {
        let mut slot = slot.borrow_mut();
        let host = slot
            .as_mut()
            .ok_or_else(|| JsValue::from_str("engine not initialized"))?;
        host.handle.send(message);
        host.script.pump(&mut host.doc);
        serde_json::to_string(&host.handle.take_replies())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    })
}

/// Advance the engine's logical clock (fires settled captures).
#[wasm_bindgen]
pub fn engine_tick(ms: u32) {
    ENGINE.with(|slot| {
        if let Some(host) = slot.borrow_mut().as_mut() {
            host.script.advance(&mut host.doc, u64::from(ms));
        }
    });
}

/// Serialized markup of the engine's current document.
#[wasm_bindgen]
pub fn engine_html() -> Option<String> {
    ENGINE.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|host| host.doc.inner_html(host.doc.root()))
    })
}

/// The stored snapshot's sanitized markup, if a capture has fired.
#[wasm_bindgen]
pub fn engine_snapshot_html() -> Option<String> {
    ENGINE.with(|slot| {
        slot.borrow()
            .as_ref()
            .and_then(|host| host.script.snapshot().map(|s| s.sanitized_html.clone()))
    })
}

/// Apply a rule file (JSON array) to markup. Returns an object with
/// the cleaned markup and per-rule diagnostics.
#[wasm_bindgen]
pub fn apply_rules(html: &str, rules_json: &str) -> Result<JsValue, JsValue> {
    let rules: RuleSet = serde_json::from_str(rules_json)
        .map_err(|e| JsValue::from_str(&format!("bad rule file: {e}")))?;

    let mut doc = Document::parse(html);
    let report = reconcile(&rules, &mut doc);

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(
        &result,
        &"html".into(),
        &JsValue::from_str(&doc.inner_html(doc.root())),
    );
    let _ = js_sys::Reflect::set(
        &result,
        &"removed".into(),
        &JsValue::from(report.removed_total() as u32),
    );
    let _ = js_sys::Reflect::set(
        &result,
        &"skipped".into(),
        &JsValue::from(report.errors.len() as u32),
    );

    let hits = js_sys::Array::new();
    for hit in &report.hits {
        let entry = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&entry, &"label".into(), &JsValue::from_str(&hit.label));
        let _ = js_sys::Reflect::set(&entry, &"count".into(), &JsValue::from(hit.count as u32));
        hits.push(&entry);
    }
    let _ = js_sys::Reflect::set(&result, &"hits".into(), &hits);

    Ok(result.into())
}

/// Sanitize the first element matching `selector` in `html`.
#[wasm_bindgen]
pub fn sanitize_capture(html: &str, selector: &str) -> Result<String, JsValue> {
    let mut doc = Document::parse(html);
    capture(&mut doc, selector).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Validate a selector against the engine's supported subset.
#[wasm_bindgen]
pub fn check_selector(selector: &str) -> JsValue {
    let result = js_sys::Object::new();
    match Selector::parse(selector) {
        Ok(_) => {
            let _ = js_sys::Reflect::set(&result, &"valid".into(), &JsValue::from(true));
        }
        Err(e) => {
            let _ = js_sys::Reflect::set(&result, &"valid".into(), &JsValue::from(false));
            let _ = js_sys::Reflect::set(&result, &"error".into(), &JsValue::from_str(&e.to_string()));
        }
    }
    result.into()
}

/// Resolve the page's declared icon href to an absolute URL for the
/// host side to fetch.
#[wasm_bindgen]
pub fn favicon_url(html: &str, page_url: &str) -> Option<String> {
    let doc = Document::parse(html);
    let href = Selector::parse("link[rel~=icon]")
        .ok()
        .and_then(|sel| sel.query_first(&doc, doc.root()))
        .and_then(|link| doc.attr(link, "href").map(str::to_string))?;
    Some(resolve_href(page_url, &href))
}
