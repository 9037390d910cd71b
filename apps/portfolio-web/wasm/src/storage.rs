//! `window.localStorage` backend for the metric store

use vitals_core::{KeyValueStorage, Result, VitalsError};
use wasm_bindgen::JsValue;

pub struct BrowserStorage {
    storage: web_sys::Storage,
}

impl BrowserStorage {
    /// Local storage for the current window
    ///
    /// `None` when there is no window or storage is disabled (private mode,
    /// sandboxed iframes).
    pub fn local() -> Option<Self> {
        let window = web_sys::window()?;
        match window.local_storage() {
            Ok(Some(storage)) => Some(Self { storage }),
            Ok(None) => None,
            Err(e) => {
                web_sys::console::warn_1(
                    &format!("localStorage unavailable: {}", describe(&e)).into(),
                );
                None
            }
        }
    }
}

impl KeyValueStorage for BrowserStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.storage.get_item(key).map_err(storage_error)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.storage.set_item(key, value).map_err(storage_error)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.storage.remove_item(key).map_err(storage_error)
    }
}

fn storage_error(e: JsValue) -> VitalsError {
    VitalsError::Storage(describe(&e))
}

/// Best-effort text for a thrown JS value (QuotaExceededError and friends)
pub(crate) fn describe(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            js_sys::Reflect::get(value, &"message".into())
                .ok()
                .and_then(|m| m.as_string())
        })
        .unwrap_or_else(|| format!("{:?}", value))
}
