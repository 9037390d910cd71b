//! Screen-reader announcements through an owned live region
//!
//! Create one `Announcer` at the root of the UI and pass it down. The live
//! region is removed from the document on `dispose()` or when the announcer is
//! dropped.

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlElement};

/// Inline styles that hide the region visually but keep it in the
/// accessibility tree
const VISUALLY_HIDDEN: [(&str, &str); 8] = [
    ("position", "absolute"),
    ("width", "1px"),
    ("height", "1px"),
    ("margin", "-1px"),
    ("padding", "0"),
    ("overflow", "hidden"),
    ("clip", "rect(0, 0, 0, 0)"),
    ("white-space", "nowrap"),
];

pub fn politeness(assertive: bool) -> &'static str {
    if assertive {
        "assertive"
    } else {
        "polite"
    }
}

#[wasm_bindgen]
pub struct Announcer {
    region: HtmlElement,
}

#[wasm_bindgen]
impl Announcer {
    /// Append a polite live region to `document.body`
    #[wasm_bindgen(constructor)]
    pub fn new(document: &Document) -> Result<Announcer, JsValue> {
        let region: HtmlElement = document.create_element("div")?.dyn_into()?;
        region.set_attribute("role", "status")?;
        region.set_attribute("aria-live", politeness(false))?;
        region.set_attribute("aria-atomic", "true")?;
        region.set_class_name("sr-only");

        let style = region.style();
        for (property, value) in VISUALLY_HIDDEN {
            style.set_property(property, value)?;
        }

        let body = document.body().ok_or("Document has no body")?;
        body.append_child(&region)?;

        Ok(Self { region })
    }

    /// Announce `message`, interrupting the reader when `assertive`
    #[wasm_bindgen]
    pub fn announce(&self, message: &str, assertive: bool) -> Result<(), JsValue> {
        self.region
            .set_attribute("aria-live", politeness(assertive))?;
        // an identical message is only re-read after the text changes
        self.region.set_text_content(None);
        self.region.set_text_content(Some(message));
        Ok(())
    }

    /// Remove the live region from the document
    #[wasm_bindgen]
    pub fn dispose(&self) {
        self.region.remove();
    }
}

impl Drop for Announcer {
    fn drop(&mut self) {
        self.region.remove();
    }
}


#[cfg(test)]
#[cfg(target_arch = "wasm32")]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn document() -> Document {
        web_sys::window().unwrap().document().unwrap()
    }

    #[wasm_bindgen_test]
    fn test_announce_sets_text_and_politeness() {
        let announcer = Announcer::new(&document()).unwrap();
        announcer.announce("Form submitted", true).unwrap();

        assert_eq!(
            announcer.region.text_content().as_deref(),
            Some("Form submitted")
        );
        assert_eq!(
            announcer.region.get_attribute("aria-live").as_deref(),
            Some("assertive")
        );
    }

    #[wasm_bindgen_test]
    fn test_dispose_removes_region() {
        let doc = document();
        let announcer = Announcer::new(&doc).unwrap();
        assert!(announcer.region.is_connected());

        announcer.dispose();
        assert!(!announcer.region.is_connected());
    }
}
