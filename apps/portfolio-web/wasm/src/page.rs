//! Ambient page context read from `window.location` and `navigator`

use vitals_core::PageContext;

/// Snapshot of the current page, empty outside a browser window
pub fn current() -> PageContext {
    let Some(window) = web_sys::window() else {
        return PageContext::default();
    };

    let location = window.location();
    PageContext {
        path: location.pathname().ok(),
        href: location.href().ok(),
        user_agent: window.navigator().user_agent().ok(),
    }
}
