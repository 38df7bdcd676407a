use kartvisning_shared::UrlState;
use wasm_bindgen::JsValue;

use crate::sync::SiteLocation;

/// Page origin and path plus the parameters found in its query and hash.
pub fn read() -> (SiteLocation, UrlState) {
    let Some(location) = web_sys::window().map(|w| w.location()) else {
        return (SiteLocation::default(), UrlState::default());
    };
    let site = SiteLocation {
        origin: location.origin().unwrap_or_default(),
        pathname: location.pathname().unwrap_or_else(|_| "/".to_string()),
    };
    let search = location.search().unwrap_or_default();
    let hash = location.hash().unwrap_or_default();
    (site, UrlState::parse(&search, &hash))
}

/// Rewrites the hash without adding a history entry. The query string is kept;
/// hash parameters take precedence when the page is reloaded.
pub fn replace_hash(query: &str) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let location = window.location();
    let path = format!(
        "{}{}#!?{query}",
        location.pathname().unwrap_or_default(),
        location.search().unwrap_or_default(),
    );
    if let Ok(history) = window.history()
        && let Err(e) = history.replace_state_with_url(&JsValue::NULL, "", Some(&path))
    {
        web_sys::console::warn_1(&format!("could not update location: {e:?}").into());
    }
}
