use js_sys::Reflect;
use kartvisning_shared::GeoPoint;
use leptos::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::app::{ViewReadout, dispatch};
use crate::sync::SyncEvent;

/// `None` when the browser has no geolocation API at all.
fn geolocation() -> Option<web_sys::Geolocation> {
    let navigator = web_sys::window()?.navigator();
    if !Reflect::has(&navigator, &JsValue::from_str("geolocation")).unwrap_or(false) {
        return None;
    }
    navigator.geolocation().ok()
}

fn center_on(coords: &web_sys::Coordinates) -> SyncEvent {
    SyncEvent::CenterRequested(GeoPoint::etrs89(coords.longitude(), coords.latitude()))
}

fn locate(geolocation: &web_sys::Geolocation) {
    let on_position = Closure::once_into_js(move |position: web_sys::Position| {
        dispatch(center_on(&position.coords()));
    });
    // Denied or unavailable position is not an application error.
    let on_error = Closure::once_into_js(move |err: web_sys::PositionError| {
        web_sys::console::warn_1(&format!("geolocation failed: {}", err.message()).into());
    });
    if let Err(e) = geolocation.get_current_position_with_error_callback(
        on_position.unchecked_ref(),
        Some(on_error.unchecked_ref()),
    ) {
        web_sys::console::warn_1(&format!("geolocation unavailable: {e:?}").into());
    }
}

fn format_readout(center: (f64, f64), zoom: f64) -> String {
    format!("Ø {:.0}  N {:.0}  zoom {:.1}", center.0, center.1, zoom)
}

/// Live position readout and the "my position" button.
#[component]
pub fn PositionPanel() -> impl IntoView {
    let ViewReadout(readout) = expect_context();
    let has_geolocation = geolocation().is_some();

    view! {
        <div
            class="position-panel"
            style="position: absolute; left: 12px; bottom: 12px; z-index: 5; display: flex; gap: 8px; align-items: center; padding: 4px 8px; background: rgba(255,255,255,0.92); border-radius: 4px; font-family: ui-monospace, monospace; font-size: 0.75rem; color: #1f2933;"
        >
            <span>{move || readout.get().map(|(center, zoom)| format_readout(center, zoom)).unwrap_or_default()}</span>
            {has_geolocation.then(|| view! {
                <button
                    title="Min posisjon"
                    style="border: 1px solid #c9ced6; background: #ffffff; border-radius: 4px; cursor: pointer; font-size: 0.75rem;"
                    on:click=move |_| {
                        if let Some(geolocation) = geolocation() {
                            locate(&geolocation);
                        }
                    }
                >
                    "Min posisjon"
                </button>
            })}
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readout_rounds_coordinates() {
        assert_eq!(
            format_readout((570_130.4, 7_032_664.6), 4.3),
            "Ø 570130  N 7032665  zoom 4.3"
        );
    }
}
