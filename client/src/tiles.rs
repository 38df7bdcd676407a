#![cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]

use std::collections::HashMap;

use js_sys::Reflect;
use kartvisning_shared::{Extent, TileCoord, join_query};
use url::form_urlencoded;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::*;
use web_sys::HtmlImageElement;

use crate::surface::{WmsSource, WmtsSource};

/// Images kept around after they leave the view.
const MAX_CACHED_IMAGES: usize = 600;
const ONLOAD_HANDLE_KEY: &str = "__kartvisningOnload";
const ONERROR_HANDLE_KEY: &str = "__kartvisningOnerror";
/// Query key for the session token on protected services.
const TOKEN_PARAM: &str = "gkt";

/// KVP GetTile request for one grid cell.
pub fn wmts_tile_url(source: &WmtsSource, coord: TileCoord) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query
        .append_pair("SERVICE", "WMTS")
        .append_pair("REQUEST", "GetTile")
        .append_pair("VERSION", "1.0.0")
        .append_pair("LAYER", &source.layer)
        .append_pair("STYLE", "default")
        .append_pair("FORMAT", &source.format)
        .append_pair("TILEMATRIXSET", &source.matrix_set)
        .append_pair("TILEMATRIX", source.grid.matrix_id(coord.z))
        .append_pair("TILEROW", &coord.row.to_string())
        .append_pair("TILECOL", &coord.col.to_string());
    if let Some(token) = &source.token {
        query.append_pair(TOKEN_PARAM, token);
    }
    join_query(&source.url, &query.finish())
}

/// Single-image WMS 1.3.0 GetMap covering `extent` at `width`x`height` pixels.
pub fn wms_map_url(source: &WmsSource, extent: &Extent, width: u32, height: u32, crs: &str) -> String {
    let bbox = format!(
        "{},{},{},{}",
        extent.min_x, extent.min_y, extent.max_x, extent.max_y
    );
    let mut query = form_urlencoded::Serializer::new(String::new());
    query
        .append_pair("SERVICE", "WMS")
        .append_pair("VERSION", "1.3.0")
        .append_pair("REQUEST", "GetMap")
        .append_pair("LAYERS", &source.layers)
        .append_pair("STYLES", "")
        .append_pair("FORMAT", &source.format)
        .append_pair("TRANSPARENT", "TRUE")
        .append_pair("CRS", crs)
        .append_pair("BBOX", &bbox)
        .append_pair("WIDTH", &width.to_string())
        .append_pair("HEIGHT", &height.to_string());
    if let Some(token) = &source.token {
        query.append_pair(TOKEN_PARAM, token);
    }
    join_query(&source.url, &query.finish())
}

struct CachedImage {
    image: HtmlImageElement,
    last_used: u64,
}

/// Map images keyed by request URL.
///
/// A URL is requested once; failed loads stay in the cache as empty images so a
/// broken tile is not refetched every frame.
#[derive(Default)]
pub struct ImageCache {
    entries: HashMap<String, CachedImage>,
    frame: u64,
}

impl ImageCache {
    pub fn begin_frame(&mut self) {
        self.frame += 1;
    }

    /// The decoded image for `url`, starting a load on first sight.
    pub fn ready(&mut self, url: &str) -> Option<HtmlImageElement> {
        let frame = self.frame;
        if let Some(entry) = self.entries.get_mut(url) {
            entry.last_used = frame;
            let image = &entry.image;
            return (image.complete() && image.natural_width() > 0).then(|| image.clone());
        }
        let image = load_image(url)?;
        self.entries.insert(
            url.to_string(),
            CachedImage {
                image,
                last_used: frame,
            },
        );
        None
    }

    /// Drops the least recently drawn images beyond the cache size.
    pub fn prune(&mut self) {
        if self.entries.len() <= MAX_CACHED_IMAGES {
            return;
        }
        let mut ages: Vec<u64> = self.entries.values().map(|e| e.last_used).collect();
        ages.sort_unstable();
        let cutoff = ages[self.entries.len() - MAX_CACHED_IMAGES];
        self.entries.retain(|_, entry| {
            if entry.last_used >= cutoff {
                return true;
            }
            clear_image_handlers(&entry.image);
            false
        });
    }

    pub fn clear(&mut self) {
        for entry in self.entries.values() {
            clear_image_handlers(&entry.image);
        }
        self.entries.clear();
    }
}

fn load_image(src: &str) -> Option<HtmlImageElement> {
    let img = HtmlImageElement::new().ok()?;

    let img_for_load = img.clone();
    let onload = Closure::<dyn FnMut()>::new(move || {
        clear_image_handlers(&img_for_load);
        crate::canvas::request_redraw();
    });

    let img_for_error = img.clone();
    let onerror = Closure::<dyn FnMut()>::new(move || {
        clear_image_handlers(&img_for_error);
    });

    let onload_js = onload.into_js_value();
    let onerror_js = onerror.into_js_value();
    img.set_onload(Some(onload_js.unchecked_ref()));
    img.set_onerror(Some(onerror_js.unchecked_ref()));
    let _ = Reflect::set(
        img.as_ref(),
        &JsValue::from_str(ONLOAD_HANDLE_KEY),
        &onload_js,
    );
    let _ = Reflect::set(
        img.as_ref(),
        &JsValue::from_str(ONERROR_HANDLE_KEY),
        &onerror_js,
    );
    img.set_src(src);
    Some(img)
}

fn clear_image_handlers(img: &HtmlImageElement) {
    img.set_onload(None);
    img.set_onerror(None);
    let _ = Reflect::delete_property(img.as_ref(), &JsValue::from_str(ONLOAD_HANDLE_KEY));
    let _ = Reflect::delete_property(img.as_ref(), &JsValue::from_str(ONERROR_HANDLE_KEY));
}

#[cfg(test)]
mod tests {
    use super::*;
    use kartvisning_shared::{MatrixIds, ViewParameters};

    fn grid_source(token: Option<&str>) -> WmtsSource {
        let view = ViewParameters::build(
            "EPSG:25833",
            Extent::new(-2_500_000.0, 3_500_000.0, 3_045_984.0, 9_045_984.0),
            MatrixIds::Level,
        )
        .unwrap();
        WmtsSource {
            url: "https://cache.kartverket.no/v1/wmts/1.0.0/?".into(),
            layer: "topo".into(),
            format: "image/png".into(),
            matrix_set: "utm33n".into(),
            grid: view.with_matrix_ids(&MatrixIds::Level),
            token: token.map(str::to_string),
        }
    }

    #[test]
    fn get_tile_request_names_cell_and_matrix() {
        let url = wmts_tile_url(&grid_source(None), TileCoord { z: 5, col: 17, row: 9 });
        assert_eq!(
            url,
            "https://cache.kartverket.no/v1/wmts/1.0.0/?SERVICE=WMTS&REQUEST=GetTile&VERSION=1.0.0\
             &LAYER=topo&STYLE=default&FORMAT=image%2Fpng&TILEMATRIXSET=utm33n&TILEMATRIX=5\
             &TILEROW=9&TILECOL=17"
        );
    }

    #[test]
    fn token_is_appended_when_present() {
        let url = wmts_tile_url(&grid_source(Some("s3cr3t")), TileCoord { z: 0, col: 0, row: 0 });
        assert!(url.ends_with("&gkt=s3cr3t"));
    }

    #[test]
    fn get_map_request_covers_extent() {
        let source = WmsSource {
            url: "https://wms.example/ows?map=turer".into(),
            layers: "ruter,stier".into(),
            format: "image/png".into(),
            token: Some("t".into()),
        };
        let url = wms_map_url(
            &source,
            &Extent::new(100.0, 200.0, 300.5, 400.0),
            640,
            480,
            "EPSG:25833",
        );
        assert!(url.starts_with("https://wms.example/ows?map=turer&SERVICE=WMS&VERSION=1.3.0"));
        assert!(url.contains("&LAYERS=ruter%2Cstier&STYLES=&"));
        assert!(url.contains("&CRS=EPSG%3A25833&BBOX=100%2C200%2C300.5%2C400&WIDTH=640&HEIGHT=480"));
        assert!(url.ends_with("&gkt=t"));
    }
}
