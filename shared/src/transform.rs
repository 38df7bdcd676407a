use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::url_state::join_query;
use crate::view::numeric_epsg;

/// A coordinate in some reference system, as requested by a panel or the URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
    pub epsg: String,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64, epsg: impl Into<String>) -> Self {
        Self {
            lon,
            lat,
            epsg: epsg.into(),
        }
    }

    /// ETRS89 geographic, what the browser geolocation API reports in practice.
    pub fn etrs89(lon: f64, lat: f64) -> Self {
        Self::new(lon, lat, "EPSG:4258")
    }
}

/// Response body of the transform service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformedCoordinate {
    pub x: f64,
    pub y: f64,
}

/// `{base}?x={lon}&y={lat}&fra={source}&til={target}` with bare numeric EPSG codes.
pub fn koordtrans_url(base: &str, point: &GeoPoint, target_code: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("x", &point.lon.to_string())
        .append_pair("y", &point.lat.to_string())
        .append_pair("fra", numeric_epsg(&point.epsg))
        .append_pair("til", numeric_epsg(target_code))
        .finish();
    join_query(base, &query)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://ws.geonorge.no/transformering/v1/transformer";

    #[test]
    fn builds_transform_url_with_numeric_codes() {
        let url = koordtrans_url(BASE, &GeoPoint::etrs89(10.75, 59.91), "EPSG:25833");
        assert_eq!(url, format!("{BASE}?x=10.75&y=59.91&fra=4258&til=25833"));
    }

    #[test]
    fn appends_to_existing_query() {
        let url = koordtrans_url(
            "https://example.test/t?key=1",
            &GeoPoint::new(1.0, 2.0, "4326"),
            "3857",
        );
        assert_eq!(url, "https://example.test/t?key=1&x=1&y=2&fra=4326&til=3857");
    }

    #[test]
    fn reuses_open_query_and_encodes_values() {
        let url = koordtrans_url(
            "https://example.test/t?",
            &GeoPoint::new(-0.5, 1e-7, "EPSG:4258"),
            "EPSG:25833",
        );
        assert_eq!(url, "https://example.test/t?x=-0.5&y=0.0000001&fra=4258&til=25833");
    }

    #[test]
    fn parses_transform_response() {
        let coord: TransformedCoordinate =
            serde_json::from_str(r#"{"x": 262014.6, "y": 6649458.2, "z": 0}"#).unwrap();
        assert_eq!(coord.x, 262_014.6);
        assert_eq!(coord.y, 6_649_458.2);
    }
}
