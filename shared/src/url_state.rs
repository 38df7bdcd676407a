use url::form_urlencoded;

/// Typed view over the page URL's query and hash parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UrlState {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub zoom: Option<f64>,
    pub project: Option<String>,
    pub layers: Option<String>,
    pub marker_lat: Option<f64>,
    pub marker_lon: Option<f64>,
    /// Selection parameter.
    pub p: Option<String>,
    pub show_selection: bool,
    /// Search text.
    pub sok: Option<String>,
    pub wms: Option<String>,
    pub epsg: Option<String>,
    pub drawing: Option<String>,
    pub add_layer: Option<String>,
}

/// `0`, `NaN` and unparsable values all count as absent.
fn number(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v != 0.0)
}

fn text(raw: &str) -> Option<String> {
    (!raw.is_empty()).then(|| raw.to_string())
}

fn strip_prefix(raw: &str) -> &str {
    raw.trim_start_matches(['?', '#', '!', '/'])
}

impl UrlState {
    /// Merge `search` and `hash`; hash pairs are applied last and win on conflict.
    pub fn parse(search: &str, hash: &str) -> Self {
        let mut state = Self::default();
        for source in [search, hash] {
            for (key, value) in form_urlencoded::parse(strip_prefix(source).as_bytes()) {
                state.assign(&key, &value);
            }
        }
        state
    }

    fn assign(&mut self, key: &str, value: &str) {
        match key {
            "lat" => self.lat = number(value),
            "lon" => self.lon = number(value),
            "zoom" => self.zoom = number(value),
            "markerLat" => self.marker_lat = number(value),
            "markerLon" => self.marker_lon = number(value),
            "project" => self.project = text(value),
            "layers" => self.layers = text(value),
            "p" => self.p = text(value),
            "showSelection" => self.show_selection = !value.is_empty(),
            "sok" => self.sok = text(value),
            "wms" => self.wms = text(value),
            "epsg" => self.epsg = text(value),
            "drawing" => self.drawing = text(value),
            "addLayer" => self.add_layer = text(value),
            _ => {}
        }
    }

    pub fn marker(&self) -> Option<(f64, f64)> {
        Some((self.marker_lon?, self.marker_lat?))
    }

    /// Record the live view so a reload lands on the same spot.
    pub fn set_view(&mut self, center: (f64, f64), zoom: f64) {
        self.lon = Some(center.0).filter(|v| v.is_finite() && *v != 0.0);
        self.lat = Some(center.1).filter(|v| v.is_finite() && *v != 0.0);
        self.zoom = Some(zoom).filter(|v| v.is_finite() && *v != 0.0);
    }

    /// Form-encoded pairs without a leading `?` or `#`.
    pub fn to_query(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        let numbers = [
            ("lat", self.lat),
            ("lon", self.lon),
            ("zoom", self.zoom),
            ("markerLat", self.marker_lat),
            ("markerLon", self.marker_lon),
        ];
        for (key, value) in numbers {
            if let Some(value) = value {
                out.append_pair(key, &value.to_string());
            }
        }
        let texts = [
            ("project", &self.project),
            ("layers", &self.layers),
            ("p", &self.p),
            ("sok", &self.sok),
            ("wms", &self.wms),
            ("epsg", &self.epsg),
            ("drawing", &self.drawing),
            ("addLayer", &self.add_layer),
        ];
        for (key, value) in texts {
            if let Some(value) = value {
                out.append_pair(key, value);
            }
        }
        if self.show_selection {
            out.append_pair("showSelection", "true");
        }
        out.finish()
    }
}

/// Appends an encoded query to a service URL that may already carry one.
pub fn join_query(base: &str, query: &str) -> String {
    let sep = match base.rfind('?') {
        Some(_) if base.ends_with('?') || base.ends_with('&') => "",
        Some(_) => "&",
        None => "?",
    };
    format!("{base}{sep}{query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_joins_onto_bare_and_open_urls() {
        assert_eq!(join_query("https://a.test/wms", "x=1"), "https://a.test/wms?x=1");
        assert_eq!(join_query("https://a.test/wms?", "x=1"), "https://a.test/wms?x=1");
        assert_eq!(join_query("https://a.test/wms?a=b&", "x=1"), "https://a.test/wms?a=b&x=1");
        assert_eq!(join_query("https://a.test/wms?a=b", "x=1"), "https://a.test/wms?a=b&x=1");
    }

    #[test]
    fn hash_overrides_query() {
        let state = UrlState::parse("?lat=10", "#lat=20");
        assert_eq!(state.lat, Some(20.0));
    }

    #[test]
    fn hash_merges_with_query() {
        let state = UrlState::parse("?project=norgeskart&zoom=4", "#!/?lon=213092&layers=topo");
        assert_eq!(state.project.as_deref(), Some("norgeskart"));
        assert_eq!(state.zoom, Some(4.0));
        assert_eq!(state.lon, Some(213_092.0));
        assert_eq!(state.layers.as_deref(), Some("topo"));
    }

    #[test]
    fn bad_numbers_are_absent() {
        let state = UrlState::parse("?lat=abc&lon=0&zoom=NaN&markerLat=inf", "");
        assert_eq!(state.lat, None);
        assert_eq!(state.lon, None);
        assert_eq!(state.zoom, None);
        assert_eq!(state.marker_lat, None);
    }

    #[test]
    fn decodes_text_and_flags() {
        let state = UrlState::parse("?sok=Bod%C3%B8+sentrum&showSelection=1&p=Seeiendom&addLayer=", "");
        assert_eq!(state.sok.as_deref(), Some("Bodø sentrum"));
        assert!(state.show_selection);
        assert_eq!(state.p.as_deref(), Some("Seeiendom"));
        assert_eq!(state.add_layer, None);
        assert!(!UrlState::parse("?showSelection=", "").show_selection);
    }

    #[test]
    fn marker_needs_both_coordinates() {
        assert_eq!(UrlState::parse("?markerLat=6635873", "").marker(), None);
        assert_eq!(
            UrlState::parse("?markerLat=6635873&markerLon=213092", "").marker(),
            Some((213_092.0, 6_635_873.0))
        );
    }

    #[test]
    fn parsing_is_idempotent() {
        let search = "?project=geovekst&lat=6635873.73&lon=213092.49&zoom=9&sok=x";
        let hash = "#epsg=EPSG:25833";
        assert_eq!(UrlState::parse(search, hash), UrlState::parse(search, hash));
    }

    #[test]
    fn query_reparses_to_same_state() {
        let state = UrlState::parse(
            "?project=geovekst&lat=6635873.73&lon=213092.49&zoom=9&sok=Bod%C3%B8&showSelection=true",
            "#epsg=EPSG:25833",
        );
        let written = state.to_query();
        assert_eq!(UrlState::parse("", &format!("#{written}")), state);
    }

    #[test]
    fn set_view_updates_position_only() {
        let mut state = UrlState::parse("?project=norgeskart&layers=topo", "");
        state.set_view((570_130.0, 7_032_664.0), 7.0);
        assert_eq!(state.lon, Some(570_130.0));
        assert_eq!(state.zoom, Some(7.0));
        assert_eq!(state.layers.as_deref(), Some("topo"));
    }
}
