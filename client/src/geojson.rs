use serde::Deserialize;

type Position = Vec<f64>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Document {
    FeatureCollection { features: Vec<Feature> },
    Feature { geometry: Option<Geometry> },
}

/// Drawable primitive in projected map coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Point((f64, f64)),
    Line(Vec<(f64, f64)>),
    /// Outer ring first, then holes.
    Polygon(Vec<Vec<(f64, f64)>>),
}

/// Flattens a GeoJSON feature or feature collection into shapes. Coordinates are
/// taken as-is: overlays are published in the map projection.
pub fn parse_shapes(raw: &str) -> Result<Vec<Shape>, serde_json::Error> {
    let geometries: Vec<Geometry> = match serde_json::from_str(raw)? {
        Document::FeatureCollection { features } => {
            features.into_iter().filter_map(|f| f.geometry).collect()
        }
        Document::Feature { geometry } => geometry.into_iter().collect(),
    };
    let mut shapes = Vec::new();
    for geometry in geometries {
        flatten(geometry, &mut shapes);
    }
    Ok(shapes)
}

fn point(position: &[f64]) -> Option<(f64, f64)> {
    match position {
        [x, y, ..] => Some((*x, *y)),
        _ => None,
    }
}

fn path(positions: &[Position]) -> Vec<(f64, f64)> {
    positions.iter().filter_map(|p| point(p)).collect()
}

fn flatten(geometry: Geometry, out: &mut Vec<Shape>) {
    match geometry {
        Geometry::Point { coordinates } => out.extend(point(&coordinates).map(Shape::Point)),
        Geometry::MultiPoint { coordinates } => {
            out.extend(coordinates.iter().filter_map(|p| point(p)).map(Shape::Point))
        }
        Geometry::LineString { coordinates } => out.push(Shape::Line(path(&coordinates))),
        Geometry::MultiLineString { coordinates } => {
            out.extend(coordinates.iter().map(|line| Shape::Line(path(line))))
        }
        Geometry::Polygon { coordinates } => {
            out.push(Shape::Polygon(coordinates.iter().map(|r| path(r)).collect()))
        }
        Geometry::MultiPolygon { coordinates } => out.extend(
            coordinates
                .iter()
                .map(|rings| Shape::Polygon(rings.iter().map(|r| path(r)).collect())),
        ),
        Geometry::GeometryCollection { geometries } => {
            for inner in geometries {
                flatten(inner, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_is_flattened_in_order() {
        let shapes = parse_shapes(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{},"geometry":{"type":"Point","coordinates":[1,2,30]}},
                {"type":"Feature","properties":null,"geometry":null},
                {"type":"Feature","geometry":{"type":"MultiLineString","coordinates":[[[0,0],[1,1]],[[2,2],[3,3]]]}},
                {"type":"Feature","geometry":{"type":"Polygon","coordinates":[[[0,0],[4,0],[4,4],[0,0]],[[1,1],[2,1],[1,2],[1,1]]]}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(shapes.len(), 4);
        assert_eq!(shapes[0], Shape::Point((1.0, 2.0)));
        assert_eq!(shapes[2], Shape::Line(vec![(2.0, 2.0), (3.0, 3.0)]));
        let Shape::Polygon(rings) = &shapes[3] else {
            panic!("expected polygon");
        };
        assert_eq!(rings.len(), 2);
    }

    #[test]
    fn single_feature_and_collections_nest() {
        let shapes = parse_shapes(
            r#"{"type":"Feature","geometry":{"type":"GeometryCollection","geometries":[
                {"type":"MultiPoint","coordinates":[[5,6],[7]]},
                {"type":"MultiPolygon","coordinates":[[[[0,0],[1,0],[0,1],[0,0]]]]}
            ]}}"#,
        )
        .unwrap();
        // The one-element position is dropped.
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0], Shape::Point((5.0, 6.0)));
    }

    #[test]
    fn non_geojson_is_an_error() {
        assert!(parse_shapes(r#"{"type":"Topology"}"#).is_err());
        assert!(parse_shapes("not json").is_err());
    }
}
