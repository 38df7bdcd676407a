use serde::{Deserialize, Serialize};

use crate::error::MapError;

/// Number of zoom levels in every resolution ladder (levels 0..=20).
pub const ZOOM_LEVELS: usize = 21;
pub const TILE_SIZE: f64 = 256.0;

/// Axis-aligned bounding box `(min_x, min_y, max_x, max_y)` in projection units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Parse the descriptor form `"minX,minY,maxX,maxY"`.
    pub fn parse(raw: &str) -> Result<Self, MapError> {
        let values: Vec<f64> = raw
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| MapError::InvalidExtent(raw.to_string()))?;
        match values.as_slice() {
            [min_x, min_y, max_x, max_y] if values.iter().all(|v| v.is_finite()) => {
                Ok(Self::new(*min_x, *min_y, *max_x, *max_y))
            }
            _ => Err(MapError::InvalidExtent(raw.to_string())),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn top_left(&self) -> (f64, f64) {
        (self.min_x, self.max_y)
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn intersects(&self, other: &Extent) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub code: String,
    pub extent: Extent,
}

impl Projection {
    /// Numeric part of the code, e.g. `"25833"` for `"EPSG:25833"`.
    pub fn numeric_code(&self) -> &str {
        numeric_epsg(&self.code)
    }
}

pub fn numeric_epsg(code: &str) -> &str {
    code.rsplit(':').next().unwrap_or(code)
}

/// How tile matrix identifiers are spelled for a tile source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixIds {
    /// Bare zoom level: `"0"`, `"1"`, ...
    Level,
    /// Matrix set prefix: `"EPSG:25833:0"`, ...
    Prefixed(String),
}

impl MatrixIds {
    /// GeoWebCache style sets named after an EPSG code prefix their ids; others use bare levels.
    pub fn for_matrix_set(matrix_set: &str) -> Self {
        if matrix_set.starts_with("EPSG:") {
            Self::Prefixed(matrix_set.to_string())
        } else {
            Self::Level
        }
    }

    pub fn id_for(&self, level: usize) -> String {
        match self {
            Self::Level => level.to_string(),
            Self::Prefixed(prefix) => format!("{prefix}:{level}"),
        }
    }
}

/// Resolution ladder for `extent`: entry `z` is `(width / 256) / 2^z`.
pub fn resolution_ladder(code: &str, extent: &Extent) -> Result<Vec<f64>, MapError> {
    let width = extent.width();
    if !width.is_finite() || width <= 0.0 {
        return Err(MapError::DegenerateExtent {
            code: code.to_string(),
            width,
        });
    }
    let base = width / TILE_SIZE;
    Ok((0..ZOOM_LEVELS)
        .map(|z| base / 2f64.powi(z as i32))
        .collect())
}

/// Projection, resolutions and tile grid derived for one project.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewParameters {
    pub projection: Projection,
    pub grid: TileGrid,
}

impl ViewParameters {
    pub fn build(code: &str, extent: Extent, ids: MatrixIds) -> Result<Self, MapError> {
        let resolutions = resolution_ladder(code, &extent)?;
        let matrix_ids = (0..ZOOM_LEVELS).map(|z| ids.id_for(z)).collect();
        Ok(Self {
            projection: Projection {
                code: code.to_string(),
                extent,
            },
            grid: TileGrid {
                origin: extent.top_left(),
                extent,
                resolutions,
                matrix_ids,
            },
        })
    }

    pub fn resolutions(&self) -> &[f64] {
        &self.grid.resolutions
    }

    pub fn matrix_ids(&self) -> &[String] {
        &self.grid.matrix_ids
    }

    /// Same projection and resolutions with a different matrix id spelling.
    pub fn with_matrix_ids(&self, ids: &MatrixIds) -> TileGrid {
        TileGrid {
            matrix_ids: (0..ZOOM_LEVELS).map(|z| ids.id_for(z)).collect(),
            ..self.grid.clone()
        }
    }
}

/// Address of one tile in a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub z: u8,
    pub col: i64,
    pub row: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    pub origin: (f64, f64),
    pub extent: Extent,
    pub resolutions: Vec<f64>,
    pub matrix_ids: Vec<String>,
}

impl TileGrid {
    pub fn max_zoom(&self) -> u8 {
        self.resolutions.len().saturating_sub(1) as u8
    }

    pub fn resolution(&self, z: u8) -> f64 {
        let idx = (z as usize).min(self.resolutions.len().saturating_sub(1));
        self.resolutions[idx]
    }

    /// Width of one tile at level `z` in projection units.
    pub fn tile_span(&self, z: u8) -> f64 {
        self.resolution(z) * TILE_SIZE
    }

    /// Tile containing the point. Rows grow downward from the origin.
    pub fn tile_at(&self, x: f64, y: f64, z: u8) -> TileCoord {
        let span = self.tile_span(z);
        TileCoord {
            z,
            col: ((x - self.origin.0) / span).floor() as i64,
            row: ((self.origin.1 - y) / span).floor() as i64,
        }
    }

    pub fn tile_extent(&self, coord: TileCoord) -> Extent {
        let span = self.tile_span(coord.z);
        let min_x = self.origin.0 + coord.col as f64 * span;
        let max_y = self.origin.1 - coord.row as f64 * span;
        Extent::new(min_x, max_y - span, min_x + span, max_y)
    }

    /// Tiles covering `view` at level `z`, clipped to the grid extent.
    pub fn tiles_in(&self, view: &Extent, z: u8) -> Vec<TileCoord> {
        let Some(clipped) = clip(view, &self.extent) else {
            return Vec::new();
        };
        let span = self.tile_span(z);
        let first = self.tile_at(clipped.min_x, clipped.max_y, z);
        // Far edges are exclusive: a view ending exactly on a tile border stops there.
        let last_col = ((clipped.max_x - self.origin.0) / span).ceil() as i64 - 1;
        let last_row = ((self.origin.1 - clipped.min_y) / span).ceil() as i64 - 1;
        let mut tiles = Vec::new();
        for row in first.row..=last_row {
            for col in first.col..=last_col {
                tiles.push(TileCoord { z, col, row });
            }
        }
        tiles
    }

    pub fn matrix_id(&self, z: u8) -> &str {
        let idx = (z as usize).min(self.matrix_ids.len().saturating_sub(1));
        &self.matrix_ids[idx]
    }

    /// Closest zoom level whose resolution does not exceed `resolution`.
    pub fn zoom_for_resolution(&self, resolution: f64) -> u8 {
        self.resolutions
            .iter()
            .position(|r| *r <= resolution * (1.0 + 1e-9))
            .unwrap_or(self.resolutions.len().saturating_sub(1)) as u8
    }
}

fn clip(a: &Extent, b: &Extent) -> Option<Extent> {
    if !a.intersects(b) {
        return None;
    }
    Some(Extent::new(
        a.min_x.max(b.min_x),
        a.min_y.max(b.min_y),
        a.max_x.min(b.max_x),
        a.max_y.min(b.max_y),
    ))
}
