// Construction-time error types.
//
// Per-frame updates never fail: parameters are clamped and missing geometry
// yields an empty frame. Only building curves, networks and configs can error.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("centerline requires at least 2 control points, found {found}")]
    TooFewControlPoints { found: usize },
    #[error("centerline control points must be finite")]
    NonFiniteControlPoint,
    #[error("centerline has zero total length")]
    ZeroLengthCurve,
    #[error("vessel radius must be positive and finite, got {radius}")]
    InvalidRadius { radius: f32 },
    #[error("clot parameter {t} lies outside [0, 1]")]
    ClotOutOfRange { t: f32 },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("geometry: {0}")]
    Geometry(#[from] GeometryError),
    #[error("config: {0}")]
    Config(#[from] ConfigError),
}
