// Engine module: procedural geometry and animation state for the vascular
// journey, plus the thin host-side pieces (input, ECS mirror, debug overlay).

pub mod anatomy;
pub mod camera;
pub mod clot;
pub mod components;
pub mod config;
pub mod debug_overlay;
pub mod error;
pub mod field;
pub mod hash;
pub mod input;
pub mod mesh;
pub mod noise;
pub mod particles;
pub mod path;
pub mod progress;
pub mod rig;
pub mod scene;
pub mod skin;
pub mod surface;
pub mod systems;

// Re-export commonly used items
pub use config::SceneConfig;
pub use error::{ConfigError, GeometryError, SceneError};
pub use progress::{Phase, PhaseState};
pub use scene::{FrameOutput, SceneHandle, VascularScene};
