use std::f32::consts::TAU;

use glam::Vec3;

/// How the viewpoint moves during a scene. Speeds are in chunks per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScenePath {
    /// Walk along +x at a constant speed.
    Straight { speed: f32 },
    /// Swing back and forth across the x boundary between chunks 0 and 1.
    Oscillate { amplitude: f32, period: u32 },
    /// Circle outward from the origin on the x/z plane.
    Spiral { growth: f32, turn: f32 },
}

/// Configuration for a single benchmark scene.
pub struct SceneConfig {
    pub name: &'static str,
    pub path: ScenePath,
    /// Height of the viewpoint in world units.
    pub height: f32,
}

impl SceneConfig {
    /// Viewpoint position at `frame` for a grid with `chunk_size` blocks per chunk.
    pub fn position_at(&self, frame: u32, chunk_size: u32) -> Vec3 {
        let cs = chunk_size as f32;
        let f = frame as f32;
        match self.path {
            ScenePath::Straight { speed } => Vec3::new(f * speed * cs, self.height, 0.5 * cs),
            ScenePath::Oscillate { amplitude, period } => {
                let phase = TAU * f / period.max(1) as f32;
                Vec3::new(cs * (1.0 + amplitude * phase.sin()), self.height, 0.5 * cs)
            }
            ScenePath::Spiral { growth, turn } => {
                let radius = f * growth * cs;
                let angle = f * turn;
                Vec3::new(radius * angle.cos(), self.height, radius * angle.sin())
            }
        }
    }
}

/// Return the standard suite of streaming scenes.
pub fn standard_scenes() -> Vec<SceneConfig> {
    vec![
        SceneConfig {
            name: "straight",
            path: ScenePath::Straight { speed: 0.05 },
            height: 10.0,
        },
        SceneConfig {
            name: "oscillate",
            path: ScenePath::Oscillate {
                amplitude: 0.5,
                period: 30,
            },
            height: 10.0,
        },
        SceneConfig {
            name: "spiral",
            path: ScenePath::Spiral {
                growth: 0.02,
                turn: 0.05,
            },
            height: 10.0,
        },
    ]
}
