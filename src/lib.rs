//! Skirmish - collision and damage core for a 2D arcade shooter
//!
//! Core modules:
//! - `physics`: Tiered batch backend (GPU compute, native CPU, no-op floor)
//! - `sim`: Entity records, frame state, and the per-frame resolution passes
//! - `settings`: Data-driven collision configuration

pub mod physics;
pub mod settings;
pub mod sim;

pub use physics::{BackendPreference, BackendTier, PhysicsBackend, PhysicsResolver};
pub use settings::CollisionConfig;

use glam::Vec2;

/// Gameplay constants shared by the resolution passes
pub mod consts {
    /// Margin (pixels) outside the screen before a batch-moved entry is culled
    pub const OFFSCREEN_MARGIN: f32 = 50.0;

    /// Explosion lifespan in seconds; radius grows as the timer runs down
    pub const EXPLOSION_LIFESPAN: f32 = 0.3;
    pub const EXPLOSION_DEFAULT_RADIUS: f32 = 150.0;
    pub const EXPLOSION_DEFAULT_DAMAGE: f32 = 500.0;

    /// Player bullet defaults
    pub const PLAYER_BULLET_DAMAGE: f32 = 20.0;

    /// Enemy projectile defaults
    pub const ENEMY_PROJECTILE_DAMAGE: f32 = 10.0;
    pub const ENEMY_PROJECTILE_SIZE: (i32, i32) = (12, 12);

    pub const FRIENDLY_PROJECTILE_DAMAGE: f32 = 20.0;

    /// Shielded enemies
    pub const REFLECT_DAMAGE_MULT: f32 = 1.5;
    pub const REFLECT_PROJECTILE_SPEED: f32 = 300.0;

    /// Missiles (player seeking rockets and enemy homing missiles)
    pub const MISSILE_DAMAGE: f32 = 800.0;
    pub const MISSILE_EXPLOSION_RADIUS: f32 = 150.0;

    /// Beams
    pub const LASER_DAMAGE: f32 = 50.0;
    /// Player laser damage is authored per 1/60 s frame
    pub const LASER_FRAME_SCALE: f32 = 60.0;
    pub const ENEMY_BEAM_DPS: f32 = 80.0 * 60.0;
    pub const ENEMY_BEAM_DURATION: f32 = 0.2;

    /// Impulse a bullet gives a hazard it strikes (pixels/s, scaled by dt)
    pub const HAZARD_IMPULSE: f32 = 200.0;

    /// Floating damage numbers
    pub const DAMAGE_NUMBER_TTL: f32 = 2.0;
    pub const DAMAGE_NUMBER_RISE: i32 = 20;

    /// Player defaults
    pub const PLAYER_MAX_HP: f32 = 5625.0;
    pub const LIVES_START: u32 = 10;
    pub const DAMAGE_WOBBLE_DURATION: f32 = 0.2;
}

/// Unit vector pointing along `angle` (radians)
#[inline]
pub fn angle_to_dir(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}
