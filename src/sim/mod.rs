//! Frame simulation: entities, collisions and damage
//!
//! A host frame looks like:
//! - `motion::advance_projectiles` moves bullets, projectiles and missiles
//! - `collision::resolve_frame` runs every collision pass in a fixed order
//! - `motion::tick_effects` decays flashes, timers and damage numbers
//!
//! All passes are single-threaded and mutate one [`FrameState`] in place.

pub mod collision;
pub mod damage;
pub mod entity;
pub mod geometry;
pub mod hooks;
pub mod motion;
pub mod state;

pub use collision::{FrameContext, resolve_frame};
pub use damage::apply_player_damage;
pub use entity::{
    Beam, Block, Bullet, Combatant, DamageNumber, DrawInfo, Enemy, EntityId, Explosion,
    ExplosionSource, Friendly, Hazard, Missile, Projectile, StaticBlock,
};
pub use geometry::Rect;
pub use hooks::Hooks;
pub use motion::{advance_projectiles, tick_effects};
pub use state::{FrameState, GamePhase, Level, Player, PlayerDeath};
