//! Entity records
//!
//! One plain struct per category. Every record carries an [`EntityId`]
//! allocated by [`super::state::FrameState`]; ids outlive removal so stale
//! handles can be detected instead of dereferenced.

use glam::Vec2;

use super::geometry::Rect;
use crate::angle_to_dir;
use crate::consts::*;

/// Stable handle for any entity in the frame state
pub type EntityId = u32;

/// RGB tint for floating damage numbers
pub type Tint = (u8, u8, u8);

pub const TINT_DIRECT_HIT: Tint = (255, 255, 100);
pub const TINT_EXPLOSION: Tint = (255, 200, 100);
pub const TINT_MISSILE: Tint = (255, 150, 50);

/// A player bullet
#[derive(Debug, Clone, PartialEq)]
pub struct Bullet {
    pub id: EntityId,
    pub rect: Rect,
    pub vel: Vec2,
    pub damage: f32,
    /// Remaining pass-throughs; the bullet is spent when a hit finds this at 0
    pub penetration: i32,
    /// Bounces off terrain instead of being destroyed
    pub bouncing: bool,
}

impl Bullet {
    pub fn new(id: EntityId, rect: Rect, vel: Vec2) -> Self {
        Self {
            id,
            rect,
            vel,
            damage: PLAYER_BULLET_DAMAGE,
            penetration: 0,
            bouncing: false,
        }
    }
}

/// Enemy or friendly projectile
#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub id: EntityId,
    pub rect: Rect,
    pub vel: Vec2,
    pub damage: f32,
    /// Seconds left before forced removal, if the shot expires at all
    pub lifetime: Option<f32>,
    /// Species of whoever fired it
    pub source_type: String,
}

impl Projectile {
    pub fn enemy(id: EntityId, rect: Rect, vel: Vec2) -> Self {
        Self {
            id,
            rect,
            vel,
            damage: ENEMY_PROJECTILE_DAMAGE,
            lifetime: None,
            source_type: String::new(),
        }
    }

    pub fn friendly(id: EntityId, rect: Rect, vel: Vec2) -> Self {
        Self {
            damage: FRIENDLY_PROJECTILE_DAMAGE,
            ..Self::enemy(id, rect, vel)
        }
    }
}

/// A hostile combatant
#[derive(Debug, Clone, PartialEq)]
pub struct Enemy {
    pub id: EntityId,
    pub type_tag: String,
    pub rect: Rect,
    pub vel: Vec2,
    pub hp: f32,
    pub max_hp: f32,

    // Shields
    pub has_shield: bool,
    pub has_reflective_shield: bool,
    /// Direction the shield faces (radians)
    pub shield_angle: f32,
    /// Charge banked by a reflective shield
    pub shield_hp: f32,
    pub reflect_damage_mult: f32,
    pub projectile_speed: f32,

    /// Counts down while the enemy renders its hit flash
    pub damage_flash_timer: f32,
}

impl Enemy {
    pub fn new(id: EntityId, type_tag: impl Into<String>, rect: Rect, hp: f32) -> Self {
        Self {
            id,
            type_tag: type_tag.into(),
            rect,
            vel: Vec2::ZERO,
            hp,
            max_hp: hp,
            has_shield: false,
            has_reflective_shield: false,
            shield_angle: 0.0,
            shield_hp: 0.0,
            reflect_damage_mult: REFLECT_DAMAGE_MULT,
            projectile_speed: REFLECT_PROJECTILE_SPEED,
            damage_flash_timer: 0.0,
        }
    }

    pub fn shield_dir(&self) -> Vec2 {
        angle_to_dir(self.shield_angle)
    }

    /// Named numeric field lookup for debug overlays and telemetry
    pub fn attribute(&self, name: &str) -> Option<f32> {
        let value = match name {
            "hp" => self.hp,
            "max_hp" => self.max_hp,
            "x" => self.rect.x as f32,
            "y" => self.rect.y as f32,
            "width" => self.rect.w as f32,
            "height" => self.rect.h as f32,
            "shield_angle" => self.shield_angle,
            "shield_hp" => self.shield_hp,
            "reflect_damage_mult" => self.reflect_damage_mult,
            "projectile_speed" => self.projectile_speed,
            "damage_flash_timer" => self.damage_flash_timer,
            _ => return None,
        };
        Some(value)
    }
}

/// An AI ally of the player
#[derive(Debug, Clone, PartialEq)]
pub struct Friendly {
    pub id: EntityId,
    pub type_tag: String,
    pub rect: Rect,
    pub hp: f32,
    pub max_hp: f32,
    pub damage_flash_timer: f32,
}

impl Friendly {
    pub fn new(id: EntityId, type_tag: impl Into<String>, rect: Rect, hp: f32) -> Self {
        Self {
            id,
            type_tag: type_tag.into(),
            rect,
            hp,
            max_hp: hp,
            damage_flash_timer: 0.0,
        }
    }
}

/// What the renderer needs to draw a combatant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawInfo<'a> {
    pub rect: Rect,
    pub type_tag: &'a str,
    /// Render the white hit flash this frame
    pub flashing: bool,
    /// Facing of a drawn shield, if any
    pub shield_angle: Option<f32>,
}

/// Per-frame update and draw hook shared by enemies and friendlies
pub trait Combatant {
    fn id(&self) -> EntityId;
    fn rect(&self) -> Rect;
    fn hp(&self) -> f32;

    fn is_dead(&self) -> bool {
        self.hp() <= 0.0
    }

    /// Advance per-entity timers
    fn update(&mut self, dt: f32);

    fn draw_info(&self) -> DrawInfo<'_>;
}

impl Combatant for Enemy {
    fn id(&self) -> EntityId {
        self.id
    }

    fn rect(&self) -> Rect {
        self.rect
    }

    fn hp(&self) -> f32 {
        self.hp
    }

    fn update(&mut self, dt: f32) {
        self.damage_flash_timer = (self.damage_flash_timer - dt).max(0.0);
    }

    fn draw_info(&self) -> DrawInfo<'_> {
        DrawInfo {
            rect: self.rect,
            type_tag: &self.type_tag,
            flashing: self.damage_flash_timer > 0.0,
            shield_angle: (self.has_shield || self.has_reflective_shield).then_some(self.shield_angle),
        }
    }
}

impl Combatant for Friendly {
    fn id(&self) -> EntityId {
        self.id
    }

    fn rect(&self) -> Rect {
        self.rect
    }

    fn hp(&self) -> f32 {
        self.hp
    }

    fn update(&mut self, dt: f32) {
        self.damage_flash_timer = (self.damage_flash_timer - dt).max(0.0);
    }

    fn draw_info(&self) -> DrawInfo<'_> {
        DrawInfo {
            rect: self.rect,
            type_tag: &self.type_tag,
            flashing: self.damage_flash_timer > 0.0,
            shield_angle: None,
        }
    }
}

/// Number of crack stages a damaged block can show
pub const MAX_CRACK_LEVEL: u8 = 3;

/// Destructible or movable block
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: EntityId,
    pub rect: Rect,
    pub hp: f32,
    pub max_hp: f32,
    pub is_destructible: bool,
    /// Visual damage stage, 0 (intact) to [`MAX_CRACK_LEVEL`]
    pub crack_level: u8,
}

impl Block {
    pub fn new(id: EntityId, rect: Rect, hp: f32) -> Self {
        Self {
            id,
            rect,
            hp,
            max_hp: hp,
            is_destructible: true,
            crack_level: 0,
        }
    }

    /// Subtract `amount` and refresh the crack stage. Returns true when the
    /// block is destroyed.
    pub fn take_damage(&mut self, amount: f32) -> bool {
        self.hp -= amount;
        if self.max_hp > 0.0 {
            let lost = (1.0 - self.hp / self.max_hp).clamp(0.0, 1.0);
            self.crack_level = ((lost * MAX_CRACK_LEVEL as f32) as u8).min(MAX_CRACK_LEVEL);
        }
        self.hp <= 0.0
    }
}

/// Indestructible terrain with an optional polygon outline.
/// Collision uses the bounding rect only.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticBlock {
    pub id: EntityId,
    pub bounding_rect: Rect,
    pub points: Vec<Vec2>,
}

impl StaticBlock {
    pub fn new(id: EntityId, bounding_rect: Rect) -> Self {
        Self {
            id,
            bounding_rect,
            points: Vec::new(),
        }
    }
}

/// Damaging polygon region (acid pool, lava and so on)
#[derive(Debug, Clone, PartialEq)]
pub struct Hazard {
    pub id: EntityId,
    pub points: Vec<Vec2>,
    pub bounding_rect: Rect,
    /// Damage per second to enemies inside
    pub damage: f32,
    /// Impulse accumulated from bullet strikes
    pub velocity: Vec2,
}

impl Hazard {
    pub fn new(id: EntityId, points: Vec<Vec2>, bounding_rect: Rect, damage: f32) -> Self {
        Self {
            id,
            points,
            bounding_rect,
            damage,
            velocity: Vec2::ZERO,
        }
    }
}

/// Which factions an explosion may hurt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplosionSource {
    /// Player ordnance: never hurts the player
    Player,
    /// Ricochet or wall blast: never hurts the player
    WallImpact,
    /// Enemy blast aimed at the player's side only
    EnemyPlayerAlliesOnly,
    /// Anything else; hurts enemies, blocks and the player
    Other(String),
}

impl ExplosionSource {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "player" => Self::Player,
            "wall_impact" => Self::WallImpact,
            "enemy_player_allies_only" => Self::EnemyPlayerAlliesOnly,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn hurts_enemies(&self) -> bool {
        !matches!(self, Self::EnemyPlayerAlliesOnly)
    }

    pub fn hurts_player(&self) -> bool {
        !matches!(self, Self::Player | Self::WallImpact)
    }
}

/// Expanding area-damage ring
#[derive(Debug, Clone, PartialEq)]
pub struct Explosion {
    pub id: EntityId,
    pub center: Vec2,
    /// Counts down from [`EXPLOSION_LIFESPAN`]
    pub timer: f32,
    pub max_radius: f32,
    pub radius: f32,
    pub damage: f32,
    pub source: ExplosionSource,
}

impl Explosion {
    pub fn new(id: EntityId, center: Vec2, source: ExplosionSource) -> Self {
        Self {
            id,
            center,
            timer: EXPLOSION_LIFESPAN,
            max_radius: EXPLOSION_DEFAULT_RADIUS,
            radius: 0.0,
            damage: EXPLOSION_DEFAULT_DAMAGE,
            source,
        }
    }

    /// Radius for a given remaining timer; grows from 0 to `max_radius`
    pub fn radius_at(max_radius: f32, timer: f32) -> f32 {
        (max_radius * (1.0 - timer / EXPLOSION_LIFESPAN)).clamp(0.0, max_radius)
    }

    /// Run the timer down and recompute the radius. Returns true once spent.
    pub fn advance(&mut self, dt: f32) -> bool {
        self.timer -= dt;
        self.radius = Self::radius_at(self.max_radius, self.timer);
        self.timer <= 0.0
    }
}

/// Homing missile
#[derive(Debug, Clone, PartialEq)]
pub struct Missile {
    pub id: EntityId,
    pub rect: Rect,
    pub vel: Vec2,
    /// Handle into the enemy list, re-checked on every use
    pub target_enemy: Option<EntityId>,
    pub target_player: bool,
    pub damage: f32,
    pub explosion_radius: f32,
}

impl Missile {
    pub fn new(id: EntityId, rect: Rect, vel: Vec2) -> Self {
        Self {
            id,
            rect,
            vel,
            target_enemy: None,
            target_player: false,
            damage: MISSILE_DAMAGE,
            explosion_radius: MISSILE_EXPLOSION_RADIUS,
        }
    }
}

/// Laser or wave beam
#[derive(Debug, Clone, PartialEq)]
pub struct Beam {
    pub id: EntityId,
    pub start: Vec2,
    pub end: Vec2,
    /// Telegraph time before the beam does anything
    pub deploy_timer: f32,
    /// Remaining active time
    pub timer: f32,
    pub damage: f32,
}

impl Beam {
    /// Player laser; damage is per 1/60 s frame
    pub fn player_laser(id: EntityId, start: Vec2, end: Vec2) -> Self {
        Self {
            id,
            start,
            end,
            deploy_timer: 0.0,
            timer: 0.1,
            damage: LASER_DAMAGE,
        }
    }

    /// Enemy beam; damage is per second
    pub fn enemy_beam(id: EntityId, start: Vec2, end: Vec2, deploy_timer: f32) -> Self {
        Self {
            id,
            start,
            end,
            deploy_timer,
            timer: ENEMY_BEAM_DURATION,
            damage: ENEMY_BEAM_DPS,
        }
    }
}

/// Floating damage number queued for the renderer
#[derive(Debug, Clone, PartialEq)]
pub struct DamageNumber {
    pub x: i32,
    pub y: i32,
    pub amount: i32,
    pub timer: f32,
    pub tint: Tint,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_enemy_attribute_lookup() {
        let mut enemy = Enemy::new(1, "grunt", Rect::new(10, 20, 30, 40), 100.0);
        enemy.shield_hp = 7.0;
        assert_eq!(enemy.attribute("hp"), Some(100.0));
        assert_eq!(enemy.attribute("y"), Some(20.0));
        assert_eq!(enemy.attribute("shield_hp"), Some(7.0));
        assert_eq!(enemy.attribute("favourite_colour"), None);
    }

    #[test]
    fn test_combatant_update_decays_flash() {
        let mut enemy = Enemy::new(1, "grunt", Rect::new(0, 0, 10, 10), 10.0);
        enemy.damage_flash_timer = 0.1;
        assert!(enemy.draw_info().flashing);
        enemy.update(0.25);
        assert_eq!(enemy.damage_flash_timer, 0.0);
        assert!(!enemy.draw_info().flashing);
        assert_eq!(enemy.draw_info().shield_angle, None);
    }

    #[test]
    fn test_block_cracks_as_it_loses_hp() {
        let mut block = Block::new(1, Rect::new(0, 0, 40, 40), 100.0);
        assert!(!block.take_damage(40.0));
        assert_eq!(block.crack_level, 1);
        assert!(!block.take_damage(30.0));
        assert_eq!(block.crack_level, 2);
        assert!(block.take_damage(30.0));
        assert_eq!(block.crack_level, MAX_CRACK_LEVEL);
    }

    #[test]
    fn test_explosion_source_factions() {
        assert!(!ExplosionSource::from_tag("player").hurts_player());
        assert!(!ExplosionSource::from_tag("wall_impact").hurts_player());
        let allies = ExplosionSource::from_tag("enemy_player_allies_only");
        assert!(allies.hurts_player());
        assert!(!allies.hurts_enemies());
        let other = ExplosionSource::from_tag("grenadier");
        assert_eq!(other, ExplosionSource::Other("grenadier".to_string()));
        assert!(other.hurts_enemies() && other.hurts_player());
    }

    #[test]
    fn test_explosion_reaches_max_radius() {
        let mut explosion = Explosion::new(1, Vec2::ZERO, ExplosionSource::Player);
        assert!(!explosion.advance(0.15));
        assert!((explosion.radius - 75.0).abs() < 1e-3);
        assert!(explosion.advance(0.2));
        assert_eq!(explosion.radius, explosion.max_radius);
    }

    proptest! {
        #[test]
        fn prop_explosion_radius_monotonic(
            max_radius in 1.0f32..500.0,
            steps in proptest::collection::vec(0.0f32..0.05, 1..20),
        ) {
            let mut explosion = Explosion::new(1, Vec2::ZERO, ExplosionSource::Player);
            explosion.max_radius = max_radius;
            let mut last = 0.0;
            for dt in steps {
                explosion.advance(dt);
                prop_assert!(explosion.radius >= last);
                prop_assert!(explosion.radius <= max_radius);
                last = explosion.radius;
            }
        }
    }
}
