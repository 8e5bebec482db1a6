//! Frame state: every live entity plus the run counters
//!
//! Collections are plain `Vec`s in spawn order. The resolution passes mutate
//! them in place and look entities up by id when a borrow would otherwise
//! span a removal.

use glam::Vec2;

use super::entity::*;
use super::geometry::Rect;
use crate::consts::*;

/// Current phase of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Active gameplay
    Playing,
    /// Run over; waiting for the high-score name. Gameplay is frozen.
    NameEntry,
}

/// The player ship
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub rect: Rect,
    pub hp: f32,
    pub max_hp: f32,
    /// Extra buffer consumed before hp
    pub overshield: f32,
    /// Temporary shield that blocks projectiles, missiles and explosions
    pub shield_active: bool,
}

impl Player {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            hp: PLAYER_MAX_HP,
            max_hp: PLAYER_MAX_HP,
            overshield: 0.0,
            shield_active: false,
        }
    }
}

/// Telemetry record emitted when the player dies
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerDeath {
    pub time: f32,
    pub x: i32,
    pub y: i32,
    pub lives_left: u32,
    pub wave_number: u32,
}

/// Terrain for the current level
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Level {
    pub destructible_blocks: Vec<Block>,
    pub movable_blocks: Vec<Block>,
    pub giant_blocks: Vec<StaticBlock>,
    pub super_giant_blocks: Vec<StaticBlock>,
    pub trapezoid_blocks: Vec<StaticBlock>,
    pub triangle_blocks: Vec<StaticBlock>,
    pub hazards: Vec<Hazard>,
}

impl Level {
    /// Damage the block with `id` in either breakable collection, removing it
    /// once destroyed. Returns true if the block was destroyed.
    pub fn damage_block(&mut self, id: EntityId, amount: f32) -> bool {
        for blocks in [&mut self.destructible_blocks, &mut self.movable_blocks] {
            if let Some(idx) = blocks.iter().position(|b| b.id == id) {
                if blocks[idx].take_damage(amount) {
                    blocks.remove(idx);
                    return true;
                }
                return false;
            }
        }
        false
    }

    /// First breakable block overlapping `rect`, destructible then movable.
    /// Blocks flagged indestructible are ignored.
    pub fn first_breakable_hit(&self, rect: &Rect) -> Option<EntityId> {
        self.destructible_blocks
            .iter()
            .chain(&self.movable_blocks)
            .find(|b| b.is_destructible && b.rect.overlaps(rect))
            .map(|b| b.id)
    }
}

/// All mutable state the collision passes touch
#[derive(Debug, Clone)]
pub struct FrameState {
    pub player: Player,
    pub level: Level,

    pub enemies: Vec<Enemy>,
    pub friendlies: Vec<Friendly>,
    pub player_bullets: Vec<Bullet>,
    pub enemy_projectiles: Vec<Projectile>,
    pub friendly_projectiles: Vec<Projectile>,
    /// Player lasers
    pub laser_beams: Vec<Beam>,
    /// Enemy lasers and waves
    pub enemy_laser_beams: Vec<Beam>,
    pub explosions: Vec<Explosion>,
    pub missiles: Vec<Missile>,
    pub damage_numbers: Vec<DamageNumber>,

    // Run counters
    pub lives: u32,
    pub score: u64,
    pub wave_number: u32,
    pub run_time: f32,
    pub damage_taken: f32,
    pub wave_damage_taken: f32,
    pub screen_flash_timer: f32,
    pub damage_wobble_timer: f32,
    pub phase: GamePhase,
    /// Score recorded when the run ended
    pub final_score: Option<u64>,

    next_id: EntityId,
}

impl FrameState {
    pub fn new(player: Player) -> Self {
        Self {
            player,
            level: Level::default(),
            enemies: Vec::new(),
            friendlies: Vec::new(),
            player_bullets: Vec::new(),
            enemy_projectiles: Vec::new(),
            friendly_projectiles: Vec::new(),
            laser_beams: Vec::new(),
            enemy_laser_beams: Vec::new(),
            explosions: Vec::new(),
            missiles: Vec::new(),
            damage_numbers: Vec::new(),
            lives: LIVES_START,
            score: 0,
            wave_number: 1,
            run_time: 0.0,
            damage_taken: 0.0,
            wave_damage_taken: 0.0,
            screen_flash_timer: 0.0,
            damage_wobble_timer: 0.0,
            phase: GamePhase::Playing,
            final_score: None,
            next_id: 1,
        }
    }

    /// Allocate the next entity id. Ids are never reused.
    pub fn next_entity_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Gameplay mutation is suspended once the run has ended
    pub fn is_frozen(&self) -> bool {
        self.phase == GamePhase::NameEntry
    }

    pub fn spawn_enemy(&mut self, type_tag: &str, rect: Rect, hp: f32) -> EntityId {
        let id = self.next_entity_id();
        self.enemies.push(Enemy::new(id, type_tag, rect, hp));
        id
    }

    pub fn spawn_friendly(&mut self, type_tag: &str, rect: Rect, hp: f32) -> EntityId {
        let id = self.next_entity_id();
        self.friendlies.push(Friendly::new(id, type_tag, rect, hp));
        id
    }

    pub fn spawn_bullet(&mut self, rect: Rect, vel: Vec2) -> EntityId {
        let id = self.next_entity_id();
        self.player_bullets.push(Bullet::new(id, rect, vel));
        id
    }

    pub fn spawn_enemy_projectile(&mut self, rect: Rect, vel: Vec2, damage: f32) -> EntityId {
        let id = self.next_entity_id();
        let mut projectile = Projectile::enemy(id, rect, vel);
        projectile.damage = damage;
        self.enemy_projectiles.push(projectile);
        id
    }

    pub fn spawn_friendly_projectile(&mut self, rect: Rect, vel: Vec2) -> EntityId {
        let id = self.next_entity_id();
        self.friendly_projectiles.push(Projectile::friendly(id, rect, vel));
        id
    }

    pub fn spawn_destructible_block(&mut self, rect: Rect, hp: f32) -> EntityId {
        let id = self.next_entity_id();
        self.level.destructible_blocks.push(Block::new(id, rect, hp));
        id
    }

    pub fn spawn_explosion(&mut self, center: Vec2, source: ExplosionSource) -> EntityId {
        let id = self.next_entity_id();
        self.explosions.push(Explosion::new(id, center, source));
        id
    }

    pub fn spawn_missile(&mut self, rect: Rect, vel: Vec2) -> EntityId {
        let id = self.next_entity_id();
        self.missiles.push(Missile::new(id, rect, vel));
        id
    }

    pub fn enemy(&self, id: EntityId) -> Option<&Enemy> {
        self.enemies.iter().find(|e| e.id == id)
    }

    pub fn enemy_mut(&mut self, id: EntityId) -> Option<&mut Enemy> {
        self.enemies.iter_mut().find(|e| e.id == id)
    }

    /// Take an enemy out of the live list
    pub fn remove_enemy(&mut self, id: EntityId) -> Option<Enemy> {
        let idx = self.enemies.iter().position(|e| e.id == id)?;
        Some(self.enemies.remove(idx))
    }

    pub fn bullet_mut(&mut self, id: EntityId) -> Option<&mut Bullet> {
        self.player_bullets.iter_mut().find(|b| b.id == id)
    }

    pub fn remove_bullet(&mut self, id: EntityId) {
        self.player_bullets.retain(|b| b.id != id);
    }

    /// Stock respawn: refill the player and clear every in-flight threat.
    /// Enemies, friendlies, terrain and the wave are kept.
    pub fn respawn_in_place(&mut self) {
        self.player.hp = self.player.max_hp;
        self.player.overshield = 0.0;
        self.player.shield_active = false;

        self.player_bullets.clear();
        self.enemy_projectiles.clear();
        self.friendly_projectiles.clear();
        self.laser_beams.clear();
        self.enemy_laser_beams.clear();
        self.explosions.clear();
        self.missiles.clear();
        self.damage_numbers.clear();

        self.screen_flash_timer = 0.0;
        self.damage_wobble_timer = 0.0;
        log::debug!("Respawned in place on wave {}", self.wave_number);
    }
}
