//! Per-frame collision resolution
//!
//! Each pass handles one pair category and mutates the frame state in place.
//! Passes run in a fixed order from [`resolve_frame`]; once the run ends
//! (game over) the remaining passes are skipped.
//!
//! Entities are addressed by id across any call that can remove entities
//! (kills, respawns), so a pass never holds a borrow over a removal.

use glam::Vec2;

use super::damage::{apply_player_damage, damage_enemy, kill_enemy};
use super::entity::*;
use super::geometry::{Rect, reflect_velocity};
use super::hooks::Hooks;
use super::state::FrameState;
use crate::consts::{HAZARD_IMPULSE, LASER_FRAME_SCALE};
use crate::physics::PhysicsResolver;
use crate::settings::CollisionConfig;

/// Everything a pass needs besides the frame state
pub struct FrameContext<'a> {
    pub config: &'a CollisionConfig,
    pub physics: &'a PhysicsResolver,
    pub hooks: &'a mut Hooks,
}

impl<'a> FrameContext<'a> {
    pub fn new(config: &'a CollisionConfig, physics: &'a PhysicsResolver, hooks: &'a mut Hooks) -> Self {
        Self {
            config,
            physics,
            hooks,
        }
    }

    /// Whether bullet-vs-enemy may go through the batch pairing kernel
    pub fn batch_pairing(&self, len: usize) -> bool {
        self.config.allows_batch(self.physics.gpu_capable(), len) && self.physics.supports_pairing()
    }
}

type Pass = fn(&mut FrameState, &mut FrameContext, f32);

/// Resolve every collision category for one frame, in order
pub fn resolve_frame(state: &mut FrameState, ctx: &mut FrameContext, dt: f32) {
    let passes: [Pass; 14] = [
        |s, c, dt| hazard_enemy(s, c, dt),
        |s, c, dt| player_lasers(s, c, dt),
        |s, c, dt| enemy_beams(s, c, dt),
        |s, c, _| sweep_dead_enemies(s, c),
        |s, c, _| cull_offscreen_bullets(s, c),
        |s, c, _| bullet_enemy(s, c),
        |s, c, dt| bullet_terrain(s, c, dt),
        |s, c, _| expire_enemy_projectiles(s, c),
        |s, _, _| enemy_projectile_blocks(s),
        |s, c, _| enemy_projectile_player(s, c),
        |s, _, _| enemy_projectile_friendlies(s),
        |s, c, _| friendly_projectiles(s, c),
        |s, c, dt| explosions(s, c, dt),
        |s, c, _| missiles(s, c),
    ];

    for pass in passes {
        if state.is_frozen() {
            return;
        }
        pass(state, ctx, dt);
    }
}

fn enemies_where(state: &FrameState, pred: impl Fn(&Enemy) -> bool) -> Vec<EntityId> {
    state.enemies.iter().filter(|e| pred(e)).map(|e| e.id).collect()
}

/// Damage an enemy and run the kill path if that was lethal
fn hit_enemy(state: &mut FrameState, ctx: &mut FrameContext, id: EntityId, amount: f32, tint: Option<Tint>) {
    if damage_enemy(state, id, amount, ctx.config, tint) == Some(true) {
        kill_enemy(state, id, ctx.hooks);
    }
}

/// Enemies standing in a hazard take its damage per second
pub fn hazard_enemy(state: &mut FrameState, ctx: &mut FrameContext, dt: f32) {
    let Some(inside) = ctx.hooks.point_in_polygon else {
        return;
    };
    if ctx.hooks.kill_enemy.is_none() {
        return;
    }

    for h in 0..state.level.hazards.len() {
        let Some(hazard) = state.level.hazards.get(h) else {
            break;
        };
        if hazard.points.len() < 3 {
            continue;
        }
        let damage = hazard.damage * dt;
        let hits = enemies_where(state, |e| {
            inside(e.rect.center(), &hazard.points, &hazard.bounding_rect)
        });
        for id in hits {
            hit_enemy(state, ctx, id, damage, None);
        }
    }
}

/// Player lasers burn every enemy they cross
pub fn player_lasers(state: &mut FrameState, ctx: &mut FrameContext, dt: f32) {
    let Some(crosses) = ctx.hooks.line_segment_intersects_rect else {
        return;
    };
    if ctx.hooks.kill_enemy.is_none() {
        return;
    }

    let mut i = 0;
    while i < state.laser_beams.len() {
        let beam = &mut state.laser_beams[i];
        beam.timer -= dt;
        if beam.timer <= 0.0 {
            state.laser_beams.remove(i);
            continue;
        }
        let (start, end) = (beam.start, beam.end);
        let damage = beam.damage * dt * LASER_FRAME_SCALE;

        for id in enemies_where(state, |e| crosses(start, end, &e.rect)) {
            hit_enemy(state, ctx, id, damage, None);
        }
        i += 1;
    }
}

/// Enemy beams telegraph, then burn the player while active
pub fn enemy_beams(state: &mut FrameState, ctx: &mut FrameContext, dt: f32) {
    let Some(crosses) = ctx.hooks.line_segment_intersects_rect else {
        return;
    };

    let mut i = 0;
    while i < state.enemy_laser_beams.len() {
        let beam = &mut state.enemy_laser_beams[i];
        if beam.deploy_timer > 0.0 {
            beam.deploy_timer -= dt;
            i += 1;
            continue;
        }
        beam.timer -= dt;
        if beam.timer <= 0.0 {
            state.enemy_laser_beams.remove(i);
            continue;
        }
        if crosses(beam.start, beam.end, &state.player.rect) {
            let amount = (beam.damage * dt).trunc();
            apply_player_damage(state, amount, ctx.config, ctx.hooks);
            if state.is_frozen() {
                return;
            }
        }
        i += 1;
    }
}

/// Kill anything left at or below zero hp by earlier systems
pub fn sweep_dead_enemies(state: &mut FrameState, ctx: &mut FrameContext) {
    if ctx.hooks.kill_enemy.is_none() {
        return;
    }
    for id in enemies_where(state, |e| e.hp <= 0.0) {
        kill_enemy(state, id, ctx.hooks);
    }
}

pub fn cull_offscreen_bullets(state: &mut FrameState, ctx: &mut FrameContext) {
    let Some(offscreen) = ctx.hooks.rect_is_offscreen.as_ref() else {
        return;
    };
    state.player_bullets.retain(|b| !offscreen(&b.rect));
}

/// Player bullets against enemies; each bullet hits at most one enemy
pub fn bullet_enemy(state: &mut FrameState, ctx: &mut FrameContext) {
    if ctx.hooks.kill_enemy.is_none() || state.player_bullets.is_empty() || state.enemies.is_empty() {
        return;
    }

    if ctx.batch_pairing(state.player_bullets.len() * state.enemies.len()) {
        let bullets: Vec<_> = state.player_bullets.iter().map(|b| b.rect.to_box()).collect();
        let enemies: Vec<_> = state.enemies.iter().map(|e| e.rect.to_box()).collect();
        let pairs = ctx.physics.pair_collisions(&bullets, &enemies);

        // First enemy per bullet, resolved to ids before anything is removed
        let mut seen = vec![false; state.player_bullets.len()];
        let mut hits = Vec::with_capacity(pairs.len());
        for (bi, ei) in pairs {
            if bi >= seen.len() || seen[bi] || ei >= state.enemies.len() {
                continue;
            }
            seen[bi] = true;
            hits.push((state.player_bullets[bi].id, state.enemies[ei].id));
        }

        for (bullet_id, enemy_id) in hits {
            resolve_bullet_hit(state, ctx, bullet_id, enemy_id);
        }
        return;
    }

    let bullet_ids: Vec<EntityId> = state.player_bullets.iter().map(|b| b.id).collect();
    for bullet_id in bullet_ids {
        let Some(rect) = state.player_bullets.iter().find(|b| b.id == bullet_id).map(|b| b.rect) else {
            continue;
        };
        if let Some(enemy_id) = state.enemies.iter().find(|e| e.rect.overlaps(&rect)).map(|e| e.id) {
            resolve_bullet_hit(state, ctx, bullet_id, enemy_id);
        }
    }
}

/// Apply one bullet-enemy contact: shield reflection or direct damage
pub fn resolve_bullet_hit(state: &mut FrameState, ctx: &mut FrameContext, bullet_id: EntityId, enemy_id: EntityId) {
    let Some(bullet) = state.player_bullets.iter().find(|b| b.id == bullet_id).cloned() else {
        return;
    };
    let Some(enemy) = state.enemy(enemy_id) else {
        return;
    };

    let center = enemy.rect.center();
    let to_bullet = (bullet.rect.center() - center).normalize_or_zero();
    let frontal = to_bullet.dot(-enemy.shield_dir()) > 0.0;

    if frontal && (enemy.has_shield || enemy.has_reflective_shield) {
        let speed = enemy.projectile_speed;
        let source_type = enemy.type_tag.clone();
        let origin = enemy.rect;

        let reflected = if enemy.has_reflective_shield {
            let Some(enemy) = state.enemy_mut(enemy_id) else {
                return;
            };
            enemy.shield_hp += bullet.damage;
            let charge = enemy.shield_hp;
            if charge > 0.0 {
                enemy.shield_hp = 0.0;
                Some((-to_bullet * speed, charge))
            } else {
                None
            }
        } else {
            Some((to_bullet * speed, (bullet.damage * enemy.reflect_damage_mult).trunc()))
        };

        if let Some((vel, damage)) = reflected {
            spawn_reflection(state, ctx.config, origin, vel, damage, source_type);
        }
        state.remove_bullet(bullet_id);
        return;
    }

    hit_enemy(state, ctx, enemy_id, bullet.damage, Some(TINT_DIRECT_HIT));
    spend_penetration(state, bullet_id);
}

/// Remove the bullet if it has no penetration left, otherwise use one up
fn spend_penetration(state: &mut FrameState, bullet_id: EntityId) {
    let Some(bullet) = state.bullet_mut(bullet_id) else {
        return;
    };
    if bullet.penetration <= 0 {
        state.remove_bullet(bullet_id);
    } else {
        bullet.penetration -= 1;
    }
}

fn spawn_reflection(
    state: &mut FrameState,
    config: &CollisionConfig,
    origin: Rect,
    vel: Vec2,
    damage: f32,
    source_type: String,
) {
    let (w, h) = config.enemy_projectile_size;
    let rect = Rect::centered_at(origin.centerx(), origin.centery(), w, h);
    let id = state.spawn_enemy_projectile(rect, vel, damage);
    if let Some(projectile) = state.enemy_projectiles.iter_mut().find(|p| p.id == id) {
        projectile.source_type = source_type;
    }
}

/// What a bullet ran into this frame
enum TerrainHit {
    Breakable(EntityId),
    Solid,
    Hazard(usize),
}

fn first_terrain_hit(state: &FrameState, bullet: &Bullet, hooks: &Hooks) -> Option<TerrainHit> {
    let level = &state.level;
    if let Some(id) = level.first_breakable_hit(&bullet.rect) {
        return Some(TerrainHit::Breakable(id));
    }

    let solid = level
        .giant_blocks
        .iter()
        .chain(&level.super_giant_blocks)
        .chain(&level.trapezoid_blocks)
        .chain(&level.triangle_blocks)
        .any(|b| b.bounding_rect.overlaps(&bullet.rect));
    if solid {
        return Some(TerrainHit::Solid);
    }

    let inside = hooks.point_in_polygon?;
    let center = bullet.rect.center();
    level
        .hazards
        .iter()
        .position(|h| h.points.len() >= 3 && inside(center, &h.points, &h.bounding_rect))
        .map(TerrainHit::Hazard)
}

/// Bounce or destroy a bullet that struck something solid
fn bounce_or_remove(state: &mut FrameState, bullet_id: EntityId) {
    let Some(bullet) = state.bullet_mut(bullet_id) else {
        return;
    };
    if bullet.bouncing {
        bullet.vel = reflect_velocity(bullet.vel, Vec2::X);
    } else {
        state.remove_bullet(bullet_id);
    }
}

/// Player bullets against terrain. Per bullet, the first category that
/// registers a hit is the only one applied this frame.
pub fn bullet_terrain(state: &mut FrameState, ctx: &mut FrameContext, dt: f32) {
    let bullet_ids: Vec<EntityId> = state.player_bullets.iter().map(|b| b.id).collect();
    for bullet_id in bullet_ids {
        let Some(bullet) = state.player_bullets.iter().find(|b| b.id == bullet_id) else {
            continue;
        };
        let Some(hit) = first_terrain_hit(state, bullet, ctx.hooks) else {
            continue;
        };
        let (damage, penetration, vel) = (bullet.damage, bullet.penetration, bullet.vel);

        match hit {
            TerrainHit::Breakable(block_id) => {
                state.level.damage_block(block_id, damage);
                if penetration <= 0 {
                    bounce_or_remove(state, bullet_id);
                } else if let Some(bullet) = state.bullet_mut(bullet_id) {
                    bullet.penetration -= 1;
                }
            }
            TerrainHit::Solid => bounce_or_remove(state, bullet_id),
            TerrainHit::Hazard(h) => {
                if vel.length_squared() > 0.0 {
                    if let Some(hazard) = state.level.hazards.get_mut(h) {
                        hazard.velocity += vel.normalize() * HAZARD_IMPULSE * dt;
                    }
                }
                state.remove_bullet(bullet_id);
            }
        }
    }
}

/// Drop enemy projectiles that expired or left the screen
pub fn expire_enemy_projectiles(state: &mut FrameState, ctx: &mut FrameContext) {
    let offscreen = ctx.hooks.rect_is_offscreen.as_ref();
    state.enemy_projectiles.retain(|p| {
        let expired = p.lifetime.is_some_and(|t| t <= 0.0);
        !expired && !offscreen.is_some_and(|f| f(&p.rect))
    });
}

pub fn enemy_projectile_blocks(state: &mut FrameState) {
    let mut i = 0;
    while i < state.enemy_projectiles.len() {
        let projectile = &state.enemy_projectiles[i];
        if let Some(block_id) = state.level.first_breakable_hit(&projectile.rect) {
            let damage = projectile.damage;
            state.level.damage_block(block_id, damage);
            state.enemy_projectiles.remove(i);
            continue;
        }
        i += 1;
    }
}

/// Enemy projectiles hitting the player. An active shield eats the shot.
pub fn enemy_projectile_player(state: &mut FrameState, ctx: &mut FrameContext) {
    let mut i = 0;
    while i < state.enemy_projectiles.len() {
        if !state.enemy_projectiles[i].rect.overlaps(&state.player.rect) {
            i += 1;
            continue;
        }
        let projectile = state.enemy_projectiles.remove(i);
        if !state.player.shield_active {
            apply_player_damage(state, projectile.damage, ctx.config, ctx.hooks);
            if state.is_frozen() {
                return;
            }
        }
    }
}

/// Enemy projectiles hitting living friendlies
pub fn enemy_projectile_friendlies(state: &mut FrameState) {
    let mut i = 0;
    while i < state.enemy_projectiles.len() {
        let rect = state.enemy_projectiles[i].rect;
        let Some(f) = state
            .friendlies
            .iter()
            .position(|f| f.hp > 0.0 && f.rect.overlaps(&rect))
        else {
            i += 1;
            continue;
        };

        let projectile = state.enemy_projectiles.remove(i);
        state.friendlies[f].hp -= projectile.damage;
        if state.friendlies[f].hp <= 0.0 {
            state.friendlies.remove(f);
        }
    }
}

/// Friendly projectiles: offscreen cull, then blocks, then enemies
pub fn friendly_projectiles(state: &mut FrameState, ctx: &mut FrameContext) {
    let ids: Vec<EntityId> = state.friendly_projectiles.iter().map(|p| p.id).collect();
    for id in ids {
        let Some(projectile) = state.friendly_projectiles.iter().find(|p| p.id == id) else {
            continue;
        };
        let (rect, damage) = (projectile.rect, projectile.damage);

        if ctx.hooks.is_offscreen(&rect) == Some(true) {
            state.friendly_projectiles.retain(|p| p.id != id);
            continue;
        }

        if let Some(block_id) = state.level.first_breakable_hit(&rect) {
            state.level.damage_block(block_id, damage);
            state.friendly_projectiles.retain(|p| p.id != id);
            continue;
        }

        if let Some(enemy_id) = state.enemies.iter().find(|e| e.rect.overlaps(&rect)).map(|e| e.id) {
            hit_enemy(state, ctx, enemy_id, damage, Some(TINT_DIRECT_HIT));
            state.friendly_projectiles.retain(|p| p.id != id);
        }
    }
}

fn within(rect: &Rect, center: Vec2, radius: f32) -> bool {
    rect.center().distance(center) <= radius
}

/// Area damage from expanding explosions
pub fn explosions(state: &mut FrameState, ctx: &mut FrameContext, dt: f32) {
    let mut i = 0;
    while i < state.explosions.len() {
        if state.explosions[i].advance(dt) {
            state.explosions.remove(i);
            continue;
        }
        let explosion = &state.explosions[i];
        let (center, radius, damage) = (explosion.center, explosion.radius, explosion.damage);
        let source = explosion.source.clone();
        i += 1;

        if source.hurts_enemies() {
            for id in enemies_where(state, |e| within(&e.rect, center, radius)) {
                hit_enemy(state, ctx, id, damage, Some(TINT_EXPLOSION));
            }
        } else {
            state.friendlies.retain_mut(|f| {
                if within(&f.rect, center, radius) {
                    f.hp -= damage;
                }
                f.hp > 0.0
            });
        }

        if source.hurts_player()
            && !state.player.shield_active
            && within(&state.player.rect, center, radius)
        {
            apply_player_damage(state, damage, ctx.config, ctx.hooks);
            if state.is_frozen() {
                return;
            }
        }

        if source.hurts_enemies() {
            let level = &mut state.level;
            for blocks in [&mut level.destructible_blocks, &mut level.movable_blocks] {
                blocks.retain_mut(|b| {
                    !(b.is_destructible && within(&b.rect, center, radius) && b.take_damage(damage))
                });
            }
        }
    }
}

/// Homing missiles: cull, arrive, detonate
pub fn missiles(state: &mut FrameState, ctx: &mut FrameContext) {
    let ids: Vec<EntityId> = state.missiles.iter().map(|m| m.id).collect();
    for id in ids {
        let Some(missile) = state.missiles.iter_mut().find(|m| m.id == id) else {
            continue;
        };

        if ctx.hooks.is_offscreen(&missile.rect) == Some(true) {
            state.missiles.retain(|m| m.id != id);
            continue;
        }

        // A target that has left the live list is no target at all
        if let Some(target) = missile.target_enemy {
            if !state.enemies.iter().any(|e| e.id == target) {
                log::debug!("Missile {id} lost target {target}");
                missile.target_enemy = None;
            }
        }

        let missile = missile.clone();
        let player = &state.player;
        let at_player = missile.target_player && !player.shield_active && missile.rect.overlaps(&player.rect);
        let at_enemy = missile
            .target_enemy
            .and_then(|target| state.enemy(target))
            .is_some_and(|e| missile.rect.overlaps(&e.rect));
        if !(at_player || at_enemy) {
            continue;
        }

        let center = missile.rect.center();
        let radius = missile.explosion_radius;
        for enemy_id in enemies_where(state, |e| within(&e.rect, center, radius)) {
            hit_enemy(state, ctx, enemy_id, missile.damage, Some(TINT_MISSILE));
        }
        state.missiles.retain(|m| m.id != id);

        if missile.target_player
            && !state.player.shield_active
            && within(&state.player.rect, center, radius)
        {
            apply_player_damage(state, missile.damage, ctx.config, ctx.hooks);
            if state.is_frozen() {
                return;
            }
        }
    }
}
