//! Projectile motion and per-frame timers
//!
//! Runs before collision resolution. Bullet and projectile collections go
//! through the batch motion kernel when the session allows it; otherwise each
//! rect is stepped directly and left for the offscreen passes to cull.

use glam::Vec2;

use super::entity::Combatant;
use super::geometry::Rect;
use super::state::FrameState;
use crate::physics::{MotionEntry, PhysicsResolver};
use crate::settings::CollisionConfig;

/// Step `items` by their velocity. On the batch path, entries that leave the
/// play area are dropped.
fn advance<T>(
    items: &mut Vec<T>,
    parts: impl Fn(&mut T) -> (&mut Rect, Vec2),
    dt: f32,
    config: &CollisionConfig,
    physics: &PhysicsResolver,
) {
    if items.is_empty() {
        return;
    }

    if !config.allows_batch(physics.gpu_capable(), items.len()) {
        for item in items.iter_mut() {
            let (rect, vel) = parts(item);
            rect.x = (rect.x as f32 + vel.x * dt) as i32;
            rect.y = (rect.y as f32 + vel.y * dt) as i32;
        }
        return;
    }

    let mut entries: Vec<MotionEntry> = items
        .iter_mut()
        .map(|item| {
            let (rect, vel) = parts(item);
            MotionEntry::new(Vec2::new(rect.x as f32, rect.y as f32), vel)
        })
        .collect();
    let survivors = physics.motion_update(
        &mut entries,
        dt,
        config.screen_width as f32,
        config.screen_height as f32,
    );

    let mut keep = vec![false; items.len()];
    for i in survivors {
        if let (Some(item), Some(entry)) = (items.get_mut(i), entries.get(i)) {
            let (rect, _) = parts(item);
            (rect.x, rect.y) = entry.truncated();
            keep[i] = true;
        }
    }
    let mut flags = keep.into_iter();
    items.retain(|_| flags.next().unwrap_or(false));
}

/// Move every bullet, projectile and missile by one frame
pub fn advance_projectiles(
    state: &mut FrameState,
    dt: f32,
    config: &CollisionConfig,
    physics: &PhysicsResolver,
) {
    if state.is_frozen() {
        return;
    }

    advance(&mut state.player_bullets, |b| (&mut b.rect, b.vel), dt, config, physics);
    advance(&mut state.enemy_projectiles, |p| (&mut p.rect, p.vel), dt, config, physics);
    advance(&mut state.friendly_projectiles, |p| (&mut p.rect, p.vel), dt, config, physics);
    advance(&mut state.missiles, |m| (&mut m.rect, m.vel), dt, config, physics);

    for projectile in &mut state.enemy_projectiles {
        if let Some(lifetime) = projectile.lifetime.as_mut() {
            *lifetime -= dt;
        }
    }
}

/// Decay hit flashes, screen effects and floating numbers
pub fn tick_effects(state: &mut FrameState, dt: f32) {
    for enemy in &mut state.enemies {
        enemy.update(dt);
    }
    for friendly in &mut state.friendlies {
        friendly.update(dt);
    }

    state.screen_flash_timer = (state.screen_flash_timer - dt).max(0.0);
    state.damage_wobble_timer = (state.damage_wobble_timer - dt).max(0.0);

    state.damage_numbers.retain_mut(|n| {
        n.timer -= dt;
        n.timer > 0.0
    });

    if !state.is_frozen() {
        state.run_time += dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{BackendPreference, BackendTier, BoxView, PhysicsBackend, native};
    use crate::sim::state::Player;

    /// CPU kernels wearing the GPU tier's badge, so the batch path engages
    struct BatchOnCpu;

    impl PhysicsBackend for BatchOnCpu {
        fn tier(&self) -> BackendTier {
            BackendTier::Gpu
        }

        fn supports_pairing(&self) -> bool {
            true
        }

        fn motion_update(&self, entries: &mut [MotionEntry], dt: f32, w: f32, h: f32) -> Vec<usize> {
            native::advance_entries(entries, dt, w, h)
        }

        fn pair_collisions(&self, sources: &[BoxView], targets: &[BoxView]) -> Vec<(usize, usize)> {
            native::first_overlaps(sources, targets)
        }
    }

    fn state() -> FrameState {
        FrameState::new(Player::new(Rect::new(400, 300, 32, 32)))
    }

    #[test]
    fn test_direct_path_truncates_without_culling() {
        let mut state = state();
        state.spawn_bullet(Rect::new(0, 0, 8, 8), Vec2::new(33.0, 33.0));
        state.spawn_bullet(Rect::new(10, 10, 8, 8), Vec2::new(-400.0, 0.0));
        let physics = PhysicsResolver::resolve(BackendPreference::Native);
        advance_projectiles(&mut state, 0.5, &CollisionConfig::default(), &physics);

        assert_eq!(state.player_bullets.len(), 2);
        assert_eq!((state.player_bullets[0].rect.x, state.player_bullets[0].rect.y), (16, 16));
        assert_eq!(state.player_bullets[1].rect.x, -190);
    }

    #[test]
    fn test_batch_path_culls_past_margin() {
        let mut state = state();
        let kept = state.spawn_bullet(Rect::new(0, 0, 8, 8), Vec2::new(33.0, 33.0));
        state.spawn_bullet(Rect::new(10, 10, 8, 8), Vec2::new(-400.0, 0.0));
        let config = CollisionConfig {
            use_gpu_physics: true,
            screen_width: 800,
            screen_height: 600,
            ..Default::default()
        };
        let physics = PhysicsResolver::with_backend(Box::new(BatchOnCpu));
        advance_projectiles(&mut state, 0.5, &config, &physics);

        assert_eq!(state.player_bullets.len(), 1);
        assert_eq!(state.player_bullets[0].id, kept);
        assert_eq!((state.player_bullets[0].rect.x, state.player_bullets[0].rect.y), (16, 16));
    }

    #[test]
    fn test_batch_and_direct_agree_in_play_area() {
        let config = CollisionConfig {
            use_gpu_physics: true,
            screen_width: 800,
            screen_height: 600,
            ..Default::default()
        };
        let mut direct = state();
        for i in 0..20 {
            let vel = Vec2::new(i as f32 * 7.3 - 50.0, 31.0 - i as f32 * 2.9);
            direct.spawn_bullet(Rect::new(100 + i * 20, 100 + i * 10, 8, 8), vel);
        }
        let mut batched = direct.clone();

        let cpu = PhysicsResolver::resolve(BackendPreference::Native);
        advance_projectiles(&mut direct, 1.0 / 60.0, &config, &cpu);
        let gpu_like = PhysicsResolver::with_backend(Box::new(BatchOnCpu));
        advance_projectiles(&mut batched, 1.0 / 60.0, &config, &gpu_like);

        assert_eq!(direct.player_bullets, batched.player_bullets);
    }

    #[test]
    fn test_lifetime_counts_down() {
        let mut state = state();
        state.spawn_enemy_projectile(Rect::new(0, 0, 8, 8), Vec2::ZERO, 10.0);
        state.enemy_projectiles[0].lifetime = Some(1.0);
        let physics = PhysicsResolver::resolve(BackendPreference::Stub);
        advance_projectiles(&mut state, 0.25, &CollisionConfig::default(), &physics);
        assert_eq!(state.enemy_projectiles[0].lifetime, Some(0.75));
    }

    #[test]
    fn test_effects_decay() {
        let mut state = state();
        let id = state.spawn_enemy("grunt", Rect::new(0, 0, 10, 10), 10.0);
        state.enemy_mut(id).unwrap().damage_flash_timer = 0.12;
        state.screen_flash_timer = 0.25;
        state.damage_numbers.push(crate::sim::entity::DamageNumber {
            x: 0,
            y: 0,
            amount: 5,
            timer: 0.1,
            tint: (255, 255, 255),
        });

        tick_effects(&mut state, 0.2);

        assert_eq!(state.enemy(id).unwrap().damage_flash_timer, 0.0);
        assert!((state.screen_flash_timer - 0.05).abs() < 1e-6);
        assert!(state.damage_numbers.is_empty());
        assert!((state.run_time - 0.2).abs() < 1e-6);
    }
}
