//! Damage application
//!
//! Player damage runs overshield first, then hp, then the death and game-over
//! transitions. Enemy damage shares one helper so every source flashes the
//! enemy and queues a damage number the same way.

use super::entity::{DamageNumber, EntityId, Tint};
use super::geometry::Rect;
use super::hooks::Hooks;
use super::state::{FrameState, GamePhase, PlayerDeath};
use crate::consts::{DAMAGE_NUMBER_RISE, DAMAGE_NUMBER_TTL, DAMAGE_WOBBLE_DURATION};
use crate::settings::CollisionConfig;

/// Apply `amount` to the player. Overshield absorbs first; whatever gets
/// through reduces hp and may end the life or the run.
pub fn apply_player_damage(
    state: &mut FrameState,
    amount: f32,
    config: &CollisionConfig,
    hooks: &mut Hooks,
) {
    if amount <= 0.0 || config.effective_invulnerable() || state.is_frozen() {
        return;
    }

    let mut remaining = amount;
    if state.player.overshield > 0.0 {
        let absorbed = remaining.min(state.player.overshield);
        state.player.overshield = (state.player.overshield - remaining).max(0.0);
        remaining -= absorbed;
    }

    if remaining > 0.0 {
        state.player.hp -= remaining;
        if config.enable_screen_flash {
            state.screen_flash_timer = config.screen_flash_duration;
        }
        if config.enable_damage_wobble {
            state.damage_wobble_timer = DAMAGE_WOBBLE_DURATION;
        }
        hooks.play_sound("player_hit");
    }
    state.damage_taken += remaining;
    state.wave_damage_taken += remaining;

    if state.player.hp <= 0.0 {
        handle_player_death(state, hooks);
    }
}

fn handle_player_death(state: &mut FrameState, hooks: &mut Hooks) {
    let can_respawn = state.lives > 0 && hooks.reset_after_death.is_some();
    let death = PlayerDeath {
        time: state.run_time,
        x: state.player.rect.centerx(),
        y: state.player.rect.centery(),
        lives_left: if can_respawn { state.lives - 1 } else { 0 },
        wave_number: state.wave_number,
    };
    if let Some(log_death) = hooks.log_player_death.as_mut() {
        log_death(&death);
    }

    match hooks.reset_after_death.as_mut() {
        Some(reset) if state.lives > 0 => {
            state.lives -= 1;
            reset(state);
        }
        _ => {
            log::debug!("Run over at wave {} with score {}", state.wave_number, state.score);
            state.final_score = Some(state.score);
            state.phase = GamePhase::NameEntry;
        }
    }
}

/// Queue a floating number above `rect`
pub fn push_damage_number(state: &mut FrameState, rect: Rect, amount: f32, tint: Tint) {
    state.damage_numbers.push(DamageNumber {
        x: rect.centerx(),
        y: rect.y - DAMAGE_NUMBER_RISE,
        amount: amount as i32,
        timer: DAMAGE_NUMBER_TTL,
        tint,
    });
}

/// Subtract `amount` from an enemy's hp and start its hit flash. A damage
/// number is queued when `tint` is given. Returns whether the enemy is now
/// dead; `None` if the id is not live.
pub fn damage_enemy(
    state: &mut FrameState,
    id: EntityId,
    amount: f32,
    config: &CollisionConfig,
    tint: Option<Tint>,
) -> Option<bool> {
    let enemy = state.enemy_mut(id)?;
    enemy.hp -= amount;
    if config.enable_damage_flash {
        enemy.damage_flash_timer = config.damage_flash_duration;
    }
    let rect = enemy.rect;
    let dead = enemy.hp <= 0.0;
    if let Some(tint) = tint {
        push_damage_number(state, rect, amount, tint);
    }
    Some(dead)
}

/// Remove a dead enemy and run the death hook. Without a hook the enemy is
/// left in place for a later sweep. Returns whether it was removed.
pub fn kill_enemy(state: &mut FrameState, id: EntityId, hooks: &mut Hooks) -> bool {
    let Some(kill) = hooks.kill_enemy.as_mut() else {
        return false;
    };
    match state.remove_enemy(id) {
        Some(enemy) => {
            kill(&enemy, state);
            true
        }
        None => false,
    }
}
