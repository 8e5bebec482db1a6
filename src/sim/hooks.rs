//! Collaborators supplied by the surrounding game
//!
//! Every hook is optional. A pass whose hook is missing either skips entirely
//! or applies damage without the side effect the hook would have provided.

use glam::Vec2;

use super::entity::Enemy;
use super::geometry::{self, Rect};
use super::state::{FrameState, PlayerDeath};

pub type KillEnemyFn = Box<dyn FnMut(&Enemy, &mut FrameState)>;
pub type SegmentRectFn = fn(Vec2, Vec2, &Rect) -> bool;
pub type PointInPolygonFn = fn(Vec2, &[Vec2], &Rect) -> bool;
pub type OffscreenFn = Box<dyn Fn(&Rect) -> bool>;
pub type PlayerDeathFn = Box<dyn FnMut(&PlayerDeath)>;
pub type SoundFn = Box<dyn FnMut(&str)>;
pub type RespawnFn = Box<dyn FnMut(&mut FrameState)>;

#[derive(Default)]
pub struct Hooks {
    /// Death side effects (score, drops, telemetry). The enemy has already
    /// been taken out of the live list when this runs.
    pub kill_enemy: Option<KillEnemyFn>,
    pub line_segment_intersects_rect: Option<SegmentRectFn>,
    pub point_in_polygon: Option<PointInPolygonFn>,
    pub rect_is_offscreen: Option<OffscreenFn>,
    pub log_player_death: Option<PlayerDeathFn>,
    pub play_sound_effect: Option<SoundFn>,
    /// Respawn after a death with lives remaining
    pub reset_after_death: Option<RespawnFn>,
}

impl Hooks {
    /// Hooks with the stock geometry filled in for a `width x height` screen
    pub fn with_geometry(width: i32, height: i32) -> Self {
        Self {
            line_segment_intersects_rect: Some(geometry::line_segment_intersects_rect),
            point_in_polygon: Some(geometry::point_in_polygon),
            rect_is_offscreen: Some(Box::new(move |r: &Rect| {
                geometry::rect_offscreen(r, width, height)
            })),
            ..Default::default()
        }
    }

    pub fn with_kill_enemy(mut self, f: impl FnMut(&Enemy, &mut FrameState) + 'static) -> Self {
        self.kill_enemy = Some(Box::new(f));
        self
    }

    pub fn with_respawn(mut self, f: impl FnMut(&mut FrameState) + 'static) -> Self {
        self.reset_after_death = Some(Box::new(f));
        self
    }

    pub fn with_player_death_log(mut self, f: impl FnMut(&PlayerDeath) + 'static) -> Self {
        self.log_player_death = Some(Box::new(f));
        self
    }

    pub fn with_sound(mut self, f: impl FnMut(&str) + 'static) -> Self {
        self.play_sound_effect = Some(Box::new(f));
        self
    }

    pub fn is_offscreen(&self, rect: &Rect) -> Option<bool> {
        self.rect_is_offscreen.as_ref().map(|f| f(rect))
    }

    pub fn play_sound(&mut self, name: &str) {
        if let Some(play) = self.play_sound_effect.as_mut() {
            play(name);
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("kill_enemy", &self.kill_enemy.is_some())
            .field(
                "line_segment_intersects_rect",
                &self.line_segment_intersects_rect.is_some(),
            )
            .field("point_in_polygon", &self.point_in_polygon.is_some())
            .field("rect_is_offscreen", &self.rect_is_offscreen.is_some())
            .field("log_player_death", &self.log_player_death.is_some())
            .field("play_sound_effect", &self.play_sound_effect.is_some())
            .field("reset_after_death", &self.reset_after_death.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_with_geometry_fills_geometric_hooks_only() {
        let hooks = Hooks::with_geometry(800, 600);
        assert!(hooks.line_segment_intersects_rect.is_some());
        assert!(hooks.point_in_polygon.is_some());
        assert_eq!(hooks.is_offscreen(&Rect::new(900, 0, 4, 4)), Some(true));
        assert_eq!(hooks.is_offscreen(&Rect::new(10, 10, 4, 4)), Some(false));
        assert!(hooks.kill_enemy.is_none());
        assert!(hooks.reset_after_death.is_none());
        assert_eq!(Hooks::default().is_offscreen(&Rect::new(900, 0, 4, 4)), None);
    }

    #[test]
    fn test_sound_hook_receives_names() {
        let heard = Rc::new(RefCell::new(Vec::new()));
        let sink = heard.clone();
        let mut hooks = Hooks::default().with_sound(move |name| sink.borrow_mut().push(name.to_string()));
        hooks.play_sound("player_hit");
        assert_eq!(*heard.borrow(), vec!["player_hit".to_string()]);
    }
}
