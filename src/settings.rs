//! Collision configuration and tuning toggles
//!
//! Built by the host at startup (or from its options menu) and handed to the
//! resolution passes by reference. Persisted as JSON by whoever owns storage.

use serde::{Deserialize, Serialize};

use crate::consts::ENEMY_PROJECTILE_SIZE;
use crate::physics::BackendPreference;

/// Errors reading or writing a configuration blob
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid collision config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Collision and damage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    // === Physics backend ===
    /// Permit routing bulk work through the accelerated batch tier
    pub use_gpu_physics: bool,
    /// Which tier the resolver should try first
    pub physics_backend: BackendPreference,
    /// Optional minimum collection size before batching is worth a dispatch.
    /// `None` means the boolean gate alone decides.
    pub gpu_min_batch: Option<usize>,

    // === Testing ===
    pub testing_mode: bool,
    /// Player ignores all damage (only honored in testing mode)
    pub invulnerability_mode: bool,

    // === Juice ===
    /// Enemies flash white when hit
    pub enable_damage_flash: bool,
    pub damage_flash_duration: f32,
    /// Full-screen red flash when the player loses health
    pub enable_screen_flash: bool,
    pub screen_flash_duration: f32,
    /// Camera wobble when the player loses health
    pub enable_damage_wobble: bool,

    // === Geometry ===
    /// Size of projectiles spawned by shield reflections
    pub enemy_projectile_size: (i32, i32),
    pub screen_width: i32,
    pub screen_height: i32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            use_gpu_physics: false,
            physics_backend: BackendPreference::Auto,
            gpu_min_batch: None,

            testing_mode: false,
            invulnerability_mode: false,

            enable_damage_flash: true,
            damage_flash_duration: 0.12,
            enable_screen_flash: true,
            screen_flash_duration: 0.25,
            enable_damage_wobble: false,

            enemy_projectile_size: ENEMY_PROJECTILE_SIZE,
            screen_width: 1920,
            screen_height: 1080,
        }
    }
}

impl CollisionConfig {
    /// Whether player damage is suppressed entirely
    pub fn effective_invulnerable(&self) -> bool {
        self.testing_mode && self.invulnerability_mode
    }

    /// Whether a batch of `len` items may take the accelerated route.
    /// `gpu_capable` is the resolver's session-wide capability flag.
    pub fn allows_batch(&self, gpu_capable: bool, len: usize) -> bool {
        if !(gpu_capable && self.use_gpu_physics) {
            return false;
        }
        match self.gpu_min_batch {
            Some(min) => len >= min,
            None => true,
        }
    }

    /// Parse from a JSON blob; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON, falling back to defaults on a malformed blob
    pub fn load_or_default(json: Option<&str>) -> Self {
        match json.map(Self::from_json) {
            Some(Ok(config)) => {
                log::info!("Loaded collision config");
                config
            }
            Some(Err(err)) => {
                log::warn!("{err}; using default collision config");
                Self::default()
            }
            None => {
                log::info!("Using default collision config");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = CollisionConfig::from_json(r#"{ "use_gpu_physics": true }"#).unwrap();
        assert!(config.use_gpu_physics);
        assert_eq!(config.physics_backend, BackendPreference::Auto);
        assert!(config.enable_screen_flash);
        assert_eq!(config.enemy_projectile_size, ENEMY_PROJECTILE_SIZE);
    }

    #[test]
    fn test_json_round_trip() {
        let config = CollisionConfig {
            use_gpu_physics: true,
            physics_backend: BackendPreference::Native,
            gpu_min_batch: Some(64),
            ..Default::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(CollisionConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_malformed_json_falls_back() {
        let config = CollisionConfig::load_or_default(Some("{ not json"));
        assert_eq!(config, CollisionConfig::default());
    }

    #[test]
    fn test_batch_gate() {
        let mut config = CollisionConfig::default();
        assert!(!config.allows_batch(true, 1000));

        config.use_gpu_physics = true;
        assert!(config.allows_batch(true, 1));
        assert!(!config.allows_batch(false, 1000));

        config.gpu_min_batch = Some(50);
        assert!(!config.allows_batch(true, 10));
        assert!(config.allows_batch(true, 50));
    }

    #[test]
    fn test_invulnerability_requires_testing_mode() {
        let mut config = CollisionConfig {
            invulnerability_mode: true,
            ..Default::default()
        };
        assert!(!config.effective_invulnerable());
        config.testing_mode = true;
        assert!(config.effective_invulnerable());
    }
}
