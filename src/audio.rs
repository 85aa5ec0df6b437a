//! Fire-and-forget sound triggers
//!
//! The simulation calls [`AudioSink::play`] and never waits on or branches
//! over the result. Playback itself belongs to a frontend.

use serde::{Deserialize, Serialize};

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundEffect {
    /// Tank fires a shell
    Fire,
    /// Shell ricochets off a wall
    Bounce,
    /// Shell stopped by a wall
    BulletHitWall,
    /// Shell hits a destructible block or a container
    BulletHitBrick,
    /// Tank destroyed
    PlayerDied,
    /// Speed powerup collected
    PowerupSpeed,
    /// Bounce powerup collected
    PowerupBounce,
    /// Extra bullet powerup collected
    PowerupBullet,
}

impl SoundEffect {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoundEffect::Fire => "fire",
            SoundEffect::Bounce => "bounce",
            SoundEffect::BulletHitWall => "bullet_hit_wall",
            SoundEffect::BulletHitBrick => "bullet_hit_brick",
            SoundEffect::PlayerDied => "player_died",
            SoundEffect::PowerupSpeed => "powerup_speed",
            SoundEffect::PowerupBounce => "powerup_bounce",
            SoundEffect::PowerupBullet => "powerup_bullet",
        }
    }
}

/// Receiver for sound triggers
pub trait AudioSink {
    fn play(&mut self, effect: SoundEffect);
}

/// Discards every trigger
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn play(&mut self, _effect: SoundEffect) {}
}

/// Writes triggers to the log (headless runs)
#[derive(Debug, Clone, Default)]
pub struct LogAudio {
    muted: bool,
    played: u64,
}

impl LogAudio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mute/unmute all audio
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Triggers received while unmuted
    pub fn played(&self) -> u64 {
        self.played
    }
}

impl AudioSink for LogAudio {
    fn play(&mut self, effect: SoundEffect) {
        if self.muted {
            return;
        }
        self.played += 1;
        log::trace!("sound: {}", effect.as_str());
    }
}

/// Records triggers in order, for tests and replays
impl AudioSink for Vec<SoundEffect> {
    fn play(&mut self, effect: SoundEffect) {
        self.push(effect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_keeps_order() {
        let mut sink: Vec<SoundEffect> = Vec::new();
        sink.play(SoundEffect::Fire);
        sink.play(SoundEffect::Bounce);
        assert_eq!(sink, vec![SoundEffect::Fire, SoundEffect::Bounce]);
    }

    #[test]
    fn test_log_audio_mute() {
        let mut audio = LogAudio::new();
        audio.play(SoundEffect::PlayerDied);
        audio.set_muted(true);
        audio.play(SoundEffect::PlayerDied);
        assert_eq!(audio.played(), 1);
    }
}
