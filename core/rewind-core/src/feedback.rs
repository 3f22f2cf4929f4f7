//! Audio feedback for replay buffer events.
//!
//! Each enabled event plays its sound on a short-lived thread so a slow or
//! hung player never blocks event delivery.

use crate::config::SharedConfig;
use rewind_daemon_protocol::BufferEvent;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub trait FeedbackSink: Send + Sync {
    fn on_buffer_event(&self, event: BufferEvent);
}

/// Ignores every event.
#[derive(Debug, Clone, Default)]
pub struct SilentFeedback;

impl FeedbackSink for SilentFeedback {
    fn on_buffer_event(&self, _event: BufferEvent) {}
}

/// Runs the configured player with the event's sound file appended.
pub struct CommandFeedback {
    config: Arc<SharedConfig>,
}

impl CommandFeedback {
    pub fn new(config: Arc<SharedConfig>) -> Self {
        Self { config }
    }

    /// Spawns the player for `event` if it has an enabled sound. The handle
    /// is only useful to tests; callers normally drop it.
    pub fn play(&self, event: BufferEvent) -> Option<JoinHandle<()>> {
        let feedback = self.config.current().feedback;
        let sound = match event {
            BufferEvent::Started if feedback.voice_start => feedback.start_sound,
            BufferEvent::Stopped if feedback.voice_stop => feedback.stop_sound,
            BufferEvent::Saved if feedback.voice_save => feedback.saved_sound,
            _ => None,
        }?;

        let Some((program, args)) = feedback.player.split_first() else {
            tracing::debug!(event = %event, "No audio player configured; skipping feedback");
            return None;
        };
        let program = program.clone();
        let args = args.to_vec();

        Some(thread::spawn(move || play_sound(&program, &args, sound)))
    }
}

impl FeedbackSink for CommandFeedback {
    fn on_buffer_event(&self, event: BufferEvent) {
        let _ = self.play(event);
    }
}

fn play_sound(program: &str, args: &[String], sound: PathBuf) {
    let result = Command::new(program)
        .args(args)
        .arg(&sound)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match result {
        Ok(status) if status.success() => {}
        Ok(status) => {
            tracing::warn!(sound = %sound.display(), %status, "Audio player exited unsuccessfully")
        }
        Err(err) => {
            tracing::warn!(sound = %sound.display(), error = %err, "Failed to launch audio player")
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::{FeedbackConfig, RewindConfig};

    fn feedback_with(feedback: FeedbackConfig) -> CommandFeedback {
        let config = RewindConfig {
            feedback,
            ..RewindConfig::default()
        };
        CommandFeedback::new(Arc::new(SharedConfig::in_memory(config)))
    }

    #[test]
    fn plays_configured_sound_for_saved_event() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let marker = temp_dir.path().join("saved.marker");
        let feedback = feedback_with(FeedbackConfig {
            player: vec!["touch".to_string()],
            saved_sound: Some(marker.clone()),
            ..FeedbackConfig::default()
        });

        let handle = feedback.play(BufferEvent::Saved).expect("player spawned");
        handle.join().expect("join player");
        assert!(marker.exists());
    }

    #[test]
    fn disabled_toggle_skips_playback() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let feedback = feedback_with(FeedbackConfig {
            voice_stop: false,
            player: vec!["touch".to_string()],
            stop_sound: Some(temp_dir.path().join("stop.marker")),
            ..FeedbackConfig::default()
        });
        assert!(feedback.play(BufferEvent::Stopped).is_none());
    }

    #[test]
    fn transition_begin_events_have_no_sound() {
        let feedback = feedback_with(FeedbackConfig {
            player: vec!["true".to_string()],
            start_sound: Some(PathBuf::from("/sounds/start.wav")),
            ..FeedbackConfig::default()
        });
        assert!(feedback.play(BufferEvent::Starting).is_none());
        assert!(feedback.play(BufferEvent::Stopping).is_none());
    }

    #[test]
    fn missing_player_or_sound_skips_playback() {
        let no_player = feedback_with(FeedbackConfig {
            start_sound: Some(PathBuf::from("/sounds/start.wav")),
            ..FeedbackConfig::default()
        });
        assert!(no_player.play(BufferEvent::Started).is_none());

        let no_sound = feedback_with(FeedbackConfig {
            player: vec!["true".to_string()],
            ..FeedbackConfig::default()
        });
        assert!(no_sound.play(BufferEvent::Started).is_none());
    }
}
