//! Notifier backends.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::Command;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::SoundConfig;

/// Desktop notification permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permission {
    /// Not asked yet.
    #[default]
    Default,
    Granted,
    Denied,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("not supported by this notifier")]
    Unsupported,

    #[error("sound playback failed: {0}")]
    PlaybackFailed(String),

    #[error("notification output failed: {0}")]
    Io(#[from] io::Error),
}

/// A way to get the user's attention.
///
/// Chosen once at startup with [`select_notifier`].
pub trait Notifier: Send {
    fn permission(&self) -> Permission;

    /// Ask for permission to show notifications.
    fn request_permission(&mut self) -> Permission;

    /// Show a notification.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError` if the notification could not be shown.
    fn notify(&mut self, title: &str, body: &str) -> Result<(), NotifyError>;

    /// Play the notification sound asset.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError` if no asset is configured or playback fails.
    fn play_sound(&mut self) -> Result<(), NotifyError>;

    /// Play a generated tone. Used when the asset cannot be played.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError` if the tone cannot be produced.
    fn play_tone(&mut self) -> Result<(), NotifyError>;
}

/// Notifies on an interactive terminal.
///
/// Notifications are written as lines, the sound asset is handed to an
/// external player, and the tone is the terminal bell.
pub struct TerminalNotifier {
    out: Box<dyn Write + Send>,
    permission: Permission,
    sound_file: Option<PathBuf>,
    player: Option<String>,
}

impl std::fmt::Debug for TerminalNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalNotifier")
            .field("permission", &self.permission)
            .field("sound_file", &self.sound_file)
            .field("player", &self.player)
            .finish_non_exhaustive()
    }
}

impl TerminalNotifier {
    pub fn new(out: Box<dyn Write + Send>, sound: &SoundConfig) -> Self {
        Self {
            out,
            permission: Permission::Default,
            sound_file: sound.file.clone(),
            player: sound.player.clone(),
        }
    }

    /// Notifier writing to standard error.
    #[must_use]
    pub fn stderr(sound: &SoundConfig) -> Self {
        Self::new(Box::new(io::stderr()), sound)
    }
}

impl Notifier for TerminalNotifier {
    fn permission(&self) -> Permission {
        self.permission
    }

    fn request_permission(&mut self) -> Permission {
        self.permission = Permission::Granted;
        self.permission
    }

    fn notify(&mut self, title: &str, body: &str) -> Result<(), NotifyError> {
        if self.permission != Permission::Granted {
            return Err(NotifyError::Unsupported);
        }
        writeln!(self.out, "[{title}] {body}")?;
        self.out.flush()?;
        Ok(())
    }

    fn play_sound(&mut self) -> Result<(), NotifyError> {
        let (Some(file), Some(player)) = (&self.sound_file, &self.player) else {
            return Err(NotifyError::Unsupported);
        };
        if !file.exists() {
            return Err(NotifyError::PlaybackFailed(format!(
                "sound file {} not found",
                file.display()
            )));
        }

        let mut child = Command::new(player)
            .arg(file)
            .spawn()
            .map_err(|e| NotifyError::PlaybackFailed(format!("{player}: {e}")))?;
        // Reap the player without blocking the caller.
        std::thread::spawn(move || match child.wait() {
            Ok(status) if !status.success() => debug!(%status, "Sound player exited with failure"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to wait for sound player"),
        });
        Ok(())
    }

    fn play_tone(&mut self) -> Result<(), NotifyError> {
        self.out.write_all(b"\x07")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Used when there is nobody to notify. Everything is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn permission(&self) -> Permission {
        Permission::Denied
    }

    fn request_permission(&mut self) -> Permission {
        Permission::Denied
    }

    fn notify(&mut self, _title: &str, _body: &str) -> Result<(), NotifyError> {
        Ok(())
    }

    fn play_sound(&mut self) -> Result<(), NotifyError> {
        Ok(())
    }

    fn play_tone(&mut self) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Pick the notifier for this process.
#[must_use]
pub fn select_notifier(sound: &SoundConfig) -> Box<dyn Notifier> {
    if io::stderr().is_terminal() {
        debug!("Using terminal notifier");
        Box::new(TerminalNotifier::stderr(sound))
    } else {
        debug!("No terminal attached, notifications disabled");
        Box::new(NullNotifier)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_terminal_notifies_only_after_permission() {
        let buf = Buffer::default();
        let mut notifier = TerminalNotifier::new(Box::new(buf.clone()), &SoundConfig::default());

        assert!(matches!(notifier.notify("t", "b"), Err(NotifyError::Unsupported)));
        assert_eq!(notifier.request_permission(), Permission::Granted);
        notifier.notify("New order", "Karaage x2").expect("notify");

        let out = String::from_utf8(buf.0.lock().expect("lock").clone()).expect("utf8");
        assert_eq!(out, "[New order] Karaage x2\n");
    }

    #[test]
    fn test_sound_without_asset_is_unsupported() {
        let mut notifier = TerminalNotifier::new(Box::new(Buffer::default()), &SoundConfig::default());
        assert!(matches!(notifier.play_sound(), Err(NotifyError::Unsupported)));
    }

    #[test]
    fn test_missing_sound_file_fails() {
        let sound = SoundConfig {
            file: Some(PathBuf::from("/nonexistent/bell.wav")),
            player: Some("aplay".to_string()),
        };
        let mut notifier = TerminalNotifier::new(Box::new(Buffer::default()), &sound);
        assert!(matches!(notifier.play_sound(), Err(NotifyError::PlaybackFailed(_))));
    }

    #[test]
    fn test_tone_is_bell() {
        let buf = Buffer::default();
        let mut notifier = TerminalNotifier::new(Box::new(buf.clone()), &SoundConfig::default());
        notifier.play_tone().expect("tone");
        assert_eq!(buf.0.lock().expect("lock").as_slice(), b"\x07");
    }
}
