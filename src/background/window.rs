use anyhow::{Context, Result};
use opencv::{core::Mat, highgui};

use crate::shared::constants;

/// Where a display thread puts its frames.
pub trait Screen {
    fn open(&mut self) -> Result<()>;
    fn show(&mut self, frame: &Mat) -> Result<()>;
    /// Pump window events for `delay_ms`; true when the quit key was hit.
    fn poll_quit(&mut self, delay_ms: i32) -> Result<bool>;
    /// Never fails; runs on error exits as well.
    fn close(&mut self);
}

/// Named highgui window stretched over the whole display.
pub struct FullscreenWindow {
    name: &'static str,
}

impl FullscreenWindow {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl Screen for FullscreenWindow {
    fn open(&mut self) -> Result<()> {
        highgui::named_window(self.name, highgui::WINDOW_NORMAL)
            .with_context(|| format!("Failed to create window '{}'", self.name))?;
        highgui::set_window_property(
            self.name,
            highgui::WND_PROP_FULLSCREEN,
            highgui::WINDOW_FULLSCREEN as f64,
        )
        .with_context(|| format!("Failed to make window '{}' fullscreen", self.name))?;
        Ok(())
    }

    fn show(&mut self, frame: &Mat) -> Result<()> {
        highgui::imshow(self.name, frame)
            .with_context(|| format!("Failed to show frame in '{}'", self.name))
    }

    fn poll_quit(&mut self, delay_ms: i32) -> Result<bool> {
        Ok(is_quit_key(highgui::wait_key(delay_ms)?))
    }

    /// The trailing `wait_key` lets the GUI backend process the close.
    fn close(&mut self) {
        let _ = highgui::destroy_window(self.name);
        let _ = highgui::wait_key(1);
    }
}

pub fn is_quit_key(code: i32) -> bool {
    code >= 0 && (code & 0xFF) as u8 == constants::QUIT_KEY
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use anyhow::anyhow;
    use opencv::core::{mean, no_array};

    /// Records what a display thread did. `fail_show_at` makes the n-th
    /// show (1-based) fail; `quit_after` reports the quit key after that many
    /// shows.
    #[derive(Default)]
    pub struct RecordingScreen {
        pub events: Vec<String>,
        /// Mean of the first channel of every frame shown.
        pub shown: Vec<f64>,
        pub fail_show_at: Option<usize>,
        pub quit_after: Option<usize>,
    }

    impl Screen for RecordingScreen {
        fn open(&mut self) -> Result<()> {
            self.events.push("open".to_string());
            Ok(())
        }

        fn show(&mut self, frame: &Mat) -> Result<()> {
            if self.fail_show_at == Some(self.shown.len() + 1) {
                self.events.push("show failed".to_string());
                return Err(anyhow!("display went away"));
            }
            self.shown.push(mean(frame, &no_array())?[0]);
            self.events.push("show".to_string());
            Ok(())
        }

        fn poll_quit(&mut self, _delay_ms: i32) -> Result<bool> {
            Ok(self.quit_after.map_or(false, |n| self.shown.len() >= n))
        }

        fn close(&mut self) {
            self.events.push("close".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_key_ignores_modifier_bits() {
        assert!(is_quit_key(b'q' as i32));
        assert!(is_quit_key(0x10_0000 | b'q' as i32));
        assert!(!is_quit_key(b'Q' as i32));
        assert!(!is_quit_key(-1));
        assert!(!is_quit_key(27));
    }
}
