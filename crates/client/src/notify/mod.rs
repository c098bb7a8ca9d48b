//! New-order notifications and the unread counter.
//!
//! [`NotificationManager`] decides *whether* and *how* to alert staff; the
//! [`Notifier`] it holds does the actual alerting. For each new order it
//! shows a notification (when permitted), plays a sound (when enabled) and
//! bumps the unread counter, in that order.

mod notifier;

pub use notifier::{NotifyError, Notifier, NullNotifier, Permission, TerminalNotifier, select_notifier};

use bento_core::Order;
use tracing::{debug, info, instrument, warn};

use crate::session::SessionStore;

/// Badge text cap.
pub const BADGE_CAP: u32 = 99;

/// How a sound request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundOutcome {
    Asset,
    /// The asset failed and the generated tone played instead.
    Tone,
    /// Both the asset and the tone failed.
    Failed,
}

/// What a single new-order alert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub desktop: bool,
    /// `None` when sound is disabled.
    pub sound: Option<SoundOutcome>,
    pub unread: u32,
}

/// Alerts staff about new orders and tracks how many are unread.
pub struct NotificationManager {
    notifier: Box<dyn Notifier>,
    session: SessionStore,
    unread: u32,
    permission_requested: bool,
    banner_answered: bool,
    base_title: String,
}

impl std::fmt::Debug for NotificationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationManager")
            .field("permission", &self.notifier.permission())
            .field("unread", &self.unread)
            .field("permission_requested", &self.permission_requested)
            .finish_non_exhaustive()
    }
}

impl NotificationManager {
    pub fn new(notifier: Box<dyn Notifier>, session: SessionStore, base_title: impl Into<String>) -> Self {
        Self {
            notifier,
            session,
            unread: 0,
            permission_requested: false,
            banner_answered: false,
            base_title: base_title.into(),
        }
    }

    #[must_use]
    pub fn permission(&self) -> Permission {
        self.notifier.permission()
    }

    // =========================================================================
    // Permission banner
    // =========================================================================

    /// Whether to show the "enable notifications" banner.
    #[must_use]
    pub fn show_permission_banner(&self) -> bool {
        !self.banner_answered && self.notifier.permission() == Permission::Default
    }

    /// The user accepted the banner. Permission is requested at most once per
    /// session; when granted a test notification is sent.
    pub fn accept_banner(&mut self) -> Permission {
        self.banner_answered = true;
        if self.permission_requested {
            return self.notifier.permission();
        }
        self.permission_requested = true;

        let permission = self.notifier.request_permission();
        info!(?permission, "Notification permission answered");
        if permission == Permission::Granted
            && let Err(e) = self
                .notifier
                .notify("Notifications enabled", "You will be alerted when new orders arrive.")
        {
            warn!(error = %e, "Test notification failed");
        }
        permission
    }

    pub fn dismiss_banner(&mut self) {
        self.banner_answered = true;
    }

    // =========================================================================
    // Alerts
    // =========================================================================

    /// Alert about one new order.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub fn notify_new_order(&mut self, order: &Order) -> Delivery {
        let desktop = self.notifier.permission() == Permission::Granted && {
            let title = format!("New order #{}", order.id);
            let body = format!(
                "{} x{} ({}) - {}",
                order.menu_name, order.quantity, order.total_amount, order.customer_name
            );
            match self.notifier.notify(&title, &body) {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Notification failed");
                    false
                }
            }
        };

        let sound = self.session.sound_enabled().then(|| self.play_sound());

        self.unread = self.unread.saturating_add(1);
        debug!(unread = self.unread, desktop, ?sound, "New order alerted");
        Delivery {
            desktop,
            sound,
            unread: self.unread,
        }
    }

    /// Play the asset, falling back to the tone once.
    fn play_sound(&mut self) -> SoundOutcome {
        let Err(asset) = self.notifier.play_sound() else {
            return SoundOutcome::Asset;
        };
        debug!(error = %asset, "Sound asset failed, falling back to tone");
        match self.notifier.play_tone() {
            Ok(()) => SoundOutcome::Tone,
            Err(e) => {
                warn!(error = %e, "Notification tone failed");
                SoundOutcome::Failed
            }
        }
    }

    // =========================================================================
    // Sound preference
    // =========================================================================

    #[must_use]
    pub fn sound_enabled(&self) -> bool {
        self.session.sound_enabled()
    }

    /// Persist the sound preference; enabling plays a test sound.
    pub fn set_sound_enabled(&mut self, enabled: bool) -> bool {
        if let Err(e) = self.session.set_sound_enabled(enabled) {
            warn!(error = %e, "Failed to persist sound preference");
        }
        if enabled {
            self.play_sound();
        }
        info!(enabled, "Notification sound preference changed");
        enabled
    }

    /// Flip the sound preference and return the new value.
    pub fn toggle_sound(&mut self) -> bool {
        let enabled = !self.sound_enabled();
        self.set_sound_enabled(enabled)
    }

    // =========================================================================
    // Unread counter
    // =========================================================================

    #[must_use]
    pub const fn unread_count(&self) -> u32 {
        self.unread
    }

    /// One unread order was handled.
    pub const fn decrement_unread(&mut self) {
        self.unread = self.unread.saturating_sub(1);
    }

    pub const fn reset_unread(&mut self) {
        self.unread = 0;
    }

    /// Badge text, or `None` when there is nothing unread.
    #[must_use]
    pub fn badge_text(&self) -> Option<String> {
        match self.unread {
            0 => None,
            n if n > BADGE_CAP => Some(format!("{BADGE_CAP}+")),
            n => Some(n.to_string()),
        }
    }

    /// Window title with the unread count prefixed.
    #[must_use]
    pub fn window_title(&self) -> String {
        if self.unread == 0 {
            self.base_title.clone()
        } else {
            format!("({}) {}", self.unread, self.base_title)
        }
    }
}
