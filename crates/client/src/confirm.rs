//! Explicit confirmation for destructive actions.
//!
//! Cancelling an order, deleting a cart line, clearing a cart and checking out
//! all ask a [`Confirm`] before any request is sent.

/// Something that can answer a yes/no question.
pub trait Confirm {
    /// Return `true` to proceed.
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Answers yes to everything (`--yes` on the command line).
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, _prompt: &str) -> bool {
        true
    }
}

/// Result of an action that needed confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmed<T> {
    Done(T),
    /// The user said no; nothing was sent.
    Declined,
}

impl<T> Confirmed<T> {
    #[must_use]
    pub const fn is_declined(&self) -> bool {
        matches!(self, Self::Declined)
    }

    /// The value if the action went ahead.
    #[must_use]
    pub fn done(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            Self::Declined => None,
        }
    }
}
