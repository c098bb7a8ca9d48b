//! Guest cart migration at login.
//!
//! Moves whatever the guest put in their cart into the user cart of the account
//! they just signed into. Two strategies are supported:
//!
//! - [`MigrationStrategy::Replay`] reads the guest cart and adds each line to
//!   the user cart, then consumes the guest line
//! - [`MigrationStrategy::Server`] asks the backend to merge in one call
//!
//! Runs are serialized by a process-wide lock, so a second run always sees the
//! guest cart the first run left behind. Replayed lines are recorded in the
//! session as soon as their add succeeds; a recorded line still sitting in the
//! guest cart is removed on the next run instead of being added again.
//!
//! A guest cart is only merged into a non-empty user cart from the same store.

use std::sync::Arc;

use bento_core::{Cart, CartItemId, CartKind, StoreMismatch};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiError, ApiGateway};
pub use crate::config::MigrationStrategy;
use crate::session::keys;

/// Errors from a migration run.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Nothing was migrated.
    #[error("cart migration failed: {0}")]
    Api(#[from] ApiError),

    /// Some lines moved before a request failed.
    #[error("cart migration stopped after {migrated} line(s): {source}")]
    Partial {
        migrated: u32,
        #[source]
        source: ApiError,
    },

    /// The user cart already holds another store's items.
    #[error(transparent)]
    StoreMismatch(#[from] StoreMismatch),

    /// One of the carts has items whose store could not be determined.
    #[error("cannot tell which store the cart items belong to")]
    UnknownStore,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    pub strategy: MigrationStrategy,
    /// Cart lines moved into the user cart.
    pub migrated_lines: u32,
    /// Units moved. Only known for the replay strategy.
    pub migrated_units: Option<u32>,
}

impl MigrationReport {
    const fn nothing(strategy: MigrationStrategy) -> Self {
        Self {
            strategy,
            migrated_lines: 0,
            migrated_units: Some(0),
        }
    }
}

/// Merges the guest cart into the signed-in user's cart.
#[derive(Debug, Clone)]
pub struct CartMigrationService {
    api: ApiGateway,
    strategy: MigrationStrategy,
    lock: Arc<Mutex<()>>,
}

impl CartMigrationService {
    #[must_use]
    pub fn new(api: ApiGateway, strategy: MigrationStrategy) -> Self {
        Self {
            api,
            strategy,
            lock: Arc::new(Mutex::new(())),
        }
    }

    #[must_use]
    pub const fn strategy(&self) -> MigrationStrategy {
        self.strategy
    }

    /// Run one migration.
    ///
    /// Without a guest session there is nothing to move and the run succeeds
    /// with an empty report.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Api` if nothing could be moved,
    /// `MigrationError::Partial` if the run stopped part way, or a store error
    /// when the guest cart cannot join the user cart.
    #[instrument(skip(self), fields(strategy = %self.strategy))]
    pub async fn migrate(&self) -> Result<MigrationReport, MigrationError> {
        let _guard = self.lock.lock().await;

        if self.api.session().guest_session_id().is_none() {
            debug!("No guest session, nothing to migrate");
            return Ok(MigrationReport::nothing(self.strategy));
        }

        let guest = self.api.guest_cart().await?;
        let guest = self.drop_migrated_lines(guest).await?;
        if guest.is_empty() {
            debug!("Guest cart is empty, nothing to migrate");
            self.forget_guest_snapshot();
            return Ok(MigrationReport::nothing(self.strategy));
        }
        self.check_store(&guest).await?;

        let report = match self.strategy {
            MigrationStrategy::Replay => self.replay(&guest).await?,
            MigrationStrategy::Server => MigrationReport {
                strategy: MigrationStrategy::Server,
                migrated_lines: self.api.migrate_cart().await?,
                migrated_units: None,
            },
        };

        self.forget_guest_snapshot();
        info!(
            lines = report.migrated_lines,
            units = ?report.migrated_units,
            "Guest cart migrated"
        );
        Ok(report)
    }

    /// Remove guest lines an earlier run already copied, and return what is
    /// left of the guest cart.
    async fn drop_migrated_lines(&self, mut guest: Cart) -> Result<Cart, MigrationError> {
        let session = self.api.session();
        let recorded = session.migrated_guest_lines();
        for id in recorded {
            if guest.item(id).is_none() {
                continue;
            }
            debug!(item_id = %id, "Guest line was already migrated, removing it");
            guest = self.api.guest_cart_remove(id).await?;
        }
        if let Err(e) = session.forget_migrated_guest_lines() {
            warn!(error = %e, "Failed to forget migrated guest lines");
        }
        Ok(guest)
    }

    async fn check_store(&self, guest: &Cart) -> Result<(), MigrationError> {
        let user = self.api.user_cart().await?;
        if user.is_empty() {
            return Ok(());
        }
        let (Some(cart_store), Some(menu_store)) = (user.store_id(), guest.store_id()) else {
            warn!("Store of the guest or user cart is unknown, not merging");
            return Err(MigrationError::UnknownStore);
        };
        user.check_store(menu_store)?;
        debug!(store_id = %cart_store, "Guest cart matches the user cart's store");
        Ok(())
    }

    async fn replay(&self, guest: &Cart) -> Result<MigrationReport, MigrationError> {
        let session = self.api.session();
        let lines: Vec<(CartItemId, _, u32)> = guest
            .items()
            .iter()
            .filter(|item| item.available)
            .map(|item| (item.id, item.menu_id, item.quantity))
            .collect();

        let mut migrated_lines = 0;
        let mut migrated_units = 0;
        let mut stranded = 0;
        for (item_id, menu_id, quantity) in lines {
            if let Err(source) = self.api.user_cart_add(menu_id, quantity).await {
                warn!(item_id = %item_id, menu_id = %menu_id, error = %source, "Migration step failed");
                return Err(if migrated_lines == 0 {
                    MigrationError::Api(source)
                } else {
                    MigrationError::Partial {
                        migrated: migrated_lines,
                        source,
                    }
                });
            }
            migrated_lines += 1;
            migrated_units += quantity;

            if let Err(e) = session.record_migrated_guest_line(item_id) {
                warn!(item_id = %item_id, error = %e, "Failed to record migrated guest line");
            }
            match self.api.guest_cart_remove(item_id).await {
                Ok(_) | Err(ApiError::NotFound(_)) => {}
                Err(e) => {
                    warn!(item_id = %item_id, error = %e, "Guest line copied but not removed");
                    stranded += 1;
                }
            }
        }

        if stranded == 0 {
            if let Err(e) = session.forget_migrated_guest_lines() {
                warn!(error = %e, "Failed to forget migrated guest lines");
            }
        } else {
            info!(stranded, "Guest lines left behind are skipped on the next run");
        }

        Ok(MigrationReport {
            strategy: MigrationStrategy::Replay,
            migrated_lines,
            migrated_units: Some(migrated_units),
        })
    }

    fn forget_guest_snapshot(&self) {
        let session = self.api.session();
        if session
            .cart_snapshot()
            .is_some_and(|cart| cart.kind() == CartKind::Guest)
            && let Err(e) = session.clear(Some(&[keys::CART_SNAPSHOT]))
        {
            warn!(error = %e, "Failed to drop guest cart snapshot");
        }
    }
}
