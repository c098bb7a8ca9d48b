//! Command implementations.

pub mod cart;
pub mod orders;
pub mod session;

use std::io::{self, BufRead, Write};

use bento_client::notify::select_notifier;
use bento_client::{
    ApiGateway, AuthService, CartMigrationService, ClientConfig, Confirm, NotificationManager, SessionStore,
};

/// Everything a command needs.
pub struct Context {
    pub config: ClientConfig,
    pub api: ApiGateway,
    yes: bool,
}

impl Context {
    pub fn from_env(yes: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let config = ClientConfig::from_env()?;
        let session = SessionStore::open(config.session_file());
        let api = ApiGateway::new(&config, session)?;
        Ok(Self { config, api, yes })
    }

    pub fn session(&self) -> &SessionStore {
        self.api.session()
    }

    pub fn auth(&self) -> AuthService {
        let migration = CartMigrationService::new(self.api.clone(), self.config.migration_strategy);
        AuthService::new(self.api.clone(), migration, self.config.migration_timeout)
    }

    pub fn notifications(&self) -> NotificationManager {
        NotificationManager::new(select_notifier(&self.config.sound), self.session().clone(), "Bento orders")
    }

    /// Confirmation source for destructive commands.
    pub const fn confirm(&self) -> Prompt {
        Prompt { yes: self.yes }
    }
}

/// Asks on the terminal unless `--yes` was given.
pub struct Prompt {
    yes: bool,
}

impl Confirm for Prompt {
    #[allow(clippy::print_stderr)]
    fn confirm(&mut self, prompt: &str) -> bool {
        if self.yes {
            return true;
        }
        eprint!("{prompt} [y/N] ");
        let _ = io::stderr().flush();
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}
