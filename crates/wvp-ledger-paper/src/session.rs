use std::sync::{Mutex, MutexGuard, PoisonError};

use wvp_execution::{ConnectionSession, LedgerError};
use wvp_schemas::Identity;

/// Wallet stand-in with one account.
///
/// `current_identity` is the silent check (no prompt); `connect` is the
/// explicit request and may be refused.
#[derive(Debug)]
pub struct PaperSession {
    account: Identity,
    connected: Mutex<bool>,
    refuse: bool,
}

impl PaperSession {
    /// Not yet connected; `connect` grants the account.
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: Identity::new(account),
            connected: Mutex::new(false),
            refuse: false,
        }
    }

    /// Already authorized, as when the wallet remembers the site.
    pub fn connected(account: impl Into<String>) -> Self {
        let s = Self::new(account);
        *s.flag() = true;
        s
    }

    /// Refuses every connection request.
    pub fn refusing(account: impl Into<String>) -> Self {
        Self {
            refuse: true,
            ..Self::new(account)
        }
    }

    pub fn disconnect(&self) {
        *self.flag() = false;
    }

    fn flag(&self) -> MutexGuard<'_, bool> {
        self.connected.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl ConnectionSession for PaperSession {
    fn current_identity(&self) -> Option<Identity> {
        (*self.flag()).then(|| self.account.clone())
    }

    async fn connect(&self) -> Result<Identity, LedgerError> {
        if self.refuse {
            return Err(LedgerError::Rejected("user rejected the request".to_string()));
        }
        *self.flag() = true;
        Ok(self.account.clone())
    }
}
