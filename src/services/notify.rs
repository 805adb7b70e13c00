//! Out-of-band delivery of OTP codes and password-reset notices.
//!
//! Actual delivery (mail, SMS) lives outside this service; `LogNotifier` only records that a
//! delivery was requested.
use async_trait::async_trait;
use tracing::{debug, info};

use crate::repos::store::{Account, OtpChallenge};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_otp(&self, account: &Account, challenge: &OtpChallenge);

    async fn send_password_reset(&self, account: &Account);
}

#[derive(Clone, Debug, Default)]
pub struct LogNotifier {
    // Print OTP codes at debug level (development only).
    reveal_codes: bool,
}

impl LogNotifier {
    pub fn new(reveal_codes: bool) -> Self {
        Self { reveal_codes }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_otp(&self, account: &Account, challenge: &OtpChallenge) {
        info!(
            account_id = %account.id,
            session_id = %challenge.id,
            expires_at = %challenge.expires_at,
            "otp delivery requested"
        );
        if self.reveal_codes {
            debug!(session_id = %challenge.id, code = %challenge.code, "otp code");
        }
    }

    async fn send_password_reset(&self, account: &Account) {
        info!(account_id = %account.id, "password reset notification requested");
    }
}

/// Keeps every delivery in memory so tests can read the codes back.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    codes: std::sync::Mutex<Vec<(uuid::Uuid, String)>>,
    resets: std::sync::Mutex<Vec<uuid::Uuid>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn code_for(&self, session_id: uuid::Uuid) -> Option<String> {
        self.codes
            .lock()
            .expect("lock")
            .iter()
            .find(|(id, _)| *id == session_id)
            .map(|(_, code)| code.clone())
    }

    pub fn resets(&self) -> Vec<uuid::Uuid> {
        self.resets.lock().expect("lock").clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_otp(&self, _account: &Account, challenge: &OtpChallenge) {
        self.codes
            .lock()
            .expect("lock")
            .push((challenge.id, challenge.code.clone()));
    }

    async fn send_password_reset(&self, account: &Account) {
        self.resets.lock().expect("lock").push(account.id);
    }
}
