//! Account profile: read it, change name, email or password, and keep the
//! local session in step with what the backend stored.

use std::sync::Arc;

use shared::protocol::{ProfileUpdate, UserProfile};
use tracing::{debug, info, warn};

use crate::{
    error::ClientError,
    notifications::{Notification, NotificationCenter, NotificationVariant},
    session::{Session, SessionContext},
    transport::ProfileApi,
};

pub const PROFILE_UPDATED: &str = "Profile updated successfully!";
pub const PASSWORD_MISMATCH: &str = "Passwords do not match";

/// Edit submitted from the profile form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileChange {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Empty keeps the current password.
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

impl ProfileChange {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Checks the change locally and builds the request body.
    pub fn to_update(&self) -> Result<ProfileUpdate, ClientError> {
        let password = non_blank(&self.password);
        if let Some(password) = &password {
            if self.confirm_password.as_deref() != Some(password.as_str()) {
                return Err(ClientError::invalid_input(PASSWORD_MISMATCH));
            }
        }
        let update = ProfileUpdate {
            name: non_blank(&self.name).map(|name| name.trim().to_string()),
            email: non_blank(&self.email).map(|email| email.trim().to_string()),
            password,
        };
        if update == ProfileUpdate::default() {
            return Err(ClientError::invalid_input("nothing to update"));
        }
        Ok(update)
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value.clone().filter(|value| !value.trim().is_empty())
}

/// The stored credential survives unless the backend hands out a new one.
fn merge_into_session(current: Session, profile: UserProfile) -> Session {
    Session {
        user_id: profile.user_id,
        name: profile.name,
        email: profile.email,
        token: profile
            .token
            .filter(|token| !token.is_empty())
            .unwrap_or(current.token),
    }
}

pub struct ProfileService {
    api: Arc<dyn ProfileApi>,
    session: Arc<SessionContext>,
    notifications: NotificationCenter,
}

impl ProfileService {
    pub fn new(
        api: Arc<dyn ProfileApi>,
        session: Arc<SessionContext>,
        notifications: NotificationCenter,
    ) -> Self {
        Self {
            api,
            session,
            notifications,
        }
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub async fn load(&self) -> Result<UserProfile, ClientError> {
        if !self.session.is_authenticated().await {
            return Err(ClientError::NoSession);
        }
        match self.api.get_profile().await {
            Ok(profile) => {
                debug!(user_id = %profile.user_id, "profile: loaded");
                Ok(profile)
            }
            Err(err) => {
                self.report_failure(&err).await;
                Err(err)
            }
        }
    }

    /// Sends `change` and replaces the session with the merged result.
    pub async fn update(&self, change: &ProfileChange) -> Result<Session, ClientError> {
        let update = match change.to_update() {
            Ok(update) => update,
            Err(err) => {
                self.report_failure(&err).await;
                return Err(err);
            }
        };
        let current = self.session.current().await.ok_or(ClientError::NoSession)?;

        let profile = match self.api.update_profile(&update).await {
            Ok(profile) => profile,
            Err(err) => {
                self.report_failure(&err).await;
                return Err(err);
            }
        };

        let merged = merge_into_session(current, profile);
        if let Err(err) = self.session.establish(merged.clone()).await {
            let err = ClientError::SessionStore(format!("{err:#}"));
            self.report_failure(&err).await;
            return Err(err);
        }
        info!(
            user_id = %merged.user_id,
            password_changed = update.password.is_some(),
            "profile: updated"
        );
        self.notifications
            .push(
                Notification::new("Success")
                    .with_description(PROFILE_UPDATED)
                    .with_variant(NotificationVariant::Success),
            )
            .await;
        Ok(merged)
    }

    async fn report_failure(&self, err: &ClientError) {
        // Expiry is announced by the session itself.
        if err.requires_reauth() {
            return;
        }
        warn!(error = %err, "profile: request failed");
        self.notifications
            .push(Notification::error("Error", err.user_message()))
            .await;
    }
}

#[cfg(test)]
#[path = "tests/profile_tests.rs"]
mod tests;
