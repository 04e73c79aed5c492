use std::{sync::Arc, time::Duration};

use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

pub const DEFAULT_NOTIFICATION_DURATION: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(pub Uuid);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NotificationVariant {
    #[default]
    Default,
    Success,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: Option<String>,
    pub variant: NotificationVariant,
    /// `None` keeps the notification until it is dismissed.
    pub duration: Option<Duration>,
}

impl Notification {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            variant: NotificationVariant::Default,
            duration: Some(DEFAULT_NOTIFICATION_DURATION),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(title)
            .with_description(description)
            .with_variant(NotificationVariant::Destructive)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_variant(mut self, variant: NotificationVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }

    pub fn sticky(self) -> Self {
        self.with_duration(None)
    }
}

#[derive(Debug, Clone)]
pub struct ActiveNotification {
    pub id: NotificationId,
    pub notification: Notification,
}

#[derive(Debug, Clone)]
pub enum NotificationEvent {
    Shown(ActiveNotification),
    Dismissed(NotificationId),
}

/// Transient, user-visible notifications with timed auto-dismissal.
#[derive(Clone)]
pub struct NotificationCenter {
    active: Arc<Mutex<Vec<ActiveNotification>>>,
    events: broadcast::Sender<NotificationEvent>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationCenter {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            active: Arc::new(Mutex::new(Vec::new())),
            events,
        }
    }

    /// Shows a notification; timed ones are dismissed by a background task.
    pub async fn push(&self, notification: Notification) -> NotificationId {
        let id = NotificationId(Uuid::new_v4());
        let duration = notification.duration;
        let entry = ActiveNotification { id, notification };
        self.active.lock().await.push(entry.clone());
        let _ = self.events.send(NotificationEvent::Shown(entry));

        if let Some(duration) = duration {
            let center = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                center.dismiss(id).await;
            });
        }
        id
    }

    /// Returns false when the notification was already gone.
    pub async fn dismiss(&self, id: NotificationId) -> bool {
        let removed = {
            let mut active = self.active.lock().await;
            let before = active.len();
            active.retain(|entry| entry.id != id);
            active.len() != before
        };
        if removed {
            let _ = self.events.send(NotificationEvent::Dismissed(id));
        }
        removed
    }

    pub async fn active(&self) -> Vec<ActiveNotification> {
        self.active.lock().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/notifications_tests.rs"]
mod tests;
