//! Daily verse reminders
//!
//! The [`NotificationScheduler`] asks a [`NotificationSink`] for permission,
//! remembers whether reminders are enabled, and keeps a single background
//! timer that fires at the configured wall-clock time every day.

use crate::clock::{Clock, system_clock};
use crate::daily::DailyVerseTracker;
use crate::error::{ReaderError, ReaderResult};
use crate::storage::KeyValueStore;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const ENABLED_KEY: &str = "quran_notifications_enabled";
pub const PERMISSION_KEY: &str = "quran_notification_permission";

/// Shared tag, so a newer reminder replaces an older one
pub const NOTIFICATION_TAG: &str = "quran-daily-verse";
pub const DEFAULT_ICON: &str = "/icon-192x192.png";
pub const APP_TITLE: &str = "قرآن ریڈر";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    #[default]
    Default,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Granted => write!(f, "granted"),
            Permission::Denied => write!(f, "denied"),
            Permission::Default => write!(f, "default"),
        }
    }
}

impl FromStr for Permission {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "granted" => Ok(Permission::Granted),
            "denied" => Ok(Permission::Denied),
            "default" => Ok(Permission::Default),
            other => Err(ReaderError::Notification(format!(
                "unknown permission '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub tag: String,
}

impl Notification {
    pub fn new(title: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            icon: DEFAULT_ICON.to_string(),
            tag: NOTIFICATION_TAG.to_string(),
        }
    }
}

/// Where notifications end up (desktop, push service, log)
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn is_supported(&self) -> bool;

    fn permission(&self) -> Permission;

    async fn request_permission(&self) -> ReaderResult<Permission>;

    async fn deliver(&self, notification: &Notification) -> ReaderResult<()>;
}

/// Sink that writes notifications to the log; always permitted
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn is_supported(&self) -> bool {
        true
    }

    fn permission(&self) -> Permission {
        Permission::Granted
    }

    async fn request_permission(&self) -> ReaderResult<Permission> {
        Ok(Permission::Granted)
    }

    async fn deliver(&self, notification: &Notification) -> ReaderResult<()> {
        info!(
            title = %notification.title,
            tag = %notification.tag,
            "{}",
            notification.body
        );
        Ok(())
    }
}

/// Recording sink with a scripted permission answer
#[derive(Debug, Clone)]
pub struct MockSink {
    supported: bool,
    answer: Permission,
    permission: Arc<Mutex<Permission>>,
    delivered: Arc<Mutex<Vec<Notification>>>,
}

impl MockSink {
    /// A supported sink that answers permission requests with `answer`
    pub fn new(answer: Permission) -> Self {
        Self {
            supported: true,
            answer,
            permission: Arc::new(Mutex::new(Permission::Default)),
            delivered: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new(Permission::Denied)
        }
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl NotificationSink for MockSink {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn permission(&self) -> Permission {
        if !self.supported {
            return Permission::Denied;
        }
        *self.permission.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn request_permission(&self) -> ReaderResult<Permission> {
        if !self.supported {
            return Err(ReaderError::Notification(
                "notifications are not supported".to_string(),
            ));
        }
        *self.permission.lock().unwrap_or_else(PoisonError::into_inner) = self.answer;
        Ok(self.answer)
    }

    async fn deliver(&self, notification: &Notification) -> ReaderResult<()> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());
        Ok(())
    }
}

/// Next time the wall clock shows `at`, strictly after `now`
pub fn next_occurrence(now: DateTime<Local>, at: NaiveTime) -> DateTime<Local> {
    let today = now.date_naive().and_time(at);
    let target = if today > now.naive_local() {
        today
    } else {
        today + Duration::days(1)
    };
    target
        .and_local_timezone(Local)
        .earliest()
        // The target falls into a DST gap
        .unwrap_or_else(|| now + Duration::days(1))
}

struct SchedulerInner {
    sink: Arc<dyn NotificationSink>,
    store: Arc<dyn KeyValueStore>,
    daily: DailyVerseTracker,
    clock: Clock,
    at: NaiveTime,
}

impl SchedulerInner {
    fn is_enabled(&self) -> bool {
        match self.store.get(ENABLED_KEY) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                warn!(error = %e, "error reading notification flag");
                false
            }
        }
    }

    async fn show(&self, title: &str, body: &str) -> bool {
        if !self.sink.is_supported() || self.sink.permission() != Permission::Granted {
            return false;
        }
        match self.sink.deliver(&Notification::new(title, body)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "error showing notification");
                false
            }
        }
    }

    async fn send_daily(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let number = self.daily.current_number();
        self.show(
            "آج کی آیت - قرآن مجید",
            &format!(
                "آج کی نئی آیت پڑھنے کے لیے ایپ کھولیں (آیت نمبر {})",
                number
            ),
        )
        .await
    }

    async fn run_timer(self: Arc<Self>) {
        loop {
            let now = (self.clock)();
            let next = next_occurrence(now, self.at);
            let wait = (next - now).to_std().unwrap_or_default();
            debug!(%next, "next daily notification");
            tokio::time::sleep(wait).await;
            self.send_daily().await;
        }
    }
}

pub struct NotificationScheduler {
    inner: Arc<SchedulerInner>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationScheduler {
    /// Scheduler firing at `at` local time
    pub fn new(sink: Arc<dyn NotificationSink>, store: Arc<dyn KeyValueStore>, at: NaiveTime) -> Self {
        Self::with_clock(sink, store, at, system_clock())
    }

    pub fn with_clock(
        sink: Arc<dyn NotificationSink>,
        store: Arc<dyn KeyValueStore>,
        at: NaiveTime,
        clock: Clock,
    ) -> Self {
        let daily = DailyVerseTracker::with_clock(store.clone(), clock.clone());
        Self {
            inner: Arc::new(SchedulerInner {
                sink,
                store,
                daily,
                clock,
                at,
            }),
            timer: Mutex::new(None),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.inner.sink.is_supported()
    }

    pub fn permission(&self) -> Permission {
        if !self.is_supported() {
            return Permission::Denied;
        }
        self.inner.sink.permission()
    }

    /// Whether the user turned reminders on
    pub fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }

    pub fn is_armed(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn notification_time(&self) -> NaiveTime {
        self.inner.at
    }

    /// Ask for permission and, once granted, start the daily timer
    pub async fn enable_notifications(&self) -> bool {
        if !self.is_supported() {
            warn!("notifications are not supported by this sink");
            return false;
        }

        let permission = match self.inner.sink.request_permission().await {
            Ok(permission) => permission,
            Err(e) => {
                warn!(error = %e, "error requesting notification permission");
                Permission::Denied
            }
        };
        self.persist(PERMISSION_KEY, &permission.to_string());

        if permission != Permission::Granted {
            warn!(%permission, "notification permission not granted");
            return false;
        }

        self.persist(ENABLED_KEY, "true");
        if let Err(e) = self.arm() {
            warn!(error = %e, "error scheduling notifications");
        }

        self.show_notification(
            APP_TITLE,
            &format!(
                "روزانہ آیات کی اطلاع فعال ہو گئی! آپ کو ہر دن {} بجے نئی آیت کی اطلاع ملے گی۔",
                self.inner.at.format("%H:%M")
            ),
        )
        .await;
        info!(at = %self.inner.at, "daily notifications enabled");
        true
    }

    pub fn disable_notifications(&self) {
        self.persist(ENABLED_KEY, "false");
        self.cancel();
        info!("daily notifications disabled");
    }

    /// Deliver immediately, if supported and permitted
    pub async fn show_notification(&self, title: &str, body: &str) -> bool {
        self.inner.show(title, body).await
    }

    pub async fn test_notification(&self) -> bool {
        self.show_notification(
            "ٹیسٹ اطلاع",
            "یہ ایک ٹیسٹ اطلاع ہے - آپ کی اطلاعات کام کر رہی ہیں!",
        )
        .await
    }

    /// Re-arm the timer after a restart when reminders were left enabled
    pub fn restore(&self) -> ReaderResult<bool> {
        if !self.is_enabled() || self.permission() != Permission::Granted {
            return Ok(false);
        }
        self.arm()?;
        Ok(true)
    }

    fn arm(&self) -> ReaderResult<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ReaderError::Notification(format!("no async runtime: {}", e)))?;
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = timer.take() {
            previous.abort();
        }
        *timer = Some(runtime.spawn(self.inner.clone().run_timer()));
        Ok(())
    }

    fn cancel(&self) {
        if let Some(handle) = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.inner.store.set(key, value) {
            warn!(key, error = %e, "error saving notification setting");
        }
    }
}

impl Drop for NotificationScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for NotificationScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationScheduler")
            .field("at", &self.inner.at)
            .field("armed", &self.is_armed())
            .finish()
    }
}
