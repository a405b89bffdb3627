//! Data models for tasks, lists, settings and the remote snapshot document
//!
//! Timestamps are `DateTime<Utc>` held at millisecond precision, which is
//! exactly what the ISO-8601 wire format can carry.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Current time truncated to milliseconds
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Fresh record identifier
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// ISO-8601 (de)serialization with millisecond precision and a `Z` suffix
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Parse an RFC 3339 timestamp, dropping anything finer than a millisecond
    pub fn parse(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(raw).map(|ts| ts.with_timezone(&Utc).trunc_subsecs(3))
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(D::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

        pub fn serialize<S: Serializer>(
            ts: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match ts {
                Some(ts) => serializer.serialize_str(&super::format(ts)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| super::parse(&raw).map_err(D::Error::custom))
                .transpose()
        }
    }
}

/// Completion state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    /// The opposite status
    pub fn toggled(self) -> Self {
        match self {
            Self::Pending => Self::Completed,
            Self::Completed => Self::Pending,
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// Priority level for tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown priority: {other} (expected low, medium or high)")),
        }
    }
}

/// A task/todo item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    pub list_id: String,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Change status, keeping `completed_at` in step with it
    pub fn set_status(&mut self, status: TaskStatus, at: DateTime<Utc>) {
        self.status = status;
        self.completed_at = match status {
            TaskStatus::Completed => Some(at),
            TaskStatus::Pending => None,
        };
    }
}

/// A list that contains tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskList {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// UI theme preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(format!("unknown theme: {other}")),
        }
    }
}

/// Which tasks the completion progress is computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressScope {
    All,
    #[default]
    Current,
}

impl FromStr for ProgressScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "current" => Ok(Self::Current),
            other => Err(format!("unknown progress scope: {other}")),
        }
    }
}

/// WebDAV connection settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDavConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub enabled: bool,
}

impl WebDavConfig {
    /// Enabled and every credential field filled in
    pub fn is_usable(&self) -> bool {
        self.enabled
            && !self.url.trim().is_empty()
            && !self.username.is_empty()
            && !self.password.is_empty()
    }
}

/// Application settings, persisted as a singleton record
///
/// Missing fields fall back to their defaults when loading, so settings
/// written by older versions keep working.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    pub theme: Theme,
    pub webdav: WebDavConfig,
    pub auto_sync: bool,
    pub progress_scope: ProgressScope,
}

/// State of the synchronizer, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Success,
    Error,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Success => "success",
            Self::Error => "error",
        })
    }
}

/// The full dataset exchanged during a sync
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub tasks: Vec<Task>,
    pub lists: Vec<TaskList>,
}

impl Snapshot {
    /// First task or list id that occurs more than once
    pub fn duplicate_id(&self) -> Option<&str> {
        let mut tasks = HashSet::new();
        let mut lists = HashSet::new();
        self.tasks
            .iter()
            .map(|t| t.id.as_str())
            .find(|id| !tasks.insert(*id))
            .or_else(|| {
                self.lists
                    .iter()
                    .map(|l| l.id.as_str())
                    .find(|id| !lists.insert(*id))
            })
    }
}

/// The JSON document stored on the WebDAV server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    pub tasks: Vec<Task>,
    pub lists: Vec<TaskList>,
    #[serde(with = "timestamp")]
    pub last_sync: DateTime<Utc>,
}

impl RemoteDocument {
    pub fn new(snapshot: Snapshot, last_sync: DateTime<Utc>) -> Self {
        Self {
            tasks: snapshot.tasks,
            lists: snapshot.lists,
            last_sync,
        }
    }

    pub fn into_snapshot(self) -> Snapshot {
        Snapshot {
            tasks: self.tasks,
            lists: self.lists,
        }
    }
}

/// Completion counters for a set of tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    /// Rounded percentage, 0 when there are no tasks
    pub completion_rate: u32,
}

impl TaskStats {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let (total, completed) = tasks.into_iter().fold((0, 0), |(total, done), task| {
            (total + 1, done + usize::from(task.is_completed()))
        });
        let completion_rate = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        };

        Self {
            total,
            completed,
            pending: total - completed,
            completion_rate,
        }
    }
}
