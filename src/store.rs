//! Application store: CRUD over tasks and lists, settings, and sync
//!
//! Every mutation writes the record store first and only then touches the
//! in-memory state, so a failed write never leaves the two apart. Each
//! operation reports its outcome through the notifier as well as its
//! return value.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    AppSettings, Priority, ProgressScope, SyncStatus, Task, TaskList, TaskStatus, Theme,
    WebDavConfig, new_id, now,
};
use crate::notify::{Notification, Notifier};
use crate::state::AppState;
use crate::sync::{SyncReport, Synchronizer};
use crate::webdav::{RemoteTransport, WebDavClient};

const DEFAULT_LIST_NAME: &str = "My Tasks";
const DEFAULT_LIST_DESCRIPTION: &str = "Default task list";
const DEFAULT_LIST_COLOR: &str = "#3b82f6";

/// Input for [`App::create_task`]
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub content: Option<String>,
    /// Defaults to the selected list
    pub list_id: Option<String>,
    /// Defaults to medium
    pub priority: Option<Priority>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn in_list(mut self, list_id: impl Into<String>) -> Self {
        self.list_id = Some(list_id.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Input for [`App::create_list`]
#[derive(Debug, Clone, Default)]
pub struct NewList {
    /// Generated when absent
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

impl NewList {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// Partial task update; `None` leaves a field alone
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    /// `Some(None)` clears the content
    pub content: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub list_id: Option<String>,
}

/// Partial list update; `None` leaves a field alone
#[derive(Debug, Clone, Default)]
pub struct ListUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub color: Option<Option<String>>,
}

/// Partial settings update; `None` leaves a field alone
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub theme: Option<Theme>,
    pub webdav: Option<WebDavConfig>,
    pub auto_sync: Option<bool>,
    pub progress_scope: Option<ProgressScope>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: &str, what: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::validation(format!("{what} must not be empty")));
    }
    Ok(value.to_string())
}

/// The application: record store, in-memory state, remote transport and
/// synchronizer under one owner
pub struct App<R: RemoteTransport = WebDavClient> {
    store: Database,
    remote: R,
    state: AppState,
    sync: Synchronizer,
    notifier: Box<dyn Notifier>,
    initialized: bool,
}

impl<R: RemoteTransport> App<R> {
    pub fn new(store: Database, remote: R, notifier: Box<dyn Notifier>) -> Self {
        Self {
            store,
            remote,
            state: AppState::default(),
            sync: Synchronizer::new(),
            notifier,
            initialized: false,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn store(&self) -> &Database {
        &self.store
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.sync.status()
    }

    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.sync.last_sync()
    }

    pub fn subscribe_sync(&mut self) -> mpsc::UnboundedReceiver<SyncStatus> {
        self.sync.subscribe()
    }

    pub fn is_remote_configured(&self) -> bool {
        self.remote.is_configured()
    }

    fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }

    /// Turn an operation result into a notification and pass it on
    fn report<T>(&self, result: Result<T>, success: Option<&str>, failure: &str) -> Result<T> {
        match &result {
            Ok(_) => {
                if let Some(message) = success {
                    self.notify(Notification::success(message));
                }
            }
            Err(Error::Validation(message)) => {
                tracing::warn!(error = %message, "{failure}");
                self.notify(Notification::warning(message.clone()));
            }
            Err(e) => {
                tracing::error!(error = %e, "{failure}");
                self.notify(Notification::error(format!("{failure}: {e}")));
            }
        }
        result
    }

    /// Open the store, load everything into memory and configure the
    /// remote transport. Runs a sync afterwards when auto-sync is on.
    pub async fn init(&mut self) -> Result<()> {
        tracing::info!("Initializing application");
        let loaded = self.load().await;
        if let Err(e) = loaded {
            self.initialized = false;
            return self.report(Err(e), None, "Failed to initialize application");
        }

        self.initialized = true;
        tracing::info!(
            tasks = self.state.tasks.len(),
            lists = self.state.lists.len(),
            current_list = ?self.state.current_list_id,
            "Application initialized"
        );

        let settings = &self.state.settings;
        if settings.auto_sync && settings.webdav.enabled {
            // Outcome already reported by sync()
            if let Err(e) = self.sync().await {
                tracing::warn!(error = %e, "Auto-sync after startup failed");
            }
        }
        Ok(())
    }

    async fn load(&mut self) -> Result<()> {
        self.store.init().await?;
        let tasks = self.store.get_tasks().await?;
        let mut lists = self.store.get_lists().await?;
        let settings = self.store.get_settings().await?;

        if lists.is_empty() {
            let ts = now();
            let default_list = TaskList {
                id: new_id(),
                name: DEFAULT_LIST_NAME.to_string(),
                description: Some(DEFAULT_LIST_DESCRIPTION.to_string()),
                color: Some(DEFAULT_LIST_COLOR.to_string()),
                created_at: ts,
                updated_at: ts,
            };
            self.store.save_list(&default_list).await?;
            tracing::info!(list_id = %default_list.id, "Created default list");
            lists.push(default_list);
        }

        let settings = settings.unwrap_or_else(|| {
            tracing::debug!("No stored settings, using defaults");
            AppSettings::default()
        });
        self.remote.configure(&settings.webdav);
        self.state = AppState {
            current_list_id: lists.first().map(|l| l.id.clone()),
            tasks,
            lists,
            settings,
        };
        Ok(())
    }

    pub async fn create_task(&mut self, input: NewTask) -> Result<Task> {
        let result = self.try_create_task(input).await;
        self.report(result, Some("Task added"), "Failed to create task")
    }

    async fn try_create_task(&mut self, input: NewTask) -> Result<Task> {
        let title = required(&input.title, "Task title")?;
        let list_id = input
            .list_id
            .or_else(|| self.state.current_list_id.clone())
            .ok_or_else(|| Error::validation("Select a list first"))?;
        if self.state.list(&list_id).is_none() {
            return Err(Error::validation(format!("List {list_id} does not exist")));
        }

        let ts = now();
        let task = Task {
            id: new_id(),
            title,
            content: trimmed(input.content),
            status: TaskStatus::Pending,
            priority: input.priority.unwrap_or_default(),
            created_at: ts,
            updated_at: ts,
            list_id,
            completed_at: None,
        };

        self.store.save_task(&task).await?;
        self.state.tasks.push(task.clone());
        tracing::info!(task_id = %task.id, list_id = %task.list_id, "Task created");
        Ok(task)
    }

    pub async fn update_task(&mut self, id: &str, update: TaskUpdate) -> Result<Task> {
        let result = self.try_update_task(id, update).await;
        self.report(result, None, "Failed to update task")
    }

    async fn try_update_task(&mut self, id: &str, update: TaskUpdate) -> Result<Task> {
        let index = self
            .state
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| Error::task_not_found(id))?;

        let ts = now();
        let mut task = self.state.tasks[index].clone();
        if let Some(title) = update.title {
            task.title = required(&title, "Task title")?;
        }
        if let Some(content) = update.content {
            task.content = trimmed(content);
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        if let Some(list_id) = update.list_id {
            if self.state.list(&list_id).is_none() {
                return Err(Error::validation(format!("List {list_id} does not exist")));
            }
            task.list_id = list_id;
        }
        if let Some(status) = update.status
            && status != task.status
        {
            task.set_status(status, ts);
        }
        task.updated_at = ts;

        self.store.save_task(&task).await?;
        self.state.tasks[index] = task.clone();
        tracing::debug!(task_id = %task.id, "Task updated");
        Ok(task)
    }

    /// Flip between pending and completed, stamping or clearing the
    /// completion time
    pub async fn toggle_task_status(&mut self, id: &str) -> Result<Task> {
        let status = match self.state.task(id) {
            Some(task) => task.status.toggled(),
            None => {
                return self.report(Err(Error::task_not_found(id)), None, "Failed to update task");
            }
        };
        self.update_task(
            id,
            TaskUpdate {
                status: Some(status),
                ..TaskUpdate::default()
            },
        )
        .await
    }

    pub async fn delete_task(&mut self, id: &str) -> Result<()> {
        let result = self.try_delete_task(id).await;
        self.report(result, Some("Task deleted"), "Failed to delete task")
    }

    async fn try_delete_task(&mut self, id: &str) -> Result<()> {
        if self.state.task(id).is_none() {
            return Err(Error::task_not_found(id));
        }
        self.store.delete_task(id).await?;
        self.state.tasks.retain(|t| t.id != id);
        tracing::info!(task_id = %id, "Task deleted");
        Ok(())
    }

    pub async fn create_list(&mut self, input: NewList) -> Result<TaskList> {
        let result = self.try_create_list(input).await;
        self.report(result, Some("List created"), "Failed to create list")
    }

    async fn try_create_list(&mut self, input: NewList) -> Result<TaskList> {
        let name = required(&input.name, "List name")?;
        let id = match input.id {
            Some(id) => required(&id, "List id")?,
            None => new_id(),
        };
        if self.state.list(&id).is_some() {
            return Err(Error::validation(format!("List {id} already exists")));
        }

        let ts = now();
        let list = TaskList {
            id,
            name,
            description: trimmed(input.description),
            color: trimmed(input.color),
            created_at: ts,
            updated_at: ts,
        };

        self.store.save_list(&list).await?;
        self.state.lists.push(list.clone());
        self.state.ensure_current_list();
        tracing::info!(list_id = %list.id, "List created");
        Ok(list)
    }

    pub async fn update_list(&mut self, id: &str, update: ListUpdate) -> Result<TaskList> {
        let result = self.try_update_list(id, update).await;
        self.report(result, None, "Failed to update list")
    }

    async fn try_update_list(&mut self, id: &str, update: ListUpdate) -> Result<TaskList> {
        let index = self
            .state
            .lists
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| Error::list_not_found(id))?;

        let mut list = self.state.lists[index].clone();
        if let Some(name) = update.name {
            list.name = required(&name, "List name")?;
        }
        if let Some(description) = update.description {
            list.description = trimmed(description);
        }
        if let Some(color) = update.color {
            list.color = trimmed(color);
        }
        list.updated_at = now();

        self.store.save_list(&list).await?;
        self.state.lists[index] = list.clone();
        tracing::debug!(list_id = %list.id, "List updated");
        Ok(list)
    }

    /// Delete a list and all of its tasks. The last remaining list cannot
    /// be deleted.
    ///
    /// Returns how many tasks went with it.
    pub async fn delete_list(&mut self, id: &str) -> Result<usize> {
        let result = self.try_delete_list(id).await;
        self.report(result, Some("List deleted"), "Failed to delete list")
    }

    async fn try_delete_list(&mut self, id: &str) -> Result<usize> {
        if self.state.list(id).is_none() {
            return Err(Error::list_not_found(id));
        }
        if self.state.lists.len() <= 1 {
            return Err(Error::validation("At least one list must remain"));
        }

        let removed = self.store.delete_list(id).await?;

        self.state.tasks.retain(|t| t.list_id != id);
        self.state.lists.retain(|l| l.id != id);
        if self.state.current_list_id.as_deref() == Some(id) {
            self.state.current_list_id = self.state.lists.first().map(|l| l.id.clone());
        }

        tracing::info!(
            list_id = %id,
            tasks = removed.len(),
            current_list = ?self.state.current_list_id,
            "List deleted"
        );
        Ok(removed.len())
    }

    pub fn set_current_list(&mut self, id: &str) -> Result<()> {
        if self.state.list(id).is_none() {
            return self.report(Err(Error::list_not_found(id)), None, "Failed to select list");
        }
        self.state.current_list_id = Some(id.to_string());
        Ok(())
    }

    /// Merge, persist, then reconfigure the remote transport
    pub async fn update_settings(&mut self, update: SettingsUpdate) -> Result<()> {
        let result = self.try_update_settings(update).await;
        self.report(result, Some("Settings saved"), "Failed to save settings")
    }

    async fn try_update_settings(&mut self, update: SettingsUpdate) -> Result<()> {
        let mut settings = self.state.settings.clone();
        if let Some(theme) = update.theme {
            settings.theme = theme;
        }
        if let Some(webdav) = update.webdav {
            settings.webdav = webdav;
        }
        if let Some(auto_sync) = update.auto_sync {
            settings.auto_sync = auto_sync;
        }
        if let Some(progress_scope) = update.progress_scope {
            settings.progress_scope = progress_scope;
        }

        self.store.save_settings(&settings).await?;
        self.remote.configure(&settings.webdav);
        self.state.settings = settings;
        tracing::info!(
            webdav_configured = self.remote.is_configured(),
            "Settings updated"
        );
        Ok(())
    }

    /// Probe the WebDAV server; `false` on any failure
    pub async fn test_connection(&self) -> bool {
        match self.remote.test_connection().await {
            Ok(reachable) => reachable,
            Err(e) => {
                tracing::warn!(error = %e, "WebDAV connection test failed");
                false
            }
        }
    }

    /// Run one sync cycle against the remote document
    pub async fn sync(&mut self) -> Result<SyncReport> {
        if !self.remote.is_configured() {
            self.notify(Notification::error("Configure WebDAV first"));
            return Err(Error::NotConfigured);
        }

        let result = self
            .sync
            .run(&self.remote, &self.store, &mut self.state)
            .await;
        self.report(result, Some("Sync complete"), "Sync failed")
    }

    /// Wipe every stored record and settings. The app must be
    /// initialized again afterwards.
    pub async fn reset(&mut self) -> Result<()> {
        let result = self.store.clear_all().await;
        if result.is_ok() {
            self.state = AppState::default();
            self.remote.configure(&WebDavConfig::default());
            self.initialized = false;
        }
        self.report(result, Some("All data cleared"), "Failed to clear data")
    }
}
