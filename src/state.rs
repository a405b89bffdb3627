//! In-memory application state mirrored from the record store

use crate::models::{AppSettings, ProgressScope, Snapshot, Task, TaskList, TaskStats, TaskStatus};

/// Tasks, lists, the selected list and settings.
///
/// Only [`crate::store::App`] and the synchronizer mutate it, always after
/// the matching record store write has succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    pub(crate) tasks: Vec<Task>,
    pub(crate) lists: Vec<TaskList>,
    pub(crate) current_list_id: Option<String>,
    pub(crate) settings: AppSettings,
}

impl AppState {
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn lists(&self) -> &[TaskList] {
        &self.lists
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn current_list_id(&self) -> Option<&str> {
        self.current_list_id.as_deref()
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn list(&self, id: &str) -> Option<&TaskList> {
        self.lists.iter().find(|l| l.id == id)
    }

    pub fn current_list(&self) -> Option<&TaskList> {
        self.current_list_id().and_then(|id| self.list(id))
    }

    pub fn tasks_in_list<'a>(&'a self, list_id: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks.iter().filter(move |t| t.list_id == list_id)
    }

    /// Tasks of the selected list, empty when nothing is selected
    pub fn current_tasks(&self) -> Vec<&Task> {
        match self.current_list_id() {
            Some(id) => self.tasks_in_list(id).collect(),
            None => Vec::new(),
        }
    }

    pub fn pending_tasks(&self) -> Vec<&Task> {
        self.current_tasks_with(TaskStatus::Pending)
    }

    pub fn completed_tasks(&self) -> Vec<&Task> {
        self.current_tasks_with(TaskStatus::Completed)
    }

    fn current_tasks_with(&self, status: TaskStatus) -> Vec<&Task> {
        self.current_tasks()
            .into_iter()
            .filter(|t| t.status == status)
            .collect()
    }

    /// Completion progress over all tasks or the selected list, per settings
    pub fn task_stats(&self) -> TaskStats {
        match self.settings.progress_scope {
            ProgressScope::All => TaskStats::from_tasks(&self.tasks),
            ProgressScope::Current => TaskStats::from_tasks(self.current_tasks()),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tasks: self.tasks.clone(),
            lists: self.lists.clone(),
        }
    }

    /// Swap in a whole dataset, keeping the selection valid
    pub(crate) fn replace_snapshot(&mut self, snapshot: Snapshot) {
        self.tasks = snapshot.tasks;
        self.lists = snapshot.lists;
        self.ensure_current_list();
    }

    /// Point the selection at the first list if the selected one is gone
    pub(crate) fn ensure_current_list(&mut self) {
        let valid = self
            .current_list_id()
            .is_some_and(|id| self.list(id).is_some());
        if !valid {
            self.current_list_id = self.lists.first().map(|l| l.id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, now};

    fn list(id: &str) -> TaskList {
        let ts = now();
        TaskList {
            id: id.to_string(),
            name: id.to_string(),
            description: None,
            color: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    fn task(id: &str, list_id: &str, status: TaskStatus) -> Task {
        let ts = now();
        let mut task = Task {
            id: id.to_string(),
            title: id.to_string(),
            content: None,
            status: TaskStatus::Pending,
            priority: Priority::Medium,
            created_at: ts,
            updated_at: ts,
            list_id: list_id.to_string(),
            completed_at: None,
        };
        task.set_status(status, ts);
        task
    }

    fn state() -> AppState {
        AppState {
            tasks: vec![
                task("a", "L1", TaskStatus::Completed),
                task("b", "L1", TaskStatus::Pending),
                task("c", "L2", TaskStatus::Pending),
                task("d", "L2", TaskStatus::Pending),
            ],
            lists: vec![list("L1"), list("L2")],
            current_list_id: Some("L1".to_string()),
            settings: AppSettings::default(),
        }
    }

    #[test]
    fn current_views_follow_selection() {
        let state = state();
        assert_eq!(state.current_list().unwrap().id, "L1");
        assert_eq!(state.current_tasks().len(), 2);
        assert_eq!(state.pending_tasks()[0].id, "b");
        assert_eq!(state.completed_tasks()[0].id, "a");
    }

    #[test]
    fn stats_respect_progress_scope() {
        let mut state = state();
        assert_eq!(state.task_stats().completion_rate, 50);

        state.settings.progress_scope = ProgressScope::All;
        let stats = state.task_stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.completion_rate, 25);
    }

    #[test]
    fn replacing_snapshot_reselects_missing_list() {
        let mut state = state();
        state.replace_snapshot(Snapshot {
            tasks: vec![],
            lists: vec![list("R1"), list("R2")],
        });
        assert_eq!(state.current_list_id(), Some("R1"));

        state.replace_snapshot(Snapshot::default());
        assert_eq!(state.current_list_id(), None);
        assert!(state.current_tasks().is_empty());
    }

    #[test]
    fn replacing_snapshot_keeps_surviving_selection() {
        let mut state = state();
        state.current_list_id = Some("L2".to_string());
        state.replace_snapshot(Snapshot {
            tasks: vec![],
            lists: vec![list("L1"), list("L2")],
        });
        assert_eq!(state.current_list_id(), Some("L2"));
    }
}
