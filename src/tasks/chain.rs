use serde::{Deserialize, Serialize};

use super::{TaskDescriptor, TaskKind};

/// Ordered, singly linked sequence of tasks for one phase of a process
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskChain {
    tasks: Vec<TaskDescriptor>,
}

impl TaskChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task and link the previous tail to it
    pub fn push(&mut self, mut task: TaskDescriptor) {
        task.next_task_id = None;
        if let Some(tail) = self.tasks.last_mut() {
            tail.next_task_id = Some(task.task_id.clone());
        }
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[TaskDescriptor] {
        &self.tasks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TaskDescriptor> {
        self.tasks.iter()
    }

    pub fn kinds(&self) -> Vec<&TaskKind> {
        self.tasks.iter().map(|task| &task.kind).collect()
    }

    pub fn into_tasks(self) -> Vec<TaskDescriptor> {
        self.tasks
    }
}

impl FromIterator<TaskDescriptor> for TaskChain {
    fn from_iter<I: IntoIterator<Item = TaskDescriptor>>(iter: I) -> Self {
        let mut chain = TaskChain::new();
        for task in iter {
            chain.push(task);
        }
        chain
    }
}

impl<'a> IntoIterator for &'a TaskChain {
    type Item = &'a TaskDescriptor;
    type IntoIter = std::slice::Iter<'a, TaskDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.iter()
    }
}
