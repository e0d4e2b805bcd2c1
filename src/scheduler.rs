//! Cron-based scheduler
//!
//! Schedules and executes tasks based on cron expressions or intervals.
//! `tick` runs every due task at a caller-supplied time, so tests can drive
//! logical time; `start` ticks once per second on the wall clock.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A scheduled task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Unique task ID
    pub id: String,
    /// Task name
    pub name: String,
    /// Cron expression or fixed interval
    pub schedule: TaskSchedule,
    /// Whether the task is enabled
    pub enabled: bool,
    /// Last execution time
    pub last_run: Option<DateTime<Utc>>,
    /// Next scheduled execution time
    pub next_run: Option<DateTime<Utc>>,
    /// Number of times executed
    pub run_count: u64,
}

impl ScheduledTask {
    /// Make the first run happen at `at` instead of one period from now
    pub fn first_run_at(mut self, at: DateTime<Utc>) -> Self {
        self.next_run = Some(at);
        self
    }
}

/// How often a task runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskSchedule {
    /// Cron expression with seconds (e.g., "0 0 * * * *" for hourly)
    Cron(String),
    /// Fixed interval in seconds
    Interval(u64),
}

impl TaskSchedule {
    /// Parse and validate a cron expression
    pub fn parse_cron(expr: &str) -> Result<Schedule> {
        Schedule::try_from(expr)
            .map_err(|e| anyhow::anyhow!("Invalid cron expression '{}': {}", expr, e))
    }

    /// Next run time strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        match self {
            TaskSchedule::Cron(expr) => {
                let schedule = Self::parse_cron(expr)?;
                Ok(schedule.after(&after).next())
            }
            TaskSchedule::Interval(secs) => {
                Ok(Some(after + chrono::Duration::seconds(*secs as i64)))
            }
        }
    }
}

/// Task execution result
#[derive(Debug)]
pub struct TaskResult {
    pub task_id: String,
    pub name: String,
    pub success: bool,
    pub message: String,
    pub duration_ms: u64,
}

/// Type alias for task executor function
pub type TaskExecutor = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<String>> + Send>> + Send + Sync>;

/// Scheduler for managing scheduled tasks
pub struct TaskScheduler {
    /// Scheduled tasks
    tasks: Arc<Mutex<HashMap<String, ScheduledTask>>>,
    /// Task executors
    executors: Arc<Mutex<HashMap<String, TaskExecutor>>>,
    /// Running flag
    running: Arc<Mutex<bool>>,
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskScheduler {
    /// Create a new scheduler
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            executors: Arc::new(Mutex::new(HashMap::new())),
            running: Arc::new(Mutex::new(false)),
        }
    }

    /// Add a task with an executor function. A task without a first run
    /// time is first due one period from now.
    pub async fn add_task_with_executor<F, Fut>(
        &self,
        mut task: ScheduledTask,
        executor: F,
    ) -> Result<String>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        if task.next_run.is_none() {
            task.next_run = task.schedule.next_after(Utc::now())?;
        }

        let id = task.id.clone();
        let name = task.name.clone();

        {
            let mut tasks = self.tasks.lock().await;
            tasks.insert(id.clone(), task);
        }
        {
            let mut executors = self.executors.lock().await;
            let exec: TaskExecutor = Arc::new(move || {
                Box::pin(executor()) as Pin<Box<dyn Future<Output = Result<String>> + Send>>
            });
            executors.insert(id.clone(), exec);
        }

        info!("Added scheduled task: {} ({})", name, id);
        Ok(id)
    }

    /// Remove a task
    pub async fn remove_task(&self, id: &str) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        let mut executors = self.executors.lock().await;

        if tasks.remove(id).is_some() {
            executors.remove(id);
            info!("Removed scheduled task: {}", id);
            Ok(())
        } else {
            bail!("Task not found: {}", id)
        }
    }

    /// Get a task by ID
    pub async fn get_task(&self, id: &str) -> Option<ScheduledTask> {
        self.tasks.lock().await.get(id).cloned()
    }

    /// Execute a task immediately
    pub async fn execute_now(&self, id: &str) -> Result<TaskResult> {
        self.execute_at(id, Utc::now()).await
    }

    async fn execute_at(&self, id: &str, now: DateTime<Utc>) -> Result<TaskResult> {
        let executor = {
            let executors = self.executors.lock().await;
            executors.get(id).cloned()
        };
        let Some(exec) = executor else {
            bail!("No executor for task: {}", id)
        };

        let start = std::time::Instant::now();
        let result = exec().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let name = {
            let mut tasks = self.tasks.lock().await;
            match tasks.get_mut(id) {
                Some(task) => {
                    task.last_run = Some(now);
                    task.run_count += 1;
                    task.next_run = task.schedule.next_after(now).ok().flatten();
                    task.name.clone()
                }
                None => id.to_string(),
            }
        };

        let (success, message) = match result {
            Ok(message) => (true, message),
            Err(e) => (false, format!("{:#}", e)),
        };
        Ok(TaskResult { task_id: id.to_string(), name, success, message, duration_ms })
    }

    /// Tasks due at `now`, earliest first
    pub async fn get_due_tasks(&self, now: DateTime<Utc>) -> Vec<String> {
        let tasks = self.tasks.lock().await;
        let mut due: Vec<&ScheduledTask> = tasks
            .values()
            .filter(|t| t.enabled && t.next_run.is_some_and(|next| next <= now))
            .collect();
        due.sort_by(|a, b| a.next_run.cmp(&b.next_run).then_with(|| a.name.cmp(&b.name)));
        due.into_iter().map(|t| t.id.clone()).collect()
    }

    /// Run every task due at `now`, one after another
    pub async fn tick(&self, now: DateTime<Utc>) -> Vec<TaskResult> {
        let mut results = Vec::new();

        for task_id in self.get_due_tasks(now).await {
            match self.execute_at(&task_id, now).await {
                Ok(result) => {
                    if result.success {
                        info!("Task {} completed: {} ({}ms)",
                            result.name, result.message, result.duration_ms);
                    } else {
                        warn!("Task {} failed: {}", result.name, result.message);
                    }
                    results.push(result);
                }
                Err(e) => {
                    error!("Task {} execution error: {}", task_id, e);
                }
            }
        }
        results
    }

    /// Start the scheduler loop
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if *running {
            warn!("Scheduler already running");
            return;
        }
        *running = true;
        drop(running);

        info!("Scheduler started");

        loop {
            {
                let running = self.running.lock().await;
                if !*running {
                    break;
                }
            }

            let results = self.tick(Utc::now()).await;
            if !results.is_empty() {
                debug!("Scheduler tick ran {} tasks", results.len());
            }

            sleep(Duration::from_secs(1)).await;
        }

        info!("Scheduler stopped");
    }

    /// Stop the scheduler
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        *running = false;
        info!("Stopping scheduler...");
    }
}

/// Helper function to create a simple recurring task
pub fn create_recurring_task(name: &str, interval_secs: u64) -> ScheduledTask {
    ScheduledTask {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        schedule: TaskSchedule::Interval(interval_secs),
        enabled: true,
        last_run: None,
        next_run: None,
        run_count: 0,
    }
}

/// Helper function to create a cron-based task
pub fn create_cron_task(name: &str, cron_expr: &str) -> Result<ScheduledTask> {
    // Validate cron expression
    TaskSchedule::parse_cron(cron_expr)?;

    Ok(ScheduledTask {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        schedule: TaskSchedule::Cron(cron_expr.to_string()),
        enabled: true,
        last_run: None,
        next_run: None,
        run_count: 0,
    })
}
