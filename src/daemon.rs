//! Daemon mode - periodic validation, learning, retraining and critique
//!
//! Every task body returns its outcome as a message; failures are logged by
//! the scheduler and the next occurrence proceeds normally.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::config::ScheduleConfig;
use crate::engine::AdaptiveEngine;
use crate::scheduler::{create_cron_task, create_recurring_task, ScheduledTask, TaskScheduler};

pub const VALIDATE_TASK: &str = "auto-validate";
pub const LEARN_TASK: &str = "continuous-learn";
pub const RETRAIN_TASK: &str = "retrain";
pub const CRITIQUE_TASK: &str = "critique";
pub const EVALUATION_TASK: &str = "evaluate";

fn with_start(task: ScheduledTask, run_on_start: bool, now: DateTime<Utc>) -> ScheduledTask {
    if run_on_start {
        task.first_run_at(now)
    } else {
        task
    }
}

/// Register the periodic engine tasks on a scheduler
pub async fn register_tasks(
    scheduler: &TaskScheduler,
    engine: Arc<AdaptiveEngine>,
    schedule: &ScheduleConfig,
    now: DateTime<Utc>,
) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    let minutes = |m: u64| m * 60;

    let e = engine.clone();
    let task = with_start(create_recurring_task(VALIDATE_TASK, minutes(schedule.validate_interval_minutes)), schedule.run_on_start, now);
    ids.push(scheduler.add_task_with_executor(task, move || {
        let e = e.clone();
        async move {
            let summary = e.validate().await?;
            Ok(format!("{} of {} pending feedbacks validated", summary.validated, summary.examined))
        }
    }).await?);

    let e = engine.clone();
    let task = with_start(create_recurring_task(LEARN_TASK, minutes(schedule.learn_interval_minutes)), schedule.run_on_start, now);
    ids.push(scheduler.add_task_with_executor(task, move || {
        let e = e.clone();
        async move {
            Ok(match e.try_process_new_approved().await? {
                Some(cycle) => format!("learned {} of {} records (cursor {})", cycle.trained, cycle.fetched, cycle.cursor_after),
                None => "skipped, memory busy".to_string(),
            })
        }
    }).await?);

    let e = engine.clone();
    let task = with_start(create_recurring_task(RETRAIN_TASK, minutes(schedule.retrain_interval_minutes)), schedule.run_on_start, now);
    ids.push(scheduler.add_task_with_executor(task, move || {
        let e = e.clone();
        async move {
            Ok(match e.try_retrain().await? {
                Some(summary) => format!("retrained on {} records (cursor {})", summary.trained, summary.cursor),
                None => "skipped, memory busy".to_string(),
            })
        }
    }).await?);

    let e = engine.clone();
    let task = with_start(create_recurring_task(CRITIQUE_TASK, minutes(schedule.critique_interval_minutes)), schedule.run_on_start, now);
    ids.push(scheduler.add_task_with_executor(task, move || {
        let e = e.clone();
        async move {
            let outcome = e.critique().await?;
            Ok(format!("accuracy {:.1}%, trend {}, {} actions executed",
                outcome.report.overall.accuracy, outcome.report.comparison.trend, outcome.actions.executed))
        }
    }).await?);

    if let Some(expr) = &schedule.evaluation_cron {
        let e = engine.clone();
        let task = create_cron_task(EVALUATION_TASK, expr)?;
        ids.push(scheduler.add_task_with_executor(task, move || {
            let e = e.clone();
            async move {
                let report = e.evaluate(None).await?;
                Ok(format!("{:.1}% accuracy over {} recipes", report.accuracy, report.recipes))
            }
        }).await?);
    }

    Ok(ids)
}

/// Run the daemon (blocks until Ctrl+C)
pub async fn run(engine: Arc<AdaptiveEngine>) -> Result<()> {
    let schedule = engine.config().schedule.clone();
    let scheduler = Arc::new(TaskScheduler::new());
    let ids = register_tasks(&scheduler, engine, &schedule, Utc::now()).await?;

    let loop_scheduler = scheduler.clone();
    let handle = tokio::spawn(async move { loop_scheduler.start().await });

    info!("Daemon running with {} tasks", ids.len());
    println!("Adaptive translation daemon is running with {} tasks.", ids.len());
    println!("  validate every {} min, learn every {} min, retrain every {} min, critique every {} min",
        schedule.validate_interval_minutes, schedule.learn_interval_minutes,
        schedule.retrain_interval_minutes, schedule.critique_interval_minutes);
    if let Some(expr) = &schedule.evaluation_cron {
        println!("  evaluate on '{}'", expr);
    }
    println!();
    println!("Press Ctrl+C to stop.");

    match tokio::signal::ctrl_c().await {
        Ok(()) => println!("\nShutting down..."),
        Err(err) => eprintln!("Unable to listen for shutdown signal: {}", err),
    }

    scheduler.stop().await;
    handle.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::evaluation::{RecipeSource, SampleRecipe};
    use crate::feedback::{FeedbackStore, SqliteFeedbackStore};
    use crate::types::Correction;
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct Offline;

    #[async_trait]
    impl RecipeSource for Offline {
        fn name(&self) -> &str {
            "offline"
        }

        async fn fetch_random(&self) -> Result<Option<SampleRecipe>> {
            Err(anyhow::anyhow!("offline"))
        }
    }

    #[tokio::test]
    async fn test_tasks_run_on_start_then_by_interval() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn FeedbackStore> = Arc::new(SqliteFeedbackStore::in_memory().unwrap());
        store
            .insert(&Correction {
                domain_type: "ingredient".to_string(),
                original_text: "chicken".to_string(),
                current_translation: None,
                suggested_translation: "poulet".to_string(),
                target_language: "fr".to_string(),
            })
            .await
            .unwrap();

        let engine = Arc::new(AdaptiveEngine::assemble(Config::default(), dir.path(), store, Arc::new(Offline)));
        let scheduler = TaskScheduler::new();
        let now = Utc::now();
        let ids = register_tasks(&scheduler, engine.clone(), &ScheduleConfig::default(), now).await.unwrap();
        assert_eq!(ids.len(), 4);

        let results = scheduler.tick(now).await;
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.success), "{:?}", results);

        // the auto-validated record was learned
        let stats = engine.get_stats().await.unwrap();
        assert_eq!(stats.feedback.counts.approved, 1);
        assert_eq!(stats.learning_cursor, 1);

        // only the learner is due after 30 minutes
        let later = scheduler.tick(now + chrono::Duration::minutes(30)).await;
        let names: Vec<&str> = later.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec![LEARN_TASK]);
    }

    #[tokio::test]
    async fn test_bad_evaluation_cron_is_rejected() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn FeedbackStore> = Arc::new(SqliteFeedbackStore::in_memory().unwrap());
        let engine = Arc::new(AdaptiveEngine::assemble(Config::default(), dir.path(), store, Arc::new(Offline)));
        let schedule = ScheduleConfig { evaluation_cron: Some("whenever".to_string()), ..Default::default() };

        assert!(register_tasks(&TaskScheduler::new(), engine, &schedule, Utc::now()).await.is_err());
    }
}
