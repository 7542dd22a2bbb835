use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::use_cases::billing_automation::{BillingAutomation, BillingTask, TaskReport};

/// Run every billing task once, in cycle order. A failing task is logged
/// and the cycle moves on to the next one.
pub async fn run_billing_cycle(
    automation: &BillingAutomation,
    now: DateTime<Utc>,
) -> Vec<(BillingTask, Option<TaskReport>)> {
    let mut results = Vec::with_capacity(BillingTask::CYCLE.len());
    for task in BillingTask::CYCLE {
        match automation.run_task(task, now).await {
            Ok(report) => {
                info!(
                    task = %task,
                    processed = report.processed,
                    succeeded = report.succeeded,
                    failed = report.failed,
                    skipped = report.skipped,
                    "Billing task finished"
                );
                results.push((task, Some(report)));
            }
            Err(err) => {
                error!(task = %task, error = %err, "Billing task failed");
                results.push((task, None));
            }
        }
    }
    results
}

/// Background loop driving the billing tasks. Never returns.
pub async fn run_billing_loop(automation: Arc<BillingAutomation>, every: Duration) {
    info!(interval_secs = every.as_secs(), "Billing scheduler started");
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        run_billing_cycle(&automation, Utc::now()).await;
    }
}
