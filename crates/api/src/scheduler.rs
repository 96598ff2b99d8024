//! The scheduled-trigger ticker.
//!
//! Once per tick, every remembered workflow whose trigger is `scheduled`
//! is checked against its cron expression; due workflows go through the
//! same execute path as the HTTP endpoint. Cron parsing is delegated to
//! the `cron` crate, which expects a seconds field — 5-field expressions
//! are normalised by prepending one.

use chrono::{DateTime, Utc};
use cron::Schedule;
use serde_json::{Map, Value, json};
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use tawi_engine::ExecuteOptions;

use crate::state::SharedRuntime;

/// How often the ticker scans for due schedules.
pub const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Run the ticker until the token is cancelled.
pub async fn run(runtime: SharedRuntime, cancellation: CancellationToken) {
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_tick = Utc::now();

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            () = cancellation.cancelled() => {
                tracing::info!("scheduler stopping");
                return;
            }
        }
        let now = Utc::now();
        tick(&runtime, last_tick, now, &cancellation).await;
        last_tick = now;
    }
}

/// Fire every scheduled workflow that became due in `(from, to]`.
pub async fn tick(
    runtime: &SharedRuntime,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    cancellation: &CancellationToken,
) {
    let due: Vec<_> = runtime
        .workflows
        .iter()
        .filter(|entry| entry.trigger.node_type == "scheduled")
        .filter_map(|entry| {
            let expression = entry
                .trigger
                .config
                .get("cron_expression")
                .and_then(Value::as_str)?;
            due_at(expression, from, to).map(|at| ((*entry).clone(), expression.to_string(), at))
        })
        .collect();

    for (description, expression, scheduled_at) in due {
        let Ok((graph, _warnings)) = runtime.compile_cached(&description) else {
            tracing::warn!(
                workflow_id = %description.metadata.id,
                "scheduled workflow no longer compiles, skipping"
            );
            continue;
        };

        let mut payload = Map::new();
        payload.insert("scheduled_at".into(), json!(scheduled_at));
        payload.insert("cron_expression".into(), json!(expression));

        tracing::info!(workflow_id = %description.metadata.id, %scheduled_at, "firing scheduled workflow");
        let report = runtime
            .engine
            .execute(
                graph,
                payload,
                None,
                ExecuteOptions::default().with_cancellation(cancellation.child_token()),
            )
            .await;
        tracing::debug!(
            workflow_id = %description.metadata.id,
            execution_id = %report.execution_id,
            status = %report.status,
            "scheduled invocation finished"
        );
    }
}

/// The first instant in `(from, to]` the expression fires, if any.
fn due_at(expression: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let schedule = Schedule::from_str(&normalize(expression)).ok()?;
    schedule.after(&from).next().filter(|at| *at <= to)
}

/// Prepend a seconds field to 5-field expressions.
fn normalize(expression: &str) -> String {
    if expression.split_whitespace().count() == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn five_field_expressions_gain_seconds() {
        assert_eq!(normalize("0 9 * * 1-5"), "0 0 9 * * 1-5");
        assert_eq!(normalize("0 0 9 * * 1-5"), "0 0 9 * * 1-5");
    }

    #[test]
    fn due_inside_the_window() {
        // Every minute; a 90-second window must contain a firing.
        let from = Utc.with_ymd_and_hms(2025, 11, 3, 9, 0, 10).unwrap();
        let to = from + chrono::Duration::seconds(90);
        assert!(due_at("* * * * *", from, to).is_some());
    }

    #[test]
    fn not_due_outside_the_window() {
        // Daily at 09:00; a one-minute afternoon window has no firing.
        let from = Utc.with_ymd_and_hms(2025, 11, 3, 15, 0, 0).unwrap();
        let to = from + chrono::Duration::seconds(60);
        assert!(due_at("0 9 * * *", from, to).is_none());
    }

    #[test]
    fn malformed_expression_is_never_due() {
        let from = Utc::now();
        let to = from + chrono::Duration::seconds(60);
        assert!(due_at("not a cron", from, to).is_none());
    }
}
