//! Background jobs: the periodic deadline sweep and the monthly score reset.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use mockable::Clock;
use opsboard::CommandError;
use opsboard::dispatch::{Dispatcher, Notifier};
use opsboard::lifecycle::MissionEngine;
use opsboard::mail::Mailer;
use opsboard::ports::{OperativeStore, TaskStore};
use tokio::time::MissedTickBehavior;

/// Runs one deadline sweep and delivers its effects. Returns the number of
/// tasks found due.
///
/// # Errors
///
/// Propagates the store failure from the sweep query.
pub async fn deadline_sweep<S, C, N, M>(
    engine: &MissionEngine<S, C>,
    dispatcher: &Dispatcher<N, M>,
    window: chrono::Duration,
) -> Result<usize, CommandError>
where
    S: TaskStore + OperativeStore,
    C: Clock + Send + Sync,
    N: Notifier,
    M: Mailer,
{
    let outcome = engine.remind_due_tasks(window).await?;
    Ok(dispatcher.settle(outcome).await)
}

/// Sweeps every `period` until the task is aborted. The first sweep runs
/// immediately.
pub async fn run_deadline_sweeps<S, C, N, M>(
    engine: MissionEngine<S, C>,
    dispatcher: Dispatcher<N, M>,
    period: Duration,
    window: chrono::Duration,
) where
    S: TaskStore + OperativeStore,
    C: Clock + Send + Sync,
    N: Notifier,
    M: Mailer,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        if let Err(e) = deadline_sweep(&engine, &dispatcher, window).await {
            tracing::error!(error = %e, "deadline sweep failed");
        }
    }
}

/// Resets Employee scores at the start of every calendar month (UTC).
pub async fn run_monthly_reset<S, C, N, M>(
    engine: MissionEngine<S, C>,
    dispatcher: Dispatcher<N, M>,
    clock: Arc<C>,
) where
    S: TaskStore + OperativeStore,
    C: Clock + Send + Sync,
    N: Notifier,
    M: Mailer,
{
    loop {
        let now = clock.utc();
        let Some(next) = next_month_start(now) else {
            tracing::error!(now = %now, "cannot compute next reset time, stopping monthly reset");
            return;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::info!(next = %next, "monthly score reset scheduled");
        tokio::time::sleep(wait).await;

        match engine.monthly_reset().await {
            Ok(outcome) => {
                dispatcher.settle(outcome).await;
            }
            Err(e) => tracing::error!(error = %e, "monthly score reset failed"),
        }
    }
}

/// Midnight UTC on the first day of the month after `now`.
#[must_use]
pub fn next_month_start(now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()
}
