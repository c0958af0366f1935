//! Scheduled transition runner
//!
//! A fixed-interval sweep promotes APPROVED tickets whose window has started
//! and (when enabled) flags IN_USE tickets past their window as OVERDUE. It
//! drives the exact same state-machine operations a human caller would,
//! with the system actor, so manual and automatic transitions can never
//! drift apart. One ticket's failure is logged and skipped; the sweep and
//! the process always survive.

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use std::time::Duration;

use crate::{
    config::SchedulerConfig,
    models::actor::Actor,
    repository::Repository,
    services::{
        events::{EngineEvent, EventPublisher},
        tickets::TicketsService,
    },
};

pub struct TransitionRunner {
    repository: Repository,
    tickets: TicketsService,
    events: EventPublisher,
    config: SchedulerConfig,
}

impl TransitionRunner {
    pub fn new(
        repository: Repository,
        tickets: TicketsService,
        events: EventPublisher,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            repository,
            tickets,
            events,
            config,
        }
    }

    /// Run forever. Spawned as a background task from `main`.
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.config.sweep_interval_secs,
            mark_overdue = self.config.mark_overdue,
            "starting scheduled transition runner"
        );

        let mut interval = tokio::time::interval(Duration::from_secs(self.config.sweep_interval_secs));
        interval.tick().await; // skip the immediate first tick

        let mut next_daily = next_daily_run(Utc::now());

        loop {
            interval.tick().await;
            self.sweep().await;

            if Utc::now() >= next_daily {
                self.due_soon_pass().await;
                next_daily = next_daily + chrono::Duration::days(1);
            }
        }
    }

    /// One sweep: promote due pickups, then flag overdue tickets
    pub async fn sweep(&self) {
        let now = Utc::now();
        let system = Actor::system();

        match self.repository.tickets.due_for_pickup(now).await {
            Ok(ids) => {
                for ticket_id in ids {
                    match self.tickets.transition_to_in_use(&system, ticket_id).await {
                        Ok(true) => {
                            tracing::info!(ticket_id, "ticket promoted to IN_USE by sweep");
                        }
                        Ok(false) => {
                            tracing::debug!(ticket_id, "ticket already picked up");
                        }
                        Err(e) => {
                            tracing::warn!(ticket_id, error = %e, "pickup promotion failed; continuing sweep");
                        }
                    }
                }
            }
            Err(e) => tracing::error!(error = %e, "failed to query tickets due for pickup"),
        }

        if !self.config.mark_overdue {
            return;
        }

        match self.repository.tickets.due_for_overdue(now).await {
            Ok(ids) => {
                for ticket_id in ids {
                    match self.tickets.mark_overdue(&system, ticket_id).await {
                        Ok(true) => {
                            tracing::info!(ticket_id, "ticket flagged OVERDUE by sweep");
                        }
                        Ok(false) => {
                            tracing::debug!(ticket_id, "ticket already flagged overdue");
                        }
                        Err(e) => {
                            tracing::warn!(ticket_id, error = %e, "overdue flagging failed; continuing sweep");
                        }
                    }
                }
            }
            Err(e) => tracing::error!(error = %e, "failed to query overdue tickets"),
        }
    }

    /// Daily notification pass: emit TICKET_DUE_SOON for tickets ending
    /// within the configured lead time. No state change, no audit.
    pub async fn due_soon_pass(&self) {
        let now = Utc::now();
        match self
            .repository
            .tickets
            .due_soon(now, self.config.due_soon_lead_hours)
            .await
        {
            Ok(tickets) => {
                let count = tickets.len();
                for ticket in tickets {
                    self.events.publish(EngineEvent::TicketDueSoon {
                        ticket_id: ticket.id,
                        window_end: ticket.window_end,
                    });
                }
                tracing::info!(count, "due-soon notification pass finished");
            }
            Err(e) => tracing::error!(error = %e, "due-soon pass failed"),
        }
    }
}

/// Next 00:01 UTC strictly after `now`
fn next_daily_run(now: DateTime<Utc>) -> DateTime<Utc> {
    let candidate = now.date_naive().and_time(NaiveTime::MIN) + chrono::Duration::minutes(1);
    let candidate = Utc.from_utc_datetime(&candidate);
    if candidate > now {
        candidate
    } else {
        candidate + chrono::Duration::days(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, h, m, 0).single().expect("valid time")
    }

    #[test]
    fn daily_run_is_later_the_same_day_before_one_past_midnight() {
        assert_eq!(next_daily_run(t(0, 0)), t(0, 1));
    }

    #[test]
    fn daily_run_rolls_to_the_next_day_after_one_past_midnight() {
        let next = next_daily_run(t(9, 30));
        assert_eq!(
            next,
            Utc.with_ymd_and_hms(2025, 6, 3, 0, 1, 0).single().expect("valid time")
        );
    }

    #[test]
    fn daily_run_at_the_exact_minute_rolls_forward() {
        let next = next_daily_run(t(0, 1));
        assert_eq!(
            next,
            Utc.with_ymd_and_hms(2025, 6, 3, 0, 1, 0).single().expect("valid time")
        );
    }
}
