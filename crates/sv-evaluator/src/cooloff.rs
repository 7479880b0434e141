//! Cooloff Gate (C5): suppresses duplicate notifications for an alert
//! within its cooloff interval.
//!
//! The gate itself is stateless — it reads `Alert::last_notified` and
//! decides, and the caller is responsible for stamping and persisting the
//! alert afterwards. Because exactly one scheduled task drives a given
//! alert's poll loop, the read-check-stamp sequence is naturally atomic
//! per alert id without any extra locking — there's no concurrent writer
//! to race.

use chrono::{DateTime, Utc};
use sv_common::Alert;

pub struct CooloffGate;

impl CooloffGate {
    /// Whether a notification for `alert` is permitted at `now`: true if
    /// there has been no prior notification, or the effective cooloff
    /// (`cooloff ?? timeframe`) has fully elapsed since the last one.
    pub fn permits(alert: &Alert, now: DateTime<Utc>) -> bool {
        match alert.last_notified {
            None => true,
            Some(last) => {
                let cooloff = chrono::Duration::from_std(alert.effective_cooloff())
                    .unwrap_or_else(|_| chrono::Duration::zero());
                now - last >= cooloff
            }
        }
    }

    /// Stamps `alert.last_notified = now`. Called after a permitted
    /// notification has been handed to the sink — regardless of whether
    /// the sink itself later succeeds or fails. A failed delivery still
    /// counts against the cooloff; only the queue worker retries it.
    pub fn stamp(alert: &mut Alert, now: DateTime<Utc>) {
        alert.last_notified = Some(now);
    }
}
