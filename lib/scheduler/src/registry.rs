//! The schedule registry.
//!
//! Active schedules are held in a minimum-priority structure keyed by
//! `next_fire_at`. Each `due` pass pops every schedule whose fire time has
//! arrived, emits one job per schedule carrying the original scheduled
//! instant, and advances the schedule strictly past `now` — firings missed
//! during downtime are skipped, never caught up, to bound load.

use crate::error::ScheduleError;
use crate::job::Job;
use crate::schedule::{CronSchedule, Schedule};
use amber_relay_core::{ScheduleId, WorkflowId};
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

struct Entry {
    record: Schedule,
    cron: CronSchedule,
}

/// Registry of active schedules with lifecycle operations.
///
/// Heap entries are lazily invalidated: pause, cancel, and re-registration
/// leave stale heap items behind, which `due` discards when the item's fire
/// time no longer matches the record.
pub struct ScheduleRegistry {
    entries: HashMap<ScheduleId, Entry>,
    queue: BinaryHeap<Reverse<(DateTime<Utc>, ScheduleId)>>,
}

impl ScheduleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            queue: BinaryHeap::new(),
        }
    }

    /// Registers a schedule and computes its first firing after `now`.
    ///
    /// # Errors
    ///
    /// Returns an error when the cron expression or timezone is invalid.
    pub fn register(
        &mut self,
        workflow_id: WorkflowId,
        cron: &str,
        timezone: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ScheduleId, ScheduleError> {
        let parsed = CronSchedule::parse(cron, timezone)?;
        let id = ScheduleId::new();
        let next_fire_at = parsed.next_after(now);

        let record = Schedule {
            id,
            workflow_id,
            cron: cron.to_string(),
            timezone: timezone.map(ToString::to_string),
            next_fire_at,
            active: true,
            created_at: now,
        };
        if let Some(fire_at) = next_fire_at {
            self.queue.push(Reverse((fire_at, id)));
        }
        self.entries.insert(
            id,
            Entry {
                record,
                cron: parsed,
            },
        );

        tracing::debug!(schedule = %id, workflow = %workflow_id, %cron, "registered schedule");
        Ok(id)
    }

    /// Pops every due schedule and emits its job.
    ///
    /// Each emitted job carries the instant the firing was due, even when
    /// `now` is past it. The schedule is then advanced strictly past `now`,
    /// skipping any intermediate firings.
    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<Job> {
        let mut fired = Vec::new();

        while let Some(Reverse((fire_at, id))) = self.queue.peek().copied() {
            if fire_at > now {
                break;
            }
            self.queue.pop();

            let Some(entry) = self.entries.get_mut(&id) else {
                continue; // cancelled; stale heap item
            };
            if !entry.record.active || entry.record.next_fire_at != Some(fire_at) {
                continue; // paused or re-advanced; stale heap item
            }

            fired.push(Job::scheduled(id, entry.record.workflow_id, fire_at));

            let next = entry.cron.next_after(now);
            entry.record.next_fire_at = next;
            if let Some(next_fire) = next {
                self.queue.push(Reverse((next_fire, id)));
            }
            tracing::debug!(
                schedule = %id,
                fired_for = %fire_at,
                next = ?next,
                "schedule fired"
            );
        }

        fired
    }

    /// Pauses a schedule: no future enqueues, `next_fire_at` frozen.
    ///
    /// # Errors
    ///
    /// Returns an error when the schedule does not exist.
    pub fn pause(&mut self, id: ScheduleId) -> Result<(), ScheduleError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(ScheduleError::NotFound { id })?;
        entry.record.active = false;
        Ok(())
    }

    /// Resumes a paused schedule, re-advancing a stale fire time.
    ///
    /// # Errors
    ///
    /// Returns an error when the schedule does not exist.
    pub fn resume(&mut self, id: ScheduleId, now: DateTime<Utc>) -> Result<(), ScheduleError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(ScheduleError::NotFound { id })?;
        entry.record.active = true;

        let stale = entry.record.next_fire_at.is_none_or(|fire| fire <= now);
        if stale {
            entry.record.next_fire_at = entry.cron.next_after(now);
        }
        if let Some(fire_at) = entry.record.next_fire_at {
            self.queue.push(Reverse((fire_at, id)));
        }
        Ok(())
    }

    /// Cancels a schedule, removing it from the registry.
    ///
    /// An already-enqueued or in-flight job is unaffected.
    ///
    /// # Errors
    ///
    /// Returns an error when the schedule does not exist.
    pub fn cancel(&mut self, id: ScheduleId) -> Result<Schedule, ScheduleError> {
        self.entries
            .remove(&id)
            .map(|entry| entry.record)
            .ok_or(ScheduleError::NotFound { id })
    }

    /// Returns a schedule record.
    #[must_use]
    pub fn get(&self, id: ScheduleId) -> Option<&Schedule> {
        self.entries.get(&id).map(|entry| &entry.record)
    }

    /// Returns the number of registered schedules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no schedules are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ScheduleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn monday_nine() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap()
    }

    #[test]
    fn register_computes_first_fire() {
        let mut registry = ScheduleRegistry::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
        let id = registry
            .register(WorkflowId::new(), "0 9 * * MON", None, now)
            .unwrap();

        let record = registry.get(id).unwrap();
        assert_eq!(record.next_fire_at, Some(monday_nine()));
        assert!(record.active);
    }

    #[test]
    fn due_emits_job_with_original_scheduled_instant() {
        let mut registry = ScheduleRegistry::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
        let workflow_id = WorkflowId::new();
        let id = registry
            .register(workflow_id, "0 9 * * MON", None, now)
            .unwrap();

        // The tick arrives three seconds late.
        let tick = monday_nine() + Duration::seconds(3);
        let jobs = registry.due(tick);

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].workflow_id, workflow_id);
        assert_eq!(jobs[0].scheduled_for, Some(monday_nine()));
        assert_eq!(
            jobs[0].idempotency_key,
            format!("{id}:{}", monday_nine().timestamp())
        );
    }

    #[test]
    fn due_before_fire_time_emits_nothing() {
        let mut registry = ScheduleRegistry::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
        registry
            .register(WorkflowId::new(), "0 9 * * MON", None, now)
            .unwrap();

        assert!(registry.due(now + Duration::hours(1)).is_empty());
    }

    #[test]
    fn missed_firings_are_skipped_not_caught_up() {
        let mut registry = ScheduleRegistry::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
        let id = registry
            .register(WorkflowId::new(), "*/5 * * * *", None, now)
            .unwrap();

        // A one-hour outage spans eleven missed firings; exactly one job
        // comes out, and the schedule lands strictly in the future.
        let tick = now + Duration::hours(1);
        let jobs = registry.due(tick);
        assert_eq!(jobs.len(), 1);

        let next = registry.get(id).unwrap().next_fire_at.unwrap();
        assert!(next > tick);
        assert!(registry.due(tick).is_empty());
    }

    #[test]
    fn paused_schedule_does_not_fire_and_freezes_next_fire() {
        let mut registry = ScheduleRegistry::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
        let id = registry
            .register(WorkflowId::new(), "0 9 * * MON", None, now)
            .unwrap();

        registry.pause(id).unwrap();
        let jobs = registry.due(monday_nine() + Duration::minutes(1));
        assert!(jobs.is_empty());
        assert_eq!(registry.get(id).unwrap().next_fire_at, Some(monday_nine()));
    }

    #[test]
    fn resume_readvances_a_stale_fire_time() {
        let mut registry = ScheduleRegistry::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
        let id = registry
            .register(WorkflowId::new(), "0 9 * * MON", None, now)
            .unwrap();
        registry.pause(id).unwrap();

        // Resume a week past the frozen fire time.
        let later = monday_nine() + Duration::days(3);
        registry.resume(id, later).unwrap();

        let next = registry.get(id).unwrap().next_fire_at.unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap());
    }

    #[test]
    fn cancelled_schedule_is_gone() {
        let mut registry = ScheduleRegistry::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
        let id = registry
            .register(WorkflowId::new(), "0 9 * * MON", None, now)
            .unwrap();

        registry.cancel(id).unwrap();
        assert!(registry.get(id).is_none());
        assert!(registry.due(monday_nine()).is_empty());
        assert!(matches!(
            registry.cancel(id),
            Err(ScheduleError::NotFound { .. })
        ));
    }

    #[test]
    fn multiple_due_schedules_all_fire() {
        let mut registry = ScheduleRegistry::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
        registry
            .register(WorkflowId::new(), "0 9 * * MON", None, now)
            .unwrap();
        registry
            .register(WorkflowId::new(), "0 8 * * MON", None, now)
            .unwrap();

        let jobs = registry.due(monday_nine());
        assert_eq!(jobs.len(), 2);
    }

    #[test]
    fn register_rejects_bad_expression() {
        let mut registry = ScheduleRegistry::new();
        let result = registry.register(WorkflowId::new(), "not cron", None, Utc::now());
        assert!(matches!(
            result,
            Err(ScheduleError::InvalidCronExpression { .. })
        ));
    }
}
