//! Cron expression evaluation with timezone support.

use crate::error::ScheduleError;
use amber_relay_core::{ScheduleId, WorkflowId};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronExpr;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A parsed, timezone-aware cron schedule.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    timezone: Tz,
    parsed: CronExpr,
}

impl CronSchedule {
    /// Parses a cron expression with an optional IANA timezone.
    ///
    /// Classic 5-field expressions (`min hour dom month dow`) are accepted
    /// and normalized by prefixing a seconds column; 6- and 7-field
    /// expressions pass through as-is. The timezone defaults to UTC.
    ///
    /// # Errors
    ///
    /// Returns an error when the expression or timezone is invalid.
    pub fn parse(expression: &str, timezone: Option<&str>) -> Result<Self, ScheduleError> {
        let timezone = match timezone {
            Some(name) => Tz::from_str(name).map_err(|_| ScheduleError::InvalidTimezone {
                timezone: name.to_string(),
            })?,
            None => Tz::UTC,
        };

        let normalized = normalize(expression);
        let parsed =
            CronExpr::from_str(&normalized).map_err(|e| ScheduleError::InvalidCronExpression {
                expression: expression.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            expression: expression.to_string(),
            timezone,
            parsed,
        })
    }

    /// Returns the original expression.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Returns the schedule's timezone.
    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Computes the first firing instant strictly after `after`.
    ///
    /// Evaluation happens in the schedule's timezone; the result is
    /// reported in UTC. Returns `None` for expressions with no future
    /// firings.
    #[must_use]
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&self.timezone);
        self.parsed
            .after(&local)
            .next()
            .map(|fire| fire.with_timezone(&Utc))
    }
}

/// Normalizes a classic 5-field expression by prefixing a seconds column.
fn normalize(expression: &str) -> String {
    let fields = expression.split_whitespace().count();
    if fields == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    }
}

/// A registered schedule record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    /// Unique identifier.
    pub id: ScheduleId,
    /// The workflow this schedule fires.
    pub workflow_id: WorkflowId,
    /// The cron expression.
    pub cron: String,
    /// The IANA timezone, when not UTC.
    pub timezone: Option<String>,
    /// The next firing instant; frozen while paused, `None` when the
    /// expression has no future firings.
    pub next_fire_at: Option<DateTime<Utc>>,
    /// Whether the schedule fires at all.
    pub active: bool,
    /// When the schedule was registered.
    pub created_at: DateTime<Utc>,
}
