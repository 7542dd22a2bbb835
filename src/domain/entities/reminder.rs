use serde::Serialize;

/// Urgency of a payment reminder, derived from days until the due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum ReminderTier {
    Overdue { days_overdue: i64 },
    /// Due today or tomorrow.
    Urgent { days_until_due: i64 },
    /// Due within three days.
    Soon { days_until_due: i64 },
    Informational { days_until_due: i64 },
}

impl ReminderTier {
    pub fn from_days_until_due(days_until_due: i64) -> Self {
        match days_until_due {
            d if d < 0 => ReminderTier::Overdue { days_overdue: -d },
            0 | 1 => ReminderTier::Urgent { days_until_due },
            2 | 3 => ReminderTier::Soon { days_until_due },
            _ => ReminderTier::Informational { days_until_due },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderTier::Overdue { .. } => "overdue",
            ReminderTier::Urgent { .. } => "urgent",
            ReminderTier::Soon { .. } => "soon",
            ReminderTier::Informational { .. } => "informational",
        }
    }
}
