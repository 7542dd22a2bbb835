use serde::{Deserialize, Serialize};

/// Processing state of a stored provider callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "webhook_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    #[default]
    Pending,
    Processed,
    Failed,
}

impl WebhookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookStatus::Pending => "pending",
            WebhookStatus::Processed => "processed",
            WebhookStatus::Failed => "failed",
        }
    }

    /// Events that may be handed to the replay endpoint.
    pub fn is_replayable(&self) -> bool {
        matches!(self, WebhookStatus::Pending | WebhookStatus::Failed)
    }
}

impl std::fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pipeline stage reported back to the provider when a delivery fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStep {
    Resolve,
    Persist,
    Verify,
    Process,
}

impl WebhookStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookStep::Resolve => "resolve",
            WebhookStep::Persist => "persist",
            WebhookStep::Verify => "verify",
            WebhookStep::Process => "process",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replayable() {
        assert!(WebhookStatus::Failed.is_replayable());
        assert!(WebhookStatus::Pending.is_replayable());
        assert!(!WebhookStatus::Processed.is_replayable());
    }
}
