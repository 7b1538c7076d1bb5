use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 订阅状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    #[serde(other)]
    Inactive,
}

impl SubscriptionStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Trialing)
    }
}

/// 展台订阅信息（展台选择列表的数据源）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoothSubscription {
    pub booth_id: String,
    pub booth_name: String,
    #[serde(default = "default_status")]
    pub status: SubscriptionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_period_end: Option<DateTime<Utc>>,
}

fn default_status() -> SubscriptionStatus {
    SubscriptionStatus::Inactive
}

impl BoothSubscription {
    pub fn has_valid_subscription(&self) -> bool {
        self.status.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_status_maps_to_inactive() {
        let booth: BoothSubscription = serde_json::from_value(json!({
            "booth_id": "B1",
            "booth_name": "Lobby",
            "status": "incomplete_expired"
        }))
        .unwrap();
        assert_eq!(booth.status, SubscriptionStatus::Inactive);
        assert!(!booth.has_valid_subscription());
    }

    #[test]
    fn trialing_counts_as_valid() {
        let booth: BoothSubscription = serde_json::from_value(json!({
            "booth_id": "B2",
            "booth_name": "Mall",
            "status": "trialing",
            "plan_name": "Pro",
            "current_period_end": "2026-11-01T00:00:00Z"
        }))
        .unwrap();
        assert!(booth.has_valid_subscription());
        assert_eq!(booth.plan_name.as_deref(), Some("Pro"));
    }

    #[test]
    fn missing_status_defaults_to_inactive() {
        let booth: BoothSubscription =
            serde_json::from_value(json!({ "booth_id": "B3", "booth_name": "Pier" })).unwrap();
        assert_eq!(booth.status, SubscriptionStatus::Inactive);
    }
}
