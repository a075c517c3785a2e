use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A seller account. Lifecycle is external to this pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seller {
    pub id: i64,
    pub is_verified_seller: bool,
}

/// An ad listing, immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub item_id: i64,
    pub seller_id: i64,
    pub name: String,
    pub description: String,
    pub category: i32,
    pub images_qty: i32,
    pub is_verified_seller: bool,
}

impl Listing {
    /// The 4-vector the scorer consumes.
    #[must_use]
    pub fn feature_vector(&self) -> [f64; 4] {
        [
            if self.is_verified_seller { 1.0 } else { 0.0 },
            f64::from(self.images_qty.min(10)) / 10.0,
            self.description.chars().count() as f64 / 1000.0,
            f64::from(self.category) / 100.0,
        ]
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Failed,
}

impl TaskStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown task status `{other}`")),
        }
    }
}

/// A moderation task, the central entity of this pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub item_id: i64,
    pub status: TaskStatus,
    pub is_violation: Option<bool>,
    pub probability: Option<f64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Truncates `error_message` to a 1000-char bound.
pub const ERROR_MESSAGE_MAX_LEN: usize = 1000;

#[must_use]
pub fn truncate_error_message(message: &str) -> String {
    if message.chars().count() <= ERROR_MESSAGE_MAX_LEN {
        message.to_string()
    } else {
        message.chars().take(ERROR_MESSAGE_MAX_LEN).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_vector_clamps_images_qty_at_ten() {
        let listing = Listing {
            item_id: 1,
            seller_id: 1,
            name: String::new(),
            description: "x".repeat(500),
            category: 50,
            images_qty: 40,
            is_verified_seller: true,
        };
        assert_eq!(listing.feature_vector(), [1.0, 1.0, 0.5, 0.5]);
    }

    #[test]
    fn feature_vector_reflects_unverified_seller_and_empty_description() {
        let listing = Listing {
            item_id: 1,
            seller_id: 1,
            name: String::new(),
            description: String::new(),
            category: 0,
            images_qty: 0,
            is_verified_seller: false,
        };
        assert_eq!(listing.feature_vector(), [0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn task_status_round_trips_through_its_string_form() {
        for status in [TaskStatus::Pending, TaskStatus::Completed, TaskStatus::Failed] {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("unknown".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn error_message_truncates_at_one_thousand_chars() {
        let long = "e".repeat(1500);
        let truncated = truncate_error_message(&long);
        assert_eq!(truncated.chars().count(), ERROR_MESSAGE_MAX_LEN);

        let short = "short error";
        assert_eq!(truncate_error_message(short), short);
    }
}
