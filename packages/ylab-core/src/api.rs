//! Request and response bodies shared by the server and its clients.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{
    AdminProfile, Department, OptionTally, Poll, PollId, PurchaseId, PurchaseStatus, ResourceId,
    SlotAction, TeamProfile,
};

/// Kind of principal behind a bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Team,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Team => "team",
            Self::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamLoginRequest {
    /// Team name, or the team's email address
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamLoginResponse {
    pub token: String,
    pub expires_in: u64,
    pub team: TeamProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLoginResponse {
    pub token: String,
    pub expires_in: u64,
    pub admin: AdminProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VerifiedUser {
    Team(TeamProfile),
    Admin(AdminProfile),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(rename = "type")]
    pub role: Role,
    pub user: VerifiedUser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub resource_id: ResourceId,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseItem {
    pub resource_id: ResourceId,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPurchaseRequest {
    pub items: Vec<PurchaseItem>,
    pub comment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Confirm,
    Cancel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseActionRequest {
    pub action: DecisionAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchActionItem {
    pub purchase_id: PurchaseId,
    pub action: DecisionAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_quantity: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchActionRequest {
    pub items: Vec<BatchActionItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchActionResult {
    pub purchase_id: PurchaseId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PurchaseStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
}

impl BatchActionResult {
    pub fn failed(purchase_id: PurchaseId, error: impl Into<String>) -> Self {
        Self {
            purchase_id,
            success: false,
            error: Some(error.into()),
            status: None,
            quantity: None,
        }
    }

    pub fn succeeded(purchase_id: PurchaseId, status: PurchaseStatus, quantity: i64) -> Self {
        Self {
            purchase_id,
            success: true,
            error: None,
            status: Some(status),
            quantity: Some(quantity),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchActionResponse {
    pub message: String,
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub results: Vec<BatchActionResult>,
}

impl BatchActionResponse {
    pub fn from_results(results: Vec<BatchActionResult>) -> Self {
        let success_count = results.iter().filter(|r| r.success).count();
        Self {
            message: "Batch processed".to_string(),
            total: results.len(),
            success_count,
            failure_count: results.len() - success_count,
            results,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleSlotRequest {
    pub department: Department,
    pub action: SlotAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub poll_id: PollId,
    pub chosen_option: String,
    pub credit_staked: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollResults {
    pub poll: Poll,
    pub results: BTreeMap<String, OptionTally>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_response_counts() {
        let response = BatchActionResponse::from_results(vec![
            BatchActionResult::succeeded(1, PurchaseStatus::Confirmed, 2),
            BatchActionResult::failed(2, "Insufficient stock"),
            BatchActionResult::succeeded(3, PurchaseStatus::Cancelled, 1),
        ]);

        assert_eq!(response.message, "Batch processed");
        assert_eq!(response.total, 3);
        assert_eq!(response.success_count, 2);
        assert_eq!(response.failure_count, 1);
    }

    #[test]
    fn test_failed_result_omits_status() {
        let value = serde_json::to_value(BatchActionResult::failed(9, "Purchase not found")).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "Purchase not found");
        assert!(value.get("status").is_none());
        assert!(value.get("quantity").is_none());
    }

    #[test]
    fn test_decision_action_rejects_unknown() {
        assert!(serde_json::from_str::<PurchaseActionRequest>(r#"{"action":"confirm"}"#).is_ok());
        assert!(serde_json::from_str::<PurchaseActionRequest>(r#"{"action":"delete"}"#).is_err());
    }
}
