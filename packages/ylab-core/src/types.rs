use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type TeamId = i64;
pub type AdminId = i64;
pub type ResourceId = i64;
pub type PurchaseId = i64;
pub type CompositionId = i64;
pub type PollId = i64;
pub type VoteId = i64;

/// Lifecycle of a purchase line. Wire values are the French labels the
/// frontend and the database share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PurchaseStatus {
    #[serde(rename = "en attente")]
    Pending,
    #[serde(rename = "confirmé")]
    Confirmed,
    #[serde(rename = "annulé")]
    Cancelled,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "en attente",
            Self::Confirmed => "confirmé",
            Self::Cancelled => "annulé",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "en attente" => Some(Self::Pending),
            "confirmé" => Some(Self::Confirmed),
            "annulé" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "service")]
    Service,
    #[serde(rename = "matériel")]
    Hardware,
    #[serde(rename = "avantage")]
    Perk,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Hardware => "matériel",
            Self::Perk => "avantage",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "service" => Some(Self::Service),
            "matériel" | "materiel" => Some(Self::Hardware),
            "avantage" => Some(Self::Perk),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog entry. `quantity` is the remaining stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub cost: i64,
    pub quantity: i64,
    pub max_per_team: i64,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    #[serde(default)]
    pub image_url: String,
    pub is_active: bool,
    #[serde(default)]
    pub is_non_returnable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of a team account (never carries the password hash)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamProfile {
    pub id: TeamId,
    pub name: String,
    pub email: String,
    pub credit: i64,
    pub last_activity: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminProfile {
    pub id: AdminId,
    pub username: String,
    pub email: String,
}

/// One purchase line. `quantity` is what is currently granted and may be
/// lowered by an admin; `requested_quantity` never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    pub team_id: TeamId,
    pub resource_id: ResourceId,
    pub quantity: i64,
    pub requested_quantity: i64,
    #[serde(default)]
    pub comment: String,
    pub purchase_date: DateTime<Utc>,
    pub is_returned: bool,
    pub needs_return: bool,
    pub status: PurchaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamProfile>,
}

impl Purchase {
    /// Credit value of the line at the embedded resource's current cost
    pub fn line_cost(&self) -> i64 {
        self.resource
            .as_ref()
            .map(|r| r.cost * self.quantity)
            .unwrap_or(0)
    }

    /// Confirmed, not yet returned, and flagged for return
    pub fn awaiting_return(&self) -> bool {
        self.needs_return && self.status == PurchaseStatus::Confirmed && !self.is_returned
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Department {
    Dev,
    Infra,
    Data,
    Iot,
    Sysemb,
}

impl Department {
    pub const ALL: [Department; 5] = [
        Department::Dev,
        Department::Infra,
        Department::Data,
        Department::Iot,
        Department::Sysemb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Infra => "infra",
            Self::Data => "data",
            Self::Iot => "iot",
            Self::Sysemb => "sysemb",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotAction {
    Fill,
    Empty,
}

/// Staffing slots of one hackathon team, per department
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamComposition {
    pub id: CompositionId,
    pub name: String,
    pub dev_total: i64,
    pub infra_total: i64,
    pub data_total: i64,
    pub iot_total: i64,
    pub sysemb_total: i64,
    pub dev_filled: i64,
    pub infra_filled: i64,
    pub data_filled: i64,
    pub iot_filled: i64,
    pub sysemb_filled: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TeamComposition {
    /// `(total, filled)` for a department
    pub fn slot(&self, department: Department) -> (i64, i64) {
        match department {
            Department::Dev => (self.dev_total, self.dev_filled),
            Department::Infra => (self.infra_total, self.infra_filled),
            Department::Data => (self.data_total, self.data_filled),
            Department::Iot => (self.iot_total, self.iot_filled),
            Department::Sysemb => (self.sysemb_total, self.sysemb_filled),
        }
    }

    fn filled_mut(&mut self, department: Department) -> &mut i64 {
        match department {
            Department::Dev => &mut self.dev_filled,
            Department::Infra => &mut self.infra_filled,
            Department::Data => &mut self.data_filled,
            Department::Iot => &mut self.iot_filled,
            Department::Sysemb => &mut self.sysemb_filled,
        }
    }

    /// Fill or empty one slot, clamped to `[0, total]`. Returns the new filled count.
    pub fn toggle(&mut self, department: Department, action: SlotAction) -> i64 {
        let (total, filled) = self.slot(department);
        let next = match action {
            SlotAction::Fill => filled + 1,
            SlotAction::Empty => filled - 1,
        }
        .clamp(0, total.max(0));
        *self.filled_mut(department) = next;
        next
    }

    pub fn total_slots(&self) -> i64 {
        Department::ALL.iter().map(|d| self.slot(*d).0).sum()
    }

    pub fn filled_slots(&self) -> i64 {
        Department::ALL.iter().map(|d| self.slot(*d).1).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PollStatus {
    #[serde(rename = "ouvert")]
    Open,
    #[serde(rename = "fermé")]
    Closed,
}

impl PollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "ouvert",
            Self::Closed => "fermé",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ouvert" => Some(Self::Open),
            "fermé" => Some(Self::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub question: String,
    pub options: Vec<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: PollStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub votes: Option<Vec<Vote>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub id: VoteId,
    pub team_id: TeamId,
    pub poll_id: PollId,
    pub chosen_option: String,
    pub credit_staked: i64,
    pub vote_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<Poll>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionTally {
    pub count: i64,
    pub total_credits: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composition() -> TeamComposition {
        let now = Utc::now();
        TeamComposition {
            id: 1,
            name: "Alpha".to_string(),
            dev_total: 2,
            infra_total: 1,
            data_total: 0,
            iot_total: 1,
            sysemb_total: 1,
            dev_filled: 1,
            infra_filled: 0,
            data_filled: 0,
            iot_filled: 1,
            sysemb_filled: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_wire_values() {
        let json = serde_json::to_string(&PurchaseStatus::Pending).unwrap();
        assert_eq!(json, "\"en attente\"");
        let parsed: PurchaseStatus = serde_json::from_str("\"confirmé\"").unwrap();
        assert_eq!(parsed, PurchaseStatus::Confirmed);
        assert_eq!(PurchaseStatus::from_str("annulé"), Some(PurchaseStatus::Cancelled));
        assert_eq!(PurchaseStatus::from_str("cancelled"), None);
    }

    #[test]
    fn test_resource_kind_uses_type_field() {
        let now = Utc::now();
        let resource = Resource {
            id: 3,
            name: "Raspberry Pi".to_string(),
            description: String::new(),
            cost: 120,
            quantity: 4,
            max_per_team: 1,
            kind: ResourceKind::Hardware,
            image_url: String::new(),
            is_active: true,
            is_non_returnable: false,
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&resource).unwrap();
        assert_eq!(value["type"], "matériel");
        assert!(value.get("kind").is_none());
    }

    #[test]
    fn test_toggle_clamps_to_bounds() {
        let mut team = composition();

        assert_eq!(team.toggle(Department::Dev, SlotAction::Fill), 2);
        // Already full
        assert_eq!(team.toggle(Department::Dev, SlotAction::Fill), 2);

        assert_eq!(team.toggle(Department::Infra, SlotAction::Empty), 0);
        assert_eq!(team.toggle(Department::Data, SlotAction::Fill), 0);

        assert_eq!(team.toggle(Department::Iot, SlotAction::Empty), 0);
        assert_eq!(team.iot_filled, 0);
    }

    #[test]
    fn test_slot_totals() {
        let team = composition();
        assert_eq!(team.total_slots(), 5);
        assert_eq!(team.filled_slots(), 2);
    }
}
