//! Row to domain type conversions shared by the Postgres stores.
//!
//! Joined queries alias the columns of embedded rows with a prefix
//! (`r_` for the resource, `t_` for the team) so one row can carry all three.

use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::Row;
use ylab_core::{
    AdminProfile, Poll, PollStatus, Purchase, PurchaseStatus, Resource, ResourceKind,
    TeamComposition, TeamProfile, Vote,
};

use super::traits::{StorageError, StorageResult};

pub const TEAM_COLUMNS: &str =
    "id, name, email, credit, last_activity, created_at, updated_at";

pub const ADMIN_COLUMNS: &str = "id, username, email";

pub const RESOURCE_COLUMNS: &str = "id, name, description, cost, quantity, max_per_team, type, \
     image_url, is_active, is_non_returnable, created_at, updated_at";

pub const COMPOSITION_COLUMNS: &str = "id, name, dev_total, infra_total, data_total, iot_total, \
     sysemb_total, dev_filled, infra_filled, data_filled, iot_filled, sysemb_filled, \
     created_at, updated_at";

pub const POLL_COLUMNS: &str =
    "id, question, options, start_date, end_date, status, created_at, updated_at";

pub const VOTE_COLUMNS: &str = "id, team_id, poll_id, chosen_option, credit_staked, vote_date";

/// Purchases joined with their resource and team
pub const PURCHASE_SELECT: &str = r#"
    SELECT p.id, p.batch_id, p.team_id, p.resource_id, p.quantity, p.requested_quantity,
           p.comment, p.purchase_date, p.is_returned, p.needs_return, p.status,
           p.created_at, p.updated_at,
           r.id AS r_id, r.name AS r_name, r.description AS r_description, r.cost AS r_cost,
           r.quantity AS r_quantity, r.max_per_team AS r_max_per_team, r.type AS r_type,
           r.image_url AS r_image_url, r.is_active AS r_is_active,
           r.is_non_returnable AS r_is_non_returnable,
           r.created_at AS r_created_at, r.updated_at AS r_updated_at,
           t.id AS t_id, t.name AS t_name, t.email AS t_email, t.credit AS t_credit,
           t.last_activity AS t_last_activity, t.created_at AS t_created_at,
           t.updated_at AS t_updated_at
    FROM purchases p
    JOIN resources r ON r.id = p.resource_id
    JOIN teams t ON t.id = p.team_id
"#;

fn col(prefix: &str, name: &str) -> String {
    format!("{}{}", prefix, name)
}

pub fn team_from_row(row: &PgRow, prefix: &str) -> StorageResult<TeamProfile> {
    Ok(TeamProfile {
        id: row.try_get(col(prefix, "id").as_str())?,
        name: row.try_get(col(prefix, "name").as_str())?,
        email: row.try_get(col(prefix, "email").as_str())?,
        credit: row.try_get(col(prefix, "credit").as_str())?,
        last_activity: row.try_get(col(prefix, "last_activity").as_str())?,
        created_at: row.try_get(col(prefix, "created_at").as_str())?,
        updated_at: row.try_get(col(prefix, "updated_at").as_str())?,
    })
}

pub fn admin_from_row(row: &PgRow) -> StorageResult<AdminProfile> {
    Ok(AdminProfile {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
    })
}

pub fn resource_from_row(row: &PgRow, prefix: &str) -> StorageResult<Resource> {
    let kind: String = row.try_get(col(prefix, "type").as_str())?;

    Ok(Resource {
        id: row.try_get(col(prefix, "id").as_str())?,
        name: row.try_get(col(prefix, "name").as_str())?,
        description: row.try_get(col(prefix, "description").as_str())?,
        cost: row.try_get(col(prefix, "cost").as_str())?,
        quantity: row.try_get(col(prefix, "quantity").as_str())?,
        max_per_team: row.try_get(col(prefix, "max_per_team").as_str())?,
        kind: ResourceKind::from_str(&kind)
            .ok_or_else(|| StorageError::Corrupt(format!("resource type '{}'", kind)))?,
        image_url: row.try_get(col(prefix, "image_url").as_str())?,
        is_active: row.try_get(col(prefix, "is_active").as_str())?,
        is_non_returnable: row.try_get(col(prefix, "is_non_returnable").as_str())?,
        created_at: row.try_get(col(prefix, "created_at").as_str())?,
        updated_at: row.try_get(col(prefix, "updated_at").as_str())?,
    })
}

/// Map a `PURCHASE_SELECT` row. The team is only embedded when asked for.
pub fn purchase_from_row(row: &PgRow, embed_team: bool) -> StorageResult<Purchase> {
    let status: String = row.try_get("status")?;

    Ok(Purchase {
        id: row.try_get("id")?,
        batch_id: row.try_get("batch_id")?,
        team_id: row.try_get("team_id")?,
        resource_id: row.try_get("resource_id")?,
        quantity: row.try_get("quantity")?,
        requested_quantity: row.try_get("requested_quantity")?,
        comment: row.try_get("comment")?,
        purchase_date: row.try_get("purchase_date")?,
        is_returned: row.try_get("is_returned")?,
        needs_return: row.try_get("needs_return")?,
        status: PurchaseStatus::from_str(&status)
            .ok_or_else(|| StorageError::Corrupt(format!("purchase status '{}'", status)))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        resource: Some(resource_from_row(row, "r_")?),
        team: if embed_team {
            Some(team_from_row(row, "t_")?)
        } else {
            None
        },
    })
}

pub fn composition_from_row(row: &PgRow) -> StorageResult<TeamComposition> {
    Ok(TeamComposition {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        dev_total: row.try_get("dev_total")?,
        infra_total: row.try_get("infra_total")?,
        data_total: row.try_get("data_total")?,
        iot_total: row.try_get("iot_total")?,
        sysemb_total: row.try_get("sysemb_total")?,
        dev_filled: row.try_get("dev_filled")?,
        infra_filled: row.try_get("infra_filled")?,
        data_filled: row.try_get("data_filled")?,
        iot_filled: row.try_get("iot_filled")?,
        sysemb_filled: row.try_get("sysemb_filled")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub fn poll_from_row(row: &PgRow) -> StorageResult<Poll> {
    let status: String = row.try_get("status")?;
    let Json(options): Json<Vec<String>> = row.try_get("options")?;

    Ok(Poll {
        id: row.try_get("id")?,
        question: row.try_get("question")?,
        options,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        status: PollStatus::from_str(&status)
            .ok_or_else(|| StorageError::Corrupt(format!("poll status '{}'", status)))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        votes: None,
    })
}

pub fn vote_from_row(row: &PgRow) -> StorageResult<Vote> {
    Ok(Vote {
        id: row.try_get("id")?,
        team_id: row.try_get("team_id")?,
        poll_id: row.try_get("poll_id")?,
        chosen_option: row.try_get("chosen_option")?,
        credit_staked: row.try_get("credit_staked")?,
        vote_date: row.try_get("vote_date")?,
        poll: None,
    })
}
