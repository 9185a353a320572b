use ylab_core::api::{BatchActionItem, BatchActionRequest, DecisionAction, Role, ToggleSlotRequest};
use ylab_core::{Department, Purchase, TeamComposition};

use super::{report, Context};
use crate::cli::{AdminCommand, Decision};
use crate::client::PurchaseQuery;
use crate::exit_codes;
use crate::output::truncate;

impl From<Decision> for DecisionAction {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Confirm => DecisionAction::Confirm,
            Decision::Cancel => DecisionAction::Cancel,
        }
    }
}

/// Parse `id:action[:approved_quantity]`
fn parse_batch_item(raw: &str) -> Result<BatchActionItem, String> {
    let parts: Vec<&str> = raw.split(':').collect();

    let (id, action, approved) = match parts.as_slice() {
        [id, action] => (*id, *action, None),
        [id, action, qty] => (*id, *action, Some(*qty)),
        _ => return Err(format!("Invalid item '{}', expected id:action[:quantity]", raw)),
    };

    let purchase_id = id
        .trim()
        .parse()
        .map_err(|_| format!("Invalid purchase id '{}'", id))?;

    let action = match action.trim() {
        "confirm" => DecisionAction::Confirm,
        "cancel" => DecisionAction::Cancel,
        other => return Err(format!("Invalid action '{}', expected confirm or cancel", other)),
    };

    let approved_quantity = match approved {
        Some(_) if action == DecisionAction::Cancel => {
            return Err(format!("Item '{}': a quantity only applies to confirm", raw))
        }
        Some(qty) => Some(
            qty.trim()
                .parse::<i64>()
                .map_err(|_| format!("Invalid quantity '{}'", qty))?,
        ),
        None => None,
    };

    Ok(BatchActionItem {
        purchase_id,
        action,
        approved_quantity,
    })
}

fn print_purchases(purchases: &[Purchase]) {
    if purchases.is_empty() {
        println!("No purchases found.");
        return;
    }

    println!(
        "{:<6} {:<20} {:<26} {:>5} {:>5} {:<11} {:<17}",
        "ID", "Team", "Resource", "Qty", "Req", "Status", "Date"
    );
    println!("{}", "-".repeat(96));
    for p in purchases {
        let team = p.team.as_ref().map(|t| t.name.as_str()).unwrap_or("-");
        let resource = p.resource.as_ref().map(|r| r.name.as_str()).unwrap_or("-");
        println!(
            "{:<6} {:<20} {:<26} {:>5} {:>5} {:<11} {:<17}",
            p.id,
            truncate(team, 18),
            truncate(resource, 24),
            p.quantity,
            p.requested_quantity,
            p.status.as_str(),
            p.purchase_date.format("%Y-%m-%d %H:%M")
        );
    }
}

fn print_composition(c: &TeamComposition) {
    let slots: Vec<String> = Department::ALL
        .iter()
        .map(|d| {
            let (total, filled) = c.slot(*d);
            format!("{} {}/{}", d.as_str(), filled, total)
        })
        .collect();
    println!("#{:<5} {:<24} {}", c.id, truncate(&c.name, 22), slots.join("  "));
}

pub async fn execute(ctx: &Context, cmd: AdminCommand) -> i32 {
    // Parse before any request so a typo never half-applies a batch
    let batch = match &cmd {
        AdminCommand::DecideBatch { items } => {
            match items.iter().map(|s| parse_batch_item(s)).collect::<Result<Vec<_>, _>>() {
                Ok(items) => Some(BatchActionRequest { items }),
                Err(msg) => {
                    eprintln!("Error: {}", msg);
                    return exit_codes::INPUT_ERROR;
                }
            }
        }
        _ => None,
    };

    if let Err(e) = ctx.require(Role::Admin) {
        return report(e);
    }

    match cmd {
        AdminCommand::Purchases {
            status,
            team,
            needs_return,
        } => {
            let query = PurchaseQuery {
                status,
                team_id: team,
                needs_return,
            };
            match ctx.client.admin_purchases(&query).await {
                Ok(purchases) => ctx.emit(&purchases, |p| print_purchases(p)),
                Err(e) => report(e),
            }
        }

        AdminCommand::Purchase { purchase_id } => match ctx.client.admin_purchase(purchase_id).await {
            Ok(purchase) => ctx.emit(&purchase, |p| print_purchases(std::slice::from_ref(p))),
            Err(e) => report(e),
        },

        AdminCommand::Decide {
            purchase_id,
            decision,
        } => match ctx.client.decide(purchase_id, decision.into()).await {
            Ok(purchase) => ctx.emit(&purchase, |p| {
                println!("✅ Purchase #{} is now {} (quantity {}).", p.id, p.status, p.quantity);
            }),
            Err(e) => report(e),
        },

        AdminCommand::DecideBatch { .. } => {
            let Some(request) = batch else {
                return exit_codes::INPUT_ERROR;
            };
            let response = match ctx.client.decide_batch(&request).await {
                Ok(r) => r,
                Err(e) => return report(e),
            };

            let code = ctx.emit(&response, |r| {
                for result in &r.results {
                    match (&result.error, result.status) {
                        (Some(error), _) => println!("❌ #{}: {}", result.purchase_id, error),
                        (None, Some(status)) => println!(
                            "✅ #{}: {} (quantity {})",
                            result.purchase_id,
                            status,
                            result.quantity.unwrap_or_default()
                        ),
                        (None, None) => println!("✅ #{}", result.purchase_id),
                    }
                }
                println!("{} of {} processed.", r.success_count, r.total);
            });

            if code == exit_codes::SUCCESS && response.failure_count > 0 {
                exit_codes::PARTIAL_FAILURE
            } else {
                code
            }
        }

        AdminCommand::MarkReturned { purchase_id } => {
            match ctx.client.mark_returned(purchase_id).await {
                Ok(purchase) => ctx.emit(&purchase, |p| {
                    println!("✅ Purchase #{} marked as returned.", p.id);
                }),
                Err(e) => report(e),
            }
        }

        AdminCommand::UnmarkReturned { purchase_id } => {
            match ctx.client.unmark_returned(purchase_id).await {
                Ok(purchase) => ctx.emit(&purchase, |p| {
                    println!("✅ Purchase #{} no longer marked as returned.", p.id);
                }),
                Err(e) => report(e),
            }
        }

        AdminCommand::Teams => match ctx.client.teams().await {
            Ok(teams) => ctx.emit(&teams, |teams| {
                println!("{:<6} {:<24} {:<30} {:>8}", "ID", "Name", "Email", "Credit");
                println!("{}", "-".repeat(71));
                for t in teams {
                    println!(
                        "{:<6} {:<24} {:<30} {:>8}",
                        t.id,
                        truncate(&t.name, 22),
                        truncate(&t.email, 28),
                        t.credit
                    );
                }
            }),
            Err(e) => report(e),
        },

        AdminCommand::Compositions => match ctx.client.compositions().await {
            Ok(compositions) => ctx.emit(&compositions, |compositions| {
                if compositions.is_empty() {
                    println!("No team compositions.");
                }
                for c in compositions {
                    print_composition(c);
                }
            }),
            Err(e) => report(e),
        },

        AdminCommand::Toggle {
            composition_id,
            department,
            action,
        } => {
            let request = ToggleSlotRequest {
                department: department.into(),
                action: action.into(),
            };
            match ctx.client.toggle_slot(composition_id, &request).await {
                Ok(composition) => ctx.emit(&composition, print_composition),
                Err(e) => report(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_batch_item() {
        let item = parse_batch_item("12:confirm").unwrap();
        assert_eq!(item.purchase_id, 12);
        assert_eq!(item.action, DecisionAction::Confirm);
        assert_eq!(item.approved_quantity, None);

        let item = parse_batch_item("14:confirm:1").unwrap();
        assert_eq!(item.approved_quantity, Some(1));

        let item = parse_batch_item("13:cancel").unwrap();
        assert_eq!(item.action, DecisionAction::Cancel);
    }

    #[test]
    fn test_parse_batch_item_rejects_bad_input() {
        assert!(parse_batch_item("12").is_err());
        assert!(parse_batch_item("x:confirm").is_err());
        assert!(parse_batch_item("12:approve").is_err());
        assert!(parse_batch_item("12:cancel:2").is_err());
        assert!(parse_batch_item("12:confirm:two").is_err());
    }
}
