use serde::Serialize;
use ylab_core::api::Role;
use ylab_core::orders::{group_purchases, order_stats, OrderEntry, OrderStats};
use ylab_core::Purchase;

use super::{report, Context};
use crate::cli::{BuyArgs, OrdersArgs, ReturnArgs};
use crate::exit_codes;

fn resource_name(purchase: &Purchase) -> String {
    purchase
        .resource
        .as_ref()
        .map(|r| r.name.clone())
        .unwrap_or_else(|| format!("resource #{}", purchase.resource_id))
}

fn print_line(purchase: &Purchase, indent: &str) {
    let quantity = if purchase.quantity != purchase.requested_quantity {
        format!("{} (requested {})", purchase.quantity, purchase.requested_quantity)
    } else {
        purchase.quantity.to_string()
    };
    let returned = if purchase.is_returned {
        " [returned]"
    } else if purchase.awaiting_return() {
        " [to return]"
    } else {
        ""
    };

    println!(
        "{}#{:<5} {} x {} - {}{}",
        indent,
        purchase.id,
        quantity,
        resource_name(purchase),
        purchase.status,
        returned
    );
}

#[derive(Serialize)]
struct OrdersView {
    stats: OrderStats,
    orders: Vec<OrderEntry>,
}

pub async fn list(ctx: &Context, args: OrdersArgs) -> i32 {
    if let Err(e) = ctx.require(Role::Team) {
        return report(e);
    }

    let purchases = match ctx.client.team_purchases(args.needs_return).await {
        Ok(p) => p,
        Err(e) => return report(e),
    };

    let view = OrdersView {
        stats: order_stats(&purchases),
        orders: group_purchases(purchases),
    };

    ctx.emit(&view, |v| {
        if v.orders.is_empty() {
            println!("No orders yet.");
            return;
        }

        for entry in &v.orders {
            match entry {
                OrderEntry::Batch(group) => {
                    println!(
                        "Order {} ({}) - {} item(s), {} credits, {}",
                        group.batch_id,
                        group.submitted_at().format("%Y-%m-%d %H:%M"),
                        group.total_items,
                        group.total_cost,
                        group.status.as_str()
                    );
                    if !group.comment.is_empty() {
                        println!("  \"{}\"", group.comment);
                    }
                    for purchase in &group.purchases {
                        print_line(purchase, "  ");
                    }
                }
                OrderEntry::Single(purchase) => print_line(purchase, ""),
            }
        }

        let s = &v.stats;
        println!();
        println!(
            "{} purchase(s): {} pending, {} confirmed, {} cancelled, {} to return. {} credits spent.",
            s.total, s.pending, s.confirmed, s.cancelled, s.needs_return, s.total_spent
        );
    })
}

pub async fn buy(ctx: &Context, args: BuyArgs) -> i32 {
    if args.quantity < 1 {
        eprintln!("Error: quantity must be at least 1");
        return exit_codes::INPUT_ERROR;
    }
    if let Err(e) = ctx.require(Role::Team) {
        return report(e);
    }

    match ctx.client.purchase(args.resource_id, args.quantity).await {
        Ok(purchase) => ctx.emit(&purchase, |p| {
            println!("✅ Purchase #{} submitted, awaiting approval.", p.id);
            print_line(p, "  ");
        }),
        Err(e) => report(e),
    }
}

pub async fn return_item(ctx: &Context, args: ReturnArgs) -> i32 {
    if let Err(e) = ctx.require(Role::Team) {
        return report(e);
    }

    match ctx.client.return_purchase(args.purchase_id).await {
        Ok(purchase) => ctx.emit(&purchase, |p| {
            println!("✅ Purchase #{} returned.", p.id);
        }),
        Err(e) => report(e),
    }
}
