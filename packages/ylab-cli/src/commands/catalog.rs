use serde::Serialize;
use ylab_core::api::Role;
use ylab_core::quota::{purchase_stats, ResourcePurchaseStats};
use ylab_core::{Resource, ResourceId};

use super::{report, Context};
use crate::cli::CatalogCommand;
use crate::exit_codes;
use crate::output::truncate;

pub async fn execute(ctx: &Context, cmd: CatalogCommand) -> i32 {
    match cmd {
        CatalogCommand::List { kind } => list(ctx, kind.as_deref()).await,
        CatalogCommand::Show { id } => show(ctx, id).await,
    }
}

async fn list(ctx: &Context, kind: Option<&str>) -> i32 {
    let resources = match ctx.client.resources(kind).await {
        Ok(r) => r,
        Err(e) => return report(e),
    };

    ctx.emit(&resources, |resources| {
        if resources.is_empty() {
            println!("No resources available.");
            return;
        }

        println!(
            "{:<6} {:<30} {:<10} {:>6} {:>6} {:>6}",
            "ID", "Name", "Type", "Cost", "Stock", "Max"
        );
        println!("{}", "-".repeat(70));
        for r in resources {
            println!(
                "{:<6} {:<30} {:<10} {:>6} {:>6} {:>6}",
                r.id,
                truncate(&r.name, 28),
                r.kind.as_str(),
                r.cost,
                r.quantity,
                r.max_per_team
            );
        }
    })
}

#[derive(Serialize)]
struct ResourceView {
    resource: Resource,
    #[serde(skip_serializing_if = "Option::is_none")]
    quota: Option<ResourcePurchaseStats>,
}

async fn show(ctx: &Context, id: ResourceId) -> i32 {
    let resource = match ctx.client.resource(id).await {
        Ok(r) => r,
        Err(e) => return report(e),
    };

    // Quota figures only make sense for a logged-in team
    let quota = if ctx.require(Role::Team).is_ok() {
        let cart = match ctx.carts.load() {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {}", e);
                return exit_codes::INPUT_ERROR;
            }
        };
        match ctx.client.team_purchases(false).await {
            Ok(purchases) => Some(purchase_stats(&resource, &purchases, &cart)),
            Err(e) => return report(e),
        }
    } else {
        None
    };

    let view = ResourceView { resource, quota };
    ctx.emit(&view, |v| {
        let r = &v.resource;
        println!("{} (#{})", r.name, r.id);
        println!("  Type:        {}", r.kind);
        println!("  Cost:        {} credits", r.cost);
        println!("  Stock:       {}", r.quantity);
        println!("  Max / team:  {}", r.max_per_team);
        println!("  Returnable:  {}", if r.is_non_returnable { "No" } else { "Yes" });
        if !r.description.is_empty() {
            println!("  {}", r.description);
        }
        if let Some(q) = &v.quota {
            println!();
            println!("  Purchased:   {}", q.purchased);
            println!("  Pending:     {}", q.pending);
            println!("  In cart:     {}", q.in_cart);
            println!("  Can add:     {}", q.remaining_quota);
        }
    })
}
