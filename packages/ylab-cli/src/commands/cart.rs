use ylab_core::api::{BatchPurchaseRequest, Role};
use ylab_core::quota::validate_add_to_cart;
use ylab_core::rules::validate_batch_comment;
use ylab_core::{Cart, ResourceId};

use super::{report, Context};
use crate::cli::CartCommand;
use crate::exit_codes;
use crate::output::truncate;

pub async fn execute(ctx: &Context, cmd: CartCommand) -> i32 {
    let mut cart = match ctx.carts.load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    match cmd {
        CartCommand::Add {
            resource_id,
            quantity,
        } => add(ctx, &mut cart, resource_id, quantity).await,
        CartCommand::Set {
            resource_id,
            quantity,
        } => {
            if !cart.update_quantity(resource_id, quantity) {
                eprintln!("Error: resource {} is not in the cart", resource_id);
                return exit_codes::INPUT_ERROR;
            }
            save_and_show(ctx, &cart)
        }
        CartCommand::Remove { resource_id } => {
            if !cart.remove_item(resource_id) {
                eprintln!("Error: resource {} is not in the cart", resource_id);
                return exit_codes::INPUT_ERROR;
            }
            save_and_show(ctx, &cart)
        }
        CartCommand::Clear => {
            cart.clear();
            save_and_show(ctx, &cart)
        }
        CartCommand::Show => show(ctx, &cart),
        CartCommand::Checkout { comment } => checkout(ctx, &mut cart, comment).await,
    }
}

async fn add(ctx: &Context, cart: &mut Cart, resource_id: ResourceId, quantity: i64) -> i32 {
    if let Err(e) = ctx.require(Role::Team) {
        return report(e);
    }

    // Fresh data so the quota reflects decisions taken since the last run
    let resource = match ctx.client.resource(resource_id).await {
        Ok(r) => r,
        Err(e) => return report(e),
    };
    let purchases = match ctx.client.team_purchases(false).await {
        Ok(p) => p,
        Err(e) => return report(e),
    };

    let validation = validate_add_to_cart(&resource, quantity, &purchases, cart);
    if !validation.success {
        let message = validation.error.as_deref().unwrap_or("Cannot add this item");
        eprintln!("Error: {}", message);
        if let Some(max) = validation.max_quantity_allowed {
            eprintln!("You can add at most {} more.", max);
        }
        if ctx.json {
            crate::output::print_json(&validation);
        }
        return exit_codes::INPUT_ERROR;
    }

    log::info!("Adding {} x {} to the cart", quantity, resource.name);
    cart.add_item(resource, quantity);
    save_and_show(ctx, cart)
}

fn save_and_show(ctx: &Context, cart: &Cart) -> i32 {
    if let Err(e) = ctx.carts.save(cart) {
        eprintln!("Error: {}", e);
        return exit_codes::INPUT_ERROR;
    }
    show(ctx, cart)
}

fn show(ctx: &Context, cart: &Cart) -> i32 {
    ctx.emit(cart, |cart| {
        if cart.is_empty() {
            println!("Cart is empty.");
            return;
        }

        println!("{:<6} {:<30} {:>6} {:>6} {:>8}", "ID", "Name", "Qty", "Cost", "Total");
        println!("{}", "-".repeat(60));
        for item in cart.items() {
            println!(
                "{:<6} {:<30} {:>6} {:>6} {:>8}",
                item.resource.id,
                truncate(&item.resource.name, 28),
                item.quantity,
                item.resource.cost,
                item.resource.cost * item.quantity
            );
        }
        println!("{}", "-".repeat(60));
        println!("{} item(s), {} credits", cart.items_count(), cart.total_cost());
    })
}

async fn checkout(ctx: &Context, cart: &mut Cart, comment: String) -> i32 {
    if cart.is_empty() {
        eprintln!("Error: the cart is empty");
        return exit_codes::INPUT_ERROR;
    }
    if let Err(e) = validate_batch_comment(&comment) {
        eprintln!("Error: {}", e);
        return exit_codes::INPUT_ERROR;
    }
    if let Err(e) = ctx.require(Role::Team) {
        return report(e);
    }

    let request = BatchPurchaseRequest {
        items: cart.to_batch_items(),
        comment,
    };

    let purchases = match ctx.client.batch_purchase(&request).await {
        Ok(p) => p,
        Err(e) => return report(e),
    };

    // The order exists server-side now; a stale local cart would only mislead
    cart.clear();
    if let Err(e) = ctx.carts.save(cart) {
        log::warn!("Order placed but the cart could not be cleared: {}", e);
    }

    ctx.emit(&purchases, |purchases| {
        let batch = purchases
            .first()
            .and_then(|p| p.batch_id.as_deref())
            .unwrap_or("-");
        println!("✅ Order {} submitted with {} line(s), awaiting approval.", batch, purchases.len());
    })
}
