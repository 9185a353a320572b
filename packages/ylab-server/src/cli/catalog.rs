use anyhow::{bail, Result};
use clap::Subcommand;
use sqlx::PgPool;
use ylab_core::{ResourceId, ResourceKind};

use super::truncate;
use crate::storage::{
    CatalogStore, CompositionStore, NewComposition, NewResource, PostgresCatalogStore,
    PostgresCompositionStore,
};

fn parse_kind(raw: &str) -> Result<ResourceKind, String> {
    ResourceKind::from_str(raw)
        .ok_or_else(|| format!("unknown resource type '{}' (service, matériel, avantage)", raw))
}

/// Catalog subcommands
#[derive(Subcommand)]
pub enum ResourceCommands {
    /// Add a resource to the catalog
    Create {
        #[arg(short, long)]
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Unit cost in credits
        #[arg(short, long)]
        cost: i64,

        /// Units in stock
        #[arg(short, long)]
        quantity: i64,

        /// Confirmed units one team may hold
        #[arg(short, long)]
        max_per_team: i64,

        /// service, matériel or avantage
        #[arg(short = 't', long = "type", value_parser = parse_kind)]
        kind: ResourceKind,

        #[arg(long, default_value = "")]
        image_url: String,

        /// Teams keep the item; it never has to come back
        #[arg(long)]
        non_returnable: bool,
    },

    /// List the catalog, including inactive resources
    List,

    /// Set the stock of a resource
    SetStock { id: ResourceId, quantity: i64 },

    /// Make a resource orderable again
    Activate { id: ResourceId },

    /// Hide a resource from the catalog
    Deactivate { id: ResourceId },
}

/// Team composition subcommands
#[derive(Subcommand)]
pub enum CompositionCommands {
    /// Create a composition board with slot totals per department
    Create {
        #[arg(short, long)]
        name: String,

        #[arg(long, default_value = "0")]
        dev: i64,

        #[arg(long, default_value = "0")]
        infra: i64,

        #[arg(long, default_value = "0")]
        data: i64,

        #[arg(long, default_value = "0")]
        iot: i64,

        #[arg(long, default_value = "0")]
        sysemb: i64,
    },

    /// List composition boards
    List,
}

impl ResourceCommands {
    /// Execute the resource command
    pub async fn execute(self, pool: PgPool) -> Result<()> {
        let store = PostgresCatalogStore::new(pool);

        match self {
            ResourceCommands::Create {
                name,
                description,
                cost,
                quantity,
                max_per_team,
                kind,
                image_url,
                non_returnable,
            } => {
                if cost < 0 || quantity < 0 || max_per_team < 0 {
                    bail!("Cost, quantity and max per team must not be negative");
                }

                let resource = store
                    .create_resource(NewResource {
                        name: name.trim().to_string(),
                        description,
                        cost,
                        quantity,
                        max_per_team,
                        kind,
                        image_url,
                        is_non_returnable: non_returnable,
                    })
                    .await?;

                println!("✅ Resource #{} '{}' created ({}).", resource.id, resource.name, resource.kind);
            }

            ResourceCommands::List => {
                let resources = store.list_resources(None, true).await?;

                if resources.is_empty() {
                    println!("No resources found.");
                    return Ok(());
                }

                println!(
                    "{:<6} {:<28} {:<10} {:>6} {:>6} {:>6} {:<8} {:<10}",
                    "ID", "Name", "Type", "Cost", "Stock", "Max", "Active", "Returnable"
                );
                println!("{}", "-".repeat(88));

                for r in resources {
                    println!(
                        "{:<6} {:<28} {:<10} {:>6} {:>6} {:>6} {:<8} {:<10}",
                        r.id,
                        truncate(&r.name, 26),
                        r.kind.as_str(),
                        r.cost,
                        r.quantity,
                        r.max_per_team,
                        if r.is_active { "Yes" } else { "No" },
                        if r.is_non_returnable { "No" } else { "Yes" }
                    );
                }
            }

            ResourceCommands::SetStock { id, quantity } => {
                if quantity < 0 {
                    bail!("Stock cannot be negative");
                }
                let resource = store.set_stock(id, quantity).await?;
                println!("✅ Stock of '{}' set to {}.", resource.name, resource.quantity);
            }

            ResourceCommands::Activate { id } => {
                let resource = store.set_active(id, true).await?;
                println!("✅ Resource '{}' is now active.", resource.name);
            }

            ResourceCommands::Deactivate { id } => {
                let resource = store.set_active(id, false).await?;
                println!("✅ Resource '{}' is now hidden from the catalog.", resource.name);
            }
        }

        Ok(())
    }
}

impl CompositionCommands {
    /// Execute the composition command
    pub async fn execute(self, pool: PgPool) -> Result<()> {
        let store = PostgresCompositionStore::new(pool);

        match self {
            CompositionCommands::Create {
                name,
                dev,
                infra,
                data,
                iot,
                sysemb,
            } => {
                if [dev, infra, data, iot, sysemb].iter().any(|n| *n < 0) {
                    bail!("Slot totals must not be negative");
                }

                let composition = store
                    .create_composition(NewComposition {
                        name: name.trim().to_string(),
                        dev_total: dev,
                        infra_total: infra,
                        data_total: data,
                        iot_total: iot,
                        sysemb_total: sysemb,
                    })
                    .await?;

                println!(
                    "✅ Composition #{} '{}' created with {} slot(s).",
                    composition.id,
                    composition.name,
                    composition.total_slots()
                );
            }

            CompositionCommands::List => {
                let compositions = store.list_compositions().await?;

                if compositions.is_empty() {
                    println!("No team compositions found.");
                    return Ok(());
                }

                println!(
                    "{:<6} {:<24} {:>7} {:>7} {:>7} {:>7} {:>7}",
                    "ID", "Name", "dev", "infra", "data", "iot", "sysemb"
                );
                println!("{}", "-".repeat(72));

                for c in compositions {
                    println!(
                        "{:<6} {:<24} {:>7} {:>7} {:>7} {:>7} {:>7}",
                        c.id,
                        truncate(&c.name, 22),
                        format!("{}/{}", c.dev_filled, c.dev_total),
                        format!("{}/{}", c.infra_filled, c.infra_total),
                        format!("{}/{}", c.data_filled, c.data_total),
                        format!("{}/{}", c.iot_filled, c.iot_total),
                        format!("{}/{}", c.sysemb_filled, c.sysemb_total)
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("matériel"), Ok(ResourceKind::Hardware));
        assert_eq!(parse_kind("service"), Ok(ResourceKind::Service));
        assert!(parse_kind("gadget").is_err());
    }
}
