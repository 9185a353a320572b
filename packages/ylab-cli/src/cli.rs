use clap::{Args, Parser, Subcommand, ValueEnum};
use ylab_core::{CompositionId, Department, PollId, PurchaseId, ResourceId, SlotAction, TeamId};

#[derive(Parser)]
#[command(
    name = "ylab",
    version,
    about = "YLab Market command-line client",
    long_about = "YLab Market command-line client.\n\
                  Browse the hackathon catalog, fill a cart, order with team credits\n\
                  and, for organisers, approve or refuse purchases.\n\
                  The API address is read from --api-url or $YLAB_API_URL."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Base URL of the marketplace API
    #[arg(long, env = "YLAB_API_URL", default_value = "http://localhost:8080/api", global = true)]
    pub api_url: String,

    /// Directory holding the session and cart files
    #[arg(long, env = "YLAB_DATA_DIR", global = true)]
    pub data_dir: Option<String>,

    /// Print JSON instead of tables
    #[arg(long, default_value_t = false, global = true)]
    pub json: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Log in as a team or an admin
    #[command(subcommand)]
    Login(LoginCommand),
    /// Revoke the current session
    Logout,
    /// Show who is logged in
    Whoami,
    /// Browse the catalog
    #[command(subcommand)]
    Catalog(CatalogCommand),
    /// Stage items before ordering them together
    #[command(subcommand)]
    Cart(CartCommand),
    /// Order a single resource right away
    Buy(BuyArgs),
    /// List the team's orders with statistics
    Orders(OrdersArgs),
    /// Return a confirmed item
    Return(ReturnArgs),
    /// Team profile
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Browse polls
    #[command(subcommand)]
    Polls(PollsCommand),
    /// Stake credit on a poll option
    Vote(VoteArgs),
    /// Organiser commands
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Subcommand)]
pub enum LoginCommand {
    /// Log in with a team name or email
    Team(LoginArgs),
    /// Log in with an admin username
    Admin(LoginArgs),
}

#[derive(Args)]
pub struct LoginArgs {
    /// Team name or email, or admin username
    pub name: String,

    /// Password (read from stdin when omitted)
    #[arg(short, long, env = "YLAB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Subcommand)]
pub enum CatalogCommand {
    /// List active resources
    List {
        /// Only this category (service, matériel, avantage)
        #[arg(short = 't', long = "type")]
        kind: Option<String>,
    },
    /// Show one resource with the team's remaining quota
    Show { id: ResourceId },
}

#[derive(Subcommand)]
pub enum CartCommand {
    /// Add a resource, checking stock and the team quota first
    Add {
        resource_id: ResourceId,
        #[arg(default_value_t = 1)]
        quantity: i64,
    },
    /// Change a quantity; 0 removes the item
    Set { resource_id: ResourceId, quantity: i64 },
    /// Remove a resource from the cart
    Remove { resource_id: ResourceId },
    /// Empty the cart
    Clear,
    /// Show the cart
    Show,
    /// Order everything in the cart as one batch
    Checkout {
        /// Justification sent to the organisers (10 to 3000 characters)
        #[arg(short, long)]
        comment: String,
    },
}

#[derive(Args)]
pub struct BuyArgs {
    pub resource_id: ResourceId,
    #[arg(default_value_t = 1)]
    pub quantity: i64,
}

#[derive(Args)]
pub struct OrdersArgs {
    /// Only confirmed items that still have to be returned
    #[arg(long)]
    pub needs_return: bool,
}

#[derive(Args)]
pub struct ReturnArgs {
    pub purchase_id: PurchaseId,
}

#[derive(Subcommand)]
pub enum ProfileCommand {
    /// Show the team profile
    Show,
    /// Change the contact email
    Email { email: String },
}

#[derive(Subcommand)]
pub enum PollsCommand {
    /// List polls
    List {
        /// ouvert or fermé
        #[arg(short, long)]
        status: Option<String>,
    },
    /// Show a poll and the team's vote
    Show { id: PollId },
    /// Votes and staked credit per option
    Results { id: PollId },
}

#[derive(Args)]
pub struct VoteArgs {
    pub poll_id: PollId,
    /// Chosen option, as listed by `polls show`
    pub option: String,
    /// Credit staked on the option
    #[arg(short, long)]
    pub stake: i64,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Decision {
    Confirm,
    Cancel,
}

#[derive(Subcommand)]
pub enum AdminCommand {
    /// List purchases
    Purchases {
        /// en attente, confirmé or annulé
        #[arg(short, long)]
        status: Option<String>,
        #[arg(short, long)]
        team: Option<TeamId>,
        #[arg(long)]
        needs_return: bool,
    },
    /// Show one purchase
    Purchase { purchase_id: PurchaseId },
    /// Confirm or cancel one purchase
    Decide {
        purchase_id: PurchaseId,
        #[arg(value_enum)]
        decision: Decision,
    },
    /// Decide several purchases; items look like `12:confirm`, `13:cancel` or `14:confirm:1`
    DecideBatch {
        #[arg(required = true, num_args = 1..)]
        items: Vec<String>,
    },
    /// Record that an item came back
    MarkReturned { purchase_id: PurchaseId },
    /// Undo a return record
    UnmarkReturned { purchase_id: PurchaseId },
    /// List teams
    Teams,
    /// List team compositions
    Compositions,
    /// Fill or empty one department slot
    Toggle {
        composition_id: CompositionId,
        #[arg(value_enum)]
        department: DepartmentArg,
        #[arg(value_enum)]
        action: SlotArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum DepartmentArg {
    Dev,
    Infra,
    Data,
    Iot,
    Sysemb,
}

impl From<DepartmentArg> for Department {
    fn from(arg: DepartmentArg) -> Self {
        match arg {
            DepartmentArg::Dev => Department::Dev,
            DepartmentArg::Infra => Department::Infra,
            DepartmentArg::Data => Department::Data,
            DepartmentArg::Iot => Department::Iot,
            DepartmentArg::Sysemb => Department::Sysemb,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SlotArg {
    Fill,
    Empty,
}

impl From<SlotArg> for SlotAction {
    fn from(arg: SlotArg) -> Self {
        match arg {
            SlotArg::Fill => SlotAction::Fill,
            SlotArg::Empty => SlotAction::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_api_url() {
        let cli = Cli::try_parse_from(["ylab", "cart", "show"]).unwrap();
        assert!(cli.api_url.starts_with("http"));
        assert!(!cli.json);
    }
}
