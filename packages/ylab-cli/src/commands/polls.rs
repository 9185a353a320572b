use serde::Serialize;
use ylab_core::api::{Role, VoteRequest};
use ylab_core::{Poll, PollId, Vote};

use super::{report, Context};
use crate::cli::{PollsCommand, VoteArgs};
use crate::exit_codes;
use crate::output::truncate;

pub async fn execute(ctx: &Context, cmd: PollsCommand) -> i32 {
    match cmd {
        PollsCommand::List { status } => list(ctx, status.as_deref()).await,
        PollsCommand::Show { id } => show(ctx, id).await,
        PollsCommand::Results { id } => results(ctx, id).await,
    }
}

async fn list(ctx: &Context, status: Option<&str>) -> i32 {
    let polls = match ctx.client.polls(status).await {
        Ok(p) => p,
        Err(e) => return report(e),
    };

    ctx.emit(&polls, |polls| {
        if polls.is_empty() {
            println!("No polls.");
            return;
        }

        println!("{:<6} {:<44} {:<8} {:<17}", "ID", "Question", "Status", "Ends");
        println!("{}", "-".repeat(78));
        for poll in polls {
            println!(
                "{:<6} {:<44} {:<8} {:<17}",
                poll.id,
                truncate(&poll.question, 42),
                poll.status.as_str(),
                poll.end_date.format("%Y-%m-%d %H:%M")
            );
        }
    })
}

#[derive(Serialize)]
struct PollView {
    poll: Poll,
    #[serde(skip_serializing_if = "Option::is_none")]
    my_vote: Option<Vote>,
}

async fn show(ctx: &Context, id: PollId) -> i32 {
    let mut poll = match ctx.client.poll(id).await {
        Ok(p) => p,
        Err(e) => return report(e),
    };
    // Individual votes are not shown here; `polls results` has the totals
    poll.votes = None;

    let my_vote = if ctx.require(Role::Team).is_ok() {
        match ctx.client.vote_for_poll(id).await {
            Ok(vote) => Some(vote),
            Err(crate::client::ApiError::Status { status: 404, .. }) => None,
            Err(e) => return report(e),
        }
    } else {
        None
    };

    let view = PollView { poll, my_vote };
    ctx.emit(&view, |v| {
        let poll = &v.poll;
        println!("{} (#{}, {})", poll.question, poll.id, poll.status.as_str());
        println!(
            "  Open from {} to {}",
            poll.start_date.format("%Y-%m-%d %H:%M"),
            poll.end_date.format("%Y-%m-%d %H:%M")
        );
        for option in &poll.options {
            println!("  - {}", option);
        }
        if let Some(vote) = &v.my_vote {
            println!();
            println!("  Your vote: {} ({} credits)", vote.chosen_option, vote.credit_staked);
        }
    })
}

async fn results(ctx: &Context, id: PollId) -> i32 {
    let results = match ctx.client.poll_results(id).await {
        Ok(r) => r,
        Err(e) => return report(e),
    };

    ctx.emit(&results, |r| {
        println!("{}", r.poll.question);
        println!("{:<30} {:>7} {:>10}", "Option", "Votes", "Credits");
        println!("{}", "-".repeat(49));
        for option in &r.poll.options {
            let tally = r.results.get(option).copied().unwrap_or_default();
            println!("{:<30} {:>7} {:>10}", truncate(option, 28), tally.count, tally.total_credits);
        }
    })
}

pub async fn vote(ctx: &Context, args: VoteArgs) -> i32 {
    if args.stake < 1 {
        eprintln!("Error: Credit stake must be at least 1");
        return exit_codes::INPUT_ERROR;
    }
    if let Err(e) = ctx.require(Role::Team) {
        return report(e);
    }

    let request = VoteRequest {
        poll_id: args.poll_id,
        chosen_option: args.option,
        credit_staked: args.stake,
    };

    match ctx.client.vote(&request).await {
        Ok(vote) => ctx.emit(&vote, |v| {
            println!(
                "✅ Voted '{}' on poll #{} with {} credits.",
                v.chosen_option, v.poll_id, v.credit_staked
            );
        }),
        Err(e) => report(e),
    }
}
