//! CLI commands

use crate::actor::Handled;
use crate::context::NodeContext;
use serde_json::json;
use smartledger_core::{Address, AssetCode, Timestamp, TxId};
use smartledger_protocol::Transaction;
use std::path::Path;

/// Feed transactions from a JSON file (one object or an array) to the actor
pub async fn process(ctx: &mut NodeContext, path: &Path, now: Timestamp) -> Result<(), anyhow::Error> {
    let content = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    let txs: Vec<Transaction> = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value)?,
        other => vec![serde_json::from_value(other)?],
    };

    for tx in &txs {
        let handled = ctx.actor.handle(tx, now).await?;
        print_handled(&tx.txid, &handled);
    }
    print_broadcasts(ctx).await
}

/// Run every scheduled job due at `now`
pub async fn run_jobs(ctx: &mut NodeContext, now: Timestamp) -> Result<(), anyhow::Error> {
    let due = ctx.scheduler.due(now).await;
    if due.is_empty() {
        println!("No jobs due at {}", now);
    }
    for job in &due {
        let handled = ctx.actor.run_job(job, now).await?;
        println!("Job {} ({:?}): {:?}", job.id, job.kind, handled);
    }
    print_broadcasts(ctx).await
}

pub async fn contract(ctx: &NodeContext) -> Result<(), anyhow::Error> {
    match ctx.actor.state().fetch_contract(ctx.actor.address()).await? {
        Some(contract) => println!("{}", serde_json::to_string_pretty(&contract)?),
        None => println!("Contract {} is not formed", ctx.actor.address()),
    }
    Ok(())
}

pub async fn holding(ctx: &NodeContext, asset: AssetCode, address: Address, now: Timestamp) -> Result<(), anyhow::Error> {
    let holding = ctx
        .actor
        .holdings()
        .get(ctx.actor.address(), &asset, &address, now)
        .await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "address": address.to_string(),
            "asset": asset.to_string(),
            "pending_balance": holding.pending_balance,
            "finalized_balance": holding.finalized_balance,
            "unfrozen_balance": holding.unfrozen_balance(now),
            "locked": holding.is_locked(),
            "statuses": holding.statuses.len(),
        }))?
    );
    Ok(())
}

pub async fn vote(ctx: &NodeContext, vote_txid: TxId) -> Result<(), anyhow::Error> {
    match ctx.actor.votes().fetch(ctx.actor.address(), &vote_txid).await? {
        Some(vote) => println!("{}", serde_json::to_string_pretty(&vote)?),
        None => println!("Vote {} not found", vote_txid),
    }
    Ok(())
}

pub async fn pending(ctx: &NodeContext) -> Result<(), anyhow::Error> {
    let transfers = ctx.actor.orchestrator().pending().list(ctx.actor.address()).await?;
    if transfers.is_empty() {
        println!("No transfers in flight");
    }
    for transfer in transfers {
        println!("{}", serde_json::to_string(&transfer)?);
    }
    Ok(())
}

fn print_handled(txid: &TxId, handled: &Handled) {
    match handled {
        Handled::Responded { txid: response, action } => println!("{} -> {} {}", txid, action, response),
        Handled::Rejected { txid: response, code } => println!("{} -> rejected {} in {}", txid, code, response),
        Handled::Silent { code } => println!("{} -> no response ({})", txid, code),
        Handled::Transfer(outcome) => println!("{} -> {:?}", txid, outcome),
        Handled::Ignored => println!("{} -> ignored", txid),
    }
}

async fn print_broadcasts(ctx: &NodeContext) -> Result<(), anyhow::Error> {
    for tx in ctx.broadcaster.take().await {
        println!("{}", serde_json::to_string_pretty(&tx)?);
    }
    Ok(())
}
