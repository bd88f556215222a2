//! Subcommand entry points wiring config, collaborators, and the keeper.

use crate::config::Config;
use crate::keeper::state::read_state_file;
use crate::keeper::{Keeper, KeeperSettings};
use crate::ledger::{EvmLedger, LedgerClient};
use crate::notify::{LogNotifier, Notifier, TelegramNotifier};
use anyhow::{Context, Result};
use chrono::DateTime;
use std::sync::Arc;
use std::time::Duration;

pub async fn run(config: Config) -> Result<()> {
    let settings = KeeperSettings::from_config(&config)?;
    let ledger: Arc<dyn LedgerClient> = Arc::new(EvmLedger::from_config(&config)?);
    let notifier = build_notifier(&config);

    let keeper = Arc::new(Keeper::new(settings, ledger, notifier));
    keeper.start().await?;

    println!("◆ chainward");
    println!("  › owner    {}", config.owner_address);
    println!("  › contract {}", config.contract_address);
    println!(
        "  › cadence  every {}s, cooldown {}s",
        config.tick_secs, config.cooldown_secs
    );
    println!();
    println!("  Caring for entities. Press ctrl-c to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    keeper.stop();
    keeper.join().await;

    let status = keeper.status();
    println!(
        "  ✓ stopped after {} interacts, {} errors",
        status.total_actions, status.error_count
    );
    Ok(())
}

fn build_notifier(config: &Config) -> Arc<dyn Notifier> {
    match &config.telegram {
        Some(telegram) => Arc::new(TelegramNotifier::new(
            telegram.bot_token.clone(),
            telegram.chat_id.clone(),
        )),
        None => {
            tracing::info!("no telegram channel configured, notices go to the log");
            Arc::new(LogNotifier)
        }
    }
}

pub fn status(config: &Config) -> Result<()> {
    let path = config.state_file_path();
    let snapshot = match read_state_file(&path) {
        Ok(snapshot) => snapshot,
        Err(_) => {
            println!("No state recorded at {} yet.", path.display());
            println!("Is the keeper running? Start it with `chainward run`.");
            return Ok(());
        }
    };

    let state = &snapshot.state;
    println!("◆ chainward status");
    println!();
    println!("  running      {}", if state.running { "yes" } else { "no" });
    println!("  target       {}", state.target);
    println!("  interacts    {}", state.total_actions);
    println!("  errors       {}", state.error_count);
    if state.optimistic_verifications > 0 {
        println!("  optimistic   {}", state.optimistic_verifications);
    }
    println!("  last action  {}", render_time(state.last_action_at));
    println!("  next action  {}", render_time(state.next_action_at));
    println!();
    println!("  as of {}", snapshot.written_at);
    Ok(())
}

fn render_time(at: Option<u64>) -> String {
    at.and_then(|secs| DateTime::from_timestamp(i64::try_from(secs).ok()?, 0))
        .map_or_else(|| "—".into(), |t| t.to_rfc3339())
}

pub async fn doctor(config: &Config) -> Result<()> {
    println!("◆ chainward doctor");
    println!();

    let settings = KeeperSettings::from_config(config)?;
    let ledger = EvmLedger::from_config(config)?;

    let connected = tokio::time::timeout(Duration::from_secs(10), ledger.check_connectivity())
        .await
        .unwrap_or(false);
    if !connected {
        println!("  ✗ ledger     unreachable at {}", config.rpc_url);
        anyhow::bail!("ledger connectivity check failed");
    }

    let height = ledger.chain_height().await?;
    println!("  ✓ ledger     {} (height {height})", config.rpc_url);

    let ids = ledger.enumerate_ids(settings.owner).await?;
    if ids.is_empty() {
        println!("  ✗ entities   owner has none, the keeper would refuse to start");
        return Ok(());
    }

    let mut claimed = 0_usize;
    let mut unreadable = 0_usize;
    for id in &ids {
        match ledger.fetch_detail(*id).await {
            Ok(record) if record.claimed => claimed += 1,
            Ok(_) => {}
            Err(_) => unreadable += 1,
        }
    }
    println!(
        "  {} entities   {} owned, {claimed} claimed, {unreadable} unreadable",
        if claimed > 0 { "✓" } else { "✗" },
        ids.len()
    );

    match ledger.estimate_action_cost(&ids).await {
        Ok(gas) => println!("  ✓ interact   ~{gas} gas for the full set"),
        Err(error) => println!("  ! interact   gas estimate unavailable: {error}"),
    }

    if let Some(telegram) = &config.telegram {
        let notifier =
            TelegramNotifier::new(telegram.bot_token.clone(), telegram.chat_id.clone());
        let healthy = tokio::time::timeout(Duration::from_secs(10), notifier.health_check())
            .await
            .unwrap_or(false);
        println!(
            "  {} telegram   {}",
            if healthy { "✓" } else { "✗" },
            if healthy { "reachable" } else { "unreachable" }
        );
    } else {
        println!("  › telegram   not configured, notices go to the log");
    }

    Ok(())
}
