//! Plays a round of planning poker across several nodes in one process.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use poker_domain::{Deck, Estimation, TeamState};
use poker_local_cluster::{LocalCluster, LocalClusterConfig, LocalNode};
use tokio::time::{Instant, interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of nodes
    #[arg(long, default_value_t = 3, env = "POKER_NODES")]
    nodes: usize,

    /// Name of the team to create
    #[arg(long, default_value = "Team", env = "POKER_TEAM")]
    team: String,

    /// Name of the scrum master
    #[arg(long, default_value = "master", env = "POKER_SCRUM_MASTER")]
    scrum_master: String,

    /// Members joining the team, spread over the nodes
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "alice,bob,carol",
        env = "POKER_MEMBERS"
    )]
    members: Vec<String>,

    /// Deck to estimate with
    #[arg(long, default_value_t = Deck::Standard, env = "POKER_DECK")]
    deck: Deck,

    /// How long a node waits for a peer to answer while initializing, in
    /// milliseconds
    #[arg(long, default_value_t = 500, env = "POKER_INITIALIZATION_MESSAGE_TIMEOUT_MS")]
    initialization_message_timeout_ms: u64,

    /// Participants idle for longer are disconnected, in seconds
    #[arg(long, default_value_t = 900, env = "POKER_CLIENT_INACTIVITY_TIMEOUT_SECS")]
    client_inactivity_timeout_secs: u64,

    /// Keep the nodes running until interrupted
    #[arg(long)]
    keep_running: bool,

    /// Log debug output
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    if args.nodes == 0 {
        bail!("at least one node is required");
    }

    let mut config = LocalClusterConfig::default();
    config.cluster.initialization_message_timeout =
        Duration::from_millis(args.initialization_message_timeout_ms);
    config.registry.client_inactivity_timeout =
        Duration::from_secs(args.client_inactivity_timeout_secs);

    let cluster = LocalCluster::start(config, args.nodes)
        .await
        .context("failed to start cluster")?;

    play_round(&cluster, &args).await?;

    if args.keep_running {
        run_until_interrupted(&cluster).await;
    }

    cluster.shutdown().await.context("failed to stop cluster")?;
    Ok(())
}

async fn play_round(cluster: &LocalCluster, args: &Args) -> Result<()> {
    let nodes = cluster.nodes();

    nodes[0]
        .registry()
        .create_scrum_team(&args.team, &args.scrum_master, args.deck)
        .await
        .context("failed to create team")?;

    for (index, member) in args.members.iter().enumerate() {
        let node = node_for(nodes, index + 1);
        node.registry()
            .get_scrum_team(&args.team)
            .await?
            .join(member, false)
            .with_context(|| format!("{member} failed to join"))?;
        info!(node_id = %node.node_id(), %member, "member joined");
    }

    // the round only counts members every node already knows
    let expected = args.members.len() + 1;
    wait_for(cluster, &args.team, |team| team.members().count() == expected).await?;

    let starter = node_for(nodes, args.members.len());
    starter
        .registry()
        .get_scrum_team(&args.team)
        .await?
        .start_estimation(&args.scrum_master)?;
    wait_for(cluster, &args.team, |team| {
        team.state() == TeamState::EstimationInProgress
    })
    .await?;

    let cards: Vec<Estimation> = args.deck.estimations();
    let voters = std::iter::once(&args.scrum_master).chain(&args.members);
    for (index, voter) in voters.enumerate() {
        let card = cards[index % cards.len()];
        node_for(nodes, index)
            .registry()
            .get_scrum_team(&args.team)
            .await?
            .estimate(voter, Some(card))?;
    }

    wait_for(cluster, &args.team, |team| {
        team.state() == TeamState::EstimationFinished
    })
    .await?;

    for node in cluster.nodes() {
        let team = node.registry().get_scrum_team(&args.team).await?;
        let Some(result) = team.estimation_result() else {
            continue;
        };

        let votes: Vec<String> = result
            .iter()
            .map(|(member, estimation)| match estimation {
                Some(estimation) => format!("{}={estimation}", member.name),
                None => format!("{}=-", member.name),
            })
            .collect();
        info!(node_id = %node.node_id(), votes = %votes.join(", "), "round finished");
    }

    Ok(())
}

fn node_for(nodes: &[LocalNode], index: usize) -> &LocalNode {
    &nodes[index % nodes.len()]
}

async fn wait_for<F>(cluster: &LocalCluster, team_name: &str, check: F) -> Result<()>
where
    F: Fn(&poker_domain::ScrumTeam) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(10);

    for node in cluster.nodes() {
        loop {
            if let Ok(team) = node.registry().lock(team_name).await
                && check(&*team)
            {
                break;
            }
            if Instant::now() >= deadline {
                bail!("{} did not catch up in time", node.node_id());
            }
            sleep(Duration::from_millis(10)).await;
        }
    }

    Ok(())
}

async fn run_until_interrupted(cluster: &LocalCluster) {
    let shutdown_token = CancellationToken::new();

    let signal_shutdown_token = shutdown_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for interrupt");
        }

        info!("Shutting down");
        signal_shutdown_token.cancel();
    });

    info!(nodes = ?cluster.node_ids().await, "cluster running, press ctrl-c to stop");

    let mut sweep = interval(Duration::from_secs(60));
    loop {
        tokio::select! {
            () = shutdown_token.cancelled() => break,
            _ = sweep.tick() => {
                let disconnected = cluster.disconnect_inactive().await;
                if disconnected > 0 {
                    info!(disconnected, "disconnected inactive participants");
                }
            }
        }
    }
}
