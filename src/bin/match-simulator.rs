//! Match Simulator CLI Tool
//!
//! Runs the scheduler and sessions in-process against simulated participants
//! with compressed timings, then prints what happened.
//!
//! Usage:
//!   cargo run --bin match-simulator -- --help
//!   cargo run --bin match-simulator -- --participants 8 --spread 400
//!   cargo run --bin match-simulator -- --silence-rate 0.5 --readiness

use anyhow::Result;
use clap::Parser;
use debate_room::matchmaking::{MatchScheduler, QueueConfig, SchedulerConfig};
use debate_room::metrics::MetricsCollector;
use debate_room::session::{SessionConfig, SessionContext, SessionDirectory};
use debate_room::storage::{
    InMemoryParticipantDirectory, InMemoryTranscriptStore, StaticTopicSupplier, TranscriptStore,
};
use debate_room::transport::RecordingTransport;
use debate_room::types::{ParticipantProfile, SessionPhase};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "match-simulator")]
#[command(about = "Simulate matchmaking and debate sessions with compressed timings")]
struct Cli {
    /// Number of simulated participants
    #[arg(short, long, default_value = "6")]
    participants: usize,

    /// Rating of the first participant
    #[arg(long, default_value = "1200")]
    base_rating: i64,

    /// Ratings are drawn from base_rating..base_rating+spread
    #[arg(short, long, default_value = "300")]
    spread: i64,

    /// Length of one countdown tick in milliseconds
    #[arg(long, default_value = "20")]
    tick_ms: u64,

    /// Preparation countdown length in ticks
    #[arg(long, default_value = "10")]
    prep_ticks: u64,

    /// Turn countdown length in ticks
    #[arg(long, default_value = "8")]
    turn_ticks: u64,

    /// Total turns per debate
    #[arg(long, default_value = "6")]
    turns: u32,

    /// Probability that a participant lets a turn time out
    #[arg(long, default_value = "0.2")]
    silence_rate: f64,

    /// Require the readiness handshake
    #[arg(long)]
    readiness: bool,

    /// Give up after this many seconds
    #[arg(long, default_value = "60")]
    timeout: u64,
}

/// Act for one participant until the simulation stops
async fn simulate_participant(
    id: String,
    directory: SessionDirectory,
    silence_rate: f64,
    poll: Duration,
    stop: CancellationToken,
) {
    let mut spoken_turns = std::collections::HashSet::new();

    while !stop.is_cancelled() {
        tokio::time::sleep(poll).await;

        let Some(handle) = directory.lookup_by_participant(&id) else {
            continue;
        };
        let Ok(snapshot) = handle.snapshot().await else {
            continue;
        };

        match snapshot.phase {
            SessionPhase::AwaitingReadiness => {
                let _ = handle.signal_ready(&id);
            }
            SessionPhase::Debate if snapshot.turn_owner.as_deref() == Some(id.as_str()) => {
                let key = (snapshot.session_id, snapshot.turn_index);
                if !spoken_turns.insert(key) {
                    continue;
                }
                let silent = rand::rng().random_bool(silence_rate);
                if silent {
                    debug!("'{}' stays silent on turn {}", id, snapshot.turn_index);
                    continue;
                }
                let content = format!(
                    "Argument {} from {} on \"{}\"",
                    snapshot.turn_index / 2 + 1,
                    id,
                    snapshot.topic
                );
                if let Err(e) = handle.submit_message(&id, &content).await {
                    debug!("'{}' submission rejected: {}", id, e);
                }
            }
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if !(0.0..=1.0).contains(&cli.silence_rate) {
        return Err(anyhow::anyhow!("--silence-rate must be between 0 and 1"));
    }

    let tick = Duration::from_millis(cli.tick_ms.max(1));
    let session_config = SessionConfig {
        require_readiness: cli.readiness,
        readiness_window: tick * 10,
        readiness_check_interval: tick * 2,
        preparation_seconds: cli.prep_ticks,
        turn_seconds: cli.turn_ticks,
        tick_interval: tick,
        max_turns: cli.turns,
        ..SessionConfig::default()
    };
    session_config.validate()?;

    let queue_config = QueueConfig {
        expansion_interval: tick * 20,
        ..QueueConfig::default()
    };
    queue_config.validate()?;

    let participants = Arc::new(InMemoryParticipantDirectory::new());
    let mut rng = rand::rng();
    let ids: Vec<String> = (1..=cli.participants).map(|n| format!("sim{}", n)).collect();
    for id in &ids {
        let rating = cli.base_rating + rng.random_range(0..=cli.spread.max(0));
        participants.upsert(ParticipantProfile {
            id: id.clone(),
            display_name: format!("Debater {}", id),
            rating,
        })?;
    }

    let transport = Arc::new(RecordingTransport::new());
    let store = Arc::new(InMemoryTranscriptStore::new());
    let directory = SessionDirectory::new();
    let context = SessionContext {
        config: session_config,
        transport: transport.clone(),
        store: store.clone(),
        metrics: Arc::new(MetricsCollector::new()?),
    };
    let scheduler = MatchScheduler::new(
        queue_config,
        SchedulerConfig {
            match_check_interval: tick * 5,
        },
        directory.clone(),
        context,
        participants,
        Arc::new(StaticTopicSupplier::default()),
    );

    println!("🎯 Simulating {} participants", ids.len());
    for id in &ids {
        scheduler.enqueue(id).await?;
    }

    let stop = CancellationToken::new();
    let scheduler_task = scheduler.spawn(stop.child_token());
    let mut actors = Vec::new();
    for id in &ids {
        actors.push(tokio::spawn(simulate_participant(
            id.clone(),
            directory.clone(),
            cli.silence_rate,
            tick,
            stop.child_token(),
        )));
    }

    // Done once nobody is pairable and no session has run for a few polls
    let deadline = tokio::time::Instant::now() + Duration::from_secs(cli.timeout);
    let mut quiet_polls = 0;
    loop {
        tokio::time::sleep(tick * 10).await;
        let pairable = scheduler.queue_len() >= 2;
        if !pairable && directory.active_count() == 0 {
            quiet_polls += 1;
            if quiet_polls >= 3 {
                break;
            }
        } else {
            quiet_polls = 0;
        }
        if tokio::time::Instant::now() >= deadline {
            println!("⏰ Timed out with {} sessions still running", directory.active_count());
            break;
        }
    }

    stop.cancel();
    let _ = scheduler_task.await;
    for actor in actors {
        let _ = actor.await;
    }

    let stats = scheduler.stats()?;
    println!("\n📊 Summary");
    println!("   Matches created: {}", stats.matches_created);
    println!("   Match failures: {}", stats.match_failures);
    println!("   Still queued: {}", scheduler.queue_len());
    println!("   Records stored: {}", store.record_count());

    for id in &ids {
        let ended = transport.count_of(id, "session_ended");
        let messages = transport.count_of(id, "message");
        info!("'{}' saw {} messages", id, messages);
        println!(
            "   {}: {} messages seen, debate {}",
            id,
            messages,
            if ended > 0 { "completed" } else { "not completed" }
        );
    }

    for session_id in announced_session_ids(&transport, &ids) {
        if let Some(record) = store.get_record(session_id).await? {
            println!(
                "\n🗣  {} vs {} on \"{}\"",
                record.participant_a, record.participant_b, record.topic
            );
            for message in &record.transcript {
                println!(
                    "   [{}] {}: {}",
                    message.side, message.sender_display_name, message.content
                );
            }
        }
    }

    Ok(())
}

/// Session ids announced to the simulated participants, in first-seen order
fn announced_session_ids(
    transport: &RecordingTransport,
    ids: &[String],
) -> Vec<debate_room::types::SessionId> {
    let mut seen = Vec::new();
    for id in ids {
        for event in transport.events_for(id) {
            if let debate_room::types::ServerEvent::MatchFound { session_id, .. } = event {
                if !seen.contains(&session_id) {
                    seen.push(session_id);
                }
            }
        }
    }
    seen
}
