//! One thread per running match: drain inputs, tick the kernel, fan out
//! snapshots and reliable events, retransmit, and pace to 60 Hz.

use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use starward_core::config::FIXED_DT;
use starward_core::events::SideEvent;
use starward_core::prelude::Kernel;
use starward_net::message::{Message, ScoreEntry};
use starward_net::prelude::{Channel, Encoder};

use crate::clients::SharedClient;
use crate::net_io::{IoCommand, Outbound};

const INBOX_DEPTH: usize = 256;

/// Commands from the session director into a match.
#[derive(Debug)]
pub enum MatchCommand {
    Input {
        player_id: u16,
        input: starward_net::message::PlayerInput,
    },
    RemovePlayer(u16),
    Stop,
}

/// Notifications from a match back to the session director.
#[derive(Debug)]
pub enum MatchEvent {
    /// A peer exhausted its reliable retries; treat as a timeout.
    PeerUnreachable { lobby_id: u16, player_id: u16 },
    /// The match finished (victory or defeat) with final scores.
    Ended {
        lobby_id: u16,
        victory: bool,
        scores: Vec<ScoreEntry>,
    },
}

pub struct MatchHandle {
    pub inbox: Sender<MatchCommand>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl MatchHandle {
    pub fn stop(mut self) {
        let _ = self.inbox.send(MatchCommand::Stop);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawn the tick thread for a freshly started match.
pub fn start<O>(
    lobby_id: u16,
    seed: u64,
    difficulty: u8,
    peers: Vec<(u16, SharedClient)>,
    io: O,
    events: Sender<MatchEvent>,
) -> MatchHandle
where
    O: Outbound + Send + 'static,
{
    let (inbox_tx, inbox_rx) = bounded(INBOX_DEPTH);
    let join = std::thread::Builder::new()
        .name(format!("starward-match-{lobby_id}"))
        .spawn(move || run_match(lobby_id, seed, difficulty, peers, io, events, inbox_rx))
        .expect("spawn match thread");

    MatchHandle {
        inbox: inbox_tx,
        join: Some(join),
    }
}

fn side_event_message(event: &SideEvent) -> Option<Message> {
    match event {
        SideEvent::BossSpawn(m) => Some(Message::BossSpawn(*m)),
        SideEvent::BossUpdate(m) => Some(Message::BossUpdate(*m)),
        SideEvent::EnemyHit(m) => Some(Message::EnemyHit(*m)),
        SideEvent::ForceState(m) => Some(Message::ForceState(*m)),
        // GAME_END travels over TCP, via the session director.
        SideEvent::GameEnd(_) => None,
    }
}

fn run_match<O: Outbound>(
    lobby_id: u16,
    seed: u64,
    difficulty: u8,
    mut peers: Vec<(u16, SharedClient)>,
    io: O,
    events: Sender<MatchEvent>,
    inbox: Receiver<MatchCommand>,
) {
    tracing::info!(lobby_id, seed, difficulty, peers = peers.len(), "match started");

    let mut kernel = Kernel::new(seed, difficulty);
    for (player_id, _) in &peers {
        if let Err(err) = kernel.add_player(*player_id) {
            tracing::error!(player_id, %err, "failed to spawn player");
        }
    }

    let encoder = Encoder::with_standard_messages();
    let tick_budget = Duration::from_secs_f32(FIXED_DT);
    let mut next_tick = Instant::now() + tick_budget;
    let mut ended: Option<bool> = None;

    'game: loop {
        // Drain the inbox FIFO before the tick.
        while let Ok(command) = inbox.try_recv() {
            match command {
                MatchCommand::Input { player_id, input } => kernel.queue_input(player_id, input),
                MatchCommand::RemovePlayer(player_id) => {
                    if let Err(err) = kernel.remove_player(player_id) {
                        tracing::warn!(player_id, %err, "failed to remove player");
                    }
                    peers.retain(|(id, _)| *id != player_id);
                    if peers.is_empty() {
                        tracing::info!(lobby_id, "all peers gone, match aborted");
                        break 'game;
                    }
                }
                MatchCommand::Stop => break 'game,
            }
        }

        let output = kernel.tick();
        let now = Instant::now();

        // Reliable side events, one copy per peer.
        for event in &output.events {
            if let SideEvent::GameEnd(end) = event {
                ended = Some(end.victory);
                continue;
            }
            let Some(msg) = side_event_message(event) else {
                continue;
            };
            for (_, shared) in &peers {
                let mut entry = shared.lock().expect("client entry poisoned");
                let Some(addr) = entry.udp_addr else {
                    continue;
                };
                let seq = entry.endpoint.next_seq();
                let (ack, ack_bits) = entry.endpoint.ack_fields();
                match encoder.encode(&msg, Channel::UdpReliable, seq, ack, ack_bits) {
                    Ok(packet) => {
                        entry.endpoint.track(seq, packet.clone(), now);
                        io.send(IoCommand::SendUdp {
                            addr,
                            bytes: packet,
                        });
                    }
                    Err(err) => tracing::error!(%err, "failed to encode side event"),
                }
            }
        }

        // Snapshot delta per peer (unreliable; stale ones are discarded by
        // the receiver's sequence check).
        match kernel.capture_view() {
            Ok(view) => {
                for (_, shared) in &peers {
                    let mut entry = shared.lock().expect("client entry poisoned");
                    let Some(addr) = entry.udp_addr else {
                        continue;
                    };
                    let seq = entry.endpoint.next_seq();
                    let (ack, ack_bits) = entry.endpoint.ack_fields();
                    let delta = entry.delta.build_delta(&view, seq);
                    match encoder.encode(
                        &Message::GameState(delta),
                        Channel::Udp,
                        seq,
                        ack,
                        ack_bits,
                    ) {
                        Ok(packet) => io.send(IoCommand::SendUdp {
                            addr,
                            bytes: packet,
                        }),
                        Err(err) => tracing::error!(%err, "failed to encode snapshot"),
                    }
                }
            }
            Err(err) => tracing::error!(%err, "snapshot capture failed"),
        }

        // Retransmission sweep.
        let mut unreachable: Vec<u16> = Vec::new();
        for (player_id, shared) in &peers {
            let mut entry = shared.lock().expect("client entry poisoned");
            let Some(addr) = entry.udp_addr else {
                continue;
            };
            let sweep = entry.endpoint.due_for_retransmit(now);
            for (_, bytes) in sweep.send {
                io.send(IoCommand::SendUdp { addr, bytes });
            }
            if !sweep.exhausted.is_empty() {
                unreachable.push(*player_id);
            }
        }
        for player_id in unreachable {
            tracing::warn!(player_id, "reliable retries exhausted");
            let _ = events.send(MatchEvent::PeerUnreachable {
                lobby_id,
                player_id,
            });
        }

        if let Some(victory) = ended {
            let _ = events.send(MatchEvent::Ended {
                lobby_id,
                victory,
                scores: kernel.scores(),
            });
            break;
        }

        // Sleep to the tick boundary. An overrun drops the sleep but never
        // accumulates more than one tick of debt.
        let now = Instant::now();
        if now < next_tick {
            std::thread::sleep(next_tick - now);
            next_tick += tick_budget;
        } else {
            next_tick = now + tick_budget;
        }
    }

    tracing::info!(lobby_id, ticks = kernel.tick_count(), "match thread exiting");
}
