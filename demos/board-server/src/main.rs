//! Demo huntboard server with a seeded in-memory workspace.
//!
//! Run with: cargo run --bin board-server

use chrono::Utc;
use huntboard_protocol::{
    ActivityEntry, Identity, Puzzle, PuzzleStatus, Round, WorkspaceSnapshot,
};
use huntboard_server::storage::MemoryStorage;
use huntboard_server::Server;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let storage = Arc::new(MemoryStorage::new());
    storage.put_workspace(demo_workspace()).await;

    let server = Server::builder()
        .http_addr("127.0.0.1:8080")
        .jwt_secret(b"super-secret-key-for-dev-only")
        .storage(storage)
        .build()
        .expect("Failed to build server");

    let ticket = server.tickets().issue(Identity {
        display_name: "demo".to_owned(),
        subject_id: "demo-1".to_owned(),
    })?;

    println!("Starting huntboard server...");
    println!("  HTTP: http://127.0.0.1:8080");
    println!();
    println!("Rooms:");
    println!("  GET /ws/workspace/{{key}}?ticket=... - cached workspace snapshots");
    println!("  GET /ws/presence/{{key}}?ticket=...&sub_key=... - who views which puzzle");
    println!("  GET /ws/chat/{{key}}?ticket=...      - per-puzzle chat");
    println!("  GET /ws/notify/{{key}}?ticket=...    - staleness notifications");
    println!();
    println!("Seeded workspace key: hunt-2026");
    println!("Ticket for user \"demo\":");
    println!("  {ticket}");

    tracing::info!("demo workspace seeded, starting server");
    server.run().await?;

    Ok(())
}

fn demo_workspace() -> WorkspaceSnapshot {
    WorkspaceSnapshot {
        id: "hunt-2026".to_owned(),
        name: "Demo Hunt 2026".to_owned(),
        rounds: vec![Round {
            id: "r1".to_owned(),
            name: "Round 1".to_owned(),
            puzzles: vec![
                Puzzle {
                    id: "p1".to_owned(),
                    name: "Alpha".to_owned(),
                    status: PuzzleStatus::Open,
                    answer: None,
                },
                Puzzle {
                    id: "p2".to_owned(),
                    name: "Beta".to_owned(),
                    status: PuzzleStatus::Solved,
                    answer: Some("LOREM".to_owned()),
                },
            ],
        }],
        activity: vec![ActivityEntry {
            timestamp: Utc::now(),
            actor: "demo".to_owned(),
            action: "seeded the demo workspace".to_owned(),
        }],
    }
}
