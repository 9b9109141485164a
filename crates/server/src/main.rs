// Copyright (C) 2025 Blindrush Developers
// SPDX-License-Identifier: Apache-2.0
use clap::Parser;
use log::error;
use std::path::PathBuf;

use blindrush_server::{lobby::LobbyConfig, server};

#[derive(Debug, Parser)]
struct Cli {
    /// The server listening address.
    #[clap(long, short, default_value = "127.0.0.1")]
    address: String,
    /// The server listening port.
    #[clap(long, short, default_value_t = 9872)]
    port: u16,
    /// Number of lobbies.
    #[clap(long, default_value_t = 10, value_parser = clap::value_parser!(u16).range(1..=100))]
    lobbies: u16,
    /// Number of seats per lobby.
    #[clap(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(2..=8))]
    seats: u8,
    /// Number of bot players per lobby.
    #[clap(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=7))]
    bots: u8,
    /// Rounds before a game ends with a winner.
    #[clap(long, default_value_t = 10, value_parser = clap::value_parser!(u8).range(1..=50))]
    max_rounds: u8,
    /// Path to the players database, in memory when not given.
    #[clap(long)]
    db: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let lobby = LobbyConfig {
        seats: cli.seats as usize,
        bots: (cli.bots as usize).min(cli.seats as usize - 1),
        max_rounds: cli.max_rounds as u32,
        ..LobbyConfig::default()
    };
    let config = blindrush_server::Config {
        address: cli.address,
        port: cli.port,
        lobbies: cli.lobbies as usize,
        lobby,
        db_path: cli.db,
    };

    if let Err(e) = server::run(config).await {
        error!("{e}");
    }
}
