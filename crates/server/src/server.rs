// Copyright (C) 2025 Blindrush Developers
// SPDX-License-Identifier: Apache-2.0

//! Blindrush server entry point.
use anyhow::{Result, anyhow, bail};
use log::{error, info};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::{
    net::{TcpListener, TcpStream},
    signal,
    sync::{broadcast, mpsc},
    time::{self, Duration},
};

use blindrush_core::message::{ClientEvent, ServerEvent};

use crate::{
    connection::{self, Connection},
    db::Db,
    lobby::{Lobby, LobbyConfig, LobbyMessage},
    lobby_pool::LobbyPool,
};

/// Server config.
#[derive(Debug)]
pub struct Config {
    /// The server listening address.
    pub address: String,
    /// The server listening port.
    pub port: u16,
    /// The number of lobbies on this server.
    pub lobbies: usize,
    /// The lobby game parameters.
    pub lobby: LobbyConfig,
    /// The players database path, in memory when not given.
    pub db_path: Option<PathBuf>,
}

/// The server that accepts client connections.
#[derive(Debug)]
struct Server {
    /// The lobbies on this server.
    pool: LobbyPool,
    /// The server listener.
    listener: TcpListener,
    /// Shutdown notification channel.
    shutdown_broadcast_tx: broadcast::Sender<()>,
    /// Shutdown sender cloned by each connection.
    shutdown_complete_tx: mpsc::Sender<()>,
}

/// Client connection handler.
struct Handler {
    /// The joined lobby, if any.
    lobby: Option<Arc<Lobby>>,
    /// This handler username, set on join.
    username: String,
    /// The lobbies on this server.
    pool: LobbyPool,
    /// Channel for listening shutdown notification.
    shutdown_broadcast_rx: broadcast::Receiver<()>,
    /// Sender that drops when this connection is done.
    _shutdown_complete_tx: mpsc::Sender<()>,
}

/// Server entry point.
pub async fn run(config: Config) -> Result<()> {
    let addr = format!("{}:{}", config.address, config.port);
    info!("Starting server listening on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow!("Tcp listener bind error: {e}"))?;

    let db = match &config.db_path {
        Some(path) => Db::open(path)?,
        None => Db::open_in_memory()?,
    };

    let shutdown_signal = signal::ctrl_c();
    let (shutdown_broadcast_tx, _) = broadcast::channel(1);
    let (shutdown_complete_tx, mut shutdown_complete_rx) = mpsc::channel(1);

    let pool = LobbyPool::new(
        config.lobbies,
        config.lobby,
        db,
        &shutdown_broadcast_tx,
        &shutdown_complete_tx,
    );

    let mut server = Server {
        pool,
        listener,
        shutdown_broadcast_tx,
        shutdown_complete_tx,
    };

    tokio::select! {
        res = server.run() => {
            res.map_err(|e| anyhow!("Tcp listener accept error: {e}"))?;
        }
        _ = shutdown_signal => {
            info!("Received shutdown signal...");
        }
    }

    let Server {
        shutdown_broadcast_tx,
        shutdown_complete_tx,
        ..
    } = server;

    // Notify all connections and lobbies to start shutdown then wait for
    // them to terminate and drop their shutdown channel.
    drop(shutdown_broadcast_tx);
    drop(shutdown_complete_tx);
    let _ = shutdown_complete_rx.recv().await;

    Ok(())
}

impl Server {
    /// Runs the server.
    async fn run(&mut self) -> Result<()> {
        loop {
            let (socket, addr) = self.accept_with_retry().await?;
            info!("Accepted connection from {addr}");

            let mut handler = Handler {
                lobby: None,
                username: String::new(),
                pool: self.pool.clone(),
                shutdown_broadcast_rx: self.shutdown_broadcast_tx.subscribe(),
                _shutdown_complete_tx: self.shutdown_complete_tx.clone(),
            };

            // Spawn a task to handle connection events.
            tokio::spawn(async move {
                if let Err(err) = handler.run(socket, addr).await {
                    error!("Connection to {addr} {err}");
                }

                info!("Connection to {addr} closed");
            });
        }
    }

    /// Accepts a connection with retries.
    async fn accept_with_retry(&self) -> Result<(TcpStream, SocketAddr)> {
        let mut retry = 0;
        loop {
            match self.listener.accept().await {
                Ok((socket, addr)) => {
                    return Ok((socket, addr));
                }
                Err(err) => {
                    if retry == 5 {
                        return Err(err.into());
                    }
                }
            }

            time::sleep(Duration::from_secs(1 << retry)).await;
            retry += 1;
        }
    }
}

impl Handler {
    /// Handle connection events.
    async fn run(&mut self, socket: TcpStream, addr: SocketAddr) -> Result<()> {
        let mut conn = connection::accept_async(socket).await?;

        // The lobby delivers events for this player through this channel
        // for the whole life of the connection.
        let (lobby_tx, mut lobby_rx) = mpsc::channel(64);

        let res = loop {
            tokio::select! {
                _ = self.shutdown_broadcast_rx.recv() => {
                    break Ok(());
                }
                msg = lobby_rx.recv() => match msg {
                    Some(LobbyMessage::Send(event)) => {
                        let res = conn.send(&event).await;
                        if res.is_err() {
                            break res;
                        }
                    }
                    Some(LobbyMessage::PlayerLeft) => {
                        self.lobby = None;
                    }
                    // The handler keeps its own sender so the channel can
                    // only close on shutdown.
                    None => break Ok(()),
                },
                res = conn.recv() => match res {
                    Some(Ok(event)) => {
                        let res = self.handle_event(&mut conn, event, &lobby_tx).await;
                        if res.is_err() {
                            break res;
                        }
                    },
                    Some(Err(err)) => break Err(err),
                    None => break Ok(()),
                },
            }
        };

        conn.close().await;

        if let Some(lobby) = &self.lobby {
            lobby.leave(&self.username).await;
        }

        res
    }

    async fn handle_event(
        &mut self,
        conn: &mut Connection,
        event: ClientEvent,
        lobby_tx: &mpsc::Sender<LobbyMessage>,
    ) -> Result<()> {
        match event {
            ClientEvent::JoinLobby { username } => {
                if self.lobby.is_none() {
                    self.lobby = self.pool.join(&username, lobby_tx.clone()).await;
                    self.username = username;
                }

                if self.lobby.is_none() {
                    // Notify the client that there are no free lobbies.
                    let event = ServerEvent::Error {
                        message: "No lobby found".to_string(),
                    };
                    conn.send(&event).await?;
                    bail!("No lobby found");
                }
            }
            event => {
                if let Some(lobby) = &self.lobby {
                    lobby.event(&self.username, event).await;
                } else {
                    bail!("Invalid event, the client didn't join a lobby");
                }
            }
        }

        Ok(())
    }
}
