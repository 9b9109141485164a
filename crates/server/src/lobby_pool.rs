// Copyright (C) 2025 Blindrush Developers
// SPDX-License-Identifier: Apache-2.0

//! Lobbies pool.
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, mpsc};

use crate::{
    db::Db,
    lobby::{Lobby, LobbyConfig, LobbyMessage},
};

/// A pool of lobbies players can join.
#[derive(Debug, Clone)]
pub struct LobbyPool(Arc<Mutex<Shared>>);

#[derive(Debug)]
struct Shared {
    lobbies: Vec<Arc<Lobby>>,
}

impl LobbyPool {
    /// Creates a new lobby pool.
    pub fn new(
        lobbies: usize,
        config: LobbyConfig,
        db: Db,
        shutdown_broadcast_tx: &broadcast::Sender<()>,
        shutdown_complete_tx: &mpsc::Sender<()>,
    ) -> Self {
        let lobbies = (0..lobbies)
            .map(|_| {
                Arc::new(Lobby::new(
                    config.clone(),
                    db.clone(),
                    shutdown_broadcast_tx.subscribe(),
                    shutdown_complete_tx.clone(),
                ))
            })
            .collect();

        let state = Shared { lobbies };

        Self(Arc::new(Mutex::new(state)))
    }

    /// Try to join a lobby in the pool.
    pub async fn join(
        &self,
        username: &str,
        lobby_tx: mpsc::Sender<LobbyMessage>,
    ) -> Option<Arc<Lobby>> {
        let mut pool = self.0.lock().await;

        for idx in 0..pool.lobbies.len() {
            // A join may fail if the username is taken, the lobby is full
            // or a game is in progress.
            let res = pool.lobbies[idx].join(username, lobby_tx.clone()).await;
            if res.is_ok() {
                let lobby = pool.lobbies[idx].clone();
                if lobby.has_game_started().await {
                    // The join filled the lobby and started a game, move it
                    // to the back so that free lobbies are tried first.
                    let lobby = pool.lobbies.remove(idx);
                    pool.lobbies.push(lobby);
                }

                return Some(lobby);
            }
        }

        // All lobbies are busy.
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blindrush_core::game::LobbyId;

    struct TestPool {
        pool: LobbyPool,
        _shutdown_broadcast_tx: broadcast::Sender<()>,
        _shutdown_complete_rx: mpsc::Receiver<()>,
    }

    impl TestPool {
        fn new(n: usize) -> Self {
            let db = Db::open_in_memory().unwrap();
            let (shutdown_complete_tx, shutdown_complete_rx) = mpsc::channel(1);
            let (shutdown_broadcast_tx, _) = broadcast::channel(1);
            let config = LobbyConfig {
                seats: 2,
                ..LobbyConfig::default()
            };
            let pool = LobbyPool::new(
                n,
                config,
                db,
                &shutdown_broadcast_tx,
                &shutdown_complete_tx,
            );

            Self {
                pool,
                _shutdown_broadcast_tx: shutdown_broadcast_tx,
                _shutdown_complete_rx: shutdown_complete_rx,
            }
        }

        async fn join(&self, p: &TestPlayer) -> Option<Arc<Lobby>> {
            self.pool.join(&p.username, p.tx.clone()).await
        }

        async fn lobby_ids(&self) -> Vec<LobbyId> {
            let pool = self.pool.0.lock().await;
            pool.lobbies.iter().map(|l| l.lobby_id()).collect()
        }
    }

    struct TestPlayer {
        username: String,
        tx: mpsc::Sender<LobbyMessage>,
        _rx: mpsc::Receiver<LobbyMessage>,
    }

    impl TestPlayer {
        fn new(username: &str) -> Self {
            let (tx, rx) = mpsc::channel(64);
            Self {
                username: username.to_string(),
                tx,
                _rx: rx,
            }
        }
    }

    #[tokio::test]
    async fn full_lobbies_move_to_the_back() {
        let tp = TestPool::new(2);
        let lids = tp.lobby_ids().await;

        // Player 1 joins lobby 1 that should be in first position.
        let p1 = TestPlayer::new("alice");
        let l1 = tp.join(&p1).await.unwrap();
        assert_eq!(l1.lobby_id(), lids[0]);

        // Player 2 joins lobby 1.
        let p2 = TestPlayer::new("bob");
        let l1 = tp.join(&p2).await.unwrap();
        assert_eq!(l1.lobby_id(), lids[0]);

        // The lobby filled and its game started, it moves to the back.
        let lids = tp.lobby_ids().await;
        assert_eq!(l1.lobby_id(), lids[1]);

        // The next joins land on lobby 2, now at the front.
        let p3 = TestPlayer::new("carol");
        let l2 = tp.join(&p3).await.unwrap();
        assert_eq!(l2.lobby_id(), lids[0]);

        let p4 = TestPlayer::new("dave");
        let l2 = tp.join(&p4).await.unwrap();
        assert_eq!(l2.lobby_id(), lids[0]);

        // Both lobbies are running games, there is no room left.
        let p5 = TestPlayer::new("erin");
        assert!(tp.join(&p5).await.is_none());
    }

    #[tokio::test]
    async fn duplicate_usernames_cannot_share_a_lobby() {
        let tp = TestPool::new(1);

        let p1 = TestPlayer::new("alice");
        assert!(tp.join(&p1).await.is_some());

        // The same username cannot take a second seat in the only lobby.
        let p2 = TestPlayer::new("alice");
        assert!(tp.join(&p2).await.is_none());
    }
}
