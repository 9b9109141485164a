// Copyright (C) 2025 Blindrush Developers
// SPDX-License-Identifier: Apache-2.0

//! Database types for persisting player statistics.
use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::{Connection, params};
use std::{path::Path, sync::Arc};

/// A database player statistics row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerStats {
    /// The player username.
    pub username: String,
    /// Rounds played across all games.
    pub rounds: u32,
    /// Total points scored across all games.
    pub total_points: i64,
    /// Label of the hand category played most often.
    pub most_played_hand: String,
}

/// Database for persisting player statistics.
#[derive(Debug, Clone)]
pub struct Db {
    db: Arc<Mutex<Connection>>,
}

impl Db {
    /// Open a database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS players (
               username TEXT PRIMARY KEY,
               rounds INTEGER NOT NULL,
               total_points INTEGER NOT NULL,
               most_played_hand TEXT NOT NULL,
               created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
               last_update DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            (),
        )?;

        Ok(Db {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// Updates players statistics, accumulating over previous games.
    pub async fn update(&self, players: Vec<PlayerStats>) -> Result<()> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let mut db = db.lock();

            let tx = db.transaction()?;

            for player in players {
                tx.execute(
                    "INSERT INTO players
                       (username, rounds, total_points, most_played_hand, last_update)
                     VALUES (?1, ?2, ?3, ?4, CURRENT_TIMESTAMP)
                     ON CONFLICT(username) DO UPDATE SET
                       rounds = rounds + excluded.rounds,
                       total_points = total_points + excluded.total_points,
                       most_played_hand = excluded.most_played_hand,
                       last_update = CURRENT_TIMESTAMP",
                    params![
                        player.username,
                        player.rounds,
                        player.total_points,
                        player.most_played_hand
                    ],
                )?;
            }

            tx.commit()?;

            Ok(())
        })
        .await?
    }

    /// Gets a player statistics row if present.
    pub async fn get_player(&self, username: &str) -> Result<Option<PlayerStats>> {
        let db = self.db.clone();
        let username = username.to_string();
        tokio::task::spawn_blocking(move || {
            let db = db.lock();

            let mut stmt = db.prepare(
                "SELECT username, rounds, total_points, most_played_hand
                 FROM players
                 WHERE username = ?1",
            )?;

            let res = stmt.query_row(params![username], |row| {
                Ok(PlayerStats {
                    username: row.get(0)?,
                    rounds: row.get(1)?,
                    total_points: row.get(2)?,
                    most_played_hand: row.get(3)?,
                })
            });

            match res {
                Ok(player) => Ok(Some(player)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await?
    }
}
