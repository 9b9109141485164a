// Copyright (C) 2025 Blindrush Developers
// SPDX-License-Identifier: Apache-2.0

//! Types and constants used in a Blindrush game.
use serde::{Deserialize, Serialize};
use std::{fmt, ops, sync::atomic};

/// Maximum number of rounds in a game.
pub const MAX_GAME_ROUNDS: u32 = 10;

/// Hand plays available to a player each round.
pub const TOTAL_HAND_PLAYS: u32 = 3;

/// Discards available to a player each round.
pub const TOTAL_DISCARDS: u32 = 3;

/// Number of cards a player holds.
pub const HAND_SIZE: usize = 8;

/// Number of cards scored in a play.
pub const PLAY_SIZE: usize = 5;

/// Gold every player starts the game with.
pub const STARTING_GOLD: Gold = Gold::new(1000);

/// The base blind of the first round.
pub const BASE_BLIND: i64 = 10;

/// The largest base blind a round can reach.
pub const MAX_BLIND: i64 = 1_000_000;

/// The base blind for a round, doubling every round up to [MAX_BLIND].
pub fn base_blind(round: u32) -> i64 {
    let doublings = round.saturating_sub(1).min(62);
    (BASE_BLIND << doublings).min(MAX_BLIND)
}

/// A unique lobby identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LobbyId(u32);

impl LobbyId {
    /// A lobby id for an unassigned lobby.
    pub const NO_LOBBY: LobbyId = LobbyId(0);

    /// Create a new unique lobby id.
    pub fn new_id() -> LobbyId {
        static LAST_ID: atomic::AtomicU32 = atomic::AtomicU32::new(1);
        LobbyId(LAST_ID.fetch_add(1, atomic::Ordering::Relaxed))
    }
}

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Gold amount, never negative.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Gold(i64);

impl Gold {
    /// The zero gold.
    pub const ZERO: Gold = Gold(0);

    /// Creates gold with the given value.
    pub const fn new(value: i64) -> Self {
        Self(if value < 0 { 0 } else { value })
    }

    /// The integer amount.
    pub fn amount(&self) -> i64 {
        self.0
    }
}

impl From<i64> for Gold {
    fn from(val: i64) -> Self {
        Gold::new(val)
    }
}

impl From<Gold> for i64 {
    fn from(val: Gold) -> Self {
        val.0
    }
}

impl ops::Add for Gold {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Gold(self.0.saturating_add(rhs.0))
    }
}

impl ops::AddAssign for Gold {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl ops::Sub<Gold> for Gold {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_sub(rhs.0).max(0))
    }
}

impl ops::SubAssign for Gold {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_sub(rhs.0).max(0);
    }
}

impl fmt::Display for Gold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_blind_doubles_and_caps() {
        assert_eq!(base_blind(1), 10);
        assert_eq!(base_blind(2), 20);
        assert_eq!(base_blind(3), 40);
        assert_eq!(base_blind(10), 5_120);
        assert_eq!(base_blind(30), MAX_BLIND);
        assert_eq!(base_blind(100), MAX_BLIND);
    }

    #[test]
    fn gold_never_goes_negative() {
        let mut gold = Gold::new(10);
        gold -= Gold::new(25);
        assert_eq!(gold, Gold::ZERO);

        assert_eq!(Gold::from(-5), Gold::ZERO);
        assert_eq!(Gold::new(3) - Gold::new(7), Gold::ZERO);
        assert_eq!((Gold::new(3) + Gold::new(7)).amount(), 10);
    }

    #[test]
    fn lobby_ids_are_unique() {
        let a = LobbyId::new_id();
        let b = LobbyId::new_id();
        assert_ne!(a, b);
        assert_ne!(a, LobbyId::NO_LOBBY);
    }
}
