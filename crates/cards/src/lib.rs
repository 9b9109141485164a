// Copyright (C) 2025 Blindrush Developers
// SPDX-License-Identifier: Apache-2.0

//! Blindrush cards and deck types shared by the scoring engine and server.
#![warn(clippy::all, rust_2018_idioms, missing_docs)]

pub mod cards;
pub use cards::{Card, Deck, Enhancement, Rank, Suit};
