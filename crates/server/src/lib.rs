// Copyright (C) 2025 Blindrush Developers
// SPDX-License-Identifier: Apache-2.0

//! Blindrush game server.
#![warn(clippy::all, rust_2018_idioms, missing_docs)]

pub mod connection;
pub mod db;
pub mod lobby;
pub mod lobby_pool;
pub mod server;
pub mod shop;
pub use server::{Config, run};
