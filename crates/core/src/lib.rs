// Copyright (C) 2025 Blindrush Developers
// SPDX-License-Identifier: Apache-2.0

//! Blindrush core types shared by client and server.
#![warn(clippy::all, rust_2018_idioms, missing_docs)]

pub mod error;
pub mod game;
pub mod message;

pub use error::ActionError;
pub use game::{Gold, LobbyId};
