// Copyright (C) 2025 Blindrush Developers
// SPDX-License-Identifier: Apache-2.0

//! Blindrush scoring pipeline: hand evaluation, jokers and modifiers.
#![warn(clippy::all, rust_2018_idioms, missing_docs)]

pub mod hand;
pub mod jokers;
pub mod modifiers;

pub use hand::{HandCategory, HandValue, Scoring, apply_enhancements, best_hand, chips_per_card};
pub use jokers::{JOKER_SLOTS, JokerSlots, apply_jokers};
pub use modifiers::{
    Modifier, ReceivedModifier, apply_modifiers, apply_round_modifiers,
    apply_round_modifiers_received, decrement_received_uses, decrement_uses,
};
