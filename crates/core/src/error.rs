// Copyright (C) 2025 Blindrush Developers
// SPDX-License-Identifier: Apache-2.0

//! Validation errors reported to the initiating connection.
use thiserror::Error;

/// A rejected player action.
///
/// These are reported only to the caller and never mutate state; they are
/// not fatal to the lobby or the process.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    /// The action is not valid in the current phase.
    #[error("action not allowed in the {0} phase")]
    WrongPhase(&'static str),
    /// The player cannot afford the purchase.
    #[error("insufficient funds, need {need} but have {have}")]
    InsufficientFunds {
        /// The price to pay.
        need: i64,
        /// The player's gold.
        have: i64,
    },
    /// The client price does not match the server price.
    #[error("price mismatch, offered {offered} but the price is {expected}")]
    PriceMismatch {
        /// The price sent by the client.
        offered: i64,
        /// The server side price.
        expected: i64,
    },
    /// The shop item does not exist in this shop instance.
    #[error("unknown shop item {0}")]
    UnknownItem(u32),
    /// The shop item is not of the expected type.
    #[error("shop item {0} is not a {1}")]
    ItemTypeMismatch(u32, &'static str),
    /// A played or discarded card is not in the player's hand.
    #[error("card is not in the hand")]
    CardNotInHand,
    /// A play must use exactly five cards.
    #[error("a play must use exactly {0} cards")]
    InvalidPlaySize(usize),
    /// The player has no hand plays left this round.
    #[error("no hand plays left")]
    NoPlaysLeft,
    /// The player has no discards left this round.
    #[error("no discards left")]
    NoDiscardsLeft,
    /// All joker slots are taken.
    #[error("joker slots are full")]
    JokerSlotsFull,
    /// The selection is not part of the opened pack contents.
    #[error("selection is not in the pack contents")]
    NotInPack,
    /// Pack selection without a preceding pack purchase this round.
    #[error("no pack purchased")]
    NoPackPurchased,
    /// The modifier id is not owned by the player.
    #[error("modifier {0} is not owned")]
    ModifierNotOwned(u32),
    /// The target player is not in the lobby.
    #[error("unknown player {0}")]
    UnknownPlayer(String),
}
