// Copyright (C) 2025 Blindrush Developers
// SPDX-License-Identifier: Apache-2.0

//! The wire event vocabulary between clients and the server.
//!
//! Inbound frames decode eagerly into [ClientEvent] at the transport
//! boundary; anything that does not decode cleanly is rejected there and
//! never reaches the engine.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use blindrush_cards::Card;

use crate::game::LobbyId;

/// A shop item offer payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShopOffer {
    /// A pack revealing cards, jokers and vouchers when opened.
    Pack {
        /// Seed the pack contents are derived from.
        seed: u64,
        /// Number of items the pack reveals.
        items: u32,
    },
    /// A modifier voucher.
    Modifier {
        /// The modifier effect id.
        modifier_id: u32,
    },
    /// A joker.
    Joker {
        /// The joker effect id.
        joker_id: u32,
    },
}

impl ShopOffer {
    /// The offer type label used in validation errors.
    pub fn label(&self) -> &'static str {
        match self {
            ShopOffer::Pack { .. } => "pack",
            ShopOffer::Modifier { .. } => "modifier",
            ShopOffer::Joker { .. } => "joker",
        }
    }
}

/// A purchasable shop item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopItem {
    /// Item id unique within the shop instance.
    pub id: u32,
    /// The server side price.
    pub price: i64,
    /// The offer payload.
    #[serde(flatten)]
    pub offer: ShopOffer,
}

/// A single item revealed by a pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PackItem {
    /// A playing card added to the deck when selected.
    Card {
        /// The card.
        card: Card,
    },
    /// A joker put into a free slot when selected.
    Joker {
        /// The joker effect id.
        joker_id: u32,
    },
    /// A modifier voucher added to the owned set when selected.
    Voucher {
        /// The modifier effect id.
        modifier_id: u32,
    },
}

/// The revealed contents of a pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackContents {
    /// The revealed items.
    pub items: Vec<PackItem>,
}

/// An event sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case", deny_unknown_fields)]
pub enum ClientEvent {
    /// Join a lobby with a username.
    JoinLobby {
        /// The chosen username.
        username: String,
    },
    /// Leave the lobby.
    LeaveLobby,
    /// Propose the round blind.
    ProposeBlind {
        /// The proposed score target.
        amount: i64,
    },
    /// Play a hand of five cards.
    PlayHand {
        /// The played cards, must all be in the player's hand.
        cards: Vec<Card>,
    },
    /// Discard cards and draw replacements.
    DiscardCards {
        /// The discarded cards.
        cards: Vec<Card>,
    },
    /// Buy a joker from the shop.
    BuyJoker {
        /// The shop item id.
        item_id: u32,
        /// The price the client expects to pay.
        price: i64,
    },
    /// Buy a modifier voucher from the shop.
    BuyVoucher {
        /// The shop item id.
        item_id: u32,
        /// The price the client expects to pay.
        price: i64,
    },
    /// Buy a pack and reveal its contents.
    OpenPack {
        /// The shop item id.
        item_id: u32,
        /// The price the client expects to pay.
        price: i64,
    },
    /// Select one item from the last opened pack.
    SelectPackItem {
        /// The pack shop item id.
        item_id: u32,
        /// The selected pack item.
        selection: PackItem,
    },
    /// Reroll the shop joker slots.
    RerollShop,
    /// Done shopping.
    ShopDone,
    /// Activate owned modifiers on self.
    ActivateModifiers {
        /// The modifier ids to activate.
        ids: Vec<u32>,
    },
    /// Send owned modifiers to other players.
    SendModifiers {
        /// The modifier ids to send.
        ids: Vec<u32>,
        /// The receiving usernames.
        targets: Vec<String>,
    },
    /// Ready to start the next round.
    VouchersDone,
}

impl ClientEvent {
    /// Decodes a client event from a JSON text frame.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid client event")
    }

    /// Encodes this event to a JSON text frame.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("client event should serialize")
    }
}

/// A per-player state snapshot included in round events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerUpdate {
    /// The player username.
    pub username: String,
    /// The player gold.
    pub gold: i64,
    /// Round points scored so far.
    pub round_points: i64,
    /// Total points across rounds.
    pub total_points: i64,
    /// Hand plays left this round.
    pub plays_left: u32,
    /// Discards left this round.
    pub discards_left: u32,
}

/// An event sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Lobby joined confirmation.
    LobbyJoined {
        /// The joined lobby.
        lobby_id: LobbyId,
        /// The players already in the lobby.
        players: Vec<String>,
    },
    /// A player joined the lobby.
    PlayerJoined {
        /// The player username.
        username: String,
    },
    /// A player left the lobby.
    PlayerLeft {
        /// The player username.
        username: String,
    },
    /// The blind proposal phase started.
    StartingBlind {
        /// The round number.
        round: u32,
        /// The round base blind.
        base_blind: i64,
    },
    /// The high blind changed.
    BlindUpdated {
        /// The current high blind.
        high_blind: i64,
        /// Username of the proposer.
        proposer: String,
    },
    /// The play phase started; sent per player with their dealt hand.
    StartingRound {
        /// The round number.
        round: u32,
        /// The round score target.
        high_blind: i64,
        /// The receiving player's hand.
        hand: Vec<Card>,
        /// The receiving player's gold after round-start modifiers.
        gold: i64,
        /// Hand plays available.
        plays_left: u32,
        /// Discards available.
        discards_left: u32,
    },
    /// A hand was scored.
    PlayedHand {
        /// The acting player.
        username: String,
        /// The hand category label.
        hand_type: String,
        /// Chips after all effects.
        chips: i64,
        /// Mult after all effects.
        mult: i64,
        /// The play score added to round points.
        total_score: i64,
        /// Round points after the play.
        round_points: i64,
        /// Gold after the play.
        gold: i64,
        /// Plays left after the play.
        plays_left: u32,
        /// The cards the category scored.
        scored_cards: Vec<Card>,
        /// Which joker slots triggered.
        jokers_triggered: Vec<bool>,
    },
    /// Replacement cards dealt to the caller after a play or discard.
    NewCards {
        /// The refilled hand.
        hand: Vec<Card>,
        /// Discards left, unchanged after a play.
        discards_left: u32,
    },
    /// The shop phase started.
    StartingShop {
        /// The round number.
        round: u32,
        /// The items on sale.
        items: Vec<ShopItem>,
        /// The reroll price.
        reroll_price: i64,
    },
    /// The rerollable joker slots were regenerated for the caller.
    ShopRerolled {
        /// The new joker items.
        jokers: Vec<ShopItem>,
        /// The caller's gold after paying for the reroll.
        gold: i64,
    },
    /// A shop purchase completed.
    ItemPurchased {
        /// The buying player.
        username: String,
        /// The bought item id.
        item_id: u32,
        /// The buyer's gold after the purchase.
        gold: i64,
    },
    /// A pack was opened, sent to the buyer only.
    PackOpened {
        /// The pack item id.
        item_id: u32,
        /// The revealed contents.
        contents: PackContents,
    },
    /// A pack selection completed.
    PackSelected {
        /// The pack item id.
        item_id: u32,
        /// The selected item.
        selection: PackItem,
    },
    /// The vouchers phase started.
    StartingVouchers {
        /// The usernames still in the lobby.
        players: Vec<String>,
    },
    /// Modifiers arrived from another player.
    ModifiersReceived {
        /// The sending player.
        from: String,
        /// The modifier ids received.
        ids: Vec<u32>,
    },
    /// Modifiers ran out of uses and were removed.
    ModifiersExpired {
        /// The expired modifier ids.
        ids: Vec<u32>,
    },
    /// Players were eliminated at the end of the round.
    PlayersEliminated {
        /// The eliminated usernames.
        usernames: Vec<String>,
        /// The round they were eliminated in.
        round: u32,
    },
    /// The game ended.
    GameEnd {
        /// The winning usernames, more than one on a tie.
        winners: Vec<String>,
        /// The winning total points.
        points: i64,
    },
    /// An action was rejected or failed.
    Error {
        /// The error message.
        message: String,
    },
}

impl ServerEvent {
    /// Encodes this event to a JSON text frame.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("server event should serialize")
    }

    /// Decodes a server event from a JSON text frame.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid server event")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blindrush_cards::{Rank, Suit};

    #[test]
    fn client_event_round_trip() {
        let event = ClientEvent::PlayHand {
            cards: vec![
                Card::new(Rank::Nine, Suit::Spades),
                Card::new(Rank::Eight, Suit::Spades),
            ],
        };

        let json = event.to_json();
        assert!(json.contains(r#""event":"play_hand""#));
        assert_eq!(ClientEvent::from_json(&json).unwrap(), event);
    }

    #[test]
    fn client_event_rejects_malformed_payloads() {
        // Unknown event name.
        assert!(ClientEvent::from_json(r#"{"event":"cheat"}"#).is_err());
        // Unknown field.
        assert!(ClientEvent::from_json(r#"{"event":"reroll_shop","hax":1}"#).is_err());
        // Wrong argument type.
        assert!(ClientEvent::from_json(r#"{"event":"propose_blind","amount":"ten"}"#).is_err());
        // Missing argument.
        assert!(ClientEvent::from_json(r#"{"event":"propose_blind"}"#).is_err());

        let event = ClientEvent::from_json(r#"{"event":"propose_blind","amount":50}"#).unwrap();
        assert_eq!(event, ClientEvent::ProposeBlind { amount: 50 });
    }

    #[test]
    fn shop_item_json_shape() {
        let item = ShopItem {
            id: 3,
            price: 5,
            offer: ShopOffer::Joker { joker_id: 7 },
        };

        let json = serde_json::to_string(&item).unwrap();
        assert_eq!(json, r#"{"id":3,"price":5,"type":"joker","joker_id":7}"#);

        let back: ShopItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn pack_selection_round_trip() {
        let event = ClientEvent::SelectPackItem {
            item_id: 9,
            selection: PackItem::Card {
                card: Card::with_enhancement(Rank::Ace, Suit::Spades, 2),
            },
        };

        let json = event.to_json();
        assert_eq!(ClientEvent::from_json(&json).unwrap(), event);
    }
}
