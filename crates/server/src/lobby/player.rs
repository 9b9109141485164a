// Copyright (C) 2025 Blindrush Developers
// SPDX-License-Identifier: Apache-2.0

//! Per player lobby state.
use ahash::AHashMap;
use tokio::sync::mpsc;

use blindrush_cards::{Card, Deck};
use blindrush_core::{
    error::ActionError,
    game::{Gold, HAND_SIZE, STARTING_GOLD, TOTAL_DISCARDS, TOTAL_HAND_PLAYS},
    message::ServerEvent,
};
use blindrush_eval::{
    HandCategory, HandValue, JokerSlots, Modifier, ReceivedModifier, Scoring, apply_enhancements,
    apply_jokers, apply_modifiers, apply_round_modifiers, apply_round_modifiers_received,
    chips_per_card, decrement_received_uses, decrement_uses,
};

use crate::{db::PlayerStats, lobby::LobbyMessage};

/// The outcome of a scored hand play.
#[derive(Debug)]
pub(crate) struct PlayOutcome {
    /// The hand category label.
    pub hand_type: &'static str,
    /// Chips after all effects.
    pub chips: i64,
    /// Mult after all effects.
    pub mult: i64,
    /// The play score, chips times mult.
    pub score: i64,
    /// The cards the category scored.
    pub scored_cards: Vec<Card>,
    /// Which joker slots triggered.
    pub jokers_triggered: Vec<bool>,
    /// Modifier ids that ran out of uses on this play.
    pub expired: Vec<u32>,
    /// The player finished the round with this play.
    pub finished: bool,
}

/// A player at a lobby.
#[derive(Debug)]
pub(crate) struct PlayerSession {
    /// The player username.
    pub username: String,
    /// The channel to send messages to this player connection.
    pub lobby_tx: mpsc::Sender<LobbyMessage>,
    /// This player runs inside the lobby task.
    pub is_bot: bool,
    /// The player gold.
    pub gold: Gold,
    /// The player deck, rebuilt every round.
    pub deck: Deck,
    /// The cards in the player's hand.
    pub hand: Vec<Card>,
    /// The player joker slots.
    pub jokers: JokerSlots,
    /// Modifiers the player activated on themselves.
    pub activated: Vec<Modifier>,
    /// Modifiers other players sent to this player.
    pub received: Vec<ReceivedModifier>,
    /// Vouchers bought but not activated yet.
    pub owned: Vec<Modifier>,
    /// Cards gained from packs, added to the deck every round.
    pub pack_cards: Vec<Card>,
    /// Points scored this round.
    pub round_points: i64,
    /// Points scored across all rounds.
    pub total_points: i64,
    /// Hand plays left this round.
    pub plays_left: u32,
    /// Discards left this round.
    pub discards_left: u32,
    /// The player never proposed above the base blind this round.
    pub bet_minimum: bool,
    /// The last pack bought this shop phase, pending selection.
    pub last_pack: Option<u32>,
    /// How many times each hand category was played.
    hand_counts: AHashMap<HandCategory, u32>,
}

impl PlayerSession {
    pub fn new(username: String, lobby_tx: mpsc::Sender<LobbyMessage>, is_bot: bool) -> Self {
        Self {
            username,
            lobby_tx,
            is_bot,
            gold: STARTING_GOLD,
            deck: Deck::default(),
            hand: Vec::new(),
            jokers: JokerSlots::new(),
            activated: Vec::new(),
            received: Vec::new(),
            owned: Vec::new(),
            pack_cards: Vec::new(),
            round_points: 0,
            total_points: 0,
            plays_left: TOTAL_HAND_PLAYS,
            discards_left: TOTAL_DISCARDS,
            bet_minimum: true,
            last_pack: None,
            hand_counts: AHashMap::new(),
        }
    }

    /// Send an event to this player connection.
    pub async fn send(&self, event: ServerEvent) {
        let _ = self.lobby_tx.send(LobbyMessage::Send(event)).await;
    }

    /// Resets state for a new round and deals a fresh hand.
    ///
    /// Returns the ids of round-start modifiers that expired.
    pub fn start_round(&mut self) -> Vec<u32> {
        let mut rng = rand::rng();

        self.deck = Deck::standard();
        for card in &self.pack_cards {
            self.deck.add_card(*card);
        }
        self.deck.shuffle(&mut rng);
        self.hand = self.deck.draw(HAND_SIZE).unwrap_or_default();

        self.round_points = 0;
        self.plays_left = TOTAL_HAND_PLAYS;
        self.discards_left = TOTAL_DISCARDS;
        self.last_pack = None;

        let (gold, mut expired) = apply_round_modifiers(&mut self.activated, self.gold.amount());
        let (gold, also_expired) = apply_round_modifiers_received(&mut self.received, gold);
        self.gold = Gold::new(gold);
        expired.extend(also_expired);

        expired
    }

    /// Removes a multiset of cards from the hand.
    ///
    /// Fails without removing anything if any card is not held.
    pub fn take_from_hand(&mut self, cards: &[Card]) -> Result<(), ActionError> {
        let mut hand = self.hand.clone();
        for card in cards {
            match hand.iter().position(|c| c == card) {
                Some(pos) => {
                    hand.remove(pos);
                }
                None => return Err(ActionError::CardNotInHand),
            }
        }

        self.hand = hand;
        Ok(())
    }

    /// Draws up to `n` cards, reshuffling the played pile back in if the
    /// undrawn pile runs short.
    pub fn draw_cards(&mut self, n: usize) -> Vec<Card> {
        let mut rng = rand::rng();

        if self.deck.undrawn_count() < n {
            self.deck.refill_from_played(&mut rng);
        }

        let n = n.min(self.deck.undrawn_count());
        self.deck.draw(n).unwrap_or_default()
    }

    /// Scores a played hand and updates the player state.
    ///
    /// The cards must already be removed from the hand; the hand is
    /// refilled from the deck afterwards.
    pub fn score_play(&mut self, cards: &[Card], hv: HandValue, high_blind: i64) -> PlayOutcome {
        let scoring = {
            let mut rng = rand::rng();

            let mut scoring = Scoring {
                chips: hv.chips,
                mult: hv.mult,
                gold: self.gold.amount(),
            };
            scoring.chips += chips_per_card(&hv.scored);
            scoring = apply_enhancements(&hv.scored, scoring);

            let (scoring, triggered) = apply_jokers(cards, &self.jokers, scoring, &mut rng);
            let mut scoring = apply_modifiers(cards, &self.activated, scoring, &mut rng);
            let received = self.received.iter().map(|m| m.modifier).collect::<Vec<_>>();
            scoring = apply_modifiers(cards, &received, scoring, &mut rng);

            (scoring, triggered)
        };
        let (scoring, triggered) = scoring;

        let score = scoring.score();
        self.gold = Gold::new(scoring.gold);
        self.round_points += score;
        self.total_points += score;
        self.plays_left -= 1;
        *self.hand_counts.entry(hv.category).or_default() += 1;

        let mut expired = decrement_uses(&mut self.activated);
        expired.extend(decrement_received_uses(&mut self.received));

        self.deck.discard(cards.iter().copied());
        let need = HAND_SIZE.saturating_sub(self.hand.len());
        let drawn = self.draw_cards(need);
        self.hand.extend(drawn);

        PlayOutcome {
            hand_type: hv.category.label(),
            chips: scoring.chips,
            mult: scoring.mult,
            score,
            scored_cards: hv.scored,
            jokers_triggered: triggered.to_vec(),
            expired,
            finished: self.plays_left == 0 || self.round_points >= high_blind,
        }
    }

    /// The statistics row persisted for this player.
    pub fn stats(&self, rounds: u32) -> PlayerStats {
        let most_played_hand = self
            .hand_counts
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(category, _)| category.label().to_string())
            .unwrap_or_default();

        PlayerStats {
            username: self.username.clone(),
            rounds,
            total_points: self.total_points,
            most_played_hand,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blindrush_cards::{Rank, Suit};

    fn session() -> PlayerSession {
        let (tx, _rx) = mpsc::channel(1);
        PlayerSession::new("alice".to_string(), tx, false)
    }

    #[test]
    fn start_round_deals_a_fresh_hand() {
        let mut player = session();
        player.pack_cards.push(Card::new(Rank::Ace, Suit::Spades));

        let expired = player.start_round();
        assert!(expired.is_empty());
        assert_eq!(player.hand.len(), HAND_SIZE);
        assert_eq!(player.plays_left, TOTAL_HAND_PLAYS);
        assert_eq!(player.discards_left, TOTAL_DISCARDS);
        // Pack cards are shuffled into the deck.
        assert_eq!(
            player.deck.undrawn_count() + player.hand.len(),
            Deck::SIZE + 1
        );
    }

    #[test]
    fn round_start_modifiers_pay_out() {
        let mut player = session();
        player.activated.push(Modifier {
            id: 10,
            left_uses: 1,
        });

        let expired = player.start_round();
        assert_eq!(player.gold, Gold::new(1005));
        assert_eq!(expired, vec![10]);
        assert!(player.activated.is_empty());
    }

    #[test]
    fn take_from_hand_is_all_or_nothing() {
        let mut player = session();
        player.start_round();

        let held = player.hand[0];
        let missing = player
            .deck
            .undrawn()
            .iter()
            .find(|c| !player.hand.contains(c))
            .copied()
            .unwrap();

        assert_eq!(
            player.take_from_hand(&[held, missing]),
            Err(ActionError::CardNotInHand)
        );
        assert_eq!(player.hand.len(), HAND_SIZE);

        assert!(player.take_from_hand(&[held]).is_ok());
        assert_eq!(player.hand.len(), HAND_SIZE - 1);
    }

    #[test]
    fn score_play_refills_the_hand() {
        let mut player = session();
        player.start_round();

        let cards = player.hand[..5].to_vec();
        let hv = blindrush_eval::best_hand(&cards).unwrap();
        player.take_from_hand(&cards).unwrap();

        let outcome = player.score_play(&cards, hv, 1_000_000);
        assert_eq!(outcome.score, outcome.chips * outcome.mult);
        assert_eq!(player.round_points, outcome.score);
        assert_eq!(player.total_points, outcome.score);
        assert_eq!(player.plays_left, TOTAL_HAND_PLAYS - 1);
        assert_eq!(player.hand.len(), HAND_SIZE);
        assert!(!outcome.finished);
    }

    #[test]
    fn play_finishes_when_the_target_is_met() {
        let mut player = session();
        player.start_round();

        let cards = player.hand[..5].to_vec();
        let hv = blindrush_eval::best_hand(&cards).unwrap();
        player.take_from_hand(&cards).unwrap();

        // Any scoring play reaches a target of one point.
        let outcome = player.score_play(&cards, hv, 1);
        assert!(outcome.finished);
    }

    #[test]
    fn stats_pick_the_most_played_hand() {
        let mut player = session();
        *player.hand_counts.entry(HandCategory::Pair).or_default() += 2;
        *player.hand_counts.entry(HandCategory::Flush).or_default() += 3;
        player.total_points = 420;

        let stats = player.stats(7);
        assert_eq!(stats.username, "alice");
        assert_eq!(stats.rounds, 7);
        assert_eq!(stats.total_points, 420);
        assert_eq!(stats.most_played_hand, "Flush");
    }
}
