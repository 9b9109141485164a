// Copyright (C) 2025 Blindrush Developers
// SPDX-License-Identifier: Apache-2.0

//! Cards and deck definitions.
use anyhow::{Result, bail};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Card rank.
///
/// Rank values follow the scoring convention where the ace is low: aces
/// count 1, pip cards their face value, and J/Q/K count 11/12/13.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    /// Ace
    #[serde(rename = "A")]
    Ace,
    /// Deuce
    #[serde(rename = "2")]
    Deuce,
    /// Trey
    #[serde(rename = "3")]
    Trey,
    /// Four
    #[serde(rename = "4")]
    Four,
    /// Five
    #[serde(rename = "5")]
    Five,
    /// Six
    #[serde(rename = "6")]
    Six,
    /// Seven
    #[serde(rename = "7")]
    Seven,
    /// Eight
    #[serde(rename = "8")]
    Eight,
    /// Nine
    #[serde(rename = "9")]
    Nine,
    /// Ten
    #[serde(rename = "10")]
    Ten,
    /// Jack
    #[serde(rename = "J")]
    Jack,
    /// Queen
    #[serde(rename = "Q")]
    Queen,
    /// King
    #[serde(rename = "K")]
    King,
}

impl Rank {
    /// Returns all ranks.
    pub fn ranks() -> impl DoubleEndedIterator<Item = Rank> {
        use Rank::*;
        [
            Ace, Deuce, Trey, Four, Five, Six, Seven, Eight, Nine, Ten, Jack, Queen, King,
        ]
        .into_iter()
    }

    /// The rank value used for sorting and straights, with the ace low.
    pub fn value(&self) -> u8 {
        match self {
            Rank::Ace => 1,
            Rank::Deuce => 2,
            Rank::Trey => 3,
            Rank::Four => 4,
            Rank::Five => 5,
            Rank::Six => 6,
            Rank::Seven => 7,
            Rank::Eight => 8,
            Rank::Nine => 9,
            Rank::Ten => 10,
            Rank::Jack => 11,
            Rank::Queen => 12,
            Rank::King => 13,
        }
    }

    /// The chip points a scored card of this rank contributes.
    ///
    /// Face cards are worth 10, aces 11, pip cards their face value.
    pub fn chip_points(&self) -> i64 {
        match self {
            Rank::Ace => 11,
            Rank::Jack | Rank::Queen | Rank::King => 10,
            r => r.value() as i64,
        }
    }

    /// Checks if this is a face card.
    pub fn is_face(&self) -> bool {
        matches!(self, Rank::Jack | Rank::Queen | Rank::King)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rank = match self {
            Rank::Ace => "A",
            Rank::Deuce => "2",
            Rank::Trey => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
        };

        write!(f, "{rank}")
    }
}

/// Card suit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Suit {
    /// Clubs suit.
    #[serde(rename = "c")]
    Clubs,
    /// Diamonds suit.
    #[serde(rename = "d")]
    Diamonds,
    /// Hearts suit.
    #[serde(rename = "h")]
    Hearts,
    /// Spades suit.
    #[serde(rename = "s")]
    Spades,
}

impl Suit {
    /// Returns all suits.
    pub fn suits() -> impl DoubleEndedIterator<Item = Suit> {
        [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades].into_iter()
    }

    /// Checks if this is a black suit.
    pub fn is_black(&self) -> bool {
        matches!(self, Suit::Clubs | Suit::Spades)
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suit = match self {
            Suit::Clubs => 'C',
            Suit::Diamonds => 'D',
            Suit::Hearts => 'H',
            Suit::Spades => 'S',
        };

        write!(f, "{suit}")
    }
}

/// A card enhancement bought from shop packs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enhancement {
    /// Extra chips when the card is scored.
    BonusChips,
    /// Extra mult when the card is scored.
    BonusMult,
}

impl Enhancement {
    /// Decodes an enhancement code, unknown codes are ignored.
    pub fn from_code(code: u8) -> Option<Enhancement> {
        match code {
            1 => Some(Enhancement::BonusChips),
            2 => Some(Enhancement::BonusMult),
            _ => None,
        }
    }
}

/// A playing card with an optional enhancement code.
///
/// Serializes to the transport shape `{"rank": "A", "suit": "s"}` with an
/// optional numeric `enhancement` field.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    /// The card rank.
    pub rank: Rank,
    /// The card suit.
    pub suit: Suit,
    /// The enhancement code, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhancement: Option<u8>,
}

impl Card {
    /// Creates a card with no enhancement.
    pub fn new(rank: Rank, suit: Suit) -> Card {
        Card {
            rank,
            suit,
            enhancement: None,
        }
    }

    /// Creates a card carrying an enhancement code.
    pub fn with_enhancement(rank: Rank, suit: Suit, code: u8) -> Card {
        Card {
            rank,
            suit,
            enhancement: Some(code),
        }
    }

    /// The decoded enhancement, if the card carries a known code.
    pub fn enhancement(&self) -> Option<Enhancement> {
        self.enhancement.and_then(Enhancement::from_code)
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

impl fmt::Debug for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Card({}{})", self.rank, self.suit)
    }
}

/// A deck split into an undrawn pile and a played pile.
///
/// A card lives in exactly one of the two piles; plays and discards move
/// cards to the played pile, refills move the played pile back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Deck {
    undrawn: Vec<Card>,
    played: Vec<Card>,
}

impl Deck {
    /// The number of cards in a standard deck.
    pub const SIZE: usize = 52;

    /// Creates a standard unshuffled 52 cards deck.
    pub fn standard() -> Self {
        let undrawn = Suit::suits()
            .flat_map(|s| Rank::ranks().map(move |r| Card::new(r, s)))
            .collect::<Vec<_>>();
        Self {
            undrawn,
            played: Vec::new(),
        }
    }

    /// Shuffles the undrawn pile.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        self.undrawn.shuffle(rng);
    }

    /// Draws `n` cards from the undrawn pile.
    ///
    /// Fails without drawing anything if fewer than `n` cards remain.
    pub fn draw(&mut self, n: usize) -> Result<Vec<Card>> {
        if self.undrawn.len() < n {
            bail!(
                "cannot draw {n} cards, {} left in the undrawn pile",
                self.undrawn.len()
            );
        }

        let at = self.undrawn.len() - n;
        Ok(self.undrawn.split_off(at))
    }

    /// Adds a card to the undrawn pile.
    pub fn add_card(&mut self, card: Card) {
        self.undrawn.push(card);
    }

    /// Removes a specific multiset of cards from the undrawn pile.
    ///
    /// Fails without removing anything if any card is missing; duplicates
    /// in `cards` require that many copies in the pile.
    pub fn remove_cards(&mut self, cards: &[Card]) -> Result<()> {
        let mut remaining = self.undrawn.clone();
        for card in cards {
            match remaining.iter().position(|c| c == card) {
                Some(at) => {
                    remaining.swap_remove(at);
                }
                None => bail!("card {card} is not in the undrawn pile"),
            }
        }

        self.undrawn = remaining;
        Ok(())
    }

    /// Moves played cards to the played pile.
    pub fn discard<I: IntoIterator<Item = Card>>(&mut self, cards: I) {
        self.played.extend(cards);
    }

    /// Moves the played pile back into the undrawn pile and shuffles.
    pub fn refill_from_played<R: Rng>(&mut self, rng: &mut R) {
        self.undrawn.append(&mut self.played);
        self.undrawn.shuffle(rng);
    }

    /// Number of cards left in the undrawn pile.
    pub fn undrawn_count(&self) -> usize {
        self.undrawn.len()
    }

    /// Number of cards in the played pile.
    pub fn played_count(&self) -> usize {
        self.played.len()
    }

    /// The undrawn pile.
    pub fn undrawn(&self) -> &[Card] {
        &self.undrawn
    }

    /// The played pile.
    pub fn played(&self) -> &[Card] {
        &self.played
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn standard_deck_is_complete() {
        let deck = Deck::standard();
        assert_eq!(deck.undrawn_count(), Deck::SIZE);
        assert_eq!(deck.played_count(), 0);

        let cards = deck.undrawn().iter().copied().collect::<HashSet<_>>();
        assert_eq!(cards.len(), Deck::SIZE);
    }

    #[test]
    fn draw_moves_cards_out_of_the_pile() {
        let mut deck = Deck::standard();
        let cards = deck.draw(8).unwrap();
        assert_eq!(cards.len(), 8);
        assert_eq!(deck.undrawn_count(), Deck::SIZE - 8);

        for card in &cards {
            assert!(!deck.undrawn().contains(card));
        }
    }

    #[test]
    fn draw_fails_without_partial_result() {
        let mut deck = Deck::standard();
        let _ = deck.draw(50).unwrap();
        assert!(deck.draw(3).is_err());
        // The failed draw must not consume the remaining cards.
        assert_eq!(deck.undrawn_count(), 2);
    }

    #[test]
    fn added_cards_join_the_undrawn_pile() {
        let mut deck = Deck::standard();
        let ace = Card::new(Rank::Ace, Suit::Spades);
        deck.add_card(ace);

        assert_eq!(deck.undrawn_count(), Deck::SIZE + 1);
        assert_eq!(
            deck.undrawn().iter().filter(|c| **c == ace).count(),
            2
        );
    }

    #[test]
    fn remove_cards_takes_the_exact_multiset() {
        let mut deck = Deck::standard();
        let ace = Card::new(Rank::Ace, Suit::Spades);
        deck.add_card(ace);

        deck.remove_cards(&[ace, ace]).unwrap();
        assert_eq!(deck.undrawn_count(), Deck::SIZE - 1);
        assert!(!deck.undrawn().contains(&ace));

        // A third copy does not exist, the pile is left untouched.
        let king = Card::new(Rank::King, Suit::Hearts);
        assert!(deck.remove_cards(&[king, ace]).is_err());
        assert_eq!(deck.undrawn_count(), Deck::SIZE - 1);
        assert!(deck.undrawn().contains(&king));
    }

    #[test]
    fn refill_returns_played_cards() {
        let mut deck = Deck::standard();
        let cards = deck.draw(5).unwrap();
        deck.discard(cards);
        assert_eq!(deck.played_count(), 5);

        deck.refill_from_played(&mut rand::rng());
        assert_eq!(deck.undrawn_count(), Deck::SIZE);
        assert_eq!(deck.played_count(), 0);
    }

    #[test]
    fn card_json_shape() {
        let card = Card::new(Rank::Ten, Suit::Hearts);
        assert_eq!(
            serde_json::to_string(&card).unwrap(),
            r#"{"rank":"10","suit":"h"}"#
        );

        let card = Card::with_enhancement(Rank::Ace, Suit::Spades, 1);
        assert_eq!(
            serde_json::to_string(&card).unwrap(),
            r#"{"rank":"A","suit":"s","enhancement":1}"#
        );

        let card: Card = serde_json::from_str(r#"{"rank":"K","suit":"d"}"#).unwrap();
        assert_eq!(card, Card::new(Rank::King, Suit::Diamonds));
    }

    #[test]
    fn deck_serde_round_trip() {
        let mut deck = Deck::standard();
        deck.shuffle(&mut rand::rng());
        let cards = deck.draw(5).unwrap();
        deck.discard(cards);

        let json = serde_json::to_string(&deck).unwrap();
        let deck2: Deck = serde_json::from_str(&json).unwrap();

        assert_eq!(deck.undrawn(), deck2.undrawn());
        assert_eq!(deck.played(), deck2.played());
    }

    #[test]
    fn low_ace_rank_values() {
        assert_eq!(Rank::Ace.value(), 1);
        assert_eq!(Rank::Deuce.value(), 2);
        assert_eq!(Rank::Ten.value(), 10);
        assert_eq!(Rank::King.value(), 13);

        assert_eq!(Rank::Ace.chip_points(), 11);
        assert_eq!(Rank::King.chip_points(), 10);
        assert_eq!(Rank::Nine.chip_points(), 9);
    }
}
