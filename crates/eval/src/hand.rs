// Copyright (C) 2025 Blindrush Developers
// SPDX-License-Identifier: Apache-2.0

//! Poker hand classification and base scoring.
//!
//! Cards are graded with the ace low (A=1, J=11, Q=12, K=13). A consequence
//! worth knowing: the "Royal Flush" category is a straight flush whose top
//! sorted card is a ten, and there is no ace-high straight.
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use blindrush_cards::{Card, Enhancement, Rank};

/// The running score accumulator threaded through the pipeline stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scoring {
    /// Accumulated chips.
    pub chips: i64,
    /// Accumulated multiplier, may go negative under penalty effects.
    pub mult: i64,
    /// The acting player's gold at evaluation time.
    pub gold: i64,
}

impl Scoring {
    /// The final score for a play.
    pub fn score(&self) -> i64 {
        self.chips * self.mult
    }
}

/// A classified poker hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HandCategory {
    /// Straight flush topping out at a ten.
    RoyalFlush,
    /// Five consecutive suited cards.
    StraightFlush,
    /// Five cards of the same rank.
    FiveOfAKind,
    /// Five of a kind that is also a flush.
    FlushFive,
    /// Full house that is also a flush.
    FlushHouse,
    /// Four cards of the same rank.
    FourOfAKind,
    /// Three of a kind plus a pair.
    FullHouse,
    /// Five suited cards.
    Flush,
    /// Five consecutive cards.
    Straight,
    /// Three cards of the same rank.
    ThreeOfAKind,
    /// Two distinct pairs.
    TwoPair,
    /// Two cards of the same rank.
    Pair,
    /// None of the above.
    HighCard,
}

impl HandCategory {
    /// The base (chips, mult) pair for this category.
    pub fn base(&self) -> (i64, i64) {
        match self {
            HandCategory::RoyalFlush => (65, 50),
            HandCategory::StraightFlush => (50, 40),
            HandCategory::FiveOfAKind => (30, 20),
            HandCategory::FlushFive => (35, 25),
            HandCategory::FlushHouse => (32, 22),
            HandCategory::FourOfAKind => (25, 15),
            HandCategory::FullHouse => (20, 12),
            HandCategory::Flush => (15, 8),
            HandCategory::Straight => (12, 5),
            HandCategory::ThreeOfAKind => (10, 4),
            HandCategory::TwoPair => (8, 3),
            HandCategory::Pair => (4, 2),
            HandCategory::HighCard => (1, 1),
        }
    }

    /// The category display label.
    pub fn label(&self) -> &'static str {
        match self {
            HandCategory::RoyalFlush => "Royal Flush",
            HandCategory::StraightFlush => "Straight Flush",
            HandCategory::FiveOfAKind => "Five of a Kind",
            HandCategory::FlushFive => "Flush Five",
            HandCategory::FlushHouse => "Flush House",
            HandCategory::FourOfAKind => "Four of a Kind",
            HandCategory::FullHouse => "Full House",
            HandCategory::Flush => "Flush",
            HandCategory::Straight => "Straight",
            HandCategory::ThreeOfAKind => "Three of a Kind",
            HandCategory::TwoPair => "Two Pair",
            HandCategory::Pair => "Pair",
            HandCategory::HighCard => "High Card",
        }
    }
}

impl fmt::Display for HandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The result of classifying a played hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandValue {
    /// The matched category.
    pub category: HandCategory,
    /// Base chips from the category table.
    pub chips: i64,
    /// Base mult from the category table.
    pub mult: i64,
    /// The cards the category judges as scored.
    pub scored: Vec<Card>,
}

/// Classifies a played hand, first category match in precedence order wins.
///
/// Returns `None` for an empty hand.
pub fn best_hand(cards: &[Card]) -> Option<HandValue> {
    if cards.is_empty() {
        return None;
    }

    // Sort by descending rank value, ace low.
    let mut sorted = cards.to_vec();
    sorted.sort_by(|a, b| b.rank.value().cmp(&a.rank.value()));

    let checks: [(HandCategory, fn(&[Card]) -> Option<Vec<Card>>); 13] = [
        (HandCategory::RoyalFlush, royal_flush),
        (HandCategory::StraightFlush, straight_flush),
        (HandCategory::FiveOfAKind, five_of_a_kind),
        (HandCategory::FlushFive, flush_five),
        (HandCategory::FlushHouse, flush_house),
        (HandCategory::FourOfAKind, four_of_a_kind),
        (HandCategory::FullHouse, full_house),
        (HandCategory::Flush, flush),
        (HandCategory::Straight, straight),
        (HandCategory::ThreeOfAKind, three_of_a_kind),
        (HandCategory::TwoPair, two_pair),
        (HandCategory::Pair, pair),
        (HandCategory::HighCard, high_card),
    ];

    for (category, check) in checks {
        if let Some(scored) = check(&sorted) {
            let (chips, mult) = category.base();
            return Some(HandValue {
                category,
                chips,
                mult,
                scored,
            });
        }
    }

    None
}

/// Sums the per-card chip points of the scored cards.
pub fn chips_per_card(cards: &[Card]) -> i64 {
    cards.iter().map(|c| c.rank.chip_points()).sum()
}

/// Applies card enhancements of the scored cards to the accumulator.
pub fn apply_enhancements(cards: &[Card], mut scoring: Scoring) -> Scoring {
    for card in cards {
        match card.enhancement() {
            Some(Enhancement::BonusChips) => scoring.chips += 30,
            Some(Enhancement::BonusMult) => scoring.mult += 4,
            None => {}
        }
    }

    scoring
}

/// Rank value occurrence counts.
fn rank_counts(cards: &[Card]) -> AHashMap<u8, usize> {
    let mut counts = AHashMap::new();
    for card in cards {
        *counts.entry(card.rank.value()).or_insert(0) += 1;
    }
    counts
}

/// Cards matching any of the given rank values, in hand order.
fn cards_of_values(cards: &[Card], values: &[u8]) -> Vec<Card> {
    cards
        .iter()
        .filter(|c| values.contains(&c.rank.value()))
        .copied()
        .collect()
}

fn flush(cards: &[Card]) -> Option<Vec<Card>> {
    if cards.len() < 5 {
        return None;
    }

    let suit = cards[0].suit;
    cards
        .iter()
        .all(|c| c.suit == suit)
        .then(|| cards.to_vec())
}

fn straight(cards: &[Card]) -> Option<Vec<Card>> {
    if cards.len() < 5 {
        return None;
    }

    // Cards come sorted by descending value, with the ace graded 1 the
    // A-5-4-3-2 wheel is consecutive and the ace-high straight is not.
    cards
        .windows(2)
        .all(|w| w[0].rank.value() == w[1].rank.value() + 1)
        .then(|| cards.to_vec())
}

fn straight_flush(cards: &[Card]) -> Option<Vec<Card>> {
    straight(cards).and_then(|_| flush(cards))
}

fn royal_flush(cards: &[Card]) -> Option<Vec<Card>> {
    straight_flush(cards).filter(|scored| scored[0].rank == Rank::Ten)
}

fn five_of_a_kind(cards: &[Card]) -> Option<Vec<Card>> {
    rank_counts(cards)
        .iter()
        .find(|&(_, &n)| n == 5)
        .map(|(&v, _)| cards_of_values(cards, &[v]))
}

fn flush_five(cards: &[Card]) -> Option<Vec<Card>> {
    five_of_a_kind(cards).and_then(|_| flush(cards))
}

fn flush_house(cards: &[Card]) -> Option<Vec<Card>> {
    full_house(cards).and_then(|_| flush(cards))
}

fn four_of_a_kind(cards: &[Card]) -> Option<Vec<Card>> {
    rank_counts(cards)
        .iter()
        .find(|&(_, &n)| n == 4)
        .map(|(&v, _)| cards_of_values(cards, &[v]))
}

fn full_house(cards: &[Card]) -> Option<Vec<Card>> {
    let counts = rank_counts(cards);
    let three = counts.iter().find(|&(_, &n)| n == 3).map(|(&v, _)| v)?;
    let two = counts.iter().find(|&(_, &n)| n == 2).map(|(&v, _)| v)?;

    Some(cards_of_values(cards, &[three, two]))
}

fn three_of_a_kind(cards: &[Card]) -> Option<Vec<Card>> {
    rank_counts(cards)
        .iter()
        .find(|&(_, &n)| n == 3)
        .map(|(&v, _)| cards_of_values(cards, &[v]))
}

fn two_pair(cards: &[Card]) -> Option<Vec<Card>> {
    let counts = rank_counts(cards);
    let pairs = counts
        .iter()
        .filter(|&(_, &n)| n == 2)
        .map(|(&v, _)| v)
        .collect::<Vec<_>>();

    (pairs.len() == 2).then(|| cards_of_values(cards, &pairs))
}

fn pair(cards: &[Card]) -> Option<Vec<Card>> {
    let counts = rank_counts(cards);

    // Score the highest pair if more than one is present.
    counts
        .iter()
        .filter(|&(_, &n)| n == 2)
        .map(|(&v, _)| v)
        .max()
        .map(|v| cards_of_values(cards, &[v]))
}

fn high_card(cards: &[Card]) -> Option<Vec<Card>> {
    // Cards are sorted by descending value, score the first one.
    Some(vec![cards[0]])
}
