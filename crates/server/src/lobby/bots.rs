// Copyright (C) 2025 Blindrush Developers
// SPDX-License-Identifier: Apache-2.0

//! Bot decision helpers.
//!
//! Bots run inside the lobby task and go through the same action handlers
//! as connected players; these functions only pick what to do.
use rand::Rng;

use blindrush_cards::Card;
use blindrush_core::game::{MAX_BLIND, PLAY_SIZE};
use blindrush_eval::{HandCategory, best_hand};

/// Picks a blind proposal, between the base blind and twice the base.
pub fn propose_amount(base_blind: i64) -> i64 {
    let mut rng = rand::rng();
    (base_blind + rng.random_range(0..=base_blind)).min(MAX_BLIND)
}

/// Picks the five hand cards with the best base score.
pub fn best_play(hand: &[Card]) -> Vec<Card> {
    if hand.len() <= PLAY_SIZE {
        return hand.to_vec();
    }

    let mut best: Option<(i64, Vec<Card>)> = None;
    let n = hand.len();
    for a in 0..n {
        for b in a + 1..n {
            for c in b + 1..n {
                for d in c + 1..n {
                    for e in d + 1..n {
                        let cards = vec![hand[a], hand[b], hand[c], hand[d], hand[e]];
                        if let Some(hv) = best_hand(&cards) {
                            let score = hv.chips * hv.mult;
                            if best.as_ref().is_none_or(|(s, _)| score > *s) {
                                best = Some((score, cards));
                            }
                        }
                    }
                }
            }
        }
    }

    best.map(|(_, cards)| cards)
        .unwrap_or_else(|| hand[..PLAY_SIZE].to_vec())
}

/// Picks cards to throw away when the hand is weak.
///
/// Returns `None` when the best play is already worth keeping.
pub fn discard_candidates(hand: &[Card]) -> Option<Vec<Card>> {
    let play = best_play(hand);
    let hv = best_hand(&play)?;
    if !matches!(hv.category, HandCategory::HighCard | HandCategory::Pair) {
        return None;
    }

    // Throw away the lowest cards that do not score.
    let mut spare = hand.to_vec();
    for card in &hv.scored {
        if let Some(pos) = spare.iter().position(|c| c == card) {
            spare.remove(pos);
        }
    }
    spare.sort_by_key(|c| c.rank.value());
    spare.truncate(3);

    (!spare.is_empty()).then_some(spare)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blindrush_cards::{Rank, Suit};

    #[test]
    fn proposals_stay_in_range() {
        for _ in 0..100 {
            let amount = propose_amount(10);
            assert!((10..=20).contains(&amount));
        }

        assert_eq!(propose_amount(MAX_BLIND), MAX_BLIND);
    }

    #[test]
    fn best_play_finds_the_flush() {
        use Rank::*;
        let hand = vec![
            Card::new(Nine, Suit::Spades),
            Card::new(Deuce, Suit::Hearts),
            Card::new(Four, Suit::Spades),
            Card::new(King, Suit::Spades),
            Card::new(Seven, Suit::Diamonds),
            Card::new(Jack, Suit::Spades),
            Card::new(Trey, Suit::Clubs),
            Card::new(Six, Suit::Spades),
        ];

        let play = best_play(&hand);
        assert_eq!(play.len(), PLAY_SIZE);
        assert!(play.iter().all(|c| c.suit == Suit::Spades));
        assert_eq!(best_hand(&play).unwrap().category, HandCategory::Flush);

        // A short hand is played whole.
        assert_eq!(best_play(&hand[..3]), hand[..3].to_vec());
    }

    #[test]
    fn weak_hands_discard_low_cards() {
        use Rank::*;
        let hand = vec![
            Card::new(Deuce, Suit::Hearts),
            Card::new(Five, Suit::Spades),
            Card::new(Seven, Suit::Diamonds),
            Card::new(Nine, Suit::Clubs),
            Card::new(Jack, Suit::Spades),
            Card::new(King, Suit::Hearts),
            Card::new(Four, Suit::Diamonds),
            Card::new(Ten, Suit::Clubs),
        ];

        let discards = discard_candidates(&hand).unwrap();
        assert_eq!(discards.len(), 3);
        assert!(discards.contains(&Card::new(Deuce, Suit::Hearts)));
        assert!(discards.contains(&Card::new(Four, Suit::Diamonds)));

        // A strong hand keeps its cards.
        let hand = vec![
            Card::new(Nine, Suit::Spades),
            Card::new(Nine, Suit::Hearts),
            Card::new(Nine, Suit::Clubs),
            Card::new(Five, Suit::Spades),
            Card::new(Five, Suit::Hearts),
        ];
        assert!(discard_candidates(&hand).is_none());
    }
}
