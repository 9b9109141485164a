// Copyright (C) 2025 Blindrush Developers
// SPDX-License-Identifier: Apache-2.0

//! The modifier and voucher effect registry.
//!
//! Modifiers carry a remaining-uses counter (-1 means unlimited until game
//! end). Most run on every hand play; a few only fire at round start and are
//! exempt from the per-play decrement.
use log::warn;
use rand::Rng;
use serde::{Deserialize, Serialize};

use blindrush_cards::Card;

use crate::hand::{HandCategory, Scoring, best_hand};

/// Modifier ids that run at round start instead of on every play.
const ROUND_START_IDS: [u32; 1] = [10];

/// Default number of uses for a newly obtained modifier.
pub const DEFAULT_USES: i32 = 3;

/// A modifier owned or received by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifier {
    /// The effect table id.
    pub id: u32,
    /// Remaining uses, -1 for unlimited.
    pub left_uses: i32,
}

impl Modifier {
    /// Creates a modifier with the default number of uses.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            left_uses: DEFAULT_USES,
        }
    }

    /// Checks if this modifier runs at round start only.
    pub fn is_round_start(&self) -> bool {
        ROUND_START_IDS.contains(&self.id)
    }
}

/// A modifier sent by another player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedModifier {
    /// The modifier.
    pub modifier: Modifier,
    /// Username of the player who sent it.
    pub sender: String,
}

/// Applies a set of per-play modifiers to the accumulator, in set order.
///
/// Round-start modifiers in the set are skipped; unknown ids are logged and
/// skipped.
pub fn apply_modifiers<R: Rng>(
    cards: &[Card],
    modifiers: &[Modifier],
    mut scoring: Scoring,
    rng: &mut R,
) -> Scoring {
    for modifier in modifiers {
        if modifier.id == 0 || modifier.is_round_start() {
            continue;
        }

        match apply_modifier(modifier.id, cards, scoring, rng) {
            Some(updated) => scoring = updated,
            None => warn!("Unknown modifier id {}, skipped", modifier.id),
        }
    }

    scoring
}

/// Applies round-start modifiers and decrements their uses.
///
/// Returns the updated gold and the ids of modifiers that expired and were
/// removed from the set.
pub fn apply_round_modifiers(modifiers: &mut Vec<Modifier>, mut gold: i64) -> (i64, Vec<u32>) {
    for modifier in modifiers.iter_mut() {
        if !modifier.is_round_start() {
            continue;
        }

        match modifier.id {
            10 => gold += 5,
            id => {
                warn!("Unknown round modifier id {id}, skipped");
                continue;
            }
        }

        if modifier.left_uses > 0 {
            modifier.left_uses -= 1;
        }
    }

    let removed = modifiers
        .iter()
        .filter(|m| m.left_uses == 0)
        .map(|m| m.id)
        .collect::<Vec<_>>();
    modifiers.retain(|m| m.left_uses != 0);

    (gold, removed)
}

/// Decrements the uses left after a hand play and drops expired modifiers.
///
/// Unlimited and round-start modifiers are exempt. Returns the ids of the
/// modifiers removed so the holder can be notified.
pub fn decrement_uses(modifiers: &mut Vec<Modifier>) -> Vec<u32> {
    for modifier in modifiers.iter_mut() {
        if modifier.left_uses > 0 && !modifier.is_round_start() {
            modifier.left_uses -= 1;
        }
    }

    let removed = modifiers
        .iter()
        .filter(|m| m.left_uses == 0)
        .map(|m| m.id)
        .collect::<Vec<_>>();
    modifiers.retain(|m| m.left_uses != 0);

    removed
}

/// As [apply_round_modifiers] for a received modifier set.
pub fn apply_round_modifiers_received(
    modifiers: &mut Vec<ReceivedModifier>,
    mut gold: i64,
) -> (i64, Vec<u32>) {
    for received in modifiers.iter_mut() {
        let modifier = &mut received.modifier;
        if !modifier.is_round_start() {
            continue;
        }

        match modifier.id {
            10 => gold += 5,
            id => {
                warn!("Unknown round modifier id {id}, skipped");
                continue;
            }
        }

        if modifier.left_uses > 0 {
            modifier.left_uses -= 1;
        }
    }

    let removed = modifiers
        .iter()
        .filter(|m| m.modifier.left_uses == 0)
        .map(|m| m.modifier.id)
        .collect::<Vec<_>>();
    modifiers.retain(|m| m.modifier.left_uses != 0);

    (gold, removed)
}

/// As [decrement_uses] for a received modifier set.
pub fn decrement_received_uses(modifiers: &mut Vec<ReceivedModifier>) -> Vec<u32> {
    for received in modifiers.iter_mut() {
        let m = &mut received.modifier;
        if m.left_uses > 0 && !m.is_round_start() {
            m.left_uses -= 1;
        }
    }

    let removed = modifiers
        .iter()
        .filter(|m| m.modifier.left_uses == 0)
        .map(|m| m.modifier.id)
        .collect::<Vec<_>>();
    modifiers.retain(|m| m.modifier.left_uses != 0);

    removed
}

/// Runs a single per-play modifier effect, `None` for an unknown id.
fn apply_modifier<R: Rng>(
    id: u32,
    cards: &[Card],
    scoring: Scoring,
    rng: &mut R,
) -> Option<Scoring> {
    let scoring = match id {
        1 => halver(scoring),
        2 => coin_per_card(cards, scoring),
        3 => wild_swing(scoring, rng),
        4 => category_ban(cards, scoring, HandCategory::FourOfAKind),
        5 => category_ban(cards, scoring, HandCategory::Straight),
        6 => royalty_tax(cards, scoring),
        7 => crown_double(cards, scoring),
        8 => gold_drain(scoring),
        9 => black_suits(cards, scoring),
        _ => return None,
    };

    Some(scoring)
}

/// Modifier 1: halves chips and mult.
fn halver(mut scoring: Scoring) -> Scoring {
    scoring.chips /= 2;
    scoring.mult /= 2;
    scoring
}

/// Modifier 2: +1 gold per card played.
fn coin_per_card(cards: &[Card], mut scoring: Scoring) -> Scoring {
    scoring.gold += cards.len() as i64;
    scoring
}

/// Modifier 3: chips multiplied by a random factor between 0 and 2.
fn wild_swing<R: Rng>(mut scoring: Scoring, rng: &mut R) -> Scoring {
    scoring.chips *= rng.random_range(0..=2);
    scoring
}

/// Modifiers 4 and 5: a banned category scores zero for this play.
fn category_ban(cards: &[Card], mut scoring: Scoring, banned: HandCategory) -> Scoring {
    if best_hand(cards).is_some_and(|hv| hv.category == banned) {
        scoring.chips = 0;
        scoring.mult = 0;
    }
    scoring
}

/// Modifier 6: -14 mult per king or queen played.
fn royalty_tax(cards: &[Card], mut scoring: Scoring) -> Scoring {
    for card in cards {
        if matches!(card.rank.value(), 12 | 13) {
            scoring.mult -= 14;
        }
    }
    scoring
}

/// Modifier 7: mult doubled per ace or king played.
fn crown_double(cards: &[Card], mut scoring: Scoring) -> Scoring {
    for card in cards {
        if matches!(card.rank.value(), 1 | 13) {
            scoring.mult *= 2;
        }
    }
    scoring
}

/// Modifier 8: mult reduced by the holder's gold.
fn gold_drain(mut scoring: Scoring) -> Scoring {
    scoring.mult -= scoring.gold;
    scoring
}

/// Modifier 9: +1 gold, +10 chips and +2 mult per spade or club.
fn black_suits(cards: &[Card], mut scoring: Scoring) -> Scoring {
    for card in cards {
        if card.suit.is_black() {
            scoring.gold += 1;
            scoring.chips += 10;
            scoring.mult += 2;
        }
    }
    scoring
}

#[cfg(test)]
mod tests {
    use super::*;
    use blindrush_cards::{Rank, Suit};

    fn quads() -> Vec<Card> {
        use Rank::*;
        vec![
            Card::new(Nine, Suit::Spades),
            Card::new(Nine, Suit::Hearts),
            Card::new(Nine, Suit::Clubs),
            Card::new(Nine, Suit::Diamonds),
            Card::new(Five, Suit::Spades),
        ]
    }

    fn base() -> Scoring {
        Scoring {
            chips: 40,
            mult: 20,
            gold: 6,
        }
    }

    #[test]
    fn halver_and_gold_drain() {
        let cards = quads();
        let mods = vec![Modifier::new(1), Modifier::new(8)];

        let scoring = apply_modifiers(&cards, &mods, base(), &mut rand::rng());
        assert_eq!(scoring.chips, 20);
        assert_eq!(scoring.mult, 4);
        assert_eq!(scoring.gold, 6);
    }

    #[test]
    fn category_ban_zeroes_the_play() {
        let cards = quads();
        let mods = vec![Modifier::new(4)];

        let scoring = apply_modifiers(&cards, &mods, base(), &mut rand::rng());
        assert_eq!(scoring.chips, 0);
        assert_eq!(scoring.mult, 0);

        // A straight ban does not touch four of a kind.
        let mods = vec![Modifier::new(5)];
        let scoring = apply_modifiers(&cards, &mods, base(), &mut rand::rng());
        assert_eq!(scoring.chips, 40);
    }

    #[test]
    fn royalty_tax_and_crown_double() {
        use Rank::*;
        let cards = vec![
            Card::new(King, Suit::Spades),
            Card::new(Queen, Suit::Hearts),
            Card::new(Ace, Suit::Clubs),
            Card::new(Four, Suit::Spades),
            Card::new(Nine, Suit::Diamonds),
        ];

        let mods = vec![Modifier::new(6)];
        let scoring = apply_modifiers(&cards, &mods, base(), &mut rand::rng());
        assert_eq!(scoring.mult, 20 - 28);

        // One king and one ace double the mult twice.
        let mods = vec![Modifier::new(7)];
        let scoring = apply_modifiers(&cards, &mods, base(), &mut rand::rng());
        assert_eq!(scoring.mult, 80);
    }

    #[test]
    fn black_suits_and_coin_per_card() {
        let cards = quads();
        let mods = vec![Modifier::new(9), Modifier::new(2)];

        let scoring = apply_modifiers(&cards, &mods, base(), &mut rand::rng());
        // Two spades and a club in the hand.
        assert_eq!(scoring.chips, 70);
        assert_eq!(scoring.mult, 26);
        assert_eq!(scoring.gold, 6 + 3 + 5);
    }

    #[test]
    fn unknown_id_is_skipped() {
        let cards = quads();
        let mods = vec![Modifier::new(77), Modifier::new(9)];

        let scoring = apply_modifiers(&cards, &mods, base(), &mut rand::rng());
        assert_eq!(scoring.chips, 70);
    }

    #[test]
    fn uses_decrement_and_removal() {
        let mut mods = vec![
            Modifier { id: 6, left_uses: 1 },
            Modifier { id: 9, left_uses: -1 },
            Modifier { id: 10, left_uses: 2 },
            Modifier { id: 2, left_uses: 2 },
        ];

        let removed = decrement_uses(&mut mods);
        assert_eq!(removed, vec![6]);
        // Unlimited and round-start modifiers are untouched.
        assert_eq!(
            mods,
            vec![
                Modifier { id: 9, left_uses: -1 },
                Modifier { id: 10, left_uses: 2 },
                Modifier { id: 2, left_uses: 1 },
            ]
        );
    }

    #[test]
    fn round_start_income() {
        let mut mods = vec![Modifier { id: 10, left_uses: 1 }, Modifier::new(2)];

        let (gold, removed) = apply_round_modifiers(&mut mods, 10);
        assert_eq!(gold, 15);
        assert_eq!(removed, vec![10]);
        assert_eq!(mods, vec![Modifier::new(2)]);

        // Per-play modifiers never run at round start.
        let (gold, removed) = apply_round_modifiers(&mut mods, gold);
        assert_eq!(gold, 15);
        assert!(removed.is_empty());
    }
}
