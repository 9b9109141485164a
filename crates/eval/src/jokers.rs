// Copyright (C) 2025 Blindrush Developers
// SPDX-License-Identifier: Apache-2.0

//! The joker effect registry.
//!
//! Jokers live in a fixed-capacity ordered slot array, slot value 0 means
//! empty. Slots are evaluated left to right and each occupied slot runs its
//! effect independently, so the same joker id in two slots triggers twice.
use log::warn;
use rand::Rng;
use serde::{Deserialize, Serialize};

use blindrush_cards::Card;

use crate::hand::Scoring;

/// Number of joker slots a player owns.
pub const JOKER_SLOTS: usize = 5;

/// A player's ordered joker slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JokerSlots([u32; JOKER_SLOTS]);

impl JokerSlots {
    /// Creates empty slots.
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot ids in evaluation order.
    pub fn ids(&self) -> &[u32; JOKER_SLOTS] {
        &self.0
    }

    /// Puts a joker in the first empty slot.
    ///
    /// Returns false when all slots are taken.
    pub fn add(&mut self, id: u32) -> bool {
        for slot in self.0.iter_mut() {
            if *slot == 0 {
                *slot = id;
                return true;
            }
        }

        false
    }

    /// Number of occupied slots.
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&id| id != 0).count()
    }
}

impl From<[u32; JOKER_SLOTS]> for JokerSlots {
    fn from(slots: [u32; JOKER_SLOTS]) -> Self {
        Self(slots)
    }
}

/// Applies the joker slots to the accumulator in slot order.
///
/// Returns the updated accumulator and a per-slot triggered flag. Empty
/// slots never trigger; unknown ids are logged and skipped.
pub fn apply_jokers<R: Rng>(
    cards: &[Card],
    slots: &JokerSlots,
    mut scoring: Scoring,
    rng: &mut R,
) -> (Scoring, [bool; JOKER_SLOTS]) {
    let mut triggered = [false; JOKER_SLOTS];

    for (slot, &id) in slots.ids().iter().enumerate() {
        if id == 0 {
            continue;
        }

        match apply_joker(id, cards, scoring, rng) {
            Some((updated, fired)) => {
                scoring = updated;
                triggered[slot] = fired;
            }
            None => warn!("Unknown joker id {id} in slot {slot}, skipped"),
        }
    }

    (scoring, triggered)
}

/// Runs a single joker effect, `None` for an unknown id.
fn apply_joker<R: Rng>(
    id: u32,
    cards: &[Card],
    scoring: Scoring,
    rng: &mut R,
) -> Option<(Scoring, bool)> {
    let res = match id {
        1 => flat_bonus(scoring),
        2 => seven_count(cards, scoring),
        3 => face_doubler(cards, scoring),
        4 => gold_digger(scoring),
        5 => long_shot(scoring, rng),
        6 => pip_counter(cards, scoring),
        7 => spade_stack(cards, scoring),
        8 => even_steven(cards, scoring),
        9 => odd_todd(cards, scoring),
        10 => economist(scoring),
        11 => high_roller(scoring),
        12 => quiet_hand(cards, scoring),
        _ => return None,
    };

    Some(res)
}

/// Joker 1: +7 chips and +7 mult.
fn flat_bonus(mut scoring: Scoring) -> (Scoring, bool) {
    scoring.chips += 7;
    scoring.mult += 7;
    (scoring, true)
}

/// Joker 2: +7 chips per seven played.
fn seven_count(cards: &[Card], mut scoring: Scoring) -> (Scoring, bool) {
    let sevens = cards.iter().filter(|c| c.rank.value() == 7).count() as i64;
    scoring.chips += 7 * sevens;
    (scoring, sevens > 0)
}

/// Joker 3: doubles mult when the hand has a face card.
fn face_doubler(cards: &[Card], mut scoring: Scoring) -> (Scoring, bool) {
    if cards.iter().any(|c| c.rank.is_face()) {
        scoring.mult *= 2;
        (scoring, true)
    } else {
        (scoring, false)
    }
}

/// Joker 4: +4 mult and +1 gold on every play.
fn gold_digger(mut scoring: Scoring) -> (Scoring, bool) {
    scoring.mult += 4;
    scoring.gold += 1;
    (scoring, true)
}

/// Joker 5: one chance in fifteen of +15 mult.
fn long_shot<R: Rng>(mut scoring: Scoring, rng: &mut R) -> (Scoring, bool) {
    if rng.random_range(0..15) == 0 {
        scoring.mult += 15;
        (scoring, true)
    } else {
        (scoring, false)
    }
}

/// Joker 6: +2 chips per pip card.
fn pip_counter(cards: &[Card], mut scoring: Scoring) -> (Scoring, bool) {
    let pips = cards
        .iter()
        .filter(|c| (2..=10).contains(&c.rank.value()))
        .count() as i64;
    scoring.chips += 2 * pips;
    (scoring, pips > 0)
}

/// Joker 7: +10 chips per spade.
fn spade_stack(cards: &[Card], mut scoring: Scoring) -> (Scoring, bool) {
    let spades = cards
        .iter()
        .filter(|c| c.suit == blindrush_cards::Suit::Spades)
        .count() as i64;
    scoring.chips += 10 * spades;
    (scoring, spades > 0)
}

/// Joker 8: +4 mult per even rank value.
fn even_steven(cards: &[Card], mut scoring: Scoring) -> (Scoring, bool) {
    let evens = cards.iter().filter(|c| c.rank.value() % 2 == 0).count() as i64;
    scoring.mult += 4 * evens;
    (scoring, evens > 0)
}

/// Joker 9: +3 chips per odd rank value, the low ace counts odd.
fn odd_todd(cards: &[Card], mut scoring: Scoring) -> (Scoring, bool) {
    let odds = cards.iter().filter(|c| c.rank.value() % 2 == 1).count() as i64;
    scoring.chips += 3 * odds;
    (scoring, odds > 0)
}

/// Joker 10: +1 mult per 2 gold held.
fn economist(mut scoring: Scoring) -> (Scoring, bool) {
    let bonus = scoring.gold.max(0) / 2;
    scoring.mult += bonus;
    (scoring, bonus > 0)
}

/// Joker 11: +20 chips when holding at least 20 gold.
fn high_roller(mut scoring: Scoring) -> (Scoring, bool) {
    if scoring.gold >= 20 {
        scoring.chips += 20;
        (scoring, true)
    } else {
        (scoring, false)
    }
}

/// Joker 12: +15 mult when the hand has no face cards.
fn quiet_hand(cards: &[Card], mut scoring: Scoring) -> (Scoring, bool) {
    if cards.iter().any(|c| c.rank.is_face()) {
        (scoring, false)
    } else {
        scoring.mult += 15;
        (scoring, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blindrush_cards::{Rank, Suit};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn straight_flush_nine() -> Vec<Card> {
        use Rank::*;
        [Nine, Eight, Seven, Six, Five]
            .into_iter()
            .map(|r| Card::new(r, Suit::Spades))
            .collect()
    }

    #[test]
    fn flat_bonus_joker_matches_table() {
        let cards = straight_flush_nine();
        let mut slots = JokerSlots::new();
        assert!(slots.add(1));

        let scoring = Scoring {
            chips: 50,
            mult: 40,
            gold: 0,
        };
        let (scoring, triggered) = apply_jokers(&cards, &slots, scoring, &mut rand::rng());

        assert_eq!(scoring.chips, 57);
        assert_eq!(scoring.mult, 47);
        assert_eq!(scoring.score(), 2679);
        assert_eq!(triggered, [true, false, false, false, false]);
    }

    #[test]
    fn same_joker_in_two_slots_runs_twice() {
        let cards = straight_flush_nine();
        let mut slots = JokerSlots::new();
        assert!(slots.add(1));
        assert!(slots.add(1));

        let scoring = Scoring::default();
        let (scoring, triggered) = apply_jokers(&cards, &slots, scoring, &mut rand::rng());

        assert_eq!(scoring.chips, 14);
        assert_eq!(scoring.mult, 14);
        assert_eq!(triggered, [true, true, false, false, false]);
    }

    #[test]
    fn empty_and_unknown_slots_are_skipped() {
        let cards = straight_flush_nine();
        let slots = JokerSlots::from([0, 999, 0, 1, 0]);

        let scoring = Scoring::default();
        let (scoring, triggered) = apply_jokers(&cards, &slots, scoring, &mut rand::rng());

        // Unknown id 999 is a no-op, joker 1 in slot 3 still runs.
        assert_eq!(scoring.chips, 7);
        assert_eq!(triggered, [false, false, false, true, false]);
    }

    #[test]
    fn conditional_jokers() {
        use Rank::*;
        let faces = vec![
            Card::new(King, Suit::Spades),
            Card::new(Queen, Suit::Hearts),
            Card::new(Nine, Suit::Clubs),
        ];
        let no_faces = straight_flush_nine();

        let base = Scoring {
            chips: 10,
            mult: 4,
            gold: 0,
        };

        let mut slots = JokerSlots::new();
        slots.add(3);

        let (scoring, triggered) = apply_jokers(&faces, &slots, base, &mut rand::rng());
        assert_eq!(scoring.mult, 8);
        assert!(triggered[0]);

        let (scoring, triggered) = apply_jokers(&no_faces, &slots, base, &mut rand::rng());
        assert_eq!(scoring.mult, 4);
        assert!(!triggered[0]);
    }

    #[test]
    fn probabilistic_joker_slots_draw_independently() {
        // With the same seeded rng two slots of the long shot joker consume
        // separate draws, their outcomes are the consecutive rng values.
        let cards = straight_flush_nine();
        let slots = JokerSlots::from([5, 5, 0, 0, 0]);

        let mut rng = StdRng::seed_from_u64(7);
        let expected = [rng.random_range(0..15) == 0, rng.random_range(0..15) == 0];

        let mut rng = StdRng::seed_from_u64(7);
        let (_, triggered) = apply_jokers(&cards, &slots, Scoring::default(), &mut rng);

        assert_eq!([triggered[0], triggered[1]], expected);
    }

    #[test]
    fn gold_based_jokers() {
        let cards = straight_flush_nine();

        let rich = Scoring {
            chips: 0,
            mult: 0,
            gold: 21,
        };

        let slots = JokerSlots::from([10, 11, 0, 0, 0]);
        let (scoring, triggered) = apply_jokers(&cards, &slots, rich, &mut rand::rng());
        assert_eq!(scoring.mult, 10);
        assert_eq!(scoring.chips, 20);
        assert_eq!(triggered, [true, true, false, false, false]);
    }

    #[test]
    fn slot_management() {
        let mut slots = JokerSlots::new();
        for _ in 0..JOKER_SLOTS {
            assert!(slots.add(2));
        }
        assert!(!slots.add(2));
        assert_eq!(slots.count(), JOKER_SLOTS);
        assert_eq!(slots.ids(), &[2; JOKER_SLOTS]);
    }
}
