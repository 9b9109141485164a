// Copyright (C) 2025 Blindrush Developers
// SPDX-License-Identifier: Apache-2.0

//! The deterministic shop generator.
//!
//! A shop instance is derived from the lobby id and the round number, so
//! every player in the lobby sees the same inventory without any of it
//! being stored between phases. Pack contents are derived from the pack
//! seed on first open and cached so that reopening a pack never changes
//! what it revealed.
use ahash::AHashMap;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::time::{Duration, Instant};
use xxhash_rust::xxh3::xxh3_64;

use blindrush_cards::{Card, Rank, Suit};
use blindrush_core::{
    error::ActionError,
    game::LobbyId,
    message::{PackContents, PackItem, ShopItem, ShopOffer},
};

/// Price to reroll the joker slots.
pub const REROLL_PRICE: i64 = 2;

/// Price of a modifier voucher.
const MODIFIER_PRICE: i64 = 2;

/// Number of rerollable joker slots.
const JOKER_SLOTS: usize = 3;

/// Packs on sale, inclusive range.
const PACKS: (u32, u32) = (2, 3);

/// Items revealed by a pack, inclusive range.
const PACK_ITEMS: (u32, u32) = (2, 4);

/// Modifier vouchers on sale, inclusive range.
const MODIFIERS: (u32, u32) = (1, 3);

/// How long cached pack contents stay valid.
const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Shop appearance weights per joker id.
const JOKER_WEIGHTS: [(u32, u32); 10] = [
    (1, 10),
    (2, 20),
    (3, 15),
    (4, 10),
    (5, 5),
    (6, 10),
    (7, 10),
    (8, 10),
    (9, 5),
    (10, 5),
];

/// Shop appearance weights per modifier id.
const MODIFIER_WEIGHTS: [(u32, u32); 4] = [(1, 30), (2, 27), (6, 23), (9, 20)];

/// The shop inventory for one round.
#[derive(Debug)]
pub struct ShopState {
    round: u32,
    /// Packs and modifier vouchers, fixed for the round.
    items: Vec<ShopItem>,
    /// Joker slots regenerated on every reroll.
    jokers: Vec<ShopItem>,
    rerolls: u32,
    next_item_id: u32,
    cache: AHashMap<(u32, u32, u32), CacheEntry>,
}

#[derive(Debug)]
struct CacheEntry {
    contents: PackContents,
    expires_at: Instant,
}

impl ShopState {
    /// Generates the shop inventory for a lobby round.
    pub fn generate(lobby_id: LobbyId, round: u32) -> Self {
        let mut rng = StdRng::seed_from_u64(shop_seed(lobby_id, round, 0));
        let mut next_item_id = 1;

        let mut items = Vec::new();
        for _ in 0..rng.random_range(PACKS.0..=PACKS.1) {
            let count = rng.random_range(PACK_ITEMS.0..=PACK_ITEMS.1);
            items.push(ShopItem {
                id: next_id(&mut next_item_id),
                price: count as i64 + 1,
                offer: ShopOffer::Pack {
                    seed: rng.random(),
                    items: count,
                },
            });
        }

        for _ in 0..rng.random_range(MODIFIERS.0..=MODIFIERS.1) {
            items.push(ShopItem {
                id: next_id(&mut next_item_id),
                price: MODIFIER_PRICE,
                offer: ShopOffer::Modifier {
                    modifier_id: weighted_id(&MODIFIER_WEIGHTS, &mut rng),
                },
            });
        }

        let jokers = roll_jokers(&mut rng, &mut next_item_id);

        Self {
            round,
            items,
            jokers,
            rerolls: 0,
            next_item_id,
            cache: AHashMap::new(),
        }
    }

    /// All items on sale, jokers last.
    pub fn items(&self) -> Vec<ShopItem> {
        self.items.iter().chain(self.jokers.iter()).cloned().collect()
    }

    /// Finds an item by id.
    pub fn find(&self, item_id: u32) -> Result<&ShopItem, ActionError> {
        self.items
            .iter()
            .chain(self.jokers.iter())
            .find(|item| item.id == item_id)
            .ok_or(ActionError::UnknownItem(item_id))
    }

    /// Regenerates the joker slots and returns the new ones.
    pub fn reroll(&mut self, lobby_id: LobbyId) -> Vec<ShopItem> {
        self.rerolls += 1;

        let seed = shop_seed(lobby_id, self.round, self.rerolls);
        let mut rng = StdRng::seed_from_u64(seed);
        self.jokers = roll_jokers(&mut rng, &mut self.next_item_id);

        self.jokers.clone()
    }

    /// The contents a pack reveals when opened.
    ///
    /// Contents for the same pack are cached, so opening the same pack
    /// again reveals the same items until the entry expires.
    pub fn pack_contents(&mut self, item_id: u32) -> Result<PackContents, ActionError> {
        let item = self.find(item_id)?;
        let ShopOffer::Pack { seed, items } = item.offer else {
            return Err(ActionError::ItemTypeMismatch(item_id, "pack"));
        };

        let key = (self.round, self.rerolls, item_id);
        if let Some(entry) = self.cache.get(&key) {
            if entry.expires_at > Instant::now() {
                return Ok(entry.contents.clone());
            }

            self.cache.remove(&key);
        }

        let contents = generate_pack_contents(seed, items);
        self.cache.insert(
            key,
            CacheEntry {
                contents: contents.clone(),
                expires_at: Instant::now() + CACHE_TTL,
            },
        );

        Ok(contents)
    }
}

/// The price of a joker in the shop, stronger effects cost more.
fn joker_price(joker_id: u32) -> i64 {
    match joker_id {
        1..=3 => 3,
        4..=7 => 5,
        _ => 8,
    }
}

/// The seed for a shop roll, stable across restarts.
fn shop_seed(lobby_id: LobbyId, round: u32, reroll: u32) -> u64 {
    xxh3_64(format!("{lobby_id}:shop:{round}:{reroll}").as_bytes())
}

fn next_id(next_item_id: &mut u32) -> u32 {
    let id = *next_item_id;
    *next_item_id += 1;
    id
}

/// Rolls the rerollable joker slots.
fn roll_jokers(rng: &mut StdRng, next_item_id: &mut u32) -> Vec<ShopItem> {
    (0..JOKER_SLOTS)
        .map(|_| {
            let joker_id = weighted_id(&JOKER_WEIGHTS, rng);
            ShopItem {
                id: next_id(next_item_id),
                price: joker_price(joker_id),
                offer: ShopOffer::Joker { joker_id },
            }
        })
        .collect()
}

/// Picks an id from a weight table.
fn weighted_id<R: Rng>(weights: &[(u32, u32)], rng: &mut R) -> u32 {
    let total = weights.iter().map(|(_, w)| w).sum::<u32>();
    let mut roll = rng.random_range(0..total);

    for (id, weight) in weights {
        if roll < *weight {
            return *id;
        }
        roll -= weight;
    }

    weights[weights.len() - 1].0
}

/// Generates pack contents from the pack seed.
fn generate_pack_contents(seed: u64, items: u32) -> PackContents {
    let mut rng = StdRng::seed_from_u64(seed);

    let items = (0..items)
        .map(|_| match rng.random_range(0..100u32) {
            // Cards are the most common reveal, one in four is enhanced.
            0..60 => {
                let rank = Rank::ranks().nth(rng.random_range(0..13)).unwrap();
                let suit = Suit::suits().nth(rng.random_range(0..4)).unwrap();
                let card = if rng.random_range(0..4) == 0 {
                    Card::with_enhancement(rank, suit, rng.random_range(1..=2))
                } else {
                    Card::new(rank, suit)
                };
                PackItem::Card { card }
            }
            60..85 => PackItem::Joker {
                joker_id: weighted_id(&JOKER_WEIGHTS, &mut rng),
            },
            _ => PackItem::Voucher {
                modifier_id: weighted_id(&MODIFIER_WEIGHTS, &mut rng),
            },
        })
        .collect();

    PackContents { items }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_lobby_and_round_generate_the_same_shop() {
        let lobby_id = LobbyId::new_id();

        let shop1 = ShopState::generate(lobby_id, 3);
        let shop2 = ShopState::generate(lobby_id, 3);
        assert_eq!(shop1.items(), shop2.items());
        assert!(!shop1.items().is_empty());

        // Another round rolls a different seed.
        let shop3 = ShopState::generate(lobby_id, 4);
        assert_ne!(shop1.items(), shop3.items());
    }

    #[test]
    fn inventory_respects_the_configured_ranges() {
        let shop = ShopState::generate(LobbyId::new_id(), 1);

        let packs = shop
            .items()
            .into_iter()
            .filter_map(|item| match item.offer {
                ShopOffer::Pack { items, .. } => Some((item.price, items)),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert!((PACKS.0..=PACKS.1).contains(&(packs.len() as u32)));
        for (price, items) in packs {
            assert!((PACK_ITEMS.0..=PACK_ITEMS.1).contains(&items));
            assert_eq!(price, items as i64 + 1);
        }

        let jokers = shop
            .items()
            .into_iter()
            .filter(|item| matches!(item.offer, ShopOffer::Joker { .. }))
            .count();
        assert_eq!(jokers, JOKER_SLOTS);

        // Item ids are unique within the shop.
        let mut ids = shop.items().iter().map(|i| i.id).collect::<Vec<_>>();
        ids.dedup();
        assert_eq!(ids.len(), shop.items().len());
    }

    #[test]
    fn joker_prices_follow_the_tiers() {
        assert_eq!(joker_price(1), 3);
        assert_eq!(joker_price(3), 3);
        assert_eq!(joker_price(4), 5);
        assert_eq!(joker_price(7), 5);
        assert_eq!(joker_price(8), 8);
        assert_eq!(joker_price(12), 8);
    }

    #[test]
    fn pack_contents_are_cached() {
        let mut shop = ShopState::generate(LobbyId::new_id(), 2);
        let pack_id = shop
            .items()
            .into_iter()
            .find(|item| matches!(item.offer, ShopOffer::Pack { .. }))
            .unwrap()
            .id;

        let contents = shop.pack_contents(pack_id).unwrap();
        assert!(!contents.items.is_empty());

        // Reopening reveals the identical contents.
        assert_eq!(shop.pack_contents(pack_id).unwrap(), contents);

        // Opening a non pack item is rejected.
        let joker_id = shop
            .items()
            .into_iter()
            .find(|item| matches!(item.offer, ShopOffer::Joker { .. }))
            .unwrap()
            .id;
        assert_eq!(
            shop.pack_contents(joker_id),
            Err(ActionError::ItemTypeMismatch(joker_id, "pack"))
        );
        assert_eq!(shop.pack_contents(999), Err(ActionError::UnknownItem(999)));
    }

    #[test]
    fn reroll_replaces_only_the_joker_slots() {
        let lobby_id = LobbyId::new_id();
        let mut shop = ShopState::generate(lobby_id, 1);

        let fixed = shop.items.clone();
        let old_ids = shop.jokers.iter().map(|i| i.id).collect::<Vec<_>>();

        let jokers = shop.reroll(lobby_id);
        assert_eq!(jokers.len(), JOKER_SLOTS);
        assert_eq!(shop.items, fixed);

        // Rerolled slots get fresh item ids.
        for item in &jokers {
            assert!(!old_ids.contains(&item.id));
            assert!(shop.find(item.id).is_ok());
        }
        for id in old_ids {
            assert!(shop.find(id).is_err());
        }

        // Rerolls are deterministic per lobby, round and reroll counter.
        let mut shop2 = ShopState::generate(lobby_id, 1);
        let jokers2 = shop2.reroll(lobby_id);
        assert_eq!(
            jokers.iter().map(|i| i.offer.clone()).collect::<Vec<_>>(),
            jokers2.iter().map(|i| i.offer.clone()).collect::<Vec<_>>(),
        );
    }

    #[test]
    fn weighted_ids_stay_in_the_table() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let id = weighted_id(&JOKER_WEIGHTS, &mut rng);
            assert!(JOKER_WEIGHTS.iter().any(|(i, _)| *i == id));

            let id = weighted_id(&MODIFIER_WEIGHTS, &mut rng);
            assert!(MODIFIER_WEIGHTS.iter().any(|(i, _)| *i == id));
        }
    }
}
