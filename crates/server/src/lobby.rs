// Copyright (C) 2025 Blindrush Developers
// SPDX-License-Identifier: Apache-2.0

//! Lobby state types.
//!
//! Each lobby runs as a task that owns all of its state; connections and
//! timers talk to it through a command channel, so every transition runs
//! on one task and a phase can never advance twice for the same trigger.
use ahash::AHashSet;
use anyhow::{Result, bail};
use log::{error, info};
use std::time::{Duration, Instant};
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    time,
};

use blindrush_cards::Card;
use blindrush_core::{
    error::ActionError,
    game::{Gold, LobbyId, MAX_BLIND, MAX_GAME_ROUNDS, PLAY_SIZE, base_blind},
    message::{ClientEvent, PackItem, ServerEvent, ShopOffer},
};
use blindrush_eval::{JOKER_SLOTS, Modifier, ReceivedModifier, best_hand};

use crate::{
    db::Db,
    shop::{REROLL_PRICE, ShopState},
};

mod bots;
mod player;

use player::PlayerSession;

/// Lobby game parameters.
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// Seats at this lobby, bots included.
    pub seats: usize,
    /// Seats taken by bots.
    pub bots: usize,
    /// Rounds before the game ends with a winner.
    pub max_rounds: u32,
    /// Blind proposal phase timeout.
    pub blind_timeout: Duration,
    /// Play phase timeout.
    pub play_timeout: Duration,
    /// Shop phase timeout.
    pub shop_timeout: Duration,
    /// Vouchers phase timeout.
    pub vouchers_timeout: Duration,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            seats: 3,
            bots: 0,
            max_rounds: MAX_GAME_ROUNDS,
            blind_timeout: Duration::from_secs(20),
            play_timeout: Duration::from_secs(120),
            shop_timeout: Duration::from_secs(60),
            vouchers_timeout: Duration::from_secs(30),
        }
    }
}

/// Lobby state shared by all players who joined.
#[derive(Debug)]
pub struct Lobby {
    /// This lobby identifier.
    lobby_id: LobbyId,
    /// Channel for sending commands.
    commands_tx: mpsc::Sender<LobbyCommand>,
}

/// A message sent to player connections.
#[derive(Debug)]
pub enum LobbyMessage {
    /// Sends an event to a client.
    Send(ServerEvent),
    /// The receiver is no longer part of the lobby.
    PlayerLeft,
}

/// Command for the lobby task.
#[derive(Debug)]
enum LobbyCommand {
    /// Join this lobby.
    Join {
        username: String,
        lobby_tx: mpsc::Sender<LobbyMessage>,
        resp_tx: oneshot::Sender<Result<()>>,
    },
    /// Leave this lobby.
    Leave(String),
    /// Handle a player event.
    Event { username: String, event: ClientEvent },
    /// Check if a game is in progress.
    HasGameStarted(oneshot::Sender<bool>),
}

impl Lobby {
    /// Creates a new lobby that manages players and game state.
    pub fn new(
        config: LobbyConfig,
        db: Db,
        shutdown_broadcast_rx: broadcast::Receiver<()>,
        shutdown_complete_tx: mpsc::Sender<()>,
    ) -> Self {
        // There must be at least 2 seats and room for one human.
        assert!(config.seats > 1);
        assert!(config.bots < config.seats);

        let (commands_tx, commands_rx) = mpsc::channel(128);

        let mut task = LobbyTask {
            lobby_id: LobbyId::new_id(),
            config,
            db,
            commands_rx,
            shutdown_broadcast_rx,
            _shutdown_complete_tx: shutdown_complete_tx,
        };

        let lobby_id = task.lobby_id;
        tokio::spawn(async move {
            task.run().await;
            info!("Lobby task for lobby {} stopped", task.lobby_id);
        });

        Self {
            lobby_id,
            commands_tx,
        }
    }

    /// This lobby identifier.
    pub fn lobby_id(&self) -> LobbyId {
        self.lobby_id
    }

    /// A player joins this lobby.
    ///
    /// Returns an error if the lobby is full, the username is taken, or a
    /// game is in progress.
    pub async fn join(&self, username: &str, lobby_tx: mpsc::Sender<LobbyMessage>) -> Result<()> {
        let (resp_tx, resp_rx) = oneshot::channel();

        self.commands_tx
            .send(LobbyCommand::Join {
                username: username.to_string(),
                lobby_tx,
                resp_tx,
            })
            .await?;

        resp_rx.await?
    }

    /// A player leaves the lobby.
    pub async fn leave(&self, username: &str) {
        let _ = self
            .commands_tx
            .send(LobbyCommand::Leave(username.to_string()))
            .await;
    }

    /// Handle an event from a player.
    pub async fn event(&self, username: &str, event: ClientEvent) {
        let _ = self
            .commands_tx
            .send(LobbyCommand::Event {
                username: username.to_string(),
                event,
            })
            .await;
    }

    /// Checks if a game is in progress.
    pub async fn has_game_started(&self) -> bool {
        let (resp_tx, resp_rx) = oneshot::channel();
        if self
            .commands_tx
            .send(LobbyCommand::HasGameStarted(resp_tx))
            .await
            .is_err()
        {
            return false;
        }

        resp_rx.await.unwrap_or(false)
    }
}

struct LobbyTask {
    /// This lobby identifier.
    lobby_id: LobbyId,
    /// Lobby game parameters.
    config: LobbyConfig,
    /// Game db.
    db: Db,
    /// Channel for receiving lobby commands.
    commands_rx: mpsc::Receiver<LobbyCommand>,
    /// Channel for listening shutdown notification.
    shutdown_broadcast_rx: broadcast::Receiver<()>,
    /// Sender that drops when this lobby is done.
    _shutdown_complete_tx: mpsc::Sender<()>,
}

impl LobbyTask {
    async fn run(&mut self) {
        let mut state = State::new(self.lobby_id, self.config.clone(), self.db.clone());
        let mut ticks = time::interval(Duration::from_millis(500));

        loop {
            tokio::select! {
                // Server is shutting down exit this task.
                _ = self.shutdown_broadcast_rx.recv() => break,
                _ = ticks.tick() => {
                    state.tick().await;
                }
                res = self.commands_rx.recv() => match res {
                    Some(LobbyCommand::Join { username, lobby_tx, resp_tx }) => {
                        let res = state.join(&username, lobby_tx).await;
                        let _ = resp_tx.send(res);
                    }
                    Some(LobbyCommand::Leave(username)) => {
                        state.leave(&username).await;
                    }
                    Some(LobbyCommand::Event { username, event }) => {
                        state.event(&username, event).await;
                    }
                    Some(LobbyCommand::HasGameStarted(resp_tx)) => {
                        let _ = resp_tx.send(!matches!(state.phase, Phase::WaitForPlayers));
                    }
                    None => break,
                },
            }
        }
    }
}

/// The lobby phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for players to fill the seats.
    WaitForPlayers,
    /// Players propose the round score target.
    Blind,
    /// Players play and discard hands.
    PlayRound,
    /// Players buy jokers, vouchers and packs.
    Shop,
    /// Players activate and send modifiers.
    Vouchers,
    /// The game ended with a winner.
    AnnounceWinner,
}

impl Phase {
    fn label(&self) -> &'static str {
        match self {
            Phase::WaitForPlayers => "wait for players",
            Phase::Blind => "blind",
            Phase::PlayRound => "play round",
            Phase::Shop => "shop",
            Phase::Vouchers => "vouchers",
            Phase::AnnounceWinner => "announce winner",
        }
    }
}

/// An armed phase timeout.
///
/// The phase and round it was armed for are kept so that a deadline that
/// fires after the phase already advanced is discarded.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    phase: Phase,
    round: u32,
    at: Instant,
}

/// Internal lobby state.
#[derive(Debug)]
struct State {
    lobby_id: LobbyId,
    config: LobbyConfig,
    db: Db,
    phase: Phase,
    round: u32,
    high_blind: i64,
    proposer: Option<String>,
    /// Players done with the current phase.
    completions: AHashSet<String>,
    deadline: Option<Deadline>,
    players: Vec<PlayerSession>,
    shop: Option<ShopState>,
}

impl State {
    fn new(lobby_id: LobbyId, config: LobbyConfig, db: Db) -> Self {
        let mut state = Self {
            lobby_id,
            config,
            db,
            phase: Phase::WaitForPlayers,
            round: 0,
            high_blind: 0,
            proposer: None,
            completions: AHashSet::new(),
            deadline: None,
            players: Vec::new(),
            shop: None,
        };

        state.add_bots();
        state
    }

    /// Seats the configured bots.
    fn add_bots(&mut self) {
        for n in 0..self.config.bots {
            // The receiver is dropped, bots never read their own events.
            let (lobby_tx, _) = mpsc::channel(1);
            let bot = PlayerSession::new(format!("bot-{}", n + 1), lobby_tx, true);
            self.players.push(bot);
        }
    }

    /// A player tries to join the lobby.
    async fn join(&mut self, username: &str, lobby_tx: mpsc::Sender<LobbyMessage>) -> Result<()> {
        if !matches!(self.phase, Phase::WaitForPlayers) {
            bail!("Game in progress");
        }

        if self.players.len() == self.config.seats {
            bail!("Lobby full");
        }

        if self.players.iter().any(|p| p.username == username) {
            bail!("Username already taken");
        }

        let player = PlayerSession::new(username.to_string(), lobby_tx, false);

        // Confirm the join to the player with who is already seated.
        let players = self.players.iter().map(|p| p.username.clone()).collect();
        player
            .send(ServerEvent::LobbyJoined {
                lobby_id: self.lobby_id,
                players,
            })
            .await;

        // The player is not seated yet so it won't get the broadcast.
        self.broadcast(ServerEvent::PlayerJoined {
            username: username.to_string(),
        })
        .await;

        self.players.push(player);

        info!("Player {username} joined lobby {}", self.lobby_id);

        // All seats taken, start the game.
        if self.players.len() == self.config.seats {
            self.enter_blind().await;
        }

        Ok(())
    }

    /// A player leaves the lobby.
    async fn leave(&mut self, username: &str) {
        let Some(pos) = self.players.iter().position(|p| p.username == username) else {
            return;
        };

        let player = self.players.remove(pos);
        let _ = player.lobby_tx.send(LobbyMessage::PlayerLeft).await;
        self.completions.remove(username);

        self.broadcast(ServerEvent::PlayerLeft {
            username: username.to_string(),
        })
        .await;

        info!("Player {username} left lobby {}", self.lobby_id);

        if matches!(self.phase, Phase::WaitForPlayers | Phase::AnnounceWinner) {
            return;
        }

        let humans = self.players.iter().filter(|p| !p.is_bot).count();
        if humans == 0 || self.players.len() <= 1 {
            self.enter_announce_winner().await;
        } else {
            // The leaver may have been the last player everyone waited on.
            self.maybe_advance().await;
        }
    }

    /// Handle an event from a player.
    async fn event(&mut self, username: &str, event: ClientEvent) {
        let res = match event {
            // Handled at the server before the player joins.
            ClientEvent::JoinLobby { .. } => Ok(()),
            ClientEvent::LeaveLobby => {
                self.leave(username).await;
                Ok(())
            }
            ClientEvent::ProposeBlind { amount } => self.propose_blind(username, amount).await,
            ClientEvent::PlayHand { cards } => self.play_hand(username, &cards).await,
            ClientEvent::DiscardCards { cards } => self.discard_cards(username, &cards).await,
            ClientEvent::BuyJoker { item_id, price } => {
                self.buy_joker(username, item_id, price).await
            }
            ClientEvent::BuyVoucher { item_id, price } => {
                self.buy_voucher(username, item_id, price).await
            }
            ClientEvent::OpenPack { item_id, price } => {
                self.open_pack(username, item_id, price).await
            }
            ClientEvent::SelectPackItem { item_id, selection } => {
                self.select_pack_item(username, item_id, selection).await
            }
            ClientEvent::RerollShop => self.reroll_shop(username).await,
            ClientEvent::ShopDone => self.phase_done(username, Phase::Shop).await,
            ClientEvent::ActivateModifiers { ids } => {
                self.activate_modifiers(username, &ids).await
            }
            ClientEvent::SendModifiers { ids, targets } => {
                self.send_modifiers(username, &ids, &targets).await
            }
            ClientEvent::VouchersDone => self.phase_done(username, Phase::Vouchers).await,
        };

        // Rejected actions never mutate state, report them to the caller.
        if let Err(err) = res {
            self.send_to(
                username,
                ServerEvent::Error {
                    message: err.to_string(),
                },
            )
            .await;
        }
    }

    async fn tick(&mut self) {
        self.run_bots().await;

        let Some(deadline) = self.deadline else {
            return;
        };

        if Instant::now() < deadline.at {
            return;
        }

        self.deadline = None;

        // A deadline armed for an earlier phase or round is stale, the
        // phase already advanced through player completion.
        if deadline.phase != self.phase || deadline.round != self.round {
            return;
        }

        info!(
            "Lobby {} {} phase timed out in round {}",
            self.lobby_id,
            self.phase.label(),
            self.round
        );

        self.advance().await;
    }

    /// Arms the phase timeout for the current phase and round.
    fn set_deadline(&mut self, timeout: Duration) {
        self.deadline = Some(Deadline {
            phase: self.phase,
            round: self.round,
            at: Instant::now() + timeout,
        });
    }

    /// Marks a player done with the current phase.
    async fn complete(&mut self, username: &str) {
        self.completions.insert(username.to_string());
        self.maybe_advance().await;
    }

    /// Advances the phase when every player is done with it.
    async fn maybe_advance(&mut self) {
        let all_done = self
            .players
            .iter()
            .all(|p| self.completions.contains(&p.username));

        if all_done && !self.players.is_empty() {
            self.advance().await;
        }
    }

    /// Leaves the current phase for the next one.
    async fn advance(&mut self) {
        self.deadline = None;

        match self.phase {
            Phase::Blind => self.enter_play_round().await,
            Phase::PlayRound => self.end_play_round().await,
            Phase::Shop => self.enter_vouchers().await,
            Phase::Vouchers => self.enter_blind().await,
            Phase::WaitForPlayers | Phase::AnnounceWinner => {}
        }
    }

    /// Starts the blind proposal phase of the next round.
    async fn enter_blind(&mut self) {
        self.phase = Phase::Blind;
        self.round += 1;
        self.completions.clear();
        self.proposer = None;

        let base_blind = base_blind(self.round);
        self.high_blind = base_blind;
        for player in &mut self.players {
            player.bet_minimum = true;
        }

        self.set_deadline(self.config.blind_timeout);

        info!(
            "Lobby {} starting round {} with base blind {base_blind}",
            self.lobby_id, self.round
        );

        self.broadcast(ServerEvent::StartingBlind {
            round: self.round,
            base_blind,
        })
        .await;
    }

    /// A player proposes the round score target.
    async fn propose_blind(&mut self, username: &str, amount: i64) -> Result<(), ActionError> {
        self.require_phase(Phase::Blind)?;

        let base = base_blind(self.round);
        let player = self.player(username)?;

        // Proposals below the base are raised to it; a player betting
        // above the minimum is held to the full high blind at round end.
        let amount = if amount <= base {
            base
        } else {
            player.bet_minimum = false;
            amount.min(MAX_BLIND)
        };

        if amount > self.high_blind {
            self.high_blind = amount;
            self.proposer = Some(username.to_string());
            self.broadcast(ServerEvent::BlindUpdated {
                high_blind: amount,
                proposer: username.to_string(),
            })
            .await;
        }

        self.complete(username).await;
        Ok(())
    }

    /// Starts the play phase, dealing a fresh hand to every player.
    async fn enter_play_round(&mut self) {
        self.phase = Phase::PlayRound;
        self.completions.clear();
        self.set_deadline(self.config.play_timeout);

        info!(
            "Lobby {} round {} playing with high blind {}",
            self.lobby_id, self.round, self.high_blind
        );

        let round = self.round;
        let high_blind = self.high_blind;
        for idx in 0..self.players.len() {
            let expired = self.players[idx].start_round();
            let player = &self.players[idx];

            if !expired.is_empty() {
                player.send(ServerEvent::ModifiersExpired { ids: expired }).await;
            }

            player
                .send(ServerEvent::StartingRound {
                    round,
                    high_blind,
                    hand: player.hand.clone(),
                    gold: player.gold.amount(),
                    plays_left: player.plays_left,
                    discards_left: player.discards_left,
                })
                .await;
        }
    }

    /// A player plays a hand of five cards.
    async fn play_hand(&mut self, username: &str, cards: &[Card]) -> Result<(), ActionError> {
        self.require_phase(Phase::PlayRound)?;

        if cards.len() != PLAY_SIZE {
            return Err(ActionError::InvalidPlaySize(PLAY_SIZE));
        }

        let Some(hv) = best_hand(cards) else {
            return Err(ActionError::InvalidPlaySize(PLAY_SIZE));
        };

        let high_blind = self.high_blind;
        let player = self.player(username)?;
        if player.plays_left == 0 {
            return Err(ActionError::NoPlaysLeft);
        }

        player.take_from_hand(cards)?;
        let outcome = player.score_play(cards, hv, high_blind);

        if !outcome.expired.is_empty() {
            player
                .send(ServerEvent::ModifiersExpired {
                    ids: outcome.expired.clone(),
                })
                .await;
        }

        let hand = player.hand.clone();
        let discards_left = player.discards_left;
        let played = ServerEvent::PlayedHand {
            username: username.to_string(),
            hand_type: outcome.hand_type.to_string(),
            chips: outcome.chips,
            mult: outcome.mult,
            total_score: outcome.score,
            round_points: player.round_points,
            gold: player.gold.amount(),
            plays_left: player.plays_left,
            scored_cards: outcome.scored_cards,
            jokers_triggered: outcome.jokers_triggered,
        };

        self.broadcast(played).await;
        self.send_to(username, ServerEvent::NewCards {
            hand,
            discards_left,
        })
        .await;

        if outcome.finished {
            self.complete(username).await;
        }

        Ok(())
    }

    /// A player discards cards and draws replacements.
    async fn discard_cards(&mut self, username: &str, cards: &[Card]) -> Result<(), ActionError> {
        self.require_phase(Phase::PlayRound)?;

        if cards.is_empty() {
            return Err(ActionError::CardNotInHand);
        }

        let player = self.player(username)?;
        if player.discards_left == 0 {
            return Err(ActionError::NoDiscardsLeft);
        }

        player.take_from_hand(cards)?;
        player.deck.discard(cards.iter().copied());
        let drawn = player.draw_cards(cards.len());
        player.hand.extend(drawn);
        player.discards_left -= 1;

        let event = ServerEvent::NewCards {
            hand: player.hand.clone(),
            discards_left: player.discards_left,
        };
        self.send_to(username, event).await;

        Ok(())
    }

    /// Ends the play phase, eliminating players below their target.
    async fn end_play_round(&mut self) {
        let results = self
            .players
            .iter()
            .map(|p| (p.username.as_str(), p.round_points, p.bet_minimum))
            .collect::<Vec<_>>();
        let eliminated = eliminations(
            &results,
            base_blind(self.round),
            self.high_blind,
            self.proposer.as_deref(),
        );

        if !eliminated.is_empty() {
            info!(
                "Lobby {} round {} eliminated {eliminated:?}",
                self.lobby_id, self.round
            );

            self.broadcast(ServerEvent::PlayersEliminated {
                usernames: eliminated.clone(),
                round: self.round,
            })
            .await;

            let mut stats = Vec::new();
            for username in &eliminated {
                let Some(pos) = self.players.iter().position(|p| &p.username == username) else {
                    continue;
                };

                let player = self.players.remove(pos);
                self.completions.remove(username);
                stats.push(player.stats(self.round));
                let _ = player.lobby_tx.send(LobbyMessage::PlayerLeft).await;
            }

            if let Err(e) = self.db.update(stats).await {
                error!("Db players update failed {e}");
            }
        }

        if self.players.len() <= 1 || self.round >= self.config.max_rounds {
            self.enter_announce_winner().await;
        } else {
            self.enter_shop().await;
        }
    }

    /// Starts the shop phase with a freshly generated inventory.
    async fn enter_shop(&mut self) {
        self.phase = Phase::Shop;
        self.completions.clear();
        self.set_deadline(self.config.shop_timeout);

        let shop = ShopState::generate(self.lobby_id, self.round);
        let items = shop.items();
        self.shop = Some(shop);

        self.broadcast(ServerEvent::StartingShop {
            round: self.round,
            items,
            reroll_price: REROLL_PRICE,
        })
        .await;
    }

    /// A player buys a joker from the shop.
    async fn buy_joker(
        &mut self,
        username: &str,
        item_id: u32,
        price: i64,
    ) -> Result<(), ActionError> {
        self.require_phase(Phase::Shop)?;

        let item = self.shop()?.find(item_id)?.clone();
        let ShopOffer::Joker { joker_id } = item.offer else {
            return Err(ActionError::ItemTypeMismatch(item_id, "joker"));
        };

        let player = self.player(username)?;
        check_payment(player.gold, price, item.price)?;
        if player.jokers.count() == JOKER_SLOTS {
            return Err(ActionError::JokerSlotsFull);
        }

        player.jokers.add(joker_id);
        player.gold -= Gold::new(item.price);
        let gold = player.gold.amount();

        self.broadcast(ServerEvent::ItemPurchased {
            username: username.to_string(),
            item_id,
            gold,
        })
        .await;

        Ok(())
    }

    /// A player buys a modifier voucher from the shop.
    async fn buy_voucher(
        &mut self,
        username: &str,
        item_id: u32,
        price: i64,
    ) -> Result<(), ActionError> {
        self.require_phase(Phase::Shop)?;

        let item = self.shop()?.find(item_id)?.clone();
        let ShopOffer::Modifier { modifier_id } = item.offer else {
            return Err(ActionError::ItemTypeMismatch(item_id, "modifier"));
        };

        let player = self.player(username)?;
        check_payment(player.gold, price, item.price)?;

        player.owned.push(Modifier::new(modifier_id));
        player.gold -= Gold::new(item.price);
        let gold = player.gold.amount();

        self.broadcast(ServerEvent::ItemPurchased {
            username: username.to_string(),
            item_id,
            gold,
        })
        .await;

        Ok(())
    }

    /// A player buys a pack and reveals its contents.
    async fn open_pack(
        &mut self,
        username: &str,
        item_id: u32,
        price: i64,
    ) -> Result<(), ActionError> {
        self.require_phase(Phase::Shop)?;

        let item = self.shop()?.find(item_id)?.clone();
        if !matches!(item.offer, ShopOffer::Pack { .. }) {
            return Err(ActionError::ItemTypeMismatch(item_id, "pack"));
        }

        let player = self.player(username)?;
        check_payment(player.gold, price, item.price)?;

        let contents = self.shop_mut()?.pack_contents(item_id)?;

        let player = self.player(username)?;
        player.gold -= Gold::new(item.price);
        player.last_pack = Some(item_id);
        let gold = player.gold.amount();

        self.broadcast(ServerEvent::ItemPurchased {
            username: username.to_string(),
            item_id,
            gold,
        })
        .await;
        self.send_to(username, ServerEvent::PackOpened { item_id, contents })
            .await;

        Ok(())
    }

    /// A player keeps one item from the pack they just opened.
    async fn select_pack_item(
        &mut self,
        username: &str,
        item_id: u32,
        selection: PackItem,
    ) -> Result<(), ActionError> {
        self.require_phase(Phase::Shop)?;

        if self.player(username)?.last_pack != Some(item_id) {
            return Err(ActionError::NoPackPurchased);
        }

        // The cache guarantees the contents match what was revealed.
        let contents = self.shop_mut()?.pack_contents(item_id)?;
        if !contents.items.contains(&selection) {
            return Err(ActionError::NotInPack);
        }

        let player = self.player(username)?;
        match &selection {
            PackItem::Card { card } => player.pack_cards.push(*card),
            PackItem::Joker { joker_id } => {
                if player.jokers.count() == JOKER_SLOTS {
                    return Err(ActionError::JokerSlotsFull);
                }
                player.jokers.add(*joker_id);
            }
            PackItem::Voucher { modifier_id } => player.owned.push(Modifier::new(*modifier_id)),
        }
        player.last_pack = None;

        self.send_to(username, ServerEvent::PackSelected { item_id, selection })
            .await;

        Ok(())
    }

    /// A player pays to regenerate the joker slots.
    async fn reroll_shop(&mut self, username: &str) -> Result<(), ActionError> {
        self.require_phase(Phase::Shop)?;

        let player = self.player(username)?;
        check_payment(player.gold, REROLL_PRICE, REROLL_PRICE)?;
        player.gold -= Gold::new(REROLL_PRICE);
        let gold = player.gold.amount();

        let lobby_id = self.lobby_id;
        let jokers = self.shop_mut()?.reroll(lobby_id);

        self.send_to(username, ServerEvent::ShopRerolled { jokers, gold })
            .await;

        Ok(())
    }

    /// Starts the vouchers phase.
    async fn enter_vouchers(&mut self) {
        self.phase = Phase::Vouchers;
        self.completions.clear();
        self.shop = None;
        self.set_deadline(self.config.vouchers_timeout);

        let players = self.players.iter().map(|p| p.username.clone()).collect();
        self.broadcast(ServerEvent::StartingVouchers { players }).await;
    }

    /// A player activates owned modifiers on themselves.
    async fn activate_modifiers(&mut self, username: &str, ids: &[u32]) -> Result<(), ActionError> {
        self.require_phase(Phase::Vouchers)?;

        let player = self.player(username)?;
        let moved = take_owned(player, ids)?;
        player.activated.extend(moved);

        Ok(())
    }

    /// A player sends owned modifiers to other players.
    async fn send_modifiers(
        &mut self,
        username: &str,
        ids: &[u32],
        targets: &[String],
    ) -> Result<(), ActionError> {
        self.require_phase(Phase::Vouchers)?;

        for target in targets {
            if target == username || !self.players.iter().any(|p| &p.username == target) {
                return Err(ActionError::UnknownPlayer(target.clone()));
            }
        }

        let player = self.player(username)?;
        let moved = take_owned(player, ids)?;

        for target in targets {
            let received = moved
                .iter()
                .map(|modifier| ReceivedModifier {
                    modifier: *modifier,
                    sender: username.to_string(),
                })
                .collect::<Vec<_>>();

            if let Ok(target) = self.player(target) {
                target.received.extend(received);
            }

            self.send_to(
                target,
                ServerEvent::ModifiersReceived {
                    from: username.to_string(),
                    ids: ids.to_vec(),
                },
            )
            .await;
        }

        Ok(())
    }

    /// A player is done with the shop or vouchers phase.
    async fn phase_done(&mut self, username: &str, phase: Phase) -> Result<(), ActionError> {
        self.require_phase(phase)?;
        self.player(username)?;
        self.complete(username).await;

        Ok(())
    }

    /// Ends the game, persists statistics and resets the lobby.
    async fn enter_announce_winner(&mut self) {
        self.phase = Phase::AnnounceWinner;
        self.deadline = None;
        self.shop = None;

        let points = self
            .players
            .iter()
            .map(|p| p.total_points)
            .max()
            .unwrap_or_default();
        let winners = self
            .players
            .iter()
            .filter(|p| p.total_points == points)
            .map(|p| p.username.clone())
            .collect::<Vec<_>>();

        info!(
            "Lobby {} game over, winners {winners:?} with {points} points",
            self.lobby_id
        );

        self.broadcast(ServerEvent::GameEnd { winners, points }).await;

        let stats = self.players.iter().map(|p| p.stats(self.round)).collect();
        if let Err(e) = self.db.update(stats).await {
            error!("Db players update failed {e}");
        }

        for player in &self.players {
            let _ = player.lobby_tx.send(LobbyMessage::PlayerLeft).await;
        }

        self.players.clear();
        self.completions.clear();
        self.proposer = None;
        self.round = 0;
        self.phase = Phase::WaitForPlayers;
        self.add_bots();
    }

    /// Runs one action for every bot that is not done with the phase.
    async fn run_bots(&mut self) {
        if matches!(self.phase, Phase::WaitForPlayers | Phase::AnnounceWinner) {
            return;
        }

        let bots = self
            .players
            .iter()
            .filter(|p| p.is_bot && !self.completions.contains(&p.username))
            .map(|p| p.username.clone())
            .collect::<Vec<_>>();

        for username in bots {
            // The phase may advance while earlier bots act.
            if matches!(self.phase, Phase::WaitForPlayers | Phase::AnnounceWinner) {
                break;
            }

            if let Err(err) = self.run_bot(&username).await {
                error!("Lobby {} bot {username} action failed {err}", self.lobby_id);
            }
        }
    }

    /// Runs one phase action for a bot through the player handlers.
    async fn run_bot(&mut self, username: &str) -> Result<(), ActionError> {
        match self.phase {
            Phase::Blind => {
                let amount = bots::propose_amount(base_blind(self.round));
                self.propose_blind(username, amount).await
            }
            Phase::PlayRound => {
                let player = self.player(username)?;
                if player.plays_left == 0 {
                    return Ok(());
                }

                let hand = player.hand.clone();
                if player.discards_left > 0 {
                    if let Some(cards) = bots::discard_candidates(&hand) {
                        return self.discard_cards(username, &cards).await;
                    }
                }

                let cards = bots::best_play(&hand);
                self.play_hand(username, &cards).await
            }
            Phase::Shop => {
                let player = self.player(username)?;
                let gold = player.gold.amount();

                if player.jokers.count() < JOKER_SLOTS {
                    let pick = self.shop()?.items().into_iter().find(|item| {
                        matches!(item.offer, ShopOffer::Joker { .. }) && item.price <= gold
                    });

                    if let Some(item) = pick {
                        self.buy_joker(username, item.id, item.price).await?;
                    }
                }

                self.phase_done(username, Phase::Shop).await
            }
            Phase::Vouchers => {
                let ids = self
                    .player(username)?
                    .owned
                    .iter()
                    .map(|m| m.id)
                    .collect::<Vec<_>>();
                if !ids.is_empty() {
                    self.activate_modifiers(username, &ids).await?;
                }

                self.phase_done(username, Phase::Vouchers).await
            }
            Phase::WaitForPlayers | Phase::AnnounceWinner => Ok(()),
        }
    }

    fn require_phase(&self, phase: Phase) -> Result<(), ActionError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(ActionError::WrongPhase(self.phase.label()))
        }
    }

    fn player(&mut self, username: &str) -> Result<&mut PlayerSession, ActionError> {
        self.players
            .iter_mut()
            .find(|p| p.username == username)
            .ok_or_else(|| ActionError::UnknownPlayer(username.to_string()))
    }

    fn shop(&self) -> Result<&ShopState, ActionError> {
        self.shop
            .as_ref()
            .ok_or(ActionError::WrongPhase(self.phase.label()))
    }

    fn shop_mut(&mut self) -> Result<&mut ShopState, ActionError> {
        let label = self.phase.label();
        self.shop.as_mut().ok_or(ActionError::WrongPhase(label))
    }

    /// Broadcast an event to all players at the lobby.
    async fn broadcast(&self, event: ServerEvent) {
        for player in &self.players {
            player.send(event.clone()).await;
        }
    }

    /// Send an event to one player.
    async fn send_to(&self, username: &str, event: ServerEvent) {
        if let Some(player) = self.players.iter().find(|p| p.username == username) {
            player.send(event).await;
        }
    }
}

/// Validates a purchase before any state changes.
fn check_payment(gold: Gold, offered: i64, expected: i64) -> Result<(), ActionError> {
    if offered != expected {
        return Err(ActionError::PriceMismatch { offered, expected });
    }

    if gold.amount() < expected {
        return Err(ActionError::InsufficientFunds {
            need: expected,
            have: gold.amount(),
        });
    }

    Ok(())
}

/// Moves modifiers out of a player's owned set.
///
/// Fails without moving anything if any id is not owned.
fn take_owned(player: &mut PlayerSession, ids: &[u32]) -> Result<Vec<Modifier>, ActionError> {
    let mut owned = player.owned.clone();
    let mut moved = Vec::with_capacity(ids.len());

    for id in ids {
        let Some(pos) = owned.iter().position(|m| m.id == *id) else {
            return Err(ActionError::ModifierNotOwned(*id));
        };
        moved.push(owned.remove(pos));
    }

    player.owned = owned;
    Ok(moved)
}

/// Who is eliminated at the end of a round.
///
/// The high blind proposer is checked first: if they missed their own
/// target only they are out. Otherwise everyone else is held to their
/// personal target, the base blind for players who bet the minimum and
/// the high blind for the rest.
fn eliminations(
    players: &[(&str, i64, bool)],
    base_blind: i64,
    high_blind: i64,
    proposer: Option<&str>,
) -> Vec<String> {
    if let Some(proposer) = proposer {
        if let Some((username, round_points, _)) =
            players.iter().find(|(username, _, _)| *username == proposer)
        {
            if *round_points < high_blind {
                return vec![username.to_string()];
            }
        }
    }

    players
        .iter()
        .filter(|(username, _, _)| Some(*username) != proposer)
        .filter(|(_, round_points, bet_minimum)| {
            let target = if *bet_minimum { base_blind } else { high_blind };
            *round_points < target
        })
        .map(|(username, _, _)| username.to_string())
        .collect()
}
