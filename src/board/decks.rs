//! Per-type draw and discard piles.

use std::collections::{BTreeMap, VecDeque};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::player::Effect;
use super::types::{CardOp, CardOpKind};
use crate::engine::models::{Card, CardType, Player};

#[derive(Debug, Clone, Default)]
struct Pile {
    draw: VecDeque<Card>,
    discard: Vec<Card>,
}

/// Outcome of one card op against a player's hand.
#[derive(Debug, Clone, Default)]
pub struct CardOpOutcome {
    pub drawn: Vec<Card>,
    pub removed: Vec<Card>,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Clone)]
pub struct Decks {
    piles: BTreeMap<CardType, Pile>,
    rng: StdRng,
}

impl Decks {
    pub fn new(cards: &[Card], seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut piles: BTreeMap<CardType, Pile> = BTreeMap::new();
        for card in cards {
            piles
                .entry(card.card_type)
                .or_default()
                .draw
                .push_back(card.clone());
        }
        for pile in piles.values_mut() {
            pile.draw.make_contiguous().shuffle(&mut rng);
        }
        Self { piles, rng }
    }

    pub fn remaining(&self, card_type: CardType) -> usize {
        self.piles.get(&card_type).map(|p| p.draw.len()).unwrap_or(0)
    }

    pub fn discarded(&self, card_type: CardType) -> usize {
        self.piles.get(&card_type).map(|p| p.discard.len()).unwrap_or(0)
    }

    /// Draw up to `count` cards, reshuffling the discards once the pile runs dry.
    pub fn draw(&mut self, card_type: CardType, count: u32) -> Vec<Card> {
        let pile = self.piles.entry(card_type).or_default();
        let mut drawn = Vec::with_capacity(count as usize);
        for _ in 0..count {
            if pile.draw.is_empty() && !pile.discard.is_empty() {
                pile.discard.shuffle(&mut self.rng);
                pile.draw.extend(pile.discard.drain(..));
                tracing::debug!(card_type = %card_type, size = pile.draw.len(), "reshuffled discard pile");
            }
            match pile.draw.pop_front() {
                Some(card) => drawn.push(card),
                None => {
                    tracing::warn!(
                        card_type = %card_type,
                        requested = count,
                        drawn = drawn.len(),
                        "deck exhausted"
                    );
                    break;
                }
            }
        }
        drawn
    }

    pub fn discard(&mut self, cards: impl IntoIterator<Item = Card>) {
        for card in cards {
            self.piles
                .entry(card.card_type)
                .or_default()
                .discard
                .push(card);
        }
    }

    pub fn return_to_bottom(&mut self, cards: impl IntoIterator<Item = Card>) {
        for card in cards {
            self.piles
                .entry(card.card_type)
                .or_default()
                .draw
                .push_back(card);
        }
    }

    /// Pull the given cards out of the draw and discard piles so they can go
    /// back into a hand. Returns the cards found.
    pub fn reclaim(&mut self, card_type: CardType, card_ids: &[String]) -> Vec<Card> {
        let Some(pile) = self.piles.get_mut(&card_type) else {
            return Vec::new();
        };
        let mut found = Vec::with_capacity(card_ids.len());
        for id in card_ids {
            if let Some(pos) = pile.discard.iter().position(|c| &c.card_id == id) {
                found.push(pile.discard.remove(pos));
            } else if let Some(pos) = pile.draw.iter().position(|c| &c.card_id == id) {
                found.extend(pile.draw.remove(pos));
            } else {
                tracing::warn!(card_type = %card_type, card_id = %id, "card to reclaim is in neither pile");
            }
        }
        found
    }

    /// Resolve a card op against `player`'s hand. Removals take the most
    /// recently drawn cards first.
    pub fn resolve_op(&mut self, player: &Player, op: &CardOp) -> CardOpOutcome {
        let hand = player.hand(op.card_type);
        let take = (op.count as usize).min(hand.len());
        let newest: Vec<Card> = hand[hand.len() - take..].iter().rev().cloned().collect();

        let mut outcome = CardOpOutcome::default();
        match op.kind {
            CardOpKind::Draw => {
                outcome.drawn = self.draw(op.card_type, op.count);
            }
            CardOpKind::Discard => {
                outcome.removed = newest;
                self.discard(outcome.removed.clone());
            }
            CardOpKind::Return => {
                outcome.removed = newest;
                self.return_to_bottom(outcome.removed.clone());
            }
            CardOpKind::Replace => {
                outcome.removed = newest;
                self.discard(outcome.removed.clone());
                outcome.drawn = self.draw(op.card_type, take as u32);
            }
        }

        if !outcome.removed.is_empty() {
            outcome.effects.push(Effect::RemoveCards {
                card_type: op.card_type,
                card_ids: outcome.removed.iter().map(|c| c.card_id.clone()).collect(),
            });
        }
        if !outcome.drawn.is_empty() {
            outcome.effects.push(Effect::AddCards(outcome.drawn.clone()));
        }
        outcome
    }
}
