//! Player state transitions. Every mutation of a `Player` goes through
//! `apply_effect`, which the turn coordinator alone calls.

use crate::engine::models::{Card, CardType, Player, ResourceSnapshot, VisitType};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Money(i64),
    /// Days only move forward.
    Time(u32),
    AddCards(Vec<Card>),
    /// Remove the given card ids from the hand of one type.
    RemoveCards { card_type: CardType, card_ids: Vec<String> },
    MoveTo { space: String, visit_type: VisitType },
    TakeSnapshot,
    RestoreSnapshot,
    ClearSnapshot,
}

pub fn apply_effect(mut player: Player, effect: &Effect) -> Player {
    match effect {
        Effect::Money(delta) => player.money += delta,
        Effect::Time(days) => player.time_spent = player.time_spent.saturating_add(*days),
        Effect::AddCards(cards) => {
            for card in cards {
                player
                    .cards
                    .entry(card.card_type)
                    .or_default()
                    .push(card.clone());
            }
        }
        Effect::RemoveCards { card_type, card_ids } => {
            if let Some(hand) = player.cards.get_mut(card_type) {
                hand.retain(|c| !card_ids.contains(&c.card_id));
                if hand.is_empty() {
                    player.cards.remove(card_type);
                }
            }
        }
        Effect::MoveTo { space, visit_type } => {
            player.position = space.clone();
            player.visit_type = *visit_type;
        }
        Effect::TakeSnapshot => player.space_entry_snapshot = Some(player.snapshot()),
        Effect::RestoreSnapshot => {
            if let Some(ResourceSnapshot {
                money,
                time_spent,
                cards,
            }) = player.space_entry_snapshot.take()
            {
                player.money = money;
                player.time_spent = time_spent;
                player.cards = cards;
            }
        }
        Effect::ClearSnapshot => player.space_entry_snapshot = None,
    }
    player
}

pub fn apply_effects<'a>(player: Player, effects: impl IntoIterator<Item = &'a Effect>) -> Player {
    effects.into_iter().fold(player, apply_effect)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str, ct: CardType) -> Card {
        Card {
            card_id: id.into(),
            card_type: ct,
            card_name: id.into(),
            description: String::new(),
            money_effect: 0,
            time_effect: 0,
        }
    }

    #[test]
    fn test_money_and_time() {
        let p = Player::new("p1", "P1", "A", 100, 0);
        let p = apply_effects(p, &[Effect::Money(-150), Effect::Time(3), Effect::Time(2)]);
        assert_eq!(p.money, -50);
        assert_eq!(p.time_spent, 5);
    }

    #[test]
    fn test_cards_keep_draw_order() {
        let p = Player::new("p1", "P1", "A", 0, 0);
        let p = apply_effect(p, &Effect::AddCards(vec![card("W1", CardType::W), card("B1", CardType::B)]));
        let p = apply_effect(p, &Effect::AddCards(vec![card("W2", CardType::W)]));
        let ids: Vec<_> = p.hand(CardType::W).iter().map(|c| c.card_id.as_str()).collect();
        assert_eq!(ids, vec!["W1", "W2"]);

        let p = apply_effect(
            p,
            &Effect::RemoveCards { card_type: CardType::W, card_ids: vec!["W1".into()] },
        );
        assert_eq!(p.hand(CardType::W).len(), 1);
        assert_eq!(p.card_count(), 2);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let p = Player::new("p1", "P1", "A", 1000, 4);
        let p = apply_effects(
            p,
            &[
                Effect::TakeSnapshot,
                Effect::Money(-500),
                Effect::Time(10),
                Effect::AddCards(vec![card("W1", CardType::W)]),
                Effect::RestoreSnapshot,
            ],
        );
        assert_eq!(p.money, 1000);
        assert_eq!(p.time_spent, 4);
        assert_eq!(p.card_count(), 0);
        assert!(p.space_entry_snapshot.is_none());
    }

    #[test]
    fn test_restore_without_snapshot_is_noop() {
        let p = Player::new("p1", "P1", "A", 10, 1);
        let p = apply_effect(p, &Effect::RestoreSnapshot);
        assert_eq!(p.money, 10);
        assert_eq!(p.time_spent, 1);
    }

    #[test]
    fn test_move_to_sets_visit_type() {
        let p = Player::new("p1", "P1", "A", 0, 0);
        let p = apply_effect(
            p,
            &Effect::MoveTo { space: "B".into(), visit_type: VisitType::Subsequent },
        );
        assert_eq!(p.position, "B");
        assert_eq!(p.visit_type, VisitType::Subsequent);
    }
}
