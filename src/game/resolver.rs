//! Turn resolution: movement first, then simultaneous combat

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use super::battleground::{Battleground, Position};
use super::character::Action;
use super::error::GameError;
use super::r#match::{CharacterSetup, MatchSetup, PlayerActions, PlayerSlot, TurnRecord};
use super::snapshot::Snapshot;

type CharacterKey = (PlayerSlot, usize);

/// Derives the next snapshot from the previous one and a turn's actions
pub struct TurnResolver<'a> {
    setup: &'a MatchSetup,
    grid: Battleground,
}

impl<'a> TurnResolver<'a> {
    pub fn new(setup: &'a MatchSetup, grid: Battleground) -> Self {
        Self { setup, grid }
    }

    pub fn resolve(&self, prior: &Snapshot, turn: &TurnRecord) -> Result<Snapshot, GameError> {
        if prior.outcome().is_some() {
            return Err(GameError::MatchAlreadyCompleted);
        }

        let expected = prior.turn + 1;
        if turn.number != expected {
            return Err(GameError::InvalidTurnNumber {
                expected,
                provided: turn.number,
            });
        }

        let mut planned: BTreeMap<CharacterKey, Action> = BTreeMap::new();
        for slot in PlayerSlot::ALL {
            for (index, action) in self.plan_roster(prior, slot, turn.actions(slot))? {
                planned.insert((slot, index), action);
            }
        }

        let mut next = prior.clone();
        next.turn = turn.number;

        for slot in PlayerSlot::ALL {
            for character in next.roster_mut(slot).characters.iter_mut() {
                if character.is_defeated() {
                    *character = character.defeated();
                }
            }
        }

        self.resolve_movement(&mut next, &planned)?;
        self.resolve_combat(&mut next, &planned)?;

        Ok(next)
    }

    /// Setup stats of a roster entry
    fn stats(&self, slot: PlayerSlot, index: usize) -> Result<&CharacterSetup, GameError> {
        self.setup
            .roster(slot)
            .characters
            .get(index)
            .ok_or_else(|| missing_character(slot, index))
    }

    /// Match each living character to exactly one parsed action
    fn plan_roster(
        &self,
        prior: &Snapshot,
        slot: PlayerSlot,
        submitted: &PlayerActions,
    ) -> Result<Vec<(usize, Action)>, GameError> {
        let roster = prior.roster(slot);
        let mut assigned: Vec<Option<Action>> = vec![None; roster.characters.len()];

        for (entry, submission) in submitted.actions.iter().enumerate() {
            let index = submission.character.unwrap_or(entry);

            let state = prior
                .character(slot, index)
                .ok_or_else(|| missing_character(slot, index))?;
            if state.is_defeated() {
                return Err(GameError::MalformedTurnPayload(format!(
                    "{} character {} is defeated and cannot act",
                    slot.label(),
                    index
                )));
            }
            if assigned[index].is_some() {
                return Err(GameError::MalformedTurnPayload(format!(
                    "{} character {} has more than one action",
                    slot.label(),
                    index
                )));
            }

            let action = Action::parse(submission, &self.grid)?;
            if let Action::Move { to } = action {
                let reach = self.stats(slot, index)?.speed;
                if state.position.distance(&to) > reach {
                    return Err(GameError::InvalidAction(format!(
                        "{} character {} cannot reach ({}, {})",
                        slot.label(),
                        index,
                        to.x,
                        to.y
                    )));
                }
            }
            assigned[index] = Some(action);
        }

        let mut plan = Vec::with_capacity(assigned.len());
        for (index, action) in assigned.into_iter().enumerate() {
            match action {
                Some(action) => plan.push((index, action)),
                None if !roster.characters[index].is_defeated() => {
                    return Err(GameError::MalformedTurnPayload(format!(
                        "{} character {} has no action",
                        slot.label(),
                        index
                    )));
                }
                None => {}
            }
        }

        Ok(plan)
    }

    /// Moves in fixed order; a mover whose destination is already taken stays put
    fn resolve_movement(
        &self,
        next: &mut Snapshot,
        planned: &BTreeMap<CharacterKey, Action>,
    ) -> Result<(), GameError> {
        let mut occupied: HashSet<Position> =
            next.characters().map(|(_, _, c)| c.position).collect();

        for (&(slot, index), action) in planned {
            let character = &mut next.roster_mut(slot).characters[index];

            if let Action::Move { to } = action {
                if *to != character.position && occupied.contains(to) {
                    debug!(
                        player = slot.label(),
                        character = index,
                        x = to.x,
                        y = to.y,
                        "Move blocked by occupied tile"
                    );
                    *character = character.with_label(action);
                    continue;
                }
                occupied.remove(&character.position);
                occupied.insert(*to);
            }

            *character = character.apply_action(action, &self.grid)?;
        }

        Ok(())
    }

    /// Attacks land against post-movement positions. All damage is summed
    /// before it is applied, so a character defeated this turn still strikes.
    fn resolve_combat(
        &self,
        next: &mut Snapshot,
        planned: &BTreeMap<CharacterKey, Action>,
    ) -> Result<(), GameError> {
        let tiles: HashMap<Position, CharacterKey> = next
            .characters()
            .map(|(slot, index, c)| (c.position, (slot, index)))
            .collect();

        let mut damage: BTreeMap<CharacterKey, u32> = BTreeMap::new();

        for (&(slot, index), action) in planned {
            let Action::Attack { target } = action else {
                continue;
            };
            let stats = self.stats(slot, index)?;
            let attacker = next
                .character(slot, index)
                .ok_or_else(|| missing_character(slot, index))?;

            if attacker.position.distance(target) > stats.range {
                continue;
            }

            let Some(&(target_slot, target_index)) = tiles.get(target) else {
                continue;
            };
            if target_slot == slot {
                continue;
            }
            let defender = &next.roster(target_slot).characters[target_index];
            if defender.is_defeated() {
                continue;
            }

            let total = damage.entry((target_slot, target_index)).or_insert(0);
            *total = total.saturating_add(stats.attack);
        }

        for ((slot, index), mut amount) in damage {
            if planned.get(&(slot, index)) == Some(&Action::Defend) {
                amount /= 2;
            }
            let character = &mut next.roster_mut(slot).characters[index];
            character.take_damage(amount);
            if character.is_defeated() {
                debug!(player = slot.label(), character = index, "Character defeated");
            }
        }

        Ok(())
    }
}

fn missing_character(slot: PlayerSlot, index: usize) -> GameError {
    GameError::MalformedTurnPayload(format!("{} has no character {}", slot.label(), index))
}
