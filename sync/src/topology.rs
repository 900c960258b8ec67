//! Desired topology derivation.

use huntboard_protocol::WorkspaceSnapshot;
use std::collections::{BTreeMap, BTreeSet};

/// The channel layout a workspace wants to see on the remote platform:
/// one category per round, one voice channel per puzzle still being worked.
///
/// BTree containers keep derivation deterministic, and insertion collapses
/// duplicate names, so desired state never carries two entities with the
/// same name in one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredTopology {
    rounds: BTreeSet<String>,
    /// Channel name to the round (category) it belongs under. First
    /// insertion wins.
    channels: BTreeMap<String, String>,
}

impl DesiredTopology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive from a workspace aggregate, skipping puzzles whose status is
    /// terminal.
    pub fn from_snapshot(snapshot: &WorkspaceSnapshot) -> Self {
        let mut desired = Self::new();
        for round in &snapshot.rounds {
            desired.add_round(&round.name);
            for puzzle in &round.puzzles {
                if !puzzle.status.is_terminal() {
                    desired.add_channel(&puzzle.name, &round.name);
                }
            }
        }
        desired
    }

    pub fn add_round(&mut self, name: &str) {
        self.rounds.insert(name.to_owned());
    }

    /// Add a channel under a round. The round is added too, so every
    /// channel's parent is guaranteed to be in [`Self::rounds`].
    pub fn add_channel(&mut self, name: &str, round: &str) {
        self.rounds.insert(round.to_owned());
        self.channels
            .entry(name.to_owned())
            .or_insert_with(|| round.to_owned());
    }

    pub fn rounds(&self) -> &BTreeSet<String> {
        &self.rounds
    }

    pub fn channels(&self) -> &BTreeMap<String, String> {
        &self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty() && self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huntboard_protocol::{Puzzle, PuzzleStatus, Round, WorkspaceSnapshot};

    fn puzzle(name: &str, status: PuzzleStatus) -> Puzzle {
        Puzzle {
            id: format!("id-{name}"),
            name: name.to_owned(),
            status,
            answer: None,
        }
    }

    fn snapshot(rounds: Vec<Round>) -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            id: "w1".to_owned(),
            name: "Hunt".to_owned(),
            rounds,
            activity: Vec::new(),
        }
    }

    #[test]
    fn solved_puzzles_are_excluded() {
        let desired = DesiredTopology::from_snapshot(&snapshot(vec![Round {
            id: "r1".to_owned(),
            name: "Round 1".to_owned(),
            puzzles: vec![
                puzzle("Alpha", PuzzleStatus::Open),
                puzzle("Beta", PuzzleStatus::Solved),
            ],
        }]));

        assert!(desired.rounds().contains("Round 1"));
        assert!(desired.channels().contains_key("Alpha"));
        assert!(!desired.channels().contains_key("Beta"));
    }

    #[test]
    fn duplicate_names_collapse() {
        let mut desired = DesiredTopology::new();
        desired.add_channel("Alpha", "Round 1");
        desired.add_channel("Alpha", "Round 2");

        assert_eq!(desired.channels().len(), 1);
        assert_eq!(desired.channels()["Alpha"], "Round 1");
        // Both rounds still exist as categories.
        assert_eq!(desired.rounds().len(), 2);
    }

    #[test]
    fn a_round_with_only_solved_puzzles_keeps_its_category() {
        let desired = DesiredTopology::from_snapshot(&snapshot(vec![Round {
            id: "r1".to_owned(),
            name: "Round 1".to_owned(),
            puzzles: vec![puzzle("Alpha", PuzzleStatus::Solved)],
        }]));

        assert!(desired.rounds().contains("Round 1"));
        assert!(desired.channels().is_empty());
    }
}
