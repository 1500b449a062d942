//! The fixed participant roster.
//!
//! The roster is static configuration, supplied at startup and never
//! persisted. It is the source of required participants for the
//! all-participants predicate.

use serde::{Deserialize, Serialize};

/// A tracked participant: opaque id plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
}

/// Ordered, fixed list of tracked participants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster(Vec<Participant>);

impl Roster {
    pub fn new(participants: Vec<Participant>) -> Self {
        Self(participants)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|p| p.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Participant> {
        self.0.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.0.iter()
    }
}

impl FromIterator<Participant> for Roster {
    fn from_iter<T: IntoIterator<Item = Participant>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
pub(crate) fn test_roster(ids: &[&str]) -> Roster {
    ids.iter()
        .map(|id| Participant {
            id: (*id).to_string(),
            name: id.to_uppercase(),
        })
        .collect()
}
