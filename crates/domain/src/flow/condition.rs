use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::{Deserialize, Serialize};

use super::desc::FlowConditionDesc;
use super::error::FlowError;
use super::flow_match::FlowMatch;
use super::packet::Packet;

/// Longest accepted flow condition name.
pub const CONDITION_NAME_MAX: usize = 31;

/// Effect of [`FlowCondition::set_match`] on the stored match set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchChange {
    Added,
    Changed,
}

/// Verdict of evaluating a flow condition against one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionResult {
    /// The match with this index was the first to accept the packet.
    Matched(u16),
    /// The condition has matches and none accepted the packet.
    Unmatched,
    /// The condition has no match and therefore accepts everything.
    MatchedAll,
}

impl ConditionResult {
    pub fn is_match(self) -> bool {
        !matches!(self, Self::Unmatched)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Matched(_) => "matched",
            Self::Unmatched => "unmatched",
            Self::MatchedAll => "matched_all",
        }
    }
}

/// Named set of flow matches keyed by their index.
///
/// Matches are evaluated in ascending index order and the first one that
/// accepts a packet wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FlowConditionDesc", into = "FlowConditionDesc")]
pub struct FlowCondition {
    name: String,
    matches: BTreeMap<u16, FlowMatch>,
}

impl FlowCondition {
    pub fn new(name: impl Into<String>) -> Result<Self, FlowError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            name,
            matches: BTreeMap::new(),
        })
    }

    /// Build from an external descriptor, validating the name and every
    /// match.
    pub fn create(desc: &FlowConditionDesc) -> Result<Self, FlowError> {
        let mut cond = Self::new(desc.name.clone())?;
        let matches = desc
            .matches
            .iter()
            .map(FlowMatch::create)
            .collect::<Result<Vec<_>, _>>()?;
        cond.set_matches(matches)?;
        Ok(cond)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Matches in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = &FlowMatch> {
        self.matches.values()
    }

    /// Insert or replace the match at `fm.index()`. Returns `None` when an
    /// identical match was already stored.
    pub fn set_match(&mut self, fm: FlowMatch) -> Option<MatchChange> {
        match self.matches.entry(fm.index()) {
            Entry::Vacant(slot) => {
                slot.insert(fm);
                Some(MatchChange::Added)
            }
            Entry::Occupied(mut slot) => {
                if *slot.get() == fm {
                    None
                } else {
                    slot.insert(fm);
                    Some(MatchChange::Changed)
                }
            }
        }
    }

    pub fn get_match(&self, index: u16) -> Option<&FlowMatch> {
        self.matches.get(&index)
    }

    pub fn remove_match(&mut self, index: u16) -> Option<FlowMatch> {
        self.matches.remove(&index)
    }

    /// Replace the whole match set. A duplicate index anywhere in `list`
    /// rejects the call and leaves the condition untouched. Returns whether
    /// the stored content changed.
    pub fn set_matches(
        &mut self,
        list: impl IntoIterator<Item = FlowMatch>,
    ) -> Result<bool, FlowError> {
        let mut next = BTreeMap::new();
        for fm in list {
            let index = fm.index();
            if next.insert(index, fm).is_some() {
                return Err(FlowError::DuplicateIndex { index });
            }
        }
        if next == self.matches {
            return Ok(false);
        }
        self.matches = next;
        Ok(true)
    }

    /// First match, in index order, that accepts the packet.
    pub fn first_match(&self, packet: &Packet) -> Option<&FlowMatch> {
        self.matches.values().find(|fm| fm.matches(packet))
    }

    pub fn evaluate(&self, packet: &Packet) -> ConditionResult {
        if self.matches.is_empty() {
            return ConditionResult::MatchedAll;
        }
        self.first_match(packet)
            .map_or(ConditionResult::Unmatched, |fm| {
                ConditionResult::Matched(fm.index())
            })
    }

    /// True if the packet satisfies this condition. An empty condition
    /// accepts every packet.
    pub fn matches(&self, packet: &Packet) -> bool {
        self.evaluate(packet).is_match()
    }

    pub fn to_desc(&self) -> FlowConditionDesc {
        FlowConditionDesc {
            name: self.name.clone(),
            matches: self.matches.values().map(FlowMatch::to_desc).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a FlowCondition {
    type Item = &'a FlowMatch;
    type IntoIter = std::collections::btree_map::Values<'a, u16, FlowMatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.values()
    }
}

impl TryFrom<FlowConditionDesc> for FlowCondition {
    type Error = FlowError;

    fn try_from(desc: FlowConditionDesc) -> Result<Self, Self::Error> {
        Self::create(&desc)
    }
}

impl From<FlowCondition> for FlowConditionDesc {
    fn from(cond: FlowCondition) -> Self {
        cond.to_desc()
    }
}

impl std::fmt::Display for FlowCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} matches)", self.name, self.matches.len())
    }
}

fn validate_name(name: &str) -> Result<(), FlowError> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.len() > CONDITION_NAME_MAX {
        Some("longer than 31 characters")
    } else if name.starts_with('_') {
        Some("must not start with '_'")
    } else if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        Some("only ASCII letters, digits and '_' are allowed")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(FlowError::InvalidConditionName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
