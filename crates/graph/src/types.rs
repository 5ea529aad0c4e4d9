use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use threadmap_protocol::RelationType;

/// Related threads of one thread, split by strength tier.
///
/// Unknown tier keys are rejected so a typo in a committed map surfaces as an
/// invalid map instead of silently dropping edges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationTiers {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub directly_related: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub often_related: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub occasionally_related: Vec<String>,
}

/// Thread name -> its relation tiers. Ordered so serialized output is stable.
pub type RelationshipMap = BTreeMap<String, RelationTiers>;

impl RelationTiers {
    pub fn tier(&self, relation: RelationType) -> &[String] {
        match relation {
            RelationType::DirectlyRelated => &self.directly_related,
            RelationType::OftenRelated => &self.often_related,
            RelationType::OccasionallyRelated => &self.occasionally_related,
        }
    }

    pub fn tier_mut(&mut self, relation: RelationType) -> &mut Vec<String> {
        match relation {
            RelationType::DirectlyRelated => &mut self.directly_related,
            RelationType::OftenRelated => &mut self.often_related,
            RelationType::OccasionallyRelated => &mut self.occasionally_related,
        }
    }

    pub fn push(&mut self, relation: RelationType, thread: impl Into<String>) {
        self.tier_mut(relation).push(thread.into());
    }

    pub fn is_empty(&self) -> bool {
        RelationType::ALL.iter().all(|rel| self.tier(*rel).is_empty())
    }

    /// `(relation, thread)` pairs, strongest tier first, list order within a tier.
    pub fn iter(&self) -> impl Iterator<Item = (RelationType, &str)> + '_ {
        RelationType::ALL
            .into_iter()
            .flat_map(move |rel| self.tier(rel).iter().map(move |t| (rel, t.as_str())))
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
