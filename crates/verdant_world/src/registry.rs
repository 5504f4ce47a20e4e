//! Static content registry.
//!
//! Assembled once during process initialization and immutable afterwards.
//! Every polymorphic content type reachable from records (action kinds,
//! items, tiles, the stem reference) has a registered, globally unique
//! string tag; decoding checks the tag before the body is interpreted.

use std::collections::HashMap;

use crate::error::ChainError;
use crate::record::ActionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFamily {
    Action,
    Reference,
    Item,
    Tile,
}

const BUILTIN_TAGS: [(&str, ContentFamily); 15] = [
    ("ChunkGenesisAction", ContentFamily::Action),
    ("ClaimRealmAction", ContentFamily::Action),
    ("CreatePlotAction", ContentFamily::Action),
    ("SeedAction", ContentFamily::Action),
    ("GrowAction", ContentFamily::Action),
    ("HarvestAction", ContentFamily::Action),
    ("IntroductionAction", ContentFamily::Action),
    ("RegionBlockReference", ContentFamily::Reference),
    ("Seed", ContentFamily::Item),
    ("HarvestedPlant", ContentFamily::Item),
    ("RealmClaimPaper", ContentFamily::Item),
    ("Hoe", ContentFamily::Item),
    ("IntroductionGift", ContentFamily::Item),
    ("DefaultTile", ContentFamily::Tile),
    ("Plot", ContentFamily::Tile),
];

#[derive(Debug)]
pub struct ContentRegistry {
    tags: HashMap<&'static str, ContentFamily>,
}

impl ContentRegistry {
    /// Builds the registry from the built-in tag table, rejecting duplicate
    /// registrations.
    pub fn builtin() -> Result<Self, ChainError> {
        let mut tags = HashMap::new();
        for (tag, family) in BUILTIN_TAGS {
            if tags.insert(tag, family).is_some() {
                return Err(ChainError::DuplicateContentTag {
                    tag: tag.to_string(),
                });
            }
        }
        Ok(Self { tags })
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    pub fn family(&self, tag: &str) -> Option<ContentFamily> {
        self.tags.get(tag).copied()
    }

    pub fn encode_record(&self, record: &ActionRecord) -> Result<Vec<u8>, ChainError> {
        Ok(serde_json::to_vec(record)?)
    }

    /// Decodes a signed record, checking the content tag against the
    /// registry before interpreting the body.
    pub fn decode_record(&self, bytes: &[u8]) -> Result<ActionRecord, ChainError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        let tag = value
            .get("content")
            .and_then(|content| content.get("kind"))
            .and_then(|kind| kind.as_str())
            .ok_or_else(|| ChainError::Serde(
                "record content is missing the kind discriminator".to_string(),
            ))?;
        match self.family(tag) {
            Some(ContentFamily::Action) | Some(ContentFamily::Reference) => {}
            _ => {
                return Err(ChainError::UnknownContentTag {
                    tag: tag.to_string(),
                });
            }
        }
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{GrowAction, RecordContent};
    use crate::crypto::Keyring;
    use crate::record::{seal_record, Timestamp};
    use crate::world::{Coordinate, Tile};

    fn sample_record(keyring: &Keyring) -> ActionRecord {
        seal_record(
            Timestamp(5),
            keyring,
            RecordContent::Grow(GrowAction {
                plot: Tile::Plot {
                    x: Coordinate(1),
                    y: Coordinate(1),
                    plant: None,
                },
            }),
        )
        .expect("seal")
    }

    #[test]
    fn builtin_registry_knows_all_families() {
        let registry = ContentRegistry::builtin().expect("registry");
        assert_eq!(registry.family("GrowAction"), Some(ContentFamily::Action));
        assert_eq!(
            registry.family("RegionBlockReference"),
            Some(ContentFamily::Reference)
        );
        assert_eq!(registry.family("Hoe"), Some(ContentFamily::Item));
        assert_eq!(registry.family("Plot"), Some(ContentFamily::Tile));
        assert!(!registry.is_registered("FutureAction"));
    }

    #[test]
    fn record_roundtrip_through_the_registry() {
        let registry = ContentRegistry::builtin().expect("registry");
        let keyring = Keyring::generate();
        let record = sample_record(&keyring);

        let bytes = registry.encode_record(&record).expect("encode");
        let decoded = registry.decode_record(&bytes).expect("decode");
        assert_eq!(decoded, record);
    }

    #[test]
    fn unregistered_content_tag_is_rejected() {
        let registry = ContentRegistry::builtin().expect("registry");
        let bytes = br#"{"timestamp":1,"author":"x","content":{"kind":"FutureAction"},"hash":"h","signature":"s"}"#;
        let err = registry.decode_record(bytes).expect_err("must fail");
        assert!(matches!(err, ChainError::UnknownContentTag { .. }));
    }

    #[test]
    fn item_tag_is_not_valid_record_content() {
        let registry = ContentRegistry::builtin().expect("registry");
        let bytes =
            br#"{"timestamp":1,"author":"x","content":{"kind":"Hoe"},"hash":"h","signature":"s"}"#;
        let err = registry.decode_record(bytes).expect_err("must fail");
        assert!(matches!(err, ChainError::UnknownContentTag { .. }));
    }
}
