// Shared data types for the card keeper

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Token replaced by the card value when composing the copied message
pub const CARD_PLACEHOLDER: &str = "{{card}}";

pub const DEFAULT_TEMPLATE: &str = "Redeem your code at the store page.\nCode: {{card}}";

pub const MIN_DUPLICATE_COUNT: u32 = 1;
pub const MAX_DUPLICATE_COUNT: u32 = 200;

/// Built-in card type used when no valid type survives sanitizing
pub struct DefaultType {
    pub id: &'static str,
    pub name: &'static str,
    /// Key the two-type schema stored this list under
    pub legacy_key: Option<&'static str>,
}

pub const DEFAULT_TYPES: [DefaultType; 2] = [
    DefaultType {
        id: "warranty",
        name: "Warranty",
        legacy_key: None,
    },
    DefaultType {
        id: "no-warranty",
        name: "No warranty",
        legacy_key: Some("noWarranty"),
    },
];

/// Id prefix for synthesized ids past the built-in positions
pub const FALLBACK_TYPE_ID: &str = "type";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardType {
    pub id: String,
    pub name: String,
    pub allow_duplicate: bool,
    pub duplicate_count: u32,
}

impl CardType {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            allow_duplicate: false,
            duplicate_count: MIN_DUPLICATE_COUNT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub value: String,
    pub copied: bool,
}

impl Card {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            copied: false,
        }
    }
}

/// The unit of synchronization: types, their card lists and templates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardStore {
    pub card_types: Vec<CardType>,
    pub cards: BTreeMap<String, Vec<Card>>,
    pub templates: BTreeMap<String, String>,
}

impl Default for CardStore {
    fn default() -> Self {
        let mut store = Self {
            card_types: Vec::new(),
            cards: BTreeMap::new(),
            templates: BTreeMap::new(),
        };
        for default in &DEFAULT_TYPES {
            store.card_types.push(CardType::new(default.id, default.name));
            store.cards.insert(default.id.to_string(), Vec::new());
            store
                .templates
                .insert(default.id.to_string(), DEFAULT_TEMPLATE.to_string());
        }
        store
    }
}

impl CardStore {
    pub fn card_type(&self, id: &str) -> Option<&CardType> {
        self.card_types.iter().find(|t| t.id == id)
    }

    pub fn has_type(&self, id: &str) -> bool {
        self.card_type(id).is_some()
    }

    pub fn cards_of(&self, id: &str) -> &[Card] {
        self.cards.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn template_of(&self, id: &str) -> &str {
        self.templates
            .get(id)
            .map(String::as_str)
            .unwrap_or(DEFAULT_TEMPLATE)
    }

    pub fn first_type_id(&self) -> Option<&str> {
        self.card_types.first().map(|t| t.id.as_str())
    }
}

/// Shared record as stored in the blob store and returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardsEnvelope {
    #[serde(flatten)]
    pub store: CardStore,
    #[serde(default, with = "iso_millis")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Current UTC time at the precision `updatedAt` is written with
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Lenient parse used on stored records; anything unreadable is treated as absent
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

mod iso_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(at) => serializer.serialize_str(&super::format_timestamp(at)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(super::parse_timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_store_has_builtin_types() {
        let store = CardStore::default();
        let ids: Vec<&str> = store.card_types.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["warranty", "no-warranty"]);
        assert!(store.cards.values().all(Vec::is_empty));
        assert_eq!(store.template_of("warranty"), DEFAULT_TEMPLATE);
    }

    #[test]
    fn test_envelope_wire_shape() {
        let at = parse_timestamp("2025-01-02T03:04:05.678Z").unwrap();
        let envelope = CardsEnvelope {
            store: CardStore::default(),
            updated_at: Some(at),
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["updatedAt"], json!("2025-01-02T03:04:05.678Z"));
        assert_eq!(value["cardTypes"][1]["allowDuplicate"], json!(false));
        assert_eq!(value["cardTypes"][1]["duplicateCount"], json!(1));
        assert!(value["cards"]["warranty"].is_array());

        let empty = CardsEnvelope {
            store: CardStore::default(),
            updated_at: None,
        };
        assert!(serde_json::to_value(&empty).unwrap()["updatedAt"].is_null());
    }

    #[test]
    fn test_envelope_ignores_bad_timestamp() {
        let mut value = serde_json::to_value(CardsEnvelope {
            store: CardStore::default(),
            updated_at: None,
        })
        .unwrap();
        value["updatedAt"] = json!("yesterday-ish");
        let parsed: CardsEnvelope = serde_json::from_value(value).unwrap();
        assert!(parsed.updated_at.is_none());
    }
}
