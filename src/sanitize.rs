// Schema sanitizer: turns any JSON payload into a well-formed CardStore

use crate::models::{
    parse_timestamp, Card, CardStore, CardType, CardsEnvelope, DEFAULT_TEMPLATE, DEFAULT_TYPES,
    FALLBACK_TYPE_ID, MAX_DUPLICATE_COUNT, MIN_DUPLICATE_COUNT,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Sanitize an untrusted payload (network body, cached blob, legacy schema).
///
/// Total and idempotent: never fails, and sanitizing its own output is a no-op.
pub fn sanitize(input: &Value) -> CardStore {
    let card_types = sanitize_card_types(input);
    let source_cards = card_source(input);
    let source_templates = input.get("templates");

    let mut cards = BTreeMap::new();
    let mut templates = BTreeMap::new();

    for card_type in &card_types {
        let list = lookup_cards(source_cards, &card_type.id);
        cards.insert(
            card_type.id.clone(),
            sanitize_cards(list, card_type.allow_duplicate),
        );

        let template = source_templates
            .and_then(|t| t.get(&card_type.id))
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_TEMPLATE);
        templates.insert(card_type.id.clone(), template.to_string());
    }

    CardStore {
        card_types,
        cards,
        templates,
    }
}

/// Sanitize a stored or received `{cardTypes, cards, templates, updatedAt}` record
pub fn sanitize_envelope(input: &Value) -> CardsEnvelope {
    CardsEnvelope {
        store: sanitize(input),
        updated_at: input
            .get("updatedAt")
            .and_then(Value::as_str)
            .and_then(parse_timestamp),
    }
}

impl CardStore {
    /// Consistency pass run after every in-memory mutation
    pub fn normalized(&self) -> CardStore {
        match serde_json::to_value(self) {
            Ok(value) => sanitize(&value),
            Err(e) => {
                tracing::warn!("Failed to encode card store for normalizing: {}", e);
                self.clone()
            }
        }
    }
}

/// Parse a duplicate count the way a lenient form field would, clamped to [1, 200]
pub fn normalize_duplicate_count(value: &Value) -> u32 {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => parse_leading_int(s),
        _ => None,
    };
    parsed.map(clamp_duplicate_count).unwrap_or(MIN_DUPLICATE_COUNT)
}

pub fn clamp_duplicate_count(count: i64) -> u32 {
    count.clamp(MIN_DUPLICATE_COUNT as i64, MAX_DUPLICATE_COUNT as i64) as u32
}

/// Drop repeated values in place, keeping the first occurrence
pub fn retain_first_occurrence(cards: &mut Vec<Card>) {
    let mut seen = HashSet::new();
    cards.retain(|card| seen.insert(card.value.clone()));
}

fn sanitize_card_types(input: &Value) -> Vec<CardType> {
    let Some(entries) = input.get("cardTypes").and_then(Value::as_array) else {
        return default_card_types();
    };

    let mut output: Vec<CardType> = Vec::new();
    let mut used: HashSet<String> = HashSet::new();

    for entry in entries {
        let Some(name) = entry.get("name").and_then(Value::as_str).map(str::trim) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }

        let provided = entry
            .get("id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty() && !used.contains(*id));
        let id = match provided {
            Some(id) => id.to_string(),
            None => synthesize_id(output.len(), &used),
        };
        used.insert(id.clone());

        let allow_duplicate = entry.get("allowDuplicate").is_some_and(truthy);
        let duplicate_count = if allow_duplicate {
            normalize_duplicate_count(entry.get("duplicateCount").unwrap_or(&Value::Null))
        } else {
            MIN_DUPLICATE_COUNT
        };

        output.push(CardType {
            id,
            name: name.to_string(),
            allow_duplicate,
            duplicate_count,
        });
    }

    if output.is_empty() {
        return default_card_types();
    }
    output
}

fn default_card_types() -> Vec<CardType> {
    DEFAULT_TYPES
        .iter()
        .map(|d| CardType::new(d.id, d.name))
        .collect()
}

// `<default id at this slot or "type">-<1-based slot>`, extended until unused
fn synthesize_id(index: usize, used: &HashSet<String>) -> String {
    let prefix = DEFAULT_TYPES
        .get(index)
        .map(|d| d.id)
        .unwrap_or(FALLBACK_TYPE_ID);
    let base = format!("{}-{}", prefix, index + 1);
    let mut id = base.clone();
    let mut n = 2;
    while used.contains(&id) {
        id = format!("{}-{}", base, n);
        n += 1;
    }
    id
}

// Older payloads stored the per-type lists at the top level instead of under `cards`
fn card_source(input: &Value) -> &Value {
    match input.get("cards") {
        None | Some(Value::Null) => input,
        Some(cards) => cards,
    }
}

fn lookup_cards<'a>(source: &'a Value, id: &str) -> Option<&'a Value> {
    source.get(id).or_else(|| {
        DEFAULT_TYPES
            .iter()
            .find(|d| d.id == id)
            .and_then(|d| d.legacy_key)
            .and_then(|key| source.get(key))
    })
}

fn sanitize_cards(list: Option<&Value>, allow_duplicate: bool) -> Vec<Card> {
    let Some(items) = list.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut seen: HashSet<&str> = HashSet::new();
    let mut output = Vec::new();
    for item in items {
        let Some(value) = item
            .as_object()
            .and_then(|o| o.get("value"))
            .and_then(Value::as_str)
            .map(str::trim)
        else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        if !allow_duplicate && !seen.insert(value) {
            continue;
        }
        output.push(Card {
            value: value.to_string(),
            copied: item.get("copied").is_some_and(truthy),
        });
    }
    output
}

// Loose truthiness for flags written by older or hand-edited clients
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn parse_leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}
