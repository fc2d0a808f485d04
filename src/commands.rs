// Card and card type mutations over an in-memory CardStore

use crate::models::{Card, CardStore, CardType, CARD_PLACEHOLDER, DEFAULT_TEMPLATE};
use crate::sanitize::{clamp_duplicate_count, retain_first_occurrence};
use std::collections::HashSet;
use thiserror::Error;

const MAX_TYPE_ID_LEN: usize = 32;
const TYPE_ID_FALLBACK: &str = "type";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Card type not found: {0}")]
    UnknownType(String),
    #[error("No card at index {index} in {type_id}")]
    CardNotFound { type_id: String, index: usize },
    #[error("Card type name cannot be empty")]
    EmptyName,
    #[error("Cannot delete the last card type")]
    LastType,
}

/// Result of copying one card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopiedCard {
    pub text: String,
    /// False when the card had already been copied before
    pub newly_copied: bool,
}

fn card_type_mut<'a>(store: &'a mut CardStore, type_id: &str) -> Result<&'a mut CardType, CommandError> {
    store
        .card_types
        .iter_mut()
        .find(|t| t.id == type_id)
        .ok_or_else(|| CommandError::UnknownType(type_id.to_string()))
}

fn require_type<'a>(store: &'a CardStore, type_id: &str) -> Result<&'a CardType, CommandError> {
    store
        .card_type(type_id)
        .ok_or_else(|| CommandError::UnknownType(type_id.to_string()))
}

fn is_card_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | ';' | '，' | '；')
}

/// Split a pasted batch into card values
pub fn extract_cards(raw: &str) -> Vec<&str> {
    raw.split(is_card_separator)
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect()
}

/// Import a pasted batch into a type, returning how many cards were added.
///
/// Types without duplicates split the batch and skip values already present.
/// Types with duplicates take the whole trimmed batch as one value and push it
/// `duplicate_count` times.
pub fn import_cards(store: &mut CardStore, type_id: &str, raw: &str) -> Result<usize, CommandError> {
    let card_type = require_type(store, type_id)?.clone();
    let list = store.cards.entry(card_type.id.clone()).or_default();

    if card_type.allow_duplicate {
        let value = raw.trim();
        if value.is_empty() {
            return Ok(0);
        }
        let count = card_type.duplicate_count as usize;
        list.extend(std::iter::repeat_with(|| Card::new(value)).take(count));
        return Ok(count);
    }

    let mut existing: HashSet<String> = list.iter().map(|c| c.value.clone()).collect();
    let mut added = 0;
    for value in extract_cards(raw) {
        if existing.insert(value.to_string()) {
            list.push(Card::new(value));
            added += 1;
        }
    }
    Ok(added)
}

/// Fill a template with a card value
pub fn compose_message(template: &str, value: &str) -> String {
    if template.contains(CARD_PLACEHOLDER) {
        template.replace(CARD_PLACEHOLDER, value)
    } else {
        let separator = if template.ends_with('\n') { "" } else { "\n" };
        format!("{}{}{}", template, separator, value)
    }
}

pub fn copy_card(store: &mut CardStore, type_id: &str, index: usize) -> Result<CopiedCard, CommandError> {
    require_type(store, type_id)?;
    let template = store.template_of(type_id).to_string();
    let card = store
        .cards
        .get_mut(type_id)
        .and_then(|list| list.get_mut(index))
        .ok_or_else(|| CommandError::CardNotFound {
            type_id: type_id.to_string(),
            index,
        })?;

    let newly_copied = !card.copied;
    card.copied = true;
    Ok(CopiedCard {
        text: compose_message(&template, &card.value),
        newly_copied,
    })
}

/// Remove copied cards from a type, returning how many were removed
pub fn clear_copied(store: &mut CardStore, type_id: &str) -> Result<usize, CommandError> {
    require_type(store, type_id)?;
    let list = store.cards.entry(type_id.to_string()).or_default();
    let before = list.len();
    list.retain(|card| !card.copied);
    Ok(before - list.len())
}

fn is_cjk(c: char) -> bool {
    matches!(c, '\u{3400}'..='\u{4DBF}' | '\u{4E00}'..='\u{9FFF}' | '\u{F900}'..='\u{FAFF}')
}

/// Derive a key-safe id from a display name, unique against `taken`
pub fn slugify_type_id<'a>(name: &str, taken: impl IntoIterator<Item = &'a str>) -> String {
    let mut slug = String::new();
    let mut pending_separator = false;
    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || is_cjk(c) {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }

    let mut base: String = slug.chars().take(MAX_TYPE_ID_LEN).collect();
    while base.ends_with('-') {
        base.pop();
    }
    if base.is_empty() {
        base = TYPE_ID_FALLBACK.to_string();
    }

    let taken: HashSet<&str> = taken.into_iter().collect();
    let mut id = base.clone();
    let mut n = 2;
    while taken.contains(id.as_str()) {
        id = format!("{}-{}", base, n);
        n += 1;
    }
    id
}

/// Append a new type and return its id
pub fn add_type(
    store: &mut CardStore,
    name: &str,
    allow_duplicate: bool,
    duplicate_count: i64,
) -> Result<String, CommandError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CommandError::EmptyName);
    }

    let id = slugify_type_id(name, store.card_types.iter().map(|t| t.id.as_str()));
    store.card_types.push(CardType {
        id: id.clone(),
        name: name.to_string(),
        allow_duplicate,
        duplicate_count: if allow_duplicate {
            clamp_duplicate_count(duplicate_count)
        } else {
            1
        },
    });
    store.cards.insert(id.clone(), Vec::new());
    store.templates.insert(id.clone(), DEFAULT_TEMPLATE.to_string());
    Ok(id)
}

/// Change the duplicate policy of a type, returning how many cards were dropped
pub fn update_type_settings(
    store: &mut CardStore,
    type_id: &str,
    allow_duplicate: bool,
    duplicate_count: i64,
) -> Result<usize, CommandError> {
    let card_type = card_type_mut(store, type_id)?;
    let disabling = card_type.allow_duplicate && !allow_duplicate;
    card_type.allow_duplicate = allow_duplicate;
    card_type.duplicate_count = if allow_duplicate {
        clamp_duplicate_count(duplicate_count)
    } else {
        1
    };

    // only an on-to-off switch drops repeated values
    if !disabling {
        return Ok(0);
    }
    let list = store.cards.entry(type_id.to_string()).or_default();
    let before = list.len();
    retain_first_occurrence(list);
    Ok(before - list.len())
}

pub fn rename_type(store: &mut CardStore, type_id: &str, name: &str) -> Result<(), CommandError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CommandError::EmptyName);
    }
    card_type_mut(store, type_id)?.name = name.to_string();
    Ok(())
}

pub fn delete_type(store: &mut CardStore, type_id: &str) -> Result<(), CommandError> {
    let position = store
        .card_types
        .iter()
        .position(|t| t.id == type_id)
        .ok_or_else(|| CommandError::UnknownType(type_id.to_string()))?;
    if store.card_types.len() <= 1 {
        return Err(CommandError::LastType);
    }

    store.card_types.remove(position);
    store.cards.remove(type_id);
    store.templates.remove(type_id);
    Ok(())
}

pub fn update_template(store: &mut CardStore, type_id: &str, text: &str) -> Result<(), CommandError> {
    require_type(store, type_id)?;
    let template = if text.trim().is_empty() {
        DEFAULT_TEMPLATE.to_string()
    } else {
        text.to_string()
    };
    store.templates.insert(type_id.to_string(), template);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(card_type: CardType, cards: Vec<Card>) -> CardStore {
        let mut store = CardStore::default();
        store.cards.insert(card_type.id.clone(), cards);
        store
            .templates
            .insert(card_type.id.clone(), DEFAULT_TEMPLATE.to_string());
        store.card_types.push(card_type);
        store
    }

    fn dup_type(id: &str, count: u32) -> CardType {
        CardType {
            id: id.to_string(),
            name: id.to_uppercase(),
            allow_duplicate: true,
            duplicate_count: count,
        }
    }

    fn values(store: &CardStore, type_id: &str) -> Vec<String> {
        store.cards_of(type_id).iter().map(|c| c.value.clone()).collect()
    }

    #[test]
    fn test_import_without_duplicates() {
        let mut store = CardStore::default();
        let added = import_cards(&mut store, "warranty", "abc\nabc, def;ghi").unwrap();
        assert_eq!(added, 3);
        assert_eq!(values(&store, "warranty"), vec!["abc", "def", "ghi"]);
        assert!(store.cards_of("warranty").iter().all(|c| !c.copied));
    }

    #[test]
    fn test_import_full_width_separators_and_existing() {
        let mut store = CardStore::default();
        import_cards(&mut store, "warranty", "A1").unwrap();
        let added = import_cards(&mut store, "warranty", "A1，B2；C3\u{3000}D4\t\tA1").unwrap();
        assert_eq!(added, 3);
        assert_eq!(values(&store, "warranty"), vec!["A1", "B2", "C3", "D4"]);
    }

    #[test]
    fn test_import_with_duplicates() {
        let mut store = store_with(dup_type("multi", 3), Vec::new());
        let added = import_cards(&mut store, "multi", "  XYZ \n").unwrap();
        assert_eq!(added, 3);
        assert_eq!(store.cards_of("multi"), vec![Card::new("XYZ"); 3].as_slice());

        assert_eq!(import_cards(&mut store, "multi", " \n ").unwrap(), 0);
        assert_eq!(store.cards_of("multi").len(), 3);
    }

    #[test]
    fn test_import_keeps_whole_text_for_duplicate_types() {
        let mut store = store_with(dup_type("multi", 1), Vec::new());
        import_cards(&mut store, "multi", "line one\nline two").unwrap();
        assert_eq!(values(&store, "multi"), vec!["line one\nline two"]);
    }

    #[test]
    fn test_import_unknown_type() {
        let mut store = CardStore::default();
        assert_eq!(
            import_cards(&mut store, "nope", "a"),
            Err(CommandError::UnknownType("nope".into()))
        );
    }

    #[test]
    fn test_compose_message() {
        assert_eq!(compose_message("code:{{card}}", "K1"), "code:K1");
        assert_eq!(compose_message("{{card}} / {{card}}", "K1"), "K1 / K1");
        assert_eq!(compose_message("Your code:\n", "K1"), "Your code:\nK1");
        assert_eq!(compose_message("Your code:", "K1"), "Your code:\nK1");
        assert_eq!(compose_message("Code: ", "K1"), "Code: \nK1");
        assert_eq!(compose_message("Code:\n\n", "K1"), "Code:\n\nK1");
    }

    #[test]
    fn test_copy_card_marks_copied_once() {
        let mut store = CardStore::default();
        store.cards.insert("warranty".into(), vec![Card::new("K1")]);
        update_template(&mut store, "warranty", "code:{{card}}").unwrap();

        let first = copy_card(&mut store, "warranty", 0).unwrap();
        assert_eq!(first.text, "code:K1");
        assert!(first.newly_copied);
        assert!(store.cards_of("warranty")[0].copied);

        let second = copy_card(&mut store, "warranty", 0).unwrap();
        assert_eq!(second.text, "code:K1");
        assert!(!second.newly_copied);
        assert!(store.cards_of("warranty")[0].copied);
    }

    #[test]
    fn test_copy_card_out_of_range() {
        let mut store = CardStore::default();
        assert_eq!(
            copy_card(&mut store, "warranty", 4),
            Err(CommandError::CardNotFound {
                type_id: "warranty".into(),
                index: 4
            })
        );
    }

    #[test]
    fn test_clear_copied() {
        let mut store = CardStore::default();
        store.cards.insert(
            "warranty".into(),
            vec![
                Card { value: "a".into(), copied: true },
                Card { value: "b".into(), copied: false },
                Card { value: "c".into(), copied: true },
            ],
        );
        assert_eq!(clear_copied(&mut store, "warranty").unwrap(), 2);
        assert_eq!(store.cards_of("warranty"), [Card::new("b")].as_slice());
    }

    #[test]
    fn test_slugify_type_id() {
        let none: [&str; 0] = [];
        assert_eq!(slugify_type_id("Steam Gift Card", none), "steam-gift-card");
        assert_eq!(slugify_type_id("  --Hello__World!!  ", none), "hello-world");
        assert_eq!(slugify_type_id("无质保 卡", none), "无质保-卡");
        assert_eq!(slugify_type_id("!!!", none), "type");
        assert_eq!(
            slugify_type_id("abcdefghij abcdefghij abcdefghij abcdefghij", none),
            "abcdefghij-abcdefghij-abcdefghij"
        );
        assert_eq!(
            slugify_type_id("Gift", ["gift", "gift-2", "warranty"]),
            "gift-3"
        );
    }

    #[test]
    fn test_add_type() {
        let mut store = CardStore::default();
        let id = add_type(&mut store, " Gift ", true, 500).unwrap();
        assert_eq!(id, "gift");
        let card_type = store.card_type("gift").unwrap();
        assert_eq!(card_type.name, "Gift");
        assert_eq!(card_type.duplicate_count, 200);
        assert!(store.cards_of("gift").is_empty());
        assert_eq!(store.template_of("gift"), DEFAULT_TEMPLATE);

        assert_eq!(add_type(&mut store, "gift", false, 9).unwrap(), "gift-2");
        assert_eq!(store.card_type("gift-2").unwrap().duplicate_count, 1);
        assert_eq!(add_type(&mut store, "  ", false, 1), Err(CommandError::EmptyName));
    }

    #[test]
    fn test_disabling_duplicates_dedupes() {
        let mut store = store_with(
            dup_type("multi", 2),
            vec![
                Card::new("x"),
                Card { value: "x".into(), copied: true },
                Card::new("y"),
            ],
        );
        assert_eq!(update_type_settings(&mut store, "multi", true, 0).unwrap(), 0);
        assert_eq!(store.card_type("multi").unwrap().duplicate_count, 1);

        assert_eq!(update_type_settings(&mut store, "multi", false, 50).unwrap(), 1);
        let card_type = store.card_type("multi").unwrap();
        assert!(!card_type.allow_duplicate);
        assert_eq!(card_type.duplicate_count, 1);
        assert_eq!(values(&store, "multi"), vec!["x", "y"]);
    }

    #[test]
    fn test_keeping_duplicates_on_keeps_cards() {
        let mut store = store_with(
            dup_type("multi", 3),
            vec![Card::new("XYZ"), Card::new("XYZ"), Card::new("XYZ")],
        );
        assert_eq!(update_type_settings(&mut store, "multi", true, 5).unwrap(), 0);
        let card_type = store.card_type("multi").unwrap();
        assert!(card_type.allow_duplicate);
        assert_eq!(card_type.duplicate_count, 5);
        assert_eq!(store.cards_of("multi").len(), 3);
    }

    #[test]
    fn test_rename_type() {
        let mut store = CardStore::default();
        rename_type(&mut store, "warranty", " Premium ").unwrap();
        assert_eq!(store.card_type("warranty").unwrap().name, "Premium");
        assert_eq!(rename_type(&mut store, "warranty", ""), Err(CommandError::EmptyName));
    }

    #[test]
    fn test_delete_type() {
        let mut store = CardStore::default();
        delete_type(&mut store, "warranty").unwrap();
        assert!(!store.cards.contains_key("warranty"));
        assert!(!store.templates.contains_key("warranty"));

        assert_eq!(delete_type(&mut store, "no-warranty"), Err(CommandError::LastType));
        assert_eq!(store.card_types.len(), 1);
        assert_eq!(
            delete_type(&mut store, "warranty"),
            Err(CommandError::UnknownType("warranty".into()))
        );
    }

    #[test]
    fn test_update_template_reverts_blank() {
        let mut store = CardStore::default();
        update_template(&mut store, "warranty", "x {{card}}").unwrap();
        assert_eq!(store.template_of("warranty"), "x {{card}}");
        update_template(&mut store, "warranty", " \n").unwrap();
        assert_eq!(store.template_of("warranty"), DEFAULT_TEMPLATE);
    }
}
