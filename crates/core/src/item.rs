//! The suggestion record and its storage-side shape.

use serde::{Deserialize, Serialize};

use crate::types::{self, DbId, Timestamp};

/// An advertising link suggestion and the search queries it matches.
///
/// `id` is zero until storage assigns one. `updated_at` is the zero value
/// (`Timestamp::default()`) when the row has never been toggled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: DbId,
    pub link_url: String,
    pub title: String,
    pub queries: Vec<String>,
    pub active: bool,
    pub updated_at: Timestamp,
    pub created_at: Timestamp,
}

impl Item {
    /// A not-yet-persisted, active suggestion.
    pub fn new(link_url: impl Into<String>, title: impl Into<String>, queries: Vec<String>) -> Self {
        Self {
            link_url: link_url.into(),
            title: title.into(),
            queries,
            active: true,
            ..Self::default()
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id != 0
    }
}

/// A row as storage hands it back: `updated_at` is nullable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSuggest {
    pub id: DbId,
    pub link_url: String,
    pub title: String,
    pub queries: Vec<String>,
    pub active: bool,
    pub updated_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl StoredSuggest {
    /// Overwrite every field of `dest` with this row.
    pub fn decode_into(self, dest: &mut Item) {
        dest.id = self.id;
        dest.link_url = self.link_url;
        dest.title = self.title;
        dest.queries = self.queries;
        dest.active = self.active;
        dest.updated_at = types::from_nullable(self.updated_at);
        dest.created_at = self.created_at;
    }
}

impl From<StoredSuggest> for Item {
    fn from(row: StoredSuggest) -> Self {
        let mut item = Item::default();
        row.decode_into(&mut item);
        item
    }
}

impl From<Item> for StoredSuggest {
    fn from(item: Item) -> Self {
        Self {
            id: item.id,
            link_url: item.link_url,
            title: item.title,
            queries: item.queries,
            active: item.active,
            updated_at: types::to_nullable(item.updated_at),
            created_at: item.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stored(updated_at: Option<Timestamp>) -> StoredSuggest {
        StoredSuggest {
            id: 4,
            link_url: "https://shop.example/4".into(),
            title: "title4".into(),
            queries: vec!["q1".into(), "q2".into()],
            active: true,
            updated_at,
            created_at: chrono::Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    #[test]
    fn decode_fills_every_field() {
        let updated = chrono::Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap();
        let mut dest = Item {
            id: 99,
            title: "stale".into(),
            ..Item::default()
        };
        stored(Some(updated)).decode_into(&mut dest);

        assert_eq!(dest.id, 4);
        assert_eq!(dest.title, "title4");
        assert_eq!(dest.queries, vec!["q1", "q2"]);
        assert!(dest.active);
        assert_eq!(dest.updated_at, updated);
    }

    #[test]
    fn null_updated_at_becomes_zero_value() {
        let item = Item::from(stored(None));
        assert_eq!(item.updated_at, Timestamp::default());
        assert_eq!(StoredSuggest::from(item).updated_at, None);
    }

    #[test]
    fn new_item_is_active_and_unpersisted() {
        let item = Item::new("https://a.example", "A", vec![]);
        assert!(item.active);
        assert!(!item.is_persisted());
        assert!(item.queries.is_empty());
    }

    #[test]
    fn serializes_with_snake_case_fields() {
        let json = serde_json::to_value(Item::from(stored(None))).unwrap();
        assert_eq!(json["link_url"], "https://shop.example/4");
        assert_eq!(json["active"], true);
        assert_eq!(json["queries"][1], "q2");
    }
}
