use chrono::NaiveDate;
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

pub mod db;

pub static TODO_COLLECTION_NAME: &str = "todos";

/// One document per user: free-text to-do items keyed by day. The whole
/// sheet is read, edited, and written back as a unit.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TodoSheet {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub user_id: Uuid,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub daily_todos: BTreeMap<NaiveDate, Vec<String>>,
}

impl TodoSheet {
    pub fn empty(user_id: Uuid) -> TodoSheet {
        TodoSheet {
            user_id,
            daily_todos: BTreeMap::new(),
        }
    }

    /// Appends an item under `date`. Whitespace-only text is dropped.
    pub fn add(&mut self, date: NaiveDate, text: impl AsRef<str>) -> bool {
        let text = text.as_ref().trim();
        if text.is_empty() {
            return false;
        }
        self.daily_todos
            .entry(date)
            .or_default()
            .push(text.to_string());
        true
    }

    /// Removes the item at `index` under `date`; empty days are dropped from
    /// the sheet.
    pub fn remove(&mut self, date: NaiveDate, index: usize) -> bool {
        let Some(items) = self.daily_todos.get_mut(&date) else {
            return false;
        };
        if index >= items.len() {
            return false;
        }
        items.remove(index);
        if items.is_empty() {
            self.daily_todos.remove(&date);
        }
        true
    }

    pub fn for_date(&self, date: NaiveDate) -> &[String] {
        self.daily_todos.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().expect("valid test date")
    }

    #[test]
    fn add_appends_in_order() {
        let mut sheet = TodoSheet::empty(Uuid::new_v4());
        assert!(sheet.add(date("2025-09-01"), "수업 준비"));
        assert!(sheet.add(date("2025-09-01"), "학부모 상담"));
        assert_eq!(sheet.for_date(date("2025-09-01")), ["수업 준비", "학부모 상담"]);
    }

    #[test]
    fn blank_items_are_dropped() {
        let mut sheet = TodoSheet::empty(Uuid::new_v4());
        assert!(!sheet.add(date("2025-09-01"), "   "));
        assert!(sheet.daily_todos.is_empty());
    }

    #[test]
    fn remove_targets_one_index() {
        let mut sheet = TodoSheet::empty(Uuid::new_v4());
        sheet.add(date("2025-09-01"), "a");
        sheet.add(date("2025-09-01"), "b");
        sheet.add(date("2025-09-01"), "c");

        assert!(sheet.remove(date("2025-09-01"), 1));
        assert_eq!(sheet.for_date(date("2025-09-01")), ["a", "c"]);

        assert!(!sheet.remove(date("2025-09-01"), 5));
        assert!(!sheet.remove(date("2025-09-02"), 0));
    }

    #[test]
    fn emptied_days_disappear() {
        let mut sheet = TodoSheet::empty(Uuid::new_v4());
        sheet.add(date("2025-09-01"), "only one");
        assert!(sheet.remove(date("2025-09-01"), 0));
        assert!(!sheet.daily_todos.contains_key(&date("2025-09-01")));
    }
}
