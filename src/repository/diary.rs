use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SYSTEM_CLOCK};
use crate::entity::{AssociationMap, Diary, DiaryItem, DiaryMap, EventMap, GlobalEvent};
use crate::error::{DaybookError, Result};
use crate::storage::{KeyValueStore, StoreKey};

/// Totals across every stored diary.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
pub struct DiaryStatistics {
    pub total_days: usize,
    pub total_todos: usize,
    pub total_completed: usize,
    /// Mean reflection length in characters, rounded
    pub average_reflection_length: usize,
    pub first_diary: Option<NaiveDate>,
    pub last_diary: Option<NaiveDate>,
}

/// Diaries, global events and the links between them.
pub struct DiaryRepository<'a> {
    store: &'a KeyValueStore,
    clock: &'a dyn Clock,
}

impl<'a> DiaryRepository<'a> {
    pub fn new(store: &'a KeyValueStore) -> Self {
        Self::with_clock(store, &SYSTEM_CLOCK)
    }

    pub fn with_clock(store: &'a KeyValueStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    // ========== Diaries ==========

    pub fn all_diaries(&self) -> DiaryMap {
        self.store.get_or_default(StoreKey::Diaries)
    }

    /// The stored diary for `date`, or an empty one.
    pub fn get_diary(&self, date: NaiveDate) -> Diary {
        self.all_diaries()
            .remove(&date)
            .unwrap_or_else(|| Diary::empty(self.clock.now()))
    }

    /// Stamp `updated_at` and store `diary` under `date`.
    pub fn save_diary(&self, date: NaiveDate, diary: &mut Diary) -> Result<()> {
        let mut diaries = self.all_diaries();
        let mut stamped = diary.clone();
        stamped.updated_at = self.clock.now();
        diaries.insert(date, stamped.clone());
        self.store.set(StoreKey::Diaries, &diaries)?;
        *diary = stamped;
        debug!(%date, "saved diary");
        Ok(())
    }

    /// Returns false when there was nothing stored for `date`.
    pub fn delete_diary(&self, date: NaiveDate) -> Result<bool> {
        let mut diaries = self.all_diaries();
        if diaries.remove(&date).is_none() {
            return Ok(false);
        }
        self.store.set(StoreKey::Diaries, &diaries)?;
        info!(%date, "deleted diary");
        Ok(true)
    }

    /// Dates with a stored diary, newest first.
    pub fn diary_dates(&self) -> Vec<NaiveDate> {
        self.all_diaries().into_keys().rev().collect()
    }

    /// Case-insensitive substring search, newest first.
    pub fn search_diaries(&self, keyword: &str) -> Vec<(NaiveDate, Diary)> {
        let needle = keyword.to_lowercase();
        self.all_diaries()
            .into_iter()
            .rev()
            .filter(|(_, diary)| diary.search_text().to_lowercase().contains(&needle))
            .collect()
    }

    /// Fresh copies of the previous day's major events.
    ///
    /// The previous diary is left as it is.
    pub fn inherit_yesterday_events(&self, date: NaiveDate) -> Vec<DiaryItem> {
        let Some(yesterday) = date.pred_opt() else {
            return Vec::new();
        };
        let now = self.clock.now();
        self.get_diary(yesterday)
            .major_events
            .into_iter()
            .map(|event| DiaryItem::new(event.text, now))
            .collect()
    }

    pub fn statistics(&self) -> DiaryStatistics {
        let diaries = self.all_diaries();
        let total_days = diaries.len();
        let reflection_chars: usize = diaries
            .values()
            .map(|d| d.reflection.chars().count())
            .sum();
        let average_reflection_length = if total_days == 0 {
            0
        } else {
            (reflection_chars as f64 / total_days as f64).round() as usize
        };

        DiaryStatistics {
            total_days,
            total_todos: diaries.values().map(|d| d.todos.len()).sum(),
            total_completed: diaries.values().map(|d| d.completed.len()).sum(),
            average_reflection_length,
            first_diary: diaries.keys().next().copied(),
            last_diary: diaries.keys().next_back().copied(),
        }
    }

    // ========== Global events ==========

    fn events(&self) -> EventMap {
        self.store.get_or_default(StoreKey::GlobalEvents)
    }

    fn associations(&self) -> AssociationMap {
        self.store.get_or_default(StoreKey::EventAssociations)
    }

    /// Every global event, oldest first.
    pub fn global_events(&self) -> Vec<GlobalEvent> {
        let mut events: Vec<GlobalEvent> = self.events().into_values().collect();
        events.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        events
    }

    pub fn global_event(&self, id: &str) -> Option<GlobalEvent> {
        self.events().remove(id)
    }

    /// Resolve a full id or a unique id prefix.
    pub fn resolve_event_id(&self, id: &str) -> Result<String> {
        let events = self.events();
        if events.contains_key(id) {
            return Ok(id.to_string());
        }
        let mut matches = events.keys().filter(|k| k.starts_with(id));
        match (matches.next(), matches.next()) {
            (Some(only), None) => Ok(only.clone()),
            _ => Err(DaybookError::EventNotFound(id.to_string())),
        }
    }

    pub fn create_global_event(&self, text: &str, link: &str) -> Result<GlobalEvent> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DaybookError::Validation(
                "event text must not be empty".to_string(),
            ));
        }

        let mut events = self.events();
        let event = GlobalEvent::new(text.to_string(), link.trim().to_string(), self.clock.now());
        events.insert(event.id.clone(), event.clone());
        self.store.set(StoreKey::GlobalEvents, &events)?;

        info!(id = %event.id, "created global event");
        Ok(event)
    }

    pub fn update_global_event(&self, id: &str, text: &str, link: &str) -> Result<GlobalEvent> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DaybookError::Validation(
                "event text must not be empty".to_string(),
            ));
        }

        let mut events = self.events();
        let event = events
            .get_mut(id)
            .ok_or_else(|| DaybookError::EventNotFound(id.to_string()))?;
        event.text = text.to_string();
        event.link = link.trim().to_string();
        event.updated_at = self.clock.now();
        let updated = event.clone();

        self.store.set(StoreKey::GlobalEvents, &events)?;
        Ok(updated)
    }

    /// Delete an event that is linked to no date.
    ///
    /// Returns false, deleting nothing, while any date still refers to it.
    pub fn delete_global_event(&self, id: &str) -> Result<bool> {
        let dates = self.event_associated_dates(id);
        if !dates.is_empty() {
            warn!(id, linked_dates = dates.len(), "refusing to delete linked event");
            return Ok(false);
        }

        let mut events = self.events();
        if events.remove(id).is_none() {
            return Err(DaybookError::EventNotFound(id.to_string()));
        }
        self.store.set(StoreKey::GlobalEvents, &events)?;

        info!(id, "deleted global event");
        Ok(true)
    }

    /// Link `event_id` to `date`. Returns false if it was already linked.
    pub fn associate(&self, event_id: &str, date: NaiveDate) -> Result<bool> {
        if !self.events().contains_key(event_id) {
            return Err(DaybookError::EventNotFound(event_id.to_string()));
        }

        let mut associations = self.associations();
        let ids = associations.entry(date).or_default();
        if ids.iter().any(|id| id == event_id) {
            return Ok(false);
        }
        ids.push(event_id.to_string());
        self.store.set(StoreKey::EventAssociations, &associations)?;

        debug!(event_id, %date, "linked event");
        Ok(true)
    }

    /// Unlink `event_id` from `date`. Returns false if it was not linked.
    ///
    /// A date left with no events is dropped from the mapping.
    pub fn dissociate(&self, event_id: &str, date: NaiveDate) -> Result<bool> {
        let mut associations = self.associations();
        let Some(ids) = associations.get_mut(&date) else {
            return Ok(false);
        };
        let before = ids.len();
        ids.retain(|id| id != event_id);
        if ids.len() == before {
            return Ok(false);
        }
        if ids.is_empty() {
            associations.remove(&date);
        }
        self.store.set(StoreKey::EventAssociations, &associations)?;

        debug!(event_id, %date, "unlinked event");
        Ok(true)
    }

    /// Events linked to `date`, in link order. Dangling ids are skipped.
    pub fn date_associated_events(&self, date: NaiveDate) -> Vec<GlobalEvent> {
        let mut events = self.events();
        self.associations()
            .remove(&date)
            .unwrap_or_default()
            .iter()
            .filter_map(|id| events.remove(id))
            .collect()
    }

    /// Dates linked to `event_id`, oldest first.
    pub fn event_associated_dates(&self, event_id: &str) -> Vec<NaiveDate> {
        self.associations()
            .into_iter()
            .filter(|(_, ids)| ids.iter().any(|id| id == event_id))
            .map(|(date, _)| date)
            .collect()
    }

    /// Yesterday's events not yet linked to `date`.
    pub fn inheritable_events(&self, date: NaiveDate) -> Vec<GlobalEvent> {
        let Some(yesterday) = date.pred_opt() else {
            return Vec::new();
        };
        let today = self.associations().remove(&date).unwrap_or_default();
        self.date_associated_events(yesterday)
            .into_iter()
            .filter(|event| !today.contains(&event.id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::entity::CompletedItem;
    use std::time::Duration;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn setup() -> (KeyValueStore, ManualClock) {
        let store = KeyValueStore::in_memory().unwrap();
        let clock = ManualClock::at_date(date("2024-03-10"));
        (store, clock)
    }

    #[test]
    fn test_unknown_date_gives_empty_diary() {
        let (store, clock) = setup();
        let repo = DiaryRepository::with_clock(&store, &clock);

        let diary = repo.get_diary(date("1999-12-31"));
        assert!(diary.is_empty());
        assert!(repo.diary_dates().is_empty());
    }

    #[test]
    fn test_save_then_get_round_trips() {
        let (store, clock) = setup();
        let repo = DiaryRepository::with_clock(&store, &clock);
        let day = date("2024-03-10");

        let mut diary = repo.get_diary(day);
        diary
            .major_events
            .push(DiaryItem::new("Moved house".to_string(), clock.now()));
        diary.reflection = "Tiring".to_string();
        let created = diary.updated_at;

        clock.advance(Duration::from_secs(60));
        repo.save_diary(day, &mut diary).unwrap();

        let loaded = repo.get_diary(day);
        assert_eq!(loaded, diary);
        assert!(loaded.updated_at >= created);
        assert_eq!(loaded.updated_at, clock.now());
    }

    #[test]
    fn test_failed_save_leaves_diary_unstamped() {
        let store =
            KeyValueStore::with_quota(crate::storage::MemoryBackend::new(), 300).unwrap();
        let clock = ManualClock::at_date(date("2024-03-10"));
        let repo = DiaryRepository::with_clock(&store, &clock);
        let day = date("2024-03-10");

        let mut diary = repo.get_diary(day);
        diary.reflection = "x".repeat(1_000);
        let before = diary.updated_at;
        clock.advance(Duration::from_secs(60));

        let result = repo.save_diary(day, &mut diary);
        assert!(matches!(result, Err(DaybookError::QuotaExceeded { .. })));
        assert_eq!(diary.updated_at, before);
        assert!(repo.diary_dates().is_empty());
    }

    #[test]
    fn test_delete_diary() {
        let (store, clock) = setup();
        let repo = DiaryRepository::with_clock(&store, &clock);
        let day = date("2024-03-10");
        let mut diary = repo.get_diary(day);
        repo.save_diary(day, &mut diary).unwrap();

        assert!(repo.delete_diary(day).unwrap());
        assert!(!repo.delete_diary(day).unwrap());
        assert!(repo.diary_dates().is_empty());
    }

    #[test]
    fn test_diary_dates_newest_first() {
        let (store, clock) = setup();
        let repo = DiaryRepository::with_clock(&store, &clock);
        for d in ["2024-01-02", "2024-03-01", "2023-12-31"] {
            let mut diary = repo.get_diary(date(d));
            repo.save_diary(date(d), &mut diary).unwrap();
        }

        assert_eq!(
            repo.diary_dates(),
            vec![date("2024-03-01"), date("2024-01-02"), date("2023-12-31")]
        );
    }

    #[test]
    fn test_search_is_case_insensitive_and_newest_first() {
        let (store, clock) = setup();
        let repo = DiaryRepository::with_clock(&store, &clock);

        let mut older = repo.get_diary(date("2024-01-01"));
        older
            .todos
            .push(DiaryItem::new("Call the PLUMBER".to_string(), clock.now()));
        repo.save_diary(date("2024-01-01"), &mut older).unwrap();

        let mut newer = repo.get_diary(date("2024-02-01"));
        newer
            .completed
            .push(CompletedItem::new("plumber fixed sink".to_string(), clock.now()));
        repo.save_diary(date("2024-02-01"), &mut newer).unwrap();

        let mut other = repo.get_diary(date("2024-03-01"));
        other.reflection = "nothing to report".to_string();
        repo.save_diary(date("2024-03-01"), &mut other).unwrap();

        let results = repo.search_diaries("Plumber");
        let dates: Vec<NaiveDate> = results.iter().map(|(d, _)| *d).collect();
        assert_eq!(dates, vec![date("2024-02-01"), date("2024-01-01")]);
        assert!(repo.search_diaries("holiday").is_empty());
    }

    #[test]
    fn test_inherit_yesterday_events() {
        let (store, clock) = setup();
        let repo = DiaryRepository::with_clock(&store, &clock);
        let yesterday = date("2024-03-09");

        let mut diary = repo.get_diary(yesterday);
        let mut event = DiaryItem::new("Quarterly review".to_string(), clock.now());
        event.completed = true;
        diary.major_events.push(event.clone());
        repo.save_diary(yesterday, &mut diary).unwrap();

        let inherited = repo.inherit_yesterday_events(date("2024-03-10"));
        assert_eq!(inherited.len(), 1);
        assert_eq!(inherited[0].text, "Quarterly review");
        assert!(!inherited[0].completed);
        assert_ne!(inherited[0].id, event.id);

        // yesterday untouched
        assert_eq!(repo.get_diary(yesterday).major_events, vec![event]);
        assert!(repo.inherit_yesterday_events(date("2024-05-01")).is_empty());
    }

    #[test]
    fn test_statistics() {
        let (store, clock) = setup();
        let repo = DiaryRepository::with_clock(&store, &clock);
        assert_eq!(repo.statistics(), DiaryStatistics::default());

        let mut a = repo.get_diary(date("2024-01-05"));
        a.todos.push(DiaryItem::new("x".to_string(), clock.now()));
        a.todos.push(DiaryItem::new("y".to_string(), clock.now()));
        a.reflection = "abcd".to_string();
        repo.save_diary(date("2024-01-05"), &mut a).unwrap();

        let mut b = repo.get_diary(date("2024-01-01"));
        b.completed
            .push(CompletedItem::new("z".to_string(), clock.now()));
        b.reflection = "ab".to_string();
        repo.save_diary(date("2024-01-01"), &mut b).unwrap();

        let stats = repo.statistics();
        assert_eq!(stats.total_days, 2);
        assert_eq!(stats.total_todos, 2);
        assert_eq!(stats.total_completed, 1);
        assert_eq!(stats.average_reflection_length, 3);
        assert_eq!(stats.first_diary, Some(date("2024-01-01")));
        assert_eq!(stats.last_diary, Some(date("2024-01-05")));
    }

    #[test]
    fn test_create_and_update_global_event() {
        let (store, clock) = setup();
        let repo = DiaryRepository::with_clock(&store, &clock);

        let event = repo.create_global_event("  Trip to Oslo ", "").unwrap();
        assert_eq!(event.text, "Trip to Oslo");

        clock.advance(Duration::from_secs(5));
        let updated = repo
            .update_global_event(&event.id, "Trip to Bergen", "https://example.com")
            .unwrap();
        assert_eq!(updated.link, "https://example.com");
        assert!(updated.updated_at > event.updated_at);
        assert_eq!(repo.global_event(&event.id), Some(updated));

        assert!(matches!(
            repo.create_global_event("   ", ""),
            Err(DaybookError::Validation(_))
        ));
        assert!(matches!(
            repo.update_global_event("nope", "x", ""),
            Err(DaybookError::EventNotFound(_))
        ));
    }

    #[test]
    fn test_associate_is_idempotent() {
        let (store, clock) = setup();
        let repo = DiaryRepository::with_clock(&store, &clock);
        let event = repo.create_global_event("Conference", "").unwrap();
        let day = date("2024-03-10");

        assert!(repo.associate(&event.id, day).unwrap());
        assert!(!repo.associate(&event.id, day).unwrap());

        let linked = repo.date_associated_events(day);
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].id, event.id);
    }

    #[test]
    fn test_associate_unknown_event_fails() {
        let (store, clock) = setup();
        let repo = DiaryRepository::with_clock(&store, &clock);
        let result = repo.associate("ghost", date("2024-03-10"));
        assert!(matches!(result, Err(DaybookError::EventNotFound(_))));
    }

    #[test]
    fn test_dissociate_drops_empty_dates() {
        let (store, clock) = setup();
        let repo = DiaryRepository::with_clock(&store, &clock);
        let a = repo.create_global_event("A", "").unwrap();
        let b = repo.create_global_event("B", "").unwrap();
        let day = date("2024-03-10");
        repo.associate(&a.id, day).unwrap();
        repo.associate(&b.id, day).unwrap();

        assert!(repo.dissociate(&a.id, day).unwrap());
        assert!(!repo.dissociate(&a.id, day).unwrap());
        assert!(store
            .get::<AssociationMap>(StoreKey::EventAssociations)
            .unwrap()
            .contains_key(&day));

        assert!(repo.dissociate(&b.id, day).unwrap());
        let associations: AssociationMap = store.get(StoreKey::EventAssociations).unwrap();
        assert!(!associations.contains_key(&day));
        assert!(!repo.dissociate(&b.id, day).unwrap());
    }

    #[test]
    fn test_delete_guarded_by_associations() {
        let (store, clock) = setup();
        let repo = DiaryRepository::with_clock(&store, &clock);
        let event = repo.create_global_event("Wedding", "").unwrap();
        repo.associate(&event.id, date("2024-06-01")).unwrap();
        repo.associate(&event.id, date("2024-05-31")).unwrap();

        assert_eq!(
            repo.event_associated_dates(&event.id),
            vec![date("2024-05-31"), date("2024-06-01")]
        );
        assert!(!repo.delete_global_event(&event.id).unwrap());
        assert!(repo.global_event(&event.id).is_some());

        repo.dissociate(&event.id, date("2024-06-01")).unwrap();
        repo.dissociate(&event.id, date("2024-05-31")).unwrap();
        assert!(repo.delete_global_event(&event.id).unwrap());
        assert!(repo.global_event(&event.id).is_none());
        assert!(matches!(
            repo.delete_global_event(&event.id),
            Err(DaybookError::EventNotFound(_))
        ));
    }

    #[test]
    fn test_inheritable_events() {
        let (store, clock) = setup();
        let repo = DiaryRepository::with_clock(&store, &clock);
        let carried = repo.create_global_event("Sprint", "").unwrap();
        let already = repo.create_global_event("Move", "").unwrap();
        let yesterday = date("2024-03-09");
        let today = date("2024-03-10");

        repo.associate(&carried.id, yesterday).unwrap();
        repo.associate(&already.id, yesterday).unwrap();
        repo.associate(&already.id, today).unwrap();

        let suggestions = repo.inheritable_events(today);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].id, carried.id);
        // suggestion only, nothing linked yet
        assert_eq!(repo.date_associated_events(today).len(), 1);
    }

    #[test]
    fn test_resolve_event_id_by_prefix() {
        let (store, clock) = setup();
        let repo = DiaryRepository::with_clock(&store, &clock);
        let event = repo.create_global_event("Prefix", "").unwrap();

        assert_eq!(repo.resolve_event_id(&event.id[..8]).unwrap(), event.id);
        assert!(repo.resolve_event_id("zzzz-not-there").is_err());
    }

    #[test]
    fn test_reads_are_fresh_from_storage() {
        let (store, clock) = setup();
        let repo = DiaryRepository::with_clock(&store, &clock);
        let day = date("2024-03-10");

        let mut diary = repo.get_diary(day);
        diary.reflection = "first".to_string();
        repo.save_diary(day, &mut diary).unwrap();

        // a second handle over the same store sees the write
        let other = DiaryRepository::with_clock(&store, &clock);
        assert_eq!(other.get_diary(day).reflection, "first");
    }
}
