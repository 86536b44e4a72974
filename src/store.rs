use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Duration, NaiveDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderStatus {
    /// Acknowledged for the current cycle.
    Done,
    /// Reminder cycle active, waiting for an acknowledgment.
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderRecord {
    pub status: ReminderStatus,
    /// Last push sent in the current pending cycle.
    pub last_reminder_at: Option<NaiveDateTime>,
}

impl ReminderRecord {
    pub fn done() -> Self {
        Self {
            status: ReminderStatus::Done,
            last_reminder_at: None,
        }
    }

    pub fn pending() -> Self {
        Self {
            status: ReminderStatus::Pending,
            last_reminder_at: None,
        }
    }

    fn is_due(&self, now: NaiveDateTime, interval: Duration) -> bool {
        if self.status != ReminderStatus::Pending {
            return false;
        }
        match self.last_reminder_at {
            None => true,
            Some(last) => now - last > interval,
        }
    }
}

/// In-memory table of reminder state keyed by LINE user id.
///
/// Shared by the webhook handler and the scheduler. Every method takes the
/// lock for its entire read-modify-write and releases it before returning,
/// so no guard is ever held across an `.await`. Lives for the process only.
#[derive(Default)]
pub struct ReminderStore {
    records: Mutex<HashMap<String, ReminderRecord>>,
}

impl ReminderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the user as done, creating the record on first contact.
    pub fn acknowledge(&self, user_id: &str) {
        let mut records = self.records.lock().expect("reminder store lock poisoned");
        records.insert(user_id.to_string(), ReminderRecord::done());
    }

    pub fn get(&self, user_id: &str) -> Option<ReminderRecord> {
        let records = self.records.lock().expect("reminder store lock poisoned");
        records.get(user_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("reminder store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every record, sorted by user id.
    pub fn snapshot(&self) -> Vec<(String, ReminderRecord)> {
        let records = self.records.lock().expect("reminder store lock poisoned");
        let mut out: Vec<_> = records
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Reset every tracked user to pending with no reminder sent yet,
    /// regardless of current status. Returns the affected ids, sorted.
    pub fn activate_all(&self) -> Vec<String> {
        let mut records = self.records.lock().expect("reminder store lock poisoned");
        let mut users = Vec::with_capacity(records.len());
        for (user_id, record) in records.iter_mut() {
            *record = ReminderRecord::pending();
            users.push(user_id.clone());
        }
        users.sort();
        users
    }

    /// Pending users whose last push is missing or strictly older than `interval`.
    pub fn due_followups(&self, now: NaiveDateTime, interval: Duration) -> Vec<String> {
        let records = self.records.lock().expect("reminder store lock poisoned");
        let mut users: Vec<_> = records
            .iter()
            .filter(|(_, r)| r.is_due(now, interval))
            .map(|(k, _)| k.clone())
            .collect();
        users.sort();
        users
    }

    /// Record a successful push. No-op unless the user is still pending, so an
    /// acknowledgment that arrived while the push was in flight is kept.
    pub fn mark_reminded(&self, user_id: &str, at: NaiveDateTime) -> bool {
        let mut records = self.records.lock().expect("reminder store lock poisoned");
        match records.get_mut(user_id) {
            Some(record) if record.status == ReminderStatus::Pending => {
                record.last_reminder_at = Some(at);
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn insert(&self, user_id: &str, record: ReminderRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(user_id.to_string(), record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = ReminderStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get("U1"), None);
        assert!(store.activate_all().is_empty());
        assert!(store.due_followups(at(22, 30, 0), Duration::minutes(15)).is_empty());
        assert!(store.is_empty(), "no records appear without an acknowledgment");
    }

    #[test]
    fn test_acknowledge_always_yields_done() {
        let store = ReminderStore::new();
        store.acknowledge("U1");
        assert_eq!(store.get("U1"), Some(ReminderRecord::done()));

        store.insert(
            "U1",
            ReminderRecord {
                status: ReminderStatus::Pending,
                last_reminder_at: Some(at(22, 15, 0)),
            },
        );
        store.acknowledge("U1");
        assert_eq!(store.get("U1"), Some(ReminderRecord::done()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_activate_all_resets_every_status() {
        let store = ReminderStore::new();
        store.acknowledge("U1");
        store.insert(
            "U2",
            ReminderRecord {
                status: ReminderStatus::Pending,
                last_reminder_at: Some(at(21, 50, 0)),
            },
        );
        assert_eq!(store.activate_all(), vec!["U1", "U2"]);
        assert_eq!(store.get("U1"), Some(ReminderRecord::pending()));
        assert_eq!(store.get("U2"), Some(ReminderRecord::pending()));
    }

    #[test]
    fn test_due_followups_is_strict() {
        let store = ReminderStore::new();
        store.insert(
            "U2",
            ReminderRecord {
                status: ReminderStatus::Pending,
                last_reminder_at: Some(at(22, 0, 0)),
            },
        );
        let interval = Duration::minutes(15);
        assert!(store.due_followups(at(22, 14, 59), interval).is_empty());
        assert!(store.due_followups(at(22, 15, 0), interval).is_empty());
        assert_eq!(store.due_followups(at(22, 15, 1), interval), vec!["U2"]);
    }

    #[test]
    fn test_due_followups_skips_done_and_includes_fresh_pending() {
        let store = ReminderStore::new();
        store.acknowledge("U1");
        store.insert("U3", ReminderRecord::pending());
        assert_eq!(
            store.due_followups(at(22, 1, 0), Duration::minutes(15)),
            vec!["U3"]
        );
    }

    #[test]
    fn test_mark_reminded_only_touches_pending() {
        let store = ReminderStore::new();
        store.insert("U1", ReminderRecord::pending());
        assert!(store.mark_reminded("U1", at(22, 20, 0)));
        assert_eq!(store.get("U1").unwrap().last_reminder_at, Some(at(22, 20, 0)));

        store.acknowledge("U1");
        assert!(!store.mark_reminded("U1", at(22, 35, 0)));
        assert_eq!(store.get("U1"), Some(ReminderRecord::done()));

        assert!(!store.mark_reminded("nobody", at(22, 35, 0)));
        assert_eq!(store.get("nobody"), None);
    }

    #[test]
    fn test_is_empty_tracks_acknowledgments() {
        let store = ReminderStore::new();
        assert!(store.is_empty());
        store.acknowledge("U1");
        assert!(!store.is_empty());
    }

    #[test]
    fn test_snapshot_is_sorted_copy() {
        let store = ReminderStore::new();
        store.acknowledge("b");
        store.insert("a", ReminderRecord::pending());

        let snap = store.snapshot();
        assert_eq!(
            snap,
            vec![
                ("a".to_string(), ReminderRecord::pending()),
                ("b".to_string(), ReminderRecord::done()),
            ]
        );

        store.activate_all();
        assert_eq!(snap[1].1, ReminderRecord::done(), "snapshot is detached from the table");
    }
}
