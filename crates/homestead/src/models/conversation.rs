use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A titled, ordered container of messages owned by one actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new<S: Into<String>>(user_id: Uuid, title: S) -> Self {
        let now = Utc::now();
        Conversation {
            id: Uuid::new_v4(),
            user_id,
            title: title.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark activity, never moving `updated_at` backwards or before `created_at`
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at.max(self.updated_at).max(self.created_at);
    }
}

/// Most recently active first. Ties fall back to creation time and then id so the
/// order is stable across calls.
pub fn sort_by_recency(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_touch_is_monotonic() {
        let mut conversation = Conversation::new(Uuid::new_v4(), "Lease questions");
        let created = conversation.created_at;

        conversation.touch(created - Duration::seconds(10));
        assert_eq!(conversation.updated_at, created);

        conversation.touch(created + Duration::seconds(10));
        assert_eq!(conversation.updated_at, created + Duration::seconds(10));
        assert!(conversation.updated_at >= conversation.created_at);
    }

    #[test]
    fn test_sort_by_recency() {
        let user = Uuid::new_v4();
        let mut older = Conversation::new(user, "older");
        let mut newer = Conversation::new(user, "newer");
        older.updated_at = older.created_at;
        newer.touch(older.updated_at + Duration::seconds(5));

        let mut list = vec![older.clone(), newer.clone()];
        sort_by_recency(&mut list);
        assert_eq!(list[0].id, newer.id);
        assert_eq!(list[1].id, older.id);
    }
}
