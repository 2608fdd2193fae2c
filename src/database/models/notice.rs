use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{timestamp, user::Role};
use crate::database::repository::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeAudience {
    #[default]
    All,
    Lawyers,
    Clients,
}

impl NoticeAudience {
    /// Audiences visible to a role. Admins see every audience.
    pub fn visible_to(role: Role) -> &'static [NoticeAudience] {
        match role {
            Role::Admin => &[NoticeAudience::All, NoticeAudience::Lawyers, NoticeAudience::Clients],
            Role::Lawyer => &[NoticeAudience::All, NoticeAudience::Lawyers],
            Role::Client => &[NoticeAudience::All, NoticeAudience::Clients],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticePriority {
    #[default]
    Normal,
    Important,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub audience: NoticeAudience,
    pub priority: NoticePriority,
    pub posted_by: Uuid,
    #[serde(default, with = "timestamp::option")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Notice {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

impl Document for Notice {
    const COLLECTION: &'static str = "notices";
    const LABEL: &'static str = "Notice";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audiences_by_role() {
        assert!(!NoticeAudience::visible_to(Role::Client).contains(&NoticeAudience::Lawyers));
        assert!(!NoticeAudience::visible_to(Role::Lawyer).contains(&NoticeAudience::Clients));
        assert_eq!(NoticeAudience::visible_to(Role::Admin).len(), 3);
    }
}
