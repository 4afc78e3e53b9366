use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pace::Pace;

pub type SubscriberId = i64;
pub type VerseId = i64;

/// A user as seen by the delivery engine.
///
/// `pace` is kept as the raw stored value: validation happens at decision
/// time so a corrupt row surfaces as `InvalidPace` rather than being coerced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(rename = "verse_pace")]
    pub pace: String,
    #[serde(rename = "bible_translation", skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(rename = "is_subscribed")]
    pub subscribed: bool,
    #[serde(rename = "is_profile_completed")]
    pub profile_completed: bool,
    /// Marker advanced only by the conditional delivery commit.
    #[serde(rename = "last_verse_sent_at", skip_serializing_if = "Option::is_none")]
    pub last_delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscriber {
    /// Profile setup finished and the fields delivery depends on are present.
    pub fn is_profile_complete(&self) -> bool {
        self.profile_completed
            && !self.pace.trim().is_empty()
            && self
                .translation
                .as_deref()
                .is_some_and(|t| !t.trim().is_empty())
    }

    pub fn pace(&self) -> std::result::Result<Pace, String> {
        self.pace.parse()
    }

    /// Name used in greetings; falls back to the email local part.
    pub fn display_name(&self) -> &str {
        match self.user_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => self.email.split('@').next().unwrap_or(&self.email),
        }
    }
}

/// An immutable verse. `is_favourite` is computed per subscriber at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verse {
    pub id: VerseId,
    pub reference: String,
    #[serde(rename = "verse")]
    pub text: String,
    pub translation: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_favourite: bool,
}

/// Verse as supplied to a bulk import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVerse {
    pub reference: String,
    #[serde(rename = "verse")]
    pub text: String,
    pub translation: String,
}

/// One entry of the append-only delivery log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub subscriber_id: SubscriberId,
    pub verse_id: VerseId,
    pub delivered_at: DateTime<Utc>,
    pub verse: Verse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserNote {
    pub id: i64,
    pub verse_reference: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavouriteVerse {
    pub id: i64,
    pub subscriber_id: SubscriberId,
    pub verse_id: VerseId,
    pub verse: Verse,
    pub created_at: DateTime<Utc>,
}

/// Fields captured by the profile-completion step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub user_name: Option<String>,
    pub pace: Pace,
    pub translation: String,
}

/// Message handed to a [`crate::store::Notifier`] after a committed delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerseNotification {
    pub subscriber_id: SubscriberId,
    pub email: String,
    pub user_name: String,
    pub pace: Pace,
    pub verse: Verse,
    pub delivered_at: DateTime<Utc>,
}

impl VerseNotification {
    pub fn subject(&self) -> String {
        format!("Your {} memory verse: {}", self.pace, self.verse.reference)
    }

    pub fn body(&self, dashboard_url: &str, unsubscribe_url: &str) -> String {
        format!(
            "Hi {name},\n\n\"{text}\"\n    {reference} ({translation})\n\n\
             Open your dashboard: {dashboard_url}\n\
             Unsubscribe: {unsubscribe_url}\n",
            name = self.user_name,
            text = self.verse.text,
            reference = self.verse.reference,
            translation = self.verse.translation,
        )
    }
}
