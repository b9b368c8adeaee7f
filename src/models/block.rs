use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::text::escape;
use crate::error::AppError;

/// Whether a block is shown to readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Show,
    Hide,
}

impl Visibility {
    pub fn toggled(self) -> Self {
        match self {
            Visibility::Show => Visibility::Hide,
            Visibility::Hide => Visibility::Show,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Show => write!(f, "show"),
            Visibility::Hide => write!(f, "hide"),
        }
    }
}

/// One instruction of a guide, optionally pointing at a URL.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Step {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// A persisted guide record.
///
/// Text fields (`title`, step text, `information` lines) hold escaped text as
/// produced by [`escape`]. Fields this crate does not know about are kept in
/// `extra` so rewriting the document does not drop them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub information: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source_links: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Block {
    /// Refresh `updated_at` for a mutation happening at `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = next_timestamp(Some(self.updated_at.instant()), now).into();
    }
}

/// Raw editor submission, before normalisation and escaping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInput {
    /// Id of the block being edited. `None` creates a new block.
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Store-relative asset paths or absolute URLs. `None` keeps the images
    /// of the block being edited.
    #[serde(default)]
    pub images: Option<Vec<String>>,
    /// Free text, one information line per text line.
    #[serde(default)]
    pub information: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source_links: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
}

impl BlockInput {
    /// Reject submissions that must never reach the store.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::InvalidInput("Title cannot be empty".into()));
        }
        if matches!(&self.id, Some(id) if id.trim().is_empty()) {
            return Err(AppError::InvalidInput("Block id cannot be blank".into()));
        }
        Ok(())
    }

    /// Build the record to persist.
    ///
    /// `existing` is the stored block with the same id, if any: its `created_at`,
    /// unknown fields and (when no images are submitted) images carry over.
    pub fn into_block(self, existing: Option<&Block>, now: DateTime<Utc>) -> Block {
        let id = self
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let steps = self
            .steps
            .into_iter()
            .filter(|step| !step.text.trim().is_empty())
            .map(|step| Step {
                text: escape(&step.text),
                link: step.link.filter(|link| !link.trim().is_empty()),
            })
            .collect();

        let information = self
            .information
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(escape)
            .collect();

        let mut tags: Vec<String> = Vec::with_capacity(self.tags.len());
        for tag in self.tags {
            if !tag.trim().is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        let source_links = self
            .source_links
            .into_iter()
            .filter(|link| !link.trim().is_empty())
            .collect();

        let images = match self.images {
            Some(images) => Some(
                images
                    .into_iter()
                    .filter(|image| !image.trim().is_empty())
                    .collect(),
            ),
            None => existing.and_then(|b| b.images.clone()),
        };

        let (created_at, updated_at) = match existing {
            Some(prev) => (
                prev.created_at.clone(),
                next_timestamp(Some(prev.updated_at.instant()), now).into(),
            ),
            None => (now.into(), now.into()),
        };

        Block {
            id,
            title: escape(&self.title),
            steps,
            images,
            information,
            tags,
            source_links,
            visibility: self.visibility,
            created_at,
            updated_at,
            extra: existing.map(|b| b.extra.clone()).unwrap_or_default(),
        }
    }
}

/// Current wall-clock time at the precision timestamps are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Timestamp for a mutation at `now` of a record last updated at `previous`.
///
/// Always strictly later than `previous`, even if the clock has not advanced
/// by a full millisecond or went backwards.
pub fn next_timestamp(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(prev) if now <= prev => prev + chrono::Duration::milliseconds(1),
        _ => now,
    }
}

/// An RFC 3339 instant as stored in the document.
///
/// A timestamp read from the document is written back with its original text,
/// so records a mutation does not touch keep their bytes. New timestamps are
/// written in UTC with millisecond precision (`2024-05-01T10:00:00.000Z`).
/// Comparison only looks at the instant.
#[derive(Debug, Clone)]
pub struct Timestamp {
    instant: DateTime<Utc>,
    text: Option<String>,
}

impl Timestamp {
    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        Self {
            instant,
            text: None,
        }
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.instant == other.instant
    }
}

impl Eq for Timestamp {}

impl PartialEq<DateTime<Utc>> for Timestamp {
    fn eq(&self, other: &DateTime<Utc>) -> bool {
        self.instant == *other
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.instant.cmp(&other.instant)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.text {
            Some(text) => serializer.serialize_str(text),
            None => serializer
                .serialize_str(&self.instant.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let instant = DateTime::parse_from_rfc3339(&text)
            .map_err(serde::de::Error::custom)?
            .with_timezone(&Utc);
        Ok(Self {
            instant,
            text: Some(text),
        })
    }
}
