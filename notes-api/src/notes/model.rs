use chrono::{DateTime, Utc};
use schemars::{gen::SchemaGenerator, schema::Schema, JsonSchema};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::{auth::UserId, Error, Result};

use super::query::{CategoryFilter, SearchScope, SortOrder};

pub const TITLE_MAX_LEN: usize = 255;

pub const DEFAULT_PER_PAGE: u64 = 10;
pub const MAX_PER_PAGE: u64 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub is_favorite: bool,
    pub summary: Option<String>,
    pub keywords: Option<String>,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateNote {
    /// 1 to 255 characters.
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub is_favorite: bool,
    pub summary: Option<String>,
    pub keywords: Option<String>,
}

impl CreateNote {
    pub fn validate(&self) -> Result<()> {
        validate_title(&self.title)?;
        validate_content(&self.content)
    }
}

/// A field of a partial update: left out, sent as `null`, or sent with a value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    #[default]
    Absent,
    Null,
    Value(T),
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    // only called for keys present in the payload, missing keys fall back to `Absent`
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Self::Value(value),
            None => Self::Null,
        })
    }
}

impl<T: JsonSchema> JsonSchema for Patch<T> {
    fn is_referenceable() -> bool {
        false
    }

    fn schema_name() -> String {
        format!("Nullable_{}", T::schema_name())
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        Option::<T>::json_schema(gen)
    }
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct UpdateNote {
    #[serde(default)]
    pub title: Patch<String>,
    #[serde(default)]
    pub content: Patch<String>,
    #[serde(default)]
    pub is_favorite: Patch<bool>,
    /// `null` clears the summary.
    #[serde(default)]
    pub summary: Patch<String>,
    /// `null` clears the keywords.
    #[serde(default)]
    pub keywords: Patch<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NoteChange {
    Title(String),
    Content(String),
    Favorite(bool),
    Summary(Option<String>),
    Keywords(Option<String>),
}

impl UpdateNote {
    /// Validates the present fields and lists them as changes. An update
    /// without fields yields no changes and only refreshes `updated_at`.
    pub fn into_changes(self) -> Result<Vec<NoteChange>> {
        let mut changes = Vec::new();

        match self.title {
            Patch::Absent => {}
            Patch::Null => return Err(Error::validation("title must not be null")),
            Patch::Value(title) => {
                validate_title(&title)?;
                changes.push(NoteChange::Title(title));
            }
        }

        match self.content {
            Patch::Absent => {}
            Patch::Null => return Err(Error::validation("content must not be null")),
            Patch::Value(content) => {
                validate_content(&content)?;
                changes.push(NoteChange::Content(content));
            }
        }

        match self.is_favorite {
            Patch::Absent => {}
            Patch::Null => return Err(Error::validation("is_favorite must not be null")),
            Patch::Value(is_favorite) => changes.push(NoteChange::Favorite(is_favorite)),
        }

        match self.summary {
            Patch::Absent => {}
            Patch::Null => changes.push(NoteChange::Summary(None)),
            Patch::Value(summary) => changes.push(NoteChange::Summary(Some(summary))),
        }

        match self.keywords {
            Patch::Absent => {}
            Patch::Null => changes.push(NoteChange::Keywords(None)),
            Patch::Value(keywords) => changes.push(NoteChange::Keywords(Some(keywords))),
        }

        Ok(changes)
    }
}

impl Note {
    pub fn apply(&mut self, change: NoteChange) {
        match change {
            NoteChange::Title(title) => self.title = title,
            NoteChange::Content(content) => self.content = content,
            NoteChange::Favorite(is_favorite) => self.is_favorite = is_favorite,
            NoteChange::Summary(summary) => self.summary = summary,
            NoteChange::Keywords(keywords) => self.keywords = keywords,
        }
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.is_empty() {
        return Err(Error::validation("title must not be empty"));
    }
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(Error::validation(format!("title must be at most {TITLE_MAX_LEN} characters")));
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<()> {
    if content.is_empty() {
        return Err(Error::validation("content must not be empty"));
    }
    Ok(())
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FindNotesQuery {
    /// Case-insensitive text to look for.
    pub search: Option<String>,
    #[serde(default)]
    pub search_in: SearchScope,
    #[serde(default)]
    pub filter_by: CategoryFilter,
    #[serde(default)]
    pub sort_by: SortOrder,
    /// Starts at 1.
    #[serde(default = "default_page")]
    pub page: u64,
    /// At most 100.
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    DEFAULT_PER_PAGE
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct FindNotesResponse {
    pub notes: Vec<Note>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn update(value: serde_json::Value) -> UpdateNote {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn tells_absent_from_null() {
        let patch = update(json!({ "summary": null, "keywords": "rust" }));

        assert_eq!(patch.title, Patch::Absent);
        assert_eq!(patch.summary, Patch::Null);
        assert_eq!(patch.keywords, Patch::Value("rust".into()));
    }

    #[test]
    fn lists_only_present_fields() {
        let changes = update(json!({ "title": "New", "summary": null })).into_changes().unwrap();

        assert_eq!(changes, vec![NoteChange::Title("New".into()), NoteChange::Summary(None)]);
    }

    #[test]
    fn empty_update_has_no_changes() {
        assert!(update(json!({})).into_changes().unwrap().is_empty());
    }

    #[test]
    fn rejects_null_for_required_fields() {
        for field in ["title", "content", "is_favorite"] {
            let mut payload = serde_json::Map::new();
            payload.insert(field.into(), serde_json::Value::Null);

            let result = update(payload.into()).into_changes();
            assert!(matches!(result, Err(Error::Validation(_))), "{field}");
        }
    }

    #[test]
    fn validates_title_length() {
        let at_limit = "é".repeat(TITLE_MAX_LEN);
        let too_long = "a".repeat(TITLE_MAX_LEN + 1);

        assert!(validate_title(&at_limit).is_ok());
        assert!(matches!(validate_title(&too_long), Err(Error::Validation(_))));
        assert!(matches!(validate_title(""), Err(Error::Validation(_))));
        assert!(validate_title("   ").is_ok());
        assert!(validate_content(" ").is_ok());
    }

    #[test]
    fn validates_new_notes() {
        let note = CreateNote {
            title: "Title".into(),
            content: "".into(),
            is_favorite: false,
            summary: None,
            keywords: None,
        };

        assert!(matches!(note.validate(), Err(Error::Validation(message)) if message.contains("content")));
    }

    #[test]
    fn create_defaults_favorite_to_false() {
        let note: CreateNote = serde_json::from_value(json!({ "title": "t", "content": "c" })).unwrap();
        assert!(!note.is_favorite);
        assert_eq!(note.summary, None);
    }

    #[test]
    fn applies_changes_in_place() {
        let now = Utc::now();
        let mut note = Note {
            id: Uuid::now_v7(),
            title: "Old".into(),
            content: "Body".into(),
            is_favorite: false,
            summary: Some("s".into()),
            keywords: Some("k".into()),
            user_id: Uuid::now_v7(),
            created_at: now,
            updated_at: now,
        };

        note.apply(NoteChange::Favorite(true));
        note.apply(NoteChange::Keywords(None));

        assert!(note.is_favorite);
        assert_eq!(note.keywords, None);
        assert_eq!(note.title, "Old");
        assert_eq!(note.summary.as_deref(), Some("s"));
    }
}
