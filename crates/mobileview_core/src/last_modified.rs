use anyhow::{Context, Result, bail};
use chrono::DateTime;

use crate::raw::{RawEditor, RawLastModifiedBy, RawTimestamp};

const UNKNOWN_GENDER: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastModified {
    pub user_name: String,
    pub user_gender: String,
    pub timestamp: i64,
}

/// Editor identity with the raw shape already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastModifiedBy {
    Editor { name: String, gender: String },
    Revision {
        name: String,
        gender: String,
        timestamp: Option<RawTimestamp>,
    },
    Unknown,
}

impl LastModifiedBy {
    pub fn from_raw(raw: Option<&RawLastModifiedBy>) -> Self {
        match raw {
            Some(RawLastModifiedBy::Editor(editor)) => {
                let (name, gender) = editor_fields(editor);
                Self::Editor { name, gender }
            }
            Some(RawLastModifiedBy::Revision { user, timestamp }) => {
                let (name, gender) = editor_fields(user);
                Self::Revision {
                    name,
                    gender,
                    timestamp: timestamp.clone(),
                }
            }
            None => Self::Unknown,
        }
    }
}

fn editor_fields(editor: &RawEditor) -> (String, String) {
    let gender = editor
        .gender
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(UNKNOWN_GENDER)
        .to_string();
    (editor.name.clone(), gender)
}

/// Resolve the display fields for "last modified by". The page-level ISO 8601
/// timestamp wins over a revision timestamp when both are present.
pub fn normalize_last_modified(
    lastmodified: Option<&str>,
    editor: &LastModifiedBy,
) -> Result<LastModified> {
    let (user_name, user_gender, fallback) = match editor {
        LastModifiedBy::Editor { name, gender } => (name.clone(), gender.clone(), None),
        LastModifiedBy::Revision {
            name,
            gender,
            timestamp,
        } => (name.clone(), gender.clone(), timestamp.as_ref()),
        LastModifiedBy::Unknown => (String::new(), UNKNOWN_GENDER.to_string(), None),
    };

    let timestamp = match (lastmodified, fallback) {
        (Some(value), _) => parse_iso_timestamp(value)?,
        (None, Some(RawTimestamp::Seconds(seconds))) => *seconds,
        (None, Some(RawTimestamp::Text(value))) => parse_revision_timestamp(value)?,
        (None, None) => bail!("last-modified timestamp is missing"),
    };

    Ok(LastModified {
        user_name,
        user_gender,
        timestamp,
    })
}

/// Convert an ISO 8601 UTC timestamp (`2013-10-28T18:49:56Z`) to epoch seconds.
pub fn parse_iso_timestamp(value: &str) -> Result<i64> {
    let parsed = DateTime::parse_from_rfc3339(value.trim())
        .with_context(|| format!("invalid last-modified timestamp: {value:?}"))?;
    Ok(parsed.timestamp())
}

fn parse_revision_timestamp(value: &str) -> Result<i64> {
    let trimmed = value.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
        return trimmed
            .parse::<i64>()
            .with_context(|| format!("invalid last-modified timestamp: {value:?}"));
    }
    parse_iso_timestamp(trimmed)
}
