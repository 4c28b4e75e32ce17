use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawMobileViewResponse {
    #[serde(default)]
    pub mobileview: RawMobileView,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawMobileView {
    #[serde(default)]
    pub id: i64,
    #[serde(
        default,
        rename = "mainpage",
        alias = "isMainPage",
        deserialize_with = "deserialize_flag"
    )]
    pub is_main_page: bool,
    #[serde(default)]
    pub lastmodified: Option<String>,
    #[serde(default)]
    pub lastmodifiedby: Option<RawLastModifiedBy>,
    #[serde(default)]
    pub sections: Vec<RawSection>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct RawSection {
    pub id: i64,
    #[serde(default, deserialize_with = "deserialize_level")]
    pub level: Option<String>,
    #[serde(default)]
    pub line: String,
    #[serde(default)]
    pub anchor: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub references: Option<Value>,
}

/// Editor identity as sent by the API. The revision form nests the user and carries
/// its own timestamp; it must be tried first since it also has no `name` key.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawLastModifiedBy {
    Revision {
        user: RawEditor,
        #[serde(default)]
        timestamp: Option<RawTimestamp>,
    },
    Editor(RawEditor),
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct RawEditor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RawTimestamp {
    Seconds(i64),
    Text(String),
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawLanguageResponse {
    #[serde(default)]
    pub query: RawLanguageQuery,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawLanguageQuery {
    #[serde(default)]
    pub pages: RawPages,
    #[serde(default)]
    pub general: RawSiteGeneral,
    #[serde(default)]
    pub languages: Vec<RawLanguageName>,
}

/// formatversion=1 keys pages by id, formatversion=2 sends a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawPages {
    Keyed(BTreeMap<String, RawLanguagePage>),
    Listed(Vec<RawLanguagePage>),
}

impl Default for RawPages {
    fn default() -> Self {
        Self::Listed(Vec::new())
    }
}

impl RawPages {
    pub fn first(&self) -> Option<&RawLanguagePage> {
        match self {
            Self::Keyed(pages) => pages.values().next(),
            Self::Listed(pages) => pages.first(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawLanguagePage {
    #[serde(default)]
    pub langlinks: Vec<RawLanguageLink>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RawLanguageLink {
    pub lang: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "*", alias = "title")]
    pub display_text: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSiteGeneral {
    #[serde(default)]
    pub variants: Vec<RawVariant>,
    #[serde(default)]
    pub variantarticlepath: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RawVariant {
    pub code: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RawLanguageName {
    pub code: String,
    #[serde(default, rename = "*", alias = "name")]
    pub name: String,
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    // formatversion=1 marks flags by presence (usually an empty string).
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => flag,
        Some(Value::Number(number)) => number.as_i64().is_some_and(|value| value != 0),
        Some(_) => true,
    })
}

fn deserialize_level<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(level)) => Some(level),
        Some(Value::Number(level)) => Some(level.to_string()),
        _ => None,
    })
}
