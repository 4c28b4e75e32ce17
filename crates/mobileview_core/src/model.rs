use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NormalizedSection {
    pub id: i64,
    pub level: String,
    pub line: String,
    pub anchor: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageModel {
    pub title: String,
    pub id: i64,
    pub is_main_page: bool,
    pub lead: String,
    pub sections: Vec<NormalizedSection>,
    pub history_url: String,
    pub last_modified_user_name: String,
    pub last_modified_user_gender: String,
    pub last_modified_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LanguageLink {
    pub lang: String,
    pub url: String,
    pub display_text: String,
    pub langname: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Variant {
    pub lang: String,
    pub langname: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct PageLanguages {
    pub languages: Vec<LanguageLink>,
    pub variants: Vec<Variant>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{NormalizedSection, PageModel};

    #[test]
    fn page_model_serializes_with_client_field_names() {
        let model = PageModel {
            title: "Test".to_string(),
            id: -1,
            is_main_page: false,
            lead: String::new(),
            sections: vec![NormalizedSection {
                id: 1,
                level: "2".to_string(),
                line: "References".to_string(),
                anchor: "References".to_string(),
                text: "references".to_string(),
                references: Some(json!("")),
            }],
            history_url: "/w/index.php?title=Test&action=history".to_string(),
            last_modified_user_name: "bob".to_string(),
            last_modified_user_gender: "unknown".to_string(),
            last_modified_timestamp: 1_382_986_196,
        };
        let value = serde_json::to_value(&model).expect("serialize");
        assert_eq!(value["isMainPage"], json!(false));
        assert_eq!(value["historyUrl"], json!("/w/index.php?title=Test&action=history"));
        assert_eq!(value["lastModifiedTimestamp"], json!(1_382_986_196));
        assert_eq!(value["sections"][0]["references"], json!(""));
    }
}
