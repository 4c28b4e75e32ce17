use std::collections::HashMap;

use tracing::debug;

use crate::model::{LanguageLink, PageLanguages, Variant};
use crate::raw::{RawLanguageLink, RawLanguageName, RawLanguageResponse, RawVariant};

pub fn page_languages(response: &RawLanguageResponse, title: &str) -> PageLanguages {
    let query = &response.query;
    let langlinks = query
        .pages
        .first()
        .map(|page| page.langlinks.as_slice())
        .unwrap_or_default();
    PageLanguages {
        languages: augment_language_links(langlinks, &query.languages),
        variants: variant_links(
            &query.general.variants,
            query.general.variantarticlepath.as_deref(),
            title,
        ),
    }
}

/// Attach a display name to every language link. Links whose code has no name are
/// dropped; output order follows `langlinks`.
pub fn augment_language_links(
    langlinks: &[RawLanguageLink],
    names: &[RawLanguageName],
) -> Vec<LanguageLink> {
    let mut by_code = HashMap::<&str, &str>::with_capacity(names.len());
    for entry in names {
        by_code.entry(entry.code.as_str()).or_insert(entry.name.as_str());
    }

    langlinks
        .iter()
        .filter_map(|link| {
            let Some(langname) = by_code.get(link.lang.as_str()) else {
                debug!(lang = %link.lang, "dropping language link without a language name");
                return None;
            };
            Some(LanguageLink {
                lang: link.lang.clone(),
                url: link.url.clone(),
                display_text: link.display_text.clone(),
                langname: (*langname).to_string(),
            })
        })
        .collect()
}

/// One link per variant, in the order given. The title is trimmed and its spaces
/// become underscores; `$1` (variant code) and `$2` (title) are substituted in a
/// single pass, so text introduced by either is never expanded again. A missing or
/// empty template yields no variants.
pub fn variant_links(variants: &[RawVariant], template: Option<&str>, title: &str) -> Vec<Variant> {
    let Some(template) = template.filter(|value| !value.is_empty()) else {
        return Vec::new();
    };
    let title = encode_title(title);
    variants
        .iter()
        .map(|variant| Variant {
            lang: variant.code.clone(),
            langname: variant.name.clone(),
            url: expand_variant_path(template, &variant.code, &title),
        })
        .collect()
}

/// Substitute `$1` (variant code) and `$2` (title) in one pass.
pub fn expand_variant_path(template: &str, code: &str, title: &str) -> String {
    let mut output = String::with_capacity(template.len() + code.len() + title.len());
    let mut rest = template;
    while let Some(index) = rest.find('$') {
        output.push_str(&rest[..index]);
        let after = &rest[index + 1..];
        if let Some(tail) = after.strip_prefix('1') {
            output.push_str(code);
            rest = tail;
        } else if let Some(tail) = after.strip_prefix('2') {
            output.push_str(title);
            rest = tail;
        } else {
            output.push('$');
            rest = after;
        }
    }
    output.push_str(rest);
    output
}

fn encode_title(title: &str) -> String {
    title.trim().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{augment_language_links, expand_variant_path, page_languages, variant_links};
    use crate::raw::{RawLanguageLink, RawLanguageName, RawLanguageResponse, RawVariant};

    fn san_francisco() -> RawLanguageResponse {
        serde_json::from_value(json!({
            "query": {
                "pages": {
                    "94": {
                        "pageid": 94,
                        "ns": 0,
                        "title": "San Francisco",
                        "langlinks": [
                            { "lang": "es", "url": "http://es.wikipedia.org/wiki/San_Francisco_(California)", "*": "San Francisco (California)" },
                            { "lang": "pl", "url": "http://pl.wikipedia.org/wiki/San_Francisco", "*": "San Francisco" },
                            { "lang": "sr", "url": "http://sr.wikipedia.org/wiki/Sr", "*": "Сан Франциско" }
                        ]
                    }
                },
                "general": {
                    "variants": [
                        { "code": "sr", "name": "sr" },
                        { "code": "sr-ec", "name": "Ћирилица" },
                        { "code": "sr-el", "name": "Latinica" }
                    ],
                    "variantarticlepath": "/wiki/$1/$2"
                },
                "languages": [
                    { "code": "sr", "*": "српски / srpski" },
                    { "code": "sr-ec", "*": "српски (ћирилица)" },
                    { "code": "sr-el", "*": "srpski (latinica)" },
                    { "code": "es", "*": "español" },
                    { "code": "pl", "*": "polski" }
                ]
            },
            "limits": { "langlinks": 500 }
        }))
        .expect("decode fixture")
    }

    #[test]
    fn language_links_follow_langlink_order() {
        let languages = page_languages(&san_francisco(), "Test");
        let codes = languages
            .languages
            .iter()
            .map(|link| link.lang.as_str())
            .collect::<Vec<_>>();
        assert_eq!(codes, vec!["es", "pl", "sr"]);
        assert_eq!(languages.languages[0].langname, "español");
        assert_eq!(languages.languages[0].display_text, "San Francisco (California)");
        assert_eq!(languages.languages[1].langname, "polski");
        assert_eq!(languages.languages[2].langname, "српски / srpski");
    }

    #[test]
    fn variants_use_their_own_names_and_template() {
        let languages = page_languages(&san_francisco(), "Test");
        let variants = languages
            .variants
            .iter()
            .map(|variant| (variant.lang.as_str(), variant.langname.as_str(), variant.url.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            variants,
            vec![
                ("sr", "sr", "/wiki/sr/Test"),
                ("sr-ec", "Ћирилица", "/wiki/sr-ec/Test"),
                ("sr-el", "Latinica", "/wiki/sr-el/Test"),
            ]
        );
    }

    #[test]
    fn links_without_a_language_name_are_dropped() {
        let links = vec![
            RawLanguageLink {
                lang: "de".to_string(),
                url: "http://de".to_string(),
                display_text: "Berlin".to_string(),
            },
            RawLanguageLink {
                lang: "fr".to_string(),
                url: "http://fr".to_string(),
                display_text: "Paris".to_string(),
            },
        ];
        let names = vec![RawLanguageName {
            code: "fr".to_string(),
            name: "français".to_string(),
        }];
        let augmented = augment_language_links(&links, &names);
        assert_eq!(augmented.len(), 1);
        assert_eq!(augmented[0].lang, "fr");
        assert_eq!(augmented[0].langname, "français");
    }

    #[test]
    fn missing_template_yields_no_variants() {
        let variants = vec![RawVariant {
            code: "sr-el".to_string(),
            name: "Latinica".to_string(),
        }];
        assert!(variant_links(&variants, None, "Test").is_empty());
        assert!(variant_links(&variants, Some(""), "Test").is_empty());
    }

    #[test]
    fn empty_response_has_no_languages() {
        let languages = page_languages(&RawLanguageResponse::default(), "Test");
        assert!(languages.languages.is_empty());
        assert!(languages.variants.is_empty());
    }

    #[test]
    fn variant_path_expansion_is_single_pass() {
        assert_eq!(expand_variant_path("/wiki/$1/$2", "zh-hans", "Main_Page"), "/wiki/zh-hans/Main_Page");
        assert_eq!(expand_variant_path("/$2?variant=$1", "$2", "T"), "/T?variant=$2");
        assert_eq!(expand_variant_path("/cost$/$1", "x", "T"), "/cost$/x");
        let variants = vec![RawVariant {
            code: "sr-el".to_string(),
            name: "Latinica".to_string(),
        }];
        assert_eq!(
            variant_links(&variants, Some("/wiki/$1/$2"), "San Francisco")[0].url,
            "/wiki/sr-el/San_Francisco"
        );
        assert_eq!(
            variant_links(&variants, Some("/w/index.php?title=$2&variant=$1"), "  Main Page ")[0].url,
            "/w/index.php?title=Main_Page&variant=sr-el"
        );
    }
}
