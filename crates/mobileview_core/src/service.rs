use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use anyhow::{Context, Result, anyhow};
use tracing::debug;
use url::form_urlencoded;

use crate::client::PageTransport;
use crate::languages::page_languages;
use crate::last_modified::{LastModifiedBy, normalize_last_modified};
use crate::model::{PageLanguages, PageModel};
use crate::raw::RawMobileViewResponse;
use crate::sections::flatten_sections;

type FetchOutcome = Result<Arc<PageModel>, SharedFetchError>;
type FetchSlot = Arc<OnceLock<FetchOutcome>>;

/// Fetches and normalizes page content, remembering every successful fetch by title.
///
/// Titles are matched exactly. The first caller for a title performs the transport
/// call; callers arriving while it is in flight wait for the same outcome.
pub struct PageService<T> {
    transport: T,
    script_path: String,
    cache: Mutex<HashMap<String, FetchSlot>>,
}

impl<T: PageTransport> PageService<T> {
    pub fn new(transport: T, script_path: impl Into<String>) -> Self {
        Self {
            transport,
            script_path: script_path.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn fetch_page(&self, title: &str) -> Result<Arc<PageModel>> {
        let slot = {
            let mut cache = self.lock_cache()?;
            match cache.get(title) {
                Some(slot) => {
                    debug!(title, "page cache hit");
                    Arc::clone(slot)
                }
                None => {
                    debug!(title, "page cache miss");
                    let slot = FetchSlot::default();
                    cache.insert(title.to_string(), Arc::clone(&slot));
                    slot
                }
            }
        };

        let mut original = None;
        let outcome = slot.get_or_init(|| match self.load_page(title) {
            Ok(page) => Ok(Arc::new(page)),
            Err(error) => {
                let shared = SharedFetchError::from_chain(&error);
                original = Some(error);
                Err(shared)
            }
        });
        match outcome {
            Ok(page) => Ok(Arc::clone(page)),
            Err(shared) => {
                self.forget_failed(title, &slot)?;
                // The caller that ran the fetch keeps the transport's own error.
                Err(original.unwrap_or_else(|| anyhow::Error::new(shared.clone())))
            }
        }
    }

    /// Language links and variants for a title. Not cached.
    pub fn fetch_languages(&self, title: &str) -> Result<PageLanguages> {
        let response = self
            .transport
            .language_data(title)
            .with_context(|| format!("failed to fetch languages for {title}"))?;
        Ok(page_languages(&response, title))
    }

    pub fn is_cached(&self, title: &str) -> Result<bool> {
        Ok(self.lock_cache()?.contains_key(title))
    }

    pub fn cached_titles(&self) -> Result<Vec<String>> {
        let mut titles = self.lock_cache()?.keys().cloned().collect::<Vec<_>>();
        titles.sort();
        Ok(titles)
    }

    fn load_page(&self, title: &str) -> Result<PageModel> {
        let response = self
            .transport
            .mobile_view(title)
            .with_context(|| format!("failed to fetch page {title}"))?;
        build_page_model(title, &response, &self.script_path)
    }

    fn forget_failed(&self, title: &str, slot: &FetchSlot) -> Result<()> {
        let mut cache = self.lock_cache()?;
        if cache
            .get(title)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            cache.remove(title);
        }
        Ok(())
    }

    fn lock_cache(&self) -> Result<MutexGuard<'_, HashMap<String, FetchSlot>>> {
        self.cache
            .lock()
            .map_err(|_| anyhow!("page cache lock poisoned"))
    }
}

pub fn build_page_model(
    title: &str,
    response: &RawMobileViewResponse,
    script_path: &str,
) -> Result<PageModel> {
    let view = &response.mobileview;
    let editor = LastModifiedBy::from_raw(view.lastmodifiedby.as_ref());
    let last_modified = normalize_last_modified(view.lastmodified.as_deref(), &editor)
        .with_context(|| format!("failed to normalize last-modified data for {title}"))?;
    let lead = view
        .sections
        .iter()
        .find(|section| section.id == 0)
        .map(|section| section.text.clone())
        .unwrap_or_default();

    Ok(PageModel {
        title: title.to_string(),
        id: view.id,
        is_main_page: view.is_main_page,
        lead,
        sections: flatten_sections(&view.sections),
        history_url: history_url(script_path, title),
        last_modified_user_name: last_modified.user_name,
        last_modified_user_gender: last_modified.user_gender,
        last_modified_timestamp: last_modified.timestamp,
    })
}

pub fn history_url(script_path: &str, title: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("title", &title.trim().replace(' ', "_"))
        .append_pair("action", "history")
        .finish();
    format!("{script_path}?{query}")
}

/// Snapshot of a failed fetch handed to callers that waited on it. Each level of
/// the original context chain is kept, so `source()` walks the same messages.
#[derive(Debug, Clone)]
struct SharedFetchError {
    message: String,
    source: Option<Arc<SharedFetchError>>,
}

impl SharedFetchError {
    fn from_chain(error: &anyhow::Error) -> Self {
        let mut messages = error.chain().map(|cause| cause.to_string()).collect::<Vec<_>>();
        let mut shared = Self {
            message: messages.pop().unwrap_or_default(),
            source: None,
        };
        while let Some(message) = messages.pop() {
            shared = Self {
                message,
                source: Some(Arc::new(shared)),
            };
        }
        shared
    }
}

impl fmt::Display for SharedFetchError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message)
    }
}

impl std::error::Error for SharedFetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}
