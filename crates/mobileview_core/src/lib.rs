pub mod client;
pub mod config;
pub mod heading;
pub mod languages;
pub mod last_modified;
pub mod model;
pub mod raw;
pub mod sections;
pub mod service;

pub use client::{MediaWikiClient, MediaWikiClientConfig, PageTransport};
pub use model::{LanguageLink, NormalizedSection, PageLanguages, PageModel, Variant};
pub use service::PageService;
