//! SEO metadata for pages and sites.

use serde::{Deserialize, Deserializer, Serialize};

use crate::value::Value;

/// URL prefix under which every copied asset is served.
pub const ASSETS_URL: &str = "/assets/";

/// Longest title accepted by [`Meta::validate`].
pub const MAX_TITLE_LEN: usize = 60;

/// Longest description accepted by [`Meta::validate`].
pub const MAX_DESCRIPTION_LEN: usize = 160;

/// Metadata of a page: standard meta tags, Open Graph, Twitter Card and
/// JSON-LD structured data.
///
/// Site-wide defaults and page front matter share this schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Meta {
    #[serde(deserialize_with = "string_or_null")]
    pub title: String,

    #[serde(deserialize_with = "string_or_null")]
    pub description: String,

    #[serde(deserialize_with = "string_or_null")]
    pub canonical: String,

    #[serde(deserialize_with = "string_or_null")]
    pub robots: String,

    #[serde(deserialize_with = "string_or_null")]
    pub keywords: String,

    #[serde(deserialize_with = "string_or_null")]
    pub og_title: String,

    #[serde(deserialize_with = "string_or_null")]
    pub og_description: String,

    #[serde(deserialize_with = "string_or_null")]
    pub og_image: String,

    #[serde(deserialize_with = "string_or_null")]
    pub twitter_title: String,

    #[serde(deserialize_with = "string_or_null")]
    pub twitter_description: String,

    #[serde(deserialize_with = "string_or_null")]
    pub twitter_image: String,

    /// Structured data, passed through to templates untouched.
    pub jsonld: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Metadata constraint violations.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MetaError {
    #[error("title exceeds 60 characters: {0}")]
    TitleTooLong(String),

    #[error("description exceeds 160 characters: {0}")]
    DescriptionTooLong(String),

    #[error("{field} must be under {prefix}: {path}")]
    ImageOutsideAssets {
        field: &'static str,
        prefix: String,
        path: String,
    },
}

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Meta {
    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.description.is_empty()
            && self.canonical.is_empty()
            && self.robots.is_empty()
            && self.keywords.is_empty()
            && self.og_title.is_empty()
            && self.og_description.is_empty()
            && self.og_image.is_empty()
            && self.twitter_title.is_empty()
            && self.twitter_description.is_empty()
            && self.twitter_image.is_empty()
            && !has_jsonld(&self.jsonld)
    }

    /// Check length limits and image locations.
    ///
    /// Lengths are measured in bytes of the stored string. Image paths are
    /// only checked against `assets_url`; the files are not looked up.
    pub fn validate(&self, assets_url: &str) -> Result<(), MetaError> {
        if self.title.len() > MAX_TITLE_LEN {
            return Err(MetaError::TitleTooLong(self.title.clone()));
        }
        if self.description.len() > MAX_DESCRIPTION_LEN {
            return Err(MetaError::DescriptionTooLong(self.description.clone()));
        }

        for (field, path) in [
            ("og_image", &self.og_image),
            ("twitter_image", &self.twitter_image),
        ] {
            if !path.is_empty() && !path.starts_with(assets_url) {
                return Err(MetaError::ImageOutsideAssets {
                    field,
                    prefix: assets_url.to_string(),
                    path: path.clone(),
                });
            }
        }

        Ok(())
    }
}

fn has_jsonld(jsonld: &Option<serde_json::Map<String, serde_json::Value>>) -> bool {
    jsonld.as_ref().is_some_and(|map| !map.is_empty())
}

/// Overlay page metadata on site defaults.
///
/// Each page field wins only when non-empty. Structured data is replaced as a
/// whole, never deep-merged.
pub fn merge(site: &Meta, page: &Meta) -> Meta {
    fn pick(site: &str, page: &str) -> String {
        let chosen = if page.is_empty() { site } else { page };
        chosen.to_string()
    }

    Meta {
        title: pick(&site.title, &page.title),
        description: pick(&site.description, &page.description),
        canonical: pick(&site.canonical, &page.canonical),
        robots: pick(&site.robots, &page.robots),
        keywords: pick(&site.keywords, &page.keywords),
        og_title: pick(&site.og_title, &page.og_title),
        og_description: pick(&site.og_description, &page.og_description),
        og_image: pick(&site.og_image, &page.og_image),
        twitter_title: pick(&site.twitter_title, &page.twitter_title),
        twitter_description: pick(&site.twitter_description, &page.twitter_description),
        twitter_image: pick(&site.twitter_image, &page.twitter_image),
        jsonld: if has_jsonld(&page.jsonld) {
            page.jsonld.clone()
        } else {
            site.jsonld.clone()
        },
    }
}

/// Read site-wide defaults from the `meta` key of the configuration.
///
/// A missing key yields empty metadata. A malformed block is logged and
/// ignored.
pub fn load_site_meta(config: &Value) -> Meta {
    let Some(block) = config.get("meta") else {
        return Meta::default();
    };

    if !matches!(block, Value::Map(_)) {
        tracing::warn!("Ignoring site meta: expected a map, found {}", block.kind());
        return Meta::default();
    }

    match block.to_meta() {
        Ok(meta) => meta,
        Err(e) => {
            tracing::warn!("Ignoring malformed site meta: {}", e);
            Meta::default()
        }
    }
}
