//! Page metadata for stw sites.
//!
//! This crate parses YAML or JSON front matter, merges page metadata with
//! site-wide defaults, validates SEO constraints, and models the nested site
//! configuration document.

pub mod frontmatter;
pub mod meta;
pub mod value;

pub use frontmatter::{parse_front_matter, FrontmatterError};
pub use meta::{load_site_meta, merge, Meta, MetaError, ASSETS_URL};
pub use value::{Value, ValueError};
