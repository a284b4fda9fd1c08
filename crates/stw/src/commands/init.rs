//! Scaffold a new site.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Files written by `stw init`, relative to the site root.
const SCAFFOLD: &[(&str, &str)] = &[
    ("config.yaml", DEFAULT_CONFIG),
    ("templates/base.html", DEFAULT_BASE),
    ("templates/components/head.html", DEFAULT_HEAD),
    ("templates/components/header.html", DEFAULT_HEADER),
    ("templates/components/footer.html", DEFAULT_FOOTER),
    ("pages/index.html", DEFAULT_INDEX),
    ("pages/about/index.html", DEFAULT_ABOUT),
    ("assets/css/styles.css", DEFAULT_STYLES),
];

/// Run the init command.
pub fn run(dir: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing site in {}", dir.display());

    let written = scaffold(dir, yes)?;

    if written.is_empty() {
        tracing::warn!("Site already exists. Use --yes to overwrite.");
        return Ok(());
    }

    tracing::info!("Initialization complete!");
    if dir == Path::new(".") {
        tracing::info!("Run 'stw serve' to start the development server.");
    } else {
        tracing::info!(
            "Run 'cd {} && stw serve' to start the development server.",
            dir.display()
        );
    }

    Ok(())
}

/// Write the starter files below `root`, returning the paths written.
///
/// Existing files are kept unless `overwrite` is set.
fn scaffold(root: &Path, overwrite: bool) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    for (relative, contents) in SCAFFOLD {
        let path = root.join(relative);

        if path.exists() && !overwrite {
            tracing::debug!("Keeping existing {}", path.display());
            continue;
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::info!("Created {}", relative);
        written.push(path);
    }

    Ok(written)
}

const DEFAULT_CONFIG: &str = r#"# stw site configuration
site_name: My Site
description: A static site built with stw

# Run stylesheets through an external processor instead of copying them.
# css_command: [npx, postcss, "{input}", -o, "{output}"]

meta:
  title: My Site
  description: A static site built with stw
  robots: index, follow
  jsonld:
    "@context": https://schema.org
    "@type": WebSite
    name: My Site
"#;

const DEFAULT_BASE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  {% include "components/head.html" %}
</head>
<body>
  {% include "components/header.html" %}
  <main>
    {{ content }}
  </main>
  {% include "components/footer.html" %}
  {% if is_dev %}
  <script>
    new EventSource("/__reload").onmessage = function (event) {
      if (event.data === "reload") location.reload();
    };
  </script>
  {% endif %}
</body>
</html>
"#;

const DEFAULT_HEAD: &str = r#"<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{ title }} | {{ config.site_name }}</title>
{% if meta.description %}<meta name="description" content="{{ meta.description }}">{% endif %}
{% if meta.robots %}<meta name="robots" content="{{ meta.robots }}">{% endif %}
{% if meta.canonical %}<link rel="canonical" href="{{ meta.canonical }}">{% endif %}
<meta property="og:title" content="{{ meta.og_title or meta.title or title }}">
{% if meta.og_description %}<meta property="og:description" content="{{ meta.og_description }}">{% endif %}
{% if meta.og_image %}<meta property="og:image" content="{{ meta.og_image }}">{% endif %}
{% if meta.jsonld %}<script type="application/ld+json">{{ toJson(meta.jsonld) }}</script>{% endif %}
<link rel="stylesheet" href="/assets/css/styles.css">
"#;

const DEFAULT_HEADER: &str = r#"<header>
  <nav>
    <a href="/">Home</a>
    <a href="/about/">About</a>
  </nav>
</header>
"#;

const DEFAULT_FOOTER: &str = r#"<footer>
  <p>{{ config.site_name }}</p>
</footer>
"#;

const DEFAULT_INDEX: &str = r#"---
title: Welcome
description: The home page of my site
---
<h1>Welcome to {{ config.site_name }}</h1>
<p>{{ config.description }}</p>
"#;

const DEFAULT_ABOUT: &str = r#"{
  "title": "About",
  "description": "What this site is about"
}
<h1>{{ title }}</h1>
<p>Edit pages/about/index.html to change this page.</p>
"#;

const DEFAULT_STYLES: &str = r#"body {
  font-family: system-ui, sans-serif;
  max-width: 800px;
  margin: 2rem auto;
  padding: 0 1rem;
}

nav a {
  margin-right: 1rem;
}
"#;
