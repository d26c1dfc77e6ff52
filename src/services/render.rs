// src/services/render.rs

//! Message rendering for notification emails.
//!
//! Two renderers implement [`MessageRenderer`]:
//! - [`TemplateRenderer`] fills `{key}` placeholders in `*.html` files loaded
//!   from a template directory at startup.
//! - [`PlainRenderer`] wraps the plain-text body in a minimal HTML page.
//!
//! [`select_renderer`] chooses one at startup; [`render_or_plain`] degrades a
//! failed render to plain output.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::Local;
use regex::Regex;

use crate::error::{AppError, Result};
use crate::utils::escape_html;

/// Key holding the message title. Always present.
pub const KEY_TITLE: &str = "title";
/// Key holding the plain-text body. Always present.
pub const KEY_TEXT: &str = "text";
/// Key holding the plain-text body escaped for HTML. Always present.
pub const KEY_TEXT_HTML: &str = "text_html";
/// Filled by the renderer with the render time.
const KEY_GENERATED_AT: &str = "generated_at";

/// Values substituted into a template.
///
/// Values are inserted verbatim, so callers escape anything that is not
/// already HTML.
#[derive(Debug, Clone, Default)]
pub struct TemplateData(BTreeMap<String, String>);

impl TemplateData {
    /// Create data with the mandatory title and plain-text body.
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut data = Self::default();
        data.insert(KEY_TITLE, title)
            .insert(KEY_TEXT_HTML, escape_html(&text))
            .insert(KEY_TEXT, text);
        data
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// Produces an HTML document from a template name and data.
pub trait MessageRenderer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn render(&self, template: &str, data: &TemplateData) -> Result<String>;
}

/// Renders `{key}` placeholders in HTML templates loaded from disk.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    dir: PathBuf,
    templates: HashMap<String, String>,
}

impl TemplateRenderer {
    /// Load every `*.html` file in `dir`, keyed by file stem.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut templates = HashMap::new();

        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            templates.insert(name.to_string(), fs::read_to_string(&path)?);
        }

        log::debug!("Loaded {} templates from {}", templates.len(), dir.display());
        Ok(Self { dir, templates })
    }

    pub fn from_templates(templates: HashMap<String, String>) -> Self {
        Self {
            dir: PathBuf::new(),
            templates,
        }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl MessageRenderer for TemplateRenderer {
    fn name(&self) -> &'static str {
        "template"
    }

    fn render(&self, template: &str, data: &TemplateData) -> Result<String> {
        let source = self.templates.get(template).ok_or_else(|| {
            AppError::template(
                template,
                format!("not found in {}", self.dir.display()),
            )
        })?;

        Ok(fill_placeholders(source, data, &generated_at()))
    }
}

/// Replace `{key}` placeholders in one pass over `source`.
///
/// Substituted values are never scanned again. Braces that do not enclose a
/// known key (CSS blocks, unknown names) are kept as they are.
fn fill_placeholders(source: &str, data: &TemplateData, generated_at: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let value = after.find('}').and_then(|close| {
            let key = &after[..close];
            let value = match key {
                KEY_GENERATED_AT => Some(generated_at),
                _ => data.get(key),
            };
            value.map(|v| (v, close))
        });

        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Minimal HTML wrapper around the plain-text body. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainRenderer;

impl MessageRenderer for PlainRenderer {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn render(&self, _template: &str, data: &TemplateData) -> Result<String> {
        let title = escape_html(data.get(KEY_TITLE).unwrap_or_default());
        let text = escape_html(data.get(KEY_TEXT).unwrap_or_default());
        Ok(format!(
            r#"<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="color: #2c3e50;">{title}</h2>
    <div style="white-space: pre-wrap;">{text}</div>
    <hr style="margin: 20px 0; border: none; border-top: 1px solid #eee;">
    <p style="color: #7f8c8d; font-size: 14px;">Sent by slotwatch on {}</p>
  </div>
</body>
</html>
"#,
            generated_at()
        ))
    }
}

fn generated_at() -> String {
    Local::now().format("%B %d, %Y at %I:%M %p").to_string()
}

/// Choose the renderer at startup.
///
/// Falls back to [`PlainRenderer`] when the template directory is missing
/// or holds no templates.
pub fn select_renderer(template_dir: &Path) -> Box<dyn MessageRenderer> {
    match TemplateRenderer::load(template_dir) {
        Ok(renderer) if !renderer.is_empty() => {
            log::info!(
                "Using {} email templates from {}",
                renderer.len(),
                template_dir.display()
            );
            Box::new(renderer)
        }
        Ok(_) => {
            log::warn!(
                "No templates in {}, emails will use plain formatting",
                template_dir.display()
            );
            Box::new(PlainRenderer)
        }
        Err(e) => {
            log::warn!(
                "Cannot load templates from {}: {}. Emails will use plain formatting",
                template_dir.display(),
                e
            );
            Box::new(PlainRenderer)
        }
    }
}

/// Render with `renderer`, degrading to [`PlainRenderer`] on failure.
pub fn render_or_plain(
    renderer: &dyn MessageRenderer,
    template: &str,
    data: &TemplateData,
) -> String {
    renderer.render(template, data).unwrap_or_else(|e| {
        log::warn!("{} renderer failed: {}. Using plain formatting", renderer.name(), e);
        PlainRenderer
            .render(template, data)
            .unwrap_or_else(|_| escape_html(data.get(KEY_TEXT).unwrap_or_default()))
    })
}

/// Convert HTML to a plain-text fallback.
pub fn html_to_text(html: &str) -> String {
    static PATTERNS: OnceLock<(Regex, Regex, Regex, Regex)> = OnceLock::new();
    let (blocks, tags, blank_lines, spaces) = PATTERNS.get_or_init(|| {
        (
            Regex::new(r"(?is)<(style|script|head)[^>]*>.*?</(style|script|head)>")
                .expect("static pattern is valid"),
            Regex::new(r"<[^>]+>").expect("static pattern is valid"),
            Regex::new(r"\n\s*\n").expect("static pattern is valid"),
            Regex::new(r"[ \t]+").expect("static pattern is valid"),
        )
    });

    let text = blocks.replace_all(html, "");
    let text = tags.replace_all(&text, "");
    let text = unescape_html(&text);
    let text = spaces.replace_all(&text, " ");
    let text = blank_lines.replace_all(&text, "\n\n");
    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
