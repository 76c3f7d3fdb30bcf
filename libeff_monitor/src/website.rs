use std::path::{Path, PathBuf};
use std::time::SystemTime;
use time::OffsetDateTime;
use unicode_normalization::UnicodeNormalization;

use super::constants::IMAGE_EXTENSIONS;
use super::error::WebsiteError;

const STYLE_FILE_NAME: &str = "style.css";
const INDEX_FILE_NAME: &str = "index.html";

const STYLE_SHEET: &str = r#"body { font-family: Arial, sans-serif; margin: 20px; }
h1 { font-size: 22px; }
.box { margin: 10px 0; padding: 12px; border: 1px solid #ccc; border-radius: 8px; background: #f5f5f5; }
.box a { text-decoration: none; font-weight: bold; font-size: 17px; color: #0066cc; }
.box a:hover { text-decoration: underline; }
.image-box { width: 30%; margin: 1%; float: left; text-align: center; }
.image-box img { width: 100%; border: 1px solid #ccc; }
.filter-box { clear: both; margin-top: 20px; }
.breadcrumb { font-size: 14px; margin-bottom: 10px; }
.meta { font-size: 12px; color: #666; }
"#;

const FILTER_SCRIPT: &str = r#"  <script>
    function filterImages() {
      const filter = document.getElementById("filterInput").value.toLowerCase();
      const boxes = document.getElementsByClassName("image-box");
      for (let box of boxes) {
        const alt = box.querySelector("img").alt.toLowerCase();
        box.style.display = alt.includes(filter) ? "block" : "none";
      }
    }
  </script>
"#;

/// Decompose a name (NFKD) and drop what is still not ASCII, so accents fall off their letters
pub fn sanitize_name(name: &str) -> String {
    name.nfkd().filter(char::is_ascii).collect()
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Format a modification time as `YYYY-MM-DD HH:MM UTC`
pub fn format_mtime(mtime: SystemTime) -> String {
    let dt = OffsetDateTime::from(mtime);
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02} UTC",
        dt.year(),
        dt.month() as u8,
        dt.day(),
        dt.hour(),
        dt.minute()
    )
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Rename every entry under dir (recursively) whose name is not plain ASCII.
///
/// An entry is left alone if its cleaned name would be empty or already exists.
/// Returns the number of renames.
pub fn sanitize_tree(dir: &Path) -> Result<usize, WebsiteError> {
    let mut renamed = 0;
    for entry in std::fs::read_dir(dir)? {
        let mut path = entry?.path();
        let name = match path.file_name() {
            Some(n) => n.to_string_lossy().to_string(),
            None => continue,
        };
        let clean = sanitize_name(&name);
        if clean != name {
            let target = dir.join(&clean);
            if clean.is_empty() || target.exists() {
                log::warn!("Cannot rename {} to an ASCII name", path.to_string_lossy());
            } else {
                std::fs::rename(&path, &target)?;
                log::debug!("Renamed {name} to {clean}");
                path = target;
                renamed += 1;
            }
        }
        if path.is_dir() {
            renamed += sanitize_tree(&path)?;
        }
    }
    Ok(renamed)
}

/// SiteIndexer writes an index.html into every directory of the published tree.
///
/// Links are absolute, built from the public URL of the tree root.
#[derive(Debug)]
pub struct SiteIndexer {
    root: PathBuf,
    web_url: String,
    site_title: String,
}

impl SiteIndexer {
    pub fn new(root: &Path, web_url: &str, site_title: &str) -> Result<Self, WebsiteError> {
        if !root.exists() {
            return Err(WebsiteError::BadFilePath(root.to_path_buf()));
        }
        Ok(Self {
            root: root.to_path_buf(),
            web_url: web_url.trim_end_matches('/').to_string(),
            site_title: site_title.to_string(),
        })
    }

    /// Write the shared style sheet if there is none yet
    pub fn write_style(&self) -> Result<bool, WebsiteError> {
        let css_path = self.root.join(STYLE_FILE_NAME);
        if css_path.exists() {
            return Ok(false);
        }
        std::fs::write(&css_path, STYLE_SHEET)?;
        log::info!("Created {}", css_path.to_string_lossy());
        Ok(true)
    }

    fn breadcrumb(&self, parts: &[String]) -> String {
        let mut crumb = format!(
            "<a href=\"{}/\">{}</a>",
            self.web_url,
            escape_html(&self.site_title)
        );
        for idx in 0..parts.len() {
            crumb += &format!(
                " / <a href=\"{}/{}/\">{}</a>",
                self.web_url,
                parts[..=idx].join("/"),
                escape_html(&parts[idx])
            );
        }
        crumb
    }

    /// Render the index page of a single directory. `parts` is its path relative to the root.
    pub fn render_page(&self, dir: &Path, parts: &[String]) -> Result<String, WebsiteError> {
        let mut subdirs: Vec<(String, SystemTime)> = Vec::new();
        let mut images: Vec<(String, u64, SystemTime)> = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if is_hidden(&name) {
                continue;
            }
            let meta = entry.metadata()?;
            if meta.is_dir() {
                subdirs.push((name, meta.modified()?));
            } else if is_image(&entry.path()) {
                images.push((name, meta.len(), meta.modified()?));
            }
        }
        subdirs.sort();
        images.sort();

        let rel_path = parts.join("/");
        let mut html = format!(
            "<!DOCTYPE html>\n<html>\n<head>\n  <meta charset=\"UTF-8\">\n  <title>Index of /{}</title>\n  <link rel=\"stylesheet\" href=\"{}/{}\">\n{}</head>\n<body>\n  <div class=\"breadcrumb\">{}</div>\n  <h1>Contents of /{}</h1>\n",
            escape_html(&rel_path),
            self.web_url,
            STYLE_FILE_NAME,
            FILTER_SCRIPT,
            self.breadcrumb(parts),
            escape_html(&rel_path)
        );

        if !subdirs.is_empty() {
            html += "<h2>Subdirectories</h2>\n";
            for (name, mtime) in subdirs.iter() {
                let name = escape_html(name);
                html += &format!(
                    "<div class=\"box\"><a href=\"{name}/\">{name}/</a><div class=\"meta\">Last modified: {}</div></div>\n",
                    format_mtime(*mtime)
                );
            }
        }

        if !images.is_empty() {
            html += "<div class=\"filter-box\">\n  <label for=\"filterInput\"><strong>Filter:</strong></label>\n  <input type=\"text\" id=\"filterInput\" onkeyup=\"filterImages()\" placeholder=\"e.g. EBplus\">\n</div>\n";
            html += "<div style='clear: both'></div><div>\n";
            for (name, size, mtime) in images.iter() {
                let name = escape_html(name);
                html += &format!(
                    "<div class=\"image-box\">\n  <a href=\"{name}\" target=\"_blank\"><img src=\"{name}\" alt=\"{name}\"></a><br>{name}\n  <div class=\"meta\">Size: {} | Modified: {}</div>\n</div>\n",
                    human_bytes::human_bytes(*size as f64),
                    format_mtime(*mtime)
                );
            }
            html += "</div>\n";
        }
        html += "</body>\n</html>\n";
        Ok(html)
    }

    fn index_directory(&self, dir: &Path, parts: &mut Vec<String>) -> Result<usize, WebsiteError> {
        let html = self.render_page(dir, parts)?;
        std::fs::write(dir.join(INDEX_FILE_NAME), html)?;
        log::debug!("index.html created in {}", dir.to_string_lossy());

        let mut n_pages = 1;
        let mut children: Vec<PathBuf> = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let hidden = path
                .file_name()
                .map(|n| is_hidden(&n.to_string_lossy()))
                .unwrap_or(true);
            if path.is_dir() && !hidden {
                children.push(path);
            }
        }
        children.sort();
        for child in children {
            let name = match child.file_name() {
                Some(n) => n.to_string_lossy().to_string(),
                None => continue,
            };
            parts.push(name);
            n_pages += self.index_directory(&child, parts)?;
            parts.pop();
        }
        Ok(n_pages)
    }

    /// Clean names, write the style sheet, then regenerate every index page.
    ///
    /// Returns the number of pages written.
    pub fn publish(&self) -> Result<usize, WebsiteError> {
        let renamed = sanitize_tree(&self.root)?;
        if renamed > 0 {
            log::info!("Renamed {renamed} entries to ASCII names");
        }
        self.write_style()?;
        let n_pages = self.index_directory(&self.root, &mut Vec::new())?;
        log::info!(
            "Wrote {n_pages} index pages under {}",
            self.root.to_string_lossy()
        );
        Ok(n_pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> (tempfile::TempDir, SiteIndexer) {
        let dir = tempfile::tempdir().unwrap();
        let plots = dir.path().join("2025").join("EB");
        std::fs::create_dir_all(plots.join("single")).unwrap();
        std::fs::write(plots.join("step_efficiency_EB.svg"), "<svg/>").unwrap();
        std::fs::write(plots.join("single").join("EB_HE.svg"), "<svg/>").unwrap();
        std::fs::write(plots.join("notes.txt"), "not an image").unwrap();
        let indexer =
            SiteIndexer::new(dir.path(), "https://example.org/EGMDQM/", "EGMDQM").unwrap();
        (dir, indexer)
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Plot\u{e9}_EB.svg"), "Plote_EB.svg");
        assert_eq!(sanitize_name("\u{fb01}lter_\u{3bc}.svg"), "filter_.svg");
        assert_eq!(sanitize_name("plain"), "plain");
    }

    #[test]
    fn test_publish_writes_every_index() {
        let (dir, indexer) = site();
        let n_pages = indexer.publish().unwrap();
        assert_eq!(n_pages, 4);
        assert!(dir.path().join("style.css").exists());
        for rel in ["", "2025", "2025/EB", "2025/EB/single"] {
            assert!(dir.path().join(rel).join("index.html").exists(), "{rel}");
        }

        let page = std::fs::read_to_string(dir.path().join("2025/EB/index.html")).unwrap();
        assert!(page.contains("<a href=\"https://example.org/EGMDQM/\">EGMDQM</a>"));
        assert!(page.contains("<a href=\"https://example.org/EGMDQM/2025/EB/\">EB</a>"));
        assert!(page.contains("<a href=\"single/\">single/</a>"));
        assert!(page.contains("alt=\"step_efficiency_EB.svg\""));
        assert!(page.contains("filterImages()"));
        assert!(!page.contains("notes.txt"));
        assert!(page.contains(" UTC"));
    }

    #[test]
    fn test_existing_style_is_kept() {
        let (dir, indexer) = site();
        std::fs::write(dir.path().join("style.css"), "body {}").unwrap();
        assert!(!indexer.write_style().unwrap());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("style.css")).unwrap(),
            "body {}"
        );
    }

    #[test]
    fn test_non_ascii_entries_are_renamed() {
        let (dir, _) = site();
        let odd = dir.path().join("2025").join("EB").join("r\u{e9}sum\u{e9}.svg");
        std::fs::write(&odd, "<svg/>").unwrap();
        assert_eq!(sanitize_tree(dir.path()).unwrap(), 1);
        assert!(!odd.exists());
        assert!(dir.path().join("2025/EB/resume.svg").exists());
    }

    #[test]
    fn test_format_mtime() {
        let t = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(86_400 + 3_660);
        assert_eq!(format_mtime(t), "1970-01-02 01:01 UTC");
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SiteIndexer::new(&dir.path().join("none"), "", "EGMDQM"),
            Err(WebsiteError::BadFilePath(_))
        ));
    }
}
