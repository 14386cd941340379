use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::{RawItem, Result};

pub fn save_json<T: Serialize + ?Sized>(data: &T, path: &Path) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut file, data)?;
    file.flush()?;
    info!(path = %path.display(), "wrote json");
    Ok(())
}

/// Renders collected rows as a minimal inbox page, one
/// `div[role='option']` per row, so it can be read back as a viewport.
pub fn render_snapshot(items: &[RawItem]) -> String {
    let mut parts = vec!["<html><body>".to_string()];
    for item in items {
        parts.push(format!(
            r#"<div role="option" aria-label="{}"></div>"#,
            html_escape::encode_double_quoted_attribute(&item.label)
        ));
    }
    parts.push("</body></html>".to_string());
    parts.join("\n")
}

pub fn save_snapshot(items: &[RawItem], path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(render_snapshot(items).as_bytes())?;
    info!(path = %path.display(), rows = items.len(), "wrote inbox snapshot");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::HtmlViewport;

    #[test]
    fn snapshot_escapes_labels_and_reads_back() {
        let items = vec![
            RawItem::new(r#"say "hi" & <bye>"#),
            RawItem::new("長庚大學【圖書館】"),
        ];
        let html = render_snapshot(&items);
        assert!(html.contains("&quot;hi&quot;"));

        let viewport = HtmlViewport::from_html(&html, 10);
        assert_eq!(viewport.rows(), items.as_slice());
    }

    #[test]
    fn save_json_writes_pretty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        save_json(&vec![1, 2], &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(serde_json::from_str::<Vec<i32>>(&text).unwrap(), vec![1, 2]);
    }
}
