//! Text-only placeholder panels

use std::path::Path;

use svg::node::element::{Rectangle, Text};
use svg::Document;

use super::{CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::error::Result;

const LINE_CHARS: usize = 70;

/// Greedy word wrap
fn wrap(message: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in message.split_whitespace() {
        if !current.is_empty() && current.len() + word.len() + 1 > LINE_CHARS {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Grey framed panel with a title and a wrapped message
pub fn placeholder_document(title: &str, message: &str, width: u32, height: u32) -> Document {
    let mut doc = Document::new()
        .set("viewBox", (0, 0, width, height))
        .set("width", width)
        .set("height", height)
        .add(
            Rectangle::new()
                .set("x", 1)
                .set("y", 1)
                .set("width", width.saturating_sub(2))
                .set("height", height.saturating_sub(2))
                .set("fill", "#f4f4f4")
                .set("stroke", "#999999")
                .set("stroke-width", 2),
        )
        .add(
            Text::new(title)
                .set("x", width / 2)
                .set("y", height / 2 - 30)
                .set("text-anchor", "middle")
                .set("font-family", "sans-serif")
                .set("font-size", 22)
                .set("fill", "#333333"),
        );

    for (i, line) in wrap(message).into_iter().enumerate() {
        doc = doc.add(
            Text::new(line)
                .set("x", width / 2)
                .set("y", height / 2 + 10 + 20 * i as u32)
                .set("text-anchor", "middle")
                .set("font-family", "sans-serif")
                .set("font-size", 15)
                .set("fill", "#666666"),
        );
    }
    doc
}

pub fn write_placeholder(path: &Path, title: &str, message: &str) -> Result<()> {
    svg::save(path, &placeholder_document(title, message, CANVAS_WIDTH, CANVAS_HEIGHT))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap() {
        let long = "word ".repeat(40);
        let lines = wrap(&long);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.len() <= LINE_CHARS));
        assert!(wrap("").is_empty());
    }

    #[test]
    fn test_write_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.svg");
        write_placeholder(&path, "Heatmap", "No significant genes").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("<svg"));
        assert!(content.contains("No significant genes"));
    }
}
