// Plain-text tables for list/show output.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Widest a column may get before values are cut with ".."
pub const MAX_COLUMN_WIDTH: usize = 40;

/// Truncate to `width` display columns, ending in ".." when cut.
/// Uses display width so CJK text stays aligned.
pub fn truncate_display(s: &str, width: usize) -> String {
    if UnicodeWidthStr::width(s) <= width {
        return s.to_string();
    }
    if width < 3 {
        return s
            .chars()
            .next()
            .filter(|ch| ch.width().unwrap_or(0) <= width)
            .map(String::from)
            .unwrap_or_default();
    }

    let budget = width - 2;
    let mut used = 0;
    let mut end = 0;
    for (i, ch) in s.char_indices() {
        let cw = ch.width().unwrap_or(0);
        if used + cw > budget {
            break;
        }
        used += cw;
        end = i + ch.len_utf8();
    }
    format!("{}..", &s[..end])
}

fn pad_right(s: &str, width: usize) -> String {
    let cut = truncate_display(s, width);
    let w = UnicodeWidthStr::width(cut.as_str());
    format!("{}{}", cut, " ".repeat(width.saturating_sub(w)))
}

/// Render a header line, a rule, and one line per row. Rows shorter than
/// the header are padded with blanks.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| UnicodeWidthStr::width(h.as_str())).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(UnicodeWidthStr::width(cell.as_str()));
        }
    }
    for w in &mut widths {
        *w = (*w).clamp(1, MAX_COLUMN_WIDTH);
    }

    let mut out = String::new();
    out.push_str(&render_line(&widths, headers));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    out.push_str(&rule.join("  "));
    out.push('\n');
    for row in rows {
        out.push_str(&render_line(&widths, row));
        out.push('\n');
    }
    out
}

fn render_line(widths: &[usize], cells: &[String]) -> String {
    let padded: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(i, &w)| pad_right(cells.get(i).map(String::as_str).unwrap_or(""), w))
        .collect();
    padded.join("  ").trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate_display("hello", 10), "hello");
        assert_eq!(truncate_display("hello world", 7), "hello..");
        assert_eq!(truncate_display("hello", 2), "h");
    }

    #[test]
    fn test_truncate_cjk() {
        // Each ideograph is two columns wide
        assert_eq!(truncate_display("日本語テキスト", 6), "日本..");
    }

    #[test]
    fn test_render_table() {
        let headers = vec!["id".to_string(), "name".to_string()];
        let rows = vec![
            vec!["1".to_string(), "data.xlsx".to_string()],
            vec!["12".to_string()],
        ];
        let table = render_table(&headers, &rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "id  name");
        assert_eq!(lines[1], "--  ---------");
        assert_eq!(lines[2], "1   data.xlsx");
        assert_eq!(lines[3], "12");
    }

    #[test]
    fn test_render_table_caps_width() {
        let long = "x".repeat(100);
        let table = render_table(&["v".to_string()], &[vec![long]]);
        let last = table.lines().last().unwrap();
        assert_eq!(last.len(), MAX_COLUMN_WIDTH);
        assert!(last.ends_with(".."));
    }
}
