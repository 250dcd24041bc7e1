//! HTML rendering of the index page.
use crate::record::RecordSet;
use crate::store::StoredRecord;

use std::fmt::Write;

/// Everything the index page shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexView {
    /// Records printed by the script for this request.
    pub data: RecordSet,
    /// Store contents after this request's write.
    pub stored: Vec<StoredRecord>,
}

impl IndexView {
    pub fn new(data: RecordSet, stored: Vec<StoredRecord>) -> Self {
        Self { data, stored }
    }

    pub fn render(&self) -> String {
        let mut html = String::with_capacity(1024);
        html.push_str(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
             <title>Carbon footprint</title>\n</head>\n<body>\n",
        );

        html.push_str("<h1>Carbon footprint</h1>\n");
        if self.data.is_empty() {
            html.push_str("<p>The script printed no records.</p>\n");
        } else {
            html.push_str("<table id=\"data\">\n<tr><th>Key</th><th>Value</th></tr>\n");
            for r in &self.data {
                row(&mut html, None, &r.key, r.value.as_deref());
            }
            html.push_str("</table>\n");
        }

        let _ = writeln!(html, "<h2>Stored records ({})</h2>", self.stored.len());
        if !self.stored.is_empty() {
            html.push_str(
                "<table id=\"stored\">\n<tr><th>#</th><th>Key</th><th>Value</th></tr>\n",
            );
            for r in &self.stored {
                row(&mut html, Some(r.id), &r.key, r.value.as_deref());
            }
            html.push_str("</table>\n");
        }

        html.push_str("</body>\n</html>\n");
        html
    }
}

fn row(html: &mut String, id: Option<i64>, key: &str, value: Option<&str>) {
    html.push_str("<tr>");
    if let Some(id) = id {
        let _ = write!(html, "<td>{}</td>", id);
    }
    let _ = write!(
        html,
        "<td>{}</td><td>{}</td>",
        escape(key),
        escape(value.unwrap_or(""))
    );
    html.push_str("</tr>\n");
}

/// Escapes text for use in element content and attribute values.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
