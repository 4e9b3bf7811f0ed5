//! Bare HTML for the landing page and ticket tables.

use crate::gemini::{Ticket, TicketView};
use crate::selector::Selector;
use crate::session::Session;

/// Escape text for use in element content and double-quoted attributes.
pub fn escape(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      _ => out.push(c),
    }
  }
  out
}

/// Join the context root and a relative path without doubling slashes.
fn link(home: &str, path: &str) -> String {
  format!("{}/{}", home.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn page(title: &str, body: &str) -> String {
  format!(
    "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n{body}</body>\n</html>\n",
    title = escape(title),
    body = body
  )
}

pub fn landing(home: &str, gemini_url: &str) -> String {
  let mut body = String::from("<h1>geminhack</h1>\n<ul>\n");
  for sel in Selector::ALL {
    let code = sel.code();
    body.push_str(&format!("<li>{code}:"));
    for view in ["wip", "active", "waiting", "all"] {
      let href = link(home, &format!("{}/{}", view, code.to_lowercase()));
      body.push_str(&format!(" <a href=\"{}\">{}</a>", escape(&href), view));
    }
    body.push_str("</li>\n");
  }
  body.push_str(&format!(
    "</ul>\n<p><a href=\"{}\">Gemini</a></p>\n",
    escape(gemini_url)
  ));
  page("geminhack", &body)
}

pub fn ticket_table(home: &str, session: &Session, view: TicketView, rows: &[Ticket]) -> String {
  let title = format!("{} {}", session.selector(), view.title());
  let mut body = String::new();

  body.push_str(&format!(
    "<p><a href=\"{}\">home</a> | <a href=\"{}\">project</a> | <a href=\"{}\">workspace</a></p>\n",
    escape(home),
    escape(&session.project_page()),
    escape(&session.workspace_page())
  ));
  body.push_str(&format!("<h1>{}</h1>\n", escape(&title)));
  body.push_str(
    "<table>\n<tr><th>Id</th><th>Title</th><th>Status</th><th>Priority</th><th>Assignees</th><th>Revised</th><th>Cards</th></tr>\n",
  );

  for t in rows {
    let revised = t
      .revised
      .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
      .unwrap_or_default();
    let cards = t
      .card_ids
      .iter()
      .map(|n| format!("#{}", n))
      .collect::<Vec<_>>()
      .join(" ");

    body.push_str(&format!(
      "<tr><td><a href=\"{}\">{}-{}</a></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
      escape(&session.ticket_page(t.id)),
      session.selector(),
      t.id,
      escape(&t.title),
      escape(&t.status),
      escape(t.priority.as_deref().unwrap_or_default()),
      escape(&t.assignees.join(", ")),
      revised,
      cards
    ));
  }
  body.push_str("</table>\n");

  page(&title, &body)
}
