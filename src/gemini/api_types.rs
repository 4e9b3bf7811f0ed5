//! Serde-deserializable types matching Gemini API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use chrono::{DateTime, NaiveDateTime, Utc};
use scraper::{Html, Node};
use serde::{Deserialize, Serialize};

// ============================================================================
// Item (ticket) payload
// ============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ApiBaseEntity {
  pub id: u64,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub project_id: u64,
  pub revised: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ApiCustomFieldEntity {
  #[serde(default)]
  pub id: u64,
  #[serde(default)]
  pub custom_field_id: u64,
  #[serde(default)]
  pub issue_id: u64,
  #[serde(default)]
  pub project_id: u64,
  #[serde(default)]
  pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiCustomField {
  pub name: String,
  pub formatted_data: Option<String>,
  #[serde(default)]
  pub entity: ApiCustomFieldEntity,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiItem {
  pub base_entity: ApiBaseEntity,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub is_closed: bool,
  pub priority: Option<String>,
  #[serde(rename = "Type")]
  pub item_type: Option<String>,
  #[serde(default)]
  pub resources: Vec<ApiResource>,
  #[serde(default)]
  pub custom_fields: Vec<ApiCustomField>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiResource {
  pub fullname: String,
}

impl ApiCustomField {
  /// Raw field value, falling back to the display form when Gemini leaves
  /// the entity data empty.
  pub fn stored_data(&self) -> &str {
    self
      .entity
      .data
      .as_deref()
      .filter(|d| !d.trim().is_empty())
      .or(self.formatted_data.as_deref())
      .unwrap_or_default()
  }
}

impl ApiItem {
  pub fn custom_field(&self, name: &str) -> Option<&ApiCustomField> {
    self
      .custom_fields
      .iter()
      .find(|f| f.name.eq_ignore_ascii_case(name))
  }
}

// ============================================================================
// Requests
// ============================================================================

/// Filter body for `items/filtered`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiItemsFilter {
  pub projects: String,
  pub saved_card_id: u64,
  pub include_closed: bool,
}

// ============================================================================
// Conversions to domain types
// ============================================================================

use super::types::Ticket;

impl ApiItem {
  /// `link_field` names the custom field storing linked card numbers.
  pub fn into_ticket(self, link_field: &str) -> Ticket {
    let card_ids = self
      .custom_field(link_field)
      .map(|f| parse_card_ids(f.stored_data()))
      .unwrap_or_default();

    let b = self.base_entity;
    Ticket {
      id: b.id,
      title: b.title,
      description: b.description.as_deref().map(html_to_text).unwrap_or_default(),
      status: self.status,
      closed: self.is_closed,
      priority: self.priority,
      ticket_type: self.item_type,
      assignees: self.resources.into_iter().map(|r| r.fullname).collect(),
      revised: b.revised.as_deref().and_then(parse_gemini_date),
      card_ids,
    }
  }
}

// ============================================================================
// Helpers
// ============================================================================

/// Card numbers stored in the link field, in order, without duplicates.
/// Accepts any separator: "7, 12", "7;12" and "#7 #12" all yield [7, 12].
pub fn parse_card_ids(data: &str) -> Vec<u64> {
  let mut ids = Vec::new();
  for token in data.split(|c: char| !c.is_ascii_digit()) {
    if let Ok(id) = token.parse::<u64>() {
      if !ids.contains(&id) {
        ids.push(id);
      }
    }
  }
  ids
}

/// Inverse of `parse_card_ids`.
pub fn format_card_ids(ids: &[u64]) -> String {
  ids
    .iter()
    .map(u64::to_string)
    .collect::<Vec<_>>()
    .join(",")
}

/// Gemini emits either ISO timestamps (with or without offset) or the
/// legacy `/Date(millis)/` form.
fn parse_gemini_date(s: &str) -> Option<DateTime<Utc>> {
  if let Some(millis) = s
    .strip_prefix("/Date(")
    .and_then(|rest| rest.strip_suffix(")/"))
  {
    let digits: String = millis
      .chars()
      .take_while(|c| c.is_ascii_digit() || *c == '-')
      .collect();
    return digits
      .parse::<i64>()
      .ok()
      .and_then(DateTime::from_timestamp_millis);
  }

  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }

  NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
    .ok()
    .map(|dt| dt.and_utc())
}

/// Flatten Gemini's HTML descriptions into plain text for card bodies.
/// Block elements start a new line; script and style contents are dropped.
fn html_to_text(html: &str) -> String {
  let fragment = Html::parse_fragment(html);
  let mut out = String::with_capacity(html.len());

  for node in fragment.root_element().descendants() {
    match node.value() {
      Node::Element(el) if BLOCK_ELEMENTS.contains(&el.name()) => {
        if !out.is_empty() && !out.ends_with('\n') {
          out.push('\n');
        }
      }
      Node::Text(text) => {
        let hidden = node.ancestors().any(|a| {
          a.value()
            .as_element()
            .is_some_and(|el| matches!(el.name(), "script" | "style"))
        });
        if !hidden {
          out.push_str(text);
        }
      }
      _ => {}
    }
  }

  out.replace('\u{a0}', " ").trim().to_string()
}

const BLOCK_ELEMENTS: &[&str] = &["br", "p", "div", "li", "tr", "h1", "h2", "h3", "h4"];

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_card_ids_any_separator() {
    assert_eq!(parse_card_ids("7, 12"), vec![7, 12]);
    assert_eq!(parse_card_ids("#7 #12;7"), vec![7, 12]);
    assert!(parse_card_ids("").is_empty());
    assert!(parse_card_ids("none").is_empty());
  }

  #[test]
  fn test_format_card_ids() {
    assert_eq!(format_card_ids(&[7, 99]), "7,99");
    assert_eq!(format_card_ids(&[]), "");
  }

  #[test]
  fn test_parse_gemini_date_forms() {
    let legacy = parse_gemini_date("/Date(1588320000000+0200)/").unwrap();
    assert_eq!(legacy.timestamp(), 1_588_320_000);

    let iso = parse_gemini_date("2020-05-01T08:00:00Z").unwrap();
    assert_eq!(iso.timestamp(), 1_588_320_000);

    let naive = parse_gemini_date("2020-05-01T08:00:00.000").unwrap();
    assert_eq!(naive.timestamp(), 1_588_320_000);

    assert!(parse_gemini_date("yesterday").is_none());
  }

  #[test]
  fn test_html_to_text() {
    assert_eq!(
      html_to_text("<p>Login fails</p><p>since &lt;v2&gt; &amp; later</p>"),
      "Login fails\nsince <v2> & later"
    );
    assert_eq!(html_to_text("plain"), "plain");
    assert_eq!(html_to_text("one<br>two"), "one\ntwo");
  }

  #[test]
  fn test_html_to_text_decodes_entities_and_drops_styles() {
    assert_eq!(
      html_to_text("<p>Caf&eacute; costs &#8364;5</p><style>p{color:red}</style>"),
      "Café costs €5"
    );
    assert_eq!(
      html_to_text("<script>alert(1)</script>a&nbsp;b"),
      "a b"
    );
  }

  #[test]
  fn test_stored_data_falls_back_to_formatted() {
    let field: ApiCustomField = serde_json::from_value(serde_json::json!({
      "Name": "Zube",
      "FormattedData": "7, 12",
      "Entity": { "Id": 3, "CustomFieldId": 11, "Data": null }
    }))
    .unwrap();
    assert_eq!(field.stored_data(), "7, 12");
  }

  #[test]
  fn test_item_into_ticket() {
    let json = serde_json::json!({
      "BaseEntity": {
        "Id": 42,
        "Title": "Broken export",
        "Description": "<p>CSV is empty</p>",
        "ProjectId": 46,
        "Revised": "2020-05-01T08:00:00Z"
      },
      "Status": "In Progress",
      "IsClosed": false,
      "Priority": "High",
      "Type": "Bug",
      "Resources": [{ "Fullname": "Ada Lovelace" }],
      "CustomFields": [
        { "Name": "zube", "FormattedData": "7", "Entity": { "Id": 3, "CustomFieldId": 11, "Data": "7" } }
      ]
    });

    let item: ApiItem = serde_json::from_value(json).unwrap();
    let ticket = item.into_ticket("Zube");
    assert_eq!(ticket.id, 42);
    assert_eq!(ticket.description, "CSV is empty");
    assert_eq!(ticket.card_ids, vec![7]);
    assert_eq!(ticket.assignees, vec!["Ada Lovelace".to_string()]);
    assert!(ticket.revised.is_some());
  }
}
