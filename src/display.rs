//! Plain-text rendering of search results for the terminal.

use std::fmt::{self, Display};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::question::{Metadata, MetadataValue};
use crate::semantic::QueryHit;

const SEPARATOR_WIDTH: usize = 60;
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Search results rendered as one block per hit.
pub struct SearchResults<'a> {
    pub query: &'a str,
    pub hits: &'a [QueryHit],
}

impl Display for SearchResults<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Found {} results for '{}':\n", self.hits.len(), self.query)?;

        for (i, hit) in self.hits.iter().enumerate() {
            writeln!(f, "Result {}:", i + 1)?;
            writeln!(f, "  ID: {}", hit.id)?;
            writeln!(f, "  Title: {}", hit.document)?;
            writeln!(f, "  Distance: {:.4}", hit.distance)?;

            if !hit.metadata.is_empty() {
                write_metadata(f, &hit.metadata)?;
            }

            writeln!(f, "{}", "-".repeat(SEPARATOR_WIDTH))?;
        }

        Ok(())
    }
}

fn truthy<'a>(meta: &'a Metadata, key: &str) -> Option<&'a MetadataValue> {
    meta.get(key).filter(|v| v.is_truthy())
}

fn or_na(meta: &Metadata, key: &str) -> String {
    meta.get(key)
        .map(|v| v.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

fn write_metadata(f: &mut fmt::Formatter<'_>, meta: &Metadata) -> fmt::Result {
    writeln!(f, "  Score: {}", or_na(meta, "score"))?;
    writeln!(f, "  Answer Count: {}", or_na(meta, "answer_count"))?;
    writeln!(f, "  Comment Count: {}", or_na(meta, "comment_count"))?;
    writeln!(f, "  View Count: {}", or_na(meta, "view_count"))?;

    if let Some(created) = truthy(meta, "creation_date") {
        writeln!(f, "  Created: {}", format_date(created))?;
    }
    if let Some(activity) = truthy(meta, "last_activity_date") {
        writeln!(f, "  Last Activity: {}", format_date(activity))?;
    }

    if let Some(tags) = truthy(meta, "tags") {
        let tags = tags.to_string();
        writeln!(f, "  Tags: {}", tags.split('|').collect::<Vec<_>>().join(", "))?;
    }

    if let Some(accepted) = truthy(meta, "accepted_answer_id") {
        writeln!(f, "  Accepted Answer ID: {accepted}")?;
    }

    if let Some(owner) = truthy(meta, "owner_user_id") {
        writeln!(f, "  Owner User ID: {owner}")?;
        if let Some(name) = truthy(meta, "owner_display_name") {
            writeln!(f, "  Owner Name: {name}")?;
        }
    }

    if let Some(favorites) = truthy(meta, "favorite_count") {
        writeln!(f, "  Favorites: {favorites}")?;
    }

    if let Some(editor) = truthy(meta, "last_editor_user_id") {
        writeln!(f, "  Last Editor ID: {editor}")?;
        if let Some(name) = truthy(meta, "last_editor_display_name") {
            writeln!(f, "  Last Editor: {name}")?;
        }
    }

    if let Some(edited) = truthy(meta, "last_edit_date") {
        writeln!(f, "  Last Edited: {}", format_date(edited))?;
    }

    Ok(())
}

/// ISO 8601 text or unix seconds, as UTC. Anything else is printed as is.
fn format_date(value: &MetadataValue) -> String {
    let parsed = match value {
        MetadataValue::Str(s) => parse_timestamp(s),
        MetadataValue::Int(secs) => DateTime::from_timestamp(*secs, 0),
        MetadataValue::Float(_) => None,
    };

    match parsed {
        Some(dt) => dt.format(DATE_FORMAT).to_string(),
        None => value.to_string(),
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}
