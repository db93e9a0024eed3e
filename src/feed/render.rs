//! Serializers for RSS 2.0, Atom 1.0 and JSON Feed 1.1
//!
//! Each renderer emits every item of the [`FeedDocument`] with the same field
//! set; nothing is filtered per format.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::{FeedDocument, FeedError, FeedFormat, FeedItem};

const JSON_FEED_VERSION: &str = "https://jsonfeed.org/version/1.1";

/// Render a document in the given format
///
/// `generated_at` stands in for the feed's build time and, for an empty
/// Atom feed, for its `updated` element.
pub fn render(
    document: &FeedDocument,
    format: FeedFormat,
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, FeedError> {
    let body = match format {
        FeedFormat::Rss => to_rss(document, generated_at),
        FeedFormat::Atom => to_atom(document, generated_at),
        FeedFormat::Json => to_json(document).map_err(|e| FeedError::Render(e.to_string()))?,
    };
    Ok(body.into_bytes())
}

pub fn to_rss(document: &FeedDocument, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(
        "<rss version=\"2.0\" xmlns:content=\"http://purl.org/rss/1.0/modules/content/\">\n",
    );
    out.push_str("  <channel>\n");
    let _ = writeln!(out, "    <title>{}</title>", xml_escape(&document.title));
    let _ = writeln!(out, "    <link>{}</link>", xml_escape(&document.link));
    let _ = writeln!(
        out,
        "    <description>{}</description>",
        xml_escape(&document.description)
    );
    let _ = writeln!(
        out,
        "    <lastBuildDate>{}</lastBuildDate>",
        generated_at.to_rfc2822()
    );

    for item in &document.items {
        out.push_str("    <item>\n");
        let _ = writeln!(out, "      <title>{}</title>", xml_escape(&item.title));
        let _ = writeln!(out, "      <link>{}</link>", xml_escape(&item.link));
        let _ = writeln!(
            out,
            "      <guid isPermaLink=\"false\">{}</guid>",
            xml_escape(&item.id)
        );
        let _ = writeln!(
            out,
            "      <description>{}</description>",
            xml_escape(&item.description)
        );
        let _ = writeln!(
            out,
            "      <content:encoded>{}</content:encoded>",
            xml_escape(&item.content)
        );
        if let Some(author) = &item.author {
            let _ = writeln!(out, "      <author>{}</author>", xml_escape(author));
        }
        for category in &item.categories {
            let _ = writeln!(out, "      <category>{}</category>", xml_escape(category));
        }
        let _ = writeln!(out, "      <pubDate>{}</pubDate>", item.created.to_rfc2822());
        out.push_str("    </item>\n");
    }

    out.push_str("  </channel>\n</rss>\n");
    out
}

pub fn to_atom(document: &FeedDocument, generated_at: DateTime<Utc>) -> String {
    let updated = document
        .items
        .iter()
        .map(|item| item.updated)
        .max()
        .unwrap_or(generated_at);

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<feed xmlns=\"http://www.w3.org/2005/Atom\">\n");
    let _ = writeln!(out, "  <title>{}</title>", xml_escape(&document.title));
    let _ = writeln!(out, "  <id>{}</id>", xml_escape(&document.link));
    let _ = writeln!(out, "  <link href=\"{}\"/>", xml_escape(&document.link));
    let _ = writeln!(
        out,
        "  <subtitle>{}</subtitle>",
        xml_escape(&document.description)
    );
    let _ = writeln!(out, "  <updated>{}</updated>", rfc3339(updated));

    for item in &document.items {
        out.push_str("  <entry>\n");
        let _ = writeln!(out, "    <title>{}</title>", xml_escape(&item.title));
        let _ = writeln!(out, "    <id>{}</id>", xml_escape(&atom_entry_id(item)));
        let _ = writeln!(
            out,
            "    <link href=\"{}\" rel=\"alternate\"/>",
            xml_escape(&item.link)
        );
        let _ = writeln!(out, "    <published>{}</published>", rfc3339(item.created));
        let _ = writeln!(out, "    <updated>{}</updated>", rfc3339(item.updated));
        let _ = writeln!(out, "    <summary>{}</summary>", xml_escape(&item.description));
        let _ = writeln!(
            out,
            "    <content type=\"html\">{}</content>",
            xml_escape(&item.content)
        );
        if let Some(author) = &item.author {
            let _ = writeln!(
                out,
                "    <author>\n      <name>{}</name>\n    </author>",
                xml_escape(author)
            );
        }
        for category in &item.categories {
            let _ = writeln!(out, "    <category term=\"{}\"/>", xml_escape(category));
        }
        out.push_str("  </entry>\n");
    }

    out.push_str("</feed>\n");
    out
}

/// JSON Feed document
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonFeed {
    pub version: String,
    pub title: String,
    pub home_page_url: String,
    pub description: String,
    pub items: Vec<JsonFeedItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonFeedItem {
    pub id: String,
    pub url: String,
    pub title: String,
    pub summary: String,
    pub content_html: String,
    pub date_published: String,
    pub date_modified: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<JsonFeedAuthor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonFeedAuthor {
    pub name: String,
}

pub fn to_json(document: &FeedDocument) -> Result<String, serde_json::Error> {
    let feed = JsonFeed {
        version: JSON_FEED_VERSION.to_string(),
        title: document.title.clone(),
        home_page_url: document.link.clone(),
        description: document.description.clone(),
        items: document.items.iter().map(json_item).collect(),
    };
    serde_json::to_string_pretty(&feed)
}

fn json_item(item: &FeedItem) -> JsonFeedItem {
    JsonFeedItem {
        id: item.id.clone(),
        url: item.link.clone(),
        title: item.title.clone(),
        summary: item.description.clone(),
        content_html: item.content.clone(),
        date_published: rfc3339(item.created),
        date_modified: rfc3339(item.updated),
        authors: item
            .author
            .iter()
            .map(|name| JsonFeedAuthor { name: name.clone() })
            .collect(),
        tags: item.categories.clone(),
    }
}

fn atom_entry_id(item: &FeedItem) -> String {
    if item.link.is_empty() {
        format!("urn:bg3mods:{}", item.id)
    } else {
        item.link.clone()
    }
}

fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
