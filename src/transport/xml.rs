//! PROPFIND multistatus response parsing.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use super::{RemoteEntry, WebDavError};

/// PROPFIND body requesting the properties the sync layer cares about.
pub const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:propfind xmlns:D="DAV:">
    <D:prop>
        <D:displayname/>
        <D:getcontentlength/>
        <D:getlastmodified/>
        <D:getetag/>
        <D:resourcetype/>
    </D:prop>
</D:propfind>"#;

#[derive(Default)]
struct EntryBuilder {
    href: String,
    etag: Option<String>,
    last_modified: Option<DateTime<Utc>>,
    size: Option<u64>,
    is_directory: bool,
}

enum Field {
    Href,
    Etag,
    LastModified,
    ContentLength,
}

/// Parses a 207 Multi-Status body into remote entries.
///
/// Namespace prefixes vary between servers (D:, d:, lp1:, none), so elements
/// are matched by local name only, case-insensitively.
pub fn parse_multistatus(xml: &str) -> Result<Vec<RemoteEntry>, WebDavError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<EntryBuilder> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let tag = local_name(e.local_name().as_ref());
                match tag.as_str() {
                    "response" => {
                        current = Some(EntryBuilder::default());
                        field = None;
                    }
                    "href" => field = Some(Field::Href),
                    "getetag" => field = Some(Field::Etag),
                    "getlastmodified" => field = Some(Field::LastModified),
                    "getcontentlength" => field = Some(Field::ContentLength),
                    "collection" => {
                        if let Some(entry) = current.as_mut() {
                            entry.is_directory = true;
                        }
                    }
                    _ => field = None,
                }
            }
            Ok(Event::Empty(e)) => {
                let tag = local_name(e.local_name().as_ref());
                if tag == "collection" {
                    if let Some(entry) = current.as_mut() {
                        entry.is_directory = true;
                    }
                }
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| WebDavError::Parse(format!("invalid XML text: {}", e)))?;
                if let (Some(entry), Some(active)) = (current.as_mut(), field.as_ref()) {
                    match active {
                        Field::Href => entry.href = text.into_owned(),
                        Field::Etag => entry.etag = Some(normalize_etag(&text)),
                        Field::LastModified => {
                            entry.last_modified = DateTime::parse_from_rfc2822(text.trim())
                                .ok()
                                .map(|dt| dt.with_timezone(&Utc));
                        }
                        Field::ContentLength => entry.size = text.trim().parse().ok(),
                    }
                }
            }
            Ok(Event::End(e)) => {
                let tag = local_name(e.local_name().as_ref());
                match tag.as_str() {
                    "response" => {
                        if let Some(builder) = current.take() {
                            if let Some(entry) = finalize(builder) {
                                entries.push(entry);
                            }
                        }
                    }
                    "href" | "getetag" | "getlastmodified" | "getcontentlength" => field = None,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(WebDavError::Parse(format!(
                    "invalid multistatus XML at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(entries)
}

fn finalize(builder: EntryBuilder) -> Option<RemoteEntry> {
    if builder.href.is_empty() {
        return None;
    }
    let path = percent_decode(&builder.href);
    let name = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
        .to_string();
    Some(RemoteEntry {
        name,
        path,
        is_directory: builder.is_directory,
        etag: builder.etag,
        last_modified: builder.last_modified,
        size: builder.size,
    })
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

fn percent_decode(href: &str) -> String {
    urlencoding::decode(href)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| href.to_string())
}

/// Strips weak-validator prefixes and surrounding quotes so that etags from
/// different servers compare consistently.
pub fn normalize_etag(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("W/")
        .trim_matches('"')
        .to_string()
}
