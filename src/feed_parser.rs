// Feed parsing: turns the raw BBC Weather RSS text into a ForecastRecord
use crate::forecast::{
    DayEntry, FeedImage, ForecastRecord, UnitSystem, MAX_TEMP_FIELD, MIN_TEMP_FIELD,
};
use crate::xml_feed::{XmlItem, XmlRss};
use chrono::DateTime;
use encoding_rs::{Encoding, UTF_8};
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

// Error types for feed parsing
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Malformed feed XML: {0}")]
    Malformed(String),

    #[error("Feed has no channel element")]
    MissingChannel,

    #[error("Feed has {found} item(s), expected at least 3")]
    InsufficientItems { found: usize },

    #[error("Malformed description part '{part}' in {day} entry")]
    MalformedDescription { day: &'static str, part: String },

    #[error("No {unit} temperature in {field} of {day} entry: '{value}'")]
    MissingTemperature {
        day: &'static str,
        field: &'static str,
        unit: UnitSystem,
        value: String,
    },
}

pub const FORECAST_DAYS: usize = 3;

// Labels for the positional items: current, day1, day2
pub const DAY_LABELS: [&str; FORECAST_DAYS] = ["current", "day1", "day2"];

// Everything from this marker on is dropped from item titles
pub const TITLE_MARKER: &str = ", Max Temp";

static CELSIUS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d{1,3}[°º]?C").expect("Invalid celsius pattern"));

static FAHRENHEIT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d{1,3}[°º]?F").expect("Invalid fahrenheit pattern"));

pub struct FeedParser {}

impl Default for FeedParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedParser {
    pub fn new() -> Self {
        Self {}
    }

    // Parses a raw RSS document into a ForecastRecord.
    //
    // Only the first three items are used. Either a complete record comes
    // back or an error; there is no partial result.
    pub fn parse(
        &self,
        raw: impl AsRef<[u8]>,
        units: UnitSystem,
    ) -> Result<ForecastRecord, ParseError> {
        let text = decode_document(raw.as_ref())?;
        check_well_formed(&text)?;

        let rss: XmlRss = from_str(&text).map_err(|e| ParseError::Malformed(e.to_string()))?;
        let channel = rss.channel.ok_or(ParseError::MissingChannel)?;

        if channel.items.len() < FORECAST_DAYS {
            return Err(ParseError::InsufficientItems {
                found: channel.items.len(),
            });
        }

        let current = parse_item(&channel.items[0], DAY_LABELS[0], units)?;
        let day1 = parse_item(&channel.items[1], DAY_LABELS[1], units)?;
        let day2 = parse_item(&channel.items[2], DAY_LABELS[2], units)?;

        let image = channel.image.map(|image| FeedImage {
            url: image.url.trim().to_string(),
            title: image.title.trim().to_string(),
            link: image.link.trim().to_string(),
        });

        Ok(ForecastRecord {
            location: channel.title.trim().to_string(),
            image,
            current,
            day1,
            day2,
        })
    }

    // Helper method to load the bundled sample feed
    #[cfg(test)]
    pub fn load_sample_feed(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(SAMPLE_FEED_PATH)
    }
}

// Decodes the document using the encoding named in its XML declaration,
// UTF-8 when there is none. A byte order mark overrides both.
fn decode_document(raw: &[u8]) -> Result<Cow<'_, str>, ParseError> {
    let encoding = match declared_encoding(raw)? {
        Some(label) => Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
            ParseError::Malformed(format!("unsupported encoding '{}'", label))
        })?,
        None => UTF_8,
    };

    let (text, used, had_errors) = encoding.decode(raw);
    if had_errors {
        return Err(ParseError::Malformed(format!(
            "document is not valid {}",
            used.name()
        )));
    }
    Ok(text)
}

// Encoding label from the XML declaration, if the document starts with one
fn declared_encoding(raw: &[u8]) -> Result<Option<String>, ParseError> {
    let mut reader = Reader::from_reader(raw);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Decl(decl)) => {
                return match decl.encoding() {
                    Some(Ok(label)) => Ok(Some(String::from_utf8_lossy(&label).into_owned())),
                    Some(Err(e)) => Err(ParseError::Malformed(format!(
                        "unreadable encoding in XML declaration: {}",
                        e
                    ))),
                    None => Ok(None),
                };
            }
            // Leading byte order mark or whitespace
            Ok(Event::Text(_)) => (),
            // No declaration, or a BOM-prefixed document the byte reader cannot read
            _ => return Ok(None),
        }
    }
}

// Walks the whole document once so truncated or mis-nested markup is rejected
// before the deserializer gets a chance to read past it.
fn check_well_formed(raw: &str) -> Result<(), ParseError> {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut saw_root = false;
    let mut root_closed = false;

    let after_root =
        || ParseError::Malformed("content after the root element".to_string());

    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                if root_closed {
                    return Err(after_root());
                }
                depth += 1;
                saw_root = true;
            }
            Ok(Event::End(_)) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    root_closed = true;
                }
            }
            Ok(Event::Empty(_)) => {
                if root_closed {
                    return Err(after_root());
                }
                if depth == 0 {
                    root_closed = true;
                }
                saw_root = true;
            }
            Ok(Event::Text(text)) if depth == 0 && !text.iter().all(u8::is_ascii_whitespace) => {
                return Err(ParseError::Malformed(
                    "text outside the root element".to_string(),
                ));
            }
            Ok(Event::CData(_)) if depth == 0 => {
                return Err(ParseError::Malformed(
                    "CDATA outside the root element".to_string(),
                ));
            }
            Ok(Event::Eof) => break,
            Ok(_) => (),
            Err(e) => {
                return Err(ParseError::Malformed(format!(
                    "{} at position {}",
                    e,
                    reader.error_position()
                )))
            }
        }
    }

    if !saw_root {
        return Err(ParseError::Malformed("document has no root element".to_string()));
    }
    if depth != 0 {
        return Err(ParseError::Malformed(format!(
            "{} element(s) left unclosed",
            depth
        )));
    }
    Ok(())
}

fn parse_item(item: &XmlItem, day: &'static str, units: UnitSystem) -> Result<DayEntry, ParseError> {
    let description = item.description.trim().to_string();
    let mut fields = split_description(&description, day)?;
    restrict_units(&mut fields, day, units)?;

    let published = match item.pub_date.as_deref().map(str::trim) {
        Some(raw) => match DateTime::parse_from_rfc2822(raw) {
            Ok(published) => Some(published),
            Err(e) => {
                debug!("Ignoring pubDate '{}' of {} entry: {}", raw, day, e);
                None
            }
        },
        None => None,
    };

    Ok(DayEntry {
        title: truncate_title(&item.title).to_string(),
        description,
        link: item
            .link
            .as_deref()
            .map(str::trim)
            .filter(|link| !link.is_empty())
            .map(str::to_string),
        published,
        fields,
    })
}

// Keeps the part of an item title before `", Max Temp"`.
pub fn truncate_title(title: &str) -> &str {
    let title = title.trim();
    match title.find(TITLE_MARKER) {
        Some(idx) => title[..idx].trim_end(),
        None => title,
    }
}

// Splits `Label: value, Other Label: value` into a label → value map.
//
// Labels are trimmed and have spaces replaced by underscores. Only the first
// colon of a part separates label from value, so `Sunrise: 05:06 BST` keeps
// its time intact. Blank parts are skipped; a part with no colon or an empty
// label fails the whole description.
pub fn split_description(
    description: &str,
    day: &'static str,
) -> Result<HashMap<String, String>, ParseError> {
    let mut fields = HashMap::new();

    for part in description.split(',') {
        if part.trim().is_empty() {
            continue;
        }

        let malformed = || ParseError::MalformedDescription {
            day,
            part: part.trim().to_string(),
        };

        let (label, value) = part.split_once(':').ok_or_else(malformed)?;
        let label = label.trim();
        if label.is_empty() {
            return Err(malformed());
        }

        fields.insert(label.replace(' ', "_"), value.trim().to_string());
    }

    Ok(fields)
}

// First temperature token of the requested scale in `text`, e.g. `"20°C"`
// out of `"20°C (68°F)"`.
pub fn temperature_token(text: &str, units: UnitSystem) -> Option<&str> {
    let pattern = match units {
        UnitSystem::Metric => &*CELSIUS_PATTERN,
        UnitSystem::Imperial => &*FAHRENHEIT_PATTERN,
    };
    pattern.find(text).map(|m| m.as_str())
}

// Rewrites Min_Temp/Max_Temp to the single token of the selected scale.
// Fields missing from the description stay missing.
fn restrict_units(
    fields: &mut HashMap<String, String>,
    day: &'static str,
    units: UnitSystem,
) -> Result<(), ParseError> {
    for field in [MIN_TEMP_FIELD, MAX_TEMP_FIELD] {
        let Some(value) = fields.get_mut(field) else {
            continue;
        };

        match temperature_token(value, units).map(str::to_string) {
            Some(token) => *value = token,
            None => {
                return Err(ParseError::MissingTemperature {
                    day,
                    field,
                    unit: units,
                    value: value.clone(),
                })
            }
        }
    }
    Ok(())
}

// Sample file path (the actual file is stored in the samples directory)
pub const SAMPLE_FEED_PATH: &str = "samples/3dayforecast.rss";

// A small sample for inline testing
pub const SMALL_SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>BBC Weather - Forecast for Limavady, GB</title>
    <link>http://www.bbc.co.uk/weather/2644411</link>
    <image>
      <title>BBC Weather - Forecast for Limavady, GB</title>
      <url>http://static.bbci.co.uk/weather/0.3.203/images/icons/individual_57_icons/en_on_light_bg/7.gif</url>
      <link>http://www.bbc.co.uk/weather/2644411</link>
    </image>
    <item>
      <title>Today: Sunny, Max Temp: 20&#xB0;C (68&#xB0;F), Min Temp: 11&#xB0;C (52&#xB0;F)</title>
      <link>http://www.bbc.co.uk/weather/2644411?day=0</link>
      <description>Max Temp: 20&#xB0;C (68&#xB0;F), Min Temp: 11&#xB0;C (52&#xB0;F), Wind Direction: SW, Wind Speed: 9mph, Sunrise: 05:06 BST</description>
      <pubDate>Tue, 01 Jul 2008 05:00:00 +0100</pubDate>
    </item>
    <item>
      <title>Wednesday: Light Rain, Max Temp: 15&#xB0;C (59&#xB0;F), Min Temp: 9&#xB0;C (48&#xB0;F)</title>
      <link>http://www.bbc.co.uk/weather/2644411?day=1</link>
      <description>Max Temp: 15&#xB0;C (59&#xB0;F), Min Temp: 9&#xB0;C (48&#xB0;F), Wind Direction: W, Wind Speed: 14mph</description>
      <pubDate>Wed, 02 Jul 2008 05:00:00 +0100</pubDate>
    </item>
    <item>
      <title>Thursday: Grey Cloud, Max Temp: 17&#xB0;C (63&#xB0;F), Min Temp: 10&#xB0;C (50&#xB0;F)</title>
      <link>http://www.bbc.co.uk/weather/2644411?day=2</link>
      <description>Max Temp: 17&#xB0;C (63&#xB0;F), Min Temp: 10&#xB0;C (50&#xB0;F), Wind Direction: NW, Wind Speed: 11mph</description>
      <pubDate>Thu, 03 Jul 2008 05:00:00 +0100</pubDate>
    </item>
  </channel>
</rss>
"#;

// The small sample re-encoded as ISO-8859-1, degree signs as raw 0xB0 bytes
#[cfg(test)]
pub(crate) fn latin1_sample_feed() -> Vec<u8> {
    SMALL_SAMPLE_FEED
        .replace(r#"encoding="UTF-8""#, r#"encoding="ISO-8859-1""#)
        .replace("&#xB0;", "°")
        .chars()
        .map(|c| u8::try_from(u32::from(c)).expect("sample is Latin-1"))
        .collect()
}
