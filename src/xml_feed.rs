use serde::{Deserialize, Serialize};

// Structures for RSS deserialization. Only the elements the parser reads are
// declared; anything else in the feed (language, copyright, guids) is
// skipped by the deserializer.
#[derive(Debug, PartialEq, Default, Deserialize, Serialize)]
#[serde(default, rename = "rss")]
pub struct XmlRss {
    pub channel: Option<XmlChannel>,
}

#[derive(Debug, PartialEq, Default, Deserialize, Clone, Serialize)]
#[serde(default)]
pub struct XmlChannel {
    pub title: String,
    pub link: String,
    pub description: String,
    pub image: Option<XmlImage>,
    #[serde(rename = "item")]
    pub items: Vec<XmlItem>,
}

#[derive(Debug, PartialEq, Default, Deserialize, Clone, Serialize)]
#[serde(default)]
pub struct XmlImage {
    pub url: String,
    pub title: String,
    pub link: String,
}

#[derive(Debug, PartialEq, Default, Deserialize, Clone, Serialize)]
#[serde(default)]
pub struct XmlItem {
    pub title: String,
    pub link: Option<String>,
    pub description: String,
    #[serde(rename = "pubDate")]
    pub pub_date: Option<String>,
}
