//! Document metadata

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Free-form metadata keys a codec may or may not be able to store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FileProperty {
    Name,
    Title,
    Author,
    Album,
    Copyright,
    Date,
    Genre,
    Comment,
    Software,
    Source,
    TrackNumber,
    Compression,
    MimeType,
}

impl FileProperty {
    pub const ALL: [FileProperty; 13] = [
        FileProperty::Name,
        FileProperty::Title,
        FileProperty::Author,
        FileProperty::Album,
        FileProperty::Copyright,
        FileProperty::Date,
        FileProperty::Genre,
        FileProperty::Comment,
        FileProperty::Software,
        FileProperty::Source,
        FileProperty::TrackNumber,
        FileProperty::Compression,
        FileProperty::MimeType,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FileProperty::Name => "Name",
            FileProperty::Title => "Title",
            FileProperty::Author => "Author",
            FileProperty::Album => "Album",
            FileProperty::Copyright => "Copyright",
            FileProperty::Date => "Date",
            FileProperty::Genre => "Genre",
            FileProperty::Comment => "Comment",
            FileProperty::Software => "Software",
            FileProperty::Source => "Source",
            FileProperty::TrackNumber => "Track Number",
            FileProperty::Compression => "Compression",
            FileProperty::MimeType => "Mime Type",
        }
    }
}

impl fmt::Display for FileProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rate, resolution, size and properties of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileInfo {
    /// Length in samples per track
    pub length: u64,
    /// Number of tracks
    pub tracks: usize,
    /// Sample rate in Hz
    pub rate: f64,
    /// Bits per sample
    pub bits: u32,
    properties: BTreeMap<FileProperty, String>,
}

impl Default for FileInfo {
    fn default() -> Self {
        Self {
            length: 0,
            tracks: 0,
            rate: 48000.0,
            bits: 24,
            properties: BTreeMap::new(),
        }
    }
}

impl FileInfo {
    pub fn new(length: u64, tracks: usize, rate: f64, bits: u32) -> Self {
        Self {
            length,
            tracks,
            rate,
            bits,
            properties: BTreeMap::new(),
        }
    }

    pub fn get(&self, property: FileProperty) -> Option<&str> {
        self.properties.get(&property).map(String::as_str)
    }

    pub fn set(&mut self, property: FileProperty, value: impl Into<String>) {
        self.properties.insert(property, value.into());
    }

    pub fn with(mut self, property: FileProperty, value: impl Into<String>) -> Self {
        self.set(property, value);
        self
    }

    pub fn remove(&mut self, property: FileProperty) -> Option<String> {
        self.properties.remove(&property)
    }

    pub fn contains(&self, property: FileProperty) -> bool {
        self.properties.contains_key(&property)
    }

    pub fn properties(&self) -> impl Iterator<Item = (FileProperty, &str)> {
        self.properties.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Properties set here that the given list cannot preserve
    pub fn unsupported_by(&self, supported: &[FileProperty]) -> Vec<FileProperty> {
        self.properties
            .keys()
            .filter(|p| !supported.contains(p))
            .copied()
            .collect()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.rate > 0.0 {
            self.length as f64 / self.rate
        } else {
            0.0
        }
    }

    /// Rough heap footprint, used for undo memory accounting
    pub fn memory(&self) -> usize {
        std::mem::size_of::<Self>()
            + self
                .properties
                .values()
                .map(|v| v.len() + std::mem::size_of::<(FileProperty, String)>())
                .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties() {
        let mut info = FileInfo::new(48000, 2, 48000.0, 16)
            .with(FileProperty::Title, "Take 3")
            .with(FileProperty::Comment, "room mic");
        assert_eq!(info.get(FileProperty::Title), Some("Take 3"));
        assert_eq!(info.duration(), 1.0);
        assert_eq!(
            info.unsupported_by(&[FileProperty::Title]),
            vec![FileProperty::Comment]
        );
        assert_eq!(info.remove(FileProperty::Comment).as_deref(), Some("room mic"));
        assert!(info.unsupported_by(&[FileProperty::Title]).is_empty());
    }

    #[test]
    fn test_serde_round_trip() {
        let info = FileInfo::new(10, 1, 44100.0, 24).with(FileProperty::Author, "me");
        let json = serde_json::to_string(&info).unwrap();
        let back: FileInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(FileProperty::TrackNumber.to_string(), "Track Number");
        assert_eq!(FileProperty::ALL.len(), 13);
    }
}
