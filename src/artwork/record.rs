//! Pending-artwork request record.

use crate::config::{TEXT_MAX, URL_MAX};
use heapless::String;

/// One queued artwork request.
///
/// Field lengths are fixed so a record can be copied by value through
/// the queue without allocating. External inputs of arbitrary length
/// are truncated, never overflowed.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MetadataRecord {
    /// Artwork URL.
    pub url: String<URL_MAX>,
    /// Track title, for the UI labels.
    pub track: String<TEXT_MAX>,
    /// Artist name, for the UI labels.
    pub artist: String<TEXT_MAX>,
}

impl MetadataRecord {
    /// Build a record from external text values, truncating each field
    /// to its capacity. Truncation is per character so the stored
    /// strings stay valid UTF-8.
    pub fn new(url: &str, track: &str, artist: &str) -> Self {
        Self {
            url: truncated(url),
            track: truncated(track),
            artist: truncated(artist),
        }
    }
}

/// Copy `src` into a bounded string, dropping characters that do not fit.
fn truncated<const N: usize>(src: &str) -> String<N> {
    let mut out: String<N> = String::new();
    for c in src.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_under_capacity_are_copied_exactly() {
        let rec = MetadataRecord::new("https://x/img.png", "Track", "Artist");
        assert_eq!(rec.url.as_str(), "https://x/img.png");
        assert_eq!(rec.track.as_str(), "Track");
        assert_eq!(rec.artist.as_str(), "Artist");
    }

    #[test]
    fn oversized_fields_are_truncated_at_capacity() {
        let long_url: std::string::String = "u".repeat(URL_MAX + 40);
        let long_name: std::string::String = "n".repeat(TEXT_MAX + 40);
        let rec = MetadataRecord::new(&long_url, &long_name, &long_name);
        assert_eq!(rec.url.len(), URL_MAX);
        assert_eq!(rec.track.len(), TEXT_MAX);
        assert_eq!(rec.artist.len(), TEXT_MAX);
        assert_eq!(rec.url.as_str(), &long_url[..URL_MAX]);
    }

    #[test]
    fn truncation_respects_utf8_boundaries() {
        // 'ä' is two bytes; an odd byte budget must not split it.
        let name: std::string::String = "ä".repeat(TEXT_MAX);
        let rec = MetadataRecord::new("u", &name, &name);
        assert!(rec.track.len() <= TEXT_MAX);
        assert_eq!(rec.track.len() % 2, 0);
        assert!(rec.track.chars().all(|c| c == 'ä'));
    }

    #[test]
    fn empty_fields_are_allowed() {
        let rec = MetadataRecord::new("", "", "");
        assert!(rec.url.is_empty());
        assert!(rec.track.is_empty());
        assert!(rec.artist.is_empty());
    }
}
