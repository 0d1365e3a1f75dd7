//! Country identifiers and static presentation data
//!
//! The canonical aggregation key is the 2-letter ISO code. Display names
//! and flag emoji are derived presentation data and never used as keys.

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A country attribution for a click.
///
/// `Local` marks clicks from loopback/private addresses when no default
/// country is configured; `Unknown` marks failed resolution. Variant order
/// matters: the derived `Ord` sorts ISO codes lexicographically with the
/// sentinels last, which is the ranking tie-break rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CountryCode {
    /// Uppercase ASCII ISO-3166 alpha-2 code
    Iso([u8; 2]),
    /// Request originated from a loopback or private address
    Local,
    /// Resolution failed at every strategy
    Unknown,
}

impl CountryCode {
    /// Parse a 2-letter code, normalizing to uppercase.
    ///
    /// Returns `None` for anything that is not exactly two ASCII letters.
    pub fn from_iso(code: &str) -> Option<Self> {
        let bytes = code.as_bytes();
        if bytes.len() != 2 || !bytes.iter().all(|b| b.is_ascii_alphabetic()) {
            return None;
        }
        Some(Self::Iso([
            bytes[0].to_ascii_uppercase(),
            bytes[1].to_ascii_uppercase(),
        ]))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Iso(bytes) => std::str::from_utf8(bytes).unwrap_or("??"),
            Self::Local => "LOCAL",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// English display name, falling back to the code itself.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Local => "Local Network",
            Self::Unknown => "Unknown",
            Self::Iso(_) => {
                let name = iso_display_name(self.as_str());
                if name.is_empty() {
                    self.as_str()
                } else {
                    name
                }
            }
        }
    }

    /// Flag emoji built from regional indicator symbols.
    ///
    /// Sentinels and non-alphabetic bytes render as the white flag, matching
    /// what the game front-end shows for unattributed clicks.
    pub fn flag(&self) -> String {
        match self {
            Self::Iso(bytes) => bytes
                .iter()
                .map(|b| char::from_u32(0x1F1E6 + u32::from(b - b'A')).unwrap_or('\u{1F3F3}'))
                .collect(),
            Self::Local => "\u{1F3E0}".to_string(),
            Self::Unknown => "\u{1F3F3}".to_string(),
        }
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CountryCode {
    type Err = InvalidCountryCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOCAL" => Ok(Self::Local),
            "UNKNOWN" => Ok(Self::Unknown),
            other => Self::from_iso(other).ok_or(InvalidCountryCode),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidCountryCode;

impl fmt::Display for InvalidCountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("country code must be two ASCII letters or a known sentinel")
    }
}

impl std::error::Error for InvalidCountryCode {}

impl Serialize for CountryCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CountryCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CodeVisitor;

        impl Visitor<'_> for CodeVisitor {
            type Value = CountryCode;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a 2-letter country code or sentinel")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<CountryCode, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(CodeVisitor)
    }
}

/// English names for the countries the leaderboard commonly sees.
/// Codes outside this table yield an empty string and the caller falls
/// back to the raw code.
fn iso_display_name(code: &str) -> &'static str {
    match code {
        "KR" => "South Korea",
        "US" => "United States",
        "JP" => "Japan",
        "CN" => "China",
        "GB" => "United Kingdom",
        "DE" => "Germany",
        "FR" => "France",
        "CA" => "Canada",
        "AU" => "Australia",
        "BR" => "Brazil",
        "IN" => "India",
        "RU" => "Russia",
        "IT" => "Italy",
        "ES" => "Spain",
        "NL" => "Netherlands",
        "SE" => "Sweden",
        "NO" => "Norway",
        "DK" => "Denmark",
        "FI" => "Finland",
        "PL" => "Poland",
        "TR" => "Turkey",
        "TH" => "Thailand",
        "VN" => "Vietnam",
        "SG" => "Singapore",
        "MY" => "Malaysia",
        "ID" => "Indonesia",
        "PH" => "Philippines",
        "TW" => "Taiwan",
        "HK" => "Hong Kong",
        "MX" => "Mexico",
        "AR" => "Argentina",
        "CL" => "Chile",
        "CO" => "Colombia",
        "PE" => "Peru",
        "ZA" => "South Africa",
        "EG" => "Egypt",
        "IL" => "Israel",
        "AE" => "United Arab Emirates",
        "SA" => "Saudi Arabia",
        "IR" => "Iran",
        "PK" => "Pakistan",
        "BD" => "Bangladesh",
        "LK" => "Sri Lanka",
        "NP" => "Nepal",
        "MM" => "Myanmar",
        "KH" => "Cambodia",
        "LA" => "Laos",
        "BN" => "Brunei",
        "MN" => "Mongolia",
        "KZ" => "Kazakhstan",
        "UZ" => "Uzbekistan",
        "KG" => "Kyrgyzstan",
        "TJ" => "Tajikistan",
        "TM" => "Turkmenistan",
        "AF" => "Afghanistan",
        "IQ" => "Iraq",
        "SY" => "Syria",
        "JO" => "Jordan",
        "LB" => "Lebanon",
        "YE" => "Yemen",
        "OM" => "Oman",
        "QA" => "Qatar",
        "KW" => "Kuwait",
        "BH" => "Bahrain",
        "GE" => "Georgia",
        "AM" => "Armenia",
        "AZ" => "Azerbaijan",
        "BY" => "Belarus",
        "UA" => "Ukraine",
        "MD" => "Moldova",
        "RO" => "Romania",
        "BG" => "Bulgaria",
        "GR" => "Greece",
        "CY" => "Cyprus",
        "MT" => "Malta",
        "AL" => "Albania",
        "MK" => "North Macedonia",
        "ME" => "Montenegro",
        "RS" => "Serbia",
        "BA" => "Bosnia and Herzegovina",
        "HR" => "Croatia",
        "SI" => "Slovenia",
        "SK" => "Slovakia",
        "CZ" => "Czechia",
        "HU" => "Hungary",
        "AT" => "Austria",
        "CH" => "Switzerland",
        "LI" => "Liechtenstein",
        "LU" => "Luxembourg",
        "BE" => "Belgium",
        "PT" => "Portugal",
        "IE" => "Ireland",
        "IS" => "Iceland",
        "EE" => "Estonia",
        "LV" => "Latvia",
        "LT" => "Lithuania",
        "NZ" => "New Zealand",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes_iso_codes() {
        assert_eq!(CountryCode::from_iso("kr"), CountryCode::from_iso("KR"));
        assert_eq!(CountryCode::from_iso("KR").unwrap().as_str(), "KR");
        assert!(CountryCode::from_iso("KOR").is_none());
        assert!(CountryCode::from_iso("K1").is_none());
        assert!(CountryCode::from_iso("").is_none());
    }

    #[test]
    fn sentinels_round_trip_through_from_str() {
        assert_eq!("LOCAL".parse::<CountryCode>().unwrap(), CountryCode::Local);
        assert_eq!(
            "UNKNOWN".parse::<CountryCode>().unwrap(),
            CountryCode::Unknown
        );
        assert_eq!(
            "us".parse::<CountryCode>().unwrap(),
            CountryCode::from_iso("US").unwrap()
        );
        assert!("not-a-code".parse::<CountryCode>().is_err());
    }

    #[test]
    fn display_names_fall_back_to_the_code() {
        assert_eq!(CountryCode::from_iso("KR").unwrap().display_name(), "South Korea");
        assert_eq!(CountryCode::from_iso("ZZ").unwrap().display_name(), "ZZ");
        assert_eq!(CountryCode::Unknown.display_name(), "Unknown");
    }

    #[test]
    fn flags_use_regional_indicators() {
        assert_eq!(CountryCode::from_iso("KR").unwrap().flag(), "🇰🇷");
        assert_eq!(CountryCode::from_iso("US").unwrap().flag(), "🇺🇸");
        assert_eq!(CountryCode::Unknown.flag(), "🏳");
    }

    #[test]
    fn ordering_puts_sentinels_after_iso_codes() {
        let kr = CountryCode::from_iso("KR").unwrap();
        let us = CountryCode::from_iso("US").unwrap();
        assert!(kr < us);
        assert!(us < CountryCode::Local);
        assert!(CountryCode::Local < CountryCode::Unknown);
    }

    #[test]
    fn serde_round_trip() {
        let kr = CountryCode::from_iso("KR").unwrap();
        let json = serde_json::to_string(&kr).unwrap();
        assert_eq!(json, "\"KR\"");
        assert_eq!(serde_json::from_str::<CountryCode>(&json).unwrap(), kr);
    }
}
