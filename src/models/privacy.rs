//! Vimeo privacy view levels.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Who can view an uploaded video.
///
/// Mirrors the `privacy.view` values accepted by the Vimeo API.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyView {
    #[default]
    Anybody,
    Contacts,
    Disable,
    Nobody,
    Password,
    Unlisted,
    Users,
}

impl PrivacyView {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyView::Anybody => "anybody",
            PrivacyView::Contacts => "contacts",
            PrivacyView::Disable => "disable",
            PrivacyView::Nobody => "nobody",
            PrivacyView::Password => "password",
            PrivacyView::Unlisted => "unlisted",
            PrivacyView::Users => "users",
        }
    }
}

impl fmt::Display for PrivacyView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not a known view level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPrivacyView(pub String);

impl FromStr for PrivacyView {
    type Err = UnknownPrivacyView;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anybody" => Ok(PrivacyView::Anybody),
            "contacts" => Ok(PrivacyView::Contacts),
            "disable" => Ok(PrivacyView::Disable),
            "nobody" => Ok(PrivacyView::Nobody),
            "password" => Ok(PrivacyView::Password),
            "unlisted" => Ok(PrivacyView::Unlisted),
            "users" => Ok(PrivacyView::Users),
            _ => Err(UnknownPrivacyView(s.to_string())),
        }
    }
}

/// The `privacy` object sent to Vimeo and stored with each record.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Privacy {
    pub view: PrivacyView,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels_case_insensitively() {
        assert_eq!("Unlisted".parse::<PrivacyView>(), Ok(PrivacyView::Unlisted));
        assert_eq!(" nobody ".parse::<PrivacyView>(), Ok(PrivacyView::Nobody));
    }

    #[test]
    fn rejects_unknown_level() {
        let err = "friends".parse::<PrivacyView>().unwrap_err();
        assert_eq!(err.0, "friends");
    }

    #[test]
    fn serializes_as_nested_view() {
        let json = serde_json::to_value(Privacy::default()).unwrap();
        assert_eq!(json, serde_json::json!({ "view": "anybody" }));
    }
}
