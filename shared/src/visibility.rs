use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Layer visibility. Project descriptors carry it as the strings `"true"`/`"false"`;
/// anything else is rejected when the descriptor is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    Visible,
    #[default]
    Hidden,
}

impl Visibility {
    pub const fn is_visible(self) -> bool {
        matches!(self, Self::Visible)
    }

    pub const fn toggled(self) -> Self {
        match self {
            Self::Visible => Self::Hidden,
            Self::Hidden => Self::Visible,
        }
    }

    pub const fn as_flag(self) -> &'static str {
        match self {
            Self::Visible => "true",
            Self::Hidden => "false",
        }
    }
}

impl From<bool> for Visibility {
    fn from(visible: bool) -> Self {
        if visible { Self::Visible } else { Self::Hidden }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_flag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected \"true\" or \"false\", got {0:?}")]
pub struct InvalidFlag(pub String);

fn parse_flag(raw: &str) -> Result<bool, InvalidFlag> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(InvalidFlag(raw.to_string()))
    }
}

impl FromStr for Visibility {
    type Err = InvalidFlag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_flag(s).map(Self::from)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Text(String),
}

impl RawFlag {
    fn into_bool(self) -> Result<bool, InvalidFlag> {
        match self {
            Self::Bool(b) => Ok(b),
            Self::Text(s) => parse_flag(&s),
        }
    }
}

impl Serialize for Visibility {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_flag())
    }
}

impl<'de> Deserialize<'de> for Visibility {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawFlag::deserialize(deserializer)?
            .into_bool()
            .map(Self::from)
            .map_err(D::Error::custom)
    }
}

/// `#[serde(with = "string_flag")]` for plain `bool` fields stored as `"true"`/`"false"`.
pub mod string_flag {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::RawFlag;

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "true" } else { "false" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        RawFlag::deserialize(deserializer)?
            .into_bool()
            .map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::{InvalidFlag, Visibility};

    #[derive(serde::Deserialize)]
    struct Options {
        visibility: Visibility,
        #[serde(with = "super::string_flag", default)]
        isbaselayer: bool,
    }

    #[test]
    fn parses_string_flags() {
        let opts: Options =
            serde_json::from_str(r#"{"visibility":"true","isbaselayer":"false"}"#).unwrap();
        assert_eq!(opts.visibility, Visibility::Visible);
        assert!(!opts.isbaselayer);
    }

    #[test]
    fn accepts_json_booleans_and_mixed_case() {
        let opts: Options =
            serde_json::from_str(r#"{"visibility":false,"isbaselayer":"TRUE"}"#).unwrap();
        assert_eq!(opts.visibility, Visibility::Hidden);
        assert!(opts.isbaselayer);
    }

    #[test]
    fn rejects_unknown_flag_values() {
        let err = serde_json::from_str::<Options>(r#"{"visibility":"maybe"}"#)
            .err()
            .expect("unknown flag must not parse");
        assert!(err.to_string().contains("maybe"));
    }

    #[test]
    fn invalid_flag_names_the_rejected_value() {
        let err = " yes".parse::<Visibility>().unwrap_err();
        assert_eq!(err, InvalidFlag(" yes".into()));
        assert_eq!(err.to_string(), r#"expected "true" or "false", got " yes""#);
        let source: &dyn std::error::Error = &err;
        assert!(source.source().is_none());
    }

    #[test]
    fn serializes_back_to_strings() {
        assert_eq!(
            serde_json::to_string(&Visibility::Visible).unwrap(),
            "\"true\""
        );
        assert_eq!(Visibility::Hidden.toggled(), Visibility::Visible);
    }
}
