use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ModelError;

/// Tag used when an image reference does not carry one.
pub const DEFAULT_IMAGE_TAG: &str = "latest";

/// Container image reference: name plus tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    name: String,
    tag: String,
}

impl ImageRef {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// `name:tag`, the form the container engine expects.
    pub fn full_name(&self) -> String {
        format!("{}:{}", self.name, self.tag)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

impl FromStr for ImageRef {
    type Err = ModelError;

    /// Parses `name[:tag]`.
    ///
    /// A colon that belongs to a registry port (`host:5000/image`) is part of the name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(ModelError::InvalidImage(s.to_string()));
        }

        let (name, tag) = match s.rfind(':') {
            Some(idx) if !s[idx..].contains('/') => (&s[..idx], &s[idx + 1..]),
            _ => (s, DEFAULT_IMAGE_TAG),
        };
        if name.is_empty() || tag.is_empty() {
            return Err(ModelError::InvalidImage(s.to_string()));
        }
        Ok(Self::new(name, tag))
    }
}

impl Serialize for ImageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ImageRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_defaults_to_latest() {
        let image: ImageRef = "procem/manager".parse().unwrap();
        assert_eq!(image.name(), "procem/manager");
        assert_eq!(image.tag(), "latest");
        assert_eq!(image.full_name(), "procem/manager:latest");
    }

    #[test]
    fn explicit_tag_is_kept() {
        let image: ImageRef = "procem/manager:0.5".parse().unwrap();
        assert_eq!(image.full_name(), "procem/manager:0.5");
    }

    #[test]
    fn registry_port_is_not_a_tag() {
        let image: ImageRef = "registry:5000/procem/writer".parse().unwrap();
        assert_eq!(image.name(), "registry:5000/procem/writer");
        assert_eq!(image.tag(), "latest");

        let tagged: ImageRef = "registry:5000/procem/writer:1.2".parse().unwrap();
        assert_eq!(tagged.name(), "registry:5000/procem/writer");
        assert_eq!(tagged.tag(), "1.2");
    }

    #[test]
    fn malformed_references_are_rejected() {
        assert!("".parse::<ImageRef>().is_err());
        assert!(":tag".parse::<ImageRef>().is_err());
        assert!("image:".parse::<ImageRef>().is_err());
        assert!("my image".parse::<ImageRef>().is_err());
    }

    #[test]
    fn serde_uses_string_form() {
        let image: ImageRef = "a/b:c".parse().unwrap();
        let json = serde_json::to_string(&image).unwrap();
        assert_eq!(json, r#""a/b:c""#);
        let back: ImageRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, image);
    }
}
