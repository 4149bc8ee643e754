use serde::Serialize;

/// Persisted sidebar visibility for one destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityFlag {
    Hidden,
    Shown,
}

impl VisibilityFlag {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hidden => "1",
            Self::Shown => "0",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "1" => Some(Self::Hidden),
            "0" => Some(Self::Shown),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_form_is_single_character() {
        assert_eq!(VisibilityFlag::Hidden.as_str(), "1");
        assert_eq!(VisibilityFlag::Shown.as_str(), "0");
        assert_eq!(VisibilityFlag::parse("1"), Some(VisibilityFlag::Hidden));
        assert_eq!(VisibilityFlag::parse("0"), Some(VisibilityFlag::Shown));
    }

    #[test]
    fn unknown_values_are_rejected() {
        assert_eq!(VisibilityFlag::parse(""), None);
        assert_eq!(VisibilityFlag::parse("true"), None);
        assert_eq!(VisibilityFlag::parse("10"), None);
    }
}
