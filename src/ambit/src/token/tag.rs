use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};

/// A case-insensitive qualifier telling apart registrations under one token.
///
/// Tags are normalized to lowercase when they are created, so `"Stripe"`,
/// `"stripe"` and `"STRIPE"` are the same tag everywhere: in registration, in
/// resolution and in discovery queries. The absent tag is `"default"`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(Cow<'static, str>);

impl Tag {
    pub const DEFAULT: Tag = Tag(Cow::Borrowed("default"));

    pub fn new(tag: &str) -> Self {
        Self(Cow::Owned(tag.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }
}

impl Default for Tag {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl Debug for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "Tag({:?})", self.0)
    }
}

impl From<&str> for Tag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for Tag {
    fn from(tag: String) -> Self {
        Self::new(&tag)
    }
}

impl From<Option<&str>> for Tag {
    fn from(tag: Option<&str>) -> Self {
        tag.map_or(Self::DEFAULT, Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_new_succeeds_when_normalizing_case() {
        assert_eq!(Tag::new("Stripe"), Tag::new("stripe"));
        assert_eq!(Tag::new("STRIPE").as_str(), "stripe");
        assert_ne!(Tag::new("stripe"), Tag::new("paypal"));
    }

    #[test]
    fn tag_default_succeeds() {
        assert!(Tag::default().is_default());
        assert!(Tag::from(None).is_default());
        assert!(Tag::new("Default").is_default());
        assert_eq!(Tag::default().to_string(), "default");
    }
}
