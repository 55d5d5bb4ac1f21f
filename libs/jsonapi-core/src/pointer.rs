//! RFC 6901 JSON pointers into request documents.

use std::borrow::Cow;
use std::fmt;

/// Escapes one reference token: `~` becomes `~0`, `/` becomes `~1`.
pub fn escape_token(token: &str) -> Cow<'_, str> {
    if token.contains(['~', '/']) {
        Cow::Owned(token.replace('~', "~0").replace('/', "~1"))
    } else {
        Cow::Borrowed(token)
    }
}

/// Pointer built token by token; the empty pointer addresses the whole document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct JsonPointer(String);

impl JsonPointer {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn push(mut self, token: &str) -> Self {
        self.0.push('/');
        self.0.push_str(&escape_token(token));
        self
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<JsonPointer> for String {
    fn from(p: JsonPointer) -> Self {
        p.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_tilde_before_slash() {
        assert_eq!(escape_token("a/b~c"), "a~1b~0c");
        assert_eq!(escape_token("~1"), "~01");
        assert!(matches!(escape_token("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn builds_pointers() {
        assert_eq!(JsonPointer::root().as_str(), "");
        let p = JsonPointer::root()
            .push("data")
            .push("attributes")
            .push("first/name");
        assert_eq!(p.to_string(), "/data/attributes/first~1name");
    }
}
