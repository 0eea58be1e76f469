use std::fmt;

use crate::constants::DEFAULT_NAMESPACE;
use crate::constants::PATH_SEPARATOR;
use crate::KeyFormatError;

/// A feature key that satisfies the coordination tree's naming rules
///
/// Keys are relative: `blah` or `checkout/new-flow`, never `/blah`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureKey(String);

impl FeatureKey {
    pub fn parse(raw: &str) -> Result<Self, KeyFormatError> {
        if raw.is_empty() {
            return Err(KeyFormatError::Empty);
        }
        if raw.starts_with(PATH_SEPARATOR) {
            return Err(KeyFormatError::LeadingSeparator(raw.to_string()));
        }
        if raw.ends_with(PATH_SEPARATOR) {
            return Err(KeyFormatError::TrailingSeparator(raw.to_string()));
        }

        if let Some((position, c)) = raw.chars().enumerate().find(|(_, c)| is_excluded(*c)) {
            return Err(KeyFormatError::IllegalCharacter {
                key: raw.to_string(),
                code: c as u32,
                position,
            });
        }

        for segment in raw.split(PATH_SEPARATOR) {
            match segment {
                "" => return Err(KeyFormatError::EmptySegment(raw.to_string())),
                "." | ".." => {
                    return Err(KeyFormatError::RelativeSegment {
                        key: raw.to_string(),
                        segment: segment.to_string(),
                    })
                }
                _ => {}
            }
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FeatureKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for FeatureKey {
    type Error = KeyFormatError;

    fn try_from(raw: &str) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

/// Code points a node name may not contain
fn is_excluded(c: char) -> bool {
    let code = c as u32;
    if matches!(
        code,
        0x0000..=0x001F | 0x007F..=0x009F | 0xE000..=0xF8FF | 0xFFF0..=0xFFFF | 0xF_0000..=0xF_FFFF
    ) {
        return true;
    }
    // xFFFE and xFFFF of planes 1 to 14
    (0x1_0000..0xF_0000).contains(&code) && (code & 0xFFFE) == 0xFFFE
}

/// Force a leading and trailing `/`. Empty input falls back to the default
/// namespace.
pub fn normalize_namespace(raw: &str) -> String {
    if raw.is_empty() {
        return DEFAULT_NAMESPACE.to_string();
    }

    let mut namespace = String::with_capacity(raw.len() + 2);
    if !raw.starts_with(PATH_SEPARATOR) {
        namespace.push(PATH_SEPARATOR);
    }
    namespace.push_str(raw);
    if !namespace.ends_with(PATH_SEPARATOR) {
        namespace.push(PATH_SEPARATOR);
    }
    namespace
}
