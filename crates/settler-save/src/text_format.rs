//! Line-level syntax of the text save format.
//!
//! A file is a list of sections. Each starts with a header line
//! `[name param]` and is followed by `key=value` settings:
//!
//! ```text
//! [flag 3]
//! pos=12,40
//! length=2,0,0,4,0,0
//! ```
//!
//! Malformed lines are logged and skipped, never fatal. Blank lines and
//! anything before the first header are ignored.

use crate::config::TextOptions;
use crate::error::LoadError;
use settler_core::pos::{MapGeometry, MapPos};

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub param: Option<String>,
    pub settings: Vec<Setting>,
}

impl Section {
    /// Value of the first setting named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings
            .iter()
            .find(|s| s.key == key)
            .map(|s| s.value.as_str())
    }

    /// `name param`, as written in the header.
    pub fn label(&self) -> String {
        match &self.param {
            Some(param) => format!("{} {}", self.name, param),
            None => self.name.clone(),
        }
    }
}

/// Split `text` into sections.
pub fn parse_sections(text: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();

    for (number, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix('[') {
            let Some(end) = header.find(']') else {
                tracing::warn!(target: "settler::save", line = number + 1, "malformed section header: `{line}`");
                continue;
            };
            let header = header[..end].trim();
            let (name, param) = match header.split_once(char::is_whitespace) {
                Some((name, param)) => (name, Some(param.trim_start().to_string())),
                None => (header, None),
            };
            sections.push(Section {
                name: name.to_string(),
                param,
                settings: Vec::new(),
            });
            continue;
        }

        let Some(section) = sections.last_mut() else {
            continue;
        };
        match line.split_once('=') {
            Some((key, value)) => section.settings.push(Setting {
                key: key.trim().to_string(),
                value: value.trim_start().to_string(),
            }),
            None => {
                tracing::warn!(target: "settler::save", line = number + 1, "malformed setting line: `{line}`");
            }
        }
    }

    sections
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// Leading decimal integer of `text`, zero if there is none.
///
/// Leading whitespace and a sign are accepted; parsing stops at the first
/// non-digit. Out-of-range values saturate.
pub fn parse_leading_int(text: &str) -> i64 {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| acc.saturating_mul(10).saturating_add((d - b'0') as i64));
    if negative { -magnitude } else { magnitude }
}

/// The whole of `text` as an integer, or `None`.
pub fn parse_exact_int(text: &str) -> Option<i64> {
    text.trim().parse().ok()
}

/// Narrowing from a parsed integer, keeping the low bits.
pub trait FromInt: Copy {
    fn from_int(value: i64) -> Self;
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl FromInt for $ty {
                fn from_int(value: i64) -> Self {
                    value as $ty
                }
            }
        )*
    };
}

impl_from_int!(u8, i8, u16, i16, u32, i32, i64);

// ---------------------------------------------------------------------------
// Field reader
// ---------------------------------------------------------------------------

/// Reads typed values out of one section, applying the numeric policy.
pub struct Fields<'a> {
    section: &'a Section,
    strict: bool,
}

impl<'a> Fields<'a> {
    pub fn new(section: &'a Section, options: &TextOptions) -> Self {
        Self {
            section,
            strict: options.strict_numbers,
        }
    }

    fn invalid(&self, key: &str, value: &str) -> LoadError {
        LoadError::InvalidNumber {
            section: self.section.label(),
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    fn int(&self, key: &str, value: &str) -> Result<i64, LoadError> {
        if self.strict {
            parse_exact_int(value).ok_or_else(|| self.invalid(key, value))
        } else {
            Ok(parse_leading_int(value))
        }
    }

    /// A single number.
    pub fn num<T: FromInt>(&self, key: &str, value: &str) -> Result<T, LoadError> {
        self.int(key, value).map(T::from_int)
    }

    /// A comma-separated list filling `target` from the front. Missing
    /// trailing entries keep their value; extra entries are ignored.
    pub fn array<T: FromInt>(&self, key: &str, value: &str, target: &mut [T]) -> Result<(), LoadError> {
        self.array_len(key, value, target).map(|_| ())
    }

    /// Like [`Fields::array`], returning how many entries the value supplied.
    pub fn array_len<T: FromInt>(&self, key: &str, value: &str, target: &mut [T]) -> Result<usize, LoadError> {
        let mut filled = 0;
        for (slot, item) in target.iter_mut().zip(value.split(',')) {
            *slot = self.num(key, item)?;
            filled += 1;
        }
        Ok(filled)
    }

    /// A `col,row` position. Without a comma the position is the origin.
    pub fn pos(&self, geometry: &MapGeometry, key: &str, value: &str) -> Result<MapPos, LoadError> {
        match value.split_once(',') {
            Some((col, row)) => {
                let col: u32 = self.num(key, col)?;
                let row: u32 = self.num(key, row)?;
                Ok(geometry.encode(col, row))
            }
            None if self.strict => Err(self.invalid(key, value)),
            None => Ok(MapPos::default()),
        }
    }

    /// A setting that must be present.
    pub fn require(&self, key: &'static str) -> Result<&'a str, LoadError> {
        self.section.get(key).ok_or_else(|| LoadError::MissingSetting {
            section: self.section.label(),
            key,
        })
    }

    /// Log a key this reader does not handle.
    pub fn unknown(&self, key: &str) {
        tracing::debug!(
            target: "settler::save",
            section = %self.section.label(),
            "unhandled setting `{key}`"
        );
    }
}

/// Entity index from a section parameter such as `[flag 12]`.
pub fn section_index(section: &Section, kind: &'static str, options: &TextOptions) -> Result<usize, LoadError> {
    let param = section.param.as_deref().unwrap_or("");
    let invalid = || LoadError::InvalidSectionParam {
        section: kind,
        param: param.to_string(),
    };
    let value = if options.strict_numbers {
        parse_exact_int(param).ok_or_else(invalid)?
    } else {
        parse_leading_int(param)
    };
    usize::try_from(value).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_with_params_and_settings() {
        let text = "\
stray=1
[globals]
map.col_size = 5
version=0.1

  [flag 3]
pos=1,2
[map  4 7 ]
object=1
";
        let sections = parse_sections(text);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].name, "globals");
        assert_eq!(sections[0].param, None);
        assert_eq!(sections[0].get("map.col_size"), Some("5"));
        assert_eq!(sections[1].label(), "flag 3");
        assert_eq!(sections[1].get("pos"), Some("1,2"));
        assert_eq!(sections[2].param.as_deref(), Some("4 7"));
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let text = "[globals\n[flag 1]\nno equals sign\npos=3,4\n";
        let sections = parse_sections(text);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].settings.len(), 1);
    }

    #[test]
    fn first_duplicate_wins_on_lookup() {
        let sections = parse_sections("[serf 1]\nstate=3\nstate=4\n");
        assert_eq!(sections[0].get("state"), Some("3"));
        assert_eq!(sections[0].get("missing"), None);
    }

    #[test]
    fn leading_int_like_atoi() {
        assert_eq!(parse_leading_int("42"), 42);
        assert_eq!(parse_leading_int("  -7xyz"), -7);
        assert_eq!(parse_leading_int("+3"), 3);
        assert_eq!(parse_leading_int("abc"), 0);
        assert_eq!(parse_leading_int(""), 0);
        assert_eq!(parse_leading_int("99999999999999999999999"), i64::MAX);
        assert_eq!(u8::from_int(parse_leading_int("-1")), 255);
    }

    #[test]
    fn strict_fields_reject_garbage() {
        let sections = parse_sections("[flag 2]\nlength=1,x,3\n");
        let lenient = Fields::new(&sections[0], &TextOptions::default());
        let mut length = [9u8; 6];
        lenient.array("length", "1,x,3", &mut length).unwrap();
        assert_eq!(length, [1, 0, 3, 9, 9, 9]);

        let strict = Fields::new(&sections[0], &TextOptions { strict_numbers: true });
        let err = strict.array("length", "1,x,3", &mut length).unwrap_err();
        assert!(matches!(err, LoadError::InvalidNumber { ref key, .. } if key == "length"));
    }

    #[test]
    fn positions_wrap_and_default() {
        let geometry = MapGeometry::new(5, 5).unwrap();
        let sections = parse_sections("[x]\n");
        let fields = Fields::new(&sections[0], &TextOptions::default());
        assert_eq!(fields.pos(&geometry, "pos", "3,4").unwrap(), geometry.encode(3, 4));
        assert_eq!(fields.pos(&geometry, "pos", "33,1").unwrap(), geometry.encode(1, 1));
        assert_eq!(fields.pos(&geometry, "pos", "17").unwrap(), MapPos::default());
    }

    #[test]
    fn section_params() {
        let sections = parse_sections("[flag 12]\n[flag -1]\n[flag]\n");
        let options = TextOptions::default();
        assert_eq!(section_index(&sections[0], "flag", &options).unwrap(), 12);
        assert!(section_index(&sections[1], "flag", &options).is_err());
        assert_eq!(section_index(&sections[2], "flag", &options).unwrap(), 0);
        let strict = TextOptions { strict_numbers: true };
        assert!(section_index(&sections[2], "flag", &strict).is_err());
    }
}
