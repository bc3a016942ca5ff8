//! Shorthand tag normalization
//!
//! Templates may use compact tags such as `!Sub "x-${Y}"` or `!Ref Name`.
//! YAML parses those as tagged scalars, which the rest of the compiler
//! cannot walk, so they are rewritten into the canonical mapping form on
//! the raw text before parsing:
//!
//! ```text
//! Key: !Sub "x-${Y}"        Key:
//!                      =>     "Fn::Sub": "x-${Y}"
//! ```
//!
//! Tags outside [`FUNCTION_TAGS`] and `Ref` are left untouched.

use regex::{Captures, Regex};

use crate::error::Result;

/// Tags rewritten to `"Fn::<Tag>":`.
pub const FUNCTION_TAGS: &[&str] = &[
    "Base64",
    "FindInMap",
    "GetAtt",
    "GetAZs",
    "ImportValue",
    "Join",
    "Select",
    "Sub",
    "Split",
    "And",
    "Equals",
    "If",
    "Not",
    "Or",
];

/// Tag rewritten to a bare `Ref:` key.
pub const REF_TAG: &str = "Ref";

/// Optional `<indent><key>` followed by `<space>!<Tag>`.
const SHORTHAND_RE: &str = r"(?:(\s*)([^!\s]+))?(\s+)!(\w+)";

/// Rewrite every known shorthand tag in `text`.
pub fn normalize(text: &str) -> Result<String> {
    let re = Regex::new(SHORTHAND_RE)?;
    let out = re.replace_all(text, |caps: &Captures| {
        let indent = caps.get(1).map_or("", |m| m.as_str());
        let key = caps.get(2).map(|m| m.as_str());
        let gap = &caps[3];
        let tag = &caps[4];

        // The value moves to its own line, one column deeper than the key.
        let lead = match key {
            Some(key) => format!("{indent}{key}\n{indent} "),
            None => String::new(),
        };

        if FUNCTION_TAGS.contains(&tag) {
            format!("{lead}{gap}\"Fn::{tag}\":")
        } else if tag == REF_TAG {
            format!("{lead}{gap}{tag}:")
        } else {
            caps[0].to_string()
        }
    });
    Ok(out.into_owned())
}
