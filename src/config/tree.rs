//! Setting tree reader.
//!
//! Flattens a section of a [`Document`] into `(dotted key, string value)`
//! pairs. Groups are descended only when an allow-list pattern matches the
//! accumulated key; arrays are never flattened and scalars are always taken.

use toml::Value;

use crate::config::error::ConfigError;
use crate::config::loader::Document;

/// A flattened setting: dotted key and stringified value.
pub type ConfigItem = (String, String);

/// Ordered settings; duplicate keys are allowed.
pub type ConfigItemVector = Vec<ConfigItem>;

/// Allow-list pattern that descends every group.
pub const ALLOW_ALL: &str = "*";

/// Append every scalar under `key` to `out`.
///
/// A missing `key` is not an error. Nothing is sorted.
pub fn flatten(
    doc: &Document,
    key: &str,
    allowed: &[String],
    out: &mut ConfigItemVector,
) -> Result<(), ConfigError> {
    match doc.lookup(key) {
        Some(node) => flatten_node(node, key, allowed, out),
        None => Ok(()),
    }
}

fn flatten_node(
    node: &Value,
    key: &str,
    allowed: &[String],
    out: &mut ConfigItemVector,
) -> Result<(), ConfigError> {
    match node {
        Value::Table(table) => {
            if !section_allowed(key, allowed) {
                return Ok(());
            }
            for (name, child) in table {
                flatten_node(child, &format!("{key}.{name}"), allowed, out)?;
            }
            Ok(())
        }
        // Callers handle arrays themselves (sections, content lists).
        Value::Array(_) => Ok(()),
        scalar => {
            out.push((key.to_string(), stringify(key, scalar)?));
            Ok(())
        }
    }
}

/// Whether a group at `key` may be descended.
///
/// Each pattern is compared against `key` over the length of the shorter of
/// the two, so `output_document.part1.story.x` admits both its ancestors
/// (`output_document.part1`) and everything below it.
pub fn section_allowed(key: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|pattern| {
        if pattern == ALLOW_ALL {
            return true;
        }
        let n = pattern.len().min(key.len());
        pattern.as_bytes()[..n] == key.as_bytes()[..n]
    })
}

/// Stringify a scalar setting.
pub fn stringify(key: &str, value: &Value) -> Result<String, ConfigError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Boolean(b) => Ok(if *b { "true" } else { "false" }.to_string()),
        Value::Datetime(_) | Value::Array(_) | Value::Table(_) => Err(ConfigError::UnsupportedType {
            key: key.to_string(),
        }),
    }
}

/// Whether `value` is an include directive (`use <section>`).
pub fn include_target(value: &str) -> Option<&str> {
    if value.len() > 4 {
        value.strip_prefix("use ")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn doc(content: &str) -> Document {
        Document::parse(Path::new("test.toml"), content).unwrap()
    }

    fn all() -> Vec<String> {
        vec![ALLOW_ALL.to_string()]
    }

    #[test]
    fn test_flatten_scalars_in_file_order() {
        let d = doc(
            r#"
            [area]
            name = "uusimaa"
            radius = 5
            ratio = 0.5
            coastal = true

            [area.timezone]
            default = "Europe/Helsinki"
            "#,
        );

        let mut out = Vec::new();
        flatten(&d, "area", &all(), &mut out).unwrap();

        assert_eq!(
            out,
            vec![
                ("area.name".to_string(), "uusimaa".to_string()),
                ("area.radius".to_string(), "5".to_string()),
                ("area.ratio".to_string(), "0.5".to_string()),
                ("area.coastal".to_string(), "true".to_string()),
                ("area.timezone.default".to_string(), "Europe/Helsinki".to_string()),
            ]
        );
    }

    #[test]
    fn test_arrays_are_skipped() {
        let d = doc(
            r#"
            [output_document]
            sections = ["part1", "part2"]
            language = "fi"
            "#,
        );

        let mut out = Vec::new();
        flatten(&d, "output_document", &all(), &mut out).unwrap();
        assert_eq!(out, vec![("output_document.language".to_string(), "fi".to_string())]);
    }

    #[test]
    fn test_datetime_is_rejected() {
        let d = doc("[misc]\nstart = 1979-05-27T07:32:00Z\n");

        let mut out = Vec::new();
        let err = flatten(&d, "misc", &all(), &mut out).unwrap_err();
        match err {
            ConfigError::UnsupportedType { key } => assert_eq!(key, "misc.start"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_allow_list_truncated_comparison() {
        let d = doc(
            r#"
            [output_document.part1]
            header = "none"
            [output_document.part1.period]
            type = "day"
            [output_document.part1.story.weather]
            var = "a"
            [output_document.part1.story.wind]
            var = "b"
            "#,
        );

        let allowed = vec![
            "output_document.part1.period".to_string(),
            "output_document.part1.story.weather".to_string(),
        ];
        let mut out = Vec::new();
        flatten(&d, "output_document.part1", &allowed, &mut out).unwrap();

        let keys: Vec<&str> = out.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "output_document.part1.header",
                "output_document.part1.period.type",
                "output_document.part1.story.weather.var",
            ]
        );
    }

    #[test]
    fn test_missing_key_is_noop() {
        let d = doc("[misc]\nlanguage = \"fi\"\n");
        let mut out = Vec::new();
        flatten(&d, "area", &all(), &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_empty_allow_list_blocks_groups() {
        let d = doc("[area]\nname = \"x\"\n");
        let mut out = Vec::new();
        flatten(&d, "area", &[], &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_include_target() {
        assert_eq!(include_target("use output_document.a"), Some("output_document.a"));
        assert_eq!(include_target("use "), None);
        assert_eq!(include_target("user"), None);
    }
}
