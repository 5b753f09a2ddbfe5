//! Include directive expansion.
//!
//! A setting whose value is `use <section>` pulls in every setting found
//! under `<section>` inside the `output_document` tree. The included keys
//! replace the directive's last key segment:
//!
//! ```text
//! output_document.part1.story.weather.var = "use output_document.common"
//! output_document.common.phrase          = "sunny"
//!     → output_document.part1.story.weather.phrase = "sunny"
//! ```
//!
//! Directives themselves stay in the vector; consumers skip them.

use crate::config::error::ConfigError;
use crate::config::loader::Document;
use crate::config::tree::{flatten, include_target, ConfigItemVector, ALLOW_ALL};

/// Section searched for included settings.
pub const INCLUDE_ROOT: &str = "output_document";

/// Maximum nesting of includes pulling in further includes.
pub const MAX_INCLUDE_DEPTH: usize = 16;

/// Expand include directives in `items`, then sort the whole vector by key.
pub fn resolve_includes(doc: &Document, items: &mut ConfigItemVector) -> Result<(), ConfigError> {
    let mut reference = ConfigItemVector::new();
    flatten(doc, INCLUDE_ROOT, &[ALLOW_ALL.to_string()], &mut reference)?;
    expand(&reference, items, 0)
}

/// Expand `items` against an already flattened reference tree.
pub fn expand(
    reference: &ConfigItemVector,
    items: &mut ConfigItemVector,
    depth: usize,
) -> Result<(), ConfigError> {
    let mut included = ConfigItemVector::new();
    let mut nested_directive: Option<String> = None;

    for (key, value) in items.iter() {
        let Some(section) = include_target(value) else {
            continue;
        };
        let head = key.rfind('.').map_or(key.as_str(), |pos| &key[..pos]);

        for (item_key, item_value) in reference {
            let Some(suffix) = item_key.strip_prefix(section) else {
                continue;
            };
            let spliced = format!("{head}{suffix}");
            if nested_directive.is_none() && include_target(item_value).is_some() {
                nested_directive = Some(spliced.clone());
            }
            included.push((spliced, item_value.clone()));
        }
    }

    if let Some(key) = nested_directive {
        if depth + 1 >= MAX_INCLUDE_DEPTH {
            return Err(ConfigError::IncludeCycle {
                key,
                depth: MAX_INCLUDE_DEPTH,
            });
        }
        expand(reference, &mut included, depth + 1)?;
    }

    if !included.is_empty() {
        items.splice(0..0, included);
    }
    items.sort();
    items.dedup();
    Ok(())
}
