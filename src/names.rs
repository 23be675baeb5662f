//! Localized name selection for decoded records
//!
//! GeoIP-style records carry place names as a `names` map keyed by locale
//! code, e.g. `{"names": {"en": "Germany", "de": "Deutschland"}}`. For display
//! it is usually enough to keep one of them. [`localize_names`] rewrites a
//! decoded value so every such map becomes a single `name` entry.

use crate::data_section::DataValue;

/// Locale used when the requested one is missing
pub const FALLBACK_LANGUAGE: &str = "en";

/// Replace every `names` map with a `name` in the requested language
///
/// For each map that has a `names` key, `name` is set to the entry for
/// `lang`, or to the `"en"` entry when `lang` is absent, and `names` is
/// removed. If neither exists the map just loses `names`. Maps without
/// `names` and arrays are rewritten recursively; other values are returned
/// unchanged.
///
/// # Example
///
/// ```
/// use indexmap::IndexMap;
/// use mmdb_reader::names::localize_names;
/// use mmdb_reader::DataValue;
///
/// let mut names = IndexMap::new();
/// names.insert("en".to_string(), DataValue::String("Germany".into()));
/// names.insert("de".to_string(), DataValue::String("Deutschland".into()));
/// let mut country = IndexMap::new();
/// country.insert("names".to_string(), DataValue::Map(names));
///
/// let localized = localize_names(&DataValue::Map(country), "de");
/// assert_eq!(localized.get("name").and_then(DataValue::as_str), Some("Deutschland"));
/// assert!(localized.get("names").is_none());
/// ```
pub fn localize_names(value: &DataValue, lang: &str) -> DataValue {
    match value {
        DataValue::Array(items) => DataValue::Array(
            items
                .iter()
                .map(|item| localize_names(item, lang))
                .collect(),
        ),
        DataValue::Map(map) => {
            let mut out = map.clone();
            match map.get("names") {
                Some(names) => {
                    let picked = names
                        .get(lang)
                        .or_else(|| names.get(FALLBACK_LANGUAGE))
                        .cloned();
                    if let Some(name) = picked {
                        out.insert("name".to_string(), name);
                    }
                    out.shift_remove("names");
                }
                None => {
                    for entry in out.values_mut() {
                        *entry = localize_names(entry, lang);
                    }
                }
            }
            DataValue::Map(out)
        }
        other => other.clone(),
    }
}
