//! Key canonicalization shared by the importer and the reconciler.
//!
//! Both sides must derive identical keys from different sources (an explicit
//! spreadsheet column vs. an uploaded filename), so everything here is pure.

/// Trim and uppercase a tag number. Absent or blank input yields `""`.
pub fn normalize_tag_number(raw: Option<&str>) -> String {
    raw.map(|value| value.trim().to_uppercase())
        .unwrap_or_default()
}

/// Trim and lowercase a sub-category name. Used for keys, never for display.
pub fn normalize_subcategory_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Composite sub-category id: `{category_id}::{normalized_name}`.
pub fn subcategory_id(category_id: &str, name: &str) -> String {
    format!("{}::{}", category_id, normalize_subcategory_name(name))
}

/// Derive a tag number from an uploaded file name.
///
/// Strips the final extension (`ABJ-1001.jpg` -> `ABJ-1001`) and normalizes.
/// A trailing segment containing `/` is not treated as an extension.
pub fn tag_from_filename(file_name: &str) -> String {
    normalize_tag_number(Some(strip_extension(file_name)))
}

fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(pos) if pos + 1 < file_name.len() && !file_name[pos + 1..].contains('/') => {
            &file_name[..pos]
        }
        _ => file_name,
    }
}

/// Lowercased extension after the last `.`, or the whole name when there is none.
pub fn file_extension(file_name: &str) -> String {
    file_name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}
