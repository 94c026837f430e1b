//! File name normalization.

use rslug::slugify;

/// Used when a stem has no alphanumeric characters left
const FALLBACK_STEM: &str = "file";

fn slug(value: &str) -> String {
    let slug: String = slugify!(value);
    slug.trim_matches('-').to_string()
}

/// Slugify a file's base name, keeping its extension.
///
/// Stem and extension are slugified separately and joined by `.`, so
/// `"Beach Day!.JPG"` becomes `"beach-day.jpg"`. Applying it twice yields the
/// same result as applying it once.
pub fn slugify_file_name(name: &str) -> String {
    let (stem, extension) = match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, Some(extension)),
        _ => (name, None),
    };

    let mut stem = slug(stem);
    if stem.is_empty() {
        stem = FALLBACK_STEM.to_string();
    }

    match extension.map(slug) {
        Some(extension) if !extension.is_empty() => format!("{}.{}", stem, extension),
        _ => stem,
    }
}
