//! Slug predicates and derivation shared by entity normalisers and hooks.
//!
//! Slugs are trimmed, non-empty identifiers composed of lowercase ASCII
//! letters, digits, and single hyphens.

/// Longest slug any entity stores.
pub const SLUG_MAX: usize = 120;

/// Return `true` when `value` is a valid slug.
#[must_use]
pub fn is_valid_slug(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= SLUG_MAX
        && !value.starts_with('-')
        && !value.ends_with('-')
        && !value.contains("--")
        && value
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
}

/// Derive a slug from free text.
///
/// Runs of anything other than ASCII letters and digits collapse into a single
/// hyphen; common Latin diacritics fold to their base letter. Returns `None`
/// when nothing usable remains.
///
/// # Examples
/// ```
/// use hospitality_backend::domain::slugify;
///
/// assert_eq!(slugify("  Café & Bar  ").as_deref(), Some("cafe-bar"));
/// assert_eq!(slugify("!!!"), None);
/// ```
#[must_use]
pub fn slugify(text: &str) -> Option<String> {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;
    for ch in text.chars().map(fold_diacritic) {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
        if slug.len() >= SLUG_MAX {
            break;
        }
    }
    let trimmed = slug.trim_end_matches('-');
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Append a numeric suffix, keeping the result within [`SLUG_MAX`].
#[must_use]
pub fn with_suffix(base: &str, n: u32) -> String {
    let suffix = format!("-{n}");
    let keep = SLUG_MAX.saturating_sub(suffix.len()).min(base.len());
    let stem = base.get(..keep).unwrap_or(base).trim_end_matches('-');
    format!("{stem}{suffix}")
}

fn fold_diacritic(ch: char) -> char {
    match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'a',
        'ç' | 'Ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => 'i',
        'ñ' | 'Ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => 'u',
        other => other,
    }
}
