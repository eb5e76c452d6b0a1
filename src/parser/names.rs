/// Return the identifier without surrounding double quotes or backticks.
///
/// Embedded doubled quotes (`""`) are collapsed back to a single `"`.
pub fn unquote_identifier(ident: &str) -> String {
    if let Some(inner) = ident.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return inner.replace("\"\"", "\"");
    }
    if let Some(inner) = ident.strip_prefix('`').and_then(|s| s.strip_suffix('`')) {
        return inner.to_string();
    }
    ident.to_string()
}

/// Normalize an identifier for case-insensitive matching.
///
/// Trims whitespace, removes surrounding double quotes on a single identifier,
/// and lowercases the result.
pub fn normalize_identifier(ident: &str) -> String {
    unquote_identifier(ident.trim()).trim().to_ascii_lowercase()
}

/// Split a potentially qualified name into its dot-separated parts.
///
/// Handles dots inside quoted identifiers, e.g. `"my.db"."table.name"`, and
/// unquotes every part. Empty input yields an empty list.
pub fn split_qualified_name(name: &str) -> Vec<String> {
    let name = name.trim();
    if name.is_empty() {
        return Vec::new();
    }

    let mut in_quotes = false;
    let mut start = 0usize;
    let mut parts: Vec<&str> = Vec::new();

    for (idx, ch) in name.char_indices() {
        match ch {
            '"' | '`' => in_quotes = !in_quotes,
            '.' if !in_quotes => {
                parts.push(name[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(name[start..].trim());

    parts.into_iter().map(unquote_identifier).collect()
}

/// Canonicalize an extracted column name into an engine-safe identifier.
///
/// Rules:
/// - lowercase ASCII
/// - replace non `[a-z0-9_]` with `_`
/// - collapse repeated `_`
/// - trim leading/trailing `_`
/// - if empty, return `"col"`
/// - if starting with a digit, prefix with `"_"`
pub fn sanitize_column_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut previous_was_underscore = false;

    for ch in name.trim().chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_alphanumeric() {
            previous_was_underscore = false;
            normalized.push(lower);
        } else if !previous_was_underscore {
            normalized.push('_');
            previous_was_underscore = true;
        }
    }

    let trimmed = normalized.trim_matches('_');
    if trimmed.is_empty() {
        return "col".to_string();
    }

    if trimmed.chars().next().is_some_and(|ch| ch.is_ascii_digit()) {
        return format!("_{trimmed}");
    }

    trimmed.to_string()
}

/// Sanitize a positional column list, naming blank entries `col_<index>`.
pub fn sanitize_column_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    names
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let raw = name.as_ref().trim();
            if raw.is_empty() {
                format!("col_{idx}")
            } else {
                sanitize_column_name(raw)
            }
        })
        .collect()
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// De-duplicate names case-insensitively, keeping the first spelling and order.
pub fn dedupe_preserve_order<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for name in names {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(normalize_identifier(trimmed)) {
            out.push(trimmed.to_string());
        }
    }
    out
}
