//! Identifier naming for normalized tables and columns

use super::schema::ColumnType;

/// Joins the path segments of flattened objects and child tables.
pub const PATH_SEPARATOR: &str = "__";

/// Bookkeeping table receiving one row per load.
pub const LOADS_TABLE: &str = "_loads";

/// Load id of the root row.
pub const LOAD_ID_COLUMN: &str = "_load_id";

/// Unique id of every row, root or child.
pub const ROW_ID_COLUMN: &str = "_row_id";

/// `_row_id` of the row holding the array a child row came from.
pub const PARENT_ID_COLUMN: &str = "_parent_id";

/// Position of the element inside its array.
pub const LIST_IDX_COLUMN: &str = "_list_idx";

/// Column holding scalar array elements.
pub const VALUE_COLUMN: &str = "value";

/// Convert a JSON key into a snake_case SQL identifier.
///
/// `downloadLinks` becomes `download_links`, `release-date` becomes
/// `release_date` and `68` becomes `_68`.
pub fn normalize_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    let mut prev: Option<char> = None;

    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if matches!(prev, Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit()) {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
        prev = Some(c);
    }

    while out.len() > 1 && out.ends_with('_') {
        out.pop();
    }

    if out.is_empty() {
        return "_".to_string();
    }

    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }

    out
}

/// Join an already-normalized prefix and segment
pub fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}{}{}", prefix, PATH_SEPARATOR, segment)
    }
}

/// Name of the child table holding the array found at `path` of `parent`
pub fn child_table(parent: &str, path: &str) -> String {
    join_path(parent, path)
}

/// Column receiving values whose type conflicts with `column`
pub fn variant_column(column: &str, data_type: ColumnType) -> String {
    format!("{}{}v_{}", column, PATH_SEPARATOR, data_type)
}

/// Names starting with `_` are kept for bookkeeping
pub fn is_reserved(name: &str) -> bool {
    name.starts_with('_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("name"), "name");
        assert_eq!(normalize_identifier("downloadLinks"), "download_links");
        assert_eq!(normalize_identifier("releaseDate"), "release_date");
        assert_eq!(normalize_identifier("voteup"), "voteup");
        assert_eq!(normalize_identifier("release-date"), "release_date");
        assert_eq!(normalize_identifier("Party Year"), "party_year");
        assert_eq!(normalize_identifier("cdc"), "cdc");
        assert_eq!(normalize_identifier("URL"), "url");
    }

    #[test]
    fn test_normalize_identifier_edge_cases() {
        assert_eq!(normalize_identifier("68"), "_68");
        assert_eq!(normalize_identifier(""), "_");
        assert_eq!(normalize_identifier("???"), "_");
        assert_eq!(normalize_identifier("a__b"), "a_b");
        assert_eq!(normalize_identifier("trailing_"), "trailing");
        assert_eq!(normalize_identifier("_loads"), "_loads");
        assert_eq!(normalize_identifier("café"), "caf");
    }

    #[test]
    fn test_paths() {
        assert_eq!(join_path("", "prod"), "prod");
        assert_eq!(join_path("prod", "type"), "prod__type");
        assert_eq!(child_table("pouet_prod", "prod__groups"), "pouet_prod__prod__groups");
        assert_eq!(variant_column("year", ColumnType::Text), "year__v_text");
    }

    #[test]
    fn test_is_reserved() {
        assert!(is_reserved(LOADS_TABLE));
        assert!(is_reserved("_68"));
        assert!(!is_reserved("pouet_prod"));
    }
}
