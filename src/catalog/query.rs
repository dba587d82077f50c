//! Tag queries for `Catalog::find`
//!
//! A non-empty tag list matches an identifier through either of two
//! independently built clauses, OR-ed together:
//!
//! 1. **exact tag**: any assigned tag equals any requested tag;
//! 2. **substring**: the identifier contains *every* requested tag and the
//!    display name contains *every* requested tag.
//!
//! Both clauses are kept exactly as stored catalogs have always been
//! queried; callers rely on `find(["png"])` matching untagged `*.png` files.

use rusqlite::types::Value;

/// Sentinel tag meaning "everything"
pub const WILDCARD: &str = "*";

/// Default cap on `find` results (effectively unbounded)
pub const DEFAULT_LIMIT: usize = 387_420_489; // 9^9

/// What `find` should match
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagQuery {
    /// Every identifier
    All,
    /// Exact-tag OR all-substrings match on these tags
    Tags(Vec<String>),
}

impl TagQuery {
    /// Build from raw tags; an empty list or a lone `*` means `All`.
    /// Inside a longer list `*` is an ordinary tag.
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags: Vec<String> = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if tags.is_empty() || (tags.len() == 1 && tags[0] == WILDCARD) {
            TagQuery::All
        } else {
            TagQuery::Tags(tags)
        }
    }
}

impl From<&str> for TagQuery {
    fn from(tag: &str) -> Self {
        TagQuery::from_tags([tag])
    }
}

impl From<String> for TagQuery {
    fn from(tag: String) -> Self {
        TagQuery::from_tags([tag])
    }
}

impl From<Vec<String>> for TagQuery {
    fn from(tags: Vec<String>) -> Self {
        TagQuery::from_tags(tags)
    }
}

impl From<Vec<&str>> for TagQuery {
    fn from(tags: Vec<&str>) -> Self {
        TagQuery::from_tags(tags)
    }
}

impl From<&[&str]> for TagQuery {
    fn from(tags: &[&str]) -> Self {
        TagQuery::from_tags(tags)
    }
}

impl From<&[String]> for TagQuery {
    fn from(tags: &[String]) -> Self {
        TagQuery::from_tags(tags)
    }
}

impl<const N: usize> From<[&str; N]> for TagQuery {
    fn from(tags: [&str; N]) -> Self {
        TagQuery::from_tags(tags)
    }
}

impl<T: Into<TagQuery>> From<Option<T>> for TagQuery {
    fn from(tags: Option<T>) -> Self {
        tags.map(Into::into).unwrap_or(TagQuery::All)
    }
}

/// Escape `LIKE` metacharacters so tag values match literally
fn like_pattern(tag: &str) -> String {
    let mut escaped = String::with_capacity(tag.len() + 2);
    escaped.push('%');
    for c in tag.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// SQL and bound parameters for one `find` call
pub fn build_find(query: &TagQuery, limit: usize) -> (String, Vec<Value>) {
    let limit = Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX));

    let tags = match query {
        TagQuery::All => {
            return (
                "SELECT identifier FROM identifiers ORDER BY identifier LIMIT ?".to_string(),
                vec![limit],
            );
        }
        TagQuery::Tags(tags) => tags,
    };

    let mut params: Vec<Value> = Vec::with_capacity(tags.len() * 3 + 1);

    // Clause 1: exact tag match (stored tags are lowercase)
    let placeholders = vec!["?"; tags.len()].join(", ");
    params.extend(tags.iter().map(|t| Value::Text(t.to_lowercase())));

    // Clause 2: every tag is a substring of the identifier and of the name
    let like_identifier = vec!["i.identifier LIKE ? ESCAPE '\\'"; tags.len()].join(" AND ");
    params.extend(tags.iter().map(|t| Value::Text(like_pattern(t))));
    let like_name = vec!["i.name LIKE ? ESCAPE '\\'"; tags.len()].join(" AND ");
    params.extend(tags.iter().map(|t| Value::Text(like_pattern(t))));

    params.push(limit);

    let sql = format!(
        "SELECT i.identifier FROM identifiers i \
         WHERE EXISTS ( \
             SELECT 1 FROM identifier_tags it \
             JOIN tags t ON t.id = it.tag_id \
             WHERE it.identifier_id = i.id AND t.tag IN ({placeholders}) \
         ) \
         OR (({like_identifier}) AND ({like_name})) \
         ORDER BY i.identifier LIMIT ?"
    );

    (sql, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_and_empty_mean_all() {
        assert_eq!(TagQuery::from("*"), TagQuery::All);
        assert_eq!(TagQuery::from(Vec::<String>::new()), TagQuery::All);
        assert_eq!(TagQuery::from([" * ", ""]), TagQuery::All);
        assert_eq!(TagQuery::from(None::<&str>), TagQuery::All);
    }

    #[test]
    fn test_wildcard_in_mixed_list_is_a_tag() {
        assert_eq!(
            TagQuery::from(["carnivore", "*"]),
            TagQuery::Tags(vec!["carnivore".to_string(), "*".to_string()])
        );
    }

    #[test]
    fn test_tags_kept_in_order() {
        assert_eq!(
            TagQuery::from(["a", " b "]),
            TagQuery::Tags(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("rex"), "%rex%");
    }

    #[test]
    fn test_build_find_param_layout() {
        let (sql, params) = build_find(&TagQuery::from(["A", "b"]), 10);
        assert_eq!(sql.matches('?').count(), params.len());
        assert_eq!(params[0], Value::Text("a".to_string()));
        assert_eq!(params[2], Value::Text("%A%".to_string()));
        assert_eq!(params.last(), Some(&Value::Integer(10)));
    }

    #[test]
    fn test_build_find_all() {
        let (sql, params) = build_find(&TagQuery::All, DEFAULT_LIMIT);
        assert!(sql.contains("LIMIT ?"));
        assert_eq!(params, vec![Value::Integer(DEFAULT_LIMIT as i64)]);
    }
}
