//! Column resolution
//!
//! Column tokens are resolved exactly once against the header: a token that
//! equals a title selects that title, otherwise it is read as a 1-based index.
//! Tokens that are neither are dropped with a warning.

use crate::error::FilterError;

/// Split a user column list (`"name, 3,date"`) into raw tokens
pub fn parse_tokens(list: &str) -> Vec<String> {
    list.replace(", ", ",")
        .split(',')
        .map(str::to_string)
        .collect()
}

/// Resolved column positions plus their titles, in output order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSelection {
    indices: Vec<usize>,
    titles: Vec<String>,
}

impl ColumnSelection {
    /// Resolve tokens against the header, keeping input-token order
    pub fn resolve(header: &[String], tokens: &[String]) -> Result<Self, FilterError> {
        let mut indices = Vec::with_capacity(tokens.len());

        for token in tokens {
            if let Some(pos) = header.iter().position(|title| title == token) {
                indices.push(pos);
                continue;
            }

            let trimmed = token.trim();
            match trimmed.parse::<usize>() {
                Ok(0) => return Err(FilterError::ZeroColumn),
                Ok(n) if n <= header.len() => indices.push(n - 1),
                _ if is_integer(trimmed) => {
                    return Err(FilterError::ColumnOutOfRange {
                        index: trimmed.to_string(),
                        width: header.len(),
                    })
                }
                _ => {
                    log::warn!("Skipping column '{}': not in header {:?}", token, header);
                }
            }
        }

        if indices.is_empty() {
            return Err(FilterError::NoColumnsResolved {
                tokens: tokens.to_vec(),
                header: header.to_vec(),
            });
        }

        Ok(Self::from_indices(header, indices))
    }

    /// Every header column, in header order
    pub fn all(header: &[String]) -> Self {
        Self::from_indices(header, (0..header.len()).collect())
    }

    fn from_indices(header: &[String], indices: Vec<usize>) -> Self {
        let titles = indices.iter().map(|&i| header[i].clone()).collect();
        Self { indices, titles }
    }

    /// Columns NOT selected, in ascending header order.
    ///
    /// Used when columns are cut with inversion: the selection names the
    /// columns to drop.
    pub fn complement(&self, header: &[String]) -> Result<Self, FilterError> {
        let kept: Vec<usize> = (0..header.len())
            .filter(|i| !self.indices.contains(i))
            .collect();

        if kept.is_empty() {
            return Err(FilterError::NoColumnsResolved {
                tokens: self.titles.clone(),
                header: header.to_vec(),
            });
        }

        Ok(Self::from_indices(header, kept))
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Titles of the selected columns (the filtered header)
    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Signed decimal integer of any size (`-1`, `+2`, `99999999999999999999`)
fn is_integer(token: &str) -> bool {
    let digits = token.strip_prefix(|c| c == '+' || c == '-').unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Outcome of reading one field from a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAccess<'a> {
    Value(&'a str),
    /// The row is shorter than the requested column
    OutOfRange { column: usize, len: usize },
}

/// Read field `column` (zero-based) of `row`
#[inline]
pub fn field(row: &[String], column: usize) -> FieldAccess<'_> {
    match row.get(column) {
        Some(value) => FieldAccess::Value(value),
        None => FieldAccess::OutOfRange {
            column,
            len: row.len(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(titles: &[&str]) -> Vec<String> {
        titles.iter().map(|s| s.to_string()).collect()
    }

    fn tokens(list: &str) -> Vec<String> {
        parse_tokens(list)
    }

    #[test]
    fn test_parse_tokens() {
        assert_eq!(tokens("name, 3,date"), vec!["name", "3", "date"]);
        assert_eq!(tokens("a"), vec!["a"]);
    }

    #[test]
    fn test_resolve_titles_and_indices() {
        let h = header(&["id", "name", "amount"]);
        let sel = ColumnSelection::resolve(&h, &tokens("amount,1")).unwrap();

        assert_eq!(sel.indices(), &[2, 0]);
        assert_eq!(sel.titles(), &["amount".to_string(), "id".to_string()]);
    }

    #[test]
    fn test_title_takes_precedence_over_index() {
        // A column literally titled "1" wins over position 1
        let h = header(&["x", "1"]);
        let sel = ColumnSelection::resolve(&h, &tokens("1")).unwrap();
        assert_eq!(sel.indices(), &[1]);
    }

    #[test]
    fn test_zero_column_is_fatal() {
        let h = header(&["a", "b"]);
        let err = ColumnSelection::resolve(&h, &tokens("0")).unwrap_err();
        assert!(matches!(err, FilterError::ZeroColumn));
    }

    #[test]
    fn test_out_of_range_is_fatal() {
        let h = header(&["a", "b"]);
        let err = ColumnSelection::resolve(&h, &tokens("a,3")).unwrap_err();
        assert!(matches!(err, FilterError::ColumnOutOfRange { ref index, width: 2 } if index == "3"));
    }

    #[test]
    fn test_negative_and_huge_indices_are_fatal() {
        let h = header(&["a", "b"]);

        for token in ["-1", "99999999999999999999999", "+7"] {
            let err = ColumnSelection::resolve(&h, &tokens(&format!("{},b", token))).unwrap_err();
            assert!(
                matches!(err, FilterError::ColumnOutOfRange { ref index, width: 2 } if index == token),
                "{} should be out of range",
                token
            );
        }

        // A signed-looking title still resolves by name
        let h = header(&["-1", "b"]);
        let sel = ColumnSelection::resolve(&h, &tokens("-1")).unwrap();
        assert_eq!(sel.indices(), &[0]);
    }

    #[test]
    fn test_unknown_title_is_skipped() {
        let h = header(&["a", "b"]);
        let sel = ColumnSelection::resolve(&h, &tokens("missing,b")).unwrap();
        assert_eq!(sel.indices(), &[1]);
    }

    #[test]
    fn test_nothing_resolved_is_fatal() {
        let h = header(&["a", "b"]);
        let err = ColumnSelection::resolve(&h, &tokens("x,y")).unwrap_err();
        assert!(matches!(err, FilterError::NoColumnsResolved { .. }));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let h = header(&["a", "b", "c"]);
        let t = tokens("c,a,2");
        assert_eq!(
            ColumnSelection::resolve(&h, &t).unwrap(),
            ColumnSelection::resolve(&h, &t).unwrap()
        );
    }

    #[test]
    fn test_complement_in_header_order() {
        let h = header(&["a", "b", "c", "d"]);
        let sel = ColumnSelection::resolve(&h, &tokens("d,b")).unwrap();
        let kept = sel.complement(&h).unwrap();

        assert_eq!(kept.indices(), &[0, 2]);
        assert_eq!(kept.titles(), &["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_complement_of_everything_is_fatal() {
        let h = header(&["a", "b"]);
        let sel = ColumnSelection::all(&h);
        assert!(sel.complement(&h).is_err());
    }

    #[test]
    fn test_field_access() {
        let row = vec!["1".to_string(), "x".to_string()];
        assert_eq!(field(&row, 1), FieldAccess::Value("x"));
        assert_eq!(field(&row, 2), FieldAccess::OutOfRange { column: 2, len: 2 });
    }
}
