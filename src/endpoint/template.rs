//! Path templates: `{:name}` static placeholders and `{{name}}` state placeholders

use serde_json::Value;

/// Part of a URL or store path under construction
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Piece {
    Text(String),
    /// Placeholder filled from the path param at `index`
    Param { index: usize, name: String },
}

impl Piece {
    pub(crate) fn text(s: impl Into<String>) -> Self {
        Piece::Text(s.into())
    }

    pub(crate) fn id(index: usize) -> Self {
        Piece::Param {
            index,
            name: "id".to_string(),
        }
    }
}

/// Split a configured path into text and `{:name}` placeholders, numbering
/// placeholders from `next_index`.
pub(crate) fn parse_path(path: &str, next_index: &mut usize) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut rest = path;

    while let Some(start) = rest.find("{:") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        if start > 0 {
            pieces.push(Piece::text(&rest[..start]));
        }
        pieces.push(Piece::Param {
            index: *next_index,
            name: rest[start + 2..start + len].to_string(),
        });
        *next_index += 1;
        rest = &rest[start + len + 1..];
    }

    if !rest.is_empty() {
        pieces.push(Piece::text(rest));
    }
    pieces
}

/// Render pieces, substituting path params by index.
///
/// Returns the rendered string and whether every placeholder was filled.
/// Unfilled placeholders are left in place as `{:name}`.
pub(crate) fn render(
    pieces: &[Piece],
    params: &[Option<String>],
    separator: &str,
    encode: bool,
) -> (String, bool) {
    let mut valid = true;
    let rendered: Vec<String> = pieces
        .iter()
        .map(|piece| match piece {
            Piece::Text(s) => s.clone(),
            Piece::Param { index, name } => match params.get(*index).and_then(|p| p.as_deref()) {
                Some(value) if encode => urlencoding::encode(value).into_owned(),
                Some(value) => value.to_string(),
                None => {
                    valid = false;
                    format!("{{:{}}}", name)
                }
            },
        })
        .collect();
    (rendered.join(separator), valid)
}

/// Names of `{{name}}` placeholders in order of appearance
pub(crate) fn state_placeholders(s: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = s;
    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start..].find("}}") else {
            break;
        };
        names.push(rest[start + 2..start + len].trim());
        rest = &rest[start + len + 2..];
    }
    names
}

/// Replace `{{name}}` placeholders with dotted lookups into `snapshot`.
pub(crate) fn substitute_state(s: &str, snapshot: &Value) -> (String, bool) {
    let mut out = String::with_capacity(s.len());
    let mut valid = true;
    let mut rest = s;

    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start..].find("}}") else {
            break;
        };
        out.push_str(&rest[..start]);
        let name = rest[start + 2..start + len].trim();
        match crate::store::path::value_at(snapshot, name).and_then(scalar_string) {
            Some(value) => out.push_str(&urlencoding::encode(&value)),
            None => {
                valid = false;
                out.push_str(&rest[start..start + len + 2]);
            }
        }
        rest = &rest[start + len + 2..];
    }
    out.push_str(rest);
    (out, valid)
}

/// String form of a scalar JSON value; `None` for null, arrays and objects
pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_numbers_placeholders() {
        let mut next = 3;
        let pieces = parse_path("/api/orgs/{:orgId}/teams/{:teamId}", &mut next);
        assert_eq!(next, 5);
        assert_eq!(
            pieces,
            vec![
                Piece::text("/api/orgs/"),
                Piece::Param { index: 3, name: "orgId".into() },
                Piece::text("/teams/"),
                Piece::Param { index: 4, name: "teamId".into() },
            ]
        );
    }

    #[test]
    fn test_parse_ignores_state_placeholders() {
        let mut next = 0;
        let pieces = parse_path("/api/{{session.userId}}/items", &mut next);
        assert_eq!(next, 0);
        assert_eq!(pieces, vec![Piece::text("/api/{{session.userId}}/items")]);
    }

    #[test]
    fn test_render_marks_missing_values() {
        let mut next = 0;
        let pieces = parse_path("/api/users/{:id}/posts/{:postId}", &mut next);

        let (url, valid) = render(&pieces, &[Some("7".into()), None], "", true);
        assert_eq!(url, "/api/users/7/posts/{:postId}");
        assert!(!valid);

        let (url, valid) = render(&pieces, &[Some("a b".into()), Some("9".into())], "", true);
        assert_eq!(url, "/api/users/a%20b/posts/9");
        assert!(valid);
    }

    #[test]
    fn test_state_substitution() {
        let snapshot = json!({ "session": { "userId": 12, "team": null } });

        assert_eq!(
            state_placeholders("/api/{{ session.userId }}/x/{{session.team}}"),
            vec!["session.userId", "session.team"]
        );

        let (url, valid) = substitute_state("/api/users/{{session.userId}}/feed", &snapshot);
        assert_eq!(url, "/api/users/12/feed");
        assert!(valid);

        let (url, valid) = substitute_state("/api/teams/{{session.team}}", &snapshot);
        assert_eq!(url, "/api/teams/{{session.team}}");
        assert!(!valid);
    }
}
