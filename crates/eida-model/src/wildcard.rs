//! FDSNWS wildcard (`*`, `?`) to SQL `LIKE` wildcard (`%`, `_`) translation.

pub const FDSNWS_WILDCARD_MULTI: char = '*';
pub const FDSNWS_WILDCARD_SINGLE: char = '?';

pub const DEFAULT_LIKE_ESCAPE: char = '/';

/// Translate FDSNWS wildcards in `value` into their `SQL LIKE` equivalents,
/// escaping any pre-existing single-char LIKE wildcard so it isn't
/// misinterpreted after translation.
///
/// Order matters: the escape pass for `like_single` must run before `?` is
/// rewritten to `like_single`, or a genuine `_` byte in the input would be
/// indistinguishable from a translated `?`.
pub fn fdsnws_to_sql_wildcards(value: &str, like_multi: char, like_single: char, like_escape: char) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == like_single {
            escaped.push(like_escape);
        }
        escaped.push(ch);
    }

    escaped
        .chars()
        .map(|ch| {
            if ch == FDSNWS_WILDCARD_SINGLE {
                like_single.to_string()
            } else if ch == FDSNWS_WILDCARD_MULTI {
                like_multi.to_string()
            } else {
                ch.to_string()
            }
        })
        .collect()
}

/// Translate with the conventional `%` / `_` / `/` triple.
pub fn to_sql_like(value: &str) -> String {
    fdsnws_to_sql_wildcards(value, '%', '_', DEFAULT_LIKE_ESCAPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_wildcards() {
        assert_eq!(to_sql_like("CH"), "CH");
        assert_eq!(to_sql_like("*"), "%");
        assert_eq!(to_sql_like("H?Z"), "H_Z");
        assert_eq!(to_sql_like("HH*"), "HH%");
    }

    #[test]
    fn escapes_preexisting_like_single_char() {
        assert_eq!(to_sql_like("A_B"), "A/_B");
        assert_eq!(to_sql_like("A_B?"), "A/_B_");
    }
}
