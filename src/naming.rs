//! # Naming Codec
//!
//! Property keys are `snake_case` on the wire and `camelCase` in memory.
//! The conversion is applied to every object key crossing the wire, except
//! keys starting with `$`, which carry Potion markers and are left alone.
//!
//! ## Limitations
//!
//! `to_snake_case` splits before every uppercase letter and before every run
//! of digits, so `userID` becomes `user_i_d` and `address2` becomes
//! `address_2`; both convert back unchanged. Identifiers that already contain
//! underscores are not guaranteed to survive a round trip.

/// Returns `true` for keys that carry Potion markers (`$uri`, `$ref`, ...).
pub fn is_marker(key: &str) -> bool {
    key.starts_with('$')
}

/// Converts a `camelCase` identifier to `snake_case`.
///
/// ```
/// use potion::naming::to_snake_case;
///
/// assert_eq!(to_snake_case("createdAt"), "created_at");
/// assert_eq!(to_snake_case("userID"), "user_i_d");
/// assert_eq!(to_snake_case("line2"), "line_2");
/// ```
pub fn to_snake_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    let mut previous: Option<char> = None;

    for ch in input.chars() {
        let starts_run = match previous {
            Some(_) if ch.is_ascii_uppercase() => true,
            Some(prev) if ch.is_ascii_digit() => !prev.is_ascii_digit(),
            _ => false,
        };
        if starts_run {
            out.push('_');
        }
        out.push(ch.to_ascii_lowercase());
        previous = Some(ch);
    }

    out
}

/// Converts a `snake_case` identifier to `camelCase`.
///
/// Each `_x` becomes `X`; a trailing underscore is kept.
pub fn to_camel_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '_' {
            match chars.peek() {
                Some(next) if next.is_ascii_alphanumeric() => {
                    out.push(next.to_ascii_uppercase());
                    chars.next();
                }
                _ => out.push(ch),
            }
        } else {
            out.push(ch);
        }
    }

    out
}

/// Converts a wire key to its in-memory form, leaving marker keys untouched.
pub(crate) fn key_from_wire(key: &str) -> String {
    if is_marker(key) {
        key.to_string()
    } else {
        to_camel_case(key)
    }
}

/// Converts an in-memory key to its wire form, leaving marker keys untouched.
pub(crate) fn key_to_wire(key: &str) -> String {
    if is_marker(key) {
        key.to_string()
    } else {
        to_snake_case(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("name"), "name");
        assert_eq!(to_snake_case("createdAt"), "created_at");
        assert_eq!(to_snake_case("fooBarBaz"), "foo_bar_baz");
        assert_eq!(to_snake_case("perPage"), "per_page");
        assert_eq!(to_snake_case("address2"), "address_2");
        assert_eq!(to_snake_case("Name"), "name");
        assert_eq!(to_snake_case("getHTTPStatus"), "get_h_t_t_p_status");
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(to_camel_case("name"), "name");
        assert_eq!(to_camel_case("created_at"), "createdAt");
        assert_eq!(to_camel_case("foo_bar_baz"), "fooBarBaz");
        assert_eq!(to_camel_case("address_2"), "address2");
        assert_eq!(to_camel_case("trailing_"), "trailing_");
    }

    #[test]
    fn test_round_trip_for_camel_identifiers() {
        let identifiers = [
            "a",
            "name",
            "createdAt",
            "perPage",
            "userId",
            "line2",
            "x9y",
            "someLongPropertyName",
            "isAdmin",
            "v10Value",
            "userID",
            "aBC",
            "getHTTPStatus",
            "a2B",
            "aB2",
        ];
        for ident in identifiers {
            assert_eq!(to_camel_case(&to_snake_case(ident)), ident, "{ident}");
        }
    }

    #[test]
    fn test_marker_keys_are_untouched() {
        assert_eq!(key_from_wire("$uri"), "$uri");
        assert_eq!(key_to_wire("$ref"), "$ref");
        assert_eq!(key_from_wire("created_at"), "createdAt");
        assert_eq!(key_to_wire("createdAt"), "created_at");
    }
}
