//! `snake_case` and `camelCase` conversion.

/// Convert `snake_case` to `camelCase`.
///
/// The first segment is kept as is. Every later segment is title-cased:
/// a letter following a non-letter is upper-cased, other letters are
/// lower-cased.
///
/// # Examples
/// ```
/// use platform_kit::utils::to_camel_case;
///
/// assert_eq!(to_camel_case("hello_world"), "helloWorld");
/// ```
#[must_use]
pub fn to_camel_case(snake: &str) -> String {
    let mut segments = snake.split('_');
    let mut out = segments.next().unwrap_or_default().to_owned();
    for segment in segments {
        out.push_str(&title(segment));
    }
    out
}

fn title(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut after_letter = false;
    for c in segment.chars() {
        if after_letter {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        after_letter = c.is_alphabetic();
    }
    out
}

/// Convert `camelCase` to `snake_case`.
///
/// An underscore goes before every ASCII upper-case letter except a
/// leading one, then the whole string is lower-cased.
///
/// # Examples
/// ```
/// use platform_kit::utils::to_snake_case;
///
/// assert_eq!(to_snake_case("helloWorld"), "hello_world");
/// ```
#[must_use]
pub fn to_snake_case(camel: &str) -> String {
    let mut out = String::with_capacity(camel.len() + 4);
    for (index, c) in camel.chars().enumerate() {
        if index > 0 && c.is_ascii_uppercase() {
            out.push('_');
        }
        out.extend(c.to_lowercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("hello_world", "helloWorld")]
    #[case("created_at", "createdAt")]
    #[case("single", "single")]
    #[case("http_URL_path", "httpUrlPath")]
    #[case("two_2fa_codes", "two2FaCodes")]
    #[case("", "")]
    fn camel_case(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(to_camel_case(input), expected);
    }

    #[rstest]
    #[case("helloWorld", "hello_world")]
    #[case("HelloWorld", "hello_world")]
    #[case("userID", "user_i_d")]
    #[case("plain", "plain")]
    fn snake_case(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(to_snake_case(input), expected);
    }

    #[rstest]
    #[case("hello_world")]
    #[case("created_at")]
    #[case("deactivated_by_user_id")]
    #[case("order")]
    fn lower_snake_case_survives_a_round_trip(#[case] snake: &str) {
        assert_eq!(to_snake_case(&to_camel_case(snake)), snake);
    }
}
