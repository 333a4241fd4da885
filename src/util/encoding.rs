use std::string::FromUtf8Error;

use thiserror::Error;
use url::form_urlencoded;

#[derive(Debug, Error)]
#[error("Encoded text is not valid UTF-8: {0}")]
pub struct DecodeError(#[from] FromUtf8Error);

/// Encode text in `application/x-www-form-urlencoded` style.
///
/// Spaces become `+`; every byte outside `A-Z a-z 0-9 * - . _` is percent-escaped,
/// so the result is safe to embed in a URL path or query component.
pub fn encode(text: &str) -> String {
    form_urlencoded::byte_serialize(text.as_bytes()).collect()
}

/// Reverse of [`encode`]: `+` becomes a space and `%XX` escapes are decoded.
///
/// A literal `+` in the original text was escaped as `%2B` by [`encode`], so it
/// survives the `+` to space substitution.
pub fn decode(text: &str) -> Result<String, DecodeError> {
    let spaced = text.replace('+', " ");
    Ok(urlencoding::decode(&spaced)?.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_space_as_plus() {
        assert_eq!(encode("Hello World"), "Hello+World");
        assert_eq!(encode("test    multiple"), "test++++multiple");
    }

    #[test]
    fn test_decode_plus_as_space() {
        assert_eq!(decode("Hello+World").unwrap(), "Hello World");
    }

    #[test]
    fn test_encode_reserved_characters() {
        assert_eq!(encode("test@example.com"), "test%40example.com");
        assert_eq!(encode("path/to/resource"), "path%2Fto%2Fresource");
        assert_eq!(encode("News & Updates"), "News+%26+Updates");

        let encoded = encode("https://example.com?query=test&category=news");
        assert!(encoded.contains("%3F"));
        assert!(encoded.contains("%3D"));
        assert!(encoded.contains("%26"));
    }

    #[test]
    fn test_decode_encoded_url() {
        assert_eq!(
            decode("https%3A%2F%2Fexample.com%3Fquery%3Dtest").unwrap(),
            "https://example.com?query=test"
        );
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(encode(""), "");
        assert_eq!(decode("").unwrap(), "");
    }

    #[test]
    fn test_literal_plus_survives() {
        let original = "C++ 2 + 2";
        assert_eq!(decode(&encode(original)).unwrap(), original);
    }

    #[test]
    fn test_unicode_is_escaped() {
        let encoded = encode("Hello 世界");
        assert!(encoded.contains('%'));
        assert_eq!(decode(&encoded).unwrap(), "Hello 世界");
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        assert!(decode("%FF%FE").is_err());
    }

    proptest! {
        #[test]
        fn prop_round_trip(text in any::<String>()) {
            prop_assert_eq!(decode(&encode(&text)).unwrap(), text);
        }

        #[test]
        fn prop_encoded_is_url_safe(text in any::<String>()) {
            let encoded = encode(&text);
            prop_assert!(encoded
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b"*-._+%".contains(&b)));
        }
    }
}
