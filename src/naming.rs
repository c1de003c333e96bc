//! Name derivation from declared identifiers.
//!
//! One rule serves both dictionary keys and binding names: split on `_`,
//! drop empty segments, uppercase the first ASCII letter of each segment and
//! keep the rest untouched. Existing capitalization survives, so `HTTP_code`
//! becomes `HTTPCode`, not `HttpCode`. An identifier with no usable segments
//! falls back to itself.

pub fn derived_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for segment in raw.split('_') {
        if segment.is_empty() {
            continue;
        }
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            if first.is_ascii_alphabetic() {
                out.push(first.to_ascii_uppercase());
            } else {
                out.push(first);
            }
            out.push_str(chars.as_str());
        }
    }
    if out.is_empty() { raw.to_string() } else { out }
}

/// Dictionary key for a struct member. Same derivation as binding names;
/// `RENAME` overrides happen at the model layer, not here.
pub fn derived_key(raw: &str) -> String {
    derived_name(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_segments_capitalize() {
        assert_eq!(derived_name("yaw_speed"), "YawSpeed");
        assert_eq!(derived_name("spawn_wave"), "SpawnWave");
    }

    #[test]
    fn consecutive_and_leading_underscores_drop() {
        assert_eq!(derived_name("ai__state"), "AiState");
        assert_eq!(derived_name("_private"), "Private");
        assert_eq!(derived_name("trailing_"), "Trailing");
    }

    #[test]
    fn digit_segments_pass_through() {
        assert_eq!(derived_name("http_2_fallback"), "Http2Fallback");
        assert_eq!(derived_name("speed2"), "Speed2");
        assert_eq!(derived_name("2d_mode"), "2dMode");
    }

    #[test]
    fn existing_capitals_survive() {
        assert_eq!(derived_name("HTTP_code"), "HTTPCode");
        assert_eq!(derived_name("AlreadyPascal"), "AlreadyPascal");
    }

    #[test]
    fn degenerate_identifiers_fall_back_to_themselves() {
        assert_eq!(derived_name("___"), "___");
        assert_eq!(derived_name("x"), "X");
    }
}
