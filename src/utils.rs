use once_cell::sync::Lazy;
use regex::Regex;

static ISO_DURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?").unwrap());

/// Converts an ISO-8601 `PT#H#M#S` duration into `H:MM:SS`, or `M:SS` when
/// it is shorter than an hour. Anything unparseable becomes `0:00`.
pub fn format_iso8601_duration(value: &str) -> String {
    let Some(caps) = ISO_DURATION.captures(value.trim()) else {
        return "0:00".to_string();
    };
    // Captures are all digits, so a parse failure can only be overflow.
    let part = |i: usize| -> u64 {
        caps.get(i)
            .map(|m| m.as_str().parse().unwrap_or(u64::MAX))
            .unwrap_or(0)
    };
    let total = part(1)
        .saturating_mul(3600)
        .saturating_add(part(2).saturating_mul(60))
        .saturating_add(part(3));

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Replaces characters that are not allowed in file names on common
/// filesystems with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect()
}

/// `1234567` -> `1,234,567`
pub fn format_view_count(views: u64) -> String {
    let digits = views.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_with_hours() {
        assert_eq!(format_iso8601_duration("PT1H2M3S"), "1:02:03");
        assert_eq!(format_iso8601_duration("PT2H"), "2:00:00");
    }

    #[test]
    fn duration_without_hours() {
        assert_eq!(format_iso8601_duration("PT4M5S"), "4:05");
        assert_eq!(format_iso8601_duration("PT12M"), "12:00");
    }

    #[test]
    fn duration_seconds_overflow_into_minutes() {
        assert_eq!(format_iso8601_duration("PT90S"), "1:30");
        assert_eq!(format_iso8601_duration("PT59M60S"), "1:00:00");
    }

    #[test]
    fn duration_too_large_saturates() {
        assert_eq!(
            format_iso8601_duration("PT99999999999999999999H5S"),
            "5124095576030431:00:15"
        );
    }

    #[test]
    fn duration_zero_and_garbage() {
        assert_eq!(format_iso8601_duration("PT0S"), "0:00");
        assert_eq!(format_iso8601_duration("PT"), "0:00");
        assert_eq!(format_iso8601_duration("not a duration"), "0:00");
        assert_eq!(format_iso8601_duration(""), "0:00");
        assert_eq!(format_iso8601_duration("P1D"), "0:00");
    }

    #[test]
    fn sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize_filename("My:Video?.mp4"), "My_Video_.mp4");
        assert_eq!(sanitize_filename(r#"a\b/c*d?e:f"g<h>i|j"#), "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let clean = "Lo-fi beats (2024) [Live]";
        assert_eq!(sanitize_filename(clean), clean);
        let once = sanitize_filename("What? Why: How*");
        assert_eq!(sanitize_filename(&once), once);
    }

    #[test]
    fn view_count_grouping() {
        assert_eq!(format_view_count(0), "0");
        assert_eq!(format_view_count(999), "999");
        assert_eq!(format_view_count(1000), "1,000");
        assert_eq!(format_view_count(1234567), "1,234,567");
    }
}
