/// Prefix yt-dlp prints in front of every progress line we ask it for.
pub const PROGRESS_MARKER: &str = "tubedeck-progress:";

/// Passed to `--progress-template`: status, percent string, then the title
/// last because it may itself contain `:`.
pub const PROGRESS_TEMPLATE: &str =
    "download:tubedeck-progress:%(progress.status)s:%(progress._percent_str)s:%(info.title)s";

/// Status transitions reported by the download adapter
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Percentage in `0.0..=100.0`
    Downloading { percent: f32 },
    /// Transfer done; post-processing (conversion/merge) follows
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressLine {
    pub event: ProgressEvent,
    pub title: Option<String>,
}

pub fn parse_progress_line(line: &str) -> Option<ProgressLine> {
    let rest = line.trim().strip_prefix(PROGRESS_MARKER)?;
    let mut fields = rest.splitn(3, ':');
    let status = fields.next()?.trim();
    let percent_str = fields.next().unwrap_or_default();
    let title = fields
        .next()
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != "NA")
        .map(str::to_string);

    let event = match status {
        "downloading" => ProgressEvent::Downloading {
            percent: parse_percent(percent_str)?,
        },
        "finished" => ProgressEvent::Finished,
        _ => return None,
    };
    Some(ProgressLine { event, title })
}

// `_percent_str` is padded and may carry ANSI colour codes, e.g. "\x1b[0;94m 42.3%\x1b[0m".
fn parse_percent(raw: &str) -> Option<f32> {
    let without_escapes = strip_ansi(raw);
    let number: String = without_escapes
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value = number.parse::<f32>().ok()?;
    Some(value.clamp(0.0, 100.0))
}

fn strip_ansi(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_downloading_line() {
        let line = "tubedeck-progress:downloading: 42.3%:Some Title";
        assert_eq!(
            parse_progress_line(line),
            Some(ProgressLine {
                event: ProgressEvent::Downloading { percent: 42.3 },
                title: Some("Some Title".into()),
            })
        );
    }

    #[test]
    fn title_may_contain_colons() {
        let parsed = parse_progress_line("tubedeck-progress:downloading:10.0%:Rust: the talk").unwrap();
        assert_eq!(parsed.title.as_deref(), Some("Rust: the talk"));
    }

    #[test]
    fn strips_colour_codes_from_percent() {
        let line = "tubedeck-progress:downloading:\u{1b}[0;94m  7.5%\u{1b}[0m:x";
        assert_eq!(
            parse_progress_line(line).unwrap().event,
            ProgressEvent::Downloading { percent: 7.5 }
        );
    }

    #[test]
    fn parses_finished_line() {
        let parsed = parse_progress_line("tubedeck-progress:finished:100%:Done").unwrap();
        assert_eq!(parsed.event, ProgressEvent::Finished);
    }

    #[test]
    fn ignores_other_output() {
        assert_eq!(parse_progress_line("[youtube] abc: Downloading webpage"), None);
        assert_eq!(parse_progress_line("tubedeck-progress:error:NA:x"), None);
        assert_eq!(parse_progress_line("tubedeck-progress:downloading:N/A:x"), None);
    }

    #[test]
    fn missing_title_is_none() {
        let parsed = parse_progress_line("tubedeck-progress:downloading:50%:NA").unwrap();
        assert_eq!(parsed.title, None);
    }
}
