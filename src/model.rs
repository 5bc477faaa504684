use std::{fmt, path::PathBuf};

/// The three kinds of background work the UI can start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Single or batch media download
    Download,
    /// Playlist URL extraction to a text file
    Extract,
    /// Keyword search against the video API
    Search,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [
        OperationKind::Download,
        OperationKind::Extract,
        OperationKind::Search,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            OperationKind::Download => 0,
            OperationKind::Extract => 1,
            OperationKind::Search => 2,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationKind::Download => "download",
            OperationKind::Extract => "playlist extraction",
            OperationKind::Search => "search",
        })
    }
}

/// Lifecycle of one operation kind as seen by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationState {
    /// No worker owns this kind; the trigger button is enabled
    #[default]
    Idle,
    /// A worker is running and its updates are still applied
    Running,
}

/// What the downloader should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaMode {
    /// Best audio stream, converted to mp3
    #[default]
    Audio,
    /// Best mp4 video merged with m4a audio
    Video,
}

impl MediaMode {
    pub fn label(self) -> &'static str {
        match self {
            MediaMode::Audio => "Audio (mp3)",
            MediaMode::Video => "Video (mp4)",
        }
    }

    /// Extension of the file left on disk after post-processing
    pub fn extension(self) -> &'static str {
        match self {
            MediaMode::Audio => "mp3",
            MediaMode::Video => "mp4",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobTarget {
    Single(String),
    Batch(Vec<String>),
}

/// One user-requested unit of download work, consumed by exactly one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub target: JobTarget,
    pub mode: MediaMode,
    pub destination: PathBuf,
}

impl Job {
    pub fn single(url: impl Into<String>, mode: MediaMode, destination: impl Into<PathBuf>) -> Self {
        Self {
            target: JobTarget::Single(url.into()),
            mode,
            destination: destination.into(),
        }
    }

    pub fn batch(urls: Vec<String>, mode: MediaMode, destination: impl Into<PathBuf>) -> Self {
        Self {
            target: JobTarget::Batch(urls),
            mode,
            destination: destination.into(),
        }
    }
}

/// A row of the search results table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub channel: String,
    /// `YYYY-MM-DD`
    pub published: String,
    pub url: String,
    /// Already formatted, e.g. `4:05`
    pub duration: String,
    pub view_count: u64,
    pub thumbnail_url: Option<String>,
}

/// Optional difficulty hint appended to the search keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LearningLevel {
    #[default]
    Any,
    Beginner,
    Intermediate,
    Advanced,
}

impl LearningLevel {
    pub const ALL: [LearningLevel; 4] = [
        LearningLevel::Any,
        LearningLevel::Beginner,
        LearningLevel::Intermediate,
        LearningLevel::Advanced,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LearningLevel::Any => "Any",
            LearningLevel::Beginner => "Beginner",
            LearningLevel::Intermediate => "Intermediate",
            LearningLevel::Advanced => "Advanced",
        }
    }
}

/// Parameters of one search run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub keywords: String,
    /// ISO 639-1 code passed as the preferred result language
    pub language: String,
    pub level: LearningLevel,
    pub max_results: u32,
}

impl SearchQuery {
    /// Text sent as the `q` parameter.
    pub fn query_text(&self) -> String {
        let keywords = self.keywords.trim();
        match self.level {
            LearningLevel::Any => keywords.to_string(),
            level => format!("{} {} lesson", keywords, level.label().to_lowercase()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(level: LearningLevel) -> SearchQuery {
        SearchQuery {
            keywords: "  python tutorial ".into(),
            language: "en".into(),
            level,
            max_results: 5,
        }
    }

    #[test]
    fn query_text_without_level_is_trimmed_keywords() {
        assert_eq!(query(LearningLevel::Any).query_text(), "python tutorial");
    }

    #[test]
    fn query_text_appends_level_lesson() {
        assert_eq!(
            query(LearningLevel::Beginner).query_text(),
            "python tutorial beginner lesson"
        );
    }

    #[test]
    fn operation_kinds_have_distinct_slots() {
        let mut seen = [false; 3];
        for kind in OperationKind::ALL {
            assert!(!seen[kind.index()]);
            seen[kind.index()] = true;
        }
    }
}
