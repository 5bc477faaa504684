use std::path::PathBuf;

use crate::{
    error::{AppError, Result},
    model::{Job, MediaMode, SearchResult},
};

#[derive(Debug, Clone)]
pub struct ResultRow {
    pub result: SearchResult,
    pub selected: bool,
}

/// Results of the most recent search, with per-row selection
#[derive(Debug, Default)]
pub struct ResultsTable {
    rows: Vec<ResultRow>,
}

impl ResultsTable {
    /// Replaces the table contents; every row starts unselected.
    pub fn replace(&mut self, results: Vec<SearchResult>) {
        self.rows = results
            .into_iter()
            .map(|result| ResultRow {
                result,
                selected: false,
            })
            .collect();
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn toggle(&mut self, index: usize) {
        if let Some(row) = self.rows.get_mut(index) {
            row.selected = !row.selected;
        }
    }

    pub fn select_all(&mut self) {
        self.rows.iter_mut().for_each(|row| row.selected = true);
    }

    pub fn deselect_all(&mut self) {
        self.rows.iter_mut().for_each(|row| row.selected = false);
    }

    pub fn selected_count(&self) -> usize {
        self.rows.iter().filter(|row| row.selected).count()
    }

    pub fn selected_urls(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter(|row| row.selected)
            .map(|row| row.result.url.clone())
            .collect()
    }

    /// Indices of rows whose title or channel contains `filter`, ignoring case.
    /// An empty filter matches every row.
    pub fn visible_indices(&self, filter: &str) -> Vec<usize> {
        let needle = filter.trim().to_lowercase();
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                needle.is_empty()
                    || row.result.title.to_lowercase().contains(&needle)
                    || row.result.channel.to_lowercase().contains(&needle)
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Builds a batch job from the selected rows, in table order.
    pub fn batch_job(&self, mode: MediaMode, destination: impl Into<PathBuf>) -> Result<Job> {
        let urls = self.selected_urls();
        if urls.is_empty() {
            return Err(AppError::NothingSelected);
        }
        Ok(Job::batch(urls, mode, destination))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::JobTarget;

    pub(crate) fn result(id: &str, title: &str, channel: &str) -> SearchResult {
        SearchResult {
            id: id.into(),
            title: title.into(),
            channel: channel.into(),
            published: "2024-01-01".into(),
            url: format!("https://www.youtube.com/watch?v={}", id),
            duration: "1:00".into(),
            view_count: 1,
            thumbnail_url: None,
        }
    }

    fn table() -> ResultsTable {
        let mut table = ResultsTable::default();
        table.replace(vec![
            result("a", "Rust ownership", "Crab TV"),
            result("b", "Python basics", "Snake School"),
            result("c", "Async Rust", "Tokio Talks"),
        ]);
        table
    }

    #[test]
    fn rows_start_unselected() {
        assert_eq!(table().selected_count(), 0);
    }

    #[test]
    fn toggle_flips_one_row() {
        let mut t = table();
        t.toggle(1);
        assert_eq!(t.selected_urls(), vec!["https://www.youtube.com/watch?v=b"]);
        t.toggle(1);
        assert_eq!(t.selected_count(), 0);
        t.toggle(99);
        assert_eq!(t.selected_count(), 0);
    }

    #[test]
    fn select_all_then_deselect_all_clears_every_row() {
        let mut t = table();
        t.select_all();
        assert_eq!(t.selected_count(), 3);
        t.deselect_all();
        assert!(t.rows().iter().all(|row| !row.selected));
    }

    #[test]
    fn batch_job_without_selection_is_a_warning() {
        let t = table();
        assert!(matches!(
            t.batch_job(MediaMode::Audio, "/tmp"),
            Err(AppError::NothingSelected)
        ));
    }

    #[test]
    fn batch_job_keeps_table_order() {
        let mut t = table();
        t.toggle(2);
        t.toggle(0);
        let job = t.batch_job(MediaMode::Video, "/tmp/out").unwrap();
        assert_eq!(job.mode, MediaMode::Video);
        assert_eq!(job.destination, PathBuf::from("/tmp/out"));
        assert_eq!(
            job.target,
            JobTarget::Batch(vec![
                "https://www.youtube.com/watch?v=a".into(),
                "https://www.youtube.com/watch?v=c".into(),
            ])
        );
    }

    #[test]
    fn filter_matches_title_or_channel_case_insensitively() {
        let t = table();
        assert_eq!(t.visible_indices("rust"), vec![0, 2]);
        assert_eq!(t.visible_indices("SNAKE"), vec![1]);
        assert_eq!(t.visible_indices("  "), vec![0, 1, 2]);
        assert!(t.visible_indices("haskell").is_empty());
    }

    #[test]
    fn filter_does_not_touch_hidden_selection() {
        let mut t = table();
        t.toggle(1);
        assert!(!t.visible_indices("rust").contains(&1));
        assert_eq!(t.selected_urls(), vec!["https://www.youtube.com/watch?v=b"]);
        t.deselect_all();
        assert_eq!(t.selected_count(), 0);
    }

    #[test]
    fn replace_resets_selection() {
        let mut t = table();
        t.select_all();
        t.replace(vec![result("z", "New", "Chan")]);
        assert_eq!(t.len(), 1);
        assert_eq!(t.selected_count(), 0);
    }
}
