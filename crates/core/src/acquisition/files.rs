//! Choosing which files of a torrent to download.

use std::collections::BTreeMap;

use super::types::AcquisitionError;
use crate::discovery::{episode_in_file_name, normalize_title};
use crate::torrent_client::TorrentFile;

const MEDIA_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "wmv", "m4v", "webm", "ts", "m2ts", "mpg", "mpeg",
];

const SAMPLE_MARKERS: &[&str] = &["sample", "trailer", "promo"];

/// Whether a torrent entry is a playable, non-sample media file.
pub fn is_media_file(name: &str) -> bool {
    let lower = name.to_lowercase();
    let has_media_ext = lower
        .rsplit_once('.')
        .is_some_and(|(_, ext)| MEDIA_EXTENSIONS.contains(&ext));
    if !has_media_ext {
        return false;
    }
    let words = normalize_title(&lower);
    !words
        .split(' ')
        .any(|w| SAMPLE_MARKERS.contains(&w))
}

/// Pick the single file holding the slot's content.
///
/// With one media file it is taken unless the indexer could not map the
/// release to the title. With several, the file closest to one of the name
/// variants wins if it scores strictly better than the runner-up. Episode
/// slots first narrow the choice to files marked with their episode number.
pub fn select_file(
    files: &[TorrentFile],
    names: &[String],
    unknown_title: bool,
    episode: Option<u32>,
) -> Result<TorrentFile, AcquisitionError> {
    let mut media: Vec<&TorrentFile> = files.iter().filter(|f| is_media_file(&f.name)).collect();

    if let Some(episode) = episode {
        let marked: Vec<&TorrentFile> = media
            .iter()
            .copied()
            .filter(|f| episode_in_file_name(&f.name) == Some(episode))
            .collect();
        if !marked.is_empty() {
            media = marked;
        }
    }

    match media.as_slice() {
        [] => Err(AcquisitionError::NoMatchingFile),
        [only] if unknown_title => Err(AcquisitionError::AmbiguousFiles(format!(
            "single file {} of an unmatched release",
            only.name
        ))),
        [only] => Ok((*only).clone()),
        _ => pick_by_name(&media, names),
    }
}

fn pick_by_name(media: &[&TorrentFile], names: &[String]) -> Result<TorrentFile, AcquisitionError> {
    let mut scored: Vec<(f64, &TorrentFile)> = media
        .iter()
        .map(|f| (best_name_score(&f.name, names), *f))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let (best, file) = scored[0];
    let runner_up = scored[1].0;
    if best > 0.0 && best > runner_up {
        Ok(file.clone())
    } else {
        Err(AcquisitionError::AmbiguousFiles(format!(
            "{} files, best score {best:.2}",
            media.len()
        )))
    }
}

/// Map each requested episode to the file carrying its marker. Episodes
/// without a file are left out; the first file wins for duplicates.
pub fn select_episode_files(
    files: &[TorrentFile],
    episodes: &[u32],
) -> Result<BTreeMap<u32, TorrentFile>, AcquisitionError> {
    let mut selected = BTreeMap::new();
    for file in files.iter().filter(|f| is_media_file(&f.name)) {
        if let Some(ep) = episode_in_file_name(&file.name) {
            if episodes.contains(&ep) {
                selected.entry(ep).or_insert_with(|| file.clone());
            }
        }
    }
    if selected.is_empty() {
        return Err(AcquisitionError::NoMatchingFile);
    }
    Ok(selected)
}

fn best_name_score(file_name: &str, names: &[String]) -> f64 {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let stem = base.rsplit_once('.').map(|(s, _)| s).unwrap_or(base);
    let stem = normalize_title(stem);
    names
        .iter()
        .map(|name| similarity(&stem, &normalize_title(name)))
        .fold(0.0, f64::max)
}

/// Similarity in `[0, 1]` between a file stem and a title name: the best
/// edit-distance ratio of the name against an equally long prefix of the
/// stem, so trailing release tags do not count against a match.
fn similarity(stem: &str, name: &str) -> f64 {
    if stem.is_empty() || name.is_empty() {
        return 0.0;
    }
    let name_len = name.chars().count();
    let prefix: String = stem.chars().take(name_len).collect();
    let distance = levenshtein_distance(&prefix, name);
    let longest = name_len.max(prefix.chars().count());
    1.0 - distance as f64 / longest as f64
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0usize; b_chars.len() + 1];
    for (i, a_char) in a_chars.iter().enumerate() {
        current[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b_chars.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::torrent_client::FilePriority;

    fn file(index: u32, name: &str) -> TorrentFile {
        TorrentFile {
            index,
            name: name.to_string(),
            size_bytes: 1_000,
            progress: 0.0,
            priority: FilePriority::Normal,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_media_file_filter() {
        assert!(is_media_file("Movie.2020.1080p.mkv"));
        assert!(is_media_file("dir/Movie.MP4"));
        assert!(!is_media_file("Movie.2020.1080p.nfo"));
        assert!(!is_media_file("Movie.2020.Sample.mkv"));
        assert!(!is_media_file("Sample/movie-sample.mkv"));
        assert!(!is_media_file("README"));
    }

    #[test]
    fn test_single_file_accepted() {
        let files = vec![file(0, "Movie.mkv"), file(1, "Movie.nfo"), file(2, "sample.mkv")];
        let picked = select_file(&files, &names(&["Other"]), false, None).unwrap();
        assert_eq!(picked.index, 0);
    }

    #[test]
    fn test_single_file_of_unknown_title_rejected() {
        let files = vec![file(0, "Movie.mkv")];
        assert!(matches!(
            select_file(&files, &names(&["Movie"]), true, None),
            Err(AcquisitionError::AmbiguousFiles(_))
        ));
    }

    #[test]
    fn test_no_media_files() {
        let files = vec![file(0, "Movie.nfo")];
        assert!(matches!(
            select_file(&files, &names(&["Movie"]), false, None),
            Err(AcquisitionError::NoMatchingFile)
        ));
    }

    #[test]
    fn test_best_name_wins() {
        let files = vec![
            file(0, "Collection/Alien.1979.1080p.mkv"),
            file(1, "Collection/Aliens.1986.1080p.mkv"),
            file(2, "Collection/Prometheus.2012.1080p.mkv"),
        ];
        let picked = select_file(&files, &names(&["Prometheus"]), false, None).unwrap();
        assert_eq!(picked.index, 2);
    }

    #[test]
    fn test_tied_names_are_ambiguous() {
        let files = vec![file(0, "Movie.Part1.mkv"), file(1, "Movie.Part2.mkv")];
        assert!(matches!(
            select_file(&files, &names(&["Movie"]), false, None),
            Err(AcquisitionError::AmbiguousFiles(_))
        ));
    }

    #[test]
    fn test_episode_marker_narrows_choice() {
        let files = vec![
            file(0, "Show.S01E02.mkv"),
            file(1, "Show.S01E03.mkv"),
        ];
        let picked = select_file(&files, &names(&["Show"]), false, Some(3)).unwrap();
        assert_eq!(picked.index, 1);
    }

    #[test]
    fn test_episode_files() {
        let files = vec![
            file(0, "Show.S01/Show.S01E01.mkv"),
            file(1, "Show.S01/Show.S01E02.mkv"),
            file(2, "Show.S01/Show.S01E02.Sample.mkv"),
            file(3, "Show.S01/Show.S01E09.mkv"),
            file(4, "Show.S01/Extras.mkv"),
        ];
        let selected = select_episode_files(&files, &[1, 2, 3]).unwrap();
        assert_eq!(selected.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(selected[&2].index, 1);

        assert!(select_episode_files(&files, &[5]).is_err());
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }
}
