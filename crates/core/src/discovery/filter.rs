//! Screening of indexer descriptors before they become candidates.

use chrono::{DateTime, Duration, Utc};

use crate::indexer::{IndexerRelease, Protocol};
use crate::release::{Language, Resolution, RipType, Tracker};

/// Why a descriptor was not stored. The label feeds the rejection metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Protocol,
    CustomFormat,
    Seeders,
    Tracker,
    Quality,
    Stale,
    NameMismatch,
    OtherEpisodes,
    Locator,
    Invalid,
    Duplicate,
}

impl Rejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Rejection::Protocol => "protocol",
            Rejection::CustomFormat => "custom_format",
            Rejection::Seeders => "seeders",
            Rejection::Tracker => "tracker",
            Rejection::Quality => "quality",
            Rejection::Stale => "stale",
            Rejection::NameMismatch => "name_mismatch",
            Rejection::OtherEpisodes => "other_episodes",
            Rejection::Locator => "locator",
            Rejection::Invalid => "invalid",
            Rejection::Duplicate => "duplicate",
        }
    }
}

pub(crate) struct ScreenContext {
    pub min_seeders: u32,
    pub staleness_window: Duration,
    pub now: DateTime<Utc>,
    /// Estimated time the slot's latest content became available.
    pub last_release_time: Option<DateTime<Utc>>,
    pub original_language: Option<Language>,
}

/// Descriptor fields resolved into domain values.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Screened {
    pub rip_type: RipType,
    pub resolution: Resolution,
    pub tracker: Tracker,
    pub release_time: Option<DateTime<Utc>>,
    pub languages: Vec<Language>,
}

pub(crate) fn screen(release: &IndexerRelease, ctx: &ScreenContext) -> Result<Screened, Rejection> {
    if release.protocol != Protocol::Torrent {
        return Err(Rejection::Protocol);
    }
    if release.custom_format_score < 0 {
        return Err(Rejection::CustomFormat);
    }
    if release.seeders.unwrap_or(0) <= ctx.min_seeders {
        return Err(Rejection::Seeders);
    }

    let tracker = Tracker::resolve(
        release.info_url.as_deref(),
        release.comment_url.as_deref(),
        release.indexer_name.as_deref(),
    )
    .ok_or(Rejection::Tracker)?;

    let rip_type = RipType::from_quality_name(&release.quality_name).ok_or(Rejection::Quality)?;
    let resolution = match release.resolution_hint.and_then(Resolution::from_pixels) {
        Some(resolution) => resolution,
        None if rip_type.is_low_quality() => Resolution::Sd,
        None => return Err(Rejection::Quality),
    };

    let languages: Vec<Language> = release
        .languages
        .iter()
        .filter_map(|name| Language::from_name(name))
        .collect();

    if is_stale(tracker, &languages, ctx) {
        return Err(Rejection::Stale);
    }

    let release_time = if tracker.has_unreliable_age() {
        None
    } else {
        release
            .age_seconds
            .and_then(|age| i64::try_from(age).ok())
            .map(|age| ctx.now - Duration::seconds(age))
    };

    Ok(Screened {
        rip_type,
        resolution,
        tracker,
        release_time,
        languages,
    })
}

/// Old slots mostly attract re-encodes of releases already seen. Only
/// language-specific trackers or releases declaring a foreign audio
/// language are still worth a look.
fn is_stale(tracker: Tracker, languages: &[Language], ctx: &ScreenContext) -> bool {
    let old = ctx
        .last_release_time
        .is_some_and(|t| ctx.now - t > ctx.staleness_window);
    if !old || tracker.is_language_specific() {
        return false;
    }
    languages.is_empty()
        || ctx
            .original_language
            .is_some_and(|orig| languages.iter().all(|l| l.base() == orig.base()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use chrono::TimeZone;

    fn ctx() -> ScreenContext {
        ScreenContext {
            min_seeders: 1,
            staleness_window: Duration::days(90),
            now: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            last_release_time: None,
            original_language: Some(Language::En),
        }
    }

    #[test]
    fn test_accepts_plain_descriptor() {
        let release = fixtures::indexer_release("g1", &"a".repeat(40));
        let screened = screen(&release, &ctx()).unwrap();
        assert_eq!(screened.rip_type, RipType::Web);
        assert_eq!(screened.resolution, Resolution::Fhd);
        assert_eq!(screened.tracker, Tracker::Yts);
        assert_eq!(
            screened.release_time,
            Some(Utc.with_ymd_and_hms(2024, 5, 31, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_rejections() {
        let base = fixtures::indexer_release("g1", &"a".repeat(40));

        let mut r = base.clone();
        r.protocol = Protocol::Usenet;
        assert_eq!(screen(&r, &ctx()), Err(Rejection::Protocol));

        let mut r = base.clone();
        r.custom_format_score = -1;
        assert_eq!(screen(&r, &ctx()), Err(Rejection::CustomFormat));

        let mut r = base.clone();
        r.seeders = Some(1);
        assert_eq!(screen(&r, &ctx()), Err(Rejection::Seeders));

        let mut r = base.clone();
        r.indexer_name = Some("Unknown Tracker".into());
        r.info_url = None;
        assert_eq!(screen(&r, &ctx()), Err(Rejection::Tracker));

        let mut r = base.clone();
        r.quality_name = "Unknown".into();
        assert_eq!(screen(&r, &ctx()), Err(Rejection::Quality));

        let mut r = base;
        r.resolution_hint = None;
        assert_eq!(screen(&r, &ctx()), Err(Rejection::Quality));
    }

    #[test]
    fn test_low_quality_falls_back_to_sd() {
        let mut r = fixtures::indexer_release("g1", &"a".repeat(40));
        r.quality_name = "CAM".into();
        r.resolution_hint = None;
        assert_eq!(screen(&r, &ctx()).unwrap().resolution, Resolution::Sd);
    }

    #[test]
    fn test_unreliable_age_is_unknown() {
        let mut r = fixtures::indexer_release("g1", &"a".repeat(40));
        r.indexer_name = Some("Rutor".into());
        r.info_url = Some("http://rutor.info/torrent/1".into());
        let screened = screen(&r, &ctx()).unwrap();
        assert_eq!(screened.tracker, Tracker::Rutor);
        assert_eq!(screened.release_time, None);
    }

    #[test]
    fn test_staleness() {
        let mut old = ctx();
        old.last_release_time = Some(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());

        let generic = fixtures::indexer_release("g1", &"a".repeat(40));
        assert_eq!(screen(&generic, &old), Err(Rejection::Stale));

        let mut english = generic.clone();
        english.languages = vec!["English".into()];
        assert_eq!(screen(&english, &old), Err(Rejection::Stale));

        let mut russian = generic.clone();
        russian.languages = vec!["English".into(), "Russian".into()];
        assert!(screen(&russian, &old).is_ok());

        let mut lostfilm = generic;
        lostfilm.info_url = Some("https://www.lostfilm.tv/series/x".into());
        assert_eq!(screen(&lostfilm, &old).unwrap().tracker, Tracker::LostFilm);
    }
}
