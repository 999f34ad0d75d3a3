use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::slot::{DiscoveryState, SlotKey, SlotState};
use crate::release::Language;

/// A catalog title with its per-slot acquisition state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Title {
    pub id: String,
    /// Known name variants, primary name first.
    pub names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_language: Option<Language>,
    /// Identifier of the title in the indexer (Radarr movie id / Sonarr series id).
    pub indexer_id: i64,
    pub kind: TitleKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TitleKind {
    Movie(Movie),
    TvShow(TvShow),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub discovery: DiscoveryState,
    #[serde(default)]
    pub slot: SlotState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TvShow {
    #[serde(default)]
    pub seasons: BTreeMap<u32, Season>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub number: u32,
    #[serde(default)]
    pub discovery: DiscoveryState,
    /// Whole-season candidates.
    #[serde(default)]
    pub slot: SlotState,
    #[serde(default)]
    pub episodes: BTreeMap<u32, Episode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub slot: SlotState,
}

impl Season {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            ..Default::default()
        }
    }

    /// Latest known air date among the season's episodes.
    pub fn last_air_date(&self) -> Option<DateTime<Utc>> {
        self.episodes.values().filter_map(|e| e.air_date).max()
    }
}

impl Episode {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            ..Default::default()
        }
    }
}

impl Title {
    pub fn primary_name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or_default()
    }

    pub fn is_movie(&self) -> bool {
        matches!(self.kind, TitleKind::Movie(_))
    }

    pub fn season(&self, number: u32) -> Option<&Season> {
        match &self.kind {
            TitleKind::TvShow(show) => show.seasons.get(&number),
            TitleKind::Movie(_) => None,
        }
    }

    pub fn season_mut(&mut self, number: u32) -> Option<&mut Season> {
        match &mut self.kind {
            TitleKind::TvShow(show) => show.seasons.get_mut(&number),
            TitleKind::Movie(_) => None,
        }
    }

    /// Every slot acquisition runs on: the movie itself, or each season
    /// followed by its episodes.
    pub fn slot_keys(&self) -> Vec<SlotKey> {
        match &self.kind {
            TitleKind::Movie(_) => vec![SlotKey::movie(&self.id)],
            TitleKind::TvShow(show) => show
                .seasons
                .values()
                .flat_map(|season| {
                    std::iter::once(SlotKey::season(&self.id, season.number)).chain(
                        season
                            .episodes
                            .keys()
                            .map(|ep| SlotKey::episode(&self.id, season.number, *ep)),
                    )
                })
                .collect(),
        }
    }

    /// Whether the key names a slot that exists on this title.
    pub fn has_slot(&self, key: &SlotKey) -> bool {
        key.title_id() == self.id && self.slot(key).is_some()
    }

    pub fn slot(&self, key: &SlotKey) -> Option<&SlotState> {
        match (&self.kind, key) {
            (TitleKind::Movie(movie), SlotKey::Movie { .. }) => Some(&movie.slot),
            (TitleKind::TvShow(show), SlotKey::Season { season, .. }) => {
                show.seasons.get(season).map(|s| &s.slot)
            }
            (TitleKind::TvShow(show), SlotKey::Episode { season, episode, .. }) => show
                .seasons
                .get(season)
                .and_then(|s| s.episodes.get(episode))
                .map(|e| &e.slot),
            _ => None,
        }
    }

    pub fn slot_mut(&mut self, key: &SlotKey) -> Option<&mut SlotState> {
        match (&mut self.kind, key) {
            (TitleKind::Movie(movie), SlotKey::Movie { .. }) => Some(&mut movie.slot),
            (TitleKind::TvShow(show), SlotKey::Season { season, .. }) => {
                show.seasons.get_mut(season).map(|s| &mut s.slot)
            }
            (TitleKind::TvShow(show), SlotKey::Episode { season, episode, .. }) => show
                .seasons
                .get_mut(season)
                .and_then(|s| s.episodes.get_mut(episode))
                .map(|e| &mut e.slot),
            _ => None,
        }
    }

    /// Discovery state governing a slot. Episodes share their season's.
    pub fn discovery(&self, key: &SlotKey) -> Option<&DiscoveryState> {
        match (&self.kind, key) {
            (TitleKind::Movie(movie), SlotKey::Movie { .. }) => Some(&movie.discovery),
            (TitleKind::TvShow(show), SlotKey::Season { season, .. })
            | (TitleKind::TvShow(show), SlotKey::Episode { season, .. }) => {
                show.seasons.get(season).map(|s| &s.discovery)
            }
            _ => None,
        }
    }

    pub fn discovery_mut(&mut self, key: &SlotKey) -> Option<&mut DiscoveryState> {
        match (&mut self.kind, key) {
            (TitleKind::Movie(movie), SlotKey::Movie { .. }) => Some(&mut movie.discovery),
            (TitleKind::TvShow(show), SlotKey::Season { season, .. })
            | (TitleKind::TvShow(show), SlotKey::Episode { season, .. }) => {
                show.seasons.get_mut(season).map(|s| &mut s.discovery)
            }
            _ => None,
        }
    }

    /// Official runtime of a single-file slot in seconds. Whole seasons have
    /// none; each episode carries its own.
    pub fn runtime_secs(&self, key: &SlotKey) -> Option<u64> {
        let minutes = match (&self.kind, key) {
            (TitleKind::Movie(movie), SlotKey::Movie { .. }) => movie.runtime_minutes,
            (TitleKind::TvShow(show), SlotKey::Episode { season, episode, .. }) => show
                .seasons
                .get(season)
                .and_then(|s| s.episodes.get(episode))
                .and_then(|e| e.runtime_minutes),
            _ => None,
        };
        minutes.map(|m| u64::from(m) * 60)
    }

    /// Estimated time the slot's latest content became available: the
    /// movie's release date or the season's last episode air date.
    pub fn last_release_time(&self, key: &SlotKey) -> Option<DateTime<Utc>> {
        match (&self.kind, key) {
            (TitleKind::Movie(movie), SlotKey::Movie { .. }) => movie
                .release_date
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc()),
            (TitleKind::TvShow(show), SlotKey::Season { season, .. })
            | (TitleKind::TvShow(show), SlotKey::Episode { season, .. }) => {
                show.seasons.get(season).and_then(Season::last_air_date)
            }
            _ => None,
        }
    }
}
