//! A scheduling session: one shared link's participants, date range and
//! aggregated availability.
//!
//! Every client keeps a replica of the session's documents. Local
//! submissions write through `Persistence`; changes pushed by the store are
//! fed back in with `Session::apply`. The aggregated grid is always derived
//! again from the submissions, never edited by hand.

use crate::aggregate::{heatmap, merge_submissions, rank_candidates, CandidateSlot, Heatmap};
use crate::config::Settings;
use crate::data::{DateRange, Schedule, ValidationError};
use crate::participant::{ParticipantRecord, ParticipantSubmission, Roster};
use crate::store::{is_valid_segment, Backend, Key, Persistence, SaveOutcome};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LENGTH: usize = 9;

/// Opaque identifier partitioning all persisted state of a session
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq, Hash)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: &str) -> SessionId {
        SessionId(id.to_string())
    }

    /// Nine random lowercase alphanumeric characters
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> SessionId {
        SessionId(
            (0..ID_LENGTH)
                .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
                .collect(),
        )
    }

    /// The id carried by a URL or its query string. `session` wins over
    /// `share`; values that cannot name a store document are ignored.
    ///
    /// # Examples
    /// ```
    /// use zeitraster_libs::session::SessionId;
    ///
    /// let id = SessionId::from_query("https://example.org/?share=old&session=k3x9q2m7a");
    ///
    /// assert_eq!(id, Some(SessionId::new("k3x9q2m7a")));
    /// assert_eq!(SessionId::from_query("?share=&other=1"), None);
    /// ```
    pub fn from_query(query: &str) -> Option<SessionId> {
        let query = query.split('#').next().unwrap_or_default();
        let query = match query.find('?') {
            Some(index) => &query[index + 1..],
            None => query,
        };

        let params: Vec<(&str, &str)> = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .filter(|(_, value)| is_valid_segment(value))
            .collect();
        let lookup = |name: &str| {
            params
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| SessionId::new(value))
        };

        lookup("session").or_else(|| lookup("share"))
    }

    /// The id from `query`, or a fresh random one
    pub fn resolve(query: &str) -> SessionId {
        SessionId::from_query(query).unwrap_or_else(|| {
            let id = SessionId::random(&mut rand::thread_rng());
            info!("Starting new session {}", id);
            id
        })
    }

    pub fn share_link(&self, base: &str) -> String {
        format!("{}?session={}", base, self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Local copy of one replicated document. A document that has not arrived
/// yet is not the same as one the store reported missing.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Replica<T> {
    NotLoaded,
    Empty,
    Loaded(T),
}

impl<T> Default for Replica<T> {
    fn default() -> Self {
        Replica::NotLoaded
    }
}

impl<T> Replica<T> {
    pub fn from_document(document: Option<T>) -> Replica<T> {
        match document {
            Some(value) => Replica::Loaded(value),
            None => Replica::Empty,
        }
    }

    pub fn as_loaded(&self) -> Option<&T> {
        match self {
            Replica::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Replica::Loaded(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Replica::NotLoaded)
    }
}

/// A document pushed by the store. `None` means the document was removed or
/// never written.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteChange {
    Participants(Option<BTreeMap<String, ParticipantRecord>>),
    Schedules(Option<BTreeMap<String, Schedule>>),
    DateRange(Option<DateRange>),
    Aggregated(Option<Schedule>),
}

fn fetch<T, R, L>(persistence: &Persistence<R, L>, key: Key<'_>, fallback: Replica<T>) -> Replica<T>
where
    T: DeserializeOwned,
    R: Backend,
    L: Backend,
{
    match persistence.load(key) {
        Ok(document) => Replica::from_document(document),
        Err(e) => {
            warn!(
                "Could not load {} of session {}, using defaults: {}",
                key.path(),
                persistence.session(),
                e
            );
            fallback
        }
    }
}

pub struct Session {
    id: SessionId,
    settings: Settings,
    participants: Replica<BTreeMap<String, ParticipantRecord>>,
    schedules: Replica<BTreeMap<String, Schedule>>,
    date_range: Replica<DateRange>,
    aggregated: Replica<Schedule>,
    roster: Roster,
}

impl Session {
    pub fn new(id: SessionId, settings: Settings) -> Session {
        Session {
            id,
            settings,
            participants: Replica::NotLoaded,
            schedules: Replica::NotLoaded,
            date_range: Replica::NotLoaded,
            aggregated: Replica::NotLoaded,
            roster: Roster::new(),
        }
    }

    /// Reads every document of the session. Documents that cannot be read
    /// fall back to an empty grid and a range starting `today`.
    pub fn load<R, L>(&mut self, persistence: &Persistence<R, L>, today: NaiveDate)
    where
        R: Backend,
        L: Backend,
    {
        let default_range = match DateRange::starting_at(today, self.settings.default_range_days) {
            Some(range) => Replica::Loaded(range),
            None => {
                warn!(
                    "No default range of {} days from {}",
                    self.settings.default_range_days, today
                );
                Replica::Empty
            }
        };

        self.participants = fetch(persistence, Key::Participants, Replica::Empty);
        self.schedules = fetch(persistence, Key::Schedules, Replica::Empty);
        let date_range = fetch(persistence, Key::DateRange, default_range);
        self.date_range = self.bounded(date_range);
        self.aggregated = fetch(persistence, Key::Aggregated, Replica::Loaded(Schedule::new()));
        self.rebuild();

        info!(
            "Loaded session {} with {} participants",
            self.id,
            self.roster.len()
        );
    }

    /// Records `submission` (replacing any earlier one under the same name),
    /// writes it out and publishes the re-derived aggregated grid. Returns the
    /// least durable outcome of those writes.
    pub fn submit<R, L>(
        &mut self,
        submission: ParticipantSubmission,
        persistence: &mut Persistence<R, L>,
    ) -> Result<SaveOutcome, ValidationError>
    where
        R: Backend,
        L: Backend,
    {
        let name = submission.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::MissingName);
        }
        if !is_valid_segment(&name) {
            return Err(ValidationError::InvalidKey(name));
        }
        let submission = ParticipantSubmission { name, ..submission };
        let record = submission.record();

        let mut records = self.participants.as_loaded().cloned().unwrap_or_default();
        records.insert(record.id.clone(), record.clone());
        self.participants = Replica::Loaded(records);

        let mut schedules = self.schedules.as_loaded().cloned().unwrap_or_default();
        schedules.insert(submission.name.clone(), submission.schedule.clone());
        self.schedules = Replica::Loaded(schedules);

        let name = submission.name.clone();
        self.roster.upsert(submission);
        self.rebuild();

        info!("{} submitted to session {}", name, self.id);

        let mut outcome = persistence.save(Key::Participant(&name), &record);
        if let Some(schedule) = self.roster.get(&name).map(|p| &p.schedule) {
            outcome = outcome.worst(persistence.save(Key::Schedule(&name), schedule));
        }
        if let Some(range) = self.date_range.as_loaded() {
            outcome = outcome.worst(persistence.save(Key::DateRange, range));
        }
        if let Some(grid) = self.aggregated.as_loaded() {
            outcome = outcome.worst(persistence.save(Key::Aggregated, grid));
        }

        Ok(outcome)
    }

    /// Applies a document pushed by the store
    pub fn apply(&mut self, change: RemoteChange) {
        match change {
            RemoteChange::Participants(records) => {
                self.participants = Replica::from_document(records);
                self.rebuild();
            }
            RemoteChange::Schedules(schedules) => {
                self.schedules = Replica::from_document(schedules);
                self.rebuild();
            }
            RemoteChange::DateRange(range) => {
                debug!("Date range of {} is now {:?}", self.id, range);
                self.date_range = self.bounded(Replica::from_document(range));
            }
            RemoteChange::Aggregated(grid) => self.aggregated = Replica::from_document(grid),
        }
    }

    /// Changes the session's date range, refusing ranges longer than the
    /// configured maximum
    pub fn set_date_range<R, L>(
        &mut self,
        range: DateRange,
        persistence: &mut Persistence<R, L>,
    ) -> Result<SaveOutcome, ValidationError>
    where
        R: Backend,
        L: Backend,
    {
        range.validate(self.settings.max_range_days)?;
        self.date_range = Replica::Loaded(range);
        Ok(persistence.save(Key::DateRange, &range))
    }

    /// A range longer than the configured maximum leaves nothing to compute
    fn bounded(&self, range: Replica<DateRange>) -> Replica<DateRange> {
        match range {
            Replica::Loaded(range) => match range.validate(self.settings.max_range_days) {
                Ok(()) => Replica::Loaded(range),
                Err(e) => {
                    warn!("Ignoring date range of {}: {}", self.id, e);
                    Replica::Empty
                }
            },
            other => other,
        }
    }

    /// Derives the roster from the participant records and schedules, then
    /// the aggregated grid from the roster. Known participants keep their
    /// place; newcomers follow in the order they joined.
    fn rebuild(&mut self) {
        let previous = std::mem::take(&mut self.roster);
        let records = self.participants.as_loaded();
        let schedules = self.schedules.as_loaded();

        let present: BTreeSet<&String> = records
            .into_iter()
            .flat_map(|records| records.keys())
            .chain(schedules.into_iter().flat_map(|schedules| schedules.keys()))
            .collect();

        let mut newcomers: Vec<&String> = present
            .iter()
            .copied()
            .filter(|name| previous.get(name).is_none())
            .collect();
        newcomers.sort_by_key(|name| {
            records
                .and_then(|records| records.get(*name))
                .map(|record| record.joined_at)
        });

        let names: Vec<&String> = previous
            .iter()
            .filter_map(|p| present.get(&p.name).copied())
            .chain(newcomers)
            .collect();

        self.roster = names
            .into_iter()
            .map(|name| {
                let earlier = previous.get(name);
                ParticipantSubmission {
                    name: name.clone(),
                    schedule: schedules
                        .and_then(|schedules| schedules.get(name))
                        .cloned()
                        .unwrap_or_default(),
                    show_details: earlier.map_or(false, |p| p.show_details),
                    submitted_at: records
                        .and_then(|records| records.get(name))
                        .map(|record| record.joined_at)
                        .or_else(|| earlier.map(|p| p.submitted_at))
                        .unwrap_or_else(DateTime::<Utc>::default),
                }
            })
            .collect();

        if !self.schedules.is_pending() || !self.roster.is_empty() {
            self.aggregated = Replica::Loaded(merge_submissions(self.roster.as_slice()));
        }
    }

    /// Every candidate slot within the date range, best first. Empty while
    /// the session has no date range.
    pub fn ranked(&self) -> Vec<CandidateSlot> {
        let range = match self.date_range.as_loaded() {
            Some(range) => range,
            None => return Vec::new(),
        };

        let mut grid = self.aggregated.as_loaded().cloned().unwrap_or_default();
        grid.retain_within(range);

        rank_candidates(&grid, self.roster.as_slice())
    }

    /// The configured number of best candidate slots
    pub fn best_times(&self) -> Vec<CandidateSlot> {
        let mut ranked = self.ranked();
        ranked.truncate(self.settings.top_k);
        ranked
    }

    pub fn heatmap(&self) -> Heatmap {
        heatmap(self.date_range.as_loaded(), self.roster.as_slice())
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn participants(&self) -> &Replica<BTreeMap<String, ParticipantRecord>> {
        &self.participants
    }

    pub fn date_range(&self) -> &Replica<DateRange> {
        &self.date_range
    }

    pub fn aggregated(&self) -> &Replica<Schedule> {
        &self.aggregated
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }
}
