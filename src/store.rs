//! Persistence of session state.
//!
//! A `Backend` is a path-addressed document store, like the replicated
//! realtime database the browser talks to or the browser's local storage.
//! `Persistence` writes to the remote backend first, retries once, and falls
//! back to the local backend, so callers only ever see a `SaveOutcome`.

use crate::data::Schedule;
use crate::selection::GridSink;
use crate::session::SessionId;
use log::{debug, error, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid document: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid path {0:?}")]
    InvalidPath(String),
}

/// Where a write ended up
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SaveOutcome {
    Remote,
    Local,
    /// Neither backend accepted the write
    Lost,
}

impl SaveOutcome {
    /// The less durable of two outcomes
    pub fn worst(self, other: SaveOutcome) -> SaveOutcome {
        match (self, other) {
            (SaveOutcome::Lost, _) | (_, SaveOutcome::Lost) => SaveOutcome::Lost,
            (SaveOutcome::Local, _) | (_, SaveOutcome::Local) => SaveOutcome::Local,
            _ => SaveOutcome::Remote,
        }
    }
}

pub trait Backend {
    /// Replaces the document at `path`. Writing `null` removes it.
    fn set(&mut self, path: &str, value: Value) -> Result<(), StoreError>;

    /// The document at `path`, `None` when nothing is stored there
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;
}

/// Whether `segment` can name a single document. Separators and the
/// characters the realtime store reserves are refused.
///
/// # Examples
/// ```
/// use zeitraster_libs::store::is_valid_segment;
///
/// assert!(is_valid_segment("ana"));
/// assert!(!is_valid_segment("AC/DC"));
/// assert!(!is_valid_segment(""));
/// ```
pub fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment
            .chars()
            .any(|c| matches!(c, '/' | '.' | '#' | '$' | '[' | ']') || c.is_control())
}

fn segments(path: &str) -> Result<Vec<&str>, StoreError> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        Err(StoreError::InvalidPath(path.to_string()))
    } else {
        Ok(segments)
    }
}

/// A JSON tree kept in memory. Serves as the local fallback and as a stand-in
/// for the remote store.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    root: Map<String, Value>,
    online: bool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        MemoryBackend {
            root: Map::new(),
            online: true,
        }
    }
}

impl MemoryBackend {
    pub fn new() -> MemoryBackend {
        MemoryBackend::default()
    }

    /// While offline every read and write fails with `StoreError::Unavailable`
    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.online {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory backend is offline".to_string()))
        }
    }
}

impl Backend for MemoryBackend {
    fn set(&mut self, path: &str, value: Value) -> Result<(), StoreError> {
        self.check_online()?;
        let segments = segments(path)?;
        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => return Err(StoreError::InvalidPath(path.to_string())),
        };

        let mut node = &mut self.root;
        for segment in parents {
            let child = node
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            node = match child.as_object_mut() {
                Some(object) => object,
                None => return Err(StoreError::InvalidPath(path.to_string())),
            };
        }

        if value.is_null() {
            node.remove(*last);
        } else {
            node.insert(last.to_string(), value);
        }

        Ok(())
    }

    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.check_online()?;
        let segments = segments(path)?;

        let mut node = &self.root;
        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => return Err(StoreError::InvalidPath(path.to_string())),
        };
        for segment in parents {
            node = match node.get(*segment).and_then(Value::as_object) {
                Some(object) => object,
                None => return Ok(None),
            };
        }

        Ok(node.get(*last).cloned())
    }
}

/// The documents a session keeps, relative to the session's root
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Key<'a> {
    Participants,
    Participant(&'a str),
    Schedules,
    Schedule(&'a str),
    DateRange,
    Aggregated,
    /// The grid being edited on this client, not yet submitted
    Draft,
}

impl<'a> Key<'a> {
    pub fn path(&self) -> String {
        match self {
            Key::Participants => "participants".to_string(),
            Key::Participant(name) => format!("participants/{}", name),
            Key::Schedules => "timeSlots".to_string(),
            Key::Schedule(name) => format!("timeSlots/{}", name),
            Key::DateRange => "dateRange".to_string(),
            Key::Aggregated => "aggregatedTimeSlots".to_string(),
            Key::Draft => "scheduleData/timeSlots".to_string(),
        }
    }
}

/// One session's view of the remote store and its local fallback. Both keep
/// the same layout under different roots.
pub struct Persistence<R, L> {
    session: SessionId,
    remote: R,
    local: L,
}

impl<R, L> Persistence<R, L>
where
    R: Backend,
    L: Backend,
{
    pub fn new(session: SessionId, remote: R, local: L) -> Self {
        Persistence {
            session,
            remote,
            local,
        }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn remote_path(&self, key: Key<'_>) -> String {
        format!("sessions/{}/{}", self.session, key.path())
    }

    pub fn local_path(&self, key: Key<'_>) -> String {
        format!("calendar_share_{}/{}", self.session, key.path())
    }

    /// Writes remotely, retrying once, then locally. Never fails; a write no
    /// backend accepted is reported as `SaveOutcome::Lost`.
    pub fn save<T>(&mut self, key: Key<'_>, value: &T) -> SaveOutcome
    where
        T: Serialize + ?Sized,
    {
        let document = match serde_json::to_value(value) {
            Ok(document) => document,
            Err(e) => {
                error!("Could not serialize {}: {}", key.path(), e);
                return SaveOutcome::Lost;
            }
        };

        let remote_path = self.remote_path(key);
        for attempt in 1..=2 {
            match self.remote.set(&remote_path, document.clone()) {
                Ok(()) => {
                    debug!("Saved {}", remote_path);
                    return SaveOutcome::Remote;
                }
                Err(e) => warn!("Remote write of {} failed (attempt {}): {}", remote_path, attempt, e),
            }
        }

        let local_path = self.local_path(key);
        match self.local.set(&local_path, document) {
            Ok(()) => {
                warn!("Saved {} locally instead", local_path);
                SaveOutcome::Local
            }
            Err(e) => {
                error!("Local write of {} failed: {}", local_path, e);
                SaveOutcome::Lost
            }
        }
    }

    /// Reads remotely, falling back to the local copy when the remote store
    /// cannot be reached. `Ok(None)` means nothing is stored.
    pub fn load<T>(&self, key: Key<'_>) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        let document = match self.remote.get(&self.remote_path(key)) {
            Ok(document) => document,
            Err(e) => {
                warn!("Remote read of {} failed, using local copy: {}", key.path(), e);
                self.local.get(&self.local_path(key))?
            }
        };

        Ok(document.map(serde_json::from_value).transpose()?)
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn remote_mut(&mut self) -> &mut R {
        &mut self.remote
    }

    pub fn local(&self) -> &L {
        &self.local
    }
}

impl<R, L> GridSink for Persistence<R, L>
where
    R: Backend,
    L: Backend,
{
    fn save(&mut self, schedule: &Schedule) -> SaveOutcome {
        Persistence::save(self, Key::Draft, schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Fails the first `failures` writes
    struct Flaky {
        inner: MemoryBackend,
        failures: usize,
    }

    impl Backend for Flaky {
        fn set(&mut self, path: &str, value: Value) -> Result<(), StoreError> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(StoreError::Unavailable("flaky".to_string()));
            }
            self.inner.set(path, value)
        }

        fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
            self.inner.get(path)
        }
    }

    fn session() -> SessionId {
        SessionId::new("abc123xyz")
    }

    #[test]
    fn memory_backend_nests_paths() {
        let mut backend = MemoryBackend::new();
        backend.set("a/b/c", json!(1)).unwrap();
        backend.set("a/b/d", json!({"x": true})).unwrap();

        assert_eq!(backend.get("a/b").unwrap(), Some(json!({"c": 1, "d": {"x": true}})));
        assert_eq!(backend.get("a/b/d/x").unwrap(), Some(json!(true)));
        assert_eq!(backend.get("a/z/q").unwrap(), None);

        backend.set("a/b/c", Value::Null).unwrap();
        assert_eq!(backend.get("a/b/c").unwrap(), None);
        assert!(matches!(backend.set("//", json!(1)), Err(StoreError::InvalidPath(_))));
    }

    #[test]
    fn one_remote_failure_is_retried() {
        let remote = Flaky {
            inner: MemoryBackend::new(),
            failures: 1,
        };
        let mut persistence = Persistence::new(session(), remote, MemoryBackend::new());

        assert_eq!(persistence.save(Key::DateRange, &json!({"start": 0})), SaveOutcome::Remote);
        assert_eq!(
            persistence.remote().inner.get("sessions/abc123xyz/dateRange").unwrap(),
            Some(json!({"start": 0}))
        );
    }

    #[test]
    fn falls_back_to_local_storage() {
        let mut remote = MemoryBackend::new();
        remote.set_online(false);
        let mut persistence = Persistence::new(session(), remote, MemoryBackend::new());

        assert_eq!(persistence.save(Key::Schedule("ana"), &json!({})), SaveOutcome::Local);
        assert_eq!(
            persistence.local().get("calendar_share_abc123xyz/timeSlots/ana").unwrap(),
            Some(json!({}))
        );

        // Reads fall back as well
        let loaded: Option<Value> = persistence.load(Key::Schedule("ana")).unwrap();
        assert_eq!(loaded, Some(json!({})));
    }

    #[test]
    fn lost_when_nothing_accepts_the_write() {
        let mut remote = MemoryBackend::new();
        remote.set_online(false);
        let mut local = MemoryBackend::new();
        local.set_online(false);
        let mut persistence = Persistence::new(session(), remote, local);

        assert_eq!(persistence.save(Key::Aggregated, &json!({})), SaveOutcome::Lost);
        assert!(persistence.load::<Value>(Key::Aggregated).is_err());
    }

    #[test]
    fn missing_documents_load_as_none() {
        let persistence = Persistence::new(session(), MemoryBackend::new(), MemoryBackend::new());
        assert_eq!(persistence.load::<Value>(Key::Participants).unwrap(), None);
    }

    #[test]
    fn draft_saves_through_the_grid_sink() {
        let mut persistence = Persistence::new(session(), MemoryBackend::new(), MemoryBackend::new());
        let outcome = GridSink::save(&mut persistence, &Schedule::new());

        assert_eq!(outcome, SaveOutcome::Remote);
        assert_eq!(
            persistence.load::<Schedule>(Key::Draft).unwrap(),
            Some(Schedule::new())
        );
    }
}
