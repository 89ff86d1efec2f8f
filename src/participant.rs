use crate::data::Schedule;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// One participant's marked hours. `name` is the participant's key within a
/// session; resubmitting under the same name replaces the earlier submission.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSubmission {
    pub name: String,
    #[serde(default)]
    pub schedule: Schedule,
    #[serde(default)]
    pub show_details: bool,
    #[serde(rename = "timestamp")]
    pub submitted_at: DateTime<Utc>,
}

impl ParticipantSubmission {
    pub fn new(name: &str, schedule: Schedule, submitted_at: DateTime<Utc>) -> ParticipantSubmission {
        ParticipantSubmission {
            name: name.to_string(),
            schedule,
            show_details: false,
            submitted_at,
        }
    }

    /// The record listed under `participants/{name}`
    pub fn record(&self) -> ParticipantRecord {
        ParticipantRecord {
            id: self.name.clone(),
            name: self.name.clone(),
            joined_at: self.submitted_at,
        }
    }
}

#[cfg(feature = "arbitrary")]
impl<'a> arbitrary::Arbitrary<'a> for ParticipantSubmission {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let name = format!("participant-{}", u.int_in_range(0..=15_u8)?);
        let submitted_at = DateTime::<Utc>::from_timestamp(u.int_in_range(0..=2_000_000_000_i64)?, 0)
            .ok_or(arbitrary::Error::IncorrectFormat)?;
        Ok(ParticipantSubmission {
            name,
            schedule: u.arbitrary()?,
            show_details: u.arbitrary()?,
            submitted_at,
        })
    }
}

/// Participant listing entry, kept separately from the schedules
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRecord {
    pub id: String,
    pub name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub joined_at: DateTime<Utc>,
}

/// Participants of a session in the order they first joined.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct Roster(Vec<ParticipantSubmission>);

impl Roster {
    pub fn new() -> Roster {
        Roster(Vec::new())
    }

    /// Last write wins: a submission under a known name replaces the earlier
    /// one in place, keeping its position.
    pub fn upsert(&mut self, submission: ParticipantSubmission) {
        match self.0.iter_mut().find(|p| p.name == submission.name) {
            Some(existing) => {
                debug!("Replacing submission of {}", submission.name);
                *existing = submission;
            }
            None => {
                info!("Adding participant {}", submission.name);
                self.0.push(submission);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParticipantSubmission> {
        self.0.iter().find(|p| p.name == name)
    }

    /// Keeps only participants for which `keep` holds
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&ParticipantSubmission) -> bool,
    {
        self.0.retain(keep);
    }

    pub fn as_slice(&self) -> &[ParticipantSubmission] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParticipantSubmission> {
        self.0.iter()
    }
}

impl std::iter::FromIterator<ParticipantSubmission> for Roster {
    fn from_iter<T: IntoIterator<Item = ParticipantSubmission>>(iter: T) -> Self {
        let mut roster = Roster::new();
        for submission in iter {
            roster.upsert(submission);
        }
        roster
    }
}
