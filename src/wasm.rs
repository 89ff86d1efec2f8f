//! Browser entry points. Values cross the boundary in their persisted JSON
//! shape.

use crate::aggregate::{heatmap, merge_submissions, rank_candidates};
use crate::calendar::{apply_events, CalendarEvent};
use crate::data::{DateRange, Schedule};
use crate::participant::ParticipantSubmission;
use crate::session::SessionId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(JsValue::from)
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = mergeSubmissions)]
pub fn merge_submissions_js(submissions: JsValue) -> Result<JsValue, JsValue> {
    let submissions: Vec<ParticipantSubmission> = from_js(submissions)?;
    to_js(&merge_submissions(&submissions))
}

/// Ranked candidates, cut to `top_k` when given
#[wasm_bindgen(js_name = rankCandidates)]
pub fn rank_candidates_js(
    grid: JsValue,
    participants: JsValue,
    top_k: Option<usize>,
) -> Result<JsValue, JsValue> {
    let grid: Schedule = from_js(grid)?;
    let participants: Vec<ParticipantSubmission> = from_js(participants)?;

    let mut ranked = rank_candidates(&grid, &participants);
    if let Some(k) = top_k {
        ranked.truncate(k);
    }
    to_js(&ranked)
}

#[wasm_bindgen(js_name = availabilityHeatmap)]
pub fn heatmap_js(range: JsValue, participants: JsValue) -> Result<JsValue, JsValue> {
    let range: Option<DateRange> = from_js(range)?;
    let participants: Vec<ParticipantSubmission> = from_js(participants)?;
    to_js(&heatmap(range.as_ref(), &participants))
}

/// The draft grid after importing `events`
#[wasm_bindgen(js_name = importCalendarEvents)]
pub fn import_events_js(draft: JsValue, events: JsValue, range: JsValue) -> Result<JsValue, JsValue> {
    let mut draft: Schedule = from_js(draft)?;
    let events: Vec<CalendarEvent> = from_js(events)?;
    let range: DateRange = from_js(range)?;

    apply_events(&mut draft, &events, &range);
    to_js(&draft)
}

/// Session id from the page URL, or a new one
#[wasm_bindgen(js_name = resolveSessionId)]
pub fn resolve_session_id(url: &str) -> String {
    SessionId::resolve(url).as_str().to_string()
}
