//! Pointer-driven rectangular selection over the availability grid.
//!
//! The controller owns the participant's draft `Schedule`. Presentation code
//! feeds it pointer and touch events in grid-relative coordinates and renders
//! from `selection_rect`, `highlighted` and `schedule`; it never has to ask
//! the rendered page which cells are marked.

use crate::config::Settings;
use crate::data::{Schedule, Status, TimeCell};
use crate::geometry::{GridGeometry, Point, Rect};
use crate::store::SaveOutcome;
use log::{debug, trace};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PointerSource {
    Mouse,
    Touch,
}

/// Receives the draft schedule after every committed change
pub trait GridSink {
    fn save(&mut self, schedule: &Schedule) -> SaveOutcome;
}

impl<F> GridSink for F
where
    F: FnMut(&Schedule) -> SaveOutcome,
{
    fn save(&mut self, schedule: &Schedule) -> SaveOutcome {
        self(schedule)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum State {
    Idle,
    Selecting,
}

/// A drag in progress, from press to release
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSession {
    pub source: PointerSource,
    pub anchor: Point,
    pub current: Point,
    /// Cell under the press
    pub origin: TimeCell,
    /// Cells under the selection rectangle in presentation order
    pub affected: Vec<TimeCell>,
    pub started_at_ms: u64,
    pub moved: bool,
}

impl SelectionSession {
    pub fn rect(&self) -> Rect {
        Rect::from_corners(self.anchor, self.current)
    }
}

/// What a release did to the grid
#[derive(Debug, Clone, PartialEq)]
pub enum Release {
    /// Nothing was being selected
    Ignored,
    /// A short touch toggled the pressed cell
    Tap {
        cell: TimeCell,
        status: Status,
        saved: SaveOutcome,
    },
    /// Every swept cell was set to `status`. Nothing is written or saved when
    /// no cell was swept.
    Batch {
        cells: Vec<TimeCell>,
        status: Option<Status>,
        saved: Option<SaveOutcome>,
    },
}

pub struct GridSelectionController<G, S> {
    geometry: G,
    sink: S,
    schedule: Schedule,
    tap_threshold_ms: u64,
    session: Option<SelectionSession>,
}

impl<G, S> GridSelectionController<G, S>
where
    G: GridGeometry,
    S: GridSink,
{
    pub fn new(geometry: G, sink: S, schedule: Schedule, settings: &Settings) -> Self {
        GridSelectionController {
            geometry,
            sink,
            schedule,
            tap_threshold_ms: settings.tap_threshold_ms,
            session: None,
        }
    }

    pub fn state(&self) -> State {
        match self.session {
            Some(_) => State::Selecting,
            None => State::Idle,
        }
    }

    pub fn is_selecting(&self) -> bool {
        self.session.is_some()
    }

    /// Page text selection stays suppressed while a drag is in progress
    pub fn suppresses_text_selection(&self) -> bool {
        self.is_selecting()
    }

    pub fn session(&self) -> Option<&SelectionSession> {
        self.session.as_ref()
    }

    /// The rectangle to draw, once the pointer has moved
    pub fn selection_rect(&self) -> Option<Rect> {
        self.session
            .as_ref()
            .filter(|session| session.moved)
            .map(SelectionSession::rect)
    }

    /// Cells currently swept by the selection rectangle
    pub fn highlighted(&self) -> &[TimeCell] {
        self.session
            .as_ref()
            .map(|session| session.affected.as_slice())
            .unwrap_or(&[])
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Swaps the draft, e.g. after a calendar import or a remote reload
    pub fn replace_schedule(&mut self, schedule: Schedule) {
        self.schedule = schedule;
    }

    /// Swaps the geometry after the grid is laid out again
    pub fn replace_geometry(&mut self, geometry: G) {
        self.geometry = geometry;
    }

    pub fn into_schedule(self) -> Schedule {
        self.schedule
    }

    /// Starts a selection on `target`. A press while a selection is already
    /// active, or a press outside of any cell, is ignored.
    pub fn pointer_down(
        &mut self,
        source: PointerSource,
        point: Point,
        target: Option<TimeCell>,
        at_ms: u64,
    ) -> bool {
        if self.session.is_some() {
            debug!("Ignoring {:?} press during an active selection", source);
            return false;
        }

        let origin = match target {
            Some(cell) => cell,
            None => return false,
        };

        trace!("Selection started at {:?} on {:?}", point, origin);

        self.session = Some(SelectionSession {
            source,
            anchor: point,
            current: point,
            origin,
            affected: Vec::new(),
            started_at_ms: at_ms,
            moved: false,
        });

        true
    }

    /// Recomputes the swept cells for every move from the current rectangle
    /// alone, so the path the pointer took does not matter.
    pub fn pointer_move(&mut self, point: Point) {
        let session = match self.session.as_mut() {
            Some(session) => session,
            None => return,
        };

        session.current = point;
        session.moved = true;

        let rect = session.rect();
        session.affected = self
            .geometry
            .cells()
            .into_iter()
            .filter(|(_, bounds)| rect.intersects(bounds))
            .map(|(cell, _)| cell)
            .collect();

        trace!("Selection covers {} cells", session.affected.len());
    }

    /// Mouse release
    pub fn pointer_up(&mut self) -> Release {
        self.commit()
    }

    /// Pointer left the window. Applies the selection like a release.
    pub fn pointer_leave(&mut self) -> Release {
        self.commit()
    }

    /// Touch release. A touch shorter than the tap threshold that never moved
    /// and ends on the cell it started on toggles that one cell.
    pub fn touch_end(&mut self, target: Option<TimeCell>, at_ms: u64) -> Release {
        let tap = match &self.session {
            Some(session) => {
                session.source == PointerSource::Touch
                    && !session.moved
                    && at_ms.saturating_sub(session.started_at_ms) < self.tap_threshold_ms
                    && target == Some(session.origin)
            }
            None => return Release::Ignored,
        };

        if tap {
            if let Some(session) = self.session.take() {
                let status = self.schedule.toggle(session.origin);
                debug!("Tap set {:?} to {:?}", session.origin, status);
                let saved = self.sink.save(&self.schedule);
                return Release::Tap {
                    cell: session.origin,
                    status,
                    saved,
                };
            }
        }

        self.commit()
    }

    /// Touch interrupted by the system. Applies the selection like a release.
    pub fn touch_cancel(&mut self) -> Release {
        self.commit()
    }

    /// Plain click on a cell. Toggles it alone unless a selection is active.
    pub fn click(&mut self, target: TimeCell) -> Option<Status> {
        if self.session.is_some() {
            return None;
        }

        let status = self.schedule.toggle(target);
        self.sink.save(&self.schedule);
        Some(status)
    }

    /// Flips every swept cell in one direction, decided by the first cell of
    /// the rectangle in presentation order: anything but `Unavailable` makes
    /// the whole batch unavailable, otherwise the whole batch becomes
    /// available.
    fn commit(&mut self) -> Release {
        // Taken first, so the controller is idle again whatever happens below
        let session = match self.session.take() {
            Some(session) => session,
            None => return Release::Ignored,
        };

        let first = match session.affected.first() {
            Some(&first) => first,
            None => {
                trace!("Empty selection released");
                return Release::Batch {
                    cells: Vec::new(),
                    status: None,
                    saved: None,
                };
            }
        };

        let status = if self.schedule.is_unavailable(first) {
            Status::Available
        } else {
            Status::Unavailable
        };

        let writes: Vec<(TimeCell, Status)> = session
            .affected
            .iter()
            .map(|&cell| (cell, status))
            .collect();
        for &(cell, status) in &writes {
            self.schedule.set(cell, status);
        }

        debug!("Selection set {} cells to {:?}", writes.len(), status);

        let saved = self.sink.save(&self.schedule);

        Release::Batch {
            cells: session.affected,
            status: Some(status),
            saved: Some(saved),
        }
    }
}
