//! Single-resource leveling.
//!
//! CPM answers "how early could everything run"; the leveler answers
//! "what will one person's week actually look like". Attended work is
//! serialized lowest-slack-first behind one cursor; background work runs
//! behind its own cursor in parallel and may overlap attended blocks.
//! Flexible tasks are never placed; they belong to the selector.

use crate::calendar::{WorkCalendar, EPS};
use crate::cpm::CpmSchedule;
use crate::dag::DepGraph;
use chrono::{NaiveDate, NaiveDateTime};
use dagr_core::{Error, Project, Result, TaskId, TaskStatus, HORIZON_BOUND_DAYS};
use tracing::debug;

/// Which of the two resource streams a block belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stream {
    Attended,
    Background,
}

/// One contiguous span of work on a single calendar day (except for
/// historical blocks of done tasks, which keep their full actual span).
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub task: TaskId,
    pub stream: Stream,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub hours: f64,
}

/// Per-day rollup of the block list.
#[derive(Clone, Debug, PartialEq)]
pub struct DayPlan {
    pub date: NaiveDate,
    /// Indices into [`LeveledSchedule::blocks`], chronological.
    pub blocks: Vec<usize>,
    pub attended_hours: f64,
    pub background_hours: f64,
}

/// The resource-leveled schedule.
#[derive(Debug)]
pub struct LeveledSchedule {
    /// All blocks, chronologically ordered.
    pub blocks: Vec<Block>,
    /// Arena-indexed projected finish; `None` for flexible tasks.
    pub finish_at: Vec<Option<NaiveDateTime>>,
    /// Latest end instant across both streams.
    pub projected_completion: Option<NaiveDateTime>,
    pub days: Vec<DayPlan>,
}

impl LeveledSchedule {
    pub fn finish_of(&self, project: &Project, id: TaskId) -> Option<NaiveDateTime> {
        project.index_of(id).and_then(|i| self.finish_at[i])
    }
}

/// Level a project onto the attended/background streams.
///
/// `now` is only consulted when some task is in progress: re-planning
/// mid-project starts the cursors at the present instead of the anchor.
pub fn level(
    project: &Project,
    calendar: &WorkCalendar,
    graph: &DepGraph,
    cpm: &CpmSchedule,
    now: NaiveDateTime,
) -> Result<LeveledSchedule> {
    let tasks = project.tasks();
    let n = tasks.len();

    let start = calendar.project_start_instant()?;
    let mut cursors = Cursors {
        attended: start,
        background: start,
    };
    if tasks.iter().any(|t| !t.flexible && t.status.is_in_progress()) {
        cursors.attended = cursors.attended.max(now);
        cursors.background = cursors.background.max(now);
    }

    let mut placed = vec![false; n];
    let mut finish_at: Vec<Option<NaiveDateTime>> = vec![None; n];
    let mut blocks: Vec<Block> = Vec::new();

    for (idx, task) in tasks.iter().enumerate() {
        if task.flexible {
            placed[idx] = true;
        }
    }

    // Done work is history: one block at its actual span.
    for (idx, task) in tasks.iter().enumerate() {
        if task.flexible {
            continue;
        }
        if let TaskStatus::Done { started_at, finished_at } = task.status {
            blocks.push(Block {
                task: task.id,
                stream: stream_of(task),
                start: started_at.unwrap_or(finished_at),
                end: finished_at,
                hours: task.duration_hours,
            });
            finish_at[idx] = Some(finished_at);
            placed[idx] = true;
        }
    }

    // In-progress work claims the head of its stream at its actual start.
    let mut in_progress: Vec<usize> = (0..n)
        .filter(|&i| !placed[i] && tasks[i].status.is_in_progress())
        .collect();
    sort_by_priority(&mut in_progress, cpm, tasks);
    for idx in in_progress {
        let started = tasks[idx]
            .actual_start()
            .expect("in-progress task carries a start");
        let stream = stream_of(&tasks[idx]);
        let end = emit_blocks(
            calendar,
            &mut blocks,
            tasks[idx].id,
            stream,
            started,
            tasks[idx].duration_hours,
        )?;
        finish_at[idx] = Some(end);
        placed[idx] = true;
        let cursor = cursors.get_mut(stream);
        *cursor = (*cursor).max(end);
    }

    // Dispatch the rest, one placement at a time; of the two streams'
    // best candidates, the one that can start earlier goes next (ties go
    // to the attended stream).
    while placed.iter().any(|&p| !p) {
        let attended = next_candidate(
            project, calendar, graph, cpm, &placed, &finish_at, cursors.attended, Stream::Attended,
        )?;
        let background = next_candidate(
            project, calendar, graph, cpm, &placed, &finish_at, cursors.background, Stream::Background,
        )?;

        let (idx, stream, start_at) = match (attended, background) {
            (Some((ai, at)), Some((bi, bt))) => {
                if bt < at {
                    (bi, Stream::Background, bt)
                } else {
                    (ai, Stream::Attended, at)
                }
            }
            (Some((ai, at)), None) => (ai, Stream::Attended, at),
            (None, Some((bi, bt))) => (bi, Stream::Background, bt),
            (None, None) => break,
        };

        let end = emit_blocks(
            calendar,
            &mut blocks,
            tasks[idx].id,
            stream,
            start_at,
            tasks[idx].duration_hours,
        )?;
        finish_at[idx] = Some(end);
        placed[idx] = true;
        *cursors.get_mut(stream) = end;
    }

    blocks.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| stream_rank(a.stream).cmp(&stream_rank(b.stream)))
            .then_with(|| a.task.suffix().cmp(&b.task.suffix()))
    });

    let projected_completion = blocks.iter().map(|b| b.end).max();
    let days = roll_up_days(&blocks);

    debug!(
        blocks = blocks.len(),
        completion = ?projected_completion,
        "leveled schedule built"
    );

    Ok(LeveledSchedule {
        blocks,
        finish_at,
        projected_completion,
        days,
    })
}

struct Cursors {
    attended: NaiveDateTime,
    background: NaiveDateTime,
}

impl Cursors {
    fn get_mut(&mut self, stream: Stream) -> &mut NaiveDateTime {
        match stream {
            Stream::Attended => &mut self.attended,
            Stream::Background => &mut self.background,
        }
    }
}

fn stream_of(task: &dagr_core::Task) -> Stream {
    if task.background {
        Stream::Background
    } else {
        Stream::Attended
    }
}

fn stream_rank(stream: Stream) -> u8 {
    match stream {
        Stream::Attended => 0,
        Stream::Background => 1,
    }
}

/// Lowest slack first, then earliest ES, then lowest id suffix.
fn sort_by_priority(indices: &mut [usize], cpm: &CpmSchedule, tasks: &[dagr_core::Task]) {
    indices.sort_by(|&a, &b| {
        cpm.tasks[a]
            .slack
            .total_cmp(&cpm.tasks[b].slack)
            .then(cpm.tasks[a].es.total_cmp(&cpm.tasks[b].es))
            .then(tasks[a].id.suffix().cmp(&tasks[b].id.suffix()))
    });
}

/// Pick the next task for one stream: among unplaced tasks whose
/// dependencies are all placed, prefer those ready at the cursor; if none
/// is, let the cursor jump to the earliest availability. Returns the
/// chosen arena index and its (capacity-aligned) start instant.
fn next_candidate(
    project: &Project,
    calendar: &WorkCalendar,
    graph: &DepGraph,
    cpm: &CpmSchedule,
    placed: &[bool],
    finish_at: &[Option<NaiveDateTime>],
    cursor: NaiveDateTime,
    stream: Stream,
) -> Result<Option<(usize, NaiveDateTime)>> {
    let tasks = project.tasks();
    let mut available: Vec<(usize, NaiveDateTime)> = Vec::new();

    'tasks: for (idx, task) in tasks.iter().enumerate() {
        if placed[idx] || stream_of(task) != stream {
            continue;
        }
        let mut avail = match task.proposed_start {
            Some(date) => calendar.floor_instant(date)?,
            None => calendar.project_start_instant()?,
        };
        for &pred in graph.predecessors(idx) {
            if tasks[pred].flexible {
                continue;
            }
            match finish_at[pred] {
                Some(done) => avail = avail.max(done),
                None => continue 'tasks,
            }
        }
        available.push((idx, avail));
    }

    if available.is_empty() {
        return Ok(None);
    }

    let horizon = if available.iter().any(|&(_, at)| at <= cursor) {
        cursor
    } else {
        available.iter().map(|&(_, at)| at).min().unwrap()
    };

    let mut eligible: Vec<usize> = available
        .iter()
        .filter(|&&(_, at)| at <= horizon)
        .map(|&(idx, _)| idx)
        .collect();
    sort_by_priority(&mut eligible, cpm, tasks);
    let chosen = eligible[0];
    let avail = available
        .iter()
        .find(|&&(idx, _)| idx == chosen)
        .map(|&(_, at)| at)
        .unwrap();

    let start_at = calendar.add_working_hours(cursor.max(avail), 0.0)?;
    Ok(Some((chosen, start_at)))
}

/// Emit one block per calendar-day segment for `hours` of work starting
/// at `start`; returns the finish instant. Zero-duration work becomes a
/// single instantaneous block.
fn emit_blocks(
    calendar: &WorkCalendar,
    blocks: &mut Vec<Block>,
    task: TaskId,
    stream: Stream,
    start: NaiveDateTime,
    hours: f64,
) -> Result<NaiveDateTime> {
    let start = calendar.add_working_hours(start, 0.0)?;
    if hours <= EPS {
        blocks.push(Block {
            task,
            stream,
            start,
            end: start,
            hours: 0.0,
        });
        return Ok(start);
    }

    let mut date = start.date();
    let mut pos = calendar.position_in_day(start);
    let mut remaining = hours;
    for _ in 0..HORIZON_BOUND_DAYS {
        let available = (calendar.capacity(date) - pos).max(0.0);
        if available > EPS {
            let step = remaining.min(available);
            blocks.push(Block {
                task,
                stream,
                start: calendar.instant_at(date, pos),
                end: calendar.instant_at(date, pos + step),
                hours: step,
            });
            pos += step;
            remaining -= step;
            if remaining <= EPS {
                return Ok(calendar.instant_at(date, pos));
            }
        }
        date = date.succ_opt().ok_or(Error::UnschedulableHorizon)?;
        pos = 0.0;
    }
    Err(Error::UnschedulableHorizon)
}

fn roll_up_days(blocks: &[Block]) -> Vec<DayPlan> {
    let mut days: Vec<DayPlan> = Vec::new();
    for (i, block) in blocks.iter().enumerate() {
        let date = block.start.date();
        let pos = match days.iter().position(|d| d.date == date) {
            Some(pos) => pos,
            None => {
                days.push(DayPlan {
                    date,
                    blocks: Vec::new(),
                    attended_hours: 0.0,
                    background_hours: 0.0,
                });
                days.len() - 1
            }
        };
        let day = &mut days[pos];
        day.blocks.push(i);
        match block.stream {
            Stream::Attended => day.attended_hours += block.hours,
            Stream::Background => day.background_hours += block.hours,
        }
    }
    days.sort_by_key(|d| d.date);
    days
}
