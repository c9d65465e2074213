//! Resource-leveling scenarios over the full pipeline: the one-person
//! serialization, the parallel background stream, and determinism of the
//! resulting block lists.

use chrono::{NaiveDate, NaiveDateTime};
use dagr_core::{Project, ProjectConfig, TaskDraft, TaskId};
use dagr_solver::{Analysis, Stream};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(h, min, 0).unwrap()
}

fn thesis_project() -> Project {
    let mut project = Project::new(ProjectConfig::new(date(2026, 2, 23)));
    let (t1, _) = project
        .add_task(TaskDraft::new("Run simulations", 10.0).background())
        .unwrap();
    let (t2, _) = project
        .add_task(TaskDraft::new("Analyze results", 10.0).depends_on(t1))
        .unwrap();
    let (t3, _) = project
        .add_task(TaskDraft::new("Draft results chapter", 3.0).depends_on(t2))
        .unwrap();
    project
        .add_task(TaskDraft::new("Format bibliography", 1.5))
        .unwrap();
    let (t5, _) = project
        .add_task(TaskDraft::new("Revise introduction", 8.0))
        .unwrap();
    project
        .add_task(
            TaskDraft::new("Assemble final draft", 6.0)
                .depends_on(t3)
                .depends_on(TaskId::new(4))
                .depends_on(t5)
                .deadline(date(2026, 3, 2)),
        )
        .unwrap();
    project
}

fn analyze(project: &Project) -> Analysis {
    Analysis::run(project, project.config.start).unwrap()
}

#[test]
fn one_person_schedule_serializes_attended_work() {
    let project = thesis_project();
    let analysis = analyze(&project);
    let leveled = &analysis.leveled;

    // Attended stream never overlaps itself.
    let attended: Vec<_> = leveled
        .blocks
        .iter()
        .filter(|b| b.stream == Stream::Attended)
        .collect();
    for pair in attended.windows(2) {
        assert!(pair[0].end <= pair[1].start);
    }

    // Every scheduled task receives exactly its estimated hours.
    for task in project.tasks().iter().filter(|t| !t.flexible) {
        let total: f64 = leveled
            .blocks
            .iter()
            .filter(|b| b.task == task.id)
            .map(|b| b.hours)
            .sum();
        assert!(
            (total - task.duration_hours).abs() < 1e-9,
            "{} got {total}h, wanted {}h",
            task.id,
            task.duration_hours
        );
    }

    // Dependency finishes precede dependent starts, across streams.
    for task in project.tasks() {
        let Some(start) = leveled
            .blocks
            .iter()
            .find(|b| b.task == task.id)
            .map(|b| b.start)
        else {
            continue;
        };
        for dep in &task.depends_on {
            let finished = leveled.finish_of(&project, *dep).unwrap();
            assert!(finished <= start, "{} starts before {} finishes", task.id, dep);
        }
    }
}

#[test]
fn thesis_completion_matches_the_critical_path() {
    let project = thesis_project();
    let analysis = analyze(&project);

    // The attended stream fills the same 29 working hours the CPM
    // horizon spans, so leveling does not push the finish out.
    assert_eq!(
        analysis.leveled.projected_completion,
        Some(dt(2026, 2, 26, 14, 0))
    );
    assert_eq!(analysis.cpm.horizon_at, dt(2026, 2, 26, 14, 0));
}

#[test]
fn background_runs_under_attended_work() {
    // Scenario: T-1 10h background, T-2 8h attended, no dependencies.
    let mut project = Project::new(ProjectConfig::new(date(2026, 2, 23)));
    let (bg, _) = project
        .add_task(TaskDraft::new("Long render", 10.0).background())
        .unwrap();
    let (fg, _) = project.add_task(TaskDraft::new("Edit chapter", 8.0)).unwrap();

    let analysis = analyze(&project);
    let leveled = &analysis.leveled;

    let monday = &leveled.days[0];
    assert_eq!(monday.date, date(2026, 2, 23));
    assert_eq!(monday.attended_hours, 8.0);
    assert_eq!(monday.background_hours, 8.0);

    let tuesday = &leveled.days[1];
    assert_eq!(tuesday.attended_hours, 0.0);
    assert_eq!(tuesday.background_hours, 2.0);

    // The background task is critical (10h chain vs 8h): CRIT BG day.
    assert!(analysis.cpm.get(&project, bg).unwrap().critical);
    assert!(!analysis.cpm.get(&project, fg).unwrap().critical);
}

#[test]
fn weekend_override_shapes_the_blocks() {
    // Friday start with a 4h Saturday override: work flows through the
    // override instead of waiting for Monday.
    let mut config = ProjectConfig::new(date(2026, 2, 27));
    config.capacity_overrides.insert(date(2026, 2, 28), 4.0);
    let mut project = Project::new(config);
    let (a, _) = project.add_task(TaskDraft::new("Push through", 12.0)).unwrap();

    let analysis = analyze(&project);
    let blocks: Vec<_> = analysis
        .leveled
        .blocks
        .iter()
        .filter(|b| b.task == a)
        .collect();

    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].start, dt(2026, 2, 27, 9, 0));
    assert_eq!(blocks[0].hours, 8.0);
    assert_eq!(blocks[1].start, dt(2026, 2, 28, 9, 0));
    assert_eq!(blocks[1].hours, 4.0);
    assert_eq!(
        analysis.leveled.projected_completion,
        Some(dt(2026, 2, 28, 13, 0))
    );
}

#[test]
fn identical_states_level_identically() {
    let a = analyze(&thesis_project());
    let b = analyze(&thesis_project());
    assert_eq!(a.leveled.blocks, b.leveled.blocks);
    assert_eq!(a.leveled.days, b.leveled.days);
    assert_eq!(a.leveled.projected_completion, b.leveled.projected_completion);
}

#[test]
fn at_risk_reflects_the_leveled_plan() {
    // A deadline the CPM alone would meet, but the one-person schedule
    // cannot: two 8h tasks, the second due end of day one.
    let mut project = Project::new(ProjectConfig::new(date(2026, 2, 23)));
    let (_first, _) = project
        .add_task(TaskDraft::new("First", 8.0).deadline(date(2026, 2, 23)))
        .unwrap();
    let (second, _) = project
        .add_task(TaskDraft::new("Second", 8.0).deadline(date(2026, 2, 23)))
        .unwrap();

    let analysis = analyze(&project);
    let risks = analysis.at_risk(&project).unwrap();

    // Both fit day one under CPM's infinite-resource view; leveling
    // pushes the higher-numbered one across the deadline boundary.
    assert_eq!(risks.len(), 1);
    assert_eq!(risks[0].id, second);
    assert_eq!(risks[0].projected, dt(2026, 2, 24, 17, 0));
}
