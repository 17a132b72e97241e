/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! End-to-end generation scenarios through [`TimetableService`].

use std::collections::BTreeMap;
use std::sync::Arc;

use timetabler::config::GroupConfig;
use timetabler::course::{CourseRequirement, Session, SessionType};
use timetabler::draft::{DraftKey, InMemoryStore, TimetableStatus, TimetableStore};
use timetabler::grid::day_index;
use timetabler::scheduler::PlannerOptions;
use timetabler::service::{GenerateRequest, GenerateResponse, TimetableService};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn service() -> TimetableService<InMemoryStore> {
    TimetableService::new(Arc::new(InMemoryStore::new()))
}

fn theory(course: &str, periods: i32) -> CourseRequirement {
    CourseRequirement {
        course_id: course.into(),
        teacher_id: format!("t-{}", course),
        weekly_theory_periods: periods,
        ..Default::default()
    }
}

fn lab(course: &str, periods: i32, block: i32) -> CourseRequirement {
    CourseRequirement {
        course_id: course.into(),
        teacher_id: format!("t-{}", course),
        weekly_lab_periods: periods,
        lab_block_size: block,
        ..Default::default()
    }
}

fn starts(sessions: &[Session]) -> Vec<(usize, usize, usize)> {
    sessions
        .iter()
        .map(|s| (s.day_of_week, s.period_start_index, s.duration_periods))
        .collect()
}

fn forced(group: &str, term: &str) -> GenerateRequest {
    GenerateRequest {
        force_regenerate: true,
        ..GenerateRequest::new(group, term)
    }
}

/// A crowded week: restricted Wednesday and Friday, more demand than room.
fn crowded_group() -> GroupConfig {
    let mut hours = BTreeMap::new();
    hours.insert("wednesday".to_string(), vec![0, 1, 2, 4, 5]);
    hours.insert("friday".to_string(), vec![0, 1, 2, 3]);
    GroupConfig {
        group_id: "cs-1a".into(),
        days_per_week: 5,
        periods_per_day: 6,
        business_hours: hours,
    }
}

fn crowded_requirements() -> Vec<CourseRequirement> {
    vec![
        CourseRequirement {
            weekly_theory_periods: 3,
            priority: 10,
            ..lab("cs101", 4, 2)
        },
        CourseRequirement {
            priority: 5,
            ..theory("math", 5)
        },
        CourseRequirement {
            priority: 8,
            ..lab("phys", 3, 3)
        },
        CourseRequirement {
            priority: 1,
            ..lab("chem", 5, 2)
        },
        theory("art", 20),
    ]
}

// ── Concrete scenarios ────────────────────────────────────────────────────────

#[test]
fn theory_fills_earliest_cells() {
    let out = service()
        .generate(
            &GenerateRequest::new("g", "t"),
            &GroupConfig::open("g", 5, 6),
            &[theory("math", 3)],
            &PlannerOptions::default(),
        )
        .unwrap();

    assert_eq!(
        starts(&out.timetable.sessions),
        vec![(0, 0, 1), (0, 1, 1), (0, 2, 1)]
    );
    assert!(out.diagnostics.conflicts.is_empty());
}

#[test]
fn labs_fill_contiguous_blocks() {
    let out = service()
        .generate(
            &GenerateRequest::new("g", "t"),
            &GroupConfig::open("g", 5, 6),
            &[lab("phys", 4, 2)],
            &PlannerOptions::default(),
        )
        .unwrap();

    assert_eq!(starts(&out.timetable.sessions), vec![(0, 0, 2), (0, 2, 2)]);
    assert!(out
        .timetable
        .sessions
        .iter()
        .all(|s| s.session_type == SessionType::Lab));
}

#[test]
fn oversize_lab_becomes_conflict() {
    let resp = service().respond(
        &GenerateRequest::new("g", "t"),
        &GroupConfig::open("g", 5, 1),
        &[lab("phys", 2, 2)],
        &PlannerOptions::default(),
    );
    let ok = match resp {
        GenerateResponse::Success(ok) => ok,
        other => panic!("expected success, got {:?}", other),
    };
    assert_eq!(ok.sessions_created, 0);
    assert_eq!(ok.conflicts.len(), 1);
    assert_eq!(ok.conflicts[0].course_id, "phys");
    assert_eq!(ok.conflicts[0].requirement_kind, SessionType::Lab);
    assert_eq!(ok.conflicts[0].reason, "no contiguous block of size 2 available");
}

#[test]
fn existing_draft_is_left_untouched() {
    let store = Arc::new(InMemoryStore::new());
    let svc = TimetableService::new(Arc::clone(&store));
    let group = GroupConfig::open("g", 5, 6);
    let opts = PlannerOptions::default();

    svc.generate(&forced("g", "t"), &group, &[theory("math", 1)], &opts)
        .unwrap();
    let v2 = svc
        .generate(&forced("g", "t"), &group, &[theory("math", 2)], &opts)
        .unwrap();
    assert_eq!(v2.timetable.version, 2);

    let resp = svc.respond(
        &GenerateRequest::new("g", "t"),
        &group,
        &[theory("math", 4)],
        &opts,
    );
    let refusal = match resp {
        GenerateResponse::Refused(refusal) => refusal,
        other => panic!("expected refusal, got {:?}", other),
    };
    assert!(!refusal.success);

    let key = DraftKey::new("g", "t");
    assert_eq!(store.versions(&key).len(), 2);
    let latest = store.latest(&key).unwrap();
    assert_eq!(latest.version, 2);
    assert_eq!(latest.status, TimetableStatus::Draft);
    assert_eq!(latest.sessions, v2.timetable.sessions);
}

#[test]
fn forced_regeneration_creates_next_version() {
    let store = Arc::new(InMemoryStore::new());
    let svc = TimetableService::new(Arc::clone(&store));
    let group = GroupConfig::open("g", 5, 6);
    let opts = PlannerOptions::default();

    for _ in 0..2 {
        svc.generate(&forced("g", "t"), &group, &[theory("math", 5)], &opts)
            .unwrap();
    }

    let v3 = svc
        .generate(&forced("g", "t"), &group, &[lab("phys", 2, 2)], &opts)
        .unwrap();
    assert_eq!(v3.timetable.version, 3);
    assert_eq!(v3.timetable.id, "g/t/v3");
    // Built from its own requirements only
    assert_eq!(starts(&v3.timetable.sessions), vec![(0, 0, 2)]);

    let versions = store.versions(&DraftKey::new("g", "t"));
    assert_eq!(versions[1].status, TimetableStatus::Archived);
    assert_eq!(versions[1].sessions.len(), 5);
}

// ── Properties ────────────────────────────────────────────────────────────────

#[test]
fn sessions_never_overlap() {
    let out = service()
        .generate(
            &GenerateRequest::new("cs-1a", "t"),
            &crowded_group(),
            &crowded_requirements(),
            &PlannerOptions::default(),
        )
        .unwrap();

    let sessions = &out.timetable.sessions;
    for (i, a) in sessions.iter().enumerate() {
        for b in &sessions[i + 1..] {
            assert!(!a.overlaps(b), "{:?} overlaps {:?}", a, b);
        }
    }
}

#[test]
fn sessions_respect_business_hours() {
    let group = crowded_group();
    let out = service()
        .generate(
            &GenerateRequest::new("cs-1a", "t"),
            &group,
            &crowded_requirements(),
            &PlannerOptions::default(),
        )
        .unwrap();

    for (day_name, allowed) in &group.business_hours {
        let day = day_index(day_name).unwrap();
        for s in out.timetable.sessions.iter().filter(|s| s.day_of_week == day) {
            for (_, period) in s.cells() {
                assert!(
                    allowed.contains(&period),
                    "{:?} uses blocked period {} on {}",
                    s,
                    period,
                    day_name
                );
            }
        }
    }
}

#[test]
fn labs_have_exact_block_size() {
    let reqs = crowded_requirements();
    let out = service()
        .generate(
            &GenerateRequest::new("cs-1a", "t"),
            &crowded_group(),
            &reqs,
            &PlannerOptions::default(),
        )
        .unwrap();

    for s in out
        .timetable
        .sessions
        .iter()
        .filter(|s| s.session_type == SessionType::Lab)
    {
        let req = reqs.iter().find(|r| r.matches(s)).unwrap();
        assert_eq!(s.duration_periods, req.block_size());
    }
}

#[test]
fn identical_inputs_give_identical_output() {
    let run = || {
        service().respond(
            &GenerateRequest::new("cs-1a", "t"),
            &crowded_group(),
            &crowded_requirements(),
            &PlannerOptions::default(),
        )
    };
    let a = serde_json::to_string(&run()).unwrap();
    let b = serde_json::to_string(&run()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn every_requested_unit_is_accounted_for() {
    let reqs = crowded_requirements();
    let resp = service().respond(
        &GenerateRequest::new("cs-1a", "t"),
        &crowded_group(),
        &reqs,
        &PlannerOptions::default(),
    );
    let ok = match resp {
        GenerateResponse::Success(ok) => ok,
        other => panic!("expected success, got {:?}", other),
    };

    let requested: usize = reqs.iter().map(|r| r.requested_units()).sum();
    assert!(!ok.conflicts.is_empty(), "workload is meant to overflow");
    assert_eq!(ok.sessions_created + ok.conflicts.len(), requested);
    assert_eq!(ok.stats.requested_units, requested);
}

#[test]
fn forced_versions_increase_by_one() {
    let svc = service();
    let group = GroupConfig::open("g", 5, 6);
    let opts = PlannerOptions::default();

    let versions: Vec<u32> = (0..5)
        .map(|_| {
            svc.generate(&forced("g", "t"), &group, &[theory("math", 2)], &opts)
                .unwrap()
                .timetable
                .version
        })
        .collect();
    assert_eq!(versions, vec![1, 2, 3, 4, 5]);
}

#[test]
fn groups_generate_concurrently_without_interference() {
    let svc = Arc::new(service());
    let handles: Vec<_> = ["g1", "g2", "g3", "g4"]
        .into_iter()
        .map(|g| {
            let svc = Arc::clone(&svc);
            std::thread::spawn(move || {
                svc.generate(
                    &GenerateRequest::new(g, "t"),
                    &GroupConfig::open(g, 5, 6),
                    &[theory("math", 3), lab("phys", 4, 2)],
                    &PlannerOptions::default(),
                )
            })
        })
        .collect();

    let layouts: Vec<_> = handles
        .into_iter()
        .map(|h| starts(&h.join().unwrap().unwrap().timetable.sessions))
        .collect();
    assert!(layouts.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(svc.drafts().store().len(), 4);
}

#[test]
fn locked_session_survives_forced_regeneration() {
    let svc = service();
    let group = GroupConfig::open("g", 5, 6);
    let opts = PlannerOptions::default();

    let v1 = svc
        .generate(&GenerateRequest::new("g", "t"), &group, &[theory("math", 3)], &opts)
        .unwrap();
    assert_eq!(starts(&v1.timetable.sessions)[2], (0, 2, 1));

    let pinned = svc.drafts().set_locked(&v1.timetable.id, 2, true).unwrap();
    assert!(pinned.locked);

    let v2 = svc
        .generate(&forced("g", "t"), &group, &[theory("math", 3)], &opts)
        .unwrap();
    assert_eq!(v2.timetable.sessions[0], pinned);
    assert_eq!(
        starts(&v2.timetable.sessions),
        vec![(0, 2, 1), (0, 0, 1), (0, 1, 1)]
    );
    assert!(v2.diagnostics.conflicts.is_empty());

    // The archived v1 can no longer be edited
    assert!(svc.drafts().set_locked(&v1.timetable.id, 0, true).is_err());
}
