/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Timetabler – weekly class timetable generator
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── config/         – YAML group configuration + planner tunables
//! ├── course          – course requirements and placed sessions
//! ├── grid/           – day × period occupancy grid and slot search
//! ├── scheduler/      – two-tier placement planner + diagnostics
//! ├── draft/          – versioned draft timetables and their store
//! └── service         – generate request/response entry point
//! ```

pub mod config;
pub mod course;
pub mod draft;
pub mod grid;
pub mod scheduler;
pub mod service;
