//! Read models for past workouts, and the aggregation that builds them from
//! flat joined rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workout::Workout;

// ─── Per-plan workout history ────────────────────────────────────────────────

/// A past workout with its sets grouped by exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutHistory {
  #[serde(flatten)]
  pub workout:            Workout,
  pub training_plan_name: Option<String>,
  pub exercises:          Vec<ExerciseGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseGroup {
  pub exercise_id:   Uuid,
  /// `None` when the exercise row is missing locally.
  pub exercise_name: Option<String>,
  pub sets:          Vec<LoggedSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedSet {
  pub id:         Uuid,
  pub set_number: u32,
  pub reps:       u32,
  pub weight:     f64,
}

/// One set of a workout joined with its exercise name.
#[derive(Debug, Clone)]
pub struct WorkoutSetRow {
  pub exercise_id:   Uuid,
  pub exercise_name: Option<String>,
  pub set:           LoggedSet,
}

/// Group a workout's sets by exercise, keeping the order in which each
/// exercise first appears in `rows`.
pub fn group_by_exercise(rows: Vec<WorkoutSetRow>) -> Vec<ExerciseGroup> {
  let mut groups: Vec<ExerciseGroup> = Vec::new();
  for row in rows {
    match groups.iter_mut().find(|g| g.exercise_id == row.exercise_id) {
      Some(group) => group.sets.push(row.set),
      None => groups.push(ExerciseGroup {
        exercise_id:   row.exercise_id,
        exercise_name: row.exercise_name,
        sets:          vec![row.set],
      }),
    }
  }
  groups
}

// ─── Per-exercise history ────────────────────────────────────────────────────

/// All sets of one exercise performed in workouts started at `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseHistoryDay {
  /// The workout's `startedAt`.
  pub date: DateTime<Utc>,
  /// Unweighted mean of the sets' weights, rounded to one decimal.
  pub avg:  f64,
  pub sets: Vec<HistorySet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySet {
  pub set:    u32,
  pub reps:   u32,
  pub weight: f64,
}

/// One set of an exercise joined with its workout's start time.
#[derive(Debug, Clone)]
pub struct ExerciseSetRow {
  pub date:       DateTime<Utc>,
  pub set_number: u32,
  pub reps:       u32,
  pub weight:     f64,
}

/// Group rows by date. `rows` must already be ordered by date, then by set
/// number; both orders are preserved.
pub fn group_by_date(rows: Vec<ExerciseSetRow>) -> Vec<ExerciseHistoryDay> {
  let mut days: Vec<(DateTime<Utc>, Vec<HistorySet>)> = Vec::new();
  for row in rows {
    let set = HistorySet { set: row.set_number, reps: row.reps, weight: row.weight };
    match days.last_mut() {
      Some((date, sets)) if *date == row.date => sets.push(set),
      _ => days.push((row.date, vec![set])),
    }
  }

  days
    .into_iter()
    .map(|(date, sets)| {
      let weights: Vec<f64> = sets.iter().map(|s| s.weight).collect();
      ExerciseHistoryDay { date, avg: average_weight(&weights), sets }
    })
    .collect()
}

/// Mean of `weights` rounded to one decimal place; `0.0` for no sets.
pub fn average_weight(weights: &[f64]) -> f64 {
  if weights.is_empty() {
    return 0.0;
  }
  let mean = weights.iter().sum::<f64>() / weights.len() as f64;
  (mean * 10.0).round() / 10.0
}
