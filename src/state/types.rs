//! Typed game state, home-team relative.

use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Snapshot of one decision point in a game, from the home team's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// Quarter, 1-4, 5 = overtime.
    pub quarter: u8,
    /// Game clock seconds remaining.
    pub seconds_remaining: u32,
    /// Home score minus away score.
    pub score_diff_home: i32,
    /// Whether the home team is on offense.
    pub home_has_ball: bool,
    /// Distance to the opponent's goal line.
    pub yardline_100: u8,
    /// Down, 1-4.
    pub down: u8,
    /// Yards to go for a first down.
    pub ydstogo: u8,
}

impl GameState {
    /// Longest regulation game clock in seconds.
    pub const MAX_SECONDS_REMAINING: u32 = 3600;

    /// Build a state and validate every field.
    pub fn new(
        quarter: u8,
        seconds_remaining: u32,
        score_diff_home: i32,
        home_has_ball: bool,
        yardline_100: u8,
        down: u8,
        ydstogo: u8,
    ) -> Result<Self, StateError> {
        let state = Self {
            quarter,
            seconds_remaining,
            score_diff_home,
            home_has_ball,
            yardline_100,
            down,
            ydstogo,
        };
        state.validate()?;
        Ok(state)
    }

    /// Range-check every field.
    pub fn validate(&self) -> Result<(), StateError> {
        check_range("quarter", self.quarter.into(), 1, 5)?;
        check_range(
            "seconds_remaining",
            self.seconds_remaining.into(),
            0,
            Self::MAX_SECONDS_REMAINING.into(),
        )?;
        check_range("yardline_100", self.yardline_100.into(), 0, 100)?;
        check_range("down", self.down.into(), 1, 4)?;
        check_range("ydstogo", self.ydstogo.into(), 1, 100)?;
        Ok(())
    }

    /// Whether the game is in overtime.
    pub fn is_overtime(&self) -> bool {
        self.quarter == 5
    }
}

fn check_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<(), StateError> {
    if value < min || value > max {
        return Err(StateError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Context the live API does not carry. Absent values stay absent and are
/// imputed by the model pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureContext {
    /// NFL season year.
    pub season: Option<i32>,
    /// Week of the season.
    pub week: Option<u32>,
}

impl FeatureContext {
    /// Context with both fields known.
    pub fn new(season: i32, week: u32) -> Self {
        Self {
            season: Some(season),
            week: Some(week),
        }
    }
}
