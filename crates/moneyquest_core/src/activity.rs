//! crates/moneyquest_core/src/activity.rs
//!
//! The daily-activity calendar heat-map.

use crate::domain::DailyActivity;
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;

pub const DEFAULT_CALENDAR_WEEKS: u32 = 12;
pub const MAX_CALENDAR_WEEKS: u32 = 53;

/// Event counts at or above each threshold map to levels 1 to 4.
const LEVEL_THRESHOLDS: [u32; 4] = [1, 3, 6, 10];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatCell {
    pub day: NaiveDate,
    pub count: u32,
    /// 0 (no activity) to 4 (busiest).
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityCalendar {
    /// Oldest week first; each week holds seven consecutive days.
    pub weeks: Vec<Vec<HeatCell>>,
    pub total: u32,
    pub active_days: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
}

pub fn intensity(count: u32) -> u8 {
    LEVEL_THRESHOLDS.iter().filter(|&&t| count >= t).count() as u8
}

impl ActivityCalendar {
    /// The first day covered by a calendar of `weeks` weeks ending on `today`.
    pub fn start_day(today: NaiveDate, weeks: u32) -> NaiveDate {
        let weeks = weeks.clamp(1, MAX_CALENDAR_WEEKS);
        today - Duration::days(i64::from(weeks) * 7 - 1)
    }

    /// Lays `counts` out as `weeks` columns of seven days ending on `today`.
    /// Counts outside that range are ignored; repeated days are summed.
    pub fn build(counts: &[DailyActivity], today: NaiveDate, weeks: u32) -> Self {
        let start = Self::start_day(today, weeks);

        let mut by_day: HashMap<NaiveDate, u32> = HashMap::new();
        for entry in counts.iter().filter(|e| e.day >= start && e.day <= today) {
            *by_day.entry(entry.day).or_default() += entry.count;
        }

        let cells: Vec<HeatCell> = start
            .iter_days()
            .take_while(|day| *day <= today)
            .map(|day| {
                let count = by_day.get(&day).copied().unwrap_or(0);
                HeatCell { day, count, level: intensity(count) }
            })
            .collect();

        let mut longest_streak = 0;
        let mut run = 0;
        for cell in &cells {
            run = if cell.count > 0 { run + 1 } else { 0 };
            longest_streak = longest_streak.max(run);
        }
        // Today without activity yet does not break a streak that ran through yesterday.
        let current_streak = cells
            .iter()
            .rev()
            .skip_while(|c| c.day == today && c.count == 0)
            .take_while(|c| c.count > 0)
            .count() as u32;

        Self {
            total: cells.iter().map(|c| c.count).sum(),
            active_days: cells.iter().filter(|c| c.count > 0).count() as u32,
            weeks: cells.chunks(7).map(|w| w.to_vec()).collect(),
            current_streak,
            longest_streak,
        }
    }
}
