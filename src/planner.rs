use chrono::Duration;

use crate::error::RetrievalError;
use crate::models::{FollowerWindow, Mode};
use crate::week::{WeekId, WeekRange};

/// Weeks of feature history loaded before the requested start.
pub const LOOK_BACK_WEEKS: i64 = 6;
/// Weeks of label horizon loaded after the requested end when training.
pub const LOOK_FUTURE_WEEKS: i64 = 8;

pub fn plan_follower_window(
    start_week: WeekId,
    end_week: WeekId,
    mode: Mode,
) -> Result<FollowerWindow, RetrievalError> {
    let range = WeekRange::new(start_week, end_week)?;
    Ok(plan_range(range, mode))
}

fn plan_range(range: WeekRange, mode: Mode) -> FollowerWindow {
    let start_date = range.start().monday();
    let end_date = range.end().monday();
    tracing::debug!(%start_date, %end_date, ?mode, "planning follower window");

    let data_start_date = start_date - Duration::weeks(LOOK_BACK_WEEKS);
    let data_end_date = match mode {
        Mode::Inference => end_date,
        Mode::Historical => end_date + Duration::weeks(LOOK_FUTURE_WEEKS),
    };
    tracing::debug!(%data_start_date, %data_end_date, "follower data bounds");

    FollowerWindow {
        data_start_week: WeekId::from_date(data_start_date),
        data_end_week: WeekId::from_date(data_end_date),
        request_start_week: range.start(),
        request_end_week: range.end(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week(raw: i64) -> WeekId {
        WeekId::from_raw(raw).expect("valid week")
    }

    #[test]
    fn historical_window_adds_lookback_and_horizon() {
        let window =
            plan_follower_window(week(202228), week(202230), Mode::Historical).expect("window");
        assert_eq!(window.data_start_week.raw(), 202222);
        assert_eq!(window.data_end_week.raw(), 202238);
        assert_eq!(window.request_start_week.raw(), 202228);
        assert_eq!(window.request_end_week.raw(), 202230);
    }

    #[test]
    fn inference_window_stops_at_requested_end() {
        let window =
            plan_follower_window(week(202228), week(202230), Mode::Inference).expect("window");
        assert_eq!(window.data_start_week.raw(), 202222);
        assert_eq!(window.data_end_week, week(202230));
    }

    #[test]
    fn lookback_crosses_into_previous_year() {
        let window =
            plan_follower_window(week(202302), week(202305), Mode::Historical).expect("window");
        assert_eq!(window.data_start_week.raw(), 202248);
    }

    #[test]
    fn window_offsets_are_exact_day_counts() {
        let pairs = [(202201, 202210), (202245, 202303), (202300, 202301), (202140, 202152)];
        for (start, end) in pairs {
            let (start, end) = (week(start), week(end));
            let historical = plan_follower_window(start, end, Mode::Historical).expect("window");
            let inference = plan_follower_window(start, end, Mode::Inference).expect("window");

            assert_eq!(
                historical.data_start_week,
                WeekId::from_date(start.monday() - Duration::days(42))
            );
            assert_eq!(
                historical.data_end_week,
                WeekId::from_date(end.monday() + Duration::days(56))
            );
            assert_eq!(inference.data_end_week, WeekId::from_date(end.monday()));
        }
    }

    #[test]
    fn rejects_non_increasing_range() {
        let err = plan_follower_window(week(202230), week(202228), Mode::Historical)
            .expect_err("reversed range");
        assert!(matches!(err, RetrievalError::InvalidRange { .. }));
    }
}
