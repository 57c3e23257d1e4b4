use thiserror::Error;
use uom::si::{f64::Time, time::day};

/// A uniformly spaced set of output times.
///
/// The integrator reports exactly one state per grid point. The first point is
/// exactly `start` and the last exactly `end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeGrid {
    start: Time,
    end: Time,
    points: usize,
}

/// Errors returned when constructing a [`TimeGrid`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TimeGridError {
    #[error("time grid needs at least 2 points, got {points}")]
    TooFewPoints { points: usize },

    #[error("time grid bounds must be finite")]
    NonFinite,

    #[error("time grid end ({end} d) must be after start ({start} d)")]
    NotIncreasing { start: f64, end: f64 },
}

impl TimeGrid {
    /// Creates a grid of `points` times from `start` to `end`, inclusive.
    ///
    /// # Errors
    ///
    /// Returns an error if there are fewer than two points, if a bound is not
    /// finite, or if `end` is not after `start`.
    pub fn new(start: Time, end: Time, points: usize) -> Result<Self, TimeGridError> {
        if points < 2 {
            return Err(TimeGridError::TooFewPoints { points });
        }

        let (start_days, end_days) = (start.get::<day>(), end.get::<day>());
        if !start_days.is_finite() || !end_days.is_finite() {
            return Err(TimeGridError::NonFinite);
        }
        if end_days <= start_days {
            return Err(TimeGridError::NotIncreasing {
                start: start_days,
                end: end_days,
            });
        }

        Ok(Self { start, end, points })
    }

    /// Creates a grid from bounds given in days.
    ///
    /// # Errors
    ///
    /// See [`TimeGrid::new`].
    pub fn in_days(start: f64, end: f64, points: usize) -> Result<Self, TimeGridError> {
        Self::new(Time::new::<day>(start), Time::new::<day>(end), points)
    }

    #[must_use]
    pub fn start(&self) -> Time {
        self.start
    }

    #[must_use]
    pub fn points(&self) -> usize {
        self.points
    }

    /// Returns the grid times in days.
    #[must_use]
    pub fn days(&self) -> Vec<f64> {
        let start = self.start.get::<day>();
        let end = self.end.get::<day>();
        let last = self.points - 1;
        #[allow(clippy::cast_precision_loss)]
        let step = (end - start) / last as f64;

        (0..self.points)
            .map(|i| {
                if i == last {
                    end
                } else {
                    #[allow(clippy::cast_precision_loss)]
                    let offset = i as f64 * step;
                    start + offset
                }
            })
            .collect()
    }
}

impl Default for TimeGrid {
    /// Ten days sampled at 1000 points.
    fn default() -> Self {
        Self {
            start: Time::new::<day>(0.0),
            end: Time::new::<day>(10.0),
            points: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use uom::si::time::hour;

    use super::*;

    #[test]
    fn default_grid_spans_ten_days() {
        let days = TimeGrid::default().days();
        assert_eq!(days.len(), 1000);
        assert_eq!(days[0], 0.0);
        assert_relative_eq!(days[999], 10.0);
        assert_relative_eq!(days[1], 10.0 / 999.0);
    }

    #[test]
    fn grid_is_strictly_increasing() {
        let days = TimeGrid::in_days(0.5, 3.0, 17).unwrap().days();
        assert!(days.windows(2).all(|pair| pair[1] > pair[0]));
        assert_relative_eq!(days[0], 0.5);
        assert_relative_eq!(days[16], 3.0);
    }

    #[test]
    fn bounds_accept_any_time_unit() {
        let grid = TimeGrid::new(Time::new::<hour>(0.0), Time::new::<hour>(48.0), 3).unwrap();
        let days = grid.days();
        assert_relative_eq!(days[1], 1.0);
        assert_relative_eq!(days[2], 2.0);
    }

    #[test]
    fn rejects_degenerate_grids() {
        assert_eq!(
            TimeGrid::in_days(0.0, 10.0, 1),
            Err(TimeGridError::TooFewPoints { points: 1 })
        );
        assert!(matches!(
            TimeGrid::in_days(5.0, 5.0, 10),
            Err(TimeGridError::NotIncreasing { .. })
        ));
        assert!(matches!(
            TimeGrid::in_days(6.0, 5.0, 10),
            Err(TimeGridError::NotIncreasing { .. })
        ));
        assert_eq!(
            TimeGrid::in_days(0.0, f64::INFINITY, 10),
            Err(TimeGridError::NonFinite)
        );
    }
}
