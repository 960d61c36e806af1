use chrono::{DateTime, Local, NaiveDate, Utc};
use std::cell::Cell;
use std::time::{Duration, Instant};

/// Time source shared by the periodic components.
pub trait Clock {
    /// Monotonic time since the clock was created. Drives the interval timers.
    fn elapsed(&self) -> Duration;
    /// Wall-clock timestamp for persisted records.
    fn now(&self) -> DateTime<Utc>;
    /// Local calendar date, used for the daily reading-time reset.
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { started: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    elapsed: Cell<Duration>,
    now: Cell<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            elapsed: Cell::new(Duration::ZERO),
            now: Cell::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed.set(self.elapsed.get() + by);
        if let Ok(delta) = chrono::Duration::from_std(by) {
            self.now.set(self.now.get() + delta);
        }
    }

    /// Jump the wall clock without moving monotonic time.
    pub fn set_now(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }

    fn today(&self) -> NaiveDate {
        self.now.get().date_naive()
    }
}

/// If a timer falls further behind than this many periods, the process was
/// suspended and the missed periods are dropped instead of replayed.
pub const MAX_CATCH_UP_PERIODS: u32 = 5;

/// A periodic timer advanced by the host loop.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    period: Duration,
    next_due: Option<Duration>,
}

impl IntervalTimer {
    pub fn new(period: Duration) -> Self {
        Self { period, next_due: None }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// Arm the timer. The first tick is one period after `now`.
    pub fn start(&mut self, now: Duration) {
        self.next_due = Some(now + self.period);
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    /// Number of ticks that became due up to `now`, consuming them.
    pub fn due_ticks(&mut self, now: Duration) -> u32 {
        let Some(mut due) = self.next_due else {
            return 0;
        };
        if self.period.is_zero() {
            return 0;
        }

        let mut ticks = 0u32;
        while due <= now {
            ticks += 1;
            due += self.period;
            if ticks > MAX_CATCH_UP_PERIODS {
                log::debug!(
                    "interval timer fell {:?} behind, dropping missed periods",
                    now.saturating_sub(due)
                );
                self.next_due = Some(now + self.period);
                return 1;
            }
        }
        self.next_due = Some(due);
        ticks
    }

    /// Time left until the next tick, if armed.
    pub fn time_until_due(&self, now: Duration) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_sub(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timer_not_running_until_started() {
        let mut timer = IntervalTimer::new(Duration::from_secs(1));
        assert!(!timer.is_running());
        assert_eq!(timer.due_ticks(Duration::from_secs(10)), 0);
    }

    #[test]
    fn test_timer_counts_each_period() {
        let mut timer = IntervalTimer::new(Duration::from_secs(1));
        timer.start(Duration::ZERO);
        assert_eq!(timer.due_ticks(Duration::from_millis(999)), 0);
        assert_eq!(timer.due_ticks(Duration::from_secs(1)), 1);
        assert_eq!(timer.due_ticks(Duration::from_millis(3500)), 2);
        assert_eq!(timer.time_until_due(Duration::from_millis(3500)), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_timer_cancel_stops_ticks() {
        let mut timer = IntervalTimer::new(Duration::from_secs(1));
        timer.start(Duration::ZERO);
        timer.cancel();
        assert!(!timer.is_running());
        assert_eq!(timer.due_ticks(Duration::from_secs(5)), 0);
        assert_eq!(timer.time_until_due(Duration::from_secs(5)), None);
    }

    #[test]
    fn test_timer_drops_periods_after_suspend() {
        let mut timer = IntervalTimer::new(Duration::from_secs(1));
        timer.start(Duration::ZERO);
        assert_eq!(timer.due_ticks(Duration::from_secs(3600)), 1);
        assert_eq!(timer.due_ticks(Duration::from_secs(3601)), 1);
    }

    #[test]
    fn test_timer_catch_up_within_limit() {
        let mut timer = IntervalTimer::new(Duration::from_secs(1));
        timer.start(Duration::ZERO);
        assert_eq!(timer.due_ticks(Duration::from_secs(MAX_CATCH_UP_PERIODS as u64)), MAX_CATCH_UP_PERIODS);
    }

    #[test]
    fn test_manual_clock_moves_both_times() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 23, 59, 30).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::from_secs(60));
        assert_eq!(clock.elapsed(), Duration::from_secs(60));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }
}
