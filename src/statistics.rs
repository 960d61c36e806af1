use std::rc::Rc;
use std::time::Duration;

use crate::clock::{Clock, IntervalTimer};
use crate::models::Statistics;
use crate::store::{STATISTICS_KEY, SharedPersistence};

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Statistics are written whenever `today_seconds` reaches a multiple of this.
pub const FLUSH_EVERY_SECONDS: u64 = 30;

/// Counts reading seconds for the active book.
pub struct TimeAccumulator {
    stats: Statistics,
    active_book: Option<String>,
    timer: IntervalTimer,
    clock: Rc<dyn Clock>,
    persistence: SharedPersistence,
}

impl TimeAccumulator {
    pub fn new(clock: Rc<dyn Clock>, persistence: SharedPersistence) -> Self {
        Self {
            stats: Statistics::default(),
            active_book: None,
            timer: IntervalTimer::new(TICK_INTERVAL),
            clock,
            persistence,
        }
    }

    /// Read persisted statistics, zeroing today's counter if it belongs to another day.
    pub fn load(&mut self) {
        if let Some(saved) = self.persistence.borrow().load::<Statistics>(STATISTICS_KEY) {
            self.stats = saved;
        }
        self.roll_over_day();
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    pub fn active_book(&self) -> Option<&str> {
        self.active_book.as_deref()
    }

    pub fn is_ticking(&self) -> bool {
        self.timer.is_running()
    }

    pub fn start(&mut self, book_id: &str) {
        if self.active_book.is_some() || self.timer.is_running() {
            self.stop();
        }
        self.active_book = Some(book_id.to_string());
        self.timer.start(self.clock.elapsed());
        log::debug!("reading timer started for {}", book_id);
    }

    pub fn pause(&mut self) {
        self.timer.cancel();
    }

    pub fn resume(&mut self) {
        if self.active_book.is_some() && !self.timer.is_running() {
            self.timer.start(self.clock.elapsed());
        }
    }

    pub fn stop(&mut self) {
        self.timer.cancel();
        if let Some(book_id) = self.active_book.take() {
            log::debug!("reading timer stopped for {}", book_id);
        }
        self.flush();
    }

    /// Run every tick that became due since the last call.
    pub fn advance(&mut self) {
        let due = self.timer.due_ticks(self.clock.elapsed());
        for _ in 0..due {
            self.tick();
        }
    }

    /// One second of reading.
    pub fn tick(&mut self) {
        let Some(book_id) = self.active_book.clone() else {
            return;
        };
        self.roll_over_day();

        self.stats.today_seconds += 1;
        self.stats.total_seconds += 1;
        *self.stats.per_book_seconds.entry(book_id).or_insert(0) += 1;
        self.stats.last_read_date = Some(self.clock.today());

        if self.stats.today_seconds % FLUSH_EVERY_SECONDS == 0 {
            self.flush();
        }
    }

    pub fn time_until_tick(&self) -> Option<Duration> {
        self.timer.time_until_due(self.clock.elapsed())
    }

    fn roll_over_day(&mut self) {
        let today = self.clock.today();
        if self.stats.last_read_date != Some(today) {
            if self.stats.today_seconds > 0 {
                log::debug!("new reading day {}, resetting today's time", today);
            }
            self.stats.today_seconds = 0;
            self.stats.last_read_date = Some(today);
        }
    }

    fn flush(&mut self) {
        self.persistence.borrow_mut().submit(STATISTICS_KEY, &self.stats);
    }
}

/// `1h 5m`, `5m 3s`, `42s`.
pub fn format_reading_time(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::{MemoryStore, Persistence};
    use chrono::{NaiveDate, TimeZone, Utc};

    struct Fixture {
        clock: Rc<ManualClock>,
        store: MemoryStore,
        persistence: SharedPersistence,
    }

    impl Fixture {
        fn new() -> Self {
            let clock = Rc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()));
            let store = MemoryStore::new();
            let persistence = Persistence::new(Box::new(store.clone())).shared();
            Self { clock, store, persistence }
        }

        fn accumulator(&self) -> TimeAccumulator {
            TimeAccumulator::new(self.clock.clone(), self.persistence.clone())
        }

        fn flushes(&self) -> usize {
            self.persistence.borrow_mut().flush();
            self.store.write_count(STATISTICS_KEY)
        }

        fn seconds(&self, n: u64) {
            self.clock.advance(Duration::from_secs(n));
        }
    }

    #[test]
    fn test_thirty_ticks_flush_once() {
        let fx = Fixture::new();
        let mut acc = fx.accumulator();
        acc.load();
        acc.start("book");

        for _ in 0..30 {
            fx.seconds(1);
            acc.advance();
            fx.persistence.borrow_mut().flush();
        }

        assert_eq!(fx.flushes(), 1);
        assert_eq!(acc.statistics().book_seconds("book"), 30);
        assert_eq!(acc.statistics().total_seconds, 30);
        assert_eq!(acc.statistics().today_seconds, 30);
    }

    #[test]
    fn test_start_switches_books() {
        let fx = Fixture::new();
        let mut acc = fx.accumulator();
        acc.start("a");
        fx.seconds(3);
        acc.advance();
        acc.start("b");
        assert_eq!(acc.active_book(), Some("b"));
        // Switching stops "a", which forces a flush.
        assert_eq!(fx.flushes(), 1);

        fx.seconds(2);
        acc.advance();
        let stats = acc.statistics();
        assert_eq!(stats.book_seconds("a"), 3);
        assert_eq!(stats.book_seconds("b"), 2);
        assert_eq!(stats.total_seconds, 5);
    }

    #[test]
    fn test_pause_and_resume() {
        let fx = Fixture::new();
        let mut acc = fx.accumulator();
        acc.start("book");
        acc.pause();
        assert_eq!(acc.active_book(), Some("book"));
        assert!(!acc.is_ticking());

        fx.seconds(10);
        acc.advance();
        assert_eq!(acc.statistics().total_seconds, 0);

        acc.resume();
        acc.resume();
        fx.seconds(2);
        acc.advance();
        assert_eq!(acc.statistics().total_seconds, 2);
    }

    #[test]
    fn test_resume_without_book_is_noop() {
        let fx = Fixture::new();
        let mut acc = fx.accumulator();
        acc.resume();
        assert!(!acc.is_ticking());
    }

    #[test]
    fn test_stop_flushes_and_prevents_further_ticks() {
        let fx = Fixture::new();
        let mut acc = fx.accumulator();
        acc.start("book");
        fx.seconds(4);
        acc.advance();
        acc.stop();
        assert_eq!(acc.active_book(), None);
        assert_eq!(fx.flushes(), 1);

        fx.seconds(4);
        acc.advance();
        acc.tick();
        assert_eq!(acc.statistics().total_seconds, 4);

        let saved: Statistics = serde_json::from_value(fx.store.value(STATISTICS_KEY).unwrap()).unwrap();
        assert_eq!(saved.total_seconds, 4);
    }

    #[test]
    fn test_load_resets_today_on_new_day() {
        let fx = Fixture::new();
        let mut saved = Statistics {
            today_seconds: 500,
            total_seconds: 9000,
            last_read_date: NaiveDate::from_ymd_opt(2026, 5, 3),
            ..Default::default()
        };
        saved.per_book_seconds.insert("old".to_string(), 9000);
        fx.persistence.borrow_mut().submit(STATISTICS_KEY, &saved);
        fx.persistence.borrow_mut().flush();

        let mut acc = fx.accumulator();
        acc.load();
        let stats = acc.statistics();
        assert_eq!(stats.today_seconds, 0);
        assert_eq!(stats.total_seconds, 9000);
        assert_eq!(stats.book_seconds("old"), 9000);
    }

    #[test]
    fn test_load_keeps_today_on_same_day() {
        let fx = Fixture::new();
        let saved = Statistics {
            today_seconds: 45,
            total_seconds: 90,
            last_read_date: NaiveDate::from_ymd_opt(2026, 5, 4),
            ..Default::default()
        };
        fx.persistence.borrow_mut().submit(STATISTICS_KEY, &saved);

        let mut acc = fx.accumulator();
        acc.load();
        assert_eq!(acc.statistics().today_seconds, 45);
    }

    #[test]
    fn test_midnight_rollover_while_reading() {
        let fx = Fixture::new();
        fx.clock.set_now(Utc.with_ymd_and_hms(2026, 5, 4, 23, 59, 57).unwrap());
        let mut acc = fx.accumulator();
        acc.load();
        acc.start("book");
        fx.seconds(2);
        acc.advance();
        assert_eq!(acc.statistics().today_seconds, 2);

        fx.seconds(1);
        acc.advance();
        let stats = acc.statistics();
        assert_eq!(stats.today_seconds, 1);
        assert_eq!(stats.total_seconds, 3);
        assert_eq!(stats.last_read_date, NaiveDate::from_ymd_opt(2026, 5, 5));
    }

    #[test]
    fn test_flush_cadence_follows_today_counter() {
        let fx = Fixture::new();
        let saved = Statistics {
            today_seconds: 25,
            last_read_date: NaiveDate::from_ymd_opt(2026, 5, 4),
            ..Default::default()
        };
        fx.persistence.borrow_mut().submit(STATISTICS_KEY, &saved);
        fx.persistence.borrow_mut().flush();
        let baseline = fx.store.write_count(STATISTICS_KEY);

        let mut acc = fx.accumulator();
        acc.load();
        acc.start("book");
        fx.seconds(5);
        acc.advance();
        assert_eq!(fx.flushes() - baseline, 1);
    }

    #[test]
    fn test_format_reading_time() {
        assert_eq!(format_reading_time(0), "0s");
        assert_eq!(format_reading_time(42), "42s");
        assert_eq!(format_reading_time(303), "5m 3s");
        assert_eq!(format_reading_time(3900), "1h 5m");
    }
}
