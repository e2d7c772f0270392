use std::time::Duration;

use chrono::{Local, Months, NaiveDate};
use log::debug;

use super::asset::default_record_date;

/// Tells the timeline what "today" is.
pub trait Clock {
  fn today(&self) -> NaiveDate;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn today(&self) -> NaiveDate {
    Local::now().date_naive()
  }
}

/// A clock stuck on one day.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
  fn today(&self) -> NaiveDate {
    self.0
  }
}

/// Month by month playback of the site history.
///
/// The displayed date moves one calendar month per step. Stepping past today wraps to the start
/// date, stepping back never goes before it. While playing, [`Timeline::tick`] performs one step
/// per full interval of elapsed time.
pub struct Timeline {
  start: NaiveDate,
  date: NaiveDate,
  playing: bool,
  interval: Duration,
  elapsed: Duration,
  clock: Box<dyn Clock>,
}

impl std::fmt::Debug for Timeline {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Timeline")
      .field("start", &self.start)
      .field("date", &self.date)
      .field("playing", &self.playing)
      .field("interval", &self.interval)
      .finish_non_exhaustive()
  }
}

impl Default for Timeline {
  fn default() -> Self {
    Self::new(default_record_date(), Duration::from_secs(1), Box::new(SystemClock))
  }
}

impl Timeline {
  #[must_use]
  pub fn new(start: NaiveDate, interval: Duration, clock: Box<dyn Clock>) -> Self {
    Self {
      start,
      date: start,
      playing: false,
      interval,
      elapsed: Duration::ZERO,
      clock,
    }
  }

  #[must_use]
  pub fn date(&self) -> NaiveDate {
    self.date
  }

  #[must_use]
  pub fn start(&self) -> NaiveDate {
    self.start
  }

  #[must_use]
  pub fn is_playing(&self) -> bool {
    self.playing
  }

  pub fn play_pause(&mut self) {
    self.playing = !self.playing;
    self.elapsed = Duration::ZERO;
  }

  /// Stops playback and forgets time accumulated towards the next step.
  pub fn stop(&mut self) {
    self.playing = false;
    self.elapsed = Duration::ZERO;
  }

  pub fn step_forward(&mut self) {
    let next = self.date.checked_add_months(Months::new(1));
    self.date = match next {
      Some(next) if next <= self.clock.today() => next,
      _ => {
        debug!("timeline wraps to {}", self.start);
        self.start
      }
    };
  }

  pub fn step_back(&mut self) {
    self.date = self
      .date
      .checked_sub_months(Months::new(1))
      .map_or(self.start, |prev| prev.max(self.start));
  }

  /// Advances by the steps that fit into the accumulated time. Returns whether the date changed.
  pub fn tick(&mut self, elapsed: Duration) -> bool {
    if !self.playing || self.interval.is_zero() {
      return false;
    }
    self.elapsed += elapsed;
    let before = self.date;
    while self.elapsed >= self.interval {
      self.elapsed -= self.interval;
      self.step_forward();
    }
    self.date != before
  }

  /// Whether something recorded on `date` is shown at the displayed date.
  #[must_use]
  pub fn shows(&self, date: NaiveDate) -> bool {
    date <= self.date
  }

  /// The displayed date as `Month YYYY`.
  #[must_use]
  pub fn label(&self) -> String {
    self.date.format("%B %Y").to_string()
  }
}
