use std::time::{Duration, Instant};

/// Named wall-clock laps for the load and run phases.
#[derive(Debug)]
pub struct Stopwatch {
    started: Instant,
    lap_start: Instant,
    laps: Vec<(&'static str, Duration)>,
}

impl Stopwatch {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            lap_start: now,
            laps: Vec::new(),
        }
    }

    /// Close the current lap under `name` and start the next one.
    pub fn lap(&mut self, name: &'static str) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.lap_start);
        self.lap_start = now;
        self.laps.push((name, elapsed));
        log::debug!("{} took {}ms", name, elapsed.as_millis());
        elapsed
    }

    pub fn lap_ms(&self, name: &str) -> u128 {
        self.laps
            .iter()
            .filter(|(lap, _)| *lap == name)
            .map(|(_, d)| d.as_millis())
            .sum()
    }

    pub fn total_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    pub fn laps(&self) -> &[(&'static str, Duration)] {
        &self.laps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn laps_are_recorded_in_order() {
        let mut watch = Stopwatch::start();
        watch.lap("load");
        watch.lap("run");
        let names: Vec<&str> = watch.laps().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["load", "run"]);
    }

    #[test]
    fn laps_do_not_exceed_total() {
        let mut watch = Stopwatch::start();
        sleep(Duration::from_millis(5));
        let load = watch.lap("load");
        assert!(load >= Duration::from_millis(5));
        assert!(watch.lap_ms("load") <= watch.total_ms());
    }

    #[test]
    fn unknown_lap_is_zero() {
        let watch = Stopwatch::start();
        assert_eq!(watch.lap_ms("write"), 0);
    }

    #[test]
    fn repeated_names_accumulate() {
        let mut watch = Stopwatch::start();
        sleep(Duration::from_millis(2));
        watch.lap("write");
        sleep(Duration::from_millis(2));
        watch.lap("write");
        assert!(watch.lap_ms("write") >= 4);
    }
}
