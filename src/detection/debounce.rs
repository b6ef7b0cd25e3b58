/// Confirmation counter paired with the logical debounce timer.
///
/// The timer itself carries no payload: the runtime owns the real interval and posts
/// ticks into the detector queue. `generation` changes whenever the timer is (re)started,
/// which tells the runtime to restart its interval.
#[derive(Debug, Clone)]
pub struct ConfirmationDebounce {
    required: u32,
    count: u32,
    armed: bool,
    ticks: u32,
    generation: u64,
}

impl ConfirmationDebounce {
    pub fn new(required: u32) -> Self {
        Self {
            required: required.max(1),
            count: 0,
            armed: false,
            ticks: 0,
            generation: 0,
        }
    }

    /// First qualifying sample: counter to 1, timer (re)started.
    pub fn begin(&mut self) {
        self.count = 1;
        self.ticks = 0;
        self.armed = true;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Another qualifying sample. Saturates at the required count.
    pub fn confirm(&mut self) -> bool {
        if self.count < self.required {
            self.count += 1;
        }
        self.is_confirmed()
    }

    pub fn is_confirmed(&self) -> bool {
        self.count >= self.required
    }

    /// Returns false for ticks that arrive after the timer was stopped.
    pub fn tick(&mut self) -> bool {
        if !self.armed {
            return false;
        }
        self.ticks = self.ticks.saturating_add(1);
        true
    }

    pub fn stop_timer(&mut self) {
        self.armed = false;
        self.ticks = 0;
    }

    pub fn clear(&mut self) {
        self.count = 0;
        self.stop_timer();
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn required(&self) -> u32 {
        self.required
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_starts_counting_at_one() {
        let mut debounce = ConfirmationDebounce::new(3);
        debounce.begin();
        assert_eq!(debounce.count(), 1);
        assert!(debounce.is_armed());
        assert!(!debounce.is_confirmed());
    }

    #[test]
    fn confirms_after_required_samples() {
        let mut debounce = ConfirmationDebounce::new(3);
        debounce.begin();
        assert!(!debounce.confirm());
        assert!(debounce.confirm());
        assert_eq!(debounce.count(), 3);
    }

    #[test]
    fn counter_saturates() {
        let mut debounce = ConfirmationDebounce::new(2);
        debounce.begin();
        for _ in 0..10 {
            debounce.confirm();
        }
        assert_eq!(debounce.count(), 2);
    }

    #[test]
    fn stale_ticks_are_ignored() {
        let mut debounce = ConfirmationDebounce::new(3);
        assert!(!debounce.tick());

        debounce.begin();
        assert!(debounce.tick());
        assert!(debounce.tick());
        assert_eq!(debounce.ticks(), 2);

        debounce.clear();
        assert!(!debounce.tick());
        assert_eq!(debounce.count(), 0);
    }

    #[test]
    fn restart_bumps_generation() {
        let mut debounce = ConfirmationDebounce::new(3);
        debounce.begin();
        let first = debounce.generation();
        debounce.clear();
        debounce.begin();
        assert_ne!(first, debounce.generation());
    }

    #[test]
    fn zero_required_is_treated_as_one() {
        let mut debounce = ConfirmationDebounce::new(0);
        debounce.begin();
        assert!(debounce.is_confirmed());
    }
}
