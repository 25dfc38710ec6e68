/// Tick-scoped task queue owned by the tick driver.
///
/// End-of-tick tasks are deduplicated: queueing an equal task twice in the
/// same tick is a no-op, and a drain consumes each task exactly once.
#[derive(Clone, Debug)]
pub struct TickQueue<T> {
    end_of_tick: Vec<T>,
    delayed: Vec<(u64, T)>,
}

impl<T> Default for TickQueue<T> {
    fn default() -> Self {
        Self {
            end_of_tick: Vec::new(),
            delayed: Vec::new(),
        }
    }
}

impl<T: PartialEq> TickQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defer_to_end_of_tick(&mut self, task: T) -> bool {
        if self.end_of_tick.contains(&task) {
            return false;
        }
        self.end_of_tick.push(task);
        true
    }

    pub fn schedule_after(&mut self, now_tick: u64, delay_ticks: u64, task: T) {
        self.delayed
            .push((now_tick.saturating_add(delay_ticks), task));
    }

    pub fn take_end_of_tick(&mut self) -> Vec<T> {
        std::mem::take(&mut self.end_of_tick)
    }

    pub fn take_due(&mut self, now_tick: u64) -> Vec<T> {
        let mut due = Vec::new();
        let mut remaining = Vec::with_capacity(self.delayed.len());
        for (at, task) in self.delayed.drain(..) {
            if at <= now_tick {
                due.push(task);
            } else {
                remaining.push((at, task));
            }
        }
        self.delayed = remaining;
        due
    }

    pub fn has_end_of_tick_work(&self) -> bool {
        !self.end_of_tick.is_empty()
    }

    pub fn clear(&mut self) {
        self.end_of_tick.clear();
        self.delayed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_end_of_tick_tasks_are_queued_once() {
        let mut queue = TickQueue::new();
        assert!(queue.defer_to_end_of_tick("jumps"));
        assert!(!queue.defer_to_end_of_tick("jumps"));
        assert!(queue.defer_to_end_of_tick("splash"));
        assert_eq!(queue.take_end_of_tick(), vec!["jumps", "splash"]);
        assert!(queue.take_end_of_tick().is_empty());
        assert!(queue.defer_to_end_of_tick("jumps"));
    }

    #[test]
    fn delayed_tasks_fire_when_due() {
        let mut queue = TickQueue::new();
        queue.schedule_after(10, 5, 1);
        queue.schedule_after(10, 0, 2);
        assert_eq!(queue.take_due(10), vec![2]);
        assert!(queue.take_due(14).is_empty());
        assert_eq!(queue.take_due(15), vec![1]);
    }

    #[test]
    fn clear_drops_everything() {
        let mut queue = TickQueue::new();
        queue.defer_to_end_of_tick(1);
        queue.schedule_after(0, 3, 2);
        queue.clear();
        assert!(!queue.has_end_of_tick_work());
        assert!(queue.take_due(100).is_empty());
    }
}
