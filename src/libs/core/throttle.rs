use std::time::{Duration, Instant};

/// Coalesces bursts of listener snapshots into delayed renders.
///
/// The first snapshot schedules a render `delay` later. Snapshots arriving
/// while that render is scheduled are dropped and only leave a pending mark;
/// the flush then asks the caller to read the list once more so nothing that
/// arrived in between is lost.
#[derive(Debug)]
pub struct RenderThrottle<T> {
    delay: Duration,
    scheduled: Option<Scheduled<T>>,
    pending: bool,
}

#[derive(Debug)]
struct Scheduled<T> {
    due: Instant,
    snapshot: T,
}

#[derive(Debug, PartialEq)]
pub struct Flush<T> {
    pub snapshot: T,
    /// Updates were coalesced; render a fresh one-shot read after this one.
    pub refetch: bool,
}

impl<T> RenderThrottle<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            scheduled: None,
            pending: false,
        }
    }

    /// Returns `false` when the snapshot was coalesced into the pending mark.
    pub fn offer(&mut self, snapshot: T, now: Instant) -> bool {
        if self.scheduled.is_some() {
            self.pending = true;
            return false;
        }
        self.scheduled = Some(Scheduled {
            due: now + self.delay,
            snapshot,
        });
        true
    }

    pub fn poll(&mut self, now: Instant) -> Option<Flush<T>> {
        match &self.scheduled {
            Some(scheduled) if scheduled.due <= now => {}
            _ => return None,
        }
        let scheduled = self.scheduled.take()?;
        let refetch = std::mem::take(&mut self.pending);
        Some(Flush {
            snapshot: scheduled.snapshot,
            refetch,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.scheduled.is_some()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.scheduled.as_ref().map(|scheduled| scheduled.due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(100);

    #[test]
    fn single_snapshot_renders_after_delay() {
        let start = Instant::now();
        let mut throttle = RenderThrottle::new(DELAY);

        assert!(throttle.offer(1, start));
        assert_eq!(throttle.poll(start + Duration::from_millis(99)), None);
        assert_eq!(
            throttle.poll(start + DELAY),
            Some(Flush {
                snapshot: 1,
                refetch: false
            })
        );
        assert!(!throttle.is_busy());
    }

    #[test]
    fn burst_is_coalesced_into_one_refetch() {
        let start = Instant::now();
        let mut throttle = RenderThrottle::new(DELAY);

        assert!(throttle.offer(1, start));
        assert!(!throttle.offer(2, start + Duration::from_millis(10)));
        assert!(!throttle.offer(3, start + Duration::from_millis(20)));

        let flush = throttle.poll(start + DELAY).unwrap();
        assert_eq!(flush.snapshot, 1);
        assert!(flush.refetch);

        // pending mark is consumed by the flush
        assert!(throttle.offer(4, start + DELAY));
        let flush = throttle.poll(start + DELAY * 2).unwrap();
        assert_eq!(flush.snapshot, 4);
        assert!(!flush.refetch);
    }

    #[test]
    fn idle_throttle_yields_nothing() {
        let mut throttle: RenderThrottle<u8> = RenderThrottle::new(DELAY);
        assert_eq!(throttle.poll(Instant::now()), None);
        assert_eq!(throttle.next_due(), None);
    }
}
