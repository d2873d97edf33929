use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    window: Duration,
    limit: u32,
    max_keys: usize,
}

impl RateLimiter {
    /// A `limit` of zero disables limiting.
    pub fn new(window: Duration, limit: u32, max_keys: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            window,
            limit,
            max_keys: max_keys.max(1),
        }
    }

    pub fn check(&self, key: &str) -> Result<(), Duration> {
        if self.limit == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let queue = inner.entry(key.to_string()).or_default();
        prune_queue(queue, now, self.window);
        if queue.len() >= self.limit as usize {
            let retry_after = queue
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);
            return Err(retry_after);
        }
        queue.push_back(now);

        if inner.len() > self.max_keys {
            inner.retain(|_, events| {
                prune_queue(events, now, self.window);
                !events.is_empty()
            });
        }

        if inner.len() > self.max_keys {
            let mut by_last_seen = inner
                .iter()
                .map(|(k, events)| (events.back().copied(), k.clone()))
                .collect::<Vec<_>>();
            by_last_seen.sort();
            let overflow = inner.len() - self.max_keys;
            for (_, key) in by_last_seen.into_iter().take(overflow) {
                inner.remove(&key);
            }
        }

        Ok(())
    }
}

fn prune_queue(queue: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(front) = queue.front() {
        if now.duration_since(*front) >= window {
            queue.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn rejects_when_limit_reached_and_reports_wait() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2, 16);
        assert!(limiter.check("auth:u1").is_ok());
        assert!(limiter.check("auth:u1").is_ok());

        let wait = limiter.check("auth:u1").unwrap_err();
        assert!(wait <= Duration::from_secs(60));
        assert!(wait > Duration::from_secs(50));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1, 16);
        assert!(limiter.check("auth:u1").is_ok());
        assert!(limiter.check("auth:u2").is_ok());
        assert!(limiter.check("auth:u1").is_err());
    }

    #[test]
    fn allows_after_window_elapses() {
        let limiter = RateLimiter::new(Duration::from_millis(5), 1, 16);
        assert!(limiter.check("k").is_ok());
        assert!(limiter.check("k").is_err());
        thread::sleep(Duration::from_millis(10));
        assert!(limiter.check("k").is_ok());
    }

    #[test]
    fn zero_limit_disables() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 0, 16);
        for _ in 0..100 {
            assert!(limiter.check("k").is_ok());
        }
    }

    #[test]
    fn evicts_idle_keys_over_capacity() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1, 2);
        assert!(limiter.check("a").is_ok());
        thread::sleep(Duration::from_millis(2));
        assert!(limiter.check("b").is_ok());
        thread::sleep(Duration::from_millis(2));
        assert!(limiter.check("c").is_ok());

        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("c").is_err());
    }
}
