//! Timer Registry Tests
//!
//! Runs on a paused tokio clock so expirations are deterministic. The core
//! guarantees pinned here: re-arming a key cancels the prior timer, and a
//! cancelled timer never fires again.

#[cfg(test)]
mod tests {
    use crate::timers::registry::{KeyedTimers, TimerHandle, TimerSlot, Timers};
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const PEER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);
    const OTHER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 3);

    async fn drain(rx: &mut mpsc::UnboundedReceiver<&'static str>) -> Vec<&'static str> {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
        let mut fired = Vec::new();
        while let Ok(event) = rx.try_recv() {
            fired.push(event);
        }
        fired
    }

    // ============================================================
    // TIMER HANDLE TESTS
    // ============================================================

    #[tokio::test(start_paused = true)]
    async fn test_interval_fires_immediately_and_periodically() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = TimerHandle::interval(&tx, Duration::from_millis(100), "tick");

        tokio::task::yield_now().await;
        assert_eq!(drain(&mut rx).await, vec!["tick"]);

        tokio::time::advance(Duration::from_millis(100)).await;
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(drain(&mut rx).await, vec!["tick", "tick"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = TimerHandle::timeout(&tx, Duration::from_millis(550), "deadline");

        tokio::time::advance(Duration::from_millis(549)).await;
        assert!(drain(&mut rx).await.is_empty());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(drain(&mut rx).await, vec!["deadline"]);

        tokio::time::advance(Duration::from_millis(2000)).await;
        assert!(drain(&mut rx).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_cancels_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = TimerHandle::timeout(&tx, Duration::from_millis(100), "deadline");
        drop(handle);

        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(drain(&mut rx).await.is_empty());
    }

    // ============================================================
    // KEYED REGISTRY TESTS
    // ============================================================

    #[tokio::test(start_paused = true)]
    async fn test_rearming_a_key_cancels_the_prior_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = KeyedTimers::default();

        timers.arm(PEER, TimerHandle::timeout(&tx, Duration::from_millis(100), "old"));
        timers.arm(PEER, TimerHandle::timeout(&tx, Duration::from_millis(300), "new"));

        tokio::time::advance(Duration::from_millis(400)).await;
        // Only the replacement fires; the old timer was aborted on rekey.
        assert_eq!(drain(&mut rx).await, vec!["new"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent_and_key_scoped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = KeyedTimers::default();

        timers.arm(PEER, TimerHandle::timeout(&tx, Duration::from_millis(100), "peer"));
        timers.arm(OTHER, TimerHandle::timeout(&tx, Duration::from_millis(100), "other"));

        assert!(timers.cancel(PEER));
        assert!(!timers.cancel(PEER));
        assert!(timers.contains(OTHER));
        assert!(!timers.contains(PEER));

        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(drain(&mut rx).await, vec!["other"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_clears_the_registry() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = KeyedTimers::default();
        timers.arm(PEER, TimerHandle::timeout(&tx, Duration::from_millis(100), "peer"));
        timers.arm(OTHER, TimerHandle::timeout(&tx, Duration::from_millis(100), "other"));
        assert_eq!(timers.len(), 2);

        timers.cancel_all();
        assert!(timers.is_empty());

        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(drain(&mut rx).await.is_empty());
    }

    // ============================================================
    // SLOT AND FAMILY TESTS
    // ============================================================

    #[tokio::test(start_paused = true)]
    async fn test_slot_rearm_replaces() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut slot = TimerSlot::default();

        slot.arm(TimerHandle::timeout(&tx, Duration::from_millis(100), "old"));
        slot.arm(TimerHandle::timeout(&tx, Duration::from_millis(300), "new"));
        assert!(slot.is_armed());

        tokio::time::advance(Duration::from_millis(400)).await;
        assert_eq!(drain(&mut rx).await, vec!["new"]);

        assert!(slot.cancel());
        assert!(!slot.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_election_tears_down_both_registries() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = Timers::default();
        timers
            .election_interval
            .arm(PEER, TimerHandle::interval(&tx, Duration::from_millis(100), "tick"));
        timers
            .election_timeout
            .arm(PEER, TimerHandle::timeout(&tx, Duration::from_millis(550), "deadline"));

        // Swallow the immediate interval tick.
        drain(&mut rx).await;
        timers.cancel_election();
        assert!(timers.election_interval.is_empty());
        assert!(timers.election_timeout.is_empty());

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert!(drain(&mut rx).await.is_empty());
    }
}
