use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Handle to a spawned timer task. Dropping the handle aborts the task, so
/// replacing an entry in a registry cancels the timer it held.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Fires `event` immediately and then every `period` until cancelled.
    pub fn interval<T>(tx: &UnboundedSender<T>, period: Duration, event: T) -> Self
    where
        T: Clone + Send + 'static,
    {
        let tx = tx.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if tx.send(event.clone()).is_err() {
                    break;
                }
            }
        });
        Self { task }
    }

    /// Fires `event` once after `delay` unless cancelled first.
    pub fn timeout<T>(tx: &UnboundedSender<T>, delay: Duration, event: T) -> Self
    where
        T: Send + 'static,
    {
        let tx = tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event);
        });
        Self { task }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Keyed-by-address timer registry. One logical transaction per peer.
#[derive(Debug, Default)]
pub struct KeyedTimers {
    timers: HashMap<Ipv4Addr, TimerHandle>,
}

impl KeyedTimers {
    /// Arms a timer for `address`, cancelling any prior timer on that key.
    pub fn arm(&mut self, address: Ipv4Addr, handle: TimerHandle) {
        self.timers.insert(address, handle);
    }

    /// Cancels the timer for `address` if one is armed.
    pub fn cancel(&mut self, address: Ipv4Addr) -> bool {
        self.timers.remove(&address).is_some()
    }

    pub fn cancel_all(&mut self) {
        self.timers.clear();
    }

    pub fn contains(&self, address: Ipv4Addr) -> bool {
        self.timers.contains_key(&address)
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }
}

/// Single-slot timer for the singleton transactions: the JOIN broadcast
/// loop, the pre-election debounce, and the coordinator wait.
#[derive(Debug, Default)]
pub struct TimerSlot {
    handle: Option<TimerHandle>,
}

impl TimerSlot {
    /// Arms the slot, cancelling whatever it held.
    pub fn arm(&mut self, handle: TimerHandle) {
        self.handle = Some(handle);
    }

    pub fn cancel(&mut self) -> bool {
        self.handle.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }
}

/// The full set of timer registries the cluster service owns.
#[derive(Debug, Default)]
pub struct Timers {
    pub hello_interval: KeyedTimers,
    pub hello_timeout: KeyedTimers,
    pub election_interval: KeyedTimers,
    pub election_timeout: KeyedTimers,
    pub coordinator_interval: KeyedTimers,
    pub coordinator_timeout: KeyedTimers,
    pub join_interval: TimerSlot,
    pub pre_election: TimerSlot,
    pub coordinator_wait: TimerSlot,
}

impl Timers {
    /// Tears down the whole election round: every per-peer retransmit
    /// interval and its deadline.
    pub fn cancel_election(&mut self) {
        self.election_interval.cancel_all();
        self.election_timeout.cancel_all();
    }

    pub fn cancel_all(&mut self) {
        self.hello_interval.cancel_all();
        self.hello_timeout.cancel_all();
        self.election_interval.cancel_all();
        self.election_timeout.cancel_all();
        self.coordinator_interval.cancel_all();
        self.coordinator_timeout.cancel_all();
        self.join_interval.cancel();
        self.pre_election.cancel();
        self.coordinator_wait.cancel();
    }
}
