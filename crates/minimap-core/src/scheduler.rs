//! Render scheduling.
//!
//! Every trigger converges on a single render action. The scheduler itself
//! never renders: it keeps one optional timer handle per channel, talks to
//! the host through [`TimerQueue`], and turns fired timers into [`Action`]s
//! for the owner to carry out.

use crate::config::MinimapConfig;
use std::fmt::Debug;
use std::time::Duration;

/// Timer channels. Each holds at most one pending timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Repeating full refresh.
    Periodic,
    /// Debounced structural mutations.
    Structural,
    /// Debounced highlight mutations.
    Highlight,
    /// Throttled scroll updates.
    Scroll,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Periodic, Channel::Structural, Channel::Highlight, Channel::Scroll];
}

/// Why a render pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Initial,
    Periodic,
    Structural,
    Highlight,
    Resize,
    Toggle,
}

/// What the owner should do in response to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Run a full render pass.
    Render(Trigger),
    /// Only reposition the viewport indicator.
    UpdateViewport,
    Idle,
}

/// Host timer facility.
///
/// Fired timers are reported back by the host calling
/// [`RenderScheduler::fire`] with the channel.
pub trait TimerQueue {
    type Handle: Copy + Debug;

    fn schedule_once(&mut self, channel: Channel, delay: Duration) -> Self::Handle;

    fn schedule_repeating(&mut self, channel: Channel, period: Duration) -> Self::Handle;

    fn cancel(&mut self, handle: Self::Handle);
}

/// A one-shot channel with at most one pending timer.
#[derive(Debug)]
struct Deferred<H> {
    channel: Channel,
    delay: Duration,
    handle: Option<H>,
}

impl<H: Copy + Debug> Deferred<H> {
    fn new(channel: Channel, delay: Duration) -> Self {
        Self {
            channel,
            delay,
            handle: None,
        }
    }

    /// Cancel the pending timer and start a new one (debounce).
    fn restart<T: TimerQueue<Handle = H>>(&mut self, timers: &mut T) {
        if let Some(handle) = self.handle.take() {
            timers.cancel(handle);
        }
        self.handle = Some(timers.schedule_once(self.channel, self.delay));
    }

    /// Start a timer unless one is already pending (throttle).
    fn coalesce<T: TimerQueue<Handle = H>>(&mut self, timers: &mut T) {
        if self.handle.is_none() {
            self.handle = Some(timers.schedule_once(self.channel, self.delay));
        }
    }

    /// Clear the handle of a fired timer. False for a stale fire.
    fn settle(&mut self) -> bool {
        self.handle.take().is_some()
    }

    fn cancel<T: TimerQueue<Handle = H>>(&mut self, timers: &mut T) {
        if let Some(handle) = self.handle.take() {
            timers.cancel(handle);
        }
    }
}

/// Coordinates when render passes and viewport updates happen.
#[derive(Debug)]
pub struct RenderScheduler<H> {
    enabled: bool,
    stopped: bool,
    periodic_interval: Duration,
    periodic: Option<H>,
    structural: Deferred<H>,
    highlight: Deferred<H>,
    scroll: Deferred<H>,
}

impl<H: Copy + Debug> RenderScheduler<H> {
    pub fn new(config: &MinimapConfig) -> Self {
        Self {
            enabled: true,
            stopped: false,
            periodic_interval: config.periodic_interval(),
            periodic: None,
            structural: Deferred::new(Channel::Structural, config.structural_debounce()),
            highlight: Deferred::new(Channel::Highlight, config.highlight_debounce()),
            scroll: Deferred::new(Channel::Scroll, config.scroll_throttle()),
        }
    }

    /// Start the periodic refresh.
    pub fn start<T: TimerQueue<Handle = H>>(&mut self, timers: &mut T) {
        if self.stopped || self.periodic.is_some() {
            return;
        }
        self.periodic = Some(timers.schedule_repeating(Channel::Periodic, self.periodic_interval));
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Whether a timer is pending on the channel.
    pub fn is_pending(&self, channel: Channel) -> bool {
        match channel {
            Channel::Periodic => self.periodic.is_some(),
            Channel::Structural => self.structural.handle.is_some(),
            Channel::Highlight => self.highlight.handle.is_some(),
            Channel::Scroll => self.scroll.handle.is_some(),
        }
    }

    /// A structural change happened; render once things go quiet.
    pub fn structural_mutation<T: TimerQueue<Handle = H>>(&mut self, timers: &mut T) {
        if !self.stopped {
            self.structural.restart(timers);
        }
    }

    /// A highlight-related change happened.
    pub fn highlight_mutation<T: TimerQueue<Handle = H>>(&mut self, timers: &mut T) {
        if !self.stopped {
            self.highlight.restart(timers);
        }
    }

    /// The window scrolled.
    pub fn scrolled<T: TimerQueue<Handle = H>>(&mut self, timers: &mut T) {
        if !self.stopped {
            self.scroll.coalesce(timers);
        }
    }

    /// The window or document was resized. Renders right away.
    pub fn resized(&self) -> Action {
        self.render_if_live(Trigger::Resize)
    }

    /// Translate a fired timer into an action.
    pub fn fire(&mut self, channel: Channel) -> Action {
        let fresh = match channel {
            Channel::Periodic => self.periodic.is_some(),
            Channel::Structural => self.structural.settle(),
            Channel::Highlight => self.highlight.settle(),
            Channel::Scroll => self.scroll.settle(),
        };
        if !fresh {
            log::debug!("Ignoring stale {:?} timer", channel);
            return Action::Idle;
        }

        match channel {
            Channel::Periodic => self.render_if_live(Trigger::Periodic),
            Channel::Structural => self.render_if_live(Trigger::Structural),
            Channel::Highlight => self.render_if_live(Trigger::Highlight),
            Channel::Scroll if self.enabled && !self.stopped => Action::UpdateViewport,
            Channel::Scroll => Action::Idle,
        }
    }

    /// Flip the enabled state. Re-enabling renders immediately.
    pub fn toggle(&mut self) -> Action {
        self.enabled = !self.enabled;
        if self.enabled {
            self.render_if_live(Trigger::Toggle)
        } else {
            Action::Idle
        }
    }

    /// Cancel every pending timer. Later events and fires are ignored.
    pub fn stop<T: TimerQueue<Handle = H>>(&mut self, timers: &mut T) {
        if let Some(handle) = self.periodic.take() {
            timers.cancel(handle);
        }
        self.structural.cancel(timers);
        self.highlight.cancel(timers);
        self.scroll.cancel(timers);
        self.stopped = true;
    }

    fn render_if_live(&self, trigger: Trigger) -> Action {
        if self.enabled && !self.stopped {
            Action::Render(trigger)
        } else {
            Action::Idle
        }
    }
}

/// Identifier of a [`ManualTimers`] timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct TimerEntry {
    id: TimerId,
    channel: Channel,
    due: Duration,
    period: Option<Duration>,
}

/// Timer queue on a virtual clock, advanced explicitly.
#[derive(Debug, Default)]
pub struct ManualTimers {
    now: Duration,
    next_id: u64,
    entries: Vec<TimerEntry>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of live timers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// When the pending timer on `channel` is due, if any.
    pub fn due(&self, channel: Channel) -> Option<Duration> {
        self.entries
            .iter()
            .filter(|entry| entry.channel == channel)
            .map(|entry| entry.due)
            .min()
    }

    /// Fire the earliest timer due no later than `until`, moving the clock
    /// to its due time.
    pub fn pop_due(&mut self, until: Duration) -> Option<Channel> {
        let index = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.due <= until)
            .min_by_key(|(_, entry)| (entry.due, entry.id.0))
            .map(|(index, _)| index)?;

        let entry = &mut self.entries[index];
        let channel = entry.channel;
        self.now = self.now.max(entry.due);
        match entry.period {
            Some(period) => entry.due += period,
            None => {
                self.entries.remove(index);
            }
        }
        Some(channel)
    }

    /// Move the clock forward without firing anything.
    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    /// Advance the clock by `by`, returning every channel that fired in order.
    pub fn advance(&mut self, by: Duration) -> Vec<Channel> {
        let until = self.now + by;
        let mut fired = Vec::new();
        while let Some(channel) = self.pop_due(until) {
            fired.push(channel);
        }
        self.set_now(until);
        fired
    }

    fn insert(&mut self, channel: Channel, delay: Duration, period: Option<Duration>) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.push(TimerEntry {
            id,
            channel,
            due: self.now + delay,
            period,
        });
        id
    }
}

impl TimerQueue for ManualTimers {
    type Handle = TimerId;

    fn schedule_once(&mut self, channel: Channel, delay: Duration) -> TimerId {
        self.insert(channel, delay, None)
    }

    fn schedule_repeating(&mut self, channel: Channel, period: Duration) -> TimerId {
        let period = period.max(Duration::from_millis(1));
        self.insert(channel, period, Some(period))
    }

    fn cancel(&mut self, handle: TimerId) {
        self.entries.retain(|entry| entry.id != handle);
    }
}
