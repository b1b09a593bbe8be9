//! Time-based viewport animation.
//!
//! A [`Transition`] interpolates between two viewports. It does not read a
//! clock: the host advances it with the frame time passed to `tick`, and the
//! first sample fixes the start time.

use crate::geometry::Viewport;
use futures::channel::oneshot;
use futures::future::{self, BoxFuture, FutureExt, Shared};
use std::fmt;
use std::time::Duration;

/// Resolves `true` when a viewport change completes, `false` when it is
/// interrupted or cannot run.
pub type ViewportFuture = Shared<BoxFuture<'static, bool>>;

/// A future that is already resolved.
pub fn resolved(value: bool) -> ViewportFuture {
    future::ready(value).boxed().shared()
}

/// Sender/future pair; dropping the sender resolves the future `false`.
pub fn completion() -> (oneshot::Sender<bool>, ViewportFuture) {
    let (tx, rx) = oneshot::channel();
    (tx, rx.map(|r| r.unwrap_or(false)).boxed().shared())
}

#[derive(Clone, Copy, Default)]
pub enum Easing {
    Linear,
    #[default]
    CubicInOut,
    CubicOut,
    Custom(fn(f32) -> f32),
}

impl Easing {
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::CubicInOut => {
                let t2 = t * 2.0;
                if t2 <= 1.0 {
                    t2 * t2 * t2 / 2.0
                } else {
                    let t2 = t2 - 2.0;
                    (t2 * t2 * t2 + 2.0) / 2.0
                }
            }
            Easing::CubicOut => {
                let t1 = t - 1.0;
                t1 * t1 * t1 + 1.0
            }
            Easing::Custom(f) => f(t),
        }
    }
}

impl fmt::Debug for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Easing::Linear => write!(f, "Linear"),
            Easing::CubicInOut => write!(f, "CubicInOut"),
            Easing::CubicOut => write!(f, "CubicOut"),
            Easing::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl PartialEq for Easing {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Easing::Custom(a), Easing::Custom(b)) => std::ptr::eq(*a as *const (), *b as *const ()),
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

/// How a viewport change is applied. A zero or missing duration is instant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransitionOptions {
    pub duration: Option<Duration>,
    pub easing: Easing,
}

impl TransitionOptions {
    pub fn instant() -> Self {
        Self::default()
    }

    pub fn animated(duration: Duration) -> Self {
        Self {
            duration: Some(duration),
            easing: Easing::default(),
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn is_animated(&self) -> bool {
        self.duration.map_or(false, |d| !d.is_zero())
    }
}

pub struct Transition {
    from: Viewport,
    to: Viewport,
    duration: Duration,
    easing: Easing,
    start: Option<Duration>,
    done: Vec<oneshot::Sender<bool>>,
}

impl Transition {
    pub fn new(from: Viewport, to: Viewport, duration: Duration, easing: Easing, done: oneshot::Sender<bool>) -> Self {
        Self {
            from,
            to,
            duration,
            easing,
            start: None,
            done: vec![done],
        }
    }

    pub fn target(&self) -> Viewport {
        self.to
    }

    /// Also resolve `done` when this transition ends.
    pub fn notify(&mut self, done: oneshot::Sender<bool>) {
        self.done.push(done);
    }

    /// Viewport at `now` and whether the transition has finished.
    pub fn sample(&mut self, now: Duration) -> (Viewport, bool) {
        let start = *self.start.get_or_insert(now);
        let elapsed = now.saturating_sub(start);
        if elapsed >= self.duration {
            return (self.to, true);
        }
        let t = self.easing.apply(elapsed.as_secs_f32() / self.duration.as_secs_f32());
        let lerp = |a: f32, b: f32| a + (b - a) * t;
        (
            Viewport::new(
                lerp(self.from.x, self.to.x),
                lerp(self.from.y, self.to.y),
                lerp(self.from.zoom, self.to.zoom),
            ),
            false,
        )
    }

    /// Resolves every waiting future with `completed`.
    pub fn finish(self, completed: bool) {
        for tx in self.done {
            let _ = tx.send(completed);
        }
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("duration", &self.duration)
            .field("easing", &self.easing)
            .field("start", &self.start)
            .finish()
    }
}
