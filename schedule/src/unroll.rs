//! Time-step unroll state machine.
//!
//! Inside a time-stepping loop the same chain closes once per step. With
//! `time_unroll = u > 0`, the first segment is discarded (it often holds one-off
//! setup loops), then segments accumulate until the accumulated length is `u` times
//! the current segment length, at which point all of it is fused at once.
//!
//! `u > 0` outside a real repeating structure gives unspecified accumulation.

use tessel_ir::ParLoop;
use tracing::debug;

/// A pending loop together with its trace sequence number.
pub type Segment = Vec<(u64, ParLoop)>;

#[derive(Debug, Clone, Default)]
pub enum UnrollState {
    #[default]
    Idle,
    Accumulating {
        name: String,
        loops: Segment,
    },
}

impl UnrollState {
    pub fn is_idle(&self) -> bool {
        matches!(self, UnrollState::Idle)
    }

    /// Name and accumulated loop count while accumulating.
    pub fn accumulating(&self) -> Option<(&str, usize)> {
        match self {
            UnrollState::Idle => None,
            UnrollState::Accumulating { name, loops } => Some((name, loops.len())),
        }
    }
}

/// What to do with a just-closed chain.
#[derive(Debug)]
pub enum Decision {
    /// Fuse these loops now.
    Fuse(Segment),
    /// Leave the segment unfused and start accumulating.
    Discard,
    /// Keep accumulating; nothing to fuse yet.
    Accumulate,
    /// Empty segment outside accumulation.
    Skip,
}

#[derive(Debug, Default)]
pub struct UnrollTracker {
    state: UnrollState,
}

impl UnrollTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &UnrollState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = UnrollState::Idle;
    }

    /// Advance on a chain boundary for `name` with the just-closed `segment`.
    pub fn boundary(&mut self, name: &str, time_unroll: usize, segment: Segment) -> Decision {
        if time_unroll == 0 {
            self.state = UnrollState::Idle;
            return if segment.is_empty() { Decision::Skip } else { Decision::Fuse(segment) };
        }

        let tracking = matches!(&self.state, UnrollState::Accumulating { name: active, .. } if active == name);
        if !tracking {
            debug!(chain.name = name, discarded = segment.len(), "first unrolled segment discarded");
            self.state = UnrollState::Accumulating { name: name.to_string(), loops: Vec::new() };
            return Decision::Discard;
        }

        let UnrollState::Accumulating { loops, .. } = &mut self.state else {
            return Decision::Skip;
        };
        if segment.is_empty() {
            return Decision::Accumulate;
        }

        let seg_len = segment.len();
        loops.extend(segment);
        if loops.len() / seg_len == time_unroll {
            let all = std::mem::take(loops);
            self.state = UnrollState::Idle;
            debug!(chain.name = name, loops = all.len(), "unrolled chain complete");
            Decision::Fuse(all)
        } else {
            debug!(chain.name = name, accumulated = loops.len(), "accumulating unrolled chain");
            Decision::Accumulate
        }
    }
}
