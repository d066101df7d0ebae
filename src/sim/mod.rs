//! Simulation controllers.
//!
//! [`Controller`] owns one grid pair, the stages and the rule, and runs the
//! reset/step/swap protocol. [`Sim2D`] and [`Sim3D`] wrap it with the
//! setters that only make sense in one dimension.
//!
//! ```text
//! Uninitialized --reset--> Ready --render--> Stepping <--set_paused--> Paused
//!        any state --reset--> Ready
//! ```

mod controller;
mod sim2d;
mod sim3d;

pub use controller::Controller;
pub use sim2d::Sim2D;
pub use sim3d::Sim3D;

use crate::backend::BufferId;
use crate::config::CadenceConfig;
use crate::grid::GridShape;

/// Controller lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimState {
    /// Grid allocated but never reset.
    Uninitialized,
    /// Freshly reset; no step taken yet.
    Ready,
    /// Advancing on every due render tick.
    Stepping,
    /// Rendering the last state without stepping.
    Paused,
}

/// Decides how many steps a render tick runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cadence {
    pub compute_delay: u32,
    pub skip_every_other: bool,
    current_delay: u32,
}

impl Cadence {
    pub fn new(config: CadenceConfig) -> Self {
        Self {
            compute_delay: config.compute_delay,
            skip_every_other: config.skip_every_other,
            current_delay: 0,
        }
    }

    /// Advance the delay counter and return the number of steps due now.
    pub fn tick(&mut self) -> u32 {
        self.current_delay += 1;
        if self.current_delay < self.compute_delay {
            return 0;
        }
        self.current_delay = 0;
        if self.skip_every_other {
            2
        } else {
            1
        }
    }

    /// Start counting toward the next step from zero.
    pub fn restart(&mut self) {
        self.current_delay = 0;
    }

    /// Ticks since the last step.
    pub fn current_delay(&self) -> u32 {
        self.current_delay
    }

    pub fn config(&self) -> CadenceConfig {
        CadenceConfig {
            compute_delay: self.compute_delay,
            skip_every_other: self.skip_every_other,
        }
    }
}

/// What the display layer draws this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame {
    /// The fully swapped "old" buffer.
    pub buffer: BufferId,
    pub shape: GridShape,
    /// Steps taken since the last reset.
    pub generation: u64,
    /// Steps taken during this tick.
    pub steps: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticks(cadence: &mut Cadence, n: usize) -> Vec<u32> {
        (0..n).map(|_| cadence.tick()).collect()
    }

    #[test]
    fn test_zero_and_one_delay_step_every_tick() {
        for delay in [0, 1] {
            let mut c = Cadence::new(CadenceConfig {
                compute_delay: delay,
                skip_every_other: false,
            });
            assert_eq!(ticks(&mut c, 4), vec![1, 1, 1, 1]);
        }
    }

    #[test]
    fn test_delay_three() {
        let mut c = Cadence::new(CadenceConfig {
            compute_delay: 3,
            skip_every_other: false,
        });
        assert_eq!(ticks(&mut c, 6), vec![0, 0, 1, 0, 0, 1]);
        assert_eq!(c.current_delay(), 0);
    }

    #[test]
    fn test_restart_drops_pending_ticks() {
        let mut c = Cadence::new(CadenceConfig {
            compute_delay: 3,
            skip_every_other: false,
        });
        assert_eq!(ticks(&mut c, 2), vec![0, 0]);
        c.restart();
        assert_eq!(c.current_delay(), 0);
        assert_eq!(ticks(&mut c, 3), vec![0, 0, 1]);
    }

    #[test]
    fn test_skip_doubles_steps() {
        let mut c = Cadence::new(CadenceConfig {
            compute_delay: 2,
            skip_every_other: true,
        });
        assert_eq!(ticks(&mut c, 4), vec![0, 2, 0, 2]);
    }
}
