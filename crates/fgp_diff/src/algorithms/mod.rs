use std::time::Duration;

pub mod fingerprint;

/// Wall time of each matching phase.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PhaseDurations {
    pub decoration: Duration,
    pub top_down: Duration,
    pub bottom_up: Duration,
    pub refinement: Duration,
}

pub trait ComputeTime {
    fn time(&self) -> f64;
}

impl ComputeTime for PhaseDurations {
    fn time(&self) -> f64 {
        (self.decoration + self.top_down + self.bottom_up + self.refinement).as_secs_f64()
    }
}

macro_rules! tr {
    ($($val:ident),*) => {
        $(
            log::trace!("{}={:?}", stringify!($val), $val);
        )*
    };
}
pub(self) use tr;
