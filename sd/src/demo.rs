//! Timer-backed scenarios for both delay modes
//!
//! Each token is completed by a loop timer with a random latency, so results
//! routinely arrive out of issue order. Used by the `sd` binary.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use eyre::eyre;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};
use tracing::debug;

use crate::delay::{Delay, StepFn, step};
use crate::error::DelayResult;

/// Random per-token latency source
pub struct Latency {
    rng: StdRng,
    max_ms: u64,
}

impl Latency {
    /// Latencies in `0..=max`; a seed makes runs reproducible
    pub fn new(max: Duration, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            max_ms: max.as_millis() as u64,
        }
    }

    pub fn sample(&mut self) -> Duration {
        Duration::from_millis(self.rng.random_range(0..=self.max_ms))
    }
}

/// Issue a token on `delay` completed by a timer after a random latency
fn after_latency(delay: &Delay, latency: &mut Latency, value: Value) {
    let token = delay.begin();
    let wait = latency.sample();
    debug!(token_id = token.id(), latency_ms = wait.as_millis() as u64, "demo: timer scheduled");
    delay
        .reactor()
        .schedule_after(wait, Box::new(move || token.complete(vec![Value::Null, value])));
}

/// Parallel mode: `count` timers, results in issue order
pub fn fan_out(delay: &Delay, count: usize, latency: &mut Latency) -> DelayResult<Vec<Value>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    for index in 0..count {
        after_latency(delay, latency, json!({ "slot": index }));
    }
    delay.wait()
}

/// Sequential mode: `stages` steps, each fanning out `width` timers
///
/// Every value records the stage and slot that produced it and how many inputs
/// that stage received, so the output shows each stage saw the whole previous one.
pub fn chain(delay: &Delay, stages: usize, width: usize, latency: Latency) -> DelayResult<Vec<Value>> {
    let latency = Rc::new(RefCell::new(latency));
    let steps: Vec<StepFn> = (1..=stages)
        .map(|stage| {
            let latency = Rc::clone(&latency);
            step(move |d, args| {
                let mut latency = latency.borrow_mut();
                for slot in 0..width {
                    after_latency(
                        d,
                        &mut latency,
                        json!({ "stage": stage, "slot": slot, "inputs": args.len() }),
                    );
                }
                Ok(())
            })
        })
        .collect();
    delay.steps(steps).wait()
}

/// A chain whose step `fail_at` (1-based) fails with `message`
pub fn failing_chain(delay: &Delay, fail_at: usize, message: &str) -> DelayResult<Vec<Value>> {
    let steps: Vec<StepFn> = (1..=fail_at.max(1))
        .map(|stage| {
            let message = message.to_string();
            step(move |d, _| {
                if stage == fail_at.max(1) {
                    return Err(eyre!(message));
                }
                let token = d.begin();
                d.reactor()
                    .schedule(Box::new(move || token.complete(vec![Value::Null, json!(stage)])));
                Ok(())
            })
        })
        .collect();
    delay.steps(steps).wait()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DelayError;
    use crate::reactor::Reactor;
    use crate::reactor::manual::ManualLoop;

    fn manual_delay() -> Delay {
        Delay::with_loop(Rc::new(ManualLoop::new()) as Rc<dyn Reactor>)
    }

    #[test]
    fn test_latency_is_reproducible_with_seed() {
        let mut a = Latency::new(Duration::from_millis(100), Some(7));
        let mut b = Latency::new(Duration::from_millis(100), Some(7));
        for _ in 0..10 {
            let next = a.sample();
            assert_eq!(next, b.sample());
            assert!(next <= Duration::from_millis(100));
        }
    }

    #[test]
    fn test_fan_out_orders_by_slot() {
        let mut latency = Latency::new(Duration::from_millis(10), Some(1));
        let values = fan_out(&manual_delay(), 4, &mut latency).unwrap();
        let slots: Vec<u64> = values.iter().map(|v| v["slot"].as_u64().unwrap()).collect();
        assert_eq!(slots, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_fan_out_zero_count() {
        let mut latency = Latency::new(Duration::ZERO, None);
        assert_eq!(fan_out(&manual_delay(), 0, &mut latency), Ok(vec![]));
    }

    #[test]
    fn test_chain_feeds_each_stage_previous_width() {
        let latency = Latency::new(Duration::from_millis(10), Some(3));
        let values = chain(&manual_delay(), 3, 2, latency).unwrap();

        assert_eq!(values.len(), 2);
        for (slot, value) in values.iter().enumerate() {
            assert_eq!(value["stage"], json!(3));
            assert_eq!(value["slot"], json!(slot));
            assert_eq!(value["inputs"], json!(2));
        }
    }

    #[test]
    fn test_zero_width_chain_finishes_after_first_stage() {
        let latency = Latency::new(Duration::from_millis(10), Some(3));
        assert_eq!(chain(&manual_delay(), 3, 0, latency), Ok(vec![]));
    }

    #[test]
    fn test_failing_chain_reports_step() {
        let err = failing_chain(&manual_delay(), 3, "boom").unwrap_err();
        assert_eq!(
            err,
            DelayError::StepFailed {
                step: 3,
                message: "boom".to_string()
            }
        );
    }
}
