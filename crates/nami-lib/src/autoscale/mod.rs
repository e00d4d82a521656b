//! Autoscaling policy registration
//!
//! Registers a service's scalable target and up to three target-tracking
//! policies, in the order CPU, memory, request count.

mod registrar;

pub use registrar::{ScalingOutcome, ScalingPolicyRegistrar, ScalingRequest};

#[cfg(test)]
mod tests;
