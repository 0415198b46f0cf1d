//! Threshold and timing arithmetic shared by both aggregator roles

use crate::beam_interface::{NodeId, ProofKind, SimError, SimTime, SnarkProof, MILLIS_PER_SECOND};

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationLogic {
    /// Inputs folded per second
    rate_per_sec: f64,
    proof_size: u64,
    /// Percentage (0-100) of connected peers required to finalize
    threshold: f64,
    kind: ProofKind,
}

impl AggregationLogic {
    pub fn new(
        rate_per_sec: f64,
        proof_size: u64,
        threshold: f64,
        kind: ProofKind,
    ) -> Result<Self, SimError> {
        if !rate_per_sec.is_finite() || rate_per_sec <= 0.0 {
            return Err(SimError::Configuration(format!(
                "aggregation rate must be positive, got {}",
                rate_per_sec
            )));
        }
        if !(0.0..=100.0).contains(&threshold) {
            return Err(SimError::Configuration(format!(
                "aggregation threshold {} is not a percentage",
                threshold
            )));
        }
        Ok(Self {
            rate_per_sec,
            proof_size,
            threshold,
            kind,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn proof_size(&self) -> u64 {
        self.proof_size
    }

    /// Contributions needed out of `total`, floored
    pub fn required(&self, total: usize) -> usize {
        (total as f64 * self.threshold / 100.0).floor() as usize
    }

    pub fn should_aggregate(&self, collected: usize, total: usize) -> bool {
        collected >= self.required(total)
    }

    /// Seconds needed to fold `count` inputs
    pub fn aggregation_time(&self, count: usize) -> f64 {
        count as f64 / self.rate_per_sec
    }

    /// Same as `aggregation_time`, on the simulation clock
    pub fn aggregation_delay(&self, count: usize) -> SimTime {
        self.aggregation_time(count) * MILLIS_PER_SECOND
    }

    /// Build the proof for a round over `inputs`.
    ///
    /// `num_signatures` is how many validator signatures the inputs cover.
    pub fn aggregate<T>(&self, inputs: &[T], num_signatures: usize, aggregator_id: NodeId) -> SnarkProof {
        SnarkProof {
            aggregator_id,
            kind: self.kind,
            proof_size: self.proof_size,
            num_signatures,
            num_inputs: inputs.len(),
            aggregation_time_secs: self.aggregation_time(inputs.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logic(threshold: f64) -> AggregationLogic {
        AggregationLogic::new(1000.0, 131_072, threshold, ProofKind::Subnet).unwrap()
    }

    #[test]
    fn test_threshold_boundary() {
        let logic = logic(50.0);
        assert_eq!(logic.required(10), 5);
        assert!(!logic.should_aggregate(4, 10));
        assert!(logic.should_aggregate(5, 10));
    }

    #[test]
    fn test_threshold_floors() {
        let seventy = logic(70.0);
        // 7 * 70% = 4.9 -> 4
        assert_eq!(seventy.required(7), 4);
        assert!(seventy.should_aggregate(4, 7));
        assert_eq!(logic(100.0).required(3), 3);
        assert_eq!(logic(66.67).required(3), 2);
    }

    #[test]
    fn test_zero_threshold_always_fires() {
        let logic = logic(0.0);
        assert_eq!(logic.required(50), 0);
        assert!(logic.should_aggregate(0, 50));
    }

    #[test]
    fn test_timing() {
        let logic = AggregationLogic::new(4.0, 10, 100.0, ProofKind::Recursive).unwrap();
        assert_eq!(logic.aggregation_time(3), 0.75);
        assert_eq!(logic.aggregation_delay(3), 750.0);

        let proof = logic.aggregate(&[(), (), ()], 30, 9);
        assert_eq!(proof.aggregator_id, 9);
        assert_eq!(proof.kind, ProofKind::Recursive);
        assert_eq!(proof.num_inputs, 3);
        assert_eq!(proof.num_signatures, 30);
        assert_eq!(proof.proof_size, 10);
        assert_eq!(proof.aggregation_time_secs, 0.75);
    }

    #[test]
    fn test_rejects_bad_configuration() {
        assert!(matches!(
            AggregationLogic::new(0.0, 10, 50.0, ProofKind::Subnet),
            Err(SimError::Configuration(_))
        ));
        assert!(AggregationLogic::new(-5.0, 10, 50.0, ProofKind::Subnet).is_err());
        assert!(AggregationLogic::new(f64::NAN, 10, 50.0, ProofKind::Subnet).is_err());
        assert!(AggregationLogic::new(10.0, 10, 101.0, ProofKind::Subnet).is_err());
        assert!(AggregationLogic::new(10.0, 10, -1.0, ProofKind::Subnet).is_err());
    }
}
