//! Side assignment for newly matched pairs

use crate::types::Side;

/// Decides which side the first member of a pair holds
pub trait SideAssigner: Send + Sync {
    /// Side for the pair's first member; the second member gets the opposite
    fn assign(&self) -> Side;
}

/// Independent fair coin flip per match
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSideAssigner;

impl SideAssigner for RandomSideAssigner {
    fn assign(&self) -> Side {
        if rand::random::<bool>() {
            Side::Proposition
        } else {
            Side::Negation
        }
    }
}

/// Always gives the first member the same side (deterministic tests, simulations)
#[derive(Debug, Clone, Copy)]
pub struct FixedSideAssigner(pub Side);

impl SideAssigner for FixedSideAssigner {
    fn assign(&self) -> Side {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_assigner() {
        assert_eq!(FixedSideAssigner(Side::Negation).assign(), Side::Negation);
    }

    #[test]
    fn test_random_assigner_produces_both_sides() {
        let assigner = RandomSideAssigner;
        let flips: Vec<Side> = (0..200).map(|_| assigner.assign()).collect();
        assert!(flips.contains(&Side::Proposition));
        assert!(flips.contains(&Side::Negation));
    }
}
