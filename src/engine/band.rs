/// Qualitative reading of a win probability.
///
/// Both thresholds are strict: a probability sitting exactly on a boundary
/// falls into the lower band.

pub const WINNER_THRESHOLD: f64 = 0.35;
pub const PODIUM_THRESHOLD: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    Winner,
    Podium,
    MidPack,
}

impl ConfidenceBand {
    pub fn classify(probability: f64) -> Self {
        if probability > WINNER_THRESHOLD {
            ConfidenceBand::Winner
        } else if probability > PODIUM_THRESHOLD {
            ConfidenceBand::Podium
        } else {
            ConfidenceBand::MidPack
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceBand::Winner => "high confidence winner",
            ConfidenceBand::Podium => "podium potential",
            ConfidenceBand::MidPack => "mid-pack",
        }
    }

    pub fn headline(&self) -> &'static str {
        match self {
            ConfidenceBand::Winner => "CHEQUERED FLAG!",
            ConfidenceBand::Podium => "TOP 3 POTENTIAL.",
            ConfidenceBand::MidPack => "MID-PACK.",
        }
    }

    pub fn message(&self, probability: f64) -> String {
        let pct = probability * 100.0;
        match self {
            ConfidenceBand::Winner => format!(
                "Very high chance of winning ({:.1}%). This driver is predicted to take the win.",
                pct
            ),
            ConfidenceBand::Podium => format!(
                "Moderate chance ({:.1}%). This driver has strong podium potential.",
                pct
            ),
            ConfidenceBand::MidPack => format!(
                "Low chance ({:.1}%). This driver will likely finish outside the top 5.",
                pct
            ),
        }
    }
}
