/// Penalty per fielding error charged this game
pub const ERROR_PENALTY: f64 = 0.05;

/// In-game fielding tracker for one team
#[derive(Debug, Clone, Default)]
pub struct DefenseMonitor {
    team: String,
    error_count: u32,
}

impl DefenseMonitor {
    pub fn new(team: impl Into<String>) -> Self {
        Self {
            team: team.into(),
            error_count: 0,
        }
    }

    pub fn log_error(&mut self) {
        self.error_count += 1;
    }

    pub fn log_errors(&mut self, count: u32) {
        self.error_count += count;
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn team(&self) -> &str {
        &self.team
    }

    /// `1 + 0.05 × errors`; poor defense behaves like free bases
    pub fn modifier(&self) -> f64 {
        1.0 + self.error_count as f64 * ERROR_PENALTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier() {
        let mut d = DefenseMonitor::new("BOS");
        assert_eq!(d.modifier(), 1.0);
        d.log_error();
        assert!((d.modifier() - 1.05).abs() < 1e-12);
        d.log_errors(2);
        assert!((d.modifier() - 1.15).abs() < 1e-12);
        assert_eq!(d.team(), "BOS");
    }
}
