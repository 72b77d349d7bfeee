use diamond_edge::domain::{BaseOutState, HalfInning, Runners, ABSORBING_INDEX, LIVE_STATES};
use diamond_edge::engine::{MarkovChainService, StateEngine};

/// Every live row of the transition matrix is a probability distribution,
/// whatever the modifiers.
#[test]
fn transition_rows_sum_to_one() {
    let markov = MarkovChainService::new();
    for (pm, ttto, dm) in [(1.0, 1, 1.0), (1.25, 3, 1.0), (0.85, 2, 1.15), (1.5, 1, 1.3)] {
        let matrix = markov.build_matrix(pm, ttto, dm);
        for row in 0..LIVE_STATES {
            let sum = matrix.row_sum(row);
            assert!(
                (sum - 1.0).abs() <= 1e-6,
                "row {row} sums to {sum} for pm={pm} ttto={ttto} dm={dm}"
            );
        }
        assert_eq!(matrix.get(ABSORBING_INDEX, ABSORBING_INDEX), 1.0);
    }
}

#[test]
fn re24_reference_values() {
    let engine = StateEngine::new();
    let loaded_none_out = BaseOutState::from_parts(0, Runners::LOADED);
    let empty_two_out = BaseOutState::from_parts(2, Runners::EMPTY);

    assert!((engine.expected_runs(loaded_none_out, 1.0) - 2.36).abs() < 1e-9);
    assert!((engine.expected_runs(empty_two_out, 1.0) - 0.10).abs() < 1e-9);
    assert_eq!(engine.expected_runs(BaseOutState::INNING_OVER, 1.0), 0.0);
    assert_eq!(
        MarkovChainService::new().expected_runs(BaseOutState::INNING_OVER, 1.3, 2, 1.1),
        0.0
    );
}

/// Holding everything else fixed, a better home score never lowers the
/// home win probability.
#[test]
fn win_probability_monotone_in_score_diff() {
    let table = StateEngine::new();
    let markov = MarkovChainService::new();

    for inning in [1u32, 5, 8, 9, 11] {
        for half in [HalfInning::Top, HalfInning::Bottom] {
            for state in [0usize, 7, 12, 23] {
                let state = BaseOutState::from_index(state).unwrap();
                let mut prev_table = 0.0;
                let mut prev_markov = 0.0;
                for diff in -10i32..=10 {
                    let (home, away) = if diff >= 0 { (diff as u32, 0) } else { (0, (-diff) as u32) };
                    let t = table.win_probability(home, away, inning, half, state, 1.0);
                    let m = markov.instant_win_prob(
                        inning,
                        state.outs(),
                        state.runners(),
                        diff,
                        half.is_top(),
                        1.1,
                        1.05,
                    );
                    assert!(t >= prev_table, "table not monotone at {inning} {half} {diff}");
                    assert!(m >= prev_markov, "markov not monotone at {inning} {half} {diff}");
                    assert!((0.001..=1.0).contains(&t));
                    assert!((0.001..=1.0).contains(&m));
                    prev_table = t;
                    prev_markov = m;
                }
            }
        }
    }
}

#[test]
fn instant_win_prob_is_bit_identical() {
    let cached = MarkovChainService::new();
    let uncached = MarkovChainService::with_cache_capacity(0);
    let runners = Runners::new(true, false, true);

    let first = cached.instant_win_prob(6, 1, runners, -1, false, 1.137, 1.05);
    for _ in 0..5 {
        let again = cached.instant_win_prob(6, 1, runners, -1, false, 1.137, 1.05);
        assert_eq!(again.to_bits(), first.to_bits());
    }
    let fresh = uncached.instant_win_prob(6, 1, runners, -1, false, 1.137, 1.05);
    assert_eq!(fresh.to_bits(), first.to_bits());
}

#[test]
fn home_walk_off_is_certain() {
    let markov = MarkovChainService::new();
    let p = markov.instant_win_prob(9, 0, Runners::EMPTY, 1, false, 1.0, 1.0);
    assert_eq!(p, 1.0);
    let extras = StateEngine::new().win_probability(5, 4, 12, HalfInning::Bottom, BaseOutState::START, 1.0);
    assert_eq!(extras, 1.0);
}
