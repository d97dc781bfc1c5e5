//! Policy engine
//!
//! Pure ordering of candidate providers: no I/O, no side effects. The
//! router hands in a health snapshot and per-provider costs; the engine
//! hands back an ordered name list.

use prism_core::config::{PolicyName, PolicyParams};

/// Latency at or above which the balanced latency score bottoms out.
const LATENCY_CEILING_MS: f64 = 2000.0;

/// Cost at or above which the balanced cost score bottoms out.
const COST_CEILING: f64 = 0.01;

/// Per-provider input to the engine.
#[derive(Debug, Clone)]
pub struct PolicyCandidate {
    pub name: String,
    pub uptime: f64,
    pub avg_latency_ms: f64,
    pub cost_per_token: f64,
}

/// Order candidates according to the named policy.
///
/// Providers below `params.min_uptime` are filtered out first; if that
/// would empty a non-empty candidate set, the filter is abandoned and
/// the full set is ordered instead.
pub fn order_providers(
    candidates: &[PolicyCandidate],
    policy: PolicyName,
    params: &PolicyParams,
) -> Vec<String> {
    let healthy: Vec<&PolicyCandidate> = candidates
        .iter()
        .filter(|c| c.uptime >= params.min_uptime)
        .collect();
    let mut pool: Vec<&PolicyCandidate> = if healthy.is_empty() {
        candidates.iter().collect()
    } else {
        healthy
    };

    match policy {
        PolicyName::CostOptimized => {
            pool.sort_by(|a, b| {
                a.cost_per_token
                    .total_cmp(&b.cost_per_token)
                    .then(b.uptime.total_cmp(&a.uptime))
                    .then(a.name.cmp(&b.name))
            });
        }
        PolicyName::PerformanceFirst => {
            pool.sort_by(|a, b| {
                a.avg_latency_ms
                    .total_cmp(&b.avg_latency_ms)
                    .then(b.uptime.total_cmp(&a.uptime))
                    .then(a.name.cmp(&b.name))
            });
        }
        PolicyName::Balanced => {
            pool.sort_by(|a, b| {
                balanced_score(b, params)
                    .total_cmp(&balanced_score(a, params))
                    .then(a.name.cmp(&b.name))
            });
        }
    }

    pool.into_iter().map(|c| c.name.clone()).collect()
}

/// Weighted composite of uptime, latency, and cost, each normalized to
/// [0, 1].
fn balanced_score(candidate: &PolicyCandidate, params: &PolicyParams) -> f64 {
    let uptime_score = candidate.uptime.clamp(0.0, 1.0);
    let latency_score = (1.0 - candidate.avg_latency_ms / LATENCY_CEILING_MS).max(0.0);
    let cost_score = (1.0 - candidate.cost_per_token / COST_CEILING).max(0.0);

    params.weights.uptime * uptime_score
        + params.weights.latency * latency_score
        + params.weights.cost * cost_score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, uptime: f64, latency: f64, cost: f64) -> PolicyCandidate {
        PolicyCandidate {
            name: name.to_string(),
            uptime,
            avg_latency_ms: latency,
            cost_per_token: cost,
        }
    }

    #[test]
    fn test_cost_optimized_sorts_ascending_by_cost() {
        let candidates = vec![
            candidate("pricey", 1.0, 100.0, 0.005),
            candidate("cheap", 1.0, 500.0, 0.0001),
        ];
        let order = order_providers(
            &candidates,
            PolicyName::CostOptimized,
            &PolicyParams::default(),
        );
        assert_eq!(order, vec!["cheap", "pricey"]);
    }

    #[test]
    fn test_cost_ties_break_by_uptime() {
        let candidates = vec![
            candidate("shaky", 0.95, 100.0, 0.002),
            candidate("steady", 1.0, 100.0, 0.002),
        ];
        let order = order_providers(
            &candidates,
            PolicyName::CostOptimized,
            &PolicyParams::default(),
        );
        assert_eq!(order, vec!["steady", "shaky"]);
    }

    #[test]
    fn test_performance_first_sorts_ascending_by_latency() {
        let candidates = vec![
            candidate("slow", 1.0, 900.0, 0.0001),
            candidate("fast", 1.0, 80.0, 0.005),
        ];
        let order = order_providers(
            &candidates,
            PolicyName::PerformanceFirst,
            &PolicyParams::default(),
        );
        assert_eq!(order, vec!["fast", "slow"]);
    }

    #[test]
    fn test_balanced_prefers_all_round_provider() {
        let candidates = vec![
            candidate("cheap-but-down", 0.5, 100.0, 0.0001),
            candidate("solid", 1.0, 150.0, 0.002),
        ];
        let order =
            order_providers(&candidates, PolicyName::Balanced, &PolicyParams::default());
        assert_eq!(order[0], "solid");
    }

    #[test]
    fn test_balanced_ties_break_lexicographically() {
        let candidates = vec![
            candidate("beta", 1.0, 100.0, 0.002),
            candidate("alpha", 1.0, 100.0, 0.002),
        ];
        let order =
            order_providers(&candidates, PolicyName::Balanced, &PolicyParams::default());
        assert_eq!(order, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_min_uptime_filter_drops_unhealthy() {
        let candidates = vec![
            candidate("down", 0.2, 100.0, 0.0001),
            candidate("up", 0.95, 100.0, 0.002),
        ];
        let order =
            order_providers(&candidates, PolicyName::Balanced, &PolicyParams::default());
        assert_eq!(order, vec!["up"]);
    }

    #[test]
    fn test_floor_fails_open_when_all_below() {
        let candidates = vec![
            candidate("bad", 0.1, 100.0, 0.002),
            candidate("worse", 0.0, 100.0, 0.002),
        ];
        let order =
            order_providers(&candidates, PolicyName::Balanced, &PolicyParams::default());
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn test_deterministic_for_identical_inputs() {
        let candidates = vec![
            candidate("a", 0.95, 200.0, 0.001),
            candidate("b", 0.97, 150.0, 0.003),
            candidate("c", 1.0, 400.0, 0.0005),
        ];
        let params = PolicyParams::default();
        let first = order_providers(&candidates, PolicyName::Balanced, &params);
        let second = order_providers(&candidates, PolicyName::Balanced, &params);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_candidates_yield_empty_order() {
        let order = order_providers(&[], PolicyName::Balanced, &PolicyParams::default());
        assert!(order.is_empty());
    }

    #[test]
    fn test_floor_applies_regardless_of_history_depth() {
        // A barely-tested unhealthy provider is filtered as long as a
        // healthy candidate remains.
        let candidates = vec![
            candidate("fresh-and-failing", 0.5, 100.0, 0.0001),
            candidate("steady", 0.95, 100.0, 0.002),
        ];
        let order =
            order_providers(&candidates, PolicyName::Balanced, &PolicyParams::default());
        assert_eq!(order, vec!["steady"]);
    }
}
