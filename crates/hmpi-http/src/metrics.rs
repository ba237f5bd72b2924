use std::collections::HashMap;
use std::fmt::Write as _;

use parking_lot::Mutex;

/// Routes with their own label; everything else is folded into `other`.
/// Labels only ever come from this list, so they never need escaping.
const KNOWN_ROUTES: [&str; 5] = [
    "/api/hmpi/calculate",
    "/api/hmpi/reference",
    "/api/health",
    "/health",
    "/metrics",
];

#[derive(Debug, Default)]
pub struct RequestMetrics {
    inner: Mutex<MetricsState>,
}

#[derive(Debug, Default)]
struct MetricsState {
    requests: HashMap<(&'static str, u16), u64>,
    calculations: u64,
    calculation_failures: u64,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, path: &str, status: u16) {
        let mut state = self.inner.lock();
        *state.requests.entry((route_label(path), status)).or_insert(0) += 1;
    }

    pub fn record_calculation(&self, ok: bool) {
        let mut state = self.inner.lock();
        if ok {
            state.calculations += 1;
        } else {
            state.calculation_failures += 1;
        }
    }

    pub fn request_count(&self, path: &str, status: u16) -> u64 {
        let state = self.inner.lock();
        state
            .requests
            .get(&(route_label(path), status))
            .copied()
            .unwrap_or(0)
    }

    pub fn render_text(&self) -> String {
        let state = self.inner.lock();
        let mut rows = state.requests.iter().collect::<Vec<_>>();
        rows.sort_by(|a, b| a.0.cmp(b.0));

        let mut out = String::new();
        out.push_str("# HELP hmpi_http_requests_total HTTP requests by route and status.\n");
        out.push_str("# TYPE hmpi_http_requests_total counter\n");
        for ((route, status), count) in rows {
            let _ = writeln!(
                out,
                "hmpi_http_requests_total{{route=\"{route}\",status=\"{status}\"}} {count}"
            );
        }
        out.push_str("# HELP hmpi_calculations_total Index calculations by outcome.\n");
        out.push_str("# TYPE hmpi_calculations_total counter\n");
        let _ = writeln!(
            out,
            "hmpi_calculations_total{{outcome=\"ok\"}} {}",
            state.calculations
        );
        let _ = writeln!(
            out,
            "hmpi_calculations_total{{outcome=\"error\"}} {}",
            state.calculation_failures
        );
        out
    }
}

fn route_label(path: &str) -> &'static str {
    KNOWN_ROUTES
        .iter()
        .find(|route| **route == path)
        .copied()
        .unwrap_or("other")
}
