//! Prometheus text exposition for `GET /metrics`

use crate::infra::metrics::{Metrics, MetricsSummary, METRICS_BUCKET_BOUNDS, METRICS_NUM_BUCKETS};
use std::fmt::Write;

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write a simple metric (counter or gauge) with the restaurant label
fn write_metric(
    output: &mut String,
    name: &str,
    help: &str,
    typ: MetricType,
    restaurant: &str,
    val: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name}{{restaurant=\"{restaurant}\"}} {val}");
}

/// Write a histogram metric with buckets, sum, and count
fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    restaurant: &str,
    buckets: &[u64; METRICS_NUM_BUCKETS],
    bounds: &[u64; 10],
    avg: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in bounds.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(
            output,
            "{name}_bucket{{restaurant=\"{restaurant}\",le=\"{bound}\"}} {cumulative}"
        );
    }
    cumulative += buckets[METRICS_NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{restaurant=\"{restaurant}\",le=\"+Inf\"}} {cumulative}");

    let count: u64 = buckets.iter().sum();
    let sum = avg * count;
    let _ = writeln!(output, "{name}_sum{{restaurant=\"{restaurant}\"}} {sum}");
    let _ = writeln!(output, "{name}_count{{restaurant=\"{restaurant}\"}} {count}");
}

/// Label values may not contain raw quotes, backslashes or newlines
fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

/// Format metrics in Prometheus text exposition format
pub fn format_prometheus_metrics(metrics: &Metrics, restaurant: &str) -> String {
    let summary = metrics.snapshot();
    let restaurant = escape_label(restaurant);
    let mut output = String::with_capacity(4096);

    write_occupancy_metrics(&mut output, &restaurant, &summary);
    write_event_metrics(&mut output, &restaurant, &summary);
    write_request_metrics(&mut output, &restaurant, &summary);

    output
}

fn write_occupancy_metrics(output: &mut String, restaurant: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "occupancy_current_visitors",
        "Visitors currently inside",
        MetricType::Gauge,
        restaurant,
        summary.current_visitors,
    );
    write_metric(
        output,
        "occupancy_max_capacity",
        "Configured maximum capacity",
        MetricType::Gauge,
        restaurant,
        summary.max_capacity,
    );
}

fn write_event_metrics(output: &mut String, restaurant: &str, summary: &MetricsSummary) {
    let _ = writeln!(output, "# HELP occupancy_events_total Occupancy events applied");
    let _ = writeln!(output, "# TYPE occupancy_events_total counter");
    for (action, count) in [
        ("enter", summary.enter_total),
        ("exit", summary.exit_total),
        ("manual_set", summary.manual_set_total),
        ("reset", summary.reset_total),
    ] {
        let _ = writeln!(
            output,
            "occupancy_events_total{{restaurant=\"{restaurant}\",action=\"{action}\"}} {count}"
        );
    }

    write_metric(
        output,
        "occupancy_validation_rejections_total",
        "Requests rejected by validation",
        MetricType::Counter,
        restaurant,
        summary.validation_rejections,
    );
    write_metric(
        output,
        "occupancy_store_errors_total",
        "Ledger load or save failures",
        MetricType::Counter,
        restaurant,
        summary.store_errors,
    );
}

fn write_request_metrics(output: &mut String, restaurant: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "occupancy_http_requests_total",
        "HTTP requests handled",
        MetricType::Counter,
        restaurant,
        summary.requests_total,
    );
    write_histogram(
        output,
        "occupancy_http_latency_us",
        "HTTP request latency in microseconds",
        restaurant,
        &summary.lat_buckets,
        &METRICS_BUCKET_BOUNDS,
        summary.avg_latency_us,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Action;

    #[test]
    fn test_format_prometheus_metrics() {
        let metrics = Metrics::new();
        metrics.record_request(150);
        metrics.record_event(Action::Enter, 4, 50);
        metrics.record_event(Action::Exit, 3, 50);

        let output = format_prometheus_metrics(&metrics, "Bistro");

        assert!(output.contains("occupancy_current_visitors{restaurant=\"Bistro\"} 3"));
        assert!(output.contains("occupancy_max_capacity{restaurant=\"Bistro\"} 50"));
        assert!(output.contains("occupancy_events_total{restaurant=\"Bistro\",action=\"enter\"} 1"));
        assert!(output.contains("occupancy_http_requests_total{restaurant=\"Bistro\"} 1"));
        assert!(output.contains("occupancy_http_latency_us_bucket{restaurant=\"Bistro\",le=\"+Inf\"} 1"));
    }

    #[test]
    fn test_scrape_does_not_reset_report_window() {
        let metrics = Metrics::new();
        metrics.record_request(150);
        let _ = format_prometheus_metrics(&metrics, "Bistro");
        assert_eq!(metrics.report().lat_buckets[1], 1);
    }

    #[test]
    fn test_label_escaping() {
        let output = format_prometheus_metrics(&Metrics::new(), "Joe's \"Diner\"");
        assert!(output.contains("restaurant=\"Joe's \\\"Diner\\\"\""));
    }
}
