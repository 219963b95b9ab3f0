//! Prometheus text exposition format.
//!
//! Renders the controller's last-known allocations as gauges with a
//! `service` label.

use fleet_core::CapacityAllocation;

/// Render allocations into Prometheus text format.
pub fn render_prometheus(allocations: &[CapacityAllocation]) -> String {
    let mut out = String::new();

    gauge(
        &mut out,
        "fleet_units_total",
        "Total execution units allocated.",
        allocations,
        |a| a.total_units,
    );
    gauge(
        &mut out,
        "fleet_units_guaranteed",
        "Units placed on guaranteed capacity.",
        allocations,
        |a| a.guaranteed_units,
    );
    gauge(
        &mut out,
        "fleet_units_preemptible",
        "Units placed on preemptible capacity.",
        allocations,
        |a| a.preemptible_units,
    );

    out
}

fn gauge(
    out: &mut String,
    name: &str,
    help: &str,
    allocations: &[CapacityAllocation],
    value: impl Fn(&CapacityAllocation) -> u32,
) {
    out.push_str(&format!("# HELP {name} {help}\n"));
    out.push_str(&format!("# TYPE {name} gauge\n"));
    for a in allocations {
        out.push_str(&format!(
            "{name}{{service=\"{}\"}} {}\n",
            escape_label(&a.service_id),
            value(a)
        ));
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc(service: &str, total: u32, guaranteed: u32) -> CapacityAllocation {
        CapacityAllocation {
            service_id: service.to_string(),
            total_units: total,
            guaranteed_units: guaranteed,
            preemptible_units: total - guaranteed,
        }
    }

    #[test]
    fn renders_all_gauges() {
        let out = render_prometheus(&[alloc("api", 8, 8), alloc("worker", 10, 3)]);

        assert!(out.contains("# TYPE fleet_units_total gauge"));
        assert!(out.contains("fleet_units_total{service=\"api\"} 8"));
        assert!(out.contains("fleet_units_guaranteed{service=\"worker\"} 3"));
        assert!(out.contains("fleet_units_preemptible{service=\"worker\"} 7"));
        assert!(out.contains("fleet_units_preemptible{service=\"api\"} 0"));
    }

    #[test]
    fn empty_input_renders_only_headers() {
        let out = render_prometheus(&[]);
        assert_eq!(out.lines().count(), 6);
        assert!(out.lines().all(|l| l.starts_with('#')));
    }

    #[test]
    fn escapes_label_values() {
        let out = render_prometheus(&[alloc("we\"ird", 1, 1)]);
        assert!(out.contains("service=\"we\\\"ird\""));
    }
}
