//! Diagnostic snapshot assembly for `diag.dump`.

use crate::ops::OpContext;
use serde_json::json;

/// Builds the full diagnostic document: version, live config, pool
/// stats, feature guards, telemetry occupancy, and loader services.
pub fn report(ctx: &OpContext) -> serde_json::Value {
    let config = ctx.store.snapshot();
    json!({
        "version": crate::VERSION,
        "config": config,
        "pool": {
            "running": ctx.pool.is_running(),
            "stats": ctx.pool.stats().to_json(),
        },
        "features": ctx.guards.snapshot_json(),
        "telemetry": {
            "events": ctx.telemetry.len(),
            "limit": ctx.telemetry.limit(),
        },
        "scooty": {
            "samples": ctx.scooty.len(),
        },
        "loader": {
            "services": ctx.loader.service_names(),
        },
    })
}

/// Compact single-line JSON rendition of [`report`].
pub fn dump(ctx: &OpContext) -> String {
    report(ctx).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_shape() {
        let ctx = OpContext::standalone();
        let doc = report(&ctx);
        assert_eq!(doc["version"], crate::VERSION);
        assert!(doc["config"]["traffic_boost"].is_number());
        assert_eq!(doc["pool"]["running"], false);
        assert!(doc["features"].is_array());
        assert_eq!(doc["telemetry"]["limit"], 512);
        assert!(doc["loader"]["services"]
            .as_array()
            .unwrap()
            .iter()
            .any(|s| s == "compound"));
    }

    #[test]
    fn test_dump_is_compact() {
        let ctx = OpContext::standalone();
        let text = dump(&ctx);
        assert!(!text.contains('\n'));
        assert!(serde_json::from_str::<serde_json::Value>(&text).is_ok());
    }
}
