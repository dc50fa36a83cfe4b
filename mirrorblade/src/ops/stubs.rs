//! Stub operations: world, vehicle, NPC, UI, and time control.
//!
//! These validate their inputs and return structured echoes so external
//! tooling gets deterministic feedback; wiring them to real host systems
//! is out of scope for the sidecar. They are part of the public surface
//! and appear in `ops.capabilities`.

use super::{opt_bool, opt_f64, opt_str, OpContext, OpError, OpRegistry};
use crate::pool::Lane;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

pub fn register(registry: &OpRegistry, ctx: Arc<OpContext>) {
    register_ui(registry, ctx.clone());
    register_time(registry);
    register_traffic(registry);
    register_npc(registry);
    register_vehicle(registry);
    register_av(registry);
    register_train(registry);
    register_player(registry);
    register_world(registry);
    register_debug(registry, ctx);
}

fn register_ui(registry: &OpRegistry, ctx: Arc<OpContext>) {
    {
        let ctx = ctx.clone();
        registry.register("ui.toast", move |args| {
            let text = args
                .get("text")
                .and_then(|t| t.as_str())
                .ok_or_else(|| OpError::BadArgs("args.text required".to_string()))?
                .to_string();
            let ms = opt_f64(args, "ms", 2000.0) as i64;
            if ms <= 0 {
                return Err(OpError::BadArgs("ms must be > 0".to_string()));
            }
            // Display work is deferred; the echo confirms queuing.
            let queued = ctx.pool.enqueue(Lane::Low, move || {
                info!(text = %text, ms, "[toast]");
            });
            Ok(json!({ "status": if queued { "shown" } else { "dropped" }, "ms": ms }))
        });
    }

    registry.register("ui.alert", |args| {
        let text = opt_str(args, "text", "Alert");
        let ms = opt_f64(args, "ms", 2000.0) as i64;
        Ok(json!({ "type": "alert", "text": text, "ms": ms }))
    });

    registry.register("ui.marker.add", |args| {
        let pos = args.get("pos").cloned().unwrap_or_else(|| json!({}));
        let tag = opt_str(args, "tag", "marker");
        Ok(json!({ "marker": "added", "tag": tag, "pos": pos }))
    });

    registry.register("ui.marker.remove", |args| {
        let tag = opt_str(args, "tag", "marker");
        Ok(json!({ "marker": "removed", "tag": tag }))
    });

    registry.register("ui.hud.toggle", |args| {
        let visible = opt_bool(args, "visible", true);
        Ok(json!({ "hudVisible": visible }))
    });
}

fn register_time(registry: &OpRegistry) {
    registry.register("timescale.set", |args| {
        let scale = args
            .get("scale")
            .and_then(|s| s.as_f64())
            .ok_or_else(|| OpError::BadArgs("args.scale required".to_string()))?;
        if scale <= 0.0 || scale > 10.0 {
            return Err(OpError::BadArgs("scale out of range (0,10]".to_string()));
        }
        Ok(json!({ "scale": scale }))
    });

    registry.register("time.set", |args| {
        let hour = opt_f64(args, "hour", 12.0) as i64;
        let minute = opt_f64(args, "minute", 0.0) as i64;
        if !(0..24).contains(&hour) || !(0..60).contains(&minute) {
            return Err(OpError::BadArgs("time out of range".to_string()));
        }
        Ok(json!({ "timeSet": true, "hour": hour, "minute": minute }))
    });

    registry.register("time.pause", |_args| Ok(json!({ "time": "paused" })));
    registry.register("time.resume", |_args| Ok(json!({ "time": "resumed" })));

    registry.register("weather.set", |args| {
        let preset = opt_str(args, "preset", "Clear");
        let blend = opt_f64(args, "blend", 1.0);
        Ok(json!({ "weatherPreset": preset, "blend": blend }))
    });
}

fn register_traffic(registry: &OpRegistry) {
    registry.register("traffic.clear", |_args| Ok(json!({ "traffic": "cleared" })));
    registry.register("traffic.freeze", |_args| Ok(json!({ "traffic": "frozen" })));
    registry.register("traffic.unfreeze", |_args| Ok(json!({ "traffic": "unfrozen" })));

    registry.register("traffic.route", |args| {
        let route = args.get("route").cloned().unwrap_or_else(|| json!([]));
        Ok(json!({ "trafficRoute": route }))
    });

    registry.register("traffic.persist", |args| {
        let enabled = opt_bool(args, "enabled", true);
        Ok(json!({ "persist": enabled }))
    });
}

fn register_npc(registry: &OpRegistry) {
    registry.register("npc.freeze", |_args| Ok(json!({ "npc": "frozen" })));
    registry.register("npc.unfreeze", |_args| Ok(json!({ "npc": "unfrozen" })));

    registry.register("npc.spawn", |args| {
        let id = opt_str(args, "id", "npc_default");
        Ok(json!({ "npc": id, "spawned": true }))
    });

    registry.register("npc.despawn", |args| {
        let id = opt_str(args, "id", "npc_default");
        Ok(json!({ "npc": id, "despawned": true }))
    });

    registry.register("npc.teleport", |args| {
        let pos = args.get("pos").cloned().unwrap_or_else(|| json!({}));
        Ok(json!({ "npc": "teleported", "pos": pos }))
    });
}

fn register_vehicle(registry: &OpRegistry) {
    registry.register("vehicle.spawn", |args| {
        let id = opt_str(args, "id", "Vehicle.v_default");
        Ok(json!({ "vehicle": id, "spawned": true }))
    });

    registry.register("vehicle.despawn", |args| {
        let id = opt_str(args, "id", "Vehicle.v_default");
        Ok(json!({ "vehicle": id, "despawned": true }))
    });

    registry.register("vehicle.boost", |args| {
        let factor = opt_f64(args, "factor", 2.0);
        Ok(json!({ "boostFactor": factor }))
    });

    registry.register("vehicle.paint", |args| {
        let color = opt_str(args, "color", "red");
        Ok(json!({ "painted": true, "color": color }))
    });

    registry.register("vehicle.repair", |_args| Ok(json!({ "vehicle": "repaired" })));
}

fn register_av(registry: &OpRegistry) {
    registry.register("av.spawn", |args| {
        let id = opt_str(args, "id", "AV.default");
        Ok(json!({ "av": id, "spawned": true }))
    });

    registry.register("av.route.set", |args| {
        let points = args.get("points").cloned().unwrap_or_else(|| json!([]));
        Ok(json!({ "avRoute": points }))
    });

    registry.register("av.despawn", |args| {
        let id = opt_str(args, "id", "AV.default");
        Ok(json!({ "av": id, "despawned": true }))
    });

    registry.register("av.land", |_args| Ok(json!({ "av": "landed" })));
    registry.register("av.takeoff", |_args| Ok(json!({ "av": "takeoff" })));
}

fn register_train(registry: &OpRegistry) {
    registry.register("train.persist", |args| {
        let enabled = opt_bool(args, "enabled", true);
        Ok(json!({ "trainPersist": enabled }))
    });

    registry.register("train.spawn", |args| {
        let id = opt_str(args, "id", "train_default");
        Ok(json!({ "train": id, "spawned": true }))
    });

    registry.register("train.despawn", |args| {
        let id = opt_str(args, "id", "train_default");
        Ok(json!({ "train": id, "despawned": true }))
    });

    registry.register("train.freeze", |_args| Ok(json!({ "train": "frozen" })));
    registry.register("train.unfreeze", |_args| Ok(json!({ "train": "unfrozen" })));
}

fn register_player(registry: &OpRegistry) {
    registry.register("player.teleport", |args| {
        let pos = args.get("pos").cloned().unwrap_or_else(|| json!({}));
        let yaw = opt_f64(args, "yaw", 0.0);
        Ok(json!({ "teleported": true, "pos": pos, "yaw": yaw }))
    });

    registry.register("player.heal", |args| {
        let amount = opt_f64(args, "amount", 100.0);
        Ok(json!({ "healed": amount }))
    });

    registry.register("player.damage", |args| {
        let amount = opt_f64(args, "amount", 10.0);
        let kind = opt_str(args, "type", "generic");
        Ok(json!({ "damaged": amount, "type": kind }))
    });

    registry.register("player.inventory.add", |args| {
        let item = opt_str(args, "item", "Item.Default");
        let count = opt_f64(args, "count", 1.0) as i64;
        Ok(json!({ "added": item, "count": count }))
    });

    registry.register("player.inventory.remove", |args| {
        let item = opt_str(args, "item", "Item.Default");
        let count = opt_f64(args, "count", 1.0) as i64;
        Ok(json!({ "removed": item, "count": count }))
    });
}

fn register_world(registry: &OpRegistry) {
    registry.register("lod.pin", |args| {
        let ttl = opt_f64(args, "ttl", 3000.0) as i64;
        let tag = opt_str(args, "tag", "default");
        Ok(json!({ "pinned": true, "ttl": ttl, "tag": tag }))
    });

    registry.register("world.spawn.explosion", |args| {
        let pos = args.get("pos").cloned().unwrap_or_else(|| json!({}));
        let radius = opt_f64(args, "radius", 5.0);
        let power = opt_f64(args, "power", 1.0);
        Ok(json!({ "explosion": "queued", "pos": pos, "radius": radius, "power": power }))
    });

    registry.register("world.light.spawn", |args| {
        let pos = args.get("pos").cloned().unwrap_or_else(|| json!({}));
        let intensity = opt_f64(args, "intensity", 1000.0);
        let color = opt_str(args, "color", "#FFFFFF");
        let tag = opt_str(args, "tag", "light1");
        Ok(json!({
            "light": "spawned", "tag": tag, "pos": pos,
            "intensity": intensity, "color": color,
        }))
    });

    registry.register("world.light.remove", |args| {
        let tag = opt_str(args, "tag", "light1");
        Ok(json!({ "light": "removed", "tag": tag }))
    });

    registry.register("world.streamgrid.recenter", |args| {
        let pos = args.get("pos").cloned().unwrap_or_else(|| json!({}));
        let mode = opt_str(args, "mode", "auto");
        Ok(json!({ "streamgrid": "recentered", "mode": mode, "pos": pos }))
    });

    registry.register("world.lod.lock", |args| {
        let ttl = opt_f64(args, "ttl", 3000.0) as i64;
        let tag = opt_str(args, "tag", "lodlock");
        Ok(json!({ "lodLocked": true, "ttl": ttl, "tag": tag }))
    });

    registry.register("world.lod.unlock", |args| {
        let tag = opt_str(args, "tag", "lodlock");
        Ok(json!({ "lodLocked": false, "tag": tag }))
    });
}

fn register_debug(registry: &OpRegistry, ctx: Arc<OpContext>) {
    registry.register("debug.log", move |args| {
        let level = opt_str(args, "level", "info").to_string();
        let msg = opt_str(args, "msg", "(empty)").to_string();
        debug!(level = %level, msg = %msg, "[debug.log]");
        ctx.telemetry.push("debug.log", 0.0, 0.0, 0.0, &level);
        Ok(json!({ "logged": true, "level": level, "msg": msg }))
    });

    registry.register("debug.capture.screenshot", |args| {
        let path = opt_str(args, "path", "screenshot.png");
        Ok(json!({ "screenshot": "queued", "path": path }))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_stubs() -> OpRegistry {
        let registry = OpRegistry::new();
        let ctx = OpContext::standalone();
        register(&registry, ctx);
        registry
    }

    #[test]
    fn test_toast_requires_text() {
        let registry = registry_with_stubs();
        let reply = registry.dispatch("ui.toast", &json!({}));
        assert_eq!(reply["ok"], false);

        let reply = registry.dispatch("ui.toast", &json!({"text": "hi", "ms": -1}));
        assert_eq!(reply["ok"], false);
    }

    #[test]
    fn test_toast_echoes_status() {
        let registry = registry_with_stubs();
        let reply = registry.dispatch("ui.toast", &json!({"text": "hi"}));
        assert_eq!(reply["ok"], true);
        assert_eq!(reply["result"]["ms"], 2000);
        // The standalone context's pool is not running, so the deferred
        // display is reported dropped rather than shown.
        assert_eq!(reply["result"]["status"], "dropped");
    }

    #[test]
    fn test_timescale_validates_range() {
        let registry = registry_with_stubs();
        let reply = registry.dispatch("timescale.set", &json!({"scale": 2.0}));
        assert_eq!(reply["result"]["scale"], 2.0);

        for bad in [0.0, -1.0, 11.0] {
            let reply = registry.dispatch("timescale.set", &json!({"scale": bad}));
            assert_eq!(reply["ok"], false, "scale {bad} should be rejected");
        }

        let reply = registry.dispatch("timescale.set", &json!({}));
        assert_eq!(reply["ok"], false);
    }

    #[test]
    fn test_time_set_validates_range() {
        let registry = registry_with_stubs();
        let reply = registry.dispatch("time.set", &json!({"hour": 23, "minute": 59}));
        assert_eq!(reply["result"]["timeSet"], true);

        let reply = registry.dispatch("time.set", &json!({"hour": 24}));
        assert_eq!(reply["ok"], false);
    }

    #[test]
    fn test_structured_echoes() {
        let registry = registry_with_stubs();

        let reply = registry.dispatch("npc.spawn", &json!({"id": "npc_guard"}));
        assert_eq!(reply["result"]["npc"], "npc_guard");
        assert_eq!(reply["result"]["spawned"], true);

        let reply = registry.dispatch("vehicle.boost", &json!({"factor": 3.5}));
        assert_eq!(reply["result"]["boostFactor"], 3.5);

        let reply = registry.dispatch("traffic.persist", &json!({"enabled": false}));
        assert_eq!(reply["result"]["persist"], false);

        let reply = registry.dispatch("world.lod.lock", &json!({}));
        assert_eq!(reply["result"]["lodLocked"], true);
        assert_eq!(reply["result"]["tag"], "lodlock");

        let reply = registry.dispatch("av.route.set", &json!({"points": [[0, 1]]}));
        assert_eq!(reply["result"]["avRoute"][0][1], 1);
    }

    #[test]
    fn test_full_stub_surface_registered() {
        let registry = registry_with_stubs();
        for op in [
            "ui.toast",
            "ui.alert",
            "ui.marker.add",
            "ui.marker.remove",
            "ui.hud.toggle",
            "timescale.set",
            "time.set",
            "time.pause",
            "time.resume",
            "weather.set",
            "traffic.clear",
            "traffic.freeze",
            "traffic.unfreeze",
            "traffic.route",
            "traffic.persist",
            "npc.freeze",
            "npc.unfreeze",
            "npc.spawn",
            "npc.despawn",
            "npc.teleport",
            "vehicle.spawn",
            "vehicle.despawn",
            "vehicle.boost",
            "vehicle.paint",
            "vehicle.repair",
            "av.spawn",
            "av.route.set",
            "av.despawn",
            "av.land",
            "av.takeoff",
            "train.persist",
            "train.spawn",
            "train.despawn",
            "train.freeze",
            "train.unfreeze",
            "player.teleport",
            "player.heal",
            "player.damage",
            "player.inventory.add",
            "player.inventory.remove",
            "lod.pin",
            "world.spawn.explosion",
            "world.light.spawn",
            "world.light.remove",
            "world.streamgrid.recenter",
            "world.lod.lock",
            "world.lod.unlock",
            "debug.log",
            "debug.capture.screenshot",
        ] {
            assert!(registry.exists(op), "missing op: {op}");
        }
    }

    #[test]
    fn test_debug_log_records_telemetry() {
        let registry = OpRegistry::new();
        let ctx = OpContext::standalone();
        register(&registry, ctx.clone());

        registry.dispatch("debug.log", &json!({"level": "warn", "msg": "careful"}));
        assert_eq!(ctx.telemetry.len(), 1);
        assert_eq!(ctx.telemetry.snapshot(1)[0].tag, "warn");
    }
}
