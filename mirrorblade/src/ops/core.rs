//! Core operations: health, diagnostics, config access, and the runtime
//! toggles that mirror into the config store and sinks.

use super::{opt_bool, opt_f64, opt_str, require_str, OpContext, OpError, OpRegistry};
use crate::config::settings::LogLevel;
use crate::config::{load_from, save_to};
use crate::diagnostics;
use crate::sinks::UpscaleMode;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub fn register(registry: &OpRegistry, ctx: Arc<OpContext>) {
    registry.register("ping", |_args| Ok(json!({ "ok": true, "result": "pong" })));

    {
        let ctx = ctx.clone();
        registry.register("diag.dump", move |_args| {
            Ok(json!({ "ok": true, "result": diagnostics::dump(&ctx) }))
        });
    }

    {
        let ctx = ctx.clone();
        registry.register("config.reload", move |_args| {
            let cfg = load_from(&ctx.config_path);
            ctx.store.replace(cfg.clone());
            ctx.sinks.apply(&cfg);
            info!("Config reloaded");
            Ok(json!({ "ok": true }))
        });
    }

    {
        let ctx = ctx.clone();
        registry.register("config.save", move |_args| {
            match save_to(&ctx.config_path, &ctx.store.snapshot()) {
                Ok(()) => Ok(json!({ "ok": true })),
                Err(e) => Err(OpError::Failed(e.to_string())),
            }
        });
    }

    {
        let ctx = ctx.clone();
        registry.register("config.get", move |args| {
            let key = require_str(args, "key")?;
            let value = config_field(&ctx, key)
                .ok_or_else(|| OpError::BadArgs(format!("unknown config key: {key}")))?;
            Ok(json!({ "key": key, "value": value }))
        });
    }

    {
        let ctx = ctx.clone();
        registry.register("config.set", move |args| {
            let key = require_str(args, "key")?;
            let value = args
                .get("value")
                .ok_or_else(|| OpError::BadArgs("args.value required".to_string()))?;
            let stored = set_config_field(&ctx, key, value)?;
            Ok(json!({ "set": key, "value": stored }))
        });
    }

    {
        let ctx = ctx.clone();
        registry.register("upscaler.enable", move |args| {
            let enabled = opt_bool(args, "enabled", false);
            ctx.store.set_upscaler_enabled(enabled);
            ctx.sinks.upscaler.set_enabled(enabled);
            info!(enabled, "Upscaler toggled");
            Ok(json!({ "ok": true, "result": enabled }))
        });
    }

    {
        let ctx = ctx.clone();
        registry.register("upscaler.set", move |args| {
            let mode_str = opt_str(args, "mode", "off");
            let mode = UpscaleMode::parse(mode_str)
                .ok_or_else(|| OpError::BadArgs("mode must be off|fsr2".to_string()))?;
            let sharpness = opt_f64(args, "sharpness", 0.6);

            ctx.sinks.upscaler.set_mode(mode);
            let params = ctx.update_upscaler_params(|p| p.sharpness = sharpness);
            ctx.sinks.upscaler.set_params(params);
            Ok(json!({ "mode": mode.as_str(), "sharpness": sharpness }))
        });
    }

    {
        let ctx = ctx.clone();
        registry.register("graphics.target.set", move |args| {
            let width = opt_f64(args, "width", 3840.0).max(16.0) as u32;
            let height = opt_f64(args, "height", 2160.0).max(16.0) as u32;
            let params = ctx.update_upscaler_params(|p| {
                p.output_width = width;
                p.output_height = height;
            });
            ctx.sinks.upscaler.resize(params);
            Ok(json!({ "width": width, "height": height }))
        });
    }

    {
        let ctx = ctx.clone();
        registry.register("graphics.internal.scale", move |args| {
            let scale = opt_f64(args, "scale", 0.5);
            if !(0.0..=1.0).contains(&scale) {
                return Err(OpError::BadArgs("scale must be in (0,1]".to_string()));
            }
            let params = ctx.update_upscaler_params(|p| {
                p.render_width = ((p.output_width as f64 * scale).max(16.0)) as u32;
                p.render_height = ((p.output_height as f64 * scale).max(16.0)) as u32;
            });
            ctx.sinks.upscaler.resize(params);
            Ok(json!({
                "renderWidth": params.render_width,
                "renderHeight": params.render_height,
            }))
        });
    }

    {
        let ctx = ctx.clone();
        registry.register("traffic.mul", move |args| {
            let mult = opt_f64(args, "mult", 1.0);
            let stored = ctx.store.set_traffic_boost(mult);
            ctx.sinks.traffic.set_multiplier(stored);
            info!(mult = stored, "Traffic multiplier set");
            Ok(json!({ "ok": true, "result": stored }))
        });
    }

    {
        let ctx = ctx.clone();
        registry.register("feature.enable", move |args| {
            let name = require_str(args, "name")?;
            let enabled = opt_bool(args, "enabled", true);
            ctx.guards.set_enabled(name, enabled);
            Ok(json!({ "feature": name, "enabled": enabled }))
        });
    }

    {
        let ctx = ctx.clone();
        registry.register("feature.status", move |args| {
            let name = require_str(args, "name")?;
            Ok(json!({
                "feature": name,
                "enabled": ctx.guards.is_enabled(name),
                "failures": ctx.guards.failures(name),
            }))
        });
    }

    registry.register("feature.list", move |_args| Ok(ctx.guards.snapshot_json()));
}

/// Registers `ops.capabilities`. Registered last so the listing covers
/// the whole table; the handler holds a weak reference to avoid a
/// registry-to-handler cycle.
pub fn register_capabilities(registry: &Arc<OpRegistry>) {
    let weak = Arc::downgrade(registry);
    registry.register("ops.capabilities", move |_args| {
        let registry = weak
            .upgrade()
            .ok_or_else(|| OpError::Unavailable("registry shut down".to_string()))?;
        Ok(json!({ "capabilities": registry.names() }))
    });
}

fn config_field(ctx: &OpContext, key: &str) -> Option<Value> {
    match key {
        "upscaler_enabled" => Some(json!(ctx.store.upscaler_enabled())),
        "traffic_boost" => Some(json!(ctx.store.traffic_boost())),
        "ipc_enabled" => Some(json!(ctx.store.ipc_enabled())),
        "ipc_pipe_name" => Some(json!(ctx.store.ipc_pipe_name())),
        "log_level" => Some(json!(ctx.store.log_level().as_str())),
        _ => None,
    }
}

fn set_config_field(ctx: &OpContext, key: &str, value: &Value) -> Result<Value, OpError> {
    match key {
        "upscaler_enabled" => {
            let v = value
                .as_bool()
                .ok_or_else(|| OpError::BadArgs("value must be a boolean".to_string()))?;
            ctx.store.set_upscaler_enabled(v);
            ctx.sinks.upscaler.set_enabled(v);
            Ok(json!(v))
        }
        "traffic_boost" => {
            let v = value
                .as_f64()
                .ok_or_else(|| OpError::BadArgs("value must be a number".to_string()))?;
            let stored = ctx.store.set_traffic_boost(v);
            ctx.sinks.traffic.set_multiplier(stored);
            Ok(json!(stored))
        }
        "ipc_enabled" => {
            let v = value
                .as_bool()
                .ok_or_else(|| OpError::BadArgs("value must be a boolean".to_string()))?;
            ctx.store.set_ipc_enabled(v);
            Ok(json!(v))
        }
        "ipc_pipe_name" => {
            let v = value
                .as_str()
                .ok_or_else(|| OpError::BadArgs("value must be a string".to_string()))?;
            ctx.store.set_ipc_pipe_name(v);
            Ok(json!(v))
        }
        "log_level" => {
            let v = value
                .as_str()
                .ok_or_else(|| OpError::BadArgs("value must be a string".to_string()))?;
            let level = LogLevel::parse_lenient(v);
            ctx.store.set_log_level(level);
            ctx.sinks.log.set_level(level);
            Ok(json!(level.as_str()))
        }
        _ => Err(OpError::BadArgs(format!("unknown config key: {key}"))),
    }
}
