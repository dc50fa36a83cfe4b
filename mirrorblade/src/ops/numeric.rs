//! Operations over the numeric evaluators and loader services.

use super::{opt_f64, opt_str, opt_u64, require_str, OpContext, OpError, OpRegistry};
use crate::eval::{bernoulli, format_samples, lissajous};
use crate::telemetry::format_table;
use serde_json::json;
use std::sync::Arc;

pub fn register(registry: &OpRegistry, ctx: Arc<OpContext>) {
    register_figure8(registry, ctx.clone());
    register_jitter(registry, ctx.clone());
    register_scooty(registry, ctx.clone());
    register_telemetry(registry, ctx.clone());
    register_loader(registry, ctx.clone());
    register_underfold(registry, ctx.clone());
    register_interfold(registry, ctx);
}

fn register_figure8(registry: &OpRegistry, ctx: Arc<OpContext>) {
    registry.register("figure8.evalLissajous12", |args| {
        let t = opt_f64(args, "t", 0.0);
        let ax = opt_f64(args, "ax", 1.0);
        let ay = opt_f64(args, "ay", 1.0);
        let nx = opt_f64(args, "nx", 1.0);
        let ny = opt_f64(args, "ny", 2.0);
        let phase = opt_f64(args, "phase", 0.0);
        let (x, y) = lissajous(t, ax, ay, nx, ny, phase);
        Ok(json!({ "x": x, "y": y }))
    });

    registry.register("figure8.evalBernoulli", |args| {
        let t = opt_f64(args, "t", 0.0);
        let a = opt_f64(args, "a", 1.0);
        let (x, y) = bernoulli(t, a);
        Ok(json!({ "x": x, "y": y }))
    });

    {
        let ctx = ctx.clone();
        registry.register("figure8.advance", move |args| {
            let dt = opt_f64(args, "dt", 0.016);
            let (x, y) = ctx.figure8.advance(dt);
            Ok(json!({ "x": x, "y": y }))
        });
    }

    {
        let ctx = ctx.clone();
        registry.register("figure8.configure", move |args| {
            ctx.figure8.configure_from_json(args);
            Ok(serde_json::to_value(ctx.figure8.params())
                .map_err(|e| OpError::Failed(e.to_string()))?)
        });
    }

    registry.register("figure8.current", move |_args| {
        let (x, y) = ctx.figure8.current();
        Ok(json!({ "x": x, "y": y }))
    });
}

fn register_jitter(registry: &OpRegistry, ctx: Arc<OpContext>) {
    {
        let ctx = ctx.clone();
        registry.register("voljitter.advance", move |args| {
            let dt = opt_f64(args, "dt", 0.016);
            ctx.jitter.advance(dt);
            let (x, y) = ctx.jitter.current_jitter();
            Ok(json!({ "jitterX": x, "jitterY": y }))
        });
    }

    {
        let ctx = ctx.clone();
        registry.register("voljitter.set", move |args| {
            ctx.jitter.configure_from_json(args);
            Ok(serde_json::to_value(ctx.jitter.params())
                .map_err(|e| OpError::Failed(e.to_string()))?)
        });
    }

    registry.register("voljitter.get", move |_args| {
        Ok(json!({
            "params": serde_json::to_value(ctx.jitter.params())
                .map_err(|e| OpError::Failed(e.to_string()))?,
            "state": serde_json::to_value(ctx.jitter.state())
                .map_err(|e| OpError::Failed(e.to_string()))?,
        }))
    });
}

fn register_scooty(registry: &OpRegistry, ctx: Arc<OpContext>) {
    {
        let ctx = ctx.clone();
        registry.register("scooty.bump", move |args| {
            let v = opt_f64(args, "v", 0.0);
            ctx.scooty.bump(v);
            Ok(json!({ "count": ctx.scooty.len() }))
        });
    }

    {
        let ctx = ctx.clone();
        registry.register("scooty.samples", move |args| {
            let n = opt_u64(args, "n", 32) as usize;
            let samples = ctx.scooty.samples(n.max(1));
            Ok(json!({ "result": format_samples(&samples, "scooty samples") }))
        });
    }

    registry.register("scooty.snapshot", move |_args| {
        let stats = ctx.scooty.stats();
        Ok(serde_json::to_value(stats)
            .map_err(|e| OpError::Failed(e.to_string()))?)
    });
}

fn register_telemetry(registry: &OpRegistry, ctx: Arc<OpContext>) {
    {
        let ctx = ctx.clone();
        registry.register("telem.push", move |args| {
            let name = require_str(args, "name")?;
            let a = opt_f64(args, "a", 0.0);
            let b = opt_f64(args, "b", 0.0);
            let c = opt_f64(args, "c", 0.0);
            let tag = opt_str(args, "tag", "");
            ctx.telemetry.push(name, a, b, c, tag);
            Ok(json!({ "events": ctx.telemetry.len() }))
        });
    }

    {
        let ctx = ctx.clone();
        registry.register("telem.snapshot", move |args| {
            let max = opt_u64(args, "max", 64) as usize;
            Ok(ctx.telemetry.snapshot_json(max))
        });
    }

    registry.register("telem.table", move |args| {
        let max = opt_u64(args, "max", 32) as usize;
        let title = opt_str(args, "title", "telemetry");
        let events = ctx.telemetry.snapshot(max);
        Ok(json!({ "result": format_table(&events, title) }))
    });
}

fn register_loader(registry: &OpRegistry, ctx: Arc<OpContext>) {
    {
        let ctx = ctx.clone();
        registry.register("loader.load", move |args| {
            let config = args.get("config").cloned().unwrap_or_else(|| json!({}));
            if !config.is_object() {
                return Err(OpError::BadArgs("args.config must be an object".to_string()));
            }
            let env = args.get("env").cloned().unwrap_or_else(|| json!({}));
            ctx.loader.load(config, env);
            Ok(json!({ "loaded": true }))
        });
    }

    {
        // Repeated file-load failures auto-disable this path until a
        // feature.enable re-arms it.
        let ctx = ctx.clone();
        registry.register("loader.loadFile", move |args| {
            let path = require_str(args, "path")?;
            let env = args.get("env").cloned().unwrap_or_else(|| json!({}));
            let outcome = ctx.guards.guarded_run("loader.file", || {
                ctx.loader.load_file(std::path::Path::new(path), env.clone())
            });
            match outcome {
                None => Err(OpError::Unavailable(
                    "loader.file disabled after repeated failures".to_string(),
                )),
                Some(Ok(())) => Ok(json!({ "loaded": true, "path": path })),
                Some(Err(e)) => Err(OpError::Failed(e.to_string())),
            }
        });
    }

    {
        let ctx = ctx.clone();
        registry.register("loader.snapshot", move |_args| Ok(ctx.loader.snapshot_all()));
    }

    {
        let ctx = ctx.clone();
        registry.register("compound.get", move |args| {
            let name = require_str(args, "name")?;
            let value = ctx
                .loader
                .compound()
                .get(name)
                .ok_or_else(|| OpError::Failed(format!("unknown compound entity: {name}")))?;
            Ok(json!({ "ok": true, "result": value }))
        });
    }

    {
        let ctx = ctx.clone();
        registry.register("impound.check", move |args| {
            let name = require_str(args, "name")?;
            Ok(json!({ "ok": true, "result": ctx.loader.impound().is_impounded(name) }))
        });
    }

    {
        let ctx = ctx.clone();
        registry.register("volphi.get", move |_args| {
            Ok(serde_json::to_value(ctx.loader.volphi().get())
                .map_err(|e| OpError::Failed(e.to_string()))?)
        });
    }

    registry.register("volphi.set", move |args| {
        let live = ctx.loader.volphi().set_from_json(args);
        Ok(serde_json::to_value(live).map_err(|e| OpError::Failed(e.to_string()))?)
    });
}

fn register_underfold(registry: &OpRegistry, ctx: Arc<OpContext>) {
    {
        let ctx = ctx.clone();
        registry.register("underfold.configure", move |args| {
            ctx.underfold
                .configure_from_json(args)
                .map_err(|e| OpError::BadArgs(e.to_string()))?;
            Ok(json!({ "configured": true }))
        });
    }

    {
        let ctx = ctx.clone();
        registry.register("underfold.snapshot", move |_args| {
            Ok(ctx.underfold.snapshot_json())
        });
    }

    registry.register("underfold.eval", move |args| {
        if let Some(xs) = args.get("xs").and_then(|v| v.as_array()) {
            let inputs: Vec<f64> = xs.iter().filter_map(|v| v.as_f64()).collect();
            let outputs = ctx.underfold.evaluate_many(&inputs);
            return Ok(json!({ "ys": outputs }));
        }
        let x = opt_f64(args, "x", 0.0);
        Ok(json!({
            "y": ctx.underfold.evaluate(x),
            "dy": ctx.underfold.evaluate_derivative(x),
        }))
    });
}

fn register_interfold(registry: &OpRegistry, ctx: Arc<OpContext>) {
    {
        let ctx = ctx.clone();
        registry.register("interfold.configure", move |args| {
            ctx.interfold.configure_from_json(args);
            Ok(json!({ "configured": true }))
        });
    }

    {
        let ctx = ctx.clone();
        registry.register("interfold.step", move |args| {
            let dt = opt_f64(args, "dt", 0.016);
            let x = opt_f64(args, "x", 0.0);
            Ok(json!({ "y": ctx.interfold.step(dt, x) }))
        });
    }

    {
        let ctx = ctx.clone();
        registry.register("interfold.peek", move |args| {
            let dt = opt_f64(args, "dt", 0.016);
            let x = opt_f64(args, "x", 0.0);
            Ok(json!({ "y": ctx.interfold.peek_next(dt, x) }))
        });
    }

    registry.register("interfold.snapshot", move |_args| {
        Ok(ctx.interfold.snapshot_json())
    });
}
