// src/main.rs
//! Headless demo: drives a few frames of material switching, variant eviction,
//! background drops and a context loss against the recording device.

use anyhow::{Context, Result};
use glam::Vec4;
use log::{error, info};

use native_sync::config::EngineConfig;
use native_sync::device::{RecordingExecutor, ShaderBinder};
use native_sync::diagnostics;
use native_sync::native::ResourceTracker;
use native_sync::shader::{
    DefineSet, DefineValue, FrameParams, ShaderProgram, StageKind, UniformBinding, UniformValue,
    VariantCache,
};

const VERT: &str = "\
in vec3 inPosition;
uniform mat4 g_WorldViewProjectionMatrix;
void main() { gl_Position = g_WorldViewProjectionMatrix * vec4(inPosition, 1.0); }
";

const FRAG: &str = "\
uniform vec4 m_Color;
uniform float g_Time;
out vec4 outColor;
void main() { outColor = m_Color; }
";

fn main() {
    diagnostics::init_logging();
    diagnostics::install_crash_hook(diagnostics::CRASH_LOG);

    if let Err(e) = run() {
        error!("Demo failed: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(&path).with_context(|| format!("loading {}", path))?,
        None => EngineConfig::default(),
    };
    info!("Starting native_sync demo with {:?}", config);

    let mut device = RecordingExecutor::new();
    let mut tracker = ResourceTracker::new(config.tracker);
    let mut binder = ShaderBinder::new();
    let mut variants = VariantCache::new(config.variants);

    let build = |defines: &DefineSet| -> native_sync::Result<ShaderProgram> {
        let mut p = ShaderProgram::new("GLSL330");
        p.add_source(StageKind::Vertex, "Unshaded.vert", VERT, defines.compiled());
        p.add_source(StageKind::Fragment, "Unshaded.frag", FRAG, defines.compiled());
        p.add_uniform_binding(UniformBinding::WorldViewProjectionMatrix);
        p.add_uniform_binding(UniformBinding::Time);
        p.get_attribute(0, "inPosition");
        Ok(p)
    };

    let mut params = FrameParams::default();
    for frame in 0..8u32 {
        params.time = frame as f32 / 60.0;
        params.tpf = 1.0 / 60.0;

        let mut defines = DefineSet::new();
        defines.set("NUM_LIGHTS", Some(DefineValue::Int(i64::from(frame % 3))));
        let program = variants.get_or_create(&defines, build)?;
        {
            let mut p = program.lock();
            p.clear_uniforms_set_by_client();
            p.get_uniform("m_Color")
                .set_value(UniformValue::Vector4(Vec4::new(1.0, 0.5, 0.25, 1.0)))?;
            p.reset_uniforms_not_set_by_client();
            p.update_uniform_bindings(&params)?;
        }
        binder.set_shader(&mut device, &mut tracker, &program)?;

        // A worker thread releasing its last handle.
        if frame == 4 {
            let scratch = build(&DefineSet::new())?.into_shared();
            binder.set_shader(&mut device, &mut tracker, &scratch)?;
            std::thread::spawn(move || drop(scratch))
                .join()
                .map_err(|_| anyhow::anyhow!("worker panicked"))?;
        }

        if frame == 6 {
            info!("Simulating context loss");
            tracker.reset_objects();
            binder.reset();
        }

        let removed = tracker.delete_unused(&mut device)?;
        info!(
            "frame {}: {} live, {} removed, {} device objects",
            frame,
            tracker.live_count(),
            removed,
            device.live_objects()
        );
    }

    variants.clear();
    let removed = tracker.delete_all_objects(&mut device)?;
    info!("Shutdown removed {} objects", removed);
    info!("Tracker stats: {:?}", tracker.stats());
    info!("Render stats: {:?}", binder.stats());
    info!("Variant stats: {:?}", variants.stats());
    Ok(())
}
