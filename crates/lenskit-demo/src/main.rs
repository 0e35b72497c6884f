//! Headless lens flare preview.
//!
//! Drives both effects over a few frames for one or more cameras and logs the
//! pass lists they emit along with render target statistics. Runs against a
//! real wgpu device when an adapter is available and falls back to a tracking
//! allocator otherwise.

use clap::Parser;
use lenskit_config::{CliArgs, Config, default_config_dir};
use lenskit_math::Matrix2x2;
use lenskit_render::{
    AnamorphicEffect, CameraView, CommandList, GpuTargetAllocator, HostTexture, PostProcessEffect,
    ProgramRegistry, RadialWarpAndGhostsEffect, TargetAllocator, TextureRef, TrackingAllocator,
};
use tracing::{debug, info, warn};

/// Host textures the preview pretends to own: the frame, a scratch copy and
/// the final output.
const FRAME: HostTexture = HostTexture(1);
const SCRATCH: HostTexture = HostTexture(2);
const OUTPUT: HostTexture = HostTexture(3);

/// Totals gathered over a preview run.
#[derive(Debug, Default, PartialEq, Eq)]
struct PreviewSummary {
    pass_lists: usize,
    passes: usize,
}

fn request_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    pollster::block_on(async {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok()?;
        info!("Using adapter: {}", adapter.get_info().name);
        let required_features =
            adapter.features() & wgpu::Features::RG11B10UFLOAT_RENDERABLE;
        adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("lenskit-preview"),
                required_features,
                ..Default::default()
            })
            .await
            .ok()
    })
}

fn build_effects(config: &Config) -> Vec<Box<dyn PostProcessEffect>> {
    let format = config.render.target_format;
    vec![
        Box::new(AnamorphicEffect::new(config.anamorphic.clone()).with_format(format)),
        Box::new(RadialWarpAndGhostsEffect::new(config.radial_warp.clone()).with_format(format)),
    ]
}

fn preview_cameras(config: &Config) -> Vec<CameraView> {
    let preview = &config.preview;
    (0..preview.cameras.max(1))
        .map(|i| {
            let camera = CameraView::new(u64::from(i), preview.width, preview.height);
            if preview.interactive {
                camera
            } else {
                camera.preview()
            }
        })
        .collect()
}

/// Run every configured frame for every camera, chaining active effects
/// from the frame texture to the output texture.
fn run_preview(allocator: &mut dyn TargetAllocator, config: &Config) -> PreviewSummary {
    let mut programs = ProgramRegistry::with_lens_flares();
    let mut effects = build_effects(config);
    for effect in &mut effects {
        effect.setup(&mut programs);
    }

    let cameras = preview_cameras(config);
    let mut sink = CommandList::new();
    let mut summary = PreviewSummary::default();

    for frame in 0..config.preview.frames {
        for camera in &cameras {
            let active: Vec<usize> = effects
                .iter()
                .enumerate()
                .filter(|(_, effect)| effect.is_active())
                .map(|(i, _)| i)
                .collect();
            if active.is_empty() {
                debug!("Frame {frame}, camera {:?}: no active effects", camera.id);
                continue;
            }

            let mut source = TextureRef::from(FRAME);
            for (n, &i) in active.iter().enumerate() {
                let destination = if n + 1 == active.len() {
                    TextureRef::from(OUTPUT)
                } else if source == TextureRef::from(SCRATCH) {
                    TextureRef::from(FRAME)
                } else {
                    TextureRef::from(SCRATCH)
                };
                effects[i].render(allocator, &mut sink, camera, source, destination);
                source = destination;
            }
        }

        info!(
            "Frame {frame}: {} pass lists, {} passes",
            sink.lists().len(),
            sink.total_passes()
        );
        for list in sink.lists() {
            debug!("  {}", list.labels().join(" -> "));
        }
        summary.pass_lists += sink.lists().len();
        summary.passes += sink.total_passes();
        sink.clear();
    }

    for effect in &mut effects {
        effect.cleanup(&mut programs, allocator);
    }
    if programs.total_references() != 0 {
        warn!(
            "{} program references still held after cleanup",
            programs.total_references()
        );
    }
    summary
}

fn main() {
    let args = CliArgs::parse();

    // Resolve config directory
    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    lenskit_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    info!(
        "Previewing {} camera(s) at {}x{} for {} frame(s)",
        config.preview.cameras, config.preview.width, config.preview.height, config.preview.frames
    );
    info!(
        "Streak rotation for {} degrees: {}",
        config.anamorphic.direction,
        Matrix2x2::rotation(-config.anamorphic.direction)
    );

    match request_device() {
        Some((device, _queue)) => {
            let mut allocator = GpuTargetAllocator::new(&device);
            let summary = run_preview(&mut allocator, &config);
            info!(
                "GPU preview: {} pass lists, {} passes, {} textures still live",
                summary.pass_lists,
                summary.passes,
                allocator.live_count()
            );
        }
        None => {
            warn!("No GPU adapter available, previewing with a tracking allocator");
            let mut allocator = TrackingAllocator::new();
            let summary = run_preview(&mut allocator, &config);
            info!(
                "Preview: {} pass lists, {} passes, {} allocations, {} releases, {} live",
                summary.pass_lists,
                summary.passes,
                allocator.allocations(),
                allocator.releases(),
                allocator.live_count()
            );
        }
    }
}
