use anyhow::{ensure, Result};
use glam::{Vec3, Vec4};
use umbra::{
    types::{CompareFunction, DeviceCapabilities, Extrusion, Light, RenderState, StencilMethod},
    CapabilityError, CompositeMode, FramePhase, FrameReport, ShadowError, ShadowOptions, ShadowVolumeBuilder,
    StencilShadowRenderer,
};
use umbra_test::{
    cube, init_logging, oblique_sun, save_failure, Camera, PixelClass, ShadowProbe, ShadowTally, SoftwareDevice,
    test_attr, TestScene, AMBIENT_COLOR, LIT_COLOR,
};

const SIZE: u32 = 128;

const FULL: DeviceCapabilities = DeviceCapabilities {
    stencil_bits: 8,
    two_sided_stencil: true,
};
const ONE_SIDED: DeviceCapabilities = DeviceCapabilities {
    stencil_bits: 8,
    two_sided_stencil: false,
};

fn render(
    options: ShadowOptions,
    capabilities: DeviceCapabilities,
    camera: Camera,
    light: Light,
) -> Result<(SoftwareDevice, FrameReport)> {
    init_logging();

    let mut device = SoftwareDevice::new(SIZE, SIZE, camera.view_proj(), capabilities);
    device.clear(Vec4::ZERO);

    let renderer = StencilShadowRenderer::new(&capabilities, options)?;
    let mut builder = renderer.volume_builder();
    let mut scene = TestScene::cube_over_ground();

    let volume = builder.build(&cube(), &light)?;
    let report = renderer.render_frame(&mut device, &mut scene, volume);
    Ok((device, report))
}

fn check_against_probe(name: &str, device: &SoftwareDevice, probe: &ShadowProbe) -> Result<ShadowTally> {
    let tally = ShadowTally::of(device, probe);
    if tally.wrong != 0 || tally.lit < 100 || tally.shadowed < 20 {
        save_failure(device, name)?;
    }
    ensure!(tally.wrong == 0, "{name}: {tally:?}");
    ensure!(tally.lit >= 100, "{name}: too few lit pixels to judge, {tally:?}");
    ensure!(tally.shadowed >= 20, "{name}: too few shadowed pixels to judge, {tally:?}");
    Ok(tally)
}

fn point_light() -> Light {
    Light::Point {
        position: Vec3::new(0.5, 4.0, 0.5),
    }
}

fn z_fail_options() -> ShadowOptions {
    ShadowOptions {
        method: Some(StencilMethod::ZFail),
        extrusion: Extrusion::Finite { distance: 10.0 },
        ..ShadowOptions::default()
    }
}

#[test_attr]
pub async fn every_method_matches_ray_traced_shadow() -> Result<()> {
    let extrusions = [Extrusion::Finite { distance: 10.0 }, Extrusion::Infinite];

    for method in StencilMethod::ARRAY {
        for capabilities in [FULL, ONE_SIDED] {
            if method.requires_two_sided_stencil() && !capabilities.two_sided_stencil {
                continue;
            }
            for extrusion in extrusions {
                let options = ShadowOptions {
                    method: Some(method),
                    extrusion,
                    ..ShadowOptions::default()
                };
                let (device, _) = render(options, capabilities, Camera::overhead(), oblique_sun())?;
                let name = format!("{method:?}-{}-{extrusion:?}", capabilities.two_sided_stencil);
                check_against_probe(&name, &device, &ShadowProbe::unit_cube(oblique_sun()))?;
            }
        }
    }
    Ok(())
}

#[test_attr]
pub async fn point_light_shadow() -> Result<()> {
    for method in StencilMethod::ARRAY {
        let options = ShadowOptions {
            method: Some(method),
            ..ShadowOptions::default()
        };
        let (device, _) = render(options, FULL, Camera::overhead(), point_light())?;
        check_against_probe(
            &format!("point-{method:?}"),
            &device,
            &ShadowProbe::unit_cube(point_light()),
        )?;
    }
    Ok(())
}

#[test_attr]
pub async fn camera_inside_volume_needs_z_fail() -> Result<()> {
    let probe = ShadowProbe::unit_cube(oblique_sun());
    let options = |method| ShadowOptions {
        method: Some(method),
        extrusion: Extrusion::Infinite,
        ..ShadowOptions::default()
    };

    let (device, _) = render(options(StencilMethod::ZFail), FULL, Camera::under_cube(), oblique_sun())?;
    check_against_probe("inside-z-fail", &device, &probe)?;

    // Depth-pass counting is off by one for every pixel once the eye is in
    // the volume.
    let (device, _) = render(
        options(StencilMethod::TwoPassZPass),
        FULL,
        Camera::under_cube(),
        oblique_sun(),
    )?;
    let tally = ShadowTally::of(&device, &probe);
    ensure!(tally.wrong > tally.lit + tally.shadowed, "{tally:?}");
    Ok(())
}

#[test_attr]
pub async fn stencil_counts_balance() -> Result<()> {
    let probe = ShadowProbe::unit_cube(oblique_sun());
    for method in StencilMethod::ARRAY {
        let options = ShadowOptions {
            method: Some(method),
            extrusion: Extrusion::Infinite,
            ..ShadowOptions::default()
        };
        let (device, _) = render(options, FULL, Camera::overhead(), oblique_sun())?;

        for (x, y) in device.pixels() {
            let expected = match probe.classify_pixel(&device, x, y) {
                PixelClass::Ambiguous => continue,
                PixelClass::Lit => 0,
                PixelClass::Shadowed => 1,
            };
            ensure!(
                device.stencil_net_at(x, y) == expected,
                "{method:?}: pixel ({x}, {y}) counted {} instead of {expected}",
                device.stencil_net_at(x, y)
            );
        }
    }
    Ok(())
}

#[test_attr]
pub async fn composite_colors() -> Result<()> {
    let probe = ShadowProbe::unit_cube(oblique_sun());

    let (overlay, _) = render(ShadowOptions::default(), FULL, Camera::overhead(), oblique_sun())?;
    let (ambient, _) = render(
        ShadowOptions {
            composite: CompositeMode::AmbientScene,
            ..ShadowOptions::default()
        },
        FULL,
        Camera::overhead(),
        oblique_sun(),
    )?;

    let darkened = AMBIENT_COLOR.truncate() * (1.0 - ShadowOptions::default().shadow_color.w);
    for (x, y) in overlay.pixels() {
        match probe.classify_pixel(&overlay, x, y) {
            PixelClass::Ambiguous => {}
            PixelClass::Lit => {
                assert_eq!(overlay.color_at(x, y), LIT_COLOR);
                assert_eq!(ambient.color_at(x, y), LIT_COLOR);
            }
            PixelClass::Shadowed => {
                assert!(overlay.color_at(x, y).truncate().abs_diff_eq(darkened, 1e-5));
                assert_eq!(ambient.color_at(x, y), AMBIENT_COLOR);
            }
        }
    }
    Ok(())
}

#[test_attr]
pub async fn caller_state_survives_the_frame() -> Result<()> {
    let capabilities = FULL;
    let mut device = SoftwareDevice::new(SIZE, SIZE, Camera::overhead().view_proj(), capabilities);
    let caller_state = RenderState {
        depth_compare: CompareFunction::GreaterEqual,
        cull_mode: None,
        ..RenderState::default()
    };
    umbra::RenderContext::set_render_state(&mut device, &caller_state);

    let options = ShadowOptions {
        debug_volume: true,
        ..ShadowOptions::default()
    };
    let renderer = StencilShadowRenderer::new(&capabilities, options)?;
    let mut builder = renderer.volume_builder();
    let volume = builder.build(&cube(), &oblique_sun())?;
    renderer.render_frame(&mut device, &mut TestScene::cube_over_ground(), volume);

    assert_eq!(umbra::RenderContext::render_state(&device), caller_state);
    Ok(())
}

#[test_attr]
pub async fn shadow_survives_unordered_caller_depth_state() -> Result<()> {
    init_logging();
    let probe = ShadowProbe::unit_cube(oblique_sun());
    let caller_states = [
        RenderState {
            depth_compare: CompareFunction::Always,
            ..RenderState::default()
        },
        RenderState {
            depth_write: false,
            ..RenderState::default()
        },
    ];

    for caller_state in caller_states {
        for method in StencilMethod::ARRAY {
            let mut device = SoftwareDevice::new(SIZE, SIZE, Camera::overhead().view_proj(), FULL);
            device.clear(Vec4::ZERO);
            umbra::RenderContext::set_render_state(&mut device, &caller_state);

            let options = ShadowOptions {
                method: Some(method),
                ..ShadowOptions::default()
            };
            let renderer = StencilShadowRenderer::new(&FULL, options)?;
            let mut builder = renderer.volume_builder();
            let volume = builder.build(&cube(), &oblique_sun())?;
            renderer.render_frame(&mut device, &mut TestScene::cube_over_ground(), volume);

            let name = format!("caller-state-{method:?}-{:?}", caller_state.depth_compare);
            check_against_probe(&name, &device, &probe)?;
            assert_eq!(umbra::RenderContext::render_state(&device), caller_state);
        }
    }
    Ok(())
}

#[test_attr]
pub async fn z_fail_skips_uncapped_volume() -> Result<()> {
    init_logging();
    let renderer = StencilShadowRenderer::new(&FULL, z_fail_options())?;

    let mut device = SoftwareDevice::new(SIZE, SIZE, Camera::overhead().view_proj(), FULL);
    device.clear(Vec4::ZERO);
    let mut uncapped = ShadowVolumeBuilder::new(Extrusion::Finite { distance: 10.0 }, false);
    let volume = uncapped.build(&cube(), &point_light())?;
    ensure!(!volume.is_empty() && volume.cap_vertex_count() == 0);

    let report = renderer.render_frame(&mut device, &mut TestScene::cube_over_ground(), volume);

    assert_eq!(
        report.skipped_shadow,
        Some(ShadowError::UncappedVolume {
            method: StencilMethod::ZFail
        })
    );
    assert!(!report.phases.contains(&FramePhase::StencilAccumulate));
    assert!(device.stencil().iter().all(|&s| s == 0));

    // The same light with the renderer's own capped volume is counted.
    let (device, report) = render(z_fail_options(), FULL, Camera::overhead(), point_light())?;
    assert_eq!(report.skipped_shadow, None);
    check_against_probe("z-fail-capped", &device, &ShadowProbe::unit_cube(point_light()))?;
    Ok(())
}

#[test_attr]
pub async fn debug_overlay_leaves_stencil_alone() -> Result<()> {
    let (plain, plain_report) = render(ShadowOptions::default(), FULL, Camera::overhead(), oblique_sun())?;
    let (debug, debug_report) = render(
        ShadowOptions {
            debug_volume: true,
            ..ShadowOptions::default()
        },
        FULL,
        Camera::overhead(),
        oblique_sun(),
    )?;

    assert_eq!(plain.stencil(), debug.stencil());
    assert!(plain
        .pixels()
        .any(|(x, y)| plain.color_at(x, y) != debug.color_at(x, y)));
    assert_eq!(plain_report.phases.last(), Some(&FramePhase::LitPass));
    assert_eq!(debug_report.phases.last(), Some(&FramePhase::DebugVolumeOverlay));
    Ok(())
}

#[test_attr]
pub async fn failed_volume_renders_unshadowed() -> Result<()> {
    init_logging();
    let mut device = SoftwareDevice::new(SIZE, SIZE, Camera::overhead().view_proj(), FULL);
    device.clear(Vec4::ZERO);

    let options = ShadowOptions {
        max_volume_vertices: 6,
        ..ShadowOptions::default()
    };
    let renderer = StencilShadowRenderer::new(&FULL, options)?;
    let mut builder = renderer.volume_builder();
    let report = renderer.render_frame_or_skip(
        &mut device,
        &mut TestScene::cube_over_ground(),
        &mut builder,
        &cube(),
        &oblique_sun(),
    );

    assert_eq!(
        report.skipped_shadow,
        Some(ShadowError::VolumeTooLarge {
            vertices: 36,
            limit: 6
        })
    );
    assert!(!report.phases.contains(&FramePhase::StencilAccumulate));
    assert!(device.stencil().iter().all(|&s| s == 0));

    let probe = ShadowProbe::unit_cube(oblique_sun());
    for (x, y) in device.pixels() {
        if probe.classify_pixel(&device, x, y) != PixelClass::Ambiguous {
            assert_eq!(device.color_at(x, y), LIT_COLOR);
        }
    }
    Ok(())
}

#[test_attr]
pub async fn capability_checks() {
    let no_stencil = DeviceCapabilities {
        stencil_bits: 0,
        two_sided_stencil: true,
    };
    assert_eq!(
        StencilShadowRenderer::new(&no_stencil, ShadowOptions::default()).unwrap_err(),
        CapabilityError::MissingStencilBuffer
    );

    let two_sided = ShadowOptions {
        method: Some(StencilMethod::SinglePassTwoSidedStencil),
        ..ShadowOptions::default()
    };
    assert_eq!(
        StencilShadowRenderer::new(&ONE_SIDED, two_sided).unwrap_err(),
        CapabilityError::MissingTwoSidedStencil {
            method: StencilMethod::SinglePassTwoSidedStencil
        }
    );

    let auto = StencilShadowRenderer::new(&ONE_SIDED, ShadowOptions::default()).unwrap();
    assert_eq!(auto.method(), StencilMethod::TwoPassZPass);
    let auto = StencilShadowRenderer::new(&FULL, ShadowOptions::default()).unwrap();
    assert_eq!(auto.method(), StencilMethod::SinglePassTwoSidedStencil);
}
