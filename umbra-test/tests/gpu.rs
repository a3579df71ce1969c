use anyhow::{ensure, Context};
use umbra::{ShadowOptions, StencilShadowRenderer};
use umbra_test::{
    cube, init_logging, oblique_sun, test_attr, Camera, FrameRenderSettings, PixelClass, ShadowProbe, SoftwareDevice,
    TestRunner, TestScene,
};

const SIZE: u32 = 128;

fn luminance(pixel: &image::Rgba<u8>) -> f32 {
    let [r, g, b, _] = pixel.0;
    0.2126 * r as f32 + 0.7152 * g as f32 + 0.0722 * b as f32
}

#[test_attr]
pub async fn shadow_darkens_ground() -> anyhow::Result<()> {
    init_logging();

    let Ok(Some(mut runner)) = TestRunner::new().await else {
        return Ok(());
    };

    let camera = Camera::overhead();
    let light = oblique_sun();

    let renderer = StencilShadowRenderer::new(&runner.routine.capabilities(), ShadowOptions::default())?;
    let mut builder = renderer.volume_builder();
    let volume = builder.build(&cube(), &light)?;
    let mut scene = TestScene::cube_over_ground();

    let settings = FrameRenderSettings::new(camera.view_proj()).size(SIZE)?;
    let image = runner
        .render_frame(settings, |frame| {
            renderer.render_frame(frame, &mut scene, volume);
        })
        .await?;
    ensure!(runner.routine.pipeline_count() > 0, "No pipelines were created");

    // Only used for its pixel rays.
    let rays = SoftwareDevice::new(SIZE, SIZE, camera.view_proj(), runner.routine.capabilities());
    let probe = ShadowProbe::unit_cube(light);

    let (mut lit, mut shadowed) = (Vec::new(), Vec::new());
    for (x, y) in rays.pixels() {
        match probe.classify_pixel(&rays, x, y) {
            PixelClass::Ambiguous => {}
            PixelClass::Lit => lit.push(luminance(image.get_pixel(x, y))),
            PixelClass::Shadowed => shadowed.push(luminance(image.get_pixel(x, y))),
        }
    }
    ensure!(!lit.is_empty() && !shadowed.is_empty(), "Nothing to compare");

    let mean = |values: &[f32]| values.iter().sum::<f32>() / values.len() as f32;
    let (lit, shadowed) = (mean(&lit), mean(&shadowed));
    if shadowed >= lit * 0.5 {
        std::fs::create_dir_all("tests/results").context("Could not create results directory")?;
        image
            .save("tests/results/gpu-shadow-failure.png")
            .context("Could not save image")?;
    }
    ensure!(
        shadowed < lit * 0.5,
        "Shadowed ground ({shadowed}) is not darker than lit ground ({lit})"
    );

    Ok(())
}
