use anyhow::{ensure, Context, Result};
use glam::Mat4;
use umbra_routine::{ShadowFrame, ShadowFrameFinishArgs, ShadowVolumeRoutine};
use wgpu::{
    Color, Device, Extent3d, ImageCopyBuffer, ImageDataLayout, Queue, TextureDescriptor, TextureDimension,
    TextureFormat, TextureUsages,
};

const COLOR_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth24PlusStencil8;

pub struct FrameRenderSettings {
    size: u32,
    view_proj: Mat4,
    clear_color: Color,
}

impl FrameRenderSettings {
    pub fn new(view_proj: Mat4) -> Self {
        Self {
            size: 64,
            view_proj,
            clear_color: Color::BLACK,
        }
    }

    pub fn size(mut self, size: u32) -> Result<Self> {
        ensure!(size % 64 == 0, "Size must be a multiple of 64, is {}", size);
        self.size = size;
        Ok(self)
    }

    pub fn clear_color(mut self, clear_color: Color) -> Self {
        self.clear_color = clear_color;
        self
    }
}

/// Renders frames with [`ShadowVolumeRoutine`] on a real adapter and reads
/// them back.
pub struct TestRunner {
    pub device: Device,
    pub queue: Queue,
    pub routine: ShadowVolumeRoutine,
}

impl TestRunner {
    /// `Ok(None)` when there is no adapter to test on.
    pub async fn new() -> Result<Option<Self>> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let Some(adapter) = instance.request_adapter(&wgpu::RequestAdapterOptions::default()).await else {
            return Ok(None);
        };

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("umbra test device"),
                    required_features: adapter.features() & wgpu::Features::POLYGON_MODE_LINE,
                    required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .context("Device creation failed")?;

        let routine = ShadowVolumeRoutine::new(&device, COLOR_FORMAT, DEPTH_FORMAT);

        Ok(Some(Self { device, queue, routine }))
    }

    /// Records a frame through `record` and returns the color target.
    pub async fn render_frame(
        &mut self,
        settings: FrameRenderSettings,
        record: impl FnOnce(&mut ShadowFrame<'_>),
    ) -> Result<image::RgbaImage> {
        let size = Extent3d {
            width: settings.size,
            height: settings.size,
            depth_or_array_layers: 1,
        };

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Test output buffer"),
            size: (settings.size * settings.size * 4) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let color = self.device.create_texture(&TextureDescriptor {
            label: Some("Test output image"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: TextureUsages::COPY_SRC | TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_stencil = self.device.create_texture(&TextureDescriptor {
            label: Some("Test depth stencil"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth_stencil.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Test output encoder"),
        });

        let mut frame = self.routine.begin_frame(&self.queue, settings.view_proj);
        record(&mut frame);
        frame.finish(ShadowFrameFinishArgs {
            device: &self.device,
            encoder: &mut encoder,
            color: &color_view,
            depth_stencil: &depth_view,
            clear_color: settings.clear_color,
        });

        encoder.copy_texture_to_buffer(
            color.as_image_copy(),
            ImageCopyBuffer {
                buffer: &buffer,
                layout: ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(settings.size * 4),
                    rows_per_image: None,
                },
            },
            size,
        );

        let submit_index = self.queue.submit(Some(encoder.finish()));

        let (sender, receiver) = flume::bounded(1);
        buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |_| sender.send(()).unwrap());
        self.device.poll(wgpu::Maintain::WaitForSubmissionIndex(submit_index));

        receiver
            .recv_async()
            .await
            .context("Failed to recieve message from map_async")?;

        let mapping = buffer.slice(..).get_mapped_range();

        image::RgbaImage::from_raw(settings.size, settings.size, mapping.to_vec())
            .context("Failed to create image from mapping")
    }
}
