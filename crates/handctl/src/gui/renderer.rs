//! wgpu renderer that draws a single texture stretched over a window.

use std::{rc::Rc, sync::Arc};

use anyhow::anyhow;
use wgpu::*;
use winit::{
    dpi::PhysicalSize,
    event_loop::EventLoopWindowTarget,
    window::{Fullscreen, WindowBuilder},
};

use crate::image::Resolution;

use super::WindowMode;

const BACKGROUND: Color = Color::BLACK;

/// Handles to the GPU used for rendering all windows.
pub struct Gpu {
    instance: Arc<Instance>,
    adapter: Arc<Adapter>,
    device: Arc<Device>,
    queue: Arc<Queue>,
}

impl Gpu {
    /// Opens a suitable default GPU.
    pub async fn open() -> anyhow::Result<Self> {
        // The OpenGL backend panics spuriously, so don't enable it.
        let backends = Backends::PRIMARY;
        let instance = Instance::new(InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&Default::default())
            .await
            .ok_or_else(|| anyhow!("no graphics adapter found"))?;
        let info = adapter.get_info();
        log::info!(
            "using graphics adapter {} ({:?}, {:?})",
            info.name,
            info.device_type,
            info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: None,
                    features: Features::empty(),
                    // Camera frames can be large, so use the texture size limits of the adapter.
                    limits: Limits::downlevel_defaults().using_resolution(adapter.limits()),
                },
                None,
            )
            .await?;

        Ok(Self {
            instance: Arc::new(instance),
            adapter: Arc::new(adapter),
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    #[inline]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    #[inline]
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    #[inline]
    pub fn device(&self) -> &Device {
        &self.device
    }

    #[inline]
    pub fn queue(&self) -> &Queue {
        &self.queue
    }
}

pub struct Window {
    pub(crate) win: Rc<winit::window::Window>,
    mode: WindowMode,
}

impl Window {
    pub fn open<T>(
        event_loop: &EventLoopWindowTarget<T>,
        title: &str,
        mode: WindowMode,
    ) -> anyhow::Result<Self> {
        let mut builder = WindowBuilder::new().with_title(title).with_resizable(true);
        builder = match mode {
            WindowMode::Windowed(res) => {
                builder.with_inner_size(PhysicalSize::new(res.width(), res.height()))
            }
            WindowMode::Fullscreen => builder.with_fullscreen(Some(Fullscreen::Borderless(None))),
        };
        let win = builder.build(event_loop)?;
        Ok(Self {
            win: Rc::new(win),
            mode,
        })
    }

    /// Switches between windowed and fullscreen mode, if `mode` differs from the current one.
    pub fn set_mode(&mut self, mode: WindowMode) {
        if self.mode == mode {
            return;
        }
        log::debug!("switching window mode: {:?} -> {:?}", self.mode, mode);
        match mode {
            WindowMode::Windowed(res) => {
                self.win.set_fullscreen(None);
                self.win
                    .set_inner_size(PhysicalSize::new(res.width(), res.height()));
            }
            WindowMode::Fullscreen => {
                self.win.set_fullscreen(Some(Fullscreen::Borderless(None)));
            }
        }
        self.mode = mode;
    }
}

struct Texture {
    inner: wgpu::Texture,
    size: Extent3d,
    label: String,
    format: TextureFormat,
}

impl Texture {
    fn empty(gpu: &Gpu, label: &str) -> Self {
        let format = TextureFormat::Rgba8UnormSrgb;
        let size = Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        };
        Self {
            label: label.to_string(),
            inner: Self::create(gpu, label, size, format),
            size,
            format,
        }
    }

    fn create(gpu: &Gpu, label: &str, size: Extent3d, format: TextureFormat) -> wgpu::Texture {
        gpu.device().create_texture(&TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        })
    }

    /// Uploads `data` to the texture, reallocating it if the size changed.
    ///
    /// Returns whether the texture was reallocated.
    fn update(&mut self, gpu: &Gpu, size: Extent3d, data: &[u8]) -> bool {
        assert_eq!((size.width * size.height * 4) as usize, data.len());

        let mut reallocated = false;
        if self.size != size {
            log::trace!(
                "reallocating texture '{}' ({}x{} -> {}x{})",
                self.label,
                self.size.width,
                self.size.height,
                size.width,
                size.height
            );
            reallocated = true;
            self.inner = Self::create(gpu, &self.label, size, self.format);
            self.size = size;
        }

        gpu.queue().write_texture(
            ImageCopyTexture {
                texture: &self.inner,
                mip_level: 0,
                origin: Origin3d::default(),
                aspect: TextureAspect::All,
            },
            data,
            ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(size.width * 4),
                rows_per_image: None,
            },
            size,
        );

        reallocated
    }
}

fn create_bind_group(device: &Device, layout: &BindGroupLayout, texture: &Texture) -> BindGroup {
    let sampler = device.create_sampler(&SamplerDescriptor {
        mag_filter: FilterMode::Linear,
        min_filter: FilterMode::Linear,
        ..Default::default()
    });
    device.create_bind_group(&BindGroupDescriptor {
        label: Some("textured_quad"),
        layout,
        entries: &[
            BindGroupEntry {
                binding: 0,
                resource: BindingResource::TextureView(
                    &texture.inner.create_view(&Default::default()),
                ),
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::Sampler(&sampler),
            },
        ],
    })
}

pub struct Renderer {
    gpu: Rc<Gpu>,
    surface: Surface,
    surface_format: TextureFormat,
    pipeline: RenderPipeline,

    texture: Texture,
    bind_group_layout: BindGroupLayout,
    bind_group: BindGroup,

    /// Resolution of the last uploaded image.
    image_res: Option<Resolution>,

    /// Surface must be destroyed before `Window`.
    window: Window,
}

impl Renderer {
    pub fn new(window: Window, gpu: Rc<Gpu>) -> anyhow::Result<Self> {
        let surface = unsafe { gpu.instance().create_surface(&*window.win)? };
        let surface_format = *surface
            .get_capabilities(gpu.adapter())
            .formats
            .first()
            .ok_or_else(|| anyhow!("adapter cannot render to window surface"))?;

        let shader = gpu.device().create_shader_module(ShaderModuleDescriptor {
            label: Some("fullscreen texture shader"),
            source: ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let bind_group_layout =
            gpu.device()
                .create_bind_group_layout(&BindGroupLayoutDescriptor {
                    label: None,
                    entries: &[
                        BindGroupLayoutEntry {
                            binding: 0,
                            visibility: ShaderStages::FRAGMENT,
                            ty: BindingType::Texture {
                                sample_type: TextureSampleType::Float { filterable: true },
                                view_dimension: TextureViewDimension::D2,
                                multisampled: false,
                            },
                            count: None,
                        },
                        BindGroupLayoutEntry {
                            binding: 1,
                            visibility: ShaderStages::FRAGMENT,
                            ty: BindingType::Sampler(SamplerBindingType::Filtering),
                            count: None,
                        },
                    ],
                });

        let pipeline = gpu
            .device()
            .create_render_pipeline(&RenderPipelineDescriptor {
                label: Some("textured_quad"),
                layout: Some(&gpu.device().create_pipeline_layout(
                    &PipelineLayoutDescriptor {
                        label: None,
                        bind_group_layouts: &[&bind_group_layout],
                        push_constant_ranges: &[],
                    },
                )),
                vertex: VertexState {
                    module: &shader,
                    entry_point: "vert",
                    buffers: &[],
                },
                fragment: Some(FragmentState {
                    module: &shader,
                    entry_point: "frag",
                    targets: &[Some(ColorTargetState {
                        format: surface_format,
                        write_mask: ColorWrites::ALL,
                        blend: None,
                    })],
                }),
                primitive: PrimitiveState::default(),
                depth_stencil: None,
                multisample: Default::default(),
                multiview: None,
            });

        let texture = Texture::empty(&gpu, "frame");
        let bind_group = create_bind_group(gpu.device(), &bind_group_layout, &texture);

        let mut this = Self {
            gpu,
            surface,
            surface_format,
            pipeline,
            texture,
            bind_group_layout,
            bind_group,
            image_res: None,
            window,
        };
        this.recreate_swapchain();
        Ok(this)
    }

    pub fn window(&self) -> &winit::window::Window {
        &self.window.win
    }

    pub fn set_mode(&mut self, mode: WindowMode) {
        self.window.set_mode(mode);
    }

    /// Resolution of the most recently uploaded image.
    pub fn image_resolution(&self) -> Option<Resolution> {
        self.image_res
    }

    pub fn update_texture(&mut self, res: Resolution, data: &[u8]) {
        let size = Extent3d {
            width: res.width(),
            height: res.height(),
            depth_or_array_layers: 1,
        };
        self.image_res = Some(res);
        if self.texture.update(&self.gpu, size, data) {
            // The bind group references the old texture, so it has to be recreated.
            self.bind_group =
                create_bind_group(self.gpu.device(), &self.bind_group_layout, &self.texture);
        }
    }

    pub fn resized(&mut self) {
        self.recreate_swapchain();
    }

    pub fn redraw(&mut self) {
        let size = self.window.win.inner_size();
        if size.width == 0 || size.height == 0 {
            // Minimized.
            return;
        }

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err @ (SurfaceError::Outdated | SurfaceError::Lost)) => {
                log::debug!("surface error: {}", err);
                self.recreate_swapchain();
                match self.surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(e) => {
                        log::error!("failed to acquire frame after recreating swapchain: {e}");
                        return;
                    }
                }
            }
            Err(e) => {
                log::warn!("failed to acquire frame: {e}");
                return;
            }
        };
        let view = frame.texture.create_view(&TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&CommandEncoderDescriptor { label: None });
        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: None,
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(BACKGROUND),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });

            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.bind_group, &[]);
            rpass.draw(0..3, 0..1);
        }

        self.gpu.queue().submit([encoder.finish()]);
        frame.present();
    }

    fn recreate_swapchain(&mut self) {
        let res = self.window.win.inner_size();
        if res.width == 0 || res.height == 0 {
            return;
        }
        log::debug!(
            "creating target surface at {}x{} (format: {:?})",
            res.width,
            res.height,
            self.surface_format,
        );
        let config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: self.surface_format,
            width: res.width,
            height: res.height,
            present_mode: PresentMode::Fifo,
            alpha_mode: CompositeAlphaMode::Auto,
            view_formats: Vec::new(),
        };

        self.surface.configure(self.gpu.device(), &config);
    }
}
