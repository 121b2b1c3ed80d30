use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use vrm_viewer::cli::Cli;
use vrm_viewer::config::ViewerConfig;
use vrm_viewer::core::{Clock, FpsCounter, WinitController};
use vrm_viewer::face_tracking::FaceTracker;
use vrm_viewer::gpu_model::GpuAvatar;
use vrm_viewer::renderer::{FrameView, Renderer};
use vrm_viewer::scene::{build_terrain, AvatarSlot, SceneSettings};
use vrm_viewer::viewer::Viewer;

// === Constants ===

const FPS_UPDATE_INTERVAL: f32 = 1.0;
const INITIAL_WINDOW_WIDTH: u32 = 1280;
const INITIAL_WINDOW_HEIGHT: u32 = 720;

struct App {
    show_hud: bool,
    viewer: Viewer,
    input: WinitController,
    clock: Clock,
    fps: FpsCounter,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    avatar: AvatarSlot<GpuAvatar>,
}

impl App {
    fn new(cli: &Cli, config: ViewerConfig) -> Self {
        let face = cli.face_landmarks.as_ref().and_then(|path| {
            match FaceTracker::from_file(config.face_mesh, path) {
                Ok(tracker) => Some(tracker),
                Err(e) => {
                    log::error!("Face tracking disabled: {:#}", e);
                    None
                }
            }
        });

        let aspect = INITIAL_WINDOW_WIDTH as f32 / INITIAL_WINDOW_HEIGHT as f32;
        let mut viewer = Viewer::new(config, cli.load_request(), aspect);
        if let Some(face) = face {
            viewer.set_face_tracker(face);
        }

        Self {
            show_hud: !cli.no_ui,
            viewer,
            input: WinitController::new(),
            clock: Clock::new(),
            fps: FpsCounter::new(FPS_UPDATE_INTERVAL),
            window: None,
            renderer: None,
            avatar: AvatarSlot::new(),
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let delta = self.clock.tick();
        self.fps.frame(delta);

        let (Some(renderer), Some(window)) = (self.renderer.as_mut(), self.window.as_ref()) else {
            return;
        };

        if let Some(asset) = self.viewer.poll_loading() {
            // The previous avatar's buffers are destroyed before the new one is drawn
            let uploaded = renderer.upload_avatar(&asset);
            self.avatar.replace(uploaded);
        }

        self.viewer.update(delta, &self.input);

        if let (Some(character), Some(gpu_avatar), Some(root)) = (
            self.viewer.character(),
            self.avatar.get(),
            self.viewer.root_transform(),
        ) {
            renderer.update_avatar(gpu_avatar, &character.avatar, root);
        }

        let hud = self
            .viewer
            .hud_info(self.fps.fps(), renderer.gpu().adapter_name());
        let frame = FrameView {
            camera: self.viewer.camera(),
            focus: self.viewer.movement().position,
            avatar: self.avatar.get(),
            hud: &hud,
        };

        match renderer.render(window, &frame) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost, reconfiguring");
                renderer.reconfigure();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of GPU memory, exiting");
                event_loop.exit();
            }
            Err(e) => log::warn!("Render error: {:?}", e),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match event_loop.create_window(
            Window::default_attributes()
                .with_title("VRM Viewer")
                .with_inner_size(winit::dpi::LogicalSize::new(
                    INITIAL_WINDOW_WIDTH,
                    INITIAL_WINDOW_HEIGHT,
                )),
        ) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let scene = SceneSettings::from_config(&self.viewer.config().scene);
        let mut renderer =
            match pollster::block_on(Renderer::new(window.clone(), scene, self.show_hud)) {
                Ok(r) => r,
                Err(e) => {
                    log::error!("Failed to initialize renderer: {:#}", e);
                    event_loop.exit();
                    return;
                }
            };

        renderer.set_terrain(&build_terrain(&self.viewer.config().scene));
        let (width, height) = renderer.size();
        self.viewer.camera_mut().set_viewport(width, height);

        if let Err(e) = self.viewer.start_loading() {
            log::error!("Failed to start loading: {:#}", e);
        }

        self.window = Some(window);
        self.renderer = Some(renderer);
        self.clock.reset();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        // Let egui handle the event first
        if let (Some(renderer), Some(window)) = (&mut self.renderer, &self.window) {
            if renderer.handle_event(window, &event) {
                return;
            }
        }

        self.input.process_event(&event);

        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => event_loop.exit(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::F1),
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.hud_mut().toggle();
                }
            }
            WindowEvent::DroppedFile(path) => {
                log::info!("Dropped {:?}", path);
                if let Err(e) = self.viewer.request_model(&path) {
                    log::warn!("Ignoring dropped file: {:#}", e);
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.resize(size.width, size.height);
                }
                self.viewer.camera_mut().set_viewport(size.width, size.height);
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if self.avatar.take().is_some() {
            log::debug!("Released avatar GPU resources");
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = cli.viewer_config()?;
    let event_loop = EventLoop::new()?;
    let mut app = App::new(&cli, config);

    log::info!("Controls: WASD move, arrows orbit camera, F1 toggles HUD, Escape quits");
    event_loop.run_app(&mut app)?;

    Ok(())
}
