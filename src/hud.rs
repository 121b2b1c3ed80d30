use std::sync::Arc;

use winit::window::Window;

use crate::face_tracking::FaceTrackingState;
use crate::movement::MovementState;

/// Avatar facts shown in the HUD
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AvatarSummary {
    pub title: String,
    pub version: String,
    pub vertices: usize,
    pub triangles: usize,
    pub bones: usize,
    pub spring_joints: usize,
}

/// Everything the HUD draws for one frame
#[derive(Debug, Clone, Default)]
pub struct HudInfo {
    pub fps: f32,
    pub adapter: String,
    pub avatar: Option<AvatarSummary>,
    /// Model path and seconds spent while a load is running
    pub loading: Option<(String, f32)>,
    pub last_error: Option<String>,
    pub movement: Option<MovementState>,
    pub run_weight: f32,
    pub camera_angle: f32,
    pub camera_height: f32,
    pub face: Option<FaceTrackingState>,
}

pub struct Hud {
    ctx: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
    visible: bool,
}

impl Hud {
    pub fn new(
        window: &Arc<Window>,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        visible: bool,
    ) -> Self {
        let ctx = egui::Context::default();
        let state = egui_winit::State::new(
            ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let renderer = egui_wgpu::Renderer::new(device, format, egui_wgpu::RendererOptions::default());
        Self {
            ctx,
            state,
            renderer,
            visible,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    /// Returns true when egui consumed the event
    pub fn handle_event(&mut self, window: &Window, event: &winit::event::WindowEvent) -> bool {
        if !self.visible {
            return false;
        }
        self.state.on_window_event(window, event).consumed
    }

    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        window: &Window,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        size: [u32; 2],
        info: &HudInfo,
    ) {
        if !self.visible {
            return;
        }

        let raw_input = self.state.take_egui_input(window);
        let full_output = self.ctx.run(raw_input, |ctx| draw_panels(ctx, info));

        self.state
            .handle_platform_output(window, full_output.platform_output);

        let tris = self
            .ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        for (id, image_delta) in &full_output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: size,
            pixels_per_point: full_output.pixels_per_point,
        };
        self.renderer
            .update_buffers(device, queue, encoder, &tris, &screen_descriptor);

        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: None,
                    occlusion_query_set: None,
                    timestamp_writes: None,
                })
                .forget_lifetime();
            self.renderer.render(&mut pass, &tris, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.renderer.free_texture(id);
        }
    }
}

fn section(ui: &mut egui::Ui, title: &str, color: egui::Color32) {
    ui.add_space(5.0);
    ui.separator();
    ui.add_space(5.0);
    ui.label(egui::RichText::new(title).size(16.0).color(color));
}

fn draw_panels(ctx: &egui::Context, info: &HudInfo) {
    egui::Window::new("VRM Viewer")
        .title_bar(true)
        .resizable(false)
        .fixed_pos(egui::pos2(10.0, 10.0))
        .default_width(260.0)
        .show(ctx, |ui| {
            ui.heading(
                egui::RichText::new(format!("{:.0} FPS", info.fps))
                    .size(28.0)
                    .color(egui::Color32::from_rgb(74, 158, 255)),
            );
            let frame_time_ms = if info.fps > 0.0 { 1000.0 / info.fps } else { 0.0 };
            ui.label(
                egui::RichText::new(format!("{:.2} ms  {}", frame_time_ms, info.adapter))
                    .size(12.0)
                    .color(egui::Color32::GRAY),
            );

            section(ui, "Avatar", egui::Color32::from_rgb(100, 200, 100));
            if let Some((path, secs)) = &info.loading {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(format!("Loading {} ({:.1}s)", path, secs));
                });
            }
            match &info.avatar {
                Some(avatar) => {
                    ui.monospace(format!("{} (VRM {})", avatar.title, avatar.version));
                    ui.monospace(format!(
                        "{} vertices, {} triangles",
                        avatar.vertices, avatar.triangles
                    ));
                    ui.monospace(format!(
                        "{} bones, {} spring joints",
                        avatar.bones, avatar.spring_joints
                    ));
                }
                None if info.loading.is_none() => {
                    ui.label("No avatar. Drop a .vrm, .glb or .gltf file here.");
                }
                None => {}
            }
            if let Some(error) = &info.last_error {
                ui.label(
                    egui::RichText::new(error)
                        .size(12.0)
                        .color(egui::Color32::from_rgb(255, 100, 100)),
                );
            }

            if let Some(movement) = &info.movement {
                section(ui, "Movement", egui::Color32::from_rgb(200, 150, 100));
                ui.monospace(format!(
                    "Pos: ({:.2}, {:.2}, {:.2})",
                    movement.position.x, movement.position.y, movement.position.z
                ));
                ui.monospace(format!(
                    "Yaw: {:.1}°  Speed: {:.3}",
                    movement.yaw.to_degrees(),
                    movement.speed()
                ));
                ui.add(
                    egui::ProgressBar::new(info.run_weight.clamp(0.0, 1.0))
                        .text(format!("run {:.0}%", info.run_weight * 100.0)),
                );
            }

            section(ui, "Camera", egui::Color32::from_rgb(200, 100, 200));
            ui.monospace(format!(
                "Angle: {:.1}°  Height: {:.1}",
                info.camera_angle.to_degrees(),
                info.camera_height
            ));

            if let Some(face) = &info.face {
                section(ui, "Face tracking", egui::Color32::from_rgb(255, 200, 100));
                ui.monospace(if face.is_tracking {
                    "Tracking"
                } else {
                    "No face"
                });
                let [x, y, z] = face.head_rotation;
                ui.monospace(format!(
                    "Head: ({:.1}°, {:.1}°, {:.1}°)",
                    x.to_degrees(),
                    y.to_degrees(),
                    z.to_degrees()
                ));
                for (name, value) in face.blend_shapes.iter().take(8) {
                    ui.monospace(format!("{}: {:.2}", name, value));
                }
            }

            section(ui, "Controls", egui::Color32::GRAY);
            ui.label("WASD move, arrows orbit and raise the camera");
            ui.label("F1 toggles this panel, Esc quits");
        });
}
