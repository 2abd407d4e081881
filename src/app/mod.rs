mod dialog;
mod input;
mod timing;

pub use dialog::{FileSelector, RfdSelector, Selection};

use crate::assets::ParseMode;
use crate::config::{ConfigError, ViewerConfig};
use crate::render::{CameraController, GpuMesh, RenderContext, RenderError, SpeedSelector};
use crate::scene::{MeshUploader, Scene, SceneError};
use input::{InputState, KeyEdge, VirtualCursor};
use timing::{status_title, FramePacer, FrameTiming};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, DeviceId, ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorGrabMode, Window, WindowAttributes, WindowId};

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("no geometry files selected")]
    SelectionCancelled,
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Files given on the command line win; otherwise the selector is asked once.
pub fn initial_selection<S: FileSelector>(
    cli_paths: Vec<PathBuf>,
    selector: &mut S,
) -> Result<Vec<PathBuf>, ViewerError> {
    if !cli_paths.is_empty() {
        return Ok(cli_paths);
    }
    match selector.select_files() {
        Selection::Files(paths) => {
            log::info!("Selected {} file(s)", paths.len());
            Ok(paths)
        }
        Selection::Cancelled => Err(ViewerError::SelectionCancelled),
    }
}

/// Replaces `current` with a freshly selected file set. Returns false and
/// keeps the scene when the selection is cancelled.
fn reload_scene<S, U>(
    selector: &mut S,
    uploader: &mut U,
    mode: ParseMode,
    current: &mut Option<Scene<U::Handle>>,
) -> Result<bool, SceneError>
where
    S: FileSelector,
    U: MeshUploader,
{
    let Selection::Files(paths) = selector.select_files() else {
        log::info!("Reload cancelled, keeping current scene");
        return Ok(false);
    };
    log::info!("Reloading {} file(s)", paths.len());
    if let Some(old) = current.take() {
        old.unload();
    }
    *current = Some(Scene::load(&paths, mode, uploader)?);
    Ok(true)
}

/// One frame of keyboard input. The speed key is applied before movement.
/// Returns true when the multiplier changed.
fn apply_input(
    camera: &mut CameraController,
    speed: &mut SpeedSelector,
    input: &InputState,
    frame_dt: f32,
) -> bool {
    let speed_changed = speed.update(input.speed_cycle);
    camera.update_movement(&input.movement(), speed.multiplier(), frame_dt);
    speed_changed
}

fn scene_title(base: &str, names: &[&str]) -> String {
    format!("{} - {}", base, names.join(", "))
}

pub struct App<S: FileSelector> {
    config: ViewerConfig,
    selector: S,
    pending_paths: Vec<PathBuf>,
    window: Option<Arc<Window>>,
    render: Option<RenderContext>,
    scene: Option<Scene<GpuMesh>>,
    base_title: String,
    input: InputState,
    reload_key: KeyEdge,
    speed: SpeedSelector,
    camera: CameraController,
    cursor: VirtualCursor,
    timing: FrameTiming,
    pacer: FramePacer,
    window_focused: bool,
    fatal: Option<ViewerError>,
}

impl<S: FileSelector> App<S> {
    fn new(config: ViewerConfig, paths: Vec<PathBuf>, selector: S) -> Self {
        Self {
            base_title: config.window.title.clone(),
            speed: SpeedSelector::new(config.camera.speed_multipliers.clone()),
            camera: CameraController::new(config.camera.settings()),
            pacer: FramePacer::from_fps(config.target_fps),
            config,
            selector,
            pending_paths: paths,
            window: None,
            render: None,
            scene: None,
            input: InputState::default(),
            reload_key: KeyEdge::default(),
            cursor: VirtualCursor::default(),
            timing: FrameTiming::new(Instant::now()),
            window_focused: true,
            fatal: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<(), ViewerError> {
        let window_attrs = WindowAttributes::default()
            .with_title(self.base_title.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(true);
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let mut render = RenderContext::new(window.clone(), &self.config.render)?;
        let paths = std::mem::take(&mut self.pending_paths);
        let scene = Scene::load(&paths, self.config.parse_mode, &mut render)?;

        self.window = Some(window);
        self.render = Some(render);
        self.scene = Some(scene);
        self.on_scene_installed();
        self.capture_cursor();
        log::info!(
            "Frame budget {:.1} ms ({} fps)",
            self.pacer.budget().as_secs_f64() * 1000.0,
            self.config.target_fps
        );
        self.timing = FrameTiming::new(Instant::now());
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: ViewerError) {
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
        event_loop.exit();
    }

    fn on_scene_installed(&mut self) {
        if let Some(scene) = &self.scene {
            if let Some(bounds) = scene.bounds() {
                self.camera.frame_bounds(&bounds);
            }
            self.base_title = scene_title(&self.config.window.title, &scene.names());
            log::info!("Window title: {}", self.base_title);
        }
        self.refresh_title();
    }

    fn refresh_title(&self) {
        if let Some(window) = &self.window {
            window.set_title(&status_title(
                &self.base_title,
                self.speed.multiplier(),
                self.timing.fps(),
            ));
        }
    }

    fn capture_cursor(&self) {
        let Some(window) = &self.window else {
            return;
        };
        let grabbed = window
            .set_cursor_grab(CursorGrabMode::Confined)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked));
        if let Err(err) = grabbed {
            log::warn!("Cursor capture unavailable: {}", err);
        }
        window.set_cursor_visible(false);
    }

    fn release_cursor(&self) {
        if let Some(window) = &self.window {
            let _ = window.set_cursor_grab(CursorGrabMode::None);
            window.set_cursor_visible(true);
        }
    }

    fn reload(&mut self) -> Result<(), ViewerError> {
        self.release_cursor();
        let Some(render) = self.render.as_mut() else {
            return Ok(());
        };
        let replaced = reload_scene(
            &mut self.selector,
            render,
            self.config.parse_mode,
            &mut self.scene,
        );

        // the dialog swallowed key releases and blocked the loop
        self.input.clear();
        self.camera.reset_cursor();
        self.timing.reset();
        self.capture_cursor();

        if replaced? {
            self.on_scene_installed();
        }
        Ok(())
    }

    fn frame(&mut self) -> Result<(), ViewerError> {
        let frame_start = Instant::now();
        if self.timing.update(frame_start) {
            self.refresh_title();
        }

        if apply_input(
            &mut self.camera,
            &mut self.speed,
            &self.input,
            self.timing.frame_dt,
        ) {
            log::info!("Speed multiplier: {:.1}x", self.speed.multiplier());
            self.refresh_title();
        }

        if self.reload_key.update(self.input.reload) {
            self.reload()?;
        }

        if let (Some(render), Some(scene)) = (self.render.as_mut(), self.scene.as_ref()) {
            let extent = scene.bounds().map_or(0.0, |bounds| bounds.max_extent());
            let projection = self.camera.projection_matrix(render.aspect_ratio(), extent);
            render.render(scene, self.camera.view_matrix(), projection)?;
        }

        self.pacer.pace(frame_start);
        Ok(())
    }
}

impl<S: FileSelector> ApplicationHandler for App<S> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Focused(focused) => {
                self.window_focused = focused;
                self.camera.reset_cursor();
                if focused {
                    self.capture_cursor();
                } else {
                    self.input.clear();
                    self.release_cursor();
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let pressed = event.state == ElementState::Pressed;
                if pressed && event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    event_loop.exit();
                    return;
                }
                self.input.handle_key(event.physical_key, pressed);
            }
            WindowEvent::Resized(new_size) => {
                if let Some(render) = &mut self.render {
                    render.resize(new_size);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.frame() {
                    self.fail(event_loop, err);
                }
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.window_focused {
                let (x, y) = self.cursor.apply(delta);
                self.camera.process_cursor(x, y);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(scene) = self.scene.take() {
            scene.unload();
        }
    }
}

pub fn run<S: FileSelector>(
    config: ViewerConfig,
    paths: Vec<PathBuf>,
    selector: S,
) -> Result<(), ViewerError> {
    log::info!("Press ESC or close window to exit, F1 to load other files");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config, paths, selector);
    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(err) => Err(err),
        None => {
            log::info!("Goodbye!");
            Ok(())
        }
    }
}
