use std::rc::Rc;
use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowAttributes, WindowId};

use view_override::backend::WgpuRenderer;
use view_override::{
    COMMAND_NAME, DemoConfig, FrameContext, LoggingConfig, OverrideConfig, PluginHost, Renderer,
    SHADER_DIR_ENV, ViewOverridePlugin, ViewportRefresh, init_logging, render_frame,
};

/// Redraws the demo window when the control surface changes something.
struct WindowRefresh {
    window: Arc<Window>,
}

impl ViewportRefresh for WindowRefresh {
    fn schedule_refresh_all(&self) {
        self.window.request_redraw();
    }
}

enum DemoApp {
    Pending {
        config: DemoConfig,
    },
    Running {
        window: Arc<Window>,
        renderer: Rc<WgpuRenderer>,
        host: PluginHost,
        plugin: ViewOverridePlugin,
        title: String,
    },
    Failed,
}

/// Turns a key press into a `viewOverride` command line.
fn key_command(key: &Key, host: &PluginHost) -> Option<String> {
    let channels = || {
        host.command(COMMAND_NAME)
            .map(|surface| surface.pipeline().borrow().channel_mask())
    };
    let flag = |on: bool| if on { "1" } else { "0" };

    match key.as_ref() {
        Key::Named(NamedKey::F5) => Some("-refresh".to_string()),
        Key::Character(c) => match c.to_ascii_lowercase().as_str() {
            index @ ("0" | "1" | "2") => Some(format!("-target {index}")),
            "q" => Some("-query -target".to_string()),
            channel @ ("r" | "g" | "b" | "a") => {
                let mut mask = channels()?;
                match channel {
                    "r" => mask.r = !mask.r,
                    "g" => mask.g = !mask.g,
                    "b" => mask.b = !mask.b,
                    _ => mask.a = !mask.a,
                }
                Some(format!(
                    "-channel {} {} {} {}",
                    flag(mask.r),
                    flag(mask.g),
                    flag(mask.b),
                    flag(mask.a)
                ))
            }
            _ => None,
        },
        _ => None,
    }
}

impl ApplicationHandler for DemoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let DemoApp::Pending { config } = self else {
            return;
        };

        let window_attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));
        let title = config.title.clone();

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("failed to create window: {e}");
                *self = DemoApp::Failed;
                event_loop.exit();
                return;
            }
        };

        let renderer = match WgpuRenderer::new(window.clone()) {
            Ok(renderer) => Rc::new(renderer),
            Err(e) => {
                log::error!("{e}");
                *self = DemoApp::Failed;
                event_loop.exit();
                return;
            }
        };

        let mut host = PluginHost::new();
        let override_config = OverrideConfig::default();
        if let Some(dir) = &override_config.shader_dir {
            log::info!("effect shaders from {} (set {SHADER_DIR_ENV} to change)", dir.display());
        }
        let mut plugin = ViewOverridePlugin::new(override_config);
        let refresh = Rc::new(WindowRefresh {
            window: window.clone(),
        });
        let active_renderer = Some(renderer.clone() as Rc<dyn Renderer>);
        if let Err(e) = plugin.activate(&mut host, active_renderer, refresh) {
            log::error!("{e}");
            *self = DemoApp::Failed;
            event_loop.exit();
            return;
        }

        log::info!("keys: 0/1/2 target, R/G/B/A channels, F5 reload shaders, Q query");

        *self = DemoApp::Running {
            window,
            renderer,
            host,
            plugin,
            title,
        };
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let DemoApp::Running {
            window,
            renderer,
            host,
            plugin,
            title,
        } = self
        else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                if let Err(e) = plugin.deactivate(host) {
                    log::error!("{e}");
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                renderer.resize(size.width, size.height);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                let Some(line) = key_command(&logical_key, host) else {
                    return;
                };
                let Some(surface) = host.command(COMMAND_NAME) else {
                    return;
                };
                match surface.execute_line(&line) {
                    Ok(Some(index)) => log::info!("active target: {index}"),
                    Ok(None) => log::debug!("{COMMAND_NAME} {line}"),
                    Err(e) => log::warn!("{e}"),
                }
            }
            WindowEvent::RedrawRequested => {
                let Some(pipeline) = plugin.pipeline() else {
                    return;
                };
                let size = window.inner_size();
                let frame_context = FrameContext::new(size.width, size.height);

                match renderer.begin_frame() {
                    Ok(mut frame) => {
                        let result = render_frame(
                            &mut pipeline.borrow_mut(),
                            &mut frame,
                            "window",
                            &frame_context,
                        );
                        let overlay = frame.finish();
                        if let Err(e) = result {
                            log::warn!("frame skipped: {e}");
                        }

                        let new_title = overlay.join("  |  ");
                        if !new_title.is_empty() && new_title != *title {
                            window.set_title(&new_title);
                            *title = new_title;
                        }
                    }
                    Err(e) => log::debug!("{e}"),
                }

                window.request_redraw();
            }
            _ => {}
        }
    }
}

fn main() {
    init_logging(LoggingConfig::default());

    let event_loop = EventLoop::new().expect("failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = DemoApp::Pending {
        config: DemoConfig::default(),
    };
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("event loop error: {e}");
    }
}
