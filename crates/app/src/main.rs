use gpui::*;
use gpui_component::notification::NotificationList;
use gpui_component::Root;
use tracing_subscriber::EnvFilter;

use missive::app::{MissiveShell, Quit, ReloadHistory, ToggleSidebar};
use missive::route::parse_route;
use missive::settings::SettingsStore;

/// Opens the viewer, optionally on a conversation route such as `chat/5` or `user/7`.
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let initial = std::env::args().nth(1).and_then(|raw| {
        let identity = parse_route(&raw);
        if identity.is_none() {
            tracing::warn!(route = %raw, "ignoring unrecognized conversation route");
        }
        identity
    });

    let app = Application::new().with_assets(gpui_component_assets::Assets);

    app.run(move |cx| {
        gpui_tokio_bridge::init(cx);
        gpui_component::init(cx);

        SettingsStore::load().settings().apply_theme(None, cx);

        cx.on_action(|_: &Quit, cx| {
            cx.quit();
        });

        cx.bind_keys([
            KeyBinding::new("cmd-q", Quit, None),
            KeyBinding::new("cmd-b", ToggleSidebar, None),
            KeyBinding::new("cmd-r", ReloadHistory, None),
        ]);

        cx.spawn(async move |cx| {
            cx.update(|cx| {
                let options = WindowOptions {
                    window_bounds: Some(WindowBounds::Windowed(Bounds::centered(
                        None,
                        size(px(1100.), px(780.)),
                        cx,
                    ))),
                    titlebar: Some(TitlebarOptions {
                        appears_transparent: true,
                        traffic_light_position: Some(point(px(9.), px(9.))),
                        ..Default::default()
                    }),
                    ..Default::default()
                };

                cx.open_window(options, |window, cx| {
                    let notification_list = cx.new(|cx| NotificationList::new(window, cx));
                    let shell =
                        cx.new(|cx| MissiveShell::new(initial, notification_list, window, cx));

                    // Root hosts gpui-component notifications and dialogs.
                    cx.new(|cx| Root::new(shell, window, cx))
                })
                .expect("failed to open main window");

                cx.activate(true);
            })
        })
        .detach();
    });
}
