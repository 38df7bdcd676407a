use std::cell::{Cell, RefCell};

use gloo_storage::Storage;
use kartvisning_shared::{BaseConfig, LayerSummary, MapError, ProjectEntry};
use leptos::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

use crate::canvas::{self, CanvasSurface, MapCanvas};
use crate::location;
use crate::net;
use crate::position::PositionPanel;
use crate::sidebar::Sidebar;
use crate::sync::{Command, SyncController, SyncEvent};

const SETTINGS_KEY: &str = "kartvisning_settings";

/// Newtype wrappers so signals of the same type stay distinct in Leptos context.
#[derive(Clone, Copy)]
pub(crate) struct ActiveProject(pub RwSignal<Option<String>>);
#[derive(Clone, Copy)]
pub(crate) struct ErrorBanner(pub RwSignal<Option<String>>);
/// Last published `(center, zoom)`.
#[derive(Clone, Copy)]
pub(crate) struct ViewReadout(pub RwSignal<Option<((f64, f64), f64)>>);
#[derive(Clone, Copy)]
pub(crate) struct LayerList(pub RwSignal<Vec<LayerSummary>>);
#[derive(Clone, Copy)]
pub(crate) struct ProjectCatalog(pub RwSignal<Vec<ProjectEntry>>);
#[derive(Clone, Copy)]
pub(crate) struct SidebarOpen(pub RwSignal<bool>);
#[derive(Clone, Copy)]
pub(crate) struct MapLoading(pub RwSignal<bool>);

/// Signals the command executor writes to.
#[derive(Clone, Copy)]
struct Shell {
    project: RwSignal<Option<String>>,
    error: RwSignal<Option<String>>,
    view: RwSignal<Option<((f64, f64), f64)>>,
    layers: RwSignal<Vec<LayerSummary>>,
    loading: RwSignal<bool>,
}

struct VisibilityBinding {
    document: web_sys::Document,
    _handler: Closure<dyn Fn()>,
}

thread_local! {
    static CONTROLLER: RefCell<Option<SyncController<CanvasSurface>>> = const { RefCell::new(None) };
    static SHELL: Cell<Option<Shell>> = const { Cell::new(None) };
    static VISIBILITY_BINDING: RefCell<Option<VisibilityBinding>> = const { RefCell::new(None) };
}

#[derive(serde::Serialize, serde::Deserialize, Default)]
#[serde(default)]
struct Settings {
    last_project: Option<String>,
    sidebar_open: bool,
}

fn warn(message: &str) {
    web_sys::console::warn_1(&message.into());
}

fn remove_loading_shell() {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    if let Some(shell) = document.get_element_by_id("app-loading-shell") {
        shell.remove();
    }
}

/// Feeds one event to the controller and carries out the commands it returns.
/// The controller borrow is released before any command runs.
pub(crate) fn dispatch(event: SyncEvent) {
    let outcome = CONTROLLER.with(|slot| match slot.try_borrow_mut() {
        Ok(mut controller) => controller.as_mut().map(|c| c.handle(event)),
        Err(_) => None,
    });
    match outcome {
        Some(Ok(commands)) => commands.into_iter().for_each(execute),
        Some(Err(err)) => report(&err),
        None => warn("map controller unavailable; event dropped"),
    }
}

fn report(err: &MapError) {
    if err.is_stale() {
        web_sys::console::info_1(&err.to_string().into());
        return;
    }
    warn(&err.to_string());
    if err.is_user_facing()
        && let Some(shell) = SHELL.with(Cell::get)
    {
        shell.error.set(Some(err.to_string()));
        shell.loading.set(false);
    }
}

fn layer_summaries() -> Vec<LayerSummary> {
    CONTROLLER.with(|slot| {
        slot.try_borrow()
            .ok()
            .and_then(|c| c.as_ref().map(|c| c.registry().summaries()))
            .unwrap_or_default()
    })
}

fn execute(command: Command) {
    let shell = SHELL.with(Cell::get);
    match command {
        Command::FetchProject { ticket, name, url } => {
            if let Some(shell) = shell {
                shell.loading.set(true);
                shell.error.set(None);
                shell.project.set(Some(name.clone()));
            }
            spawn_local(async move {
                let result = net::fetch_project(&name, &url).await;
                dispatch(SyncEvent::ProjectLoaded { ticket, result });
            });
        }
        Command::FetchToken => spawn_local(async {
            match net::fetch_token().await {
                Ok(token) => dispatch(SyncEvent::TokenArrived(token)),
                Err(e) => warn(&format!("session token unavailable: {e}")),
            }
        }),
        Command::FetchTransform { ticket, url } => spawn_local(async move {
            let result = net::fetch_transform(&url).await;
            dispatch(SyncEvent::TransformResolved { ticket, result });
        }),
        Command::ArmListeners => {
            canvas::set_interactive(true);
            arm_visibility_listener();
        }
        Command::PublishView { center, zoom } => {
            if let Some(shell) = shell {
                shell.view.set(Some((center, zoom)));
            }
        }
        Command::WriteUrl(query) => location::replace_hash(&query),
        Command::ClearLayerState => {
            canvas::set_interactive(false);
            if let Some(shell) = shell {
                shell.layers.set(Vec::new());
            }
        }
        Command::LayersChanged => {
            if let Some(shell) = shell {
                shell.layers.set(layer_summaries());
                shell.loading.set(false);
            }
        }
    }
}

/// Coming back to a hidden tab re-activates the map: fresh token, re-armed input.
fn arm_visibility_listener() {
    if VISIBILITY_BINDING.with(|slot| slot.borrow().is_some()) {
        return;
    }
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    let doc_for_handler = document.clone();
    let handler = Closure::<dyn Fn()>::new(move || {
        if doc_for_handler.visibility_state() == web_sys::VisibilityState::Visible {
            dispatch(SyncEvent::Resumed);
        }
    });
    if document
        .add_event_listener_with_callback("visibilitychange", handler.as_ref().unchecked_ref())
        .is_ok()
    {
        VISIBILITY_BINDING.with(|slot| {
            *slot.borrow_mut() = Some(VisibilityBinding {
                document,
                _handler: handler,
            });
        });
    }
}

fn disarm_visibility_listener() {
    VISIBILITY_BINDING.with(|slot| {
        if let Some(old) = slot.borrow_mut().take() {
            let _ = old.document.remove_event_listener_with_callback(
                "visibilitychange",
                old._handler.as_ref().unchecked_ref(),
            );
        }
    });
}

/// Loads defaults and the page location, installs the controller and opens the
/// first project: the URL's `project`, else the last one used, else the default.
async fn boot(last_project: Option<String>) {
    let base = match net::fetch_base_config().await {
        Ok(base) => base,
        Err(e) => {
            warn(&format!("base configuration unavailable, using defaults: {e}"));
            BaseConfig::default()
        }
    };
    let (site, url) = location::read();
    let initial = url
        .project
        .clone()
        .or(last_project)
        .unwrap_or_else(|| base.project.name.clone());
    let controller = SyncController::new(site, base, url, Box::new(CanvasSurface::new));
    CONTROLLER.with(|slot| *slot.borrow_mut() = Some(controller));
    remove_loading_shell();
    dispatch(SyncEvent::ProjectChanged(initial));
}

#[component]
pub fn App() -> impl IntoView {
    let saved: Settings = gloo_storage::LocalStorage::get(SETTINGS_KEY).unwrap_or_default();
    let project: RwSignal<Option<String>> = RwSignal::new(None);
    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let view_readout: RwSignal<Option<((f64, f64), f64)>> = RwSignal::new(None);
    let layers: RwSignal<Vec<LayerSummary>> = RwSignal::new(Vec::new());
    let catalog: RwSignal<Vec<ProjectEntry>> = RwSignal::new(Vec::new());
    let loading: RwSignal<bool> = RwSignal::new(true);
    let sidebar_open: RwSignal<bool> = RwSignal::new(saved.sidebar_open);

    provide_context(ActiveProject(project));
    provide_context(ErrorBanner(error));
    provide_context(ViewReadout(view_readout));
    provide_context(LayerList(layers));
    provide_context(ProjectCatalog(catalog));
    provide_context(SidebarOpen(sidebar_open));
    provide_context(MapLoading(loading));

    SHELL.with(|slot| {
        slot.set(Some(Shell {
            project,
            error,
            view: view_readout,
            layers,
            loading,
        }))
    });

    // Persist settings to localStorage on any change
    let stored_project = saved.last_project.clone();
    Effect::new(move || {
        let settings = Settings {
            last_project: project.get().or_else(|| stored_project.clone()),
            sidebar_open: sidebar_open.get(),
        };
        let _ = gloo_storage::LocalStorage::set(SETTINGS_KEY, &settings);
    });

    let last_project = saved.last_project;
    Effect::new(move || {
        spawn_local(boot(last_project.clone()));
        spawn_local(async move {
            match net::fetch_projects().await {
                Ok(entries) => catalog.set(entries),
                Err(e) => warn(&format!("project catalog unavailable: {e}")),
            }
        });
    });

    on_cleanup(|| {
        disarm_visibility_listener();
        CONTROLLER.with(|slot| {
            if let Some(mut controller) = slot.borrow_mut().take() {
                controller.dispose();
            }
        });
        SHELL.with(|slot| slot.set(None));
    });

    view! {
        <div style="width: 100%; height: 100%; position: relative; overflow: hidden;">
            <MapCanvas />
            <ErrorNotice />
            {move || loading.get().then(|| view! {
                <div class="map-loading" style="position: absolute; top: 12px; left: 50%; transform: translateX(-50%); z-index: 5; padding: 4px 12px; border-radius: 4px; background: rgba(255,255,255,0.92); font-size: 0.8rem; color: #333;">
                    "Laster kart\u{2026}"
                </div>
            })}
            <PositionPanel />
            <div
                class="sidebar-wrapper"
                style="position: absolute; top: 0; right: 0; height: 100%; width: 320px; z-index: 10; transition: transform 0.2s ease;"
                style:transform=move || if sidebar_open.get() { "translateX(0)" } else { "translateX(100%)" }
            >
                <SidebarToggle />
                <Sidebar />
            </div>
        </div>
    }
}

#[component]
fn SidebarToggle() -> impl IntoView {
    let SidebarOpen(sidebar_open) = expect_context();

    view! {
        <button
            class="sidebar-toggle"
            title=move || if sidebar_open.get() { "Skjul meny" } else { "Vis meny" }
            style="position: absolute; top: 16px; left: -44px; width: 32px; height: 32px; background: #ffffff; border: 1px solid #c9ced6; border-radius: 6px; cursor: pointer; font-size: 1.1rem; line-height: 1;"
            on:click=move |_| sidebar_open.update(|v| *v = !*v)
        >
            {move || if sidebar_open.get() { "\u{00BB}" } else { "\u{00AB}" }}
        </button>
    }
}

#[component]
fn ErrorNotice() -> impl IntoView {
    let ErrorBanner(error) = expect_context();

    view! {
        {move || error.get().map(|message| view! {
            <div
                class="error-banner"
                role="alert"
                style="position: absolute; top: 12px; left: 12px; right: 360px; z-index: 20; display: flex; gap: 12px; align-items: center; padding: 8px 12px; background: #fdecea; border: 1px solid #e4002b; border-radius: 4px; color: #5f1212; font-size: 0.85rem;"
            >
                <span style="flex: 1;">{message}</span>
                <button
                    title="Lukk"
                    style="background: none; border: none; cursor: pointer; font-size: 1rem;"
                    on:click=move |_| error.set(None)
                >
                    "\u{00D7}"
                </button>
            </div>
        })}
    }
}
