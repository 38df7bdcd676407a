use kartvisning_shared::{LayerKind, LayerSummary, ToggleRequest};
use leptos::prelude::*;

use crate::app::{ActiveProject, LayerList, ProjectCatalog, dispatch};
use crate::sync::SyncEvent;

const SECTION_TITLE: &str = "font-size: 0.7rem; font-weight: 600; letter-spacing: 0.08em; text-transform: uppercase; color: #6b7280; margin: 16px 0 6px;";
const ROW: &str = "display: flex; align-items: center; gap: 8px; padding: 4px 0; font-size: 0.85rem; color: #1f2933; cursor: pointer;";

#[component]
pub fn Sidebar() -> impl IntoView {
    view! {
        <aside
            class="sidebar"
            style="height: 100%; overflow-y: auto; padding: 16px 20px; box-sizing: border-box; background: #ffffff; border-left: 1px solid #c9ced6; font-family: system-ui, sans-serif;"
        >
            <SidebarHeader />
            <ProjectList />
            <BaseLayerList />
            <OverlayList />
        </aside>
    }
}

#[component]
fn SidebarHeader() -> impl IntoView {
    let ActiveProject(project) = expect_context();

    view! {
        <div style="border-bottom: 1px solid #e5e7eb; padding-bottom: 10px;">
            <div style="font-size: 1.1rem; font-weight: 700; color: #1f2933;">"Kartvisning"</div>
            <div style="font-size: 0.75rem; color: #6b7280; margin-top: 2px;">
                {move || project.get().unwrap_or_default()}
            </div>
        </div>
    }
}

#[component]
fn ProjectList() -> impl IntoView {
    let ProjectCatalog(catalog) = expect_context();
    let ActiveProject(active) = expect_context();

    view! {
        <Show when=move || !catalog.get().is_empty()>
            <div style=SECTION_TITLE>"Prosjekter"</div>
            {move || {
                let current = active.get();
                catalog
                    .get()
                    .into_iter()
                    .map(|entry| {
                        let is_active = current.as_deref() == Some(entry.project_name.as_str());
                        let name = entry.project_name.clone();
                        view! {
                            <div
                                style=ROW
                                style:font-weight=if is_active { "600" } else { "400" }
                                on:click=move |_| {
                                    if !is_active {
                                        dispatch(SyncEvent::ProjectChanged(name.clone()));
                                    }
                                }
                            >
                                {entry.site_title}
                            </div>
                        }
                    })
                    .collect_view()
            }}
        </Show>
    }
}

#[component]
fn BaseLayerList() -> impl IntoView {
    let LayerList(layers) = expect_context();
    let bases = move || -> Vec<LayerSummary> {
        layers
            .get()
            .into_iter()
            .filter(|l| l.kind == LayerKind::Tile && l.base)
            .collect()
    };

    view! {
        <Show when=move || !bases().is_empty()>
            <div style=SECTION_TITLE>"Bakgrunnskart"</div>
            {move || {
                bases()
                    .into_iter()
                    .map(|layer| {
                        let guid = layer.guid.clone();
                        view! {
                            <label style=ROW>
                                <input
                                    type="radio"
                                    name="base-layer"
                                    prop:checked=layer.visibility.is_visible()
                                    on:change=move |_| dispatch(SyncEvent::BaseLayerSelected(guid.clone()))
                                />
                                {layer.name}
                            </label>
                        }
                    })
                    .collect_view()
            }}
        </Show>
    }
}

#[component]
fn OverlayList() -> impl IntoView {
    let LayerList(layers) = expect_context();
    let overlays = move || -> Vec<LayerSummary> {
        layers.get().into_iter().filter(|l| !l.base).collect()
    };

    view! {
        <Show when=move || !overlays().is_empty()>
            <div style=SECTION_TITLE>"Kartlag"</div>
            {move || {
                overlays()
                    .into_iter()
                    .map(|layer| {
                        let request = ToggleRequest {
                            kind: layer.kind,
                            guid: layer.guid.clone(),
                        };
                        view! {
                            <label style=ROW>
                                <input
                                    type="checkbox"
                                    prop:checked=layer.visibility.is_visible()
                                    on:change=move |_| dispatch(SyncEvent::ToggleRequested(request.clone()))
                                />
                                {layer.name}
                            </label>
                        }
                    })
                    .collect_view()
            }}
        </Show>
    }
}
