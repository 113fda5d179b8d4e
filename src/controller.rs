// stterm - terminal console for the SmartThings API
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! One resource screen: catalog, selection, detail editor and import
//! browser, kept consistent with the platform across operator actions.
//!
//! Every public operation reports its own failures to the status line and
//! returns whether it completed. Nothing here propagates an error to the
//! front-end, and a failed operation leaves catalog and detail text as
//! they were.

use crate::catalog::Catalog;
use crate::editor::{self, DetailEditor};
use crate::error::{ConsoleError, ConsoleResult};
use crate::import::{self, IMPORT_EXTENSION, ImportBrowser};
use crate::report::StatusLine;
use crate::resource::{CopyNaming, Remote, ResourceKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    pub copy_naming: CopyNaming,
    pub import_root: PathBuf,
    pub import_extension: String,
    /// Container id or name imports go to when the document names none.
    pub default_container: Option<String>,
}

impl ControllerOptions {
    pub fn for_kind<K: ResourceKind>() -> Self {
        Self {
            copy_naming: K::default_copy_naming(),
            import_root: PathBuf::from("."),
            import_extension: IMPORT_EXTENSION.to_string(),
            default_container: None,
        }
    }
}

pub struct Controller<K: ResourceKind, R: Remote<K>> {
    remote: R,
    catalog: Catalog<K>,
    selected: Option<String>,
    editor: DetailEditor,
    import: ImportBrowser,
    status: StatusLine,
    options: ControllerOptions,
}

impl<K: ResourceKind, R: Remote<K>> Controller<K, R> {
    pub fn new(remote: R, options: ControllerOptions) -> Self {
        Self {
            remote,
            catalog: Catalog::default(),
            selected: None,
            editor: DetailEditor::default(),
            import: ImportBrowser::default(),
            status: StatusLine::default(),
            options,
        }
    }

    /// Initial load when the screen is entered.
    pub fn setup(&mut self) -> bool {
        debug!(kind = K::SINGULAR, "screen setup");
        self.refresh()
    }

    /// Replaces the catalog with a fresh fetch. The selection survives when
    /// its key is still present, and the detail pane shows the server copy.
    pub fn refresh(&mut self) -> bool {
        match Catalog::load(&mut self.remote) {
            Ok(catalog) => {
                self.catalog = catalog;
                self.reconcile_selection();
                true
            }
            Err(err) => {
                self.status.error(&err);
                false
            }
        }
    }

    /// Shows `key` in the detail pane. Unsaved edits are dropped with a
    /// warning.
    pub fn select(&mut self, key: &str) -> bool {
        let Some(resource) = self.catalog.get(key).cloned() else {
            return false;
        };
        if self.editor.is_dirty() {
            let discarded = match self.selected.as_deref() {
                Some(previous) => format!("unsaved edits to {} {previous} were discarded", K::SINGULAR),
                None => "unsaved edits were discarded".to_string(),
            };
            self.status.warn(discarded);
        }
        self.selected = Some(key.to_string());
        self.show(&resource);
        true
    }

    pub fn select_index(&mut self, index: usize) -> bool {
        match self.catalog.entries().get(index) {
            Some(entry) => {
                let key = entry.key.clone();
                self.select(&key)
            }
            None => false,
        }
    }

    pub fn edit(&mut self) {
        self.editor.begin_edit();
    }

    /// Saves the detail pane's current text.
    pub fn save(&mut self, copy: bool) -> bool {
        let text = self.editor.text();
        self.save_text(&text, copy)
    }

    /// Update-in-place, or create a renamed copy when `copy` is set.
    /// Blank text is nothing to save and touches neither platform nor state.
    pub fn save_text(&mut self, text: &str, copy: bool) -> bool {
        if editor::is_blank(text) {
            debug!(kind = K::SINGULAR, "blank text, nothing to save");
            return false;
        }

        match self.try_save(text, copy) {
            Ok(key) => {
                let verb = if copy { "copied" } else { "updated" };
                self.status.info(format!("{} {verb}!", noun::<K>()));
                self.selected = Some(key);
                self.editor.end_edit();
                self.refresh();
                true
            }
            Err(err) => {
                self.status.error(&err);
                if err.is_partial() {
                    self.refresh();
                }
                false
            }
        }
    }

    /// Deletes the selected resource; nothing selected is a no-op.
    pub fn delete(&mut self) -> bool {
        let Some(key) = self.selected.clone() else {
            return false;
        };
        let Some(resource) = self.catalog.get(&key).cloned() else {
            return false;
        };

        let result = self
            .container_for(&key, &resource)
            .and_then(|container| self.remote.delete(&key, &container));
        match result {
            Ok(()) => {
                info!(kind = K::SINGULAR, key = %key, "deleted");
                self.catalog.remove(&key);
                self.selected = None;
                self.editor.clear();
                self.status.info(format!("{} deleted!", noun::<K>()));
                self.refresh();
                true
            }
            Err(err) => {
                self.status.error(&err);
                false
            }
        }
    }

    /// Opens the import browser, or closes it when it is already open.
    pub fn toggle_import(&mut self) -> bool {
        let root = self.options.import_root.clone();
        match self.import.toggle(&root, &self.options.import_extension) {
            Ok(()) => true,
            Err(err) => {
                self.status.error(&err);
                false
            }
        }
    }

    pub fn import_selected(&mut self) -> bool {
        let Some(path) = self.import.selected_path().map(Path::to_path_buf) else {
            return false;
        };
        self.import_file(&path)
    }

    /// Creates a resource from a local document. On failure the browser
    /// stays as it is so another file can be picked.
    pub fn import_file(&mut self, path: &Path) -> bool {
        match self.try_import(path) {
            Ok(key) => {
                info!(kind = K::SINGULAR, key = %key, path = %path.display(), "imported");
                self.import.close();
                self.status.info(format!("{} added!", noun::<K>()));
                self.selected = Some(key);
                self.refresh();
                true
            }
            Err(err) => {
                self.status.error(&err);
                false
            }
        }
    }

    pub fn catalog(&self) -> &Catalog<K> {
        &self.catalog
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_resource(&self) -> Option<&K::Resource> {
        self.selected.as_deref().and_then(|key| self.catalog.get(key))
    }

    pub fn editor(&self) -> &DetailEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut DetailEditor {
        &mut self.editor
    }

    pub fn import(&self) -> &ImportBrowser {
        &self.import
    }

    pub fn import_mut(&mut self) -> &mut ImportBrowser {
        &mut self.import
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut StatusLine {
        &mut self.status
    }

    #[cfg(test)]
    pub fn remote_mut(&mut self) -> &mut R {
        &mut self.remote
    }

    fn show(&mut self, resource: &K::Resource) {
        match editor::render(resource) {
            Ok(text) => self.editor.load(&text),
            Err(err) => {
                self.editor.clear();
                self.status.error(&err);
            }
        }
    }

    fn reconcile_selection(&mut self) {
        let current = self
            .selected
            .as_deref()
            .and_then(|key| self.catalog.get(key))
            .cloned();
        match current {
            Some(resource) => self.show(&resource),
            None => {
                if let Some(key) = self.selected.take() {
                    debug!(kind = K::SINGULAR, key = %key, "selection no longer present");
                }
                self.editor.clear();
            }
        }
    }

    fn try_save(&mut self, text: &str, copy: bool) -> ConsoleResult<String> {
        let resource: K::Resource = editor::parse(text, K::SINGULAR)?;
        let mut request = K::request(&resource);

        if copy {
            let container = self.copy_container(&resource)?;
            let catalog = &self.catalog;
            let name = self
                .options
                .copy_naming
                .derive(K::request_name(&request), |candidate| {
                    catalog.contains_label(candidate)
                });
            debug!(kind = K::SINGULAR, name = %name, container = %container, "creating copy");
            K::rename(&mut request, name);
            let created = self.remote.create(&container, &request)?;
            return Ok(K::key(&created));
        }

        let parsed = K::key(&resource);
        if parsed.trim().is_empty() {
            return Err(ConsoleError::other(format!(
                "{} has no id to update; save it as a copy instead",
                K::SINGULAR
            )));
        }
        // A key edited in the text renames the selected resource; it must
        // not land on another entry of the catalog.
        let key = match self.selected.clone() {
            Some(selected) if selected != parsed => {
                if self.catalog.get(&parsed).is_some() {
                    return Err(ConsoleError::other(format!(
                        "another {} is already called {parsed}; pick a different name",
                        K::SINGULAR
                    )));
                }
                selected
            }
            _ => parsed,
        };
        let container = self.container_for(&key, &resource)?;
        debug!(kind = K::SINGULAR, key = %key, container = %container, "updating");
        let updated = self.remote.update(&key, &container, &request)?;
        Ok(K::key(&updated))
    }

    fn try_import(&mut self, path: &Path) -> ConsoleResult<String> {
        let text = import::read_candidate(path)?;
        let resource: K::Resource = editor::parse(&text, K::SINGULAR)?;
        let container = self.import_container(&resource)?;
        let created = self.remote.create(&container, &K::request(&resource))?;
        Ok(K::key(&created))
    }

    /// Container an existing resource's update and delete calls go to.
    fn container_for(&mut self, key: &str, resource: &K::Resource) -> ConsoleResult<String> {
        if !K::requires_container_resolution()
            && let Some(container) = K::carried_container(resource)
        {
            return Ok(container);
        }
        self.resolve_container(key, resource)
    }

    /// A copy goes next to its source; a document without a key is placed
    /// the way an import would be.
    fn copy_container(&mut self, resource: &K::Resource) -> ConsoleResult<String> {
        let key = K::key(resource);
        if key.trim().is_empty() {
            self.import_container(resource)
        } else {
            self.container_for(&key, resource)
        }
    }

    /// Finds the container that actually lists the resource. The hinted
    /// container is probed first but must still prove membership.
    fn resolve_container(&mut self, key: &str, resource: &K::Resource) -> ConsoleResult<String> {
        let mut containers = self.remote.containers()?;
        if let Some(hint) = K::container_hint(resource)
            && let Some(pos) = containers.iter().position(|c| c.id == hint)
        {
            let hinted = containers.remove(pos);
            containers.insert(0, hinted);
        }

        for container in &containers {
            let members = self.remote.list(Some(&container.id))?;
            if members.iter().any(|member| K::key(member) == key) {
                debug!(kind = K::SINGULAR, key = %key, container = %container.id, "container resolved");
                return Ok(container.id.clone());
            }
        }

        Err(ConsoleError::other(format!(
            "{} {key} was not found in any {}",
            K::SINGULAR,
            K::CONTAINER
        )))
    }

    fn import_container(&mut self, resource: &K::Resource) -> ConsoleResult<String> {
        if let Some(container) = K::carried_container(resource) {
            return Ok(container);
        }

        let mut containers = self.remote.containers()?;
        if let Some(wanted) = self.options.default_container.as_deref() {
            return containers
                .into_iter()
                .find(|c| c.id == wanted || c.name == wanted)
                .map(|c| c.id)
                .ok_or_else(|| {
                    ConsoleError::other(format!(
                        "configured default {} '{wanted}' does not exist",
                        K::CONTAINER
                    ))
                });
        }

        containers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        let count = containers.len();
        let first = containers.into_iter().next().ok_or_else(|| {
            ConsoleError::other(format!("no {} available to create the {} in", K::CONTAINER, K::SINGULAR))
        })?;
        if count > 1 {
            self.status.warn(format!(
                "{count} {}s available, using '{}'",
                K::CONTAINER,
                first.name
            ));
        }
        Ok(first.id)
    }
}

/// Capitalized singular noun for status messages ("Rule").
fn noun<K: ResourceKind>() -> String {
    let mut chars = K::SINGULAR.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
