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

//! Capabilities every manageable resource kind provides.
//!
//! A screen is one [`crate::controller::Controller`] instantiated with a
//! [`ResourceKind`] (pure data policy) and a [`Remote`] (the calls against
//! the platform). Adding a resource type means implementing both traits.

use crate::error::ConsoleResult;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use uuid::Uuid;

/// Parent scope a resource lives under (a location, an installed app).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    pub name: String,
}

/// How save-as-copy derives the name of the new resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "style", content = "value", rename_all = "lowercase")]
pub enum CopyNaming {
    /// Append a suffix, e.g. `Night Mode-copy`.
    Suffix(String),
    /// Replace the name with a fresh UUID.
    Token,
}

impl CopyNaming {
    /// Derives a name for which `taken` is false.
    pub fn derive(&self, name: &str, taken: impl Fn(&str) -> bool) -> String {
        match self {
            Self::Suffix(suffix) => {
                let base = format!("{name}{suffix}");
                if !taken(&base) {
                    return base;
                }
                (2u32..)
                    .map(|n| format!("{base}-{n}"))
                    .find(|candidate| !taken(candidate))
                    .unwrap_or_else(|| base.clone())
            }
            Self::Token => loop {
                let token = Uuid::new_v4().to_string();
                if !taken(&token) {
                    return token;
                }
            },
        }
    }
}

pub trait ResourceKind {
    type Resource: Clone + Debug + PartialEq + Serialize + DeserializeOwned;
    /// Body of create/update calls; mutable fields only.
    type Request: Debug + Serialize;

    /// Lowercase singular noun used in messages ("rule").
    const SINGULAR: &'static str;
    /// Title of the screen ("Rules").
    const TITLE: &'static str;
    /// What the containers are called ("location").
    const CONTAINER: &'static str;

    fn key(resource: &Self::Resource) -> String;

    fn label(resource: &Self::Resource) -> String;

    fn request(resource: &Self::Resource) -> Self::Request;

    fn request_name(request: &Self::Request) -> &str;

    fn rename(request: &mut Self::Request, name: String);

    fn default_copy_naming() -> CopyNaming;

    /// Whether the container must be verified against the platform before
    /// a mutation, even when the resource names one.
    fn requires_container_resolution() -> bool;

    /// Container recorded on the resource itself.
    fn carried_container(resource: &Self::Resource) -> Option<String>;

    /// Container worth probing first during resolution.
    fn container_hint(resource: &Self::Resource) -> Option<String> {
        Self::carried_container(resource)
    }
}

/// Remote Resource Client boundary for one resource kind.
pub trait Remote<K: ResourceKind> {
    /// Lists resources, optionally scoped to one container.
    fn list(&mut self, container: Option<&str>) -> ConsoleResult<Vec<K::Resource>>;

    fn create(&mut self, container: &str, request: &K::Request) -> ConsoleResult<K::Resource>;

    fn update(
        &mut self,
        key: &str,
        container: &str,
        request: &K::Request,
    ) -> ConsoleResult<K::Resource>;

    fn delete(&mut self, key: &str, container: &str) -> ConsoleResult<()>;

    fn containers(&mut self) -> ConsoleResult<Vec<Container>>;
}
