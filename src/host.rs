//! Host scene integration.
//!
//! The browser only needs three things from a 3D host: find a child under a
//! parent path, create one, and set a parameter on it. [`HostIntegration`]
//! captures that; [`NoHost`] stands in when no host is attached, and
//! [`SceneGraph`] is an in-process graph used by the standalone binary and
//! the tests.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use parking_lot::Mutex;

use crate::config::LightOptions;
use crate::error::HostError;

/// Opaque handle to a host entity, by full path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityRef(pub String);

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Float(f64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// What a `find_child` predicate gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct EntityInfo<'a> {
    pub entity: &'a EntityRef,
    pub name: &'a str,
    pub type_name: &'a str,
}

pub trait HostIntegration: Send + Sync {
    /// Whether a host is attached at all.
    fn is_available(&self) -> bool {
        true
    }

    fn find_child(
        &self,
        parent: &str,
        predicate: &dyn Fn(&EntityInfo<'_>) -> bool,
    ) -> Result<Option<EntityRef>, HostError>;

    fn create_child(&self, parent: &str, type_name: &str, name: &str)
    -> Result<EntityRef, HostError>;

    fn set_param(&self, entity: &EntityRef, name: &str, value: ParamValue)
    -> Result<(), HostError>;
}

/// Used when no host application is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHost;

impl HostIntegration for NoHost {
    fn is_available(&self) -> bool {
        false
    }

    fn find_child(
        &self,
        _parent: &str,
        _predicate: &dyn Fn(&EntityInfo<'_>) -> bool,
    ) -> Result<Option<EntityRef>, HostError> {
        Err(HostError::Unavailable)
    }

    fn create_child(
        &self,
        _parent: &str,
        _type_name: &str,
        _name: &str,
    ) -> Result<EntityRef, HostError> {
        Err(HostError::Unavailable)
    }

    fn set_param(
        &self,
        _entity: &EntityRef,
        _name: &str,
        _value: ParamValue,
    ) -> Result<(), HostError> {
        Err(HostError::Unavailable)
    }
}

#[derive(Debug, Clone)]
struct Node {
    entity: EntityRef,
    parent: String,
    name: String,
    type_name: String,
    /// Declared parameters; `None` until first set.
    params: BTreeMap<String, Option<ParamValue>>,
}

#[derive(Debug, Default)]
struct SceneState {
    parents: BTreeSet<String>,
    /// Creation order, which is also lookup order.
    nodes: Vec<Node>,
    /// Parameters each node type declares.
    schemas: BTreeMap<String, Vec<String>>,
}

/// Small in-process scene graph.
///
/// Nodes only accept parameters their type declared via
/// [`SceneGraph::declare_type`]; anything else is a
/// [`HostError::MissingParam`], the same way a real host rejects a
/// parameter its node does not have.
#[derive(Debug, Default)]
pub struct SceneGraph {
    state: Mutex<SceneState>,
}

impl SceneGraph {
    /// An empty graph with a single parent path.
    #[must_use]
    pub fn new(parent: &str) -> Self {
        let graph = Self::default();
        graph.state.lock().parents.insert(parent.to_string());
        graph
    }

    /// A graph whose parent path and light type match `light`.
    #[must_use]
    pub fn for_light(light: &LightOptions) -> Self {
        let graph = Self::new(&light.parent_path);
        graph.declare_type(
            &light.type_name,
            &[
                light.map_param.as_str(),
                light.rotation_param.as_str(),
                light.intensity_param.as_str(),
            ],
        );
        graph
    }

    pub fn declare_type(&self, type_name: &str, params: &[&str]) {
        self.state.lock().schemas.insert(
            type_name.to_string(),
            params.iter().map(|p| (*p).to_string()).collect(),
        );
    }

    /// Current value of a parameter, if the entity exists and it was set.
    #[must_use]
    pub fn param(&self, entity: &EntityRef, name: &str) -> Option<ParamValue> {
        let state = self.state.lock();
        state
            .nodes
            .iter()
            .find(|n| &n.entity == entity)
            .and_then(|n| n.params.get(name).cloned().flatten())
    }

    /// Children of `parent`, optionally filtered by type.
    #[must_use]
    pub fn children(&self, parent: &str, type_name: Option<&str>) -> Vec<EntityRef> {
        let state = self.state.lock();
        state
            .nodes
            .iter()
            .filter(|n| n.parent == parent)
            .filter(|n| type_name.is_none_or(|t| n.type_name == t))
            .map(|n| n.entity.clone())
            .collect()
    }

    /// Remove an entity, as if a user deleted it in the host.
    pub fn delete(&self, entity: &EntityRef) -> bool {
        let mut state = self.state.lock();
        let before = state.nodes.len();
        state.nodes.retain(|n| &n.entity != entity);
        state.nodes.len() != before
    }
}

impl HostIntegration for SceneGraph {
    fn find_child(
        &self,
        parent: &str,
        predicate: &dyn Fn(&EntityInfo<'_>) -> bool,
    ) -> Result<Option<EntityRef>, HostError> {
        let state = self.state.lock();
        if !state.parents.contains(parent) {
            return Err(HostError::NotFound(parent.to_string()));
        }
        Ok(state
            .nodes
            .iter()
            .filter(|n| n.parent == parent)
            .find(|n| {
                predicate(&EntityInfo {
                    entity: &n.entity,
                    name: &n.name,
                    type_name: &n.type_name,
                })
            })
            .map(|n| n.entity.clone()))
    }

    fn create_child(
        &self,
        parent: &str,
        type_name: &str,
        name: &str,
    ) -> Result<EntityRef, HostError> {
        let mut state = self.state.lock();
        if !state.parents.contains(parent) {
            return Err(HostError::NotFound(parent.to_string()));
        }
        if name.is_empty() || name.contains('/') {
            return Err(HostError::Rejected(format!("invalid node name {name:?}")));
        }

        // Hosts keep sibling names unique by appending a counter.
        let taken = |candidate: &str| {
            state
                .nodes
                .iter()
                .any(|n| n.parent == parent && n.name == candidate)
        };
        let mut unique = name.to_string();
        let mut suffix = 1;
        while taken(&unique) {
            unique = format!("{name}{suffix}");
            suffix += 1;
        }

        let entity = EntityRef(format!("{}/{}", parent.trim_end_matches('/'), unique));
        let params = state
            .schemas
            .get(type_name)
            .map(|names| names.iter().map(|p| (p.clone(), None)).collect())
            .unwrap_or_default();
        state.nodes.push(Node {
            entity: entity.clone(),
            parent: parent.to_string(),
            name: unique,
            type_name: type_name.to_string(),
            params,
        });
        Ok(entity)
    }

    fn set_param(
        &self,
        entity: &EntityRef,
        name: &str,
        value: ParamValue,
    ) -> Result<(), HostError> {
        let mut state = self.state.lock();
        let node = state
            .nodes
            .iter_mut()
            .find(|n| &n.entity == entity)
            .ok_or_else(|| HostError::NotFound(entity.to_string()))?;
        match node.params.get_mut(name) {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }
            None => Err(HostError::MissingParam {
                entity: entity.to_string(),
                param: name.to_string(),
            }),
        }
    }
}
