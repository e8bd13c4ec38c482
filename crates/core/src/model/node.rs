use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::model::ids::{ScopeType, UnitId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TreeError {
    #[error("content node is missing an id")]
    MissingNodeId,
}

//
// ─── UNIT POLICY ───────────────────────────────────────────────────────────────
//

/// Decides which nodes of a tree count as completable units.
///
/// The original data inferred this from whether `children` happened to be
/// empty, with different content types silently counting differently. Here
/// the choice is an explicit per-tree setting, defaulted per content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitPolicy {
    /// A node counts only when it has no children. Containers are pure
    /// aggregation scopes. Book default: a chapter is toggleable as a unit
    /// only when it has no sections of its own.
    LeafNodes,
    /// Every distinct node counts, containers included. Video default,
    /// where chapter lists are flat.
    AllNodes,
    /// Root nodes never count themselves; descendants count when childless.
    /// Course default: modules aggregate their lessons, never themselves.
    ChildrenOnly,
}

impl UnitPolicy {
    #[must_use]
    pub fn default_for(scope_type: ScopeType) -> Self {
        match scope_type {
            ScopeType::Book => UnitPolicy::LeafNodes,
            ScopeType::Video => UnitPolicy::AllNodes,
            ScopeType::Course => UnitPolicy::ChildrenOnly,
        }
    }
}

//
// ─── VALIDATED TREE ────────────────────────────────────────────────────────────
//

/// A validated node of a content tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentNode {
    id: UnitId,
    title: Option<String>,
    children: Vec<ContentNode>,
}

impl ContentNode {
    #[must_use]
    pub fn id(&self) -> &UnitId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn children(&self) -> &[ContentNode] {
        &self.children
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A validated forest of content roots for one scope, tagged with its
/// content type and counting policy.
///
/// The raw input may contain duplicate ids (the same chapter appearing in
/// two places); validation does not reject them, aggregation counts each
/// distinct id once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTree {
    scope_type: ScopeType,
    policy: UnitPolicy,
    roots: Vec<ContentNode>,
}

impl ContentTree {
    /// Build a tree with the default policy for its content type.
    #[must_use]
    pub fn new(scope_type: ScopeType, roots: Vec<ContentNode>) -> Self {
        Self {
            scope_type,
            policy: UnitPolicy::default_for(scope_type),
            roots,
        }
    }

    /// Override the counting policy (explicit, never shape-inferred).
    #[must_use]
    pub fn with_policy(mut self, policy: UnitPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn scope_type(&self) -> ScopeType {
        self.scope_type
    }

    #[must_use]
    pub fn policy(&self) -> UnitPolicy {
        self.policy
    }

    #[must_use]
    pub fn roots(&self) -> &[ContentNode] {
        &self.roots
    }
}

//
// ─── DRAFTS (INGESTION BOUNDARY) ───────────────────────────────────────────────
//

/// Loose node shape as it arrives from the content service.
///
/// Anything goes at this layer: a missing or non-array `children` degrades
/// to a leaf, extra presentation fields are ignored. Only `validate` turns
/// a draft into the strict domain type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_children")]
    pub children: Vec<NodeDraft>,
}

impl NodeDraft {
    /// Draft leaf with an id, mostly for tests and manual construction.
    #[must_use]
    pub fn leaf(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            title: None,
            children: Vec::new(),
        }
    }

    /// Draft node with children.
    #[must_use]
    pub fn branch(id: impl Into<String>, children: Vec<NodeDraft>) -> Self {
        Self {
            id: Some(id.into()),
            title: None,
            children,
        }
    }

    /// Validate this draft into a `ContentNode`.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::MissingNodeId` if this node or any descendant
    /// lacks a non-empty id.
    pub fn validate(self) -> Result<ContentNode, TreeError> {
        let id = match self.id {
            Some(id) if !id.trim().is_empty() => UnitId::new(id),
            _ => return Err(TreeError::MissingNodeId),
        };
        let children = self
            .children
            .into_iter()
            .map(NodeDraft::validate)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ContentNode {
            id,
            title: self.title,
            children,
        })
    }
}

/// Loose forest shape for one scope.
#[derive(Debug, Clone, Default)]
pub struct TreeDraft {
    pub roots: Vec<NodeDraft>,
}

impl TreeDraft {
    /// Read a forest out of an arbitrary JSON value.
    ///
    /// Accepts a bare array of nodes, an object carrying the forest under a
    /// conventional key (`roots`, `chapters`, `modules`, `items`), or a
    /// single node object. `null` and unrecognized shapes yield an empty
    /// forest rather than an error; aggregation over an empty forest is
    /// all zeros.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let roots = match value {
            Value::Array(_) => children_from_value(value),
            Value::Object(obj) => {
                if let Some(nested) = ["roots", "chapters", "modules", "items"]
                    .iter()
                    .find_map(|key| obj.get(*key))
                {
                    children_from_value(nested)
                } else if obj.contains_key("id") {
                    draft_from_value(value).into_iter().collect()
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        };
        Self { roots }
    }

    /// Validate all roots into a `ContentTree` with the default policy for
    /// the given content type.
    ///
    /// # Errors
    ///
    /// Returns `TreeError` if any node lacks an id.
    pub fn validate(self, scope_type: ScopeType) -> Result<ContentTree, TreeError> {
        let roots = self
            .roots
            .into_iter()
            .map(NodeDraft::validate)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ContentTree::new(scope_type, roots))
    }
}

fn lenient_children<'de, D>(deserializer: D) -> Result<Vec<NodeDraft>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(children_from_value(&value))
}

fn children_from_value(value: &Value) -> Vec<NodeDraft> {
    match value {
        Value::Array(items) => items.iter().filter_map(draft_from_value).collect(),
        _ => Vec::new(),
    }
}

fn draft_from_value(value: &Value) -> Option<NodeDraft> {
    let obj = value.as_object()?;
    Some(NodeDraft {
        id: obj.get("id").and_then(Value::as_str).map(str::to_owned),
        title: obj.get("title").and_then(Value::as_str).map(str::to_owned),
        children: obj
            .get("children")
            .map(children_from_value)
            .unwrap_or_default(),
    })
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validates_nested_draft() {
        let draft = NodeDraft::branch("c1", vec![NodeDraft::leaf("s1"), NodeDraft::leaf("s2")]);
        let node = draft.validate().unwrap();
        assert_eq!(node.id().as_str(), "c1");
        assert_eq!(node.children().len(), 2);
        assert!(node.children()[0].is_leaf());
    }

    #[test]
    fn missing_id_is_rejected() {
        let draft = NodeDraft {
            id: Some("  ".into()),
            title: None,
            children: Vec::new(),
        };
        assert_eq!(draft.validate().unwrap_err(), TreeError::MissingNodeId);
    }

    #[test]
    fn non_array_children_degrade_to_leaf() {
        let value = json!({ "id": "c1", "children": "oops" });
        let draft: NodeDraft = serde_json::from_value(value).unwrap();
        assert!(draft.children.is_empty());
        assert!(draft.validate().unwrap().is_leaf());
    }

    #[test]
    fn forest_from_object_with_chapters_key() {
        let value = json!({
            "chapters": [
                { "id": "c1", "children": [{ "id": "s1" }, { "id": "s2" }] },
                { "id": "c2" }
            ]
        });
        let tree = TreeDraft::from_value(&value)
            .validate(ScopeType::Book)
            .unwrap();
        assert_eq!(tree.roots().len(), 2);
        assert_eq!(tree.policy(), UnitPolicy::LeafNodes);
    }

    #[test]
    fn null_input_yields_empty_forest() {
        let tree = TreeDraft::from_value(&Value::Null)
            .validate(ScopeType::Course)
            .unwrap();
        assert!(tree.roots().is_empty());
    }

    #[test]
    fn default_policies_per_scope_type() {
        assert_eq!(
            UnitPolicy::default_for(ScopeType::Book),
            UnitPolicy::LeafNodes
        );
        assert_eq!(
            UnitPolicy::default_for(ScopeType::Video),
            UnitPolicy::AllNodes
        );
        assert_eq!(
            UnitPolicy::default_for(ScopeType::Course),
            UnitPolicy::ChildrenOnly
        );
    }
}
