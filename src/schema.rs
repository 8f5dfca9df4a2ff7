//! Action catalog resolution.
//!
//! The engine publishes a JSON "action dump" describing every native action,
//! its tags and its argument shapes. [`ActionSchema`] flattens it into a
//! category index (codeblock name → action name → spec) and an identifier
//! index (block identifier → codeblock name). Built once, then shared by
//! reference for the whole compilation.

use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;
use log::{debug, trace};
use serde::Deserialize;
use thiserror::Error;

use crate::error::AppError;

/// Action key used for block kinds whose real action is a user-chosen label.
pub const DYNAMIC_ACTION: &str = "dynamic";

/// Block identifiers that have no fixed action set.
pub const DYNAMIC_IDENTIFIERS: [&str; 4] = ["func", "call_func", "process", "start_process"];

pub fn is_dynamic_identifier(identifier: &str) -> bool {
    DYNAMIC_IDENTIFIERS.contains(&identifier)
}

// ── Catalog document ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Catalog {
    #[serde(default)]
    actions: Vec<CatalogAction>,
    #[serde(default)]
    codeblocks: Vec<CatalogCodeblock>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogAction {
    codeblock_name: String,
    name: String,
    #[serde(default)]
    tags: Vec<TagSpec>,
    #[serde(default)]
    icon: CatalogIcon,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogIcon {
    #[serde(default)]
    arguments: Vec<CatalogArgument>,
}

#[derive(Debug, Deserialize)]
struct CatalogArgument {
    #[serde(rename = "type")]
    ty: Option<String>,
    #[serde(default)]
    plural: bool,
    #[serde(default)]
    optional: bool,
}

#[derive(Debug, Deserialize)]
struct CatalogCodeblock {
    name: String,
    identifier: String,
}

// ── Resolved schema ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagOption {
    pub name: String,
}

/// A named block option with a default and an enumerated set of values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagSpec {
    pub name: String,
    pub slot: usize,
    pub default_option: String,
    #[serde(default)]
    pub options: Vec<TagOption>,
}

impl TagSpec {
    pub fn allows(&self, option: &str) -> bool {
        self.options.iter().any(|o| o.name == option)
    }
}

/// Shape of one native action argument, e.g. `NUMBER` plural optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    pub ty: String,
    pub plural: bool,
    pub optional: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSpec {
    pub name: String,
    pub tags: Vec<TagSpec>,
    pub arguments: Vec<ArgSpec>,
}

#[derive(Debug, Clone, Default)]
pub struct Category {
    pub name: String,
    pub identifier: Option<String>,
    pub actions: IndexMap<String, ActionSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Unknown codeblock category '{0}'")]
    UnknownCategory(String),
    #[error("Unknown action '{action}' in codeblock category '{category}'")]
    UnknownAction { category: String, action: String },
    #[error("Unknown codeblock identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("Codeblock category '{0}' has no identifier")]
    MissingIdentifier(String),
}

#[derive(Debug, Clone, Default)]
pub struct ActionSchema {
    categories: IndexMap<String, Category>,
    identifiers: HashMap<String, String>,
}

impl ActionSchema {
    /// Parse a catalog document. Errors carry the JSON path of the failure.
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        let de = &mut serde_json::Deserializer::from_str(json);
        let catalog: Catalog =
            serde_path_to_error::deserialize(de).map_err(|e| AppError::json(&e, None))?;
        Ok(Self::from_catalog(catalog))
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let data = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
        debug!("loading action catalog from {}", path.display());
        Self::from_json(&data)
    }

    fn from_catalog(catalog: Catalog) -> Self {
        let mut schema = ActionSchema::default();

        for action in catalog.actions {
            let arguments = action
                .icon
                .arguments
                .into_iter()
                .filter_map(|a| match a.ty {
                    Some(ty) => Some(ArgSpec {
                        ty,
                        plural: a.plural,
                        optional: a.optional,
                    }),
                    None => {
                        trace!("dropping untyped argument of '{}'", action.name);
                        None
                    }
                })
                .collect();

            let category = schema
                .categories
                .entry(action.codeblock_name.clone())
                .or_insert_with(|| Category {
                    name: action.codeblock_name.clone(),
                    ..Category::default()
                });
            category.actions.insert(
                action.name.clone(),
                ActionSpec {
                    name: action.name,
                    tags: action.tags,
                    arguments,
                },
            );
        }

        for cb in catalog.codeblocks {
            let category = schema
                .categories
                .entry(cb.name.clone())
                .or_insert_with(|| {
                    trace!("codeblock '{}' has no actions", cb.name);
                    Category {
                        name: cb.name.clone(),
                        ..Category::default()
                    }
                });
            category.identifier = Some(cb.identifier.clone());
            if is_dynamic_identifier(&cb.identifier) {
                category
                    .actions
                    .entry(DYNAMIC_ACTION.to_string())
                    .or_insert_with(|| ActionSpec {
                        name: DYNAMIC_ACTION.to_string(),
                        ..ActionSpec::default()
                    });
            }
            schema
                .identifiers
                .entry(cb.identifier)
                .or_insert(cb.name);
        }

        debug!(
            "action catalog: {} categories, {} actions, {} identifiers",
            schema.categories.len(),
            schema.categories.values().map(|c| c.actions.len()).sum::<usize>(),
            schema.identifiers.len()
        );
        schema
    }

    pub fn category(&self, name: &str) -> Result<&Category, SchemaError> {
        self.categories
            .get(name)
            .ok_or_else(|| SchemaError::UnknownCategory(name.to_string()))
    }

    pub fn action(&self, category: &str, action: &str) -> Result<&ActionSpec, SchemaError> {
        self.category(category)?
            .actions
            .get(action)
            .ok_or_else(|| SchemaError::UnknownAction {
                category: category.to_string(),
                action: action.to_string(),
            })
    }

    pub fn identifier_of(&self, category: &str) -> Result<&str, SchemaError> {
        self.category(category)?
            .identifier
            .as_deref()
            .ok_or_else(|| SchemaError::MissingIdentifier(category.to_string()))
    }

    pub fn category_of(&self, identifier: &str) -> Result<&str, SchemaError> {
        self.identifiers
            .get(identifier)
            .map(String::as_str)
            .ok_or_else(|| SchemaError::UnknownIdentifier(identifier.to_string()))
    }

    /// Spec of the action a block of kind `identifier` performs. Dynamic kinds
    /// always resolve to the `dynamic` entry.
    pub fn block_action(&self, identifier: &str, action: Option<&str>) -> Result<&ActionSpec, SchemaError> {
        let category = self.category_of(identifier)?;
        let key = if is_dynamic_identifier(identifier) {
            DYNAMIC_ACTION
        } else {
            action.unwrap_or(DYNAMIC_ACTION)
        };
        self.action(category, key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Small catalog shared by generator and template tests.
    pub(crate) fn fixture_json() -> serde_json::Value {
        json!({
            "actions": [
                {
                    "codeblockName": "SET VARIABLE",
                    "name": "=",
                    "tags": [],
                    "icon": { "arguments": [
                        { "type": "VARIABLE" },
                        { "type": "ANY_TYPE" }
                    ] }
                },
                {
                    "codeblockName": "SET VARIABLE",
                    "name": "+",
                    "tags": [],
                    "icon": { "arguments": [
                        { "type": "VARIABLE" },
                        { "type": "NUMBER", "plural": true }
                    ] }
                },
                { "codeblockName": "SET VARIABLE", "name": "-", "tags": [], "icon": { "arguments": [] } },
                { "codeblockName": "SET VARIABLE", "name": "x", "tags": [], "icon": { "arguments": [] } },
                { "codeblockName": "SET VARIABLE", "name": "/", "tags": [
                    { "name": "Division Mode", "slot": 26, "defaultOption": "Default",
                      "options": [{ "name": "Default" }, { "name": "Floor result" }] }
                ], "icon": { "arguments": [] } },
                { "codeblockName": "SET VARIABLE", "name": "Exponent", "tags": [], "icon": { "arguments": [] } },
                { "codeblockName": "SET VARIABLE", "name": "CreateDict", "tags": [], "icon": { "arguments": [] } },
                { "codeblockName": "SET VARIABLE", "name": "SetDictValue", "tags": [], "icon": { "arguments": [] } },
                { "codeblockName": "SET VARIABLE", "name": "GetDictValue", "tags": [], "icon": { "arguments": [] } },
                { "codeblockName": "SET VARIABLE", "name": "CreateList", "tags": [], "icon": { "arguments": [] } },
                { "codeblockName": "SET VARIABLE", "name": "SetListValue", "tags": [], "icon": { "arguments": [] } },
                { "codeblockName": "SET VARIABLE", "name": "GetListValue", "tags": [], "icon": { "arguments": [] } },
                {
                    "codeblockName": "PLAYER ACTION",
                    "name": "SendMessage",
                    "tags": [
                        { "name": "Alignment Mode", "slot": 25, "defaultOption": "Regular",
                          "options": [{ "name": "Regular" }, { "name": "Centered" }] },
                        { "name": "Text Value Merging", "slot": 26, "defaultOption": "Add spaces",
                          "options": [{ "name": "Add spaces" }, { "name": "No spaces" }] }
                    ],
                    "icon": { "arguments": [
                        { "type": "COMPONENT", "plural": true, "optional": true },
                        { "text": "" }
                    ] }
                },
                {
                    "codeblockName": "PLAYER ACTION",
                    "name": "Heal",
                    "tags": [],
                    "icon": { "arguments": [ { "type": "NUMBER", "optional": true } ] }
                },
                {
                    "codeblockName": "PLAYER ACTION",
                    "name": "ClearInv",
                    "tags": [],
                    "icon": { "arguments": [] }
                }
            ],
            "codeblocks": [
                { "name": "SET VARIABLE", "identifier": "set_var" },
                { "name": "PLAYER ACTION", "identifier": "player_action" },
                { "name": "FUNCTION", "identifier": "func" },
                { "name": "CALL FUNCTION", "identifier": "call_func" },
                { "name": "PROCESS", "identifier": "process" },
                { "name": "START PROCESS", "identifier": "start_process" }
            ]
        })
    }

    pub(crate) fn fixture() -> ActionSchema {
        ActionSchema::from_json(&fixture_json().to_string()).unwrap()
    }

    #[test]
    fn indexes_actions_by_category() {
        let schema = fixture();
        let spec = schema.action("PLAYER ACTION", "SendMessage").unwrap();
        assert_eq!(spec.tags.len(), 2);
        assert_eq!(spec.tags[1].default_option, "Add spaces");
        assert_eq!(schema.identifier_of("SET VARIABLE").unwrap(), "set_var");
        assert_eq!(schema.category_of("player_action").unwrap(), "PLAYER ACTION");
    }

    #[test]
    fn untyped_arguments_are_dropped() {
        let schema = fixture();
        let spec = schema.action("PLAYER ACTION", "SendMessage").unwrap();
        assert_eq!(
            spec.arguments,
            vec![ArgSpec {
                ty: "COMPONENT".into(),
                plural: true,
                optional: true
            }]
        );
    }

    #[test]
    fn dynamic_kinds_get_synthetic_action() {
        let schema = fixture();
        for id in DYNAMIC_IDENTIFIERS {
            let spec = schema.block_action(id, None).unwrap();
            assert_eq!(spec.name, DYNAMIC_ACTION);
            assert!(spec.tags.is_empty());
        }
        // Action names are ignored for dynamic kinds.
        assert!(schema.block_action("func", Some("main")).is_ok());
    }

    #[test]
    fn catalog_dynamic_entry_is_kept() {
        let doc = json!({
            "actions": [{
                "codeblockName": "FUNCTION",
                "name": "dynamic",
                "tags": [{ "name": "Is Hidden", "slot": 26, "defaultOption": "False",
                           "options": [{ "name": "True" }, { "name": "False" }] }],
                "icon": {}
            }],
            "codeblocks": [{ "name": "FUNCTION", "identifier": "func" }]
        });
        let schema = ActionSchema::from_json(&doc.to_string()).unwrap();
        let spec = schema.block_action("func", None).unwrap();
        assert_eq!(spec.tags.len(), 1);
        assert!(spec.tags[0].allows("False"));
        assert!(!spec.tags[0].allows("Maybe"));
    }

    #[test]
    fn misses_are_errors() {
        let schema = fixture();
        assert_eq!(
            schema.category("NOPE").unwrap_err(),
            SchemaError::UnknownCategory("NOPE".into())
        );
        assert_eq!(
            schema.action("PLAYER ACTION", "Fly").unwrap_err().to_string(),
            "Unknown action 'Fly' in codeblock category 'PLAYER ACTION'"
        );
        assert!(matches!(
            schema.category_of("nope"),
            Err(SchemaError::UnknownIdentifier(_))
        ));
    }

    #[test]
    fn codeblock_without_actions_is_tolerated() {
        let doc = json!({
            "actions": [],
            "codeblocks": [{ "name": "SELECT OBJECT", "identifier": "select_obj" }]
        });
        let schema = ActionSchema::from_json(&doc.to_string()).unwrap();
        assert!(schema.category("SELECT OBJECT").unwrap().actions.is_empty());
        assert!(schema.action("SELECT OBJECT", "Anything").is_err());
    }

    #[test]
    fn malformed_catalog_reports_json_path() {
        let doc = json!({ "actions": [{ "codeblockName": "X", "name": 5 }] });
        let err = ActionSchema::from_json(&doc.to_string()).unwrap_err();
        match err {
            AppError::Json { path, .. } => assert_eq!(path, "actions[0].name"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
