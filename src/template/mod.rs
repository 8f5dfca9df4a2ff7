//! Code template IR: items, codeblocks, codelines and programs, plus their
//! wire JSON form.

pub mod encode;

use indexmap::IndexMap;
use serde_json::{json, Value};
use thiserror::Error;

use crate::schema::{is_dynamic_identifier, ActionSchema, SchemaError};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("Unknown tag '{tag}' for action '{action}'")]
    UnknownTag { tag: String, action: String },
    #[error("Invalid value '{option}' of tag '{tag}' for action '{action}' in codeblock '{category}'")]
    InvalidTagOption {
        option: String,
        tag: String,
        action: String,
        category: String,
    },
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("gzip stream error: {0}")]
    Gzip(#[from] std::io::Error),
    #[error("template JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ── Items ────────────────────────────────────────────────────────

/// Payload of an argument item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    Tag {
        block: String,
        action: String,
        tag: String,
        option: String,
    },
    String(String),
    Number(f64),
    StyledText(String),
    Variable { name: String, scope: String },
    Vector { x: f64, y: f64, z: f64 },
    Parameter {
        name: String,
        ty: String,
        optional: bool,
        plural: bool,
        description: String,
    },
}

impl ItemKind {
    /// Wire type code of this item.
    pub fn code(&self) -> &'static str {
        match self {
            ItemKind::Tag { .. } => "bl_tag",
            ItemKind::String(_) => "txt",
            ItemKind::Number(_) => "num",
            ItemKind::StyledText(_) => "comp",
            ItemKind::Variable { .. } => "var",
            ItemKind::Vector { .. } => "vec",
            ItemKind::Parameter { .. } => "pn_el",
        }
    }

    fn data(&self) -> Value {
        match self {
            ItemKind::Tag {
                block,
                action,
                tag,
                option,
            } => json!({ "block": block, "action": action, "option": option, "tag": tag }),
            ItemKind::String(s) | ItemKind::StyledText(s) => json!({ "name": s }),
            ItemKind::Number(n) => json!({ "name": number_text(*n) }),
            ItemKind::Variable { name, scope } => json!({ "name": name, "scope": scope }),
            ItemKind::Vector { x, y, z } => json!({ "x": x, "y": y, "z": z }),
            ItemKind::Parameter {
                name,
                ty,
                optional,
                plural,
                description,
            } => json!({
                "name": name,
                "type": ty,
                "optional": optional,
                "plural": plural,
                "description": description,
            }),
        }
    }
}

/// Decimal text of a number item: `1.0`, `2.5`, `-3.0`, `1e+20`, `1e-05`.
///
/// `{:?}` already switches to exponent form below `1e-4` and from `1e16`;
/// the exponent is rewritten with an explicit sign and at least two digits.
pub fn number_text(n: f64) -> String {
    let text = format!("{n:?}");
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub slot: usize,
    pub kind: ItemKind,
}

impl Item {
    pub fn new(kind: ItemKind) -> Self {
        Self { slot: 0, kind }
    }

    pub fn at(mut self, slot: usize) -> Self {
        self.slot = slot;
        self
    }

    pub fn variable(name: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::new(ItemKind::Variable {
            name: name.into(),
            scope: scope.into(),
        })
    }

    /// Name and scope when this item is a variable.
    pub fn as_variable(&self) -> Option<(&str, &str)> {
        match &self.kind {
            ItemKind::Variable { name, scope } => Some((name, scope)),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "item": { "id": self.kind.code(), "data": self.kind.data() },
            "slot": self.slot,
        })
    }
}

// ── Codeblocks ───────────────────────────────────────────────────

/// One emitted instruction.
#[derive(Debug, Clone)]
pub struct Codeblock {
    /// Block identifier, e.g. `set_var` or `func`.
    pub kind: String,
    /// Function or process name for dynamic kinds.
    pub data: Option<String>,
    /// Action name; `None` for dynamic kinds.
    pub action: Option<String>,
    pub args: Vec<Item>,
    pub target: Option<String>,
    /// Chosen option per tag, in schema order.
    pub tags: IndexMap<String, String>,
}

impl Codeblock {
    /// Build a block, seeding every tag with its schema default.
    pub fn new(
        schema: &ActionSchema,
        kind: &str,
        action: Option<&str>,
        args: Vec<Item>,
    ) -> Result<Self, TemplateError> {
        let spec = schema.block_action(kind, action)?;
        let tags = spec
            .tags
            .iter()
            .map(|t| (t.name.clone(), t.default_option.clone()))
            .collect();
        Ok(Self {
            kind: kind.to_string(),
            data: None,
            action: if is_dynamic_identifier(kind) {
                None
            } else {
                action.map(str::to_string)
            },
            args,
            target: None,
            tags,
        })
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_target(mut self, target: Option<&str>) -> Self {
        self.target = target.map(str::to_string);
        self
    }

    /// Choose a tag option, validated against the schema.
    pub fn set_tag(
        &mut self,
        schema: &ActionSchema,
        tag: &str,
        option: &str,
    ) -> Result<(), TemplateError> {
        let spec = schema.block_action(&self.kind, self.action.as_deref())?;
        let tag_spec = spec
            .tags
            .iter()
            .find(|t| t.name == tag)
            .ok_or_else(|| TemplateError::UnknownTag {
                tag: tag.to_string(),
                action: spec.name.clone(),
            })?;
        if !tag_spec.allows(option) {
            return Err(TemplateError::InvalidTagOption {
                option: option.to_string(),
                tag: tag.to_string(),
                action: spec.name.clone(),
                category: schema.category_of(&self.kind)?.to_string(),
            });
        }
        self.tags.insert(tag.to_string(), option.to_string());
        Ok(())
    }

    /// Wire record. Tag items follow the user arguments in catalog slot
    /// order and take the next free slots, so the item slots are `0..k`.
    /// Every chosen option is checked again here.
    pub fn to_json(&self, schema: &ActionSchema) -> Result<Value, TemplateError> {
        let spec = schema.block_action(&self.kind, self.action.as_deref())?;
        let mut items: Vec<Value> = self.args.iter().map(Item::to_json).collect();

        let mut tags: Vec<_> = spec.tags.iter().collect();
        tags.sort_by_key(|t| t.slot);
        for (offset, tag) in tags.into_iter().enumerate() {
            let chosen = self.tags.get(&tag.name).unwrap_or(&tag.default_option);
            if !tag.allows(chosen) {
                return Err(TemplateError::InvalidTagOption {
                    option: chosen.clone(),
                    tag: tag.name.clone(),
                    action: spec.name.clone(),
                    category: schema.category_of(&self.kind)?.to_string(),
                });
            }
            let item = Item::new(ItemKind::Tag {
                block: self.kind.clone(),
                action: spec.name.clone(),
                tag: tag.name.clone(),
                option: chosen.clone(),
            })
            .at(self.args.len() + offset);
            items.push(item.to_json());
        }

        let mut obj = serde_json::Map::new();
        obj.insert("id".into(), json!("block"));
        obj.insert("block".into(), json!(self.kind));
        obj.insert("args".into(), json!({ "items": items }));
        if let Some(data) = &self.data {
            obj.insert("data".into(), json!(data));
        }
        if let Some(action) = &self.action {
            obj.insert("action".into(), json!(action));
        }
        if let Some(target) = &self.target {
            obj.insert("target".into(), json!(target));
        }
        Ok(Value::Object(obj))
    }
}

// ── Codelines and programs ───────────────────────────────────────

/// Blocks of one compiled function body.
#[derive(Debug, Clone, Default)]
pub struct Codeline {
    pub blocks: Vec<Codeblock>,
}

impl Codeline {
    pub fn push(&mut self, block: Codeblock) {
        self.blocks.push(block);
    }

    /// `{"blocks": [...]}`
    pub fn to_json(&self, schema: &ActionSchema) -> Result<Value, TemplateError> {
        let blocks = self
            .blocks
            .iter()
            .map(|b| b.to_json(schema))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(json!({ "blocks": blocks }))
    }

    /// Printable template code: JSON, gzip, base64.
    pub fn encode(&self, schema: &ActionSchema) -> Result<String, TemplateError> {
        encode::encode(&self.to_json(schema)?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub lines: Vec<Codeline>,
}

impl Program {
    pub fn encode_all(&self, schema: &ActionSchema) -> Result<Vec<String>, TemplateError> {
        self.lines.iter().map(|l| l.encode(schema)).collect()
    }

    pub fn to_json(&self, schema: &ActionSchema) -> Result<Value, TemplateError> {
        let lines = self
            .lines
            .iter()
            .map(|l| l.to_json(schema))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Array(lines))
    }
}
