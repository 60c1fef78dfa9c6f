//! Raw data model for schema definition files
//!
//! These structs mirror the JSON schema format one-to-one: wire key names,
//! optional keys defaulting off, and opaque bags carried without
//! interpretation. Conversion into the checked domain model (and every
//! structural invariant) lives in [`crate::registry`]; this layer only
//! decodes.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Root object of one schema definition file
///
/// The type name itself is not part of the document; it is derived from the
/// file name by the loader, the same way the original definitions were laid
/// out one type per file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEntityDef {
    /// Parent type name, empty for a root type
    #[serde(default)]
    pub extends: String,

    /// Comma-separated capability names
    #[serde(default)]
    pub implements: String,

    /// Abstract types may be extended and referenced but never instantiated
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,

    /// Whether a typed-list container is generated for this type.
    /// Carried for the code-generation collaborator, not interpreted here.
    #[serde(default, rename = "listDef")]
    pub list_def: bool,

    /// Opaque display expression handed to the code-generation collaborator
    #[serde(default, rename = "customToString")]
    pub custom_to_string: String,

    #[serde(default)]
    pub fields: Vec<RawFieldDef>,
}

/// One field of a schema definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFieldDef {
    pub name: String,

    /// Primitive name or entity type name
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default)]
    pub is_list: bool,

    #[serde(default, rename = "canBeNull")]
    pub can_be_null: bool,

    #[serde(default)]
    pub editable: bool,

    #[serde(default)]
    pub database_source: bool,

    #[serde(default)]
    pub string_source: bool,

    #[serde(default)]
    pub avoid_constructor: bool,

    #[serde(default, rename = "isDefault")]
    pub is_default: bool,

    #[serde(default, rename = "isSpecial")]
    pub is_special: bool,

    /// Opaque bag forwarded to the display/property collaborator
    #[serde(default, rename = "attachedProperties")]
    pub attached_properties: serde_json::Map<String, JsonValue>,

    #[serde(default, rename = "dataCore")]
    pub data_core: Option<RawDataCore>,
}

/// Raw data core: exactly one variant key may be populated.
///
/// The format spells the variants as sibling keys rather than a tagged
/// union, so exclusivity is a registration-time check, not a decode error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDataCore {
    #[serde(default, rename = "static")]
    pub static_value: Option<RawStatic>,

    #[serde(default, rename = "instanceStatic")]
    pub instance_static: Option<RawInstanceStatic>,

    #[serde(default, rename = "directDerived")]
    pub direct_derived: Option<RawDirectDerived>,

    #[serde(default)]
    pub derived: Option<RawDerived>,

    #[serde(default, rename = "selfParent")]
    pub self_parent: Option<RawSelfParent>,

    #[serde(default, rename = "multiParentList")]
    pub multi_parent_list: Option<RawMultiParentList>,
}

impl RawDataCore {
    /// Count of populated variant keys; must be exactly 1 to register
    pub fn variant_count(&self) -> usize {
        [
            self.static_value.is_some(),
            self.instance_static.is_some(),
            self.direct_derived.is_some(),
            self.derived.is_some(),
            self.self_parent.is_some(),
            self.multi_parent_list.is_some(),
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }
}

/// `dataCore.static`: a literal value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawStatic {
    pub value: JsonValue,
}

/// `dataCore.instanceStatic`: default singleton, or special singleton by key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInstanceStatic {
    #[serde(default, rename = "specialKey")]
    pub special_key: Option<String>,
}

/// `dataCore.directDerived`: chain plus a fallback for the absent case
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDirectDerived {
    /// Comma-separated chain of `OwnerType_FieldName` tokens
    pub sources: String,

    /// Static fallback literal
    #[serde(default)]
    pub default: Option<JsonValue>,

    /// Name of a host-registered fallback getter
    #[serde(default, rename = "defaultGetter")]
    pub default_getter: Option<String>,
}

/// `dataCore.derived`: opaque computation plus its invalidation sources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDerived {
    /// Opaque computation expression, carried for the code-generation
    /// collaborator; the engine invokes a host-registered function instead
    #[serde(default, rename = "codeLine")]
    pub code_line: String,

    /// Source chain expressions in `OwnerType_FieldName` comma form.
    /// These are the invalidation contract, not computation inputs.
    #[serde(default)]
    pub sources: Vec<String>,
}

/// `dataCore.selfParent`: list of all instances whose parent is this one
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSelfParent {
    #[serde(rename = "classType")]
    pub class_type: String,
}

/// `dataCore.multiParentList`: collect non-null values of sibling fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMultiParentList {
    /// Comma-separated field names resolved against the declaring type
    pub parents: String,
}
