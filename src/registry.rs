//! Entity type registry
//!
//! Converts raw schema definitions into the checked domain model and holds
//! them for the lifetime of the process. The registry is built once, then
//! [`TypeRegistry::validate`] enforces every structural invariant before a
//! database may be constructed from it:
//!
//! - type names unique, parent types present, no inheritance cycles
//! - subtype fields never shadow an ancestor's field
//! - data core configurations are structurally sound (exactly one variant,
//!   non-nullable, non-editable, list-only variants on list fields, ...)
//! - source chains reference declared fields with compatible hop types
//!
//! Chain *cycles* are not checked here; that is the dependency graph's job.

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::chain::SourceChain;
use crate::error::{SchemaError, SchemaResult};
use crate::models::{RawDataCore, RawEntityDef, RawFieldDef};
use crate::runtime::value::Value;

/// Primitive field kinds understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Bool,
    Int,
    Decimal,
    Text,
}

impl PrimitiveKind {
    /// Parse a primitive name; unmatched names are entity type references.
    /// The original definitions used the boxed Java spellings, so those are
    /// accepted alongside the plain ones.
    pub fn parse(name: &str) -> Option<PrimitiveKind> {
        match name {
            "bool" | "boolean" | "Boolean" => Some(PrimitiveKind::Bool),
            "int" | "integer" | "Integer" => Some(PrimitiveKind::Int),
            "decimal" | "double" | "Double" => Some(PrimitiveKind::Decimal),
            "string" | "String" => Some(PrimitiveKind::Text),
            _ => None,
        }
    }
}

/// A field's value type: primitive, or a reference to another entity type
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Primitive(PrimitiveKind),
    Entity(String),
}

impl FieldType {
    fn parse(name: &str) -> FieldType {
        match PrimitiveKind::parse(name) {
            Some(kind) => FieldType::Primitive(kind),
            None => FieldType::Entity(name.to_string()),
        }
    }

    pub fn entity_name(&self) -> Option<&str> {
        match self {
            FieldType::Entity(name) => Some(name),
            FieldType::Primitive(_) => None,
        }
    }
}

/// Fallback for a direct-derived field whose chain came up absent
#[derive(Debug, Clone, PartialEq)]
pub enum Fallback {
    /// A literal decoded from the schema
    Literal(Value),
    /// A host-registered getter, keyed by (type, field) at build time
    Getter,
}

/// The strategy governing how a field's value is produced
#[derive(Debug, Clone, PartialEq)]
pub enum DataCore {
    /// Literal, identical for every instance of the type
    Static(Value),
    /// The type-wide default singleton, or a special singleton by key
    InstanceStatic { special_key: Option<String> },
    /// Terminal value of a chain, with a fallback when the chain is absent
    DirectDerived {
        chain: SourceChain,
        fallback: Fallback,
    },
    /// Host-registered computation; `sources` is the invalidation contract
    Derived { sources: Vec<SourceChain> },
    /// All instances of `class_type` whose parent reference is this instance
    SelfParent { class_type: String },
    /// Non-null values of the named sibling fields, in declaration order
    MultiParentList { parents: Vec<String> },
}

/// A checked field definition
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    pub is_list: bool,
    pub can_be_null: bool,
    pub editable: bool,
    pub database_source: bool,
    pub string_source: bool,
    pub avoid_constructor: bool,
    pub is_default: bool,
    pub is_special: bool,
    /// Opaque bag forwarded to the display/property collaborator
    pub attached_properties: serde_json::Map<String, JsonValue>,
    pub data_core: Option<DataCore>,
}

impl FieldDef {
    /// Stored fields are written by the host; derived fields never are
    pub fn is_stored(&self) -> bool {
        self.data_core.is_none()
    }

    fn from_raw(type_name: &str, raw: RawFieldDef) -> SchemaResult<FieldDef> {
        let data_core = match raw.data_core {
            Some(core) => Some(convert_data_core(type_name, &raw.name, core)?),
            None => None,
        };

        Ok(FieldDef {
            name: raw.name,
            field_type: FieldType::parse(&raw.type_name),
            is_list: raw.is_list,
            can_be_null: raw.can_be_null,
            editable: raw.editable,
            database_source: raw.database_source,
            string_source: raw.string_source,
            avoid_constructor: raw.avoid_constructor,
            is_default: raw.is_default,
            is_special: raw.is_special,
            attached_properties: raw.attached_properties,
            data_core,
        })
    }
}

fn convert_data_core(type_name: &str, field: &str, raw: RawDataCore) -> SchemaResult<DataCore> {
    if raw.variant_count() != 1 {
        return Err(SchemaError::InvalidDataCore {
            type_name: type_name.to_string(),
            field: field.to_string(),
            message: format!("expected exactly one variant, found {}", raw.variant_count()),
        });
    }

    if let Some(s) = raw.static_value {
        let value = Value::from_literal(&s.value).ok_or_else(|| SchemaError::InvalidDataCore {
            type_name: type_name.to_string(),
            field: field.to_string(),
            message: format!("static literal {} is not a scalar", s.value),
        })?;
        return Ok(DataCore::Static(value));
    }

    if let Some(is) = raw.instance_static {
        return Ok(DataCore::InstanceStatic {
            special_key: is.special_key,
        });
    }

    if let Some(dd) = raw.direct_derived {
        let chain = SourceChain::parse(&dd.sources).map_err(|message| SchemaError::InvalidChain {
            type_name: type_name.to_string(),
            field: field.to_string(),
            message,
        })?;

        let fallback = match (dd.default, dd.default_getter) {
            (Some(literal), None) => {
                let value =
                    Value::from_literal(&literal).ok_or_else(|| SchemaError::InvalidDataCore {
                        type_name: type_name.to_string(),
                        field: field.to_string(),
                        message: format!("default literal {literal} is not a scalar"),
                    })?;
                Fallback::Literal(value)
            }
            (None, Some(_)) => Fallback::Getter,
            _ => {
                return Err(SchemaError::AmbiguousDefault {
                    type_name: type_name.to_string(),
                    field: field.to_string(),
                })
            }
        };

        return Ok(DataCore::DirectDerived { chain, fallback });
    }

    if let Some(d) = raw.derived {
        let mut sources = Vec::with_capacity(d.sources.len());
        for expr in &d.sources {
            let chain = SourceChain::parse(expr).map_err(|message| SchemaError::InvalidChain {
                type_name: type_name.to_string(),
                field: field.to_string(),
                message,
            })?;
            sources.push(chain);
        }
        return Ok(DataCore::Derived { sources });
    }

    if let Some(sp) = raw.self_parent {
        return Ok(DataCore::SelfParent {
            class_type: sp.class_type,
        });
    }

    // variant_count() == 1 leaves only multiParentList
    let mpl = raw.multi_parent_list.ok_or_else(|| SchemaError::InvalidDataCore {
        type_name: type_name.to_string(),
        field: field.to_string(),
        message: "empty data core".to_string(),
    })?;
    let parents: Vec<String> = mpl
        .parents
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if parents.is_empty() {
        return Err(SchemaError::InvalidDataCore {
            type_name: type_name.to_string(),
            field: field.to_string(),
            message: "multiParentList names no parents".to_string(),
        });
    }
    Ok(DataCore::MultiParentList { parents })
}

/// An immutable entity type definition
#[derive(Debug, Clone, PartialEq)]
pub struct EntityType {
    pub name: String,
    pub extends: Option<String>,
    pub implements: Vec<String>,
    pub is_abstract: bool,
    /// Whether a typed-list container is generated for this type;
    /// carried for the code-generation collaborator
    pub list_def: bool,
    /// Opaque display expression for the code-generation collaborator
    pub custom_to_string: Option<String>,
    /// Own fields, declaration order. Inherited fields are layered by
    /// [`TypeRegistry::fields_of`].
    pub fields: Vec<FieldDef>,
}

impl EntityType {
    pub fn from_raw(name: &str, raw: RawEntityDef) -> SchemaResult<EntityType> {
        let mut fields = Vec::with_capacity(raw.fields.len());
        for field in raw.fields {
            fields.push(FieldDef::from_raw(name, field)?);
        }

        let implements = raw
            .implements
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        Ok(EntityType {
            name: name.to_string(),
            extends: if raw.extends.is_empty() {
                None
            } else {
                Some(raw.extends)
            },
            implements,
            is_abstract: raw.is_abstract,
            list_def: raw.list_def,
            custom_to_string: if raw.custom_to_string.is_empty() {
                None
            } else {
                Some(raw.custom_to_string)
            },
            fields,
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Process-wide store of entity type definitions
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: IndexMap<String, EntityType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a checked type. Fails on a duplicate name; referential
    /// checks are deferred to [`TypeRegistry::validate`] so registration
    /// order does not matter.
    pub fn register(&mut self, ty: EntityType) -> SchemaResult<()> {
        if self.types.contains_key(&ty.name) {
            return Err(SchemaError::DuplicateType { name: ty.name });
        }
        self.types.insert(ty.name.clone(), ty);
        Ok(())
    }

    /// Convert and register a raw definition under the given type name
    pub fn register_raw(&mut self, name: &str, raw: RawEntityDef) -> SchemaResult<()> {
        self.register(EntityType::from_raw(name, raw)?)
    }

    pub fn get(&self, name: &str) -> Option<&EntityType> {
        self.types.get(name)
    }

    /// Look up a type, failing with the referencing context on absence
    pub fn resolve(&self, name: &str, referenced_by: &str) -> SchemaResult<&EntityType> {
        self.types.get(name).ok_or_else(|| SchemaError::UnknownType {
            name: name.to_string(),
            referenced_by: referenced_by.to_string(),
        })
    }

    /// All registered types, in registration order
    pub fn types(&self) -> impl Iterator<Item = &EntityType> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Ancestor chain, nearest parent first. Stops on an unknown parent;
    /// `validate` reports that case properly.
    pub fn ancestors<'a>(&'a self, name: &str) -> Vec<&'a EntityType> {
        let mut out = Vec::new();
        let mut current = self.get(name).and_then(|t| t.extends.as_deref());
        while let Some(parent) = current {
            match self.get(parent) {
                Some(ty) => {
                    // Inheritance cycles are a validate()-reported error;
                    // bail here so the walk always terminates.
                    if out.iter().any(|t: &&EntityType| t.name == ty.name) {
                        break;
                    }
                    out.push(ty);
                    current = ty.extends.as_deref();
                }
                None => break,
            }
        }
        out
    }

    /// Whether `sub` is `sup` or inherits from it
    pub fn is_same_or_subtype(&self, sub: &str, sup: &str) -> bool {
        sub == sup || self.ancestors(sub).iter().any(|t| t.name == sup)
    }

    /// The ordered union of a type's fields: own fields first, then each
    /// ancestor's, walking upward. This is the ordering downstream
    /// consumers (constructor and accessor generation) rely on.
    pub fn fields_of<'a>(&'a self, name: &str) -> SchemaResult<Vec<(&'a EntityType, &'a FieldDef)>> {
        let ty = self.resolve(name, "fields_of")?;
        let mut out: Vec<(&EntityType, &FieldDef)> =
            ty.fields.iter().map(|f| (ty, f)).collect();
        for ancestor in self.ancestors(name) {
            out.extend(ancestor.fields.iter().map(|f| (ancestor, f)));
        }
        Ok(out)
    }

    /// Find a field on a type or its ancestors, with its declaring type
    pub fn field<'a>(
        &'a self,
        type_name: &str,
        field_name: &str,
    ) -> Option<(&'a EntityType, &'a FieldDef)> {
        let ty = self.get(type_name)?;
        if let Some(f) = ty.field(field_name) {
            return Some((ty, f));
        }
        for ancestor in self.ancestors(type_name) {
            if let Some(f) = ancestor.field(field_name) {
                return Some((ancestor, f));
            }
        }
        None
    }

    /// Enforce every structural invariant. Run once, after all types are
    /// registered and before any database is built.
    pub fn validate(&self) -> SchemaResult<()> {
        for ty in self.types.values() {
            self.validate_lineage(ty)?;
            self.validate_field_layering(ty)?;
            for field in &ty.fields {
                self.validate_field(ty, field)?;
            }
        }
        Ok(())
    }

    fn validate_lineage(&self, ty: &EntityType) -> SchemaResult<()> {
        let mut path = vec![ty.name.clone()];
        let mut current = ty.extends.as_deref();
        while let Some(parent) = current {
            if path.iter().any(|n| n == parent) {
                path.push(parent.to_string());
                return Err(SchemaError::InheritanceCycle { path });
            }
            let parent_ty = self.resolve(parent, &ty.name)?;
            path.push(parent_ty.name.clone());
            current = parent_ty.extends.as_deref();
        }
        Ok(())
    }

    fn validate_field_layering(&self, ty: &EntityType) -> SchemaResult<()> {
        // Shadowing an inherited name would make chain tokens ambiguous
        for field in &ty.fields {
            for ancestor in self.ancestors(&ty.name) {
                if ancestor.field(&field.name).is_some() {
                    return Err(SchemaError::FieldNameCollision {
                        type_name: ty.name.clone(),
                        field: field.name.clone(),
                        ancestor: ancestor.name.clone(),
                    });
                }
            }
        }

        let string_sources: Vec<&str> = self
            .fields_of(&ty.name)?
            .iter()
            .filter(|(_, f)| f.string_source)
            .map(|(_, f)| f.name.as_str())
            .collect();
        if string_sources.len() > 1 {
            return Err(SchemaError::InvalidField {
                type_name: ty.name.clone(),
                field: string_sources[1].to_string(),
                message: format!(
                    "more than one string_source field (also '{}')",
                    string_sources[0]
                ),
            });
        }
        Ok(())
    }

    fn validate_field(&self, ty: &EntityType, field: &FieldDef) -> SchemaResult<()> {
        let context = format!("{}.{}", ty.name, field.name);

        if let FieldType::Entity(entity) = &field.field_type {
            self.resolve(entity, &context)?;
        }

        if field.database_source {
            if field.can_be_null || field.field_type.entity_name().is_none() {
                return Err(SchemaError::InvalidField {
                    type_name: ty.name.clone(),
                    field: field.name.clone(),
                    message: "database_source fields must be non-nullable entity references"
                        .to_string(),
                });
            }
        }

        if field.is_default || field.is_special {
            let ok = field.field_type == FieldType::Primitive(PrimitiveKind::Bool)
                && !field.editable
                && field.data_core.is_none();
            if !ok {
                return Err(SchemaError::InvalidField {
                    type_name: ty.name.clone(),
                    field: field.name.clone(),
                    message: "marker fields must be non-editable stored booleans".to_string(),
                });
            }
        }

        let Some(core) = &field.data_core else {
            return Ok(());
        };

        if field.can_be_null || field.editable {
            return Err(SchemaError::InvalidDataCore {
                type_name: ty.name.clone(),
                field: field.name.clone(),
                message: "derived fields must be non-nullable and non-editable".to_string(),
            });
        }

        match core {
            DataCore::Static(value) => {
                if field.is_list {
                    return self.invalid_core(ty, field, "static literals cannot populate lists");
                }
                match &field.field_type {
                    FieldType::Primitive(kind) => {
                        if !value.matches_primitive(*kind) {
                            return self.invalid_core(ty, field, "literal does not match field type");
                        }
                    }
                    FieldType::Entity(_) => {
                        return self.invalid_core(ty, field, "static literals cannot reference entities");
                    }
                }
            }
            DataCore::InstanceStatic { .. } => {
                if field.is_list || field.field_type.entity_name().is_none() {
                    return self.invalid_core(
                        ty,
                        field,
                        "instanceStatic requires a non-list entity field",
                    );
                }
            }
            DataCore::DirectDerived { chain, fallback } => {
                let terminal = chain.check(self, &ty.name, &field.name)?;
                let compatible = match (&terminal.field_type, &field.field_type) {
                    (FieldType::Primitive(a), FieldType::Primitive(b)) => a == b,
                    (FieldType::Entity(a), FieldType::Entity(b)) => {
                        self.is_same_or_subtype(a, b)
                    }
                    _ => false,
                };
                if !compatible || terminal.is_list != field.is_list {
                    return Err(SchemaError::InvalidChain {
                        type_name: ty.name.clone(),
                        field: field.name.clone(),
                        message: "terminal hop type does not match field type".to_string(),
                    });
                }
                if let Fallback::Literal(value) = fallback {
                    let ok = match &field.field_type {
                        FieldType::Primitive(kind) => value.matches_primitive(*kind),
                        FieldType::Entity(_) => false,
                    };
                    if !ok {
                        return self.invalid_core(
                            ty,
                            field,
                            "default literal does not match field type",
                        );
                    }
                }
            }
            DataCore::Derived { sources } => {
                for chain in sources {
                    chain.check(self, &ty.name, &field.name)?;
                }
            }
            DataCore::SelfParent { class_type } => {
                if !field.is_list {
                    return self.invalid_core(ty, field, "selfParent requires a list field");
                }
                self.resolve(class_type, &context)?;
                match field.field_type.entity_name() {
                    Some(element) if self.is_same_or_subtype(class_type, element) => {}
                    _ => {
                        return self.invalid_core(
                            ty,
                            field,
                            "selfParent class must match the list element type",
                        )
                    }
                }
            }
            DataCore::MultiParentList { parents } => {
                if !field.is_list {
                    return self.invalid_core(ty, field, "multiParentList requires a list field");
                }
                let element = field.field_type.entity_name();
                for parent in parents {
                    let Some((_, parent_field)) = self.field(&ty.name, parent) else {
                        return self.invalid_core(
                            ty,
                            field,
                            &format!("parent field '{parent}' is not declared"),
                        );
                    };
                    if parent_field.is_list {
                        return self.invalid_core(
                            ty,
                            field,
                            &format!("parent field '{parent}' must not be a list"),
                        );
                    }
                    match (parent_field.field_type.entity_name(), element) {
                        (Some(p), Some(e)) if self.is_same_or_subtype(p, e) => {}
                        _ => {
                            return self.invalid_core(
                                ty,
                                field,
                                &format!("parent field '{parent}' does not match the element type"),
                            )
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn invalid_core(
        &self,
        ty: &EntityType,
        field: &FieldDef,
        message: &str,
    ) -> SchemaResult<()> {
        Err(SchemaError::InvalidDataCore {
            type_name: ty.name.clone(),
            field: field.name.clone(),
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests;
