//! Source chains
//!
//! A source chain is an ordered path of field hops across related entity
//! instances, written as comma-separated `OwnerType_FieldName` tokens:
//!
//! ```text
//! StatementTransaction_Bank, Bank_Currency
//! ```
//!
//! Parsing only splits the token list; binding tokens to declared fields
//! needs the registry, because both type and field names may themselves
//! contain underscores. A token is bound by trying every split point and
//! keeping the one where the owner is a registered type carrying the field;
//! zero or several viable splits fail registration.
//!
//! Evaluation walks hop by hop through live instances, recursively
//! resolving each hop (a hop may itself be derived). A null produced
//! mid-chain by a nullable hop makes the whole chain [`ChainOutcome::Absent`];
//! a null from a non-nullable hop is a [`ResolveError::BrokenChain`] logic
//! error.

use crate::error::{ResolveError, ResolveResult, SchemaError, SchemaResult};
use crate::registry::{FieldDef, FieldType, TypeRegistry};
use crate::runtime::instance::InstanceId;
use crate::runtime::resolver::ResolveCtx;
use crate::runtime::value::Value;

/// An ordered sequence of `OwnerType_FieldName` hops
#[derive(Debug, Clone, PartialEq)]
pub struct SourceChain {
    tokens: Vec<String>,
}

/// A token bound to its declared owner type and field name
#[derive(Debug, Clone, PartialEq)]
pub struct ChainHop {
    /// Owner type as written in the token
    pub owner: String,
    pub field: String,
}

/// Outcome of walking a chain
#[derive(Debug, Clone, PartialEq)]
pub enum ChainOutcome {
    /// The terminal hop produced this value
    Found(Value),
    /// A nullable hop was null mid-chain; the caller falls back
    Absent,
}

impl SourceChain {
    /// Split a comma-separated token list. Token-to-field binding happens
    /// against the registry in [`SourceChain::check`].
    pub fn parse(sources: &str) -> Result<SourceChain, String> {
        let tokens: Vec<String> = sources
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return Err("chain has no hops".to_string());
        }
        for token in &tokens {
            if !token.contains('_') {
                return Err(format!("token '{token}' is not of the form OwnerType_FieldName"));
            }
        }
        Ok(SourceChain { tokens })
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Bind every token to a declared field
    pub fn hops(&self, registry: &TypeRegistry) -> Result<Vec<ChainHop>, String> {
        self.tokens.iter().map(|t| bind_token(t, registry)).collect()
    }

    /// Registration-time checking: every hop binds, the first hop's owner
    /// covers the declaring type, every mid-chain hop is a non-list entity
    /// reference whose output type carries the next hop's field. Returns
    /// the terminal field so the caller can match it against the derived
    /// field's own type. Never called at evaluation time.
    pub fn check<'a>(
        &self,
        registry: &'a TypeRegistry,
        declaring_type: &str,
        field: &str,
    ) -> SchemaResult<&'a FieldDef> {
        let invalid = |message: String| SchemaError::InvalidChain {
            type_name: declaring_type.to_string(),
            field: field.to_string(),
            message,
        };

        let hops = self.hops(registry).map_err(&invalid)?;

        let first = &hops[0];
        if !registry.is_same_or_subtype(declaring_type, &first.owner) {
            return Err(invalid(format!(
                "first hop owner '{}' is not '{}' or an ancestor of it",
                first.owner, declaring_type
            )));
        }

        let mut current = None;
        for (i, hop) in hops.iter().enumerate() {
            // Mid-chain: the previous hop's output type must carry this field
            if let Some(output) = current {
                if !registry.is_same_or_subtype(output, &hop.owner) {
                    return Err(invalid(format!(
                        "hop '{}_{}' does not apply to '{}'",
                        hop.owner, hop.field, output
                    )));
                }
            }

            let (_, hop_field) = registry
                .field(&hop.owner, &hop.field)
                .ok_or_else(|| invalid(format!("'{}' has no field '{}'", hop.owner, hop.field)))?;

            if i + 1 == hops.len() {
                return Ok(hop_field);
            }

            if hop_field.is_list {
                return Err(invalid(format!(
                    "mid-chain hop '{}_{}' must not be a list",
                    hop.owner, hop.field
                )));
            }
            match &hop_field.field_type {
                FieldType::Entity(next) => current = Some(next.as_str()),
                FieldType::Primitive(_) => {
                    return Err(invalid(format!(
                        "mid-chain hop '{}_{}' must reference an entity",
                        hop.owner, hop.field
                    )));
                }
            }
        }

        unreachable!("parse guarantees at least one hop")
    }
}

impl std::fmt::Display for SourceChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tokens.join(", "))
    }
}

/// Bind one token by trying every underscore as the owner/field split
fn bind_token(token: &str, registry: &TypeRegistry) -> Result<ChainHop, String> {
    let mut candidates = Vec::new();
    for (i, _) in token.match_indices('_') {
        let (owner, rest) = token.split_at(i);
        let field = &rest[1..];
        if owner.is_empty() || field.is_empty() {
            continue;
        }
        if registry.get(owner).is_some() && registry.field(owner, field).is_some() {
            candidates.push(ChainHop {
                owner: owner.to_string(),
                field: field.to_string(),
            });
        }
    }
    match candidates.len() {
        1 => Ok(candidates.remove(0)),
        0 => Err(format!("token '{token}' does not name a declared field")),
        _ => Err(format!("token '{token}' is ambiguous")),
    }
}

/// Walk a chain from `start`, resolving each hop through the resolver so
/// derived hops recurse correctly and land in the cache.
pub(crate) fn evaluate(
    ctx: &mut ResolveCtx<'_>,
    start: InstanceId,
    chain: &SourceChain,
) -> ResolveResult<ChainOutcome> {
    let hops = chain
        .hops(ctx.registry())
        .map_err(|_| broken(ctx, start, chain))?;

    let mut current = start;
    let last = hops.len() - 1;
    for (i, hop) in hops.iter().enumerate() {
        let value = ctx.get(current, &hop.field)?;

        if i == last {
            return Ok(ChainOutcome::Found(value));
        }

        match value {
            Value::Ref(next) => current = next,
            Value::Null => {
                // Registration guarantees the hop field exists
                let nullable = ctx
                    .registry()
                    .field(&hop.owner, &hop.field)
                    .map(|(_, f)| f.can_be_null)
                    .unwrap_or(false);
                if nullable {
                    return Ok(ChainOutcome::Absent);
                }
                return Err(ResolveError::BrokenChain {
                    type_name: hop.owner.clone(),
                    field: hop.field.clone(),
                });
            }
            _ => {
                return Err(ResolveError::BrokenChain {
                    type_name: hop.owner.clone(),
                    field: hop.field.clone(),
                })
            }
        }
    }

    unreachable!("parse guarantees at least one hop")
}

fn broken(ctx: &ResolveCtx<'_>, start: InstanceId, chain: &SourceChain) -> ResolveError {
    // A chain that fails to bind after validation means the registry and
    // the database disagree; report the start of the walk.
    let type_name = ctx
        .instance_type(start)
        .unwrap_or_else(|| "?".to_string());
    ResolveError::BrokenChain {
        type_name,
        field: chain.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawEntityDef;

    fn registry() -> TypeRegistry {
        let mut reg = TypeRegistry::new();
        let bank: RawEntityDef = serde_json::from_str(
            r#"{"fields": [
                {"name": "Name", "type": "string"},
                {"name": "Currency", "type": "Currency", "editable": true}
            ]}"#,
        )
        .unwrap();
        let currency: RawEntityDef = serde_json::from_str(
            r#"{"fields": [
                {"name": "Code", "type": "string"}
            ]}"#,
        )
        .unwrap();
        reg.register_raw("Bank", bank).unwrap();
        reg.register_raw("Currency", currency).unwrap();
        reg
    }

    #[test]
    fn test_parse_splits_and_trims_tokens() {
        let chain = SourceChain::parse(" Bank_Currency , Currency_Code ").unwrap();
        assert_eq!(chain.tokens(), ["Bank_Currency", "Currency_Code"]);
    }

    #[test]
    fn test_parse_rejects_empty_and_malformed() {
        assert!(SourceChain::parse("").is_err());
        assert!(SourceChain::parse("BankCurrency").is_err());
    }

    #[test]
    fn test_bind_token_resolves_owner_and_field() {
        let reg = registry();
        let hop = bind_token("Bank_Currency", &reg).unwrap();
        assert_eq!(hop.owner, "Bank");
        assert_eq!(hop.field, "Currency");
    }

    #[test]
    fn test_bind_token_unknown_field() {
        let reg = registry();
        let err = bind_token("Bank_Missing", &reg).unwrap_err();
        assert!(err.contains("Bank_Missing"));
    }

    #[test]
    fn test_check_accepts_valid_chain() {
        let reg = registry();
        let chain = SourceChain::parse("Bank_Currency, Currency_Code").unwrap();
        let terminal = chain.check(&reg, "Bank", "whatever").unwrap();
        assert_eq!(terminal.name, "Code");
    }

    #[test]
    fn test_check_rejects_wrong_first_owner() {
        let reg = registry();
        let chain = SourceChain::parse("Currency_Code").unwrap();
        let err = chain.check(&reg, "Bank", "whatever").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidChain { .. }));
    }

    #[test]
    fn test_check_rejects_primitive_mid_chain() {
        let reg = registry();
        let chain = SourceChain::parse("Bank_Name, Currency_Code").unwrap();
        let err = chain.check(&reg, "Bank", "whatever").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidChain { .. }));
    }
}
