//! Shared fixture: a small finance model exercising every field strategy
//!
//! - `Currency` — stored code, static precision, default/special markers
//! - `Bank` — stored name, editable currency reference
//! - `StatementTransaction` — direct-derived currency chain, derived
//!   summary, self-parent transaction lines
//! - `TransactionLine` — child of a statement transaction
//! - `Transfer` — nullable bank references collected by a multi-parent list
//! - `Account` — instance-static currency lookups

// Each integration suite compiles its own copy; not every suite uses
// every helper
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use datacore::models::RawEntityDef;
use datacore::{Database, InstanceId, ResolveCtx, ResolveError, TypeRegistry, Value};

fn def(json: &str) -> RawEntityDef {
    serde_json::from_str(json).expect("fixture schema is valid JSON")
}

pub fn finance_registry() -> TypeRegistry {
    let mut reg = TypeRegistry::new();

    reg.register_raw(
        "Currency",
        def(r#"{
            "fields": [
                {"name": "Code", "type": "string", "string_source": true},
                {"name": "DisplayName", "type": "string", "canBeNull": true, "editable": true},
                {"name": "Precision", "type": "int", "dataCore": {"static": {"value": 2}}},
                {"name": "IsDefault", "type": "bool", "isDefault": true},
                {"name": "IsSpecial", "type": "bool", "isSpecial": true}
            ]
        }"#),
    )
    .unwrap();

    reg.register_raw(
        "Bank",
        def(r#"{
            "fields": [
                {"name": "Name", "type": "string", "editable": true},
                {"name": "Currency", "type": "Currency", "canBeNull": true, "editable": true}
            ]
        }"#),
    )
    .unwrap();

    reg.register_raw(
        "StatementTransaction",
        def(r#"{
            "fields": [
                {"name": "Bank", "type": "Bank", "database_source": true},
                {"name": "Currency", "type": "Currency", "dataCore": {"directDerived": {
                    "sources": "StatementTransaction_Bank, Bank_Currency",
                    "defaultGetter": "defaultCurrency"
                }}},
                {"name": "Summary", "type": "string", "dataCore": {"derived": {
                    "codeLine": "describeStatement()",
                    "sources": ["StatementTransaction_Bank, Bank_Name"]
                }}},
                {"name": "TransactionLines", "type": "TransactionLine", "is_list": true,
                 "dataCore": {"selfParent": {"classType": "TransactionLine"}}}
            ]
        }"#),
    )
    .unwrap();

    reg.register_raw(
        "TransactionLine",
        def(r#"{
            "fields": [
                {"name": "Amount", "type": "decimal", "editable": true}
            ]
        }"#),
    )
    .unwrap();

    reg.register_raw(
        "Transfer",
        def(r#"{
            "fields": [
                {"name": "SourceBank", "type": "Bank", "canBeNull": true, "editable": true},
                {"name": "DestinationBank", "type": "Bank", "canBeNull": true, "editable": true},
                {"name": "SourceBankName", "type": "string", "dataCore": {"directDerived": {
                    "sources": "Transfer_SourceBank, Bank_Name",
                    "default": "unknown"
                }}},
                {"name": "Banks", "type": "Bank", "is_list": true,
                 "dataCore": {"multiParentList": {"parents": "SourceBank, DestinationBank"}}}
            ]
        }"#),
    )
    .unwrap();

    reg.register_raw(
        "Account",
        def(r#"{
            "fields": [
                {"name": "Currency", "type": "Currency",
                 "dataCore": {"instanceStatic": {}}},
                {"name": "VirtualCurrency", "type": "Currency",
                 "dataCore": {"instanceStatic": {"specialKey": "virtual"}}}
            ]
        }"#),
    )
    .unwrap();

    reg
}

/// The fixture database plus a call counter on the summary computation
pub fn finance_db_with_counter() -> (Database, Arc<AtomicUsize>) {
    let counter = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&counter);

    let db = Database::builder(finance_registry())
        .default_getter(
            "StatementTransaction",
            "Currency",
            |ctx: &mut ResolveCtx<'_>, _id: InstanceId| {
                ctx.db()
                    .default_instance("Currency")
                    .map(Value::Ref)
                    .ok_or(ResolveError::NoDefaultConfigured {
                        type_name: "Currency".to_string(),
                    })
            },
        )
        .computation(
            "StatementTransaction",
            "Summary",
            move |ctx: &mut ResolveCtx<'_>, id: InstanceId| {
                calls.fetch_add(1, Ordering::SeqCst);
                let bank = ctx.get(id, "Bank")?;
                match bank {
                    Value::Ref(bank_id) => match ctx.get(bank_id, "Name")? {
                        Value::Text(name) => Ok(Value::Text(format!("statement from {name}"))),
                        _ => Ok(Value::Text("statement".to_string())),
                    },
                    _ => Ok(Value::Text("statement".to_string())),
                }
            },
        )
        .build()
        .expect("fixture schema builds");

    (db, counter)
}

pub fn finance_db() -> Database {
    finance_db_with_counter().0
}

/// Create a currency with the given code
pub fn currency(db: &Database, code: &str) -> InstanceId {
    db.create_instance_with("Currency", None, [("Code", Value::Text(code.to_string()))])
        .expect("currency creates")
}

/// Create a bank with a name and an optional currency
pub fn bank(db: &Database, name: &str, currency: Option<InstanceId>) -> InstanceId {
    let id = db
        .create_instance_with("Bank", None, [("Name", Value::Text(name.to_string()))])
        .expect("bank creates");
    if let Some(cur) = currency {
        db.set(id, "Currency", Value::Ref(cur)).expect("currency sets");
    }
    id
}
