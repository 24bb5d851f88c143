//! Decoding of `condenser_api` responses into engine types.
//!
//! Operations come back as `{"trx_id": "...", "op": ["transfer", {...}]}`.
//! Anything the engine does not interpret, or a transfer/comment missing a
//! required field, is decoded as [`OperationBody::Other`] rather than failing
//! the whole block.

use serde_json::Value;

use paysnap_types::{AccountName, OperationBody, RawOperation};

use crate::{ChainError, PostContent};

/// Asset identifiers used by the ledger's numeric asset notation.
const NAI_HBD: &str = "@@000000013";
const NAI_HIVE: &str = "@@000000021";
const NAI_VESTS: &str = "@@000000037";

static NULL: Value = Value::Null;

/// Decode the result of `condenser_api.get_ops_in_block`.
pub fn parse_ops_in_block(height: u64, result: &Value) -> Result<Vec<RawOperation>, ChainError> {
    let entries = result
        .as_array()
        .ok_or_else(|| ChainError::Decode("get_ops_in_block result is not an array".into()))?;
    Ok(entries.iter().map(|entry| parse_op_entry(height, entry)).collect())
}

fn parse_op_entry(height: u64, entry: &Value) -> RawOperation {
    let trx_id = entry
        .get("trx_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let block = entry.get("block").and_then(Value::as_u64).unwrap_or(height);

    let (kind, data) = match entry.get("op") {
        Some(Value::Array(pair)) if pair.len() == 2 => (
            pair[0].as_str().unwrap_or_default().to_string(),
            &pair[1],
        ),
        // appbase format: {"type": "transfer_operation", "value": {...}}
        Some(op @ Value::Object(_)) => (
            op.get("type")
                .and_then(Value::as_str)
                .map(|t| t.trim_end_matches("_operation").to_string())
                .unwrap_or_default(),
            op.get("value").unwrap_or(&NULL),
        ),
        _ => (String::new(), &NULL),
    };

    RawOperation {
        block,
        trx_id,
        body: parse_body(kind, data),
    }
}

fn str_field<'a>(data: &'a Value, name: &str) -> Option<&'a str> {
    data.get(name).and_then(Value::as_str)
}

fn parse_body(kind: String, data: &Value) -> OperationBody {
    match kind.as_str() {
        "transfer" => {
            let from = str_field(data, "from");
            let to = str_field(data, "to");
            let amount = data.get("amount").and_then(asset_string);
            match (from, to, amount) {
                (Some(from), Some(to), Some(amount)) => OperationBody::Transfer {
                    from: AccountName::new(from),
                    to: AccountName::new(to),
                    amount,
                    memo: str_field(data, "memo").unwrap_or_default().to_string(),
                },
                _ => OperationBody::Other { kind },
            }
        }
        "comment" => match (str_field(data, "author"), str_field(data, "permlink")) {
            (Some(author), Some(permlink)) => OperationBody::Comment {
                author: AccountName::new(author),
                parent_author: str_field(data, "parent_author")
                    .unwrap_or_default()
                    .to_string(),
                permlink: permlink.to_string(),
            },
            _ => OperationBody::Other { kind },
        },
        _ => OperationBody::Other { kind },
    }
}

/// Render an amount as legacy asset notation (`"1.500 HBD"`).
///
/// Accepts either the legacy string form or the NAI object form
/// `{"amount": "1500", "precision": 3, "nai": "@@000000013"}`.
fn asset_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(_) => {
            let raw: u64 = value.get("amount")?.as_str()?.parse().ok()?;
            let precision = value.get("precision")?.as_u64()? as u32;
            let symbol = match value.get("nai")?.as_str()? {
                NAI_HBD => "HBD",
                NAI_HIVE => "HIVE",
                NAI_VESTS => "VESTS",
                _ => return None,
            };
            let scale = 10u64.checked_pow(precision)?;
            if precision == 0 {
                Some(format!("{raw} {symbol}"))
            } else {
                Some(format!(
                    "{}.{:0width$} {symbol}",
                    raw / scale,
                    raw % scale,
                    width = precision as usize
                ))
            }
        }
        _ => None,
    }
}

/// Decode the result of `condenser_api.get_content`.
///
/// The node answers with an empty author when the post does not exist.
pub fn parse_content(result: &Value) -> Result<Option<PostContent>, ChainError> {
    if result.is_null() {
        return Ok(None);
    }
    let content: PostContent = serde_json::from_value(result.clone())
        .map_err(|e| ChainError::Decode(format!("invalid content: {e}")))?;
    if content.author.is_empty() {
        Ok(None)
    } else {
        Ok(Some(content))
    }
}

/// Extract `head_block_number` from `condenser_api.get_dynamic_global_properties`.
pub fn parse_head_block(result: &Value) -> Result<u64, ChainError> {
    result
        .get("head_block_number")
        .and_then(Value::as_u64)
        .ok_or_else(|| ChainError::Decode("missing head_block_number".into()))
}
