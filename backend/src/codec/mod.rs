//! Codec for the `label:amount` line-item lists.
//!
//! ```text
//! list   := token (';' token)*
//! token  := amount | name ':' amount
//! ```
//!
//! Tokens are trimmed and whitespace-only tokens are skipped, so `""` and
//! `"Transport:50;"` are both accepted. A token with more than one `:` is
//! rejected rather than split, and names must be non-empty. Amounts are
//! non-negative decimals; their scale is kept, so `"50.00"` encodes back
//! as `"50.00"`.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::LineItemError;
use crate::models::LineItem;

pub const ITEM_SEPARATOR: char = ';';
pub const NAME_SEPARATOR: char = ':';

/// Decode a line-item list.
///
/// # Example
/// ```ignore
/// let items = paybatch::codec::decode("Transport:50;20")?;
/// assert_eq!(items[0].name.as_deref(), Some("Transport"));
/// assert_eq!(items[1].name, None);
/// ```
pub fn decode(input: &str) -> Result<Vec<LineItem>, LineItemError> {
    input
        .split(ITEM_SEPARATOR)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(decode_token)
        .collect()
}

fn decode_token(token: &str) -> Result<LineItem, LineItemError> {
    let mut parts = token.split(NAME_SEPARATOR);
    let first = parts.next().unwrap_or_default();

    match (parts.next(), parts.next()) {
        (None, _) => Ok(LineItem::anonymous(parse_amount(first)?)),
        (Some(amount), None) => {
            let name = first.trim();
            if name.is_empty() {
                return Err(LineItemError::EmptyName(token.to_string()));
            }
            Ok(LineItem::named(name, parse_amount(amount)?))
        }
        (Some(_), Some(_)) => Err(LineItemError::AmbiguousSeparator(token.to_string())),
    }
}

fn parse_amount(raw: &str) -> Result<Decimal, LineItemError> {
    let raw = raw.trim();
    let amount =
        Decimal::from_str(raw).map_err(|_| LineItemError::InvalidAmount(raw.to_string()))?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(LineItemError::NegativeAmount(raw.to_string()));
    }
    Ok(amount)
}

/// Encode a line-item list; the inverse of [`decode`].
///
/// Items that [`decode`] would not read back unchanged are rejected: empty
/// or padded names, names holding a separator, and negative amounts.
pub fn encode(items: &[LineItem]) -> Result<String, LineItemError> {
    let tokens = items
        .iter()
        .map(encode_token)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tokens.join(&ITEM_SEPARATOR.to_string()))
}

fn encode_token(item: &LineItem) -> Result<String, LineItemError> {
    if item.amount.is_sign_negative() && !item.amount.is_zero() {
        return Err(LineItemError::NegativeAmount(item.amount.to_string()));
    }
    match &item.name {
        Some(name) if name.is_empty() => Err(LineItemError::EmptyName(format!(
            "{}{}",
            NAME_SEPARATOR, item.amount
        ))),
        Some(name)
            if name.trim() != name.as_str()
                || name.contains(NAME_SEPARATOR)
                || name.contains(ITEM_SEPARATOR) =>
        {
            Err(LineItemError::UnencodableName(name.clone()))
        }
        Some(name) => Ok(format!("{}{}{}", name, NAME_SEPARATOR, item.amount)),
        None => Ok(item.amount.to_string()),
    }
}

/// Sum of all amounts in a list.
pub fn total(items: &[LineItem]) -> Decimal {
    items.iter().map(|i| i.amount).sum()
}
