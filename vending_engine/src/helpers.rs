use regex::Regex;

/// The abbreviation shown on the 16-character display for a drink name: the uppercased first letter of every word.
///
/// `"Lychee Milk Tea"` becomes `"LMT"`.
pub fn get_initials(name: &str) -> String {
    name.split_whitespace().filter_map(|word| word.chars().next()).flat_map(char::to_uppercase).collect()
}

/// The payload of the QR code handed to a customer for the given order.
pub fn collection_code(order_id: i64, phone_number: &str) -> String {
    format!("ORDER_{order_id}_{phone_number}")
}

/// Splits a scanned collection code into the order id and phone number. Returns `None` for anything that is not a
/// well-formed code.
pub fn parse_collection_code(code: &str) -> Option<(i64, String)> {
    let re = Regex::new(r"^ORDER_(\d+)_(\+?\d+)$").ok()?;
    let caps = re.captures(code.trim())?;
    let order_id = caps.get(1)?.as_str().parse().ok()?;
    let phone = caps.get(2)?.as_str().to_string();
    Some((order_id, phone))
}
