use serde_json::Value;

/// Key figures, most telling first. `state` is searched before the result
/// itself so every lifecycle operation reports its headline liability.
const PRIORITY_KEYS: [&str; 8] = [
    "lease_liability",
    "remain_debt",
    "future_payments",
    "residual_book_value",
    "category",
    "gain_loss",
    "rou_asset",
    "initial_carrying_amount",
];

/// Print just the key answer value from the output.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Value::Object(map) = result_obj {
        let state = map.get("state").and_then(Value::as_object);
        for key in PRIORITY_KEYS {
            let found = state
                .and_then(|s| s.get(key))
                .or_else(|| map.get(key))
                .filter(|v| !v.is_null());
            if let Some(val) = found {
                println!("{}", format_minimal(val));
                return;
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    // Arrays (generated or normalized schedules): one row per line
    if let Value::Array(rows) = result_obj {
        println!("{} entries", rows.len());
        return;
    }

    println!("{}", format_minimal(result_obj));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
