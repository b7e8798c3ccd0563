use serde_json::{Map, Value};
use std::io;

type StdoutWriter<'a> = csv::Writer<io::StdoutLock<'a>>;

/// Write output as CSV to stdout.
///
/// Generated or normalized schedules are a single table. Lifecycle results
/// start with `field,value` rows for the headline figures, followed by one
/// block per schedule separated by a blank record.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(stdout.lock());

    match value {
        Value::Object(map) => {
            let result = match map.get("result") {
                Some(Value::Object(result)) => result,
                _ => map,
            };
            write_result(&mut wtr, result);
        }
        Value::Array(rows) => write_rows(&mut wtr, rows),
        _ => {
            let _ = wtr.write_record([format_csv_value(value)]);
        }
    }

    let _ = wtr.flush();
}

fn write_result(wtr: &mut StdoutWriter<'_>, result: &Map<String, Value>) {
    let _ = wtr.write_record(["field", "value"]);
    let mut schedules = Vec::new();
    for (key, val) in result {
        match val {
            Value::Object(inner) => {
                for (inner_key, inner_val) in inner {
                    let _ = wtr.write_record([
                        format!("{key}.{inner_key}"),
                        format_csv_value(inner_val),
                    ]);
                }
            }
            Value::Array(rows) if rows.first().is_some_and(Value::is_object) => {
                schedules.push((key, rows));
            }
            _ => {
                let _ = wtr.write_record([key.clone(), format_csv_value(val)]);
            }
        }
    }

    for (key, rows) in schedules {
        let _ = wtr.write_record([""]);
        let _ = wtr.write_record([key.as_str()]);
        write_rows(wtr, rows);
    }
}

fn write_rows(wtr: &mut StdoutWriter<'_>, rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            let _ = wtr.write_record([format_csv_value(item)]);
        }
        return;
    };

    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    let _ = wtr.write_record(&headers);
    for row in rows.iter().filter_map(Value::as_object) {
        let record: Vec<String> = headers
            .iter()
            .map(|h| row.get(*h).map(format_csv_value).unwrap_or_default())
            .collect();
        let _ = wtr.write_record(&record);
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
