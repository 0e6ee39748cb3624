use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });
            if let Some(data) = data {
                response["data"] = data;
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
            if let Some(data) = data {
                print_fields(&data, 1);
            }
        }
    }
    Ok(())
}

/// Output a data payload: pretty JSON, or indented `key: value` lines
pub fn output_data(output_format: OutputFormat, data: &Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
        OutputFormat::Text => print_fields(data, 0),
    }
    Ok(())
}

fn print_fields(value: &Value, depth: usize) {
    for line in text_lines(value, depth) {
        println!("{}", line);
    }
}

fn text_lines(value: &Value, depth: usize) -> Vec<String> {
    let indent = "  ".repeat(depth);
    let mut lines = Vec::new();

    match value {
        Value::Object(map) => {
            for (key, value) in map {
                match value {
                    Value::Object(_) | Value::Array(_) => {
                        lines.push(format!("{}{}:", indent, key));
                        lines.extend(text_lines(value, depth + 1));
                    }
                    _ => lines.push(format!("{}{}: {}", indent, key, scalar(value))),
                }
            }
        }
        Value::Array(items) if items.is_empty() => lines.push(format!("{}(none)", indent)),
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Object(_) | Value::Array(_) => {
                        lines.push(format!("{}-", indent));
                        lines.extend(text_lines(item, depth + 1));
                    }
                    _ => lines.push(format!("{}- {}", indent, scalar(item))),
                }
            }
        }
        other => lines.push(format!("{}{}", indent, scalar(other))),
    }
    lines
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}
