//! Inline rendering of bound statements for diagnostics.
//!
//! The output is meant for logs and debugging only; never execute it.

use rusqlite::types::Value;

/// Substitutes each `?` placeholder in `sql` with the matching binding
/// rendered as a SQL literal. Placeholders inside quoted literals are kept.
pub fn render_sql(sql: &str, bindings: &[Value]) -> String {
    let mut rendered = String::with_capacity(sql.len() + bindings.len() * 8);
    let mut remaining = bindings.iter();
    let mut in_literal = false;

    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_literal = !in_literal;
                rendered.push(ch);
            }
            '?' if !in_literal => match remaining.next() {
                Some(value) => rendered.push_str(&sql_literal(value)),
                None => rendered.push(ch),
            },
            _ => rendered.push(ch),
        }
    }
    rendered
}

fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(value) => value.to_string(),
        Value::Real(value) => value.to_string(),
        Value::Text(value) => format!("'{}'", value.replace('\'', "''")),
        Value::Blob(bytes) => {
            let hex: String = bytes.iter().map(|byte| format!("{byte:02X}")).collect();
            format!("X'{hex}'")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::render_sql;
    use rusqlite::types::Value;

    #[test]
    fn renders_bindings_in_order() {
        let rendered = render_sql(
            "SELECT * FROM posts WHERE title = ? AND id IN (?, ?) AND deleted_at IS NULL",
            &[
                Value::Text("it's".to_string()),
                Value::Integer(1),
                Value::Null,
            ],
        );
        assert_eq!(
            rendered,
            "SELECT * FROM posts WHERE title = 'it''s' AND id IN (1, NULL) AND deleted_at IS NULL"
        );
    }

    #[test]
    fn keeps_question_marks_inside_literals_and_missing_bindings() {
        let rendered = render_sql("SELECT '?' , ? , ?", &[Value::Blob(vec![0xAB, 0x01])]);
        assert_eq!(rendered, "SELECT '?' , X'AB01' , ?");
    }
}
