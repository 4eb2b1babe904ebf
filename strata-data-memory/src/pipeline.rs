use crate::matcher::{lookup, matches, project, sort_documents};
use serde_json::Value;
use strata_data::{Accumulator, DataError, Document, Stage};

/// Run aggregation stages over an in-memory row set.
pub fn run(mut rows: Vec<Document>, stages: &[Stage], id_field: &str) -> Result<Vec<Document>, DataError> {
    for stage in stages {
        rows = match stage {
            Stage::Match(filter) => {
                let mut kept = Vec::with_capacity(rows.len());
                for row in rows {
                    if matches(filter, &row)? {
                        kept.push(row);
                    }
                }
                kept
            }
            Stage::Sort(sort) => {
                sort_documents(&mut rows, sort);
                rows
            }
            Stage::Skip(n) => rows.into_iter().skip(*n as usize).collect(),
            Stage::Limit(n) => rows.into_iter().take(*n as usize).collect(),
            Stage::Project(fields) => rows.iter().map(|r| project(r, fields, id_field)).collect(),
            Stage::Group { key, accumulators } => group(&rows, key, accumulators),
            Stage::Count(field) => {
                let mut row = Document::new();
                row.insert(field.clone(), Value::from(rows.len() as u64));
                vec![row]
            }
        };
    }
    Ok(rows)
}

fn group(rows: &[Document], key: &str, accumulators: &[(String, Accumulator)]) -> Vec<Document> {
    // Groups keep first-seen order.
    let mut groups: Vec<(Value, Vec<&Document>)> = Vec::new();
    for row in rows {
        let value = lookup(row, key).cloned().unwrap_or(Value::Null);
        match groups.iter_mut().find(|(k, _)| *k == value) {
            Some((_, members)) => members.push(row),
            None => groups.push((value, vec![row])),
        }
    }

    groups
        .into_iter()
        .map(|(value, members)| {
            let mut out = Document::new();
            out.insert("_id".to_string(), value);
            for (name, acc) in accumulators {
                let result = match acc {
                    Accumulator::Count => Value::from(members.len() as u64),
                    Accumulator::Sum(field) => sum(&members, field),
                };
                out.insert(name.clone(), result);
            }
            out
        })
        .collect()
}

fn sum(members: &[&Document], field: &str) -> Value {
    let values = members
        .iter()
        .filter_map(|row| lookup(row, field))
        .filter(|v| v.is_number());
    let mut int_total: i64 = 0;
    let mut float_total: f64 = 0.0;
    let mut all_int = true;
    for number in values {
        if all_int {
            // Stay exact until a float shows up or the total leaves i64 range
            if let Some(total) = number.as_i64().and_then(|i| int_total.checked_add(i)) {
                int_total = total;
                continue;
            }
            float_total = int_total as f64;
            all_int = false;
        }
        float_total += number.as_f64().unwrap_or(0.0);
    }
    if all_int {
        Value::from(int_total)
    } else {
        Value::from(float_total)
    }
}
