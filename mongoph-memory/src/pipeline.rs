//! A small aggregation pipeline interpreter.
//!
//! Supports the stages that read-side reporting typically needs: `$match`,
//! `$sort`, `$skip`, `$limit`, `$project` and `$count`. Any other stage is
//! rejected so callers find out early rather than receiving partial results.

use bson::{Bson, Document, doc};

use mongoph_core::query::{Expr, Sort};

use crate::{
    evaluator::{DocumentEvaluator, sort_records},
    projection::project,
};

fn as_count(stage: &str, value: &Bson) -> Result<usize, String> {
    let count = match value {
        Bson::Int32(n) => i64::from(*n),
        Bson::Int64(n) => *n,
        Bson::Double(n) if n.fract() == 0.0 => *n as i64,
        _ => return Err(format!("{stage} expects a non-negative integer")),
    };

    usize::try_from(count).map_err(|_| format!("{stage} expects a non-negative integer"))
}

fn operand<'a>(stage: &str, value: &'a Bson) -> Result<&'a Document, String> {
    match value {
        Bson::Document(inner) => Ok(inner),
        _ => Err(format!("{stage} expects a document")),
    }
}

fn run_stage(records: Vec<Document>, stage: &Document) -> Result<Vec<Document>, String> {
    let mut entries = stage.iter();
    let (name, value) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        _ => return Err("a pipeline stage must have exactly one field".to_string()),
    };

    match name.as_str() {
        "$match" => {
            let expr = Expr::from_criteria(operand(name, value)?).map_err(|e| e.to_string())?;
            let mut kept = Vec::with_capacity(records.len());

            for record in records {
                if DocumentEvaluator::new(&record).evaluate(&expr).map_err(|e| e.to_string())? {
                    kept.push(record);
                }
            }

            Ok(kept)
        }
        "$sort" => {
            let keys = Sort::from_document(operand(name, value)?).map_err(|e| e.to_string())?;
            let mut records = records;
            sort_records(&mut records, &keys);
            Ok(records)
        }
        "$skip" => Ok(records.into_iter().skip(as_count(name, value)?).collect()),
        "$limit" => Ok(records.into_iter().take(as_count(name, value)?).collect()),
        "$project" => {
            let projection = operand(name, value)?;
            records.iter().map(|record| project(record, projection)).collect()
        }
        "$count" => {
            let Bson::String(field) = value else {
                return Err("$count expects a field name".to_string());
            };

            if records.is_empty() {
                return Ok(Vec::new());
            }

            let total = i64::try_from(records.len()).unwrap_or(i64::MAX);
            Ok(vec![doc! { field.as_str(): total }])
        }
        other => Err(format!("unsupported pipeline stage {other}")),
    }
}

/// Runs `pipeline` over `records`, stage by stage.
pub(crate) fn run_pipeline(records: Vec<Document>, pipeline: &[Document]) -> Result<Vec<Document>, String> {
    pipeline.iter().try_fold(records, run_stage)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Vec<Document> {
        vec![
            doc! { "name": "ada", "age": 36 },
            doc! { "name": "bob", "age": 25 },
            doc! { "name": "cy", "age": 41 },
        ]
    }

    #[test]
    fn match_sort_skip_limit_project() {
        let pipeline = [
            doc! { "$match": { "age": { "$gt": 30 } } },
            doc! { "$sort": { "age": -1 } },
            doc! { "$skip": 0 },
            doc! { "$limit": 1 },
            doc! { "$project": { "name": 1, "_id": 0 } },
        ];

        assert_eq!(run_pipeline(people(), &pipeline).unwrap(), vec![doc! { "name": "cy" }]);
    }

    #[test]
    fn count_stage() {
        let counted = run_pipeline(people(), &[doc! { "$count": "total" }]).unwrap();
        assert_eq!(counted, vec![doc! { "total": 3_i64 }]);

        let none = run_pipeline(people(), &[doc! { "$match": { "age": 0 } }, doc! { "$count": "total" }]).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn unknown_stage_is_rejected() {
        assert!(run_pipeline(people(), &[doc! { "$group": { "_id": "$age" } }]).is_err());
        assert!(run_pipeline(people(), &[doc! { "$limit": -1 }]).is_err());
    }
}
