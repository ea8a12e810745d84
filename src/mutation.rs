use prost_types::{ListValue, Value};

use crate::key::KeySet;
use crate::proto::spanner::mutation::{Delete, Operation, Write};
use crate::proto::spanner::Mutation;
use crate::statement::ToKind;

fn write(table: &str, columns: &[&str], values: &[&dyn ToKind]) -> Write {
    Write {
        table: table.to_string(),
        columns: columns.iter().map(|c| c.to_string()).collect(),
        values: vec![ListValue {
            values: values
                .iter()
                .map(|v| Value {
                    kind: Some(v.to_kind()),
                })
                .collect(),
        }],
    }
}

/// Inserts a new row; the commit fails with AlreadyExists if the row exists.
pub fn insert(table: &str, columns: &[&str], values: &[&dyn ToKind]) -> Mutation {
    Mutation {
        operation: Some(Operation::Insert(write(table, columns, values))),
    }
}

/// Updates columns of an existing row; the commit fails with NotFound if the
/// row does not exist.
pub fn update(table: &str, columns: &[&str], values: &[&dyn ToKind]) -> Mutation {
    Mutation {
        operation: Some(Operation::Update(write(table, columns, values))),
    }
}

pub fn insert_or_update(table: &str, columns: &[&str], values: &[&dyn ToKind]) -> Mutation {
    Mutation {
        operation: Some(Operation::InsertOrUpdate(write(table, columns, values))),
    }
}

/// Deletes then re-inserts the row; unspecified columns become NULL.
pub fn replace(table: &str, columns: &[&str], values: &[&dyn ToKind]) -> Mutation {
    Mutation {
        operation: Some(Operation::Replace(write(table, columns, values))),
    }
}

pub fn delete(table: &str, key_set: impl Into<KeySet>) -> Mutation {
    Mutation {
        operation: Some(Operation::Delete(Delete {
            table: table.to_string(),
            key_set: Some(key_set.into().inner),
        })),
    }
}
