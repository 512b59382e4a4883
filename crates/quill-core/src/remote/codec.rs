//! Note <-> remote document conversion

use super::{Document, FieldValue, Fields};
use crate::error::{Error, Result};
use crate::models::{Note, Timestamp};

const ID: &str = "id";
const TITLE: &str = "title";
const DESCRIPTION: &str = "description";
const CREATED_AT: &str = "createdAt";
const UPDATED_AT: &str = "updatedAt";
const ORDER: &str = "order";

/// Encode a note, converting its timestamps to the native representation
pub fn note_to_fields(note: &Note) -> Fields {
    let mut fields = Fields::new();
    fields.insert(ID.to_string(), FieldValue::String(note.id.to_string()));
    fields.insert(TITLE.to_string(), FieldValue::String(note.title.clone()));
    fields.insert(
        DESCRIPTION.to_string(),
        FieldValue::String(note.description.clone()),
    );
    fields.insert(
        CREATED_AT.to_string(),
        FieldValue::Timestamp(note.created_at.to_native()),
    );
    if let Some(updated_at) = note.updated_at {
        fields.insert(
            UPDATED_AT.to_string(),
            FieldValue::Timestamp(updated_at.to_native()),
        );
    }
    if let Some(order) = note.order {
        fields.insert(ORDER.to_string(), FieldValue::Integer(i64::from(order)));
    }
    fields
}

/// Decode and validate a note document.
///
/// The note id comes from the document path. Unknown fields are ignored;
/// a missing or mistyped required field is a serialization failure.
pub fn note_from_document(document: &Document) -> Result<Note> {
    let id = document.id.parse().map_err(|_| {
        Error::Serialization(format!("document has an invalid id: '{}'", document.id))
    })?;
    let fields = &document.fields;

    Ok(Note {
        id,
        title: required_string(fields, TITLE, &document.id)?,
        description: required_string(fields, DESCRIPTION, &document.id)?,
        created_at: optional_timestamp(fields, CREATED_AT, &document.id)?.ok_or_else(|| {
            Error::Serialization(format!(
                "document {} is missing '{CREATED_AT}'",
                document.id
            ))
        })?,
        updated_at: optional_timestamp(fields, UPDATED_AT, &document.id)?,
        order: optional_order(fields, &document.id)?,
    })
}

fn mistyped(document_id: &str, field: &str, expected: &str) -> Error {
    Error::Serialization(format!(
        "document {document_id} field '{field}' is not a {expected}"
    ))
}

fn required_string(fields: &Fields, field: &str, document_id: &str) -> Result<String> {
    optional_string(fields, field, document_id)?
        .ok_or_else(|| Error::Serialization(format!("document {document_id} is missing '{field}'")))
}

fn optional_string(fields: &Fields, field: &str, document_id: &str) -> Result<Option<String>> {
    match fields.get(field) {
        None | Some(FieldValue::Null) => Ok(None),
        Some(FieldValue::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(mistyped(document_id, field, "string")),
    }
}

/// Native timestamps, plus the ISO strings older clients wrote
fn optional_timestamp(
    fields: &Fields,
    field: &str,
    document_id: &str,
) -> Result<Option<Timestamp>> {
    match fields.get(field) {
        None | Some(FieldValue::Null) => Ok(None),
        Some(FieldValue::Timestamp(native)) => Timestamp::from_native(*native).map(Some),
        Some(FieldValue::String(text)) => Timestamp::parse_rfc3339(text).map(Some),
        Some(_) => Err(mistyped(document_id, field, "timestamp")),
    }
}

fn optional_order(fields: &Fields, document_id: &str) -> Result<Option<u32>> {
    let raw = match fields.get(ORDER) {
        None | Some(FieldValue::Null) => return Ok(None),
        Some(FieldValue::Integer(value)) => *value,
        #[allow(clippy::cast_possible_truncation)]
        Some(FieldValue::Double(value)) if value.fract() == 0.0 => *value as i64,
        Some(_) => return Err(mistyped(document_id, ORDER, "non-negative integer")),
    };
    u32::try_from(raw)
        .map(Some)
        .map_err(|_| mistyped(document_id, ORDER, "non-negative integer"))
}
