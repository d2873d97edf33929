use sqlx::Arguments;
use sqlx::postgres::PgArguments;
use twolane_contracts::{FieldValue, UpdateRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Int,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub field: &'static str,
    pub column: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    pub const fn text(field: &'static str, column: &'static str) -> Self {
        Self {
            field,
            column,
            kind: ColumnKind::Text,
        }
    }

    pub const fn int(field: &'static str, column: &'static str) -> Self {
        Self {
            field,
            column,
            kind: ColumnKind::Int,
        }
    }

    pub const fn bool(field: &'static str, column: &'static str) -> Self {
        Self {
            field,
            column,
            kind: ColumnKind::Bool,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldMap {
    columns: &'static [Column],
}

impl FieldMap {
    pub const fn new(columns: &'static [Column]) -> Self {
        Self { columns }
    }

    pub fn column(&self, field: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.field == field)
    }
}

pub const USER_FIELDS: FieldMap = FieldMap::new(&[
    Column::text("username", "username"),
    Column::text("email", "email"),
    Column::bool("is_admin", "is_admin"),
    Column::text("password", "hashed_pw"),
]);

pub const CAR_FIELDS: FieldMap = FieldMap::new(&[
    Column::text("make", "make"),
    Column::text("model", "model"),
    Column::int("model_year", "model_year"),
]);

pub const DRIVE_FIELDS: FieldMap = FieldMap::new(&[
    Column::text("title", "title"),
    Column::text("description", "description"),
    Column::text("route_link", "route_link"),
]);

pub const POST_FIELDS: FieldMap = FieldMap::new(&[
    Column::text("title", "title"),
    Column::text("body", "body"),
]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    Empty,
    UnknownField(String),
}

impl std::fmt::Display for UpdateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateError::Empty => write!(f, "no fields to update"),
            UpdateError::UnknownField(field) => write!(f, "unknown field `{}`", field),
        }
    }
}

impl std::error::Error for UpdateError {}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledUpdate {
    pub assignments: Vec<String>,
    pub values: Vec<FieldValue>,
    kinds: Vec<Option<ColumnKind>>,
}

impl CompiledUpdate {
    pub fn set_clause(&self) -> String {
        self.assignments.join(", ")
    }

    pub fn next_param(&self) -> usize {
        self.values.len() + 1
    }

    pub fn bind_values(&self, args: &mut PgArguments) -> Result<(), sqlx::Error> {
        for (value, kind) in self.values.iter().zip(&self.kinds) {
            let added = match value {
                FieldValue::Null => match kind {
                    Some(ColumnKind::Int) => args.add(None::<i32>),
                    Some(ColumnKind::Bool) => args.add(None::<bool>),
                    Some(ColumnKind::Text) | None => args.add(None::<String>),
                },
                FieldValue::Bool(b) => args.add(*b),
                FieldValue::Int(i) => match kind {
                    Some(ColumnKind::Int) => match i32::try_from(*i) {
                        Ok(i) => args.add(i),
                        Err(_) => args.add(*i),
                    },
                    _ => args.add(*i),
                },
                FieldValue::Text(s) => args.add(s.clone()),
            };
            added.map_err(sqlx::Error::Encode)?;
        }
        Ok(())
    }
}

/// Keys missing from `fields` are used verbatim as the column name; the store
/// goes through [`compile_known`].
pub fn compile(update: &UpdateRequest, fields: &FieldMap) -> Result<CompiledUpdate, UpdateError> {
    compile_inner(update, fields, true)
}

pub fn compile_known(
    update: &UpdateRequest,
    fields: &FieldMap,
) -> Result<CompiledUpdate, UpdateError> {
    compile_inner(update, fields, false)
}

fn compile_inner(
    update: &UpdateRequest,
    fields: &FieldMap,
    allow_unknown: bool,
) -> Result<CompiledUpdate, UpdateError> {
    if update.is_empty() {
        return Err(UpdateError::Empty);
    }

    let mut compiled = CompiledUpdate {
        assignments: Vec::with_capacity(update.len()),
        values: Vec::with_capacity(update.len()),
        kinds: Vec::with_capacity(update.len()),
    };

    for (idx, (field, value)) in update.iter().enumerate() {
        let (column, kind) = match fields.column(field) {
            Some(c) => (c.column, Some(c.kind)),
            None if allow_unknown => (field, None),
            None => return Err(UpdateError::UnknownField(field.to_string())),
        };
        compiled.assignments.push(format!("{} = ${}", column, idx + 1));
        compiled.values.push(value.clone());
        compiled.kinds.push(kind);
    }

    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY: FieldMap = FieldMap::new(&[]);
    const RENAMED: FieldMap = FieldMap::new(&[
        Column::text("email", "email"),
        Column::text("username", "uname"),
    ]);

    #[test]
    fn assignments_follow_request_order() {
        let update = UpdateRequest::new()
            .with("model_year", 2004)
            .with("make", "Honda")
            .with("model", FieldValue::Null);

        let compiled = compile(&update, &CAR_FIELDS).unwrap();

        assert_eq!(
            compiled.assignments,
            vec!["model_year = $1", "make = $2", "model = $3"]
        );
        assert_eq!(
            compiled.values,
            vec![
                FieldValue::Int(2004),
                FieldValue::Text("Honda".to_string()),
                FieldValue::Null,
            ]
        );
        assert_eq!(compiled.set_clause(), "model_year = $1, make = $2, model = $3");
        assert_eq!(compiled.next_param(), 4);
    }

    #[test]
    fn lengths_match_input() {
        for n in 1..=6 {
            let update = (0..n).fold(UpdateRequest::new(), |req, i| {
                req.with(format!("f{}", i), i)
            });
            let compiled = compile(&update, &EMPTY).unwrap();
            assert_eq!(compiled.assignments.len(), n as usize);
            assert_eq!(compiled.values.len(), n as usize);
        }
    }

    #[test]
    fn empty_update_is_rejected() {
        assert_eq!(
            compile(&UpdateRequest::new(), &USER_FIELDS),
            Err(UpdateError::Empty)
        );
        assert_eq!(
            compile_known(&UpdateRequest::new(), &EMPTY),
            Err(UpdateError::Empty)
        );
    }

    #[test]
    fn public_names_map_to_columns() {
        let update = UpdateRequest::new().with("username", "bob");
        let compiled = compile(&update, &RENAMED).unwrap();
        assert_eq!(compiled.assignments, vec!["uname = $1"]);
        assert_eq!(compiled.values, vec![FieldValue::Text("bob".to_string())]);

        let update = UpdateRequest::new().with("password", "$argon2id$...");
        let compiled = compile(&update, &USER_FIELDS).unwrap();
        assert_eq!(compiled.assignments, vec!["hashed_pw = $1"]);
    }

    #[test]
    fn unmapped_keys_fall_back_to_their_name() {
        let update = UpdateRequest::new().with("foo", 1);
        let compiled = compile(&update, &EMPTY).unwrap();
        assert_eq!(compiled.assignments, vec!["foo = $1"]);
        assert_eq!(compiled.values, vec![FieldValue::Int(1)]);
    }

    #[test]
    fn compile_known_rejects_unmapped_keys() {
        let update = UpdateRequest::new()
            .with("title", "t")
            .with("route_link; DROP TABLE drives", "x");
        assert_eq!(
            compile_known(&update, &DRIVE_FIELDS),
            Err(UpdateError::UnknownField(
                "route_link; DROP TABLE drives".to_string()
            ))
        );
    }

    #[test]
    fn null_values_are_kept() {
        let update = UpdateRequest::new().with("email", FieldValue::Null);
        let compiled = compile_known(&update, &USER_FIELDS).unwrap();
        assert_eq!(compiled.assignments, vec!["email = $1"]);
        assert_eq!(compiled.values, vec![FieldValue::Null]);
    }

    #[test]
    fn values_bind_without_error() {
        let update = UpdateRequest::new()
            .with("make", "Saab")
            .with("model_year", FieldValue::Null)
            .with("model", "900");
        let compiled = compile_known(&update, &CAR_FIELDS).unwrap();

        let mut args = PgArguments::default();
        compiled.bind_values(&mut args).unwrap();
        assert_eq!(args.len(), 3);
    }
}
