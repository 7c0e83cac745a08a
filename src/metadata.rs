//! Entity metadata and the traits mapped types implement
//!
//! A mapped type carries a static, build-time description of its fields
//! ([`ColumnDef`]) through [`EntityTrait`]. [`EntityMetadata::of`] reads that
//! description and resolves it into the runtime view every other component
//! works with: the derived table name, the column names after naming
//! conversion, the primary key and the foreign keys.
//!
//! These traits are normally implemented by `#[derive(Entity)]`.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Error;
use crate::error::Result;
use crate::naming::to_snake_case;
use crate::value::LogicalType;
use crate::value::Value;

/// Default length of sized character columns
pub const DEFAULT_LENGTH: u32 = 255;

/// Default column a relationship references on the target table
pub const DEFAULT_REFERENCED_COLUMN: &str = "id";

/// Declared target of a many-to-one relationship
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReferenceDef {
    /// Simple name of the referenced type
    pub type_name:  &'static str,
    /// Explicit table name of the referenced type, if it overrides the derived one
    pub table_name: Option<&'static str>,
    /// Referenced property on the target
    pub column:     &'static str,
}

/// Build-time declaration of a single mapped field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnDef {
    pub property:       &'static str,
    pub column_name:    Option<&'static str>,
    pub logical_type:   LogicalType,
    pub length:         u32,
    pub nullable:       bool,
    pub unique:         bool,
    pub primary_key:    bool,
    pub auto_generated: bool,
    pub references:     Option<ReferenceDef>,
}

impl ColumnDef {
    pub const fn new(property: &'static str, logical_type: LogicalType) -> Self {
        Self {
            property,
            column_name: None,
            logical_type,
            length: DEFAULT_LENGTH,
            nullable: false,
            unique: false,
            primary_key: false,
            auto_generated: false,
            references: None,
        }
    }

    pub const fn named(mut self, column_name: &'static str) -> Self {
        self.column_name = Some(column_name);
        self
    }

    pub const fn length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub const fn auto_generated(mut self) -> Self {
        self.auto_generated = true;
        self
    }

    pub const fn references(mut self, reference: ReferenceDef) -> Self {
        self.references = Some(reference);
        self
    }
}

/// Decode a row produced by the entity's default projection
pub trait FromRow: Sized {
    fn from_row(row: &turso::Row) -> Result<Self>;
}

/// Trait for record types mapped to a table
///
/// # Example
///
/// ```ignore
/// #[derive(Clone, Debug, Default, Entity)]
/// pub struct Teacher {
///     #[rowmap(primary_key, auto_generated)]
///     pub id: Option<i64>,
///     #[rowmap(length = 50)]
///     pub first_name: Option<String>,
///     #[rowmap(length = 50)]
///     pub last_name: String,
/// }
///
/// let metadata = Teacher::metadata()?;
/// assert_eq!(metadata.table_name(), "teacher");
/// ```
pub trait EntityTrait: FromRow + Send + Sync + Sized + 'static {
    /// Simple name of the type
    const TYPE_NAME: &'static str;

    /// Explicit table name overriding the converted type name
    const TABLE_NAME: Option<&'static str> = None;

    /// Field declarations in declaration order
    const COLUMNS: &'static [ColumnDef];

    /// The primary key value, or `None` while it is unassigned
    fn primary_key_value(&self) -> Option<Value>;

    /// Assign the primary key, typically the key generated by an insert
    fn set_primary_key_value(&mut self, value: Value) -> Result<()>;

    /// Values of every stored field keyed by property name
    ///
    /// An unassigned primary key is left out; a `None` in any other optional
    /// field is reported as [`Value::Null`].
    fn column_values(&self) -> Vec<(&'static str, Value)>;

    fn metadata() -> Result<EntityMetadata> {
        EntityMetadata::of::<Self>()
    }
}

/// Runtime description of one mapped field
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnMetadata {
    pub property:       &'static str,
    pub name:           String,
    pub logical_type:   LogicalType,
    pub length:         u32,
    pub nullable:       bool,
    pub unique:         bool,
    pub primary_key:    bool,
    pub auto_generated: bool,
}

impl ColumnMetadata {
    /// Whether the field occupies a column in the table
    pub fn has_column(&self) -> bool {
        self.logical_type.has_column()
    }

    /// Whether the entity manager writes this column
    pub fn is_writable(&self) -> bool {
        self.has_column() && !self.auto_generated
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForeignKeyMetadata {
    pub column:            String,
    pub referenced_table:  String,
    pub referenced_column: String,
}

/// Resolved table, column and relationship description of an entity
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityMetadata {
    type_name:    &'static str,
    table_name:   String,
    columns:      Vec<ColumnMetadata>,
    primary_key:  Option<usize>,
    foreign_keys: Vec<ForeignKeyMetadata>,
}

impl EntityMetadata {
    /// Reflect the declarations of `E`
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntityNotFound`] when the type carries no usable
    /// declarations.
    pub fn of<E: EntityTrait>() -> Result<Self> {
        Self::reflect(E::TYPE_NAME, E::TABLE_NAME, E::COLUMNS)
    }

    /// Build metadata from raw declarations
    ///
    /// # Errors
    ///
    /// [`Error::Query`] for duplicated columns or primary keys, and for an
    /// `auto_generated` column that is not an integer primary key.
    pub fn reflect(type_name: &'static str, table_name: Option<&str>, definitions: &[ColumnDef]) -> Result<Self> {
        if type_name.is_empty() {
            return Err(Error::EntityNotFound("<unnamed type>".to_string()));
        }
        if definitions.is_empty() {
            return Err(Error::EntityNotFound(format!("{} declares no columns", type_name)));
        }

        let table_name = table_name.map(str::to_string).unwrap_or_else(|| to_snake_case(type_name));
        let mut columns: Vec<ColumnMetadata> = Vec::with_capacity(definitions.len());
        let mut primary_key = None;
        let mut foreign_keys = Vec::new();

        for def in definitions {
            let name = def.column_name.map(str::to_string).unwrap_or_else(|| to_snake_case(def.property));

            if def.logical_type.has_column() && columns.iter().any(|c| c.has_column() && c.name == name) {
                return Err(Error::Query(format!("{} maps column {} more than once", type_name, name)));
            }

            if def.auto_generated && !def.primary_key {
                return Err(Error::Query(format!("{}.{} is auto generated but not the primary key", type_name, def.property)));
            }
            if def.auto_generated && def.logical_type != LogicalType::Integer {
                return Err(Error::Query(format!("{}.{} is auto generated but not an integer", type_name, def.property)));
            }

            if def.primary_key {
                if primary_key.is_some() {
                    return Err(Error::Query(format!("{} declares more than one primary key", type_name)));
                }
                primary_key = Some(columns.len());
            }

            if let Some(reference) = def.references.filter(|_| def.logical_type.has_column()) {
                foreign_keys.push(ForeignKeyMetadata {
                    column:            name.clone(),
                    referenced_table:  reference
                        .table_name
                        .map(str::to_string)
                        .unwrap_or_else(|| to_snake_case(reference.type_name)),
                    referenced_column: to_snake_case(reference.column),
                });
            }

            columns.push(ColumnMetadata {
                property: def.property,
                name,
                logical_type: def.logical_type,
                length: def.length,
                nullable: def.nullable,
                unique: def.unique,
                primary_key: def.primary_key,
                auto_generated: def.auto_generated,
            });
        }

        Ok(Self { type_name, table_name, columns, primary_key, foreign_keys })
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    /// Columns that exist in the table, in declaration order
    pub fn stored_columns(&self) -> impl Iterator<Item = &ColumnMetadata> {
        self.columns.iter().filter(|c| c.has_column())
    }

    pub fn primary_key_column(&self) -> Option<&ColumnMetadata> {
        self.primary_key.map(|idx| &self.columns[idx])
    }

    /// Name of the primary-key column
    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key_column().map(|c| c.name.as_str())
    }

    pub fn foreign_keys(&self) -> &[ForeignKeyMetadata] {
        &self.foreign_keys
    }

    /// Look a column up by property name, falling back to column name
    pub fn column(&self, field: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.property == field).or_else(|| self.columns.iter().find(|c| c.name == field))
    }

    /// Column name for a logical field name
    ///
    /// Only fields stored in the table resolve; the returned name is safe to
    /// splice into generated SQL.
    ///
    /// # Errors
    ///
    /// [`Error::Query`] when `field` names no stored column.
    pub fn column_name(&self, field: &str) -> Result<&str> {
        self.column(field)
            .filter(|c| c.has_column())
            .map(|c| c.name.as_str())
            .ok_or_else(|| Error::Query(format!("{} has no column {}", self.type_name, field)))
    }

    /// Every stored column aliased to its property name
    ///
    /// The order matches the positional decoding of the generated `FromRow`.
    pub fn projection(&self, alias: Option<&str>) -> Vec<String> {
        self.stored_columns()
            .map(|c| match alias {
                Some(alias) => format!("{}.{} AS {}", alias, c.name, c.property),
                None => format!("{} AS {}", c.name, c.property),
            })
            .collect()
    }
}

/// Cache of reflected metadata
///
/// Entries are built once on registration and shared immutably afterwards.
/// Besides lookups by type, the registry resolves entities from a name (type
/// name or table name), the path used when the entity is only known at
/// runtime.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    entries: Vec<Arc<EntityMetadata>>,
    by_type: HashMap<TypeId, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reflect and store the metadata of `E`, or return the stored entry
    pub fn register<E: EntityTrait>(&mut self) -> Result<Arc<EntityMetadata>> {
        if let Some(&idx) = self.by_type.get(&TypeId::of::<E>()) {
            return Ok(Arc::clone(&self.entries[idx]));
        }

        let metadata = Arc::new(EntityMetadata::of::<E>()?);
        if self.entries.iter().any(|m| m.table_name() == metadata.table_name()) {
            return Err(Error::Query(format!("table {} is already registered", metadata.table_name())));
        }

        tracing::debug!(entity = E::TYPE_NAME, table = metadata.table_name(), "registered entity");
        self.by_type.insert(TypeId::of::<E>(), self.entries.len());
        self.entries.push(Arc::clone(&metadata));
        Ok(metadata)
    }

    pub fn get<E: EntityTrait>(&self) -> Result<Arc<EntityMetadata>> {
        self.by_type
            .get(&TypeId::of::<E>())
            .map(|&idx| Arc::clone(&self.entries[idx]))
            .ok_or_else(|| Error::EntityNotFound(E::TYPE_NAME.to_string()))
    }

    /// Resolve an entity by type name or table name
    pub fn resolve(&self, name: &str) -> Result<Arc<EntityMetadata>> {
        self.entries
            .iter()
            .find(|m| m.type_name() == name)
            .or_else(|| self.entries.iter().find(|m| m.table_name() == name))
            .map(Arc::clone)
            .ok_or_else(|| Error::EntityNotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntityMetadata>> {
        self.entries.iter()
    }
}
