use convert_case::Case;
use convert_case::Casing;
use darling::FromDeriveInput;
use darling::FromField;
use proc_macro2::Ident;
use proc_macro2::Span;
use proc_macro2::TokenStream as TokenStream2;
use quote::format_ident;
use quote::quote;
use syn::DeriveInput;
use syn::Type;

const DEFAULT_LENGTH: u32 = 255;

#[derive(Debug, FromField)]
#[darling(attributes(rowmap))]
struct FieldReceiver {
    pub ident: Option<Ident>,
    pub ty:    Type,

    #[darling(default)]
    pub primary_key: bool,

    #[darling(default)]
    pub auto_generated: bool,

    #[darling(default)]
    pub column_name: Option<String>,

    #[darling(default)]
    pub column_type: Option<String>,

    #[darling(default)]
    pub length: Option<u32>,

    #[darling(default)]
    pub nullable: bool,

    #[darling(default)]
    pub unique: bool,

    #[darling(default)]
    pub references: Option<String>,

    #[darling(default)]
    pub references_column: Option<String>,

    #[darling(default)]
    pub skip: bool,
}

#[derive(Debug, FromDeriveInput)]
#[darling(attributes(rowmap), supports(struct_named))]
struct EntityReceiver {
    pub ident: Ident,
    pub data:  darling::ast::Data<(), FieldReceiver>,

    #[darling(default)]
    pub table_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogicalType {
    Integer,
    Float,
    String,
    Text,
    MediumText,
    LongText,
    Boolean,
    DateTime,
    Date,
    Json,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

impl LogicalType {
    fn parse(name: &str) -> Option<Self> {
        let logical_type = match name.to_case(Case::Snake).as_str() {
            "integer" | "int" => LogicalType::Integer,
            "float" | "real" => LogicalType::Float,
            "string" => LogicalType::String,
            "text" => LogicalType::Text,
            "medium_text" => LogicalType::MediumText,
            "long_text" => LogicalType::LongText,
            "boolean" | "bool" => LogicalType::Boolean,
            "datetime" | "date_time" => LogicalType::DateTime,
            "date" => LogicalType::Date,
            "json" => LogicalType::Json,
            "many_to_one" => LogicalType::ManyToOne,
            "one_to_many" => LogicalType::OneToMany,
            "many_to_many" => LogicalType::ManyToMany,
            _ => return None,
        };
        Some(logical_type)
    }

    fn has_column(&self) -> bool {
        !matches!(self, LogicalType::OneToMany | LogicalType::ManyToMany)
    }

    fn variant(&self) -> Ident {
        Ident::new(&format!("{:?}", self), Span::call_site())
    }
}

#[derive(Debug)]
struct ReferenceInfo {
    pub target: syn::Path,
    pub column: String,
}

#[derive(Debug)]
struct FieldInfo {
    pub field_name:     Ident,
    pub variant_name:   Ident,
    pub column_name:    Option<String>,
    pub logical_type:   LogicalType,
    pub length:         u32,
    pub is_optional:    bool,
    pub is_nullable:    bool,
    pub is_primary_key: bool,
    pub is_auto:        bool,
    pub is_unique:      bool,
    pub references:     Option<ReferenceInfo>,
}

impl FieldInfo {
    fn property(&self) -> String {
        self.field_name.to_string()
    }

    fn resolved_column_name(&self) -> String {
        self.column_name.clone().unwrap_or_else(|| to_snake_case(&self.property()))
    }

    fn has_column(&self) -> bool {
        self.logical_type.has_column()
    }
}

#[derive(Debug)]
struct EntityInfo {
    pub struct_name: Ident,
    pub table_name:  Option<String>,
    pub fields:      Vec<FieldInfo>,
    pub skipped:     Vec<Ident>,
}

impl FieldReceiver {
    fn logical_type(&self) -> darling::Result<LogicalType> {
        if let Some(name) = &self.column_type {
            return LogicalType::parse(name)
                .ok_or_else(|| darling::Error::custom(format!("unknown column_type `{}`", name)).with_span(&self.ty));
        }
        if self.references.is_some() {
            return Ok(LogicalType::ManyToOne);
        }

        let ty = extract_option_inner_type(&self.ty).unwrap_or(&self.ty);
        Ok(infer_logical_type(ty))
    }

    pub fn to_field_info(self) -> darling::Result<FieldInfo> {
        let field_name = self.ident.clone().ok_or_else(|| darling::Error::custom("Expected named field"))?;
        let logical_type = self.logical_type()?;
        let is_optional = is_option_type(&self.ty);
        let variant_name = format_ident!("{}", field_name.to_string().to_case(Case::Pascal));

        if self.primary_key && !is_optional {
            return Err(darling::Error::custom("primary_key field must be an Option<T>").with_span(&self.ty));
        }
        if self.auto_generated && !self.primary_key {
            return Err(darling::Error::custom("auto_generated requires primary_key").with_span(&field_name));
        }
        if self.auto_generated && logical_type != LogicalType::Integer {
            return Err(darling::Error::custom("auto_generated primary_key must be an integer").with_span(&self.ty));
        }

        let references = match &self.references {
            Some(target) => {
                let target = syn::parse_str::<syn::Path>(target)
                    .map_err(|e| darling::Error::custom(format!("invalid references target: {}", e)).with_span(&self.ty))?;
                Some(ReferenceInfo {
                    target,
                    column: self.references_column.clone().unwrap_or_else(|| "id".to_string()),
                })
            }
            None if self.references_column.is_some() => {
                return Err(darling::Error::custom("references_column requires references").with_span(&self.ty));
            }
            None => None,
        };

        Ok(FieldInfo {
            field_name,
            variant_name,
            column_name: self.column_name,
            logical_type,
            length: self.length.unwrap_or(DEFAULT_LENGTH),
            is_optional,
            is_nullable: is_optional || self.nullable,
            is_primary_key: self.primary_key,
            is_auto: self.auto_generated,
            is_unique: self.unique,
            references,
        })
    }
}

impl EntityReceiver {
    pub fn to_entity_info(self) -> darling::Result<EntityInfo> {
        let mut errors = darling::Error::accumulator();
        let mut fields = Vec::new();
        let mut skipped = Vec::new();

        let struct_fields = self.data.take_struct().ok_or_else(|| darling::Error::custom("Expected struct"))?;
        for field in struct_fields.fields {
            if field.skip {
                if let Some(ident) = field.ident {
                    skipped.push(ident);
                }
                continue;
            }
            if let Some(info) = errors.handle(field.to_field_info()) {
                fields.push(info);
            }
        }

        let primary_keys: Vec<&FieldInfo> = fields.iter().filter(|f| f.is_primary_key).collect();
        if primary_keys.len() > 1 {
            errors.push(
                darling::Error::custom("Entity must have at most one field marked with #[rowmap(primary_key)]")
                    .with_span(&primary_keys[1].field_name),
            );
        }
        if fields.iter().all(|f| !f.has_column()) {
            errors.push(darling::Error::custom("Entity must map at least one column").with_span(&self.ident));
        }

        errors.finish()?;
        Ok(EntityInfo { struct_name: self.ident, table_name: self.table_name, fields, skipped })
    }
}

#[proc_macro_derive(Entity, attributes(rowmap))]
pub fn derive_entity(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);

    let receiver = match EntityReceiver::from_derive_input(&input) {
        Ok(r) => r,
        Err(e) => return e.write_errors().into(),
    };

    let entity_info = match receiver.to_entity_info() {
        Ok(info) => info,
        Err(e) => return e.write_errors().into(),
    };

    let expanded = impl_entity(&entity_info);
    proc_macro::TokenStream::from(expanded)
}

fn impl_entity(entity_info: &EntityInfo) -> TokenStream2 {
    let name = &entity_info.struct_name;
    let type_name = name.to_string();
    let column_enum_name = format_ident!("{}Column", name);

    let table_name = match &entity_info.table_name {
        Some(table) => quote! { Some(#table) },
        None => quote! { None },
    };

    let column_defs: Vec<_> = entity_info.fields.iter().map(column_def).collect();

    let stored: Vec<&FieldInfo> = entity_info.fields.iter().filter(|f| f.has_column()).collect();

    let from_row_fields: Vec<_> = stored
        .iter()
        .enumerate()
        .map(|(idx, f)| {
            let field_name = &f.field_name;
            quote! {
                #field_name: rowmap::FromValue::from_value(row.get_value(#idx)?)?
            }
        })
        .collect();

    let default_fields: Vec<_> = entity_info
        .fields
        .iter()
        .filter(|f| !f.has_column())
        .map(|f| &f.field_name)
        .chain(entity_info.skipped.iter())
        .map(|field_name| quote! { #field_name: Default::default() })
        .collect();

    let value_pushes: Vec<_> = stored
        .iter()
        .map(|f| {
            let field_name = &f.field_name;
            let property = f.property();
            if f.is_primary_key && f.is_optional {
                quote! {
                    if let Some(v) = &self.#field_name {
                        values.push((#property, rowmap::IntoValue::into_value(v.clone())));
                    }
                }
            } else {
                quote! {
                    values.push((#property, rowmap::IntoValue::into_value(self.#field_name.clone())));
                }
            }
        })
        .collect();
    let value_count = stored.len();

    let primary_key = entity_info.fields.iter().find(|f| f.is_primary_key);

    let primary_key_value = match primary_key {
        Some(pk) if pk.is_optional => {
            let pk_field = &pk.field_name;
            quote! { self.#pk_field.clone().map(rowmap::IntoValue::into_value) }
        }
        Some(pk) => {
            let pk_field = &pk.field_name;
            quote! { Some(rowmap::IntoValue::into_value(self.#pk_field.clone())) }
        }
        None => quote! { None },
    };

    let set_primary_key_value = match primary_key {
        Some(pk) => {
            let pk_field = &pk.field_name;
            quote! {
                self.#pk_field = rowmap::FromValue::from_value(value)?;
                Ok(())
            }
        }
        None => quote! {
            let _ = value;
            Err(rowmap::Error::PrimaryKeyNotDeclared(#type_name.to_string()))
        },
    };

    let column_variants: Vec<_> = stored.iter().map(|f| &f.variant_name).collect();

    let column_name_arms: Vec<_> = stored
        .iter()
        .map(|f| {
            let variant_name = &f.variant_name;
            let col_name = f.resolved_column_name();
            quote! { Self::#variant_name => #col_name }
        })
        .collect();

    let property_arms: Vec<_> = stored
        .iter()
        .map(|f| {
            let variant_name = &f.variant_name;
            let property = f.property();
            quote! { Self::#variant_name => #property }
        })
        .collect();

    let column_doc = format!("Stored columns of [`{}`]", name);

    quote! {
        #[doc = #column_doc]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum #column_enum_name {
            #(#column_variants),*
        }

        impl #column_enum_name {
            /// Column name in the table
            pub fn name(&self) -> &'static str {
                match self {
                    #(#column_name_arms),*
                }
            }

            /// Field name on the struct
            pub fn property(&self) -> &'static str {
                match self {
                    #(#property_arms),*
                }
            }

            pub fn all() -> &'static [Self] {
                &[#(Self::#column_variants),*]
            }
        }

        impl std::fmt::Display for #column_enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.name())
            }
        }

        impl rowmap::FromRow for #name {
            fn from_row(row: &rowmap::Row) -> rowmap::Result<Self> {
                Ok(Self {
                    #(#from_row_fields,)*
                    #(#default_fields,)*
                })
            }
        }

        impl rowmap::EntityTrait for #name {
            const TYPE_NAME: &'static str = #type_name;
            const TABLE_NAME: Option<&'static str> = #table_name;
            const COLUMNS: &'static [rowmap::ColumnDef] = &[
                #(#column_defs),*
            ];

            fn primary_key_value(&self) -> Option<rowmap::Value> {
                #primary_key_value
            }

            fn set_primary_key_value(&mut self, value: rowmap::Value) -> rowmap::Result<()> {
                #set_primary_key_value
            }

            fn column_values(&self) -> Vec<(&'static str, rowmap::Value)> {
                let mut values = Vec::with_capacity(#value_count);
                #(#value_pushes)*
                values
            }
        }
    }
}

fn column_def(field: &FieldInfo) -> TokenStream2 {
    let property = field.property();
    let column_name = match &field.column_name {
        Some(name) => quote! { Some(#name) },
        None => quote! { None },
    };
    let logical_type = field.logical_type.variant();
    let length = field.length;
    let nullable = field.is_nullable;
    let unique = field.is_unique;
    let primary_key = field.is_primary_key;
    let auto_generated = field.is_auto;

    let references = match &field.references {
        Some(reference) => {
            let target = &reference.target;
            let column = &reference.column;
            quote! {
                Some(rowmap::ReferenceDef {
                    type_name: <#target as rowmap::EntityTrait>::TYPE_NAME,
                    table_name: <#target as rowmap::EntityTrait>::TABLE_NAME,
                    column: #column,
                })
            }
        }
        None => quote! { None },
    };

    quote! {
        rowmap::ColumnDef {
            property: #property,
            column_name: #column_name,
            logical_type: rowmap::LogicalType::#logical_type,
            length: #length,
            nullable: #nullable,
            unique: #unique,
            primary_key: #primary_key,
            auto_generated: #auto_generated,
            references: #references,
        }
    }
}

fn infer_logical_type(ty: &Type) -> LogicalType {
    let Type::Path(type_path) = ty else {
        return LogicalType::String;
    };
    let Some(segment) = type_path.path.segments.last() else {
        return LogicalType::String;
    };

    match segment.ident.to_string().as_str() {
        "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" => LogicalType::Integer,
        "f32" | "f64" => LogicalType::Float,
        "bool" => LogicalType::Boolean,
        "NaiveDateTime" | "DateTime" => LogicalType::DateTime,
        "NaiveDate" => LogicalType::Date,
        "Json" | "JsonValue" => LogicalType::Json,
        "Value" if type_path.path.segments.iter().any(|s| s.ident == "serde_json") => LogicalType::Json,
        _ => LogicalType::String,
    }
}

fn extract_option_inner_type(ty: &Type) -> Option<&Type> {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == "Option" {
                if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                        return Some(inner);
                    }
                }
            }
        }
    }
    None
}

fn is_option_type(ty: &Type) -> bool {
    extract_option_inner_type(ty).is_some()
}

/// Same conversion the runtime applies to property names
fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        if c.is_ascii_uppercase() {
            result.push('_');
        }
        result.push(c.to_ascii_lowercase());
    }
    result.trim_start_matches('_').to_string()
}
