use syn::{Data, DeriveInput, Error, Fields, Ident, ext::IdentExt};

pub struct SchemaField {
    pub ident: Ident,
    /// Field name without a raw identifier prefix.
    pub name: String,
}

pub struct Schema {
    pub name: Ident,
    pub generics: syn::Generics,
    pub kind: Ident,
    pub id_field: Ident,
    pub fields: Vec<SchemaField>,
}

impl Schema {
    pub fn from_derive_input(input: DeriveInput) -> Result<Self, Error> {
        let name = input.ident;
        let generics = input.generics;

        let kind = input
            .attrs
            .iter()
            .find(|attr| attr.path().is_ident("kind"))
            .ok_or_else(|| {
                Error::new_spanned(
                    &name,
                    "labstore::Record requires a #[kind(..)] attribute naming the record kind",
                )
            })?
            .parse_args::<Ident>()?;

        let fields = match input.data {
            Data::Struct(ref data_struct) => &data_struct.fields,
            _ => {
                return Err(Error::new_spanned(
                    &name,
                    "labstore::Record can only be derived for structs",
                ));
            }
        };

        let named = match fields {
            Fields::Named(fields) => &fields.named,
            Fields::Unnamed(_) => {
                return Err(Error::new_spanned(
                    &name,
                    "labstore::Record doesn't support tuple structs, use named fields",
                ));
            }
            Fields::Unit => {
                return Err(Error::new_spanned(
                    &name,
                    "Unit structs cannot derive labstore::Record as they have no fields",
                ));
            }
        };

        let mut id_field = None;
        let mut schema_fields = Vec::with_capacity(named.len());
        for field in named {
            let Some(ident) = field.ident.clone() else {
                continue;
            };
            if field.attrs.iter().any(|attr| attr.path().is_ident("id")) {
                if id_field.is_some() {
                    return Err(Error::new_spanned(
                        &ident,
                        "only one field can be marked #[id]",
                    ));
                }
                id_field = Some(ident.clone());
            }
            schema_fields.push(SchemaField {
                name: ident.unraw().to_string(),
                ident,
            });
        }

        let id_field = id_field.ok_or_else(|| {
            Error::new_spanned(&name, "labstore::Record requires one field marked #[id]")
        })?;

        Ok(Schema {
            name,
            generics,
            kind,
            id_field,
            fields: schema_fields,
        })
    }
}
